//! Row types for items, locations, consigners and photos

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a string-backed enum with its canonical tokens.
///
/// The tokens are what is stored in SQLite and accepted on the command line.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $token:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }

            /// All accepted tokens, comma separated (used in error messages)
            pub fn choices() -> String {
                Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($name::$variant),)+
                    other => Err(other.to_string()),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                s.parse().map_err(|_| FromSqlError::Other(
                    format!("invalid {} value: {}", stringify!($name), s).into(),
                ))
            }
        }
    };
}

text_enum!(
    /// Physical condition of an item
    Condition {
        Ds => "DS",
        Vnds => "VNDS",
        Used => "Used",
    }
);

text_enum!(
    /// What original packaging is included
    BoxStatus {
        Box => "box",
        Tag => "tag",
        Both => "both",
        Neither => "neither",
    }
);

text_enum!(
    /// Lifecycle state; items are never physically deleted
    ItemStatus {
        Available => "available",
        Sold => "sold",
        Held => "held",
        Deleted => "deleted",
    }
);

text_enum!(
    OwnershipType {
        Owned => "owned",
        Consignment => "consignment",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: i64,
    pub sku: String,
    pub variant_id: i64,
    pub brand: String,
    pub model: String,
    pub size: String,
    pub color: String,
    pub condition: Condition,
    pub box_status: BoxStatus,
    pub current_price: Decimal,
    pub purchase_price: Decimal,
    pub location_id: Option<i64>,
    pub date_added: NaiveDateTime,
    pub notes: Option<String>,
    pub status: ItemStatus,
    pub ownership_type: OwnershipType,
    pub consigner_id: Option<i64>,
    pub split_percentage: Option<i64>,
    pub sold_price: Option<Decimal>,
    pub sold_platform: Option<String>,
    pub sold_date: Option<NaiveDateTime>,
    /// Platform fee deducted when the item sold (consignment payouts)
    pub platform_fee: Option<Decimal>,
}

impl Item {
    pub fn is_consignment(&self) -> bool {
        self.ownership_type == OwnershipType::Consignment
    }

    /// Split used for payouts, falling back to the standard 70%
    pub fn effective_split(&self) -> i64 {
        self.split_percentage.unwrap_or(70)
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    /// Record a sale. The sale fields are always set together.
    pub fn mark_sold(
        &mut self,
        price: Decimal,
        platform: Option<String>,
        platform_fee: Option<Decimal>,
        when: NaiveDateTime,
    ) {
        self.status = ItemStatus::Sold;
        self.sold_price = Some(price);
        self.sold_platform = platform;
        self.sold_date = Some(when);
        self.platform_fee = platform_fee;
    }

    /// Drop sale information when an item leaves the sold state
    pub fn clear_sale(&mut self) {
        self.sold_price = None;
        self.sold_platform = None;
        self.sold_date = None;
        self.platform_fee = None;
    }

    /// Append to the free-form notes, `|` separated
    pub fn append_note(&mut self, note: &str) {
        self.notes = Some(match self.notes.as_deref().map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{} | {}", existing, note),
            _ => note.to_string(),
        });
    }
}

/// Fields required to insert a new item
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub sku: String,
    pub variant_id: i64,
    pub brand: String,
    pub model: String,
    pub size: String,
    pub color: String,
    pub condition: Condition,
    pub box_status: BoxStatus,
    pub current_price: Decimal,
    pub purchase_price: Decimal,
    pub location_id: Option<i64>,
    pub notes: Option<String>,
    pub ownership_type: OwnershipType,
    pub consigner_id: Option<i64>,
    pub split_percentage: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: i64,
    pub code: String,
    pub location_type: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consigner {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub default_split_percentage: i64,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Photo {
    pub id: i64,
    pub item_id: i64,
    pub file_path: String,
    pub photo_type: Option<String>,
    pub display_order: i64,
    pub created_date: NaiveDateTime,
}
