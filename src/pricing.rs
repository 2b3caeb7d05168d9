//! Price rounding and consignment payout arithmetic
//!
//! Prices always round UP: list prices to the next $5, payouts to the next cent.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Flat fee assumed when the sale platform or its fee is unknown
pub const DEFAULT_PLATFORM_FEE: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Split used when neither the item nor the consigner carries one
pub const DEFAULT_SPLIT_PERCENTAGE: i64 = 70;

/// Sales channels with their default commission rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Store,
    Ebay,
    Goat,
    Stockx,
    Grailed,
    Depop,
}

impl Platform {
    pub const ALL: &'static [Platform] = &[
        Platform::Store,
        Platform::Ebay,
        Platform::Goat,
        Platform::Stockx,
        Platform::Grailed,
        Platform::Depop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Store => "store",
            Platform::Ebay => "ebay",
            Platform::Goat => "goat",
            Platform::Stockx => "stockx",
            Platform::Grailed => "grailed",
            Platform::Depop => "depop",
        }
    }

    /// Commission rate as a percentage of the sale price
    pub fn fee_rate(&self) -> Decimal {
        match self {
            Platform::Store => Decimal::ZERO,
            Platform::Ebay => Decimal::new(125, 1),
            Platform::Goat | Platform::Stockx => Decimal::new(95, 1),
            Platform::Grailed => Decimal::new(6, 0),
            Platform::Depop => Decimal::new(10, 0),
        }
    }

    /// Commission charged on `sale_price`, rounded to the cent
    pub fn fee_for(&self, sale_price: Decimal) -> Decimal {
        (sale_price * self.fee_rate() / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .iter()
            .find(|p| p.as_str() == s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| s.to_string())
    }
}

/// Fee for a sale on the named platform; unknown platforms get the flat default
pub fn platform_fee(platform: &str, sale_price: Decimal) -> Decimal {
    match platform.parse::<Platform>() {
        Ok(p) => p.fee_for(sale_price),
        Err(_) => DEFAULT_PLATFORM_FEE,
    }
}

/// Round UP to the nearest $5 (100.01 becomes 105.00, 105.00 stays)
pub fn round_price_up(price: Decimal) -> Decimal {
    let five = Decimal::new(5, 0);
    let mut rounded = (price / five).ceil() * five;
    rounded.rescale(2);
    rounded
}

/// Consigner payout: `split`% of `(sale_price - platform_fee)`, rounded up to the cent.
///
/// A fee above the sale price gives a negative payout, rounded away from zero.
pub fn consignment_payout(sale_price: Decimal, platform_fee: Decimal, split_percentage: i64) -> Decimal {
    let net = sale_price - platform_fee;
    let payout = net * Decimal::from(split_percentage) / Decimal::ONE_HUNDRED;
    let mut payout = payout.round_dp_with_strategy(2, RoundingStrategy::AwayFromZero);
    payout.rescale(2);
    payout
}

/// `$x.xx`
pub fn format_price(price: Decimal) -> String {
    format!("${:.2}", price)
}

/// `$min - $max`, or a single price when they match
pub fn price_range(prices: &[Decimal]) -> String {
    let (Some(min), Some(max)) = (prices.iter().min(), prices.iter().max()) else {
        return "$0".to_string();
    };
    if min == max {
        format_price(*min)
    } else {
        format!("{} - {}", format_price(*min), format_price(*max))
    }
}
