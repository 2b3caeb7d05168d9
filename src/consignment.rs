//! Consigner resolution, sales and payouts
//!
//! A consigner is matched by normalized phone first, then by a case-insensitive
//! substring of their name. Payouts are `split`% of the sale net of the
//! platform fee, rounded up to the cent.

use crate::database::consigners::{
    find_consigners_by_name, get_consigner, get_consigner_by_phone, insert_consigner,
    list_consigners, update_consigner as store_consigner,
};
use crate::database::items::{
    get_item_by_sku, items_for_consigner, sold_consignment_items, update_item, ItemRecord,
};
use crate::error::{InventoryError, Result};
use crate::models::{Consigner, Item, ItemStatus};
use crate::pricing::{
    consignment_payout, format_price, platform_fee, DEFAULT_PLATFORM_FEE,
    DEFAULT_SPLIT_PERCENTAGE,
};
use crate::validation::{is_valid_email, validate_percentage, validate_phone};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of `find_or_create_consigner`
#[derive(Debug, Clone, PartialEq)]
pub struct ConsignerMatch {
    pub consigner: Consigner,
    pub created: bool,
}

fn ambiguous(name: &str, matches: &[Consigner]) -> InventoryError {
    let candidates = matches
        .iter()
        .map(|c| format!("{} {}", c.name, c.phone))
        .collect::<Vec<_>>()
        .join(", ");
    InventoryError::AmbiguousConsigner {
        name: name.to_string(),
        candidates,
    }
}

/// Find a consigner by phone or name, creating one when nothing matches.
///
/// Creating a consigner requires a phone number. Several name matches without
/// a phone that singles one out is an ambiguity error.
pub fn find_or_create_consigner(
    conn: &Connection,
    name: &str,
    phone: Option<&str>,
    email: Option<&str>,
    default_split: i64,
) -> Result<ConsignerMatch> {
    let phone = phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(validate_phone)
        .transpose()?;

    if let Some(phone) = &phone {
        if let Some(consigner) = get_consigner_by_phone(conn, phone)? {
            return Ok(ConsignerMatch {
                consigner,
                created: false,
            });
        }
    }

    let matches = find_consigners_by_name(conn, name)?;
    match (matches.len(), &phone) {
        (1, _) => {
            let consigner = matches.into_iter().next().ok_or_else(|| {
                InventoryError::not_found(format!("No consigner found with name '{}'", name))
            })?;
            return Ok(ConsignerMatch {
                consigner,
                created: false,
            });
        }
        (n, None) if n > 1 => return Err(ambiguous(name, &matches)),
        _ => {}
    }

    let phone = phone.ok_or_else(|| {
        InventoryError::validation("Phone number required to create new consigner")
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(InventoryError::validation("Consigner name cannot be empty"));
    }
    let email = email.map(str::trim).filter(|e| !e.is_empty());
    if let Some(email) = email {
        if !is_valid_email(email) {
            return Err(InventoryError::validation("Invalid email address"));
        }
    }
    let split = validate_percentage(default_split)?;

    let id = insert_consigner(conn, name, &phone, email, split)?;
    let consigner = get_consigner(conn, id)?
        .ok_or_else(|| InventoryError::not_found(format!("Consigner {} vanished", id)))?;
    Ok(ConsignerMatch {
        consigner,
        created: true,
    })
}

/// Look up an existing consigner without creating one
pub fn resolve_consigner(conn: &Connection, name: &str, phone: Option<&str>) -> Result<Consigner> {
    if let Some(raw) = phone.map(str::trim).filter(|p| !p.is_empty()) {
        let normalized = validate_phone(raw)?;
        return get_consigner_by_phone(conn, &normalized)?.ok_or_else(|| {
            InventoryError::not_found(format!("No consigner found with phone '{}'", raw))
        });
    }

    let mut matches = find_consigners_by_name(conn, name)?;
    match matches.len() {
        0 => Err(InventoryError::not_found(format!(
            "No consigner found with name '{}'",
            name
        ))),
        1 => Ok(matches.remove(0)),
        _ => Err(ambiguous(name, &matches)),
    }
}

/// Fee, split and payout for one sold item
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemPayout {
    pub platform_fee: Decimal,
    pub split_percentage: i64,
    pub payout: Decimal,
}

/// Payout owed for a sold item, using the fee recorded at sale time
pub fn item_payout(item: &Item, fallback_split: i64) -> Option<ItemPayout> {
    let sold_price = item.sold_price?;
    let fee = item.platform_fee.unwrap_or(DEFAULT_PLATFORM_FEE);
    let split = item.split_percentage.unwrap_or(fallback_split);
    Some(ItemPayout {
        platform_fee: fee,
        split_percentage: split,
        payout: consignment_payout(sold_price, fee, split),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsignerStats {
    pub total_items: usize,
    pub available_items: usize,
    pub sold_items: usize,
    pub held_items: usize,
    pub total_current_value: Decimal,
    pub total_sold_value: Decimal,
    pub total_payouts: Decimal,
}

fn stats_for(items: &[ItemRecord]) -> ConsignerStats {
    let mut stats = ConsignerStats {
        total_items: items.len(),
        ..Default::default()
    };
    for record in items {
        let item = &record.item;
        match item.status {
            ItemStatus::Available => {
                stats.available_items += 1;
                stats.total_current_value += item.current_price;
            }
            ItemStatus::Sold => {
                stats.sold_items += 1;
                if let Some(p) = item_payout(item, DEFAULT_SPLIT_PERCENTAGE) {
                    stats.total_sold_value += item.sold_price.unwrap_or_default();
                    stats.total_payouts += p.payout;
                }
            }
            ItemStatus::Held => stats.held_items += 1,
            ItemStatus::Deleted => {}
        }
    }
    stats
}

pub fn consigner_stats(conn: &Connection, consigner_id: i64) -> Result<ConsignerStats> {
    let items = items_for_consigner(conn, consigner_id, None)?;
    Ok(stats_for(&items))
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsignerSummary {
    #[serde(flatten)]
    pub consigner: Consigner,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ConsignerStats>,
}

/// Every consigner ordered by name, with statistics on request
pub fn list_all_consigners(conn: &Connection, include_stats: bool) -> Result<Vec<ConsignerSummary>> {
    list_consigners(conn)?
        .into_iter()
        .map(|consigner| {
            let stats = if include_stats {
                Some(consigner_stats(conn, consigner.id)?)
            } else {
                None
            };
            Ok(ConsignerSummary { consigner, stats })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ConsignerReport {
    pub consigner: Consigner,
    pub stats: ConsignerStats,
    pub by_status: BTreeMap<&'static str, Vec<ItemRecord>>,
    /// Ten most recently added items
    pub recent: Vec<ItemRecord>,
}

pub fn consigner_report(conn: &Connection, consigner_id: i64) -> Result<ConsignerReport> {
    let consigner = get_consigner(conn, consigner_id)?
        .ok_or_else(|| InventoryError::not_found("Consigner not found"))?;
    let items = items_for_consigner(conn, consigner_id, None)?;
    let stats = stats_for(&items);

    let mut by_status: BTreeMap<&'static str, Vec<ItemRecord>> = BTreeMap::new();
    for status in [ItemStatus::Available, ItemStatus::Sold, ItemStatus::Held] {
        by_status.insert(
            status.as_str(),
            items
                .iter()
                .filter(|r| r.item.status == status)
                .cloned()
                .collect(),
        );
    }
    let recent = items.into_iter().take(10).collect();

    Ok(ConsignerReport {
        consigner,
        stats,
        by_status,
        recent,
    })
}

/// Sold items owed to one consigner
#[derive(Debug, Clone)]
pub struct PayoutGroup {
    pub consigner: Option<Consigner>,
    pub items: Vec<(ItemRecord, ItemPayout)>,
    pub total_payout: Decimal,
}

/// Payouts for all sold consignment items, largest total first
pub fn pending_payouts(conn: &Connection) -> Result<Vec<PayoutGroup>> {
    let mut groups: BTreeMap<Option<i64>, PayoutGroup> = BTreeMap::new();

    for record in sold_consignment_items(conn)? {
        let Some(payout) = item_payout(&record.item, DEFAULT_SPLIT_PERCENTAGE) else {
            continue;
        };
        let consigner_id = record.item.consigner_id;
        if !groups.contains_key(&consigner_id) {
            let consigner = match consigner_id {
                Some(id) => get_consigner(conn, id)?,
                None => None,
            };
            groups.insert(
                consigner_id,
                PayoutGroup {
                    consigner,
                    items: Vec::new(),
                    total_payout: Decimal::ZERO,
                },
            );
        }
        if let Some(group) = groups.get_mut(&consigner_id) {
            group.total_payout += payout.payout;
            group.items.push((record, payout));
        }
    }

    let mut groups: Vec<PayoutGroup> = groups.into_values().collect();
    groups.sort_by(|a, b| b.total_payout.cmp(&a.total_payout));
    Ok(groups)
}

/// Result of recording a consignment sale
#[derive(Debug, Clone)]
pub struct SaleOutcome {
    pub record: ItemRecord,
    pub platform: String,
    pub platform_fee: Decimal,
    pub split_percentage: i64,
    pub payout: Decimal,
    pub store_revenue: Decimal,
}

/// Mark a consignment item sold and work out the consigner's payout.
///
/// Without an explicit fee the platform's default commission applies.
pub fn record_consignment_sale(
    conn: &Connection,
    sku: &str,
    sold_price: Decimal,
    platform: &str,
    fee_override: Option<Decimal>,
    buyer: Option<&str>,
) -> Result<SaleOutcome> {
    let record = get_item_by_sku(conn, sku)?
        .ok_or_else(|| InventoryError::not_found(format!("Item with SKU '{}' not found", sku)))?;
    let mut item = record.item.clone();

    if !item.is_consignment() {
        return Err(InventoryError::validation(format!(
            "Item {} is not a consignment item",
            item.sku
        )));
    }
    if item.status == ItemStatus::Sold {
        return Err(InventoryError::validation(format!(
            "Item {} is already marked as sold",
            item.sku
        )));
    }

    let platform = platform.trim().to_lowercase();
    let fee = fee_override.unwrap_or_else(|| platform_fee(&platform, sold_price));
    let split = item.effective_split();
    let payout = consignment_payout(sold_price, fee, split);

    item.mark_sold(
        sold_price,
        Some(platform.clone()),
        Some(fee),
        chrono::Local::now().naive_local(),
    );
    if platform != "store" {
        item.append_note(&format!("Platform: {}", platform));
    }
    if let Some(buyer) = buyer.map(str::trim).filter(|b| !b.is_empty()) {
        item.append_note(&format!("Buyer: {}", buyer));
    }
    if fee > Decimal::ZERO {
        item.append_note(&format!("Platform fee: {}", format_price(fee)));
    }
    update_item(conn, &item)?;
    log::info!("Recorded consignment sale of {} for {}", item.sku, sold_price);

    Ok(SaleOutcome {
        record: ItemRecord { item, ..record },
        platform,
        platform_fee: fee,
        split_percentage: split,
        payout,
        store_revenue: sold_price - payout - fee,
    })
}

/// Put a consignment item on hold, recording the reason in its notes
pub fn hold_item(conn: &Connection, sku: &str, reason: Option<&str>) -> Result<ItemRecord> {
    let record = consignment_item(conn, sku)?;
    let mut item = record.item.clone();
    if item.status == ItemStatus::Sold {
        return Err(InventoryError::validation(format!(
            "Cannot hold sold item {}",
            item.sku
        )));
    }

    item.status = ItemStatus::Held;
    if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
        item.append_note(&format!("HOLD: {}", reason));
    }
    update_item(conn, &item)?;
    Ok(ItemRecord { item, ..record })
}

/// Release a held consignment item back to available
pub fn release_item(conn: &Connection, sku: &str, reason: Option<&str>) -> Result<ItemRecord> {
    let record = consignment_item(conn, sku)?;
    let mut item = record.item.clone();
    if item.status != ItemStatus::Held {
        return Err(InventoryError::validation(format!(
            "Item {} is not currently on hold",
            item.sku
        )));
    }

    item.status = ItemStatus::Available;
    if let (Some(notes), Some(reason)) = (item.notes.as_deref(), reason) {
        let cleaned = notes
            .split(" | ")
            .filter(|part| part.trim() != format!("HOLD: {}", reason.trim()))
            .collect::<Vec<_>>()
            .join(" | ");
        item.notes = (!cleaned.is_empty()).then_some(cleaned);
    }
    update_item(conn, &item)?;
    Ok(ItemRecord { item, ..record })
}

fn consignment_item(conn: &Connection, sku: &str) -> Result<ItemRecord> {
    let record = get_item_by_sku(conn, sku)?
        .ok_or_else(|| InventoryError::not_found(format!("Item with SKU '{}' not found", sku)))?;
    if !record.item.is_consignment() {
        return Err(InventoryError::validation(format!(
            "Item {} is not a consignment item",
            record.item.sku
        )));
    }
    Ok(record)
}

/// Fields that can change on an existing consigner
#[derive(Debug, Clone, Default)]
pub struct ConsignerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub default_split: Option<i64>,
}

pub fn update_consigner(conn: &Connection, id: i64, update: &ConsignerUpdate) -> Result<Consigner> {
    let mut consigner = get_consigner(conn, id)?
        .ok_or_else(|| InventoryError::not_found("Consigner not found"))?;

    if let Some(name) = update.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        consigner.name = name.to_string();
    }
    if let Some(phone) = &update.phone {
        let phone = validate_phone(phone)?;
        if let Some(other) = get_consigner_by_phone(conn, &phone)?.filter(|o| o.id != id) {
            return Err(InventoryError::validation(format!(
                "Phone {} already belongs to consigner {}",
                phone, other.name
            )));
        }
        consigner.phone = phone;
    }
    if let Some(email) = &update.email {
        if !is_valid_email(email) {
            return Err(InventoryError::validation("Invalid email address"));
        }
        consigner.email = (!email.is_empty()).then(|| email.clone());
    }
    if let Some(split) = update.default_split {
        consigner.default_split_percentage = validate_percentage(split)?;
    }

    store_consigner(conn, &consigner)?;
    Ok(consigner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::items::{get_item_by_sku, insert_item, tests::new_item};
    use crate::database::tests::test_db;
    use crate::models::OwnershipType;
    use rust_decimal_macros::dec;

    fn consign(conn: &Connection, sku: &str, consigner_id: i64, split: Option<i64>) {
        let mut item = new_item(sku, "Nike", "10", dec!(200));
        item.ownership_type = OwnershipType::Consignment;
        item.consigner_id = Some(consigner_id);
        item.split_percentage = split;
        item.purchase_price = dec!(0);
        insert_item(conn, &item).unwrap();
    }

    #[test]
    fn creates_new_consigner_with_phone() {
        let conn = test_db();
        let m = find_or_create_consigner(&conn, " John Doe ", Some("555-123-4567"), None, 70)
            .unwrap();
        assert!(m.created);
        assert_eq!(m.consigner.name, "John Doe");
        assert_eq!(m.consigner.phone, "(555) 123-4567");
    }

    #[test]
    fn new_consigner_requires_phone() {
        let conn = test_db();
        let err = find_or_create_consigner(&conn, "John", None, None, 70).unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(err.to_string(), "Phone number required to create new consigner");
    }

    #[test]
    fn phone_match_wins_over_name() {
        let conn = test_db();
        let first = find_or_create_consigner(&conn, "John Doe", Some("5551234567"), None, 70)
            .unwrap()
            .consigner;
        let m = find_or_create_consigner(&conn, "Somebody Else", Some("(555) 123-4567"), None, 70)
            .unwrap();
        assert!(!m.created);
        assert_eq!(m.consigner.id, first.id);
    }

    #[test]
    fn single_name_match_is_reused() {
        let conn = test_db();
        find_or_create_consigner(&conn, "John Doe", Some("5551234567"), None, 70).unwrap();
        let m = find_or_create_consigner(&conn, "john", None, None, 70).unwrap();
        assert!(!m.created);
        assert_eq!(m.consigner.name, "John Doe");
    }

    #[test]
    fn multiple_name_matches_need_phone() {
        let conn = test_db();
        find_or_create_consigner(&conn, "John Doe", Some("5551234567"), None, 70).unwrap();
        find_or_create_consigner(&conn, "Johnny Cash", Some("5552223333"), None, 70).unwrap();

        let err = find_or_create_consigner(&conn, "john", None, None, 70).unwrap_err();
        assert!(matches!(err, InventoryError::AmbiguousConsigner { .. }));

        let m = find_or_create_consigner(&conn, "john", Some("555-222-3333"), None, 70).unwrap();
        assert_eq!(m.consigner.name, "Johnny Cash");

        // Unknown phone with ambiguous name creates a new consigner
        let m = find_or_create_consigner(&conn, "john", Some("555-999-0000"), None, 70).unwrap();
        assert!(m.created);
    }

    #[test]
    fn creation_validates_email_and_split() {
        let conn = test_db();
        assert!(find_or_create_consigner(&conn, "A", Some("5551234567"), Some("bad"), 70).is_err());
        assert!(find_or_create_consigner(&conn, "A", Some("5551234567"), None, 101).is_err());
        assert!(find_or_create_consigner(&conn, "A", Some("123"), None, 70).is_err());
    }

    #[test]
    fn resolve_does_not_create() {
        let conn = test_db();
        let err = resolve_consigner(&conn, "Nobody", None).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
        let err = resolve_consigner(&conn, "Nobody", Some("5550001111")).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));

        find_or_create_consigner(&conn, "Mike Chen", Some("5551234567"), None, 70).unwrap();
        assert_eq!(resolve_consigner(&conn, "chen", None).unwrap().name, "Mike Chen");
        assert_eq!(
            resolve_consigner(&conn, "", Some("555.123.4567")).unwrap().name,
            "Mike Chen"
        );
    }

    #[test]
    fn consignment_sale_uses_platform_fee() {
        let conn = test_db();
        let c = find_or_create_consigner(&conn, "Mike", Some("5551234567"), None, 70)
            .unwrap()
            .consigner;
        consign(&conn, "NIK001", c.id, Some(80));

        let outcome =
            record_consignment_sale(&conn, "nik001", dec!(200), "eBay", None, Some("Sam")).unwrap();
        assert_eq!(outcome.platform_fee, dec!(25.00));
        assert_eq!(outcome.split_percentage, 80);
        assert_eq!(outcome.payout, dec!(140.00));
        assert_eq!(outcome.store_revenue, dec!(35.00));

        let item = get_item_by_sku(&conn, "NIK001").unwrap().unwrap().item;
        assert_eq!(item.status, ItemStatus::Sold);
        assert_eq!(item.sold_platform.as_deref(), Some("ebay"));
        assert_eq!(
            item.notes.as_deref(),
            Some("Platform: ebay | Buyer: Sam | Platform fee: $25.00")
        );

        let err = record_consignment_sale(&conn, "NIK001", dec!(200), "store", None, None)
            .unwrap_err();
        assert!(err.to_string().contains("already marked as sold"));
    }

    #[test]
    fn sale_rejects_owned_items() {
        let conn = test_db();
        insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(200))).unwrap();
        let err = record_consignment_sale(&conn, "NIK001", dec!(200), "store", None, None)
            .unwrap_err();
        assert!(err.to_string().contains("not a consignment item"));
    }

    #[test]
    fn stats_and_pending_payouts_use_recorded_fee() {
        let conn = test_db();
        let a = find_or_create_consigner(&conn, "Alice", Some("5551110000"), None, 70)
            .unwrap()
            .consigner;
        let b = find_or_create_consigner(&conn, "Bob", Some("5552220000"), None, 70)
            .unwrap()
            .consigner;
        consign(&conn, "NIK001", a.id, Some(70));
        consign(&conn, "NIK002", a.id, None);
        consign(&conn, "NIK003", b.id, Some(60));

        record_consignment_sale(&conn, "NIK001", dec!(100), "store", Some(dec!(10)), None).unwrap();
        record_consignment_sale(&conn, "NIK003", dec!(200), "store", Some(dec!(15)), None).unwrap();

        let stats = consigner_stats(&conn, a.id).unwrap();
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.sold_items, 1);
        assert_eq!(stats.available_items, 1);
        assert_eq!(stats.total_current_value, dec!(200));
        assert_eq!(stats.total_payouts, dec!(63.00));

        let payouts = pending_payouts(&conn).unwrap();
        assert_eq!(payouts.len(), 2);
        assert_eq!(payouts[0].consigner.as_ref().unwrap().name, "Bob");
        assert_eq!(payouts[0].total_payout, dec!(111.00));
        assert_eq!(payouts[1].total_payout, dec!(63.00));
    }

    #[test]
    fn hold_and_release() {
        let conn = test_db();
        let c = find_or_create_consigner(&conn, "Mike", Some("5551234567"), None, 70)
            .unwrap()
            .consigner;
        consign(&conn, "NIK001", c.id, None);

        let held = hold_item(&conn, "NIK001", Some("Needs cleaning")).unwrap();
        assert_eq!(held.item.status, ItemStatus::Held);
        assert_eq!(held.item.notes.as_deref(), Some("HOLD: Needs cleaning"));

        let released = release_item(&conn, "NIK001", Some("Needs cleaning")).unwrap();
        assert_eq!(released.item.status, ItemStatus::Available);
        assert!(released.item.notes.is_none());

        assert!(release_item(&conn, "NIK001", None).is_err());
    }

    #[test]
    fn report_groups_items() {
        let conn = test_db();
        let c = find_or_create_consigner(&conn, "Mike", Some("5551234567"), None, 70)
            .unwrap()
            .consigner;
        consign(&conn, "NIK001", c.id, None);
        consign(&conn, "NIK002", c.id, None);
        hold_item(&conn, "NIK002", None).unwrap();

        let report = consigner_report(&conn, c.id).unwrap();
        assert_eq!(report.by_status["available"].len(), 1);
        assert_eq!(report.by_status["held"].len(), 1);
        assert!(report.by_status["sold"].is_empty());
        assert_eq!(report.recent.len(), 2);
    }

    #[test]
    fn update_consigner_validates() {
        let conn = test_db();
        let c = find_or_create_consigner(&conn, "Mike", Some("5551234567"), None, 70)
            .unwrap()
            .consigner;
        let update = ConsignerUpdate {
            email: Some("mike@example.com".to_string()),
            default_split: Some(75),
            ..Default::default()
        };
        let updated = update_consigner(&conn, c.id, &update).unwrap();
        assert_eq!(updated.email.as_deref(), Some("mike@example.com"));
        assert_eq!(updated.default_split_percentage, 75);

        let bad = ConsignerUpdate {
            default_split: Some(150),
            ..Default::default()
        };
        assert!(update_consigner(&conn, c.id, &bad).is_err());
    }

    #[test]
    fn update_consigner_rejects_taken_phone() {
        let conn = test_db();
        let mike = find_or_create_consigner(&conn, "Mike", Some("5551234567"), None, 70)
            .unwrap()
            .consigner;
        find_or_create_consigner(&conn, "Sara", Some("5559876543"), None, 70).unwrap();

        let update = ConsignerUpdate {
            phone: Some("555-987-6543".to_string()),
            ..Default::default()
        };
        let err = update_consigner(&conn, mike.id, &update).unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(
            err.to_string(),
            "Phone (555) 987-6543 already belongs to consigner Sara"
        );

        // Re-entering its own number is fine
        let update = ConsignerUpdate {
            phone: Some("5551234567".to_string()),
            ..Default::default()
        };
        assert_eq!(update_consigner(&conn, mike.id, &update).unwrap().phone, "(555) 123-4567");
    }
}
