//! Item queries
//!
//! Every read goes through `ITEM_SELECT`, which joins the location code and
//! consigner name so callers never need a second lookup for display.

use super::{money_from_row, money_to_sql, opt_money_from_row, DbResult};
use crate::models::{Condition, Item, ItemStatus, NewItem, OwnershipType};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

const ITEM_SELECT: &str = "
    SELECT i.id, i.sku, i.variant_id, i.brand, i.model, i.size, i.color, i.condition,
           i.box_status, i.current_price, i.purchase_price, i.location_id, i.date_added,
           i.notes, i.status, i.ownership_type, i.consigner_id, i.split_percentage,
           i.sold_price, i.sold_platform, i.sold_date, i.platform_fee,
           l.code, l.description, c.name, c.phone
    FROM items i
    LEFT JOIN locations l ON l.id = i.location_id
    LEFT JOIN consigners c ON c.id = i.consigner_id";

const ITEM_FROM: &str = "
    FROM items i
    LEFT JOIN locations l ON l.id = i.location_id";

/// An item with its location and consigner resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRecord {
    #[serde(flatten)]
    pub item: Item,
    pub location_code: Option<String>,
    pub location_description: Option<String>,
    pub consigner_name: Option<String>,
    pub consigner_phone: Option<String>,
}

impl ItemRecord {
    pub fn location_label(&self) -> &str {
        self.location_code.as_deref().unwrap_or("No Location")
    }
}

fn item_from_row(row: &Row<'_>) -> DbResult<ItemRecord> {
    Ok(ItemRecord {
        item: Item {
            id: row.get(0)?,
            sku: row.get(1)?,
            variant_id: row.get(2)?,
            brand: row.get(3)?,
            model: row.get(4)?,
            size: row.get(5)?,
            color: row.get(6)?,
            condition: row.get(7)?,
            box_status: row.get(8)?,
            current_price: money_from_row(row, 9)?,
            purchase_price: money_from_row(row, 10)?,
            location_id: row.get(11)?,
            date_added: row.get(12)?,
            notes: row.get(13)?,
            status: row.get(14)?,
            ownership_type: row.get(15)?,
            consigner_id: row.get(16)?,
            split_percentage: row.get(17)?,
            sold_price: opt_money_from_row(row, 18)?,
            sold_platform: row.get(19)?,
            sold_date: row.get(20)?,
            platform_fee: opt_money_from_row(row, 21)?,
        },
        location_code: row.get(22)?,
        location_description: row.get(23)?,
        consigner_name: row.get(24)?,
        consigner_phone: row.get(25)?,
    })
}

/// Search criteria; unset fields do not filter
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Substring across brand, model, color, SKU and notes
    pub text: Option<String>,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    /// Exact (normalized) size
    pub size: Option<String>,
    pub condition: Option<Condition>,
    /// Substring of the location code
    pub location_code: Option<String>,
    pub location_id: Option<i64>,
    pub status: Option<ItemStatus>,
    /// Deleted items are hidden unless a status is requested or this is set
    pub include_deleted: bool,
    pub ownership: Option<OwnershipType>,
    pub consigner_id: Option<i64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub added_after: Option<NaiveDate>,
    pub added_before: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ItemFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(text) = &self.text {
            let p = bind(&mut values, like(text));
            clauses.push(format!(
                "(i.brand LIKE {p} OR i.model LIKE {p} OR i.color LIKE {p} OR i.sku LIKE {p} OR i.notes LIKE {p})"
            ));
        }
        if let Some(sku) = &self.sku {
            clauses.push(format!("i.sku LIKE {}", bind(&mut values, like(&sku.to_uppercase()))));
        }
        if let Some(brand) = &self.brand {
            clauses.push(format!("i.brand LIKE {}", bind(&mut values, like(brand))));
        }
        if let Some(model) = &self.model {
            clauses.push(format!("i.model LIKE {}", bind(&mut values, like(model))));
        }
        if let Some(color) = &self.color {
            clauses.push(format!("i.color LIKE {}", bind(&mut values, like(color))));
        }
        if let Some(size) = &self.size {
            clauses.push(format!("i.size = {}", bind(&mut values, text_value(size))));
        }
        if let Some(condition) = self.condition {
            let p = bind(&mut values, text_value(condition.as_str()));
            clauses.push(format!("i.condition = {}", p));
        }
        if let Some(code) = &self.location_code {
            let p = bind(&mut values, like(&code.to_uppercase()));
            clauses.push(format!("l.code LIKE {}", p));
        }
        if let Some(id) = self.location_id {
            clauses.push(format!("i.location_id = {}", bind(&mut values, Value::Integer(id))));
        }
        match self.status {
            Some(status) => {
                let p = bind(&mut values, text_value(status.as_str()));
                clauses.push(format!("i.status = {}", p));
            }
            None if !self.include_deleted => clauses.push("i.status != 'deleted'".to_string()),
            None => {}
        }
        if let Some(ownership) = self.ownership {
            let p = bind(&mut values, text_value(ownership.as_str()));
            clauses.push(format!("i.ownership_type = {}", p));
        }
        if let Some(id) = self.consigner_id {
            clauses.push(format!("i.consigner_id = {}", bind(&mut values, Value::Integer(id))));
        }
        if let Some(min) = self.min_price {
            let p = bind(&mut values, real(min));
            clauses.push(format!("CAST(i.current_price AS REAL) >= {}", p));
        }
        if let Some(max) = self.max_price {
            let p = bind(&mut values, real(max));
            clauses.push(format!("CAST(i.current_price AS REAL) <= {}", p));
        }
        if let Some(after) = self.added_after {
            let p = bind(&mut values, Value::Text(after.to_string()));
            clauses.push(format!("date(i.date_added) >= {}", p));
        }
        if let Some(before) = self.added_before {
            let p = bind(&mut values, Value::Text(before.to_string()));
            clauses.push(format!("date(i.date_added) <= {}", p));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// Queue a value and return its numbered placeholder
fn bind(values: &mut Vec<Value>, value: Value) -> String {
    values.push(value);
    format!("?{}", values.len())
}

fn like(term: &str) -> Value {
    Value::Text(format!("%{}%", term))
}

fn text_value(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn real(d: Decimal) -> Value {
    Value::Real(d.to_f64().unwrap_or(0.0))
}

/// Search items, ordered by SKU
pub fn search_items(conn: &Connection, filter: &ItemFilter) -> DbResult<Vec<ItemRecord>> {
    let (where_sql, mut values) = filter.where_clause();
    let mut sql = format!("{}{} ORDER BY i.sku, i.id", ITEM_SELECT, where_sql);
    if let Some(limit) = filter.limit {
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(filter.offset as i64));
        sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", values.len() - 1, values.len()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let results: DbResult<Vec<ItemRecord>> = stmt
        .query_map(params_from_iter(values.iter()), item_from_row)?
        .collect();
    results
}

/// Number of items matching a filter (limit and offset are ignored)
pub fn count_items(conn: &Connection, filter: &ItemFilter) -> DbResult<i64> {
    let (where_sql, values) = filter.where_clause();
    let sql = format!("SELECT COUNT(*){}{}", ITEM_FROM, where_sql);
    conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
}

/// Insert a new item, returning its row id
pub fn insert_item(conn: &Connection, item: &NewItem) -> DbResult<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO items
         (sku, variant_id, brand, model, size, color, condition, box_status,
          current_price, purchase_price, location_id, notes, status,
          ownership_type, consigner_id, split_percentage)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 'available', ?13, ?14, ?15)",
    )?;
    stmt.execute(params![
        &item.sku,
        item.variant_id,
        &item.brand,
        &item.model,
        &item.size,
        &item.color,
        item.condition,
        item.box_status,
        money_to_sql(item.current_price),
        money_to_sql(item.purchase_price),
        item.location_id,
        &item.notes,
        item.ownership_type,
        item.consigner_id,
        item.split_percentage,
    ])?;

    let id = conn.last_insert_rowid();
    log::info!("Inserted item {} (id {})", item.sku, id);
    Ok(id)
}

/// Persist every mutable field of an item
pub fn update_item(conn: &Connection, item: &Item) -> DbResult<()> {
    let mut stmt = conn.prepare_cached(
        "UPDATE items SET
            brand = ?2, model = ?3, size = ?4, color = ?5, condition = ?6, box_status = ?7,
            current_price = ?8, purchase_price = ?9, location_id = ?10, notes = ?11,
            status = ?12, ownership_type = ?13, consigner_id = ?14, split_percentage = ?15,
            sold_price = ?16, sold_platform = ?17, sold_date = ?18, platform_fee = ?19
         WHERE id = ?1",
    )?;
    let updated = stmt.execute(params![
        item.id,
        &item.brand,
        &item.model,
        &item.size,
        &item.color,
        item.condition,
        item.box_status,
        money_to_sql(item.current_price),
        money_to_sql(item.purchase_price),
        item.location_id,
        &item.notes,
        item.status,
        item.ownership_type,
        item.consigner_id,
        item.split_percentage,
        item.sold_price.map(money_to_sql),
        &item.sold_platform,
        item.sold_date,
        item.platform_fee.map(money_to_sql),
    ])?;

    if updated == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }
    log::debug!("Updated item {}", item.sku);
    Ok(())
}

fn query_items<P: rusqlite::Params>(
    conn: &Connection,
    tail: &str,
    params: P,
) -> DbResult<Vec<ItemRecord>> {
    let mut stmt = conn.prepare_cached(&format!("{} {}", ITEM_SELECT, tail))?;
    let results: DbResult<Vec<ItemRecord>> = stmt.query_map(params, item_from_row)?.collect();
    results
}

/// Look up an item by exact SKU (case-insensitive)
pub fn get_item_by_sku(conn: &Connection, sku: &str) -> DbResult<Option<ItemRecord>> {
    let mut items = query_items(
        conn,
        "WHERE upper(i.sku) = upper(?1) ORDER BY i.id LIMIT 1",
        params![sku.trim()],
    )?;
    Ok(items.pop())
}

pub fn get_item(conn: &Connection, id: i64) -> DbResult<Option<ItemRecord>> {
    let mut items = query_items(conn, "WHERE i.id = ?1", params![id])?;
    Ok(items.pop())
}

/// Items with the same brand, model and color (substring match)
pub fn find_similar(
    conn: &Connection,
    brand: &str,
    model: &str,
    color: &str,
) -> DbResult<Vec<ItemRecord>> {
    query_items(
        conn,
        "WHERE i.brand LIKE ?1 AND i.model LIKE ?2 AND i.color LIKE ?3 AND i.status != 'deleted'
         ORDER BY i.sku",
        params![
            format!("%{}%", brand),
            format!("%{}%", model),
            format!("%{}%", color)
        ],
    )
}

/// Items consigned by one consigner, newest first
pub fn items_for_consigner(
    conn: &Connection,
    consigner_id: i64,
    status: Option<ItemStatus>,
) -> DbResult<Vec<ItemRecord>> {
    match status {
        Some(status) => query_items(
            conn,
            "WHERE i.consigner_id = ?1 AND i.status = ?2 ORDER BY i.date_added DESC, i.id DESC",
            params![consigner_id, status],
        ),
        None => query_items(
            conn,
            "WHERE i.consigner_id = ?1 ORDER BY i.date_added DESC, i.id DESC",
            params![consigner_id],
        ),
    }
}

/// Sold consignment items with a recorded sale price
pub fn sold_consignment_items(conn: &Connection) -> DbResult<Vec<ItemRecord>> {
    query_items(
        conn,
        "WHERE i.ownership_type = 'consignment' AND i.status = 'sold'
           AND i.sold_price IS NOT NULL
         ORDER BY i.consigner_id, i.sold_date",
        [],
    )
}

/// Every SKU in the table, deleted items included
pub fn all_skus(conn: &Connection) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT sku FROM items ORDER BY sku")?;
    let results: DbResult<Vec<String>> = stmt.query_map([], |row| row.get(0))?.collect();
    results
}

/// Counts and values across the whole inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryStats {
    pub total_items: i64,
    pub available_items: i64,
    pub sold_items: i64,
    pub held_items: i64,
    pub owned_items: i64,
    pub consignment_items: i64,
    pub available_value: Decimal,
    pub sold_value: Decimal,
    /// Available items per brand
    pub brands: BTreeMap<String, i64>,
}

pub fn inventory_stats(conn: &Connection) -> DbResult<InventoryStats> {
    let mut stats = InventoryStats::default();

    let mut stmt = conn.prepare(
        "SELECT brand, status, ownership_type, current_price, sold_price FROM items",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let brand: String = row.get(0)?;
        let status: ItemStatus = row.get(1)?;
        let ownership: OwnershipType = row.get(2)?;
        let current_price = money_from_row(row, 3)?;
        let sold_price = opt_money_from_row(row, 4)?;

        stats.total_items += 1;
        match ownership {
            OwnershipType::Owned => stats.owned_items += 1,
            OwnershipType::Consignment => stats.consignment_items += 1,
        }
        match status {
            ItemStatus::Available => {
                stats.available_items += 1;
                stats.available_value += current_price;
                *stats.brands.entry(brand).or_insert(0) += 1;
            }
            ItemStatus::Sold => {
                stats.sold_items += 1;
                stats.sold_value += sold_price.unwrap_or_default();
            }
            ItemStatus::Held => stats.held_items += 1,
            ItemStatus::Deleted => {}
        }
    }

    Ok(stats)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::locations::insert_location;
    use crate::database::tests::test_db;
    use crate::models::BoxStatus;
    use rust_decimal_macros::dec;

    pub(crate) fn new_item(sku: &str, brand: &str, size: &str, price: Decimal) -> NewItem {
        NewItem {
            sku: sku.to_string(),
            variant_id: crate::sku::variant_id_of(sku),
            brand: brand.to_string(),
            model: "Air Jordan 1".to_string(),
            size: size.to_string(),
            color: "Chicago".to_string(),
            condition: Condition::Ds,
            box_status: BoxStatus::Box,
            current_price: price,
            purchase_price: dec!(100),
            location_id: None,
            notes: None,
            ownership_type: OwnershipType::Owned,
            consigner_id: None,
            split_percentage: None,
        }
    }

    #[test]
    fn insert_and_get_by_sku() {
        let conn = test_db();
        let loc = insert_location(&conn, "STORE", Some("store"), Some("Floor")).unwrap();
        let mut item = new_item("NIK001", "Nike", "10", dec!(250));
        item.location_id = Some(loc);
        insert_item(&conn, &item).unwrap();

        let record = get_item_by_sku(&conn, "nik001").unwrap().unwrap();
        assert_eq!(record.item.sku, "NIK001");
        assert_eq!(record.item.current_price, dec!(250.00));
        assert_eq!(record.item.status, ItemStatus::Available);
        assert_eq!(record.location_code.as_deref(), Some("STORE"));
        assert!(get_item_by_sku(&conn, "NIK00").unwrap().is_none());
    }

    #[test]
    fn update_item_persists_sale() {
        let conn = test_db();
        let id = insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(250))).unwrap();
        let mut item = get_item(&conn, id).unwrap().unwrap().item;
        item.mark_sold(
            dec!(240),
            Some("ebay".to_string()),
            Some(dec!(30)),
            chrono::Local::now().naive_local(),
        );
        update_item(&conn, &item).unwrap();

        let reloaded = get_item(&conn, id).unwrap().unwrap().item;
        assert_eq!(reloaded.status, ItemStatus::Sold);
        assert_eq!(reloaded.sold_price, Some(dec!(240.00)));
        assert_eq!(reloaded.platform_fee, Some(dec!(30.00)));
        assert!(reloaded.sold_date.is_some());
    }

    #[test]
    fn update_missing_item_fails() {
        let conn = test_db();
        let id = insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(250))).unwrap();
        let mut item = get_item(&conn, id).unwrap().unwrap().item;
        item.id = 999;
        assert!(update_item(&conn, &item).is_err());
    }

    #[test]
    fn search_filters_combine() {
        let conn = test_db();
        insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(250))).unwrap();
        insert_item(&conn, &new_item("NIK001-2", "Nike", "11", dec!(275))).unwrap();
        insert_item(&conn, &new_item("ADI001", "Adidas", "10", dec!(120))).unwrap();

        let all = search_items(&conn, &ItemFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].item.sku, "ADI001");

        let filter = ItemFilter {
            brand: Some("nik".to_string()),
            min_price: Some(dec!(260)),
            ..Default::default()
        };
        let results = search_items(&conn, &filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].item.sku, "NIK001-2");

        let filter = ItemFilter {
            text: Some("adidas".to_string()),
            ..Default::default()
        };
        assert_eq!(count_items(&conn, &filter).unwrap(), 1);

        let filter = ItemFilter {
            size: Some("10".to_string()),
            max_price: Some(dec!(200)),
            ..Default::default()
        };
        assert_eq!(search_items(&conn, &filter).unwrap()[0].item.sku, "ADI001");
    }

    #[test]
    fn search_hides_deleted_by_default() {
        let conn = test_db();
        let id = insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(250))).unwrap();
        let mut item = get_item(&conn, id).unwrap().unwrap().item;
        item.status = ItemStatus::Deleted;
        update_item(&conn, &item).unwrap();

        assert!(search_items(&conn, &ItemFilter::default()).unwrap().is_empty());
        let filter = ItemFilter {
            include_deleted: true,
            ..Default::default()
        };
        assert_eq!(search_items(&conn, &filter).unwrap().len(), 1);
        let filter = ItemFilter {
            status: Some(ItemStatus::Deleted),
            ..Default::default()
        };
        assert_eq!(count_items(&conn, &filter).unwrap(), 1);
    }

    #[test]
    fn search_pagination() {
        let conn = test_db();
        for n in 1..=5 {
            insert_item(&conn, &new_item(&format!("NIK00{}", n), "Nike", "10", dec!(100))).unwrap();
        }
        let filter = ItemFilter {
            limit: Some(2),
            offset: 2,
            ..Default::default()
        };
        let page = search_items(&conn, &filter).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].item.sku, "NIK003");
        assert_eq!(count_items(&conn, &filter).unwrap(), 5);
    }

    #[test]
    fn search_by_location_code() {
        let conn = test_db();
        let loc = insert_location(&conn, "BACK-A1", None, None).unwrap();
        let mut item = new_item("NIK001", "Nike", "10", dec!(250));
        item.location_id = Some(loc);
        insert_item(&conn, &item).unwrap();
        insert_item(&conn, &new_item("NIK002", "Nike", "10", dec!(250))).unwrap();

        let filter = ItemFilter {
            location_code: Some("back".to_string()),
            ..Default::default()
        };
        let results = search_items(&conn, &filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].location_label(), "BACK-A1");
    }

    #[test]
    fn find_similar_matches_brand_model_color() {
        let conn = test_db();
        insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(250))).unwrap();
        insert_item(&conn, &new_item("ADI001", "Adidas", "10", dec!(250))).unwrap();
        let similar = find_similar(&conn, "nike", "jordan", "chicago").unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(all_skus(&conn).unwrap(), vec!["ADI001", "NIK001"]);
    }

    #[test]
    fn inventory_stats_totals() {
        let conn = test_db();
        insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(250))).unwrap();
        insert_item(&conn, &new_item("NIK002", "Nike", "10", dec!(150))).unwrap();
        let id = insert_item(&conn, &new_item("ADI001", "Adidas", "10", dec!(120))).unwrap();
        let mut item = get_item(&conn, id).unwrap().unwrap().item;
        item.mark_sold(dec!(110), None, None, chrono::Local::now().naive_local());
        update_item(&conn, &item).unwrap();

        let stats = inventory_stats(&conn).unwrap();
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.available_items, 2);
        assert_eq!(stats.sold_items, 1);
        assert_eq!(stats.available_value, dec!(400));
        assert_eq!(stats.sold_value, dec!(110));
        assert_eq!(stats.brands.get("Nike"), Some(&2));
        assert!(!stats.brands.contains_key("Adidas"));
    }
}
