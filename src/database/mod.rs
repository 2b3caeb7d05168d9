//! Database operations for the inventory store
//!
//! Uses parameterized queries exclusively (no SQL string concatenation of values).
//! Money is stored as TEXT with two decimal places and parsed back into `Decimal`.

pub mod consigners;
pub mod items;
pub mod locations;
pub mod photos;

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

/// Result type for database operations
pub type DbResult<T> = rusqlite::Result<T>;

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `locations`: storage spots, soft-deleted through `is_active`
/// - `consigners`: people who leave items on consignment (phone is unique)
/// - `items`: every SKU ever issued; rows are never deleted
/// - `photos`: files under the photo root, mirrored per item
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            location_type TEXT,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS consigners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone TEXT NOT NULL UNIQUE,
            email TEXT,
            default_split_percentage INTEGER NOT NULL DEFAULT 70,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- SKU uniqueness is maintained by the generator, not by a constraint
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sku TEXT NOT NULL,
            variant_id INTEGER NOT NULL DEFAULT 1,
            brand TEXT NOT NULL,
            model TEXT NOT NULL,
            size TEXT NOT NULL,
            color TEXT NOT NULL,
            condition TEXT NOT NULL,
            box_status TEXT NOT NULL,
            current_price TEXT NOT NULL,
            purchase_price TEXT NOT NULL,
            location_id INTEGER REFERENCES locations(id),
            date_added TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            notes TEXT,
            status TEXT NOT NULL DEFAULT 'available',
            ownership_type TEXT NOT NULL DEFAULT 'owned',
            consigner_id INTEGER REFERENCES consigners(id),
            split_percentage INTEGER,
            sold_price TEXT,
            sold_platform TEXT,
            sold_date TEXT,
            platform_fee TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_items_sku ON items(sku);
        CREATE INDEX IF NOT EXISTS idx_items_brand ON items(brand);
        CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
        CREATE INDEX IF NOT EXISTS idx_items_consigner ON items(consigner_id);

        CREATE TABLE IF NOT EXISTS photos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            file_path TEXT NOT NULL,
            photo_type TEXT,
            display_order INTEGER NOT NULL DEFAULT 1,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_photos_item ON photos(item_id);
        ",
    )?;

    log::debug!("Database schema initialized");
    Ok(())
}

/// Open (creating if needed) the database file and make sure the schema exists
pub fn open(path: &Path) -> DbResult<Connection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    log::debug!("Opened database: {}", path.display());
    Ok(conn)
}

/// Cheap round trip used by `test-connection`
pub fn ping(conn: &Connection) -> DbResult<()> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

/// Row counts per table, in schema order
pub fn table_counts(conn: &Connection) -> DbResult<Vec<(&'static str, i64)>> {
    ["items", "locations", "consigners", "photos"]
        .into_iter()
        .map(|table| {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            conn.query_row(&sql, [], |row| row.get(0))
                .map(|count| (table, count))
        })
        .collect()
}

/// Canonical storage form for money: two decimal places
pub(crate) fn money_to_sql(value: Decimal) -> String {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value.to_string()
}

fn parse_money(idx: usize, text: &str) -> DbResult<Decimal> {
    Decimal::from_str(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn money_from_row(row: &Row<'_>, idx: usize) -> DbResult<Decimal> {
    let text: String = row.get(idx)?;
    parse_money(idx, &text)
}

pub(crate) fn opt_money_from_row(row: &Row<'_>, idx: usize) -> DbResult<Option<Decimal>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_money(idx, &t)).transpose()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// Create an in-memory database for testing
    pub(crate) fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn init_schema_creates_tables() {
        let conn = test_db();
        for table in ["items", "locations", "consigners", "photos"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn init_schema_is_idempotent() {
        let conn = test_db();
        init_schema(&conn).unwrap();
        assert!(table_counts(&conn).unwrap().iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn open_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("inv.db");
        let conn = open(&path).unwrap();
        ping(&conn).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn money_is_stored_with_two_places() {
        assert_eq!(money_to_sql(dec!(250)), "250.00");
        assert_eq!(money_to_sql(dec!(12.5)), "12.50");
        assert_eq!(money_to_sql(dec!(9.999)), "10.00");
    }

    #[test]
    fn money_parse_failure_is_conversion_error() {
        let conn = test_db();
        let result: DbResult<Decimal> = conn.query_row("SELECT 'abc'", [], |row| money_from_row(row, 0));
        assert!(matches!(
            result,
            Err(rusqlite::Error::FromSqlConversionFailure(0, Type::Text, _))
        ));
    }
}
