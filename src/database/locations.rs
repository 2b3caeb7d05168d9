//! Location queries

use super::DbResult;
use crate::models::Location;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

const LOCATION_SELECT: &str =
    "SELECT id, code, location_type, description, is_active, created_date FROM locations";

fn location_from_row(row: &Row<'_>) -> DbResult<Location> {
    Ok(Location {
        id: row.get(0)?,
        code: row.get(1)?,
        location_type: row.get(2)?,
        description: row.get(3)?,
        is_active: row.get(4)?,
        created_date: row.get(5)?,
    })
}

/// Insert a location. The code is stored as given; callers upper-case it.
pub fn insert_location(
    conn: &Connection,
    code: &str,
    location_type: Option<&str>,
    description: Option<&str>,
) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO locations (code, location_type, description, is_active)
         VALUES (?1, ?2, ?3, 1)",
        params![code, location_type, description],
    )?;
    log::info!("Created location {}", code);
    Ok(conn.last_insert_rowid())
}

/// Look up a location by code regardless of its active flag
pub fn get_location_by_code(conn: &Connection, code: &str) -> DbResult<Option<Location>> {
    let mut stmt = conn.prepare_cached(&format!(
        "{} WHERE code = upper(?1) COLLATE NOCASE",
        LOCATION_SELECT
    ))?;
    let mut rows = stmt.query(params![code.trim()])?;
    match rows.next()? {
        Some(row) => Ok(Some(location_from_row(row)?)),
        None => Ok(None),
    }
}

/// Look up an active location by code
pub fn get_active_location(conn: &Connection, code: &str) -> DbResult<Option<Location>> {
    Ok(get_location_by_code(conn, code)?.filter(|l| l.is_active))
}

pub fn get_location(conn: &Connection, id: i64) -> DbResult<Option<Location>> {
    let mut stmt = conn.prepare_cached(&format!("{} WHERE id = ?1", LOCATION_SELECT))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(location_from_row(row)?)),
        None => Ok(None),
    }
}

/// All locations ordered by code, optionally including inactive ones
pub fn list_locations(conn: &Connection, include_inactive: bool) -> DbResult<Vec<Location>> {
    let sql = if include_inactive {
        format!("{} ORDER BY code", LOCATION_SELECT)
    } else {
        format!("{} WHERE is_active = 1 ORDER BY code", LOCATION_SELECT)
    };
    let mut stmt = conn.prepare_cached(&sql)?;
    let results: DbResult<Vec<Location>> = stmt.query_map([], location_from_row)?.collect();
    results
}

/// Persist type, description and active flag
pub fn update_location(conn: &Connection, location: &Location) -> DbResult<()> {
    let updated = conn.execute(
        "UPDATE locations SET location_type = ?2, description = ?3, is_active = ?4 WHERE id = ?1",
        params![
            location.id,
            &location.location_type,
            &location.description,
            location.is_active
        ],
    )?;
    if updated == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }
    Ok(())
}

/// Case-insensitive substring search over code, description and type
pub fn search_locations(conn: &Connection, term: &str) -> DbResult<Vec<Location>> {
    let mut stmt = conn.prepare_cached(&format!(
        "{} WHERE code LIKE ?1 OR description LIKE ?1 OR location_type LIKE ?1 ORDER BY code",
        LOCATION_SELECT
    ))?;
    let results: DbResult<Vec<Location>> = stmt
        .query_map(params![format!("%{}%", term.trim())], location_from_row)?
        .collect();
    results
}

/// Item counts for one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCount {
    pub id: i64,
    pub code: String,
    pub location_type: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    /// Items at the location, excluding deleted ones
    pub item_count: i64,
    pub available_count: i64,
}

/// Per-location item counts, ordered by code
pub fn location_counts(conn: &Connection, include_inactive: bool) -> DbResult<Vec<LocationCount>> {
    let mut stmt = conn.prepare_cached(
        "SELECT l.id, l.code, l.location_type, l.description, l.is_active,
                COUNT(CASE WHEN i.status != 'deleted' THEN i.id END),
                COUNT(CASE WHEN i.status = 'available' THEN i.id END)
         FROM locations l
         LEFT JOIN items i ON i.location_id = l.id
         WHERE l.is_active = 1 OR ?1
         GROUP BY l.id
         ORDER BY l.code",
    )?;
    let results: DbResult<Vec<LocationCount>> = stmt
        .query_map(params![include_inactive], |row| {
            Ok(LocationCount {
                id: row.get(0)?,
                code: row.get(1)?,
                location_type: row.get(2)?,
                description: row.get(3)?,
                is_active: row.get(4)?,
                item_count: row.get(5)?,
                available_count: row.get(6)?,
            })
        })?
        .collect();
    results
}

/// Point an item at a new location
pub fn set_item_location(conn: &Connection, item_id: i64, location_id: i64) -> DbResult<()> {
    let updated = conn.execute(
        "UPDATE items SET location_id = ?2 WHERE id = ?1",
        params![item_id, location_id],
    )?;
    if updated == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::items::{insert_item, tests::new_item};
    use crate::database::tests::test_db;
    use rust_decimal_macros::dec;

    #[test]
    fn insert_and_lookup_is_case_insensitive() {
        let conn = test_db();
        insert_location(&conn, "STORE-A1", Some("store"), Some("Front wall")).unwrap();
        let loc = get_location_by_code(&conn, "store-a1").unwrap().unwrap();
        assert_eq!(loc.code, "STORE-A1");
        assert!(loc.is_active);
        assert_eq!(loc.description.as_deref(), Some("Front wall"));
    }

    #[test]
    fn duplicate_code_is_rejected_by_schema() {
        let conn = test_db();
        insert_location(&conn, "STORE", None, None).unwrap();
        assert!(insert_location(&conn, "STORE", None, None).is_err());
    }

    #[test]
    fn inactive_locations_are_hidden() {
        let conn = test_db();
        insert_location(&conn, "A", None, None).unwrap();
        insert_location(&conn, "B", None, None).unwrap();
        let mut b = get_location_by_code(&conn, "B").unwrap().unwrap();
        b.is_active = false;
        update_location(&conn, &b).unwrap();

        assert_eq!(list_locations(&conn, false).unwrap().len(), 1);
        assert_eq!(list_locations(&conn, true).unwrap().len(), 2);
        assert!(get_active_location(&conn, "B").unwrap().is_none());
        assert!(get_location_by_code(&conn, "B").unwrap().is_some());
    }

    #[test]
    fn search_matches_description_and_type() {
        let conn = test_db();
        insert_location(&conn, "WH-1", Some("warehouse"), Some("Rack one")).unwrap();
        insert_location(&conn, "ST-1", Some("store"), Some("Front")).unwrap();
        assert_eq!(search_locations(&conn, "rack").unwrap().len(), 1);
        assert_eq!(search_locations(&conn, "STORE").unwrap()[0].code, "ST-1");
        assert!(search_locations(&conn, "nothing").unwrap().is_empty());
    }

    #[test]
    fn counts_per_location() {
        let conn = test_db();
        let a = insert_location(&conn, "A", None, None).unwrap();
        insert_location(&conn, "B", None, None).unwrap();
        let mut item = new_item("NIK001", "Nike", "10", dec!(100));
        item.location_id = Some(a);
        insert_item(&conn, &item).unwrap();
        let mut item = new_item("NIK002", "Nike", "10", dec!(100));
        item.location_id = Some(a);
        let id = insert_item(&conn, &item).unwrap();
        conn.execute("UPDATE items SET status = 'sold' WHERE id = ?1", [id])
            .unwrap();

        let counts = location_counts(&conn, false).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].code, "A");
        assert_eq!(counts[0].item_count, 2);
        assert_eq!(counts[0].available_count, 1);
        assert_eq!(counts[1].item_count, 0);
    }

    #[test]
    fn set_item_location_moves() {
        let conn = test_db();
        let a = insert_location(&conn, "A", None, None).unwrap();
        let id = insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(100))).unwrap();
        set_item_location(&conn, id, a).unwrap();
        let loc: Option<i64> = conn
            .query_row("SELECT location_id FROM items WHERE id = ?1", [id], |r| r.get(0))
            .unwrap();
        assert_eq!(loc, Some(a));
        assert!(set_item_location(&conn, 999, a).is_err());
    }
}
