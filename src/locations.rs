//! Storage location management
//!
//! Locations are never removed; deactivated ones stay in the table so that
//! items keep pointing at them.

use crate::config::Config;
use crate::database::items::get_item_by_sku;
use crate::database::locations::{
    get_active_location, get_location_by_code, insert_location, list_locations,
    set_item_location, update_location as store_location,
};
use crate::error::{InventoryError, Result};
use crate::models::Location;
use crate::validation::validate_location_code;
use rusqlite::Connection;

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Create an active location. The code is stored upper-case.
pub fn create_location(
    conn: &Connection,
    code: &str,
    location_type: Option<&str>,
    description: Option<&str>,
) -> Result<Location> {
    let code = validate_location_code(code)?;
    if get_location_by_code(conn, &code)?.is_some() {
        return Err(InventoryError::validation(format!(
            "Location with code '{}' already exists",
            code
        )));
    }

    insert_location(conn, &code, clean(location_type), clean(description))?;
    get_location_by_code(conn, &code)?
        .ok_or_else(|| InventoryError::not_found(format!("Location '{}' not found", code)))
}

/// Fields that can change on an existing location
#[derive(Debug, Clone, Default)]
pub struct LocationUpdate {
    pub location_type: Option<String>,
    pub description: Option<String>,
    pub activate: bool,
}

impl LocationUpdate {
    pub fn is_empty(&self) -> bool {
        self.location_type.is_none() && self.description.is_none() && !self.activate
    }
}

pub fn update_location(conn: &Connection, code: &str, update: &LocationUpdate) -> Result<Location> {
    if update.is_empty() {
        return Err(InventoryError::validation("No updates specified"));
    }
    let mut location = find_location(conn, code)?;

    if let Some(location_type) = &update.location_type {
        location.location_type = clean(Some(location_type)).map(str::to_string);
    }
    if let Some(description) = &update.description {
        location.description = clean(Some(description)).map(str::to_string);
    }
    if update.activate {
        location.is_active = true;
    }

    store_location(conn, &location)?;
    log::info!("Updated location {}", location.code);
    Ok(location)
}

/// Soft-delete a location
pub fn deactivate_location(conn: &Connection, code: &str) -> Result<Location> {
    let mut location = find_location(conn, code)?;
    location.is_active = false;
    store_location(conn, &location)?;
    log::info!("Deactivated location {}", location.code);
    Ok(location)
}

/// Any location by code, active or not
pub fn find_location(conn: &Connection, code: &str) -> Result<Location> {
    get_location_by_code(conn, code)?.ok_or_else(|| {
        InventoryError::not_found(format!("Location '{}' not found", code.trim().to_uppercase()))
    })
}

/// Active location by code; inactive and unknown codes are both misses
pub fn resolve_active_location(conn: &Connection, code: &str) -> Result<Location> {
    get_active_location(conn, code)?.ok_or_else(|| {
        InventoryError::not_found(format!(
            "Location '{}' not found or inactive",
            code.trim().to_uppercase()
        ))
    })
}

/// Configured default location, if it names an active location
pub fn default_location(conn: &Connection, config: &Config) -> Result<Option<Location>> {
    match config.default_location() {
        Some(code) => Ok(get_active_location(conn, code)?),
        None => Ok(None),
    }
}

/// Location for a new item: the explicit code, else the configured default.
///
/// With neither available the error lists the active locations to pick from.
pub fn location_for_new_item(
    conn: &Connection,
    config: &Config,
    code: Option<&str>,
) -> Result<Location> {
    if let Some(code) = clean(code) {
        return resolve_active_location(conn, code);
    }
    if let Some(location) = default_location(conn, config)? {
        return Ok(location);
    }

    let active = list_locations(conn, false)?;
    if active.is_empty() {
        return Err(InventoryError::validation(
            "No active locations found. Create one with 'inv location create'",
        ));
    }
    let codes = active
        .iter()
        .map(|l| l.code.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Err(InventoryError::validation(format!(
        "No location given and no default configured. Active locations: {}",
        codes
    )))
}

/// Move an item to an active location. Returns the previous location code.
pub fn move_item(conn: &Connection, sku: &str, code: &str) -> Result<(Option<String>, Location)> {
    let record = get_item_by_sku(conn, sku)?
        .ok_or_else(|| InventoryError::not_found(format!("Item with SKU '{}' not found", sku)))?;
    let location = resolve_active_location(conn, code)?;

    set_item_location(conn, record.item.id, location.id)?;
    log::info!("Moved {} to {}", record.item.sku, location.code);
    Ok((record.location_code, location))
}

fn squash(value: &str, len: usize) -> String {
    value
        .to_uppercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .take(len)
        .collect()
}

/// Suggest an unused code from a location type and optional description.
///
/// `("store", "front wall")` gives `STOR-FRO`, then `STOR-FRO-01` once taken.
pub fn suggest_location_code(
    conn: &Connection,
    location_type: &str,
    description: Option<&str>,
) -> Result<String> {
    let location_type = clean(Some(location_type)).unwrap_or("GENERAL");
    let mut base = squash(location_type, 4);
    if let Some(description) = clean(description) {
        base = format!("{}-{}", base, squash(description, 3));
    }

    let mut suggestion = base.clone();
    let mut counter = 1;
    while get_location_by_code(conn, &suggestion)?.is_some() {
        suggestion = format!("{}-{:02}", base, counter);
        counter += 1;
    }
    Ok(suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::items::{insert_item, tests::new_item};
    use crate::database::tests::test_db;
    use rust_decimal_macros::dec;

    #[test]
    fn create_uppercases_and_rejects_duplicates() {
        let conn = test_db();
        let loc = create_location(&conn, " store-a ", Some("store"), Some("")).unwrap();
        assert_eq!(loc.code, "STORE-A");
        assert!(loc.description.is_none());

        let err = create_location(&conn, "Store-A", None, None).unwrap_err();
        assert_eq!(err.to_string(), "Location with code 'STORE-A' already exists");
        assert!(create_location(&conn, "bad code!", None, None).is_err());
    }

    #[test]
    fn update_and_reactivate() {
        let conn = test_db();
        create_location(&conn, "WH-1", Some("warehouse"), None).unwrap();
        deactivate_location(&conn, "wh-1").unwrap();
        assert!(resolve_active_location(&conn, "WH-1").is_err());

        let update = LocationUpdate {
            description: Some("Back room".to_string()),
            activate: true,
            ..Default::default()
        };
        let loc = update_location(&conn, "WH-1", &update).unwrap();
        assert!(loc.is_active);
        assert_eq!(loc.description.as_deref(), Some("Back room"));
        assert_eq!(loc.location_type.as_deref(), Some("warehouse"));

        assert!(update_location(&conn, "WH-1", &LocationUpdate::default()).is_err());
        assert!(update_location(&conn, "NOPE", &update).is_err());
    }

    #[test]
    fn move_item_requires_active_location() {
        let conn = test_db();
        let a = create_location(&conn, "A", None, None).unwrap();
        create_location(&conn, "B", None, None).unwrap();
        let mut item = new_item("NIK001", "Nike", "10", dec!(100));
        item.location_id = Some(a.id);
        insert_item(&conn, &item).unwrap();

        let (from, to) = move_item(&conn, "nik001", "b").unwrap();
        assert_eq!(from.as_deref(), Some("A"));
        assert_eq!(to.code, "B");

        deactivate_location(&conn, "A").unwrap();
        assert!(move_item(&conn, "NIK001", "A").is_err());
        assert!(move_item(&conn, "NIK999", "B").is_err());
    }

    #[test]
    fn suggestions_are_unique() {
        let conn = test_db();
        assert_eq!(
            suggest_location_code(&conn, "store", Some("front wall")).unwrap(),
            "STOR-FRO"
        );
        assert_eq!(suggest_location_code(&conn, "", None).unwrap(), "GENE");
        assert_eq!(suggest_location_code(&conn, "back-room", None).unwrap(), "BACK");

        create_location(&conn, "STOR-FRO", None, None).unwrap();
        create_location(&conn, "STOR-FRO-01", None, None).unwrap();
        assert_eq!(
            suggest_location_code(&conn, "Store", Some("Front")).unwrap(),
            "STOR-FRO-02"
        );
    }

    #[test]
    fn new_item_location_falls_back_to_default() {
        let conn = test_db();
        let mut config = Config::default();
        let err = location_for_new_item(&conn, &config, None).unwrap_err();
        assert!(err.to_string().contains("No active locations"));

        create_location(&conn, "STORE", None, None).unwrap();
        let err = location_for_new_item(&conn, &config, None).unwrap_err();
        assert!(err.to_string().contains("Active locations: STORE"));

        config.defaults.location = "store".to_string();
        assert_eq!(location_for_new_item(&conn, &config, None).unwrap().code, "STORE");
        assert!(location_for_new_item(&conn, &config, Some("MISSING")).is_err());
    }
}
