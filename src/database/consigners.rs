//! Consigner queries

use super::DbResult;
use crate::models::Consigner;
use rusqlite::{params, Connection, Row};

const CONSIGNER_SELECT: &str =
    "SELECT id, name, phone, email, default_split_percentage, created_date FROM consigners";

fn consigner_from_row(row: &Row<'_>) -> DbResult<Consigner> {
    Ok(Consigner {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        default_split_percentage: row.get(4)?,
        created_date: row.get(5)?,
    })
}

fn query_consigners<P: rusqlite::Params>(
    conn: &Connection,
    tail: &str,
    params: P,
) -> DbResult<Vec<Consigner>> {
    let mut stmt = conn.prepare_cached(&format!("{} {}", CONSIGNER_SELECT, tail))?;
    let results: DbResult<Vec<Consigner>> = stmt.query_map(params, consigner_from_row)?.collect();
    results
}

/// Insert a consigner. `phone` must already be normalized.
pub fn insert_consigner(
    conn: &Connection,
    name: &str,
    phone: &str,
    email: Option<&str>,
    default_split: i64,
) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO consigners (name, phone, email, default_split_percentage)
         VALUES (?1, ?2, ?3, ?4)",
        params![name, phone, email, default_split],
    )?;
    log::info!("Created consigner {} ({})", name, phone);
    Ok(conn.last_insert_rowid())
}

pub fn get_consigner(conn: &Connection, id: i64) -> DbResult<Option<Consigner>> {
    Ok(query_consigners(conn, "WHERE id = ?1", params![id])?.pop())
}

/// Exact match on the normalized phone number
pub fn get_consigner_by_phone(conn: &Connection, phone: &str) -> DbResult<Option<Consigner>> {
    Ok(query_consigners(conn, "WHERE phone = ?1", params![phone])?.pop())
}

/// Case-insensitive substring match on name
pub fn find_consigners_by_name(conn: &Connection, name: &str) -> DbResult<Vec<Consigner>> {
    query_consigners(
        conn,
        "WHERE name LIKE ?1 ORDER BY name, id",
        params![format!("%{}%", name.trim())],
    )
}

/// Substring match across name, phone and email
pub fn search_consigners(conn: &Connection, term: &str) -> DbResult<Vec<Consigner>> {
    query_consigners(
        conn,
        "WHERE name LIKE ?1 OR phone LIKE ?1 OR email LIKE ?1 ORDER BY name, id",
        params![format!("%{}%", term.trim())],
    )
}

pub fn list_consigners(conn: &Connection) -> DbResult<Vec<Consigner>> {
    query_consigners(conn, "ORDER BY name, id", [])
}

pub fn update_consigner(conn: &Connection, consigner: &Consigner) -> DbResult<()> {
    let updated = conn.execute(
        "UPDATE consigners SET name = ?2, phone = ?3, email = ?4, default_split_percentage = ?5
         WHERE id = ?1",
        params![
            consigner.id,
            &consigner.name,
            &consigner.phone,
            &consigner.email,
            consigner.default_split_percentage
        ],
    )?;
    if updated == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }
    Ok(())
}
