//! Photo rows
//!
//! The files on disk are authoritative. After every photo operation the rows
//! for the item are rewritten from the directory listing.

use super::DbResult;
use crate::models::Photo;
use rusqlite::{params, Connection, Transaction};

pub fn photos_for_item(conn: &Connection, item_id: i64) -> DbResult<Vec<Photo>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, item_id, file_path, photo_type, display_order, created_date
         FROM photos WHERE item_id = ?1 ORDER BY display_order, id",
    )?;
    let results: DbResult<Vec<Photo>> = stmt
        .query_map(params![item_id], |row| {
            Ok(Photo {
                id: row.get(0)?,
                item_id: row.get(1)?,
                file_path: row.get(2)?,
                photo_type: row.get(3)?,
                display_order: row.get(4)?,
                created_date: row.get(5)?,
            })
        })?
        .collect();
    results
}

/// Replace the photo rows of an item with `file_paths` in display order.
///
/// The first path is recorded as `primary`, the rest as `gallery`.
pub fn sync_item_photos(conn: &mut Connection, item_id: i64, file_paths: &[String]) -> DbResult<usize> {
    let tx = conn.transaction()?;
    let count = sync_item_photos_tx(&tx, item_id, file_paths)?;
    tx.commit()?;
    Ok(count)
}

fn sync_item_photos_tx(tx: &Transaction<'_>, item_id: i64, file_paths: &[String]) -> DbResult<usize> {
    tx.execute("DELETE FROM photos WHERE item_id = ?1", params![item_id])?;

    let mut stmt = tx.prepare_cached(
        "INSERT INTO photos (item_id, file_path, photo_type, display_order)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (idx, path) in file_paths.iter().enumerate() {
        let photo_type = if idx == 0 { "primary" } else { "gallery" };
        stmt.execute(params![item_id, path, photo_type, idx as i64 + 1])?;
    }

    log::debug!("Synced {} photo rows for item {}", file_paths.len(), item_id);
    Ok(file_paths.len())
}

pub fn photo_row_count(conn: &Connection) -> DbResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::items::{insert_item, tests::new_item};
    use crate::database::tests::test_db;
    use rust_decimal_macros::dec;

    #[test]
    fn sync_replaces_rows_in_order() {
        let mut conn = test_db();
        let id = insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(100))).unwrap();

        let paths = vec!["NIK001/a.jpg".to_string(), "NIK001/b.jpg".to_string()];
        assert_eq!(sync_item_photos(&mut conn, id, &paths).unwrap(), 2);
        let photos = photos_for_item(&conn, id).unwrap();
        assert_eq!(photos.len(), 2);
        assert_eq!(photos[0].photo_type.as_deref(), Some("primary"));
        assert_eq!(photos[1].photo_type.as_deref(), Some("gallery"));
        assert_eq!(photos[1].display_order, 2);

        sync_item_photos(&mut conn, id, &paths[1..]).unwrap();
        let photos = photos_for_item(&conn, id).unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].file_path, "NIK001/b.jpg");
        assert_eq!(photo_row_count(&conn).unwrap(), 1);
    }

    #[test]
    fn photos_cascade_with_item() {
        let mut conn = test_db();
        let id = insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(100))).unwrap();
        sync_item_photos(&mut conn, id, &["NIK001/a.jpg".to_string()]).unwrap();
        conn.execute("DELETE FROM items WHERE id = ?1", [id]).unwrap();
        assert_eq!(photo_row_count(&conn).unwrap(), 0);
    }
}
