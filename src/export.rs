//! CSV, JSON and Excel exports plus full JSON backups
//!
//! Every export is built as a list of flat JSON objects first; the writers only
//! decide how to lay those records out. Nested values (photo lists, consigner
//! items) are written to CSV and Excel cells as compact JSON.

use crate::consignment::consigner_stats;
use crate::database::consigners::{get_consigner, list_consigners};
use crate::database::items::{items_for_consigner, search_items, ItemFilter, ItemRecord};
use crate::database::locations::{get_location_by_code, location_counts, list_locations};
use crate::error::{InventoryError, Result};
use crate::models::{Condition, Consigner, ItemStatus, OwnershipType};
use crate::photos::PhotoManager;
use chrono::{Local, NaiveDate, NaiveDateTime};
use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::Connection;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One exported row, keys in column order
pub type Record = Map<String, Value>;

pub const BACKUP_VERSION: &str = "1.0.0";

/// Excel columns never grow wider than this
const MAX_COLUMN_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
    Excel,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Excel => "xlsx",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
            ExportFormat::Excel => "EXCEL",
        }
    }
}

fn timestamp(now: NaiveDateTime) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Filters and extra columns for an inventory export
#[derive(Debug, Clone, Default)]
pub struct InventoryExportOptions {
    pub brand: Option<String>,
    pub status: Option<ItemStatus>,
    pub condition: Option<Condition>,
    pub location: Option<String>,
    pub ownership: Option<OwnershipType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub include_photos: bool,
    pub include_consigner: bool,
}

impl InventoryExportOptions {
    /// `inventory_export[_brand_x][_status_y][_type_z]_<timestamp>.<ext>`
    pub fn default_filename(&self, format: ExportFormat, now: NaiveDateTime) -> String {
        let mut parts = Vec::new();
        if let Some(brand) = &self.brand {
            parts.push(format!("brand_{}", brand));
        }
        if let Some(status) = self.status {
            parts.push(format!("status_{}", status));
        }
        if let Some(ownership) = self.ownership {
            parts.push(format!("type_{}", ownership));
        }
        let filters = if parts.is_empty() {
            String::new()
        } else {
            format!("_{}", parts.join("_"))
        };
        format!(
            "inventory_export{}_{}.{}",
            filters,
            timestamp(now),
            format.extension()
        )
    }

    /// Human-readable list of the active filters
    pub fn describe_filters(&self) -> Vec<String> {
        let mut applied = Vec::new();
        if let Some(brand) = &self.brand {
            applied.push(format!("brand={}", brand));
        }
        if let Some(status) = self.status {
            applied.push(format!("status={}", status));
        }
        if let Some(condition) = self.condition {
            applied.push(format!("condition={}", condition));
        }
        if let Some(location) = &self.location {
            applied.push(format!("location={}", location));
        }
        if let Some(ownership) = self.ownership {
            applied.push(format!("ownership={}", ownership));
        }
        if let Some(from) = self.date_from {
            applied.push(format!("from={}", from));
        }
        if let Some(to) = self.date_to {
            applied.push(format!("to={}", to));
        }
        applied
    }

    fn filter(&self, conn: &Connection) -> Result<ItemFilter> {
        let location_id = match &self.location {
            Some(code) => Some(
                get_location_by_code(conn, code)?
                    .ok_or_else(|| {
                        InventoryError::not_found(format!("Location '{}' not found", code))
                    })?
                    .id,
            ),
            None => None,
        };
        Ok(ItemFilter {
            brand: self.brand.clone(),
            status: self.status,
            include_deleted: true,
            condition: self.condition,
            location_id,
            ownership: self.ownership,
            added_after: self.date_from,
            added_before: self.date_to,
            ..Default::default()
        })
    }
}

pub fn consigners_filename(format: ExportFormat, now: NaiveDateTime) -> String {
    format!("consigners_export_{}.{}", timestamp(now), format.extension())
}

pub fn locations_filename(format: ExportFormat, now: NaiveDateTime) -> String {
    format!("locations_export_{}.{}", timestamp(now), format.extension())
}

pub fn backup_filename(compress: bool, now: NaiveDateTime) -> String {
    let name = format!("streetwear_inventory_backup_{}.json", timestamp(now));
    if compress {
        format!("{}.gz", name)
    } else {
        name
    }
}

pub fn template_filename(format: ExportFormat) -> String {
    format!("import_template.{}", format.extension())
}

/// Caches consigner lookups while building item rows
struct ConsignerCache<'a> {
    conn: &'a Connection,
    seen: HashMap<i64, Option<Consigner>>,
}

impl<'a> ConsignerCache<'a> {
    fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            seen: HashMap::new(),
        }
    }

    fn get(&mut self, id: i64) -> Result<Option<&Consigner>> {
        if !self.seen.contains_key(&id) {
            let consigner = get_consigner(self.conn, id)?;
            self.seen.insert(id, consigner);
        }
        Ok(self.seen.get(&id).and_then(|c| c.as_ref()))
    }
}

fn item_record(
    record: &ItemRecord,
    consigners: Option<&mut ConsignerCache<'_>>,
    photos: Option<&PhotoManager>,
) -> Result<Record> {
    let item = &record.item;
    let mut row = object(json!({
        "sku": item.sku,
        "variant_id": item.variant_id,
        "brand": item.brand,
        "model": item.model,
        "size": item.size,
        "color": item.color,
        "condition": item.condition,
        "box_status": item.box_status,
        "current_price": item.current_price,
        "purchase_price": item.purchase_price,
        "sold_price": item.sold_price,
        "sold_platform": item.sold_platform,
        "platform_fee": item.platform_fee,
        "location_code": record.location_code,
        "location_name": record.location_description,
        "status": item.status,
        "ownership_type": item.ownership_type,
        "notes": item.notes,
        "date_added": item.date_added,
        "sold_date": item.sold_date,
        "split_percentage": item.split_percentage,
    }));

    if let (Some(cache), Some(id)) = (consigners, item.consigner_id) {
        if let Some(consigner) = cache.get(id)? {
            row.insert("consigner_name".into(), json!(consigner.name));
            row.insert("consigner_phone".into(), json!(consigner.phone));
            row.insert("consigner_email".into(), json!(consigner.email));
        }
    }

    if let Some(manager) = photos {
        let names = manager.photo_filenames(&item.sku)?;
        row.insert("photo_count".into(), json!(names.len()));
        row.insert("primary_photo".into(), json!(names.first()));
        row.insert("all_photos".into(), json!(names));
    }

    Ok(row)
}

/// Inventory rows matching `options`, ordered by SKU
pub fn inventory_records(
    conn: &Connection,
    options: &InventoryExportOptions,
    photos: Option<&PhotoManager>,
) -> Result<Vec<Record>> {
    let filter = options.filter(conn)?;
    let mut cache = ConsignerCache::new(conn);

    search_items(conn, &filter)?
        .iter()
        .map(|record| {
            let consigners = options.include_consigner.then_some(&mut cache);
            item_record(record, consigners, photos)
        })
        .collect()
}

pub fn consigner_records(
    conn: &Connection,
    include_stats: bool,
    include_items: bool,
) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for consigner in list_consigners(conn)? {
        let mut row = consigner_row(&consigner);

        if include_stats {
            let stats = consigner_stats(conn, consigner.id)?;
            row.extend(object(json!({
                "total_items": stats.total_items,
                "available_items": stats.available_items,
                "sold_items": stats.sold_items,
                "held_items": stats.held_items,
                "total_current_value": stats.total_current_value,
                "total_sold_value": stats.total_sold_value,
                "total_payouts": stats.total_payouts,
            })));
        }

        if include_items {
            let items: Vec<Value> = items_for_consigner(conn, consigner.id, None)?
                .iter()
                .map(|r| {
                    json!({
                        "sku": r.item.sku,
                        "brand": r.item.brand,
                        "model": r.item.model,
                        "size": r.item.size,
                        "condition": r.item.condition,
                        "current_price": r.item.current_price,
                        "status": r.item.status,
                        "date_added": r.item.date_added,
                    })
                })
                .collect();
            row.insert("items".into(), Value::Array(items));
        }

        records.push(row);
    }
    Ok(records)
}

fn consigner_row(consigner: &Consigner) -> Record {
    object(json!({
        "id": consigner.id,
        "name": consigner.name,
        "phone": consigner.phone,
        "email": consigner.email,
        "default_split_percentage": consigner.default_split_percentage,
        "created_date": consigner.created_date,
    }))
}

/// Every location, inactive ones included
pub fn location_records(conn: &Connection, include_counts: bool) -> Result<Vec<Record>> {
    let counts: HashMap<i64, (i64, i64)> = if include_counts {
        location_counts(conn, true)?
            .into_iter()
            .map(|c| (c.id, (c.item_count, c.available_count)))
            .collect()
    } else {
        HashMap::new()
    };

    Ok(list_locations(conn, true)?
        .into_iter()
        .map(|location| {
            let mut row = object(json!({
                "id": location.id,
                "code": location.code,
                "type": location.location_type,
                "name": location.description,
                "is_active": location.is_active,
                "created_date": location.created_date,
            }));
            if include_counts {
                let (total, available) = counts.get(&location.id).copied().unwrap_or((0, 0));
                row.insert("total_items".into(), json!(total));
                row.insert("available_items".into(), json!(available));
            }
            row
        })
        .collect())
}

/// Columns of the import template, optionally with one example row filled in
pub fn template_records(include_examples: bool) -> Vec<Record> {
    let example = [
        ("sku", "NIK001"),
        ("brand", "nike"),
        ("model", "air jordan 1"),
        ("size", "10"),
        ("color", "chicago"),
        ("condition", "DS"),
        ("box_status", "box"),
        ("current_price", "250.00"),
        ("purchase_price", "200.00"),
        ("location_code", "STORE-01"),
        ("status", "available"),
        ("ownership_type", "owned"),
        ("notes", "Example item"),
        ("consigner_name", ""),
        ("consigner_phone", ""),
        ("split_percentage", ""),
    ];
    let row = example
        .iter()
        .map(|(column, value)| {
            let value = if include_examples { *value } else { "" };
            (column.to_string(), json!(value))
        })
        .collect();
    vec![row]
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupMetadata {
    pub created_at: NaiveDateTime,
    pub version: String,
    pub includes_photos: bool,
}

/// Complete dump of items, locations and consigners
#[derive(Debug, Clone, Serialize)]
pub struct Backup {
    pub metadata: BackupMetadata,
    pub items: Vec<Record>,
    pub locations: Vec<Record>,
    pub consigners: Vec<Record>,
}

pub fn create_backup(conn: &Connection, photos: Option<&PhotoManager>) -> Result<Backup> {
    let options = InventoryExportOptions {
        include_consigner: true,
        include_photos: photos.is_some(),
        ..Default::default()
    };
    Ok(Backup {
        metadata: BackupMetadata {
            created_at: Local::now().naive_local(),
            version: BACKUP_VERSION.to_string(),
            includes_photos: photos.is_some(),
        },
        items: inventory_records(conn, &options, photos)?,
        locations: location_records(conn, false)?,
        consigners: list_consigners(conn)?.iter().map(consigner_row).collect(),
    })
}

/// Write a backup as pretty JSON, gzip-compressed on request
pub fn write_backup(backup: &Backup, path: &Path, compress: bool) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    if compress {
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer_pretty(&mut encoder, backup)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        serde_json::to_writer_pretty(&mut file, backup)?;
        file.flush()?;
    }
    log::info!("Wrote backup to {}", path.display());
    Ok(())
}

/// Text for a CSV or Excel cell
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

/// Union of all keys, in order of first appearance
fn columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

pub fn write_records(records: &[Record], path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Csv => write_csv(records, path),
        ExportFormat::Json => write_json(records, path),
        ExportFormat::Excel => write_excel(records, path),
    }?;
    log::info!("Exported {} records to {}", records.len(), path.display());
    Ok(())
}

pub fn write_csv(records: &[Record], path: &Path) -> Result<()> {
    let columns = columns(records);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(
            columns
                .iter()
                .map(|c| record.get(c).map(cell_text).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// `{exported_at, total_records, data}`
pub fn write_json(records: &[Record], path: &Path) -> Result<()> {
    let envelope = json!({
        "exported_at": Local::now().naive_local(),
        "total_records": records.len(),
        "data": records,
    });
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, &envelope)?;
    file.flush()?;
    Ok(())
}

pub fn write_excel(records: &[Record], path: &Path) -> Result<()> {
    let columns = columns(records);
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Data")?;

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header)?;
    }
    for (row, record) in records.iter().enumerate() {
        let row = row as u32 + 1;
        for (col, name) in columns.iter().enumerate() {
            let value = record.get(name).unwrap_or(&Value::Null);
            let text = match value {
                Value::Number(n) => match n.as_f64() {
                    Some(number) => {
                        worksheet.write_number(row, col as u16, number)?;
                        n.to_string()
                    }
                    None => String::new(),
                },
                Value::Null => String::new(),
                other => {
                    let text = cell_text(other);
                    worksheet.write_string(row, col as u16, &text)?;
                    text
                }
            };
            widths[col] = widths[col].max(text.chars().count());
        }
    }
    for (col, width) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, ((*width + 2).min(MAX_COLUMN_WIDTH)) as f64)?;
    }

    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consignment::{find_or_create_consigner, record_consignment_sale};
    use crate::database::items::{insert_item, tests::new_item};
    use crate::database::locations::insert_location;
    use crate::database::tests::test_db;
    use flate2::read::GzDecoder;
    use rust_decimal_macros::dec;
    use std::io::Read;
    use tempfile::TempDir;

    fn seeded() -> Connection {
        let conn = test_db();
        let loc = insert_location(&conn, "STORE", Some("store"), Some("Front")).unwrap();
        let mut item = new_item("NIK001", "Nike", "10", dec!(250));
        item.location_id = Some(loc);
        insert_item(&conn, &item).unwrap();
        insert_item(&conn, &new_item("ADI001", "Adidas", "9", dec!(120))).unwrap();

        let consigner = find_or_create_consigner(&conn, "Mike", Some("5551234567"), None, 70)
            .unwrap()
            .consigner;
        let mut item = new_item("SUP001", "Supreme", "L", dec!(100));
        item.ownership_type = OwnershipType::Consignment;
        item.consigner_id = Some(consigner.id);
        insert_item(&conn, &item).unwrap();
        conn
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn default_filenames() {
        let now = at("2024-03-05 14:30:00");
        let options = InventoryExportOptions {
            brand: Some("nike".to_string()),
            status: Some(ItemStatus::Available),
            ..Default::default()
        };
        assert_eq!(
            options.default_filename(ExportFormat::Csv, now),
            "inventory_export_brand_nike_status_available_20240305_143000.csv"
        );
        assert_eq!(
            InventoryExportOptions::default().default_filename(ExportFormat::Excel, now),
            "inventory_export_20240305_143000.xlsx"
        );
        assert_eq!(
            backup_filename(true, now),
            "streetwear_inventory_backup_20240305_143000.json.gz"
        );
        assert_eq!(consigners_filename(ExportFormat::Json, now), "consigners_export_20240305_143000.json");
        assert_eq!(template_filename(ExportFormat::Csv), "import_template.csv");
    }

    #[test]
    fn inventory_records_apply_filters() {
        let conn = seeded();
        let all = inventory_records(&conn, &InventoryExportOptions::default(), None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0]["sku"], "ADI001");
        assert_eq!(all[1]["location_code"], "STORE");
        assert_eq!(all[1]["current_price"], "250.00");
        assert!(!all[2].contains_key("consigner_name"));

        let options = InventoryExportOptions {
            location: Some("store".to_string()),
            ..Default::default()
        };
        assert_eq!(inventory_records(&conn, &options, None).unwrap().len(), 1);

        let options = InventoryExportOptions {
            ownership: Some(OwnershipType::Consignment),
            include_consigner: true,
            ..Default::default()
        };
        let rows = inventory_records(&conn, &options, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["consigner_name"], "Mike");
        assert_eq!(rows[0]["consigner_phone"], "(555) 123-4567");

        let options = InventoryExportOptions {
            location: Some("NOWHERE".to_string()),
            ..Default::default()
        };
        assert!(inventory_records(&conn, &options, None).is_err());
    }

    #[test]
    fn photo_columns() {
        let conn = seeded();
        let dir = TempDir::new().unwrap();
        let manager = PhotoManager::new(dir.path());
        let item_dir = manager.create_item_dir("NIK001").unwrap();
        image::RgbImage::new(2, 2).save(item_dir.join("a.png")).unwrap();

        let options = InventoryExportOptions {
            brand: Some("nike".to_string()),
            include_photos: true,
            ..Default::default()
        };
        let rows = inventory_records(&conn, &options, Some(&manager)).unwrap();
        assert_eq!(rows[0]["photo_count"], 1);
        assert_eq!(rows[0]["primary_photo"], "a.png");
        assert_eq!(rows[0]["all_photos"], json!(["a.png"]));
    }

    #[test]
    fn csv_flattens_nested_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            object(json!({"sku": "NIK001", "photos": ["a.png", "b.png"], "notes": null})),
            object(json!({"sku": "ADI001", "extra": 3})),
        ];
        write_csv(&records, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["sku", "photos", "notes", "extra"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][1], r#"["a.png","b.png"]"#);
        assert_eq!(&rows[0][2], "");
        assert_eq!(&rows[1][3], "3");
    }

    #[test]
    fn json_uses_envelope() {
        let conn = seeded();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let records = location_records(&conn, true).unwrap();
        write_records(&records, &path, ExportFormat::Json).unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_records"], 1);
        assert!(value["exported_at"].is_string());
        assert_eq!(value["data"][0]["code"], "STORE");
        assert_eq!(value["data"][0]["total_items"], 1);
    }

    #[test]
    fn excel_file_is_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.xlsx");
        write_records(&template_records(true), &path, ExportFormat::Excel).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        // xlsx is a zip archive
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn consigner_records_with_stats() {
        let conn = seeded();
        record_consignment_sale(&conn, "SUP001", dec!(100), "store", Some(dec!(10)), None).unwrap();
        let rows = consigner_records(&conn, true, true).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["sold_items"], 1);
        assert_eq!(rows[0]["total_payouts"], "63.00");
        assert_eq!(rows[0]["items"][0]["sku"], "SUP001");
    }

    #[test]
    fn template_is_blank_without_examples() {
        let blank = template_records(false);
        assert_eq!(blank.len(), 1);
        assert!(blank[0].values().all(|v| v == ""));
        assert_eq!(template_records(true)[0]["condition"], "DS");
        assert_eq!(blank[0].keys().next().map(String::as_str), Some("sku"));
    }

    #[test]
    fn compressed_backup_round_trips() {
        let conn = seeded();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.json.gz");
        let backup = create_backup(&conn, None).unwrap();
        assert_eq!(backup.items.len(), 3);
        write_backup(&backup, &path, true).unwrap();

        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["metadata"]["version"], BACKUP_VERSION);
        assert_eq!(value["metadata"]["includes_photos"], false);
        assert_eq!(value["consigners"][0]["name"], "Mike");
        assert_eq!(value["locations"][0]["code"], "STORE");
    }
}
