//! Export and backup commands

use super::{given, Context};
use crate::error::{InventoryError, Result};
use crate::export::{
    backup_filename, consigner_records, consigners_filename, create_backup, inventory_records,
    location_records, locations_filename, template_filename, template_records, write_backup,
    write_records, ExportFormat, InventoryExportOptions,
};
use crate::validation::{parse_condition, parse_item_status, parse_ownership_type};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::path::{Path, PathBuf};

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        InventoryError::validation(format!("Invalid date format: {}. Use YYYY-MM-DD", value))
    })
}

fn output_path(output: &Option<PathBuf>, default_name: String) -> PathBuf {
    output.clone().unwrap_or_else(|| PathBuf::from(default_name))
}

fn report_written(what: &str, count: usize, format: ExportFormat, path: &Path) {
    println!("✅ Exported {} {} to {}", count, what, path.display());
    println!("   Format: {}", format.label());
}

#[derive(Args, Debug)]
pub struct ExportInventoryArgs {
    #[arg(value_enum, default_value = "csv")]
    pub format: ExportFormat,
    /// Output file (defaults to a timestamped name)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub filter_brand: Option<String>,
    /// available, sold, held or deleted
    #[arg(long)]
    pub filter_status: Option<String>,
    /// DS, VNDS or Used
    #[arg(long)]
    pub filter_condition: Option<String>,
    /// Location code
    #[arg(long)]
    pub filter_location: Option<String>,
    /// owned or consignment
    #[arg(long)]
    pub ownership_type: Option<String>,
    /// Add photo count and filenames
    #[arg(long)]
    pub include_photos: bool,
    /// Add consigner name, phone and email
    #[arg(long)]
    pub include_consigner: bool,
    /// Items added on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub date_from: Option<String>,
    /// Items added on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub date_to: Option<String>,
}

impl ExportInventoryArgs {
    fn options(&self) -> Result<InventoryExportOptions> {
        Ok(InventoryExportOptions {
            brand: given(&self.filter_brand).map(str::to_string),
            status: given(&self.filter_status).map(parse_item_status).transpose()?,
            condition: given(&self.filter_condition).map(parse_condition).transpose()?,
            location: given(&self.filter_location).map(str::to_uppercase),
            ownership: given(&self.ownership_type).map(parse_ownership_type).transpose()?,
            date_from: given(&self.date_from).map(parse_date).transpose()?,
            date_to: given(&self.date_to).map(parse_date).transpose()?,
            include_photos: self.include_photos,
            include_consigner: self.include_consigner,
        })
    }
}

pub fn export_inventory(ctx: &Context, args: &ExportInventoryArgs) -> Result<()> {
    let options = args.options()?;
    let now = Local::now().naive_local();
    let path = output_path(&args.output, options.default_filename(args.format, now));

    let photos = ctx.photos();
    let records = inventory_records(
        &ctx.conn,
        &options,
        options.include_photos.then_some(&photos),
    )?;
    if records.is_empty() {
        println!("No items match the export filters.");
        return Ok(());
    }

    write_records(&records, &path, args.format)?;
    report_written("items", records.len(), args.format, &path);
    let filters = options.describe_filters();
    if !filters.is_empty() {
        println!("   Filters: {}", filters.join(", "));
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct ExportConsignersArgs {
    #[arg(value_enum, default_value = "csv")]
    pub format: ExportFormat,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Add item counts, values and payouts
    #[arg(long)]
    pub include_stats: bool,
    /// Add each consigner's items (JSON only)
    #[arg(long)]
    pub include_items: bool,
}

pub fn export_consigners(ctx: &Context, args: &ExportConsignersArgs) -> Result<()> {
    if args.include_items && args.format != ExportFormat::Json {
        return Err(InventoryError::validation(
            "--include-items is only supported for JSON exports",
        ));
    }
    let path = output_path(
        &args.output,
        consigners_filename(args.format, Local::now().naive_local()),
    );

    let records = consigner_records(&ctx.conn, args.include_stats, args.include_items)?;
    if records.is_empty() {
        println!("No consigners to export.");
        return Ok(());
    }
    write_records(&records, &path, args.format)?;
    report_written("consigners", records.len(), args.format, &path);
    Ok(())
}

#[derive(Args, Debug)]
pub struct ExportLocationsArgs {
    #[arg(value_enum, default_value = "csv")]
    pub format: ExportFormat,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Add item counts per location
    #[arg(long)]
    pub include_counts: bool,
}

pub fn export_locations(ctx: &Context, args: &ExportLocationsArgs) -> Result<()> {
    let path = output_path(
        &args.output,
        locations_filename(args.format, Local::now().naive_local()),
    );

    let records = location_records(&ctx.conn, args.include_counts)?;
    if records.is_empty() {
        println!("No locations to export.");
        return Ok(());
    }
    write_records(&records, &path, args.format)?;
    report_written("locations", records.len(), args.format, &path);
    Ok(())
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// gzip the backup
    #[arg(long)]
    pub compress: bool,
    /// Record each item's photo filenames
    #[arg(long)]
    pub include_photos: bool,
}

pub fn backup_database(ctx: &Context, args: &BackupArgs) -> Result<()> {
    let path = output_path(
        &args.output,
        backup_filename(args.compress, Local::now().naive_local()),
    );

    let photos = ctx.photos();
    let backup = create_backup(&ctx.conn, args.include_photos.then_some(&photos))?;
    write_backup(&backup, &path, args.compress)?;

    println!("✅ Backup written to {}", path.display());
    println!("   Items: {}", backup.items.len());
    println!("   Locations: {}", backup.locations.len());
    println!("   Consigners: {}", backup.consigners.len());
    if args.compress {
        println!("   Compressed: gzip");
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// csv or excel
    #[arg(value_enum, default_value = "csv")]
    pub format: ExportFormat,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Fill the template with sample rows
    #[arg(long)]
    pub include_examples: bool,
}

pub fn export_template(args: &TemplateArgs) -> Result<()> {
    if args.format == ExportFormat::Json {
        return Err(InventoryError::validation(
            "Import templates are available as csv or excel",
        ));
    }
    let path = output_path(&args.output, template_filename(args.format));
    let records = template_records(args.include_examples);
    write_records(&records, &path, args.format)?;

    println!("✅ Import template written to {}", path.display());
    if args.include_examples {
        println!("   Includes {} example row(s)", records.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, ItemStatus};

    fn inventory_args() -> ExportInventoryArgs {
        ExportInventoryArgs {
            format: ExportFormat::Csv,
            output: None,
            filter_brand: None,
            filter_status: None,
            filter_condition: None,
            filter_location: None,
            ownership_type: None,
            include_photos: false,
            include_consigner: false,
            date_from: None,
            date_to: None,
        }
    }

    #[test]
    fn inventory_flags_become_options() {
        let mut args = inventory_args();
        args.filter_status = Some("sold".to_string());
        args.filter_condition = Some("DS".to_string());
        args.filter_location = Some("store".to_string());
        args.date_to = Some("2024-03-31".to_string());
        let options = args.options().unwrap();
        assert_eq!(options.status, Some(ItemStatus::Sold));
        assert_eq!(options.condition, Some(Condition::Ds));
        assert_eq!(options.location.as_deref(), Some("STORE"));
        assert_eq!(options.date_to, NaiveDate::from_ymd_opt(2024, 3, 31));
    }

    #[test]
    fn bad_filters_are_user_errors() {
        let mut args = inventory_args();
        args.date_from = Some("03/01/2024".to_string());
        let err = args.options().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid date format: 03/01/2024. Use YYYY-MM-DD"
        );

        let mut args = inventory_args();
        args.filter_status = Some("lost".to_string());
        assert!(args.options().unwrap_err().is_user_error());
    }

    #[test]
    fn json_template_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = TemplateArgs {
            format: ExportFormat::Json,
            output: Some(dir.path().join("t.json")),
            include_examples: false,
        };
        assert!(export_template(&args).is_err());

        let args = TemplateArgs {
            format: ExportFormat::Csv,
            output: Some(dir.path().join("t.csv")),
            include_examples: true,
        };
        export_template(&args).unwrap();
        let text = std::fs::read_to_string(dir.path().join("t.csv")).unwrap();
        assert!(text.lines().count() > 1);
    }
}
