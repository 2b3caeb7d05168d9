//! Command-line interface
//!
//! One clap subcommand per operation. Every command except `setup`,
//! `validate-config`, `remove-exif`, `api-docs` and `generate-api-client` loads
//! the configuration and opens the database through [`Context`].

pub mod api;
pub mod consign;
pub mod export;
pub mod items;
pub mod location;
pub mod photos;
pub mod setup;

use crate::config::{Config, CONFIG_FILE};
use crate::database;
use crate::database::items::{get_item_by_sku, ItemRecord};
use crate::error::{InventoryError, Result};
use crate::photos::PhotoManager;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Streetwear inventory management
#[derive(Parser, Debug)]
#[command(name = "inv")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a configuration file and create the database
    Setup(setup::SetupArgs),
    /// Test the database connection
    TestConnection,
    /// Validate the configuration file
    ValidateConfig,

    /// Add a new item to inventory
    Add(items::AddArgs),
    /// Add a size variant of an existing item
    AddVariant(items::AddVariantArgs),
    /// Manage storage locations
    #[command(subcommand)]
    Location(location::LocationCommand),
    /// Update an existing location
    UpdateLocation(location::UpdateLocationArgs),
    /// Find locations by code, type or description
    FindLocation(location::FindLocationArgs),
    /// Search inventory items
    Search(items::SearchArgs),
    /// Show everything about one item
    Show(items::ShowArgs),
    /// Edit an existing item
    Edit(items::EditArgs),
    /// Quick status change for an item
    UpdateStatus(items::UpdateStatusArgs),
    /// Move an item to another location
    Move(items::MoveArgs),

    /// Take in a consignment item
    Intake(consign::IntakeArgs),
    /// List consigners
    ListConsigners(consign::ListConsignersArgs),
    /// Detailed report for one consigner
    ConsignerReport(consign::ConsignerLookupArgs),
    /// Change a consigner's contact details or default split
    UpdateConsigner(consign::UpdateConsignerArgs),
    /// Payout report for one consigner
    Consign(consign::ConsignArgs),
    /// Mark a consignment item sold and work out the payout
    ConsignSold(consign::ConsignSoldArgs),
    /// Payouts owed across all consigners
    PayoutSummary(consign::PayoutSummaryArgs),
    /// Put a consignment item on hold or release it
    HoldItem(consign::HoldItemArgs),

    /// Add a photo to an item
    AddPhoto(photos::AddPhotoArgs),
    /// List an item's photos
    ListPhotos(photos::ListPhotosArgs),
    /// Remove a photo from an item
    RemovePhoto(photos::PhotoFileArgs),
    /// Make a photo the item's primary photo
    SetPrimaryPhoto(photos::PhotoFileArgs),
    /// Copy photos from one item to another
    CopyPhotos(photos::CopyPhotosArgs),
    /// Photo storage statistics
    PhotoStats(photos::PhotoStatsArgs),
    /// Re-encode photos to save space
    OptimizePhotos(photos::OptimizePhotosArgs),
    /// Find duplicate photo files by content
    FindDuplicatePhotos(photos::FindDuplicatesArgs),
    /// Strip EXIF metadata from an image file
    RemoveExif(photos::RemoveExifArgs),
    /// Add every matching photo in a directory to an item
    BulkAddPhotos(photos::BulkAddPhotosArgs),

    /// Run the REST API server
    ApiServer(api::ServerArgs),
    /// Exercise a running API server
    ApiTest(api::TestArgs),
    /// Print API documentation
    ApiDocs,
    /// Generate API client code
    GenerateApiClient(api::ClientArgs),

    /// Export inventory items
    ExportInventory(export::ExportInventoryArgs),
    /// Export consigners
    ExportConsigners(export::ExportConsignersArgs),
    /// Export locations
    ExportLocations(export::ExportLocationsArgs),
    /// Write a full JSON backup
    BackupDatabase(export::BackupArgs),
    /// Write an import template
    ExportTemplate(export::TemplateArgs),
}

/// Loaded configuration plus an open database connection
pub struct Context {
    pub config_path: PathBuf,
    pub config: Config,
    pub conn: Connection,
}

impl Context {
    pub fn open(config_path: &Path) -> Result<Self> {
        let config = Config::load(config_path)?;
        let conn = open_database(&config)?;
        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
            conn,
        })
    }

    pub fn photos(&self) -> PhotoManager {
        PhotoManager::new(&self.config.photos.storage_path)
    }

    /// Look up an item by SKU, failing with a user error when it is missing
    pub fn item(&self, sku: &str) -> Result<ItemRecord> {
        get_item_by_sku(&self.conn, sku)?
            .ok_or_else(|| InventoryError::not_found(format!("Item with SKU '{}' not found", sku)))
    }
}

/// Open the configured database, creating its parent directory when needed
pub fn open_database(config: &Config) -> Result<Connection> {
    let path = config.database_path();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            log::info!("Created directory: {}", parent.display());
        }
    }
    Ok(database::open(&path)?)
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_path();

    match cli.command {
        Command::Setup(args) => return setup::setup(config_path, &args),
        Command::TestConnection => return setup::test_connection(config_path),
        Command::ValidateConfig => return setup::validate_config(config_path),
        Command::RemoveExif(args) => return photos::remove_exif(&args),
        Command::ApiDocs => {
            api::docs();
            return Ok(());
        }
        Command::GenerateApiClient(args) => return api::generate_client(&args),
        Command::ApiTest(args) => {
            // The server address comes from the config when one is present
            let config = Config::load(config_path).unwrap_or_default();
            return api::test(&config, &args).await;
        }
        _ => {}
    }

    let mut ctx = Context::open(config_path)?;
    match cli.command {
        Command::Add(args) => items::add(&ctx, &args),
        Command::AddVariant(args) => items::add_variant(&ctx, &args),
        Command::Location(cmd) => location::run(&ctx, &cmd),
        Command::UpdateLocation(args) => location::update(&ctx, &args),
        Command::FindLocation(args) => location::find(&ctx, &args),
        Command::Search(args) => items::search(&ctx, &args),
        Command::Show(args) => items::show(&ctx, &args),
        Command::Edit(args) => items::edit(&ctx, &args),
        Command::UpdateStatus(args) => items::update_status(&ctx, &args),
        Command::Move(args) => items::move_item(&ctx, &args),

        Command::Intake(args) => consign::intake(&ctx, &args),
        Command::ListConsigners(args) => consign::list_consigners(&ctx, &args),
        Command::ConsignerReport(args) => consign::consigner_report(&ctx, &args),
        Command::UpdateConsigner(args) => consign::update_consigner(&ctx, &args),
        Command::Consign(args) => consign::consign(&ctx, &args),
        Command::ConsignSold(args) => consign::consign_sold(&ctx, &args),
        Command::PayoutSummary(args) => consign::payout_summary(&ctx, &args),
        Command::HoldItem(args) => consign::hold_item(&ctx, &args),

        Command::AddPhoto(args) => photos::add_photo(&mut ctx, &args),
        Command::ListPhotos(args) => photos::list_photos(&ctx, &args),
        Command::RemovePhoto(args) => photos::remove_photo(&mut ctx, &args),
        Command::SetPrimaryPhoto(args) => photos::set_primary_photo(&mut ctx, &args),
        Command::CopyPhotos(args) => photos::copy_photos(&mut ctx, &args),
        Command::PhotoStats(args) => photos::photo_stats(&ctx, &args),
        Command::OptimizePhotos(args) => photos::optimize_photos(&ctx, &args),
        Command::FindDuplicatePhotos(args) => photos::find_duplicate_photos(&ctx, &args),
        Command::BulkAddPhotos(args) => photos::bulk_add_photos(&mut ctx, &args),

        Command::ApiServer(args) => api::server(ctx, &args).await,

        Command::ExportInventory(args) => export::export_inventory(&ctx, &args),
        Command::ExportConsigners(args) => export::export_consigners(&ctx, &args),
        Command::ExportLocations(args) => export::export_locations(&ctx, &args),
        Command::BackupDatabase(args) => export::backup_database(&ctx, &args),
        Command::ExportTemplate(args) => export::export_template(&args),

        Command::Setup(_)
        | Command::TestConnection
        | Command::ValidateConfig
        | Command::RemoveExif(_)
        | Command::ApiDocs
        | Command::GenerateApiClient(_)
        | Command::ApiTest(_) => Ok(()),
    }
}

/// Horizontal rule used between report sections
pub(crate) fn rule(width: usize) -> String {
    "-".repeat(width)
}

/// Empty strings count as "not given"
pub(crate) fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["inv", "test-connection", "--config", "other.yaml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert!(matches!(cli.command, Command::TestConnection));
    }

    #[test]
    fn location_subcommands_parse() {
        let cli = Cli::try_parse_from([
            "inv", "location", "create", "--code", "store-a", "--type", "store",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Location(location::LocationCommand::Create(_))
        ));
    }
}
