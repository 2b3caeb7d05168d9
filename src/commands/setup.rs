//! `setup`, `test-connection` and `validate-config`

use super::open_database;
use crate::config::{validate_config_file, Config};
use crate::database::{ping, table_counts};
use crate::error::{InventoryError, Result};
use crate::validation::validate_percentage;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Database URL
    #[arg(long, default_value = "sqlite:///streetwear_inventory.db")]
    pub database_url: String,

    /// Location code used when `add` is called without one
    #[arg(long)]
    pub default_location: Option<String>,

    /// Default consignment split percentage
    #[arg(long, default_value_t = 70)]
    pub split: i64,

    /// Extra brand prefix as BRAND=PRE (repeatable)
    #[arg(long = "brand", value_name = "BRAND=PRE")]
    pub brands: Vec<String>,

    /// Photo storage directory
    #[arg(long, default_value = "./photos")]
    pub photos_path: String,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Parse `brand=PRE`; the prefix must be three characters
fn parse_brand_prefix(entry: &str) -> Option<(String, String)> {
    let (brand, prefix) = entry.split_once('=')?;
    let brand = brand.trim().to_lowercase();
    let prefix = prefix.trim().to_uppercase();
    (!brand.is_empty() && prefix.chars().count() == 3).then_some((brand, prefix))
}

pub fn setup(config_path: &Path, args: &SetupArgs) -> Result<()> {
    println!("🔧 Streetwear Inventory CLI Setup");
    println!("{}", "=".repeat(50));

    if config_path.exists() && !args.force {
        return Err(InventoryError::validation(format!(
            "Configuration file {} already exists. Use --force to overwrite",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.database.url = args.database_url.trim().to_string();
    if let Some(location) = args.default_location.as_deref() {
        config.defaults.location = location.trim().to_uppercase();
    }
    config.defaults.consignment_split = validate_percentage(args.split)?;
    config.photos.storage_path = args.photos_path.clone();
    for entry in &args.brands {
        match parse_brand_prefix(entry) {
            Some((brand, prefix)) => {
                config.brand_prefixes.insert(brand, prefix);
            }
            None => println!("Warning: '{}' is not BRAND=PRE with a 3-letter prefix. Skipping.", entry),
        }
    }

    config.save(config_path)?;
    println!("\n✅ Configuration saved to {}", config_path.display());

    println!("\n🔌 Creating database...");
    let conn = open_database(&config)?;
    ping(&conn)?;
    println!("✅ Database ready: {}", config.database_path().display());

    std::fs::create_dir_all(&config.photos.storage_path)?;
    println!("✅ Photos directory created: {}", config.photos.storage_path);

    println!("\n🎉 Setup complete! You can now use the inventory CLI.");
    println!("Try: inv test-connection");
    Ok(())
}

pub fn test_connection(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let conn = open_database(&config)?;
    ping(&conn)?;

    println!("✅ Database connection successful");
    for (table, count) in table_counts(&conn)? {
        println!("   {}: {}", table, count);
    }
    Ok(())
}

pub fn validate_config(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        return Err(InventoryError::ConfigNotFound(
            config_path.display().to_string(),
        ));
    }

    println!("🔍 Validating configuration: {}", config_path.display());
    let errors = validate_config_file(config_path);
    if !errors.is_empty() {
        println!("❌ Configuration errors found:");
        for error in &errors {
            println!("  • {}", error);
        }
        return Err(InventoryError::Config(format!(
            "{} problem(s) in {}",
            errors.len(),
            config_path.display()
        )));
    }

    println!("✅ Configuration is valid!");
    let config = Config::load(config_path)?;
    println!("\n📋 Current Configuration:");
    println!("  Database: {}", config.database.url);
    println!("  Photo Storage: {}", config.photos.storage_path);
    println!("  Default Split: {}%", config.defaults.consignment_split);
    println!("  Brand Prefixes: {} configured", config.brand_prefixes.len());
    if let Some(location) = config.default_location() {
        println!("  Default Location: {}", location);
    }

    println!("\n🔌 Testing database connection...");
    match open_database(&config).and_then(|conn| Ok(ping(&conn)?)) {
        Ok(()) => println!("✅ Database connection successful"),
        Err(e) => println!("⚠️  Database connection error: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_prefix_entries() {
        assert_eq!(
            parse_brand_prefix("Jordan=jor"),
            Some(("jordan".to_string(), "JOR".to_string()))
        );
        assert_eq!(parse_brand_prefix("bape=BA"), None);
        assert_eq!(parse_brand_prefix("stussy"), None);
        assert_eq!(parse_brand_prefix("=STU"), None);
    }
}
