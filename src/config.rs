//! YAML configuration
//!
//! `config.yaml` in the working directory holds the database URL, the brand
//! prefix map, intake defaults, the photo storage root and the API bind address.
//! Any value can be overridden from the environment, e.g. `INV__DATABASE__URL`.

use crate::error::{InventoryError, Result};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name, resolved against the working directory
pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Location code used when `add` is called without `--location`
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_split")]
    pub consignment_split: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotosConfig {
    pub storage_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub brand_prefixes: BTreeMap<String, String>,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub photos: PhotosConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_split() -> i64 {
    70
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:///streetwear_inventory.db".to_string(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            consignment_split: default_split(),
        }
    }
}

impl Default for PhotosConfig {
    fn default() -> Self {
        Self {
            storage_path: "./photos".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let brand_prefixes = [("nike", "NIK"), ("adidas", "ADI"), ("supreme", "SUP")]
            .into_iter()
            .map(|(brand, prefix)| (brand.to_string(), prefix.to_string()))
            .collect();

        Self {
            database: DatabaseConfig::default(),
            brand_prefixes,
            defaults: DefaultsConfig::default(),
            photos: PhotosConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Load the YAML file at `path`, layering `INV__*` environment overrides on top.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InventoryError::ConfigNotFound(path.display().to_string()));
        }

        let settings = config::Config::builder()
            .set_default("defaults.consignment_split", default_split())?
            .set_default("photos.storage_path", "./photos")?
            .set_default("api.host", "127.0.0.1")?
            .set_default("api.port", 5000)?
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(Environment::with_prefix("INV").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration back out as YAML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        log::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Filesystem path of the SQLite database named by `database.url`.
    ///
    /// Accepts `sqlite:///relative.db`, `sqlite:////abs/path.db` and bare paths.
    pub fn database_path(&self) -> PathBuf {
        let url = self.database.url.trim();
        let path = url
            .strip_prefix("sqlite:///")
            .or_else(|| url.strip_prefix("sqlite://"))
            .unwrap_or(url);
        PathBuf::from(path)
    }

    /// Configured prefix for a brand (brand keys are matched case-insensitively)
    pub fn brand_prefix(&self, brand: &str) -> Option<String> {
        let key = brand.trim().to_lowercase();
        self.brand_prefixes
            .iter()
            .find(|(name, _)| name.to_lowercase() == key)
            .map(|(_, prefix)| prefix.to_uppercase())
    }

    /// Default location code, if one is configured
    pub fn default_location(&self) -> Option<&str> {
        let code = self.defaults.location.trim();
        (!code.is_empty()).then_some(code)
    }

    /// Semantic checks on an already-parsed configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.database.url.trim().is_empty() {
            errors.push("Empty database field: url".to_string());
        }
        for (brand, prefix) in &self.brand_prefixes {
            if prefix.chars().count() != 3 {
                errors.push(format!(
                    "Brand prefix for '{}' must be exactly 3 characters",
                    brand
                ));
            }
        }
        if !(0..=100).contains(&self.defaults.consignment_split) {
            errors.push("consignment_split must be an integer between 0 and 100".to_string());
        }
        if self.photos.storage_path.trim().is_empty() {
            errors.push("Missing photos.storage_path field".to_string());
        }

        errors
    }
}

/// Validate a configuration file on disk, returning every problem found.
///
/// Checks the raw YAML structure first so that missing sections are reported
/// even though the typed loader would fill them with defaults.
pub fn validate_config_file(path: &Path) -> Vec<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => return vec![format!("Failed to load config file: {}", e)],
    };
    let value: serde_yaml::Value = match serde_yaml::from_str(&raw) {
        Ok(value) => value,
        Err(e) => return vec![format!("Invalid YAML configuration: {}", e)],
    };

    let mut errors = Vec::new();
    let Some(root) = value.as_mapping() else {
        return vec!["Configuration root must be a mapping".to_string()];
    };

    for section in ["database", "brand_prefixes", "defaults", "photos"] {
        match root.get(section) {
            None => errors.push(format!("Missing required section: {}", section)),
            Some(v) if !v.is_mapping() => {
                errors.push(format!("{} section must be a dictionary", section))
            }
            Some(_) => {}
        }
    }
    if let Some(db) = root.get("database").and_then(|v| v.as_mapping()) {
        if db.get("url").is_none() {
            errors.push("Missing database field: url".to_string());
        }
    }
    if let Some(photos) = root.get("photos").and_then(|v| v.as_mapping()) {
        if photos.get("storage_path").is_none() {
            errors.push("Missing photos.storage_path field".to_string());
        }
    }
    if !errors.is_empty() {
        return errors;
    }

    match serde_yaml::from_value::<Config>(value) {
        Ok(config) => config.validate(),
        Err(e) => vec![format!("Invalid configuration: {}", e)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.defaults.consignment_split, 70);
        assert_eq!(config.brand_prefix("Nike").as_deref(), Some("NIK"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(&dir.path().join("nope.yaml"));
        assert!(matches!(result, Err(InventoryError::ConfigNotFound(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = Config::default();
        config.defaults.location = "STORE".to_string();
        config
            .brand_prefixes
            .insert("jordan".to_string(), "JOR".to_string());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.default_location(), Some("STORE"));
        assert_eq!(loaded.brand_prefix("JORDAN").as_deref(), Some("JOR"));
        assert_eq!(loaded.api.port, 5000);
    }

    #[test]
    fn test_load_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "database:\n  url: sqlite:///inv.db\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.defaults.consignment_split, 70);
        assert_eq!(config.photos.storage_path, "./photos");
        assert!(config.brand_prefixes.is_empty());
        assert_eq!(config.default_location(), None);
    }

    #[test]
    fn test_database_path() {
        let mut config = Config::default();
        assert_eq!(
            config.database_path(),
            PathBuf::from("streetwear_inventory.db")
        );
        config.database.url = "sqlite:////var/lib/inv.db".to_string();
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/inv.db"));
        config.database.url = "data/inv.db".to_string();
        assert_eq!(config.database_path(), PathBuf::from("data/inv.db"));
    }

    #[test]
    fn test_validate_bad_values() {
        let mut config = Config::default();
        config
            .brand_prefixes
            .insert("jordan".to_string(), "JO".to_string());
        config.defaults.consignment_split = 120;
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("'jordan'"));
    }

    #[test]
    fn test_validate_config_file_missing_sections() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "database:\n  url: sqlite:///inv.db\n");
        let errors = validate_config_file(&path);
        assert!(errors.contains(&"Missing required section: brand_prefixes".to_string()));
        assert!(errors.contains(&"Missing required section: photos".to_string()));
    }

    #[test]
    fn test_validate_config_file_ok() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        Config::default().save(&path).unwrap();
        assert!(validate_config_file(&path).is_empty());
    }
}
