//! Error types for streetwear_inventory

use thiserror::Error;

/// Unified error type for inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Input rejected by a validator (bad price, unknown size, ...)
    #[error("{0}")]
    Validation(String),
    /// Lookup miss: unknown SKU, location, consigner or photo
    #[error("{0}")]
    NotFound(String),
    /// More than one consigner matched a name
    #[error("Multiple consigners match '{name}': {candidates}. Please provide a phone number to disambiguate")]
    AmbiguousConsigner { name: String, candidates: String },
    /// No configuration file at the expected path
    #[error("Configuration file not found: {0}. Run 'inv setup' first")]
    ConfigNotFound(String),
    /// Configuration could not be parsed or is incomplete
    #[error("Configuration error: {0}")]
    Config(String),
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Excel error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl InventoryError {
    /// Shorthand for a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        InventoryError::Validation(msg.into())
    }

    /// Shorthand for a lookup miss
    pub fn not_found(msg: impl Into<String>) -> Self {
        InventoryError::NotFound(msg.into())
    }

    /// Errors caused by operator input rather than the environment.
    ///
    /// The CLI reports these without a failing exit status.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            InventoryError::Validation(_)
                | InventoryError::NotFound(_)
                | InventoryError::AmbiguousConsigner { .. }
        )
    }
}

impl From<config::ConfigError> for InventoryError {
    fn from(err: config::ConfigError) -> Self {
        InventoryError::Config(err.to_string())
    }
}

/// Result alias for inventory operations
pub type Result<T> = std::result::Result<T, InventoryError>;
