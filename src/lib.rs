//! Streetwear Inventory
//!
//! Tracks owned and consignment stock for a small streetwear shop: SKU
//! issuance, pricing and payouts, storage locations, per-item photo
//! directories, exports and a JSON REST API, all backed by SQLite.

pub mod commands;
pub mod config;
pub mod consignment;
pub mod database;
pub mod error;
pub mod export;
pub mod locations;
pub mod models;
pub mod photos;
pub mod pricing;
pub mod sku;
pub mod validation;
pub mod web;

pub use config::Config;
pub use error::{InventoryError, Result};
pub use models::{BoxStatus, Condition, Consigner, Item, ItemStatus, Location, OwnershipType};
