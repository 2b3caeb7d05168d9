//! Input validation and normalization
//!
//! Every command runs operator input through these helpers before touching the
//! database. Failures are `InventoryError::Validation` with a readable message.

use crate::error::{InventoryError, Result};
use crate::models::{BoxStatus, Condition, ItemStatus, OwnershipType};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const VALID_SHOE_SIZES: &[&str] = &[
    "3", "3.5", "4", "4.5", "5", "5.5", "6", "6.5", "7", "7.5", "8", "8.5", "9", "9.5", "10",
    "10.5", "11", "11.5", "12", "12.5", "13", "13.5", "14", "14.5", "15", "16", "17", "18", "19",
    "20",
];

pub const VALID_CLOTHING_SIZES: &[&str] = &[
    "XXS", "XS", "S", "M", "L", "XL", "XXL", "XXXL", "4XL", "5XL", "28", "29", "30", "31", "32",
    "33", "34", "35", "36", "38", "40", "42", "44", "46", "48", "50",
];

const MAX_PRICE: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_DIGIT: Regex = Regex::new(r"[^0-9]").unwrap();
    static ref EMAIL: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    static ref LOCATION_CODE: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Which size table a size is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCategory {
    Shoe,
    Clothing,
    Any,
}

impl SizeCategory {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "shoe" | "shoes" | "sneaker" | "sneakers" => SizeCategory::Shoe,
            "clothing" | "apparel" | "shirt" | "pants" | "jacket" => SizeCategory::Clothing,
            _ => SizeCategory::Any,
        }
    }
}

/// Normalize a size: trim, upper-case, fractions to `.5`, no inner whitespace.
pub fn normalize_size(input: &str) -> Result<String> {
    let size = input.trim().to_uppercase();
    if size.is_empty() {
        return Err(InventoryError::validation("Size cannot be empty"));
    }
    let size = size
        .replace('½', ".5")
        .replace(" 1/2", ".5")
        .replace("1/2", ".5");
    Ok(WHITESPACE.replace_all(&size, "").into_owned())
}

pub fn is_valid_size(size: &str, category: SizeCategory) -> bool {
    let Ok(size) = normalize_size(size) else {
        return false;
    };
    let shoe = VALID_SHOE_SIZES.contains(&size.as_str());
    let clothing = VALID_CLOTHING_SIZES.contains(&size.as_str());
    match category {
        SizeCategory::Shoe => shoe,
        SizeCategory::Clothing => clothing,
        SizeCategory::Any => shoe || clothing,
    }
}

/// Normalize and validate a size in one step
pub fn validate_size(input: &str, category: SizeCategory) -> Result<String> {
    let size = normalize_size(input)?;
    if !is_valid_size(&size, category) {
        return Err(InventoryError::validation(format!("Invalid size: {}", input.trim())));
    }
    Ok(size)
}

fn parse_token<T: FromStr>(input: &str, what: &str, choices: String) -> Result<T> {
    input.parse().map_err(|_| {
        InventoryError::validation(format!(
            "Invalid {}: {}. Must be one of: {}",
            what, input, choices
        ))
    })
}

pub fn parse_condition(input: &str) -> Result<Condition> {
    parse_token(input, "condition", Condition::choices())
}

pub fn parse_box_status(input: &str) -> Result<BoxStatus> {
    parse_token(input, "box status", BoxStatus::choices())
}

pub fn parse_item_status(input: &str) -> Result<ItemStatus> {
    parse_token(input, "status", ItemStatus::choices())
}

pub fn parse_ownership_type(input: &str) -> Result<OwnershipType> {
    parse_token(input, "ownership type", OwnershipType::choices())
}

/// Parse a price such as `$1,250.00`. Must be between 0 and 999999.99.
pub fn validate_price(input: &str) -> Result<Decimal> {
    let cleaned = input.trim().replace(['$', ','], "");
    if cleaned.is_empty() {
        return Err(InventoryError::validation("Price cannot be empty"));
    }
    let price = Decimal::from_str(&cleaned)
        .map_err(|_| InventoryError::validation(format!("Invalid price format: {}", input)))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(InventoryError::validation("Price cannot be negative"));
    }
    if price > MAX_PRICE {
        return Err(InventoryError::validation("Price too large"));
    }
    Ok(price)
}

pub fn validate_percentage(value: i64) -> Result<i64> {
    if (0..=100).contains(&value) {
        Ok(value)
    } else {
        Err(InventoryError::validation(format!(
            "Split percentage must be between 0 and 100, got {}",
            value
        )))
    }
}

/// Normalize a US phone number to `(XXX) XXX-XXXX`
pub fn validate_phone(input: &str) -> Result<String> {
    if input.trim().is_empty() {
        return Err(InventoryError::validation("Phone number cannot be empty"));
    }
    let digits = NON_DIGIT.replace_all(input, "");
    let digits = match digits.len() {
        10 => &digits[..],
        11 if digits.starts_with('1') => &digits[1..],
        _ => return Err(InventoryError::validation("Invalid phone number format")),
    };
    Ok(format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]))
}

/// Empty emails are accepted (the field is optional)
pub fn is_valid_email(email: &str) -> bool {
    email.is_empty() || EMAIL.is_match(email)
}

fn validate_name(input: &str, label: &str, max: usize) -> Result<String> {
    let value = input.trim();
    if value.is_empty() {
        return Err(InventoryError::validation(format!("{} name cannot be empty", label)));
    }
    if value.chars().count() > max {
        return Err(InventoryError::validation(format!(
            "{} name too long (max {} characters)",
            label, max
        )));
    }
    Ok(value.to_string())
}

pub fn validate_brand(input: &str) -> Result<String> {
    validate_name(input, "Brand", 100)
}

pub fn validate_model(input: &str) -> Result<String> {
    validate_name(input, "Model", 200)
}

pub fn validate_color(input: &str) -> Result<String> {
    validate_name(input, "Color", 100)
}

/// Location codes: letters, digits, `_` and `-`, at most 50 characters
pub fn validate_location_code(input: &str) -> Result<String> {
    let code = input.trim();
    if code.is_empty() {
        return Err(InventoryError::validation("Location code cannot be empty"));
    }
    if code.len() > 50 {
        return Err(InventoryError::validation(
            "Location code too long (max 50 characters)",
        ));
    }
    if !LOCATION_CODE.is_match(code) {
        return Err(InventoryError::validation(
            "Location code can only contain letters, numbers, hyphens, and underscores",
        ));
    }
    Ok(code.to_uppercase())
}

/// Raw item fields as typed by the operator
#[derive(Debug, Clone, Default)]
pub struct ItemDraft {
    pub brand: String,
    pub model: String,
    pub color: String,
    pub size: String,
    pub category: String,
    pub condition: String,
    pub box_status: String,
    pub current_price: String,
    pub purchase_price: String,
}

/// Collect every problem with a draft instead of stopping at the first
pub fn validation_errors(draft: &ItemDraft) -> Vec<String> {
    let mut errors = Vec::new();

    if let Err(e) = validate_brand(&draft.brand) {
        errors.push(format!("Brand: {}", e));
    }
    if let Err(e) = validate_model(&draft.model) {
        errors.push(format!("Model: {}", e));
    }
    if let Err(e) = validate_color(&draft.color) {
        errors.push(format!("Color: {}", e));
    }
    if !is_valid_size(&draft.size, SizeCategory::from_name(&draft.category)) {
        errors.push(format!("Invalid size: {}", draft.size));
    }
    if draft.condition.parse::<Condition>().is_err() {
        errors.push(format!("Invalid condition: {}", draft.condition));
    }
    if draft.box_status.parse::<BoxStatus>().is_err() {
        errors.push(format!("Invalid box status: {}", draft.box_status));
    }
    if let Err(e) = validate_price(&draft.current_price) {
        errors.push(format!("Current price: {}", e));
    }
    if let Err(e) = validate_price(&draft.purchase_price) {
        errors.push(format!("Purchase price: {}", e));
    }

    errors
}
