//! SKU generation
//!
//! A SKU is a three character brand prefix plus a zero-padded three digit
//! counter (`NIK001`). Size variants of the same product append `-N`
//! (`NIK001-2`). Prefixes come from the configured brand map, then from SKUs
//! already issued for the brand, and are otherwise derived from the brand name
//! with phonetic and numeric collision handling.
//!
//! Issuance is not locked: two concurrent invocations can pick the same number.

use crate::config::Config;
use crate::database::DbResult;
use crate::error::{InventoryError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{params, Connection};
use std::collections::HashSet;

/// Highest counter a prefix can issue
pub const MAX_SKU_NUMBER: u32 = 999;

lazy_static! {
    static ref SKU_FORMAT: Regex = Regex::new(r"^[A-Z][A-Z0-9]{2}\d{3}(?:-\d+)?$").unwrap();
}

/// Phonetic substitutions tried, in order, for each letter of a colliding prefix
fn substitutions(c: char) -> &'static [char] {
    match c {
        'A' => &['E', 'I', 'O', 'U'],
        'E' => &['A', 'I', 'O', 'U'],
        'I' => &['A', 'E', 'O', 'U'],
        'O' => &['A', 'E', 'I', 'U'],
        'U' => &['A', 'E', 'I', 'O'],
        'B' => &['P', 'V'],
        'C' => &['K', 'S'],
        'D' => &['T'],
        'F' => &['V', 'P'],
        'G' => &['K', 'J'],
        'J' => &['G', 'Y'],
        'K' => &['C', 'G'],
        'P' => &['B', 'F'],
        'S' => &['C', 'Z'],
        'T' => &['D'],
        'V' => &['B', 'F'],
        'Y' => &['J'],
        'Z' => &['S'],
        _ => &[],
    }
}

/// Derive a three letter prefix from the letters of a brand name.
///
/// Short names repeat their last letter (`LV` becomes `LVV`); names without
/// any letters become `UNK`.
pub fn generate_prefix_from_name(brand: &str) -> String {
    let letters: Vec<char> = brand
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase())
        .collect();

    match letters.last() {
        None => "UNK".to_string(),
        Some(&last) => {
            let mut prefix: String = letters.iter().take(3).collect();
            while prefix.len() < 3 {
                prefix.push(last);
            }
            prefix
        }
    }
}

/// Single-letter substitutions of `prefix`, position by position
pub fn phonetic_variants(prefix: &str) -> Vec<String> {
    let chars: Vec<char> = prefix.chars().collect();
    if chars.len() != 3 {
        return Vec::new();
    }

    let mut variants = Vec::new();
    for pos in 0..3 {
        for &replacement in substitutions(chars[pos]) {
            let mut variant = chars.clone();
            variant[pos] = replacement;
            variants.push(variant.into_iter().collect());
        }
    }
    variants
}

/// First prefix not in `used`: the base itself, a phonetic variant, then numeric fallbacks
pub fn find_available_prefix(base: &str, used: &HashSet<String>) -> Option<String> {
    if !used.contains(base) {
        return Some(base.to_string());
    }

    if let Some(variant) = phonetic_variants(base)
        .into_iter()
        .find(|v| !used.contains(v))
    {
        return Some(variant);
    }

    let head2: String = base.chars().take(2).collect();
    let head1: String = base.chars().take(1).collect();
    (1..=9)
        .map(|n| format!("{}{}", head2, n))
        .chain((10..=99).map(|n| format!("{}{:02}", head1, n)))
        .find(|candidate| !used.contains(candidate))
}

/// Prefix already issued to this brand, taken from its oldest SKU
fn existing_prefix_for_brand(conn: &Connection, brand: &str) -> DbResult<Option<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT substr(sku, 1, 3) FROM items WHERE lower(brand) = lower(?1) ORDER BY id LIMIT 1",
    )?;
    let mut rows = stmt.query(params![brand.trim()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

/// Prefixes of SKUs issued to any other brand
fn prefixes_of_other_brands(conn: &Connection, brand: &str) -> DbResult<HashSet<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT upper(substr(sku, 1, 3)) FROM items WHERE lower(brand) != lower(?1)",
    )?;
    let rows = stmt.query_map(params![brand.trim()], |row| row.get(0))?;
    rows.collect()
}

/// Resolve the SKU prefix for a brand.
///
/// The same brand always maps to the same prefix once it has been issued, and
/// a derived prefix never collides with a configured one or another brand's.
pub fn brand_prefix(conn: &Connection, config: &Config, brand: &str) -> Result<String> {
    if let Some(prefix) = config.brand_prefix(brand) {
        return Ok(prefix);
    }

    if let Some(prefix) = existing_prefix_for_brand(conn, brand)? {
        return Ok(prefix.to_uppercase());
    }

    let mut used = prefixes_of_other_brands(conn, brand)?;
    used.extend(config.brand_prefixes.values().map(|p| p.to_uppercase()));

    let base = generate_prefix_from_name(brand);
    let prefix = find_available_prefix(&base, &used).ok_or_else(|| {
        InventoryError::validation(format!("No SKU prefix available for brand '{}'", brand))
    })?;

    if prefix != base {
        log::info!(
            "Prefix {} is taken, using {} for brand '{}'",
            base,
            prefix,
            brand
        );
    }
    Ok(prefix)
}

/// Next free counter for a prefix (max existing + 1)
pub fn next_sku_number(conn: &Connection, prefix: &str) -> Result<u32> {
    let pattern = Regex::new(&format!(r"^{}(\d{{3}})(?:-\d+)?$", regex::escape(prefix)))
        .map_err(|e| InventoryError::validation(format!("Invalid SKU prefix: {}", e)))?;

    let mut stmt = conn.prepare_cached("SELECT sku FROM items WHERE sku LIKE ?1 || '%'")?;
    let skus = stmt
        .query_map(params![prefix], |row| row.get::<_, String>(0))?
        .collect::<DbResult<Vec<_>>>()?;

    let max = skus
        .iter()
        .filter_map(|sku| pattern.captures(sku))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    let next = max + 1;
    if next > MAX_SKU_NUMBER {
        return Err(InventoryError::validation(format!(
            "SKU prefix {} is exhausted ({} items issued)",
            prefix, MAX_SKU_NUMBER
        )));
    }
    Ok(next)
}

/// Issue the next base SKU for a brand
pub fn generate_sku(conn: &Connection, config: &Config, brand: &str) -> Result<String> {
    let prefix = brand_prefix(conn, config, brand)?;
    let number = next_sku_number(conn, &prefix)?;
    let sku = format!("{}{:03}", prefix, number);
    log::debug!("Generated SKU {} for brand '{}'", sku, brand);
    Ok(sku)
}

/// Compose a SKU from its base and variant number; variant 1 has no suffix
pub fn variant_sku(base: &str, variant_id: i64) -> String {
    if variant_id <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, variant_id)
    }
}

pub fn validate_sku_format(sku: &str) -> bool {
    SKU_FORMAT.is_match(sku)
}

/// `NIK001-2` becomes `NIK001`
pub fn base_sku(sku: &str) -> &str {
    sku.split('-').next().unwrap_or(sku)
}

/// `NIK001-2` is variant 2, `NIK001` is variant 1
pub fn variant_id_of(sku: &str) -> i64 {
    sku.split_once('-')
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(1)
}

/// Next variant number under a base SKU
pub fn next_variant_id(conn: &Connection, base: &str) -> DbResult<i64> {
    let mut stmt =
        conn.prepare_cached("SELECT sku FROM items WHERE sku = ?1 OR sku LIKE ?1 || '-%'")?;
    let max = stmt
        .query_map(params![base], |row| row.get::<_, String>(0))?
        .collect::<DbResult<Vec<_>>>()?
        .iter()
        .filter(|sku| base_sku(sku) == base)
        .map(|sku| variant_id_of(sku))
        .max()
        .unwrap_or(0);
    Ok(max + 1)
}

pub fn sku_exists(conn: &Connection, sku: &str) -> DbResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM items WHERE sku = ?1)",
        params![sku],
        |row| row.get(0),
    )
}
