//! Item commands: add, add-variant, search, show, edit, update-status, move

use super::{given, rule, Context};
use crate::consignment::{item_payout, ItemPayout};
use crate::database::items::{insert_item, search_items, update_item, ItemFilter, ItemRecord};
use crate::database::photos::photos_for_item;
use crate::error::{InventoryError, Result};
use crate::locations::{location_for_new_item, move_item as relocate, resolve_active_location};
use crate::models::{Item, ItemStatus, NewItem, OwnershipType};
use crate::pricing::{format_price, platform_fee, price_range, round_price_up};
use crate::sku::{base_sku, generate_sku, next_variant_id, variant_sku};
use crate::validation::{
    normalize_size, parse_box_status, parse_condition, parse_item_status, validate_brand,
    validate_color, validate_model, validate_price, validate_size, validation_errors, ItemDraft,
    SizeCategory,
};
use chrono::Local;
use clap::Args;
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Brand name (e.g. nike, adidas, supreme)
    pub brand: String,
    /// Model name (quote it when it has spaces)
    pub model: String,
    /// Size (e.g. 10, 10.5, M, L)
    pub size: String,
    /// Color or colorway
    pub color: String,
    /// Condition: DS, VNDS or Used
    pub condition: String,
    /// Selling price
    pub current_price: String,
    /// Purchase price
    pub purchase_price: String,
    /// Box status: box, tag, both or neither
    pub box_status: String,
    /// Location code (defaults to the configured location)
    pub location: Option<String>,

    /// Additional notes
    #[arg(short, long)]
    pub notes: Option<String>,

    /// Mark as a consignment item
    #[arg(long)]
    pub consignment: bool,
}

pub fn add(ctx: &Context, args: &AddArgs) -> Result<()> {
    let draft = ItemDraft {
        brand: args.brand.clone(),
        model: args.model.clone(),
        color: args.color.clone(),
        size: args.size.clone(),
        category: String::new(),
        condition: args.condition.clone(),
        box_status: args.box_status.clone(),
        current_price: args.current_price.clone(),
        purchase_price: args.purchase_price.clone(),
    };
    let errors = validation_errors(&draft);
    if !errors.is_empty() {
        return Err(InventoryError::validation(errors.join("; ")));
    }

    let brand = validate_brand(&args.brand)?;
    let location = location_for_new_item(&ctx.conn, &ctx.config, args.location.as_deref())?;
    let sku = generate_sku(&ctx.conn, &ctx.config, &brand)?;
    let item = NewItem {
        sku: sku.clone(),
        variant_id: 1,
        brand,
        model: validate_model(&args.model)?,
        size: validate_size(&args.size, SizeCategory::Any)?,
        color: validate_color(&args.color)?,
        condition: parse_condition(&args.condition)?,
        box_status: parse_box_status(&args.box_status)?,
        current_price: validate_price(&args.current_price)?,
        purchase_price: validate_price(&args.purchase_price)?,
        location_id: Some(location.id),
        notes: given(&args.notes).map(str::to_string),
        ownership_type: if args.consignment {
            OwnershipType::Consignment
        } else {
            OwnershipType::Owned
        },
        consigner_id: None,
        split_percentage: None,
    };
    insert_item(&ctx.conn, &item)?;
    let photo_dir = ctx.photos().create_item_dir(&sku)?;

    println!("✅ Added item {}", sku);
    println!("Brand: {}", item.brand);
    println!("Model: {}", item.model);
    println!("Size: {}", item.size);
    println!("Color: {}", item.color);
    println!("Condition: {}", item.condition);
    println!("Price: {}", format_price(item.current_price));
    println!("Location: {}", location.code);
    if let Some(notes) = &item.notes {
        println!("Notes: {}", notes);
    }
    if args.consignment {
        println!("Type: Consignment");
    }
    println!("Photos directory: {}", photo_dir.display());
    Ok(())
}

#[derive(Args, Debug)]
pub struct AddVariantArgs {
    /// SKU of the item to copy (any variant of it)
    pub sku: String,
    /// Size of the new variant
    pub size: String,

    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub condition: Option<String>,
    #[arg(long)]
    pub price: Option<String>,
    #[arg(long)]
    pub purchase_price: Option<String>,
    #[arg(long)]
    pub box_status: Option<String>,
    #[arg(short, long)]
    pub notes: Option<String>,
}

/// Copy an item as a new size variant; unspecified fields are inherited
pub fn add_variant(ctx: &Context, args: &AddVariantArgs) -> Result<()> {
    let base = ctx.item(&args.sku)?.item;
    println!("Adding variant for: {}", base.display_name());

    let base_code = base_sku(&base.sku).to_string();
    let variant_id = next_variant_id(&ctx.conn, &base_code)?;
    let sku = variant_sku(&base_code, variant_id);

    let item = NewItem {
        sku: sku.clone(),
        variant_id,
        brand: base.brand.clone(),
        model: base.model.clone(),
        size: validate_size(&args.size, SizeCategory::Any)?,
        color: match given(&args.color) {
            Some(color) => validate_color(color)?,
            None => base.color.clone(),
        },
        condition: match given(&args.condition) {
            Some(condition) => parse_condition(condition)?,
            None => base.condition,
        },
        box_status: match given(&args.box_status) {
            Some(status) => parse_box_status(status)?,
            None => base.box_status,
        },
        current_price: match given(&args.price) {
            Some(price) => validate_price(price)?,
            None => base.current_price,
        },
        purchase_price: match given(&args.purchase_price) {
            Some(price) => validate_price(price)?,
            None => base.purchase_price,
        },
        location_id: base.location_id,
        notes: given(&args.notes).map(str::to_string),
        ownership_type: base.ownership_type,
        consigner_id: base.consigner_id,
        split_percentage: base.split_percentage,
    };
    insert_item(&ctx.conn, &item)?;
    ctx.photos().create_item_dir(&sku)?;

    println!("✅ Added variant {}", sku);
    println!("Size: {}", item.size);
    println!("Price: {}", format_price(item.current_price));
    Ok(())
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text matched against brand, model, color, SKU and notes
    pub query: Option<String>,

    #[arg(long)]
    pub brand: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub size: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
    /// DS, VNDS or Used
    #[arg(long)]
    pub condition: Option<String>,
    /// Location code (substring)
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub sku: Option<String>,

    #[arg(long, conflicts_with_all = ["sold", "held"])]
    pub available: bool,
    #[arg(long, conflicts_with = "held")]
    pub sold: bool,
    #[arg(long)]
    pub held: bool,

    #[arg(long, conflicts_with = "owned")]
    pub consignment: bool,
    #[arg(long)]
    pub owned: bool,

    #[arg(long)]
    pub min_price: Option<String>,
    #[arg(long)]
    pub max_price: Option<String>,

    /// Only print the number of matches
    #[arg(long)]
    pub count: bool,
    /// One block per item instead of a grouped summary
    #[arg(long)]
    pub detailed: bool,
}

impl SearchArgs {
    fn filter(&self) -> Result<ItemFilter> {
        let status = if self.available {
            Some(ItemStatus::Available)
        } else if self.sold {
            Some(ItemStatus::Sold)
        } else if self.held {
            Some(ItemStatus::Held)
        } else {
            None
        };
        let ownership = if self.consignment {
            Some(OwnershipType::Consignment)
        } else if self.owned {
            Some(OwnershipType::Owned)
        } else {
            None
        };

        Ok(ItemFilter {
            text: given(&self.query).map(str::to_string),
            sku: given(&self.sku).map(str::to_string),
            brand: given(&self.brand).map(str::to_string),
            model: given(&self.model).map(str::to_string),
            color: given(&self.color).map(str::to_string),
            size: given(&self.size).map(normalize_size).transpose()?,
            condition: given(&self.condition).map(parse_condition).transpose()?,
            location_code: given(&self.location).map(str::to_string),
            status,
            ownership,
            min_price: given(&self.min_price).map(validate_price).transpose()?,
            max_price: given(&self.max_price).map(validate_price).transpose()?,
            ..Default::default()
        })
    }
}

/// Group records by base SKU, keeping the order in which bases first appear
pub fn group_by_base_sku(records: Vec<ItemRecord>) -> Vec<(String, Vec<ItemRecord>)> {
    let mut groups: Vec<(String, Vec<ItemRecord>)> = Vec::new();
    for record in records {
        let base = base_sku(&record.item.sku).to_string();
        match groups.iter_mut().find(|(b, _)| *b == base) {
            Some((_, items)) => items.push(record),
            None => groups.push((base, vec![record])),
        }
    }
    groups
}

/// One summary line for a group of variants
pub fn group_line(base: &str, items: &[ItemRecord]) -> String {
    match items {
        [record] => {
            let item = &record.item;
            format!(
                "{} - {} | Size {} | {} | {}",
                item.sku,
                item.display_name(),
                item.size,
                format_price(item.current_price),
                record.location_label()
            )
        }
        _ => {
            let first = &items[0].item;
            let mut sizes: Vec<&str> = items.iter().map(|r| r.item.size.as_str()).collect();
            sizes.sort();
            sizes.dedup();
            let prices: Vec<Decimal> = items.iter().map(|r| r.item.current_price).collect();
            format!(
                "{} {} variants - {} | Sizes: {} | {}",
                base,
                items.len(),
                first.display_name(),
                sizes.join(", "),
                price_range(&prices)
            )
        }
    }
}

fn print_item_details(record: &ItemRecord) {
    let item = &record.item;
    println!("SKU: {}", item.sku);
    println!("Brand: {}", item.brand);
    println!("Model: {}", item.model);
    println!("Size: {}", item.size);
    println!("Color: {}", item.color);
    println!("Condition: {}", item.condition);
    println!("Box Status: {}", item.box_status);
    println!("Current Price: {}", format_price(item.current_price));
    println!("Purchase Price: {}", format_price(item.purchase_price));
    println!("Status: {}", item.status);
    println!("Location: {}", record.location_label());
    println!("Ownership: {}", item.ownership_type);
    if item.is_consignment() {
        println!(
            "Consigner: {}",
            record.consigner_name.as_deref().unwrap_or("N/A")
        );
        println!("Split: {}%", item.effective_split());
    }
    if let Some(notes) = &item.notes {
        println!("Notes: {}", notes);
    }
    if let (Some(price), Some(date)) = (item.sold_price, item.sold_date) {
        println!("Sold: {} on {}", format_price(price), date.format("%Y-%m-%d"));
        if let Some(platform) = &item.sold_platform {
            println!("Platform: {}", platform);
        }
        if let Some(fee) = item.platform_fee {
            println!("Platform Fee: {}", format_price(fee));
        }
    }
    println!("Added: {}", item.date_added.format("%Y-%m-%d %H:%M"));
}

pub fn search(ctx: &Context, args: &SearchArgs) -> Result<()> {
    let results = search_items(&ctx.conn, &args.filter()?)?;

    if args.count {
        println!("Total items: {}", results.len());
        return Ok(());
    }
    if results.is_empty() {
        println!("No items found.");
        return Ok(());
    }

    if args.detailed {
        println!("Found {} item(s):", results.len());
        println!("{}", "=".repeat(80));
        for record in &results {
            print_item_details(record);
            println!("{}", rule(80));
        }
        return Ok(());
    }

    let groups = group_by_base_sku(results);
    for (base, items) in &groups {
        println!("{}", group_line(base, items));
    }
    println!("\nShowing {} group(s)", groups.len());
    Ok(())
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub sku: String,
}

pub fn show(ctx: &Context, args: &ShowArgs) -> Result<()> {
    let record = ctx.item(&args.sku)?;
    print_item_details(&record);

    if let Some(payout) = item_payout(&record.item, record.item.effective_split())
        .filter(|_| record.item.is_consignment())
    {
        println!("Consigner Payout: {}", format_price(payout.payout));
    }

    let photos = photos_for_item(&ctx.conn, record.item.id)?;
    if photos.is_empty() {
        println!("📸 No photos");
    } else {
        println!("📸 Photos:");
        for photo in photos {
            println!(
                "  {} ({})",
                photo.file_path,
                photo.photo_type.as_deref().unwrap_or("gallery")
            );
        }
    }
    Ok(())
}

/// Record a sale on `item`. Consignment items also get a platform fee, which
/// is the platform's commission or the flat default when none is known.
fn record_sale(item: &mut Item, price: Decimal, platform: Option<&str>) -> Option<ItemPayout> {
    let fee = item
        .is_consignment()
        .then(|| platform_fee(platform.unwrap_or_default(), price));
    item.mark_sold(
        price,
        platform.map(str::to_string),
        fee,
        Local::now().naive_local(),
    );
    if !item.is_consignment() {
        return None;
    }
    item_payout(item, item.effective_split())
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub sku: String,

    /// New current price
    #[arg(long)]
    pub price: Option<String>,
    /// Round the new price up to the nearest $5
    #[arg(long, requires = "price")]
    pub round_price: bool,
    /// available, sold, held or deleted
    #[arg(long)]
    pub status: Option<String>,
    /// Required when marking the item sold
    #[arg(long)]
    pub sold_price: Option<String>,
    #[arg(long)]
    pub sold_platform: Option<String>,
    #[arg(long)]
    pub condition: Option<String>,
    #[arg(long)]
    pub box_status: Option<String>,
    /// Location code to move the item to
    #[arg(long)]
    pub location: Option<String>,
    /// New notes; an empty string clears them
    #[arg(long)]
    pub notes: Option<String>,
}

pub fn edit(ctx: &Context, args: &EditArgs) -> Result<()> {
    let record = ctx.item(&args.sku)?;
    let mut item = record.item.clone();
    println!("📝 Editing item {}: {}", item.sku, item.display_name());
    println!(
        "Current: Size {}, {}, {}, {}",
        item.size,
        item.condition,
        format_price(item.current_price),
        item.status
    );

    let mut updates: Vec<String> = Vec::new();
    let mut payout = None;

    if let Some(status) = given(&args.status) {
        let status = parse_item_status(status)?;
        if status != item.status {
            if status == ItemStatus::Sold {
                let price = given(&args.sold_price).ok_or_else(|| {
                    InventoryError::validation("--sold-price is required when marking item as sold")
                })?;
                let price = validate_price(price)?;
                let platform = given(&args.sold_platform);
                payout = record_sale(&mut item, price, platform);
                updates.push(format!("sold price: {}", format_price(price)));
                if let Some(platform) = platform {
                    updates.push(format!("platform: {}", platform));
                }
            } else {
                if item.status == ItemStatus::Sold {
                    item.clear_sale();
                    updates.push("cleared sale information".to_string());
                }
                item.status = status;
            }
            updates.push(format!("status: {}", status));
        }
    }

    if let Some(price) = given(&args.price) {
        let mut price = validate_price(price)?;
        if args.round_price {
            price = round_price_up(price);
            updates.push(format!("price: {} (rounded up)", format_price(price)));
        } else {
            updates.push(format!("price: {}", format_price(price)));
        }
        item.current_price = price;
    }

    if let Some(condition) = given(&args.condition) {
        let condition = parse_condition(condition)?;
        if condition != item.condition {
            item.condition = condition;
            updates.push(format!("condition: {}", condition));
        }
    }

    if let Some(box_status) = given(&args.box_status) {
        let box_status = parse_box_status(box_status)?;
        if box_status != item.box_status {
            item.box_status = box_status;
            updates.push(format!("box status: {}", box_status));
        }
    }

    if let Some(code) = given(&args.location) {
        let location = resolve_active_location(&ctx.conn, code)?;
        if item.location_id != Some(location.id) {
            item.location_id = Some(location.id);
            updates.push(format!(
                "location: {} → {}",
                record.location_label(),
                location.code
            ));
        }
    }

    if let Some(notes) = &args.notes {
        let notes = notes.trim();
        if notes != item.notes.as_deref().unwrap_or_default() {
            item.notes = (!notes.is_empty()).then(|| notes.to_string());
            updates.push(format!(
                "notes: {}",
                if notes.is_empty() { "cleared" } else { "updated" }
            ));
        }
    }

    if updates.is_empty() {
        return Err(InventoryError::validation(
            "No changes specified. Use --help to see available options",
        ));
    }

    update_item(&ctx.conn, &item)?;
    if let Some(payout) = payout {
        println!("💰 Consignment payout: {}", format_price(payout.payout));
    }
    println!("✅ Updated {}:", item.sku);
    for update in &updates {
        println!("  • {}", update);
    }
    if let Some(consigner) = record.consigner_name.as_deref().filter(|_| item.is_consignment()) {
        println!("  • Consigner: {}", consigner);
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct UpdateStatusArgs {
    pub sku: String,
    /// available, sold or held
    #[arg(long, value_parser = ["available", "sold", "held"])]
    pub status: String,
    #[arg(long)]
    pub sold_price: Option<String>,
    #[arg(long)]
    pub sold_platform: Option<String>,
}

pub fn update_status(ctx: &Context, args: &UpdateStatusArgs) -> Result<()> {
    let mut item = ctx.item(&args.sku)?.item;
    let old_status = item.status;
    let status = parse_item_status(&args.status)?;

    if status == ItemStatus::Sold {
        let price = given(&args.sold_price).ok_or_else(|| {
            InventoryError::validation("--sold-price is required when marking item as sold")
        })?;
        let price = validate_price(price)?;
        if let Some(payout) = record_sale(&mut item, price, given(&args.sold_platform)) {
            println!("💰 Consignment payout: {}", format_price(payout.payout));
        }
    } else {
        if old_status == ItemStatus::Sold {
            item.clear_sale();
        }
        item.status = status;
    }
    update_item(&ctx.conn, &item)?;

    println!("✅ Updated {} status: {} → {}", item.sku, old_status, status);
    if let Some(price) = item.sold_price.filter(|_| status == ItemStatus::Sold) {
        println!("  • Sold for: {}", format_price(price));
        if let Some(platform) = &item.sold_platform {
            println!("  • Platform: {}", platform);
        }
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    pub sku: String,
    pub location_code: String,
}

pub fn move_item(ctx: &Context, args: &MoveArgs) -> Result<()> {
    let (previous, location) = relocate(&ctx.conn, &args.sku, &args.location_code)?;
    println!(
        "✅ Moved {}: {} → {}",
        args.sku.trim().to_uppercase(),
        previous.as_deref().unwrap_or("No Location"),
        location.code
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::items::{get_item_by_sku, insert_item, tests::new_item};
    use crate::database::tests::test_db;
    use rust_decimal_macros::dec;

    fn records(conn: &rusqlite::Connection) -> Vec<ItemRecord> {
        search_items(conn, &ItemFilter::default()).unwrap()
    }

    #[test]
    fn variants_group_under_base_sku() {
        let conn = test_db();
        insert_item(&conn, &new_item("ADI001", "Adidas", "9", dec!(120))).unwrap();
        insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(250))).unwrap();
        insert_item(&conn, &new_item("NIK001-2", "Nike", "11", dec!(275))).unwrap();
        insert_item(&conn, &new_item("NIK001-3", "Nike", "10", dec!(250))).unwrap();

        let groups = group_by_base_sku(records(&conn));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].0, "NIK001");
        assert_eq!(groups[1].1.len(), 3);

        assert_eq!(
            group_line(&groups[0].0, &groups[0].1),
            "ADI001 - Adidas Air Jordan 1 | Size 9 | $120.00 | No Location"
        );
        assert_eq!(
            group_line(&groups[1].0, &groups[1].1),
            "NIK001 3 variants - Nike Air Jordan 1 | Sizes: 10, 11 | $250.00 - $275.00"
        );
    }

    #[test]
    fn search_flags_build_filter() {
        let args = SearchArgs {
            query: Some("jordan".to_string()),
            brand: None,
            model: None,
            size: Some("10 1/2".to_string()),
            color: None,
            condition: Some("VNDS".to_string()),
            location: None,
            sku: None,
            available: false,
            sold: true,
            held: false,
            consignment: true,
            owned: false,
            min_price: Some("$1,000".to_string()),
            max_price: None,
            count: false,
            detailed: false,
        };
        let filter = args.filter().unwrap();
        assert_eq!(filter.size.as_deref(), Some("10.5"));
        assert_eq!(filter.status, Some(ItemStatus::Sold));
        assert_eq!(filter.ownership, Some(OwnershipType::Consignment));
        assert_eq!(filter.min_price, Some(dec!(1000)));
        assert_eq!(filter.condition, Some(crate::models::Condition::Vnds));
    }

    #[test]
    fn consignment_sale_records_fee_and_payout() {
        let conn = test_db();
        let mut item = new_item("SUP001", "Supreme", "L", dec!(200));
        item.ownership_type = OwnershipType::Consignment;
        item.split_percentage = Some(80);
        insert_item(&conn, &item).unwrap();
        let mut item = get_item_by_sku(&conn, "SUP001").unwrap().unwrap().item;

        let payout = record_sale(&mut item, dec!(200), Some("ebay")).unwrap();
        assert_eq!(item.platform_fee, Some(dec!(25.00)));
        assert_eq!(payout.payout, dec!(140.00));

        let mut owned = get_item_by_sku(&conn, "SUP001").unwrap().unwrap().item;
        owned.ownership_type = OwnershipType::Owned;
        assert!(record_sale(&mut owned, dec!(200), None).is_none());
        assert_eq!(owned.platform_fee, None);
        assert_eq!(owned.status, ItemStatus::Sold);
    }
}
