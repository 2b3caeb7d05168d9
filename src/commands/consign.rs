//! Consignment commands: intake, consigner reports, sales, payouts and holds

use super::{given, rule, Context};
use crate::consignment::{
    consigner_report as build_report, find_or_create_consigner, hold_item as hold,
    item_payout, list_all_consigners, pending_payouts, record_consignment_sale, release_item,
    resolve_consigner, update_consigner as store_update, ConsignerUpdate,
};
use crate::database::consigners::search_consigners;
use crate::database::items::{insert_item, items_for_consigner, ItemRecord};
use crate::error::{InventoryError, Result};
use crate::locations::location_for_new_item;
use crate::models::{ItemStatus, NewItem, OwnershipType};
use crate::pricing::format_price;
use crate::sku::generate_sku;
use crate::validation::{
    parse_box_status, parse_condition, validate_brand, validate_color, validate_model,
    validate_percentage, validate_price, validate_size, validation_errors, ItemDraft,
    SizeCategory,
};
use clap::Args;
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct IntakeArgs {
    /// Consigner name
    pub consigner: String,

    /// Consigner phone; required the first time a consigner is seen
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    /// Split for this item (defaults to the consigner's)
    #[arg(long)]
    pub split: Option<i64>,

    #[arg(long)]
    pub brand: String,
    #[arg(long)]
    pub model: String,
    #[arg(long)]
    pub size: String,
    #[arg(long)]
    pub color: String,
    /// DS, VNDS or Used
    #[arg(long)]
    pub condition: String,
    /// Asking price
    #[arg(long)]
    pub price: String,
    /// box, tag, both or neither
    #[arg(long, default_value = "box")]
    pub box_status: String,
    /// Location code (defaults to the configured location)
    #[arg(long)]
    pub location: Option<String>,
    #[arg(short, long)]
    pub notes: Option<String>,
}

/// Take in one consignment item, creating the consigner on first contact
pub fn intake(ctx: &Context, args: &IntakeArgs) -> Result<()> {
    let draft = ItemDraft {
        brand: args.brand.clone(),
        model: args.model.clone(),
        color: args.color.clone(),
        size: args.size.clone(),
        category: String::new(),
        condition: args.condition.clone(),
        box_status: args.box_status.clone(),
        current_price: args.price.clone(),
        purchase_price: "0".to_string(),
    };
    let errors = validation_errors(&draft);
    if !errors.is_empty() {
        return Err(InventoryError::validation(errors.join("; ")));
    }

    let location = location_for_new_item(&ctx.conn, &ctx.config, args.location.as_deref())?;

    // Consigner and item land together or not at all
    let tx = ctx.conn.unchecked_transaction()?;
    let found = find_or_create_consigner(
        &tx,
        &args.consigner,
        given(&args.phone),
        given(&args.email),
        ctx.config.defaults.consignment_split,
    )?;
    let consigner = found.consigner;

    let split = validate_percentage(args.split.unwrap_or(consigner.default_split_percentage))?;
    let brand = validate_brand(&args.brand)?;
    let sku = generate_sku(&tx, &ctx.config, &brand)?;

    let item = NewItem {
        sku: sku.clone(),
        variant_id: 1,
        brand,
        model: validate_model(&args.model)?,
        size: validate_size(&args.size, SizeCategory::Any)?,
        color: validate_color(&args.color)?,
        condition: parse_condition(&args.condition)?,
        box_status: parse_box_status(&args.box_status)?,
        current_price: validate_price(&args.price)?,
        purchase_price: Decimal::ZERO,
        location_id: Some(location.id),
        notes: given(&args.notes).map(str::to_string),
        ownership_type: OwnershipType::Consignment,
        consigner_id: Some(consigner.id),
        split_percentage: Some(split),
    };
    insert_item(&tx, &item)?;
    ctx.photos().create_item_dir(&sku)?;
    tx.commit()?;
    log::info!("Consignment intake {} for consigner {}", sku, consigner.id);

    if found.created {
        println!("✅ Created new consigner: {} ({})", consigner.name, consigner.phone);
    } else {
        println!("👤 Consigner: {} ({})", consigner.name, consigner.phone);
    }
    println!("✅ Added consignment item {}", sku);
    println!("   {} {} | Size {} | {}", item.brand, item.model, item.size, item.color);
    println!("   Price: {}", format_price(item.current_price));
    println!("   Split: {}% to consigner", split);
    println!("   Location: {}", location.code);
    Ok(())
}

#[derive(Args, Debug)]
pub struct ListConsignersArgs {
    /// Only consigners whose name, phone or email contains this
    #[arg(long)]
    pub search: Option<String>,
}

pub fn list_consigners(ctx: &Context, args: &ListConsignersArgs) -> Result<()> {
    if let Some(term) = given(&args.search) {
        let matches = search_consigners(&ctx.conn, term)?;
        if matches.is_empty() {
            println!("No consigners matching '{}'", term);
            return Ok(());
        }
        for consigner in &matches {
            println!(
                "{:<25} {:<16} {:<30} {:>4}%",
                consigner.name,
                consigner.phone,
                consigner.email.as_deref().unwrap_or("-"),
                consigner.default_split_percentage
            );
        }
        return Ok(());
    }

    let consigners = list_all_consigners(&ctx.conn, true)?;
    if consigners.is_empty() {
        println!("No consigners found.");
        return Ok(());
    }

    println!(
        "{:<25} {:<16} {:>6} {:>6} {:>5} {:>12}",
        "Name", "Phone", "Split", "Avail", "Sold", "Payouts"
    );
    println!("{}", rule(75));
    for summary in &consigners {
        let stats = summary.stats.clone().unwrap_or_default();
        println!(
            "{:<25} {:<16} {:>5}% {:>6} {:>5} {:>12}",
            summary.consigner.name,
            summary.consigner.phone,
            summary.consigner.default_split_percentage,
            stats.available_items,
            stats.sold_items,
            format_price(stats.total_payouts)
        );
    }
    println!("\nTotal consigners: {}", consigners.len());
    Ok(())
}

#[derive(Args, Debug)]
pub struct ConsignerLookupArgs {
    /// Consigner name (case-insensitive substring)
    pub name: String,
    /// Phone number, when the name matches several consigners
    #[arg(long)]
    pub phone: Option<String>,
}

fn item_line(record: &ItemRecord) -> String {
    let item = &record.item;
    format!(
        "{} - {} | Size {} | {}",
        item.sku,
        item.display_name(),
        item.size,
        format_price(item.current_price)
    )
}

pub fn consigner_report(ctx: &Context, args: &ConsignerLookupArgs) -> Result<()> {
    let consigner = resolve_consigner(&ctx.conn, &args.name, given(&args.phone))?;
    let report = build_report(&ctx.conn, consigner.id)?;
    let stats = &report.stats;

    println!("📊 Consigner Report: {}", report.consigner.name);
    println!("{}", "=".repeat(60));
    println!("Phone: {}", report.consigner.phone);
    if let Some(email) = &report.consigner.email {
        println!("Email: {}", email);
    }
    println!("Default Split: {}%", report.consigner.default_split_percentage);
    println!("Since: {}", report.consigner.created_date.format("%Y-%m-%d"));

    println!("\nInventory:");
    println!("  Total items: {}", stats.total_items);
    println!("  Available: {} ({})", stats.available_items, format_price(stats.total_current_value));
    println!("  Sold: {} ({})", stats.sold_items, format_price(stats.total_sold_value));
    println!("  Held: {}", stats.held_items);
    println!("  Total payouts: {}", format_price(stats.total_payouts));

    for (status, items) in &report.by_status {
        if items.is_empty() {
            continue;
        }
        println!("\n{} ({}):", status.to_uppercase(), items.len());
        for record in items {
            println!("  {}", item_line(record));
        }
    }

    if !report.recent.is_empty() {
        println!("\nRecent items:");
        for record in &report.recent {
            println!(
                "  {} {} ({})",
                record.item.date_added.format("%Y-%m-%d"),
                item_line(record),
                record.item.status
            );
        }
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct UpdateConsignerArgs {
    /// Current consigner name
    pub name: String,
    /// Current phone, when the name matches several consigners
    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub new_name: Option<String>,
    #[arg(long)]
    pub new_phone: Option<String>,
    /// New email; an empty string clears it
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub split: Option<i64>,
}

pub fn update_consigner(ctx: &Context, args: &UpdateConsignerArgs) -> Result<()> {
    let update = ConsignerUpdate {
        name: args.new_name.clone(),
        phone: given(&args.new_phone).map(str::to_string),
        email: args.email.as_deref().map(|e| e.trim().to_string()),
        default_split: args.split,
    };
    if update.name.is_none()
        && update.phone.is_none()
        && update.email.is_none()
        && update.default_split.is_none()
    {
        return Err(InventoryError::validation(
            "No updates specified. Use --new-name, --new-phone, --email or --split",
        ));
    }

    let consigner = resolve_consigner(&ctx.conn, &args.name, given(&args.phone))?;
    let consigner = store_update(&ctx.conn, consigner.id, &update)?;
    println!("✅ Updated consigner {}", consigner.name);
    println!("   Phone: {}", consigner.phone);
    println!("   Email: {}", consigner.email.as_deref().unwrap_or("-"));
    println!("   Default Split: {}%", consigner.default_split_percentage);
    Ok(())
}

#[derive(Args, Debug)]
pub struct ConsignArgs {
    /// Consigner name (case-insensitive substring)
    pub name: String,
    #[arg(long)]
    pub phone: Option<String>,
}

/// Payouts for one consigner's sold items plus what is still on the floor
pub fn consign(ctx: &Context, args: &ConsignArgs) -> Result<()> {
    let consigner = resolve_consigner(&ctx.conn, &args.name, given(&args.phone))?;
    let sold = items_for_consigner(&ctx.conn, consigner.id, Some(ItemStatus::Sold))?;
    let available = items_for_consigner(&ctx.conn, consigner.id, Some(ItemStatus::Available))?;

    println!("💰 Payout Report: {} ({})", consigner.name, consigner.phone);
    println!("{}", "=".repeat(60));

    let mut total = Decimal::ZERO;
    if sold.is_empty() {
        println!("No sold items.");
    } else {
        println!("Sold items:");
        for record in &sold {
            let Some(payout) = item_payout(&record.item, consigner.default_split_percentage) else {
                continue;
            };
            total += payout.payout;
            println!(
                "  {} - {} | Sold {} | Fee {} | {}% | Payout {}",
                record.item.sku,
                record.item.display_name(),
                format_price(record.item.sold_price.unwrap_or_default()),
                format_price(payout.platform_fee),
                payout.split_percentage,
                format_price(payout.payout)
            );
        }
        println!("{}", rule(60));
        println!("Total payout: {}", format_price(total));
    }

    if !available.is_empty() {
        let value: Decimal = available.iter().map(|r| r.item.current_price).sum();
        println!("\nStill available: {} item(s) worth {}", available.len(), format_price(value));
        for record in &available {
            println!("  {}", item_line(record));
        }
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct ConsignSoldArgs {
    pub sku: String,
    /// Sale price
    pub price: String,
    /// Sales channel: store, ebay, goat, stockx, grailed, depop or other
    #[arg(long, default_value = "store")]
    pub platform: String,
    /// Override the platform's default fee
    #[arg(long)]
    pub fee: Option<String>,
    #[arg(long)]
    pub buyer: Option<String>,
}

pub fn consign_sold(ctx: &Context, args: &ConsignSoldArgs) -> Result<()> {
    let price = validate_price(&args.price)?;
    let fee = given(&args.fee).map(validate_price).transpose()?;
    let sale = record_consignment_sale(
        &ctx.conn,
        &args.sku,
        price,
        &args.platform,
        fee,
        given(&args.buyer),
    )?;
    let item = &sale.record.item;

    println!("✅ Sold {}: {}", item.sku, item.display_name());
    println!("{}", rule(50));
    println!("Sale Price: {}", format_price(price));
    println!("Platform: {}", sale.platform);
    println!("Platform Fee: {}", format_price(sale.platform_fee));
    println!("Split: {}%", sale.split_percentage);
    println!(
        "Consigner Payout: {} → {}",
        format_price(sale.payout),
        sale.record.consigner_name.as_deref().unwrap_or("Unknown")
    );
    println!("Store Revenue: {}", format_price(sale.store_revenue));
    Ok(())
}

#[derive(Args, Debug)]
pub struct PayoutSummaryArgs {
    /// Only consigners whose name contains this
    #[arg(long)]
    pub consigner: Option<String>,
    /// Hide consigners owed less than this
    #[arg(long)]
    pub min_amount: Option<String>,
}

pub fn payout_summary(ctx: &Context, args: &PayoutSummaryArgs) -> Result<()> {
    let min_amount = given(&args.min_amount).map(validate_price).transpose()?;
    let name_filter = given(&args.consigner).map(str::to_lowercase);

    let groups: Vec<_> = pending_payouts(&ctx.conn)?
        .into_iter()
        .filter(|g| min_amount.is_none_or(|min| g.total_payout >= min))
        .filter(|g| match (&name_filter, &g.consigner) {
            (None, _) => true,
            (Some(name), Some(consigner)) => consigner.name.to_lowercase().contains(name),
            (Some(_), None) => false,
        })
        .collect();

    if groups.is_empty() {
        println!("No payouts found.");
        return Ok(());
    }

    println!("💰 Payout Summary");
    println!("{}", "=".repeat(60));
    let mut grand_total = Decimal::ZERO;
    let mut item_count = 0;
    for group in &groups {
        let name = group
            .consigner
            .as_ref()
            .map(|c| format!("{} ({})", c.name, c.phone))
            .unwrap_or_else(|| "Unknown consigner".to_string());
        println!("\n{}: {}", name, format_price(group.total_payout));
        for (record, payout) in &group.items {
            println!(
                "  {} - {} | Sold {} | Payout {}",
                record.item.sku,
                record.item.display_name(),
                format_price(record.item.sold_price.unwrap_or_default()),
                format_price(payout.payout)
            );
        }
        grand_total += group.total_payout;
        item_count += group.items.len();
    }
    println!("\n{}", rule(60));
    println!(
        "Total: {} across {} item(s) for {} consigner(s)",
        format_price(grand_total),
        item_count,
        groups.len()
    );
    Ok(())
}

#[derive(Args, Debug)]
pub struct HoldItemArgs {
    pub sku: String,
    #[arg(long)]
    pub reason: Option<String>,
    /// Release the hold instead
    #[arg(long)]
    pub release: bool,
}

pub fn hold_item(ctx: &Context, args: &HoldItemArgs) -> Result<()> {
    let reason = given(&args.reason);
    if args.release {
        let record = release_item(&ctx.conn, &args.sku, reason)?;
        println!("✅ Released {} from hold", record.item.sku);
    } else {
        let record = hold(&ctx.conn, &args.sku, reason)?;
        println!("⏸️  {} is now on hold", record.item.sku);
        if let Some(reason) = reason {
            println!("   Reason: {}", reason);
        }
    }
    Ok(())
}
