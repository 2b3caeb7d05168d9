//! `location ...`, `update-location` and `find-location`

use super::{given, rule, Context};
use crate::database::locations::{location_counts, search_locations};
use crate::error::{InventoryError, Result};
use crate::locations::{
    create_location, deactivate_location, find_location, move_item, suggest_location_code,
    update_location, LocationUpdate,
};
use crate::models::Location;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum LocationCommand {
    /// Create a new storage location
    Create(CreateArgs),
    /// List storage locations with item counts
    List(ListArgs),
    /// Item counts per location
    Stats,
    /// Move an item to a different location
    Move(MoveArgs),
    /// Deactivate a location; its items keep pointing at it
    Deactivate(CodeArgs),
    /// Suggest an unused location code
    Suggest(SuggestArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Location code (e.g. STORE, WAREHOUSE-A)
    #[arg(long)]
    pub code: String,
    /// Location type (e.g. store, warehouse)
    #[arg(long = "type")]
    pub location_type: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Include deactivated locations
    #[arg(long)]
    pub show_inactive: bool,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    pub sku: String,
    pub location_code: String,
}

#[derive(Args, Debug)]
pub struct CodeArgs {
    pub code: String,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    #[arg(long = "type")]
    pub location_type: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Create the suggested location right away
    #[arg(long)]
    pub create: bool,
}

pub fn run(ctx: &Context, cmd: &LocationCommand) -> Result<()> {
    match cmd {
        LocationCommand::Create(args) => create(ctx, args),
        LocationCommand::List(args) => list(ctx, args.show_inactive),
        LocationCommand::Stats => stats(ctx),
        LocationCommand::Move(args) => {
            let (previous, location) = move_item(&ctx.conn, &args.sku, &args.location_code)?;
            println!(
                "✅ Moved {}: {} → {}",
                args.sku.trim().to_uppercase(),
                previous.as_deref().unwrap_or("No Location"),
                location.code
            );
            Ok(())
        }
        LocationCommand::Deactivate(args) => {
            let location = deactivate_location(&ctx.conn, &args.code)?;
            println!("✅ Deactivated location {}", location.code);
            Ok(())
        }
        LocationCommand::Suggest(args) => suggest(ctx, args),
    }
}

fn create(ctx: &Context, args: &CreateArgs) -> Result<()> {
    let location = create_location(
        &ctx.conn,
        &args.code,
        given(&args.location_type),
        given(&args.description),
    )?;
    println!("✅ Created location: {}", location.code);
    print_location(&location);
    Ok(())
}

fn print_location(location: &Location) {
    if let Some(location_type) = &location.location_type {
        println!("   Type: {}", location_type);
    }
    if let Some(description) = &location.description {
        println!("   Description: {}", description);
    }
    if !location.is_active {
        println!("   Status: inactive");
    }
}

fn list(ctx: &Context, show_inactive: bool) -> Result<()> {
    let counts = location_counts(&ctx.conn, show_inactive)?;
    if counts.is_empty() {
        println!("No locations found. Create one with 'inv location create'");
        return Ok(());
    }

    println!(
        "{:<15} {:<12} {:<30} {:>6} {:>9}",
        "Code", "Type", "Description", "Items", "Available"
    );
    println!("{}", rule(76));
    for location in &counts {
        let mut code = location.code.clone();
        if !location.is_active {
            code.push_str(" (off)");
        }
        println!(
            "{:<15} {:<12} {:<30} {:>6} {:>9}",
            code,
            location.location_type.as_deref().unwrap_or("-"),
            location.description.as_deref().unwrap_or("-"),
            location.item_count,
            location.available_count
        );
    }
    Ok(())
}

fn stats(ctx: &Context) -> Result<()> {
    let counts = location_counts(&ctx.conn, false)?;
    let total: i64 = counts.iter().map(|l| l.item_count).sum();
    let available: i64 = counts.iter().map(|l| l.available_count).sum();

    println!("📍 Location Statistics");
    println!("{}", rule(40));
    for location in &counts {
        println!(
            "{:<15} {:>5} items ({} available)",
            location.code, location.item_count, location.available_count
        );
    }
    println!("{}", rule(40));
    println!("Active locations: {}", counts.len());
    println!("Total items: {} ({} available)", total, available);
    Ok(())
}

fn suggest(ctx: &Context, args: &SuggestArgs) -> Result<()> {
    let description = given(&args.description);
    let code = suggest_location_code(&ctx.conn, &args.location_type, description)?;
    println!("💡 Suggested code: {}", code);

    if args.create {
        let location = create_location(&ctx.conn, &code, Some(&args.location_type), description)?;
        println!("✅ Created location: {}", location.code);
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct UpdateLocationArgs {
    pub code: String,
    #[arg(long = "type")]
    pub location_type: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Reactivate a deactivated location
    #[arg(long)]
    pub activate: bool,
}

pub fn update(ctx: &Context, args: &UpdateLocationArgs) -> Result<()> {
    let update = LocationUpdate {
        location_type: args.location_type.clone(),
        description: args.description.clone(),
        activate: args.activate,
    };
    if update.is_empty() {
        return Err(InventoryError::validation(
            "No updates specified. Use --type, --description or --activate",
        ));
    }
    let location = update_location(&ctx.conn, &args.code, &update)?;
    println!("✅ Updated location {}", location.code);
    print_location(&location);
    Ok(())
}

#[derive(Args, Debug)]
pub struct FindLocationArgs {
    /// Matched against code, type and description
    pub term: String,
}

pub fn find(ctx: &Context, args: &FindLocationArgs) -> Result<()> {
    if let Ok(location) = find_location(&ctx.conn, &args.term) {
        println!("📍 {}", location.code);
        print_location(&location);
        return Ok(());
    }

    let matches = search_locations(&ctx.conn, &args.term)?;
    if matches.is_empty() {
        println!("No locations matching '{}'", args.term.trim());
        return Ok(());
    }
    println!("Found {} location(s):", matches.len());
    for location in &matches {
        println!("📍 {}", location.code);
        print_location(location);
    }
    Ok(())
}
