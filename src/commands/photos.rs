//! Photo commands

use super::{rule, Context};
use crate::database::items::all_skus;
use crate::error::{InventoryError, Result};
use crate::photos::{
    bytes_to_mb, find_duplicates, matching_files, remove_duplicates, strip_exif, PhotoInfo,
    PhotoManager,
};
use clap::Args;
use std::collections::HashSet;
use std::path::PathBuf;

/// Refresh the item's photo rows after its directory changed
fn sync(ctx: &mut Context, manager: &PhotoManager, sku: &str) -> Result<usize> {
    let item_id = ctx.item(sku)?.item.id;
    manager.sync_to_database(&mut ctx.conn, item_id, sku)
}

fn print_photo(photo: &PhotoInfo) {
    let mut line = format!("  📷 {} ({:.2} MB", photo.filename, photo.size_mb());
    if let Some(dimensions) = &photo.dimensions {
        line.push_str(&format!(", {}", dimensions));
    }
    if let Some(format) = &photo.format {
        line.push_str(&format!(", {}", format));
    }
    line.push(')');
    if let Some(error) = &photo.error {
        line.push_str(&format!(" ⚠️ {}", error));
    }
    println!("{}", line);
}

#[derive(Args, Debug)]
pub struct AddPhotoArgs {
    pub sku: String,
    /// Image file to add
    pub photo_path: PathBuf,
    /// Filename inside the item's directory
    #[arg(long)]
    pub filename: Option<String>,
    /// Make it the primary photo
    #[arg(long)]
    pub primary: bool,
}

pub fn add_photo(ctx: &mut Context, args: &AddPhotoArgs) -> Result<()> {
    let sku = ctx.item(&args.sku)?.item.sku;
    let manager = ctx.photos();

    let mut info = manager.add_photo(&sku, &args.photo_path, args.filename.as_deref())?;
    if args.primary {
        let primary = manager.set_primary_photo(&sku, &info.filename)?;
        info.filename = primary;
    }
    let count = sync(ctx, &manager, &sku)?;

    println!("✅ Added photo to {}: {}", sku, info.filename);
    if let Some(dimensions) = &info.dimensions {
        println!("   Dimensions: {}", dimensions);
    }
    println!("   Size: {:.2} MB", info.size_mb());
    if args.primary {
        println!("   Set as primary photo");
    }
    println!("   {} photo(s) total", count);
    Ok(())
}

#[derive(Args, Debug)]
pub struct ListPhotosArgs {
    pub sku: String,
}

pub fn list_photos(ctx: &Context, args: &ListPhotosArgs) -> Result<()> {
    let sku = ctx.item(&args.sku)?.item.sku;
    let photos = ctx.photos().list_photos(&sku)?;
    if photos.is_empty() {
        println!("No photos for {}", sku);
        return Ok(());
    }

    println!("📸 Photos for {} ({}):", sku, photos.len());
    for photo in &photos {
        print_photo(photo);
    }
    let total: u64 = photos.iter().map(|p| p.size_bytes).sum();
    println!("Total size: {:.2} MB", bytes_to_mb(total));
    Ok(())
}

#[derive(Args, Debug)]
pub struct PhotoFileArgs {
    pub sku: String,
    pub filename: String,
}

pub fn remove_photo(ctx: &mut Context, args: &PhotoFileArgs) -> Result<()> {
    let sku = ctx.item(&args.sku)?.item.sku;
    let manager = ctx.photos();
    manager.remove_photo(&sku, &args.filename)?;
    sync(ctx, &manager, &sku)?;
    println!("✅ Removed {} from {}", args.filename, sku);
    Ok(())
}

pub fn set_primary_photo(ctx: &mut Context, args: &PhotoFileArgs) -> Result<()> {
    let sku = ctx.item(&args.sku)?.item.sku;
    let manager = ctx.photos();
    let primary = manager.set_primary_photo(&sku, &args.filename)?;
    sync(ctx, &manager, &sku)?;
    println!("✅ {} is now the primary photo for {} ({})", args.filename, sku, primary);
    Ok(())
}

#[derive(Args, Debug)]
pub struct CopyPhotosArgs {
    pub source_sku: String,
    pub dest_sku: String,
}

pub fn copy_photos(ctx: &mut Context, args: &CopyPhotosArgs) -> Result<()> {
    let source = ctx.item(&args.source_sku)?.item.sku;
    let dest = ctx.item(&args.dest_sku)?.item.sku;
    let manager = ctx.photos();

    let copied = manager.copy_photos(&source, &dest)?;
    if copied == 0 {
        println!("No photos to copy from {}", source);
        return Ok(());
    }
    sync(ctx, &manager, &dest)?;
    println!("✅ Copied {} photo(s) from {} to {}", copied, source, dest);
    Ok(())
}

#[derive(Args, Debug)]
pub struct PhotoStatsArgs {
    /// Remove photo directories that belong to no item
    #[arg(long)]
    pub cleanup: bool,
}

pub fn photo_stats(ctx: &Context, args: &PhotoStatsArgs) -> Result<()> {
    let manager = ctx.photos();
    let stats = manager.storage_stats()?;

    println!("📊 Photo Storage Statistics");
    println!("{}", rule(40));
    println!("Storage path: {}", stats.storage_path);
    println!("Item directories: {}", stats.directories);
    println!("Total files: {}", stats.total_files);
    println!("Total size: {:.2} MB", stats.total_size_mb());

    if args.cleanup {
        let known: HashSet<String> = all_skus(&ctx.conn)?.into_iter().collect();
        let result = manager.cleanup_orphans(&known)?;
        println!(
            "\n🧹 Removed {} orphaned director(ies) containing {} file(s)",
            result.removed_directories, result.removed_files
        );
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct OptimizePhotosArgs {
    /// Only this item's photos
    #[arg(long)]
    pub sku: Option<String>,
}

pub fn optimize_photos(ctx: &Context, args: &OptimizePhotosArgs) -> Result<()> {
    let sku = match args.sku.as_deref() {
        Some(sku) => Some(ctx.item(sku)?.item.sku),
        None => None,
    };
    let result = ctx.photos().optimize(sku.as_deref())?;

    println!("✅ Optimized {} photo(s)", result.optimized_count);
    println!("   Space saved: {:.2} MB", bytes_to_mb(result.saved_bytes));
    if !result.errors.is_empty() {
        println!("⚠️  {} error(s):", result.errors.len());
        for error in &result.errors {
            println!("  • {}", error);
        }
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct FindDuplicatesArgs {
    /// Directory to scan (defaults to photo storage)
    #[arg(long)]
    pub directory: Option<PathBuf>,
    /// Delete all but the first copy in each group
    #[arg(long)]
    pub remove: bool,
}

pub fn find_duplicate_photos(ctx: &Context, args: &FindDuplicatesArgs) -> Result<()> {
    let dir = args
        .directory
        .clone()
        .unwrap_or_else(|| ctx.photos().storage_path().to_path_buf());
    if !dir.is_dir() {
        return Err(InventoryError::not_found(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }

    let groups = find_duplicates(&dir)?;
    if groups.is_empty() {
        println!("✅ No duplicate photos found");
        return Ok(());
    }

    println!("🔍 Found {} group(s) of duplicates:", groups.len());
    for group in &groups {
        println!("\n{}:", &group.hash[..12.min(group.hash.len())]);
        for (i, path) in group.files.iter().enumerate() {
            let marker = if i == 0 { "keep" } else { "dup " };
            println!("  [{}] {}", marker, path.display());
        }
    }

    if args.remove {
        let (removed, saved) = remove_duplicates(&groups);
        println!(
            "\n🗑️  Removed {} duplicate(s), freed {:.2} MB",
            removed,
            bytes_to_mb(saved)
        );
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct RemoveExifArgs {
    pub input: PathBuf,
    /// Defaults to `no_exif_<name>` beside the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn remove_exif(args: &RemoveExifArgs) -> Result<()> {
    let output = strip_exif(&args.input, args.output.as_deref())?;
    println!("✅ Removed EXIF data: {}", output.display());
    Ok(())
}

#[derive(Args, Debug)]
pub struct BulkAddPhotosArgs {
    pub sku: String,
    pub directory: PathBuf,
    /// Filename pattern, `*` and `?` wildcards
    #[arg(long, default_value = "*")]
    pub pattern: String,
}

pub fn bulk_add_photos(ctx: &mut Context, args: &BulkAddPhotosArgs) -> Result<()> {
    let sku = ctx.item(&args.sku)?.item.sku;
    let files = matching_files(&args.directory, &args.pattern)?;
    if files.is_empty() {
        println!(
            "No photos matching '{}' in {}",
            args.pattern,
            args.directory.display()
        );
        return Ok(());
    }

    let manager = ctx.photos();
    let mut added = 0;
    let mut failed = 0;
    for file in &files {
        match manager.add_photo(&sku, file, None) {
            Ok(info) => {
                added += 1;
                println!("  ✅ {} → {}", file.display(), info.filename);
            }
            Err(e) => {
                failed += 1;
                println!("  ❌ {}: {}", file.display(), e);
            }
        }
    }
    sync(ctx, &manager, &sku)?;

    println!("\nAdded {} photo(s) to {}", added, sku);
    if failed > 0 {
        println!("{} file(s) failed", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::database::items::{insert_item, tests::new_item};
    use crate::database::photos::photos_for_item;
    use crate::database::tests::test_db;
    use image::{Rgb, RgbImage};
    use rust_decimal_macros::dec;
    use std::path::Path;

    fn context(photos: &Path) -> Context {
        let mut config = Config::default();
        config.photos.storage_path = photos.display().to_string();
        let conn = test_db();
        insert_item(&conn, &new_item("NIK001", "Nike", "10", dec!(250))).unwrap();
        insert_item(&conn, &new_item("NIK002", "Nike", "11", dec!(250))).unwrap();
        Context {
            config_path: PathBuf::from("config.yaml"),
            config,
            conn,
        }
    }

    fn write_jpeg(path: &Path, shade: u8) {
        RgbImage::from_pixel(40, 30, Rgb([shade, 0, 0])).save(path).unwrap();
    }

    #[test]
    fn add_primary_then_copy_keeps_rows_in_sync() {
        let storage = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        let mut ctx = context(storage.path());
        let shot = source.path().join("shot.jpg");
        write_jpeg(&shot, 200);

        add_photo(
            &mut ctx,
            &AddPhotoArgs {
                sku: "nik001".to_string(),
                photo_path: shot,
                filename: None,
                primary: true,
            },
        )
        .unwrap();
        let item_id = ctx.item("NIK001").unwrap().item.id;
        let rows = photos_for_item(&ctx.conn, item_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file_path, "NIK001/00000000_000000.jpg");

        copy_photos(
            &mut ctx,
            &CopyPhotosArgs {
                source_sku: "NIK001".to_string(),
                dest_sku: "NIK002".to_string(),
            },
        )
        .unwrap();
        let dest_id = ctx.item("NIK002").unwrap().item.id;
        assert_eq!(photos_for_item(&ctx.conn, dest_id).unwrap().len(), 1);

        remove_photo(
            &mut ctx,
            &PhotoFileArgs {
                sku: "NIK002".to_string(),
                filename: "00000000_000000.jpg".to_string(),
            },
        )
        .unwrap();
        assert!(photos_for_item(&ctx.conn, dest_id).unwrap().is_empty());
    }

    #[test]
    fn bulk_add_respects_pattern() {
        let storage = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        let mut ctx = context(storage.path());
        write_jpeg(&source.path().join("front.jpg"), 10);
        write_jpeg(&source.path().join("back.jpg"), 20);
        std::fs::write(source.path().join("notes.txt"), "not a photo").unwrap();

        bulk_add_photos(
            &mut ctx,
            &BulkAddPhotosArgs {
                sku: "NIK001".to_string(),
                directory: source.path().to_path_buf(),
                pattern: "f*".to_string(),
            },
        )
        .unwrap();
        assert_eq!(ctx.photos().photo_filenames("NIK001").unwrap().len(), 1);
    }

    #[test]
    fn unknown_sku_is_a_user_error() {
        let storage = tempfile::tempdir().unwrap();
        let ctx = context(storage.path());
        let err = list_photos(
            &ctx,
            &ListPhotosArgs {
                sku: "ZZZ999".to_string(),
            },
        )
        .unwrap_err();
        assert!(err.is_user_error());
    }
}
