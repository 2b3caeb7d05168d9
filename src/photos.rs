//! Photo storage for inventory items
//!
//! Photos live under `<storage_path>/<SKU>/`. Every stored file is decoded and
//! re-encoded, which drops EXIF and other metadata, and is shrunk to fit within
//! `MAX_DIMENSION`. Filenames are timestamps, so sorting by name gives the
//! order the photos were added; the primary photo uses an all-zero timestamp
//! and therefore always sorts first.

use crate::database::photos::sync_item_photos;
use crate::error::{InventoryError, Result};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

/// Longest edge, in pixels, of a stored photo
pub const MAX_DIMENSION: u32 = 1920;

pub const JPEG_QUALITY: u8 = 85;

/// File stem that marks the primary photo
pub const PRIMARY_STEM: &str = "00000000_000000";

/// Metadata for one stored photo
#[derive(Debug, Clone, Serialize)]
pub struct PhotoInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// `WIDTHxHEIGHT`, absent when the file could not be decoded
    pub dimensions: Option<String>,
    pub format: Option<String>,
    pub modified_at: Option<DateTime<Local>>,
    pub error: Option<String>,
}

impl PhotoInfo {
    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    pub storage_path: String,
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub directories: usize,
}

impl StorageStats {
    pub fn total_size_mb(&self) -> f64 {
        bytes_to_mb(self.total_size_bytes)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupResult {
    pub removed_directories: usize,
    pub removed_files: usize,
}

#[derive(Debug, Clone, Default)]
pub struct OptimizeResult {
    pub optimized_count: usize,
    pub saved_bytes: u64,
    pub errors: Vec<String>,
}

/// Files sharing one content hash; the first is the one to keep
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub hash: String,
    pub files: Vec<PathBuf>,
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}

/// Lower-cased extension of a path, without the dot
fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

fn is_jpeg(format: ImageFormat) -> bool {
    format == ImageFormat::Jpeg
}

fn output_format(path: &Path) -> Result<ImageFormat> {
    extension(path)
        .filter(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .and_then(|ext| ImageFormat::from_extension(&ext))
        .ok_or_else(|| {
            InventoryError::validation(format!(
                "Unsupported image format: {}",
                path.extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_else(|| path.display().to_string())
            ))
        })
}

/// JPEG has no alpha channel; transparent pixels become white
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

fn shrink_to_fit(img: DynamicImage) -> DynamicImage {
    if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    }
}

/// Encode `img` to `dest` in `format`. Only pixel data is written.
fn write_image(img: &DynamicImage, dest: &Path, format: ImageFormat) -> Result<()> {
    let mut writer = BufWriter::new(fs::File::create(dest)?);
    if is_jpeg(format) {
        let rgb = if img.color().has_alpha() {
            flatten_onto_white(img)
        } else {
            img.to_rgb8()
        };
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(&rgb)?;
    } else {
        img.write_to(&mut writer, format)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn file_hash(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Translate a shell wildcard (`*`, `?`) into an anchored regex
fn glob_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re)
        .map_err(|e| InventoryError::validation(format!("Invalid pattern '{}': {}", pattern, e)))
}

/// Supported image files directly inside `dir` whose name matches `pattern`, sorted
pub fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(InventoryError::not_found(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }
    let re = glob_regex(pattern)?;
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_supported(path))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| re.is_match(name))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() && is_supported(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Group supported images under `dir` (recursively) by SHA-256 content hash.
///
/// Only groups with more than one file are returned, in the order their first
/// file was found.
pub fn find_duplicates(dir: &Path) -> Result<Vec<DuplicateGroup>> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;

    let mut order: Vec<String> = Vec::new();
    let mut by_hash: HashMap<String, Vec<PathBuf>> = HashMap::new();
    for path in files {
        let hash = match file_hash(&path) {
            Ok(hash) => hash,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let group = by_hash.entry(hash.clone()).or_default();
        if group.is_empty() {
            order.push(hash);
        }
        group.push(path);
    }

    Ok(order
        .into_iter()
        .filter_map(|hash| {
            let files = by_hash.remove(&hash)?;
            (files.len() > 1).then_some(DuplicateGroup { hash, files })
        })
        .collect())
}

/// Delete every file but the first in each group. Returns files removed and bytes freed.
pub fn remove_duplicates(groups: &[DuplicateGroup]) -> (usize, u64) {
    let mut removed = 0;
    let mut saved = 0;
    for group in groups {
        for path in group.files.iter().skip(1) {
            let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(path) {
                Ok(()) => {
                    removed += 1;
                    saved += size;
                }
                Err(e) => log::warn!("Failed to remove duplicate {}: {}", path.display(), e),
            }
        }
    }
    (removed, saved)
}

/// Re-encode `input` without metadata.
///
/// Writes to `output`, or to `no_exif_<name>` beside the input.
pub fn strip_exif(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    if !input.is_file() {
        return Err(InventoryError::not_found(format!(
            "Input file not found: {}",
            input.display()
        )));
    }
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            input.with_file_name(format!("no_exif_{}", name))
        }
    };

    let format = output_format(&output)?;
    let img = image::open(input)?;
    write_image(&img, &output, format)?;
    Ok(output)
}

/// Manages the per-SKU photo directories
pub struct PhotoManager {
    storage_path: PathBuf,
}

impl PhotoManager {
    /// Create a manager rooted at `storage_path`, creating the directory if needed
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();

        if let Err(e) = fs::create_dir_all(&storage_path) {
            log::warn!("Failed to create photo storage directory: {}", e);
        } else {
            log::debug!("Photo storage directory: {:?}", storage_path);
        }

        Self { storage_path }
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn item_dir(&self, sku: &str) -> PathBuf {
        self.storage_path.join(sku.trim().to_uppercase())
    }

    pub fn create_item_dir(&self, sku: &str) -> Result<PathBuf> {
        let dir = self.item_dir(sku);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn photo_path(&self, sku: &str, filename: &str) -> Result<PathBuf> {
        if filename.is_empty() || filename.contains(['/', '\\']) || filename.starts_with('.') {
            return Err(InventoryError::validation(format!(
                "Invalid photo filename: {}",
                filename
            )));
        }
        Ok(self.item_dir(sku).join(filename))
    }

    /// Process `source` into the item's directory.
    ///
    /// Without a filename the photo is named after the current time, with a
    /// numeric suffix when that name is taken.
    pub fn add_photo(&self, sku: &str, source: &Path, filename: Option<&str>) -> Result<PhotoInfo> {
        if !source.is_file() {
            return Err(InventoryError::not_found(format!(
                "Source photo not found: {}",
                source.display()
            )));
        }
        output_format(source)?;

        let dir = self.create_item_dir(sku)?;
        let dest = match filename.map(str::trim).filter(|f| !f.is_empty()) {
            Some(name) => self.photo_path(sku, name)?,
            None => {
                let ext = extension(source).unwrap_or_else(|| "jpg".to_string());
                unique_timestamp_path(&dir, &ext)
            }
        };
        let format = output_format(&dest)?;

        let img = shrink_to_fit(image::open(source)?);
        write_image(&img, &dest, format)?;
        log::info!("Added photo {} to {}", dest.display(), sku);

        Ok(photo_info(&dest))
    }

    /// Photos for an item, sorted by filename (primary first)
    pub fn list_photos(&self, sku: &str) -> Result<Vec<PhotoInfo>> {
        Ok(self
            .photo_filenames(sku)?
            .iter()
            .map(|name| photo_info(&self.item_dir(sku).join(name)))
            .collect())
    }

    pub fn photo_filenames(&self, sku: &str) -> Result<Vec<String>> {
        let dir = self.item_dir(sku);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_supported(path))
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn primary_photo(&self, sku: &str) -> Result<Option<String>> {
        Ok(self.photo_filenames(sku)?.into_iter().next())
    }

    pub fn remove_photo(&self, sku: &str, filename: &str) -> Result<()> {
        let path = self.photo_path(sku, filename)?;
        if !path.is_file() {
            return Err(photo_not_found(sku, filename));
        }
        fs::remove_file(&path)?;
        log::info!("Removed photo {}", path.display());
        Ok(())
    }

    /// Make `filename` the primary photo, returning its new name.
    ///
    /// A previous primary is renamed to a fresh timestamp so it joins the gallery.
    pub fn set_primary_photo(&self, sku: &str, filename: &str) -> Result<String> {
        let path = self.photo_path(sku, filename)?;
        if !path.is_file() {
            return Err(photo_not_found(sku, filename));
        }
        let ext = extension(&path).unwrap_or_else(|| "jpg".to_string());
        let primary_name = format!("{}.{}", PRIMARY_STEM, ext);
        if filename == primary_name {
            return Ok(primary_name);
        }

        let dir = self.item_dir(sku);
        for existing in self.photo_filenames(sku)? {
            let existing_path = dir.join(&existing);
            if existing_path.file_stem().and_then(|s| s.to_str()) == Some(PRIMARY_STEM) {
                let existing_ext = extension(&existing_path).unwrap_or_else(|| ext.clone());
                let backup = unique_timestamp_path(&dir, &existing_ext);
                fs::rename(&existing_path, &backup)?;
                log::debug!("Moved previous primary {} to {}", existing, backup.display());
            }
        }

        fs::rename(&path, dir.join(&primary_name))?;
        log::info!("Set {} as primary photo for {}", filename, sku);
        Ok(primary_name)
    }

    /// Copy every photo of `source_sku` to `dest_sku`, returning how many were copied
    pub fn copy_photos(&self, source_sku: &str, dest_sku: &str) -> Result<usize> {
        let names = self.photo_filenames(source_sku)?;
        if names.is_empty() {
            return Ok(0);
        }
        let source_dir = self.item_dir(source_sku);
        let dest_dir = self.create_item_dir(dest_sku)?;
        for name in &names {
            fs::copy(source_dir.join(name), dest_dir.join(name))?;
        }
        log::info!("Copied {} photos from {} to {}", names.len(), source_sku, dest_sku);
        Ok(names.len())
    }

    fn item_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.storage_path.is_dir() {
            return Ok(Vec::new());
        }
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.storage_path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    pub fn storage_stats(&self) -> Result<StorageStats> {
        let mut stats = StorageStats {
            storage_path: self.storage_path.display().to_string(),
            ..Default::default()
        };
        for dir in self.item_dirs()? {
            stats.directories += 1;
            for entry in fs::read_dir(&dir)? {
                let metadata = entry?.metadata()?;
                if metadata.is_file() {
                    stats.total_files += 1;
                    stats.total_size_bytes += metadata.len();
                }
            }
        }
        Ok(stats)
    }

    /// Remove directories whose name is not a known SKU
    pub fn cleanup_orphans(&self, known_skus: &HashSet<String>) -> Result<CleanupResult> {
        let known: HashSet<String> = known_skus.iter().map(|s| s.to_uppercase()).collect();
        let mut result = CleanupResult::default();

        for dir in self.item_dirs()? {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if known.contains(&name) {
                continue;
            }
            let files = fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_file())
                .count();
            fs::remove_dir_all(&dir)?;
            log::info!("Removed orphaned photo directory {}", dir.display());
            result.removed_directories += 1;
            result.removed_files += files;
        }
        Ok(result)
    }

    /// Re-encode photos for one SKU, or all of them, keeping smaller results only
    pub fn optimize(&self, sku: Option<&str>) -> Result<OptimizeResult> {
        let dirs = match sku {
            Some(sku) => vec![self.item_dir(sku)],
            None => self.item_dirs()?,
        };

        let mut result = OptimizeResult::default();
        for dir in dirs {
            if !dir.is_dir() {
                continue;
            }
            let dir_name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut photos: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && is_supported(path))
                .collect();
            photos.sort();

            for path in photos {
                match optimize_file(&path) {
                    Ok(Some(saved)) => {
                        result.optimized_count += 1;
                        result.saved_bytes += saved;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                        result
                            .errors
                            .push(format!("{}/{}: {}", dir_name, name.unwrap_or_default(), e));
                    }
                }
            }
        }
        Ok(result)
    }

    /// Rewrite the photo rows for an item from its directory listing
    pub fn sync_to_database(&self, conn: &mut Connection, item_id: i64, sku: &str) -> Result<usize> {
        let sku = sku.trim().to_uppercase();
        let paths: Vec<String> = self
            .photo_filenames(&sku)?
            .into_iter()
            .map(|name| format!("{}/{}", sku, name))
            .collect();
        Ok(sync_item_photos(conn, item_id, &paths)?)
    }
}

fn photo_not_found(sku: &str, filename: &str) -> InventoryError {
    InventoryError::not_found(format!(
        "Photo '{}' not found for {}",
        filename,
        sku.trim().to_uppercase()
    ))
}

fn unique_timestamp_path(dir: &Path, ext: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut path = dir.join(format!("{}.{}", stamp, ext));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.{}", stamp, n, ext));
        n += 1;
    }
    path
}

/// Returns bytes saved when the re-encoded file replaced the original
fn optimize_file(path: &Path) -> Result<Option<u64>> {
    let original_size = fs::metadata(path)?.len();
    let format = output_format(path)?;
    let img = shrink_to_fit(image::open(path)?);

    let temp = path.with_extension("tmp");
    if let Err(e) = write_image(&img, &temp, format) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    let new_size = fs::metadata(&temp)?.len();
    if new_size < original_size {
        fs::rename(&temp, path)?;
        Ok(Some(original_size - new_size))
    } else {
        fs::remove_file(&temp)?;
        Ok(None)
    }
}

fn photo_info(path: &Path) -> PhotoInfo {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let metadata = fs::metadata(path).ok();
    let mut info = PhotoInfo {
        filename,
        path: path.to_path_buf(),
        size_bytes: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
        dimensions: None,
        format: ImageFormat::from_path(path)
            .ok()
            .map(|f| format!("{:?}", f).to_uppercase()),
        modified_at: metadata
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Local>::from),
        error: None,
    };
    match image::image_dimensions(path) {
        Ok((w, h)) => info.dimensions = Some(format!("{}x{}", w, h)),
        Err(e) => info.error = Some(e.to_string()),
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, shade: u8) {
        let img = RgbaImage::from_pixel(width, height, Rgba([shade, 40, 90, 255]));
        img.save(path).unwrap();
    }

    fn setup() -> (TempDir, PhotoManager) {
        let dir = TempDir::new().unwrap();
        let manager = PhotoManager::new(dir.path().join("photos"));
        (dir, manager)
    }

    #[test]
    fn add_photo_shrinks_large_images() {
        let (dir, manager) = setup();
        let source = dir.path().join("big.png");
        write_png(&source, 2400, 600, 10);

        let info = manager.add_photo("nik001", &source, None).unwrap();
        assert!(info.filename.ends_with(".png"));
        assert!(info.error.is_none());
        let (w, h) = image::image_dimensions(&info.path).unwrap();
        assert_eq!(w, MAX_DIMENSION);
        assert!(h < 600);
        assert!(manager.item_dir("NIK001").join(&info.filename).exists());
    }

    #[test]
    fn add_photo_flattens_alpha_for_jpeg() {
        let (dir, manager) = setup();
        let source = dir.path().join("clear.png");
        RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]))
            .save(&source)
            .unwrap();

        let info = manager.add_photo("NIK001", &source, Some("front.jpg")).unwrap();
        assert_eq!(info.filename, "front.jpg");
        assert_eq!(info.format.as_deref(), Some("JPEG"));
        let img = image::open(&info.path).unwrap().to_rgb8();
        assert!(img.get_pixel(0, 0).0.iter().all(|c| *c > 240));
    }

    #[test]
    fn add_photo_rejects_bad_input() {
        let (dir, manager) = setup();
        let err = manager
            .add_photo("NIK001", &dir.path().join("missing.jpg"), None)
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));

        let gif = dir.path().join("anim.gif");
        fs::write(&gif, b"GIF89a").unwrap();
        let err = manager.add_photo("NIK001", &gif, None).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported image format: .gif");

        let source = dir.path().join("ok.png");
        write_png(&source, 2, 2, 0);
        assert!(manager.add_photo("NIK001", &source, Some("../x.png")).is_err());
    }

    #[test]
    fn timestamp_names_do_not_collide() {
        let (dir, manager) = setup();
        let source = dir.path().join("a.png");
        write_png(&source, 2, 2, 0);
        let first = manager.add_photo("NIK001", &source, None).unwrap();
        let second = manager.add_photo("NIK001", &source, None).unwrap();
        assert_ne!(first.filename, second.filename);
        assert_eq!(manager.list_photos("NIK001").unwrap().len(), 2);
    }

    #[test]
    fn set_primary_sorts_first() {
        let (dir, manager) = setup();
        let source = dir.path().join("a.png");
        write_png(&source, 2, 2, 0);
        manager.add_photo("NIK001", &source, Some("a.png")).unwrap();
        manager.add_photo("NIK001", &source, Some("b.png")).unwrap();

        let name = manager.set_primary_photo("NIK001", "b.png").unwrap();
        assert_eq!(name, "00000000_000000.png");
        assert_eq!(manager.primary_photo("NIK001").unwrap().as_deref(), Some(name.as_str()));

        // The old primary moves back into the gallery
        manager.set_primary_photo("NIK001", "a.png").unwrap();
        let names = manager.photo_filenames("NIK001").unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "00000000_000000.png");
        assert!(!names.contains(&"a.png".to_string()));

        let err = manager.set_primary_photo("NIK001", "nope.png").unwrap_err();
        assert_eq!(err.to_string(), "Photo 'nope.png' not found for NIK001");
    }

    #[test]
    fn remove_and_copy() {
        let (dir, manager) = setup();
        let source = dir.path().join("a.png");
        write_png(&source, 2, 2, 0);
        manager.add_photo("NIK001", &source, Some("a.png")).unwrap();
        manager.add_photo("NIK001", &source, Some("b.png")).unwrap();

        assert_eq!(manager.copy_photos("NIK001", "nik001-2").unwrap(), 2);
        assert_eq!(manager.photo_filenames("NIK001-2").unwrap(), vec!["a.png", "b.png"]);
        assert_eq!(manager.copy_photos("ADI001", "NIK001").unwrap(), 0);

        manager.remove_photo("NIK001", "a.png").unwrap();
        assert_eq!(manager.photo_filenames("NIK001").unwrap(), vec!["b.png"]);
        assert!(manager.remove_photo("NIK001", "a.png").is_err());
    }

    #[test]
    fn stats_and_cleanup() {
        let (dir, manager) = setup();
        let source = dir.path().join("a.png");
        write_png(&source, 2, 2, 0);
        manager.add_photo("NIK001", &source, None).unwrap();
        manager.add_photo("OLD001", &source, None).unwrap();
        manager.add_photo("OLD001", &source, None).unwrap();

        let stats = manager.storage_stats().unwrap();
        assert_eq!(stats.directories, 2);
        assert_eq!(stats.total_files, 3);
        assert!(stats.total_size_bytes > 0);

        let known: HashSet<String> = ["nik001".to_string()].into_iter().collect();
        let result = manager.cleanup_orphans(&known).unwrap();
        assert_eq!(
            result,
            CleanupResult {
                removed_directories: 1,
                removed_files: 2
            }
        );
        assert!(!manager.item_dir("OLD001").exists());
        assert!(manager.item_dir("NIK001").exists());
    }

    #[test]
    fn optimize_keeps_smaller_files_only() {
        let (_dir, manager) = setup();
        let photo_dir = manager.create_item_dir("NIK001").unwrap();
        // Padding after IEND makes the original larger than a clean re-encode
        let padded = photo_dir.join("padded.png");
        write_png(&padded, 8, 8, 0);
        let mut bytes = fs::read(&padded).unwrap();
        bytes.extend(vec![0u8; 4096]);
        fs::write(&padded, bytes).unwrap();
        fs::write(photo_dir.join("broken.jpg"), b"not an image").unwrap();

        let result = manager.optimize(Some("NIK001")).unwrap();
        assert_eq!(result.optimized_count, 1);
        assert!(result.saved_bytes >= 4096);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("NIK001/broken.jpg"));
        assert!(!photo_dir.join("padded.tmp").exists());
    }

    #[test]
    fn duplicates_by_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        fs::create_dir_all(&a).unwrap();
        write_png(&a.join("one.png"), 3, 3, 1);
        fs::copy(a.join("one.png"), dir.path().join("two.png")).unwrap();
        write_png(&dir.path().join("three.png"), 3, 3, 200);

        let groups = find_duplicates(dir.path()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 2);
        assert_eq!(groups[0].hash.len(), 64);

        let (removed, saved) = remove_duplicates(&groups);
        assert_eq!(removed, 1);
        assert!(saved > 0);
        assert!(groups[0].files[0].exists());
        assert!(!groups[0].files[1].exists());
    }

    #[test]
    fn strip_exif_writes_beside_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("shot.png");
        write_png(&input, 5, 5, 0);
        let out = strip_exif(&input, None).unwrap();
        assert_eq!(out, dir.path().join("no_exif_shot.png"));
        assert!(out.exists());

        let jpg = dir.path().join("clean.jpg");
        assert_eq!(strip_exif(&input, Some(&jpg)).unwrap(), jpg);
        assert!(strip_exif(&dir.path().join("none.png"), None).is_err());
    }

    #[test]
    fn wildcard_patterns() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("b_side.png"), 2, 2, 0);
        write_png(&dir.path().join("a_front.png"), 2, 2, 0);
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        image::RgbImage::new(2, 2).save(dir.path().join("c.jpg")).unwrap();

        let all = matching_files(dir.path(), "*").unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_front.png", "b_side.png", "c.jpg"]);
        assert_eq!(matching_files(dir.path(), "*.png").unwrap().len(), 2);
        assert_eq!(matching_files(dir.path(), "?_front.*").unwrap().len(), 1);
        assert!(matching_files(&dir.path().join("missing"), "*").is_err());
    }

    #[test]
    fn sync_records_primary_first() {
        let (dir, manager) = setup();
        let mut conn = crate::database::tests::test_db();
        let id = crate::database::items::insert_item(
            &conn,
            &crate::database::items::tests::new_item("NIK001", "Nike", "10", rust_decimal::Decimal::ONE),
        )
        .unwrap();
        let source = dir.path().join("a.png");
        write_png(&source, 2, 2, 0);
        manager.add_photo("NIK001", &source, Some("z.png")).unwrap();
        manager.add_photo("NIK001", &source, Some("y.png")).unwrap();
        manager.set_primary_photo("NIK001", "z.png").unwrap();

        assert_eq!(manager.sync_to_database(&mut conn, id, "nik001").unwrap(), 2);
        let rows = crate::database::photos::photos_for_item(&conn, id).unwrap();
        assert_eq!(rows[0].file_path, "NIK001/00000000_000000.png");
        assert_eq!(rows[0].photo_type.as_deref(), Some("primary"));
        assert_eq!(rows[1].file_path, "NIK001/y.png");
    }
}
