use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively list files under `folder` whose name ends with `image_type`.
///
/// The suffix match is case-sensitive (`.JPG` does not match `IMG_1.jpg`).
/// Unreadable entries are skipped. The result is sorted.
pub fn discover_images(folder: &Path, image_type: &str) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(image_type))
        .map(|e| e.into_path())
        .collect();
    images.sort();
    images
}
