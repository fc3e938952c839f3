use std::path::{Path, PathBuf};
use anyhow::{Result, bail};
use log::{debug, info, warn};
use walkdir::WalkDir;

/// Media file extensions accepted as pipeline inputs
const MEDIA_EXTENSIONS: &[&str] = &["mkv", "mp4", "m4v", "avi", "mov", "webm", "wmv", "flv"];

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
}

/// Resolve `root` into the list of inputs to process.
///
/// A file is returned as-is, whatever its extension. A directory is walked
/// recursively for media files, returned in path order.
pub fn discover_inputs(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        bail!("Input does not exist: {}", root.display());
    }

    info!("Scanning directory: {}", root.display());

    let mut inputs = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error reading directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !is_media_file(path) {
            continue;
        }

        debug!("Found media file: {}", path.display());
        inputs.push(path.to_path_buf());
    }

    inputs.sort();
    info!("Found {} media file(s) under {}", inputs.len(), root.display());
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_single_file_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip");
        fs::write(&file, b"x").unwrap();
        assert_eq!(discover_inputs(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_directory_walk_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("season1");
        fs::create_dir(&nested).unwrap();
        for name in ["b.MKV", "notes.txt", "a.wmv"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::write(nested.join("ep1.flv"), b"x").unwrap();
        fs::write(nested.join("cover.jpg"), b"x").unwrap();

        let found = discover_inputs(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("a.wmv"), dir.path().join("b.MKV"), nested.join("ep1.flv")]
        );
    }

    #[test]
    fn test_missing_root() {
        assert!(discover_inputs(Path::new("/nonexistent/library")).is_err());
    }
}
