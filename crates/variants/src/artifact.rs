//! Descriptors of files the pipeline has produced.

use std::io;
use std::path::{Path, PathBuf};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use crate::probe::ProbeResult;
use crate::tier::SizeTier;

/// One produced rendition, described by what the output actually contains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoVariantRecord {
    pub codec: String,
    pub height: u32,
    pub width: u32,
    /// Milliseconds
    pub duration: u64,
    /// File name including extension
    pub name: String,
    pub ext: String,
    pub size_category: u8,
    pub bit_rate: Option<u64>,
    pub mime_type: Option<String>,
}

/// One produced still image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    pub path: PathBuf,
    pub mime_type: Option<String>,
    /// Bytes
    pub size: u64,
    pub height: u32,
    pub width: u32,
    pub size_category: u8,
}

impl ImageItem {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Guess a MIME type from the file extension
pub fn guess_mime_type(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}

/// Remove whatever sits at `path` from an earlier run, so only a fresh write can
/// produce an artifact there
pub fn clear_output(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed stale artifact {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Build a record from the probe of a produced file.
///
/// Returns `None` when no video stream in the file has the height of a known tier.
pub fn variant_from_probe(path: &Path, probe: &ProbeResult) -> Option<VideoVariantRecord> {
    let matched = probe.video_streams().find_map(|stream| {
        stream
            .height
            .and_then(SizeTier::from_height)
            .map(|tier| (stream, tier))
    });

    let Some((stream, tier)) = matched else {
        warn!("File '{}' didn't match any variants", path.display());
        return None;
    };

    Some(VideoVariantRecord {
        codec: stream.codec_name.clone(),
        height: stream.height.unwrap_or(0),
        width: stream.width.unwrap_or(0),
        duration: (probe.format.duration * 1000.0) as u64,
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        ext: path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default(),
        size_category: tier.size_category(),
        bit_rate: stream.bit_rate,
        mime_type: guess_mime_type(path),
    })
}
