use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::assembler::VideoObject;

pub const MANIFEST_FILE: &str = "video_object.json";

/// Contents of the manifest written next to the artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Input the artifacts were generated from
    pub source: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub video_object: VideoObject,
}

impl Manifest {
    pub fn new(source: impl Into<PathBuf>, video_object: VideoObject) -> Self {
        Self {
            source: source.into(),
            generated_at: Utc::now(),
            video_object,
        }
    }
}

/// Get the path to the manifest inside an artifact directory
pub fn manifest_path(artifact_dir: &Path) -> PathBuf {
    artifact_dir.join(MANIFEST_FILE)
}

/// Write the manifest into the video object's output directory
pub fn write_manifest(manifest: &Manifest) -> Result<PathBuf> {
    let path = manifest_path(&manifest.video_object.output_directory);
    let json = serde_json::to_string_pretty(manifest).context("Failed to serialize manifest")?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
    Ok(path)
}

/// Read a manifest back from an artifact directory
pub fn read_manifest(artifact_dir: &Path) -> Result<Manifest> {
    let path = manifest_path(artifact_dir);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))
}
