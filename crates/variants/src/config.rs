use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::engine::EncodeSettings;
use crate::select::LanguagePreference;
use crate::tier::TierSet;

/// Configuration for the variant pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Path to the ffprobe binary
    pub ffprobe_bin: PathBuf,
    /// Root directory under which one sub-directory per input is created
    pub output_root: PathBuf,
    /// Tier names to produce when the caller does not pass any (e.g. ["all"], ["sd", "720"])
    pub tiers: Vec<String>,
    /// Audio language that gets the highest selection bonus
    pub primary_language: String,
    /// Audio language that gets the secondary selection bonus
    pub secondary_language: String,
    /// Upper bound on encode jobs running at the same time
    pub max_concurrent_jobs: usize,
    /// Per-job timeout; a job exceeding it is dropped like a failed one
    pub job_timeout_secs: Option<u64>,
    /// Fraction of the stream duration around which stills are captured
    pub seeker: f64,
    /// Edge length of the square thumbnail
    pub thumbnail_size: u32,
    /// Height of the placeholder frame
    pub frame_height: u32,
    pub video_codec: String,
    pub pixel_format: String,
    pub audio_codec: String,
    pub container_format: String,
    /// Output frame rate of every rendition
    pub frame_rate: u32,
    /// Discard ffmpeg's stderr chatter
    pub quiet_engine: bool,
    /// Write video_object.json next to the artifacts
    pub write_manifest: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl PipelineConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);

        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            output_root: PathBuf::from("./output"),
            tiers: vec!["all".to_string()],
            primary_language: "mal".to_string(),
            secondary_language: "eng".to_string(),
            max_concurrent_jobs: workers,
            job_timeout_secs: None,
            seeker: 0.2,
            thumbnail_size: 90,
            frame_height: 480,
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "libmp3lame".to_string(),
            container_format: "mp4".to_string(),
            frame_rate: 24,
            quiet_engine: true,
            write_manifest: true,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        if config.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be at least 1");
        }

        Ok(config)
    }

    /// Parse the configured tier names into a tier set
    pub fn tier_set(&self) -> Result<TierSet> {
        TierSet::parse_list(&self.tiers)
            .with_context(|| format!("Invalid tier list in config: {:?}", self.tiers))
    }

    pub fn languages(&self) -> LanguagePreference {
        LanguagePreference {
            primary: self.primary_language.clone(),
            secondary: self.secondary_language.clone(),
        }
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            video_codec: self.video_codec.clone(),
            pixel_format: self.pixel_format.clone(),
            audio_codec: self.audio_codec.clone(),
            container_format: self.container_format.clone(),
            frame_rate: self.frame_rate,
        }
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}
