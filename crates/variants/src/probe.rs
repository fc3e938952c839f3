use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use anyhow::{Context, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};
use crate::error::{Result, VariantError};

/// Raw ffprobe output structure
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeData {
    pub streams: Option<Vec<FFProbeStream>>,
    pub format: Option<FFProbeFormat>,
}

/// Format-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeFormat {
    pub format_name: Option<String>,
    pub duration: Option<String>,
    pub size: Option<String>,
    pub bit_rate: Option<String>,
}

/// Stream-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeStream {
    pub index: u32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<u32>,
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
    pub tags: Option<HashMap<String, String>>,
}

/// Kind of elementary stream inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    #[serde(other)]
    Other,
}

impl StreamKind {
    fn from_codec_type(codec_type: Option<&str>) -> Self {
        match codec_type {
            Some("video") => StreamKind::Video,
            Some("audio") => StreamKind::Audio,
            Some("subtitle") => StreamKind::Subtitle,
            _ => StreamKind::Other,
        }
    }
}

/// Normalized description of one stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Index of the stream inside its container
    pub index: u32,
    pub kind: StreamKind,
    pub codec_name: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<u32>,
    pub language: Option<String>,
    /// Seconds
    pub duration: f64,
    pub bit_rate: Option<u64>,
}

impl StreamDescriptor {
    pub fn is_video(&self) -> bool {
        self.kind == StreamKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.kind == StreamKind::Audio
    }
}

/// Container-level metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerFormat {
    pub format_name: String,
    /// Seconds
    pub duration: f64,
    /// Bytes
    pub size: u64,
    pub bit_rate: Option<u64>,
}

/// Structural metadata of a probed media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub format: ContainerFormat,
    pub streams: Vec<StreamDescriptor>,
}

impl ProbeResult {
    pub fn video_streams(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter().filter(|s| s.is_video())
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter().filter(|s| s.is_audio())
    }
}

impl TryFrom<FFProbeData> for ProbeResult {
    type Error = VariantError;

    fn try_from(data: FFProbeData) -> Result<Self> {
        let format = data
            .format
            .ok_or_else(|| VariantError::invalid_input("The file is invalid. Cannot get format information"))?;
        let streams = data
            .streams
            .ok_or_else(|| VariantError::invalid_input("The file is invalid. Cannot get stream information"))?;

        let container_duration = parse_f64(format.duration.as_deref()).unwrap_or(0.0);
        let format = ContainerFormat {
            format_name: format.format_name.unwrap_or_default(),
            duration: container_duration,
            size: parse_u64(format.size.as_deref()).unwrap_or(0),
            bit_rate: parse_u64(format.bit_rate.as_deref()),
        };

        let streams = streams
            .into_iter()
            .map(|s| StreamDescriptor {
                index: s.index,
                kind: StreamKind::from_codec_type(s.codec_type.as_deref()),
                codec_name: s.codec_name.unwrap_or_default(),
                width: s.width,
                height: s.height,
                channels: s.channels,
                language: s.tags.as_ref().and_then(|t| t.get("language").cloned()),
                // Matroska only reports duration on the container
                duration: parse_f64(s.duration.as_deref()).unwrap_or(container_duration),
                bit_rate: parse_u64(s.bit_rate.as_deref()),
            })
            .collect();

        Ok(ProbeResult { format, streams })
    }
}

fn parse_f64(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok())
}

fn parse_u64(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse::<u64>().ok())
}

/// Turns a media file into structured stream metadata.
///
/// Implementations must be safe to share across worker threads.
pub trait Prober: Send + Sync {
    /// Probe the file at `path`. Fails with [`VariantError::InvalidInput`] when the
    /// path is not a readable container or lacks stream/format information.
    fn probe(&self, path: &Path) -> Result<ProbeResult>;
}

/// [`Prober`] backed by the ffprobe binary
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    pub ffprobe_bin: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self { ffprobe_bin: ffprobe_bin.into() }
    }

    /// Run ffprobe and return its JSON output
    fn execute_ffprobe(&self, file_path: &Path) -> anyhow::Result<String> {
        if !file_path.exists() {
            return Err(anyhow!("File does not exist: {}", file_path.display()));
        }

        debug!("Executing ffprobe for: {}", file_path.display());

        let output = Command::new(&self.ffprobe_bin)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg("-show_format")
            .arg(file_path)
            .output()
            .with_context(|| format!(
                "Failed to execute ffprobe for: {}. Ensure ffprobe is installed and accessible at: {}",
                file_path.display(),
                self.ffprobe_bin.display()
            ))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "ffprobe failed (exit code {}) for {}: {}",
                output.status.code().unwrap_or(-1),
                file_path.display(),
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).context("ffprobe output is not valid UTF-8")
    }
}

impl Prober for FfprobeProber {
    fn probe(&self, path: &Path) -> Result<ProbeResult> {
        let json_str = self
            .execute_ffprobe(path)
            .map_err(|e| VariantError::invalid_input(format!("{:#}", e)))?;

        let data: FFProbeData = serde_json::from_str(&json_str).map_err(|e| {
            VariantError::invalid_input(format!("Failed to parse ffprobe JSON for {}: {}", path.display(), e))
        })?;

        ProbeResult::try_from(data)
    }
}
