//! In-memory stand-ins for ffprobe and ffmpeg used by unit tests.
//!
//! `FakeEngine` writes each output as a JSON-encoded [`ProbeResult`] describing
//! what was "encoded", and `FakeProber` reads any file back the same way.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use anyhow::anyhow;
use crate::engine::{EncodeEngine, EngineConfig, StreamHandle};
use crate::error::{Result, VariantError};
use crate::probe::{ContainerFormat, ProbeResult, Prober, StreamDescriptor, StreamKind};

pub fn video_stream(index: u32, width: u32, height: u32) -> StreamDescriptor {
    StreamDescriptor {
        index,
        kind: StreamKind::Video,
        codec_name: "h264".to_string(),
        width: Some(width),
        height: Some(height),
        channels: None,
        language: None,
        duration: 60.0,
        bit_rate: None,
    }
}

pub fn audio_stream(index: u32, channels: u32, language: Option<&str>) -> StreamDescriptor {
    StreamDescriptor {
        index,
        kind: StreamKind::Audio,
        codec_name: "aac".to_string(),
        width: None,
        height: None,
        channels: Some(channels),
        language: language.map(str::to_string),
        duration: 60.0,
        bit_rate: Some(128_000),
    }
}

pub fn source_probe(streams: Vec<StreamDescriptor>) -> ProbeResult {
    ProbeResult {
        format: ContainerFormat {
            format_name: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            duration: 60.0,
            size: 10_485_760,
            bit_rate: Some(1_398_101),
        },
        streams,
    }
}

/// Write a fake source container that [`FakeProber`] understands
pub fn write_source(dir: &Path, name: &str, probe: &ProbeResult) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec(probe).unwrap()).unwrap();
    path
}

/// Reads files written by [`write_source`] or [`FakeEngine`]
#[derive(Debug, Default)]
pub struct FakeProber {
    pub probes: AtomicUsize,
}

impl Prober for FakeProber {
    fn probe(&self, path: &Path) -> Result<ProbeResult> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let content = std::fs::read(path)
            .map_err(|e| VariantError::invalid_input(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice(&content)
            .map_err(|e| VariantError::invalid_input(format!("{}: {}", path.display(), e)))
    }
}

/// One recorded engine invocation
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub inputs: Vec<StreamHandle>,
    pub output: PathBuf,
    pub config: EngineConfig,
}

/// Records invocations and fabricates outputs
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    /// Target heights whose encode fails after writing a truncated file
    pub fail_heights: HashSet<u32>,
    /// Target heights that exit cleanly but write nothing
    pub silent_heights: HashSet<u32>,
    /// Target height -> height actually written
    pub height_override: HashMap<u32, u32>,
    pub delay: Option<Duration>,
    /// Keep working past the timeout instead of stopping at it
    pub ignore_timeout: bool,
    pub duration: f64,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self { duration: 60.0, ..Default::default() }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    fn fabricate(&self, output: &Path, config: &EngineConfig, width: u32, height: u32) -> anyhow::Result<()> {
        let is_video = output.extension().and_then(|e| e.to_str()) == Some("mp4");
        if !is_video {
            std::fs::write(output, b"\xFF\xD8\xFF\xE0fake-jpeg")?;
            return Ok(());
        }

        let height = self.height_override.get(&height).copied().unwrap_or(height);
        let mut video = video_stream(0, width, height);
        video.bit_rate = Some(height as u64 * 1000);
        video.duration = self.duration;
        let mut streams = vec![video];
        if let Some(channels) = config.get("ac").and_then(|c| c.parse().ok()) {
            streams.push(audio_stream(1, channels, None));
        }
        let mut probe = source_probe(streams);
        probe.format.duration = self.duration;
        std::fs::write(output, serde_json::to_vec(&probe)?)?;
        Ok(())
    }
}

/// Pull `W:H` out of the first `scale=` filter
pub fn scale_of(config: &EngineConfig) -> Option<(u32, u32)> {
    let filter = config.get("filter:v")?;
    let scale = filter.split(',').find_map(|f| f.strip_prefix("scale="))?;
    let mut parts = scale.split(':');
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some((width, height))
}

impl EncodeEngine for FakeEngine {
    fn run(
        &self,
        inputs: &[StreamHandle],
        output: &Path,
        config: &EngineConfig,
        timeout: Option<Duration>,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(EngineCall {
            inputs: inputs.to_vec(),
            output: output.to_path_buf(),
            config: config.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let killed = match (self.delay, timeout) {
            (Some(delay), Some(limit)) if delay > limit && !self.ignore_timeout => {
                std::thread::sleep(limit);
                true
            }
            (Some(delay), _) => {
                std::thread::sleep(delay);
                false
            }
            (None, _) => false,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if killed {
            return Err(anyhow!("simulated kill after {:?}", timeout.unwrap_or_default()));
        }

        let (width, height) = scale_of(config).ok_or_else(|| anyhow!("no scale filter"))?;
        if self.fail_heights.contains(&height) {
            std::fs::write(output, b"truncated")?;
            return Err(anyhow!("simulated encoder crash at {}p", height));
        }
        if self.silent_heights.contains(&height) {
            return Ok(());
        }
        self.fabricate(output, config, width, height)
    }
}
