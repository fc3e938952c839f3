use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use sha2::{Digest, Sha256};
use crate::artifact::{ImageItem, clear_output, guess_mime_type};
use crate::engine::{EncodeEngine, EngineConfig, StreamHandle};
use crate::error::{Result, VariantError};
use crate::preset::even_width;
use crate::probe::StreamDescriptor;

/// Half-width of the capture window, as a fraction of the duration
const WINDOW_SPREAD: f64 = 0.05;

/// Which still image to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Full-width placeholder frame
    Frame,
    /// Small letterboxed square
    Thumbnail,
}

impl FrameMode {
    pub fn file_name(self) -> &'static str {
        match self {
            FrameMode::Frame => "frame.jpeg",
            FrameMode::Thumbnail => "thumb.jpeg",
        }
    }

    pub fn size_category(self) -> u8 {
        match self {
            FrameMode::Frame => 3,
            FrameMode::Thumbnail => 0,
        }
    }
}

pub fn validate_seeker(seeker: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&seeker) {
        return Err(VariantError::invalid_value(format!(
            "seeker must be between 0 and 1, got {}",
            seeker
        )));
    }
    Ok(())
}

/// Seed derived from a stream identity, stable across runs and platforms
pub fn stream_seed(identity: &str) -> u64 {
    let digest = Sha256::digest(identity.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Window `seeker * duration ± 5%`, clamped to `[0, duration]`
pub fn capture_window(duration: f64, seeker: f64) -> (f64, f64) {
    let duration = duration.max(0.0);
    let low = (duration * (seeker - WINDOW_SPREAD)).max(0.0);
    let high = (duration * (seeker + WINDOW_SPREAD)).min(duration);
    (low, high)
}

/// Pick a capture timestamp inside the window, fully determined by `seed`
pub fn capture_timestamp(seed: u64, duration: f64, seeker: f64) -> f64 {
    let (low, high) = capture_window(duration, seeker);
    if low >= high {
        return low;
    }
    StdRng::seed_from_u64(seed).gen_range(low..=high)
}

/// Extracts single still images from the selected video stream
pub struct FrameSampler {
    engine: Arc<dyn EncodeEngine>,
    thumbnail_size: u32,
    frame_height: u32,
    timeout: Option<Duration>,
}

impl FrameSampler {
    pub fn new(engine: Arc<dyn EncodeEngine>, thumbnail_size: u32, frame_height: u32) -> Self {
        Self { engine, thumbnail_size, frame_height, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Target dimensions (width, height) of the still for `video`
    pub fn dimensions(&self, mode: FrameMode, video: &StreamDescriptor) -> (u32, u32) {
        match mode {
            FrameMode::Thumbnail => (self.thumbnail_size, self.thumbnail_size),
            FrameMode::Frame => {
                let width = even_width(
                    self.frame_height,
                    video.width.unwrap_or(0),
                    video.height.unwrap_or(0),
                );
                (width, self.frame_height)
            }
        }
    }

    /// Engine options for one still
    pub fn still_config(&self, mode: FrameMode, width: u32, height: u32, timestamp: f64) -> EngineConfig {
        let filter = match mode {
            // Fit inside the square, then pad with black bars
            FrameMode::Thumbnail => format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:-1:-1:color=black",
                w = width,
                h = height
            ),
            FrameMode::Frame => format!("scale={}:{}", width, height),
        };

        EngineConfig::new()
            .with("vframes", 1)
            .with("ss", format!("{:.3}", timestamp))
            .with("filter:v", filter)
    }

    /// Extract one still into `output_dir`. Blocks on the engine.
    ///
    /// A file left at the target by an earlier run is removed first. Returns `None`
    /// when the engine failed or produced no file.
    pub fn extract(
        &self,
        handle: &StreamHandle,
        video: &StreamDescriptor,
        output_dir: &Path,
        seeker: f64,
        mode: FrameMode,
    ) -> Result<Option<ImageItem>> {
        validate_seeker(seeker)?;

        let timestamp = capture_timestamp(stream_seed(&handle.identity()), video.duration, seeker);
        let (width, height) = self.dimensions(mode, video);
        let config = self.still_config(mode, width, height, timestamp);
        let path = output_dir.join(mode.file_name());

        debug!("Capturing {:?} at {:.3}s into {}", mode, timestamp, path.display());

        clear_output(&path)?;
        if let Err(e) = self.engine.run(std::slice::from_ref(handle), &path, &config, self.timeout) {
            warn!("Failed to extract {:?} from {}: {:#}", mode, handle.input.display(), e);
            clear_output(&path)?;
            return Ok(None);
        }

        if !path.exists() {
            return Ok(None);
        }

        let size = std::fs::metadata(&path)?.len();
        Ok(Some(ImageItem {
            mime_type: guess_mime_type(&path),
            path,
            size,
            height,
            width,
            size_category: mode.size_category(),
        }))
    }
}
