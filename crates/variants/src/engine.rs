use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use crate::preset::EncodePreset;

/// Addresses one stream of an input file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamHandle {
    pub input: PathBuf,
    pub index: u32,
}

impl StreamHandle {
    pub fn new(input: impl Into<PathBuf>, index: u32) -> Self {
        Self { input: input.into(), index }
    }

    /// Stable identity of the stream, used to seed frame sampling
    pub fn identity(&self) -> String {
        format!("{}:{}", self.input.display(), self.index)
    }
}

/// Key/value options handed to the encode engine, e.g. `crf` -> `38`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig(BTreeMap<String, String>);

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Codec choices shared by every rendition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub video_codec: String,
    pub pixel_format: String,
    pub audio_codec: String,
    pub container_format: String,
    pub frame_rate: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "libmp3lame".to_string(),
            container_format: "mp4".to_string(),
            frame_rate: 24,
        }
    }
}

impl EncodeSettings {
    /// Engine options for one rendition
    pub fn variant_config(&self, preset: &EncodePreset, with_audio: bool) -> EngineConfig {
        let mut config = EngineConfig::new()
            .with("vcodec", &self.video_codec)
            .with("pix_fmt", &self.pixel_format)
            .with("f", &self.container_format)
            .with("crf", preset.video_quality)
            .with(
                "filter:v",
                format!("scale={}:{},fps={}", preset.width, preset.height, self.frame_rate),
            );

        if with_audio {
            config = config
                .with("acodec", &self.audio_codec)
                .with("ac", preset.audio_channels)
                .with("q:a", preset.audio_quality);
        }

        config
    }
}

/// Performs the actual decode/scale/encode work.
///
/// `run` blocks until the output is written; `Ok` means the output exists.
/// When `timeout` is set the engine stops its work once it elapses and returns
/// an error, leaving nothing behind at `output`.
pub trait EncodeEngine: Send + Sync {
    fn run(
        &self,
        inputs: &[StreamHandle],
        output: &Path,
        config: &EngineConfig,
        timeout: Option<Duration>,
    ) -> Result<()>;
}

/// How often a running ffmpeg is checked against its deadline
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Wait for `child`, giving up once `timeout` elapses.
///
/// Returns `None` when the deadline passed; the child is still running then.
fn wait_with_deadline(child: &mut Child, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(limit) = timeout else {
        return Ok(Some(child.wait()?));
    };

    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// [`EncodeEngine`] backed by the ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    pub ffmpeg_bin: PathBuf,
    /// Run ffmpeg at error log level
    pub quiet: bool,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>, quiet: bool) -> Self {
        Self { ffmpeg_bin: ffmpeg_bin.into(), quiet }
    }

    /// Build the ffmpeg argument list
    ///
    /// Each distinct input file is opened once and every handle is mapped by index.
    pub fn build_command(&self, inputs: &[StreamHandle], output: &Path, config: &EngineConfig) -> Vec<String> {
        let mut args = Vec::new();

        args.push("-hide_banner".to_string());
        if self.quiet {
            args.push("-loglevel".to_string());
            args.push("error".to_string());
        }
        args.push("-y".to_string());

        let mut files: Vec<&Path> = Vec::new();
        for handle in inputs {
            if !files.contains(&handle.input.as_path()) {
                files.push(handle.input.as_path());
            }
        }
        for file in &files {
            args.push("-i".to_string());
            args.push(file.to_string_lossy().to_string());
        }

        for handle in inputs {
            let file_idx = files
                .iter()
                .position(|f| *f == handle.input.as_path())
                .unwrap_or(0);
            args.push("-map".to_string());
            args.push(format!("{}:{}", file_idx, handle.index));
        }

        for (key, value) in config.iter() {
            args.push(format!("-{}", key));
            args.push(value.to_string());
        }

        args.push(output.to_string_lossy().to_string());
        args
    }
}

impl EncodeEngine for FfmpegEngine {
    fn run(
        &self,
        inputs: &[StreamHandle],
        output: &Path,
        config: &EngineConfig,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let args = self.build_command(inputs, output, config);
        debug!("Executing ffmpeg: {} {}", self.ffmpeg_bin.display(), args.join(" "));

        let mut child = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!(
                "Failed to spawn ffmpeg at: {}. Ensure ffmpeg is installed and accessible.",
                self.ffmpeg_bin.display()
            ))?;

        // Drain stderr on the side so a chatty ffmpeg never blocks on a full pipe
        let stderr = child.stderr.take();
        let reader = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });

        let Some(status) = wait_with_deadline(&mut child, timeout)? else {
            let _ = child.kill();
            let _ = child.wait();
            if let Err(e) = std::fs::remove_file(output) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial output {}: {}", output.display(), e);
                }
            }
            return Err(anyhow!(
                "ffmpeg killed after {:?} for {}",
                timeout.unwrap_or_default(),
                output.display()
            ));
        };
        let stderr = reader.join().unwrap_or_default();

        if !status.success() {
            return Err(anyhow!(
                "ffmpeg failed (exit code: {}) for {}\nSTDERR:\n{}",
                status.code().unwrap_or(-1),
                output.display(),
                stderr.trim()
            ));
        }

        if !output.exists() {
            return Err(anyhow!("ffmpeg exited cleanly but {} is missing", output.display()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::sampler::{FrameMode, FrameSampler};
    use crate::tier::SizeTier;
    use proptest::prelude::*;

    fn resolved(tier: SizeTier, width: u32) -> EncodePreset {
        let mut preset = EncodePreset::template(tier);
        preset.width = width;
        preset
    }

    #[test]
    fn test_variant_config() {
        let config = EncodeSettings::default().variant_config(&resolved(SizeTier::P720, 1280), true);
        assert_eq!(config.get("vcodec"), Some("libx264"));
        assert_eq!(config.get("pix_fmt"), Some("yuv420p"));
        assert_eq!(config.get("acodec"), Some("libmp3lame"));
        assert_eq!(config.get("ac"), Some("2"));
        assert_eq!(config.get("q:a"), Some("6"));
        assert_eq!(config.get("crf"), Some("38"));
        assert_eq!(config.get("f"), Some("mp4"));
        assert_eq!(config.get("filter:v"), Some("scale=1280:720,fps=24"));
    }

    #[test]
    fn test_video_only_config_has_no_audio_options() {
        let config = EncodeSettings::default().variant_config(&resolved(SizeTier::P240, 428), false);
        assert!(config.get("acodec").is_none());
        assert!(config.get("ac").is_none());
        assert_eq!(config.get("filter:v"), Some("scale=428:240,fps=24"));
    }

    #[test]
    fn test_command_maps_streams_of_one_input() {
        let inputs = vec![StreamHandle::new("/in/clip.mkv", 0), StreamHandle::new("/in/clip.mkv", 3)];
        let config = EngineConfig::new().with("crf", 36);
        let engine = FfmpegEngine::new("ffmpeg", true);
        let args = engine.build_command(&inputs, Path::new("/out/4_1080.mp4"), &config);

        assert!(args.windows(2).any(|w| w[0] == "-loglevel" && w[1] == "error"));

        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:0"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:3"));
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "36"));
        assert_eq!(args.last().map(String::as_str), Some("/out/4_1080.mp4"));
    }

    const GLOBAL_FLAGS: &[&str] = &["-hide_banner", "-loglevel", "-y", "-i", "-map"];
    const OUTPUT_FLAGS: &[&str] = &[
        "-f", "-vcodec", "-pix_fmt", "-acodec", "-ac", "-q:a", "-crf", "-filter:v", "-vframes", "-ss",
    ];

    /// Build the command for `config` and check every flag is one ffmpeg knows
    fn assert_known_flags(config: &EngineConfig, inputs: &[StreamHandle], output: &str) -> Vec<String> {
        let args = FfmpegEngine::new("ffmpeg", true).build_command(inputs, Path::new(output), config);
        for flag in args.iter().filter(|a| a.starts_with('-')) {
            assert!(
                GLOBAL_FLAGS.contains(&flag.as_str()) || OUTPUT_FLAGS.contains(&flag.as_str()),
                "unexpected ffmpeg flag {} in {:?}",
                flag,
                args
            );
        }
        args
    }

    fn clip_streams() -> Vec<StreamHandle> {
        vec![StreamHandle::new("/in/clip.mkv", 0), StreamHandle::new("/in/clip.mkv", 1)]
    }

    #[test]
    fn test_variant_command_with_audio() {
        let config = EncodeSettings::default().variant_config(&resolved(SizeTier::P720, 1280), true);
        let args = assert_known_flags(&config, &clip_streams(), "/out/3_720.mp4");

        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "mp4"));
        assert!(!args.iter().any(|a| a == "-format"));
        for flag in ["-vcodec", "-pix_fmt", "-crf", "-filter:v", "-acodec", "-ac", "-q:a"] {
            assert!(args.iter().any(|a| a == flag), "{} missing from {:?}", flag, args);
        }
    }

    #[test]
    fn test_variant_command_without_audio() {
        let config = EncodeSettings::default().variant_config(&resolved(SizeTier::P240, 428), false);
        let args = assert_known_flags(&config, &clip_streams()[..1], "/out/0_240.mp4");

        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "mp4"));
        assert!(!args.iter().any(|a| a == "-acodec" || a == "-ac" || a == "-q:a"));
    }

    #[test]
    fn test_still_commands() {
        let sampler = FrameSampler::new(Arc::new(FfmpegEngine::new("ffmpeg", true)), 90, 480);
        for (mode, width, height, output) in [
            (FrameMode::Thumbnail, 90, 90, "/out/thumb.jpeg"),
            (FrameMode::Frame, 854, 480, "/out/frame.jpeg"),
        ] {
            let config = sampler.still_config(mode, width, height, 12.5);
            let args = assert_known_flags(&config, &clip_streams()[..1], output);
            assert!(args.windows(2).any(|w| w[0] == "-vframes" && w[1] == "1"));
            assert!(args.windows(2).any(|w| w[0] == "-ss" && w[1] == "12.500"));
        }
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        let engine = FfmpegEngine::new("/nonexistent/ffmpeg", true);
        let result = engine.run(
            &[StreamHandle::new("/in/clip.mkv", 0)],
            Path::new("/tmp/never.mp4"),
            &EngineConfig::new(),
            None,
        );
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_deadline_stops_waiting() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let started = Instant::now();
        let status = wait_with_deadline(&mut child, Some(Duration::from_millis(50))).unwrap();
        assert!(status.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
        child.kill().unwrap();
        child.wait().unwrap();

        let mut child = Command::new("true").spawn().unwrap();
        let status = wait_with_deadline(&mut child, Some(Duration::from_secs(5))).unwrap();
        assert!(status.unwrap().success());
    }

    proptest! {
        #[test]
        fn test_every_option_is_passed(
            crf in 0u32..52,
            width in (1u32..2000).prop_map(|w| w * 2),
        ) {
            let config = EngineConfig::new()
                .with("crf", crf)
                .with("filter:v", format!("scale={}:720", width));
            let args = FfmpegEngine::new("ffmpeg", false).build_command(
                &[StreamHandle::new("/in/a.mp4", 0)],
                Path::new("/out/b.mp4"),
                &config,
            );
            let crf_str = crf.to_string();
            prop_assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == crf_str));
            let filter = format!("scale={}:720", width);
            prop_assert!(args.windows(2).any(|w| w[0] == "-filter:v" && w[1] == filter));
            prop_assert!(!args.iter().any(|a| a == "-loglevel"));
            prop_assert_eq!(args.last().map(String::as_str), Some("/out/b.mp4"));
        }
    }
}
