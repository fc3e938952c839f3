use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use log::info;
use uuid::Uuid;
use crate::artifact::{ImageItem, VideoVariantRecord};
use crate::assembler::{VideoObject, assemble_video_object};
use crate::config::PipelineConfig;
use crate::engine::{EncodeEngine, FfmpegEngine, StreamHandle};
use crate::error::{Result, VariantError};
use crate::orchestrator::{EncodeOrchestrator, JobInputs};
use crate::preset::{EncodePreset, PresetResolver};
use crate::probe::{FfprobeProber, ProbeResult, Prober, StreamDescriptor};
use crate::sampler::{FrameMode, FrameSampler, validate_seeker};
use crate::select::{StreamSelection, StreamSelector};
use crate::tier::{SizeTier, TierSet};

/// Generates renditions and stills for one input file
pub struct VariantPipeline {
    input_path: PathBuf,
    name: String,
    probe: ProbeResult,
    selector: StreamSelector,
    selection: OnceLock<StreamSelection>,
    resolver: PresetResolver,
    sampler: Arc<FrameSampler>,
    orchestrator: EncodeOrchestrator,
    seeker: f64,
}

impl VariantPipeline {
    /// Probe `input` and prepare a pipeline for it
    pub fn open(
        input: impl Into<PathBuf>,
        prober: Arc<dyn Prober>,
        engine: Arc<dyn EncodeEngine>,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let input_path = input.into();
        if !input_path.is_file() {
            return Err(VariantError::FileNotFound(input_path));
        }

        let probe = prober.probe(&input_path)?;
        info!(
            "Opened {} ({}, {:.2}s, {} stream(s))",
            input_path.display(),
            probe.format.format_name,
            probe.format.duration,
            probe.streams.len()
        );

        let name = artifact_name(&input_path);
        let sampler = FrameSampler::new(engine.clone(), config.thumbnail_size, config.frame_height)
            .with_timeout(config.job_timeout());
        let orchestrator = EncodeOrchestrator::new(
            engine,
            prober,
            config.encode_settings(),
            config.max_concurrent_jobs,
        )
        .with_job_timeout(config.job_timeout());

        Ok(Self {
            input_path,
            name,
            probe,
            selector: StreamSelector::new(config.languages()),
            selection: OnceLock::new(),
            resolver: PresetResolver::new(),
            sampler: Arc::new(sampler),
            orchestrator,
            seeker: config.seeker,
        })
    }

    /// Open `input` with the ffprobe/ffmpeg binaries named in `config`
    pub fn from_config(input: impl Into<PathBuf>, config: &PipelineConfig) -> Result<Self> {
        let prober = Arc::new(FfprobeProber::new(&config.ffprobe_bin));
        let engine = Arc::new(FfmpegEngine::new(&config.ffmpeg_bin, config.quiet_engine));
        Self::open(input, prober, engine, config)
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Name of the per-input artifact directory
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probe(&self) -> &ProbeResult {
        &self.probe
    }

    /// Directory under `output_dir` that receives this input's artifacts
    pub fn artifact_dir(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.name)
    }

    /// Best video and audio stream, computed on first use
    pub fn select_streams(&self) -> Result<&StreamSelection> {
        if self.probe.streams.is_empty() {
            return Err(VariantError::NoStreams);
        }
        Ok(self.selection.get_or_init(|| self.selector.select(&self.probe)))
    }

    fn video_stream(&self) -> Result<(&StreamSelection, &StreamDescriptor)> {
        let selection = self.select_streams()?;
        let video = selection.video.as_ref().ok_or(VariantError::NoVideoStream)?;
        Ok((selection, video))
    }

    fn handle(&self, stream: &StreamDescriptor) -> StreamHandle {
        StreamHandle::new(&self.input_path, stream.index)
    }

    /// Tiers this input can feed, resolved against its dimensions
    pub fn possible_presets(&self) -> Result<BTreeMap<SizeTier, EncodePreset>> {
        let (selection, _) = self.video_stream()?;
        Ok(self.resolver.possible_presets(selection))
    }

    /// Encode the requested tiers into `{output_dir}/{name}/`.
    ///
    /// Tiers the source cannot feed are skipped. Returns the renditions that were
    /// actually produced, in no particular order.
    pub async fn create_variants(&self, tiers: TierSet, output_dir: &Path) -> Result<Vec<VideoVariantRecord>> {
        if tiers.is_empty() {
            return Err(VariantError::invalid_value("Provide a valid variant to work with"));
        }
        if !output_dir.is_dir() {
            return Err(VariantError::Directory(output_dir.to_path_buf()));
        }

        let (selection, video) = self.video_stream()?;
        let reachable: TierSet = self.resolver.possible_presets(selection).into_keys().collect();
        let effective = tiers.intersection(reachable);
        for tier in tiers.iter().filter(|t| !reachable.contains(*t)) {
            info!("Skipping {}: source is only {}p tall", tier, video.height.unwrap_or(0));
        }

        let presets = self.resolver.resolve(effective, selection);
        let inputs = JobInputs {
            video: self.handle(video),
            audio: selection.audio.as_ref().map(|a| self.handle(a)),
        };

        let artifact_dir = self.artifact_dir(output_dir);
        tokio::fs::create_dir_all(&artifact_dir).await?;

        Ok(self.orchestrator.run(presets, inputs, &artifact_dir).await)
    }

    /// Capture one still into `{output_dir}/{name}/`.
    ///
    /// `seeker` is the fraction of the stream duration around which the frame is
    /// taken. Returns `None` for inputs without video or when nothing was written.
    pub async fn extract_frame(&self, output_dir: &Path, seeker: f64, thumbnail: bool) -> Result<Option<ImageItem>> {
        validate_seeker(seeker)?;

        let selection = self.select_streams()?;
        let Some(video) = selection.video.clone() else {
            return Ok(None);
        };

        let artifact_dir = self.artifact_dir(output_dir);
        tokio::fs::create_dir_all(&artifact_dir).await?;

        let mode = if thumbnail { FrameMode::Thumbnail } else { FrameMode::Frame };
        let handle = self.handle(&video);
        let sampler = self.sampler.clone();
        tokio::task::spawn_blocking(move || sampler.extract(&handle, &video, &artifact_dir, seeker, mode)).await?
    }

    /// Produce thumbnail, placeholder frame and renditions, then bundle them.
    ///
    /// Stills and renditions are generated concurrently.
    pub async fn generate_video_object(&self, output_dir: &Path, tiers: TierSet) -> Result<VideoObject> {
        info!("Generating thumbnail, placeholder frame and {:?} variants for {}", tiers, self.name);

        let (thumbnail, frame, variants) = tokio::join!(
            self.extract_frame(output_dir, self.seeker, true),
            self.extract_frame(output_dir, self.seeker, false),
            self.create_variants(tiers, output_dir),
        );

        assemble_video_object(self.artifact_dir(output_dir), thumbnail?, frame?, variants?)
    }
}

/// File stem of the input, or a random name when it has no extension
fn artifact_name(input: &Path) -> String {
    match (input.file_stem(), input.extension()) {
        (Some(stem), Some(_)) if !stem.is_empty() => stem.to_string_lossy().to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}
