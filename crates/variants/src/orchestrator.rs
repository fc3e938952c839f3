use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, info, warn};
use tokio::sync::{Semaphore, mpsc};
use crate::artifact::{VideoVariantRecord, clear_output, variant_from_probe};
use crate::engine::{EncodeEngine, EncodeSettings, EngineConfig, StreamHandle};
use crate::preset::EncodePreset;
use crate::probe::Prober;

/// Streams fed into every encode job
#[derive(Debug, Clone)]
pub struct JobInputs {
    pub video: StreamHandle,
    pub audio: Option<StreamHandle>,
}

impl JobInputs {
    pub fn handles(&self) -> Vec<StreamHandle> {
        std::iter::once(self.video.clone())
            .chain(self.audio.clone())
            .collect()
    }
}

/// Runs one encode job per preset on a bounded worker pool
pub struct EncodeOrchestrator {
    engine: Arc<dyn EncodeEngine>,
    prober: Arc<dyn Prober>,
    settings: EncodeSettings,
    max_concurrent_jobs: usize,
    job_timeout: Option<Duration>,
}

impl EncodeOrchestrator {
    pub fn new(
        engine: Arc<dyn EncodeEngine>,
        prober: Arc<dyn Prober>,
        settings: EncodeSettings,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            engine,
            prober,
            settings,
            max_concurrent_jobs: max_concurrent_jobs.max(1),
            job_timeout: None,
        }
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Encode every preset into `output_dir` and return the renditions that were produced.
    ///
    /// Returns once every job has finished. A failed job only loses its own record;
    /// the order of the returned records is unspecified.
    pub async fn run(
        &self,
        presets: Vec<EncodePreset>,
        inputs: JobInputs,
        output_dir: &Path,
    ) -> Vec<VideoVariantRecord> {
        let with_audio = inputs.audio.is_some();
        let inputs = Arc::new(inputs.handles());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_jobs));
        let (tx, mut rx) = mpsc::unbounded_channel();

        info!("Dispatching {} encode job(s), at most {} at a time", presets.len(), self.max_concurrent_jobs);

        for preset in presets {
            let tx = tx.clone();
            let semaphore = semaphore.clone();
            let engine = self.engine.clone();
            let prober = self.prober.clone();
            let inputs = inputs.clone();
            let config = self.settings.variant_config(&preset, with_audio);
            let output = output_dir.join(preset.file_name());
            let tag = format!("{}_{}", preset.size_category, preset.height);
            let job_timeout = self.job_timeout;

            tokio::spawn(async move {
                let Ok(permit) = semaphore.acquire_owned().await else {
                    return;
                };
                debug!("Encode job {} started", tag);

                let job = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    encode_job(engine.as_ref(), prober.as_ref(), &inputs, &output, &config, job_timeout)
                });

                match job.await {
                    Ok(Some(record)) => {
                        debug!("Encode job {} produced {}x{}", tag, record.width, record.height);
                        let _ = tx.send(record);
                    }
                    Ok(None) => warn!("Encode job {} produced no usable output", tag),
                    Err(e) => warn!("Encode job {} panicked: {}", tag, e),
                }
            });
        }
        drop(tx);

        // Channel closes once the last job drops its sender
        let mut records = Vec::new();
        while let Some(record) = rx.recv().await {
            records.push(record);
        }

        info!("{} variant(s) produced in {}", records.len(), output_dir.display());
        records
    }
}

/// Run one encode to completion and describe its output.
///
/// Anything left at `output` by an earlier run is removed first. A job that
/// fails or outlives `job_timeout` leaves no file behind.
fn encode_job(
    engine: &dyn EncodeEngine,
    prober: &dyn Prober,
    inputs: &[StreamHandle],
    output: &Path,
    config: &EngineConfig,
    job_timeout: Option<Duration>,
) -> Option<VideoVariantRecord> {
    if let Err(e) = clear_output(output) {
        warn!("Failed to clear {} before encoding: {}", output.display(), e);
        return None;
    }

    let started = Instant::now();
    let result = engine.run(inputs, output, config, job_timeout);

    let failure = match (result, job_timeout) {
        (Err(e), _) => Some(format!("failed: {:#}", e)),
        (Ok(()), Some(limit)) if started.elapsed() > limit => Some(format!("timed out after {:?}", limit)),
        (Ok(()), _) => None,
    };
    if let Some(reason) = failure {
        warn!("Encode job for {} {}, dropping it", output.display(), reason);
        if let Err(e) = clear_output(output) {
            warn!("Failed to remove {}: {}", output.display(), e);
        }
        return None;
    }

    record_from_output(prober, output)
}

/// Re-probe a produced file and describe what it actually contains
fn record_from_output(prober: &dyn Prober, output: &Path) -> Option<VideoVariantRecord> {
    if !output.exists() {
        return None;
    }
    match prober.probe(output) {
        Ok(probe) => variant_from_probe(output, &probe),
        Err(e) => {
            warn!("Failed to probe produced variant {}: {}", output.display(), e);
            None
        }
    }
}
