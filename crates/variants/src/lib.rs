pub mod artifact;
pub mod assembler;
pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod pipeline;
pub mod preset;
pub mod probe;
pub mod sampler;
pub mod scan;
pub mod select;
pub mod tier;

#[cfg(test)]
mod testing;

pub use artifact::{ImageItem, VideoVariantRecord};
pub use assembler::VideoObject;
pub use config::PipelineConfig;
pub use engine::{EncodeEngine, FfmpegEngine};
pub use error::{Result, VariantError};
pub use manifest::Manifest;
pub use pipeline::VariantPipeline;
pub use probe::{FfprobeProber, ProbeResult, Prober};
pub use tier::{SizeTier, TierSet};
