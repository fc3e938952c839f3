use std::path::{Path, PathBuf};
use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, error, info, warn};
use variants::{
    PipelineConfig, TierSet, VariantPipeline,
    manifest::{self, Manifest},
    scan,
};

/// Generate resolution variants, a thumbnail and a placeholder frame for videos
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video file, or directory to scan for videos
    input: PathBuf,

    /// Root directory for generated artifacts (one sub-directory per input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tiers to produce, e.g. `all`, `sd`, `720,1080`
    #[arg(short, long, value_delimiter = ',')]
    tiers: Vec<String>,

    /// Maximum encode jobs running at the same time
    #[arg(short = 'j', long)]
    max_jobs: Option<usize>,

    /// Position of the captured stills, as a fraction of the duration
    #[arg(short, long)]
    seeker: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins unless --verbose asks for debug output
    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.format_timestamp_secs().init();

    let mut cfg = PipelineConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(output) = args.output {
        cfg.output_root = output;
    }
    if !args.tiers.is_empty() {
        cfg.tiers = args.tiers;
    }
    if let Some(max_jobs) = args.max_jobs {
        if max_jobs == 0 {
            bail!("--max-jobs must be at least 1");
        }
        cfg.max_concurrent_jobs = max_jobs;
    }
    if let Some(seeker) = args.seeker {
        cfg.seeker = seeker;
    }

    let tiers = cfg.tier_set().context("Invalid tier list")?;
    std::fs::create_dir_all(&cfg.output_root)
        .with_context(|| format!("Failed to create output directory: {}", cfg.output_root.display()))?;

    info!("Variant generator starting");
    info!("  Output root: {}", cfg.output_root.display());
    info!("  Tiers: {:?}", tiers);
    info!("  Max concurrent jobs: {}", cfg.max_concurrent_jobs);

    let inputs = scan::discover_inputs(&args.input)?;
    if inputs.is_empty() {
        warn!("No media files found under {}", args.input.display());
        return Ok(());
    }

    let mut failures = 0;
    for input in &inputs {
        match process_input(input, &cfg, tiers).await {
            Ok(manifest) => println!("{}", serde_json::to_string_pretty(&manifest)?),
            Err(e) => {
                error!("Failed to process {}: {:#}", input.display(), e);
                failures += 1;
            }
        }
    }

    info!("Processed {} input(s), {} failed", inputs.len(), failures);
    if failures > 0 {
        bail!("{} of {} input(s) failed", failures, inputs.len());
    }
    Ok(())
}

async fn process_input(input: &Path, cfg: &PipelineConfig, tiers: TierSet) -> Result<Manifest> {
    info!("Processing {}", input.display());

    let pipeline = VariantPipeline::from_config(input, cfg)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let video_object = pipeline.generate_video_object(&cfg.output_root, tiers).await?;

    let manifest = Manifest::new(input, video_object);
    if cfg.write_manifest {
        let path = manifest::write_manifest(&manifest)?;
        info!("Wrote {}", path.display());
    }
    Ok(manifest)
}
