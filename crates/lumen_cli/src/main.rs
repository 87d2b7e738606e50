use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use lumen_core::ConversionMode;
use lumen_renderer::{
    box_scene, generate_buckets, CalibrationSnapshot, CalibrationWorker, Camera, Film,
    PostProcessorSettings, ReferenceSamples, RenderPool, ToneOperator, TraceConfig,
    DEFAULT_BUCKET_SIZE,
};

/// How long to wait for a first calibration estimate before falling back to
/// neutral references.
const CALIBRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Render the built-in box scene progressively and save it as a PNG
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image width in pixels
    #[arg(long, default_value_t = 256)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Progressive passes over the whole image
    #[arg(long, default_value_t = 16)]
    passes: u32,

    /// Paths per pixel in each pass
    #[arg(long, default_value_t = 4)]
    samples: u32,

    /// Deepest bounce that still contributes light
    #[arg(long, default_value_t = 6)]
    max_depth: u32,

    /// Spectrum to RGB conversion, as curve[/reference[/policy]]
    #[arg(long, default_value = "cie1931/daylight/global")]
    mode: ConversionMode,

    /// Tone operator: linear, reinhard or reinhard-extended
    #[arg(long, default_value = "reinhard-extended")]
    operator: ToneOperator,

    #[arg(long, default_value_t = 2.2)]
    gamma: f32,

    /// Exposure in stops
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    exposure: f32,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    brightness: f32,

    #[arg(long, default_value_t = 1.0)]
    contrast: f32,

    #[arg(long, default_value_t = 1.0)]
    saturation: f32,

    /// Render threads (defaults to one per logical CPU)
    #[arg(long)]
    threads: Option<usize>,

    /// Sample uniformly instead of steering toward the light
    #[arg(long)]
    no_rig: bool,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output PNG path
    #[arg(short, long, default_value = "lumen.png")]
    output: PathBuf,
}

impl Args {
    fn post_settings(&self) -> PostProcessorSettings {
        PostProcessorSettings {
            operator: self.operator,
            gamma: self.gamma,
            exposure: self.exposure,
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    log::info!("Starting Lumen ({}x{}, mode {})", args.width, args.height, args.mode);

    let built = box_scene(args.width, args.height).context("Failed to build box scene")?;
    let camera = Camera::new(built.camera);
    let scene = Arc::new(built.scene);
    let config = TraceConfig {
        max_depth: args.max_depth,
        rig: (!args.no_rig).then_some(built.rig),
        ..Default::default()
    };

    let calibration = CalibrationWorker::spawn(
        Arc::clone(&scene),
        built.calibration,
        config,
        u64::from(args.passes.saturating_mul(args.samples)).max(1) * 64,
        args.seed ^ 0x5eed,
    )?;
    let reader = calibration.reader();

    let mut pool = match args.threads {
        Some(threads) => RenderPool::new(Arc::clone(&scene), camera, config, threads)?,
        None => RenderPool::with_hardware_concurrency(Arc::clone(&scene), camera, config)?,
    };

    let buckets = generate_buckets(args.width, args.height, DEFAULT_BUCKET_SIZE);
    let mut film = Film::new(args.width, args.height, u64::from(args.passes).max(1));
    let mut snapshot = Arc::new(CalibrationSnapshot::default());

    let start = Instant::now();
    for pass in 0..args.passes {
        let merged = pool.render_pass(&mut film, &buckets, args.samples, 0, u64::from(pass) ^ args.seed)?;
        reader.refresh(&mut snapshot);
        log::info!(
            "Pass {}/{}: {} buckets, {:.1}s elapsed, calibration at {} samples",
            pass + 1,
            args.passes,
            merged,
            start.elapsed().as_secs_f32(),
            snapshot.samples
        );
    }
    pool.shutdown();

    let references = wait_for_references(&calibration, &mut snapshot, args.mode);
    calibration.stop();

    let post = args.post_settings().build(&references);
    let image = film.develop(args.mode, &post);
    image
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    log::info!("Saved {} in {:.1}s", args.output.display(), start.elapsed().as_secs_f32());
    Ok(())
}

/// Latest calibration converted to display references, waiting briefly for
/// a first estimate if none has been published yet.
fn wait_for_references(
    calibration: &CalibrationWorker,
    snapshot: &mut Arc<CalibrationSnapshot>,
    mode: ConversionMode,
) -> ReferenceSamples {
    let deadline = Instant::now() + CALIBRATION_TIMEOUT;
    loop {
        if let Some(latest) = calibration.try_latest() {
            *snapshot = latest;
        }
        if let Some(references) = snapshot.references(mode) {
            return references;
        }
        if Instant::now() >= deadline {
            log::warn!("No calibration available; using neutral references");
            return ReferenceSamples::default();
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
