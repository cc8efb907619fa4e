//! lookoutd - live frame-analysis daemon
//!
//! This daemon:
//! 1. Loads `PipelineConfig` (LOOKOUT_CONFIG + env overrides)
//! 2. Starts the analysis pipeline and binds the widest rear lens
//! 3. Pushes frames from the configured source at the target rate
//! 4. Polls the overlay from a render thread at the display rate
//! 5. Logs health counters every 5 seconds until Ctrl-C or `--seconds`

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use lookout::{
    FrameSource, LensFacing, LensInfo, ModelRegistry, OverlayState, Pipeline, PipelineConfig,
    PipelineState, SubmitOutcome,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Run time in seconds (0 = until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    seconds: u64,
    /// Override the source frame rate.
    #[arg(long)]
    fps: Option<u32>,
    /// Override the model name.
    #[arg(long, env = "LOOKOUT_MODEL")]
    model: Option<String>,
    /// Overlay poll rate of the render thread.
    #[arg(long, default_value_t = 60)]
    render_hz: u32,
    /// ONNX detector registered under the `--model` name (default "onnx").
    #[cfg(feature = "backend-tract")]
    #[arg(long)]
    onnx: Option<std::path::PathBuf>,
    /// Class labels for `--onnx`, one per line.
    #[cfg(feature = "backend-tract")]
    #[arg(long)]
    labels: Option<std::path::PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.render_hz == 0 {
        return Err(anyhow!("render-hz must be >= 1"));
    }

    let mut config = PipelineConfig::load()?;
    if let Some(fps) = args.fps {
        if fps == 0 {
            return Err(anyhow!("fps must be >= 1"));
        }
        config.source.target_fps = fps;
    }
    if let Some(model) = &args.model {
        config.model.name = model.clone();
    }

    #[allow(unused_mut)]
    let mut registry = ModelRegistry::with_builtin();
    #[cfg(feature = "backend-tract")]
    {
        if let Some(path) = &args.onnx {
            if args.model.is_none() {
                config.model.name = "onnx".to_string();
            }
            registry.register_tract(&config.model.name, path.clone(), args.labels.clone(), 320, 320);
        }
    }
    log::info!("registered models: {:?}", registry.list());

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("error setting Ctrl-C handler")?;
    }

    let pipeline = Pipeline::start(&config, Arc::new(registry))?;

    let mut source = FrameSource::new(config.source.clone())?;
    source.connect()?;
    if !pipeline.bind_camera(&device_lenses()) {
        log::warn!("no rear camera available; frames will not be analyzed");
    }

    let state = pipeline.wait_for_model(Duration::from_secs(30));
    if state.is_degraded() {
        log::warn!("model '{}' not usable ({:?}); camera-only mode", pipeline.model_name(), state);
    }

    let render = spawn_render_loop(pipeline.overlay(), args.render_hz, running.clone())?;

    let frame_interval = Duration::from_secs_f64(1.0 / config.source.target_fps as f64);
    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));
    let mut last_health_log = Instant::now();
    let mut degraded_reported = state.is_degraded();

    log::info!(
        "lookoutd running: source={} fps={} model={}",
        config.source.url,
        config.source.target_fps,
        pipeline.model_name()
    );

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        let tick = Instant::now();

        match source.next_frame() {
            Ok(frame) => {
                if pipeline.submit(frame) == SubmitOutcome::Closed {
                    log::error!("pipeline closed unexpectedly");
                    break;
                }
            }
            Err(e) => log::warn!("frame capture failed: {:#}", e),
        }

        if !degraded_reported && pipeline.state() == PipelineState::Disabled {
            log::warn!("engine disabled; continuing in camera-only mode");
            degraded_reported = true;
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = pipeline.stats();
            let source_stats = source.stats();
            log::info!(
                "health source={} frames={} submitted={} accepted={} dropped={} completed={} published={} skipped={} state={:?}",
                source.is_healthy(),
                source_stats.frames_captured,
                stats.submitted,
                stats.accepted,
                stats.dropped,
                stats.completed,
                stats.published,
                stats.skipped,
                pipeline.state()
            );
            last_health_log = Instant::now();
        }

        if let Some(rest) = frame_interval.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    log::info!("shutdown requested, stopping pipeline...");
    running.store(false, Ordering::SeqCst);
    pipeline.shutdown()?;
    render
        .join()
        .map_err(|_| anyhow!("render thread panicked"))?;
    Ok(())
}

/// Lenses reported by the simulated device: a standard and an ultra-wide
/// rear lens plus a front lens.
fn device_lenses() -> Vec<LensInfo> {
    vec![
        LensInfo::new("0", LensFacing::Back, vec![4.38]),
        LensInfo::new("1", LensFacing::Front, vec![2.2]),
        LensInfo::new("2", LensFacing::Back, vec![1.54]),
    ]
}

/// Stand-in renderer: reads the overlay at `hz` and logs each new
/// generation's captions.
fn spawn_render_loop(
    overlay: Arc<OverlayState>,
    hz: u32,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let period = Duration::from_secs_f64(1.0 / hz as f64);
    std::thread::Builder::new()
        .name("lookout-render".to_string())
        .spawn(move || {
            let mut last_generation = 0;
            while running.load(Ordering::SeqCst) {
                let snapshot = overlay.current();
                if snapshot.generation != last_generation {
                    last_generation = snapshot.generation;
                    let captions: Vec<String> =
                        snapshot.boxes.iter().map(|b| b.caption()).collect();
                    log::debug!("overlay #{}: {:?}", snapshot.generation, captions);
                }
                std::thread::sleep(period);
            }
        })
        .context("failed to spawn render thread")
}
