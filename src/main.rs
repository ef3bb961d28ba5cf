//! quality-replay - drive the adaptive quality controller from a recorded
//! frame-time trace.
//!
//! Each trace line is fed to the controller as one frame, exactly as an
//! engine update loop would. The final status is printed as JSON.

use adaptive_quality::config::ConfigFile;
use adaptive_quality::events::AudioQuality;
use adaptive_quality::logging;
use adaptive_quality::pipeline::LoggingPipeline;
use adaptive_quality::platform::{FixedPlatform, Platform, PlatformInfo, SystemPlatform};
use adaptive_quality::prefs::JsonPreferenceStore;
use adaptive_quality::stats::SampleTimer;
use adaptive_quality::trace::FrameTrace;
use adaptive_quality::{QualityController, QualityError, QualityStatus};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "quality-replay")]
#[command(about = "Replay a frame-time trace through the adaptive quality controller")]
struct Args {
    /// Frame times in milliseconds, one per line
    #[arg(long)]
    trace: PathBuf,

    /// Platform preset to run with
    #[arg(long, value_enum, default_value_t = Platform::current())]
    platform: Platform,

    /// Config file (defaults to the built-in presets if missing)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preferences file
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Log directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Display density to report instead of querying the system
    #[arg(long)]
    dpi: Option<i32>,

    /// Physical memory in MiB to report instead of querying the system
    #[arg(long)]
    memory_mb: Option<i64>,

    /// Sleep for each frame's duration instead of replaying flat out
    #[arg(long)]
    realtime: bool,

    /// Number of passes over the trace
    #[arg(long, default_value_t = 1)]
    loops: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _log_guard = logging::init_logging(args.log_dir.as_deref()).map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        e
    })?;

    info!("quality-replay starting...");

    let status = run_replay(args).await.map_err(|e| {
        error!("quality-replay error: {}", e);
        e
    })?;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn run_replay(args: Args) -> Result<QualityStatus, QualityError> {
    let trace = FrameTrace::load(&args.trace)?;

    let config_path = args.config.unwrap_or_else(ConfigFile::default_path);
    let config_file = ConfigFile::load_or_default(&config_path)?;
    info!("Configuration loaded from {:?}", config_path);

    let prefs_path = args.prefs.unwrap_or_else(JsonPreferenceStore::default_path);
    let prefs = JsonPreferenceStore::load_or_default(&prefs_path)?;

    let system = SystemPlatform;
    let info = FixedPlatform {
        dpi: args.dpi.unwrap_or_else(|| system.current_dpi()),
        memory_mb: args.memory_mb.unwrap_or_else(|| system.physical_memory_mb()),
    };

    let config = config_file.for_platform(args.platform).clone();
    let mut controller = QualityController::new(
        args.platform,
        config.clone(),
        config_file.tuning.clone(),
        &info,
        prefs,
        LoggingPipeline::default(),
    )?;

    let audio = AudioQuality::new(&config, controller.current_tier(), |mode| {
        info!("Speaker mode set to {:?}", mode);
    })?;
    controller.add_listener(Box::new(audio));

    if args.platform.requires_automatic_opt_in() {
        controller.set_automatic_opt_in(true);
        controller.set_dynamic_management(true);
    } else {
        controller.start();
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers(shutdown_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    let mut timer = SampleTimer::new();
    timer.begin("replay");

    let mut frames_played: u64 = 0;
    'replay: for pass in 0..args.loops {
        info!("Replay pass {} of {}", pass + 1, args.loops);
        for &dt in trace.frames() {
            if *shutdown_rx.borrow() {
                info!("Replay interrupted after {} frames", frames_played);
                break 'replay;
            }

            controller.evaluate_tick(dt);
            frames_played += 1;

            if args.realtime {
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(Duration::from_secs_f32(dt)) => {}
                }
            }
        }
    }

    let elapsed_ms = timer.end();
    controller.set_dynamic_management(false);
    info!(
        "Replayed {} frames in {} ms, {} adjustments",
        frames_played,
        elapsed_ms,
        controller.stats().total_adjustments()
    );

    Ok(controller.status())
}

/// Stop the replay on SIGTERM or SIGINT.
#[cfg(unix)]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

#[cfg(not(unix))]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    let _ = shutdown_tx.send(true);
    Ok(())
}
