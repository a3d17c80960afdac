use anyhow::Result;
use camkit::blur::BlurEngine;
use camkit::device::MockRegistry;
use camkit::permissions::StaticPermissions;
use camkit::{CamkitConfig, CaptureSession};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "camkit")]
#[command(about = "Camera capture session toolkit with blur classification")]
#[command(version)]
#[command(long_about = "Runs a capture session against the in-process mock camera: \
initializes, streams, takes a snapshot, evaluates it for blur and records a short clip. \
Intended as a smoke check of the pipeline; real integrations embed the library.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camkit.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting camkit v{}", env!("CARGO_PKG_VERSION"));

    let config = match CamkitConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    run_demo(config).await
}

/// Drive the whole pipeline once against the mock camera
async fn run_demo(config: CamkitConfig) -> Result<()> {
    let blur = BlurEngine::new(config.blur.clone());
    let registry = MockRegistry::standard_with_fps(config.session.mock_fps);
    let session = CaptureSession::new(
        Arc::new(registry),
        Arc::new(StaticPermissions::granted()),
        config,
    );
    let mut events = session.events().subscribe();

    session.initialize(None, None).await?;
    info!(
        "Cameras: {:?}",
        session
            .get_all_cameras()
            .iter()
            .map(|c| c.id.clone())
            .collect::<Vec<_>>()
    );

    session.start().await?;
    if let Ok(event) = events.recv().await {
        info!("Event: {}", serde_json::to_string(&event)?);
    }

    let snapshot = session.take_snapshot(85).await?;
    info!("Snapshot: {} base64 bytes", snapshot.len());

    session.save_frame().await?;
    let frame = session.get_bitmap().await?;
    let verdict = blur.classify(&frame);
    info!(
        "Blur verdict on {}x{}: blurry={} ({:?})",
        frame.width(),
        frame.height(),
        verdict.blurry,
        verdict.signals
    );

    session.start_recording(None, false).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    let recording = session.stop_recording(false).await?;
    info!("Recorded clip at {}", recording.path.display());
    std::fs::remove_file(&recording.path)?;

    session.stop().await?;
    info!("Demo complete");
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("camkit={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

fn print_default_config() -> Result<()> {
    println!("# Camkit configuration file");
    println!("# Defaults shown for every available option");
    println!();
    println!("{}", toml::to_string_pretty(&CamkitConfig::default())?);
    Ok(())
}
