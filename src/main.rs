use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use thermocam::{
    BroadcastSink, ConnectionSupervisor, DeviceFacade, EmulatedSdk, EmulatorKind, ThermocamConfig,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "thermocam")]
#[command(about = "Thermal camera lifecycle supervisor with frame streaming")]
#[command(version)]
#[command(long_about = "Supervises the connection lifecycle of a thermal-imaging camera \
accessory: discovers devices, arbitrates between physical hardware and emulator fallbacks, \
streams frames into a rate-limited latest-frame cache, and answers point-temperature queries. \
Without the vendor SDK only the built-in emulator transport is available.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "thermocam.toml", help = "Path to TOML configuration file")]
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
    #[arg(long, help = "Validate configuration file and exit without starting")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Emulator profile to advertise (accessory or software)
    #[arg(long, default_value = "accessory", help = "Emulation profile: accessory or software")]
    emulator: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", ThermocamConfig::default_toml()?);
        return Ok(());
    }

    init_logging(&args)?;

    let config = ThermocamConfig::load(&args.config).map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    if args.validate_config {
        info!("Configuration is valid");
        return Ok(());
    }

    let emulator_kind = match args.emulator.as_str() {
        "software" => EmulatorKind::Software,
        "accessory" => EmulatorKind::Accessory,
        other => {
            warn!("Unknown emulator profile '{}', using accessory", other);
            EmulatorKind::Accessory
        }
    };

    // Emulator frames arrive faster than the emit window so the rate limiter
    // is actually exercised
    let frame_interval = Duration::from_millis(config.stream.min_frame_interval_ms / 3);
    let sdk = Arc::new(EmulatedSdk::new(
        emulator_kind,
        config.camera.frame_width,
        config.camera.frame_height,
        frame_interval,
    ));

    let sink = Arc::new(BroadcastSink::new(config.events.channel_capacity));
    let mut events = sink.subscribe();

    let supervisor = Arc::new(ConnectionSupervisor::new(sdk, sink, &config));
    supervisor.init();

    let facade = DeviceFacade::new(Arc::clone(&supervisor));

    // Forward events to stdout as JSON lines for the hosting runtime
    let observer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        }
    });

    supervisor.start_discovery_and_connect();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    info!("Final connection status: {}", facade.connection_info());

    supervisor.stop();
    observer.abort();

    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

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
        .unwrap_or_else(|_| EnvFilter::new(format!("thermocam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
