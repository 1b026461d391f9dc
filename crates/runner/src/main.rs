mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modis_runner_core::{
    create_publisher, load_config, net, run_listener, validate_config, AncillaryRefresher,
    Controller, MessageSource, PipelineExecutor, SubprocessRunner, TcpPublisher, TcpSubscriber,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "modis-l1-runner")]
#[command(about = "Direct-readout MODIS level-0 to level-1 processing runner")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "MODIS_RUNNER_CONFIG", default_value = "modis-runner.toml")]
    config: PathBuf,

    /// Verbosity: -v for info, -vv for debug (overridden by RUST_LOG)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("*** Start the runner for the MODIS level-1 processing");

    // Load configuration
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "Configuration loaded (station {}, hash {})",
        config.runner.station,
        &config_hash[..16]
    );
    let config = Arc::new(config);

    // Navigation helper files
    let refresher = Arc::new(
        AncillaryRefresher::new(config.ancillary.clone())
            .context("Failed to create ancillary file client")?,
    );
    info!("Checking the MODIS navigation helper files");
    if refresher.ensure_fresh().await {
        info!("Navigation helper files are fresh");
    } else {
        warn!("Navigation helper files are missing or stale, continuing anyway");
    }

    // Completion publisher
    let outbound = TcpPublisher::bind(
        &config.messaging.publish_address,
        config.messaging.queue_capacity,
    )
    .await
    .context("Failed to start the completion publisher")?;
    let (publish_handle, publisher) =
        create_publisher(Arc::new(outbound), config.messaging.queue_capacity);
    let publisher_task = tokio::spawn(publisher.run());

    // Pipeline and control loop
    let sender = format!(
        "{}@{}",
        std::env::var("USER").unwrap_or_else(|_| "modis".to_string()),
        net::hostname()
    );
    let runner = Arc::new(SubprocessRunner::from_timeout_secs(
        config.executables.timeout_secs,
    ));
    let executor = PipelineExecutor::new(Arc::clone(&config), runner, publish_handle, sender);

    let local_hosts = tokio::task::spawn_blocking(net::LocalHosts::detect)
        .await
        .context("Failed to detect local addresses")?;
    info!("Local addresses: {}", local_hosts.len());
    let local_hosts = Arc::new(local_hosts);

    let controller =
        Controller::new(Arc::clone(&config), executor).with_refresher(Arc::clone(&refresher));
    let registries = controller.registries();

    // Listeners
    let (arrival_tx, arrival_rx) = mpsc::channel(config.messaging.queue_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconnect_delay = Duration::from_millis(config.messaging.reconnect_delay_ms);
    let mut listeners = Vec::new();
    for address in &config.messaging.subscribe_addresses {
        let source: Box<dyn MessageSource> =
            Box::new(TcpSubscriber::new(address.clone(), reconnect_delay));
        listeners.push(tokio::spawn(run_listener(
            source,
            config.messaging.subscribe_topics.clone(),
            Arc::clone(&local_hosts),
            arrival_tx.clone(),
            shutdown_rx.clone(),
        )));
    }
    drop(arrival_tx);

    let control_task = tokio::spawn(controller.run(arrival_rx));

    // Status server, or just wait for a signal
    if config.server.enabled {
        let state = Arc::new(AppState::new(Arc::clone(&config), registries, VERSION));
        let app = create_router(state);

        let addr = SocketAddr::new(config.server.host, config.server.port);
        info!("Starting status server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;
    } else {
        shutdown_signal().await;
    }

    // Stop listening, let running pipelines finish, flush the publisher.
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    futures::future::join_all(listeners).await;
    info!("Listeners stopped");

    if let Err(e) = control_task.await {
        error!("Control loop ended abnormally: {}", e);
    }

    // The control loop held the last publish handle.
    let _ = publisher_task.await;
    info!("Publisher stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
