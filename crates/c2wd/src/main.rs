//! c2wd — the server daemon.
//!
//! # Usage
//!
//! ```bash
//! c2wd                              # Start on the default port
//! c2wd --port 9876                  # Bind a specific UDP port
//! c2wd --drop-probability 0.05      # Exercise the retransmit path against simulated loss
//! ```
//!
//! # Architecture
//!
//! The daemon binds one UDP socket, wraps it in the (optionally lossy)
//! transport, and runs two concurrent tasks: an inbound read loop that
//! forwards every datagram into the messenger's event channel, and the
//! messenger's own dispatch loop, which drains that channel and hands
//! each event to the server role.

mod app;
mod role;

use anyhow::{Context, Result};
use app::App;
use c2w_core::config::AppConfig;
use c2w_core::directory::InMemoryDirectory;
use c2w_core::messenger::Messenger;
use c2w_core::transport::{LossyTransport, UdpTransport};
use clap::Parser;
use role::ServerRole;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// c2w server daemon — reliable UDP messenger, room directory, movie catalog.
#[derive(Parser, Debug)]
#[command(name = "c2wd", about = "c2w server daemon")]
struct Cli {
    /// UDP port to bind. Overrides config.toml for this run.
    #[arg(short, long)]
    port: Option<u16>,

    /// Fraction of outbound datagrams to drop, for exercising
    /// retransmission against a real loss rate. Overrides config.toml.
    #[arg(long)]
    drop_probability: Option<f64>,

    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::config_file_path().context("could not determine config directory")?,
    };

    let mut config = match AppConfig::load_from(&config_path)? {
        Some(config) => {
            info!(path = %config_path.display(), "loaded config");
            config
        }
        None => {
            info!("no config file found, using defaults");
            let config = AppConfig::default();
            config.save_to(&config_path)?;
            config
        }
    };

    if let Some(port) = cli.port {
        config.bind_port = port;
    }
    if let Some(drop_probability) = cli.drop_probability {
        config.drop_probability = drop_probability;
    }
    config.validate().context("invalid configuration")?;

    let bind_addr: SocketAddr = format!("0.0.0.0:{}", config.bind_port)
        .parse()
        .context("invalid bind address")?;
    let udp = UdpTransport::bind(bind_addr).await.context("failed to bind UDP socket")?;
    let local_addr = udp.local_addr()?;
    let transport = Arc::new(LossyTransport::new(udp, config.drop_probability));
    info!(addr = %local_addr, drop_probability = config.drop_probability, "listening");

    let (messenger, events_rx) = Messenger::new(transport.clone());
    let role = ServerRole::new(InMemoryDirectory::new());
    App::spawn_read_loop(transport, messenger.event_sender());

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating shutdown");
                let _ = shutdown_tx.send(()).await;
            }
            Err(error) => error!(%error, "failed to listen for Ctrl+C"),
        }
    });

    let app = App::new(messenger, role);
    info!("server is running. Press Ctrl+C to stop.");
    app.run(events_rx, shutdown_rx).await;
    info!("server stopped");

    Ok(())
}

/// Sets up a layered subscriber writing to stderr and, if a data
/// directory is available, an append-only log file. The log level is
/// controlled by the `C2WD_LOG` environment variable, defaulting to
/// `info`.
fn init_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_env("C2WD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let file_layer = AppConfig::data_dir()
        .and_then(|dir| {
            std::fs::create_dir_all(&dir).ok()?;
            let log_path = dir.join("c2wd.log");
            std::fs::OpenOptions::new().create(true).append(true).open(log_path).ok()
        })
        .map(|file| fmt::layer().with_writer(std::sync::Mutex::new(file)).with_ansi(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
}
