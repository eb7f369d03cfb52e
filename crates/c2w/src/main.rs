//! c2w — the terminal client.
//!
//! Connects to a `c2wd` server over UDP and provides an interactive
//! terminal interface for chatting and picking a movie room.
//!
//! # Usage
//!
//! ```bash
//! c2w 192.168.1.10:7878 --name alice
//! ```
//!
//! The server must already be running; there's no discovery here, the
//! user supplies `host:port` directly.

mod app;
mod event;
mod presentation;
mod role;
mod ui;

use anyhow::{Context, Result};
use app::{Action, TuiApp};
use c2w_core::config::AppConfig;
use c2w_core::messenger::{Event as MessengerEvent, Messenger};
use c2w_core::peer::PeerKey;
use c2w_core::room::RoomId;
use c2w_core::transport::{LossyTransport, UdpTransport};
use clap::Parser;
use crossterm::{
    event::EventStream,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use presentation::{ServerEvent, TuiPresentation};
use ratatui::prelude::*;
use role::ClientRole;
use std::io::stdout;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

/// c2w TUI client — chat and pick a movie room on a running c2wd server.
#[derive(Parser, Debug)]
#[command(name = "c2w", about = "c2w terminal client")]
struct Cli {
    /// The server's `host:port`. Overrides config.toml for this run.
    server: Option<String>,

    /// Login name. Overrides config.toml for this run.
    #[arg(long)]
    name: Option<String>,

    /// Fraction of outbound datagrams to drop, for exercising
    /// retransmission against a real loss rate.
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
    let mut config = AppConfig::load_from(&config_path)?.unwrap_or_default();
    if let Some(server) = &cli.server {
        config.server_addr = Some(server.clone());
    }
    if let Some(name) = &cli.name {
        config.user_name = Some(name.clone());
    }
    if let Some(drop_probability) = cli.drop_probability {
        config.drop_probability = drop_probability;
    }
    config.validate().context("invalid configuration")?;

    let server_addr: SocketAddr = config
        .server_addr
        .as_deref()
        .context("no server address given (pass it as an argument or set server_addr in config.toml)")?
        .parse()
        .context("invalid server address")?;
    let user_name = config.user_name.clone().context("no login name given (--name or config.toml)")?;

    let udp = UdpTransport::bind("0.0.0.0:0".parse().unwrap()).await.context("failed to bind UDP socket")?;
    let transport = Arc::new(LossyTransport::new(udp, config.drop_probability));
    let (mut messenger, mut messenger_events) = Messenger::new(transport.clone());

    let (presentation, mut presentation_events) = TuiPresentation::new();
    let mut client_role = ClientRole::new(PeerKey(server_addr), user_name.clone(), presentation);

    spawn_read_loop(transport, messenger.event_sender());

    client_role.login(&mut messenger).await;

    run_tui(&mut messenger, &mut messenger_events, &mut presentation_events, &mut client_role, user_name).await
}

fn spawn_read_loop<T: c2w_core::transport::DatagramTransport + 'static>(
    transport: Arc<T>,
    events: tokio::sync::mpsc::UnboundedSender<MessengerEvent>,
) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 2048];
        loop {
            match transport.recv_from(&mut buf).await {
                Ok((len, source)) => {
                    let datagram = buf[..len].to_vec();
                    if events.send(MessengerEvent::Inbound { datagram, source }).is_err() {
                        break;
                    }
                }
                Err(error) => tracing::warn!(%error, "transport read error, continuing"),
            }
        }
    });
}

/// Runs the interactive TUI main loop: terminal input, messenger events,
/// and presentation events all feed into one `tokio::select!`.
async fn run_tui<T: c2w_core::transport::DatagramTransport>(
    messenger: &mut Messenger<T>,
    messenger_events: &mut tokio::sync::mpsc::UnboundedReceiver<MessengerEvent>,
    presentation_events: &mut tokio::sync::mpsc::UnboundedReceiver<ServerEvent>,
    role: &mut ClientRole<TuiPresentation>,
    our_name: String,
) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
        original_hook(info);
    }));

    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut tui_app = TuiApp::new(our_name);

    let mut event_stream = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        terminal.draw(|frame| ui::layout::render(frame, &mut tui_app))?;

        tokio::select! {
            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(evt)) => {
                        if let Some(action) = event::handle_event(&evt, &tui_app) {
                            handle_action(action, &mut tui_app, messenger, role).await;
                        }
                    }
                    Some(Err(_)) => {}
                    None => break,
                }
            }

            Some(event) = messenger_events.recv() => {
                messenger.dispatch_event(event, role).await;
            }

            Some(event) = presentation_events.recv() => {
                tui_app.handle_action(Action::Server(event));
            }

            _ = tick.tick() => {}
        }

        if tui_app.should_quit {
            break;
        }
    }

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

async fn handle_action<T: c2w_core::transport::DatagramTransport>(
    action: Action,
    tui_app: &mut TuiApp,
    messenger: &mut Messenger<T>,
    role: &mut ClientRole<TuiPresentation>,
) {
    match action {
        Action::SelectMovie => {
            if let Some(movie) = tui_app.selected_movie() {
                let title = movie.title.clone();
                tui_app.pending_room = Some(RoomId::Movie(title.clone()));
                role.select_movie(title, messenger).await;
            }
        }
        Action::QuitMovie => {
            tui_app.pending_room = Some(RoomId::Main);
            role.quit_movie(messenger).await;
        }
        Action::SendChat => {
            let text = tui_app.take_input();
            if !text.trim().is_empty() {
                tui_app.chat_log.push((tui_app.our_name.clone(), text.clone()));
                tui_app.chat_scroll = 0;
                role.send_chat(text, messenger).await;
            }
        }
        Action::RequestQuitApp => {
            role.quit_app(messenger).await;
        }
        other => tui_app.handle_action(other),
    }
}

/// Sets up file-only logging, gated by `C2W_LOG`. The TUI owns the
/// terminal, so logging to stderr would corrupt the display; logging is
/// simply off unless the env var is set.
fn init_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    if std::env::var("C2W_LOG").is_err() {
        return;
    }

    let env_filter = EnvFilter::try_from_env("C2W_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = AppConfig::data_dir().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        let log_path = dir.join("c2w.log");
        std::fs::OpenOptions::new().create(true).append(true).open(log_path).ok()
    }).map(|file| fmt::layer().with_writer(std::sync::Mutex::new(file)).with_ansi(false));

    tracing_subscriber::registry().with(env_filter).with(file_layer).init();
}
