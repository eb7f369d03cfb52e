//! The server application: wires the messenger, the server role, and an
//! inbound read loop together, then runs the event loop until shutdown.
//!
//! The messenger owns all outbound writes; a dedicated task owns the
//! inbound reads and forwards each datagram into the messenger's event
//! channel as `Event::Inbound`. Both sides talk to the same socket
//! through an `Arc`-shared transport rather than a lock, since
//! `DatagramTransport`'s methods only ever need `&self`.

use c2w_core::directory::Directory;
use c2w_core::messenger::{Event, Messenger};
use c2w_core::transport::DatagramTransport;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::role::ServerRole;

pub struct App<T: DatagramTransport, D: Directory> {
    messenger: Messenger<T>,
    role: ServerRole<D>,
}

impl<T: DatagramTransport + 'static, D: Directory> App<T, D> {
    pub fn new(messenger: Messenger<T>, role: ServerRole<D>) -> Self {
        Self { messenger, role }
    }

    /// Spawns the inbound read loop for `transport` and wires it to
    /// forward every received datagram into `events`.
    pub fn spawn_read_loop(transport: Arc<T>, events: mpsc::UnboundedSender<Event>) {
        tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                match transport.recv_from(&mut buf).await {
                    Ok((len, source)) => {
                        let datagram = buf[..len].to_vec();
                        if events.send(Event::Inbound { datagram, source }).is_err() {
                            break; // messenger side has shut down
                        }
                    }
                    Err(error) => {
                        warn!(%error, "transport read error, continuing");
                    }
                }
            }
        });
    }

    /// Runs the event loop until the shutdown channel fires.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<Event>,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        info!("server event loop started");
        loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    self.messenger.dispatch_event(event, &mut self.role).await;
                }
                _ = shutdown.recv() => {
                    info!("shutdown requested");
                    break;
                }
                else => break,
            }
        }
        info!("server event loop stopped");
    }
}
