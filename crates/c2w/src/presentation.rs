//! Bridges the client role's `PresentationProxy` calls into the TUI's
//! event loop.
//!
//! `PresentationProxy` methods are synchronous and can fire from inside
//! an ack-waiter closure with no async context available, so the bridge
//! is a plain unbounded channel send rather than anything awaited.

use c2w_core::presentation::{MovieEntry, PresentationProxy, RosterEntry};
use tokio::sync::mpsc;

/// A user-visible event ready for the TUI to fold into `TuiApp`.
///
/// `JoinRoomOk` carries no room of its own — the presentation proxy
/// trait doesn't pass one — so the main loop tracks which room a
/// pending movie-select/quit-movie was headed for and applies it when
/// this event confirms the ack.
#[derive(Debug)]
pub enum ServerEvent {
    InitComplete { roster: Vec<RosterEntry>, movies: Vec<MovieEntry> },
    JoinRoomOk,
    ChatReceived { sender: String, text: String },
    ConnectionRejected { reason: String },
    UserListUpdated { roster: Vec<RosterEntry> },
    LeaveSystemOk,
    Quit { reason: String },
}

pub struct TuiPresentation {
    events: mpsc::UnboundedSender<ServerEvent>,
}

impl TuiPresentation {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }
}

impl PresentationProxy for TuiPresentation {
    fn init_complete(&mut self, roster: Vec<RosterEntry>, movies: Vec<MovieEntry>) {
        let _ = self.events.send(ServerEvent::InitComplete { roster, movies });
    }

    fn join_room_ok(&mut self) {
        let _ = self.events.send(ServerEvent::JoinRoomOk);
    }

    fn chat_received(&mut self, sender: String, text: String) {
        let _ = self.events.send(ServerEvent::ChatReceived { sender, text });
    }

    fn connection_rejected(&mut self, reason: String) {
        let _ = self.events.send(ServerEvent::ConnectionRejected { reason });
    }

    fn user_list_updated(&mut self, roster: Vec<RosterEntry>) {
        let _ = self.events.send(ServerEvent::UserListUpdated { roster });
    }

    fn leave_system_ok(&mut self) {
        let _ = self.events.send(ServerEvent::LeaveSystemOk);
    }

    fn quit(&mut self, reason: String) {
        let _ = self.events.send(ServerEvent::Quit { reason });
    }
}
