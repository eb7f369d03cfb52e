//! The client-side presentation proxy: the one-shot, user-visible events
//! the client role pushes out as the protocol state machine advances.
//!
//! Like `Directory` on the server side, this is a trait so the client
//! role is generic over how those events reach a human — a TUI app in
//! `c2w`, or a fake recorder in tests.

use crate::room::RoomId;

/// A user's name and room as known to the client, decoded from a
/// `UserList` packet. `room` is resolved from the wire's single status
/// bit the way the client role does it: see the note on status-bit
/// ambiguity where that resolution happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub room: RoomId,
}

/// A streamable movie as advertised by the server, decoded from a
/// `MovieList` packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieEntry {
    pub title: String,
    pub address: std::net::Ipv4Addr,
    pub port: u16,
}

/// User-visible events the client role raises. Every method is a one-shot
/// notification, not a query: the client role never reads state back out
/// of the presentation.
pub trait PresentationProxy: Send {
    /// Login finished: both the initial roster and movie catalog have
    /// arrived.
    fn init_complete(&mut self, roster: Vec<RosterEntry>, movies: Vec<MovieEntry>);

    /// The server acknowledged a movie-selection or quit-movie request;
    /// the room change is now confirmed.
    fn join_room_ok(&mut self);

    fn chat_received(&mut self, sender: String, text: String);

    /// The server refused the connection (e.g. duplicate user name).
    fn connection_rejected(&mut self, reason: String);

    fn user_list_updated(&mut self, roster: Vec<RosterEntry>);

    /// The client's own quit-app request was acknowledged.
    fn leave_system_ok(&mut self);

    /// The client is terminating: connection refused, retransmit
    /// exhaustion, or an explicit quit. `reason` is for logging/display.
    fn quit(&mut self, reason: String);
}
