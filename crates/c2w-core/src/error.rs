//! Crate-wide error types.
//!
//! Each concern gets its own error enum (mirroring how `protocol`, `config`
//! and the directory each report failures) rather than one monolithic enum.
//! `MessengerError` is the one type that crosses the engine/role boundary,
//! since role handlers need to know when an enqueue or ack-registration
//! failed.

use thiserror::Error;

/// Errors the messenger engine can report back to a role handler.
///
/// Per spec, most inbound failure conditions (malformed header/payload,
/// unknown peer, duplicate/out-of-order delivery) are handled silently
/// inside the engine and never reach a role — this enum only covers the
/// cases a role needs to react to.
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("no known peer state for {0:?}")]
    UnknownPeer(std::net::SocketAddr),
}
