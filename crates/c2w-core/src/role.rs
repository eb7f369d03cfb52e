//! The capability set a role (server or client) implements to receive
//! dispatch from the messenger engine.
//!
//! Server and client share the reliability engine (C3) and diverge only in
//! how they react to inbound packets — modeled here as a trait rather
//! than an inheritance hierarchy, per the role-polymorphism design note.
//! `ServerRole` lives in `c2wd`, `ClientRole` lives in `c2w`; both are
//! generic over the same `Messenger<T>`.

use crate::messenger::Messenger;
use crate::peer::PeerKey;
use crate::protocol::PacketBody;
use crate::transport::DatagramTransport;

/// Typed dispatch target for packets the messenger has already
/// ack'd/dedup'd and decided to deliver.
pub trait Role<T: DatagramTransport> {
    /// Called for every inbound packet accepted for dispatch: a login (the
    /// only type accepted from an unknown peer) or an in-order non-ACK
    /// packet from a known peer. `sequence_number` is provided because
    /// some handlers (login) need it to derive `next_expected_recv_seq`.
    async fn handle_inbound(
        &mut self,
        peer: PeerKey,
        sequence_number: u16,
        body: PacketBody,
        messenger: &mut Messenger<T>,
    );

    /// Called when the messenger gives up on a peer after exhausting the
    /// retransmit budget. The peer's state has already been torn down by
    /// the time this fires.
    async fn on_peer_evicted(&mut self, peer: PeerKey, messenger: &mut Messenger<T>);
}
