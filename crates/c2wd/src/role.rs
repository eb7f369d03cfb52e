//! Server role: typed handlers for login, room changes, and chat
//! distribution, driving directory updates and user-list fan-out.
//!
//! Generic over `Directory` the same way the messenger is generic over
//! its transport, so the fan-out logic below can be exercised against an
//! in-memory fake without a socket in the loop.

use c2w_core::directory::Directory;
use c2w_core::messenger::Messenger;
use c2w_core::peer::PeerKey;
use c2w_core::protocol::{PacketBody, UserRecord};
use c2w_core::role::Role;
use c2w_core::room::RoomId;
use c2w_core::transport::DatagramTransport;
use std::net::SocketAddr;

pub struct ServerRole<D: Directory> {
    directory: D,
}

impl<D: Directory> ServerRole<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    async fn handle_login<T: DatagramTransport>(
        &mut self,
        peer: PeerKey,
        user_name: String,
        messenger: &mut Messenger<T>,
    ) {
        if self.directory.user_exists(&user_name) {
            tracing::info!(%user_name, %peer, "rejecting duplicate login");
            messenger.enqueue(peer, PacketBody::ConnRefused).await;
            return;
        }

        messenger.ensure_peer(peer);
        // The login packet consumed sequence 0; the next packet from this
        // peer is expected at 1.
        messenger.set_next_expected_recv_seq(peer, 1);

        self.directory.add_user(&user_name, RoomId::Main, peer.0);
        tracing::info!(%user_name, %peer, "accepted login");

        messenger.enqueue(peer, PacketBody::ConnAccepted).await;
        self.fan_out_transition(messenger, RoomId::OutOfSystem, RoomId::Main).await;

        let movies = self
            .directory
            .movie_list()
            .into_iter()
            .map(|movie| c2w_core::protocol::MovieRecord {
                title: movie.title,
                address: movie.address,
                port: movie.port,
            })
            .collect();
        messenger.enqueue(peer, PacketBody::MovieList(movies)).await;
    }

    async fn handle_quit_movie<T: DatagramTransport>(&mut self, peer: PeerKey, messenger: &mut Messenger<T>) {
        let Some(user) = self.directory.get_user_by_address(peer.0).cloned() else {
            return;
        };
        let old_room = user.room;
        self.directory.update_room(&user.name, RoomId::Main);
        self.fan_out_transition(messenger, old_room, RoomId::Main).await;
    }

    async fn handle_quit_app<T: DatagramTransport>(&mut self, peer: PeerKey, messenger: &mut Messenger<T>) {
        let Some(user) = self.directory.get_user_by_address(peer.0).cloned() else {
            return;
        };
        self.directory.remove_user(&user.name);
        messenger.evict(peer);
        self.fan_out_transition(messenger, user.room, RoomId::OutOfSystem).await;
    }

    async fn handle_movie_select<T: DatagramTransport>(
        &mut self,
        peer: PeerKey,
        movie_title: String,
        messenger: &mut Messenger<T>,
    ) {
        let Some(user) = self.directory.get_user_by_address(peer.0).cloned() else {
            return;
        };
        let old_room = user.room;
        let new_room = RoomId::Movie(movie_title.clone());
        self.directory.update_room(&user.name, new_room.clone());
        self.directory.start_streaming(&movie_title);
        // No explicit join confirmation: the messenger's ACK of this
        // packet, already sent before we were dispatched, is it.
        self.fan_out_transition(messenger, old_room, new_room).await;
    }

    async fn handle_chat<T: DatagramTransport>(
        &mut self,
        peer: PeerKey,
        _claimed_sender_name: String,
        text: String,
        messenger: &mut Messenger<T>,
    ) {
        let Some(sender) = self.directory.get_user_by_address(peer.0).cloned() else {
            return;
        };
        let recipients: Vec<SocketAddr> = self
            .directory
            .user_list()
            .into_iter()
            .filter(|user| user.address != peer.0 && user.room == sender.room)
            .map(|user| user.address)
            .collect();
        for addr in recipients {
            messenger
                .enqueue(
                    PeerKey(addr),
                    PacketBody::Chat { sender_name: sender.name.clone(), text: text.clone() },
                )
                .await;
        }
    }

    /// Sends the user-list updates a room transition requires: the
    /// vacated movie room (if any), the joined movie room (if any), and
    /// always the main room, per the fan-out rules.
    async fn fan_out_transition<T: DatagramTransport>(
        &mut self,
        messenger: &mut Messenger<T>,
        old_room: RoomId,
        new_room: RoomId,
    ) {
        if let RoomId::Movie(title) = &old_room {
            let records = self.movie_room_user_records(title);
            self.send_user_list_to_room(messenger, &old_room, records).await;
        }
        if let RoomId::Movie(title) = &new_room {
            let records = self.movie_room_user_records(title);
            self.send_user_list_to_room(messenger, &new_room, records).await;
        }
        let main_records = self.main_room_user_records();
        self.send_user_list_to_room(messenger, &RoomId::Main, main_records).await;
    }

    async fn send_user_list_to_room<T: DatagramTransport>(
        &mut self,
        messenger: &mut Messenger<T>,
        room: &RoomId,
        records: Vec<UserRecord>,
    ) {
        let occupants: Vec<SocketAddr> = self
            .directory
            .user_list()
            .into_iter()
            .filter(|user| &user.room == room)
            .map(|user| user.address)
            .collect();
        for addr in occupants {
            messenger.enqueue(PeerKey(addr), PacketBody::UserList(records.clone())).await;
        }
    }

    fn movie_room_user_records(&self, title: &str) -> Vec<UserRecord> {
        self.directory
            .user_list()
            .into_iter()
            .filter(|user| matches!(&user.room, RoomId::Movie(t) if t == title))
            .map(|user| UserRecord { name: user.name, in_movie_room: true })
            .collect()
    }

    fn main_room_user_records(&self) -> Vec<UserRecord> {
        self.directory
            .user_list()
            .into_iter()
            .map(|user| UserRecord { name: user.name, in_movie_room: !matches!(user.room, RoomId::Main) })
            .collect()
    }
}

impl<T: DatagramTransport, D: Directory> Role<T> for ServerRole<D> {
    async fn handle_inbound(
        &mut self,
        peer: PeerKey,
        sequence_number: u16,
        body: PacketBody,
        messenger: &mut Messenger<T>,
    ) {
        let _ = sequence_number;
        match body {
            PacketBody::Login { user_name } => self.handle_login(peer, user_name, messenger).await,
            PacketBody::QuitMovie => self.handle_quit_movie(peer, messenger).await,
            PacketBody::QuitApp => self.handle_quit_app(peer, messenger).await,
            PacketBody::MovieSelect { movie_title } => {
                self.handle_movie_select(peer, movie_title, messenger).await
            }
            PacketBody::Chat { sender_name, text } => {
                self.handle_chat(peer, sender_name, text, messenger).await
            }
            other => tracing::warn!(%peer, body = %other, "server role has no handler for this packet type"),
        }
    }

    async fn on_peer_evicted(&mut self, peer: PeerKey, messenger: &mut Messenger<T>) {
        let Some(user) = self.directory.get_user_by_address(peer.0).cloned() else {
            return;
        };
        tracing::warn!(user = %user.name, %peer, "peer retransmit-exhausted, evicting");
        self.directory.remove_user(&user.name);
        self.fan_out_transition(messenger, user.room, RoomId::OutOfSystem).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c2w_core::directory::InMemoryDirectory;
    use c2w_core::messenger::Event;
    use c2w_core::transport::RecordingTransport;
    use std::net::Ipv4Addr;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    async fn deliver(
        messenger: &mut Messenger<RecordingTransport>,
        datagram: Vec<u8>,
        source: SocketAddr,
        role: &mut ServerRole<InMemoryDirectory>,
    ) {
        messenger.dispatch_event(Event::Inbound { datagram, source }, role).await;
    }

    fn decode_all(sent: &[(SocketAddr, Vec<u8>)]) -> Vec<(SocketAddr, PacketBody)> {
        sent.iter()
            .map(|(addr, datagram)| (*addr, c2w_core::protocol::decode(datagram).unwrap().1))
            .collect()
    }

    #[tokio::test]
    async fn happy_login_accepts_and_sends_lists() {
        let (mut messenger, _rx) = Messenger::new(RecordingTransport::new());
        let mut role = ServerRole::new(InMemoryDirectory::new());
        let peer = PeerKey(addr(9200));

        let login = c2w_core::protocol::encode(0, &PacketBody::Login { user_name: "alice".to_string() });
        deliver(&mut messenger, login, peer.0, &mut role).await;

        let sent = decode_all(&messenger.transport().sent());
        // ack, connection-accepted, user-list, movie-list
        assert!(sent.iter().any(|(_, b)| matches!(b, PacketBody::Ack)));
        assert!(sent.iter().any(|(_, b)| matches!(b, PacketBody::ConnAccepted)));
        assert!(sent.iter().any(|(_, b)| matches!(b, PacketBody::UserList(records) if records == &vec![
            UserRecord { name: "alice".to_string(), in_movie_room: false }
        ])));
        assert!(sent.iter().any(|(_, b)| matches!(b, PacketBody::MovieList(movies) if movies.is_empty())));
        assert!(role.directory().user_exists("alice"));
    }

    #[tokio::test]
    async fn duplicate_login_is_refused() {
        let (mut messenger, _rx) = Messenger::new(RecordingTransport::new());
        let mut role = ServerRole::new(InMemoryDirectory::new());
        let first = PeerKey(addr(9201));
        let second = PeerKey(addr(9202));

        let login_alice = c2w_core::protocol::encode(0, &PacketBody::Login { user_name: "alice".to_string() });
        deliver(&mut messenger, login_alice, first.0, &mut role).await;

        let login_alice_again = c2w_core::protocol::encode(0, &PacketBody::Login { user_name: "alice".to_string() });
        deliver(&mut messenger, login_alice_again, second.0, &mut role).await;

        let sent_to_second = decode_all(&messenger.transport().sent())
            .into_iter()
            .filter(|(addr, _)| *addr == second.0)
            .map(|(_, body)| body)
            .collect::<Vec<_>>();
        assert!(sent_to_second.iter().any(|b| matches!(b, PacketBody::ConnRefused)));
        assert!(!sent_to_second.iter().any(|b| matches!(b, PacketBody::ConnAccepted)));
    }

    #[tokio::test]
    async fn chat_fans_out_to_roommates_only() {
        let (mut messenger, _rx) = Messenger::new(RecordingTransport::new());
        let mut role = ServerRole::new(InMemoryDirectory::new());
        let alice = PeerKey(addr(9203));
        let bob = PeerKey(addr(9204));

        for (peer, name) in [(alice, "alice"), (bob, "bob")] {
            let login = c2w_core::protocol::encode(0, &PacketBody::Login { user_name: name.to_string() });
            deliver(&mut messenger, login, peer.0, &mut role).await;
        }

        let chat = c2w_core::protocol::encode(
            1,
            &PacketBody::Chat { sender_name: "alice".to_string(), text: "hi".to_string() },
        );
        deliver(&mut messenger, chat, alice.0, &mut role).await;

        let sent = decode_all(&messenger.transport().sent());
        let chat_to_bob = sent.iter().any(|(addr, body)| {
            *addr == bob.0
                && matches!(body, PacketBody::Chat { sender_name, text } if sender_name == "alice" && text == "hi")
        });
        let chat_to_alice = sent.iter().any(|(addr, body)| {
            *addr == alice.0 && matches!(body, PacketBody::Chat { .. })
        });
        assert!(chat_to_bob);
        assert!(!chat_to_alice);
    }

    #[tokio::test]
    async fn movie_selection_moves_room_and_fans_out() {
        let (mut messenger, _rx) = Messenger::new(RecordingTransport::new());
        let mut role = ServerRole::new(InMemoryDirectory::new());
        role.directory.add_movie(c2w_core::directory::Movie {
            title: "Matrix".to_string(),
            address: Ipv4Addr::new(239, 0, 0, 1),
            port: 9000,
        });
        let alice = PeerKey(addr(9205));
        let login = c2w_core::protocol::encode(0, &PacketBody::Login { user_name: "alice".to_string() });
        deliver(&mut messenger, login, alice.0, &mut role).await;

        let select = c2w_core::protocol::encode(1, &PacketBody::MovieSelect { movie_title: "Matrix".to_string() });
        deliver(&mut messenger, select, alice.0, &mut role).await;

        assert_eq!(
            role.directory().get_user_by_name("alice").unwrap().room,
            RoomId::Movie("Matrix".to_string())
        );
    }
}
