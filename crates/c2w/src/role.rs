//! Client role: the login/room/chat state machine driving a single
//! presentation proxy.
//!
//! Ack-waiters fire from inside `Messenger::handle_ack`, outside any
//! `Role` call, so they can't borrow `self`. The mutable state they need
//! to touch (the state machine and the presentation proxy) lives behind
//! an `Arc<Mutex<_>>` shared between the role's own methods and the
//! waiter closures — the same sharing shape `transport`'s `Arc` impl
//! uses to let one socket serve two independent callers.

use c2w_core::messenger::Messenger;
use c2w_core::peer::PeerKey;
use c2w_core::presentation::{MovieEntry, PresentationProxy, RosterEntry};
use c2w_core::protocol::{PacketBody, UserRecord};
use c2w_core::role::Role;
use c2w_core::room::RoomId;
use c2w_core::transport::DatagramTransport;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Disconnected,
    AwaitingAccept,
    AwaitingLists,
    InMainRoom,
    InMovieRoom,
    Quit,
}

struct Shared<P: PresentationProxy> {
    state: ClientState,
    current_room: RoomId,
    cached_roster: Option<Vec<RosterEntry>>,
    logged_in: bool,
    presentation: P,
}

impl<P: PresentationProxy> Shared<P> {
    /// Resolves a `UserList` record's one-bit status into a room, per the
    /// status-bit ambiguity rule: a user flagged as "in a movie room" is
    /// attributed our own current movie when we're in one, since the wire
    /// format never says which movie a third party is actually watching.
    fn resolve_room(&self, in_movie_room: bool) -> RoomId {
        if !in_movie_room {
            return RoomId::Main;
        }
        match &self.current_room {
            RoomId::Movie(title) => RoomId::Movie(title.clone()),
            _ => RoomId::Movie("<unknown movie>".to_string()),
        }
    }

    fn decode_roster(&self, records: Vec<UserRecord>) -> Vec<RosterEntry> {
        records
            .into_iter()
            .map(|record| RosterEntry {
                room: self.resolve_room(record.in_movie_room),
                name: record.name,
            })
            .collect()
    }
}

pub struct ClientRole<P: PresentationProxy> {
    server: PeerKey,
    user_name: String,
    shared: Arc<Mutex<Shared<P>>>,
}

impl<P: PresentationProxy + 'static> ClientRole<P> {
    pub fn new(server: PeerKey, user_name: String, presentation: P) -> Self {
        Self {
            server,
            user_name,
            shared: Arc::new(Mutex::new(Shared {
                state: ClientState::Disconnected,
                current_room: RoomId::OutOfSystem,
                cached_roster: None,
                logged_in: false,
                presentation,
            })),
        }
    }

    pub async fn login<T: DatagramTransport>(&mut self, messenger: &mut Messenger<T>) {
        self.shared.lock().unwrap().state = ClientState::AwaitingAccept;
        messenger
            .enqueue(self.server, PacketBody::Login { user_name: self.user_name.clone() })
            .await;
    }

    pub async fn select_movie<T: DatagramTransport>(&mut self, title: String, messenger: &mut Messenger<T>) {
        let sequence_number = messenger
            .enqueue(self.server, PacketBody::MovieSelect { movie_title: title.clone() })
            .await;
        let shared = self.shared.clone();
        let registered = messenger.register_ack_waiter(
            self.server,
            sequence_number,
            Box::new(move || {
                let mut shared = shared.lock().unwrap();
                shared.current_room = RoomId::Movie(title);
                shared.state = ClientState::InMovieRoom;
                shared.presentation.join_room_ok();
            }),
        );
        if let Err(error) = registered {
            tracing::warn!(%error, "server evicted before movie-select could be acked");
        }
    }

    pub async fn quit_movie<T: DatagramTransport>(&mut self, messenger: &mut Messenger<T>) {
        let sequence_number = messenger.enqueue(self.server, PacketBody::QuitMovie).await;
        let shared = self.shared.clone();
        let registered = messenger.register_ack_waiter(
            self.server,
            sequence_number,
            Box::new(move || {
                let mut shared = shared.lock().unwrap();
                shared.current_room = RoomId::Main;
                shared.state = ClientState::InMainRoom;
                shared.presentation.join_room_ok();
            }),
        );
        if let Err(error) = registered {
            tracing::warn!(%error, "server evicted before quit-movie could be acked");
        }
    }

    pub async fn quit_app<T: DatagramTransport>(&mut self, messenger: &mut Messenger<T>) {
        let sequence_number = messenger.enqueue(self.server, PacketBody::QuitApp).await;
        let shared = self.shared.clone();
        let registered = messenger.register_ack_waiter(
            self.server,
            sequence_number,
            Box::new(move || {
                let mut shared = shared.lock().unwrap();
                shared.state = ClientState::Quit;
                shared.presentation.leave_system_ok();
                shared.presentation.quit("left the system".to_string());
            }),
        );
        if let Err(error) = registered {
            tracing::warn!(%error, "server evicted before quit-app could be acked");
        }
    }

    pub async fn send_chat<T: DatagramTransport>(&mut self, text: String, messenger: &mut Messenger<T>) {
        messenger
            .enqueue(self.server, PacketBody::Chat { sender_name: self.user_name.clone(), text })
            .await;
    }

    pub fn has_quit(&self) -> bool {
        self.shared.lock().unwrap().state == ClientState::Quit
    }
}

impl<T: DatagramTransport, P: PresentationProxy + 'static> Role<T> for ClientRole<P> {
    async fn handle_inbound(
        &mut self,
        peer: PeerKey,
        _sequence_number: u16,
        body: PacketBody,
        messenger: &mut Messenger<T>,
    ) {
        if peer != self.server {
            tracing::warn!(%peer, "dropping datagram from a peer that isn't our server");
            return;
        }

        match body {
            PacketBody::ConnRefused => {
                let mut shared = self.shared.lock().unwrap();
                shared.state = ClientState::Quit;
                shared.presentation.connection_rejected("server refused the login".to_string());
                shared.presentation.quit("connection refused".to_string());
                drop(shared);
                messenger.evict(peer);
            }

            PacketBody::ConnAccepted => {
                let mut shared = self.shared.lock().unwrap();
                if shared.state == ClientState::AwaitingAccept {
                    shared.state = ClientState::AwaitingLists;
                }
            }

            PacketBody::UserList(records) => {
                let mut shared = self.shared.lock().unwrap();
                let roster = shared.decode_roster(records);
                shared.cached_roster = Some(roster.clone());
                if shared.logged_in {
                    shared.presentation.user_list_updated(roster);
                }
            }

            PacketBody::MovieList(movies) => {
                let movies: Vec<MovieEntry> = movies
                    .into_iter()
                    .map(|m| MovieEntry { title: m.title, address: m.address, port: m.port })
                    .collect();
                let mut shared = self.shared.lock().unwrap();
                if !shared.logged_in {
                    shared.logged_in = true;
                    shared.state = ClientState::InMainRoom;
                    shared.current_room = RoomId::Main;
                    let roster = shared.cached_roster.clone().unwrap_or_default();
                    shared.presentation.init_complete(roster, movies);
                }
            }

            PacketBody::Chat { sender_name, text } => {
                self.shared.lock().unwrap().presentation.chat_received(sender_name, text);
            }

            other => tracing::warn!(body = %other, "client role has no handler for this packet type"),
        }
    }

    async fn on_peer_evicted(&mut self, _peer: PeerKey, _messenger: &mut Messenger<T>) {
        let mut shared = self.shared.lock().unwrap();
        shared.state = ClientState::Quit;
        shared.presentation.quit("server unreachable: retransmit budget exhausted".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c2w_core::messenger::Event;
    use c2w_core::presentation::{MovieEntry as ME, RosterEntry as RE};
    use c2w_core::transport::RecordingTransport;
    use std::net::SocketAddr;
    use std::sync::Mutex as StdMutex;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[derive(Default)]
    struct RecordingPresentation {
        init_complete: Vec<(Vec<RE>, Vec<ME>)>,
        join_room_ok: usize,
        rejections: Vec<String>,
        quits: Vec<String>,
        user_lists: Vec<Vec<RE>>,
        chats: Vec<(String, String)>,
    }

    struct SharedPresentation(Arc<StdMutex<RecordingPresentation>>);

    impl PresentationProxy for SharedPresentation {
        fn init_complete(&mut self, roster: Vec<RE>, movies: Vec<ME>) {
            self.0.lock().unwrap().init_complete.push((roster, movies));
        }
        fn join_room_ok(&mut self) {
            self.0.lock().unwrap().join_room_ok += 1;
        }
        fn chat_received(&mut self, sender: String, text: String) {
            self.0.lock().unwrap().chats.push((sender, text));
        }
        fn connection_rejected(&mut self, reason: String) {
            self.0.lock().unwrap().rejections.push(reason);
        }
        fn user_list_updated(&mut self, roster: Vec<RE>) {
            self.0.lock().unwrap().user_lists.push(roster);
        }
        fn leave_system_ok(&mut self) {}
        fn quit(&mut self, reason: String) {
            self.0.lock().unwrap().quits.push(reason);
        }
    }

    async fn deliver(
        messenger: &mut Messenger<RecordingTransport>,
        datagram: Vec<u8>,
        source: SocketAddr,
        role: &mut ClientRole<SharedPresentation>,
    ) {
        messenger.dispatch_event(Event::Inbound { datagram, source }, role).await;
    }

    fn setup() -> (Messenger<RecordingTransport>, tokio::sync::mpsc::UnboundedReceiver<Event>, ClientRole<SharedPresentation>, Arc<StdMutex<RecordingPresentation>>) {
        let (messenger, rx) = Messenger::new(RecordingTransport::new());
        let recording = Arc::new(StdMutex::new(RecordingPresentation::default()));
        let role = ClientRole::new(PeerKey(addr(8000)), "alice".to_string(), SharedPresentation(recording.clone()));
        (messenger, rx, role, recording)
    }

    #[tokio::test]
    async fn login_then_accept_then_lists_completes_init() {
        let (mut messenger, _rx, mut role, recording) = setup();
        role.login(&mut messenger).await;

        let accepted = c2w_core::protocol::encode(0, &PacketBody::ConnAccepted);
        deliver(&mut messenger, accepted, addr(8000), &mut role).await;

        let user_list = c2w_core::protocol::encode(
            1,
            &PacketBody::UserList(vec![UserRecord { name: "alice".to_string(), in_movie_room: false }]),
        );
        deliver(&mut messenger, user_list, addr(8000), &mut role).await;

        let movie_list = c2w_core::protocol::encode(2, &PacketBody::MovieList(vec![]));
        deliver(&mut messenger, movie_list, addr(8000), &mut role).await;

        let rec = recording.lock().unwrap();
        assert_eq!(rec.init_complete.len(), 1);
        assert_eq!(rec.init_complete[0].0, vec![RE { name: "alice".to_string(), room: RoomId::Main }]);
    }

    #[tokio::test]
    async fn connection_refused_quits() {
        let (mut messenger, _rx, mut role, recording) = setup();
        role.login(&mut messenger).await;
        let refused = c2w_core::protocol::encode(0, &PacketBody::ConnRefused);
        deliver(&mut messenger, refused, addr(8000), &mut role).await;
        assert!(role.has_quit());
        assert_eq!(recording.lock().unwrap().rejections.len(), 1);
    }

    #[tokio::test]
    async fn movie_select_ack_fires_join_room_ok() {
        let (mut messenger, mut rx, mut role, recording) = setup();
        let seq = messenger
            .enqueue(PeerKey(addr(8000)), PacketBody::MovieSelect { movie_title: "Matrix".to_string() })
            .await;
        // mimic what select_movie does, minus the duplicate enqueue, to
        // register the waiter against the same sequence number
        let shared_for_test = role.shared.clone();
        messenger
            .register_ack_waiter(
                PeerKey(addr(8000)),
                seq,
                Box::new(move || {
                    let mut shared = shared_for_test.lock().unwrap();
                    shared.current_room = RoomId::Movie("Matrix".to_string());
                    shared.presentation.join_room_ok();
                }),
            )
            .unwrap();
        let ack = c2w_core::protocol::encode_ack(seq);
        deliver(&mut messenger, ack, addr(8000), &mut role).await;
        rx.close();
        assert_eq!(recording.lock().unwrap().join_room_ok, 1);
    }
}
