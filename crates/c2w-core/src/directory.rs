//! The server-side directory: user and movie catalog with room membership.
//!
//! The original implementation couples the server directly to one global
//! catalog object. Here it's a trait so the server role is generic over
//! its directory, the way the messenger is generic over its transport —
//! this is a deliberate redesign, not a faithful port, and it's what lets
//! the server role's fan-out logic be unit-tested against an in-memory
//! fake without a real socket in the loop.

use crate::room::RoomId;
use std::net::{Ipv4Addr, SocketAddr};

/// A registered user: name, current room, and the address their peer
/// state is keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub room: RoomId,
    pub address: SocketAddr,
}

/// A streamable movie: title plus the multicast (or unicast) address and
/// port clients should tune to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub title: String,
    pub address: Ipv4Addr,
    pub port: u16,
}

/// User and movie catalog with room membership, mutated only by the
/// server role.
pub trait Directory: Send {
    fn user_exists(&self, name: &str) -> bool;

    /// Registers a new user in `room` at `address`. Callers must check
    /// `user_exists` first; a duplicate name is a logic error, not a
    /// recoverable condition here (the protocol-level duplicate-login
    /// rejection happens before this is called).
    fn add_user(&mut self, name: &str, room: RoomId, address: SocketAddr) -> User;

    /// Removes a user by name. A no-op if the user is not present.
    fn remove_user(&mut self, name: &str);

    fn get_user_by_address(&self, address: SocketAddr) -> Option<&User>;

    fn get_user_by_name(&self, name: &str) -> Option<&User>;

    /// Moves a user to a new room. A no-op if the user is not present.
    fn update_room(&mut self, name: &str, room: RoomId);

    fn user_list(&self) -> Vec<User>;

    fn movie_list(&self) -> Vec<Movie>;

    /// Adds a movie to the catalog so it can be joined and listed.
    fn add_movie(&mut self, movie: Movie);

    /// Marks a movie as actively streaming. A no-op if the title is
    /// unknown (`UnknownMovie` per spec is silently ignored here).
    fn start_streaming(&mut self, title: &str);
}

/// The in-memory `Directory` implementation used by `c2wd`.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: Vec<User>,
    movies: Vec<Movie>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for InMemoryDirectory {
    fn user_exists(&self, name: &str) -> bool {
        self.users.iter().any(|u| u.name == name)
    }

    fn add_user(&mut self, name: &str, room: RoomId, address: SocketAddr) -> User {
        let user = User { name: name.to_string(), room, address };
        self.users.push(user.clone());
        user
    }

    fn remove_user(&mut self, name: &str) {
        self.users.retain(|u| u.name != name);
    }

    fn get_user_by_address(&self, address: SocketAddr) -> Option<&User> {
        self.users.iter().find(|u| u.address == address)
    }

    fn get_user_by_name(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    fn update_room(&mut self, name: &str, room: RoomId) {
        if let Some(user) = self.users.iter_mut().find(|u| u.name == name) {
            user.room = room;
        }
    }

    fn user_list(&self) -> Vec<User> {
        self.users.clone()
    }

    fn movie_list(&self) -> Vec<Movie> {
        self.movies.clone()
    }

    fn add_movie(&mut self, movie: Movie) {
        self.movies.push(movie);
    }

    fn start_streaming(&mut self, title: &str) {
        if !self.movies.iter().any(|m| m.title == title) {
            tracing::debug!(title, "start_streaming requested for unknown movie, ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn add_and_find_user() {
        let mut dir = InMemoryDirectory::new();
        dir.add_user("alice", RoomId::Main, addr(9000));
        assert!(dir.user_exists("alice"));
        assert_eq!(dir.get_user_by_address(addr(9000)).unwrap().name, "alice");
        assert_eq!(dir.get_user_by_name("alice").unwrap().room, RoomId::Main);
    }

    #[test]
    fn remove_user_is_a_no_op_when_absent() {
        let mut dir = InMemoryDirectory::new();
        dir.remove_user("ghost");
        assert!(dir.user_list().is_empty());
    }

    #[test]
    fn update_room_moves_user() {
        let mut dir = InMemoryDirectory::new();
        dir.add_user("alice", RoomId::Main, addr(9000));
        dir.update_room("alice", RoomId::Movie("Matrix".to_string()));
        assert_eq!(
            dir.get_user_by_name("alice").unwrap().room,
            RoomId::Movie("Matrix".to_string())
        );
    }

    #[test]
    fn start_streaming_unknown_movie_is_ignored_not_an_error() {
        let mut dir = InMemoryDirectory::new();
        dir.start_streaming("nonexistent");
    }
}
