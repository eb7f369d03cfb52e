//! Room identifiers.
//!
//! A room is either the distinguished main room, the `OutOfSystem` sentinel
//! used only when computing user-list fan-out for a departed user, or a
//! movie title. Room identifiers are never serialized on the wire — only
//! movie titles are (inside `UserRecord`/`MovieRecord` bodies); the
//! sentinels exist purely for server-side bookkeeping.

use std::fmt;

/// A room a user currently occupies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomId {
    /// The room every connected user occupies by default.
    Main,
    /// Sentinel meaning "no longer connected". Never sent on the wire;
    /// used only as a fan-out source when a user has just left.
    OutOfSystem,
    /// A movie room, identified by the movie's title.
    Movie(String),
}

impl RoomId {
    /// Whether this room is a movie room (neither `Main` nor `OutOfSystem`).
    pub fn is_movie(&self) -> bool {
        matches!(self, RoomId::Movie(_))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomId::Main => write!(f, "<main room>"),
            RoomId::OutOfSystem => write!(f, "<out of system>"),
            RoomId::Movie(title) => write!(f, "{title}"),
        }
    }
}
