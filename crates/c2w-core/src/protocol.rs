//! Wire protocol for the chat-and-movie-room service.
//!
//! This module defines the packets exchanged between a client and the
//! server over a datagram transport.
//!
//! # Wire Format
//!
//! Every packet is a 4-byte header followed by zero or more payload bytes,
//! all big-endian:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-------+-----------------------+-------------------------------+
//! | type  |   sequence_number     |         packet_length         |
//! | (4b)  |        (12b)          |             (16b)             |
//! +-------+-----------------------+-------------------------------+
//! ```
//!
//! `packet_length` is `4 + payload.len()`; it is never less than 4.
//!
//! # Why hand-rolled framing instead of a serde format?
//!
//! The grammar is a small, fixed, bit-packed layout (a 4-bit type crammed
//! into the same halfword as a 12-bit sequence number) that a
//! general-purpose serializer has no natural representation for. Packing
//! it by hand keeps the format exactly as specified and avoids pulling in
//! a serialization crate for nine fixed-shape records.

use std::fmt;
use thiserror::Error;

/// Errors that can occur while decoding a packet.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("header too short: need at least 4 bytes, got {0}")]
    MalformedHeader(usize),

    #[error("packet_length {0} is smaller than the 4-byte header")]
    HeaderLengthTooSmall(u16),

    #[error("declared payload length runs past the datagram: {reason}")]
    MalformedPayload { reason: String },

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("unknown packet type: {0:#06b}")]
    UnknownPacketType(u8),
}

/// The 4-bit packet type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Ack = 0b0000,
    Login = 0b0001,
    MovieSelect = 0b0010,
    QuitMovie = 0b0011,
    QuitApp = 0b0100,
    MovieList = 0b0101,
    UserList = 0b0110,
    Chat = 0b0111,
    ConnAccepted = 0b1000,
    ConnRefused = 0b1001,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(bits: u8) -> Result<Self, ProtocolError> {
        Ok(match bits {
            0b0000 => PacketType::Ack,
            0b0001 => PacketType::Login,
            0b0010 => PacketType::MovieSelect,
            0b0011 => PacketType::QuitMovie,
            0b0100 => PacketType::QuitApp,
            0b0101 => PacketType::MovieList,
            0b0110 => PacketType::UserList,
            0b0111 => PacketType::Chat,
            0b1000 => PacketType::ConnAccepted,
            0b1001 => PacketType::ConnRefused,
            other => return Err(ProtocolError::UnknownPacketType(other)),
        })
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        packet_type as u8
    }
}

/// A single movie catalog record carried inside a `MovieList` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRecord {
    pub title: String,
    pub address: std::net::Ipv4Addr,
    pub port: u16,
}

/// A single roster record carried inside a `UserList` body.
///
/// `in_movie_room` is the single status bit the wire format carries: it
/// says only whether the user is in a movie room, not which one. See the
/// status-bit ambiguity note in the client role for how that's resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub in_movie_room: bool,
}

/// A decoded packet body. The packet's `PacketType` is recoverable from the
/// variant, so callers never need to track it separately.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    /// Acknowledgment. The sequence number it carries (stored alongside
    /// the body, not inside it) identifies the packet being acknowledged.
    Ack,
    /// Login request: the raw user name occupies the whole payload.
    Login { user_name: String },
    /// Movie selection: the raw movie title occupies the whole payload.
    MovieSelect { movie_title: String },
    QuitMovie,
    QuitApp,
    MovieList(Vec<MovieRecord>),
    UserList(Vec<UserRecord>),
    /// Chat: sender name plus message text.
    Chat { sender_name: String, text: String },
    ConnAccepted,
    ConnRefused,
}

impl PacketBody {
    pub fn packet_type(&self) -> PacketType {
        match self {
            PacketBody::Ack => PacketType::Ack,
            PacketBody::Login { .. } => PacketType::Login,
            PacketBody::MovieSelect { .. } => PacketType::MovieSelect,
            PacketBody::QuitMovie => PacketType::QuitMovie,
            PacketBody::QuitApp => PacketType::QuitApp,
            PacketBody::MovieList(_) => PacketType::MovieList,
            PacketBody::UserList(_) => PacketType::UserList,
            PacketBody::Chat { .. } => PacketType::Chat,
            PacketBody::ConnAccepted => PacketType::ConnAccepted,
            PacketBody::ConnRefused => PacketType::ConnRefused,
        }
    }
}

impl fmt::Display for PacketBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.packet_type())
    }
}

/// Packs the 4-byte header: `(type << 12) | sequence_number`, then
/// `4 + payload_len` as a second big-endian `u16`.
fn encode_header(packet_type: PacketType, sequence_number: u16, payload_len: usize) -> [u8; 4] {
    let pre_header = ((u8::from(packet_type) as u16) << 12) | (sequence_number & 0x0FFF);
    let packet_length = (4 + payload_len) as u16;
    let mut header = [0u8; 4];
    header[0..2].copy_from_slice(&pre_header.to_be_bytes());
    header[2..4].copy_from_slice(&packet_length.to_be_bytes());
    header
}

/// Encodes `(sequence_number, body)` into a complete datagram.
pub fn encode(sequence_number: u16, body: &PacketBody) -> Vec<u8> {
    let payload = encode_payload(body);
    let header = encode_header(body.packet_type(), sequence_number, payload.len());
    let mut datagram = Vec::with_capacity(header.len() + payload.len());
    datagram.extend_from_slice(&header);
    datagram.extend_from_slice(&payload);
    datagram
}

/// Builds the ACK datagram for `sequence_number`. Unlike `encode`, acks are
/// never enqueued or retransmitted: the caller writes the returned bytes
/// straight to the transport.
pub fn encode_ack(sequence_number: u16) -> Vec<u8> {
    encode(sequence_number, &PacketBody::Ack)
}

fn encode_payload(body: &PacketBody) -> Vec<u8> {
    match body {
        PacketBody::Ack
        | PacketBody::QuitMovie
        | PacketBody::QuitApp
        | PacketBody::ConnAccepted
        | PacketBody::ConnRefused => Vec::new(),

        PacketBody::Login { user_name } => user_name.as_bytes().to_vec(),
        PacketBody::MovieSelect { movie_title } => movie_title.as_bytes().to_vec(),

        PacketBody::MovieList(movies) => {
            let mut out = Vec::new();
            for movie in movies {
                let title_bytes = movie.title.as_bytes();
                out.push(title_bytes.len() as u8);
                out.extend_from_slice(title_bytes);
                out.extend_from_slice(&movie.address.octets());
                out.extend_from_slice(&movie.port.to_be_bytes());
            }
            out
        }

        PacketBody::UserList(users) => {
            let mut out = Vec::new();
            for user in users {
                let name_bytes = user.name.as_bytes();
                out.push(name_bytes.len() as u8);
                out.extend_from_slice(name_bytes);
                out.push(if user.in_movie_room { 1 } else { 0 });
            }
            out
        }

        PacketBody::Chat { sender_name, text } => {
            let name_bytes = sender_name.as_bytes();
            let mut out = Vec::with_capacity(1 + name_bytes.len() + text.len());
            out.push(name_bytes.len() as u8);
            out.extend_from_slice(name_bytes);
            out.extend_from_slice(text.as_bytes());
            out
        }
    }
}

/// Decodes a complete datagram into `(sequence_number, body)`.
pub fn decode(datagram: &[u8]) -> Result<(u16, PacketBody), ProtocolError> {
    if datagram.len() < 4 {
        return Err(ProtocolError::MalformedHeader(datagram.len()));
    }
    let pre_header = u16::from_be_bytes([datagram[0], datagram[1]]);
    let packet_length = u16::from_be_bytes([datagram[2], datagram[3]]);
    if packet_length < 4 {
        return Err(ProtocolError::HeaderLengthTooSmall(packet_length));
    }

    let packet_type = PacketType::try_from((pre_header >> 12) as u8)?;
    let sequence_number = pre_header & 0x0FFF;
    let payload_len = (packet_length - 4) as usize;

    let payload = datagram.get(4..4 + payload_len).ok_or_else(|| {
        ProtocolError::MalformedPayload {
            reason: format!(
                "declared payload length {payload_len} but datagram has only {} bytes after the header",
                datagram.len().saturating_sub(4)
            ),
        }
    })?;

    let body = decode_payload(packet_type, payload)?;
    Ok((sequence_number, body))
}

fn decode_payload(packet_type: PacketType, payload: &[u8]) -> Result<PacketBody, ProtocolError> {
    Ok(match packet_type {
        PacketType::Ack => PacketBody::Ack,
        PacketType::QuitMovie => PacketBody::QuitMovie,
        PacketType::QuitApp => PacketBody::QuitApp,
        PacketType::ConnAccepted => PacketBody::ConnAccepted,
        PacketType::ConnRefused => PacketBody::ConnRefused,

        PacketType::Login => PacketBody::Login {
            user_name: String::from_utf8(payload.to_vec())?,
        },
        PacketType::MovieSelect => PacketBody::MovieSelect {
            movie_title: String::from_utf8(payload.to_vec())?,
        },

        PacketType::MovieList => {
            let mut movies = Vec::new();
            let mut offset = 0usize;
            while offset < payload.len() {
                let len = take_u8(payload, offset, "movie title length")? as usize;
                offset += 1;
                let title = take_utf8(payload, offset, len, "movie title")?;
                offset += len;
                let octets = take_slice(payload, offset, 4, "movie IPv4 address")?;
                let address = std::net::Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
                offset += 4;
                let port_bytes = take_slice(payload, offset, 2, "movie port")?;
                let port = u16::from_be_bytes([port_bytes[0], port_bytes[1]]);
                offset += 2;
                movies.push(MovieRecord { title, address, port });
            }
            PacketBody::MovieList(movies)
        }

        PacketType::UserList => {
            let mut users = Vec::new();
            let mut offset = 0usize;
            while offset < payload.len() {
                let len = take_u8(payload, offset, "user name length")? as usize;
                offset += 1;
                let name = take_utf8(payload, offset, len, "user name")?;
                offset += len;
                let status = take_u8(payload, offset, "user status byte")?;
                offset += 1;
                users.push(UserRecord {
                    name,
                    in_movie_room: status != 0,
                });
            }
            PacketBody::UserList(users)
        }

        PacketType::Chat => {
            let len = take_u8(payload, 0, "chat sender name length")? as usize;
            let sender_name = take_utf8(payload, 1, len, "chat sender name")?;
            let text_bytes = payload.get(1 + len..).ok_or_else(|| ProtocolError::MalformedPayload {
                reason: "chat payload shorter than declared sender name".to_string(),
            })?;
            let text = String::from_utf8(text_bytes.to_vec())?;
            PacketBody::Chat { sender_name, text }
        }
    })
}

fn take_u8(payload: &[u8], offset: usize, what: &str) -> Result<u8, ProtocolError> {
    payload
        .get(offset)
        .copied()
        .ok_or_else(|| ProtocolError::MalformedPayload {
            reason: format!("ran out of bytes reading {what} at offset {offset}"),
        })
}

fn take_slice<'a>(
    payload: &'a [u8],
    offset: usize,
    len: usize,
    what: &str,
) -> Result<&'a [u8], ProtocolError> {
    payload
        .get(offset..offset + len)
        .ok_or_else(|| ProtocolError::MalformedPayload {
            reason: format!("ran out of bytes reading {what} at offset {offset}"),
        })
}

fn take_utf8(payload: &[u8], offset: usize, len: usize, what: &str) -> Result<String, ProtocolError> {
    let slice = take_slice(payload, offset, len, what)?;
    String::from_utf8(slice.to_vec()).map_err(ProtocolError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn roundtrip(seq: u16, body: PacketBody) {
        let encoded = encode(seq, &body);
        let (decoded_seq, decoded_body) = decode(&encoded).unwrap();
        assert_eq!(decoded_seq, seq);
        assert_eq!(decoded_body, body);
    }

    #[test]
    fn ack_roundtrip() {
        roundtrip(41, PacketBody::Ack);
    }

    #[test]
    fn login_roundtrip() {
        roundtrip(0, PacketBody::Login { user_name: "alice".to_string() });
    }

    #[test]
    fn movie_select_roundtrip() {
        roundtrip(1, PacketBody::MovieSelect { movie_title: "Matrix".to_string() });
    }

    #[test]
    fn quit_movie_and_quit_app_are_empty() {
        roundtrip(2, PacketBody::QuitMovie);
        roundtrip(3, PacketBody::QuitApp);
    }

    #[test]
    fn conn_accepted_and_refused_are_empty() {
        roundtrip(0, PacketBody::ConnAccepted);
        roundtrip(0, PacketBody::ConnRefused);
    }

    #[test]
    fn movie_list_roundtrip_with_multiple_records() {
        roundtrip(
            2,
            PacketBody::MovieList(vec![
                MovieRecord {
                    title: "Matrix".to_string(),
                    address: Ipv4Addr::new(239, 0, 0, 1),
                    port: 9000,
                },
                MovieRecord {
                    title: "Up".to_string(),
                    address: Ipv4Addr::new(239, 0, 0, 2),
                    port: 9001,
                },
            ]),
        );
    }

    #[test]
    fn empty_movie_list_roundtrip() {
        roundtrip(2, PacketBody::MovieList(vec![]));
    }

    #[test]
    fn user_list_roundtrip_status_bits() {
        roundtrip(
            1,
            PacketBody::UserList(vec![
                UserRecord { name: "alice".to_string(), in_movie_room: false },
                UserRecord { name: "bob".to_string(), in_movie_room: true },
            ]),
        );
    }

    #[test]
    fn chat_roundtrip() {
        roundtrip(
            7,
            PacketBody::Chat { sender_name: "alice".to_string(), text: "hi".to_string() },
        );
    }

    #[test]
    fn chat_with_empty_text_roundtrip() {
        roundtrip(7, PacketBody::Chat { sender_name: "alice".to_string(), text: String::new() });
    }

    #[test]
    fn zero_byte_payload_produces_four_byte_datagram() {
        let datagram = encode(0, &PacketBody::Ack);
        assert_eq!(datagram.len(), 4);
        assert_eq!(u16::from_be_bytes([datagram[2], datagram[3]]), 4);
    }

    #[test]
    fn sequence_number_wraps_at_4096_and_still_roundtrips() {
        for seq in [0u16, 1, 4095] {
            roundtrip(seq, PacketBody::Ack);
        }
        // 4096 does not fit in 12 bits; encoding masks it down to 0,
        // matching the modulo-4096 sequence space.
        let datagram = encode(4096, &PacketBody::Ack);
        let (seq, _) = decode(&datagram).unwrap();
        assert_eq!(seq, 0);
    }

    #[test]
    fn header_too_short_is_malformed() {
        assert!(matches!(decode(&[0, 1, 0]), Err(ProtocolError::MalformedHeader(3))));
    }

    #[test]
    fn packet_length_below_four_is_rejected() {
        let mut datagram = encode(0, &PacketBody::Ack);
        datagram[2..4].copy_from_slice(&3u16.to_be_bytes());
        assert!(matches!(
            decode(&datagram),
            Err(ProtocolError::HeaderLengthTooSmall(3))
        ));
    }

    #[test]
    fn declared_length_past_buffer_is_malformed_payload() {
        let mut datagram = encode(0, &PacketBody::Login { user_name: "bob".to_string() });
        // Claim the payload is longer than it actually is.
        datagram[2..4].copy_from_slice(&100u16.to_be_bytes());
        assert!(matches!(
            decode(&datagram),
            Err(ProtocolError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn ack_encoding_helper_matches_manual_encode() {
        assert_eq!(encode_ack(12), encode(12, &PacketBody::Ack));
    }
}
