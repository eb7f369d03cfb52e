//! # c2w-core
//!
//! Shared library for the chat-and-movie-room protocol ("c2w").
//! Contains the wire protocol, the per-peer reliability engine, the
//! server/client collaborator traits, and configuration.
//!
//! This crate is used by both the server (`c2wd`) and the client (`c2w`).

pub mod config;
pub mod directory;
pub mod error;
pub mod messenger;
pub mod peer;
pub mod presentation;
pub mod protocol;
pub mod role;
pub mod room;
pub mod timer;
pub mod transport;
