//! TCP chat server and terminal client built around [`room_hub`].
//!
//! This crate is the transport for the hub and nothing more. Each module
//! focuses on one concern:
//!
//! - [`cli`] parses the command line for server and client modes.
//! - [`protocol`] is the newline-delimited JSON framing shared by both ends.
//! - [`server`] accepts TCP connections, turns the first frame into a hub
//!   registration, forwards chat frames to the hub, and drains each
//!   connection's outbox to its socket.
//! - [`http`] exposes read-only room listings for reporting.
//! - [`client`] connects to the server, multiplexing stdin and incoming frames.

pub mod cli;
pub mod client;
pub mod http;
pub mod protocol;
pub mod server;
