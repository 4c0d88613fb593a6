//! vici: client library for the strongSwan VICI management protocol
//!
//! This crate speaks the "Versatile IKE Configuration Interface" exposed by
//! the IKE daemon (charon) over a local Unix-domain socket. It provides
//! command requests with plain and streamed replies, registration for
//! asynchronous daemon events, and conversion between Rust records and the
//! protocol's ordered, nested message representation.
//!
//! # Features
//!
//! - **Ordered message model**: key/value, list, and section elements with
//!   lossless round-trips through the binary wire grammar
//! - **Schema mapping**: serde-derived records marshal to and from
//!   messages with empty-field suppression
//! - **Two-channel session**: commands are strictly request/response while
//!   events stream in concurrently on a second connection
//! - **Streamed commands**: `list-sas`-style requests collect their event
//!   stream in wire order with the final response last
//!
//! # Architecture
//!
//! ```text
//! record ⇄ schema mapper ⇄ Message ⇄ codec ⇄ Packet ⇄ Transport ⇄ socket
//!                                                        ▲
//!                              Session ── command mutex ──┤ (command channel)
//!                                  └──── event listener ──┘ (event channel)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use serde::Deserialize;
//! use vici::{from_message, Message, Session};
//!
//! #[derive(Deserialize, Default)]
//! #[serde(default)]
//! struct Version {
//!     daemon: String,
//!     version: String,
//! }
//!
//! # async fn example() -> vici::Result<()> {
//! let session = Session::connect("/var/run/charon.vici").await?;
//!
//! let reply = session.command_request("version", Message::new()).await?;
//! reply.check_success()?;
//! let version: Version = from_message(&reply)?;
//! println!("{} {}", version.daemon, version.version);
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! Listening for events runs the read loop on one task while consumers
//! pull from the queue:
//!
//! ```no_run
//! use std::sync::Arc;
//! use vici::Session;
//!
//! # async fn example() -> vici::Result<()> {
//! let session = Arc::new(Session::connect("/var/run/charon.vici").await?);
//!
//! let reader = Arc::clone(&session);
//! tokio::spawn(async move { reader.listen(&["ike-updown", "log"]).await });
//!
//! while let Ok(event) = session.next_event().await {
//!     println!("{}: {:?}", event.name, event.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`message`]: ordered message tree, wire codec, and schema mapper
//! - [`packet`]: packet types of the framing protocol
//! - [`transport`]: framed packet exchange over the Unix socket
//! - [`event`]: event listener and queue
//! - [`session`]: the client session and its configuration
//! - [`error`]: error types
//!
//! # Protocol
//!
//! The wire format is the daemon's documented VICI framing: packets are
//! length-prefixed (u32 big-endian) type-tagged frames, and message bodies
//! use the tagged element grammar implemented in [`message::codec`]. The
//! socket is a trusted local endpoint; the protocol carries no
//! authentication or encryption of its own.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod event;
pub mod message;
pub mod packet;
pub mod session;
pub mod transport;

// Re-export the public surface at the crate root
pub use error::{Result, ViciError};
pub use event::Event;
pub use message::{
    decode, encode, from_message, to_message, Element, Message, MessageError, SchemaError,
};
pub use packet::{Packet, PacketError, PacketType};
pub use session::{MessageStream, Session, SessionConfig, DEFAULT_SOCKET_PATH};
pub use transport::{Connect, TransportError, UnixConnector};
