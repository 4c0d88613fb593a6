//! Error types for the vici client
//!
//! Each subsystem carries its own error enum ([`MessageError`],
//! [`SchemaError`], [`PacketError`], [`TransportError`]); [`ViciError`]
//! aggregates them for the session-level API and adds the daemon-answer
//! kinds that only exist at that level.
//!
//! Propagation policy: codec and schema errors go back to the caller of
//! the operation that triggered them; transport errors are fatal to the
//! session; `CommandFailed` (from [`Message::check_success`]) is a
//! reply-level condition and leaves the session usable.
//!
//! [`Message::check_success`]: crate::message::Message::check_success

use thiserror::Error;

use crate::message::{MessageError, SchemaError};
use crate::packet::{PacketError, PacketType};
use crate::transport::TransportError;

/// Top-level error type for the vici client
#[derive(Debug, Error)]
pub enum ViciError {
    /// Message tree or codec error
    #[error(transparent)]
    Message(#[from] MessageError),

    /// Schema mapping error
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Packet encoding or decoding error
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The daemon does not know the requested command
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The daemon does not support the requested event
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// A packet of a type not legal in the current protocol state
    #[error("unexpected {0} packet")]
    Unexpected(PacketType),
}

impl ViciError {
    /// Check whether this error means the session is closed
    ///
    /// Pending and subsequent operations on a closed session all fail with
    /// an error for which this returns `true`.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Closed))
    }

    /// Check whether this error is a failed command reply
    ///
    /// `CommandFailed` is reported by the daemon inside an otherwise valid
    /// reply; the session remains usable.
    #[must_use]
    pub const fn is_command_failure(&self) -> bool {
        matches!(self, Self::Message(MessageError::CommandFailed { .. }))
    }
}

/// Type alias for Result with [`ViciError`]
pub type Result<T> = std::result::Result<T, ViciError>;
