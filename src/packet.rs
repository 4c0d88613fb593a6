//! Packet layer of the VICI framing protocol
//!
//! Every unit exchanged on a transport is a packet: a one-byte packet type,
//! optionally followed by a length-prefixed name and/or message-element
//! bytes, depending on the type.
//!
//! ```text
//! +------+-------------------+-----------------+
//! | Type | Name (some types) | Message payload |
//! +------+-------------------+-----------------+
//! |  1B  | 1B len + string   | element bytes   |
//! +------+-------------------+-----------------+
//! ```
//!
//! | Code | Type            | Direction | Body                 |
//! |------|-----------------|-----------|----------------------|
//! | 0    | `CmdRequest`    | C→S       | name ‖ message       |
//! | 1    | `CmdResponse`   | S→C       | message              |
//! | 2    | `CmdUnknown`    | S→C       | (empty)              |
//! | 3    | `EventRegister` | C→S       | name                 |
//! | 4    | `EventUnregister` | C→S     | name                 |
//! | 5    | `EventConfirm`  | S→C       | (empty)              |
//! | 6    | `EventUnknown`  | S→C       | (empty)              |
//! | 7    | `Event`         | S→C       | name ‖ message       |
//!
//! The u32 big-endian length prefix that frames a packet on the wire is
//! applied by the transport, not here.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::message::{codec, Message, MessageError};

/// Packet types of the VICI framing protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// A named request message
    CmdRequest = 0,
    /// An unnamed response message for a request
    CmdResponse = 1,
    /// An unnamed response if requested command is unknown
    CmdUnknown = 2,
    /// A named event registration request
    EventRegister = 3,
    /// A named event unregistration request
    EventUnregister = 4,
    /// An unnamed response for successful event (un-)registration
    EventConfirm = 5,
    /// An unnamed response if event (un-)registration failed
    EventUnknown = 6,
    /// A named event message
    Event = 7,
}

impl PacketType {
    /// Create a packet type from its wire byte
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::UnknownType`] for bytes outside the defined
    /// range.
    pub const fn from_byte(b: u8) -> Result<Self, PacketError> {
        match b {
            0 => Ok(Self::CmdRequest),
            1 => Ok(Self::CmdResponse),
            2 => Ok(Self::CmdUnknown),
            3 => Ok(Self::EventRegister),
            4 => Ok(Self::EventUnregister),
            5 => Ok(Self::EventConfirm),
            6 => Ok(Self::EventUnknown),
            7 => Ok(Self::Event),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    /// Wire byte of this packet type
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether packets of this type carry a length-prefixed name
    const fn has_name(self) -> bool {
        matches!(
            self,
            Self::CmdRequest | Self::EventRegister | Self::EventUnregister | Self::Event
        )
    }

    /// Whether packets of this type carry message-element bytes
    const fn has_message(self) -> bool {
        matches!(self, Self::CmdRequest | Self::CmdResponse | Self::Event)
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CmdRequest => "CMD_REQUEST",
            Self::CmdResponse => "CMD_RESPONSE",
            Self::CmdUnknown => "CMD_UNKNOWN",
            Self::EventRegister => "EVENT_REGISTER",
            Self::EventUnregister => "EVENT_UNREGISTER",
            Self::EventConfirm => "EVENT_CONFIRM",
            Self::EventUnknown => "EVENT_UNKNOWN",
            Self::Event => "EVENT",
        };
        f.write_str(name)
    }
}

/// Packet encoding and decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// The packet type byte is not a defined type
    #[error("unknown packet type: {0:#04x}")]
    UnknownType(u8),

    /// Packet names are limited to 255 bytes
    #[error("packet name of {0} bytes exceeds 255")]
    NameTooLong(usize),

    /// The packet name is not valid UTF-8
    #[error("packet name is not valid UTF-8")]
    InvalidName,

    /// The packet ended before its declared contents
    #[error("truncated packet: {0}")]
    Truncated(&'static str),

    /// A zero-length packet has no type byte
    #[error("empty packet")]
    Empty,

    /// The message payload violates the element grammar
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// A framed unit exchanged with the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    ptype: PacketType,
    name: Option<String>,
    message: Option<Message>,
}

impl Packet {
    /// Create a command request packet
    #[must_use]
    pub fn cmd_request(cmd: impl Into<String>, message: Message) -> Self {
        Self {
            ptype: PacketType::CmdRequest,
            name: Some(cmd.into()),
            message: Some(message),
        }
    }

    /// Create a command response packet
    #[must_use]
    pub fn cmd_response(message: Message) -> Self {
        Self {
            ptype: PacketType::CmdResponse,
            name: None,
            message: Some(message),
        }
    }

    /// Create an unknown-command response packet
    #[must_use]
    pub const fn cmd_unknown() -> Self {
        Self {
            ptype: PacketType::CmdUnknown,
            name: None,
            message: None,
        }
    }

    /// Create an event registration packet
    #[must_use]
    pub fn event_register(name: impl Into<String>) -> Self {
        Self {
            ptype: PacketType::EventRegister,
            name: Some(name.into()),
            message: None,
        }
    }

    /// Create an event unregistration packet
    #[must_use]
    pub fn event_unregister(name: impl Into<String>) -> Self {
        Self {
            ptype: PacketType::EventUnregister,
            name: Some(name.into()),
            message: None,
        }
    }

    /// Create an event-confirmed response packet
    #[must_use]
    pub const fn event_confirm() -> Self {
        Self {
            ptype: PacketType::EventConfirm,
            name: None,
            message: None,
        }
    }

    /// Create an unknown-event response packet
    #[must_use]
    pub const fn event_unknown() -> Self {
        Self {
            ptype: PacketType::EventUnknown,
            name: None,
            message: None,
        }
    }

    /// Create a named event packet
    #[must_use]
    pub fn event(name: impl Into<String>, message: Message) -> Self {
        Self {
            ptype: PacketType::Event,
            name: Some(name.into()),
            message: Some(message),
        }
    }

    /// The packet's type
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.ptype
    }

    /// The packet's name, for types that carry one
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The packet's message payload, for types that carry one
    #[must_use]
    pub const fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Consume the packet, returning its message payload
    #[must_use]
    pub fn into_message(self) -> Option<Message> {
        self.message
    }

    /// Consume the packet into its parts
    pub(crate) fn into_parts(self) -> (PacketType, Option<String>, Option<Message>) {
        (self.ptype, self.name, self.message)
    }

    /// Encode the packet body: type byte, name, and message payload
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::NameTooLong`] for names over 255 bytes, and
    /// propagates message encoding failures.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let mut buf = BytesMut::new();
        buf.put_u8(self.ptype.as_byte());

        if self.ptype.has_name() {
            let name = self.name.as_deref().unwrap_or("");
            if name.len() > usize::from(u8::MAX) {
                return Err(PacketError::NameTooLong(name.len()));
            }
            #[allow(clippy::cast_possible_truncation)]
            buf.put_u8(name.len() as u8);
            buf.put_slice(name.as_bytes());
        }

        if self.ptype.has_message() {
            let empty = Message::new();
            let message = self.message.as_ref().unwrap_or(&empty);
            buf.put_slice(&codec::encode(message)?);
        }

        Ok(buf.to_vec())
    }

    /// Decode a packet body
    ///
    /// # Errors
    ///
    /// Returns [`PacketError`] when the type byte is unknown, the name is
    /// truncated or not valid UTF-8, or the message payload is malformed.
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let mut buf = data;
        if buf.is_empty() {
            return Err(PacketError::Empty);
        }
        let ptype = PacketType::from_byte(buf.get_u8())?;

        let name = if ptype.has_name() {
            if buf.remaining() < 1 {
                return Err(PacketError::Truncated("missing name length"));
            }
            let len = usize::from(buf.get_u8());
            if buf.remaining() < len {
                return Err(PacketError::Truncated("name exceeds packet"));
            }
            let raw = buf.copy_to_bytes(len);
            Some(String::from_utf8(raw.to_vec()).map_err(|_| PacketError::InvalidName)?)
        } else {
            None
        };

        let message = if ptype.has_message() {
            Some(codec::decode(buf)?)
        } else {
            None
        };

        Ok(Self {
            ptype,
            name,
            message,
        })
    }
}
