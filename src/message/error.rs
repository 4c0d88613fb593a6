//! Error types for the message tree, wire codec, and schema mapper
//!
//! This module defines error types for the message subsystem. Codec errors
//! distinguish encode-side limit violations from decode-side grammar
//! violations so callers can tell a bad local message from a bad peer.

use std::fmt;

use thiserror::Error;

/// Errors raised by the message tree and its wire codec
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Encode-side: message keys must be 1-255 bytes
    #[error("cannot encode key of {0} bytes (keys must be 1-255 bytes)")]
    BadKeyLength(usize),

    /// Encode-side: values and list items are limited to 65535 bytes
    #[error("cannot encode value of {0} bytes (values are limited to 65535 bytes)")]
    BadValueLength(usize),

    /// Decode-side: declared key length exceeds the remaining buffer,
    /// or the key is not valid UTF-8
    #[error("malformed message: expected key length does not match actual length")]
    BadKey,

    /// Decode-side: declared value length exceeds the remaining buffer
    #[error("malformed message: expected value length does not match actual length")]
    BadValue,

    /// Decode-side: the buffer ended inside an element
    #[error("malformed message: unexpected end of buffer")]
    EndOfBuffer,

    /// Decode-side: a byte where an element start was expected is not a
    /// valid element type code
    #[error("malformed message: expected beginning of message element, got {0:#04x}")]
    ExpectedElementStart(u8),

    /// A command reply carried `success` != "yes"
    #[error("command failed: {errmsg}")]
    CommandFailed {
        /// Contents of the reply's `errmsg` field (empty if absent)
        errmsg: String,
    },
}

impl MessageError {
    /// Check whether this error is a wire-grammar violation
    ///
    /// Malformed-message errors indicate the peer sent bytes that do not
    /// parse; encode-side limit errors and `CommandFailed` are local or
    /// reply-level conditions instead.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::BadKey | Self::BadValue | Self::EndOfBuffer | Self::ExpectedElementStart(_)
        )
    }

    /// Create a `CommandFailed` error
    pub fn command_failed(errmsg: impl Into<String>) -> Self {
        Self::CommandFailed {
            errmsg: errmsg.into(),
        }
    }
}

/// Errors raised by the schema mapper when converting between user records
/// and messages
///
/// These faults are attributable to the shape of the caller's record type,
/// not to the peer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A field's type cannot be represented as a message element
    #[error("cannot marshal {0} into a message element")]
    MarshalUnsupportedType(&'static str),

    /// The unmarshal target is not a struct-like type
    #[error("unmarshal target must be a struct-like type, not {0}")]
    BadTarget(&'static str),

    /// A message element does not match the field type it was addressed at
    #[error("type mismatch: message element is a {found}, field expects a {expected}")]
    TypeMismatch {
        /// What the field type requires
        expected: &'static str,
        /// What the message element actually is
        found: &'static str,
    },

    /// A non-section element was addressed at a record-typed field
    #[error("expected a section for a nested record field, found a {0}")]
    NonMessage(&'static str),

    /// Catch-all for errors reported by serde itself (missing fields,
    /// derive-level constraints)
    #[error("{0}")]
    Custom(String),
}

impl SchemaError {
    /// Create a type mismatch error
    #[must_use]
    pub const fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }
}

impl serde::ser::Error for SchemaError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

impl serde::de::Error for SchemaError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MessageError::BadKeyLength(300);
        assert!(err.to_string().contains("300"));
        assert!(err.to_string().contains("1-255"));

        let err = MessageError::ExpectedElementStart(0x09);
        assert!(err.to_string().contains("0x09"));

        let err = MessageError::command_failed("no such conn");
        assert_eq!(err.to_string(), "command failed: no such conn");

        let err = SchemaError::type_mismatch("list", "value");
        assert!(err.to_string().contains("expects a list"));
        assert!(err.to_string().contains("is a value"));
    }

    #[test]
    fn test_is_malformed_classification() {
        assert!(MessageError::BadKey.is_malformed());
        assert!(MessageError::BadValue.is_malformed());
        assert!(MessageError::EndOfBuffer.is_malformed());
        assert!(MessageError::ExpectedElementStart(0).is_malformed());

        assert!(!MessageError::BadKeyLength(0).is_malformed());
        assert!(!MessageError::BadValueLength(70_000).is_malformed());
        assert!(!MessageError::command_failed("").is_malformed());
    }
}
