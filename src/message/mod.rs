//! VICI message model: an ordered, recursively nested key/value/list/section
//! tree
//!
//! A [`Message`] is the unit of payload exchanged with the daemon. It keeps
//! its elements in insertion order, because the daemon attaches meaning to
//! the order of configuration sections, and re-assigning an existing key
//! must not move it.
//!
//! # Elements
//!
//! Each named element is one of three kinds, modeled by [`Element`]:
//!
//! - **Value**: a byte string (in practice UTF-8 text; the wire is 8-bit
//!   clean)
//! - **List**: an ordered sequence of byte strings; lists do not nest
//! - **Section**: a nested [`Message`]
//!
//! # Example
//!
//! ```
//! use vici::Message;
//!
//! let mut child = Message::new();
//! child.set("esp_proposals", vec!["aes256gcm128-x25519"]);
//!
//! let mut msg = Message::new();
//! msg.set("version", "2");
//! msg.set("children", child);
//!
//! assert_eq!(msg.keys(), ["version", "children"]);
//! assert_eq!(msg.value_str("version"), Some("2"));
//! ```
//!
//! # Modules
//!
//! - [`codec`]: wire-grammar encoder and decoder
//! - [`ser`], [`de`]: serde-based schema mapper between user records and
//!   messages
//! - [`error`]: message and schema error types

pub mod codec;
pub mod de;
pub mod error;
pub mod ser;

pub use codec::{decode, encode};
pub use de::from_message;
pub use error::{MessageError, SchemaError};
pub use ser::to_message;

use std::collections::HashMap;

/// A single named element of a [`Message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A byte string value
    Value(Vec<u8>),
    /// An ordered sequence of byte strings
    List(Vec<Vec<u8>>),
    /// A nested message
    Section(Message),
}

impl Element {
    /// Get the value bytes if this is a `Value`
    #[must_use]
    pub fn as_value(&self) -> Option<&[u8]> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as UTF-8 text if this is a `Value` holding valid UTF-8
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(v) => std::str::from_utf8(v).ok(),
            _ => None,
        }
    }

    /// Get the list items if this is a `List`
    #[must_use]
    pub fn as_list(&self) -> Option<&[Vec<u8>]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the nested message if this is a `Section`
    #[must_use]
    pub fn as_section(&self) -> Option<&Message> {
        match self {
            Self::Section(m) => Some(m),
            _ => None,
        }
    }

    /// Name of the element kind, used in error messages
    #[must_use]
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::List(_) => "list",
            Self::Section(_) => "section",
        }
    }
}

impl From<&str> for Element {
    fn from(v: &str) -> Self {
        Self::Value(v.as_bytes().to_vec())
    }
}

impl From<String> for Element {
    fn from(v: String) -> Self {
        Self::Value(v.into_bytes())
    }
}

impl From<Vec<u8>> for Element {
    fn from(v: Vec<u8>) -> Self {
        Self::Value(v)
    }
}

impl From<&[u8]> for Element {
    fn from(v: &[u8]) -> Self {
        Self::Value(v.to_vec())
    }
}

impl From<Vec<String>> for Element {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into_iter().map(String::into_bytes).collect())
    }
}

impl From<Vec<&str>> for Element {
    fn from(items: Vec<&str>) -> Self {
        Self::List(items.into_iter().map(|i| i.as_bytes().to_vec()).collect())
    }
}

impl From<Vec<Vec<u8>>> for Element {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Self::List(items)
    }
}

impl From<Message> for Element {
    fn from(m: Message) -> Self {
        Self::Section(m)
    }
}

/// An ordered collection of named message elements
///
/// Insertion order of distinct keys is preserved on encode; re-assigning an
/// existing key overwrites the element but keeps its position. Equality is
/// structural and order-sensitive on keys at each nesting level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    keys: Vec<String>,
    elements: HashMap<String, Element>,
}

impl Message {
    /// Create an empty message
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, overwriting any existing element
    ///
    /// If the key already exists its position in the message order is kept;
    /// a new key is appended.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Element>) {
        let key = key.into();
        if self.elements.insert(key.clone(), value.into()).is_none() {
            self.keys.push(key);
        }
    }

    /// Get the element named `key`, if present
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Element> {
        self.elements.get(key)
    }

    /// Get the value bytes of a `Value` element named `key`
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Element::as_value)
    }

    /// Get a `Value` element named `key` as UTF-8 text
    #[must_use]
    pub fn value_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Element::as_str)
    }

    /// Get the items of a `List` element named `key`
    #[must_use]
    pub fn list(&self, key: &str) -> Option<&[Vec<u8>]> {
        self.get(key).and_then(Element::as_list)
    }

    /// Get the nested message of a `Section` element named `key`
    #[must_use]
    pub fn section(&self, key: &str) -> Option<&Message> {
        self.get(key).and_then(Element::as_section)
    }

    /// Message keys in insertion order
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Remove and return the element named `key`
    ///
    /// The relative order of the remaining keys is unchanged.
    pub fn unset(&mut self, key: &str) -> Option<Element> {
        let element = self.elements.remove(key)?;
        self.keys.retain(|k| k != key);
        Some(element)
    }

    /// Number of elements in the message
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check whether the message has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over `(key, element)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Element)> {
        self.keys
            .iter()
            .filter_map(|k| self.elements.get(k).map(|e| (k.as_str(), e)))
    }

    /// Examine a command reply for success
    ///
    /// Succeeds unless the message contains a `success` value that is not
    /// `"yes"`, in which case it fails with
    /// [`MessageError::CommandFailed`] carrying the contents of the
    /// `errmsg` field (empty if absent).
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::CommandFailed`] when the daemon reported a
    /// failed command.
    pub fn check_success(&self) -> Result<(), MessageError> {
        if let Some(success) = self.value("success") {
            if success != b"yes" {
                let errmsg = self.value_str("errmsg").unwrap_or("").to_string();
                return Err(MessageError::CommandFailed { errmsg });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut msg = Message::new();
        msg.set("key", "value");
        msg.set("list", vec!["a", "b"]);

        let mut inner = Message::new();
        inner.set("inner", "x");
        msg.set("section", inner);

        assert_eq!(msg.value("key"), Some(&b"value"[..]));
        assert_eq!(msg.value_str("key"), Some("value"));
        assert_eq!(
            msg.list("list"),
            Some(&[b"a".to_vec(), b"b".to_vec()][..])
        );
        assert_eq!(msg.section("section").and_then(|s| s.value_str("inner")), Some("x"));
        assert!(msg.get("missing").is_none());
    }

    #[test]
    fn test_keys_preserve_insertion_order() {
        let mut msg = Message::new();
        msg.set("c", "1");
        msg.set("a", "2");
        msg.set("b", "3");
        assert_eq!(msg.keys(), ["c", "a", "b"]);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut msg = Message::new();
        msg.set("first", "1");
        msg.set("second", "2");
        msg.set("first", "overwritten");

        assert_eq!(msg.keys(), ["first", "second"]);
        assert_eq!(msg.value_str("first"), Some("overwritten"));
        assert_eq!(msg.len(), 2);
    }

    #[test]
    fn test_overwrite_may_change_element_kind() {
        let mut msg = Message::new();
        msg.set("key", "value");
        msg.set("key", vec!["a", "b"]);
        assert!(msg.value("key").is_none());
        assert_eq!(msg.list("key").map(<[Vec<u8>]>::len), Some(2));
    }

    #[test]
    fn test_unset_preserves_remaining_order() {
        let mut msg = Message::new();
        msg.set("a", "1");
        msg.set("b", "2");
        msg.set("c", "3");

        let removed = msg.unset("b");
        assert_eq!(removed, Some(Element::Value(b"2".to_vec())));
        assert_eq!(msg.keys(), ["a", "c"]);
        assert!(msg.unset("b").is_none());
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let mut a = Message::new();
        a.set("x", "1");
        a.set("y", "2");

        let mut b = Message::new();
        b.set("y", "2");
        b.set("x", "1");

        assert_ne!(a, b);

        let mut c = Message::new();
        c.set("x", "1");
        c.set("y", "2");
        assert_eq!(a, c);
    }

    #[test]
    fn test_check_success_failed_reply() {
        let mut msg = Message::new();
        msg.set("success", "no");
        msg.set("errmsg", "no such conn");

        let err = msg.check_success().unwrap_err();
        assert_eq!(
            err,
            MessageError::CommandFailed {
                errmsg: "no such conn".to_string()
            }
        );
        assert!(err.to_string().contains("no such conn"));
    }

    #[test]
    fn test_check_success_ok_reply() {
        let mut msg = Message::new();
        msg.set("success", "yes");
        assert!(msg.check_success().is_ok());
    }

    #[test]
    fn test_check_success_without_success_field() {
        let msg = Message::new();
        assert!(msg.check_success().is_ok());
    }

    #[test]
    fn test_check_success_without_errmsg_carries_empty_message() {
        let mut msg = Message::new();
        msg.set("success", "no");
        assert_eq!(
            msg.check_success().unwrap_err(),
            MessageError::CommandFailed {
                errmsg: String::new()
            }
        );
    }

    #[test]
    fn test_iter_yields_pairs_in_order() {
        let mut msg = Message::new();
        msg.set("one", "1");
        msg.set("two", vec!["a"]);

        let kinds: Vec<_> = msg.iter().map(|(k, e)| (k, e.kind())).collect();
        assert_eq!(kinds, [("one", "value"), ("two", "list")]);
    }
}
