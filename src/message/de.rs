//! Unmarshaling of messages into user records
//!
//! [`from_message`] converts a [`Message`] into any `Deserialize` record.
//! Element kinds must match the field types they are addressed at:
//!
//! - Value → string or byte-string field
//! - List → sequence-of-byte-strings field
//! - Section → [`Message`] field (copied as-is) or nested record
//!   (recursively unmarshaled)
//!
//! Keys present in the message but absent from the record are ignored.
//! Record fields absent from the message take their serde defaults, so
//! optional fields should be `Option<T>` or carry `#[serde(default)]`.
//!
//! # Example
//!
//! ```
//! use serde::Deserialize;
//! use vici::{from_message, Message};
//!
//! #[derive(Deserialize, Default)]
//! #[serde(default)]
//! struct Reply {
//!     success: String,
//!     errmsg: String,
//! }
//!
//! let mut msg = Message::new();
//! msg.set("success", "yes");
//!
//! let reply: Reply = from_message(&msg).unwrap();
//! assert_eq!(reply.success, "yes");
//! assert_eq!(reply.errmsg, "");
//! ```

use serde::de::value::BorrowedStrDeserializer;
use serde::de::{DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use super::error::SchemaError;
use super::{Element, Message};

/// Unmarshal a message into a record
///
/// # Errors
///
/// Returns [`SchemaError::BadTarget`] if `T` is not a struct-like type,
/// [`SchemaError::TypeMismatch`] when an element kind does not match the
/// field it is addressed at, and [`SchemaError::NonMessage`] when a
/// non-section element is addressed at a record-typed field.
pub fn from_message<'de, T>(msg: &'de Message) -> Result<T, SchemaError>
where
    T: Deserialize<'de>,
{
    T::deserialize(MessageDeserializer { msg })
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MessageVisitor)
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ElementVisitor)
    }
}

struct MessageVisitor;

impl<'de> Visitor<'de> for MessageVisitor {
    type Value = Message;

    fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("a message section")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut msg = Message::new();
        while let Some((key, element)) = map.next_entry::<String, Element>()? {
            msg.set(key, element);
        }
        Ok(msg)
    }
}

struct ElementVisitor;

impl<'de> Visitor<'de> for ElementVisitor {
    type Value = Element;

    fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("a message element")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Element::Value(v.as_bytes().to_vec()))
    }

    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(Element::Value(v.to_vec()))
    }

    fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(Element::Value(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<ByteString>()? {
            items.push(item.0);
        }
        Ok(Element::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        MessageVisitor.visit_map(map).map(Element::Section)
    }
}

/// A list item decoded as raw bytes rather than a sequence of integers
struct ByteString(Vec<u8>);

impl<'de> Deserialize<'de> for ByteString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_byte_buf(ByteStringVisitor)
    }
}

struct ByteStringVisitor;

impl Visitor<'_> for ByteStringVisitor {
    type Value = ByteString;

    fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("a byte string")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(ByteString(v.as_bytes().to_vec()))
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(ByteString(v.into_bytes()))
    }

    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(ByteString(v.to_vec()))
    }

    fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(ByteString(v))
    }
}

/// Rejects scalar targets the message model cannot populate
macro_rules! reject_target {
    ($($method:ident => $name:literal),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
                Err(self.reject($name))
            }
        )*
    };
}

/// Root deserializer: the target must be a struct-like type
struct MessageDeserializer<'de> {
    msg: &'de Message,
}

impl MessageDeserializer<'_> {
    #[allow(clippy::unused_self)]
    fn reject(&self, name: &'static str) -> SchemaError {
        SchemaError::BadTarget(name)
    }
}

impl<'de> Deserializer<'de> for MessageDeserializer<'de> {
    type Error = SchemaError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_map(ElementsAccess::new(self.msg))
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_map(ElementsAccess::new(self.msg))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_map(ElementsAccess::new(self.msg))
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    reject_target! {
        deserialize_bool => "bool",
        deserialize_i8 => "integer",
        deserialize_i16 => "integer",
        deserialize_i32 => "integer",
        deserialize_i64 => "integer",
        deserialize_u8 => "integer",
        deserialize_u16 => "integer",
        deserialize_u32 => "integer",
        deserialize_u64 => "integer",
        deserialize_f32 => "float",
        deserialize_f64 => "float",
        deserialize_char => "char",
        deserialize_str => "string",
        deserialize_string => "string",
        deserialize_bytes => "byte string",
        deserialize_byte_buf => "byte string",
        deserialize_unit => "unit",
        deserialize_seq => "sequence",
        deserialize_identifier => "identifier",
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.reject("unit struct"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.reject("tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.reject("tuple struct"))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.reject("enum"))
    }
}

/// Walks a message's elements in key order
struct ElementsAccess<'de> {
    msg: &'de Message,
    index: usize,
}

impl<'de> ElementsAccess<'de> {
    fn new(msg: &'de Message) -> Self {
        Self { msg, index: 0 }
    }
}

impl<'de> MapAccess<'de> for ElementsAccess<'de> {
    type Error = SchemaError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        let Some(key) = self.msg.keys().get(self.index) else {
            return Ok(None);
        };
        seed.deserialize(BorrowedStrDeserializer::new(key)).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let key = &self.msg.keys()[self.index];
        self.index += 1;
        let element = self
            .msg
            .get(key)
            .ok_or_else(|| SchemaError::Custom(format!("missing element for key {key}")))?;
        seed.deserialize(ElementDeserializer { element })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.msg.len() - self.index)
    }
}

/// Deserializer for a single message element
struct ElementDeserializer<'de> {
    element: &'de Element,
}

impl ElementDeserializer<'_> {
    fn mismatch(&self, expected: &'static str) -> SchemaError {
        SchemaError::type_mismatch(expected, self.element.kind())
    }
}

/// Rejects scalar field types no element kind can populate
macro_rules! reject_field {
    ($($method:ident => $name:literal),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
                Err(self.mismatch($name))
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ElementDeserializer<'de> {
    type Error = SchemaError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.element {
            Element::Value(v) => match std::str::from_utf8(v) {
                Ok(s) => visitor.visit_borrowed_str(s),
                Err(_) => visitor.visit_borrowed_bytes(v),
            },
            Element::List(items) => visitor.visit_seq(ItemsAccess::new(items)),
            Element::Section(m) => visitor.visit_map(ElementsAccess::new(m)),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.element {
            Element::Value(v) => {
                let s = std::str::from_utf8(v)
                    .map_err(|_| SchemaError::Custom("value is not valid UTF-8".to_string()))?;
                visitor.visit_borrowed_str(s)
            }
            _ => Err(self.mismatch("string")),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.element {
            Element::Value(v) => visitor.visit_borrowed_bytes(v),
            _ => Err(self.mismatch("byte string")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.element {
            Element::List(items) => visitor.visit_seq(ItemsAccess::new(items)),
            _ => Err(self.mismatch("list")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.element {
            Element::Section(m) => visitor.visit_map(ElementsAccess::new(m)),
            other => Err(SchemaError::NonMessage(other.kind())),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.element {
            Element::Section(m) => visitor.visit_map(ElementsAccess::new(m)),
            other => Err(SchemaError::NonMessage(other.kind())),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        // the element is present, so the option is populated
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    reject_field! {
        deserialize_bool => "bool",
        deserialize_i8 => "integer",
        deserialize_i16 => "integer",
        deserialize_i32 => "integer",
        deserialize_i64 => "integer",
        deserialize_u8 => "integer",
        deserialize_u16 => "integer",
        deserialize_u32 => "integer",
        deserialize_u64 => "integer",
        deserialize_f32 => "float",
        deserialize_f64 => "float",
        deserialize_char => "char",
        deserialize_unit => "unit",
        deserialize_identifier => "identifier",
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.mismatch("unit struct"))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.mismatch("enum"))
    }
}

/// Walks list items in order
struct ItemsAccess<'de> {
    items: &'de [Vec<u8>],
    index: usize,
}

impl<'de> ItemsAccess<'de> {
    const fn new(items: &'de [Vec<u8>]) -> Self {
        Self { items, index: 0 }
    }
}

impl<'de> SeqAccess<'de> for ItemsAccess<'de> {
    type Error = SchemaError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        let Some(item) = self.items.get(self.index) else {
            return Ok(None);
        };
        self.index += 1;
        seed.deserialize(ItemDeserializer { item }).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len() - self.index)
    }
}

/// Deserializer for a single list item
struct ItemDeserializer<'de> {
    item: &'de [u8],
}

impl<'de> ItemDeserializer<'de> {
    fn as_str(&self) -> Result<&'de str, SchemaError> {
        std::str::from_utf8(self.item)
            .map_err(|_| SchemaError::Custom("list item is not valid UTF-8".to_string()))
    }

    #[allow(clippy::unused_self)]
    fn mismatch(&self, expected: &'static str) -> SchemaError {
        SchemaError::type_mismatch(expected, "list item")
    }
}

impl<'de> Deserializer<'de> for ItemDeserializer<'de> {
    type Error = SchemaError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match std::str::from_utf8(self.item) {
            Ok(s) => visitor.visit_borrowed_str(s),
            Err(_) => visitor.visit_borrowed_bytes(self.item),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.as_str()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_bytes(self.item)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    reject_field! {
        deserialize_bool => "bool",
        deserialize_i8 => "integer",
        deserialize_i16 => "integer",
        deserialize_i32 => "integer",
        deserialize_i64 => "integer",
        deserialize_u8 => "integer",
        deserialize_u16 => "integer",
        deserialize_u32 => "integer",
        deserialize_u64 => "integer",
        deserialize_f32 => "float",
        deserialize_f64 => "float",
        deserialize_char => "char",
        deserialize_unit => "unit",
        deserialize_seq => "sequence",
        deserialize_map => "map",
        deserialize_identifier => "identifier",
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.mismatch("unit struct"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.mismatch("tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.mismatch("tuple struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.mismatch("struct"))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(self.mismatch("enum"))
    }
}
