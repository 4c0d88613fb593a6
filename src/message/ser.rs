//! Marshaling of user records into messages
//!
//! [`to_message`] converts any `Serialize` record into a [`Message`] using
//! the record's field names (after serde renames) as element keys, in
//! declared field order. The element kind follows the field type:
//!
//! | Field type | Element |
//! |------------|---------|
//! | `String`, `&str`, byte string | Value |
//! | sequence of byte strings | List |
//! | [`Message`] | Section (copied as-is) |
//! | nested record | Section (recursively marshaled) |
//! | `Option<T>` | as `T`; `None` is skipped |
//!
//! Anything else (integers, floats, booleans, enums) is not representable
//! on the wire and fails with [`SchemaError::MarshalUnsupportedType`].
//!
//! Struct fields whose value is the zero of its type are suppressed: empty
//! strings, empty sequences, `None`, and nested records that marshal to an
//! empty section produce no element. This lets record schemas declare a
//! superset of optional fields without bloating the wire. Elements of an
//! explicit [`Message`] field are copied verbatim, empty values included.
//!
//! # Example
//!
//! ```
//! use serde::Serialize;
//! use vici::to_message;
//!
//! #[derive(Serialize)]
//! struct Child {
//!     local_ts: Vec<String>,
//!     remote_ts: Vec<String>,
//! }
//!
//! #[derive(Serialize)]
//! struct Conn {
//!     version: String,
//!     #[serde(rename = "net")]
//!     child: Child,
//! }
//!
//! let conn = Conn {
//!     version: "2".to_string(),
//!     child: Child {
//!         local_ts: vec!["10.0.0.0/8".to_string()],
//!         remote_ts: Vec::new(),
//!     },
//! };
//!
//! let msg = to_message(&conn).unwrap();
//! assert_eq!(msg.keys(), ["version", "net"]);
//! // remote_ts was empty and is suppressed
//! assert_eq!(msg.section("net").unwrap().keys(), ["local_ts"]);
//! ```

use serde::ser::{
    Impossible, Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeTuple,
    SerializeTupleStruct, Serializer,
};

use super::error::SchemaError;
use super::{Element, Message};

/// Marshal a record into a message
///
/// # Errors
///
/// Returns [`SchemaError::MarshalUnsupportedType`] if `value` is not a struct-like
/// record, or if one of its fields cannot be represented as a message
/// element.
pub fn to_message<T>(value: &T) -> Result<Message, SchemaError>
where
    T: Serialize + ?Sized,
{
    value.serialize(MessageSerializer)
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, element) in self.iter() {
            map.serialize_entry(key, element)?;
        }
        map.end()
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_bytes(v),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&RawBytes(item))?;
                }
                seq.end()
            }
            Self::Section(m) => m.serialize(serializer),
        }
    }
}

/// Forces byte-string serialization for list items
struct RawBytes<'a>(&'a [u8]);

impl Serialize for RawBytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

/// Rejects the primitive types the wire cannot represent
macro_rules! reject_scalars {
    () => {
        fn serialize_bool(self, _v: bool) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("bool"))
        }
        fn serialize_i8(self, _v: i8) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("integer"))
        }
        fn serialize_i16(self, _v: i16) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("integer"))
        }
        fn serialize_i32(self, _v: i32) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("integer"))
        }
        fn serialize_i64(self, _v: i64) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("integer"))
        }
        fn serialize_u8(self, _v: u8) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("integer"))
        }
        fn serialize_u16(self, _v: u16) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("integer"))
        }
        fn serialize_u32(self, _v: u32) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("integer"))
        }
        fn serialize_u64(self, _v: u64) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("integer"))
        }
        fn serialize_f32(self, _v: f32) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("float"))
        }
        fn serialize_f64(self, _v: f64) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("float"))
        }
        fn serialize_char(self, _v: char) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("char"))
        }
        fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("unit"))
        }
        fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("unit struct"))
        }
        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
        ) -> Result<Self::Ok, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("enum variant"))
        }
        fn serialize_newtype_variant<T>(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _value: &T,
        ) -> Result<Self::Ok, Self::Error>
        where
            T: Serialize + ?Sized,
        {
            Err(SchemaError::MarshalUnsupportedType("enum variant"))
        }
        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleVariant, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("enum variant"))
        }
        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStructVariant, Self::Error> {
            Err(SchemaError::MarshalUnsupportedType("enum variant"))
        }
    };
}

/// Root serializer: only struct-like records are accepted
struct MessageSerializer;

impl Serializer for MessageSerializer {
    type Ok = Message;
    type Error = SchemaError;

    type SerializeSeq = Impossible<Message, SchemaError>;
    type SerializeTuple = Impossible<Message, SchemaError>;
    type SerializeTupleStruct = Impossible<Message, SchemaError>;
    type SerializeTupleVariant = Impossible<Message, SchemaError>;
    type SerializeMap = RootMap;
    type SerializeStruct = RootStruct;
    type SerializeStructVariant = Impossible<Message, SchemaError>;

    reject_scalars!();

    fn serialize_str(self, _v: &str) -> Result<Self::Ok, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("string"))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("byte string"))
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("none"))
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("tuple struct"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(RootMap(MapBuilder::new()))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(RootStruct(Message::new()))
    }
}

/// Field-position serializer: zero values become `None` and are skipped
struct FieldSerializer;

impl Serializer for FieldSerializer {
    type Ok = Option<Element>;
    type Error = SchemaError;

    type SerializeSeq = FieldSeq;
    type SerializeTuple = FieldSeq;
    type SerializeTupleStruct = FieldSeq;
    type SerializeTupleVariant = Impossible<Option<Element>, SchemaError>;
    type SerializeMap = ElemMap;
    type SerializeStruct = ElemStruct;
    type SerializeStructVariant = Impossible<Option<Element>, SchemaError>;

    reject_scalars!();

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        Ok((!v.is_empty()).then(|| Element::Value(v.as_bytes().to_vec())))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Ok((!v.is_empty()).then(|| Element::Value(v.to_vec())))
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(FieldSeq::new(len))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(FieldSeq::new(Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Ok(FieldSeq::new(Some(len)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(ElemMap(MapBuilder::new()))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(ElemStruct(Message::new()))
    }
}

/// Verbatim serializer for map values: elements are kept even when empty
struct VerbatimSerializer;

impl Serializer for VerbatimSerializer {
    type Ok = Element;
    type Error = SchemaError;

    type SerializeSeq = VerbSeq;
    type SerializeTuple = VerbSeq;
    type SerializeTupleStruct = VerbSeq;
    type SerializeTupleVariant = Impossible<Element, SchemaError>;
    type SerializeMap = VerbMap;
    type SerializeStruct = VerbStruct;
    type SerializeStructVariant = Impossible<Element, SchemaError>;

    reject_scalars!();

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(Element::Value(v.as_bytes().to_vec()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Ok(Element::Value(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("none"))
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(VerbSeq::new(len))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(VerbSeq::new(Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Ok(VerbSeq::new(Some(len)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(VerbMap(MapBuilder::new()))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(VerbStruct(Message::new()))
    }
}

/// List-item serializer: only byte strings are legal inside a list
struct ValueSerializer;

impl Serializer for ValueSerializer {
    type Ok = Vec<u8>;
    type Error = SchemaError;

    type SerializeSeq = Impossible<Vec<u8>, SchemaError>;
    type SerializeTuple = Impossible<Vec<u8>, SchemaError>;
    type SerializeTupleStruct = Impossible<Vec<u8>, SchemaError>;
    type SerializeTupleVariant = Impossible<Vec<u8>, SchemaError>;
    type SerializeMap = Impossible<Vec<u8>, SchemaError>;
    type SerializeStruct = Impossible<Vec<u8>, SchemaError>;
    type SerializeStructVariant = Impossible<Vec<u8>, SchemaError>;

    reject_scalars!();

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(v.as_bytes().to_vec())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Ok(v.to_vec())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("none inside a list"))
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("list inside a list"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("list inside a list"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("list inside a list"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("section inside a list"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("section inside a list"))
    }
}

/// Map-key serializer: element keys must be strings
struct KeySerializer;

impl Serializer for KeySerializer {
    type Ok = String;
    type Error = SchemaError;

    type SerializeSeq = Impossible<String, SchemaError>;
    type SerializeTuple = Impossible<String, SchemaError>;
    type SerializeTupleStruct = Impossible<String, SchemaError>;
    type SerializeTupleVariant = Impossible<String, SchemaError>;
    type SerializeMap = Impossible<String, SchemaError>;
    type SerializeStruct = Impossible<String, SchemaError>;
    type SerializeStructVariant = Impossible<String, SchemaError>;

    reject_scalars!();

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("non-string map key"))
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("non-string map key"))
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("non-string map key"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("non-string map key"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("non-string map key"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("non-string map key"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Err(SchemaError::MarshalUnsupportedType("non-string map key"))
    }
}

/// Shared key/value state for map-like collectors
struct MapBuilder {
    msg: Message,
    key: Option<String>,
}

impl MapBuilder {
    fn new() -> Self {
        Self {
            msg: Message::new(),
            key: None,
        }
    }

    fn key<T>(&mut self, key: &T) -> Result<(), SchemaError>
    where
        T: Serialize + ?Sized,
    {
        self.key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn value<T>(&mut self, value: &T) -> Result<(), SchemaError>
    where
        T: Serialize + ?Sized,
    {
        let key = self
            .key
            .take()
            .ok_or_else(|| SchemaError::Custom("map value without a key".to_string()))?;
        let element = value.serialize(VerbatimSerializer)?;
        self.msg.set(key, element);
        Ok(())
    }
}

/// Zero-suppressing field insertion shared by the struct collectors
fn marshal_field<T>(msg: &mut Message, key: &'static str, value: &T) -> Result<(), SchemaError>
where
    T: Serialize + ?Sized,
{
    if let Some(element) = value.serialize(FieldSerializer)? {
        msg.set(key, element);
    }
    Ok(())
}

struct RootStruct(Message);

impl SerializeStruct for RootStruct {
    type Ok = Message;
    type Error = SchemaError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        marshal_field(&mut self.0, key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(self.0)
    }
}

struct RootMap(MapBuilder);

impl SerializeMap for RootMap {
    type Ok = Message;
    type Error = SchemaError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.key(key)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.value(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(self.0.msg)
    }
}

struct ElemStruct(Message);

impl SerializeStruct for ElemStruct {
    type Ok = Option<Element>;
    type Error = SchemaError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        marshal_field(&mut self.0, key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        // a recursively-zero nested record marshals to nothing at all
        Ok((!self.0.is_empty()).then(|| Element::Section(self.0)))
    }
}

struct ElemMap(MapBuilder);

impl SerializeMap for ElemMap {
    type Ok = Option<Element>;
    type Error = SchemaError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.key(key)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.value(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        // an explicit Message field is emitted as-is, even when empty
        Ok(Some(Element::Section(self.0.msg)))
    }
}

struct VerbStruct(Message);

impl SerializeStruct for VerbStruct {
    type Ok = Element;
    type Error = SchemaError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        marshal_field(&mut self.0, key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(Element::Section(self.0))
    }
}

struct VerbMap(MapBuilder);

impl SerializeMap for VerbMap {
    type Ok = Element;
    type Error = SchemaError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.key(key)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.value(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(Element::Section(self.0.msg))
    }
}

struct FieldSeq {
    items: Vec<Vec<u8>>,
}

impl FieldSeq {
    fn new(len: Option<usize>) -> Self {
        Self {
            items: Vec::with_capacity(len.unwrap_or(0)),
        }
    }

    fn push<T>(&mut self, value: &T) -> Result<(), SchemaError>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn finish(self) -> Option<Element> {
        // an empty sequence is the zero of its type
        (!self.items.is_empty()).then(|| Element::List(self.items))
    }
}

impl SerializeSeq for FieldSeq {
    type Ok = Option<Element>;
    type Error = SchemaError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(self.finish())
    }
}

impl SerializeTuple for FieldSeq {
    type Ok = Option<Element>;
    type Error = SchemaError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(self.finish())
    }
}

impl SerializeTupleStruct for FieldSeq {
    type Ok = Option<Element>;
    type Error = SchemaError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(self.finish())
    }
}

struct VerbSeq {
    items: Vec<Vec<u8>>,
}

impl VerbSeq {
    fn new(len: Option<usize>) -> Self {
        Self {
            items: Vec::with_capacity(len.unwrap_or(0)),
        }
    }

    fn push<T>(&mut self, value: &T) -> Result<(), SchemaError>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }
}

impl SerializeSeq for VerbSeq {
    type Ok = Element;
    type Error = SchemaError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(Element::List(self.items))
    }
}

impl SerializeTuple for VerbSeq {
    type Ok = Element;
    type Error = SchemaError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(Element::List(self.items))
    }
}

impl SerializeTupleStruct for VerbSeq {
    type Ok = Element;
    type Error = SchemaError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(Element::List(self.items))
    }
}
