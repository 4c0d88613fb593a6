//! Wire codec for the message element grammar
//!
//! Messages are encoded as a flat sequence of tagged elements. All integers
//! are big-endian.
//!
//! ```text
//! element   := KV | LIST | SECTION
//! KV        := 0x03 key-len(u8) key value-len(u16) value
//! LIST      := 0x04 key-len(u8) key ITEM* 0x06
//! ITEM      := 0x05 value-len(u16) value
//! SECTION   := 0x01 key-len(u8) key element* 0x02
//! message   := element*
//! ```
//!
//! The encoder and decoder are exact inverses: for every well-formed
//! message `m`, `decode(&encode(&m)?)? == m`, including key order at every
//! nesting level. An empty payload decodes to an empty message.

use bytes::{BufMut, BytesMut};

use super::error::MessageError;
use super::{Element, Message};

/// Begin a new section having a name
const SECTION_START: u8 = 1;
/// End a previously started section
const SECTION_END: u8 = 2;
/// Define a value for a named key in the current section
const KEY_VALUE: u8 = 3;
/// Begin a named list for list items
const LIST_START: u8 = 4;
/// Define an unnamed item value in the current list
const LIST_ITEM: u8 = 5;
/// End a previously started list
const LIST_END: u8 = 6;

/// Encode a message into its wire representation
///
/// Elements are emitted in key order, recursively for sections.
///
/// # Errors
///
/// Returns [`MessageError::BadKeyLength`] for keys that are empty or longer
/// than 255 bytes, and [`MessageError::BadValueLength`] for values or list
/// items longer than 65535 bytes.
pub fn encode(msg: &Message) -> Result<Vec<u8>, MessageError> {
    let mut buf = BytesMut::new();
    encode_body(msg, &mut buf)?;
    Ok(buf.to_vec())
}

/// Decode a message from its wire representation
///
/// Reads elements until the input is exhausted. An empty input yields an
/// empty message.
///
/// # Errors
///
/// Returns a malformed-message error when the bytes violate the element
/// grammar: a declared key, value, or item length exceeding the remaining
/// buffer, an unexpected byte where an element start is required, or a
/// section or list left unterminated at the end of the buffer.
pub fn decode(data: &[u8]) -> Result<Message, MessageError> {
    let mut reader = Reader::new(data);
    let mut msg = Message::new();
    while reader.remaining() > 0 {
        let tag = reader.read_u8()?;
        decode_element(tag, &mut reader, &mut msg)?;
    }
    Ok(msg)
}

fn encode_body(msg: &Message, buf: &mut BytesMut) -> Result<(), MessageError> {
    for (key, element) in msg.iter() {
        match element {
            Element::Value(value) => {
                buf.put_u8(KEY_VALUE);
                put_key(key, buf)?;
                put_value(value, buf)?;
            }
            Element::List(items) => {
                buf.put_u8(LIST_START);
                put_key(key, buf)?;
                for item in items {
                    buf.put_u8(LIST_ITEM);
                    put_value(item, buf)?;
                }
                buf.put_u8(LIST_END);
            }
            Element::Section(section) => {
                buf.put_u8(SECTION_START);
                put_key(key, buf)?;
                encode_body(section, buf)?;
                buf.put_u8(SECTION_END);
            }
        }
    }
    Ok(())
}

fn put_key(key: &str, buf: &mut BytesMut) -> Result<(), MessageError> {
    if key.is_empty() || key.len() > usize::from(u8::MAX) {
        return Err(MessageError::BadKeyLength(key.len()));
    }
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u8(key.len() as u8);
    buf.put_slice(key.as_bytes());
    Ok(())
}

fn put_value(value: &[u8], buf: &mut BytesMut) -> Result<(), MessageError> {
    if value.len() > usize::from(u16::MAX) {
        return Err(MessageError::BadValueLength(value.len()));
    }
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u16(value.len() as u16);
    buf.put_slice(value);
    Ok(())
}

fn decode_element(tag: u8, reader: &mut Reader<'_>, msg: &mut Message) -> Result<(), MessageError> {
    match tag {
        KEY_VALUE => {
            let key = reader.read_key()?;
            let value = reader.read_value()?;
            msg.set(key, value);
        }
        LIST_START => {
            let key = reader.read_key()?;
            let items = read_list(reader)?;
            msg.set(key, items);
        }
        SECTION_START => {
            let key = reader.read_key()?;
            let section = read_section(reader)?;
            msg.set(key, section);
        }
        other => return Err(MessageError::ExpectedElementStart(other)),
    }
    Ok(())
}

fn read_list(reader: &mut Reader<'_>) -> Result<Vec<Vec<u8>>, MessageError> {
    let mut items = Vec::new();
    loop {
        match reader.read_u8()? {
            LIST_END => return Ok(items),
            LIST_ITEM => items.push(reader.read_value()?),
            other => return Err(MessageError::ExpectedElementStart(other)),
        }
    }
}

fn read_section(reader: &mut Reader<'_>) -> Result<Message, MessageError> {
    let mut section = Message::new();
    loop {
        let tag = reader.read_u8()?;
        if tag == SECTION_END {
            return Ok(section);
        }
        decode_element(tag, reader, &mut section)?;
    }
}

/// Bounds-checked cursor over the input buffer
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    const fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn read_u8(&mut self) -> Result<u8, MessageError> {
        let (&byte, rest) = self.buf.split_first().ok_or(MessageError::EndOfBuffer)?;
        self.buf = rest;
        Ok(byte)
    }

    fn take(&mut self, len: usize, overrun: MessageError) -> Result<&'a [u8], MessageError> {
        if self.buf.len() < len {
            return Err(overrun);
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn read_key(&mut self) -> Result<String, MessageError> {
        let len = usize::from(self.read_u8()?);
        let raw = self.take(len, MessageError::BadKey)?;
        String::from_utf8(raw.to_vec()).map_err(|_| MessageError::BadKey)
    }

    fn read_value(&mut self) -> Result<Vec<u8>, MessageError> {
        let len_bytes = self.take(2, MessageError::EndOfBuffer)?;
        let len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
        let raw = self.take(len, MessageError::BadValue)?;
        Ok(raw.to_vec())
    }
}
