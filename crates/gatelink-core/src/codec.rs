//! Message wire codec.
//!
//! [`WireCodec`] is the seam between the [`Message`] document and the text
//! carried inside a frame. The default [`TypedTextCodec`] produces a compact,
//! single-line, type-tagged encoding:
//!
//! ```text
//! value   = "n:"                          null
//!         | "s:" len ":" base64           string (len = base64 length)
//!         | "i:" int ":"                  32-bit integer
//!         | "l:" int ":"                  64-bit integer
//!         | "d:" float ":"                double
//!         | "b:" ("t" | "f") ":"          boolean
//!         | "m:" count ":" (key value)*   nested message
//!         | "v:" count ":" value*         list
//! key     = len ":" base64
//! ```
//!
//! A frame payload is always a single top-level `m:` value.

use crate::error::CodecError;
use crate::message::{Message, Value};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write;

/// Deepest nesting accepted by the decoder.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Encodes and decodes messages for the wire.
pub trait WireCodec: Send + Sync {
    /// Encode a message as single-line text.
    fn encode(&self, message: &Message) -> String;

    /// Decode text produced by [`WireCodec::encode`].
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] describing the first malformed element.
    fn decode(&self, text: &str) -> Result<Message, CodecError>;
}

/// Default type-tagged text codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedTextCodec;

impl TypedTextCodec {
    /// Create the codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WireCodec for TypedTextCodec {
    fn encode(&self, message: &Message) -> String {
        let mut out = String::new();
        encode_map(&mut out, message);
        out
    }

    fn decode(&self, text: &str) -> Result<Message, CodecError> {
        let mut reader = Reader::new(text.as_bytes());
        let value = reader.value(0)?;
        if !reader.at_end() {
            return Err(CodecError::TrailingData(reader.pos));
        }
        match value {
            Value::Map(message) => Ok(message),
            _ => Err(CodecError::NotAMessage),
        }
    }
}

// Writing to a String cannot fail, so the fmt::Result values are discarded.

fn encode_text(out: &mut String, text: &str) {
    let encoded = STANDARD.encode(text.as_bytes());
    let _ = write!(out, "{}:{}", encoded.len(), encoded);
}

fn encode_map(out: &mut String, message: &Message) {
    let _ = write!(out, "m:{}:", message.len());
    for (key, value) in message.iter() {
        encode_text(out, key);
        encode_value(out, value);
    }
}

fn encode_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("n:"),
        Value::String(s) => {
            out.push_str("s:");
            encode_text(out, s);
        }
        Value::Int(i) => {
            let _ = write!(out, "i:{i}:");
        }
        Value::Long(l) => {
            let _ = write!(out, "l:{l}:");
        }
        Value::Double(d) => {
            // Debug formatting is the shortest representation that parses back exactly
            let _ = write!(out, "d:{d:?}:");
        }
        Value::Bool(b) => out.push_str(if *b { "b:t:" } else { "b:f:" }),
        Value::Map(m) => encode_map(out, m),
        Value::List(items) => {
            let _ = write!(out, "v:{}:", items.len());
            for item in items {
                encode_value(out, item);
            }
        }
    }
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        let b = *self
            .input
            .get(self.pos)
            .ok_or(CodecError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, expected: u8) -> Result<(), CodecError> {
        let offset = self.pos;
        if self.byte()? != expected {
            return Err(CodecError::Expected {
                expected: char::from(expected),
                offset,
            });
        }
        Ok(())
    }

    /// Bytes up to (not including) the next ':', which is consumed.
    fn field(&mut self) -> Result<&'a str, CodecError> {
        let start = self.pos;
        let rest = &self.input[start..];
        let len = rest
            .iter()
            .position(|&b| b == b':')
            .ok_or(CodecError::UnexpectedEnd(self.input.len()))?;
        self.pos = start + len + 1;
        std::str::from_utf8(&rest[..len]).map_err(|_| CodecError::InvalidNumber(start))
    }

    fn number<T: std::str::FromStr>(&mut self) -> Result<T, CodecError> {
        let start = self.pos;
        self.field()?
            .parse()
            .map_err(|_| CodecError::InvalidNumber(start))
    }

    fn text(&mut self) -> Result<String, CodecError> {
        let len: usize = self.number()?;
        let offset = self.pos;
        let payload = offset
            .checked_add(len)
            .and_then(|end| self.input.get(offset..end))
            .ok_or(CodecError::UnexpectedEnd(self.input.len()))?;
        self.pos = offset + len;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|_| CodecError::InvalidString(offset))?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidString(offset))
    }

    fn value(&mut self, depth: usize) -> Result<Value, CodecError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(CodecError::TooDeep(MAX_NESTING_DEPTH));
        }
        let offset = self.pos;
        let tag = self.byte()?;
        self.expect(b':')?;
        match tag {
            b'n' => Ok(Value::Null),
            b's' => self.text().map(Value::String),
            b'i' => self.number().map(Value::Int),
            b'l' => self.number().map(Value::Long),
            b'd' => self.number().map(Value::Double),
            b'b' => {
                let flag_at = self.pos;
                match self.field()? {
                    "t" => Ok(Value::Bool(true)),
                    "f" => Ok(Value::Bool(false)),
                    _ => Err(CodecError::InvalidNumber(flag_at)),
                }
            }
            b'm' => {
                let count: usize = self.number()?;
                let mut message = Message::new();
                for _ in 0..count {
                    let key = self.text()?;
                    let value = self.value(depth + 1)?;
                    message.insert(key, value);
                }
                Ok(Value::Map(message))
            }
            b'v' => {
                let count: usize = self.number()?;
                // Cap the up-front allocation; the count comes off the wire
                let mut items = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                Ok(Value::List(items))
            }
            other => Err(CodecError::UnknownTag {
                tag: char::from(other),
                offset,
            }),
        }
    }
}
