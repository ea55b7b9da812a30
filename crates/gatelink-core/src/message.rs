//! Typed key-value message document.
//!
//! A [`Message`] is the unit exchanged between peers: requests, responses,
//! notifications and handshakes are all messages. Keys are strings; values
//! are drawn from a small closed set of types ([`Value`]) that survive the
//! wire codec with their exact type intact.

use std::collections::BTreeMap;
use std::fmt;

/// Reserved message keys.
pub mod keys {
    /// Integer id on a request awaiting a reply
    pub const REQUEST_ID: &str = "requestId";
    /// Integer id on a reply, equal to the originating `requestId`
    pub const RESPONSE_ID: &str = "responseId";
    /// Rejection reason on a failed handshake
    pub const ERROR: &str = "error";
    /// Handshake protocol version
    pub const PROTOCOL_VERSION: &str = "protocolVersion";
    /// Handshake software version string
    pub const PLUGIN_VERSION: &str = "pluginVersion";
    /// Handshake key digest (dialer to listener only)
    pub const KEY: &str = "key";
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null, distinct from an absent key
    Null,
    /// UTF-8 string
    String(String),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// Double precision float
    Double(f64),
    /// Boolean
    Bool(bool),
    /// Nested message
    Map(Message),
    /// Ordered list of values
    List(Vec<Value>),
}

impl Value {
    /// Short name of the value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
            Self::Map(_) => "map",
            Self::List(_) => "list",
        }
    }

    /// True for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// String contents, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value, accepting a `Long` that fits in 32 bits.
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Self::Int(i) => Some(i),
            Self::Long(l) => i32::try_from(l).ok(),
            _ => None,
        }
    }

    /// Long value, widening an `Int`.
    #[must_use]
    pub fn as_long(&self) -> Option<i64> {
        match *self {
            Self::Int(i) => Some(i64::from(i)),
            Self::Long(l) => Some(l),
            _ => None,
        }
    }

    /// Double value, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Self::Double(d) => Some(d),
            Self::Int(i) => Some(f64::from(i)),
            Self::Long(l) => Some(l as f64),
            _ => None,
        }
    }

    /// Boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Nested message.
    #[must_use]
    pub fn as_map(&self) -> Option<&Message> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// List elements.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Message> for Value {
    fn from(v: Message) -> Self {
        Self::Map(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// String-keyed document of typed values.
///
/// Key order is irrelevant to the protocol; entries are kept sorted so that
/// encoding is deterministic.
///
/// # Examples
///
/// ```
/// use gatelink_core::message::{Message, Value};
///
/// let mut msg = Message::new();
/// msg.insert("cmd", "ping");
/// msg.insert("attempt", 3);
///
/// assert_eq!(msg.get_str("cmd"), Some("ping"));
/// assert_eq!(msg.get_int("attempt"), Some(3));
/// assert_eq!(msg.get("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    entries: BTreeMap<String, Value>,
}

impl Message {
    /// Create an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove a key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Look up a key. `None` means absent; a present null is `Some(Value::Null)`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// True if the key is present (even when null).
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// String value for `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Integer value for `key`.
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(Value::as_int)
    }

    /// Long value for `key`.
    #[must_use]
    pub fn get_long(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_long)
    }

    /// Double value for `key`.
    #[must_use]
    pub fn get_double(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_double)
    }

    /// Boolean value for `key`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Nested message for `key`.
    #[must_use]
    pub fn get_map(&self, key: &str) -> Option<&Message> {
        self.get(key).and_then(Value::as_map)
    }

    /// List for `key`.
    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_list)
    }

    /// Build the reply skeleton for a request: `{responseId: <requestId>}`.
    ///
    /// Returns `None` when this message carries no request id.
    #[must_use]
    pub fn reply(&self) -> Option<Message> {
        self.get_int(keys::REQUEST_ID)
            .map(|id| Message::new().with(keys::RESPONSE_ID, id))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Message {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut msg = Self::new();
        for (k, v) in iter {
            msg.insert(k, v);
        }
        msg
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Long(l) => write!(f, "{l}L"),
            Self::Double(d) => write!(f, "{d:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Map(m) => write!(f, "{m}"),
            Self::List(l) => {
                f.write_str("[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}
