use std::{collections::HashMap, fmt::Display};

use crate::{encoder, Error, Result};

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint(u64),
    Int(i64),
    /// Value with a scale factor applied.
    Float(f64),
    Char(char),
    /// Concatenated string fields and derived MSM labels.
    Str(String),
}

impl Value {
    /// Unsigned value of an integer attribute. Negative integers return `None`.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Uint(v) => i64::try_from(*v).ok(),
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Any numeric value as a float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Uint(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Uint(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Ordered attribute map. Inserting an existing name replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Attributes {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Attributes {
    pub fn insert(&mut self, name: String, value: Value) {
        if let Some(&idx) = self.index.get(&name) {
            self.entries[idx].1 = value;
        } else {
            self.index.insert(name.clone(), self.entries.len());
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&idx| &self.entries[idx].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

/// A decoded RTCM3 message.
///
/// Attributes are named after their data field, suffixed with one `_NN` (1-based)
/// group index per level of group nesting, e.g., `DF405_03` for the third cell of an
/// MSM7 message. Iteration order is the order attributes were decoded.
///
/// Messages are immutable once decoded.
///
/// # Example
/// ```
/// use rtcm::{Decoder, Value};
///
/// let frame = [0xd3, 0x00, 0x04, 0x4c, 0xe0, 0x00, 0x80, 0xed, 0xed, 0xd6];
/// let msg = Decoder::default().parse(&frame).unwrap();
/// assert_eq!(msg.identity(), "1230");
/// assert_eq!(msg.get("DF421"), Some(&Value::Uint(1)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    identity: String,
    payload: Vec<u8>,
    attributes: Attributes,
    unknown: bool,
}

impl Message {
    pub(crate) fn new(identity: String, payload: Vec<u8>, attributes: Attributes) -> Self {
        Message {
            identity,
            payload,
            attributes,
            unknown: false,
        }
    }

    /// A message with no registered schema. Only `DF002`, the message number, is set.
    pub(crate) fn unknown(identity: String, payload: Vec<u8>, number: u64) -> Self {
        let mut attributes = Attributes::default();
        attributes.insert("DF002".to_string(), Value::Uint(number));
        Message {
            identity,
            payload,
            attributes,
            unknown: true,
        }
    }

    /// Message identity, e.g., `1005` or `4076_027` for IGS SSR messages.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Raw payload bytes, not including the frame header or CRC.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    /// Iterate over `(name, value)` in decode order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes
            .entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.entries.is_empty()
    }

    /// True if there is no schema for this message identity.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.unknown
    }

    /// True for Multiple Signal Messages, i.e., identities 1070 through 1229.
    #[must_use]
    pub fn is_msm(&self) -> bool {
        self.identity
            .parse::<u16>()
            .is_ok_and(|id| (1070..=1229).contains(&id))
    }

    /// Messages cannot be modified after they are decoded.
    ///
    /// # Errors
    /// Always [Error::Immutable].
    pub fn set(&self, name: &str, _value: Value) -> Result<()> {
        Err(Error::Immutable {
            name: name.to_string(),
        })
    }

    /// Serialize to a complete frame, including header and CRC.
    ///
    /// # Errors
    /// If the payload is too long to be framed.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        encoder::serialize(&self.payload)
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<RTCM({}", self.identity)?;
        for (name, value) in self.iter() {
            write!(f, ", {name}={value}")?;
        }
        if self.unknown {
            write!(f, ", Not_Yet_Implemented")?;
        }
        write!(f, ")>")
    }
}

#[cfg(feature = "serialize")]
mod ser {
    use serde::ser::{SerializeMap, SerializeStruct};
    use serde::{Serialize, Serializer};

    use super::{Attributes, Message, Value};

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Value::Uint(v) => serializer.serialize_u64(*v),
                Value::Int(v) => serializer.serialize_i64(*v),
                Value::Float(v) => serializer.serialize_f64(*v),
                Value::Char(v) => serializer.serialize_char(*v),
                Value::Str(v) => serializer.serialize_str(v),
            }
        }
    }

    impl Serialize for Attributes {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.entries.len()))?;
            for (name, value) in &self.entries {
                map.serialize_entry(name, value)?;
            }
            map.end()
        }
    }

    impl Serialize for Message {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut s = serializer.serialize_struct("Message", 4)?;
            s.serialize_field("identity", &self.identity)?;
            s.serialize_field("unknown", &self.unknown)?;
            s.serialize_field("payload", serde_bytes::Bytes::new(&self.payload))?;
            s.serialize_field("attributes", &self.attributes)?;
            s.end()
        }
    }
}
