//! Payload and frame encoding.
use std::sync::Arc;

use crate::{
    bits::BitWriter,
    crc,
    schema::DataType,
    synchronizer::{MAX_PAYLOAD_LEN, PREAMBLE},
    Error, Registry, Result,
};

fn encode_error(field: &str, reason: impl Into<String>) -> Error {
    Error::Encode {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn mask(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// Incrementally builds a message payload from field values.
///
/// # Example
/// ```
/// use rtcm::{encoder::PayloadBuilder, Decoder};
///
/// let mut builder = PayloadBuilder::default();
/// builder
///     .field("DF002", 1007)?
///     .field("DF003", 1234)?
///     .field("DF029", 1)?
///     .field("DF030", i64::from(b'A'))?
///     .field("DF031", 234)?;
/// let payload = builder.finish();
///
/// let msg = Decoder::default().decode(&payload)?;
/// assert_eq!(msg.get("DF030_01").and_then(|v| v.as_char()), Some('A'));
/// # Ok::<(), rtcm::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    registry: Arc<Registry>,
    writer: BitWriter,
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(Registry::builtin())
    }
}

impl PayloadBuilder {
    /// Create a builder that resolves field widths and types using `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        PayloadBuilder {
            registry,
            writer: BitWriter::new(),
        }
    }

    /// Append the low `width` bits of `raw`. `name` is only used for errors.
    ///
    /// # Errors
    /// [Error::Encode] if `raw` does not fit in `width` bits or `width` exceeds 64.
    pub fn bits(&mut self, name: &str, width: usize, raw: u64) -> Result<&mut Self> {
        if width > 64 {
            return Err(encode_error(name, format!("width {width} exceeds 64 bits")));
        }
        if raw & !mask(width) != 0 {
            return Err(encode_error(
                name,
                format!("raw value {raw} does not fit in {width} bits"),
            ));
        }
        self.writer.write(raw, width)?;
        Ok(self)
    }

    /// Append an unscaled field value using the field's width and type from the
    /// registry. Group index suffixes in `name` are ignored for the lookup.
    ///
    /// # Errors
    /// [Error::UnknownField] if there is no such field, [Error::Encode] if the field has
    /// no fixed width or `value` is out of range for the field type.
    pub fn field(&mut self, name: &str, value: i64) -> Result<&mut Self> {
        let def = self
            .registry
            .field(name)
            .ok_or_else(|| Error::UnknownField {
                name: name.to_string(),
            })?;
        let (data_type, width) = (def.data_type, def.width);
        if data_type.is_derived() || width == 0 {
            return Err(encode_error(name, "field has no fixed width"));
        }
        if width > 64 {
            return Err(encode_error(name, format!("width {width} exceeds 64 bits")));
        }

        let half = 1i128 << (width - 1);
        let v = i128::from(value);
        let raw = match data_type {
            DataType::Int => {
                if v < -half || v >= half {
                    return Err(encode_error(name, format!("{value} out of range")));
                }
                value as u64 & mask(width)
            }
            DataType::SignMagnitude => {
                if v.abs() >= half {
                    return Err(encode_error(name, format!("{value} out of range")));
                }
                let sign = if value < 0 { 1u64 << (width - 1) } else { 0 };
                sign | value.unsigned_abs()
            }
            _ => {
                if v < 0 || v > i128::from(mask(width)) {
                    return Err(encode_error(name, format!("{value} out of range")));
                }
                value.unsigned_abs()
            }
        };
        self.bits(name, width, raw)
    }

    /// Append a field value in engineering units, removing the field's scale factor
    /// and rounding to the nearest integer.
    ///
    /// # Errors
    /// See [PayloadBuilder::field].
    pub fn scaled(&mut self, name: &str, value: f64) -> Result<&mut Self> {
        let def = self
            .registry
            .field(name)
            .ok_or_else(|| Error::UnknownField {
                name: name.to_string(),
            })?;
        let raw = if def.is_scaled() {
            (value / def.scale).round()
        } else {
            value.round()
        };
        if !raw.is_finite() || raw < i64::MIN as f64 || raw > i64::MAX as f64 {
            return Err(encode_error(name, format!("{value} out of range")));
        }
        self.field(name, raw as i64)
    }

    /// Number of bits written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    /// Payload bytes, zero padded to a whole number of bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.writer.finish()
    }
}

/// Encode pre-ordered `(name, width, raw value)` triples into a payload.
///
/// # Errors
/// [Error::Encode] if any value does not fit its width.
pub fn encode(fields: &[(&str, usize, u64)]) -> Result<Vec<u8>> {
    let mut writer = BitWriter::new();
    for &(name, width, raw) in fields {
        if width > 64 || raw & !mask(width) != 0 {
            return Err(encode_error(
                name,
                format!("raw value {raw} does not fit in {width} bits"),
            ));
        }
        writer.write(raw, width)?;
    }
    Ok(writer.finish())
}

/// Big-endian payload length as used in the frame header. The 6 reserved bits are 0.
///
/// # Errors
/// [Error::Encode] if the payload is longer than 1023 bytes.
pub fn len_to_bytes(payload: &[u8]) -> Result<[u8; 2]> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(encode_error(
            "length",
            format!(
                "payload of {} bytes exceeds {MAX_PAYLOAD_LEN}",
                payload.len()
            ),
        ));
    }
    let len = u16::try_from(payload.len()).map_err(|err| encode_error("length", err.to_string()))?;
    Ok(len.to_be_bytes())
}

/// Frame a payload: preamble, length, payload and CRC-24Q trailer.
///
/// # Errors
/// [Error::Encode] if the payload is longer than 1023 bytes.
pub fn serialize(payload: &[u8]) -> Result<Vec<u8>> {
    let len = len_to_bytes(payload)?;
    let mut frame = Vec::with_capacity(payload.len() + 6);
    frame.push(PREAMBLE);
    frame.extend_from_slice(&len);
    frame.extend_from_slice(payload);
    let trailer = crc::crc_to_bytes(&frame);
    frame.extend_from_slice(&trailer);
    Ok(frame)
}
