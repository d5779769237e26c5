use std::{collections::HashMap, sync::Arc};

use tracing::trace;
use typed_builder::TypedBuilder;

use crate::{
    bits::BitReader,
    crc::{self, CRC_LEN},
    message::{Attributes, Message, Value},
    msm::{self, Masks, MsmLabel, MsmMaps},
    schema::{Count, DataType, FieldDef, SchemaNode},
    synchronizer::HEADER_LEN,
    Error, Registry, Result,
};

/// Message number of the IGS SSR container message.
pub const IGS_SSR: u16 = 4076;

/// Attribute holding the number of satellites in an MSM message.
pub const NSAT: &str = "NSat";
/// Attribute holding the number of signals in an MSM message.
pub const NSIG: &str = "NSig";
/// Attribute holding the number of cells in an MSM message.
pub const NCELL: &str = "NCell";

/// Per-call decoding options.
///
/// # Example
/// ```
/// use rtcm::{DecodeOptions, MsmLabel};
///
/// let opts = DecodeOptions::builder()
///     .scaling(false)
///     .msm_label(MsmLabel::Band)
///     .build();
/// assert!(opts.validate);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct DecodeOptions {
    /// Verify the frame CRC before decoding.
    #[builder(default = true)]
    pub validate: bool,
    /// Apply field scale factors. Scaled values are always [Value::Float].
    #[builder(default = true)]
    pub scaling: bool,
    /// How MSM signals are labelled.
    #[builder(default)]
    pub msm_label: MsmLabel,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Message identity from the first bits of a payload.
///
/// The identity is the 12-bit message number, except for IGS SSR messages (4076) where
/// the 8-bit IGS message number following the 3-bit version is appended, e.g.,
/// `4076_021`.
///
/// # Errors
/// [Error::NotEnoughData] if the payload is too short.
pub fn identity(payload: &[u8]) -> Result<String> {
    if payload.len() < 2 {
        return Err(Error::NotEnoughData {
            actual: payload.len(),
            minimum: 2,
        });
    }
    let number = (u16::from(payload[0]) << 4) | (u16::from(payload[1]) >> 4);
    if number != IGS_SSR {
        return Ok(number.to_string());
    }
    if payload.len() < 3 {
        return Err(Error::NotEnoughData {
            actual: payload.len(),
            minimum: 3,
        });
    }
    let subtype = ((payload[1] & 0x01) << 7) | (payload[2] >> 1);
    Ok(format!("{number}_{subtype:03}"))
}

/// Schema driven message decoder.
///
/// # Example
/// ```
/// use rtcm::{Decoder, Value};
///
/// let frame = hex::decode("d300133ed000038a58d9493c872f34109d07d6af48205ad7f7").unwrap();
/// let msg = Decoder::default().parse(&frame).unwrap();
/// assert_eq!(msg.identity(), "1005");
/// assert_eq!(msg.get("DF025"), Some(&Value::Float(4444030.802800001)));
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    registry: Arc<Registry>,
    options: DecodeOptions,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(Registry::builtin())
    }
}

impl Decoder {
    /// Create a decoder using `registry` with default options.
    pub fn new(registry: Arc<Registry>) -> Self {
        Decoder {
            registry,
            options: DecodeOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Decode a complete frame, verifying its CRC first if enabled in the options.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if the frame is too short, [Error::Checksum] if the CRC is
    /// invalid, otherwise see [Decoder::decode].
    pub fn parse(&self, frame: &[u8]) -> Result<Message> {
        let minimum = HEADER_LEN + CRC_LEN;
        if frame.len() < minimum {
            return Err(Error::NotEnoughData {
                actual: frame.len(),
                minimum,
            });
        }
        let (body, trailer) = frame.split_at(frame.len() - CRC_LEN);
        if self.options.validate && crc::crc24q(frame) != 0 {
            return Err(Error::Checksum {
                expected: crc::crc24q(body),
                actual: u32::from_be_bytes([0, trailer[0], trailer[1], trailer[2]]),
            });
        }
        self.decode(&body[HEADER_LEN..])
    }

    /// Decode a message payload.
    ///
    /// A payload with no schema for its identity is not an error; the message is
    /// returned with only `DF002` set and [Message::is_unknown] true.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if the payload is too short for an identity, and
    /// [Error::Decode] if the payload does not match the schema.
    pub fn decode(&self, payload: &[u8]) -> Result<Message> {
        let identity = identity(payload)?;
        let Some(def) = self.registry.message(&identity) else {
            trace!(identity = %identity, "no schema for message type");
            let number = BitReader::new(payload).read(12)?;
            return Ok(Message::unknown(identity, payload.to_vec(), number));
        };

        let mut walk = Walk::new(&identity, &self.registry, &self.options, payload);
        walk.nodes(&def.nodes)?;
        let attributes = walk.finish();
        Ok(Message::new(identity, payload.to_vec(), attributes))
    }
}

/// Decode a complete frame using the built-in registry.
///
/// # Errors
/// See [Decoder::parse].
pub fn parse(frame: &[u8], options: &DecodeOptions) -> Result<Message> {
    Decoder::default().with_options(*options).parse(frame)
}

/// `name` suffixed with `_NN` for each non-zero group index.
pub(crate) fn suffixed(name: &str, index: &[usize]) -> String {
    let mut key = name.to_string();
    for i in index.iter().filter(|i| **i > 0) {
        key.push_str(&format!("_{i:02}"));
    }
    key
}

/// Sign extend a `width` bit two's complement value.
pub(crate) fn twos_complement(raw: u64, width: usize) -> i64 {
    if width == 0 || width > 64 {
        return 0;
    }
    let shift = 64 - width;
    ((raw << shift) as i64) >> shift
}

/// Decode a `width` bit sign-magnitude value, where the MSB is the sign.
pub(crate) fn sign_magnitude(raw: u64, width: usize) -> i64 {
    if width == 0 || width > 64 {
        return 0;
    }
    let msb = 1u64 << (width - 1);
    let magnitude = i64::try_from(raw & (msb - 1)).unwrap_or(i64::MAX);
    if raw & msb == 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// State for a single walk of a schema over a payload.
struct Walk<'a> {
    identity: &'a str,
    registry: &'a Registry,
    options: &'a DecodeOptions,
    bits: BitReader<'a>,
    // current 1-based index at each group nesting level
    index: Vec<usize>,
    attributes: Attributes,
    // code units of string fields, by un-suffixed name
    strings: HashMap<String, Vec<u8>>,
    masks: Masks,
    maps: Option<MsmMaps>,
}

impl<'a> Walk<'a> {
    fn new(
        identity: &'a str,
        registry: &'a Registry,
        options: &'a DecodeOptions,
        payload: &'a [u8],
    ) -> Self {
        Walk {
            identity,
            registry,
            options,
            bits: BitReader::new(payload),
            index: Vec::new(),
            attributes: Attributes::default(),
            strings: HashMap::new(),
            masks: Masks::default(),
            maps: None,
        }
    }

    fn error(&self, field: &str, reason: impl Into<String>) -> Error {
        Error::Decode {
            identity: self.identity.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn nodes(&mut self, nodes: &[SchemaNode]) -> Result<()> {
        for node in nodes {
            match node {
                SchemaNode::Field { name, def } => self.field(name, def)?,
                SchemaNode::Group { count, children } => {
                    let count = self.count(count)?;
                    self.index.push(0);
                    for i in 1..=count {
                        if let Some(level) = self.index.last_mut() {
                            *level = i;
                        }
                        self.nodes(children)?;
                    }
                    self.index.pop();
                }
                SchemaNode::Conditional {
                    field,
                    value,
                    children,
                } => {
                    if self.lookup(field)? == *value {
                        self.nodes(children)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Unsigned value of a previously decoded attribute.
    fn lookup(&self, name: &str) -> Result<u64> {
        match self.attributes.get(name) {
            Some(value) => value
                .as_u64()
                .ok_or_else(|| self.error(name, format!("{value} is not a count"))),
            None => Err(self.error(name, "referenced before it was decoded")),
        }
    }

    fn count(&self, count: &Count) -> Result<usize> {
        let (name, n) = match count {
            Count::Fixed(n) => return Ok(*n),
            Count::Field(name) => (name.clone(), self.lookup(name)?),
            Count::Indexed { field, levels } => {
                let outer = self.index.get(..*levels).ok_or_else(|| {
                    self.error(field, format!("count needs {levels} enclosing groups"))
                })?;
                let name = suffixed(field, outer);
                let n = self.lookup(&name)?;
                (name, n)
            }
            Count::FieldPlusOne(name) => (name.clone(), self.lookup(name)?.saturating_add(1)),
            Count::Harmonic(harmonic) => {
                let degree = self.lookup(&suffixed(&harmonic.degree, &self.index))?;
                let order = self.lookup(&suffixed(&harmonic.order, &self.index))?;
                return Ok(harmonic.count(degree, order));
            }
        };
        usize::try_from(n).map_err(|_| self.error(&name, format!("count {n} too large")))
    }

    fn read(&mut self, key: &str, width: usize) -> Result<u64> {
        self.bits
            .read(width)
            .map_err(|err| self.error(key, err.to_string()))
    }

    fn field(&mut self, name: &str, def: &FieldDef) -> Result<()> {
        let key = suffixed(name, &self.index);
        let value = match def.data_type {
            DataType::SatPrn => Value::Str(self.satellite(&key)?),
            DataType::CellPrn => Value::Str(self.cell(&key)?.0),
            DataType::CellSignal => Value::Str(self.cell(&key)?.1),
            DataType::Str => {
                let raw = self.read(&key, def.width)?;
                let units = self.strings.entry(name.to_string()).or_default();
                if raw != 0 {
                    units.push(raw.to_be_bytes()[7]);
                }
                if !self.attributes.contains(name) {
                    // replaced with the decoded string when the walk finishes
                    self.attributes
                        .insert(name.to_string(), Value::Str(String::new()));
                }
                return Ok(());
            }
            data_type => {
                let width = if data_type == DataType::CellMask {
                    self.cell_mask_width(&key)?
                } else {
                    def.width
                };
                let raw = self.read(&key, width)?;
                let value = self.scale(convert(data_type, raw, width), def);
                self.attributes.insert(key, value);
                return self.track_masks(name, raw);
            }
        };
        self.attributes.insert(key, value);
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn scale(&self, value: Value, def: &FieldDef) -> Value {
        if !self.options.scaling || !def.is_scaled() {
            return value;
        }
        match value {
            Value::Uint(v) => Value::Float(v as f64 * def.scale),
            Value::Int(v) => Value::Float(v as f64 * def.scale),
            value => value,
        }
    }

    fn cell_mask_width(&self, key: &str) -> Result<usize> {
        let nsat = self.lookup(NSAT)?;
        let nsig = self.lookup(NSIG)?;
        let width = nsat * nsig;
        if width > msm::MAX_CELLS as u64 {
            return Err(self.error(
                key,
                format!("{nsat} satellites x {nsig} signals exceeds {} cells", msm::MAX_CELLS),
            ));
        }
        Ok(usize::try_from(width).unwrap_or(msm::MAX_CELLS))
    }

    /// Record MSM masks and add the satellite, signal and cell counts. Resolves the
    /// satellite and cell maps once the cell mask is known.
    fn track_masks(&mut self, name: &str, raw: u64) -> Result<()> {
        match name {
            "DF394" => {
                self.masks.satellites = raw;
                self.attributes
                    .insert(NSAT.to_string(), Value::Uint(raw.count_ones().into()));
            }
            "DF395" => {
                self.masks.signals = u32::try_from(raw)
                    .map_err(|_| self.error(name, "signal mask exceeds 32 bits"))?;
                self.attributes
                    .insert(NSIG.to_string(), Value::Uint(raw.count_ones().into()));
            }
            "DF396" => {
                self.masks.cells = raw;
                self.attributes
                    .insert(NCELL.to_string(), Value::Uint(raw.count_ones().into()));
                self.maps = Some(msm::resolve(
                    self.registry,
                    self.identity,
                    &self.masks,
                    self.options.msm_label,
                )?);
            }
            _ => (),
        }
        Ok(())
    }

    fn maps(&self, key: &str) -> Result<(&MsmMaps, usize)> {
        let maps = self
            .maps
            .as_ref()
            .ok_or_else(|| self.error(key, "MSM masks have not been decoded"))?;
        let idx = self
            .index
            .first()
            .copied()
            .ok_or_else(|| self.error(key, "derived field outside of a group"))?;
        Ok((maps, idx))
    }

    fn satellite(&self, key: &str) -> Result<String> {
        let (maps, idx) = self.maps(key)?;
        maps.satellites
            .get(&idx)
            .cloned()
            .ok_or_else(|| self.error(key, format!("no satellite {idx}")))
    }

    fn cell(&self, key: &str) -> Result<(String, String)> {
        let (maps, idx) = self.maps(key)?;
        maps.cells
            .get(&idx)
            .cloned()
            .ok_or_else(|| self.error(key, format!("no cell {idx}")))
    }

    fn finish(mut self) -> Attributes {
        for (name, units) in self.strings {
            let s = String::from_utf8_lossy(&units).into_owned();
            self.attributes.insert(name, Value::Str(s));
        }
        self.attributes
    }
}

fn convert(data_type: DataType, raw: u64, width: usize) -> Value {
    match data_type {
        DataType::Int => Value::Int(twos_complement(raw, width)),
        DataType::SignMagnitude => Value::Int(sign_magnitude(raw, width)),
        DataType::Char => Value::Char(
            u32::try_from(raw)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER),
        ),
        _ => Value::Uint(raw),
    }
}
