//! Helpers for working with decoded messages and raw data outside of the decoder.
use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{NaiveTime, TimeDelta};

use crate::{
    decoder::{NCELL, NSAT},
    msm::{self, CellMap, Masks, MsmLabel, SatMap},
    schema::{harmonic_count, Constellation, FieldDef, HarmonicKind},
    Error, Message, Registry, Result, Value,
};

/// GPS - UTC offset in seconds, valid since 2017-01-01.
pub const LEAP_SECONDS: i64 = 18;

const MSM_SAT_FIELDS: [&str; 6] = ["PRN", "DF397", "DF398", "DF399", "DF419", "ExtSatInfo"];
const MSM_CELL_FIELDS: [&str; 12] = [
    "CELLPRN", "CELLSIG", "DF400", "DF401", "DF402", "DF403", "DF404", "DF405", "DF406",
    "DF407", "DF408", "DF420",
];

fn field_def(name: &str) -> Result<FieldDef> {
    Registry::builtin()
        .field(name)
        .cloned()
        .ok_or_else(|| Error::UnknownField {
            name: name.to_string(),
        })
}

/// Width in bits of a data field. Group index suffixes are ignored.
///
/// # Errors
/// [Error::UnknownField] if there is no such field.
pub fn field_size(name: &str) -> Result<usize> {
    Ok(field_def(name)?.width)
}

/// Scale factor of a data field, 1 if the field is not scaled.
///
/// # Errors
/// [Error::UnknownField] if there is no such field.
pub fn field_scale(name: &str) -> Result<f64> {
    let def = field_def(name)?;
    Ok(if def.is_scaled() { def.scale } else { 1.0 })
}

/// # Errors
/// [Error::UnknownField] if there is no such field.
pub fn field_description(name: &str) -> Result<String> {
    Ok(field_def(name)?.description)
}

/// Group indices of an attribute name, outermost first, e.g., `DF406_03` gives `[3]`
/// and `IDF039_01_06` gives `[1, 6]`. Ungrouped or malformed names give no indices.
#[must_use]
pub fn att2idx(name: &str) -> Vec<usize> {
    name.split('_')
        .skip(1)
        .map(str::parse::<usize>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap_or_default()
}

/// Attribute name without its group indices, e.g., `DF406_03` gives `DF406`.
#[must_use]
pub fn att2name(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

/// Hex table of `raw` with `cols` 2-byte columns per line, each line ending with the
/// bytes as an escaped literal.
///
/// ```
/// let table = rtcm::helpers::hextable(b"$GNGSA,A,3,34,23", 8);
/// assert_eq!(
///     table,
///     "000: 2447 4e47 5341 2c41 2c33 2c33 342c 3233  | b'$GNGSA,A,3,34,23' |\n"
/// );
/// ```
#[must_use]
pub fn hextable(raw: &[u8], cols: usize) -> String {
    let cols = cols.max(1);
    let mut table = String::new();
    for (i, line) in raw.chunks(cols * 2).enumerate() {
        let _ = write!(table, "{:03}: ", i * cols * 2);
        for col in 0..cols {
            let hex: String = line
                .iter()
                .skip(col * 2)
                .take(2)
                .map(|b| format!("{b:02x}"))
                .collect();
            let _ = write!(table, "{hex:<4} ");
        }
        let _ = writeln!(table, " | {} |", bytes_literal(line));
    }
    table
}

/// Printable ASCII as-is, everything else escaped.
fn bytes_literal(raw: &[u8]) -> String {
    let mut s = String::from("b'");
    for &b in raw {
        match b {
            b'\\' => s.push_str("\\\\"),
            b'\'' => s.push_str("\\'"),
            b'\t' => s.push_str("\\t"),
            b'\n' => s.push_str("\\n"),
            b'\r' => s.push_str("\\r"),
            0x20..=0x7e => s.push(char::from(b)),
            _ => {
                let _ = write!(s, "\\x{b:02x}");
            }
        }
    }
    s.push('\'');
    s
}

/// Every byte escaped, e.g., `b'\x68\x00'`.
#[must_use]
pub fn escape_all(raw: &[u8]) -> String {
    let mut s = String::from("b'");
    for b in raw {
        let _ = write!(s, "\\x{b:02x}");
    }
    s.push('\'');
    s
}

/// Constellation tables for an MSM message identity.
///
/// # Errors
/// [Error::NotAnMsmMessage] if there are no tables for `identity`.
pub fn id2prnsigmap(identity: &str) -> Result<Constellation> {
    Registry::builtin()
        .constellation(identity)
        .cloned()
        .ok_or_else(|| Error::NotAnMsmMessage {
            identity: identity.to_string(),
        })
}

/// GPS time of week in milliseconds to UTC time of day.
#[must_use]
pub fn tow2utc(tow: u32) -> NaiveTime {
    let delta = TimeDelta::milliseconds(i64::from(tow) - LEAP_SECONDS * 1000);
    NaiveTime::MIN.overflowing_add_signed(delta).0
}

fn missing(msg: &Message, field: &str) -> Error {
    Error::Decode {
        identity: msg.identity().to_string(),
        field: field.to_string(),
        reason: "attribute not present".to_string(),
    }
}

fn uint(msg: &Message, field: &str) -> Result<u64> {
    msg.get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| missing(msg, field))
}

fn masks(msg: &Message) -> Result<Masks> {
    if !msg.is_msm() {
        return Err(Error::NotAnMsmMessage {
            identity: msg.identity().to_string(),
        });
    }
    let signals = uint(msg, "DF395")?;
    Ok(Masks {
        satellites: uint(msg, "DF394")?,
        signals: u32::try_from(signals).map_err(|_| missing(msg, "DF395"))?,
        cells: uint(msg, "DF396")?,
    })
}

/// Satellite index to PRN map for a decoded MSM message, computed from its masks.
///
/// # Errors
/// [Error::NotAnMsmMessage] if `msg` is not an MSM message, [Error::Decode] if the mask
/// attributes are missing or inconsistent.
pub fn sat2prn(msg: &Message, label: MsmLabel) -> Result<SatMap> {
    let masks = masks(msg)?;
    Ok(msm::resolve(&Registry::builtin(), msg.identity(), &masks, label)?.satellites)
}

/// Cell index to `(PRN, signal)` map for a decoded MSM message, computed from its masks.
///
/// # Errors
/// See [sat2prn].
pub fn cell2prn(msg: &Message, label: MsmLabel) -> Result<CellMap> {
    let masks = masks(msg)?;
    Ok(msm::resolve(&Registry::builtin(), msg.identity(), &masks, label)?.cells)
}

/// Summary of an MSM message.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct MsmMeta {
    pub identity: String,
    /// Constellation name, e.g., `GPS`.
    pub gnss: String,
    pub station: u64,
    /// Constellation specific epoch time attribute.
    pub epoch: Option<Value>,
    pub sats: usize,
    pub cells: usize,
}

/// Per-satellite or per-cell attributes keyed by un-suffixed field name.
pub type MsmData = BTreeMap<String, Value>;

/// Split an MSM message into per-satellite and per-cell data.
///
/// ```
/// use rtcm::{helpers::parse_msm, Decoder};
///
/// let dat = std::fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/1077.bin"))?;
/// let msg = Decoder::default().parse(&dat)?;
/// let (meta, sats, cells) = parse_msm(&msg)?;
/// assert_eq!(meta.gnss, "GPS");
/// assert_eq!(sats.len(), 10);
/// assert_eq!(cells[0]["CELLSIG"].as_str(), Some("1C"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
/// [Error::NotAnMsmMessage] if `msg` is not an MSM message, [Error::Decode] if the
/// satellite or cell count is missing.
pub fn parse_msm(msg: &Message) -> Result<(MsmMeta, Vec<MsmData>, Vec<MsmData>)> {
    let constellation = if msg.is_msm() {
        id2prnsigmap(msg.identity())?
    } else {
        return Err(Error::NotAnMsmMessage {
            identity: msg.identity().to_string(),
        });
    };
    let nsat = usize::try_from(uint(msg, NSAT)?).unwrap_or_default();
    let ncell = usize::try_from(uint(msg, NCELL)?).unwrap_or_default();

    let meta = MsmMeta {
        identity: msg.identity().to_string(),
        gnss: constellation.name.clone(),
        station: uint(msg, "DF003")?,
        epoch: msg.get(&constellation.epoch).cloned(),
        sats: nsat,
        cells: ncell,
    };
    let sats = (1..=nsat).map(|i| collect(msg, &MSM_SAT_FIELDS, i)).collect();
    let cells = (1..=ncell).map(|i| collect(msg, &MSM_CELL_FIELDS, i)).collect();
    Ok((meta, sats, cells))
}

fn collect(msg: &Message, fields: &[&str], idx: usize) -> MsmData {
    fields
        .iter()
        .filter_map(|name| {
            msg.get(&format!("{name}_{idx:02}"))
                .map(|v| ((*name).to_string(), v.clone()))
        })
        .collect()
}

/// One layer of an IGS SSR ionosphere spherical harmonics message.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct IonosphereLayer {
    /// Layer height in km.
    pub height: f64,
    pub cosine: Vec<f64>,
    pub sine: Vec<f64>,
}

/// Coefficients of a `4076_201` message, one entry per ionospheric layer.
///
/// # Errors
/// [Error::Decode] if `msg` is not a `4076_201` message or an expected attribute is not
/// present.
pub fn parse_harmonics(msg: &Message) -> Result<Vec<IonosphereLayer>> {
    if msg.identity() != "4076_201" {
        return Err(Error::Decode {
            identity: msg.identity().to_string(),
            field: "IDF002".to_string(),
            reason: "not an ionosphere spherical harmonics message".to_string(),
        });
    }
    let float = |name: String| -> Result<f64> {
        msg.get(&name)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(msg, &name))
    };

    let layers = uint(msg, "IDF035")? + 1;
    let mut zult = Vec::new();
    for layer in 1..=layers {
        let degree = uint(msg, &format!("IDF037_{layer:02}"))?;
        let order = uint(msg, &format!("IDF038_{layer:02}"))?;
        let coefficients = |field: &str, kind: HarmonicKind| -> Result<Vec<f64>> {
            (1..=harmonic_count(kind, degree, order))
                .map(|i| float(format!("{field}_{layer:02}_{i:02}")))
                .collect()
        };
        zult.push(IonosphereLayer {
            height: float(format!("IDF036_{layer:02}"))?,
            cosine: coefficients("IDF039", HarmonicKind::Cosine)?,
            sine: coefficients("IDF040", HarmonicKind::Sine)?,
        });
    }
    Ok(zult)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{encoder::PayloadBuilder, Decoder};

    #[test_case("DF025", 38, 0.0001)]
    #[test_case("DF405_03", 20, 1.862_645_149_230_957e-9)]
    #[test_case("DF002", 12, 1.0)]
    fn field_lookups(name: &str, size: usize, scale: f64) {
        assert_eq!(field_size(name).unwrap(), size);
        assert!((field_scale(name).unwrap() - scale).abs() < f64::EPSILON);
    }

    #[test]
    fn field_description_lookup() {
        assert_eq!(field_description("DF002").unwrap(), "Message Number");
        assert!(matches!(
            field_description("DF9999"),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test_case("DF389_06", &[6])]
    #[test_case("DF406_103", &[103])]
    #[test_case("IDF039_01_06", &[1, 6])]
    #[test_case("DF002", &[])]
    #[test_case("DF002_x", &[])]
    fn att2idx_cases(name: &str, expected: &[usize]) {
        assert_eq!(att2idx(name), expected);
    }

    #[test]
    fn att2name_cases() {
        assert_eq!(att2name("DF406_103"), "DF406");
        assert_eq!(att2name("IDF039_01_06"), "IDF039");
        assert_eq!(att2name("DF002"), "DF002");
    }

    #[test]
    fn hextable_partial_lines() {
        let raw = b"$GNGSA,A,3,34,23,\x00\xff\xd3abc";
        assert_eq!(
            hextable(raw, 4),
            "000: 2447 4e47 5341 2c41  | b'$GNGSA,A' |\n\
             008: 2c33 2c33 342c 3233  | b',3,34,23' |\n\
             016: 2c00 ffd3 6162 63    | b',\\x00\\xff\\xd3abc' |\n"
        );
        assert_eq!(hextable(&[], 8), "");
    }

    #[test]
    fn escape_all_bytes() {
        assert_eq!(escape_all(b"h\x00\xffA"), "b'\\x68\\x00\\xff\\x41'");
    }

    #[test_case(387_092_000, "11:31:14")]
    #[test_case(18_000, "00:00:00")]
    #[test_case(10_000, "23:59:52")]
    #[test_case(18_500, "00:00:00.500")]
    fn tow_to_utc(tow: u32, expected: &str) {
        let expected: NaiveTime = expected.parse().unwrap();
        assert_eq!(tow2utc(tow), expected);
    }

    #[test]
    fn constellation_tables() {
        let gps = id2prnsigmap("1077").unwrap();
        assert_eq!(gps.name, "GPS");
        assert_eq!(gps.prn(5), Some("005"));
        assert!(matches!(
            id2prnsigmap("1005"),
            Err(Error::NotAnMsmMessage { .. })
        ));
    }

    #[test]
    fn msm_helpers_reject_other_messages() {
        let msg = Decoder::default()
            .decode(&[0x3e, 0xf4, 0xd2, 0x03, 0x41, 0x42, 0x43, 0xea])
            .unwrap();
        assert!(matches!(
            sat2prn(&msg, MsmLabel::Rinex),
            Err(Error::NotAnMsmMessage { .. })
        ));
        assert!(matches!(parse_msm(&msg), Err(Error::NotAnMsmMessage { .. })));
        assert!(matches!(parse_harmonics(&msg), Err(Error::Decode { .. })));
    }

    fn harmonics_payload() -> Vec<u8> {
        let mut builder = PayloadBuilder::default();
        for (name, value) in [
            ("DF002", 4076),
            ("IDF001", 0),
            ("IDF002", 201),
            ("IDF003", 1000),
            ("IDF004", 0),
            ("IDF005", 0),
            ("IDF007", 0),
            ("IDF008", 0),
            ("IDF009", 0),
            ("IDF041", 10),
            ("IDF035", 1),
        ] {
            builder.field(name, value).unwrap();
        }
        // degree 2, order 2: 6 cosine and 3 sine
        for (name, value) in [("IDF036", 45), ("IDF037", 1), ("IDF038", 1)] {
            builder.field(name, value).unwrap();
        }
        for i in 1..=9 {
            builder.field("IDF039", i).unwrap();
        }
        // degree 3, order 1: 7 cosine and 3 sine
        for (name, value) in [("IDF036", 50), ("IDF037", 2), ("IDF038", 0)] {
            builder.field(name, value).unwrap();
        }
        for i in 1..=10 {
            builder.field("IDF039", -i).unwrap();
        }
        builder.finish()
    }

    #[test]
    fn harmonics_by_layer() {
        let msg = Decoder::default().decode(&harmonics_payload()).unwrap();
        let layers = parse_harmonics(&msg).unwrap();

        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].height, 450.0);
        assert_eq!(layers[0].cosine.len(), 6);
        assert_eq!(layers[0].sine.len(), 3);
        assert_eq!(layers[0].sine[0], 7.0 * 0.005);

        assert_eq!(layers[1].height, 500.0);
        assert_eq!(layers[1].cosine.len(), 7);
        assert_eq!(layers[1].sine.len(), 3);
        assert_eq!(layers[1].cosine[0], -1.0 * 0.005);
        assert_eq!(layers[1].sine[2], -10.0 * 0.005);
    }
}
