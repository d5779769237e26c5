use serde::Deserialize;

/// Basic type of a data field, determining how raw bits are converted to a [Value].
///
/// [Value]: crate::Value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DataType {
    /// Bit field, decoded as unsigned.
    #[serde(rename = "BIT")]
    Bit,
    /// MSM cell mask; width is the product of the active satellite and signal counts.
    #[serde(rename = "BITX")]
    CellMask,
    /// Single character.
    #[serde(rename = "CHA")]
    Char,
    /// Two's complement signed integer.
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "UINT")]
    Uint,
    /// Sign-magnitude integer; the MSB is the sign.
    #[serde(rename = "INTS")]
    SignMagnitude,
    /// UTF-8 code unit accumulated into a string attribute.
    #[serde(rename = "STR")]
    Str,
    /// Derived satellite PRN; not present in the bit stream.
    #[serde(rename = "PRN")]
    SatPrn,
    /// Derived cell PRN; not present in the bit stream.
    #[serde(rename = "CPR")]
    CellPrn,
    /// Derived cell signal code; not present in the bit stream.
    #[serde(rename = "CSG")]
    CellSignal,
}

impl DataType {
    /// True for the types whose values come from the MSM satellite and cell maps rather
    /// than from payload bits.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::SatPrn | Self::CellPrn | Self::CellSignal)
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Int | Self::SignMagnitude)
    }
}

#[derive(Deserialize)]
struct RawFieldDef(DataType, usize, f64, String);

/// Definition of a single data field.
///
/// In schema data a field definition is the array `[type, width, scale, description]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawFieldDef")]
pub struct FieldDef {
    pub data_type: DataType,
    /// Width in bits. 0 for derived fields and for the variable width cell mask.
    pub width: usize,
    /// Scale factor, where 0 and 1 both mean unscaled.
    pub scale: f64,
    pub description: String,
}

impl From<RawFieldDef> for FieldDef {
    fn from(raw: RawFieldDef) -> Self {
        FieldDef {
            data_type: raw.0,
            width: raw.1,
            scale: raw.2,
            description: raw.3,
        }
    }
}

impl FieldDef {
    #[must_use]
    pub fn is_scaled(&self) -> bool {
        self.scale != 0.0 && self.scale != 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_from_array() {
        let def: FieldDef = serde_json::from_str(r#"["INT", 38, 0.0001, "Antenna Ref. Point, ECEF-X"]"#)
            .unwrap();
        assert_eq!(def.data_type, DataType::Int);
        assert_eq!(def.width, 38);
        assert!(def.is_scaled());
        assert_eq!(def.description, "Antenna Ref. Point, ECEF-X");
    }

    #[test]
    fn integer_scales_are_unscaled() {
        for scale in [0, 1] {
            let def: FieldDef =
                serde_json::from_str(&format!(r#"["UINT", 12, {scale}, "x"]"#)).unwrap();
            assert!(!def.is_scaled(), "scale {scale}");
        }
    }

    #[test]
    fn derived_types() {
        let types: Vec<DataType> =
            serde_json::from_str(r#"["PRN", "CPR", "CSG", "BITX", "STR"]"#).unwrap();
        let derived: Vec<bool> = types.iter().map(DataType::is_derived).collect();
        assert_eq!(derived, [true, true, true, false, false]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let zult: Result<FieldDef, _> = serde_json::from_str(r#"["FLOAT", 12, 0, "x"]"#);
        assert!(zult.is_err());
    }
}
