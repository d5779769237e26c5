//! Multiple Signal Message (MSM) satellite, signal and cell resolution.
//!
//! MSM messages identify their content with three masks: a 64-bit satellite mask, a
//! 32-bit signal mask and a cell mask with one bit per (satellite, signal) pair. The
//! masks are resolved into 1-based index maps used to label the per-satellite and
//! per-cell data in the message.
use std::collections::BTreeMap;

use crate::{schema::Constellation, Error, Registry, Result};

/// Label used for unknown or reserved satellite and signal positions.
pub const NOT_AVAILABLE: &str = "N/A";

/// Maximum number of cells in an MSM message.
pub const MAX_CELLS: usize = 64;

/// How MSM signals are labelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MsmLabel {
    /// Raw 1-based signal mask bit position.
    None,
    /// RINEX observation code, e.g., `1C`.
    #[default]
    Rinex,
    /// Frequency band, e.g., `L1`.
    Band,
}

/// 1-based satellite index to PRN.
pub type SatMap = BTreeMap<usize, String>;
/// 1-based cell index to `(PRN, signal)`.
pub type CellMap = BTreeMap<usize, (String, String)>;

/// Raw MSM mask values, as decoded from DF394, DF395 and DF396.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Masks {
    pub satellites: u64,
    pub signals: u32,
    /// Cell mask; the low `num_satellites() * num_signals()` bits are used.
    pub cells: u64,
}

impl Masks {
    #[must_use]
    pub fn num_satellites(&self) -> usize {
        self.satellites.count_ones() as usize
    }

    #[must_use]
    pub fn num_signals(&self) -> usize {
        self.signals.count_ones() as usize
    }

    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.cells.count_ones() as usize
    }
}

/// Resolved index maps for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsmMaps {
    pub satellites: SatMap,
    pub cells: CellMap,
}

/// Resolve the masks of MSM message `identity` to satellite and cell maps.
///
/// Satellite and signal mask bits are walked MSB first, i.e., bit position 1 is the
/// most significant bit. The cell mask is a row-major grid with one row per active
/// satellite and one column per active signal.
///
/// # Errors
/// [Error::NotAnMsmMessage] if `identity` has no constellation tables, and
/// [Error::Decode] if the cell grid is larger than 64 bits or the cell mask has bits
/// set outside of the grid. The decoder reads exactly one grid width of cell mask, so
/// the latter only applies to masks supplied by the caller.
pub fn resolve(
    registry: &Registry,
    identity: &str,
    masks: &Masks,
    label: MsmLabel,
) -> Result<MsmMaps> {
    let constellation =
        registry
            .constellation(identity)
            .ok_or_else(|| Error::NotAnMsmMessage {
                identity: identity.to_string(),
            })?;
    resolve_with(constellation, identity, masks, label)
}

pub(crate) fn resolve_with(
    constellation: &Constellation,
    identity: &str,
    masks: &Masks,
    label: MsmLabel,
) -> Result<MsmMaps> {
    let sats: Vec<String> = (1..=64u8)
        .filter(|bit| masks.satellites >> (64 - bit) & 1 == 1)
        .map(|bit| constellation.prn(bit).unwrap_or(NOT_AVAILABLE).to_string())
        .collect();
    let sigs: Vec<String> = (1..=32u8)
        .filter(|bit| masks.signals >> (32 - bit) & 1 == 1)
        .map(|bit| signal_label(constellation, bit, label))
        .collect();

    let ncells = sats.len() * sigs.len();
    if ncells > MAX_CELLS {
        return Err(Error::Decode {
            identity: identity.to_string(),
            field: "DF396".to_string(),
            reason: format!(
                "{} satellites x {} signals exceeds {MAX_CELLS} cells",
                sats.len(),
                sigs.len()
            ),
        });
    }

    let mut cells = CellMap::new();
    let mut idx = 0;
    for sat in &sats {
        for sig in &sigs {
            idx += 1;
            if masks.cells >> (ncells - idx) & 1 == 1 {
                cells.insert(cells.len() + 1, (sat.clone(), sig.clone()));
            }
        }
    }
    if cells.len() != masks.num_cells() {
        return Err(Error::Decode {
            identity: identity.to_string(),
            field: "DF396".to_string(),
            reason: format!(
                "cell mask has {} bits set but the {ncells} cell grid resolves {} cells",
                masks.num_cells(),
                cells.len()
            ),
        });
    }

    let satellites = sats
        .into_iter()
        .enumerate()
        .map(|(i, prn)| (i + 1, prn))
        .collect();

    Ok(MsmMaps { satellites, cells })
}

fn signal_label(constellation: &Constellation, bit: u8, label: MsmLabel) -> String {
    match (label, constellation.signal(bit)) {
        (MsmLabel::None, _) => bit.to_string(),
        (MsmLabel::Rinex, Some((_, rinex))) => rinex.to_string(),
        (MsmLabel::Band, Some((band, _))) => band.to_string(),
        (_, None) => NOT_AVAILABLE.to_string(),
    }
}
