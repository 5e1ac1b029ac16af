//! Reference mass populations used as calibration priors.

use std::fs;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;

use bincode::{Decode, Encode};

use crate::CalibrationError;

/// One reference mass with its prior weight.
#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MassEntry {
    pub mass: f64,
    pub weight: f64,
}

impl MassEntry {
    pub fn new(mass: f64, weight: f64) -> Self {
        Self { mass, weight }
    }
}

impl From<f64> for MassEntry {
    fn from(mass: f64) -> Self {
        Self::new(mass, 1.0)
    }
}

/// A read-only population of reference masses sorted ascending, with
/// indexed access and inclusive range queries.
pub trait MassDatabase {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entry at `index`, or
    /// [`IndexOutOfRange`](CalibrationError::IndexOutOfRange).
    fn entry(&self, index: usize) -> Result<MassEntry, CalibrationError>;

    /// All entries with mass in `[mass_low, mass_high]`.
    fn range(&self, mass_low: f64, mass_high: f64) -> &[MassEntry];
}

fn entry_at(entries: &[MassEntry], index: usize) -> Result<MassEntry, CalibrationError> {
    entries
        .get(index)
        .copied()
        .ok_or(CalibrationError::IndexOutOfRange {
            index,
            len: entries.len(),
        })
}

fn range_of(entries: &[MassEntry], mass_low: f64, mass_high: f64) -> &[MassEntry] {
    let start = entries.partition_point(|e| e.mass < mass_low);
    let end = entries.partition_point(|e| e.mass <= mass_high);
    &entries[start..end]
}

/// Synthetic database of consecutive integer masses with unit weight,
/// for tests and trials.
#[derive(Debug, Clone)]
pub struct IntegerMassDatabase {
    entries: Vec<MassEntry>,
}

impl IntegerMassDatabase {
    /// Masses `low..=high`, weight 1.
    pub fn new(low: u32, high: u32) -> Self {
        Self {
            entries: (low..=high).map(|m| MassEntry::from(m as f64)).collect(),
        }
    }
}

impl Default for IntegerMassDatabase {
    fn default() -> Self {
        Self::new(100, 2200)
    }
}

impl MassDatabase for IntegerMassDatabase {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, index: usize) -> Result<MassEntry, CalibrationError> {
        entry_at(&self.entries, index)
    }

    fn range(&self, mass_low: f64, mass_high: f64) -> &[MassEntry] {
        range_of(&self.entries, mass_low, mass_high)
    }
}

/// Masses read from a plain-text listing, one per line, unit weight.
/// Blank and non-numeric lines are skipped.
#[derive(Debug, Clone)]
pub struct TextMassDatabase {
    entries: Vec<MassEntry>,
}

impl TextMassDatabase {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        Self::from_reader(BufReader::new(fs::File::open(path)?))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self, CalibrationError> {
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if let Ok(mass) = line.trim().parse::<f64>() {
                entries.push(MassEntry::from(mass));
            }
        }
        entries.sort_by(|a, b| a.mass.total_cmp(&b.mass));
        Ok(Self { entries })
    }
}

impl MassDatabase for TextMassDatabase {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, index: usize) -> Result<MassEntry, CalibrationError> {
        entry_at(&self.entries, index)
    }

    fn range(&self, mass_low: f64, mass_high: f64) -> &[MassEntry] {
        range_of(&self.entries, mass_low, mass_high)
    }
}

/// One peptide record: a monoisotopic mass and its abundance.
#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeptideRecord {
    pub mass: f64,
    pub abundance: f64,
}

impl PeptideRecord {
    pub fn new(mass: f64, abundance: f64) -> Self {
        Self { mass, abundance }
    }
}

/// Peptide records sorted by mass; the prior weight of each entry is
/// the record's abundance.
#[derive(Debug, Clone)]
pub struct PeptideMassDatabase {
    entries: Vec<MassEntry>,
}

impl PeptideMassDatabase {
    pub fn from_records(records: impl IntoIterator<Item = PeptideRecord>) -> Self {
        let mut entries: Vec<MassEntry> = records
            .into_iter()
            .map(|r| MassEntry::new(r.mass, r.abundance))
            .collect();
        entries.sort_by(|a, b| a.mass.total_cmp(&b.mass));
        Self { entries }
    }

    /// Load a binary record file written by [`Self::write_records`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let mut reader = BufReader::new(fs::File::open(path)?);
        let records: Vec<PeptideRecord> =
            bincode::decode_from_std_read(&mut reader, bincode::config::standard())?;
        Ok(Self::from_records(records))
    }

    /// Persist records as a binary file readable by
    /// [`Self::from_path`].
    pub fn write_records(
        path: impl AsRef<Path>,
        records: &[PeptideRecord],
    ) -> Result<(), CalibrationError> {
        let mut writer = BufWriter::new(fs::File::create(path)?);
        bincode::encode_into_std_write(records, &mut writer, bincode::config::standard())?;
        Ok(())
    }
}

impl MassDatabase for PeptideMassDatabase {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, index: usize) -> Result<MassEntry, CalibrationError> {
        entry_at(&self.entries, index)
    }

    fn range(&self, mass_low: f64, mass_high: f64) -> &[MassEntry] {
        range_of(&self.entries, mass_low, mass_high)
    }
}
