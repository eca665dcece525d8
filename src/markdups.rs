use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;
use thiserror::Error;

use crate::record::{SamRecord, UNKNOWN_MAPQ};

/// Which record of a duplicate group survives.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum KeepMode {
    /// Keep the first record seen in sorted order.
    #[default]
    First,
    /// Keep the last record seen.
    Last,
    /// Keep the record with the highest known mapping quality.
    Best,
}

impl FromStr for KeepMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<KeepMode, ModeError> {
        match s {
            "first" => Ok(KeepMode::First),
            "last" => Ok(KeepMode::Last),
            "best" => Ok(KeepMode::Best),
            _ => Err(ModeError::Invalid(s.to_string())),
        }
    }
}

impl fmt::Display for KeepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeepMode::First => f.write_str("first"),
            KeepMode::Last => f.write_str("last"),
            KeepMode::Best => f.write_str("best"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModeError {
    #[error("invalid keep mode {0:?}, expected first, last or best")]
    Invalid(String),
}

/// Outcome of offering a record to the classifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordStatus {
    /// The record opened a new duplicate group.
    Unique,
    /// The record merged into an existing group.
    Duplicate,
}

/// Grouping identity within one position stretch.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct DupKey {
    umi: String,
    reverse: bool,
}

impl DupKey {
    fn from_record(record: &SamRecord) -> DupKey {
        DupKey {
            umi: record.umi().to_string(),
            reverse: record.flags().is_reverse_complemented(),
        }
    }
}

/// Survivors for the current (reference, corrected position) stretch.
///
/// Records are stored in arrival order and `groups` maps the (UMI, strand)
/// identity of each duplicate group to its slot. Relies on the input being
/// sorted by chromosome and position: the whole stretch is flushed as soon as
/// a record with a different sorting context arrives, so memory is bounded by
/// the number of distinct keys sharing one exact position.
pub struct PositionGroups {
    keep: KeepMode,
    reference: String,
    position: i64,
    held: Vec<SamRecord>,
    groups: AHashMap<DupKey, usize>,
}

impl PositionGroups {
    pub fn new(keep: KeepMode) -> PositionGroups {
        PositionGroups {
            keep,
            reference: String::new(),
            position: 0,
            held: Vec::new(),
            groups: AHashMap::new(),
        }
    }

    /// True when `record` continues the current position stretch. Only
    /// meaningful while records are held.
    fn same_context(&self, record: &SamRecord) -> bool {
        self.reference == record.reference_name() && self.position == record.position()
    }

    /// Offer a record to the classifier.
    ///
    /// When the record leaves the current sorting context the held stretch is
    /// flushed first; the returned records are survivors ready for output, in
    /// the order their groups were opened. The record itself is always
    /// retained, either as a fresh group or merged into its group under the
    /// retention policy.
    pub fn insert(&mut self, record: SamRecord) -> (RecordStatus, Vec<SamRecord>) {
        let mut flushed = Vec::new();
        if !self.held.is_empty() && !self.same_context(&record) {
            flushed = self.flush();
        }

        if self.held.is_empty() {
            self.reference = record.reference_name().to_string();
            self.position = record.position();
        }

        let key = DupKey::from_record(&record);
        let status = match self.groups.get(&key) {
            Some(&slot) => {
                self.resolve(slot, record);
                RecordStatus::Duplicate
            }
            None => {
                self.groups.insert(key, self.held.len());
                self.held.push(record);
                RecordStatus::Unique
            }
        };

        (status, flushed)
    }

    /// Apply the retention policy to the held survivor of a group and an
    /// incoming duplicate.
    ///
    /// In `best` mode the incoming record wins only with a known quality
    /// strictly above the held one. An unknown quality (255) compares as a
    /// plain integer on the held side, so a held 255 is never displaced.
    fn resolve(&mut self, slot: usize, incoming: SamRecord) {
        match self.keep {
            KeepMode::First => {}
            KeepMode::Last => self.held[slot] = incoming,
            KeepMode::Best => {
                if incoming.mapping_quality() != UNKNOWN_MAPQ
                    && incoming.mapping_quality() > self.held[slot].mapping_quality()
                {
                    self.held[slot] = incoming;
                }
            }
        }
    }

    /// Drain the survivors of the current stretch in arrival order.
    pub fn flush(&mut self) -> Vec<SamRecord> {
        self.groups.clear();
        std::mem::take(&mut self.held)
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}
