use std::fmt;

use thiserror::Error;

use crate::cigar::{self, Kind, Op};

const FLAG: usize = 1;
const RNAME: usize = 2;
const POS: usize = 3;
const MAPQ: usize = 4;
const CIGAR: usize = 5;

/// Tag carrying the pre-correction position of a normalized record.
const SAVED_POS_TAG: &str = "OP:i:";

/// Mapping quality value meaning "not available".
pub const UNKNOWN_MAPQ: u8 = 255;

/// SAM FLAG bits relevant to single-end deduplication.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Flags(u16);

impl From<u16> for Flags {
    fn from(bits: u16) -> Flags {
        Flags(bits)
    }
}

impl Flags {
    pub fn is_unmapped(self) -> bool {
        self.0 & 0x4 != 0
    }

    pub fn is_reverse_complemented(self) -> bool {
        self.0 & 0x10 != 0
    }
}

/// A single alignment line split on tabs.
///
/// The UMI is taken from the read name at parse time and cached next to the
/// fields. The position field can be rewritten with the clip/strand corrected
/// start and restored later: the original value lives in `saved_pos` while
/// the record is normalized and is serialized as a trailing `OP:i:` tag.
/// A record holds at most one saved position.
#[derive(Clone, Debug)]
pub struct SamRecord {
    fields: Vec<String>,
    flags: Flags,
    pos: i64,
    mapq: u8,
    umi: String,
    saved_pos: Option<String>,
}

impl SamRecord {
    /// Parse a non-header alignment line.
    ///
    /// A trailing `OP:i:` tag (the intermediate form written by a separate
    /// position-adjusting pass) is popped back into the saved position, so
    /// pre-adjusted input restores just like records normalized in-stream.
    pub fn parse(line: &str) -> Result<SamRecord, RecordError> {
        let mut fields: Vec<String> = line.split('\t').map(String::from).collect();
        if fields.len() < 6 {
            return Err(RecordError::Truncated(fields.len()));
        }

        let saved_pos = match fields.last() {
            Some(f) if f.starts_with(SAVED_POS_TAG) => fields
                .pop()
                .map(|f| f[SAVED_POS_TAG.len()..].to_string()),
            _ => None,
        };

        let flags = parse_int::<u16>(&fields[FLAG], "FLAG")?.into();
        let pos = parse_int::<i64>(&fields[POS], "POS")?;
        let mapq = parse_int::<u8>(&fields[MAPQ], "MAPQ")?;
        let umi = fields[0]
            .rsplit(':')
            .next()
            .map(str::to_string)
            .unwrap_or_default();

        Ok(SamRecord {
            fields,
            flags,
            pos,
            mapq,
            umi,
            saved_pos,
        })
    }

    pub fn name(&self) -> &str {
        &self.fields[0]
    }

    /// Molecular barcode: the part of the read name after the last colon,
    /// or the whole name when it contains none.
    pub fn umi(&self) -> &str {
        &self.umi
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn reference_name(&self) -> &str {
        &self.fields[RNAME]
    }

    /// 1-based leftmost position; the corrected start once normalized.
    pub fn position(&self) -> i64 {
        self.pos
    }

    pub fn mapping_quality(&self) -> u8 {
        self.mapq
    }

    pub fn cigar(&self) -> &str {
        &self.fields[CIGAR]
    }

    pub fn is_normalized(&self) -> bool {
        self.saved_pos.is_some()
    }

    /// Rewrite the position field with the clip/strand corrected fragment
    /// start, keeping the original value for [`restore_position`].
    ///
    /// Fails when the operation string yields no operations (`*` and the
    /// like); such a record cannot be placed on the reference.
    ///
    /// [`restore_position`]: SamRecord::restore_position
    pub fn normalize_position(&mut self) -> Result<(), RecordError> {
        let ops = cigar::parse(self.cigar());
        let corrected = corrected_start(self.pos, self.flags.is_reverse_complemented(), &ops)
            .ok_or_else(|| RecordError::MissingOperations(self.name().to_string()))?;

        self.saved_pos = Some(std::mem::replace(
            &mut self.fields[POS],
            corrected.to_string(),
        ));
        self.pos = corrected;
        Ok(())
    }

    /// Put the saved original position back into the position field and drop
    /// the restoration tag. No-op on a record that was never normalized.
    pub fn restore_position(&mut self) {
        if let Some(original) = self.saved_pos.take() {
            self.fields[POS] = original;
        }
    }
}

impl fmt::Display for SamRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = self.fields.iter();
        if let Some(first) = fields.next() {
            f.write_str(first)?;
        }
        for field in fields {
            write!(f, "\t{}", field)?;
        }
        if let Some(saved) = &self.saved_pos {
            write!(f, "\t{}{}", SAVED_POS_TAG, saved)?;
        }
        Ok(())
    }
}

/// Clip and strand corrected start coordinate of the sequenced fragment.
///
/// A leading hard clip never occupies reference space and is dropped first.
/// On the reverse strand the biological start is the alignment end: a leading
/// soft clip sits at the far end of the template and is dropped, and the
/// remaining reference-consuming lengths (soft clips included) are added to
/// the position, minus one for the closed end coordinate. On the forward
/// strand a leading soft clip shifts the start left of the recorded position.
///
/// Returns `None` for an empty operation sequence.
pub fn corrected_start(pos: i64, reverse: bool, ops: &[Op]) -> Option<i64> {
    let mut ops = ops;
    if ops.first()?.kind() == Kind::HardClip {
        ops = &ops[1..];
    }

    if reverse {
        if ops.first()?.kind() == Kind::SoftClip {
            ops = &ops[1..];
        }
        let span: i64 = ops
            .iter()
            .filter(|op| op.kind().consumes_reference() || op.kind() == Kind::SoftClip)
            .map(|op| i64::from(op.len()))
            .sum();
        Some(pos + span - 1)
    } else {
        let first = ops.first()?;
        if first.kind() == Kind::SoftClip {
            Some(pos - i64::from(first.len()))
        } else {
            Some(pos)
        }
    }
}

fn parse_int<N: lexical_core::FromLexical>(
    value: &str,
    field: &'static str,
) -> Result<N, RecordError> {
    lexical_core::parse(value.as_bytes()).map_err(|_| RecordError::InvalidField {
        field,
        value: value.to_string(),
    })
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("truncated alignment line: expected at least 6 fields, found {0}")]
    Truncated(usize),
    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("no alignment operations in record {0}")]
    MissingOperations(String),
}
