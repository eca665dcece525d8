use smallvec::SmallVec;

/// A CIGAR operation kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    Match,
    Insertion,
    Deletion,
    Skip,
    SoftClip,
    HardClip,
    Pad,
    SequenceMatch,
    SequenceMismatch,
}

impl Kind {
    pub fn from_byte(b: u8) -> Option<Kind> {
        match b {
            b'M' => Some(Kind::Match),
            b'I' => Some(Kind::Insertion),
            b'D' => Some(Kind::Deletion),
            b'N' => Some(Kind::Skip),
            b'S' => Some(Kind::SoftClip),
            b'H' => Some(Kind::HardClip),
            b'P' => Some(Kind::Pad),
            b'=' => Some(Kind::SequenceMatch),
            b'X' => Some(Kind::SequenceMismatch),
            _ => None,
        }
    }

    /// Operations that advance the reference coordinate.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            Kind::Match | Kind::Deletion | Kind::Skip | Kind::SequenceMatch | Kind::SequenceMismatch
        )
    }
}

/// A single `<length><kind>` unit of an operation string.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Op {
    kind: Kind,
    len: u32,
}

impl Op {
    pub fn new(kind: Kind, len: u32) -> Op {
        Op { kind, len }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn len(&self) -> u32 {
        self.len
    }
}

/// Parsed operation sequence. Most alignments fit a handful of operations.
pub type Ops = SmallVec<[Op; 6]>;

/// Extract the `<length><op>` units from a run-length operation string.
///
/// The scan is lenient: bytes that do not complete a digits-then-letter unit
/// reset the pending length and are skipped, so `*` or otherwise
/// non-conforming input yields an empty sequence. Callers that require at
/// least one operation fail downstream.
pub fn parse(cigar: &str) -> Ops {
    let mut ops = Ops::new();
    let mut len: u32 = 0;
    let mut pending = false;

    for b in cigar.bytes() {
        if b.is_ascii_digit() {
            len = len.saturating_mul(10).saturating_add(u32::from(b - b'0'));
            pending = true;
        } else {
            if pending {
                if let Some(kind) = Kind::from_byte(b) {
                    ops.push(Op::new(kind, len));
                }
            }
            len = 0;
            pending = false;
        }
    }

    ops
}
