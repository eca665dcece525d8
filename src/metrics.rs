use std::fmt;

/// Deduplication metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    unmapped_reads: usize,
    invalid_umi_reads: usize,
    duplicate_reads: usize,
    unique_reads: usize,
}

pub enum Status {
    Unmapped,
    InvalidUmi,
    Duplicate,
    Unique,
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "UNMAPPED_READS\tINVALID_UMI_READS\tDUPLICATE_READS\tUNIQUE_READS\tPERCENT_DUPLICATION"
        )?;
        writeln!(
            f,
            "{}\t{}\t{}\t{}\t{:.4}",
            self.unmapped_reads,
            self.invalid_umi_reads,
            self.duplicate_reads,
            self.unique_reads,
            self.percent_duplication()
        )
    }
}

impl Metrics {
    /// Fraction of evaluated reads (reads that reached the classifier) that
    /// were removed as duplicates.
    pub fn percent_duplication(&self) -> f32 {
        let evaluated = self.duplicate_reads + self.unique_reads;
        if evaluated == 0 {
            0.0
        } else {
            self.duplicate_reads as f32 / evaluated as f32
        }
    }

    /// Every non-header input line lands in exactly one counter.
    pub fn total_reads(&self) -> usize {
        self.unmapped_reads + self.invalid_umi_reads + self.duplicate_reads + self.unique_reads
    }

    pub fn count(&mut self, status: Status) {
        match status {
            Status::Unmapped => self.unmapped_reads += 1,
            Status::InvalidUmi => self.invalid_umi_reads += 1,
            Status::Duplicate => self.duplicate_reads += 1,
            Status::Unique => self.unique_reads += 1,
        }
    }
}
