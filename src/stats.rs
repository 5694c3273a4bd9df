/// Run statistics tracking and reporting
use log::info;

use crate::compare::Verdict;
use crate::read::{FailureReason, ReadRecord};

/// Counters for one annotate or compare run
#[derive(Default, Debug)]
pub struct BatchStats {
    /// Read files requested by the sheet
    pub total_reads: u64,
    /// Reads annotated successfully
    pub annotated: u64,
    /// Read files that could not be found or loaded
    pub missing_files: u64,
    pub failed_quality: u64,
    pub failed_aligner: u64,
    pub failed_no_hits: u64,
    pub failed_incomplete: u64,
    pub failed_short: u64,
    /// Annotated reads whose chain differs from the sheet column
    pub chain_mismatch: u64,
    /// Read pairs compared
    pub pairs: u64,
    pub pairs_identical: u64,
    pub pairs_ok: u64,
    pub pairs_open: u64,
    pub cloning_recommendations: u64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of building one read
    pub fn record_read(&mut self, record: &ReadRecord) {
        self.total_reads += 1;
        match record.failure() {
            None => self.annotated += 1,
            Some(FailureReason::Quality) => self.failed_quality += 1,
            Some(FailureReason::AlignerInvocation) => self.failed_aligner += 1,
            Some(FailureReason::NoHits) => self.failed_no_hits += 1,
            Some(FailureReason::IncompleteAlignment) => self.failed_incomplete += 1,
            Some(FailureReason::ShortAlignment) => self.failed_short += 1,
        }
    }

    pub fn record_missing(&mut self) {
        self.total_reads += 1;
        self.missing_files += 1;
    }

    pub fn record_verdict(&mut self, verdict: &Verdict) {
        self.pairs += 1;
        match verdict {
            Verdict::Identical => self.pairs_identical += 1,
            v if v.manual_call() == "open" => self.pairs_open += 1,
            _ => self.pairs_ok += 1,
        }
    }

    pub fn failed(&self) -> u64 {
        self.failed_quality
            + self.failed_aligner
            + self.failed_no_hits
            + self.failed_incomplete
            + self.failed_short
    }

    /// Percentage of requested reads annotated successfully
    pub fn annotated_percent(&self) -> f64 {
        if self.total_reads == 0 {
            0.0
        } else {
            100.0 * self.annotated as f64 / self.total_reads as f64
        }
    }

    /// Print summary statistics to log
    pub fn print_summary(&self) {
        if self.total_reads == 0 {
            info!("No reads processed");
            return;
        }

        info!("=== Run Summary ===");
        info!("Number of read files: {}", self.total_reads);
        info!(
            "Annotated reads: {} ({:.2}%)",
            self.annotated,
            self.annotated_percent()
        );
        if self.missing_files > 0 {
            info!("Missing read files: {}", self.missing_files);
        }
        let failed = self.failed();
        if failed > 0 {
            info!(
                "Failed reads: {} (quality {}, aligner {}, no hits {}, incomplete {}, short {})",
                failed,
                self.failed_quality,
                self.failed_aligner,
                self.failed_no_hits,
                self.failed_incomplete,
                self.failed_short
            );
        }
        if self.chain_mismatch > 0 {
            info!("Chain type differs from sheet: {}", self.chain_mismatch);
        }
        if self.pairs > 0 {
            info!(
                "Compared pairs: {} (identical {}, ok {}, open {})",
                self.pairs, self.pairs_identical, self.pairs_ok, self.pairs_open
            );
        }
        if self.cloning_recommendations > 0 {
            info!("Cloning recommendations: {}", self.cloning_recommendations);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Severity;
    use crate::read::testutil::Synthetic;
    use crate::read::Settings;

    #[test]
    fn test_stats_default() {
        let stats = BatchStats::default();
        assert_eq!(stats.total_reads, 0);
        assert_eq!(stats.failed(), 0);
        assert_eq!(stats.annotated_percent(), 0.0);
    }

    #[test]
    fn test_record_reads() {
        let mut stats = BatchStats::new();
        stats.record_read(&Synthetic::heavy().record("ok.fastq"));
        let short = Settings {
            min_aligned_length: 10_000,
            ..Default::default()
        };
        stats.record_read(&Synthetic::heavy().record_with("short.fastq", &short));
        stats.record_missing();
        assert_eq!(stats.total_reads, 3);
        assert_eq!(stats.annotated, 1);
        assert_eq!(stats.failed_short, 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.missing_files, 1);
        assert!((stats.annotated_percent() - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_record_verdicts() {
        let mut stats = BatchStats::new();
        stats.record_verdict(&Verdict::Identical);
        stats.record_verdict(&Verdict::SilentOnly);
        stats.record_verdict(&Verdict::NonsilentChanges {
            count: 1,
            severity: Severity::Minor,
        });
        stats.record_verdict(&Verdict::Failed);
        assert_eq!(stats.pairs, 4);
        assert_eq!(stats.pairs_identical, 1);
        assert_eq!(stats.pairs_ok, 2);
        assert_eq!(stats.pairs_open, 1);
    }
}
