/// Decision table turning a comparison into a review verdict
use super::ClassificationResult;

/// How many nonsilent changes the confirmatory read introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fewer than three
    Minor,
    /// Exactly three
    Moderate,
    /// More than three
    Severe,
}

impl Severity {
    pub fn of(count: u32) -> Self {
        match count {
            0..=2 => Self::Minor,
            3 => Self::Moderate,
            _ => Self::Severe,
        }
    }
}

/// First matching row wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No difference at all
    Identical,
    /// The pair could not be compared
    Failed,
    ManualReview,
    BothNonProductive,
    ProductiveOnlyInConfirmatory,
    LostProductivity,
    Truncated,
    NonsilentChanges { count: u32, severity: Severity },
    SilentOnly,
}

impl Verdict {
    pub fn of(result: &ClassificationResult) -> Self {
        if result.output_text() == "0" {
            return Self::Identical;
        }
        let c = match result {
            ClassificationResult::Compared(c) => c,
            ClassificationResult::CompletelyDifferentChains { .. } => return Self::ManualReview,
            _ => return Self::Failed,
        };
        if c.gene_mismatch || c.cdr3_uncertain || !c.primer_warnings.is_empty() {
            return Self::ManualReview;
        }
        match (c.first_productive, c.second_productive) {
            (false, false) => return Self::BothNonProductive,
            (false, true) => return Self::ProductiveOnlyInConfirmatory,
            (true, false) => return Self::LostProductivity,
            (true, true) => {}
        }
        if c.truncated {
            return Self::Truncated;
        }
        let count = c.tally.total_nonsilent();
        if count > 0 {
            return Self::NonsilentChanges {
                count,
                severity: Severity::of(count),
            };
        }
        Self::SilentOnly
    }

    /// Short call for the manual analysis column.
    pub fn manual_call(&self) -> String {
        match self {
            Self::Identical | Self::SilentOnly => "OK".to_string(),
            Self::NonsilentChanges {
                count,
                severity: Severity::Minor,
            } => format!("{} SHM", count),
            _ => "open".to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Identical => "identical",
            Self::Failed => "failed",
            Self::ManualReview => "manual review",
            Self::BothNonProductive => "both non-productive",
            Self::ProductiveOnlyInConfirmatory => "productive only in confirmatory read",
            Self::LostProductivity => "lost productivity",
            Self::Truncated => "truncated",
            Self::NonsilentChanges {
                severity: Severity::Minor,
                ..
            } => "nonsilent changes (minor)",
            Self::NonsilentChanges {
                severity: Severity::Moderate,
                ..
            } => "nonsilent changes (moderate)",
            Self::NonsilentChanges {
                severity: Severity::Severe,
                ..
            } => "nonsilent changes (severe)",
            Self::SilentOnly => "silent only",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
