/// Pairwise comparison of two reads of the same antibody chain
///
/// The first read comes from a PCR done with a primer mix and may carry
/// primer-induced discrepancies near both ends. The second, confirmatory read
/// (usually the plasmid) is taken as reference for regions, the germline and
/// the primer windows. Every nucleotide difference is classified by which of
/// the two reads agrees with the germline.
pub mod tally;
pub mod verdict;

pub use tally::{Bucket, MutationTally, RegionCounts};
pub use verdict::{Severity, Verdict};

use crate::export;
use crate::read::{ChainType, ReadRecord};
use crate::seq;

/// A value per chain type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerChain<T> {
    pub heavy: T,
    pub kappa: T,
    pub lambda: T,
}

impl<T> PerChain<T> {
    pub fn get(&self, chain: ChainType) -> Option<&T> {
        match chain {
            ChainType::Heavy => Some(&self.heavy),
            ChainType::Kappa => Some(&self.kappa),
            ChainType::Lambda => Some(&self.lambda),
            ChainType::Unknown => None,
        }
    }
}

/// Cloning-primer flank sequences; any one alternate must be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimerFlanks {
    pub five_prime: Vec<String>,
    pub three_prime: Vec<String>,
}

impl PrimerFlanks {
    fn new(five_prime: &[&str], three_prime: &[&str]) -> Self {
        Self {
            five_prime: five_prime.iter().map(|s| s.to_string()).collect(),
            three_prime: three_prime.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareParams {
    /// Minimum mean phred of both reads
    pub min_quality: u32,
    /// Positions from the V start covered by the 5' primer
    pub forward_tolerance: PerChain<usize>,
    /// Positions before the germline end covered by the 3' primer
    pub reverse_tolerance: PerChain<usize>,
    /// Vector backbone found only when no insert was cloned
    pub empty_vector: PerChain<String>,
    pub primer_flanks: PerChain<PrimerFlanks>,
}

impl Default for CompareParams {
    fn default() -> Self {
        Self {
            min_quality: 20,
            forward_tolerance: PerChain {
                heavy: 33,
                kappa: 32,
                lambda: 27,
            },
            reverse_tolerance: PerChain {
                heavy: 21,
                kappa: 21,
                lambda: 0,
            },
            empty_vector: PerChain {
                heavy: "ACCGGTGTACACTCGAGCGTACGGTCGAC".to_string(),
                kappa: "ACCGGTTGACTAACTAGCCGTACG".to_string(),
                lambda: "ACCGGTTGACTAACTAGCCTCGAG".to_string(),
            },
            primer_flanks: PerChain {
                heavy: PrimerFlanks::new(
                    &["ATGGGATGGTCATGTATCATCCTTTTTCTAGTAGCAACTGCAACCGGTGTACATTC"],
                    &["TCAGCGTCGACCAAGGGCCCATCGGTCTTCCCCCTGGCACCCTCC"],
                ),
                kappa: PrimerFlanks::new(
                    &[
                        "ATGGGATGGTCATGTATCATCCTTTTTCTAGTAGCAACTGCAACCGGTGTACATT",
                        "ATGGGATGGTCATGTATCATCCTTTTTCTAGTAGCAACTGCAACCGGTGTACATG",
                    ],
                    &[
                        "ATCAAACGTACGGTGGCTGCACCATCTGTCTTCATCTTCCCGCCA",
                        "ATTAAACGTACGGTGGCTGCACCATCTGTCTTCATCTTCCCGCCA",
                    ],
                ),
                lambda: PrimerFlanks::new(
                    &["ATGGGATGGTCATGTATCATCCTTTTTCTAGTAGCAACTGCAACCGGTTC"],
                    &[
                        "CACTCTGTTCCCGCCCTCGAGTGAGGAGCTTCAAGCCAACAAGGCCACACTG",
                        "CACTCTGTTCCCACCCTCGAGTGAGGAGCTTCAAGCCAACAAGGCCACACTG",
                    ],
                ),
            },
        }
    }
}

/// Which read of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Which {
    First,
    Second,
}

impl std::fmt::Display for Which {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Second => write!(f, "second"),
        }
    }
}

/// Outcome of a completed position-by-position scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub chain: ChainType,
    /// Gene mismatch and productivity notes, in order
    pub notes: Vec<String>,
    pub tally: MutationTally,
    /// The scan stopped before the end of the first read
    pub truncated: bool,
    pub primer_warnings: Vec<String>,
    pub first_productive: bool,
    pub second_productive: bool,
    /// Either the V or the J calls differ
    pub gene_mismatch: bool,
    pub cdr3_uncertain: bool,
    pub shm_analysis: String,
}

const TRUNCATED_NOTE: &str = "Comparison stopped early: the second read ends before the first one, \
either because of an extra nucleotide in the first read or because the second read terminates prematurely. \
Up to that point there were:";

impl Comparison {
    /// Notes and non-zero counters; `"0"` when there is nothing to report.
    pub fn summary(&self) -> String {
        let mut items = self.notes.clone();
        if self.truncated {
            items.push(TRUNCATED_NOTE.to_string());
        }
        items.extend(self.tally.summary_items());
        if items.is_empty() {
            "0".to_string()
        } else {
            items.join(" ")
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationResult {
    BadQuality { which: Which, name: String },
    EmptyVector { chain: ChainType, name: String },
    NotImmunoglobulin { name: String },
    ChainMismatch {
        first: (String, ChainType),
        second: (String, ChainType),
    },
    Unaligned {
        which: Which,
        name: String,
        reason: String,
    },
    CompletelyDifferentChains { chain: ChainType },
    Compared(Comparison),
}

impl ClassificationResult {
    pub fn comparison(&self) -> Option<&Comparison> {
        match self {
            Self::Compared(c) => Some(c),
            _ => None,
        }
    }

    /// Result text as written to the output sheet.
    pub fn output_text(&self) -> String {
        match self {
            Self::BadQuality { name, .. } => format!("BQ - {}", name),
            Self::EmptyVector { name, .. } => format!("empty vector - {}", name),
            Self::NotImmunoglobulin { name } => {
                format!("{} is not an immunoglobulin chain.", name)
            }
            Self::ChainMismatch { first, second } => format!(
                "chain types differ! {}: {}C, {}: {}C.",
                first.0, first.1, second.0, second.1
            ),
            Self::Unaligned { name, reason, .. } => format!(
                "BQ: Could not blast {}. This could either be due to bad sequencing quality, \
                 or maybe because it's an empty vector? igblast complained: {}",
                name, reason
            ),
            Self::CompletelyDifferentChains { chain } => format!(
                "Diff {}C (Both J and V genes do not match. These are most likely completely different chains)",
                chain
            ),
            Self::Compared(c) => {
                let mut text = c.summary();
                for warning in &c.primer_warnings {
                    text.push(' ');
                    text.push_str(warning);
                }
                text
            }
        }
    }

    pub fn shm_analysis(&self) -> &str {
        match self {
            Self::Compared(c) => &c.shm_analysis,
            _ => "n/a",
        }
    }
}

/// Compare `first` (primer-mix PCR) against `second` (confirmatory read).
pub fn classify(first: &ReadRecord, second: &ReadRecord, params: &CompareParams) -> ClassificationResult {
    for (which, record) in [(Which::First, first), (Which::Second, second)] {
        if record.mean_quality < params.min_quality {
            return ClassificationResult::BadQuality {
                which,
                name: record.name.clone(),
            };
        }
    }
    for chain in ChainType::ALL {
        if let Some(marker) = params.empty_vector.get(chain) {
            if seq::contains(&second.sequence, marker.as_bytes()) {
                return ClassificationResult::EmptyVector {
                    chain,
                    name: second.name.clone(),
                };
            }
        }
    }
    if second.chain_type == ChainType::Unknown {
        return ClassificationResult::NotImmunoglobulin {
            name: second.name.clone(),
        };
    }
    if first.chain_type != second.chain_type {
        return ClassificationResult::ChainMismatch {
            first: (first.name.clone(), first.chain_type),
            second: (second.name.clone(), second.chain_type),
        };
    }
    for (which, record) in [(Which::First, first), (Which::Second, second)] {
        if !record.is_success() {
            return ClassificationResult::Unaligned {
                which,
                name: record.name.clone(),
                reason: record.comment.clone(),
            };
        }
    }

    let (report_a, report_b) = match (&first.report, &second.report) {
        (Some(a), Some(b)) => (a, b),
        (None, _) => return missing_report(Which::First, first),
        (_, None) => return missing_report(Which::Second, second),
    };
    let chain = second.chain_type;
    let v_differs = report_a.top_v() != report_b.top_v();
    let j_differs = report_a.top_j() != report_b.top_j();
    if v_differs && j_differs {
        return ClassificationResult::CompletelyDifferentChains { chain };
    }

    let mut notes = Vec::new();
    if j_differs {
        notes.push("J genes do not match.".to_string());
    } else if v_differs {
        notes.push("V genes do not match.".to_string());
    }
    for record in [first, second] {
        if !record.is_productive() {
            notes.push(format!("{} is not productive.", record.name));
        }
    }

    let (tally, truncated) = scan(first, second, params);
    if truncated {
        log::debug!("comparison of {} and {} truncated", first.name, second.name);
    }

    ClassificationResult::Compared(Comparison {
        chain,
        notes,
        tally,
        truncated,
        primer_warnings: primer_warnings(second, params),
        first_productive: first.is_productive(),
        second_productive: second.is_productive(),
        gene_mismatch: v_differs || j_differs,
        cdr3_uncertain: report_a.alignment.cdr3_uncertain || report_b.alignment.cdr3_uncertain,
        shm_analysis: format!(
            "Total SHM according to 2nd pcr/plasmid: {}/{}",
            export::shm(first),
            export::shm(second)
        ),
    })
}

fn missing_report(which: Which, record: &ReadRecord) -> ClassificationResult {
    ClassificationResult::Unaligned {
        which,
        name: record.name.clone(),
        reason: "no alignment report".to_string(),
    }
}

/// Walk the first read's aligned sequence against the second one.
/// Returns the tally and whether the scan stopped early.
fn scan(first: &ReadRecord, second: &ReadRecord, params: &CompareParams) -> (MutationTally, bool) {
    let mut tally = MutationTally::default();
    let chain = second.chain_type;
    let forward = params.forward_tolerance.get(chain).copied().unwrap_or(0);
    let reverse = params.reverse_tolerance.get(chain).copied().unwrap_or(0) as i64;
    let gene_len = second.gene_seq.len() as i64;

    let frame = |r: &ReadRecord| r.v_subject_start().unwrap_or(1) as i64 - 1;
    let offset = frame(first) - frame(second);
    let Some(v_start) = second.v_start() else {
        return (tally, true);
    };

    for (i, &nt) in first.aligned.iter().enumerate() {
        let j = offset + i as i64;
        if j < 0 {
            continue;
        }
        let Some(&reference) = second.aligned.get(j as usize) else {
            return (tally, true);
        };
        if reference == nt {
            continue;
        }
        let j = j as usize;
        let pos = v_start + j as u32;
        let Some(germline) = second.germline_nt(pos) else {
            return (tally, true);
        };
        let in_j_primer = j as i64 > gene_len - reverse;

        if reference == germline {
            if j < forward {
                tally.fr1_primer_canceled += 1;
            } else if in_j_primer {
                tally.j_primer_canceled += 1;
            } else {
                let bucket = if first.translate_at(j) == second.translate_at(j) {
                    Bucket::CanceledSilent
                } else {
                    Bucket::CanceledNonsilent
                };
                tally.add(bucket, second.region_of(pos));
            }
        } else if nt == germline {
            if in_j_primer {
                tally.j_primer_added += 1;
            } else {
                let silent =
                    first.translate_at(j) == second.translate_at(j) || second.is_silent(j);
                let bucket = if silent {
                    Bucket::AddedSilent
                } else {
                    Bucket::AddedNonsilent
                };
                tally.add(bucket, second.region_of(pos));
            }
        } else {
            // both reads diverge from the germline
            let bucket = if second.is_silent(j) {
                Bucket::AddedSilent
            } else {
                Bucket::ExchangedNonsilent
            };
            tally.add(bucket, second.region_of(pos));
        }
    }
    (tally, false)
}

fn primer_warnings(second: &ReadRecord, params: &CompareParams) -> Vec<String> {
    let Some(flanks) = params.primer_flanks.get(second.chain_type) else {
        return Vec::new();
    };
    let found = |alternates: &[String]| {
        alternates
            .iter()
            .any(|flank| seq::contains(&second.sequence, flank.as_bytes()))
    };
    let mut warnings = Vec::new();
    if !found(&flanks.five_prime) {
        warnings.push("CAVE: Likely mutation in 5' primer.".to_string());
    }
    if !found(&flanks.three_prime) {
        warnings.push("CAVE: Likely mutation in 3' primer.".to_string());
    }
    warnings
}
