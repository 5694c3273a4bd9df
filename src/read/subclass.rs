/// Heavy-chain constant region (Ig subclass) resolution
///
/// Three sources are tried in order and the first one that yields a call wins:
/// 1. the BLAST hit against the constant-region database
/// 2. nucleotide motifs at fixed offsets in the raw read
/// 3. the position of the reverse-complemented CDR3 in the raw read (IgM)
///
/// Only the BLAST hit can produce a confident call.
use crate::aligner::{parse_constant_hits, ConstantHit};
use crate::seq::{find, reverse_complement};

const RESEQUENCE: &str =
    "To properly identify this IgSubClass, it is strongly recommended to resequence the respective Ig";
const HEURISTIC_NOTE: &str = "Ig SC identification is based on heuristics. Sequencing quality was bad in the beginning. If you depend on this IgSC to be correct, please consider resequencing.";

const IGG_ANCHOR: &[u8] = b"TTGGTGGAGGC";
const IGG1_MOTIF: &[u8] = b"GGAGGGT";
const IGG2_MOTIF: &[u8] = b"GCAGGGC";
const IGG34_MOTIF: &[u8] = b"TTGGTGGAAG";
const IGA_ANCHOR: &[u8] = b"TGCTG";
const IGA1_MOTIF: &[u8] = b"TGCTGCAGAG";
const IGA2_MOTIF: &[u8] = b"TGCTGTCGAG";
const IGA1_LONG_MOTIF: &[u8] = b"GGCGATGACCACGTTCCCATCTGGCTG";
const IGA2_LONG_MOTIF: &[u8] = b"GGCGACGACCACGTTCCCATCTTGGGG";
const IGG_GUESS_MOTIF: &[u8] = b"TGGA";

/// How much a subclass call can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Constant-region hit with a good bit score
    Confident,
    /// Constant-region hit just above the acceptance threshold
    LowConfidence,
    /// Motif or CDR3-position guess
    Heuristic,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confident => write!(f, "confident"),
            Self::LowConfidence => write!(f, "low-confidence"),
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubclassCall {
    /// `IgG1`, `IgG1/IgG2`, `IgM`, ... or `n/d`
    pub subclass: String,
    pub confidence: Confidence,
    /// Explanation for the read comment, if any
    pub comment: Option<String>,
}

impl SubclassCall {
    fn heuristic(subclass: &str, comment: Option<String>) -> Self {
        Self {
            subclass: subclass.to_string(),
            confidence: Confidence::Heuristic,
            comment,
        }
    }
}

/// Thresholds and motif windows for subclass resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SubclassParams {
    /// Constant hits need a bit score above this ...
    pub min_bit_score: f64,
    /// ... and an e-value below this
    pub max_evalue: f64,
    /// Accepted hits below this bit score are low-confidence
    pub confident_bit_score: f64,
    /// IgG anchor motifs must start before this offset
    pub igg_window: usize,
    /// Exclusive bounds of the anchor-to-subclass-motif distance
    pub igg_gap: (i64, i64),
    /// IgA anchor (`TGCTG`) and long IgA motifs must start before this offset
    pub iga_window: usize,
    /// CDR3 starting before this offset means IgM
    pub igm_cdr3_window: usize,
    /// IgM calls with CDR3 beyond this offset are logged
    pub igm_warn_offset: usize,
    /// `TGGA` offset limit and CDR3 window for the IgG guess
    pub igg_guess_motif: usize,
    pub igg_guess_cdr3: (usize, usize),
    /// `TGCTG` offset limit and CDR3 window for the IgA guess
    pub iga_guess_motif: usize,
    pub iga_guess_cdr3: (usize, usize),
}

impl Default for SubclassParams {
    fn default() -> Self {
        Self {
            min_bit_score: 50.0,
            max_evalue: 1e-4,
            confident_bit_score: 80.0,
            igg_window: 200,
            igg_gap: (29, 33),
            iga_window: 100,
            igm_cdr3_window: 100,
            igm_warn_offset: 70,
            igg_guess_motif: 90,
            igg_guess_cdr3: (110, 120),
            iga_guess_motif: 110,
            iga_guess_cdr3: (130, 140),
        }
    }
}

/// Resolve the subclass of a heavy-chain read.
///
/// `sequence` is the raw (unoriented) read, `constant_hits` the BLAST table
/// and `cdr3` the sub-region CDR3 nucleotides from the IgBLAST report.
pub fn resolve(
    name: &str,
    sequence: &[u8],
    constant_hits: &str,
    cdr3: Option<&str>,
    params: &SubclassParams,
) -> SubclassCall {
    if let Some(call) = from_constant_hit(constant_hits, params) {
        return call;
    }
    if let Some(call) = from_motifs(sequence, params) {
        return call;
    }
    from_cdr3_position(name, sequence, cdr3, params)
}

fn accepted_hit<'a>(hits: &'a [ConstantHit], params: &SubclassParams) -> Option<&'a ConstantHit> {
    hits.iter().find(|h| {
        h.subject_id.contains("Ig")
            && h.bit_score > params.min_bit_score
            && h.evalue < params.max_evalue
    })
}

fn from_constant_hit(constant_hits: &str, params: &SubclassParams) -> Option<SubclassCall> {
    let hits = parse_constant_hits(constant_hits);
    let hit = accepted_hit(&hits, params)?;
    if hit.bit_score < params.confident_bit_score {
        Some(SubclassCall {
            subclass: hit.subject_id.clone(),
            confidence: Confidence::LowConfidence,
            comment: Some(format!(
                "Ig SC determination confidence lower than usual (ebit: {}). Inspect manually or sequence again.",
                hit.bit_score
            )),
        })
    } else {
        Some(SubclassCall {
            subclass: hit.subject_id.clone(),
            confidence: Confidence::Confident,
            comment: None,
        })
    }
}

/// Signed distance between two motif hits, if both are present.
fn gap(anchor: usize, other: Option<usize>) -> Option<i64> {
    other.map(|o| anchor as i64 - o as i64)
}

fn within(value: Option<i64>, (lo, hi): (i64, i64)) -> bool {
    value.is_some_and(|v| lo < v && v < hi)
}

fn from_motifs(seq: &[u8], params: &SubclassParams) -> Option<SubclassCall> {
    let mut call: Option<SubclassCall> = None;

    // IgG1 / IgG2
    if let Some(anchor) = find(seq, IGG_ANCHOR).filter(|&p| p > 0 && p < params.igg_window) {
        call = Some(if within(gap(anchor, find(seq, IGG1_MOTIF)), params.igg_gap) {
            SubclassCall::heuristic(
                "IgG1",
                Some(format!(
                    "{} If this is not an IgG1, it most likely is an IgG2.",
                    HEURISTIC_NOTE
                )),
            )
        } else if within(gap(anchor, find(seq, IGG2_MOTIF)), params.igg_gap) {
            SubclassCall::heuristic(
                "IgG2",
                Some(format!(
                    "{} If this is not an IgG2, it most likely is an IgG1.",
                    HEURISTIC_NOTE
                )),
            )
        } else {
            SubclassCall::heuristic("IgG1/IgG2", Some(RESEQUENCE.to_string()))
        });
    }

    // IgG3 / IgG4
    if find(seq, IGG34_MOTIF).is_some_and(|p| p < params.igg_window) {
        call = Some(SubclassCall::heuristic(
            "IgG3/IgG4",
            Some(RESEQUENCE.to_string()),
        ));
    }

    // IgA1 / IgA2
    let anchor = find(seq, IGA_ANCHOR);
    if let Some(anchor) = anchor.filter(|&p| p > 0 && p < params.iga_window) {
        if find(seq, IGA1_MOTIF) == Some(anchor) {
            call = Some(SubclassCall::heuristic("IgA1", None));
        } else if find(seq, IGA2_MOTIF) == Some(anchor) {
            call = Some(SubclassCall::heuristic("IgA2", None));
        }
    } else if call.is_none() {
        // Last resort: the anchor is missing but the longer upstream motifs
        // may still be readable
        for (motif, subclass) in [(IGA1_LONG_MOTIF, "IgA1"), (IGA2_LONG_MOTIF, "IgA2")] {
            if find(seq, motif).is_some_and(|p| p < params.iga_window) {
                call = Some(SubclassCall::heuristic(
                    subclass,
                    Some(HEURISTIC_NOTE.to_string()),
                ));
            }
        }
    }

    call
}

fn from_cdr3_position(
    name: &str,
    seq: &[u8],
    cdr3: Option<&str>,
    params: &SubclassParams,
) -> SubclassCall {
    let cdr3_pos = cdr3.and_then(|c| find(seq, &reverse_complement(c.as_bytes())));
    let Some(cdr3_pos) = cdr3_pos else {
        return SubclassCall::heuristic(
            "n/d",
            Some(
                "IgSC is probably IgM, but cdr3 couldn't be identified. Please check manually that this is correct."
                    .to_string(),
            ),
        );
    };

    if cdr3_pos < params.igm_cdr3_window {
        if cdr3_pos > params.igm_warn_offset {
            log::warn!(
                "{}: IgM called with CDR3 at offset {} (window {}, warn above {})",
                name,
                cdr3_pos,
                params.igm_cdr3_window,
                params.igm_warn_offset
            );
        }
        return SubclassCall::heuristic("IgM", None);
    }

    let open = |v: usize, (lo, hi): (usize, usize)| lo < v && v < hi;
    let mut comment = None;
    if find(seq, IGG_GUESS_MOTIF).is_some_and(|p| p < params.igg_guess_motif)
        && open(cdr3_pos, params.igg_guess_cdr3)
    {
        comment = Some("IgSC is n/d, probably it is a IgG.".to_string());
    }
    if find(seq, IGA_ANCHOR).is_some_and(|p| p < params.iga_guess_motif)
        && open(cdr3_pos, params.iga_guess_cdr3)
    {
        comment = Some("IgSC is n/d, probably it is a IgA.".to_string());
    }
    SubclassCall::heuristic("n/d", comment)
}
