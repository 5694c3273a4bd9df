/// Per-read annotation
///
/// This module handles:
/// - The quality gate applied before any external call
/// - Running the aligner and parsing its report
/// - Orientation, aligned span and germline reconstruction
/// - Position lookups (region, germline base, codon translation) used by
///   the pairwise comparison
/// - Heavy-chain subclass resolution (`subclass`)
pub mod subclass;

#[cfg(test)]
pub(crate) mod testutil;

pub use subclass::{Confidence, SubclassCall, SubclassParams};

use std::path::PathBuf;

use crate::aligner::Aligner;
use crate::germline::{self, GermlineSegment, SegmentKind};
use crate::io::fastq::SangerRead;
use crate::report::{self, AlignmentReport, SegmentType, Strand, VRegion};
use crate::seq::{reverse_complement, translate_codon, AminoAcid};

/// Antibody chain type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainType {
    Heavy,
    Kappa,
    Lambda,
    Unknown,
}

impl ChainType {
    pub const ALL: [ChainType; 3] = [ChainType::Heavy, ChainType::Kappa, ChainType::Lambda];

    /// Chain type from IgBLAST's `VH` / `VK` / `VL` notation.
    pub fn from_report(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().trim_matches('V')) {
            Some("H") => Self::Heavy,
            Some("K") => Self::Kappa,
            Some("L") => Self::Lambda,
            _ => Self::Unknown,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Heavy => 'H',
            Self::Kappa => 'K',
            Self::Lambda => 'L',
            Self::Unknown => '?',
        }
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "n/d"),
            other => write!(f, "{}", other.letter()),
        }
    }
}

/// Why a read did not reach `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Quality,
    AlignerInvocation,
    NoHits,
    IncompleteAlignment,
    ShortAlignment,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quality => write!(f, "quality"),
            Self::AlignerInvocation => write!(f, "aligner-invocation"),
            Self::NoHits => write!(f, "no-hits"),
            Self::IncompleteAlignment => write!(f, "incomplete-alignment"),
            Self::ShortAlignment => write!(f, "short-alignment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failed(FailureReason),
}

/// Thresholds applied while building a `ReadRecord`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub min_read_length: usize,
    pub min_mean_quality: u32,
    pub min_aligned_length: usize,
    pub subclass: SubclassParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_read_length: 50,
            min_mean_quality: 12,
            min_aligned_length: 80,
            subclass: SubclassParams::default(),
        }
    }
}

/// Region a query position falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Segment(SegmentKind),
    Sub(VRegion),
    Undetermined,
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Segment(kind) => f.write_str(kind.label()),
            Self::Sub(region) => f.write_str(region.label()),
            Self::Undetermined => f.write_str("n/d"),
        }
    }
}

/// Germline and read amino acid of one codon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodonPair {
    pub germline: AminoAcid,
    pub read: AminoAcid,
}

impl CodonPair {
    const UNDETERMINED: CodonPair = CodonPair {
        germline: AminoAcid::Undetermined,
        read: AminoAcid::Undetermined,
    };
}

/// One annotated Sanger read. Immutable once built.
#[derive(Debug, Clone)]
pub struct ReadRecord {
    /// File name used in messages
    pub name: String,
    pub path: PathBuf,
    /// Raw read as sequenced
    pub sequence: Vec<u8>,
    pub mean_quality: u32,
    pub chain_type: ChainType,
    pub status: Status,
    pub comment: String,
    /// Read in germline orientation
    pub oriented: Vec<u8>,
    /// Oriented read from the V start to the end of the last aligned gene
    pub aligned: Vec<u8>,
    pub germline: Vec<GermlineSegment>,
    /// Concatenated germline sequence
    pub gene_seq: Vec<u8>,
    pub report: Option<AlignmentReport>,
    pub subclass: Option<SubclassCall>,
}

impl ReadRecord {
    fn unparsed(read: &SangerRead) -> Self {
        Self {
            name: read.display_name(),
            path: read.path.clone(),
            sequence: read.sequence.clone(),
            mean_quality: read.mean_quality(),
            chain_type: ChainType::Unknown,
            status: Status::Success,
            comment: "ok".to_string(),
            oriented: Vec::new(),
            aligned: Vec::new(),
            germline: Vec::new(),
            gene_seq: Vec::new(),
            report: None,
            subclass: None,
        }
    }

    fn fail(mut self, reason: FailureReason, comment: impl Into<String>) -> Self {
        self.status = Status::Failed(reason);
        self.comment = comment.into();
        log::debug!("{}: {} ({})", self.name, reason, self.comment);
        self
    }

    /// Run one read through quality gate, aligner, parser and germline
    /// reconstruction. Never returns an error: every failure is recorded in
    /// `status` and `comment`.
    pub fn build(read: &SangerRead, aligner: &dyn Aligner, settings: &Settings) -> Self {
        let mut record = Self::unparsed(read);

        if read.len() < settings.min_read_length || record.mean_quality < settings.min_mean_quality
        {
            let comment = format!(
                "Quality: {}, read length: {}.",
                record.mean_quality,
                read.len()
            );
            return record.fail(FailureReason::Quality, comment);
        }

        let output = match aligner.align(read) {
            Ok(output) => output,
            Err(e) => {
                log::warn!("{}: {}", record.name, e);
                return record.fail(FailureReason::AlignerInvocation, e.to_string());
            }
        };

        let parsed = report::parse(&output.report);
        record.chain_type =
            ChainType::from_report(parsed.rearrangement.as_ref().and_then(|r| r.chain_type.as_deref()));
        let no_hits = parsed.top_v().is_none() && parsed.top_d().is_none() && parsed.top_j().is_none();
        let strand = parsed.strand();
        let v_hit = parsed.hits.top(SegmentType::V);
        let span_start = v_hit.and_then(|h| h.q_start());
        let span_end = [SegmentType::J, SegmentType::D, SegmentType::V]
            .into_iter()
            .find_map(|s| parsed.hits.top(s).and_then(|h| h.q_end()));
        record.report = Some(parsed);

        if no_hits {
            return record.fail(FailureReason::NoHits, "No hits. ");
        }
        let (Some(start), Some(end)) = (span_start, span_end) else {
            return record.fail(
                FailureReason::IncompleteAlignment,
                "Could not create complete aligned sequence.",
            );
        };

        record.oriented = match strand {
            Some(Strand::Reverse) => reverse_complement(&read.sequence),
            _ => read.sequence.clone(),
        };
        let from = (start.max(1) as usize - 1).min(record.oriented.len());
        let to = (end as usize).clamp(from, record.oriented.len());
        record.aligned = record.oriented[from..to].to_vec();

        if record.aligned.len() < settings.min_aligned_length {
            let comment = format!(
                "IgBlast aligned less than {} nt. Probably sequencing quality is bad.",
                settings.min_aligned_length
            );
            return record.fail(FailureReason::ShortAlignment, comment);
        }

        if let Some(parsed) = &record.report {
            record.germline = germline::assemble(parsed);
        }
        record.gene_seq = germline::concatenate(&record.germline).into_bytes();

        if record.chain_type == ChainType::Heavy {
            let cdr3 = record.report.as_ref().and_then(|r| r.cdr3_nucleotides());
            let call = subclass::resolve(
                &record.name,
                &record.sequence,
                &output.constant_hits,
                cdr3,
                &settings.subclass,
            );
            if let Some(comment) = &call.comment {
                record.comment = comment.clone();
            }
            record.subclass = Some(call);
        }

        record
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn failure(&self) -> Option<FailureReason> {
        match self.status {
            Status::Success => None,
            Status::Failed(reason) => Some(reason),
        }
    }

    pub fn is_productive(&self) -> bool {
        self.report.as_ref().is_some_and(AlignmentReport::is_productive)
    }

    fn segment(&self, kind: SegmentKind) -> Option<&GermlineSegment> {
        self.germline.iter().find(|s| s.kind == kind)
    }

    /// Query position of the first V gene base.
    pub fn v_start(&self) -> Option<u32> {
        self.segment(SegmentKind::V).map(|s| s.start)
    }

    /// Germline position of the first aligned V gene base.
    pub fn v_subject_start(&self) -> Option<u32> {
        self.report
            .as_ref()?
            .hits
            .top(SegmentType::V)?
            .s_start()
    }

    /// Region of a query position: the V sub-region (half-open
    /// `[from, to)`) containing it, else the germline segment, else
    /// undetermined. The CDR3 sub-region reaches past the V gene.
    pub fn region_of(&self, pos: u32) -> Region {
        if let Some(report) = &self.report {
            for (region, stats) in &report.alignment.regions {
                if let (Some(from), Some(to)) = (stats.from, stats.to) {
                    if from <= pos && pos < to {
                        return Region::Sub(*region);
                    }
                }
            }
        }
        match self.germline.iter().find(|s| s.contains(pos)) {
            Some(segment) => Region::Segment(segment.kind),
            None => Region::Undetermined,
        }
    }

    /// Germline base at query position `pos`.
    pub fn germline_nt(&self, pos: u32) -> Option<u8> {
        let offset = pos.checked_sub(self.v_start()?)?;
        self.gene_seq.get(offset as usize).copied()
    }

    /// Germline and read amino acid of the codon containing `pos`, an offset
    /// from the V start. The codon frame follows the V hit's subject start.
    pub fn translate_at(&self, pos: usize) -> CodonPair {
        if pos > self.gene_seq.len() {
            return CodonPair::UNDETERMINED;
        }
        let frame = self.v_subject_start().unwrap_or(1) as i64 - 1;
        let codon = (pos / 3 * 3) as i64 - frame;
        CodonPair {
            germline: codon_at(&self.gene_seq, codon),
            read: codon_at(&self.aligned, codon),
        }
    }

    /// Whether the read keeps the germline amino acid at `pos`.
    pub fn is_silent(&self, pos: usize) -> bool {
        let pair = self.translate_at(pos);
        pair.germline == pair.read
    }
}

fn codon_at(seq: &[u8], start: i64) -> AminoAcid {
    if start < 0 {
        return AminoAcid::Incomplete;
    }
    let start = start as usize;
    if start >= seq.len() {
        return AminoAcid::Incomplete;
    }
    translate_codon(&seq[start..(start + 3).min(seq.len())])
}
