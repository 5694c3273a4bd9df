/// Structured IgBLAST report (outfmt 7 with the `std qseq sseq btop` columns)
///
/// This module handles:
/// - The typed record a report is parsed into (every section optional)
/// - The line scanner that fills it (`parser`)
mod parser;

pub use parser::parse;

use std::collections::BTreeMap;

/// Literal IgBLAST uses for a missing value.
pub const NOT_AVAILABLE: &str = "N/A";

/// `None` for empty or `N/A` values, the trimmed value otherwise.
pub(crate) fn available(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value == NOT_AVAILABLE {
        None
    } else {
        Some(value)
    }
}

/// Strand of the query relative to the germline genes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

/// One gene call; IgBLAST lists equally good matches separated by commas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneCall(pub Vec<String>);

impl GeneCall {
    pub fn parse(value: &str) -> Option<Self> {
        let value = available(value)?;
        let genes: Vec<String> = value
            .split(',')
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        if genes.is_empty() {
            None
        } else {
            Some(Self(genes))
        }
    }

    /// The first (reported best) gene.
    pub fn primary(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or(NOT_AVAILABLE)
    }
}

impl std::fmt::Display for GeneCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// The "V-(D)-J rearrangement summary" line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RearrangementSummary {
    pub top_v: Option<GeneCall>,
    pub top_d: Option<GeneCall>,
    pub top_j: Option<GeneCall>,
    /// Raw chain type as reported, e.g. `VH`, `VK`, `VL`.
    pub chain_type: Option<String>,
    pub stop_codon: Option<bool>,
    pub vj_frame: Option<String>,
    pub productive: Option<bool>,
    pub strand: Option<Strand>,
}

impl RearrangementSummary {
    /// True only when IgBLAST explicitly reported a productive rearrangement.
    pub fn is_productive(&self) -> bool {
        self.productive == Some(true)
    }
}

/// The "V-(D)-J junction details" line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JunctionDetail {
    pub v_end: Option<String>,
    pub v_d_junction: Option<String>,
    pub d_region: Option<String>,
    pub d_j_junction: Option<String>,
    pub v_j_junction: Option<String>,
    pub j_start: Option<String>,
    /// Nucleotides that could belong to either neighbour, given in parentheses.
    pub overlap: Option<String>,
    /// All available fragments concatenated in report order.
    pub junction_together: String,
}

/// The CDR3 line of the "Sub-region sequence details" section.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRegionCdr3 {
    pub nucleotides: String,
    pub translation: String,
    pub start: Option<u32>,
    pub end: Option<u32>,
}

/// V gene sub-regions of the alignment summary, in sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VRegion {
    Fr1,
    Cdr1,
    Fr2,
    Cdr2,
    Fr3,
    Cdr3,
}

impl VRegion {
    pub const ALL: [VRegion; 6] = [
        VRegion::Fr1,
        VRegion::Cdr1,
        VRegion::Fr2,
        VRegion::Cdr2,
        VRegion::Fr3,
        VRegion::Cdr3,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Fr1 => "fr1",
            Self::Cdr1 => "cdr1",
            Self::Fr2 => "fr2",
            Self::Cdr2 => "cdr2",
            Self::Fr3 => "fr3",
            Self::Cdr3 => "cdr3",
        }
    }

    /// Line prefix in the alignment summary section.
    pub fn imgt_prefix(self) -> &'static str {
        match self {
            Self::Fr1 => "FR1-IMGT",
            Self::Cdr1 => "CDR1-IMGT",
            Self::Fr2 => "FR2-IMGT",
            Self::Cdr2 => "CDR2-IMGT",
            Self::Fr3 => "FR3-IMGT",
            Self::Cdr3 => "CDR3-IMGT",
        }
    }
}

impl std::fmt::Display for VRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Numeric columns of one alignment summary row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionStats {
    pub from: Option<u32>,
    pub to: Option<u32>,
    pub length: Option<u32>,
    pub matches: Option<u32>,
    pub mismatches: Option<u32>,
    pub gaps: Option<u32>,
    pub percent_identity: Option<f64>,
}

/// Alignment summary between the query and the top V gene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentSummary {
    pub regions: BTreeMap<VRegion, RegionStats>,
    pub total: Option<RegionStats>,
    /// The CDR3-IMGT row disagreed with the sub-region CDR3 start.
    pub cdr3_uncertain: bool,
}

impl AlignmentSummary {
    pub fn region(&self, region: VRegion) -> Option<&RegionStats> {
        self.regions.get(&region)
    }
}

/// A hit-table cell: numeric when it parses as a finite number.
#[derive(Debug, Clone, PartialEq)]
pub enum HitValue {
    Number(f64),
    Text(String),
}

impl HitValue {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Number(v),
            _ => Self::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

/// One hit-table row keyed by normalized field name (`q_start`, `subject_seq`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hit {
    pub fields: BTreeMap<String, HitValue>,
}

impl Hit {
    pub fn get(&self, field: &str) -> Option<&HitValue> {
        self.fields.get(field)
    }

    fn position(&self, field: &str) -> Option<u32> {
        let v = self.get(field)?.as_f64()?;
        if v >= 0.0 {
            Some(v as u32)
        } else {
            None
        }
    }

    pub fn q_start(&self) -> Option<u32> {
        self.position("q_start")
    }

    pub fn q_end(&self) -> Option<u32> {
        self.position("q_end")
    }

    pub fn s_start(&self) -> Option<u32> {
        self.position("s_start")
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.get("subject_id")?.as_text()
    }

    /// Aligned germline sequence; a purely numeric sequence is impossible,
    /// so only text values count.
    pub fn subject_seq(&self) -> Option<&str> {
        self.get("subject_seq")?.as_text()
    }
}

/// Gene segment type of a hit-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    V,
    D,
    J,
}

/// Ranked hits per segment type (index 0 = rank 1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitTable {
    pub v: Vec<Hit>,
    pub d: Vec<Hit>,
    pub j: Vec<Hit>,
}

impl HitTable {
    pub fn hits(&self, segment: SegmentType) -> &[Hit] {
        match segment {
            SegmentType::V => &self.v,
            SegmentType::D => &self.d,
            SegmentType::J => &self.j,
        }
    }

    pub fn top(&self, segment: SegmentType) -> Option<&Hit> {
        self.hits(segment).first()
    }
}

/// Everything extracted from one IgBLAST report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentReport {
    pub query: Option<String>,
    pub domain_classification: Option<String>,
    pub rearrangement: Option<RearrangementSummary>,
    pub junction: Option<JunctionDetail>,
    pub cdr3: Option<SubRegionCdr3>,
    pub alignment: AlignmentSummary,
    pub hits: HitTable,
    /// From the trailing "Total identifiable CDR3" line.
    pub identifiable_cdr3: Option<u32>,
}

impl AlignmentReport {
    pub fn top_v(&self) -> Option<&GeneCall> {
        self.rearrangement.as_ref()?.top_v.as_ref()
    }

    pub fn top_d(&self) -> Option<&GeneCall> {
        self.rearrangement.as_ref()?.top_d.as_ref()
    }

    pub fn top_j(&self) -> Option<&GeneCall> {
        self.rearrangement.as_ref()?.top_j.as_ref()
    }

    pub fn strand(&self) -> Option<Strand> {
        self.rearrangement.as_ref()?.strand
    }

    pub fn is_productive(&self) -> bool {
        self.rearrangement
            .as_ref()
            .is_some_and(RearrangementSummary::is_productive)
    }

    /// Translated CDR3, when the sub-region line was present.
    pub fn cdr3_translation(&self) -> Option<&str> {
        self.cdr3.as_ref().and_then(|c| available(&c.translation))
    }

    pub fn cdr3_nucleotides(&self) -> Option<&str> {
        self.cdr3.as_ref().and_then(|c| available(&c.nucleotides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gene_call_multiple() {
        let call = GeneCall::parse("IGHV3-23*01,IGHV3-23*04").unwrap();
        assert_eq!(call.0.len(), 2);
        assert_eq!(call.primary(), "IGHV3-23*01");
        assert_eq!(call.to_string(), "IGHV3-23*01,IGHV3-23*04");
        assert!(GeneCall::parse("N/A").is_none());
        assert!(GeneCall::parse("").is_none());
    }

    #[test]
    fn test_hit_value_parse() {
        assert_eq!(HitValue::parse("12"), HitValue::Number(12.0));
        assert_eq!(HitValue::parse("1e-50"), HitValue::Number(1e-50));
        assert_eq!(
            HitValue::parse("IGHV1-2*02"),
            HitValue::Text("IGHV1-2*02".into())
        );
        // "nan" / "inf" parse as f64 but are not numbers in a hit table
        assert_eq!(HitValue::parse("NaN"), HitValue::Text("NaN".into()));
        assert_eq!(HitValue::parse("inf"), HitValue::Text("inf".into()));
    }

    #[test]
    fn test_vregion_order() {
        let mut regions = VRegion::ALL.to_vec();
        regions.reverse();
        regions.sort();
        assert_eq!(regions, VRegion::ALL.to_vec());
        assert_eq!(VRegion::Cdr3.imgt_prefix(), "CDR3-IMGT");
    }
}
