/// Inferred germline reconstruction
///
/// IgBLAST reports the aligned germline fragment of each rank-1 V/D/J hit but
/// only the untemplated junction nucleotides as plain strings. The germline
/// map places both on query coordinates so the concatenation lines up with
/// the aligned read.
use crate::report::{AlignmentReport, Hit, SegmentType};

/// Kind of a reconstructed germline segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentKind {
    V,
    D,
    J,
    VdJunction,
    DjJunction,
    VjJunction,
}

impl SegmentKind {
    /// Region label used in mutation summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::V => "v",
            Self::D => "d",
            Self::J => "j",
            Self::VdJunction => "v_d_junction",
            Self::DjJunction => "d_j_junction",
            Self::VjJunction => "v_j_junction",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One germline segment in 1-based, inclusive query coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GermlineSegment {
    pub kind: SegmentKind,
    pub start: u32,
    pub end: u32,
    pub sequence: String,
}

impl GermlineSegment {
    pub fn contains(&self, pos: u32) -> bool {
        self.start <= pos && pos <= self.end
    }
}

fn gene_segment(kind: SegmentKind, hit: Option<&Hit>) -> Option<GermlineSegment> {
    let hit = hit?;
    Some(GermlineSegment {
        kind,
        start: hit.q_start()?,
        end: hit.q_end()?,
        sequence: hit.subject_seq()?.to_string(),
    })
}

/// Build the germline map from the rank-1 hits and junction strings.
///
/// Junctions are chained after the V end with a running cursor: a V-D
/// junction directly follows V, the cursor then skips the D gene, and a D-J
/// junction follows. A V-J junction always follows V. Junctions need a V
/// segment to anchor on and are dropped without one. The result is sorted by
/// start.
pub fn assemble(report: &AlignmentReport) -> Vec<GermlineSegment> {
    let v = gene_segment(SegmentKind::V, report.hits.top(SegmentType::V));
    let d = gene_segment(SegmentKind::D, report.hits.top(SegmentType::D));
    let j = gene_segment(SegmentKind::J, report.hits.top(SegmentType::J));

    let mut segments = Vec::new();
    if let (Some(v), Some(junction)) = (&v, &report.junction) {
        let mut cursor = 0u32;
        if let Some(vd) = &junction.v_d_junction {
            segments.push(junction_segment(SegmentKind::VdJunction, v.end, 0, vd));
            cursor = vd.len() as u32;
        }
        if let Some(d) = &d {
            cursor += d.sequence.len() as u32;
        }
        if let Some(dj) = &junction.d_j_junction {
            segments.push(junction_segment(SegmentKind::DjJunction, v.end, cursor, dj));
        }
        if let Some(vj) = &junction.v_j_junction {
            segments.push(junction_segment(SegmentKind::VjJunction, v.end, 0, vj));
        }
    }
    segments.extend([v, d, j].into_iter().flatten());
    segments.sort_by_key(|s| (s.start, s.kind));
    segments
}

fn junction_segment(kind: SegmentKind, v_end: u32, cursor: u32, seq: &str) -> GermlineSegment {
    GermlineSegment {
        kind,
        start: v_end + cursor + 1,
        end: v_end + cursor + seq.len() as u32,
        sequence: seq.to_string(),
    }
}

/// Germline sequence: segment sequences joined in start order.
pub fn concatenate(segments: &[GermlineSegment]) -> String {
    let mut ordered: Vec<&GermlineSegment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.start);
    ordered.iter().map(|s| s.sequence.as_str()).collect()
}
