/// Line scanner for IgBLAST outfmt 7 reports
///
/// The report is only loosely structured. Sections are introduced by comment
/// lines carrying a parenthesised title list, followed by a single value line:
///
/// ```text
/// # V-(D)-J rearrangement summary for query sequence (Top V gene match, ...).
/// IGHV3-23*01	IGHD3-10*01	IGHJ4*02	VH	No	In-frame	Yes	+
/// ```
///
/// Alignment summary rows are prefixed with the IMGT region name, and the hit
/// table is a whitespace-separated block after `# Fields:`. Missing sections
/// are not an error; they simply stay `None`.
use std::collections::BTreeMap;

use super::{
    available, AlignmentReport, AlignmentSummary, GeneCall, Hit, HitTable, HitValue,
    JunctionDetail, RearrangementSummary, RegionStats, Strand, SubRegionCdr3, VRegion,
};

/// Column order used when a report lacks the "Alignment summary" header.
const DEFAULT_SUMMARY_TITLES: [&str; 7] = [
    "from",
    "to",
    "length",
    "matches",
    "mismatches",
    "gaps",
    "percent identity",
];

/// Value line expected after a section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Rearrangement,
    Junction,
}

#[derive(Debug, Default)]
struct Scanner {
    query: Option<String>,
    domain_classification: Option<String>,
    pending: Option<Pending>,

    rearrangement_titles: Vec<String>,
    rearrangement_values: Option<Vec<String>>,
    junction_titles: Vec<String>,
    junction_values: Option<Vec<String>>,

    summary_titles: Vec<String>,
    summary_rows: BTreeMap<VRegion, Vec<String>>,
    total_row: Option<Vec<String>>,
    identifiable_cdr3: Option<u32>,
    cdr3_line: Option<Vec<String>>,

    hit_fields: Option<Vec<String>>,
    hit_rows: [Vec<String>; 3],
}

/// Parse one IgBLAST text report. Never fails: absent sections are `None`.
pub fn parse(text: &str) -> AlignmentReport {
    let mut scanner = Scanner::default();
    for line in text.lines() {
        scanner.feed(line);
    }
    scanner.finish()
}

/// Titles of the `nth` parenthesised group, split on commas.
///
/// The rearrangement and junction headers start with `V-(D)-J`, so their
/// title list is the second group; the alignment summary header has no such
/// prefix and uses the first.
fn titles(line: &str, nth: usize) -> Vec<String> {
    line.trim()
        .split('(')
        .nth(nth)
        .and_then(|group| group.split(')').next())
        .map(|group| group.split(',').map(|t| t.trim().to_string()).collect())
        .unwrap_or_default()
}

fn split_tabs(line: &str) -> Vec<String> {
    line.trim().split('\t').map(str::to_string).collect()
}

fn normalize_hit_field(title: &str) -> String {
    title.trim().replace(' ', "_").replace('.', "")
}

fn parse_yes_no(value: &str) -> Option<bool> {
    let value = available(value)?;
    if value.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if value.eq_ignore_ascii_case("no") {
        Some(false)
    } else {
        None
    }
}

impl Scanner {
    fn feed(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("# Query:") {
            self.query = Some(rest.trim().to_string());
        }
        if line.contains("Domain classification requested:") {
            self.domain_classification = line.split(':').nth(1).map(|d| d.trim().to_string());
        }

        if line.contains("rearrangement summary") {
            self.rearrangement_titles = titles(line, 2);
            self.pending = Some(Pending::Rearrangement);
            return;
        }
        if self.pending == Some(Pending::Rearrangement) {
            self.rearrangement_values = Some(split_tabs(line));
            self.pending = None;
        }

        if line.contains("junction details") {
            self.junction_titles = titles(line, 2);
            self.pending = Some(Pending::Junction);
            return;
        }
        if self.pending == Some(Pending::Junction) {
            self.junction_values = Some(split_tabs(line));
            self.pending = None;
        }

        if line.contains("Alignment summary") {
            self.summary_titles = titles(line, 1);
        }

        for region in [
            VRegion::Fr1,
            VRegion::Cdr1,
            VRegion::Fr2,
            VRegion::Cdr2,
            VRegion::Fr3,
        ] {
            if line.starts_with(region.imgt_prefix()) {
                let row = line.split_whitespace().skip(1).map(str::to_string).collect();
                self.summary_rows.insert(region, row);
            }
        }

        // "CDR3-IMGT (germline)" carries an extra token. It must be handled
        // before the plain "CDR3" sub-region line, which shares the prefix.
        if line.starts_with(VRegion::Cdr3.imgt_prefix()) {
            let row = line.split_whitespace().skip(2).map(str::to_string).collect();
            self.summary_rows.insert(VRegion::Cdr3, row);
            return;
        }

        // "Total queries", "Total identifiable CDR3", "Total unique
        // clonotypes" and the alignment total all start with "Total".
        if line.starts_with("Total") {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if line.contains("CDR3") {
                self.identifiable_cdr3 = tokens.get(4).and_then(|t| t.parse().ok());
            } else if tokens.len() == 8 {
                self.total_row = Some(tokens[1..].iter().map(|t| t.to_string()).collect());
            }
        }

        if line.starts_with("CDR3") {
            self.cdr3_line = Some(split_tabs(line));
        }

        if let Some((_, fields)) = line.split_once("# Fields:") {
            self.hit_fields = Some(fields.split(',').map(normalize_hit_field).collect());
        }
        if self.hit_fields.is_some() {
            let slot = match line.as_bytes().first() {
                Some(b'V') => Some(0),
                Some(b'D') => Some(1),
                Some(b'J') => Some(2),
                _ => None,
            };
            if let Some(slot) = slot {
                self.hit_rows[slot].push(line.to_string());
            }
        }
    }

    fn finish(self) -> AlignmentReport {
        let rearrangement = self
            .rearrangement_values
            .as_deref()
            .map(|values| build_rearrangement(&self.rearrangement_titles, values));
        let junction = self
            .junction_values
            .as_deref()
            .map(|values| build_junction(&self.junction_titles, values));
        let cdr3 = self.cdr3_line.as_deref().map(build_cdr3);

        let summary_titles: Vec<String> = if self.summary_titles.is_empty() {
            DEFAULT_SUMMARY_TITLES.iter().map(|t| t.to_string()).collect()
        } else {
            self.summary_titles
        };
        let mut alignment = AlignmentSummary {
            regions: self
                .summary_rows
                .iter()
                .map(|(region, row)| (*region, build_stats(&summary_titles, row)))
                .collect(),
            total: self
                .total_row
                .as_deref()
                .map(|row| build_stats(&summary_titles, row)),
            cdr3_uncertain: false,
        };
        reconcile_cdr3(&mut alignment, cdr3.as_ref(), self.identifiable_cdr3);

        let hits = match &self.hit_fields {
            Some(fields) => {
                let [v, d, j] = &self.hit_rows;
                HitTable {
                    v: v.iter().map(|row| build_hit(fields, row)).collect(),
                    d: d.iter().map(|row| build_hit(fields, row)).collect(),
                    j: j.iter().map(|row| build_hit(fields, row)).collect(),
                }
            }
            None => HitTable::default(),
        };

        AlignmentReport {
            query: self.query,
            domain_classification: self.domain_classification,
            rearrangement,
            junction,
            cdr3,
            alignment,
            hits,
            identifiable_cdr3: self.identifiable_cdr3,
        }
    }
}

fn build_rearrangement(titles: &[String], values: &[String]) -> RearrangementSummary {
    let mut summary = RearrangementSummary::default();
    for (title, value) in titles.iter().zip(values) {
        match title.to_ascii_lowercase().as_str() {
            "top v gene match" => summary.top_v = GeneCall::parse(value),
            "top d gene match" => summary.top_d = GeneCall::parse(value),
            "top j gene match" => summary.top_j = GeneCall::parse(value),
            "chain type" => summary.chain_type = available(value).map(str::to_string),
            "stop codon" => summary.stop_codon = parse_yes_no(value),
            "v-j frame" => summary.vj_frame = available(value).map(str::to_string),
            "productive" => summary.productive = parse_yes_no(value),
            "strand" => {
                summary.strand = match available(value) {
                    Some("+") => Some(Strand::Forward),
                    Some("-") => Some(Strand::Reverse),
                    _ => None,
                }
            }
            other => log::debug!("ignoring rearrangement field '{}'", other),
        }
    }
    summary
}

fn build_junction(titles: &[String], values: &[String]) -> JunctionDetail {
    let mut detail = JunctionDetail::default();
    for (title, value) in titles.iter().zip(values) {
        if let Some(inner) = value.split('(').nth(1) {
            let inner = inner.split(')').next().unwrap_or_default();
            detail.overlap = Some(inner.to_string());
            detail.junction_together.push_str(inner);
            continue;
        }
        let Some(value) = available(value) else {
            continue;
        };
        detail.junction_together.push_str(value);
        let slot = match title.to_ascii_lowercase().replace(' ', "_").as_str() {
            "v_end" => &mut detail.v_end,
            "v-d_junction" => &mut detail.v_d_junction,
            "d_region" => &mut detail.d_region,
            "d-j_junction" => &mut detail.d_j_junction,
            "v-j_junction" => &mut detail.v_j_junction,
            "j_start" => &mut detail.j_start,
            other => {
                log::debug!("ignoring junction field '{}'", other);
                continue;
            }
        };
        *slot = Some(value.to_string());
    }
    detail
}

fn build_cdr3(columns: &[String]) -> SubRegionCdr3 {
    let column = |i: usize| columns.get(i).map(|c| c.trim().to_string()).unwrap_or_default();
    SubRegionCdr3 {
        nucleotides: column(1),
        translation: column(2),
        start: columns.get(3).and_then(|c| c.trim().parse().ok()),
        end: columns.get(4).and_then(|c| c.trim().parse().ok()),
    }
}

fn build_stats(titles: &[String], row: &[String]) -> RegionStats {
    let mut stats = RegionStats::default();
    for (title, value) in titles.iter().zip(row) {
        let count = || value.parse::<u32>().ok();
        match title.to_ascii_lowercase().as_str() {
            "from" => stats.from = count(),
            "to" => stats.to = count(),
            "length" => stats.length = count(),
            "matches" => stats.matches = count(),
            "mismatches" => stats.mismatches = count(),
            "gaps" => stats.gaps = count(),
            "percent identity" => stats.percent_identity = value.parse().ok(),
            _ => {}
        }
    }
    stats
}

/// Cross-check the CDR3-IMGT row against the sub-region CDR3 line.
///
/// The summary row describes only the V gene part of CDR3; the sub-region
/// line spans the whole CDR3. When they disagree on the start the read is
/// usually of poor quality, so the summary stats are dropped. In every case
/// the CDR3 boundaries are taken from the sub-region line.
fn reconcile_cdr3(
    alignment: &mut AlignmentSummary,
    cdr3: Option<&SubRegionCdr3>,
    identifiable_cdr3: Option<u32>,
) {
    if identifiable_cdr3 == Some(0) {
        return;
    }
    let Some(cdr3) = cdr3 else {
        return;
    };

    let summary_from = alignment.region(VRegion::Cdr3).and_then(|s| s.from);
    if summary_from.is_none() || summary_from != cdr3.start {
        log::warn!("CDR3 region cannot be uniquely identified");
        alignment.cdr3_uncertain = true;
        alignment.regions.insert(VRegion::Cdr3, RegionStats::default());
    }
    if let Some(stats) = alignment.regions.get_mut(&VRegion::Cdr3) {
        stats.from = cdr3.start;
        stats.to = cdr3.end;
    }
}

fn build_hit(fields: &[String], row: &str) -> Hit {
    Hit {
        fields: fields
            .iter()
            .zip(row.split_whitespace().skip(1))
            .map(|(field, value)| (field.clone(), HitValue::parse(value)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SegmentType;

    const HEAVY_REPORT: &str = "\
# IGBLASTN 1.17.1
# Query: H_01_read
# Database: germlinedb/db/V_without_orphons germlinedb/db/D_without_orphons germlinedb/db/J_without_orphons
# Domain classification requested: imgt

# V-(D)-J rearrangement summary for query sequence (Top V gene match, Top D gene match, Top J gene match, Chain type, stop codon, V-J frame, Productive, Strand).  Multiple equivalent top matches, if present, are separated by a comma.
IGHV3-23*01,IGHV3-23*04\tIGHD3-10*01\tIGHJ4*02\tVH\tNo\tIn-frame\tYes\t+

# V-(D)-J junction details based on top germline gene matches (V end, V-D junction, D region, D-J junction, J start).  Note that possible overlapping nucleotides at VDJ junction (i.e, nucleotides that could be assigned to either rearranging gene) are indicated in parentheses (i.e., (TACT)) but are not included under the V, D, or J gene itself
AGAGA\tTCCC\tGTATTACTATG\tGGGA\tACTAC\t

# Sub-region sequence details (nucleotide sequence, translation, start, end)
CDR3\tGCGAGAGATCCCGTATTACTATGGGGAACTACTGG\tARDPVLLWGTTW\t289\t324\t

# Alignment summary between query and top germline V gene hit (from, to, length, matches, mismatches, gaps, percent identity)
FR1-IMGT\t1\t75\t75\t73\t2\t0\t97.3
CDR1-IMGT\t76\t99\t24\t22\t2\t0\t91.7
FR2-IMGT\t100\t150\t51\t50\t1\t0\t98
CDR2-IMGT\t151\t174\t24\t22\t2\t0\t91.7
FR3-IMGT\t175\t288\t114\t110\t4\t0\t96.5
CDR3-IMGT (germline)\t289\t296\t8\t8\t0\t0\t100
Total\tN/A\tN/A\t296\t285\t11\t0\t96.3

# Hit table (the first field indicates the chain type of the hit)
# Fields: query id, subject id, % identity, alignment length, mismatches, gap opens, gap extends, q. start, q. end, s. start, s. end, evalue, bit score, query seq, subject seq, btop
# 3 hits found
V\tH_01_read\tIGHV3-23*01\t96.28\t296\t11\t0\t0\t1\t296\t1\t296\t1.26e-97\t325\tGAGGTG\tGAGGTG\t296
D\tH_01_read\tIGHD3-10*01\t100.00\t11\t0\t0\t0\t301\t311\t5\t15\t0.006\t22.3\tGTATTACTATG\tGTATTACTATG\t11
J\tH_01_read\tIGHJ4*02\t100.00\t13\t0\t0\t0\t316\t328\t6\t18\t1.4e-05\t26.1\tACTACTGGGGCCA\tACTACTGGGGCCA\t13
# IGBLASTN processed 1 queries
Total queries = 1
Total identifiable CDR3 = 1
Total unique clonotypes = 1
";

    #[test]
    fn test_parse_rearrangement() {
        let report = parse(HEAVY_REPORT);
        assert_eq!(report.query.as_deref(), Some("H_01_read"));
        assert_eq!(report.domain_classification.as_deref(), Some("imgt"));

        let summary = report.rearrangement.as_ref().unwrap();
        assert_eq!(
            summary.top_v.as_ref().unwrap().0,
            vec!["IGHV3-23*01".to_string(), "IGHV3-23*04".to_string()]
        );
        assert_eq!(summary.top_d.as_ref().unwrap().primary(), "IGHD3-10*01");
        assert_eq!(summary.top_j.as_ref().unwrap().primary(), "IGHJ4*02");
        assert_eq!(summary.chain_type.as_deref(), Some("VH"));
        assert_eq!(summary.stop_codon, Some(false));
        assert_eq!(summary.vj_frame.as_deref(), Some("In-frame"));
        assert_eq!(summary.productive, Some(true));
        assert_eq!(summary.strand, Some(Strand::Forward));
    }

    #[test]
    fn test_parse_junction() {
        let report = parse(HEAVY_REPORT);
        let junction = report.junction.as_ref().unwrap();
        assert_eq!(junction.v_end.as_deref(), Some("AGAGA"));
        assert_eq!(junction.v_d_junction.as_deref(), Some("TCCC"));
        assert_eq!(junction.d_region.as_deref(), Some("GTATTACTATG"));
        assert_eq!(junction.d_j_junction.as_deref(), Some("GGGA"));
        assert_eq!(junction.j_start.as_deref(), Some("ACTAC"));
        assert!(junction.v_j_junction.is_none());
        assert_eq!(junction.junction_together, "AGAGATCCCGTATTACTATGGGGAACTAC");
    }

    #[test]
    fn test_parse_alignment_summary() {
        let report = parse(HEAVY_REPORT);
        let fr1 = report.alignment.region(VRegion::Fr1).unwrap();
        assert_eq!(fr1.from, Some(1));
        assert_eq!(fr1.to, Some(75));
        assert_eq!(fr1.length, Some(75));
        assert_eq!(fr1.matches, Some(73));
        assert_eq!(fr1.mismatches, Some(2));
        assert_eq!(fr1.gaps, Some(0));
        assert_eq!(fr1.percent_identity, Some(97.3));

        // CDR3 start agrees with the sub-region line; end comes from it too
        let cdr3 = report.alignment.region(VRegion::Cdr3).unwrap();
        assert!(!report.alignment.cdr3_uncertain);
        assert_eq!(cdr3.from, Some(289));
        assert_eq!(cdr3.to, Some(324));
        assert_eq!(cdr3.length, Some(8));

        let total = report.alignment.total.as_ref().unwrap();
        assert_eq!(total.from, None);
        assert_eq!(total.to, None);
        assert_eq!(total.length, Some(296));
        assert_eq!(total.mismatches, Some(11));
        assert_eq!(total.gaps, Some(0));
    }

    #[test]
    fn test_only_alignment_total_row_selected() {
        let report = parse(HEAVY_REPORT);
        assert_eq!(
            HEAVY_REPORT
                .lines()
                .filter(|l| l.starts_with("Total"))
                .count(),
            4
        );
        let total = report.alignment.total.unwrap();
        assert_eq!(total.matches, Some(285));
        assert_eq!(report.identifiable_cdr3, Some(1));
    }

    #[test]
    fn test_parse_sub_region_cdr3() {
        let report = parse(HEAVY_REPORT);
        let cdr3 = report.cdr3.as_ref().unwrap();
        assert_eq!(cdr3.nucleotides, "GCGAGAGATCCCGTATTACTATGGGGAACTACTGG");
        assert_eq!(cdr3.translation, "ARDPVLLWGTTW");
        assert_eq!(cdr3.start, Some(289));
        assert_eq!(cdr3.end, Some(324));
        assert_eq!(report.cdr3_translation(), Some("ARDPVLLWGTTW"));
    }

    #[test]
    fn test_parse_hit_table() {
        let report = parse(HEAVY_REPORT);
        let v = report.hits.top(SegmentType::V).unwrap();
        assert_eq!(v.get("query_id"), Some(&HitValue::Text("H_01_read".into())));
        assert_eq!(v.subject_id(), Some("IGHV3-23*01"));
        assert_eq!(v.get("%_identity"), Some(&HitValue::Number(96.28)));
        assert_eq!(v.q_start(), Some(1));
        assert_eq!(v.q_end(), Some(296));
        assert_eq!(v.s_start(), Some(1));
        assert_eq!(v.get("evalue"), Some(&HitValue::Number(1.26e-97)));
        assert_eq!(v.subject_seq(), Some("GAGGTG"));

        let d = report.hits.top(SegmentType::D).unwrap();
        assert_eq!(d.q_start(), Some(301));
        assert_eq!(d.s_start(), Some(5));
        let j = report.hits.top(SegmentType::J).unwrap();
        assert_eq!(j.q_end(), Some(328));
        assert_eq!(report.hits.hits(SegmentType::J).len(), 1);
    }

    #[test]
    fn test_reparse_is_identical() {
        assert_eq!(parse(HEAVY_REPORT), parse(HEAVY_REPORT));
    }

    #[test]
    fn test_cdr3_mismatch_clears_summary() {
        let text = HEAVY_REPORT.replace("CDR3-IMGT (germline)\t289", "CDR3-IMGT (germline)\t290");
        let report = parse(&text);
        assert!(report.alignment.cdr3_uncertain);
        let cdr3 = report.alignment.region(VRegion::Cdr3).unwrap();
        assert_eq!(cdr3.length, None);
        assert_eq!(cdr3.matches, None);
        assert_eq!(cdr3.from, Some(289));
        assert_eq!(cdr3.to, Some(324));
    }

    #[test]
    fn test_no_identifiable_cdr3_skips_check() {
        let text = HEAVY_REPORT
            .replace("CDR3-IMGT (germline)\t289", "CDR3-IMGT (germline)\t290")
            .replace("Total identifiable CDR3 = 1", "Total identifiable CDR3 = 0");
        let report = parse(&text);
        assert!(!report.alignment.cdr3_uncertain);
        assert_eq!(
            report.alignment.region(VRegion::Cdr3).unwrap().from,
            Some(290)
        );
    }

    #[test]
    fn test_empty_report() {
        let report = parse("");
        assert_eq!(report, AlignmentReport::default());
        assert!(report.top_v().is_none());
        assert!(report.hits.top(SegmentType::V).is_none());
    }

    #[test]
    fn test_light_chain_junction() {
        let text = "\
# V-(D)-J rearrangement summary for query sequence (Top V gene match, Top J gene match, Chain type, stop codon, V-J frame, Productive, Strand).  Multiple equivalent top matches, if present, are separated by a comma.
IGKV1-39*01\tIGKJ1*01\tVK\tNo\tIn-frame\tNo\t-
# V-(D)-J junction details based on top germline gene matches (V end, V-J junction, J start).  Note that possible overlapping nucleotides at VDJ junction (i.e, nucleotides that could be assigned to either rearranging gene) are indicated in parentheses (i.e., (TACT)) but are not included under the V, D, or J gene itself
CCCTC\tN/A\t(C)\t
";
        let report = parse(text);
        let summary = report.rearrangement.as_ref().unwrap();
        assert_eq!(summary.top_v.as_ref().unwrap().primary(), "IGKV1-39*01");
        assert!(summary.top_d.is_none());
        assert_eq!(summary.chain_type.as_deref(), Some("VK"));
        assert_eq!(summary.productive, Some(false));
        assert_eq!(summary.strand, Some(Strand::Reverse));

        let junction = report.junction.as_ref().unwrap();
        assert_eq!(junction.v_end.as_deref(), Some("CCCTC"));
        assert!(junction.v_j_junction.is_none());
        assert_eq!(junction.overlap.as_deref(), Some("C"));
        assert_eq!(junction.junction_together, "CCCTCC");
    }
}
