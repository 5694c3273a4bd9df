/// Output record of an annotated read
///
/// `build` is a pure function from a `ReadRecord` to named output fields.
/// Primer names come from a `PrimerTable`; the crate ships a TSV-backed
/// table and an empty one.
use std::collections::HashMap;
use std::path::Path;

use crate::error::Error;
use crate::io::sheet;
use crate::read::{ChainType, ReadRecord};
use crate::seq;

/// Placeholder for a primer missing from the table of a functional chain.
pub const PRIMER_NOT_INCLUDED: &str = "Primer not yet included";

/// Restriction sites reported for every read.
pub const RESTRICTION_SITES: [(&str, &str); 4] = [
    ("AgeI", "ACCGGT"),
    ("BsiWI", "CGTACG"),
    ("XhoI", "CTCGAG"),
    ("SalI", "GTCGAC"),
];

/// AgeI positions past which a site followed by the primer overhang is
/// attributed to the cloning primer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportParams {
    pub agei_cutoff_igm: usize,
    pub agei_cutoff_heavy: usize,
    pub agei_cutoff_lambda: usize,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            agei_cutoff_igm: 385,
            agei_cutoff_heavy: 430,
            agei_cutoff_lambda: 330,
        }
    }
}

/// Cloning primer names by chain and gene (gene name without the `IG?V` /
/// `IG?J` prefix).
pub trait PrimerTable: Send + Sync {
    fn five_prime(&self, chain: ChainType, v_gene: &str) -> Option<String>;
    fn three_prime(&self, chain: ChainType, j_gene: &str) -> Option<String>;
}

/// Table without any entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrimers;

impl PrimerTable for NoPrimers {
    fn five_prime(&self, _chain: ChainType, _v_gene: &str) -> Option<String> {
        None
    }

    fn three_prime(&self, _chain: ChainType, _j_gene: &str) -> Option<String> {
        None
    }
}

/// Primer table loaded from a TSV with `table`, `gene` and `primer` columns,
/// where `table` is one of IGHV, IGHJ, IGKV, IGKJ, IGLV, IGLJ.
#[derive(Debug, Clone, Default)]
pub struct TsvPrimerTable {
    entries: HashMap<(String, String), String>,
}

impl TsvPrimerTable {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let table = sheet::Table::read(path)?;
        let mut entries = HashMap::new();
        for row in table.rows() {
            let (Some(kind), Some(gene), Some(primer)) =
                (row.get("table"), row.get("gene"), row.get("primer"))
            else {
                return Err(Error::Sheet(format!(
                    "{}: primer table needs table, gene and primer columns",
                    path.display()
                )));
            };
            entries.insert((kind.to_string(), gene.to_string()), primer.to_string());
        }
        log::info!("Loaded {} primers from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    fn lookup(&self, chain: ChainType, segment: char, gene: &str) -> Option<String> {
        let kind = format!("IG{}{}", chain.letter(), segment);
        self.entries.get(&(kind, gene.to_string())).cloned()
    }
}

impl PrimerTable for TsvPrimerTable {
    fn five_prime(&self, chain: ChainType, v_gene: &str) -> Option<String> {
        self.lookup(chain, 'V', v_gene)
    }

    fn three_prime(&self, chain: ChainType, j_gene: &str) -> Option<String> {
        self.lookup(chain, 'J', j_gene)
    }
}

/// Named output fields of one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    pub seq_id: String,
    pub qv: u32,
    pub rl: usize,
    pub confirmation: String,
    pub comment: String,
    /// `Y` productive, `N` non-productive, `BQ` not annotated
    pub function: String,
    pub chain: ChainType,
    pub v_gene: Option<String>,
    pub d_gene: Option<String>,
    pub j_gene: Option<String>,
    pub subclass: Option<String>,
    pub cdr3: Option<String>,
    pub shm: Option<String>,
    pub five_prime_primer: Option<String>,
    pub three_prime_primer: Option<String>,
    /// `(site name, Y(pos) | Y(P,pos) | N)` in `RESTRICTION_SITES` order
    pub restriction_sites: Vec<(String, String)>,
}

impl ExportRecord {
    fn basic(record: &ReadRecord) -> Self {
        Self {
            seq_id: record.name.split('.').next().unwrap_or_default().to_string(),
            qv: record.mean_quality,
            rl: record.len(),
            confirmation: "to be confirmed".to_string(),
            comment: record.comment.clone(),
            function: "BQ".to_string(),
            chain: record.chain_type,
            v_gene: None,
            d_gene: None,
            j_gene: None,
            subclass: None,
            cdr3: None,
            shm: None,
            five_prime_primer: None,
            three_prime_primer: None,
            restriction_sites: Vec::new(),
        }
    }

    pub fn is_functional(&self) -> bool {
        self.function == "Y"
    }

    /// Logical columns and values. Gene and SHM columns carry the chain
    /// letter, e.g. `IGKV`, `SHM IGKV`, `SHM IGVK`.
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("Seq_ID".to_string(), self.seq_id.clone()),
            ("QV".to_string(), self.qv.to_string()),
            ("RL".to_string(), self.rl.to_string()),
            ("Confirmation".to_string(), self.confirmation.clone()),
            ("Comment".to_string(), self.comment.clone()),
            ("Function".to_string(), self.function.clone()),
        ];
        if self.function == "BQ" || self.chain == ChainType::Unknown {
            return fields;
        }

        let c = self.chain.letter();
        let mut push = |key: String, value: Option<&String>| {
            fields.push((key, value.cloned().unwrap_or_default()));
        };
        push(format!("IG{}V", c), self.v_gene.as_ref());
        if self.chain == ChainType::Heavy {
            push(format!("IG{}D", c), self.d_gene.as_ref());
        }
        push(format!("IG{}J", c), self.j_gene.as_ref());
        if self.chain == ChainType::Heavy {
            push("IgSC".to_string(), self.subclass.as_ref());
        }

        let cdr3 = self.cdr3.clone().unwrap_or_else(|| "N/A".to_string());
        let cdr3_len = self
            .cdr3
            .as_ref()
            .map(|s| s.len().to_string())
            .unwrap_or_default();
        fields.push(("CDR3".to_string(), cdr3.clone()));
        if self.chain == ChainType::Heavy {
            fields.push(("CDR3 IGHV".to_string(), cdr3));
        }
        fields.push(("CDR3L".to_string(), cdr3_len));

        let shm = self.shm.clone().unwrap_or_else(|| "N/A".to_string());
        fields.push(("SHM".to_string(), shm.clone()));
        fields.push((format!("SHM IG{}V", c), shm.clone()));
        fields.push((format!("SHM IGV{}", c), shm));

        fields.push((
            "5' Primer".to_string(),
            self.five_prime_primer.clone().unwrap_or_default(),
        ));
        fields.push((
            "3' Primer".to_string(),
            self.three_prime_primer.clone().unwrap_or_default(),
        ));
        fields.extend(self.restriction_sites.iter().cloned());
        fields
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.fields()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// SHM count of the V gene: total mismatches, with gaps appended when
/// present. `N/A` without an alignment total.
pub fn shm(record: &ReadRecord) -> String {
    let total = record
        .report
        .as_ref()
        .and_then(|r| r.alignment.total.as_ref());
    match total.and_then(|t| t.mismatches.map(|m| (m, t.gaps))) {
        Some((mismatches, Some(gaps))) if gaps != 0 => {
            format!("{} (+{} gaps)", mismatches, gaps)
        }
        Some((mismatches, _)) => mismatches.to_string(),
        None => "N/A".to_string(),
    }
}

fn strip_gene(gene: &str, chain: ChainType, segment: char) -> String {
    gene.replace(&format!("IG{}{}", chain.letter(), segment), "")
}

fn restriction_site(
    record: &ReadRecord,
    name: &str,
    motif: &str,
    params: &ExportParams,
) -> String {
    let Some(pos) = seq::find(&record.sequence, motif.as_bytes()) else {
        return "N".to_string();
    };
    if name == "AgeI" {
        let rule = match record.chain_type {
            ChainType::Heavy => {
                let igm = record
                    .subclass
                    .as_ref()
                    .is_some_and(|s| s.subclass == "IgM");
                let cutoff = if igm {
                    params.agei_cutoff_igm
                } else {
                    params.agei_cutoff_heavy
                };
                Some((cutoff, "TGC"))
            }
            ChainType::Lambda => Some((params.agei_cutoff_lambda, "AGC")),
            _ => None,
        };
        if let Some((cutoff, overhang)) = rule {
            let extended = format!("{}{}", motif, overhang);
            if pos > cutoff && seq::find(&record.sequence, extended.as_bytes()) == Some(pos) {
                return format!("Y(P,{})", pos);
            }
        }
    }
    format!("Y({})", pos)
}

/// Build the output record of one read.
pub fn build(record: &ReadRecord, primers: &dyn PrimerTable, params: &ExportParams) -> ExportRecord {
    let mut out = ExportRecord::basic(record);
    let Some(report) = record.report.as_ref().filter(|_| record.is_success()) else {
        return out;
    };
    let chain = record.chain_type;

    out.function = if record.is_productive() { "Y" } else { "N" }.to_string();
    out.v_gene = report.top_v().map(|g| strip_gene(g.primary(), chain, 'V'));
    out.d_gene = report.top_d().map(|g| strip_gene(g.primary(), chain, 'D'));
    out.j_gene = report.top_j().map(|g| strip_gene(g.primary(), chain, 'J'));
    if chain == ChainType::Heavy {
        out.subclass = record.subclass.as_ref().map(|s| s.subclass.clone());
    }
    out.cdr3 = report.cdr3_translation().map(str::to_string);
    out.shm = Some(shm(record));

    let functional = out.is_functional();
    let missing = || {
        if functional {
            PRIMER_NOT_INCLUDED.to_string()
        } else {
            String::new()
        }
    };
    let five = out
        .v_gene
        .as_deref()
        .and_then(|g| primers.five_prime(chain, g))
        .unwrap_or_else(missing);
    let three = out
        .j_gene
        .as_deref()
        .and_then(|g| primers.three_prime(chain, g))
        .unwrap_or_else(missing);
    out.five_prime_primer = Some(five);
    out.three_prime_primer = Some(three);

    out.restriction_sites = RESTRICTION_SITES
        .iter()
        .map(|(name, motif)| {
            (
                name.to_string(),
                restriction_site(record, name, motif, params),
            )
        })
        .collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::testutil::Synthetic;
    use crate::read::SubclassCall;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct OnePrimer;

    impl PrimerTable for OnePrimer {
        fn five_prime(&self, chain: ChainType, v_gene: &str) -> Option<String> {
            (chain == ChainType::Heavy && v_gene == "3-23*01").then(|| "H 3-23".to_string())
        }

        fn three_prime(&self, _chain: ChainType, _j_gene: &str) -> Option<String> {
            None
        }
    }

    fn value(record: &ExportRecord, key: &str) -> String {
        record
            .get(key)
            .unwrap_or_else(|| panic!("no field {}", key))
    }

    #[test]
    fn test_heavy_fields() {
        let record = Synthetic::heavy().record("H_01.ab.fastq");
        let out = build(&record, &OnePrimer, &ExportParams::default());
        assert_eq!(out.seq_id, "H_01");
        assert_eq!(value(&out, "Function"), "Y");
        assert_eq!(value(&out, "Confirmation"), "to be confirmed");
        assert_eq!(value(&out, "IGHV"), "3-23*01");
        assert_eq!(value(&out, "IGHD"), "3-10*01");
        assert_eq!(value(&out, "IGHJ"), "4*02");
        assert_eq!(value(&out, "IgSC"), "IgG1");
        assert_eq!(value(&out, "SHM"), "0");
        assert_eq!(value(&out, "SHM IGHV"), "0");
        assert_eq!(value(&out, "SHM IGVH"), "0");
        assert_eq!(value(&out, "CDR3"), value(&out, "CDR3 IGHV"));
        // CDR3 comes from the report's sub-region translation
        let report = record.report.as_ref().unwrap();
        assert_eq!(Some(value(&out, "CDR3").as_str()), report.cdr3_translation());
        assert_eq!(value(&out, "CDR3L"), "12");
        assert_eq!(value(&out, "5' Primer"), "H 3-23");
        assert_eq!(value(&out, "3' Primer"), PRIMER_NOT_INCLUDED);
        // the 5' flank carries an AgeI site well before the cutoff
        assert!(value(&out, "AgeI").starts_with("Y("));
        assert!(!value(&out, "AgeI").starts_with("Y(P"));
        let sali = seq::find(&record.sequence, b"GTCGAC").unwrap();
        assert_eq!(value(&out, "SalI"), format!("Y({})", sali));
    }

    #[test]
    fn test_kappa_fields() {
        let record = Synthetic {
            productive: false,
            ..Synthetic::kappa()
        }
        .record("K_02.fastq");
        let out = build(&record, &NoPrimers, &ExportParams::default());
        assert_eq!(value(&out, "Function"), "N");
        assert_eq!(value(&out, "IGKV"), "1-39*01");
        assert!(out.get("IGKD").is_none());
        assert!(out.get("IgSC").is_none());
        assert!(out.get("CDR3 IGHV").is_none());
        assert_eq!(value(&out, "SHM IGVK"), "0");
        // non-functional chains leave missing primers empty
        assert_eq!(value(&out, "5' Primer"), "");
        assert_eq!(value(&out, "3' Primer"), "");
    }

    #[test]
    fn test_failed_read_fields() {
        let mut record = Synthetic::heavy().record("H_03.fastq");
        record.status = crate::read::Status::Failed(crate::read::FailureReason::NoHits);
        record.comment = "No hits. ".to_string();
        let out = build(&record, &NoPrimers, &ExportParams::default());
        assert_eq!(out.function, "BQ");
        let keys: Vec<String> = out.fields().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["Seq_ID", "QV", "RL", "Confirmation", "Comment", "Function"]
        );
    }

    #[test]
    fn test_shm_with_gaps() {
        let mut record = Synthetic::heavy().record("H_04.fastq");
        let total = record
            .report
            .as_mut()
            .unwrap()
            .alignment
            .total
            .as_mut()
            .unwrap();
        total.mismatches = Some(7);
        total.gaps = Some(2);
        assert_eq!(shm(&record), "7 (+2 gaps)");
        record.report = None;
        assert_eq!(shm(&record), "N/A");
    }

    #[test]
    fn test_agei_primer_rule() {
        let mut record = Synthetic::heavy().record("H_05.fastq");
        let mut sequence = vec![b'C'; 440];
        sequence.extend_from_slice(b"ACCGGTTGCAAA");
        record.sequence = sequence;
        let params = ExportParams::default();
        assert_eq!(
            restriction_site(&record, "AgeI", "ACCGGT", &params),
            "Y(P,440)"
        );

        // IgM uses the lower cutoff
        record.sequence = [vec![b'C'; 400], b"ACCGGTTGC".to_vec()].concat();
        assert_eq!(restriction_site(&record, "AgeI", "ACCGGT", &params), "Y(400)");
        record.subclass = Some(SubclassCall {
            subclass: "IgM".to_string(),
            confidence: crate::read::Confidence::Heuristic,
            comment: None,
        });
        assert_eq!(
            restriction_site(&record, "AgeI", "ACCGGT", &params),
            "Y(P,400)"
        );

        // kappa has no primer rule
        record.chain_type = ChainType::Kappa;
        assert_eq!(restriction_site(&record, "AgeI", "ACCGGT", &params), "Y(400)");
        record.sequence = vec![b'C'; 50];
        assert_eq!(restriction_site(&record, "AgeI", "ACCGGT", &params), "N");
    }

    #[test]
    fn test_tsv_primer_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "table\tgene\tprimer").unwrap();
        writeln!(file, "IGHV\t3-23*01\tH3 5'").unwrap();
        writeln!(file, "IGKJ\t1*01\tK 3'").unwrap();
        file.flush().unwrap();

        let table = TsvPrimerTable::load(file.path()).unwrap();
        assert_eq!(
            table.five_prime(ChainType::Heavy, "3-23*01").as_deref(),
            Some("H3 5'")
        );
        assert_eq!(
            table.three_prime(ChainType::Kappa, "1*01").as_deref(),
            Some("K 3'")
        );
        assert!(table.five_prime(ChainType::Kappa, "3-23*01").is_none());
    }
}
