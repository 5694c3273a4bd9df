/// External aligner collaborator
///
/// This module handles:
/// - The `Aligner` seam the read pipeline calls for each Sanger read
/// - The IgBLAST/BLAST process runner (`igblast`)
/// - Parsing the constant-region hit table returned next to the report
mod igblast;

pub use igblast::{AlignerConfig, IgBlast};

use crate::error::Error;
use crate::io::fastq::SangerRead;

/// Raw text produced for one read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignerOutput {
    /// IgBLAST outfmt 7 report against the V/D/J germline databases
    pub report: String,
    /// BLAST tabular hits (`qseqid sseqid evalue bitscore`) against the
    /// constant-region database
    pub constant_hits: String,
}

/// Anything that can turn a read into IgBLAST/BLAST text output.
pub trait Aligner: Send + Sync {
    fn align(&self, read: &SangerRead) -> Result<AlignerOutput, Error>;
}

/// One row of the constant-region hit table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantHit {
    pub query_id: String,
    pub subject_id: String,
    pub evalue: f64,
    pub bit_score: f64,
}

/// Parse the data rows of a `7 qseqid sseqid evalue bitscore` table.
/// Comment lines and rows that do not have four columns are skipped.
pub fn parse_constant_hits(text: &str) -> Vec<ConstantHit> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            Some(ConstantHit {
                query_id: fields[0].to_string(),
                subject_id: fields[1].to_string(),
                evalue: fields[2].parse().ok()?,
                bit_score: fields[3].parse().ok()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_constant_hits() {
        let text = "\
# BLASTN 2.9.0+
# Query: H_01
# Database: human_gl_C
# Fields: query id, subject id, evalue, bit score
# 2 hits found
H_01\tIgG1\t3.2e-45\t172
H_01\tIgG3\t1.1e-30\t 95.3
# BLAST processed 1 queries
";
        let hits = parse_constant_hits(text);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].subject_id, "IgG1");
        assert_eq!(hits[0].evalue, 3.2e-45);
        assert_eq!(hits[0].bit_score, 172.0);
        assert_eq!(hits[1].bit_score, 95.3);
    }

    #[test]
    fn test_parse_constant_hits_skips_malformed() {
        let text = "# Fields: query id\nH_01\tIgM\n\nH_01\tIgA1\tnot-a-number\t80\n";
        assert!(parse_constant_hits(text).is_empty());
    }
}
