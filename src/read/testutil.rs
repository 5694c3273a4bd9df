//! Synthetic reads and IgBLAST reports for unit tests.
//!
//! A `Synthetic` describes one read: a pseudo-random germline (V, junctions,
//! D, J) flanked by cloning-primer sequence, optional point mutations, and
//! the report IgBLAST would write for it.
use std::fmt::Write as _;

use super::{ChainType, ReadRecord, Settings};
use crate::aligner::{Aligner, AlignerOutput};
use crate::error::Error;
use crate::io::fastq::SangerRead;
use crate::seq::{reverse_complement, translate_codon, AminoAcid};

pub const H_FLANK_5: &str = "ATGGGATGGTCATGTATCATCCTTTTTCTAGTAGCAACTGCAACCGGTGTACATTC";
pub const H_FLANK_3: &str = "TCAGCGTCGACCAAGGGCCCATCGGTCTTCCCCCTGGCACCCTCC";
pub const K_FLANK_5: &str = "ATGGGATGGTCATGTATCATCCTTTTTCTAGTAGCAACTGCAACCGGTGTACATT";
pub const K_FLANK_3: &str = "ATCAAACGTACGGTGGCTGCACCATCTGTCTTCATCTTCCCGCCA";

/// Codon-by-codon translation for the CDR3 sub-region line.
fn translate(seq: &[u8]) -> String {
    seq.chunks_exact(3)
        .map(|c| match translate_codon(c) {
            AminoAcid::Residue(aa) => aa as char,
            _ => 'X',
        })
        .collect()
}

const V_LEN: usize = 296;
/// FR1, CDR1, FR2, CDR2, FR3, CDR3-IMGT lengths inside V
const SUB_REGIONS: [(&str, usize); 6] = [
    ("FR1-IMGT", 75),
    ("CDR1-IMGT", 24),
    ("FR2-IMGT", 51),
    ("CDR2-IMGT", 24),
    ("FR3-IMGT", 114),
    ("CDR3-IMGT (germline)", 8),
];

/// Aligner returning canned text.
pub struct FakeAligner {
    result: Result<AlignerOutput, String>,
}

impl FakeAligner {
    pub fn new(output: AlignerOutput) -> Self {
        Self { result: Ok(output) }
    }

    pub fn with_report(report: &str) -> Self {
        Self::new(AlignerOutput {
            report: report.to_string(),
            constant_hits: String::new(),
        })
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

impl Aligner for FakeAligner {
    fn align(&self, _read: &SangerRead) -> Result<AlignerOutput, Error> {
        self.result.clone().map_err(Error::Aligner)
    }
}

fn pseudo_random(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            b"ACGT"[((state >> 33) % 4) as usize]
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Synthetic {
    pub chain: ChainType,
    pub reverse: bool,
    /// `(offset from V start, new base)`
    pub mutations: Vec<(usize, u8)>,
    pub v_subject_start: u32,
    pub productive: bool,
    pub v_gene: String,
    pub j_gene: String,
    pub prefix: Vec<u8>,
    pub suffix: Vec<u8>,
    pub quality: u8,
    pub constant_hits: String,
}

impl Synthetic {
    pub fn heavy() -> Self {
        Self {
            chain: ChainType::Heavy,
            reverse: false,
            mutations: Vec::new(),
            v_subject_start: 1,
            productive: true,
            v_gene: "IGHV3-23*01".to_string(),
            j_gene: "IGHJ4*02".to_string(),
            prefix: H_FLANK_5.as_bytes().to_vec(),
            suffix: H_FLANK_3.as_bytes().to_vec(),
            quality: 35,
            constant_hits: "read\tIgG1\t1e-50\t150\n".to_string(),
        }
    }

    pub fn kappa() -> Self {
        Self {
            chain: ChainType::Kappa,
            v_gene: "IGKV1-39*01".to_string(),
            j_gene: "IGKJ1*01".to_string(),
            prefix: K_FLANK_5.as_bytes().to_vec(),
            suffix: K_FLANK_3.as_bytes().to_vec(),
            constant_hits: String::new(),
            ..Self::heavy()
        }
    }

    fn v(&self) -> Vec<u8> {
        match self.chain {
            ChainType::Heavy => pseudo_random(11, V_LEN),
            _ => pseudo_random(23, V_LEN),
        }
    }

    fn d(&self) -> Vec<u8> {
        pseudo_random(37, 12)
    }

    fn j(&self) -> Vec<u8> {
        match self.chain {
            ChainType::Heavy => pseudo_random(53, 45),
            _ => pseudo_random(71, 38),
        }
    }

    pub fn v_len(&self) -> usize {
        V_LEN
    }

    /// Germline V through J.
    pub fn germline(&self) -> Vec<u8> {
        let mut seq = self.v();
        if self.chain == ChainType::Heavy {
            seq.extend_from_slice(b"GG");
            seq.extend(self.d());
            seq.extend_from_slice(b"C");
        } else {
            seq.extend_from_slice(b"TC");
        }
        seq.extend(self.j());
        seq
    }

    /// Aligned part of the read: germline with the mutations applied.
    pub fn insert(&self) -> Vec<u8> {
        let mut seq = self.germline();
        for &(pos, base) in &self.mutations {
            seq[pos] = base;
        }
        seq
    }

    pub fn v_query_start(&self) -> u32 {
        self.prefix.len() as u32 + 1
    }

    /// Read in germline orientation.
    pub fn oriented(&self) -> Vec<u8> {
        let mut seq = self.prefix.clone();
        seq.extend(self.insert());
        seq.extend_from_slice(&self.suffix);
        seq
    }

    pub fn raw(&self) -> Vec<u8> {
        if self.reverse {
            reverse_complement(&self.oriented())
        } else {
            self.oriented()
        }
    }

    pub fn read(&self, name: &str) -> SangerRead {
        let raw = self.raw();
        SangerRead::new(name, &raw, vec![self.quality; raw.len()])
    }

    pub fn aligner(&self) -> FakeAligner {
        FakeAligner::new(AlignerOutput {
            report: self.report(),
            constant_hits: self.constant_hits.clone(),
        })
    }

    pub fn record(&self, name: &str) -> ReadRecord {
        self.record_with(name, &Settings::default())
    }

    pub fn record_with(&self, name: &str, settings: &Settings) -> ReadRecord {
        ReadRecord::build(&self.read(name), &self.aligner(), settings)
    }

    /// First position at or after `from` inside V where one substitution
    /// changes (`silent == false`) or keeps (`silent == true`) the amino acid.
    pub fn substitution(&self, from: usize, silent: bool) -> (usize, u8) {
        let germline = self.germline();
        let frame = self.v_subject_start as usize - 1;
        for pos in from..V_LEN {
            let Some(start) = (pos / 3 * 3).checked_sub(frame) else {
                continue;
            };
            if start + 3 > germline.len() || pos < start || pos >= start + 3 {
                continue;
            }
            for &alt in b"ACGT" {
                if alt == germline[pos] {
                    continue;
                }
                let mut codon = germline[start..start + 3].to_vec();
                codon[pos - start] = alt;
                let same = translate_codon(&codon) == translate_codon(&germline[start..start + 3]);
                if same == silent {
                    return (pos, alt);
                }
            }
        }
        panic!("no substitution found after {}", from)
    }

    pub fn nonsilent_substitution(&self, from: usize) -> (usize, u8) {
        self.substitution(from, false)
    }

    pub fn silent_substitution(&self, from: usize) -> (usize, u8) {
        self.substitution(from, true)
    }

    /// IgBLAST outfmt 7 report for this read.
    pub fn report(&self) -> String {
        let heavy = self.chain == ChainType::Heavy;
        let offset = self.prefix.len() as u32;
        let v = self.v();
        let j = self.j();
        let insert = self.insert();
        let germline = self.germline();
        let v_mismatches = self.mutations.iter().filter(|(p, _)| *p < V_LEN).count();
        let strand = if self.reverse { "-" } else { "+" };
        let productive = if self.productive { "Yes" } else { "No" };
        let v_end = String::from_utf8_lossy(&v[V_LEN - 5..]).into_owned();
        let j_start = String::from_utf8_lossy(&j[..5]).into_owned();

        let mut out = String::new();
        let _ = writeln!(out, "# IGBLASTN 1.17.1");
        let _ = writeln!(out, "# Query: read");
        let _ = writeln!(out, "# Domain classification requested: imgt");
        let _ = writeln!(out);
        if heavy {
            let _ = writeln!(out, "# V-(D)-J rearrangement summary for query sequence (Top V gene match, Top D gene match, Top J gene match, Chain type, stop codon, V-J frame, Productive, Strand).  Multiple equivalent top matches, if present, are separated by a comma.");
            let _ = writeln!(
                out,
                "{}\tIGHD3-10*01\t{}\tVH\tNo\tIn-frame\t{}\t{}",
                self.v_gene, self.j_gene, productive, strand
            );
            let _ = writeln!(out);
            let _ = writeln!(out, "# V-(D)-J junction details based on top germline gene matches (V end, V-D junction, D region, D-J junction, J start).  Note that possible overlapping nucleotides at VDJ junction (i.e, nucleotides that could be assigned to either rearranging gene) are indicated in parentheses (i.e., (TACT)) but are not included under the V, D, or J gene itself");
            let _ = writeln!(
                out,
                "{}\tGG\t{}\tC\t{}\t",
                v_end,
                String::from_utf8_lossy(&self.d()),
                j_start
            );
        } else {
            let chain = match self.chain {
                ChainType::Lambda => "VL",
                _ => "VK",
            };
            let _ = writeln!(out, "# V-(D)-J rearrangement summary for query sequence (Top V gene match, Top J gene match, Chain type, stop codon, V-J frame, Productive, Strand).  Multiple equivalent top matches, if present, are separated by a comma.");
            let _ = writeln!(
                out,
                "{}\t{}\t{}\tNo\tIn-frame\t{}\t{}",
                self.v_gene, self.j_gene, chain, productive, strand
            );
            let _ = writeln!(out);
            let _ = writeln!(out, "# V-(D)-J junction details based on top germline gene matches (V end, V-J junction, J start).  Note that possible overlapping nucleotides at VDJ junction (i.e, nucleotides that could be assigned to either rearranging gene) are indicated in parentheses (i.e., (TACT)) but are not included under the V, D, or J gene itself");
            let _ = writeln!(out, "{}\tTC\t{}\t", v_end, j_start);
        }
        let _ = writeln!(out);

        let cdr3_from = 288usize;
        let cdr3_to = cdr3_from + 36;
        let cdr3 = &insert[cdr3_from..cdr3_to];
        let _ = writeln!(
            out,
            "# Sub-region sequence details (nucleotide sequence, translation, start, end)"
        );
        let _ = writeln!(
            out,
            "CDR3\t{}\t{}\t{}\t{}\t",
            String::from_utf8_lossy(cdr3),
            translate(cdr3),
            offset + cdr3_from as u32 + 1,
            offset + cdr3_to as u32
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "# Alignment summary between query and top germline V gene hit (from, to, length, matches, mismatches, gaps, percent identity)");
        let mut from = 0usize;
        for (prefix, len) in SUB_REGIONS {
            let mismatches = self
                .mutations
                .iter()
                .filter(|(p, _)| (from..from + len).contains(p))
                .count();
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t0\t{:.1}",
                prefix,
                offset as usize + from + 1,
                offset as usize + from + len,
                len,
                len - mismatches,
                mismatches,
                100.0 * (len - mismatches) as f64 / len as f64
            );
            from += len;
        }
        let _ = writeln!(
            out,
            "Total\tN/A\tN/A\t{}\t{}\t{}\t0\t{:.1}",
            V_LEN,
            V_LEN - v_mismatches,
            v_mismatches,
            100.0 * (V_LEN - v_mismatches) as f64 / V_LEN as f64
        );
        let _ = writeln!(out);

        let _ = writeln!(
            out,
            "# Hit table (the first field indicates the chain type of the hit)"
        );
        let _ = writeln!(out, "# Fields: query id, subject id, % identity, alignment length, mismatches, gap opens, gap extends, q. start, q. end, s. start, s. end, evalue, bit score, query seq, subject seq, btop");
        let _ = writeln!(out, "# {} hits found", if heavy { 3 } else { 2 });

        let v_query = &insert[..V_LEN];
        let hit = |out: &mut String, kind: char, gene: &str, start: usize, query: &[u8], subject: &[u8], s_start: u32| {
            let _ = writeln!(
                out,
                "{}\tread\t{}\t100.00\t{}\t0\t0\t0\t{}\t{}\t{}\t{}\t1e-50\t200\t{}\t{}\t{}",
                kind,
                gene,
                query.len(),
                offset as usize + start + 1,
                offset as usize + start + query.len(),
                s_start,
                s_start as usize + subject.len() - 1,
                String::from_utf8_lossy(query),
                String::from_utf8_lossy(subject),
                query.len()
            );
        };
        hit(&mut out, 'V', &self.v_gene, 0, v_query, &v, self.v_subject_start);
        let mut start = V_LEN;
        if heavy {
            let d = self.d();
            start += 2;
            hit(&mut out, 'D', "IGHD3-10*01", start, &insert[start..start + d.len()], &d, 3);
            start += d.len() + 1;
        } else {
            start += 2;
        }
        hit(&mut out, 'J', &self.j_gene, start, &insert[start..], &j, 4);
        debug_assert_eq!(germline.len(), insert.len());

        let _ = writeln!(out, "# IGBLASTN processed 1 queries");
        let _ = writeln!(out, "Total queries = 1");
        let _ = writeln!(out, "Total identifiable CDR3 = 1");
        let _ = writeln!(out, "Total unique clonotypes = 1");
        out
    }
}
