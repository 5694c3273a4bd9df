/// Nucleotide helpers: reverse complement, codon translation, motif search.
///
/// Sequences are plain ASCII bytes (`b"ACGT..."`). Lowercase input is
/// accepted everywhere and treated as uppercase.

/// Complement of a single IUPAC nucleotide. Unknown symbols (gaps, `*`)
/// pass through unchanged.
pub fn complement_base(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        b'S' => b'S',
        b'W' => b'W',
        b'N' => b'N',
        other => other,
    }
}

/// Reverse complement of a nucleotide sequence.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement_base(b)).collect()
}

/// Position of the first occurrence of `motif` in `seq`.
pub fn find(seq: &[u8], motif: &[u8]) -> Option<usize> {
    if motif.is_empty() {
        return Some(0);
    }
    if motif.len() > seq.len() {
        return None;
    }
    seq.windows(motif.len()).position(|w| w == motif)
}

/// Whether `motif` occurs anywhere in `seq`.
pub fn contains(seq: &[u8], motif: &[u8]) -> bool {
    find(seq, motif).is_some()
}

/// Result of translating one codon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AminoAcid {
    /// A resolved residue (one-letter code, `*` for stop).
    Residue(u8),
    /// Ambiguous bases that do not resolve to a single residue (`X`).
    Ambiguous,
    /// Fewer than three bases were available.
    Incomplete,
    /// The codon contains a gap or a symbol that is not a nucleotide.
    Undetermined,
}

impl std::fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Residue(aa) => write!(f, "{}", *aa as char),
            Self::Ambiguous => write!(f, "X"),
            Self::Incomplete => write!(f, ""),
            Self::Undetermined => write!(f, "n/d"),
        }
    }
}

const BASES: [u8; 4] = [b'T', b'C', b'A', b'G'];

// Standard genetic code, indexed TCAG x TCAG x TCAG.
const CODE: &[u8; 64] = b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

fn base_index(base: u8) -> Option<usize> {
    BASES.iter().position(|&b| b == base)
}

/// IUPAC expansion to concrete bases; `None` for non-nucleotide symbols.
fn expand(base: u8) -> Option<&'static [u8]> {
    Some(match base.to_ascii_uppercase() {
        b'A' => b"A",
        b'C' => b"C",
        b'G' => b"G",
        b'T' | b'U' => b"T",
        b'R' => b"AG",
        b'Y' => b"CT",
        b'K' => b"GT",
        b'M' => b"AC",
        b'S' => b"CG",
        b'W' => b"AT",
        b'B' => b"CGT",
        b'D' => b"AGT",
        b'H' => b"ACT",
        b'V' => b"ACG",
        b'N' => b"ACGT",
        _ => return None,
    })
}

/// Translate a single codon with the standard code.
///
/// Ambiguity codes are expanded: `GGN` still yields `G`, while `NNN` yields
/// [`AminoAcid::Ambiguous`].
pub fn translate_codon(codon: &[u8]) -> AminoAcid {
    if codon.len() < 3 {
        return AminoAcid::Incomplete;
    }
    let (Some(b1), Some(b2), Some(b3)) = (expand(codon[0]), expand(codon[1]), expand(codon[2]))
    else {
        return AminoAcid::Undetermined;
    };

    let mut resolved: Option<u8> = None;
    for &x in b1 {
        for &y in b2 {
            for &z in b3 {
                // expand() only yields ACGT, so all three indices exist
                let (Some(i), Some(j), Some(k)) = (base_index(x), base_index(y), base_index(z))
                else {
                    return AminoAcid::Undetermined;
                };
                let aa = CODE[i * 16 + j * 4 + k];
                match resolved {
                    None => resolved = Some(aa),
                    Some(prev) if prev != aa => return AminoAcid::Ambiguous,
                    Some(_) => {}
                }
            }
        }
    }
    resolved.map_or(AminoAcid::Undetermined, AminoAcid::Residue)
}
