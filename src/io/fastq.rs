/// Sanger read input from FASTQ (plain or gzip compressed)
use crate::error::Error;
use flate2::read::GzDecoder;
use noodles::fastq;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Offset of Phred+33 quality characters.
const PHRED_OFFSET: u8 = 33;

/// One Sanger trace, already base-called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SangerRead {
    /// Read identifier from the FASTQ header
    pub name: String,
    /// File the read was loaded from
    pub path: PathBuf,
    /// Uppercase ASCII bases
    pub sequence: Vec<u8>,
    /// Phred scores (offset already removed)
    pub quality: Vec<u8>,
}

impl SangerRead {
    pub fn new(name: impl Into<String>, sequence: &[u8], quality: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            sequence: sequence.to_ascii_uppercase(),
            quality,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Integer mean Phred score (floor); 0 for a read without qualities.
    pub fn mean_quality(&self) -> u32 {
        let sum: u64 = self.quality.iter().map(|&q| q as u64).sum();
        (sum / self.quality.len().max(1) as u64) as u32
    }

    /// Name used in messages: the file name when known, else the read name.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Write the read as a single FASTA record (aligner query input).
    pub fn write_fasta<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, ">{}", self.name)?;
        for line in self.sequence.chunks(60) {
            out.write_all(line)?;
            writeln!(out)?;
        }
        Ok(())
    }
}

/// FASTQ reader that handles decompression
pub struct FastqReader {
    inner: fastq::Reader<Box<dyn BufRead + Send>>,
}

impl FastqReader {
    /// Open a FASTQ file; `.gz`/`.gzip` files are decompressed on the fly
    pub fn open(path: &Path) -> Result<Self, Error> {
        let path_str = path.to_string_lossy();
        let is_gzipped = path_str.ends_with(".gz") || path_str.ends_with(".gzip");

        let file = File::open(path).map_err(|e| Error::io(e, path))?;
        let reader: Box<dyn BufRead + Send> = if is_gzipped {
            Box::new(BufReader::new(GzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        Ok(Self {
            inner: fastq::Reader::new(reader),
        })
    }

    /// Next record, with qualities converted to Phred scores
    pub fn next_read(&mut self, path: &Path) -> Result<Option<SangerRead>, Error> {
        match self.inner.records().next() {
            Some(Ok(record)) => {
                let name = std::str::from_utf8(record.name())
                    .map_err(|e| Error::Fastq(format!("invalid UTF-8 in read name: {}", e)))?
                    .to_string();

                let quality = record
                    .quality_scores()
                    .iter()
                    .map(|&q| {
                        q.checked_sub(PHRED_OFFSET).ok_or_else(|| {
                            Error::Fastq(format!("quality character {:#04x} below '!'", q))
                        })
                    })
                    .collect::<Result<Vec<u8>, Error>>()?;

                Ok(Some(SangerRead {
                    name,
                    path: path.to_path_buf(),
                    sequence: record.sequence().to_ascii_uppercase(),
                    quality,
                }))
            }
            Some(Err(e)) => Err(Error::io(e, path)),
            None => Ok(None),
        }
    }
}

/// Load the Sanger read stored in `path`. Only the first record is used;
/// further records are ignored with a warning.
pub fn load_read(path: &Path) -> Result<SangerRead, Error> {
    let mut reader = FastqReader::open(path)?;
    let read = reader
        .next_read(path)?
        .ok_or_else(|| Error::Fastq(format!("no reads in {}", path.display())))?;
    if read.quality.len() != read.sequence.len() {
        return Err(Error::Fastq(format!(
            "{}: sequence and quality lengths differ ({} vs {})",
            path.display(),
            read.sequence.len(),
            read.quality.len()
        )));
    }
    if reader.next_read(path)?.is_some() {
        log::warn!(
            "{} holds more than one read; using '{}'",
            path.display(),
            read.name
        );
    }
    Ok(read)
}
