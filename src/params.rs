use std::path::PathBuf;

use clap::Parser;

use crate::aligner::AlignerConfig;
use crate::compare::CompareParams;
use crate::export::ExportParams;
use crate::io::sheet::FileResolver;
use crate::read::{Settings, SubclassParams};

// ---------------------------------------------------------------------------
// Run mode enum
// ---------------------------------------------------------------------------

/// `--runMode` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Annotate heavy/kappa/lambda reads per antibody
    Annotate,
    /// Compare primer-mix reads against confirmatory reads
    Compare,
}

impl std::str::FromStr for RunMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annotate" => Ok(Self::Annotate),
            "compare" => Ok(Self::Compare),
            _ => Err(format!(
                "unknown runMode '{s}'; expected 'annotate' or 'compare'"
            )),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Annotate => write!(f, "annotate"),
            Self::Compare => write!(f, "compare"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters struct
// ---------------------------------------------------------------------------

/// ruBASE command-line parameters, using `--camelCase` argument names.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ruBASE",
    about = "Antibody Sanger read annotation and PCR/plasmid comparison",
    version
)]
pub struct Parameters {
    // ── Run ─────────────────────────────────────────────────────────────
    /// Run mode: annotate or compare
    #[arg(long = "runMode", default_value = "annotate")]
    pub run_mode: RunMode,

    /// Number of threads
    #[arg(long = "runThreadN", default_value_t = 1)]
    pub run_thread_n: usize,

    // ── Sheets and read files ───────────────────────────────────────────
    /// Input sheet (TSV with header row)
    #[arg(long = "sheetIn")]
    pub sheet_in: Option<PathBuf>,

    /// Output sheet
    #[arg(long = "outSheet", default_value = "./ruBASE.tsv")]
    pub out_sheet: PathBuf,

    /// Prefix prepended to read names from the sheet (e.g. a directory)
    #[arg(long = "dataPrefix", default_value = "")]
    pub data_prefix: String,

    /// Suffix appended to read names from the sheet
    #[arg(long = "dataSuffix", default_value = ".fastq")]
    pub data_suffix: String,

    /// Replace '-' with '_' in read names from the sheet
    #[arg(long = "normalizeNames")]
    pub normalize_names: bool,

    /// TSV primer table (columns: table, gene, primer)
    #[arg(long = "primerTable")]
    pub primer_table: Option<PathBuf>,

    // ── Read filters ────────────────────────────────────────────────────
    /// Minimum read length before alignment
    #[arg(long = "readLengthMin", default_value_t = 50)]
    pub read_length_min: usize,

    /// Minimum mean phred quality before alignment
    #[arg(long = "readQualityMin", default_value_t = 12)]
    pub read_quality_min: u32,

    /// Minimum length of the aligned V(D)J span
    #[arg(long = "alignLengthMin", default_value_t = 80)]
    pub align_length_min: usize,

    /// Minimum mean phred quality of both reads in compare mode
    #[arg(long = "compareQualityMin", default_value_t = 20)]
    pub compare_quality_min: u32,

    // ── Aligner ─────────────────────────────────────────────────────────
    /// igblastn executable
    #[arg(long = "igblastBin", default_value = "igblastn")]
    pub igblast_bin: PathBuf,

    /// blastn executable (constant-region subclass search)
    #[arg(long = "blastBin", default_value = "blastn")]
    pub blast_bin: PathBuf,

    /// V germline database
    #[arg(long = "germlineDbV", default_value = "germlinedb/db/V_without_orphons")]
    pub germline_db_v: PathBuf,

    /// D germline database
    #[arg(long = "germlineDbD", default_value = "germlinedb/db/D_without_orphons")]
    pub germline_db_d: PathBuf,

    /// J germline database
    #[arg(long = "germlineDbJ", default_value = "germlinedb/db/J_without_orphons")]
    pub germline_db_j: PathBuf,

    /// IgBLAST auxiliary data file
    #[arg(long = "auxiliaryData", default_value = "igblast/optional_file/human_gl.aux")]
    pub auxiliary_data: PathBuf,

    /// Constant-region BLAST database
    #[arg(long = "constantDb", default_value = "human_gl_C.fasta")]
    pub constant_db: PathBuf,

    /// IgBLAST internal_data directory copied into the work directory
    #[arg(long = "igdataDir")]
    pub igdata_dir: Option<PathBuf>,

    /// Scratch directory for aligner input and output
    #[arg(long = "workDir", default_value = "./ruBASE_work")]
    pub work_dir: PathBuf,

    /// Keep every raw IgBLAST report in this directory
    #[arg(long = "outKeepReports")]
    pub out_keep_reports: Option<PathBuf>,

    // ── Subclass ────────────────────────────────────────────────────────
    /// Constant-region hits need a bit score above this
    #[arg(long = "subclassBitScoreMin", default_value_t = 50.0)]
    pub subclass_bit_score_min: f64,

    /// Constant-region hits need an e-value below this
    #[arg(long = "subclassEvalueMax", default_value_t = 1e-4)]
    pub subclass_evalue_max: f64,

    /// Accepted hits below this bit score are low-confidence
    #[arg(long = "subclassBitScoreConfident", default_value_t = 80.0)]
    pub subclass_bit_score_confident: f64,

    // ── Export ──────────────────────────────────────────────────────────
    /// AgeI position after which a heavy IgM site is primer-derived
    #[arg(long = "ageiCutoffIgM", default_value_t = 385)]
    pub agei_cutoff_igm: usize,

    /// AgeI position after which a heavy (non-IgM) site is primer-derived
    #[arg(long = "ageiCutoffHeavy", default_value_t = 430)]
    pub agei_cutoff_heavy: usize,

    /// AgeI position after which a lambda site is primer-derived
    #[arg(long = "ageiCutoffLambda", default_value_t = 330)]
    pub agei_cutoff_lambda: usize,
}

impl Parameters {
    /// Validate parameter combinations that clap alone cannot enforce.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.sheet_in.is_none() {
            return Err(crate::error::Error::Parameter(
                "--sheetIn is required".into(),
            ));
        }

        // Thread count must be at least 1
        if self.run_thread_n == 0 {
            return Err(crate::error::Error::Parameter(
                "--runThreadN must be >= 1".into(),
            ));
        }

        if self.subclass_bit_score_confident < self.subclass_bit_score_min {
            return Err(crate::error::Error::Parameter(format!(
                "--subclassBitScoreConfident ({}) must not be below --subclassBitScoreMin ({})",
                self.subclass_bit_score_confident, self.subclass_bit_score_min
            )));
        }

        Ok(())
    }

    pub fn settings(&self) -> Settings {
        Settings {
            min_read_length: self.read_length_min,
            min_mean_quality: self.read_quality_min,
            min_aligned_length: self.align_length_min,
            subclass: SubclassParams {
                min_bit_score: self.subclass_bit_score_min,
                max_evalue: self.subclass_evalue_max,
                confident_bit_score: self.subclass_bit_score_confident,
                ..SubclassParams::default()
            },
        }
    }

    pub fn aligner_config(&self) -> AlignerConfig {
        AlignerConfig {
            igblastn: self.igblast_bin.clone(),
            blastn: self.blast_bin.clone(),
            germline_db_v: self.germline_db_v.clone(),
            germline_db_d: self.germline_db_d.clone(),
            germline_db_j: self.germline_db_j.clone(),
            auxiliary_data: self.auxiliary_data.clone(),
            constant_db: self.constant_db.clone(),
            internal_data_source: self.igdata_dir.clone(),
            work_dir: self.work_dir.clone(),
            keep_reports: self.out_keep_reports.clone(),
        }
    }

    pub fn compare_params(&self) -> CompareParams {
        CompareParams {
            min_quality: self.compare_quality_min,
            ..CompareParams::default()
        }
    }

    pub fn export_params(&self) -> ExportParams {
        ExportParams {
            agei_cutoff_igm: self.agei_cutoff_igm,
            agei_cutoff_heavy: self.agei_cutoff_heavy,
            agei_cutoff_lambda: self.agei_cutoff_lambda,
        }
    }

    pub fn file_resolver(&self) -> FileResolver {
        FileResolver {
            prefix: self.data_prefix.clone(),
            suffix: self.data_suffix.clone(),
            normalize: self.normalize_names,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
