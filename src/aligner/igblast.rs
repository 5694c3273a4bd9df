/// IgBLAST / BLAST process runner
///
/// Each read is written to a FASTA file in a private temporary directory
/// under the work dir. `igblastn` aligns it against the V/D/J germline
/// databases and `blastn` against the constant-region database. Both are
/// spawned directly with an argument vector; nothing goes through a shell.
///
/// IgBLAST needs its `internal_data` directory next to `$IGDATA`. When a
/// source directory is configured it is copied into the work dir exactly
/// once per runner, before the first alignment, and `IGDATA` points there.
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use super::{Aligner, AlignerOutput};
use crate::error::Error;
use crate::io::fastq::SangerRead;

/// Paths of the external tools and databases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignerConfig {
    pub igblastn: PathBuf,
    pub blastn: PathBuf,
    pub germline_db_v: PathBuf,
    pub germline_db_d: PathBuf,
    pub germline_db_j: PathBuf,
    pub auxiliary_data: PathBuf,
    pub constant_db: PathBuf,
    /// IgBLAST `internal_data` directory to copy into `work_dir`
    pub internal_data_source: Option<PathBuf>,
    pub work_dir: PathBuf,
    /// Directory receiving a copy of every raw IgBLAST report
    pub keep_reports: Option<PathBuf>,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            igblastn: PathBuf::from("igblastn"),
            blastn: PathBuf::from("blastn"),
            germline_db_v: PathBuf::from("germlinedb/db/V_without_orphons"),
            germline_db_d: PathBuf::from("germlinedb/db/D_without_orphons"),
            germline_db_j: PathBuf::from("germlinedb/db/J_without_orphons"),
            auxiliary_data: PathBuf::from("igblast/optional_file/human_gl.aux"),
            constant_db: PathBuf::from("human_gl_C.fasta"),
            internal_data_source: None,
            work_dir: PathBuf::from("."),
            keep_reports: None,
        }
    }
}

/// IgBLAST runner with one-time germline data setup.
pub struct IgBlast {
    config: AlignerConfig,
    setup: OnceLock<Result<(), String>>,
}

impl IgBlast {
    pub fn new(config: AlignerConfig) -> Self {
        Self {
            config,
            setup: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Prepare the work dir. Runs once; later calls return the cached
    /// outcome, including a cached failure.
    pub fn ensure_setup(&self) -> Result<(), Error> {
        self.setup
            .get_or_init(|| self.prepare_work_dir())
            .clone()
            .map_err(Error::GermlineSetup)
    }

    fn prepare_work_dir(&self) -> Result<(), String> {
        let work_dir = &self.config.work_dir;
        fs::create_dir_all(work_dir)
            .map_err(|e| format!("cannot create {}: {}", work_dir.display(), e))?;
        if let Some(keep) = &self.config.keep_reports {
            fs::create_dir_all(keep)
                .map_err(|e| format!("cannot create {}: {}", keep.display(), e))?;
        }

        let Some(source) = &self.config.internal_data_source else {
            return Ok(());
        };
        let target = self.internal_data_dir();
        if target.is_dir() {
            log::debug!("{} already present", target.display());
            return Ok(());
        }
        log::info!(
            "Copying IgBLAST internal data {} -> {}",
            source.display(),
            target.display()
        );
        // Copy under a temporary name first so a failed copy never leaves a
        // partial internal_data behind
        let staging = work_dir.join(".internal_data.partial");
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .map_err(|e| format!("cannot clear {}: {}", staging.display(), e))?;
        }
        copy_dir(source, &staging)
            .map_err(|e| format!("copying {} failed: {}", source.display(), e))?;
        fs::rename(&staging, &target)
            .map_err(|e| format!("cannot move internal data into place: {}", e))
    }

    fn internal_data_dir(&self) -> PathBuf {
        self.config.work_dir.join("internal_data")
    }

    fn igblast_args(&self, query: &Path, out: &Path) -> Vec<OsString> {
        let c = &self.config;
        let mut args: Vec<OsString> = Vec::new();
        let mut push = |flag: &str, value: &std::ffi::OsStr| {
            args.push(flag.into());
            args.push(value.to_os_string());
        };
        push("-germline_db_V", c.germline_db_v.as_os_str());
        push("-germline_db_J", c.germline_db_j.as_os_str());
        push("-germline_db_D", c.germline_db_d.as_os_str());
        push("-auxiliary_data", c.auxiliary_data.as_os_str());
        push("-domain_system", "imgt".as_ref());
        push("-num_alignments_V", "1".as_ref());
        push("-num_alignments_J", "1".as_ref());
        push("-num_alignments_D", "1".as_ref());
        push("-outfmt", "7 std qseq sseq btop".as_ref());
        push("-query", query.as_os_str());
        push("-out", out.as_os_str());
        args
    }

    fn blast_args(&self, query: &Path, out: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        for (flag, value) in [
            ("-db", self.config.constant_db.as_os_str()),
            ("-task", "blastn".as_ref()),
            ("-dust", "no".as_ref()),
            ("-outfmt", "7 qseqid sseqid evalue bitscore".as_ref()),
            ("-max_target_seqs", "1".as_ref()),
            ("-query", query.as_os_str()),
            ("-out", out.as_os_str()),
        ] {
            args.push(flag.into());
            args.push(value.to_os_string());
        }
        args
    }

    fn run(&self, program: &Path, args: &[OsString], read: &SangerRead) -> Result<(), Error> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if self.config.internal_data_source.is_some() {
            command.env("IGDATA", &self.config.work_dir);
        }

        log::debug!("Running {} for {}", program.display(), read.name);
        let output = command.output().map_err(|e| {
            Error::Aligner(format!("executing {} failed: {}", program.display(), e))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Aligner(format!(
                "{} exited with {} while aligning {}: {}",
                program.display(),
                output.status,
                read.name,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Aligner for IgBlast {
    fn align(&self, read: &SangerRead) -> Result<AlignerOutput, Error> {
        self.ensure_setup()?;

        let scratch = tempfile::Builder::new()
            .prefix("ruBASE_")
            .tempdir_in(&self.config.work_dir)
            .map_err(|e| Error::io(e, &self.config.work_dir))?;
        let query = scratch.path().join("query.fasta");
        let report_path = scratch.path().join("igblast.txt");
        let hits_path = scratch.path().join("constant.txt");

        let mut fasta = fs::File::create(&query).map_err(|e| Error::io(e, &query))?;
        read.write_fasta(&mut fasta)
            .map_err(|e| Error::io(e, &query))?;
        drop(fasta);

        self.run(
            &self.config.igblastn,
            &self.igblast_args(&query, &report_path),
            read,
        )?;
        let report = fs::read_to_string(&report_path).map_err(|e| Error::io(e, &report_path))?;
        if let Some(keep) = &self.config.keep_reports {
            let kept = keep.join(format!("{}.igblast.txt", read.display_name()));
            fs::write(&kept, &report).map_err(|e| Error::io(e, &kept))?;
        }

        self.run(
            &self.config.blastn,
            &self.blast_args(&query, &hits_path),
            read,
        )?;
        let constant_hits =
            fs::read_to_string(&hits_path).map_err(|e| Error::io(e, &hits_path))?;

        Ok(AlignerOutput {
            report,
            constant_hits,
        })
    }
}

fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
