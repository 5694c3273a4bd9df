/// Batch run modes
///
/// `annotate` builds one `ReadRecord` per heavy/kappa/lambda cell of the
/// sheet and writes the export fields, chain-prefixed, plus a cloning
/// recommendation per antibody. `compare` builds every distinct read file
/// once, then classifies each `first`/`second` pair.
///
/// Records are built on a bounded rayon pool. The aligner is passed in as a
/// trait object so the batch logic runs without external tools.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::aligner::{Aligner, IgBlast};
use crate::cloning;
use crate::compare::{self, CompareParams, Verdict};
use crate::export::{self, ExportParams, NoPrimers, PrimerTable, TsvPrimerTable};
use crate::io::fastq;
use crate::io::sheet::{self, AnnotateRow, CompareRow, FileResolver, OutputSheet, Table};
use crate::params::Parameters;
use crate::read::{ChainType, ReadRecord, Settings};
use crate::stats::BatchStats;

/// Result of turning one sheet cell into a record.
#[derive(Debug)]
pub enum ReadOutcome {
    /// The resolved file does not exist
    Missing(PathBuf),
    /// The file exists but could not be loaded
    Unreadable { path: PathBuf, reason: String },
    Built(ReadRecord),
}

/// Everything a batch needs besides the sheet rows.
pub struct Batch<'a> {
    pub aligner: &'a dyn Aligner,
    pub settings: &'a Settings,
    pub resolver: &'a FileResolver,
    pub pool: &'a rayon::ThreadPool,
}

impl Batch<'_> {
    /// Load and annotate the read stored in `path`.
    pub fn build_read(&self, path: &Path) -> ReadOutcome {
        if !path.is_file() {
            debug!("{} not found", path.display());
            return ReadOutcome::Missing(path.to_path_buf());
        }
        match fastq::load_read(path) {
            Ok(read) => ReadOutcome::Built(ReadRecord::build(&read, self.aligner, self.settings)),
            Err(e) => {
                warn!("Cannot load {}: {}", path.display(), e);
                ReadOutcome::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Annotate every chain cell of every row.
    pub fn annotate(
        &self,
        rows: &[AnnotateRow],
        primers: &dyn PrimerTable,
        export_params: &ExportParams,
        stats: &mut BatchStats,
    ) -> OutputSheet {
        let jobs: Vec<(usize, ChainType, PathBuf)> = rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| {
                [
                    (ChainType::Heavy, &row.heavy),
                    (ChainType::Kappa, &row.kappa),
                    (ChainType::Lambda, &row.lambda),
                ]
                .into_iter()
                .filter_map(move |(chain, cell)| {
                    cell.as_deref()
                        .map(|name| (i, chain, self.resolver.resolve(name)))
                })
            })
            .collect();
        info!("Annotating {} reads of {} rows", jobs.len(), rows.len());

        let outcomes: Vec<ReadOutcome> = self
            .pool
            .install(|| jobs.par_iter().map(|(_, _, path)| self.build_read(path)).collect());

        let mut per_row: Vec<Vec<(ChainType, ReadOutcome)>> =
            rows.iter().map(|_| Vec::new()).collect();
        for ((i, chain, _), outcome) in jobs.into_iter().zip(outcomes) {
            per_row[i].push((chain, outcome));
        }

        let mut sheet = OutputSheet::new();
        for (row, outcomes) in rows.iter().zip(per_row) {
            let mut fields = vec![("id".to_string(), row.id.clone())];
            if let Some(patient) = &row.patient {
                fields.push(("patient".to_string(), patient.clone()));
            }
            if let Some(mab) = &row.mab {
                fields.push(("mab".to_string(), mab.clone()));
            }

            let mut code = String::new();
            for (chain, outcome) in outcomes {
                let c = chain.letter();
                let chain_fields = match outcome {
                    ReadOutcome::Missing(path) => {
                        stats.record_missing();
                        vec![
                            ("Function".to_string(), "BQ - file not found".to_string()),
                            (
                                "Comment".to_string(),
                                format!("File {} not found.", path.display()),
                            ),
                        ]
                    }
                    ReadOutcome::Unreadable { reason, .. } => {
                        stats.record_missing();
                        vec![
                            ("Function".to_string(), "BQ".to_string()),
                            ("Comment".to_string(), reason),
                        ]
                    }
                    ReadOutcome::Built(record) => {
                        stats.record_read(&record);
                        let mut out = export::build(&record, primers, export_params);
                        if record.is_success() && record.chain_type != chain {
                            stats.chain_mismatch += 1;
                            out.function = "BQ".to_string();
                            out.comment = format!(
                                "{} {} has chain type {}",
                                record.comment,
                                record.path.display(),
                                record.chain_type
                            );
                        } else if let Some(part) = cloning::chain_code(&out) {
                            code.push_str(&part);
                        }
                        out.fields()
                    }
                };
                fields.extend(
                    chain_fields
                        .into_iter()
                        .map(|(key, value)| (format!("{} {}", c, key), value)),
                );
            }

            if let Some(rec) =
                cloning::recommend(&code, row.patient.as_deref(), row.mab.as_deref())
            {
                debug!("{}: clone {}", row.id, rec.chains);
                stats.cloning_recommendations += 1;
                fields.push(("cloning?".to_string(), rec.chains));
                fields.push((
                    "non functional chains".to_string(),
                    rec.non_functional.unwrap_or_default(),
                ));
                fields.push(("clone ID".to_string(), rec.clone_id.unwrap_or_default()));
            }
            sheet.push_row(fields);
        }
        sheet
    }

    /// Compare every `first`/`second` pair.
    pub fn compare(
        &self,
        rows: &[CompareRow],
        params: &CompareParams,
        stats: &mut BatchStats,
    ) -> OutputSheet {
        let mut paths: Vec<PathBuf> = rows
            .iter()
            .flat_map(|row| [&row.first, &row.second])
            .filter_map(|cell| cell.as_deref().map(|name| self.resolver.resolve(name)))
            .collect();
        paths.sort();
        paths.dedup();
        info!("Building {} distinct reads for {} pairs", paths.len(), rows.len());

        let cache: DashMap<PathBuf, Arc<ReadRecord>> = DashMap::new();
        self.pool.install(|| {
            paths.par_iter().for_each(|path| {
                if let ReadOutcome::Built(record) = self.build_read(path) {
                    cache.insert(path.clone(), Arc::new(record));
                }
            })
        });
        for entry in cache.iter() {
            stats.record_read(entry.value());
        }
        for _ in cache.len()..paths.len() {
            stats.record_missing();
        }

        let lookup = |cell: &Option<String>| -> Option<Arc<ReadRecord>> {
            let path = self.resolver.resolve(cell.as_deref()?);
            cache.get(&path).map(|entry| Arc::clone(entry.value()))
        };

        let results: Vec<(Vec<(String, String)>, Option<Verdict>)> = self.pool.install(|| {
            rows.par_iter()
                .map(|row| {
                    let mut fields = vec![
                        ("id".to_string(), row.id.clone()),
                        ("first".to_string(), row.first.clone().unwrap_or_default()),
                        ("second".to_string(), row.second.clone().unwrap_or_default()),
                    ];
                    let (Some(first), Some(second)) = (lookup(&row.first), lookup(&row.second))
                    else {
                        fields.push(("result".to_string(), "FileNotFound".to_string()));
                        return (fields, None);
                    };
                    debug!("Comparing {} {}", first.name, second.name);
                    let result = compare::classify(&first, &second, params);
                    let verdict = Verdict::of(&result);
                    fields.extend([
                        ("result".to_string(), result.output_text()),
                        ("verdict".to_string(), verdict.to_string()),
                        ("manual call".to_string(), verdict.manual_call()),
                        ("SHM first".to_string(), export::shm(&first)),
                        ("SHM second".to_string(), export::shm(&second)),
                        ("shm analysis".to_string(), result.shm_analysis().to_string()),
                    ]);
                    (fields, Some(verdict))
                })
                .collect()
        });

        let mut sheet = OutputSheet::new();
        for (fields, verdict) in results {
            if let Some(verdict) = verdict {
                stats.record_verdict(&verdict);
            }
            sheet.push_row(fields);
        }
        sheet
    }
}

fn thread_pool(threads: usize) -> anyhow::Result<rayon::ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("failed to build thread pool")?;
    debug!("Built thread pool with {} threads", pool.current_num_threads());
    Ok(pool)
}

/// Aligner runner with its germline data prepared. Setup failures abort the
/// run before any read is processed.
fn igblast(params: &Parameters) -> anyhow::Result<IgBlast> {
    let igblast = IgBlast::new(params.aligner_config());
    igblast
        .ensure_setup()
        .context("IgBLAST germline data setup failed")?;
    Ok(igblast)
}

fn sheet_in(params: &Parameters) -> anyhow::Result<Table> {
    let path = params
        .sheet_in
        .as_deref()
        .context("--sheetIn is required")?;
    info!("sheetIn: {}", path.display());
    Ok(Table::read(path)?)
}

/// `--runMode annotate`
pub fn annotate(params: &Parameters) -> anyhow::Result<()> {
    let table = sheet_in(params)?;
    let rows = sheet::annotate_rows(&table)?;
    let primers: Box<dyn PrimerTable> = match &params.primer_table {
        Some(path) => Box::new(TsvPrimerTable::load(path)?),
        None => {
            info!("No --primerTable given; primer columns stay unresolved");
            Box::new(NoPrimers)
        }
    };

    let aligner = igblast(params)?;
    let pool = thread_pool(params.run_thread_n)?;
    let settings = params.settings();
    let resolver = params.file_resolver();
    let batch = Batch {
        aligner: &aligner,
        settings: &settings,
        resolver: &resolver,
        pool: &pool,
    };

    let mut stats = BatchStats::new();
    let sheet = batch.annotate(&rows, primers.as_ref(), &params.export_params(), &mut stats);
    sheet.write(&params.out_sheet)?;
    stats.print_summary();
    Ok(())
}

/// `--runMode compare`
pub fn compare(params: &Parameters) -> anyhow::Result<()> {
    let table = sheet_in(params)?;
    let rows = sheet::compare_rows(&table)?;

    let aligner = igblast(params)?;
    let pool = thread_pool(params.run_thread_n)?;
    let settings = params.settings();
    let resolver = params.file_resolver();
    let batch = Batch {
        aligner: &aligner,
        settings: &settings,
        resolver: &resolver,
        pool: &pool,
    };

    let mut stats = BatchStats::new();
    let sheet = batch.compare(&rows, &params.compare_params(), &mut stats);
    sheet.write(&params.out_sheet)?;
    stats.print_summary();
    Ok(())
}
