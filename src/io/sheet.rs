/// Tab-separated sample sheets
///
/// Input sheets have a header row naming the columns; blank lines and lines
/// starting with `#` are skipped. Output sheets are keyed by logical column
/// name and written with the union of all columns in first-seen order.
use crate::error::Error;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One data row of an input sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based line number in the source file
    pub line: usize,
    values: HashMap<String, String>,
}

impl Row {
    /// Cell value; empty cells read as `None`
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Parsed input sheet
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(e, path))?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    pub fn from_reader<R: BufRead>(reader: R, source: &str) -> Result<Self, Error> {
        let mut table = Table::default();
        let mut line_num = 0;

        for line in reader.lines() {
            line_num += 1;
            let line = line
                .map_err(|e| Error::Sheet(format!("{}: failed to read line {}: {}", source, line_num, e)))?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let cells: Vec<&str> = line.split('\t').collect();
            if table.headers.is_empty() {
                table.headers = cells.iter().map(|c| c.trim().to_string()).collect();
                continue;
            }
            if cells.len() > table.headers.len() {
                log::warn!(
                    "{}: line {} has {} cells but only {} columns; extra cells ignored",
                    source,
                    line_num,
                    cells.len(),
                    table.headers.len()
                );
            }
            let values = table
                .headers
                .iter()
                .zip(cells)
                .map(|(h, c)| (h.clone(), c.to_string()))
                .collect();
            table.rows.push(Row {
                line: line_num,
                values,
            });
        }

        if table.headers.is_empty() {
            return Err(Error::Sheet(format!("{}: no header row", source)));
        }
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Fail unless every column in `columns` is present
    pub fn require(&self, columns: &[&str]) -> Result<(), Error> {
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !self.headers.iter().any(|h| h == c))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Sheet(format!(
                "missing column(s): {}",
                missing.join(", ")
            )))
        }
    }
}

/// One antibody of an annotate-mode sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotateRow {
    pub id: String,
    pub heavy: Option<String>,
    pub kappa: Option<String>,
    pub lambda: Option<String>,
    pub patient: Option<String>,
    pub mab: Option<String>,
}

/// Rows of an annotate-mode sheet (`id`, `heavy`, `kappa`, `lambda`, and
/// optionally `patient`, `mab`).
pub fn annotate_rows(table: &Table) -> Result<Vec<AnnotateRow>, Error> {
    table.require(&["id", "heavy", "kappa", "lambda"])?;
    Ok(table
        .rows()
        .iter()
        .map(|row| AnnotateRow {
            id: row.get("id").unwrap_or_default().to_string(),
            heavy: row.get("heavy").map(str::to_string),
            kappa: row.get("kappa").map(str::to_string),
            lambda: row.get("lambda").map(str::to_string),
            patient: row.get("patient").map(str::to_string),
            mab: row.get("mab").map(str::to_string),
        })
        .collect())
}

/// One read pair of a compare-mode sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRow {
    pub id: String,
    pub first: Option<String>,
    pub second: Option<String>,
}

/// Rows of a compare-mode sheet (`id`, `first`, `second`).
pub fn compare_rows(table: &Table) -> Result<Vec<CompareRow>, Error> {
    table.require(&["id", "first", "second"])?;
    Ok(table
        .rows()
        .iter()
        .map(|row| CompareRow {
            id: row.get("id").unwrap_or_default().to_string(),
            first: row.get("first").map(str::to_string),
            second: row.get("second").map(str::to_string),
        })
        .collect())
}

/// Maps sheet cell values to read files
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileResolver {
    pub prefix: String,
    pub suffix: String,
    /// Replace `-` with `_` in names (sequencing providers are inconsistent)
    pub normalize: bool,
}

impl FileResolver {
    pub fn resolve(&self, name: &str) -> PathBuf {
        let name = if self.normalize {
            name.replace('-', "_")
        } else {
            name.to_string()
        };
        PathBuf::from(format!("{}{}{}", self.prefix, name, self.suffix))
    }
}

/// Output sheet keyed by column name
#[derive(Debug, Clone, Default)]
pub struct OutputSheet {
    columns: Vec<String>,
    rows: Vec<HashMap<String, String>>,
}

impl OutputSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, fields: Vec<(String, String)>) {
        let mut row = HashMap::with_capacity(fields.len());
        for (column, value) in fields {
            if !self.columns.contains(&column) {
                self.columns.push(column.clone());
            }
            row.insert(column, value);
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| clean_cell(row.get(c).map(String::as_str).unwrap_or_default()))
                .collect();
            writeln!(out, "{}", cells.join("\t"))?;
        }
        Ok(())
    }

    pub fn write(&self, path: &Path) -> Result<(), Error> {
        let file = File::create(path).map_err(|e| Error::io(e, path))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer).map_err(|e| Error::io(e, path))?;
        writer.flush().map_err(|e| Error::io(e, path))?;
        log::info!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

fn clean_cell(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
