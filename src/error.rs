use std::path::PathBuf;

/// Errors that can occur in ruBASE.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("FASTQ parsing error: {0}")]
    Fastq(String),

    #[error("sheet error: {0}")]
    Sheet(String),

    #[error("aligner error: {0}")]
    Aligner(String),

    #[error("germline database setup failed: {0}")]
    GermlineSetup(String),
}

impl Error {
    /// Convenience for wrapping an `io::Error` with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}
