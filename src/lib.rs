#![allow(non_snake_case)]

pub mod error;
pub mod params;

pub mod aligner;
pub mod cloning;
pub mod compare;
pub mod export;
pub mod germline;
pub mod io;
pub mod pipeline;
pub mod read;
pub mod report;
pub mod seq;
pub mod stats;

use log::info;

use crate::params::{Parameters, RunMode};

/// Top-level dispatcher. Called from `main()` after CLI parsing.
pub fn run(params: &Parameters) -> anyhow::Result<()> {
    params.validate()?;

    info!("ruBASE v{}", env!("CARGO_PKG_VERSION"));
    info!("runMode: {}", params.run_mode);
    info!("runThreadN: {}", params.run_thread_n);

    match params.run_mode {
        RunMode::Annotate => pipeline::annotate(params),
        RunMode::Compare => pipeline::compare(params),
    }
}
