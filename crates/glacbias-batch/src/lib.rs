//! Batch orchestration: run the per-glacier bias-adjustment solve over a full
//! regional inventory, one GCM/scenario pair at a time.
//!
//! The population is split into contiguous chunks which fan out across a
//! thread pool. Workers share no mutable state; each one writes its results to
//! its own chunk file and the orchestrator merges the chunk files afterwards.
//! Malformed inputs are fatal for the GCM being processed; a glacier with no
//! ice is a designed no-op and solver non-convergence is flagged in the output
//! record, never fatal.

pub mod chunk;
pub mod io;
pub mod merge;
pub mod orchestrator;
pub mod record;
pub mod source;

use glacbias_core::CoreError;
use glacbias_solver::SolverError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("invalid input: {0}")]
    Input(String),
}

impl BatchError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type BatchResult<T> = Result<T, BatchError>;

pub use orchestrator::{BatchOptions, BatchOrchestrator, RegionInputs};
pub use record::BiasAdjRecord;
pub use source::{ClimateSource, CsvClimateSource, GcmMatrix};
