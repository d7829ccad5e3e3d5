//! Per-glacier bias-adjustment solving.
//!
//! Finds, for each (glacier, GCM, scenario), the additive temperature offset
//! and multiplicative precipitation factor that make the GCM climate
//! reproduce the reference climate's glacier mass balance over the
//! calibration window. Stage 1 equalizes degree-day melt with a
//! temperature-only search, stage 1b seeds the precipitation factor from the
//! accumulation ratio, and stage 2 jointly refines both against the
//! mass-balance engine under a sign constraint that prevents compensating
//! temperature/precipitation solutions.

pub mod bias;
pub mod minimize;

use glacbias_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SolverResult<T> = Result<T, SolverError>;

pub use bias::{BiasAdjustment, BiasAdjustmentSolver};
pub use minimize::{minimize, minimize_penalized, MinimizeOptions, Solution};
