//! GCM climate input.
//!
//! Projection climate enters through [`ClimateSource`]; the nearest-neighbor
//! extraction from the climate archive (NetCDF, unit conversion) is an
//! upstream collaborator. The shipped [`CsvClimateSource`] reads matrices that
//! are already in model units: temperature in degC, precipitation in metres
//! per month, elevation in metres.

use crate::io::{read_column, read_matrix};
use crate::{BatchError, BatchResult};
use ndarray::{Array1, Array2};
use std::path::PathBuf;

/// (glacier x month) projection climate for one GCM/scenario pair, rows in
/// inventory order.
#[derive(Debug, Clone)]
pub struct GcmMatrix {
    /// Air temperature at the nearest grid cell [degC].
    pub temp_c: Array2<f64>,
    /// Total precipitation at the nearest grid cell [m].
    pub prec_m: Array2<f64>,
    /// Grid-cell surface elevation per glacier [m].
    pub elev_m: Array1<f64>,
}

pub trait ClimateSource {
    fn load(&self, gcm: &str, scenario: &str) -> BatchResult<GcmMatrix>;
}

/// CSV-backed source reading `{gcm}_{scenario}_tas_mon.csv`,
/// `{gcm}_{scenario}_pr_mon.csv` and `{gcm}_{scenario}_orog_fx.csv` from one
/// directory.
pub struct CsvClimateSource {
    dir: PathBuf,
}

impl CsvClimateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ClimateSource for CsvClimateSource {
    fn load(&self, gcm: &str, scenario: &str) -> BatchResult<GcmMatrix> {
        let temp_c = read_matrix(&self.dir.join(format!("{}_{}_tas_mon.csv", gcm, scenario)))?;
        let prec_m = read_matrix(&self.dir.join(format!("{}_{}_pr_mon.csv", gcm, scenario)))?;
        let elev_m = read_column(&self.dir.join(format!("{}_{}_orog_fx.csv", gcm, scenario)))?;

        if prec_m.dim() != temp_c.dim() {
            return Err(BatchError::Input(format!(
                "{} {}: precipitation is {:?}, temperature is {:?}",
                gcm,
                scenario,
                prec_m.dim(),
                temp_c.dim()
            )));
        }
        if elev_m.len() != temp_c.nrows() {
            return Err(BatchError::Input(format!(
                "{} {}: {} elevations for {} glaciers",
                gcm,
                scenario,
                elev_m.len(),
                temp_c.nrows()
            )));
        }
        Ok(GcmMatrix {
            temp_c,
            prec_m,
            elev_m,
        })
    }
}
