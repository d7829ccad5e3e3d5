//! Calibrated mass-balance model parameters.
//!
//! These arrive pre-calibrated from an upstream fitting step; nothing in this
//! workspace re-fits them. One set per glacier, keyed by inventory index.

use serde::{Deserialize, Serialize};

/// The eight calibrated parameters carried through to the output record for
/// provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Lapse rate from the climate-grid cell to the glacier [degC m-1].
    pub lr_gcm: f64,
    /// Lapse rate across the glacier's elevation bins [degC m-1].
    pub lr_glac: f64,
    /// Precipitation correction factor [-].
    pub prec_factor: f64,
    /// Precipitation gradient with elevation [m-1].
    pub prec_grad: f64,
    /// Degree-day factor of snow [m w.e. degC-1 d-1].
    pub ddf_snow: f64,
    /// Degree-day factor of ice [m w.e. degC-1 d-1].
    pub ddf_ice: f64,
    /// Temperature at or below which precipitation falls as snow [degC].
    pub temp_snow: f64,
    /// Calibration temperature offset applied to every downscaled bin [degC].
    pub temp_change: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            lr_gcm: -0.0065,
            lr_glac: -0.0065,
            prec_factor: 1.0,
            prec_grad: 0.0001,
            ddf_snow: 0.0041,
            ddf_ice: 0.0041 / 0.7,
            temp_snow: 1.0,
            temp_change: 0.0,
        }
    }
}
