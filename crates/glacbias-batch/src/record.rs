//! The per-glacier output record.

use crate::{BatchError, BatchResult};
use glacbias_core::params::ModelParams;
use glacbias_solver::BiasAdjustment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One output row per glacier: identity, the solved adjustment pair, the
/// mass-balance diagnostics, the convergence flag, and the eight calibrated
/// parameters carried through for provenance.
///
/// Rows are keyed by glacier identity; their order within a merged file is
/// not significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasAdjRecord {
    #[serde(rename = "RGIId")]
    pub glacier_id: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(rename = "GCM")]
    pub gcm_name: String,
    pub rcp_scenario: String,
    pub temp_adj: f64,
    pub prec_adj: f64,
    pub ref_mb_mwea: f64,
    pub ref_vol_change_perc: f64,
    pub gcm_mb_mwea: f64,
    pub gcm_vol_change_perc: f64,
    pub converged: bool,
    pub lr_gcm: f64,
    pub lr_glac: f64,
    pub prec_factor: f64,
    pub prec_grad: f64,
    pub ddf_snow: f64,
    pub ddf_ice: f64,
    pub temp_snow: f64,
    pub temp_change: f64,
}

impl BiasAdjRecord {
    pub fn new(
        glacier_id: &str,
        ref_name: &str,
        gcm_name: &str,
        scenario: &str,
        adjustment: &BiasAdjustment,
        params: &ModelParams,
    ) -> Self {
        Self {
            glacier_id: glacier_id.to_string(),
            ref_name: ref_name.to_string(),
            gcm_name: gcm_name.to_string(),
            rcp_scenario: scenario.to_string(),
            temp_adj: adjustment.temp_adj,
            prec_adj: adjustment.prec_adj,
            ref_mb_mwea: adjustment.ref_mb_mwea,
            ref_vol_change_perc: adjustment.ref_vol_change_perc,
            gcm_mb_mwea: adjustment.gcm_mb_mwea,
            gcm_vol_change_perc: adjustment.gcm_vol_change_perc,
            converged: adjustment.converged,
            lr_gcm: params.lr_gcm,
            lr_glac: params.lr_glac,
            prec_factor: params.prec_factor,
            prec_grad: params.prec_grad,
            ddf_snow: params.ddf_snow,
            ddf_ice: params.ddf_ice,
            temp_snow: params.temp_snow,
            temp_change: params.temp_change,
        }
    }
}

pub fn write_records(path: &Path, records: &[BiasAdjRecord]) -> BatchResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| BatchError::csv(path, e))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| BatchError::csv(path, e))?;
    }
    writer.flush().map_err(|e| BatchError::io(path, e))?;
    Ok(())
}

pub fn read_records(path: &Path) -> BatchResult<Vec<BiasAdjRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| BatchError::csv(path, e))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| BatchError::csv(path, e)))
        .collect()
}
