//! Static initial surface-type classification.
//!
//! Stage-1 melt comparisons use a single classification frozen at the initial
//! condition: bins below the median elevation are ice (ablation area), bins at
//! or above it are snow (accumulation area). This is an intentional
//! simplification that keeps the bias solve cheap; the full simulator evolves
//! surface types per year and is not reproduced here. Snow and firn are not
//! distinguished at this stage, so firn carries the snow degree-day factor.

use crate::glacier::Glacier;
use crate::params::ModelParams;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceType {
    /// Zero-area bin; contributes nothing.
    OffGlacier,
    Ice,
    Snow,
    Firn,
    Debris,
}

impl SurfaceType {
    /// Degree-day factor paired with this surface type [m w.e. degC-1 d-1].
    pub fn degree_day_factor(self, params: &ModelParams) -> f64 {
        match self {
            SurfaceType::OffGlacier => 0.0,
            SurfaceType::Ice | SurfaceType::Debris => params.ddf_ice,
            SurfaceType::Snow | SurfaceType::Firn => params.ddf_snow,
        }
    }
}

/// Classify each bin from the median-elevation split.
pub fn initial_surface_types(glacier: &Glacier) -> Vec<SurfaceType> {
    glacier
        .bin_elevations
        .iter()
        .zip(glacier.area_km2.iter())
        .map(|(&z, &area)| {
            if area <= 0.0 {
                SurfaceType::OffGlacier
            } else if z < glacier.z_median {
                SurfaceType::Ice
            } else {
                SurfaceType::Snow
            }
        })
        .collect()
}

/// Per-bin degree-day factor array derived from the classification.
pub fn melt_factors(surface: &[SurfaceType], params: &ModelParams) -> Array1<f64> {
    surface
        .iter()
        .map(|s| s.degree_day_factor(params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glacier::test_support::synthetic_glacier;

    #[test]
    fn median_split_assigns_ice_below_snow_above() {
        let glacier = synthetic_glacier(4000.0, 6);
        let surface = initial_surface_types(&glacier);
        assert_eq!(surface[0], SurfaceType::OffGlacier);
        assert_eq!(surface[5], SurfaceType::OffGlacier);
        assert_eq!(surface[1], SurfaceType::Ice);
        assert_eq!(surface[4], SurfaceType::Snow);
    }

    #[test]
    fn off_glacier_bins_have_zero_melt_factor() {
        let glacier = synthetic_glacier(4000.0, 6);
        let params = ModelParams::default();
        let ddf = melt_factors(&initial_surface_types(&glacier), &params);
        assert_eq!(ddf[0], 0.0);
        assert_eq!(ddf[1], params.ddf_ice);
        assert_eq!(ddf[4], params.ddf_snow);
    }
}
