//! Glacier geometry on a fixed-width elevation-bin grid.

use crate::config::{ReferenceElevation, RunConfig};
use crate::{CoreError, CoreResult};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A glacier discretized into an ordered, fixed-width sequence of elevation
/// bins covering its elevation range.
///
/// A bin with zero area is off-glacier; it must contribute zero to every
/// derived field and aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Glacier {
    /// Regional inventory identifier (RGI-style).
    pub id: String,
    /// Bin center elevations [m], ascending.
    pub bin_elevations: Array1<f64>,
    /// Initial area per bin [km2].
    pub area_km2: Array1<f64>,
    /// Average ice thickness per bin [m].
    pub thickness_m: Array1<f64>,
    /// Average width per bin [km].
    pub width_km: Array1<f64>,
    /// Median glacier elevation [m].
    pub z_median: f64,
    /// Minimum glacier elevation [m].
    pub z_min: f64,
    /// Maximum glacier elevation [m].
    pub z_max: f64,
}

impl Glacier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        bin_elevations: Array1<f64>,
        area_km2: Array1<f64>,
        thickness_m: Array1<f64>,
        width_km: Array1<f64>,
        z_median: f64,
        z_min: f64,
        z_max: f64,
    ) -> CoreResult<Self> {
        let n = bin_elevations.len();
        for (name, len) in [
            ("area_km2", area_km2.len()),
            ("thickness_m", thickness_m.len()),
            ("width_km", width_km.len()),
        ] {
            if len != n {
                return Err(CoreError::LengthMismatch {
                    name: name.to_string(),
                    expected: n,
                    actual: len,
                });
            }
        }
        Ok(Self {
            id: id.into(),
            bin_elevations,
            area_km2,
            thickness_m,
            width_km,
            z_median,
            z_min,
            z_max,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.bin_elevations.len()
    }

    /// Indices of bins with non-zero area, in ascending elevation order.
    pub fn on_glacier_indices(&self) -> Vec<usize> {
        self.area_km2
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Maximum ice thickness across all bins [m]. Zero means the glacier has
    /// no mass to balance and the bias adjustment is skipped.
    pub fn max_thickness(&self) -> f64 {
        self.thickness_m.iter().cloned().fold(0.0, f64::max)
    }

    /// Total initial area [km2].
    pub fn initial_area_km2(&self) -> f64 {
        self.area_km2.sum()
    }

    /// Total initial ice volume [km3].
    pub fn initial_volume_km3(&self) -> f64 {
        self.area_km2
            .iter()
            .zip(self.thickness_m.iter())
            .map(|(a, t)| a * t / 1000.0)
            .sum()
    }

    /// The scalar elevation the centroid climate is downscaled from.
    pub fn reference_elevation(&self, config: &RunConfig) -> f64 {
        match config.reference_elevation {
            ReferenceElevation::Median => self.z_median,
            ReferenceElevation::Min => self.z_min,
            ReferenceElevation::Max => self.z_max,
        }
    }
}
