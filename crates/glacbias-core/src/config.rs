//! Run-wide configuration.
//!
//! Every component takes an immutable reference to [`RunConfig`] selected once
//! at startup. Numbered option switches from the calibration setup become
//! enums so invalid combinations are unrepresentable.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which scalar elevation a glacier's centroid climate is downscaled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceElevation {
    Median,
    Min,
    Max,
}

/// How total precipitation is partitioned into snow and rain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulationOption {
    /// Hard threshold: at or below the snow temperature everything is snow,
    /// above it everything is rain.
    Threshold,
    /// Linear snow/rain mix over a +/- 1 degC ramp around the snow temperature.
    LinearRamp,
}

/// Immutable run configuration, loaded once and shared by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Label of the reference climate dataset (e.g. "ERA-Interim").
    pub ref_name: String,
    /// First year of the calibration window (after spinup).
    pub start_year: i32,
    /// Last year of the calibration window (inclusive).
    pub end_year: i32,
    /// Spinup years prepended to the calibration window.
    pub spinup_years: i32,
    /// Width of an elevation bin [m].
    pub elev_bin_width: f64,
    /// Elevation the centroid climate is referenced to when downscaling.
    pub reference_elevation: ReferenceElevation,
    /// Snow/rain partition policy.
    pub accumulation: AccumulationOption,
    /// Apply the upper-quartile precipitation limit on large-relief glaciers.
    pub prec_limit_upper_bins: bool,
    /// Ice density [kg m-3].
    pub density_ice: f64,
    /// Water density [kg m-3].
    pub density_water: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ref_name: "ERA-Interim".to_string(),
            start_year: 2000,
            end_year: 2015,
            spinup_years: 5,
            elev_bin_width: 10.0,
            reference_elevation: ReferenceElevation::Median,
            accumulation: AccumulationOption::LinearRamp,
            prec_limit_upper_bins: true,
            density_ice: 900.0,
            density_water: 1000.0,
        }
    }
}

impl RunConfig {
    /// Load a configuration from a TOML file. Missing keys fall back to the
    /// defaults.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            CoreError::Config(format!(
                "failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: RunConfig = toml::from_str(&text)
            .map_err(|e| CoreError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// First year of climate data, including spinup.
    pub fn data_start_year(&self) -> i32 {
        self.start_year - self.spinup_years
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.end_year < self.start_year {
            return Err(CoreError::Config(format!(
                "end_year {} precedes start_year {}",
                self.end_year, self.start_year
            )));
        }
        if self.spinup_years < 0 {
            return Err(CoreError::Config(format!(
                "spinup_years must be non-negative, got {}",
                self.spinup_years
            )));
        }
        if self.elev_bin_width <= 0.0 {
            return Err(CoreError::Config(format!(
                "elev_bin_width must be positive, got {}",
                self.elev_bin_width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_eq!(config.data_start_year(), 1995);
    }

    #[test]
    fn toml_roundtrip_with_partial_keys() {
        let config: RunConfig = toml::from_str(
            r#"
            start_year = 2001
            accumulation = "threshold"
            "#,
        )
        .unwrap();
        assert_eq!(config.start_year, 2001);
        assert_eq!(config.accumulation, AccumulationOption::Threshold);
        // untouched keys keep their defaults
        assert_eq!(config.end_year, 2015);
        assert_eq!(config.reference_elevation, ReferenceElevation::Median);
    }

    #[test]
    fn inverted_years_rejected() {
        let config = RunConfig {
            start_year: 2015,
            end_year: 2000,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
