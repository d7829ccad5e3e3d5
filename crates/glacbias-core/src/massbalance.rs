//! Mass-balance engine interface.
//!
//! The stage-2 optimizer evaluates a full annual mass-balance simulation
//! inside its objective function. The engine is therefore defined as a pure
//! function of (parameters, geometry, forcing, dates) -> diagnostics, so the
//! production simulator can be swapped for an analytic test double and solver
//! tests stay fast and deterministic.
//!
//! [`ClimaticMassBalance`] is the implementation shipped with this workspace:
//! downscale, partition, degree-day melt, per-bin climatic balance
//! `acc - melt`, area-weighted to a glacier-wide monthly series with geometry
//! held fixed. The full simulator (refreezing, surface-type evolution, ice
//! redistribution) lives outside this workspace behind the same trait.

use crate::climate::{ClimateSeries, DatesTable};
use crate::config::RunConfig;
use crate::downscale::ElevationBinDownscaler;
use crate::glacier::Glacier;
use crate::melt::DegreeDayMeltAccumulator;
use crate::params::ModelParams;
use crate::surface::{initial_surface_types, melt_factors};
use crate::{CoreError, CoreResult};
use ndarray::Array1;

/// Glacier-wide diagnostics from one mass-balance run.
#[derive(Debug, Clone)]
pub struct MassBalanceOutput {
    /// Glacier-wide specific mass balance per month [m w.e.].
    pub monthly_mwe: Array1<f64>,
    /// Initial glacier area [km2].
    pub area_km2: f64,
    /// Initial glacier volume [km3].
    pub volume_km3: f64,
}

impl MassBalanceOutput {
    /// Average annual glacier-wide mass balance [m w.e. a-1], summing the
    /// monthly series over 12-month blocks and averaging across years.
    pub fn mean_annual_mwea(&self) -> CoreResult<f64> {
        let n = self.monthly_mwe.len();
        if n == 0 || n % 12 != 0 {
            return Err(CoreError::PartialYear(n));
        }
        let n_years = n / 12;
        let mut total = 0.0;
        for year in 0..n_years {
            for month in 0..12 {
                total += self.monthly_mwe[year * 12 + month];
            }
        }
        Ok(total / n_years as f64)
    }

    /// Volume change over the run as a percentage of the initial volume.
    pub fn volume_change_percent(&self) -> CoreResult<f64> {
        let mwea = self.mean_annual_mwea()?;
        let n_years = (self.monthly_mwe.len() / 12) as f64;
        if self.volume_km3 <= 0.0 {
            return Ok(0.0);
        }
        // mwea [m w.e.] -> km of ice-equivalent column over the initial area
        Ok(mwea / 1000.0 * self.area_km2 * n_years / self.volume_km3 * 100.0)
    }
}

/// Pure mass-balance simulation interface evaluated inside the stage-2
/// objective.
pub trait MassBalanceModel {
    fn run(
        &self,
        params: &ModelParams,
        glacier: &Glacier,
        forcing: &ClimateSeries,
        dates: &DatesTable,
    ) -> CoreResult<MassBalanceOutput>;
}

/// Climatic mass balance with static surface types and fixed geometry.
pub struct ClimaticMassBalance<'a> {
    config: &'a RunConfig,
}

impl<'a> ClimaticMassBalance<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }
}

impl MassBalanceModel for ClimaticMassBalance<'_> {
    fn run(
        &self,
        params: &ModelParams,
        glacier: &Glacier,
        forcing: &ClimateSeries,
        dates: &DatesTable,
    ) -> CoreResult<MassBalanceOutput> {
        let n_months = forcing.n_months();
        if n_months != dates.n_months() {
            return Err(CoreError::LengthMismatch {
                name: "forcing".to_string(),
                expected: dates.n_months(),
                actual: n_months,
            });
        }
        let total_area = glacier.initial_area_km2();
        if total_area <= 0.0 {
            return Err(CoreError::EmptyGlacier(glacier.id.clone()));
        }

        let ddf = melt_factors(&initial_surface_types(glacier), params);
        let melt_acc = DegreeDayMeltAccumulator::new(&ddf, &glacier.area_km2, &dates.days_in_month)?;
        let downscaler = ElevationBinDownscaler::new(self.config, glacier, params);
        let fields = downscaler.downscale(forcing, 0.0);
        let melt = melt_acc.melt_field(&fields.temp);

        let mut monthly_mwe = Array1::zeros(n_months);
        for month in 0..n_months {
            let mut weighted = 0.0;
            for (bin, &area) in glacier.area_km2.iter().enumerate() {
                if area > 0.0 {
                    weighted += (fields.acc[[bin, month]] - melt[[bin, month]]) * area;
                }
            }
            monthly_mwe[month] = weighted / total_area;
        }

        Ok(MassBalanceOutput {
            monthly_mwe,
            area_km2: total_area,
            volume_km3: glacier.initial_volume_km3(),
        })
    }
}
