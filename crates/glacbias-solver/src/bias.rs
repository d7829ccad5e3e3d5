//! The two-stage bias-adjustment solver.
//!
//! Stage 1 finds the temperature offset that equalizes area-weighted
//! degree-day melt between the reference and GCM climates, using the static
//! initial surface typing. Stage 1b seeds the precipitation factor from the
//! area-weighted accumulation ratio (a closed-form ratio, not a search).
//! Stage 2 jointly refines `(temp_adj, prec_adj)` until the mass-balance
//! engine reports matching mean annual balances, subject to
//! `temp_adj * (prec_adj - 1) <= 0`: a temperature increase must not be
//! compensated by a precipitation increase, and vice versa, otherwise a
//! degenerate pair could hide the true bias signature.

use crate::minimize::{minimize, minimize_penalized, MinimizeOptions};
use crate::SolverResult;
use glacbias_core::climate::{ClimateSeries, DatesTable};
use glacbias_core::config::RunConfig;
use glacbias_core::downscale::ElevationBinDownscaler;
use glacbias_core::glacier::Glacier;
use glacbias_core::massbalance::MassBalanceModel;
use glacbias_core::melt::DegreeDayMeltAccumulator;
use glacbias_core::params::ModelParams;
use glacbias_core::surface::{initial_surface_types, melt_factors};
use log::debug;
use serde::{Deserialize, Serialize};

/// Stage-1 tolerance on the melt-volume mismatch.
pub const STAGE1_TOL: f64 = 1e-5;
/// Stage-2 tolerance on the mass-balance mismatch [m w.e. a-1].
pub const STAGE2_TOL: f64 = 1e-3;
/// Quadratic penalty weight for the stage-2 sign constraint.
const CONSTRAINT_PENALTY: f64 = 1e6;

/// Solved bias-adjustment pair plus reporting diagnostics for one glacier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasAdjustment {
    /// Additive temperature offset [degC].
    pub temp_adj: f64,
    /// Multiplicative precipitation factor [-].
    pub prec_adj: f64,
    /// Reference mean annual mass balance [m w.e. a-1].
    pub ref_mb_mwea: f64,
    /// GCM mean annual mass balance at the optimum [m w.e. a-1].
    pub gcm_mb_mwea: f64,
    /// Reference volume change over the run [%].
    pub ref_vol_change_perc: f64,
    /// GCM volume change over the run [%].
    pub gcm_vol_change_perc: f64,
    /// Whether stage 2 converged. Non-converged rows are kept (best-effort,
    /// non-blocking batch) and flagged in the output record.
    pub converged: bool,
    /// True when the glacier had no ice and the solve was skipped.
    pub skipped: bool,
}

impl BiasAdjustment {
    /// The designed no-op for glaciers with zero maximum ice thickness: all
    /// values stay at their zero defaults. Not a solver failure.
    pub fn no_ice() -> Self {
        Self {
            temp_adj: 0.0,
            prec_adj: 0.0,
            ref_mb_mwea: 0.0,
            gcm_mb_mwea: 0.0,
            ref_vol_change_perc: 0.0,
            gcm_vol_change_perc: 0.0,
            converged: true,
            skipped: true,
        }
    }
}

/// Per-glacier solver; holds no state across glaciers.
pub struct BiasAdjustmentSolver<'a, M: MassBalanceModel> {
    config: &'a RunConfig,
    engine: &'a M,
}

impl<'a, M: MassBalanceModel> BiasAdjustmentSolver<'a, M> {
    pub fn new(config: &'a RunConfig, engine: &'a M) -> Self {
        Self { config, engine }
    }

    /// Solve the bias-adjustment pair for one glacier.
    ///
    /// `ref_series` carries the reference dataset's own lapse rates;
    /// `gcm_series` carries the monthly-climatology lapse rates tiled to the
    /// GCM period. Both must cover the same calibration window as `dates`.
    pub fn solve(
        &self,
        glacier: &Glacier,
        params: &ModelParams,
        ref_series: &ClimateSeries,
        gcm_series: &ClimateSeries,
        dates: &DatesTable,
    ) -> SolverResult<BiasAdjustment> {
        if glacier.max_thickness() <= 0.0 {
            debug!("{}: no ice, skipping bias adjustment", glacier.id);
            return Ok(BiasAdjustment::no_ice());
        }

        let temp_adj_seed = self.melt_matching_offset(glacier, params, ref_series, gcm_series, dates)?;
        let prec_adj_seed =
            self.accumulation_ratio(glacier, params, ref_series, gcm_series, temp_adj_seed);

        // Stage 2: equalize the engine's mean annual mass balance.
        let ref_output = self.engine.run(params, glacier, ref_series, dates)?;
        let ref_mb_mwea = ref_output.mean_annual_mwea()?;

        let objective = |x: &[f64]| {
            let adjusted = gcm_series.adjusted(x[0], x[1]);
            match self
                .engine
                .run(params, glacier, &adjusted, dates)
                .and_then(|output| output.mean_annual_mwea())
            {
                Ok(gcm_mb) => (ref_mb_mwea - gcm_mb).abs(),
                // an engine failure poisons this trial point only
                Err(_) => f64::INFINITY,
            }
        };
        let constraint = |x: &[f64]| x[0] * (x[1] - 1.0);
        let options = MinimizeOptions {
            tol: STAGE2_TOL,
            max_iter: 200,
            initial_step: 0.1,
        };
        let solution = minimize_penalized(
            objective,
            constraint,
            &[temp_adj_seed, prec_adj_seed],
            &options,
            CONSTRAINT_PENALTY,
        );
        if !solution.converged {
            debug!(
                "{}: stage 2 stopped at the iteration cap (residual {:.2e})",
                glacier.id, solution.fx
            );
        }
        let (temp_adj, prec_adj) = (solution.x[0], solution.x[1]);

        // Diagnostics recomputed once at the optimum.
        let gcm_output =
            self.engine
                .run(params, glacier, &gcm_series.adjusted(temp_adj, prec_adj), dates)?;

        Ok(BiasAdjustment {
            temp_adj,
            prec_adj,
            ref_mb_mwea,
            gcm_mb_mwea: gcm_output.mean_annual_mwea()?,
            ref_vol_change_perc: ref_output.volume_change_percent()?,
            gcm_vol_change_perc: gcm_output.volume_change_percent()?,
            converged: solution.converged,
            skipped: false,
        })
    }

    /// Stage 1: the temperature offset that equalizes total degree-day melt.
    pub fn melt_matching_offset(
        &self,
        glacier: &Glacier,
        params: &ModelParams,
        ref_series: &ClimateSeries,
        gcm_series: &ClimateSeries,
        dates: &DatesTable,
    ) -> SolverResult<f64> {
        let ddf = melt_factors(&initial_surface_types(glacier), params);
        let melt = DegreeDayMeltAccumulator::new(&ddf, &glacier.area_km2, &dates.days_in_month)?;
        let downscaler = ElevationBinDownscaler::new(self.config, glacier, params);

        let melt_ref = melt.total_melt_volume(&downscaler.temperature(ref_series, 0.0));
        let objective = |x: &[f64]| {
            let temp_gcm = downscaler.temperature(gcm_series, x[0]);
            (melt_ref - melt.total_melt_volume(&temp_gcm)).abs()
        };
        let options = MinimizeOptions {
            tol: STAGE1_TOL,
            max_iter: 400,
            initial_step: 0.5,
        };
        Ok(minimize(objective, &[0.0], &options).x[0])
    }

    /// Stage 1b: closed-form precipitation seed from the area-weighted
    /// accumulation ratio, with the stage-1 offset already applied to the GCM
    /// temperature field.
    fn accumulation_ratio(
        &self,
        glacier: &Glacier,
        params: &ModelParams,
        ref_series: &ClimateSeries,
        gcm_series: &ClimateSeries,
        temp_adj: f64,
    ) -> f64 {
        let downscaler = ElevationBinDownscaler::new(self.config, glacier, params);
        let ref_fields = downscaler.downscale(ref_series, 0.0);
        let gcm_fields = downscaler.downscale(gcm_series, temp_adj);

        let weighted = |acc: &ndarray::Array2<f64>| -> f64 {
            let mut total = 0.0;
            for ((bin, _), &a) in acc.indexed_iter() {
                total += a * glacier.area_km2[bin];
            }
            total
        };
        let ref_acc = weighted(&ref_fields.acc);
        let gcm_acc = weighted(&gcm_fields.acc);
        if gcm_acc > 0.0 {
            ref_acc / gcm_acc
        } else {
            // no solid precipitation to compare; leave the GCM untouched
            1.0
        }
    }
}
