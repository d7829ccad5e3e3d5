//! Projection of centroid climate onto a glacier's elevation bins.
//!
//! Temperature moves from the grid-cell elevation to the glacier's reference
//! elevation with the per-month lapse rate, then across the bins with the same
//! monthly series:
//!
//! `T[bin,m] = T_cell[m] + lr[m] * (z_ref - z_cell) + lr[m] * (z_bin - z_ref) + temp_change + offset`
//!
//! Precipitation scales with the calibrated factor and an elevation gradient:
//!
//! `P[bin,m] = P_cell[m] * prec_factor * (1 + prec_grad * (z_bin - z_ref))`
//!
//! On glaciers spanning more than 1000 m, the uppermost quartile of on-glacier
//! bins has its precipitation decayed exponentially and floored at 87.5 % of
//! the glacier-wide maximum (wind erosion and reduced moisture content at the
//! top of large-relief glaciers; Huss and Hock, 2015). Total precipitation is
//! then partitioned into snow and rain, and off-glacier bins are zeroed in
//! every derived field.

use crate::climate::ClimateSeries;
use crate::config::{AccumulationOption, RunConfig};
use crate::glacier::Glacier;
use crate::params::ModelParams;
use ndarray::Array2;

/// Elevation range above which the upper-quartile precipitation limit kicks in [m].
const PREC_LIMIT_ELEV_RANGE: f64 = 1000.0;
/// Floor for upper-quartile precipitation, as a fraction of the glacier-wide maximum.
const PREC_LIMIT_FLOOR: f64 = 0.875;

/// Downscaled (bin x month) climate fields for one glacier.
#[derive(Debug, Clone)]
pub struct BinClimate {
    /// Air temperature [degC].
    pub temp: Array2<f64>,
    /// Liquid precipitation (rain) [m].
    pub prec: Array2<f64>,
    /// Solid precipitation (accumulation) [m w.e.].
    pub acc: Array2<f64>,
}

/// Pure projection of a centroid climate series onto elevation bins.
///
/// Holds no state across glaciers and performs no IO.
pub struct ElevationBinDownscaler<'a> {
    config: &'a RunConfig,
    glacier: &'a Glacier,
    params: &'a ModelParams,
}

impl<'a> ElevationBinDownscaler<'a> {
    pub fn new(config: &'a RunConfig, glacier: &'a Glacier, params: &'a ModelParams) -> Self {
        Self {
            config,
            glacier,
            params,
        }
    }

    /// Downscaled temperature field with an additional uniform offset, with
    /// off-glacier rows zeroed.
    pub fn temperature(&self, series: &ClimateSeries, temp_offset: f64) -> Array2<f64> {
        let z_ref = self.glacier.reference_elevation(self.config);
        let n_bins = self.glacier.n_bins();
        let n_months = series.n_months();
        let mut temp = Array2::zeros((n_bins, n_months));
        for (bin, &z_bin) in self.glacier.bin_elevations.iter().enumerate() {
            if self.glacier.area_km2[bin] <= 0.0 {
                continue;
            }
            for month in 0..n_months {
                let lr = series.lapse_rates[month];
                temp[[bin, month]] = series.temp_c[month]
                    + lr * (z_ref - series.cell_elev_m)
                    + lr * (z_bin - z_ref)
                    + self.params.temp_change
                    + temp_offset;
            }
        }
        temp
    }

    /// Total (snow + rain) precipitation field, including the upper-quartile
    /// limit. Off-glacier rows are not yet zeroed; [`Self::downscale`] zeroes
    /// them after the snow/rain partition.
    pub fn total_precipitation(&self, series: &ClimateSeries) -> Array2<f64> {
        let z_ref = self.glacier.reference_elevation(self.config);
        let n_bins = self.glacier.n_bins();
        let n_months = series.n_months();
        let mut prec = Array2::zeros((n_bins, n_months));
        for (bin, &z_bin) in self.glacier.bin_elevations.iter().enumerate() {
            let scale = self.params.prec_factor * (1.0 + self.params.prec_grad * (z_bin - z_ref));
            for month in 0..n_months {
                prec[[bin, month]] = series.prec_m[month] * scale;
            }
        }
        if self.config.prec_limit_upper_bins {
            self.apply_upper_quartile_limit(&mut prec);
        }
        prec
    }

    /// Full downscale: temperature (with offset), total precipitation, and
    /// the snow/rain partition, with off-glacier bins zeroed everywhere.
    pub fn downscale(&self, series: &ClimateSeries, temp_offset: f64) -> BinClimate {
        let temp = self.temperature(series, temp_offset);
        let precsnow = self.total_precipitation(series);
        let (mut prec, mut acc) = self.partition(&temp, &precsnow);

        for (bin, &area) in self.glacier.area_km2.iter().enumerate() {
            if area <= 0.0 {
                prec.row_mut(bin).fill(0.0);
                acc.row_mut(bin).fill(0.0);
            }
        }
        BinClimate { temp, prec, acc }
    }

    /// Exponential decay plus floor on the uppermost quartile of on-glacier
    /// bins, applied only when the on-glacier elevation range exceeds 1000 m.
    ///
    /// The quartile is selected by on-glacier bin index, not elevation value.
    fn apply_upper_quartile_limit(&self, prec: &mut Array2<f64>) {
        let on_glacier = self.glacier.on_glacier_indices();
        if on_glacier.len() < 2 {
            return;
        }
        let elev = &self.glacier.bin_elevations;
        let first = on_glacier[0];
        let last = on_glacier[on_glacier.len() - 1];
        if elev[last] - elev[first] <= PREC_LIMIT_ELEV_RANGE {
            return;
        }
        let count = on_glacier.len() as f64;
        let upper: Vec<usize> = on_glacier
            .iter()
            .copied()
            .filter(|&i| (i - first + 1) as f64 / count * 100.0 > 75.0)
            .collect();
        let Some(&upper_first) = upper.first() else {
            return;
        };
        let z_upper_first = elev[upper_first];
        let z_span = elev[last] - z_upper_first;
        if z_span <= 0.0 {
            return;
        }

        let n_months = prec.ncols();
        // Decay from the 75th-percentile bin's value
        for &i in &upper {
            let decay = (-(elev[i] - z_upper_first) / z_span).exp();
            for month in 0..n_months {
                prec[[i, month]] = prec[[upper_first, month]] * decay;
            }
        }
        // Floor at 87.5 % of the glacier-wide maximum over on-glacier bins
        for month in 0..n_months {
            let max = on_glacier
                .iter()
                .map(|&i| prec[[i, month]])
                .fold(0.0, f64::max);
            let floor = PREC_LIMIT_FLOOR * max;
            for &i in &upper {
                if prec[[i, month]] != 0.0 && prec[[i, month]] < floor {
                    prec[[i, month]] = floor;
                }
            }
        }
    }

    fn partition(&self, temp: &Array2<f64>, precsnow: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let temp_snow = self.params.temp_snow;
        let mut prec = Array2::zeros(precsnow.raw_dim());
        let mut acc = Array2::zeros(precsnow.raw_dim());
        match self.config.accumulation {
            AccumulationOption::Threshold => {
                for ((idx, &t), &p) in temp.indexed_iter().zip(precsnow.iter()) {
                    if t > temp_snow {
                        prec[idx] = p;
                    } else {
                        acc[idx] = p;
                    }
                }
            }
            AccumulationOption::LinearRamp => {
                for ((idx, &t), &p) in temp.indexed_iter().zip(precsnow.iter()) {
                    if t > temp_snow + 1.0 {
                        prec[idx] = p;
                    } else if t <= temp_snow - 1.0 {
                        acc[idx] = p;
                    } else {
                        let rain = (0.5 + (t - temp_snow) / 2.0) * p;
                        prec[idx] = rain;
                        acc[idx] = p - rain;
                    }
                }
            }
        }
        (prec, acc)
    }
}
