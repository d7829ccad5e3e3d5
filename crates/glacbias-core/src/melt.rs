//! Degree-day melt accounting.
//!
//! Melt energy is the positive-degree-day sum `max(T, 0) * days`, converted to
//! melt with the per-bin degree-day factor and aggregated over the glacier
//! with bin-area weighting. The resulting scalar is the stage-1 objective
//! quantity: it is monotonically non-decreasing in a uniform temperature
//! offset, which the stage-1 optimizer relies on.

use crate::{CoreError, CoreResult};
use ndarray::{Array1, Array2};

/// Area-weighted degree-day melt over a fixed set of bins.
pub struct DegreeDayMeltAccumulator<'a> {
    /// Per-bin degree-day factor [m w.e. degC-1 d-1]; zero for off-glacier bins.
    ddf: &'a Array1<f64>,
    /// Per-bin area [km2].
    area_km2: &'a Array1<f64>,
    /// Days per month [d].
    days_in_month: &'a Array1<f64>,
}

impl<'a> DegreeDayMeltAccumulator<'a> {
    pub fn new(
        ddf: &'a Array1<f64>,
        area_km2: &'a Array1<f64>,
        days_in_month: &'a Array1<f64>,
    ) -> CoreResult<Self> {
        if ddf.len() != area_km2.len() {
            return Err(CoreError::LengthMismatch {
                name: "ddf".to_string(),
                expected: area_km2.len(),
                actual: ddf.len(),
            });
        }
        Ok(Self {
            ddf,
            area_km2,
            days_in_month,
        })
    }

    /// Melt per bin-month [m w.e.] for a downscaled temperature field.
    pub fn melt_field(&self, temp: &Array2<f64>) -> Array2<f64> {
        let mut melt = Array2::zeros(temp.raw_dim());
        for ((bin, month), &t) in temp.indexed_iter() {
            if t > 0.0 {
                melt[[bin, month]] = t * self.days_in_month[month] * self.ddf[bin];
            }
        }
        melt
    }

    /// Total melt volume over all bins and months [m w.e. km2].
    pub fn total_melt_volume(&self, temp: &Array2<f64>) -> f64 {
        debug_assert_eq!(temp.nrows(), self.ddf.len());
        debug_assert_eq!(temp.ncols(), self.days_in_month.len());
        let mut total = 0.0;
        for ((bin, month), &t) in temp.indexed_iter() {
            if t > 0.0 {
                total += t * self.days_in_month[month] * self.ddf[bin] * self.area_km2[bin];
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    #[test]
    fn melt_volume_sums_positive_degree_days() {
        let ddf = array![0.004, 0.006];
        let area = array![1.0, 2.0];
        let days = array![30.0, 31.0];
        let temp = array![[1.0, -5.0], [2.0, 0.5]];
        let acc = DegreeDayMeltAccumulator::new(&ddf, &area, &days).unwrap();
        // bin 0: 1.0*30*0.004*1.0; bin 1: 2.0*30*0.006*2.0 + 0.5*31*0.006*2.0
        let expected = 0.12 + 0.72 + 0.186;
        assert!(is_close!(acc.total_melt_volume(&temp), expected));
    }

    #[test]
    fn negative_temperatures_produce_no_melt() {
        let ddf = array![0.004];
        let area = array![1.0];
        let days = array![31.0];
        let temp = array![[-0.1]];
        let acc = DegreeDayMeltAccumulator::new(&ddf, &area, &days).unwrap();
        assert_eq!(acc.total_melt_volume(&temp), 0.0);
        assert_eq!(acc.melt_field(&temp)[[0, 0]], 0.0);
    }

    #[test]
    fn zero_area_bins_contribute_nothing() {
        let ddf = array![0.004, 0.004];
        let area = array![0.0, 1.0];
        let days = array![30.0];
        let temp = array![[10.0], [1.0]];
        let acc = DegreeDayMeltAccumulator::new(&ddf, &area, &days).unwrap();
        assert!(is_close!(acc.total_melt_volume(&temp), 1.0 * 30.0 * 0.004));
    }

    #[test]
    fn melt_is_monotonic_in_temperature_offset() {
        let ddf = array![0.004, 0.006];
        let area = array![1.0, 2.0];
        let days = array![30.0, 31.0, 30.0];
        let temp = array![[-2.0, 1.0, 3.0], [-1.0, 0.0, 4.0]];
        let acc = DegreeDayMeltAccumulator::new(&ddf, &area, &days).unwrap();
        let mut previous = f64::NEG_INFINITY;
        for step in -10..=10 {
            let offset = step as f64 * 0.5;
            let shifted = &temp + offset;
            let melt = acc.total_melt_volume(&shifted);
            assert!(melt >= previous, "melt decreased at offset {}", offset);
            previous = melt;
        }
    }

    #[test]
    fn mismatched_ddf_length_rejected() {
        let ddf = array![0.004];
        let area = array![1.0, 1.0];
        let days = array![30.0];
        assert!(DegreeDayMeltAccumulator::new(&ddf, &area, &days).is_err());
    }
}
