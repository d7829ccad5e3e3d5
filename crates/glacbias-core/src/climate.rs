//! Monthly climate series, the dates table, and the lapse-rate climatology.

use crate::{CoreError, CoreResult};
use chrono::NaiveDate;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Ordered sequence of calendar months with parallel days-in-month values.
///
/// Degree-day energy is `T * days`, so the calendar (including leap years)
/// matters; days are taken from the proleptic Gregorian calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatesTable {
    /// (year, month) per entry, January of `start_year` through December of
    /// `end_year`.
    pub months: Vec<(i32, u32)>,
    /// Days in each month [d].
    pub days_in_month: Array1<f64>,
}

impl DatesTable {
    /// Build the monthly table spanning `start_year..=end_year` (whole
    /// calendar years).
    pub fn new(start_year: i32, end_year: i32) -> CoreResult<Self> {
        if end_year < start_year {
            return Err(CoreError::Config(format!(
                "end_year {} precedes start_year {}",
                end_year, start_year
            )));
        }
        let mut months = Vec::new();
        let mut days = Vec::new();
        for year in start_year..=end_year {
            for month in 1..=12u32 {
                months.push((year, month));
                days.push(days_in_month(year, month) as f64);
            }
        }
        Ok(Self {
            months,
            days_in_month: Array1::from_vec(days),
        })
    }

    pub fn n_months(&self) -> usize {
        self.months.len()
    }

    pub fn n_years(&self) -> usize {
        self.months.len() / 12
    }
}

fn days_in_month(year: i32, month: u32) -> i64 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
                29
            } else {
                28
            }
        }
    }
}

/// Monthly centroid climate for one glacier: temperature, precipitation, the
/// grid-cell elevation the series is valid at, and the per-month lapse rates
/// used to move off that elevation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateSeries {
    /// Air temperature at the grid cell [degC].
    pub temp_c: Array1<f64>,
    /// Total precipitation at the grid cell [m].
    pub prec_m: Array1<f64>,
    /// Elevation of the grid cell the series was extracted at [m].
    pub cell_elev_m: f64,
    /// Lapse rate per month [degC m-1].
    pub lapse_rates: Array1<f64>,
}

impl ClimateSeries {
    pub fn new(
        temp_c: Array1<f64>,
        prec_m: Array1<f64>,
        cell_elev_m: f64,
        lapse_rates: Array1<f64>,
    ) -> CoreResult<Self> {
        let n = temp_c.len();
        for (name, len) in [("prec_m", prec_m.len()), ("lapse_rates", lapse_rates.len())] {
            if len != n {
                return Err(CoreError::LengthMismatch {
                    name: name.to_string(),
                    expected: n,
                    actual: len,
                });
            }
        }
        Ok(Self {
            temp_c,
            prec_m,
            cell_elev_m,
            lapse_rates,
        })
    }

    pub fn n_months(&self) -> usize {
        self.temp_c.len()
    }

    /// Apply a bias-adjustment pair: shift temperature, scale precipitation.
    pub fn adjusted(&self, temp_adj: f64, prec_adj: f64) -> ClimateSeries {
        ClimateSeries {
            temp_c: &self.temp_c + temp_adj,
            prec_m: &self.prec_m * prec_adj,
            cell_elev_m: self.cell_elev_m,
            lapse_rates: self.lapse_rates.clone(),
        }
    }
}

/// Average a (glacier x month) lapse-rate matrix into a (glacier x 12)
/// monthly climatology, averaging each calendar month across years.
///
/// The climatology is computed once from the reference dataset and reused
/// verbatim for every GCM and year.
pub fn monthly_climatology(lapse_rates: &Array2<f64>) -> CoreResult<Array2<f64>> {
    let n_months = lapse_rates.ncols();
    if n_months == 0 || n_months % 12 != 0 {
        return Err(CoreError::PartialYear(n_months));
    }
    let n_years = n_months / 12;
    let mut avg = Array2::zeros((lapse_rates.nrows(), 12));
    for (g, row) in lapse_rates.outer_iter().enumerate() {
        for month in 0..12 {
            let mut sum = 0.0;
            for year in 0..n_years {
                sum += row[year * 12 + month];
            }
            avg[[g, month]] = sum / n_years as f64;
        }
    }
    Ok(avg)
}

/// Tile a 12-element monthly climatology out to `n_months`.
///
/// A target length that is not a multiple of 12 is a configuration error:
/// the lapse-rate series must stay aligned with the climate series.
pub fn tile_monthly(climatology: ArrayView1<f64>, n_months: usize) -> CoreResult<Array1<f64>> {
    if climatology.len() != 12 {
        return Err(CoreError::LengthMismatch {
            name: "climatology".to_string(),
            expected: 12,
            actual: climatology.len(),
        });
    }
    if n_months == 0 || n_months % 12 != 0 {
        return Err(CoreError::PartialYear(n_months));
    }
    let mut tiled = Array1::zeros(n_months);
    for i in 0..n_months {
        tiled[i] = climatology[i % 12];
    }
    Ok(tiled)
}
