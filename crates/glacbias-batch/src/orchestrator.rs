//! Per-GCM batch runs: chunk fan-out, solving, and the filesystem merge.

use crate::chunk::{chunk_ranges, chunk_size};
use crate::io::{read_column, read_matrix, read_model_params, read_row};
use crate::merge::{
    chunk_path, lapse_file_stem, merge_chunk_records, merge_lapse_rates, merged_path,
    record_file_stem,
};
use crate::record::{write_records, BiasAdjRecord};
use crate::source::ClimateSource;
use crate::{BatchError, BatchResult};
use glacbias_core::climate::{monthly_climatology, tile_monthly, ClimateSeries, DatesTable};
use glacbias_core::config::RunConfig;
use glacbias_core::glacier::Glacier;
use glacbias_core::massbalance::ClimaticMassBalance;
use glacbias_core::params::ModelParams;
use glacbias_solver::BiasAdjustmentSolver;
use log::{debug, info};
use ndarray::{s, Array1, Array2};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Emit a progress line every this many glaciers.
const PROGRESS_EVERY: usize = 200;

const GLACIER_TABLE: &str = "glacier_table.csv";
const BIN_ELEVATIONS: &str = "bin_elevations.csv";
const BIN_AREA: &str = "bin_area_km2.csv";
const BIN_THICKNESS: &str = "bin_thickness_m.csv";
const BIN_WIDTH: &str = "bin_width_km.csv";
const MODEL_PARAMS: &str = "model_params.csv";
const REF_TEMP: &str = "ref_tas_mon.csv";
const REF_PREC: &str = "ref_pr_mon.csv";
const REF_ELEV: &str = "ref_orog_fx.csv";
const REF_LAPSE: &str = "ref_lr_mon.csv";

#[derive(Debug, Deserialize)]
struct GlacierRow {
    #[serde(rename = "RGIId")]
    id: String,
    z_median: f64,
    z_min: f64,
    z_max: f64,
}

/// Everything that is loaded once per region and shared read-only by every
/// GCM run: glacier geometry, calibrated parameters, and the reference
/// climate matrices (rows in inventory order).
pub struct RegionInputs {
    pub glaciers: Vec<Glacier>,
    pub params: Vec<ModelParams>,
    pub ref_temp: Array2<f64>,
    pub ref_prec: Array2<f64>,
    pub ref_elev: Array1<f64>,
    pub ref_lapse: Array2<f64>,
}

impl RegionInputs {
    /// Load the regional tables from one directory.
    ///
    /// The glacier table carries the scalar elevations per glacier; the bin
    /// elevation row is shared by every glacier (region-wide fixed binning)
    /// and the remaining files are (glacier x bin) or (glacier x month)
    /// matrices in the same row order.
    pub fn load(dir: &Path) -> BatchResult<Self> {
        let table = read_glacier_table(&dir.join(GLACIER_TABLE))?;
        let bin_elevations = read_row(&dir.join(BIN_ELEVATIONS))?;
        let area = read_matrix(&dir.join(BIN_AREA))?;
        let thickness = read_matrix(&dir.join(BIN_THICKNESS))?;
        let width = read_matrix(&dir.join(BIN_WIDTH))?;
        let params = read_model_params(&dir.join(MODEL_PARAMS))?;

        let n = table.len();
        for (name, rows) in [
            (BIN_AREA, area.nrows()),
            (BIN_THICKNESS, thickness.nrows()),
            (BIN_WIDTH, width.nrows()),
            (MODEL_PARAMS, params.len()),
        ] {
            if rows != n {
                return Err(BatchError::Input(format!(
                    "{}: {} rows for {} glaciers",
                    name, rows, n
                )));
            }
        }

        let mut glaciers = Vec::with_capacity(n);
        for (g, row) in table.into_iter().enumerate() {
            glaciers.push(Glacier::new(
                row.id,
                bin_elevations.clone(),
                area.row(g).to_owned(),
                thickness.row(g).to_owned(),
                width.row(g).to_owned(),
                row.z_median,
                row.z_min,
                row.z_max,
            )?);
        }

        let inputs = Self {
            glaciers,
            params,
            ref_temp: read_matrix(&dir.join(REF_TEMP))?,
            ref_prec: read_matrix(&dir.join(REF_PREC))?,
            ref_elev: read_column(&dir.join(REF_ELEV))?,
            ref_lapse: read_matrix(&dir.join(REF_LAPSE))?,
        };
        Ok(inputs)
    }

    pub fn n_glaciers(&self) -> usize {
        self.glaciers.len()
    }

    /// Cross-check every table against the glacier count and the run's
    /// monthly window.
    pub fn validate(&self, n_months: usize) -> BatchResult<()> {
        let n = self.n_glaciers();
        for (name, rows) in [
            ("reference temperature", self.ref_temp.nrows()),
            ("reference precipitation", self.ref_prec.nrows()),
            ("reference elevation", self.ref_elev.len()),
            ("reference lapse rates", self.ref_lapse.nrows()),
            ("model parameters", self.params.len()),
        ] {
            if rows != n {
                return Err(BatchError::Input(format!(
                    "{}: {} rows for {} glaciers",
                    name, rows, n
                )));
            }
        }
        for (name, cols) in [
            ("reference temperature", self.ref_temp.ncols()),
            ("reference precipitation", self.ref_prec.ncols()),
            ("reference lapse rates", self.ref_lapse.ncols()),
        ] {
            if cols != n_months {
                return Err(BatchError::Input(format!(
                    "{}: {} months, run window needs {}",
                    name, cols, n_months
                )));
            }
        }
        Ok(())
    }
}

fn read_glacier_table(path: &Path) -> BatchResult<Vec<GlacierRow>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| BatchError::csv(path, e))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| BatchError::csv(path, e)))
        .collect()
}

/// Worker-pool and output settings from the command line.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub num_workers: usize,
    pub parallel: bool,
    pub group_size: usize,
    pub output_dir: PathBuf,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            num_workers: 5,
            parallel: true,
            group_size: 500,
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Runs the bias-adjustment batch over the regional inventory, one
/// GCM/scenario pair at a time.
pub struct BatchOrchestrator<'a, S> {
    config: &'a RunConfig,
    inputs: &'a RegionInputs,
    source: &'a S,
    options: &'a BatchOptions,
}

impl<'a, S: ClimateSource + Sync> BatchOrchestrator<'a, S> {
    pub fn new(
        config: &'a RunConfig,
        inputs: &'a RegionInputs,
        source: &'a S,
        options: &'a BatchOptions,
    ) -> Self {
        Self {
            config,
            inputs,
            source,
            options,
        }
    }

    /// Process each GCM in turn. An error while processing one GCM is fatal
    /// for the whole run; already-merged outputs of earlier GCMs are left in
    /// place.
    pub fn run(&self, gcm_names: &[String], scenario: &str) -> BatchResult<()> {
        fs::create_dir_all(&self.options.output_dir)
            .map_err(|e| BatchError::io(&self.options.output_dir, e))?;
        for gcm in gcm_names {
            self.run_gcm(gcm, scenario)?;
        }
        Ok(())
    }

    pub fn run_gcm(&self, gcm: &str, scenario: &str) -> BatchResult<()> {
        let started = Instant::now();
        let dates = DatesTable::new(self.config.data_start_year(), self.config.end_year)?;
        let n_months = dates.n_months();
        self.inputs.validate(n_months)?;

        let population = self.inputs.n_glaciers();
        let matrix = self.source.load(gcm, scenario)?;
        if matrix.temp_c.nrows() != population {
            return Err(BatchError::Input(format!(
                "{} {}: {} climate rows for {} glaciers",
                gcm,
                scenario,
                matrix.temp_c.nrows(),
                population
            )));
        }
        if matrix.temp_c.ncols() < n_months {
            return Err(BatchError::Input(format!(
                "{} {}: {} months of climate, run window needs {}",
                gcm,
                scenario,
                matrix.temp_c.ncols(),
                n_months
            )));
        }
        // Projection series usually run past the calibration window; keep
        // only the columns the window covers.
        let gcm_temp = matrix.temp_c.slice(s![.., ..n_months]).to_owned();
        let gcm_prec = matrix.prec_m.slice(s![.., ..n_months]).to_owned();

        let size = chunk_size(population, self.options.num_workers, self.options.group_size);
        let ranges = chunk_ranges(population, size);
        info!(
            "{} {}: {} glaciers in {} chunks of up to {}",
            gcm,
            scenario,
            population,
            ranges.len(),
            size
        );

        let process = |(index, range): (usize, &Range<usize>)| {
            self.process_chunk(
                gcm,
                scenario,
                index,
                range.clone(),
                &gcm_temp,
                &gcm_prec,
                &matrix.elev_m,
                &dates,
            )
        };
        if self.options.parallel && population >= 2 * self.options.num_workers {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.num_workers)
                .build()?;
            pool.install(|| ranges.par_iter().enumerate().try_for_each(process))?;
        } else {
            ranges.iter().enumerate().try_for_each(process)?;
        }

        let (y0, y1) = (self.config.data_start_year(), self.config.end_year);
        let merged = merge_chunk_records(&self.options.output_dir, gcm, scenario, y0, y1)?;
        merge_lapse_rates(&self.options.output_dir, y0, y1)?;
        info!(
            "{} {}: merged {} records in {:.1}s",
            gcm,
            scenario,
            merged,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_chunk(
        &self,
        gcm: &str,
        scenario: &str,
        chunk: usize,
        range: Range<usize>,
        gcm_temp: &Array2<f64>,
        gcm_prec: &Array2<f64>,
        gcm_elev: &Array1<f64>,
        dates: &DatesTable,
    ) -> BatchResult<()> {
        let engine = ClimaticMassBalance::new(self.config);
        let solver = BiasAdjustmentSolver::new(self.config, &engine);
        let n_months = dates.n_months();

        // Monthly lapse-rate climatology for this chunk's glaciers, reused
        // as the GCM lapse series (GCM output carries no lapse rates).
        let lapse_chunk = self.inputs.ref_lapse.slice(s![range.clone(), ..]).to_owned();
        let climatology = monthly_climatology(&lapse_chunk)?;

        let mut records = Vec::with_capacity(range.len());
        for (row, g) in range.clone().enumerate() {
            let glacier = &self.inputs.glaciers[g];
            let params = &self.inputs.params[g];
            let ref_series = ClimateSeries::new(
                self.inputs.ref_temp.row(g).to_owned(),
                self.inputs.ref_prec.row(g).to_owned(),
                self.inputs.ref_elev[g],
                self.inputs.ref_lapse.row(g).to_owned(),
            )?;
            let gcm_series = ClimateSeries::new(
                gcm_temp.row(g).to_owned(),
                gcm_prec.row(g).to_owned(),
                gcm_elev[g],
                tile_monthly(climatology.row(row), n_months)?,
            )?;

            let adjustment = solver.solve(glacier, params, &ref_series, &gcm_series, dates)?;
            records.push(BiasAdjRecord::new(
                &glacier.id,
                &self.config.ref_name,
                gcm,
                scenario,
                &adjustment,
                params,
            ));
            if (g + 1) % PROGRESS_EVERY == 0 {
                debug!(
                    "{} {}: glacier {}/{}",
                    gcm,
                    scenario,
                    g + 1,
                    self.inputs.n_glaciers()
                );
            }
        }

        let (y0, y1) = (self.config.data_start_year(), self.config.end_year);
        let stem = record_file_stem(gcm, scenario, y0, y1);
        write_records(&chunk_path(&self.options.output_dir, &stem, chunk), &records)?;

        // The climatology is identical for every GCM; only the first run per
        // year pair writes it.
        let lapse_stem = lapse_file_stem(y0, y1);
        let final_lapse = merged_path(&self.options.output_dir, &lapse_stem);
        let chunk_lapse = chunk_path(&self.options.output_dir, &lapse_stem, chunk);
        if !final_lapse.exists() && !chunk_lapse.exists() {
            crate::io::write_matrix(&chunk_lapse, &climatology)?;
        }
        Ok(())
    }
}
