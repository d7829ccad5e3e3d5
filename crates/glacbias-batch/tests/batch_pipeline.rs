//! End-to-end batch pipeline tests against a temporary output directory.

use glacbias_batch::io::{read_matrix, write_matrix};
use glacbias_batch::merge::{
    chunk_path, lapse_file_stem, merge_chunk_records, merged_path, record_file_stem,
};
use glacbias_batch::record::{read_records, write_records};
use glacbias_batch::{
    BatchOptions, BatchOrchestrator, BiasAdjRecord, CsvClimateSource, RegionInputs,
};
use glacbias_core::config::RunConfig;
use glacbias_core::glacier::Glacier;
use glacbias_core::params::ModelParams;
use glacbias_solver::BiasAdjustment;
use ndarray::{Array1, Array2};
use std::path::Path;

fn sample_record(id: &str) -> BiasAdjRecord {
    BiasAdjRecord::new(
        id,
        "ERA-Interim",
        "CanESM2",
        "rcp45",
        &BiasAdjustment {
            temp_adj: -0.8,
            prec_adj: 1.1,
            ref_mb_mwea: -0.3,
            gcm_mb_mwea: -0.31,
            ref_vol_change_perc: -5.0,
            gcm_vol_change_perc: -5.1,
            converged: true,
            skipped: false,
        },
        &ModelParams::default(),
    )
}

#[test]
fn record_merge_concatenates_and_deletes_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let stem = record_file_stem("CanESM2", "rcp45", 1995, 2015);
    for chunk in 0..3 {
        let records = vec![
            sample_record(&format!("RGI60-15.{:05}", chunk * 2 + 1)),
            sample_record(&format!("RGI60-15.{:05}", chunk * 2 + 2)),
        ];
        write_records(&chunk_path(dir.path(), &stem, chunk), &records).unwrap();
    }

    let merged = merge_chunk_records(dir.path(), "CanESM2", "rcp45", 1995, 2015).unwrap();
    assert_eq!(merged, 6);
    let records = read_records(&merged_path(dir.path(), &stem)).unwrap();
    assert_eq!(records.len(), 6);
    for chunk in 0..3 {
        assert!(!chunk_path(dir.path(), &stem, chunk).exists());
    }

    // a second merge finds no chunks and leaves the merged table alone
    let merged = merge_chunk_records(dir.path(), "CanESM2", "rcp45", 1995, 2015).unwrap();
    assert_eq!(merged, 0);
    assert_eq!(read_records(&merged_path(dir.path(), &stem)).unwrap().len(), 6);
}

#[test]
fn single_chunk_merge_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let stem = record_file_stem("CanESM2", "rcp45", 1995, 2015);
    write_records(
        &chunk_path(dir.path(), &stem, 0),
        &[sample_record("RGI60-15.00001")],
    )
    .unwrap();
    let merged = merge_chunk_records(dir.path(), "CanESM2", "rcp45", 1995, 2015).unwrap();
    assert_eq!(merged, 1);
    assert!(merged_path(dir.path(), &stem).exists());
}

/// Small glacier with 10 m bins and the outermost bins off-glacier.
fn flat_glacier(id: &str) -> Glacier {
    let n_bins = 6;
    let elev = ndarray::Array::range(4000.0, 4000.0 + 10.0 * n_bins as f64, 10.0);
    let mut area = Array1::from_elem(n_bins, 1.0);
    let mut thickness = Array1::from_elem(n_bins, 50.0);
    area[0] = 0.0;
    area[n_bins - 1] = 0.0;
    thickness[0] = 0.0;
    thickness[n_bins - 1] = 0.0;
    let z_min = elev[1];
    let z_max = elev[n_bins - 2];
    Glacier::new(
        id,
        elev,
        area,
        thickness,
        Array1::from_elem(n_bins, 0.5),
        (z_min + z_max) / 2.0,
        z_min,
        z_max,
    )
    .unwrap()
}

fn flat_params() -> ModelParams {
    ModelParams {
        prec_grad: 0.0,
        temp_change: 0.0,
        ..ModelParams::default()
    }
}

/// Identical glaciers with uniform reference climate; the matching GCM files
/// carry a constant +2 degC warm bias (see `write_gcm_inputs`).
fn biased_region(n_glaciers: usize, n_months: usize) -> RegionInputs {
    let glaciers: Vec<Glacier> = (1..=n_glaciers)
        .map(|i| flat_glacier(&format!("RGI60-15.{:05}", i)))
        .collect();
    let z_median = glaciers[0].z_median;
    RegionInputs {
        params: vec![flat_params(); glaciers.len()],
        ref_temp: Array2::from_elem((glaciers.len(), n_months), 0.5),
        ref_prec: Array2::from_elem((glaciers.len(), n_months), 0.1),
        ref_elev: Array1::from_elem(glaciers.len(), z_median),
        ref_lapse: Array2::zeros((glaciers.len(), n_months)),
        glaciers,
    }
}

fn write_gcm_inputs(dir: &Path, gcm: &str, inputs: &RegionInputs, n_months: usize) {
    let warm = &inputs.ref_temp + 2.0;
    write_matrix(&dir.join(format!("{}_rcp45_tas_mon.csv", gcm)), &warm).unwrap();
    write_matrix(
        &dir.join(format!("{}_rcp45_pr_mon.csv", gcm)),
        &inputs.ref_prec,
    )
    .unwrap();
    let elev = inputs
        .ref_elev
        .view()
        .into_shape_with_order((inputs.glaciers.len(), 1))
        .unwrap()
        .to_owned();
    write_matrix(&dir.join(format!("{}_rcp45_orog_fx.csv", gcm)), &elev).unwrap();
    assert_eq!(warm.ncols(), n_months);
}

#[test]
fn orchestrator_recovers_a_warm_bias_and_merges_outputs() {
    // window: 2000..=2001 including one spinup year, 24 months
    let config = RunConfig {
        start_year: 2001,
        end_year: 2001,
        spinup_years: 1,
        ..RunConfig::default()
    };
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    let inputs = biased_region(2, 24);
    write_gcm_inputs(input_dir.path(), "CanESM2", &inputs, 24);
    write_gcm_inputs(input_dir.path(), "CCSM4", &inputs, 24);

    let source = CsvClimateSource::new(input_dir.path());
    let options = BatchOptions {
        num_workers: 2,
        parallel: false,
        group_size: 500,
        output_dir: output_dir.path().to_path_buf(),
    };
    let orchestrator = BatchOrchestrator::new(&config, &inputs, &source, &options);
    orchestrator
        .run(&["CanESM2".to_string(), "CCSM4".to_string()], "rcp45")
        .unwrap();

    for gcm in ["CanESM2", "CCSM4"] {
        let stem = record_file_stem(gcm, "rcp45", 2000, 2001);
        let records = read_records(&merged_path(output_dir.path(), &stem)).unwrap();
        assert_eq!(records.len(), 2);
        for record in &records {
            assert!(record.converged, "{} did not converge", record.glacier_id);
            assert!(
                (record.temp_adj + 2.0).abs() < 0.3,
                "{} temp_adj {}",
                gcm,
                record.temp_adj
            );
            assert!(
                (record.prec_adj - 1.0).abs() < 0.1,
                "{} prec_adj {}",
                gcm,
                record.prec_adj
            );
            assert!((record.ref_mb_mwea - record.gcm_mb_mwea).abs() < 5e-3);
        }
        // chunk files consumed (2 glaciers across 2 workers -> 2 chunks)
        assert!(!chunk_path(output_dir.path(), &stem, 0).exists());
        assert!(!chunk_path(output_dir.path(), &stem, 1).exists());
    }

    // one shared lapse-rate table for the whole year pair, (glacier x 12)
    let lapse_stem = lapse_file_stem(2000, 2001);
    let lapse = read_matrix(&merged_path(output_dir.path(), &lapse_stem)).unwrap();
    assert_eq!(lapse.dim(), (2, 12));
    assert!(!chunk_path(output_dir.path(), &lapse_stem, 0).exists());
}

#[test]
fn parallel_fan_out_merges_every_chunk() {
    // 12 glaciers across 2 workers with a group size of 2 forces 6 chunks
    // through the thread-pool branch, with concurrent chunk-file writes.
    let config = RunConfig {
        start_year: 2001,
        end_year: 2001,
        spinup_years: 1,
        ..RunConfig::default()
    };
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    let inputs = biased_region(12, 24);
    write_gcm_inputs(input_dir.path(), "CanESM2", &inputs, 24);

    let source = CsvClimateSource::new(input_dir.path());
    let options = BatchOptions {
        num_workers: 2,
        parallel: true,
        group_size: 2,
        output_dir: output_dir.path().to_path_buf(),
    };
    BatchOrchestrator::new(&config, &inputs, &source, &options)
        .run(&["CanESM2".to_string()], "rcp45")
        .unwrap();

    let stem = record_file_stem("CanESM2", "rcp45", 2000, 2001);
    let records = read_records(&merged_path(output_dir.path(), &stem)).unwrap();
    assert_eq!(records.len(), 12);
    let ids: std::collections::HashSet<&str> =
        records.iter().map(|r| r.glacier_id.as_str()).collect();
    assert_eq!(ids.len(), 12, "duplicate glacier rows after the merge");
    for record in &records {
        assert!(
            (record.temp_adj + 2.0).abs() < 0.3,
            "{} temp_adj {}",
            record.glacier_id,
            record.temp_adj
        );
    }
    for chunk in 0..6 {
        assert!(!chunk_path(output_dir.path(), &stem, chunk).exists());
    }

    let lapse_stem = lapse_file_stem(2000, 2001);
    let lapse = read_matrix(&merged_path(output_dir.path(), &lapse_stem)).unwrap();
    assert_eq!(lapse.dim(), (12, 12));
    for chunk in 0..6 {
        assert!(!chunk_path(output_dir.path(), &lapse_stem, chunk).exists());
    }
}
