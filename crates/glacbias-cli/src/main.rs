//! Batch bias-adjustment command.
//!
//! # Usage
//!
//! ```bash
//! glacbias gcm_rcp45_filenames.txt \
//!   --num-workers 8 \
//!   --config run.toml \
//!   --input-dir data/region15 \
//!   --output-dir output/region15
//! ```
//!
//! The scenario is parsed from the GCM list filename
//! (`gcm_<scenario>_filenames.txt`); the file holds one GCM name per line.

use clap::Parser;
use glacbias_batch::{BatchOptions, BatchOrchestrator, CsvClimateSource, RegionInputs};
use glacbias_core::config::RunConfig;
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Bias-adjust GCM climate against the reference dataset for every glacier in
/// a regional inventory.
#[derive(Parser, Debug)]
#[command(name = "glacbias")]
#[command(about = "Batch GCM bias adjustment for glacier mass-balance projections")]
struct Args {
    /// Newline-delimited GCM list (gcm_<scenario>_filenames.txt)
    gcm_file: PathBuf,

    /// Worker threads for the chunk fan-out
    #[arg(long, default_value_t = 5)]
    num_workers: usize,

    /// Process chunks serially on the main thread
    #[arg(long)]
    serial: bool,

    /// Maximum glaciers per chunk
    #[arg(long, default_value_t = 500)]
    group_size: usize,

    /// Run configuration (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the regional input tables and GCM climate
    #[arg(long, default_value = "input")]
    input_dir: PathBuf,

    /// Directory the result tables are written to
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
}

/// Scenario label embedded in the list filename, e.g.
/// `gcm_rcp45_filenames.txt` -> `rcp45`.
fn scenario_from_filename(path: &Path) -> Option<String> {
    path.file_stem()?
        .to_str()?
        .split('_')
        .nth(1)
        .map(str::to_string)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => RunConfig::from_toml(path)?,
        None => RunConfig::default(),
    };

    let scenario = scenario_from_filename(&args.gcm_file).ok_or_else(|| {
        format!(
            "cannot parse a scenario from {} (expected gcm_<scenario>_filenames.txt)",
            args.gcm_file.display()
        )
    })?;
    let gcm_names: Vec<String> = fs::read_to_string(&args.gcm_file)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if gcm_names.is_empty() {
        return Err(format!("{} lists no GCMs", args.gcm_file.display()).into());
    }
    info!(
        "{} GCMs, scenario {}, window {}..={}",
        gcm_names.len(),
        scenario,
        config.data_start_year(),
        config.end_year
    );

    let inputs = RegionInputs::load(&args.input_dir)?;
    let source = CsvClimateSource::new(&args.input_dir);
    let options = BatchOptions {
        num_workers: args.num_workers,
        parallel: !args.serial,
        group_size: args.group_size,
        output_dir: args.output_dir.clone(),
    };
    BatchOrchestrator::new(&config, &inputs, &source, &options).run(&gcm_names, &scenario)?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
