//! Filesystem merge of worker chunk files.
//!
//! Workers write one result file per chunk with the chunk index embedded in
//! the filename; the merge scans the output directory by prefix, concatenates
//! whatever chunks it finds and deletes them. The trailing underscore in the
//! prefix keeps the merged file itself out of the scan, so the merge is
//! idempotent for any number of chunks. A chunk a worker never produced is
//! skipped with a warning rather than failing the run.

use crate::io::{read_matrix, write_matrix};
use crate::record::{read_records, write_records};
use crate::{BatchError, BatchResult};
use log::warn;
use ndarray::{concatenate, Axis};
use std::fs;
use std::path::{Path, PathBuf};

/// Filename stem for one GCM/scenario result table.
pub fn record_file_stem(gcm: &str, scenario: &str, y0: i32, y1: i32) -> String {
    format!("{}_{}_biasadj_{}_{}", gcm, scenario, y0, y1)
}

/// Filename stem for the shared lapse-rate climatology table.
pub fn lapse_file_stem(y0: i32, y1: i32) -> String {
    format!("biasadj_mon_lravg_{}_{}", y0, y1)
}

pub fn chunk_path(dir: &Path, stem: &str, chunk: usize) -> PathBuf {
    dir.join(format!("{}_{}.csv", stem, chunk))
}

pub fn merged_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.csv", stem))
}

/// Chunk files for a stem, ordered by chunk index.
fn chunk_files(dir: &Path, stem: &str) -> BatchResult<Vec<(usize, PathBuf)>> {
    let prefix = format!("{}_", stem);
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| BatchError::io(dir, e))? {
        let entry = entry.map_err(|e| BatchError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let index = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".csv"))
            .and_then(|rest| rest.parse::<usize>().ok());
        if let Some(index) = index {
            found.push((index, entry.path()));
        }
    }
    found.sort_by_key(|(index, _)| *index);
    Ok(found)
}

/// Concatenate all record chunks for one GCM/scenario into the final table
/// and delete the consumed chunk files. Returns the number of merged rows.
pub fn merge_chunk_records(
    dir: &Path,
    gcm: &str,
    scenario: &str,
    y0: i32,
    y1: i32,
) -> BatchResult<usize> {
    let stem = record_file_stem(gcm, scenario, y0, y1);
    let chunks = chunk_files(dir, &stem)?;
    if chunks.is_empty() {
        warn!("no chunk files found for {}", stem);
        return Ok(0);
    }
    let mut records = Vec::new();
    for (_, path) in &chunks {
        records.extend(read_records(path)?);
    }
    write_records(&merged_path(dir, &stem), &records)?;
    for (_, path) in &chunks {
        fs::remove_file(path).map_err(|e| BatchError::io(path, e))?;
    }
    Ok(records.len())
}

/// Merge the lapse-rate climatology chunks into the single shared table for
/// this (start, end) pair, then delete the chunks.
///
/// The merged table is written at most once per year pair and reused across
/// GCMs; subsequent GCMs find no chunks and the call is a no-op.
pub fn merge_lapse_rates(dir: &Path, y0: i32, y1: i32) -> BatchResult<()> {
    let stem = lapse_file_stem(y0, y1);
    let chunks = chunk_files(dir, &stem)?;
    if chunks.is_empty() {
        return Ok(());
    }
    let merged = merged_path(dir, &stem);
    if !merged.exists() {
        let matrices: Vec<_> = chunks
            .iter()
            .map(|(_, path)| read_matrix(path))
            .collect::<BatchResult<_>>()?;
        let views: Vec<_> = matrices.iter().map(|m| m.view()).collect();
        let stacked = concatenate(Axis(0), &views)
            .map_err(|e| BatchError::Input(format!("{}: {}", stem, e)))?;
        write_matrix(&merged, &stacked)?;
    }
    for (_, path) in &chunks {
        fs::remove_file(path).map_err(|e| BatchError::io(path, e))?;
    }
    Ok(())
}
