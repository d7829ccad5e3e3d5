//! Delimited numeric IO.
//!
//! Regional climate and geometry inputs arrive as plain CSV matrices with one
//! row per glacier (inventory order) and no headers; the model-parameter
//! table carries a header row matching the [`ModelParams`] field names.

use crate::{BatchError, BatchResult};
use glacbias_core::params::ModelParams;
use ndarray::{Array1, Array2};
use std::path::Path;

/// Read a headerless CSV file into a dense (rows x cols) matrix.
pub fn read_matrix(path: &Path) -> BatchResult<Array2<f64>> {
    // flexible so ragged rows reach the width check below, which reports the
    // offending row and both widths
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| BatchError::csv(path, e))?;

    let mut values = Vec::new();
    let mut n_rows = 0;
    let mut n_cols = None;
    for result in reader.records() {
        let record = result.map_err(|e| BatchError::csv(path, e))?;
        let row: Vec<f64> = record
            .iter()
            .map(|field| field.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| BatchError::Input(format!("{}: {}", path.display(), e)))?;
        match n_cols {
            None => n_cols = Some(row.len()),
            Some(w) if w != row.len() => {
                return Err(BatchError::Input(format!(
                    "{}: row {} has {} columns, expected {}",
                    path.display(),
                    n_rows,
                    row.len(),
                    w
                )))
            }
            Some(_) => {}
        }
        values.extend(row);
        n_rows += 1;
    }
    let n_cols = n_cols.unwrap_or(0);
    Array2::from_shape_vec((n_rows, n_cols), values)
        .map_err(|e| BatchError::Input(format!("{}: {}", path.display(), e)))
}

/// Read a CSV file holding a single column as a vector. A row-shaped file is
/// rejected so a transposed per-glacier table cannot slip through.
pub fn read_column(path: &Path) -> BatchResult<Array1<f64>> {
    let matrix = read_matrix(path)?;
    if matrix.ncols() > 1 {
        return Err(BatchError::Input(format!(
            "{}: expected a single column, got {} x {}",
            path.display(),
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    Ok(Array1::from_iter(matrix.iter().copied()))
}

/// Read a CSV file holding a single row as a vector (the region-wide bin
/// elevation table is row-shaped).
pub fn read_row(path: &Path) -> BatchResult<Array1<f64>> {
    let matrix = read_matrix(path)?;
    if matrix.nrows() > 1 {
        return Err(BatchError::Input(format!(
            "{}: expected a single row, got {} x {}",
            path.display(),
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    Ok(Array1::from_iter(matrix.iter().copied()))
}

/// Write a matrix as headerless CSV, one row per line.
pub fn write_matrix(path: &Path, matrix: &Array2<f64>) -> BatchResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| BatchError::csv(path, e))?;
    for row in matrix.outer_iter() {
        let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writer
            .write_record(&fields)
            .map_err(|e| BatchError::csv(path, e))?;
    }
    writer.flush().map_err(|e| BatchError::io(path, e))?;
    Ok(())
}

/// Read the calibrated model-parameter table, one row per glacier in
/// inventory order.
pub fn read_model_params(path: &Path) -> BatchResult<Vec<ModelParams>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| BatchError::csv(path, e))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| BatchError::csv(path, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::fs;

    #[test]
    fn matrix_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        let matrix = array![[1.0, 2.5, -3.0], [0.0, 1e-7, 4000.0]];
        write_matrix(&path, &matrix).unwrap();
        assert_eq!(read_matrix(&path).unwrap(), matrix);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "1,2,3\n4,5\n").unwrap();
        assert!(matches!(read_matrix(&path), Err(BatchError::Input(_))));
    }

    #[test]
    fn non_numeric_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "1,2\n3,oops\n").unwrap();
        assert!(matches!(read_matrix(&path), Err(BatchError::Input(_))));
    }

    #[test]
    fn vector_readers_enforce_their_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let row = dir.path().join("row.csv");
        let column = dir.path().join("column.csv");
        fs::write(&row, "1,2,3\n").unwrap();
        fs::write(&column, "1\n2\n3\n").unwrap();

        assert_eq!(read_row(&row).unwrap(), array![1.0, 2.0, 3.0]);
        assert_eq!(read_column(&column).unwrap(), array![1.0, 2.0, 3.0]);
        // a transposed file is rejected, not silently reinterpreted
        assert!(matches!(read_column(&row), Err(BatchError::Input(_))));
        assert!(matches!(read_row(&column), Err(BatchError::Input(_))));
    }

    #[test]
    fn model_params_parse_by_header_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.csv");
        fs::write(
            &path,
            "lr_gcm,lr_glac,prec_factor,prec_grad,ddf_snow,ddf_ice,temp_snow,temp_change\n\
             -0.0065,-0.0060,1.2,0.0001,0.0041,0.0059,1.0,-0.3\n",
        )
        .unwrap();
        let params = read_model_params(&path).unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].prec_factor, 1.2);
        assert_eq!(params[0].temp_change, -0.3);
    }
}
