/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Read and write labeled tables as HDF5 files.
//!
//! A table file holds three datasets at its root:
//! - `data`: `nrows × ncols` `f64` values
//! - `rownames`: `nrows` variable-length UTF-8 strings
//! - `colnames`: `ncols` variable-length UTF-8 strings

use std::path::{Path, PathBuf};

use hdf5::types::VarLenUnicode;
use thiserror::Error;

use crate::{table::Table, views::Matrix};

pub const DATA: &str = "data";
pub const ROW_NAMES: &str = "rownames";
pub const COL_NAMES: &str = "colnames";

/// Error type for [`load_h5`] and [`save_h5`].
#[derive(Debug, Error)]
pub enum H5Error {
    #[error("dataset \"{name}\" has {rank} dimensions, expected {expected}")]
    Rank {
        name: &'static str,
        rank: usize,
        expected: usize,
    },

    #[error("label {label:?} cannot be stored as an HDF5 string: {reason}")]
    Label { label: String, reason: String },

    #[error(transparent)]
    Shape(#[from] crate::views::TryFromError),

    #[error(transparent)]
    Labels(#[from] crate::table::LabelMismatch),

    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Load a table from the HDF5 file at `path` (see [module docs](self)).
pub fn load_h5(path: &Path) -> Result<Table, H5Error> {
    let file = hdf5::File::open(path)?;

    let dataset = file.dataset(DATA)?;
    let shape = dataset.shape();
    let &[nrows, ncols] = shape.as_slice() else {
        return Err(H5Error::Rank {
            name: DATA,
            rank: shape.len(),
            expected: 2,
        });
    };
    let values: Vec<f64> = dataset.read_raw()?;
    let data = Matrix::try_from(values.into_boxed_slice(), nrows, ncols)?;

    let rows = read_labels(&file, ROW_NAMES)?;
    let cols = read_labels(&file, COL_NAMES)?;
    Ok(Table::new(data, rows, cols)?)
}

/// Save a table to `path` as HDF5.
///
/// Like [`crate::io::save_table`], the file is written next to `path` and renamed over
/// it once complete. A failed write leaves any previous file untouched.
pub fn save_h5(table: &Table, path: &Path) -> Result<(), H5Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".temp");
    let temp = PathBuf::from(temp);

    if let Err(err) = write_h5(table, &temp) {
        // The write error takes precedence.
        let _ = std::fs::remove_file(&temp);
        return Err(err);
    }
    std::fs::rename(&temp, path)?;
    Ok(())
}

fn write_h5(table: &Table, path: &Path) -> Result<(), H5Error> {
    let file = hdf5::File::create(path)?;

    let data = table.data();
    file.new_dataset::<f64>()
        .shape((data.nrows(), data.ncols()))
        .create(DATA)?
        .write_raw(data.as_slice())?;

    write_labels(&file, ROW_NAMES, table.row_labels())?;
    write_labels(&file, COL_NAMES, table.col_labels())?;
    file.close()?;
    Ok(())
}

fn read_labels(file: &hdf5::File, name: &'static str) -> Result<Vec<String>, H5Error> {
    let dataset = file.dataset(name)?;
    if dataset.ndim() != 1 {
        return Err(H5Error::Rank {
            name,
            rank: dataset.ndim(),
            expected: 1,
        });
    }
    let labels: Vec<VarLenUnicode> = dataset.read_raw()?;
    Ok(labels.iter().map(|l| l.as_str().to_owned()).collect())
}

/// Convert `labels` to HDF5 strings. Only interior NUL bytes are rejected.
pub fn to_h5_strings(labels: &[String]) -> Result<Vec<VarLenUnicode>, H5Error> {
    labels
        .iter()
        .map(|label| {
            label.parse::<VarLenUnicode>().map_err(|err| H5Error::Label {
                label: label.clone(),
                reason: err.to_string(),
            })
        })
        .collect()
}

fn write_labels(file: &hdf5::File, name: &str, labels: &[String]) -> Result<(), H5Error> {
    let labels = to_h5_strings(labels)?;
    file.new_dataset_builder()
        .with_data(labels.as_slice())
        .create(name)?;
    Ok(())
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        let data = Matrix::try_from(
            vec![1.0, -2.5, 3.0, 0.0, 4.25, -6.0].into_boxed_slice(),
            2,
            3,
        )
        .unwrap();
        Table::new(
            data,
            vec!["sample-1".into(), "sample-2".into()],
            vec!["ENSG0001".into(), "ENSG0002".into(), "β-actin".into()],
        )
        .unwrap()
    }

    #[test]
    fn tables_survive_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmark").join("pregnancy_postprocessed.h5");
        let table = table();
        save_h5(&table, &path).unwrap();
        assert!(!dir.path().join("benchmark/pregnancy_postprocessed.h5.temp").exists());
        assert_eq!(load_h5(&path).unwrap(), table);

        let file = hdf5::File::open(&path).unwrap();
        assert_eq!(file.dataset(DATA).unwrap().shape(), vec![2, 3]);
        assert_eq!(file.dataset(COL_NAMES).unwrap().shape(), vec![3]);
    }

    #[test]
    fn nul_labels_leave_the_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cancer_postprocessed.h5");
        let table = table();
        save_h5(&table, &path).unwrap();

        let (data, rows, _) = table.clone().into_parts();
        let bad = Table::new(
            data,
            rows,
            vec!["a".into(), "b\0c".into(), "d".into()],
        )
        .unwrap();
        assert!(matches!(save_h5(&bad, &path), Err(H5Error::Label { .. })));
        assert!(!dir.path().join("cancer_postprocessed.h5.temp").exists());
        assert_eq!(load_h5(&path).unwrap(), table);
    }

    #[test]
    fn flat_data_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.h5");
        {
            let file = hdf5::File::create(&path).unwrap();
            file.new_dataset_builder()
                .with_data(&[1.0_f64, 2.0][..])
                .create(DATA)
                .unwrap();
        }
        assert!(matches!(
            load_h5(&path),
            Err(H5Error::Rank {
                name: DATA,
                rank: 1,
                expected: 2
            })
        ));
    }
}
