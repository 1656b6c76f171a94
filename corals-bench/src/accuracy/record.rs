/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Stored accuracy sweeps.
//!
//! In HDF5 (`.h5`) a record is the `approximation_factors` dataset plus one dataset per
//! metric under the `metrics` group. JSON (`.json`) holds the same fields.

use std::{ffi::OsStr, path::Path};

use corals_bench_runner::atomic_save;
#[cfg(feature = "hdf5")]
use corals_bench_runner::atomic_write;
use serde::{Deserialize, Serialize};

use super::metrics::Series;

/// The extension accuracy results are written with.
pub const EXTENSION: &str = crate::benchmark::store::EXTENSION;

/// The stored result of an accuracy sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    pub approximation_factors: Vec<usize>,
    pub metrics: Series,
}

impl AccuracyRecord {
    /// Replace the file at `path` with this record, in the format its extension names.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        match path.extension().and_then(OsStr::to_str) {
            Some("json") => atomic_save(path, self),
            #[cfg(feature = "hdf5")]
            Some("h5" | "hdf5") => atomic_write(path, |temp| Ok(h5::write(temp, self)?)),
            #[cfg(not(feature = "hdf5"))]
            Some("h5" | "hdf5") => anyhow::bail!(
                "{} is an HDF5 file but HDF5 support was not compiled in",
                path.display()
            ),
            _ => anyhow::bail!(
                "{} is not a results file: expected a .h5 or .json extension",
                path.display()
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn open(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(OsStr::to_str) {
            #[cfg(feature = "hdf5")]
            Some("h5" | "hdf5") => Ok(h5::read(path)?),
            _ => Ok(serde_json::from_slice(&std::fs::read(path)?)?),
        }
    }
}

#[cfg(feature = "hdf5")]
mod h5 {
    use std::path::Path;

    use super::{AccuracyRecord, Series};

    const FACTORS: &str = "approximation_factors";
    const METRICS: &str = "metrics";

    fn columns(series: &Series) -> [(&'static str, &[f64]); 4] {
        [
            ("accuracy", series.accuracy.as_slice()),
            ("precision", series.precision.as_slice()),
            ("recall", series.recall.as_slice()),
            ("f1", series.f1.as_slice()),
        ]
    }

    pub(super) fn write(path: &Path, record: &AccuracyRecord) -> hdf5::Result<()> {
        let file = hdf5::File::create(path)?;
        let factors: Vec<u64> = record
            .approximation_factors
            .iter()
            .map(|&f| f as u64)
            .collect();
        file.new_dataset_builder()
            .with_data(factors.as_slice())
            .create(FACTORS)?;

        let metrics = file.create_group(METRICS)?;
        for (name, values) in columns(&record.metrics) {
            metrics.new_dataset_builder().with_data(values).create(name)?;
        }
        file.close()
    }

    #[cfg(test)]
    pub(super) fn read(path: &Path) -> hdf5::Result<AccuracyRecord> {
        let file = hdf5::File::open(path)?;
        let factors: Vec<u64> = file.dataset(FACTORS)?.read_raw()?;
        let metrics = file.group(METRICS)?;
        let read = |name: &str| metrics.dataset(name)?.read_raw::<f64>();
        Ok(AccuracyRecord {
            approximation_factors: factors.into_iter().map(|f| f as usize).collect(),
            metrics: Series {
                accuracy: read("accuracy")?,
                precision: read("precision")?,
                recall: read("recall")?,
                f1: read("f1")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AccuracyRecord {
        AccuracyRecord {
            approximation_factors: vec![1, 2],
            metrics: Series {
                accuracy: vec![0.5, 1.0],
                precision: vec![0.25, 1.0],
                recall: vec![0.75, 1.0],
                f1: vec![0.375, 1.0],
            },
        }
    }

    #[test]
    fn json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acccuracy___data-d___topk-5.00percent___method-tree.json");
        record().save(&path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["approximation_factors"][1], 2);
        assert_eq!(json["metrics"]["f1"][0], 0.375);
        assert_eq!(AccuracyRecord::open(&path).unwrap(), record());

        assert!(record().save(&dir.path().join("record.txt")).is_err());
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn hdf5_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acccuracy___data-d___topk-5.00percent___method-tree.h5");
        record().save(&path).unwrap();
        let temp = dir
            .path()
            .join("acccuracy___data-d___topk-5.00percent___method-tree.h5.temp");
        assert!(!temp.exists());

        let file = hdf5::File::open(&path).unwrap();
        let recall: Vec<f64> = file.dataset("metrics/recall").unwrap().read_raw().unwrap();
        assert_eq!(recall, [0.75, 1.0]);
        let factors: Vec<u64> = file.dataset("approximation_factors").unwrap().read_raw().unwrap();
        assert_eq!(factors, [1, 2]);
        drop(file);

        assert_eq!(AccuracyRecord::open(&path).unwrap(), record());
    }
}
