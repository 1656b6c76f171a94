/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The store of benchmark results: one record per experiment key.
//!
//! The file format follows the extension. In HDF5 (`.h5`) each key is a group holding the
//! `memory` and `runtime` datasets, with `timestamp` and `memory_backend` as attributes of
//! the group. JSON (`.json`) maps each key to an object with the same four fields.

use std::{
    collections::BTreeMap,
    ffi::OsStr,
    path::{Path, PathBuf},
};

use corals_bench_runner::atomic_save;
#[cfg(feature = "hdf5")]
use corals_bench_runner::atomic_write;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Measurements of one experiment, one entry per repetition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Peak memory in MiB, or `-1` when not measured.
    pub memory: Vec<f64>,
    /// Wall-clock seconds.
    pub runtime: Vec<f64>,
    /// Seconds since the Unix epoch when the measurements started.
    pub timestamp: f64,
    pub memory_backend: String,
}

/// The extension results are written with.
#[cfg(feature = "hdf5")]
pub const EXTENSION: &str = "h5";
#[cfg(not(feature = "hdf5"))]
pub const EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{} is not a results file: expected a .h5 or .json extension", path.display())]
    Extension { path: PathBuf },

    #[error("{} is an HDF5 file but HDF5 support was not compiled in", path.display())]
    Unsupported { path: PathBuf },

    #[cfg(feature = "hdf5")]
    #[error("{} is not a valid HDF5 results file", path.display())]
    Hdf5 {
        path: PathBuf,
        #[source]
        source: hdf5::Error,
    },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid results file", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "cannot overwrite \"{key}\": it holds {existing} repetitions but {new} were measured"
    )]
    LengthMismatch {
        key: String,
        existing: usize,
        new: usize,
    },

    #[error("memory and runtime of \"{key}\" have different lengths")]
    Ragged { key: String },
}

/// Results keyed by fully-qualified experiment name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    records: BTreeMap<String, Record>,
}

impl Store {
    /// Open the store at `path`, or an empty store if the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let format = Format::of(path)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        match format {
            Format::Json => {
                let contents = std::fs::read(path).map_err(|source| StoreError::Read {
                    path: path.to_owned(),
                    source,
                })?;
                serde_json::from_slice(&contents).map_err(|source| StoreError::Parse {
                    path: path.to_owned(),
                    source,
                })
            }
            #[cfg(feature = "hdf5")]
            Format::Hdf5 => {
                let records = h5::read(path).map_err(|source| StoreError::Hdf5 {
                    path: path.to_owned(),
                    source,
                })?;
                Ok(Self { records })
            }
            #[cfg(not(feature = "hdf5"))]
            Format::Hdf5 => Err(StoreError::Unsupported {
                path: path.to_owned(),
            }),
        }
    }

    /// Replace the file at `path` with this store. The previous file survives a failed
    /// save.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        match Format::of(path)? {
            Format::Json => atomic_save(path, self),
            #[cfg(feature = "hdf5")]
            Format::Hdf5 => atomic_write(path, |temp| Ok(h5::write(temp, &self.records)?)),
            #[cfg(not(feature = "hdf5"))]
            Format::Hdf5 => Err(StoreError::Unsupported {
                path: path.to_owned(),
            }
            .into()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Record)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert `record` under `key`.
    ///
    /// An existing record is replaced in place, which requires the same number of
    /// repetitions.
    pub fn insert(&mut self, key: &str, record: Record) -> Result<(), StoreError> {
        if record.memory.len() != record.runtime.len() {
            return Err(StoreError::Ragged {
                key: key.to_owned(),
            });
        }
        if let Some(existing) = self.records.get_mut(key) {
            if existing.runtime.len() != record.runtime.len()
                || existing.memory.len() != record.memory.len()
            {
                return Err(StoreError::LengthMismatch {
                    key: key.to_owned(),
                    existing: existing.runtime.len(),
                    new: record.runtime.len(),
                });
            }
            existing.memory.copy_from_slice(&record.memory);
            existing.runtime.copy_from_slice(&record.runtime);
            existing.timestamp = record.timestamp;
            existing.memory_backend = record.memory_backend;
        } else {
            self.records.insert(key.to_owned(), record);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Hdf5,
}

impl Format {
    fn of(path: &Path) -> Result<Self, StoreError> {
        match path.extension().and_then(OsStr::to_str) {
            Some("json") => Ok(Self::Json),
            Some("h5" | "hdf5") => Ok(Self::Hdf5),
            _ => Err(StoreError::Extension {
                path: path.to_owned(),
            }),
        }
    }
}

#[cfg(feature = "hdf5")]
mod h5 {
    use std::{collections::BTreeMap, path::Path};

    use hdf5::types::VarLenUnicode;

    use super::Record;

    const MEMORY: &str = "memory";
    const RUNTIME: &str = "runtime";
    const TIMESTAMP: &str = "timestamp";
    const MEMORY_BACKEND: &str = "memory_backend";

    pub(super) fn read(path: &Path) -> hdf5::Result<BTreeMap<String, Record>> {
        let file = hdf5::File::open(path)?;
        let mut records = BTreeMap::new();
        for key in file.member_names()? {
            let group = file.group(&key)?;
            let memory_backend: VarLenUnicode = group.attr(MEMORY_BACKEND)?.read_scalar()?;
            let record = Record {
                memory: group.dataset(MEMORY)?.read_raw()?,
                runtime: group.dataset(RUNTIME)?.read_raw()?,
                timestamp: group.attr(TIMESTAMP)?.read_scalar()?,
                memory_backend: memory_backend.as_str().to_owned(),
            };
            records.insert(key, record);
        }
        Ok(records)
    }

    pub(super) fn write(path: &Path, records: &BTreeMap<String, Record>) -> hdf5::Result<()> {
        let file = hdf5::File::create(path)?;
        for (key, record) in records {
            let group = file.create_group(key)?;
            group
                .new_dataset_builder()
                .with_data(record.memory.as_slice())
                .create(MEMORY)?;
            group
                .new_dataset_builder()
                .with_data(record.runtime.as_slice())
                .create(RUNTIME)?;
            group
                .new_attr::<f64>()
                .shape(())
                .create(TIMESTAMP)?
                .write_scalar(&record.timestamp)?;

            let memory_backend: VarLenUnicode = record
                .memory_backend
                .parse()
                .map_err(|err| hdf5::Error::from(format!("memory backend: {err}")))?;
            group
                .new_attr::<VarLenUnicode>()
                .shape(())
                .create(MEMORY_BACKEND)?
                .write_scalar(&memory_backend)?;
        }
        file.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(runtime: &[f64], timestamp: f64) -> Record {
        Record {
            memory: vec![-1.0; runtime.len()],
            runtime: runtime.to_vec(),
            timestamp,
            memory_backend: "none".into(),
        }
    }

    #[test]
    fn overwrite_in_place() {
        let mut store = Store::default();
        store.insert("topk_matrix", record(&[1.0, 2.0], 10.0)).unwrap();
        store.insert("topk_matrix", record(&[3.0, 4.0], 20.0)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("topk_matrix").unwrap(), &record(&[3.0, 4.0], 20.0));

        let err = store
            .insert("topk_matrix", record(&[5.0], 30.0))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::LengthMismatch {
                existing: 2,
                new: 1,
                ..
            }
        ));
        // Unchanged after the failure.
        assert_eq!(store.get("topk_matrix").unwrap().timestamp, 20.0);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        assert!(Store::open(&path).unwrap().is_empty());

        let mut store = Store::default();
        store.insert("cor_corrcoef", record(&[0.5], 1.5)).unwrap();
        store.save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["cor_corrcoef"]["runtime"][0], 0.5);
        assert_eq!(json["cor_corrcoef"]["memory_backend"], "none");

        assert_eq!(Store::open(&path).unwrap(), store);
    }

    #[test]
    fn corrupt_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(Store::open(&path), Err(StoreError::Parse { .. })));

        let path = dir.path().join("results.csv");
        assert!(matches!(Store::open(&path), Err(StoreError::Extension { .. })));
        assert!(Store::default().save(&path).is_err());
        assert!(!path.exists());
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn hdf5_groups_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.h5");
        assert!(Store::open(&path).unwrap().is_empty());

        let mut store = Store::default();
        store.insert("topk_matrix_nthreads-4", record(&[0.5, 0.25], 1.5)).unwrap();
        store.insert("cor_corrcoef", record(&[2.0, 3.0], 2.5)).unwrap();
        store.save(&path).unwrap();
        assert!(!dir.path().join("results.h5.temp").exists());

        {
            let file = hdf5::File::open(&path).unwrap();
            let group = file.group("topk_matrix_nthreads-4").unwrap();
            let runtime: Vec<f64> = group.dataset("runtime").unwrap().read_raw().unwrap();
            assert_eq!(runtime, [0.5, 0.25]);
            let memory: Vec<f64> = group.dataset("memory").unwrap().read_raw().unwrap();
            assert_eq!(memory, [-1.0, -1.0]);
            let timestamp: f64 = group.attr("timestamp").unwrap().read_scalar().unwrap();
            assert_eq!(timestamp, 1.5);
            let backend: hdf5::types::VarLenUnicode =
                group.attr("memory_backend").unwrap().read_scalar().unwrap();
            assert_eq!(backend.as_str(), "none");
        }

        let mut reopened = Store::open(&path).unwrap();
        assert_eq!(reopened, store);

        reopened
            .insert("cor_corrcoef", record(&[4.0, 5.0], 3.5))
            .unwrap();
        reopened.save(&path).unwrap();
        let last = Store::open(&path).unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last.get("cor_corrcoef").unwrap().runtime, [4.0, 5.0]);
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn json_is_not_hdf5() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.h5");
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(Store::open(&path), Err(StoreError::Hdf5 { .. })));
    }

    #[test]
    fn default_extension_follows_the_build() {
        let expected = if cfg!(feature = "hdf5") { "h5" } else { "json" };
        assert_eq!(EXTENSION, expected);
    }
}
