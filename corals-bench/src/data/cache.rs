/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! On-disk memoization of prepared datasets.
//!
//! A dataset is identified by its name alone: once `<root>/benchmark/<name>.h5` exists it
//! is returned as-is, without checking how it was produced. Builds without the `hdf5`
//! feature use the binary format and `.bin` instead.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use corals_utils::{
    Table,
    file::{self, TableFileError},
    table::LabelMismatch,
};
use thiserror::Error;

use super::{
    prepare,
    preprocess::{Filters, preprocess_table},
};

/// The seed for synthetic data unless overridden.
pub const DEFAULT_SEED: u64 = 42;

/// The extension of cached dataset files.
pub const EXTENSION: &str = file::DEFAULT_EXTENSION;

/// The kinds of datasets the cache knows how to name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetKind {
    SyntheticMn,
    SyntheticNratio,
    /// A parameterless kind named after itself, such as `pregnancy`.
    Named(String),
}

impl DatasetKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SyntheticMn => "synthetic_mn",
            Self::SyntheticNratio => "synthetic_nratio",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "synthetic_mn" => Self::SyntheticMn,
            "synthetic_nratio" => Self::SyntheticNratio,
            other => Self::Named(other.to_owned()),
        })
    }
}

/// Generation parameters. Which ones are required depends on the [`DatasetKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Params {
    pub m: Option<usize>,
    pub n: Option<usize>,
    pub size: Option<usize>,
    pub ratio: Option<f64>,
}

impl Params {
    pub fn mn(m: usize, n: usize) -> Self {
        Self {
            m: Some(m),
            n: Some(n),
            ..Self::default()
        }
    }

    fn given(&self) -> Vec<&'static str> {
        [
            ("m", self.m.is_some()),
            ("n", self.n.is_some()),
            ("size", self.size.is_some()),
            ("ratio", self.ratio.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, given)| given.then_some(name))
        .collect()
    }
}

/// A dataset kind with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    pub kind: DatasetKind,
    pub params: Params,
}

impl DatasetSpec {
    pub fn new(kind: DatasetKind, params: Params) -> Self {
        Self { kind, params }
    }

    pub fn synthetic_mn(m: usize, n: usize) -> Self {
        Self::new(DatasetKind::SyntheticMn, Params::mn(m, n))
    }

    pub fn named(name: &str) -> Self {
        Self::new(DatasetKind::Named(name.to_owned()), Params::default())
    }

    /// The name of the unprocessed dataset.
    pub fn base_name(&self) -> Result<String, CacheError> {
        let kind = &self.kind;
        let missing = |name| CacheError::MissingParameter {
            kind: kind.to_string(),
            name,
        };
        let unexpected = |allowed: &[&str]| {
            let extra: Vec<_> = self
                .params
                .given()
                .into_iter()
                .filter(|p| !allowed.contains(p))
                .collect();
            if extra.is_empty() {
                Ok(())
            } else {
                Err(CacheError::Naming {
                    kind: kind.to_string(),
                    params: extra.join(", "),
                })
            }
        };

        match kind {
            DatasetKind::SyntheticMn => {
                unexpected(&["m", "n"])?;
                let m = self.params.m.ok_or_else(|| missing("m"))?;
                let n = self.params.n.ok_or_else(|| missing("n"))?;
                Ok(format!("synthetic_mn_m-{m}_n-{n}"))
            }
            DatasetKind::SyntheticNratio => {
                unexpected(&["size", "ratio"])?;
                let size = self.params.size.ok_or_else(|| missing("size"))?;
                let ratio = self.params.ratio.ok_or_else(|| missing("ratio"))?;
                Ok(format!("synthetic_ratio_size-{size}_ratio-{ratio}"))
            }
            DatasetKind::Named(name) => {
                unexpected(&[])?;
                Ok(name.clone())
            }
        }
    }
}

/// How a base dataset is turned into a benchmark dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub postprocess: bool,
    pub negative: bool,
    pub drop_duplicates: bool,
    /// Keep the leading `floor(sample * n)` columns.
    pub sample: Option<f64>,
    /// Prepended to the final name.
    pub prefix: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            postprocess: true,
            negative: false,
            drop_duplicates: false,
            sample: None,
            prefix: None,
        }
    }
}

impl LoadOptions {
    /// Append the suffixes of these options to `base`.
    pub fn final_name(&self, base: &str) -> String {
        let mut name = String::new();
        if let Some(prefix) = &self.prefix {
            name.push_str(prefix);
        }
        name.push_str(base);
        if self.postprocess {
            name.push_str("_postprocessed");
            if self.negative {
                name.push_str("_nonegatives");
            }
            if self.drop_duplicates {
                name.push_str("_dropduplicates");
            }
        }
        if let Some(sample) = self.sample {
            name.push_str(&format!("_sample-{sample:.2}"));
        }
        name
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("dataset kind \"{kind}\" has no naming rule for parameters: {params}")]
    Naming { kind: String, params: String },

    #[error("dataset kind \"{kind}\" requires the parameter \"{name}\"")]
    MissingParameter { kind: String, name: &'static str },

    #[error("no preparation function for dataset kind \"{0}\"")]
    Unsupported(String),

    #[error("sample ratio must be in (0, 1], got {0}")]
    Sample(f64),

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: TableFileError,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: TableFileError,
    },

    #[error("failed to import {}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}:{line}: cannot parse \"{value}\" as a number", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{}: rows do not all have {ncols} values", path.display())]
    Ragged { path: PathBuf, ncols: usize },

    #[error(transparent)]
    Labels(#[from] LabelMismatch),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The dataset cache rooted at a data directory.
///
/// Layout: `raw/<kind>.csv` (inputs), `processed/<base>.h5` (prepared base datasets) and
/// `benchmark/<name>.h5` (postprocessed datasets ready for benchmarking), with `.bin` in
/// place of `.h5` without the `hdf5` feature.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
    seed: u64,
}

impl Cache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn benchmark_dir(&self) -> PathBuf {
        self.root.join("benchmark")
    }

    pub fn benchmark_path(&self, name: &str) -> PathBuf {
        self.benchmark_dir().join(format!("{name}.{EXTENSION}"))
    }

    pub fn processed_path(&self, name: &str) -> PathBuf {
        self.root.join("processed").join(format!("{name}.{EXTENSION}"))
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    /// Return the benchmark dataset for `spec` under `options`, preparing and caching it
    /// if needed. Returns the final name along with the data.
    pub fn load(
        &self,
        spec: &DatasetSpec,
        options: &LoadOptions,
    ) -> Result<(String, Table), CacheError> {
        let base = spec.base_name()?;
        let name = options.final_name(&base);
        let path = self.benchmark_path(&name);
        if path.exists() {
            tracing::info!(%name, "benchmark data exists; returning");
            return Ok((name, read(&path)?));
        }

        tracing::info!(%name, "preparing benchmark data");
        let mut table = self.base(spec, &base)?;
        if options.postprocess {
            let filters = Filters::postprocess(options.negative, options.drop_duplicates);
            table = preprocess_table(&table, &filters);
        }
        if let Some(sample) = options.sample {
            if !(sample > 0.0 && sample <= 1.0) {
                return Err(CacheError::Sample(sample));
            }
            let keep = (sample * table.ncols() as f64).floor() as usize;
            table = table.leading_columns(keep);
        }

        tracing::info!(
            %name,
            nrows = table.nrows(),
            ncols = table.ncols(),
            "saving benchmark data"
        );
        write(&table, &path)?;
        Ok((name, table))
    }

    /// Read the cached benchmark dataset called `name`.
    pub fn load_benchmark(&self, name: &str) -> Result<Table, CacheError> {
        read(&self.benchmark_path(name))
    }

    /// The names of all cached benchmark datasets, sorted.
    pub fn benchmark_names(&self) -> Result<Vec<String>, CacheError> {
        let dir = self.benchmark_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    // The unprocessed dataset, read from `processed/` or prepared and written there.
    fn base(&self, spec: &DatasetSpec, base: &str) -> Result<Table, CacheError> {
        let path = self.processed_path(base);
        if path.exists() {
            tracing::info!(name = %base, "loading processed data");
            return read(&path);
        }

        let params = &spec.params;
        let table = match &spec.kind {
            // `base_name` has checked the parameters.
            DatasetKind::SyntheticMn => prepare::synthetic_mn(
                params.m.unwrap_or_default(),
                params.n.unwrap_or_default(),
                self.seed,
            ),
            DatasetKind::SyntheticNratio => prepare::synthetic_nratio(
                params.size.unwrap_or_default(),
                params.ratio.unwrap_or_default(),
                self.seed,
            ),
            DatasetKind::Named(name) if REAL_KINDS.contains(&name.as_str()) => {
                prepare::real(name, &self.raw_dir(), self.seed)?
            }
            DatasetKind::Named(name) => return Err(CacheError::Unsupported(name.clone())),
        };
        write(&table, &path)?;
        Ok(table)
    }
}

/// Named kinds that are imported from `raw/<kind>.csv`.
pub const REAL_KINDS: [&str; 5] = [
    "preeclampsia",
    "pregnancy",
    "cancer",
    "singlecell",
    "singlecell_large",
];

fn read(path: &Path) -> Result<Table, CacheError> {
    file::load(path).map_err(|source| CacheError::Read {
        path: path.to_owned(),
        source,
    })
}

fn write(table: &Table, path: &Path) -> Result<(), CacheError> {
    file::save(table, path).map_err(|source| CacheError::Write {
        path: path.to_owned(),
        source,
    })?;
    Ok(())
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DatasetSpec::synthetic_mn(50, 200), "synthetic_mn_m-50_n-200")]
    #[case(
        DatasetSpec::new(
            DatasetKind::SyntheticNratio,
            Params { size: Some(1000), ratio: Some(10.0), ..Params::default() },
        ),
        "synthetic_ratio_size-1000_ratio-10"
    )]
    #[case(
        DatasetSpec::new(
            DatasetKind::SyntheticNratio,
            Params { size: Some(1000), ratio: Some(0.5), ..Params::default() },
        ),
        "synthetic_ratio_size-1000_ratio-0.5"
    )]
    #[case(DatasetSpec::named("pregnancy"), "pregnancy")]
    fn base_names(#[case] spec: DatasetSpec, #[case] expected: &str) {
        assert_eq!(spec.base_name().unwrap(), expected);
    }

    #[test]
    fn naming_errors() {
        let spec = DatasetSpec::new(
            DatasetKind::Named("cancer".into()),
            Params {
                m: Some(3),
                ..Params::default()
            },
        );
        assert!(matches!(spec.base_name(), Err(CacheError::Naming { .. })));

        let spec = DatasetSpec::new(
            DatasetKind::SyntheticMn,
            Params {
                m: Some(3),
                ..Params::default()
            },
        );
        assert!(matches!(
            spec.base_name(),
            Err(CacheError::MissingParameter { name: "n", .. })
        ));
    }

    #[test]
    fn final_names() {
        let base = "synthetic_mn_m-50_n-200";
        assert_eq!(
            LoadOptions::default().final_name(base),
            "synthetic_mn_m-50_n-200_postprocessed"
        );

        let options = LoadOptions {
            postprocess: true,
            negative: true,
            drop_duplicates: true,
            sample: Some(0.25),
            prefix: Some("volatile_".into()),
        };
        assert_eq!(
            options.final_name("cancer"),
            "volatile_cancer_postprocessed_nonegatives_dropduplicates_sample-0.25"
        );

        let options = LoadOptions {
            postprocess: false,
            ..LoadOptions::default()
        };
        assert_eq!(options.final_name(base), base);
    }

    #[test]
    fn loads_are_deterministic_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let spec = DatasetSpec::synthetic_mn(10, 30);

        let (name, first) = cache.load(&spec, &LoadOptions::default()).unwrap();
        assert_eq!(name, "synthetic_mn_m-10_n-30_postprocessed");
        assert!(cache.benchmark_path(&name).exists());
        assert!(cache.processed_path("synthetic_mn_m-10_n-30").exists());
        assert_eq!(first.data().shape(), (10, 30));

        // A fresh cache over a different directory produces identical data.
        let other = tempfile::tempdir().unwrap();
        let (_, second) = Cache::new(other.path())
            .load(&spec, &LoadOptions::default())
            .unwrap();
        assert_eq!(first, second);

        assert_eq!(cache.benchmark_names().unwrap(), vec![name]);
    }

    #[test]
    fn cached_files_are_trusted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let spec = DatasetSpec::synthetic_mn(4, 5);
        let (name, _) = cache.load(&spec, &LoadOptions::default()).unwrap();

        let substitute = prepare::uniform(2, 2, 7);
        file::save(&substitute, &cache.benchmark_path(&name)).unwrap();

        let (_, loaded) = cache.load(&spec, &LoadOptions::default()).unwrap();
        assert_eq!(loaded, substitute);
    }

    #[test]
    fn sampling_keeps_leading_columns() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let spec = DatasetSpec::synthetic_mn(6, 10);

        let (_, full) = cache.load(&spec, &LoadOptions::default()).unwrap();
        let options = LoadOptions {
            sample: Some(0.5),
            ..LoadOptions::default()
        };
        let (name, sampled) = cache.load(&spec, &options).unwrap();
        assert!(name.ends_with("_sample-0.50"));
        assert_eq!(sampled, full.leading_columns(5));

        let options = LoadOptions {
            sample: Some(1.5),
            ..LoadOptions::default()
        };
        assert!(matches!(
            cache.load(&spec, &options),
            Err(CacheError::Sample(_))
        ));
    }

    #[test]
    fn unknown_kinds_need_a_processed_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let spec = DatasetSpec::named("mystery");
        assert!(matches!(
            cache.load(&spec, &LoadOptions::default()),
            Err(CacheError::Unsupported(_))
        ));

        file::save(&prepare::uniform(3, 4, 1), &cache.processed_path("mystery")).unwrap();
        let (name, table) = cache.load(&spec, &LoadOptions::default()).unwrap();
        assert_eq!(name, "mystery_postprocessed");
        assert_eq!(table.ncols(), 4);
    }
}
