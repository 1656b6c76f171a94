/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Accuracy of the ball-tree approximations against exact references, across a sweep of
//! approximation factors.

pub mod metrics;
mod record;

use std::{fmt, io::Write, path::Path};

use anyhow::Context;
use corals::{
    Correlations, CorrelationError, Executor, Strategy, topk,
    topkdiff::{self, Method as Coefficient},
};
use corals_bench_runner::Output;
use corals_utils::views::Matrix;

use crate::{
    data::{Cache, DatasetKind, DatasetSpec, LoadOptions, preprocess::mask_min_nunique},
    utils::k_from_ratio,
};

use metrics::{Confusion, Series};
pub use record::{AccuracyRecord, EXTENSION};

/// Rows per sample group of the paired pregnancy data.
const PREGNANCY_GROUP: usize = 17;

const DIFF_DEFAULT_M: usize = 100;
const DIFF_DEFAULT_N: usize = 1000;
const DIFF_DEFAULT_SIZE: usize = 200_000;
const DIFF_DEFAULT_RATIO: f64 = 10.0;

/// The approximation evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Method {
    /// The combined-tree ball-tree search.
    #[default]
    Tree,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree => f.write_str("tree"),
        }
    }
}

/// Settings shared by both evaluators.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub k_ratio: f64,
    /// Factors `1..=max_approx` are evaluated.
    pub max_approx: usize,
    pub method: Method,
    pub n_threads: usize,
    pub overwrite: bool,
}

impl Sweep {
    fn k_name(&self) -> String {
        format!("{:.2}percent", self.k_ratio * 100.0)
    }
}

/// Evaluate approximate top-k on the cached benchmark dataset `data`.
///
/// Returns `None` if the results exist and overwriting was not requested.
pub fn accuracy_topk(
    data: &str,
    sweep: &Sweep,
    cache: &Cache,
    out_dir: &Path,
    mut output: &mut dyn Output,
) -> anyhow::Result<Option<AccuracyRecord>> {
    let table = cache
        .load_benchmark(data)
        .with_context(|| format!("loading dataset \"{data}\""))?;
    let x = table.data();
    let k = k_from_ratio(x.ncols(), sweep.k_ratio);

    let name = format!(
        "acccuracy___data-{data}___topk-{}___method-{}",
        sweep.k_name(),
        sweep.method
    );
    writeln!(output, "{name}")?;
    writeln!(output, "* Data: {x}")?;

    let path = out_dir.join(format!("{name}.{EXTENSION}"));
    if !claim(&path, sweep.overwrite, output)? {
        return Ok(None);
    }

    writeln!(output, "* Calculate reference topk")?;
    let reference = topk::topk_matrix(x, k)?;
    let executor = Executor::with_workers(sweep.n_threads)?;
    let record = evaluate(&reference, x.ncols(), sweep.max_approx, output, |factor| {
        topk::topk_balltree(x, k, factor, Strategy::CombinedTree, &executor)
    })?;

    writeln!(output, "* Write results")?;
    record.save(&path)?;
    Ok(Some(record))
}

/// The data of the top-k-difference evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffData {
    pub spec: DatasetSpec,
    /// Used for the pregnancy data only.
    pub options: LoadOptions,
}

impl DiffData {
    /// Missing synthetic parameters default to `m = 100, n = 1000` and
    /// `size = 200000, ratio = 10`.
    pub fn new(mut spec: DatasetSpec, options: LoadOptions) -> Self {
        let params = &mut spec.params;
        match spec.kind {
            DatasetKind::SyntheticMn => {
                params.m.get_or_insert(DIFF_DEFAULT_M);
                params.n.get_or_insert(DIFF_DEFAULT_N);
            }
            DatasetKind::SyntheticNratio => {
                params.size.get_or_insert(DIFF_DEFAULT_SIZE);
                params.ratio.get_or_insert(DIFF_DEFAULT_RATIO);
            }
            DatasetKind::Named(_) => {}
        }
        Self { spec, options }
    }
}

/// Evaluate approximate top-k difference search.
///
/// Synthetic kinds compare a dataset against itself. `pregnancy` compares its last two
/// groups of 17 samples, keeping columns with at least two distinct values in both.
pub fn accuracy_topkdiff(
    data: &DiffData,
    sweep: &Sweep,
    spearman: bool,
    cache: &Cache,
    out_dir: &Path,
    mut output: &mut dyn Output,
) -> anyhow::Result<Option<AccuracyRecord>> {
    let (data_name, x1, x2) = paired(data, cache, output)?;
    let n = x1.ncols();
    let k = k_from_ratio(n, sweep.k_ratio);

    let name = format!(
        "acccuracy___data-{data_name}___topkdiff-{}___method-{}___spearman-{spearman}",
        sweep.k_name(),
        sweep.method
    );
    writeln!(output, "{name}")?;
    writeln!(output, "* Data: {x1} / {x2}")?;

    let path = out_dir.join(format!("{name}.{EXTENSION}"));
    if !claim(&path, sweep.overwrite, output)? {
        return Ok(None);
    }

    let coefficient = if spearman {
        Coefficient::Spearman
    } else {
        Coefficient::Pearson
    };
    let (x1, x2) = (x1.as_view(), x2.as_view());

    writeln!(output, "* Calculate reference topk")?;
    let reference = topkdiff::topkdiff_matrix(x1, x2, k, coefficient)?;
    let executor = Executor::with_workers(sweep.n_threads)?;
    let record = evaluate(&reference, n, sweep.max_approx, output, |factor| {
        topkdiff::topkdiff_balltree(x1, x2, k, factor, false, coefficient, &executor)
    })?;

    writeln!(output, "* Write results")?;
    record.save(&path)?;
    Ok(Some(record))
}

// Returns `false` if `path` exists and must be kept. Removes it when overwriting.
fn claim(path: &Path, overwrite: bool, mut output: &mut dyn Output) -> anyhow::Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    if overwrite {
        writeln!(output, "* OVERWRITE: File exists, but overwrite requested")?;
        std::fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
        Ok(true)
    } else {
        writeln!(output, "* SKIPPING: Experiment already exists")?;
        Ok(false)
    }
}

fn paired(
    data: &DiffData,
    cache: &Cache,
    mut output: &mut dyn Output,
) -> anyhow::Result<(String, Matrix<f64>, Matrix<f64>)> {
    match &data.spec.kind {
        DatasetKind::SyntheticMn | DatasetKind::SyntheticNratio => {
            let (name, table) = cache.load(&data.spec, &LoadOptions::default())?;
            let x = table.data().to_matrix();
            Ok((name, x.clone(), x))
        }
        DatasetKind::Named(kind) if kind == "pregnancy" => {
            let (name, table) = cache.load(&data.spec, &data.options)?;
            let d = table.data();
            let m = d.nrows();
            if m < 2 * PREGNANCY_GROUP {
                anyhow::bail!(
                    "\"{name}\" has {m} samples; at least {} are needed",
                    2 * PREGNANCY_GROUP
                );
            }
            let x1 = d.row_range(m - 2 * PREGNANCY_GROUP..m - PREGNANCY_GROUP);
            let x2 = d.row_range(m - PREGNANCY_GROUP..m);

            let mut mask = mask_min_nunique(x1, 2);
            mask.iter_mut()
                .zip(mask_min_nunique(x2, 2))
                .for_each(|(a, b)| *a &= b);

            writeln!(output, "Drop columns with only one value in either group")?;
            writeln!(output, "{x1} {x2}")?;
            let (x1, x2) = (x1.select_columns(&mask), x2.select_columns(&mask));
            writeln!(output, "{x1} {x2}")?;
            Ok((name, x1, x2))
        }
        DatasetKind::Named(kind) => anyhow::bail!("data type not supported: \"{kind}\""),
    }
}

fn evaluate<F>(
    reference: &Correlations,
    n: usize,
    max_approx: usize,
    mut output: &mut dyn Output,
    mut approximate: F,
) -> anyhow::Result<AccuracyRecord>
where
    F: FnMut(f64) -> Result<Correlations, CorrelationError>,
{
    let approximation_factors: Vec<usize> = (1..=max_approx).collect();
    let mut series = Series::default();
    for &factor in &approximation_factors {
        writeln!(output)?;
        writeln!(output, "* Approximation factor: {factor}")?;
        writeln!(output, "  * calculate topk")?;
        let result = approximate(factor as f64)
            .with_context(|| format!("approximation factor {factor}"))?;

        let metrics = Confusion::new(reference, &result, n).metrics();
        writeln!(output, "  * metrics")?;
        writeln!(output, "    * accuracy:  {:.2}", metrics.accuracy)?;
        writeln!(output, "    * precision: {:.2}", metrics.precision)?;
        writeln!(output, "    * recall:    {:.2}", metrics.recall)?;
        writeln!(output, "    * f1:        {:.2}", metrics.f1)?;
        series.push(metrics);
    }
    Ok(AccuracyRecord {
        approximation_factors,
        metrics: series,
    })
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use approx::assert_abs_diff_eq;
    use corals_bench_runner::output::Memory;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::data::Params;

    fn sweep(k_ratio: f64, max_approx: usize) -> Sweep {
        Sweep {
            k_ratio,
            max_approx,
            method: Method::Tree,
            n_threads: 2,
            overwrite: false,
        }
    }

    #[test]
    fn topk_sweep_converges_to_exact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().join("data"));
        let out_dir = dir.path().join("out");
        let (data, _) = cache
            .load(&DatasetSpec::synthetic_mn(50, 200), &LoadOptions::default())
            .unwrap();

        // With k = 2000 and n = 200, factor 20 lets every column gather all 200 neighbors.
        let sweep = sweep(0.05, 20);
        let mut output = Memory::new();
        let record = accuracy_topk(&data, &sweep, &cache, &out_dir, &mut output)
            .unwrap()
            .unwrap();

        assert_eq!(record.approximation_factors, (1..=20).collect::<Vec<_>>());
        let series = &record.metrics;
        assert_eq!(series.len(), 20);
        for values in [&series.accuracy, &series.precision, &series.recall, &series.f1] {
            assert!(values.iter().all(|v| (0.0..=1.0).contains(v)), "{values:?}");
        }
        assert_abs_diff_eq!(series.f1[19], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(series.accuracy[19], 1.0, epsilon = 1e-12);
        // Candidate sets only grow with the factor, so F1 never drops.
        for (factor, pair) in series.f1.windows(2).enumerate() {
            assert!(
                pair[1] >= pair[0] - 1e-12,
                "f1 dropped from factor {} to {}: {:?}",
                factor + 1,
                factor + 2,
                series.f1
            );
        }

        let path = out_dir.join(format!(
            "acccuracy___data-synthetic_mn_m-50_n-200_postprocessed___topk-5.00percent___method-tree.{EXTENSION}",
        ));
        assert_eq!(AccuracyRecord::open(&path).unwrap(), record);

        // A second run skips, an overwriting run replaces.
        let mut output = Memory::new();
        assert!(
            accuracy_topk(&data, &sweep, &cache, &out_dir, &mut output)
                .unwrap()
                .is_none()
        );
        assert!(output.contents().contains("SKIPPING"));

        let sweep = Sweep {
            max_approx: 1,
            overwrite: true,
            ..sweep
        };
        let mut output = Memory::new();
        let record = accuracy_topk(&data, &sweep, &cache, &out_dir, &mut output)
            .unwrap()
            .unwrap();
        assert_eq!(record.approximation_factors, vec![1]);
        assert!(output.contents().contains("OVERWRITE"));
    }

    #[test]
    fn pregnancy_compares_the_last_two_groups() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().join("data"));
        let out_dir = dir.path().join("out");

        // 40 samples, 30 features; feature 0 is constant in the last group.
        let raw = cache.raw_dir();
        std::fs::create_dir_all(&raw).unwrap();
        let mut file = std::fs::File::create(raw.join("pregnancy.csv")).unwrap();
        let header: Vec<String> = (0..30).map(|j| format!("f{j}")).collect();
        writeln!(file, "id,{}", header.join(",")).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for i in 0..40 {
            let row: Vec<String> = (0..30)
                .map(|j| {
                    if j == 0 && i >= 23 {
                        "1".to_owned()
                    } else {
                        format!("{}", rng.random::<f64>())
                    }
                })
                .collect();
            writeln!(file, "s{i},{}", row.join(",")).unwrap();
        }
        drop(file);

        let data = DiffData::new(
            DatasetSpec::named("pregnancy"),
            LoadOptions {
                postprocess: false,
                ..LoadOptions::default()
            },
        );
        let mut output = Memory::new();
        let record = accuracy_topkdiff(&data, &sweep(0.05, 3), true, &cache, &out_dir, &mut output)
            .unwrap()
            .unwrap();
        assert_eq!(record.metrics.len(), 3);

        let contents = output.contents();
        assert!(contents.contains("(17, 30) (17, 30)"), "{contents}");
        assert!(contents.contains("(17, 29) (17, 29)"), "{contents}");
        assert!(
            out_dir
                .join(format!(
                    "acccuracy___data-pregnancy___topkdiff-5.00percent___method-tree___spearman-true.{EXTENSION}"
                ))
                .exists()
        );
    }

    #[test]
    fn synthetic_difference_compares_a_dataset_with_itself() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().join("data"));
        let out_dir = dir.path().join("out");
        let data = DiffData::new(DatasetSpec::synthetic_mn(10, 20), LoadOptions::default());

        let mut output = Memory::new();
        let record = accuracy_topkdiff(&data, &sweep(0.01, 2), false, &cache, &out_dir, &mut output)
            .unwrap()
            .unwrap();
        assert_eq!(record.approximation_factors, vec![1, 2]);
        assert!(output.contents().contains("* Data: (10, 20) / (10, 20)"));
    }

    #[test]
    fn synthetic_parameters_default() {
        let data = DiffData::new(
            DatasetSpec::new(DatasetKind::SyntheticMn, Params::default()),
            LoadOptions::default(),
        );
        assert_eq!(data.spec, DatasetSpec::synthetic_mn(100, 1000));

        let data = DiffData::new(
            DatasetSpec::new(
                DatasetKind::SyntheticMn,
                Params {
                    m: Some(20),
                    ..Params::default()
                },
            ),
            LoadOptions::default(),
        );
        assert_eq!(data.spec, DatasetSpec::synthetic_mn(20, 1000));

        let data = DiffData::new(
            DatasetSpec::new(DatasetKind::SyntheticNratio, Params::default()),
            LoadOptions::default(),
        );
        assert_eq!(data.spec.params.size, Some(200_000));
        assert_eq!(data.spec.params.ratio, Some(10.0));
        assert_eq!(data.spec.params.m, None);

        let data = DiffData::new(DatasetSpec::named("pregnancy"), LoadOptions::default());
        assert_eq!(data.spec, DatasetSpec::named("pregnancy"));
    }

    #[test]
    fn other_kinds_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let data = DiffData::new(DatasetSpec::named("cancer"), LoadOptions::default());
        let err = accuracy_topkdiff(
            &data,
            &sweep(0.01, 1),
            false,
            &cache,
            dir.path(),
            &mut Memory::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not supported"), "{err}");
    }
}
