/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The benchmark driver: run one experiment on one dataset `n_repeat` times and store the
//! runtime and peak memory of every repetition.

pub mod memory;
pub mod store;

use std::{
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use corals_bench_runner::{Output, timed};

use crate::{
    data::{
        Cache,
        preprocess::{Filters, preprocess_diff},
    },
    registry::{ExperimentId, Family, load_experiments},
    utils::{k_from_ratio, tracing::benchmark_span},
};

pub use memory::MemoryBackend;
pub use store::{Record, Store, StoreError};

/// One benchmark invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub prefix: String,
    pub experiment: ExperimentId,
    /// The name of a cached benchmark dataset.
    pub data: String,
    pub n_repeat: usize,
    pub k_ratio: f64,
    pub threshold: f64,
    /// The process-wide thread cap the run executes under.
    pub threads: usize,
    pub overwrite: bool,
    pub memory_backend: MemoryBackend,
}

/// What [`run`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// Results for the key already existed and overwriting was not requested.
    Skipped,
    Completed(Record),
}

impl Run {
    pub fn context(&self) -> String {
        self.experiment
            .family()
            .context(self.k_ratio, self.threshold)
    }

    /// The fully-qualified experiment key within the results file.
    pub fn key(&self) -> String {
        if self.threads == 1 {
            self.experiment.to_string()
        } else {
            format!("{}_nthreads-{}", self.experiment, self.threads)
        }
    }

    pub fn results_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(format!(
            "benchmark___prefix-{}___context-{}___lang-rust___data-{}___algorithm-{}___repeat-{}___memory_backend-{}.{}",
            self.prefix,
            self.context(),
            self.data,
            self.key(),
            self.n_repeat,
            self.memory_backend,
            store::EXTENSION,
        ))
    }
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// Run the benchmark described by `config`, storing results under `out_dir`.
///
/// Nothing is written unless every repetition succeeds.
pub fn run(
    config: &Run,
    cache: &Cache,
    out_dir: &Path,
    mut output: &mut dyn Output,
) -> anyhow::Result<Status> {
    let key = config.key();
    let path = config.results_path(out_dir);
    let _span = benchmark_span(&key, &config.data, config.n_repeat).entered();

    writeln!(output)?;
    writeln!(output, "Experiment:  {key}")?;
    writeln!(output, "* File:      {}", path.display())?;
    writeln!(output, "* Threads:   {}", config.threads)?;
    writeln!(output, "* Backend:   {}", config.memory_backend)?;
    writeln!(output, "* Overwrite: {}", config.overwrite)?;

    let mut store = Store::open(&path)?;
    if store.contains(&key) && !config.overwrite {
        writeln!(output, "SKIPPING: Experiment already exists")?;
        return Ok(Status::Skipped);
    }

    let (mut data, _, _) = cache
        .load_benchmark(&config.data)
        .with_context(|| format!("loading dataset \"{}\"", config.data))?
        .into_parts();
    if config.experiment.family() == Family::TopkDiff {
        writeln!(output, "* Prepare diff experiment: {}", data)?;
        data = preprocess_diff(data.as_view(), &Filters::postprocess(false, false)).0;
    }
    writeln!(output, "* Data:      {}", data)?;

    let k = k_from_ratio(data.ncols(), config.k_ratio);
    writeln!(output, "* K ratio:   {}", config.k_ratio)?;
    writeln!(output, "* K:         {k}")?;
    writeln!(output, "* Threshold: {}", config.threshold)?;

    let experiments = load_experiments(&data, k, config.threshold);
    let prepared = experiments
        .get(&config.experiment)?
        .prepare()
        .with_context(|| format!("preparing {}", config.experiment))?;

    writeln!(output, "Running experiments")?;
    let timestamp = unix_timestamp();
    let mut memory = Vec::with_capacity(config.n_repeat);
    let mut runtime = Vec::with_capacity(config.n_repeat);
    for round in 0..config.n_repeat {
        write!(output, "* Round {round}: ")?;
        let (elapsed, (outcome, peak)) = timed!(config.memory_backend.measure(|| prepared.run()));
        let outcome = outcome.with_context(|| format!("running {}", config.experiment))?;
        tracing::debug!(round, nnz = outcome.nnz(), "repetition finished");
        drop(outcome);

        let seconds = elapsed.as_seconds();
        writeln!(output, "{seconds:.6}s ({peak:.2} MiB)")?;
        memory.push(peak);
        runtime.push(seconds);
    }

    writeln!(output, "Writing results")?;
    let record = Record {
        memory,
        runtime,
        timestamp,
        memory_backend: config.memory_backend.to_string(),
    };
    store.insert(&key, record.clone())?;
    store
        .save(&path)
        .with_context(|| format!("saving {}", path.display()))?;
    Ok(Status::Completed(record))
}

///////////
// Tests //
///////////
