/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

mod accuracy;
mod benchmark;
mod data;
mod registry;
mod summarize;
mod sweep;
mod utils;

use std::{io::Write, path::PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use corals_bench_runner::{self as runner, utils::fmt::Banner};

use crate::{
    accuracy::{DiffData, Method, Sweep},
    benchmark::{MemoryBackend, Run, Status},
    data::{Cache, DatasetKind, DatasetSpec, LoadOptions, Params},
    registry::ExperimentId,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::tracing::init_subscriber(cli.quiet);
    let mut output: Box<dyn runner::Output> = if cli.quiet {
        Box::new(runner::output::Sink::new())
    } else {
        Box::new(runner::output::default())
    };
    cli.run(&mut *output)
}

/// Benchmarks of exact and approximate correlation search.
#[derive(Debug, Parser)]
#[command(name = "corals-bench")]
struct Cli {
    /// Size of the global worker pool. Fixed for the lifetime of the process.
    #[arg(long, global = true, default_value_t = 1)]
    threads: usize,

    /// Discard reports and log only warnings. `RUST_LOG` overrides the log level.
    #[arg(long, global = true, action)]
    quiet: bool,

    /// Root of the dataset cache.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Directory receiving result files.
    #[arg(long, global = true, default_value = "_out/benchmark")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the registered experiment identifiers.
    Experiments {
        /// Only list identifiers starting with this prefix, such as `topk`.
        #[arg(long)]
        family: Option<String>,
    },
    /// Prepare the standard datasets. Synthetic ones are prepared when nothing is selected.
    Prepare {
        #[arg(long, action)]
        synthetic: bool,
        #[arg(long, action)]
        real: bool,
    },
    /// Prepare and cache one dataset.
    Dataset {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
    /// Benchmark one experiment on one cached dataset.
    Run {
        #[arg(long, default_value = "default")]
        prefix: String,
        #[arg(long, default_value = "topk_corrcoef")]
        exp: ExperimentId,
        /// Name of a cached benchmark dataset.
        #[arg(long, default_value = "synthetic_mn_m-50_n-20000_postprocessed")]
        data: String,
        #[arg(long, default_value_t = 10)]
        n_repeat: usize,
        #[arg(long, default_value_t = 0.01)]
        k_ratio: f64,
        #[arg(long, default_value_t = 0.75)]
        threshold: f64,
        #[arg(long, action)]
        overwrite: bool,
        #[arg(long, value_enum, default_value_t = MemoryBackend::Rss)]
        memory_backend: MemoryBackend,
    },
    /// Accuracy of approximate top-k search on a cached dataset.
    AccuracyTopk {
        /// Name of a cached benchmark dataset.
        #[arg(long)]
        data: String,
        #[command(flatten)]
        sweep: SweepArgs,
    },
    /// Accuracy of approximate top-k difference search.
    AccuracyTopkdiff {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[command(flatten)]
        sweep: SweepArgs,
        /// Use Spearman instead of Pearson correlation.
        #[arg(long, action)]
        spearman: bool,
    },
    /// Run the experiments of a YAML sweep configuration, each in its own process.
    Sweep {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, action)]
        overwrite: bool,
    },
    /// Print a results file as a table.
    Summarize {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Debug, clap::Args)]
struct DatasetArgs {
    /// `synthetic_mn`, `synthetic_nratio` or the name of a raw table.
    #[arg(long, default_value = "synthetic_mn")]
    kind: DatasetKind,
    #[arg(long)]
    m: Option<usize>,
    #[arg(long)]
    n: Option<usize>,
    #[arg(long)]
    size: Option<usize>,
    #[arg(long)]
    ratio: Option<f64>,
    /// Skip the column filters.
    #[arg(long, action)]
    raw: bool,
    /// Clamp negative values to zero.
    #[arg(long, action)]
    negative: bool,
    /// Drop duplicated columns.
    #[arg(long, action)]
    drop_duplicates: bool,
    /// Keep this fraction of the leading columns.
    #[arg(long)]
    sample: Option<f64>,
    /// Prepended to the dataset name.
    #[arg(long)]
    prefix: Option<String>,
}

impl DatasetArgs {
    fn spec(&self) -> DatasetSpec {
        DatasetSpec::new(
            self.kind.clone(),
            Params {
                m: self.m,
                n: self.n,
                size: self.size,
                ratio: self.ratio,
            },
        )
    }

    fn options(&self) -> LoadOptions {
        LoadOptions {
            postprocess: !self.raw,
            negative: self.negative,
            drop_duplicates: self.drop_duplicates,
            sample: self.sample,
            prefix: self.prefix.clone(),
        }
    }
}

#[derive(Debug, clap::Args)]
struct SweepArgs {
    #[arg(long, default_value_t = 0.01)]
    k_ratio: f64,
    /// Evaluate approximation factors `1..=max_approx`.
    #[arg(long, default_value_t = 10)]
    max_approx: usize,
    #[arg(long, value_enum, default_value_t = Method::Tree)]
    method: Method,
    /// Workers of the approximate search.
    #[arg(long, default_value_t = 4)]
    n_threads: usize,
    #[arg(long, action)]
    overwrite: bool,
}

impl From<&SweepArgs> for Sweep {
    fn from(args: &SweepArgs) -> Self {
        Self {
            k_ratio: args.k_ratio,
            max_approx: args.max_approx,
            method: args.method,
            n_threads: args.n_threads,
            overwrite: args.overwrite,
        }
    }
}

impl Cli {
    fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    fn run(&self, mut output: &mut dyn runner::Output) -> anyhow::Result<()> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build_global()
            .context("configuring the global thread pool")?;
        tracing::debug!(threads = self.threads, "global thread pool ready");

        let cache = Cache::new(&self.data_dir);
        match &self.command {
            Commands::Experiments { family } => {
                let prefix = family.as_deref().unwrap_or_default();
                writeln!(output, "Registered experiments:")?;
                for id in ExperimentId::all() {
                    let name = id.to_string();
                    if name.starts_with(prefix) {
                        writeln!(output, "    {name}")?;
                    }
                }
            }
            Commands::Prepare { synthetic, real } => {
                let mut datasets = Vec::new();
                if *synthetic || !*real {
                    datasets.extend(data::synthetic_datasets());
                }
                if *real {
                    datasets.extend(data::real_datasets());
                }
                data::prepare_all(&cache, &datasets, output)?;
            }
            Commands::Dataset { dataset } => {
                let (name, table) = cache.load(&dataset.spec(), &dataset.options())?;
                writeln!(output, "{name}: {} x {}", table.nrows(), table.ncols())?;
            }
            Commands::Run {
                prefix,
                exp,
                data,
                n_repeat,
                k_ratio,
                threshold,
                overwrite,
                memory_backend,
            } => {
                let run = Run {
                    prefix: prefix.clone(),
                    experiment: *exp,
                    data: data.clone(),
                    n_repeat: *n_repeat,
                    k_ratio: *k_ratio,
                    threshold: *threshold,
                    threads: self.threads,
                    overwrite: *overwrite,
                    memory_backend: *memory_backend,
                };
                write!(output, "{}", Banner::new(&run.context()))?;
                let status = benchmark::run(&run, &cache, &self.out_dir, output)?;
                if let Status::Completed(record) = status {
                    tracing::info!(key = %run.key(), repeats = record.runtime.len(), "stored");
                }
            }
            Commands::AccuracyTopk { data, sweep } => {
                accuracy::accuracy_topk(data, &sweep.into(), &cache, &self.out_dir, output)?;
            }
            Commands::AccuracyTopkdiff {
                dataset,
                sweep,
                spearman,
            } => {
                let data = DiffData::new(dataset.spec(), dataset.options());
                accuracy::accuracy_topkdiff(
                    &data,
                    &sweep.into(),
                    *spearman,
                    &cache,
                    &self.out_dir,
                    output,
                )?;
            }
            Commands::Sweep { config, overwrite } => {
                let config = sweep::SweepConfig::load(config)?;
                let invocation = sweep::Invocation {
                    executable: std::env::current_exe()
                        .context("locating the current executable")?,
                    data_dir: self.data_dir.clone(),
                    out_dir: self.out_dir.clone(),
                };
                let launched = sweep::sweep(&config, *overwrite, &cache, &invocation, output)?;
                writeln!(output)?;
                writeln!(output, "Finished {launched} runs")?;
            }
            Commands::Summarize { file } => {
                summarize::summarize(file, output)?;
            }
        }
        Ok(())
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["corals-bench", "run"]).unwrap();
        let Commands::Run {
            prefix,
            exp,
            data,
            n_repeat,
            k_ratio,
            threshold,
            overwrite,
            memory_backend,
        } = cli.command
        else {
            panic!("expected the run command");
        };
        assert_eq!(cli.threads, 1);
        assert_eq!(prefix, "default");
        assert_eq!(exp.to_string(), "topk_corrcoef");
        assert_eq!(data, "synthetic_mn_m-50_n-20000_postprocessed");
        assert_eq!(n_repeat, 10);
        assert_eq!(k_ratio, 0.01);
        assert_eq!(threshold, 0.75);
        assert!(!overwrite);
        assert_eq!(memory_backend, MemoryBackend::Rss);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "corals-bench",
            "run",
            "--exp",
            "topk_batch_matmul_parallel_4",
            "--threads",
            "8",
            "--memory-backend",
            "peak",
        ])
        .unwrap();
        assert_eq!(cli.threads, 8);
        let Commands::Run {
            exp,
            memory_backend,
            ..
        } = cli.command
        else {
            panic!("expected the run command");
        };
        assert_eq!(exp.n_jobs(), Some(4));
        assert_eq!(memory_backend, MemoryBackend::Peak);
    }

    #[test]
    fn unknown_experiments_are_rejected() {
        let err = Cli::try_parse_from(["corals-bench", "run", "--exp", "topk_magic"]).unwrap_err();
        assert!(err.to_string().contains("topk_magic"), "{err}");
    }

    #[test]
    fn accuracy_topkdiff_options() {
        let cli = Cli::try_parse_from([
            "corals-bench",
            "accuracy-topkdiff",
            "--kind",
            "pregnancy",
            "--negative",
            "--sample",
            "0.5",
            "--spearman",
            "--max-approx",
            "3",
        ])
        .unwrap();
        let Commands::AccuracyTopkdiff {
            dataset,
            sweep,
            spearman,
        } = cli.command
        else {
            panic!("expected the accuracy-topkdiff command");
        };
        assert!(spearman);
        assert_eq!(dataset.spec(), DatasetSpec::named("pregnancy"));
        let options = dataset.options();
        assert!(options.postprocess && options.negative && !options.drop_duplicates);
        assert_eq!(options.sample, Some(0.5));

        let sweep = Sweep::from(&sweep);
        assert_eq!(sweep.max_approx, 3);
        assert_eq!(sweep.n_threads, 4);
        assert_eq!(sweep.k_ratio, 0.01);
    }

    #[test]
    fn accuracy_topkdiff_synthetic_defaults() {
        let cli = Cli::try_parse_from(["corals-bench", "accuracy-topkdiff", "--m", "20"]).unwrap();
        let Commands::AccuracyTopkdiff { dataset, .. } = cli.command else {
            panic!("expected the accuracy-topkdiff command");
        };
        let data = DiffData::new(dataset.spec(), dataset.options());
        assert_eq!(data.spec, DatasetSpec::synthetic_mn(20, 1000));
        assert_eq!(data.spec.base_name().unwrap(), "synthetic_mn_m-20_n-1000");
    }

    #[test]
    fn cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
