/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Experiment identifiers and the registry mapping them to runnable descriptors.
//!
//! Every algorithm variant and parallelism level has one [`ExperimentId`]. Building the
//! registry only records what to call; [`Descriptor::prepare`] binds the arguments and
//! builds any thread pool, and [`Prepared::run`] performs the work.

pub mod cor;
pub mod threshold;
pub mod topk;
pub mod topkdiff;

use std::{collections::BTreeMap, fmt, str::FromStr};

use corals::{CorrelationError, Executor, Outcome};
use corals_utils::views::{Matrix, MatrixView};
use thiserror::Error;

use crate::utils::{percent_name, threshold_name};

pub use cor::Cor;
pub use threshold::Threshold;
pub use topk::Topk;
pub use topkdiff::TopkDiff;

/// Worker counts with a registered `_parallel_{n}` variant.
pub const PARALLELISM: [usize; 7] = [1, 2, 4, 8, 16, 32, 64];

/// The approximation factor of every ball-tree variant.
pub const DEFAULT_APPROXIMATION_FACTOR: f64 = 10.0;

/// The experiment families, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Cor,
    Topk,
    Threshold,
    TopkDiff,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cor => "cor",
            Self::Topk => "topk",
            Self::Threshold => "threshold",
            Self::TopkDiff => "topkdiff",
        }
    }

    /// The context under which results of this family are stored.
    pub fn context(&self, k_ratio: f64, threshold: f64) -> String {
        match self {
            Self::Cor => "fast".to_owned(),
            Self::Topk => format!("topk-{}", percent_name(k_ratio)),
            Self::TopkDiff => format!("topkdiff-{}", percent_name(k_ratio)),
            Self::Threshold => format!("threshold-{}", threshold_name(threshold)),
        }
    }
}

/// The identifier of one experiment, such as `topk_balltree_combined_tree_parallel_8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExperimentId {
    Cor(Cor),
    Topk(Topk),
    Threshold(Threshold),
    TopkDiff(TopkDiff),
}

impl ExperimentId {
    /// Every identifier, family by family.
    pub fn all() -> Vec<Self> {
        Cor::all()
            .into_iter()
            .map(Self::Cor)
            .chain(Topk::all().into_iter().map(Self::Topk))
            .chain(Threshold::all().into_iter().map(Self::Threshold))
            .chain(TopkDiff::all().into_iter().map(Self::TopkDiff))
            .collect()
    }

    pub fn family(&self) -> Family {
        match self {
            Self::Cor(_) => Family::Cor,
            Self::Topk(_) => Family::Topk,
            Self::Threshold(_) => Family::Threshold,
            Self::TopkDiff(_) => Family::TopkDiff,
        }
    }

    /// The executor of the experiment: a dedicated pool of `n_jobs` workers, scoped threads
    /// for the `threads` variants, or the calling thread.
    pub fn executor(&self) -> Result<Executor, CorrelationError> {
        match self {
            Self::Topk(v) => v.executor(),
            _ => match self.n_jobs() {
                Some(n_jobs) => Executor::with_workers(n_jobs),
                None => Ok(Executor::Sequential),
            },
        }
    }

    /// The number of workers, if the experiment runs in parallel.
    pub fn n_jobs(&self) -> Option<usize> {
        match self {
            Self::Cor(_) => None,
            Self::Topk(v) => v.n_jobs(),
            Self::Threshold(v) => v.n_jobs(),
            Self::TopkDiff(v) => v.n_jobs(),
        }
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cor(v) => v.fmt(f),
            Self::Topk(v) => v.fmt(f),
            Self::Threshold(v) => v.fmt(f),
            Self::TopkDiff(v) => v.fmt(f),
        }
    }
}

impl FromStr for ExperimentId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|id| id.to_string() == s)
            .ok_or_else(|| RegistryError::Unknown(s.to_owned()))
    }
}

/// An experiment with its typed configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Experiment {
    Cor(Cor),
    Topk { variant: Topk, k: usize },
    Threshold { variant: Threshold, threshold: f64 },
    TopkDiff { variant: TopkDiff, k: usize },
}

impl Experiment {
    pub fn new(id: ExperimentId, k: usize, threshold: f64) -> Self {
        match id {
            ExperimentId::Cor(variant) => Self::Cor(variant),
            ExperimentId::Topk(variant) => Self::Topk { variant, k },
            ExperimentId::Threshold(variant) => Self::Threshold { variant, threshold },
            ExperimentId::TopkDiff(variant) => Self::TopkDiff { variant, k },
        }
    }

    pub fn id(&self) -> ExperimentId {
        match *self {
            Self::Cor(variant) => ExperimentId::Cor(variant),
            Self::Topk { variant, .. } => ExperimentId::Topk(variant),
            Self::Threshold { variant, .. } => ExperimentId::Threshold(variant),
            Self::TopkDiff { variant, .. } => ExperimentId::TopkDiff(variant),
        }
    }
}

/// The data an experiment runs on.
#[derive(Debug, Clone, Copy)]
pub enum Arguments<'a> {
    Single(MatrixView<'a, f64>),
    /// Two sample groups over the same columns.
    Paired(MatrixView<'a, f64>, MatrixView<'a, f64>),
}

/// An experiment bound to its arguments. Nothing has been computed yet.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor<'a> {
    pub experiment: Experiment,
    pub arguments: Arguments<'a>,
}

impl<'a> Descriptor<'a> {
    /// Bind the arguments and build the thread pool, if any.
    pub fn prepare(&self) -> Result<Prepared<'a>, RegistryError> {
        let id = self.experiment.id();
        let call = match (self.experiment, self.arguments) {
            (Experiment::Cor(variant), Arguments::Single(data)) => Call::Cor(variant, data),
            (Experiment::Topk { variant, k }, Arguments::Single(data)) => {
                Call::Topk(variant, data, k)
            }
            (Experiment::Threshold { variant, threshold }, Arguments::Single(data)) => {
                Call::Threshold(variant, data, threshold)
            }
            (Experiment::TopkDiff { variant, k }, Arguments::Paired(x1, x2)) => {
                Call::TopkDiff(variant, x1, x2, k)
            }
            (Experiment::TopkDiff { .. }, Arguments::Single(_)) => {
                return Err(RegistryError::Arguments {
                    id,
                    expected: "paired",
                });
            }
            (_, Arguments::Paired(..)) => {
                return Err(RegistryError::Arguments {
                    id,
                    expected: "single",
                });
            }
        };

        let executor = id.executor()?;
        tracing::debug!(%id, n_jobs = executor.n_jobs(), "prepared experiment");
        Ok(Prepared { id, call, executor })
    }
}

#[derive(Debug)]
enum Call<'a> {
    Cor(Cor, MatrixView<'a, f64>),
    Topk(Topk, MatrixView<'a, f64>, usize),
    Threshold(Threshold, MatrixView<'a, f64>, f64),
    TopkDiff(TopkDiff, MatrixView<'a, f64>, MatrixView<'a, f64>, usize),
}

/// A runnable experiment.
#[derive(Debug)]
pub struct Prepared<'a> {
    id: ExperimentId,
    call: Call<'a>,
    executor: Executor,
}

impl Prepared<'_> {
    pub fn id(&self) -> ExperimentId {
        self.id
    }

    /// Run the experiment once.
    pub fn run(&self) -> Result<Outcome, CorrelationError> {
        let executor = &self.executor;
        match self.call {
            Call::Cor(variant, data) => Ok(variant.run(data)),
            Call::Topk(variant, data, k) => variant.run(data, k, executor).map(Outcome::Sparse),
            Call::Threshold(variant, data, t) => {
                variant.run(data, t, executor).map(Outcome::Sparse)
            }
            Call::TopkDiff(variant, x1, x2, k) => {
                variant.run(x1, x2, k, executor).map(Outcome::Sparse)
            }
        }
    }
}

/// Experiment descriptors keyed by identifier.
#[derive(Debug, Default)]
pub struct Experiments<'a> {
    experiments: BTreeMap<String, Descriptor<'a>>,
}

impl<'a> Experiments<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `descriptor`, replacing (with a warning) any previous registration under
    /// the same identifier.
    pub fn register(&mut self, descriptor: Descriptor<'a>) {
        let name = descriptor.experiment.id().to_string();
        if self.experiments.insert(name.clone(), descriptor).is_some() {
            tracing::warn!(%name, "experiment registered twice; keeping the later registration");
        }
    }

    /// Merge `other` into `self`. Entries of `other` win.
    pub fn extend(&mut self, other: Experiments<'a>) {
        for descriptor in other.experiments.into_values() {
            self.register(descriptor);
        }
    }

    pub fn get(&self, id: &ExperimentId) -> Result<&Descriptor<'a>, RegistryError> {
        let name = id.to_string();
        self.experiments
            .get(&name)
            .ok_or(RegistryError::Unknown(name))
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// The registered identifiers in lexicographic order.
    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.experiments.keys().map(String::as_str)
    }
}

fn register_family<'a>(
    family: Family,
    arguments: Arguments<'a>,
    k: usize,
    threshold: f64,
) -> Experiments<'a> {
    let mut experiments = Experiments::new();
    ExperimentId::all()
        .into_iter()
        .filter(|id| id.family() == family)
        .for_each(|id| {
            experiments.register(Descriptor {
                experiment: Experiment::new(id, k, threshold),
                arguments,
            })
        });
    experiments
}

/// Build the registry for `data`.
///
/// Difference experiments receive the top and bottom halves of the rows as their two
/// sample groups; every other experiment receives the whole matrix.
pub fn load_experiments(data: &Matrix<f64>, k: usize, threshold: f64) -> Experiments<'_> {
    let single = Arguments::Single(data.as_view());
    let (top, bottom) = data.split_halves();
    let paired = Arguments::Paired(top, bottom);

    let mut experiments = Experiments::new();
    experiments.extend(register_family(Family::Cor, single, k, threshold));
    experiments.extend(register_family(Family::Topk, single, k, threshold));
    experiments.extend(register_family(Family::Threshold, single, k, threshold));
    experiments.extend(register_family(Family::TopkDiff, paired, k, threshold));
    experiments
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown experiment \"{0}\"")]
    Unknown(String),

    #[error("experiment \"{id}\" expects {expected} arguments")]
    Arguments {
        id: ExperimentId,
        expected: &'static str,
    },

    #[error(transparent)]
    Correlation(#[from] CorrelationError),
}

///////////
// Tests //
///////////
