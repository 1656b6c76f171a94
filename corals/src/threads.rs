/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use rayon::prelude::{
    IndexedParallelIterator, IntoParallelIterator, ParallelIterator, ParallelSliceMut,
};

use crate::error::CorrelationError;

/// Where the parallel sections of an algorithm run.
///
/// `Sequential` runs everything on the calling thread, except Gram products which use the
/// global rayon pool configured at startup. `Pool` owns a dedicated pool whose workers run
/// both the per-query work and any Gram products issued from inside it. `Threads` spawns
/// that many scoped OS threads per parallel section, each taking a fixed share of the
/// work; Gram products issued from them use the global pool.
#[derive(Debug)]
pub enum Executor {
    Sequential,
    Pool(rayon::ThreadPool),
    Threads(usize),
}

impl Executor {
    /// Build a dedicated pool with `n_jobs` workers.
    pub fn with_workers(n_jobs: usize) -> Result<Self, CorrelationError> {
        if n_jobs == 0 {
            return Err(CorrelationError::Zero("worker"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_jobs)
            .thread_name(|i| format!("corals-worker-{i}"))
            .build()
            .map_err(|source| CorrelationError::ThreadPool { n_jobs, source })?;
        Ok(Self::Pool(pool))
    }

    /// Spawn `n_jobs` scoped threads for every parallel section.
    pub fn with_threads(n_jobs: usize) -> Result<Self, CorrelationError> {
        if n_jobs == 0 {
            return Err(CorrelationError::Zero("worker"));
        }
        Ok(Self::Threads(n_jobs))
    }

    /// The number of workers that execute [`Executor::map`].
    pub fn n_jobs(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Pool(pool) => pool.current_num_threads(),
            Self::Threads(n_jobs) => *n_jobs,
        }
    }

    /// Run `f` inside the pool, if any.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match self {
            Self::Sequential | Self::Threads(_) => f(),
            Self::Pool(pool) => pool.install(f),
        }
    }

    /// Evaluate `f` for every index in `0..count`, returning the results in index order.
    pub fn map<F, T>(&self, count: usize, f: F) -> Vec<T>
    where
        F: Fn(usize) -> T + Send + Sync,
        T: Send,
    {
        match self {
            Self::Sequential => (0..count).map(f).collect(),
            Self::Pool(pool) => pool.install(|| (0..count).into_par_iter().map(f).collect()),
            Self::Threads(n_jobs) => {
                let n_jobs = (*n_jobs).min(count).max(1);
                let f = &f;
                let mut indexed: Vec<(usize, T)> = std::thread::scope(|s| {
                    let handles: Vec<_> = (0..n_jobs)
                        .map(|t| {
                            s.spawn(move || {
                                (t..count)
                                    .step_by(n_jobs)
                                    .map(|i| (i, f(i)))
                                    .collect::<Vec<_>>()
                            })
                        })
                        .collect();
                    handles
                        .into_iter()
                        .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                        .collect()
                });
                indexed.sort_unstable_by_key(|(i, _)| *i);
                indexed.into_iter().map(|(_, value)| value).collect()
            }
        }
    }

    /// Split `out` into consecutive pieces of `chunk` elements (the last may be shorter)
    /// and call `f(index, piece)` on each.
    pub fn fill<F, T>(&self, out: &mut [T], chunk: usize, f: F)
    where
        F: Fn(usize, &mut [T]) + Send + Sync,
        T: Send,
    {
        if chunk == 0 {
            return;
        }
        match self {
            Self::Sequential => out
                .chunks_mut(chunk)
                .enumerate()
                .for_each(|(i, piece)| f(i, piece)),
            Self::Pool(pool) => pool.install(|| {
                out.par_chunks_mut(chunk)
                    .enumerate()
                    .for_each(|(i, piece)| f(i, piece))
            }),
            Self::Threads(n_jobs) => {
                // Each thread takes a contiguous run of whole pieces.
                let pieces = out.len().div_ceil(chunk).div_ceil(*n_jobs).max(1);
                let f = &f;
                std::thread::scope(|s| {
                    for (t, run) in out.chunks_mut(pieces * chunk).enumerate() {
                        s.spawn(move || {
                            run.chunks_mut(chunk)
                                .enumerate()
                                .for_each(|(i, piece)| f(t * pieces + i, piece))
                        });
                    }
                });
            }
        }
    }
}
