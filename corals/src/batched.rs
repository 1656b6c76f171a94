/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Map/reduce top-k over column batches.
//!
//! The standardized columns are split into contiguous batches. Each pair of batches
//! `p <= q` is one job that produces a local top-k of the block `(p, q)` and its mirror
//! `(q, p)`. The local results are then reduced to the global top-k.

use std::ops::Range;

use corals_utils::views::MatrixView;

use crate::{
    error::CorrelationError,
    linalg::{Transpose, dgemm},
    result::{Correlations, Entry, dedup, dense_entries, select_topk},
    search::{Strategy, knn_candidates, neighbors_per_query},
    standardize::standardize,
    threads::Executor,
};

/// How each job computes its local top-k.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mapper {
    /// Exact: the Gram product of the two batches.
    Matmul,
    /// Approximate: a combined ball tree over the second batch.
    BallTree { approximation_factor: f64 },
}

/// Split `0..n` into `count` contiguous ranges whose lengths differ by at most one.
pub fn batches(n: usize, count: usize) -> Vec<Range<usize>> {
    let count = count.clamp(1, n.max(1));
    let (base, extra) = (n / count, n % count);
    let mut start = 0;
    (0..count)
        .map(|b| {
            let len = base + usize::from(b < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Top-k by map/reduce over `n_batches` column batches, with jobs run on `executor`.
pub fn topk_batched(
    data: MatrixView<'_, f64>,
    k: usize,
    mapper: Mapper,
    n_batches: usize,
    executor: &Executor,
) -> Result<Correlations, CorrelationError> {
    let n = data.ncols();
    CorrelationError::check_k(k, n)?;
    if n_batches == 0 {
        return Err(CorrelationError::Zero("batch"));
    }
    let kk = match mapper {
        Mapper::Matmul => 0,
        Mapper::BallTree {
            approximation_factor,
        } => {
            CorrelationError::check_approximation_factor(approximation_factor)?;
            neighbors_per_query(n, k, approximation_factor)
        }
    };

    let z = standardize(data);
    let ranges = batches(n, n_batches);
    let jobs: Vec<(usize, usize)> = (0..ranges.len())
        .flat_map(|p| (p..ranges.len()).map(move |q| (p, q)))
        .collect();
    tracing::debug!(n, k, batches = ranges.len(), jobs = jobs.len(), ?mapper, "batched top-k");

    let local = executor.map(jobs.len(), |job| {
        let (p, q) = jobs[job];
        let (rp, rq) = (ranges[p].clone(), ranges[q].clone());
        let left = z.row_range(rp.clone());
        let right = z.row_range(rq.clone());

        let mut entries: Vec<Entry> = match mapper {
            Mapper::Matmul => {
                let block = dgemm(Transpose::None, Transpose::Ordinary, left, right);
                dense_entries(block.as_view())
                    .map(|e| Entry::new(e.row + rp.start, e.col + rq.start, e.value))
                    .collect()
            }
            Mapper::BallTree { .. } => {
                knn_candidates(left, right, kk, Strategy::CombinedTree, &Executor::Sequential)
                    .into_iter()
                    .map(|e| Entry::new(e.row + rp.start, e.col + rq.start, e.value))
                    .collect()
            }
        };

        if p == q {
            // Read both triangles of a diagonal block from the upper one.
            for e in entries.iter_mut() {
                if e.row > e.col {
                    std::mem::swap(&mut e.row, &mut e.col);
                }
            }
            let upper = dedup(entries);
            entries = upper
                .iter()
                .copied()
                .chain(
                    upper
                        .iter()
                        .filter(|e| e.row != e.col)
                        .map(|e| Entry::new(e.col, e.row, e.value)),
                )
                .collect();
        } else {
            let mirrored: Vec<Entry> = entries
                .iter()
                .map(|e| Entry::new(e.col, e.row, e.value))
                .collect();
            entries.extend(mirrored);
        }
        select_topk(dedup(entries), k)
    });

    let reduced: Vec<Entry> = local.into_iter().flatten().collect();
    Ok(select_topk(reduced, k).into_iter().collect())
}
