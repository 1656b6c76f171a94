/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Candidate generation with ball trees.
//!
//! A strong positive value `<q, p>` between unit vectors means `q` is close to `p` and a
//! strong negative value means `-q` is close to `p`. Every strategy therefore searches
//! both signs; they differ only in where the negation is applied.

use std::fmt;

use corals_utils::views::MatrixView;

use crate::{
    balltree::{BallTree, with_negation},
    linalg::dot,
    result::Entry,
    threads::Executor,
};

/// How the two signs of a correlation are searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// One tree over the points, queried with each query and its negation.
    Twice,
    /// One tree over the points and their negations, queried once per query.
    CombinedTree,
    /// One tree over the points, queried with the stacked queries and negations.
    CombinedQuery,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Self::Twice, Self::CombinedTree, Self::CombinedQuery];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twice => "twice",
            Self::CombinedTree => "combined_tree",
            Self::CombinedQuery => "combined_query",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The number of neighbors requested per query so that `factor * k` candidates are
/// gathered in total across `n` queries, capped at `n`.
pub fn neighbors_per_query(n: usize, k: usize, factor: f64) -> usize {
    if n == 0 || k == 0 {
        return 0;
    }
    let wanted = (factor * k as f64 / n as f64).ceil();
    if wanted >= n as f64 {
        n
    } else {
        (wanted as usize).max(1)
    }
}

/// Gather, for every query row, the `kk` points with the largest positive and the `kk`
/// points with the largest negative dot product according to the tree.
///
/// Entry rows index `queries`, columns index `points`, and values are exact dot products.
/// The same position may appear more than once.
pub fn knn_candidates(
    queries: MatrixView<'_, f64>,
    points: MatrixView<'_, f64>,
    kk: usize,
    strategy: Strategy,
    executor: &Executor,
) -> Vec<Entry> {
    let npoints = points.nrows();
    let kk = kk.min(npoints);
    let exact = |row: usize, col: usize| Entry::new(row, col, dot(queries.row(row), points.row(col)));

    let per_query: Vec<Vec<Entry>> = match strategy {
        Strategy::Twice => {
            let tree = BallTree::new(points.to_matrix());
            executor.map(queries.nrows(), |i| {
                let q = queries.row(i);
                let negated: Vec<f64> = q.iter().map(|x| -x).collect();
                tree.query(q, kk)
                    .into_iter()
                    .chain(tree.query(&negated, kk))
                    .map(|n| exact(i, n.id))
                    .collect()
            })
        }
        Strategy::CombinedTree => {
            let tree = BallTree::new(with_negation(points));
            executor.map(queries.nrows(), |i| {
                tree.query(queries.row(i), 2 * kk)
                    .into_iter()
                    .map(|n| exact(i, n.id % npoints))
                    .collect()
            })
        }
        Strategy::CombinedQuery => {
            let tree = BallTree::new(points.to_matrix());
            let stacked = with_negation(queries);
            let nqueries = queries.nrows();
            executor.map(stacked.nrows(), |q| {
                tree.query(stacked.row(q), kk)
                    .into_iter()
                    .map(|n| exact(q % nqueries, n.id))
                    .collect()
            })
        }
    };

    per_query.into_iter().flatten().collect()
}

/// Gather, for every query row, the points within distance `radius` of the query or of its
/// negation.
///
/// Entry rows index `queries`, columns index `points`, and values are exact dot products.
pub fn radius_candidates(
    queries: MatrixView<'_, f64>,
    points: MatrixView<'_, f64>,
    radius: f64,
    strategy: Strategy,
    executor: &Executor,
) -> Vec<Entry> {
    let npoints = points.nrows();
    let exact = |row: usize, col: usize| Entry::new(row, col, dot(queries.row(row), points.row(col)));

    let per_query: Vec<Vec<Entry>> = match strategy {
        Strategy::Twice => {
            let tree = BallTree::new(points.to_matrix());
            executor.map(queries.nrows(), |i| {
                let q = queries.row(i);
                let negated: Vec<f64> = q.iter().map(|x| -x).collect();
                tree.query_radius(q, radius)
                    .into_iter()
                    .chain(tree.query_radius(&negated, radius))
                    .map(|j| exact(i, j))
                    .collect()
            })
        }
        Strategy::CombinedTree => {
            let tree = BallTree::new(with_negation(points));
            executor.map(queries.nrows(), |i| {
                tree.query_radius(queries.row(i), radius)
                    .into_iter()
                    .map(|j| exact(i, j % npoints))
                    .collect()
            })
        }
        Strategy::CombinedQuery => {
            let tree = BallTree::new(points.to_matrix());
            let stacked = with_negation(queries);
            let nqueries = queries.nrows();
            executor.map(stacked.nrows(), |q| {
                tree.query_radius(stacked.row(q), radius)
                    .into_iter()
                    .map(|j| exact(q % nqueries, j))
                    .collect()
            })
        }
    };

    per_query.into_iter().flatten().collect()
}
