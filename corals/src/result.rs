/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::cmp::Ordering;

use corals_utils::views::{Matrix, MatrixView};

/// One entry of a correlation (or correlation difference) matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

impl Entry {
    pub fn new(row: usize, col: usize, value: f64) -> Self {
        Self { row, col, value }
    }

    /// Strongest first: larger `|value|`, then smaller row, then smaller column.
    pub fn by_strength(a: &Self, b: &Self) -> Ordering {
        b.value
            .abs()
            .total_cmp(&a.value.abs())
            .then(a.row.cmp(&b.row))
            .then(a.col.cmp(&b.col))
    }

    fn by_position(a: &Self, b: &Self) -> Ordering {
        a.row.cmp(&b.row).then(a.col.cmp(&b.col))
    }
}

/// A sparse set of matrix entries in coordinate format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correlations {
    pub values: Vec<f64>,
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

impl Correlations {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = Entry> + '_ {
        self.values
            .iter()
            .zip(&self.rows)
            .zip(&self.cols)
            .map(|((&value, &row), &col)| Entry { row, col, value })
    }
}

impl FromIterator<Entry> for Correlations {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut out = Self::default();
        for e in iter {
            out.values.push(e.value);
            out.rows.push(e.row);
            out.cols.push(e.col);
        }
        out
    }
}

/// The value produced by one correlation entry point.
#[derive(Debug, Clone)]
pub enum Outcome {
    Dense(Matrix<f64>),
    Sparse(Correlations),
}

impl Outcome {
    /// The number of stored entries.
    pub fn nnz(&self) -> usize {
        match self {
            Self::Dense(m) => m.nrows() * m.ncols(),
            Self::Sparse(c) => c.len(),
        }
    }

    pub fn into_sparse(self) -> Option<Correlations> {
        match self {
            Self::Dense(_) => None,
            Self::Sparse(c) => Some(c),
        }
    }
}

/// Iterate over every entry of a dense matrix in row-major order.
pub fn dense_entries(matrix: MatrixView<'_, f64>) -> impl Iterator<Item = Entry> + '_ {
    // `row_iter` borrows the by-value view, so index rows through a moved copy instead.
    (0..matrix.nrows()).flat_map(move |row| {
        (0..matrix.ncols()).map(move |col| Entry {
            row,
            col,
            value: matrix.row(row)[col],
        })
    })
}

/// Keep the `k` strongest entries by fully sorting all of them.
pub fn sort_topk(mut entries: Vec<Entry>, k: usize) -> Vec<Entry> {
    entries.sort_unstable_by(Entry::by_strength);
    entries.truncate(k);
    entries
}

/// Keep the `k` strongest entries with a partial selection, sorting only the winners.
pub fn select_topk(mut entries: Vec<Entry>, k: usize) -> Vec<Entry> {
    if k == 0 {
        return Vec::new();
    }
    if k < entries.len() {
        entries.select_nth_unstable_by(k - 1, Entry::by_strength);
        entries.truncate(k);
    }
    entries.sort_unstable_by(Entry::by_strength);
    entries
}

/// Remove repeated positions, keeping the first value seen for each, and return the
/// entries in row-major order.
pub fn dedup(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(Entry::by_position);
    entries.dedup_by(|a, b| a.row == b.row && a.col == b.col);
    entries
}
