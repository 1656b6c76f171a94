/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::collections::HashSet;

use corals::Correlations;
use serde::{Deserialize, Serialize};

/// The positions `(row, col)` with `row > col` holding a nonzero value.
fn lower_support(correlations: &Correlations) -> HashSet<(usize, usize)> {
    correlations
        .entries()
        .filter(|e| e.row > e.col && e.value != 0.0)
        .map(|e| (e.row, e.col))
        .collect()
}

/// Counts of the binary classification "is this position in the top-k" over the strict
/// lower triangle of an `n x n` matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confusion {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
}

impl Confusion {
    /// Compare the support of `approximate` against `reference`.
    pub fn new(reference: &Correlations, approximate: &Correlations, n: usize) -> Self {
        let reference = lower_support(reference);
        let approximate = lower_support(approximate);
        let true_positives = reference.intersection(&approximate).count();
        let false_positives = approximate.len() - true_positives;
        let false_negatives = reference.len() - true_positives;
        let total = n * n.saturating_sub(1) / 2;
        Self {
            true_positives,
            false_positives,
            false_negatives,
            true_negatives: total.saturating_sub(true_positives + false_positives + false_negatives),
        }
    }

    fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.false_negatives + self.true_negatives
    }

    pub fn metrics(&self) -> Metrics {
        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        let tp = self.true_positives;
        let precision = ratio(tp, tp + self.false_positives);
        let recall = ratio(tp, tp + self.false_negatives);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Metrics {
            accuracy: ratio(tp + self.true_negatives, self.total()),
            precision,
            recall,
            f1,
        }
    }
}

/// Classification quality of one approximate result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Metrics across a sweep of approximation factors, one entry per factor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub accuracy: Vec<f64>,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub f1: Vec<f64>,
}

impl Series {
    pub fn push(&mut self, metrics: Metrics) {
        self.accuracy.push(metrics.accuracy);
        self.precision.push(metrics.precision);
        self.recall.push(metrics.recall);
        self.f1.push(metrics.f1);
    }

    pub fn len(&self) -> usize {
        self.f1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f1.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use corals::result::Entry;

    use super::*;

    fn support(positions: &[(usize, usize)]) -> Correlations {
        positions
            .iter()
            .map(|&(row, col)| Entry::new(row, col, 0.5))
            .collect()
    }

    #[test]
    fn only_the_strict_lower_triangle_counts() {
        let reference = support(&[(1, 0), (0, 1), (2, 2), (3, 1)]);
        let approximate = support(&[(1, 0), (2, 0), (1, 3)]);
        let confusion = Confusion::new(&reference, &approximate, 4);
        assert_eq!(
            confusion,
            Confusion {
                true_positives: 1,
                false_positives: 1,
                false_negatives: 1,
                true_negatives: 3,
            }
        );

        let metrics = confusion.metrics();
        assert_relative_eq!(metrics.accuracy, 4.0 / 6.0);
        assert_relative_eq!(metrics.precision, 0.5);
        assert_relative_eq!(metrics.recall, 0.5);
        assert_relative_eq!(metrics.f1, 0.5);
    }

    #[test]
    fn zeros_are_not_support() {
        let reference: Correlations = [Entry::new(1, 0, 0.0)].into_iter().collect();
        let approximate = support(&[(1, 0)]);
        let confusion = Confusion::new(&reference, &approximate, 2);
        assert_eq!(confusion.true_positives, 0);
        assert_eq!(confusion.false_positives, 1);
    }

    #[test]
    fn empty_denominators_are_zero() {
        let metrics = Confusion::new(&Correlations::default(), &Correlations::default(), 3).metrics();
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1, 0.0);
        assert_eq!(metrics.accuracy, 1.0);

        let metrics = Confusion::new(&Correlations::default(), &Correlations::default(), 1).metrics();
        assert_eq!(metrics.accuracy, 0.0);
    }

    #[test]
    fn identical_support_is_perfect() {
        let reference = support(&[(1, 0), (4, 2), (3, 1)]);
        let metrics = Confusion::new(&reference, &reference, 5).metrics();
        assert_eq!(
            metrics,
            Metrics {
                accuracy: 1.0,
                precision: 1.0,
                recall: 1.0,
                f1: 1.0
            }
        );
    }
}
