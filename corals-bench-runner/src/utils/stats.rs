/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("input slice cannot be empty")]
pub struct CannotBeEmpty;

/// Summary statistics of a sequence of measurements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
}

pub fn mean(x: &[f64]) -> Result<f64, CannotBeEmpty> {
    if x.is_empty() {
        return Err(CannotBeEmpty);
    }
    Ok(x.iter().sum::<f64>() / x.len() as f64)
}

/// Return the minimum, mean, median and maximum of `x`.
///
/// NaN values sort last.
pub fn summarize(x: &[f64]) -> Result<Summary, CannotBeEmpty> {
    let mean = mean(x)?;

    let mut sorted = x.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);

    let len = sorted.len();
    let half = len / 2;
    let median = if len % 2 == 1 {
        sorted[half]
    } else {
        (sorted[half - 1] + sorted[half]) / 2.0
    };

    Ok(Summary {
        min: sorted[0],
        mean,
        median,
        max: sorted[len - 1],
    })
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        assert!(summarize(&[]).is_err());

        let s = summarize(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!(
            s,
            Summary {
                min: 1.0,
                mean: 2.0,
                median: 2.0,
                max: 3.0
            }
        );

        let s = summarize(&[4.0, 1.0, 2.0, 9.0]).unwrap();
        assert_eq!(s.median, 3.0);
        assert_eq!(s.mean, 4.0);
        assert_eq!(s.max, 9.0);
    }

    #[test]
    fn test_mean() {
        assert!(matches!(mean(&[]).unwrap_err(), CannotBeEmpty));
        assert_eq!(mean(&[-1.0, 1.0, 3.0]).unwrap(), 1.0);
    }
}
