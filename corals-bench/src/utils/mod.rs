/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub(crate) mod tracing;

/// Format a ratio as the percentage used in result and dataset names.
///
/// Two decimals, or six when the percentage is below `0.01`.
pub(crate) fn percent_name(ratio: f64) -> String {
    let percent = ratio * 100.0;
    if percent < 0.01 {
        format!("{percent:.6}percent")
    } else {
        format!("{percent:.2}percent")
    }
}

/// Format a threshold for result names with the same precision rule as [`percent_name`].
pub(crate) fn threshold_name(threshold: f64) -> String {
    if threshold < 0.01 {
        format!("{threshold:.6}")
    } else {
        format!("{threshold:.2}")
    }
}

/// `k = floor(n^2 * ratio)`.
pub(crate) fn k_from_ratio(n: usize, ratio: f64) -> usize {
    ((n as f64) * (n as f64) * ratio).floor() as usize
}
