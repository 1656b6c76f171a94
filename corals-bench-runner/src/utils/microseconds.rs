/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::time::Duration;

/// Wall-clock time at microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MicroSeconds(u64);

impl MicroSeconds {
    pub fn new(micros: u64) -> Self {
        Self(micros)
    }

    pub fn as_seconds(self) -> f64 {
        (self.0 as f64) / 1_000_000.0
    }
}

impl From<Duration> for MicroSeconds {
    fn from(value: Duration) -> Self {
        // Saturates after roughly 580,000 years.
        Self::new(u64::try_from(value.as_micros()).unwrap_or(u64::MAX))
    }
}

/// Evaluate an expression, returning the elapsed [`MicroSeconds`] and its value.
///
/// Only the expression is timed. Dropping the value happens afterwards at the caller.
#[macro_export]
macro_rules! timed {
    ($($exprs:tt)*) => {{
        let start = ::std::time::Instant::now();
        let result = $($exprs)*;
        let elapsed: $crate::utils::MicroSeconds = start.elapsed().into();
        (elapsed, result)
    }}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds() {
        assert_eq!(MicroSeconds::new(2_500_000).as_seconds(), 2.5);
        let x: MicroSeconds = Duration::from_millis(3).into();
        assert_eq!(x, MicroSeconds::new(3_000));
        assert_eq!(MicroSeconds::from(Duration::MAX), MicroSeconds::new(u64::MAX));
    }

    #[test]
    fn timed_returns_the_value() {
        let (elapsed, value) = crate::timed!({
            std::thread::sleep(Duration::from_millis(2));
            "topk_matrix"
        });
        assert_eq!(value, "topk_matrix");
        assert!(elapsed >= MicroSeconds::new(2_000));
    }
}
