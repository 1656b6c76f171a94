/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Peak memory measurement around a blocking call.

use std::{fmt, sync::mpsc, time::Duration};

use corals_platform::{
    bytes_to_mib, get_peak_workingset_size, get_resident_set_size, reset_peak_workingset_size,
};
use serde::{Deserialize, Serialize};

/// Recorded in place of a measurement when memory is not measured.
pub const NOT_MEASURED: f64 = -1.0;

/// How often the `rss` backend samples the resident set size.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// How peak memory is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackend {
    /// Only time the call.
    None,
    /// Poll the resident set size from a background thread.
    #[default]
    Rss,
    /// Reset and read the kernel's high-water mark.
    Peak,
}

impl MemoryBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rss => "rss",
            Self::Peak => "peak",
        }
    }

    /// Run `f`, returning its result together with the peak memory in MiB.
    pub fn measure<F, R>(&self, f: F) -> (R, f64)
    where
        F: FnOnce() -> R,
    {
        match self {
            Self::None => (f(), NOT_MEASURED),
            Self::Rss => sampled(f),
            Self::Peak => high_water_mark(f),
        }
    }
}

impl fmt::Display for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn to_mib(bytes: Option<u64>) -> f64 {
    bytes.map_or(NOT_MEASURED, bytes_to_mib)
}

fn sampled<F, R>(f: F) -> (R, f64)
where
    F: FnOnce() -> R,
{
    let (stop, stopped) = mpsc::channel::<()>();
    std::thread::scope(|scope| {
        let sampler = scope.spawn(move || {
            let mut peak = get_resident_set_size();
            loop {
                match stopped.recv_timeout(SAMPLE_INTERVAL) {
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        peak = peak.max(get_resident_set_size());
                    }
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            peak.max(get_resident_set_size())
        });

        let result = f();
        // The sampler also stops when the sender is dropped.
        let _ = stop.send(());
        let peak = match sampler.join() {
            Ok(peak) => peak,
            Err(_) => {
                tracing::warn!("memory sampler panicked");
                None
            }
        };
        (result, to_mib(peak))
    })
}

fn high_water_mark<F, R>(f: F) -> (R, f64)
where
    F: FnOnce() -> R,
{
    if let Err(err) = reset_peak_workingset_size() {
        tracing::debug!(%err, "could not reset the peak resident set size");
    }
    let result = f();
    (result, to_mib(get_peak_workingset_size()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn none_is_a_sentinel() {
        let (value, memory) = MemoryBackend::None.measure(|| 7);
        assert_eq!(value, 7);
        assert_eq!(memory, NOT_MEASURED);
    }

    #[cfg(target_os = "linux")]
    #[rstest]
    fn measured_backends_report_memory(#[values(MemoryBackend::Rss, MemoryBackend::Peak)] backend: MemoryBackend) {
        let (len, memory) = backend.measure(|| {
            let buffer = vec![1u8; 8 << 20];
            std::thread::sleep(Duration::from_millis(150));
            buffer.iter().map(|x| *x as usize).sum::<usize>()
        });
        assert_eq!(len, 8 << 20);
        assert!(memory >= 8.0, "{backend}: {memory} MiB");
    }

    #[test]
    fn names() {
        assert_eq!(MemoryBackend::default(), MemoryBackend::Rss);
        assert_eq!(
            serde_json::to_string(&MemoryBackend::Peak).unwrap(),
            "\"peak\""
        );
        assert_eq!(MemoryBackend::None.to_string(), "none");
    }
}
