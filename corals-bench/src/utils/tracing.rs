/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Logging for `corals-bench`.
//!
//! Logs go to `stderr` so they never mix with reports, which child processes of a sweep
//! forward on `stdout`.

use std::io::IsTerminal;

use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, fmt::MakeWriter, prelude::*};

/// The level used when `RUST_LOG` is not set. `--quiet` keeps only warnings and errors.
pub(crate) fn default_level(quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    }
}

/// Install the process-wide subscriber. `RUST_LOG` takes precedence over [`default_level`].
pub(crate) fn init_subscriber(quiet: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(quiet).into())
        .from_env_lossy();
    subscriber(filter, std::io::stderr, std::io::stderr().is_terminal()).init();
}

fn subscriber<W>(filter: EnvFilter, writer: W, ansi: bool) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer);

    tracing_subscriber::registry().with(filter).with(fmt_layer)
}

/// The span a single benchmark run executes in. Every event logged during the run carries
/// its key, dataset and repetition count.
pub(crate) fn benchmark_span(key: &str, data: &str, n_repeat: usize) -> tracing::Span {
    tracing::info_span!("benchmark", key, data, n_repeat)
}

/// Create a subscriber for tests.
///
/// This subscriber returns a `Guard` that will only install the subscriber locally,
/// allowing test threads to have non-conflicting subscribers.
#[cfg(test)]
pub(crate) fn init_test_subscriber() -> tracing::subscriber::DefaultGuard {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing::subscriber::set_default(subscriber(filter, fmt::TestWriter::new(), false))
}
