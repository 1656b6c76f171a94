/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{io::Write, path::Path};

use corals_bench_runner::{
    Output,
    utils::{fmt::Table, stats},
};

use crate::benchmark::{Store, memory::NOT_MEASURED};

/// Print the results store at `path` as a table, one row per experiment key.
pub fn summarize(path: &Path, mut output: &mut dyn Output) -> anyhow::Result<()> {
    let store = Store::open(path)?;
    if store.is_empty() {
        writeln!(output, "No results in {}", path.display())?;
        return Ok(());
    }

    let header = [
        "experiment",
        "repeats",
        "min (s)",
        "mean (s)",
        "median (s)",
        "peak (MiB)",
        "backend",
    ];
    let mut table = Table::new(header, store.len());
    table.align_left(0).align_left(6);
    for (i, (key, record)) in store.iter().enumerate() {
        let mut row = table.row(i);
        row.insert(key.to_owned(), 0);
        row.insert(record.runtime.len(), 1);
        if let Ok(runtime) = stats::summarize(&record.runtime) {
            row.insert(format!("{:.4}", runtime.min), 2);
            row.insert(format!("{:.4}", runtime.mean), 3);
            row.insert(format!("{:.4}", runtime.median), 4);
        }
        let peak = record.memory.iter().copied().fold(NOT_MEASURED, f64::max);
        if peak == NOT_MEASURED {
            row.insert("-", 5);
        } else {
            row.insert(format!("{peak:.1}"), 5);
        }
        row.insert(record.memory_backend.clone(), 6);
    }

    writeln!(output, "{}", path.display())?;
    writeln!(output, "{table}")?;
    Ok(())
}
