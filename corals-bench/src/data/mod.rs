/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub mod cache;
pub mod prepare;
pub mod preprocess;

use std::io::Write;

use corals_bench_runner::{Output, output::progress_bar};

pub use cache::{Cache, CacheError, DatasetKind, DatasetSpec, LoadOptions, Params};

/// The standard synthetic datasets.
pub fn synthetic_datasets() -> Vec<(DatasetSpec, LoadOptions)> {
    prepare::synthetic_grid()
        .into_iter()
        .map(|(m, n)| (DatasetSpec::synthetic_mn(m, n), LoadOptions::default()))
        .collect()
}

/// The real datasets, plus the large synthetic dataset benchmarked alongside them.
pub fn real_datasets() -> Vec<(DatasetSpec, LoadOptions)> {
    let cleaned = |sample| LoadOptions {
        negative: true,
        drop_duplicates: true,
        sample,
        ..LoadOptions::default()
    };

    vec![
        (DatasetSpec::named("preeclampsia"), cleaned(None)),
        (DatasetSpec::named("pregnancy"), cleaned(None)),
        (DatasetSpec::named("cancer"), cleaned(Some(0.25))),
        (DatasetSpec::named("cancer"), cleaned(Some(0.50))),
        (DatasetSpec::named("cancer"), cleaned(Some(1.00))),
        (DatasetSpec::named("singlecell"), LoadOptions::default()),
        (DatasetSpec::named("singlecell_large"), LoadOptions::default()),
        (
            DatasetSpec::synthetic_mn(500, 200_000),
            LoadOptions {
                prefix: Some("large_".into()),
                ..LoadOptions::default()
            },
        ),
    ]
}

/// Load every dataset in `datasets` into the cache, reporting the final names.
pub fn prepare_all(
    cache: &Cache,
    datasets: &[(DatasetSpec, LoadOptions)],
    mut output: &mut dyn Output,
) -> anyhow::Result<Vec<String>> {
    let progress = progress_bar("preparing", datasets.len(), output.draw_target())?;
    let mut names = Vec::with_capacity(datasets.len());
    for (spec, options) in datasets {
        let (name, table) = cache.load(spec, options)?;
        progress.inc(1);
        progress.suspend(|| writeln!(output, "{name}: {} x {}", table.nrows(), table.ncols()))?;
        names.push(name);
    }
    progress.finish();
    Ok(names)
}
