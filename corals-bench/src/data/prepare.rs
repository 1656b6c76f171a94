/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Producers of base datasets: seeded synthetic generators and raw table import.

use std::path::Path;

use corals_utils::{Table, views::Matrix};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardUniform};

use super::cache::CacheError;

/// The shape of the substitute used when the raw preeclampsia table is unavailable.
pub const PREECLAMPSIA_SHAPE: (usize, usize) = (32, 16897);

/// `m x n` values drawn uniformly from `[0, 1)`.
pub fn uniform(m: usize, n: usize, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = Matrix::new(
        corals_utils::views::Init(|| StandardUniform.sample(&mut rng)),
        m,
        n,
    );
    Table::unlabeled(data)
}

/// The synthetic dataset with `m` samples and `n` features.
pub fn synthetic_mn(m: usize, n: usize, seed: u64) -> Table {
    uniform(m, n, seed)
}

/// The synthetic dataset with about `size` values and `n / m` close to `ratio`.
pub fn synthetic_nratio(size: usize, ratio: f64, seed: u64) -> Table {
    let (m, n) = nratio_shape(size, ratio);
    uniform(m, n, seed)
}

/// `m = floor(sqrt(size / ratio))`, `n = floor(sqrt(size * ratio))`.
pub fn nratio_shape(size: usize, ratio: f64) -> (usize, usize) {
    let size = size as f64;
    (
        (size / ratio).sqrt().floor() as usize,
        (size * ratio).sqrt().floor() as usize,
    )
}

/// Import a delimited table: the first row holds the column labels, the first column the
/// row labels, and every other cell a number.
pub fn import_csv(path: &Path) -> Result<Table, CacheError> {
    let import = |source| CacheError::Import {
        path: path.to_owned(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(import)?;

    let cols: Vec<String> = reader
        .headers()
        .map_err(import)?
        .iter()
        .skip(1)
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(import)?;
        let line = record.position().map_or(0, |p| p.line());
        let mut fields = record.iter();
        rows.push(fields.next().unwrap_or_default().to_owned());
        for field in fields {
            let value = field.trim().parse::<f64>().map_err(|_| CacheError::Parse {
                path: path.to_owned(),
                line,
                value: field.to_owned(),
            })?;
            values.push(value);
        }
    }

    let data = Matrix::try_from(values.into_boxed_slice(), rows.len(), cols.len()).map_err(|_| {
        CacheError::Ragged {
            path: path.to_owned(),
            ncols: cols.len(),
        }
    })?;
    Ok(Table::new(data, rows, cols)?)
}

/// The raw table for `kind` under `raw_dir`, with the preeclampsia substitute when its
/// file is missing.
pub fn real(kind: &str, raw_dir: &Path, seed: u64) -> Result<Table, CacheError> {
    let path = raw_dir.join(format!("{kind}.csv"));
    if kind == "preeclampsia" && !path.exists() {
        let (m, n) = PREECLAMPSIA_SHAPE;
        tracing::warn!(
            path = %path.display(),
            "raw preeclampsia table not found; substituting random {m} x {n} data"
        );
        return Ok(uniform(m, n, seed));
    }
    import_csv(&path)
}

/// `(m, n)` shapes of the standard synthetic datasets.
pub fn synthetic_grid() -> Vec<(usize, usize)> {
    const WIDTHS: [usize; 7] = [1000, 2500, 5000, 10000, 20000, 40000, 60000];
    const HEIGHTS: [usize; 14] = [
        10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 200, 300, 400, 500,
    ];
    WIDTHS
        .iter()
        .map(|&n| (50, n))
        .chain(HEIGHTS.iter().map(|&m| (m, 20000)))
        .collect()
}

///////////
// Tests //
///////////
