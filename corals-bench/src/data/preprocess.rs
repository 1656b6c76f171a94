/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Column filters applied to datasets before benchmarking.
//!
//! All filters are column-wise and order preserving. Values are compared exactly, except
//! that `-0.0` and `0.0` are the same value.

use std::collections::HashSet;

use corals_utils::{
    Table,
    views::{Matrix, MatrixView},
};

/// Which filters to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filters {
    /// Clamp negative values to zero.
    pub negative: bool,
    /// Keep only the first occurrence of identical columns.
    pub drop_duplicates: bool,
    /// Drop columns with fewer distinct values than this.
    pub min_nunique: Option<usize>,
}

impl Filters {
    /// The filters applied to every postprocessed dataset.
    pub fn postprocess(negative: bool, drop_duplicates: bool) -> Self {
        Self {
            negative,
            drop_duplicates,
            min_nunique: Some(2),
        }
    }
}

// The bit pattern used for hashing and equality: `-0.0` maps to `0.0` and every NaN to
// the canonical NaN.
fn key(x: f64) -> u64 {
    if x.is_nan() {
        f64::NAN.to_bits()
    } else {
        (x + 0.0).to_bits()
    }
}

fn column_keys(data: MatrixView<'_, f64>, col: usize) -> Vec<u64> {
    data.row_iter().map(|row| key(row[col])).collect()
}

/// `true` for the first occurrence of each distinct column.
pub fn mask_unique(data: MatrixView<'_, f64>) -> Vec<bool> {
    let mut seen = HashSet::new();
    (0..data.ncols())
        .map(|j| seen.insert(column_keys(data, j)))
        .collect()
}

/// `true` for columns with at least `min_nunique` distinct values.
pub fn mask_min_nunique(data: MatrixView<'_, f64>, min_nunique: usize) -> Vec<bool> {
    (0..data.ncols())
        .map(|j| {
            let distinct: HashSet<u64> = column_keys(data, j).into_iter().collect();
            distinct.len() >= min_nunique
        })
        .collect()
}

/// Replace every negative value by zero.
pub fn clamp_negative(data: &mut Matrix<f64>) {
    data.as_mut_slice()
        .iter_mut()
        .filter(|x| **x < 0.0)
        .for_each(|x| *x = 0.0);
}

fn intersect(mask: &mut [bool], other: &[bool]) {
    mask.iter_mut().zip(other).for_each(|(m, o)| *m &= *o);
}

// The mask of `data`, which must already be clamped when clamping is enabled.
fn column_mask(data: MatrixView<'_, f64>, filters: &Filters) -> Vec<bool> {
    let mut mask = vec![true; data.ncols()];
    if filters.drop_duplicates {
        intersect(&mut mask, &mask_unique(data));
    }
    if let Some(min_nunique) = filters.min_nunique {
        intersect(&mut mask, &mask_min_nunique(data, min_nunique));
    }
    mask
}

fn clamped(data: MatrixView<'_, f64>, filters: &Filters) -> Matrix<f64> {
    let mut data = data.to_matrix();
    if filters.negative {
        clamp_negative(&mut data);
    }
    data
}

/// Apply `filters`, returning the surviving columns and the column mask.
pub fn preprocess(data: MatrixView<'_, f64>, filters: &Filters) -> (Matrix<f64>, Vec<bool>) {
    let data = clamped(data, filters);
    let mask = column_mask(data.as_view(), filters);
    (data.select_columns(&mask), mask)
}

/// Like [`preprocess`], but the mask is computed separately on the top rows `[0, m/2)`
/// and the bottom rows `[m/2, m)` and a column survives only if it passes on both.
///
/// The full matrix is filtered, so both halves stay column-aligned. Clamping only shapes
/// the mask: the surviving columns keep their original values.
pub fn preprocess_diff(data: MatrixView<'_, f64>, filters: &Filters) -> (Matrix<f64>, Vec<bool>) {
    let clamped = clamped(data, filters);
    let (top, bottom) = clamped.split_halves();
    let mut mask = column_mask(top, filters);
    intersect(&mut mask, &column_mask(bottom, filters));
    (data.select_columns(&mask), mask)
}

/// [`preprocess`] a labeled table, keeping the labels of the surviving columns.
pub fn preprocess_table(table: &Table, filters: &Filters) -> Table {
    let mut table = table.clone();
    if filters.negative {
        clamp_negative(table.data_mut());
    }
    let mask = column_mask(table.data(), filters);
    table.select_columns(&mask)
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn matrix(nrows: usize, ncols: usize, values: &[f64]) -> Matrix<f64> {
        Matrix::try_from(values.into(), nrows, ncols).unwrap()
    }

    // Columns: 0 distinct, 1 constant, 2 duplicate of 0, 3 negative, 4 signed zeros.
    fn sample() -> Matrix<f64> {
        matrix(
            3,
            5,
            &[
                1.0, 5.0, 1.0, -1.0, 0.0, //
                2.0, 5.0, 2.0, -2.0, -0.0, //
                3.0, 5.0, 3.0, 4.0, 0.0, //
            ],
        )
    }

    #[test]
    fn unique_keeps_first_occurrence() {
        assert_eq!(
            mask_unique(sample().as_view()),
            vec![true, true, false, true, true]
        );

        let zeros = matrix(2, 2, &[0.0, -0.0, -0.0, 0.0]);
        assert_eq!(mask_unique(zeros.as_view()), vec![true, false]);
    }

    #[test]
    fn signed_zeros_are_one_value() {
        assert_eq!(
            mask_min_nunique(sample().as_view(), 2),
            vec![true, false, true, true, false]
        );
    }

    #[rstest]
    #[case(false, false, None, vec![true; 5])]
    #[case(false, true, None, vec![true, true, false, true, true])]
    #[case(false, false, Some(2), vec![true, false, true, true, false])]
    #[case(false, true, Some(2), vec![true, false, false, true, false])]
    #[case(true, false, Some(3), vec![true, false, true, false, false])]
    fn filters_compose(
        #[case] negative: bool,
        #[case] drop_duplicates: bool,
        #[case] min_nunique: Option<usize>,
        #[case] expected: Vec<bool>,
    ) {
        let filters = Filters {
            negative,
            drop_duplicates,
            min_nunique,
        };
        let (filtered, mask) = preprocess(sample().as_view(), &filters);
        assert_eq!(mask, expected);
        assert_eq!(filtered.nrows(), 3);
        assert_eq!(filtered.ncols(), expected.iter().filter(|m| **m).count());
    }

    #[test]
    fn clamping_removes_no_columns() {
        let filters = Filters {
            negative: true,
            drop_duplicates: false,
            min_nunique: None,
        };
        let (filtered, mask) = preprocess(sample().as_view(), &filters);
        assert!(mask.iter().all(|m| *m));
        assert!(filtered.as_slice().iter().all(|x| *x >= 0.0));
        assert_eq!(filtered.column(3), vec![0.0, 0.0, 4.0]);
    }

    #[rstest]
    fn idempotent(#[values(false, true)] negative: bool, #[values(false, true)] drop: bool) {
        let filters = Filters::postprocess(negative, drop);
        let (once, _) = preprocess(sample().as_view(), &filters);
        let (twice, mask) = preprocess(once.as_view(), &filters);
        assert_eq!(once, twice);
        assert!(mask.iter().all(|m| *m));
    }

    #[test]
    fn diff_mask_is_bounded_by_each_half() {
        // Column 0 is constant in the top half, column 2 in the bottom half.
        let data = matrix(
            4,
            3,
            &[
                1.0, 1.0, 7.0, //
                1.0, 2.0, 8.0, //
                2.0, 3.0, 9.0, //
                3.0, 4.0, 9.0, //
            ],
        );
        let filters = Filters::postprocess(false, false);
        let (filtered, mask) = preprocess_diff(data.as_view(), &filters);
        assert_eq!(mask, vec![false, true, false]);

        let (top, bottom) = data.split_halves();
        let (_, top_mask) = preprocess(top, &filters);
        let (_, bottom_mask) = preprocess(bottom, &filters);
        for j in 0..3 {
            assert!(!mask[j] || (top_mask[j] && bottom_mask[j]));
        }

        // Both halves keep the same columns.
        let (a, b) = filtered.split_halves();
        assert_eq!(a.ncols(), b.ncols());
        assert_eq!(filtered.column(0), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn diff_masks_clamped_data_but_keeps_original_values() {
        // Column 1 only varies through negative values, so clamping makes it constant.
        let data = matrix(
            4,
            3,
            &[
                -1.0, -1.0, 1.0, //
                2.0, -2.0, 2.0, //
                -3.0, -3.0, 3.0, //
                4.0, -4.0, 4.0, //
            ],
        );
        let filters = Filters::postprocess(true, false);
        let (filtered, mask) = preprocess_diff(data.as_view(), &filters);
        assert_eq!(mask, vec![true, false, true]);
        assert_eq!(filtered.column(0), vec![-1.0, 2.0, -3.0, 4.0]);
        assert_eq!(filtered.column(1), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn odd_row_counts_put_the_extra_row_at_the_bottom() {
        let data = matrix(3, 2, &[1.0, 1.0, 2.0, 1.0, 3.0, 2.0]);
        let filters = Filters::postprocess(false, false);
        let (_, mask) = preprocess_diff(data.as_view(), &filters);
        // Top half is the single row 0, where nothing has two distinct values.
        assert_eq!(mask, vec![false, false]);
    }

    #[test]
    fn tables_keep_surviving_labels() {
        let table = Table::new(
            sample(),
            vec!["a".into(), "b".into(), "c".into()],
            (0..5).map(|j| format!("g{j}")).collect(),
        )
        .unwrap();
        let filtered = preprocess_table(&table, &Filters::postprocess(false, true));
        assert_eq!(filtered.col_labels(), ["g0", "g3"]);
        assert_eq!(filtered.row_labels(), ["a", "b", "c"]);
    }
}
