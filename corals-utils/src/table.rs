/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use thiserror::Error;

use crate::views::{Matrix, MatrixView};

/// A labeled dataset: `f64` values with one label per row (sample) and column (feature).
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    data: Matrix<f64>,
    rows: Vec<String>,
    cols: Vec<String>,
}

#[derive(Debug, Error)]
#[error("table of shape ({nrows}, {ncols}) was given {nrow_labels} row labels and {ncol_labels} column labels")]
pub struct LabelMismatch {
    nrows: usize,
    ncols: usize,
    nrow_labels: usize,
    ncol_labels: usize,
}

impl Table {
    /// Construct a table, checking that the label counts match the matrix shape.
    pub fn new(
        data: Matrix<f64>,
        rows: Vec<String>,
        cols: Vec<String>,
    ) -> Result<Self, LabelMismatch> {
        if rows.len() != data.nrows() || cols.len() != data.ncols() {
            return Err(LabelMismatch {
                nrows: data.nrows(),
                ncols: data.ncols(),
                nrow_labels: rows.len(),
                ncol_labels: cols.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Construct a table with generated labels `0, 1, ...` for rows and columns.
    pub fn unlabeled(data: Matrix<f64>) -> Self {
        let rows = (0..data.nrows()).map(|i| i.to_string()).collect();
        let cols = (0..data.ncols()).map(|i| i.to_string()).collect();
        Self { data, rows, cols }
    }

    pub fn data(&self) -> MatrixView<'_, f64> {
        self.data.as_view()
    }

    pub fn data_mut(&mut self) -> &mut Matrix<f64> {
        &mut self.data
    }

    pub fn row_labels(&self) -> &[String] {
        &self.rows
    }

    pub fn col_labels(&self) -> &[String] {
        &self.cols
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Keep the columns selected by `mask`, together with their labels.
    pub fn select_columns(&self, mask: &[bool]) -> Self {
        let data = self.data.select_columns(mask);
        let cols = self
            .cols
            .iter()
            .zip(mask)
            .filter_map(|(c, &m)| m.then(|| c.clone()))
            .collect();
        Self {
            data,
            rows: self.rows.clone(),
            cols,
        }
    }

    /// Keep the first `ncols` columns.
    pub fn leading_columns(&self, ncols: usize) -> Self {
        let mask: Vec<bool> = (0..self.ncols()).map(|j| j < ncols).collect();
        self.select_columns(&mask)
    }

    /// Keep the rows in `range`.
    pub fn row_range(&self, range: std::ops::Range<usize>) -> Self {
        Self {
            data: self.data.row_range(range.clone()).to_matrix(),
            rows: self.rows[range].to_vec(),
            cols: self.cols.clone(),
        }
    }

    pub fn into_parts(self) -> (Matrix<f64>, Vec<String>, Vec<String>) {
        (self.data, self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_column_selection() {
        let data = Matrix::try_from(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0].into_boxed_slice(), 2, 3)
            .unwrap();
        let table = Table::new(
            data,
            vec!["s0".into(), "s1".into()],
            vec!["a".into(), "b".into(), "c".into()],
        )
        .unwrap();

        let selected = table.select_columns(&[true, false, true]);
        assert_eq!(selected.col_labels(), &["a", "c"]);
        assert_eq!(selected.data().row(1), &[4.0, 6.0]);

        let lower = table.row_range(1..2);
        assert_eq!(lower.row_labels(), &["s1"]);
        assert_eq!(lower.data().row(0), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn label_counts_are_checked() {
        let data = Matrix::new(0.0, 2, 2);
        let err = Table::new(data, vec!["x".into()], vec!["a".into(), "b".into()]).unwrap_err();
        assert!(err.to_string().contains("1 row labels"));
    }
}
