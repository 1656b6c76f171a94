/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::fmt::{self, Display};

const SEPARATOR: &str = ",   ";

/// A text table with a fixed number of rows. Cells are rendered on insertion.
///
/// Columns are right-aligned unless marked with [`Table::align_left`]. Missing cells are
/// blank.
#[derive(Debug, Clone)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    left: Vec<bool>,
}

impl Table {
    pub fn new<I>(header: I, nrows: usize) -> Self
    where
        I: IntoIterator<Item: Display>,
    {
        let header: Vec<String> = header.into_iter().map(|h| h.to_string()).collect();
        let ncols = header.len();
        Self {
            rows: vec![vec![None; ncols]; nrows],
            left: vec![false; ncols],
            header,
        }
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.header.len()
    }

    /// Left-align column `col`.
    ///
    /// # Panics
    ///
    /// Panics if `col` is out of bounds.
    pub fn align_left(&mut self, col: usize) -> &mut Self {
        assert!(col < self.ncols(), "column {col} out of bounds");
        self.left[col] = true;
        self
    }

    /// A handle on row `row` for inserting cells.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds.
    pub fn row(&mut self, row: usize) -> Row<'_> {
        assert!(row < self.nrows(), "row {row} out of bounds");
        Row {
            cells: &mut self.rows[row],
        }
    }

    fn widths(&self) -> Vec<usize> {
        let len = |s: &str| s.chars().count();
        let mut widths: Vec<usize> = self.header.iter().map(|h| len(h.as_str())).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                if let Some(cell) = cell {
                    *width = (*width).max(len(cell.as_str()));
                }
            }
        }
        widths
    }

    fn write_line<'a, I>(&self, f: &mut fmt::Formatter<'_>, widths: &[usize], cells: I) -> fmt::Result
    where
        I: Iterator<Item = &'a str>,
    {
        for (col, cell) in cells.enumerate() {
            if col > 0 {
                f.write_str(SEPARATOR)?;
            }
            let width = widths[col];
            if self.left[col] {
                write!(f, "{cell:<width$}")?;
            } else {
                write!(f, "{cell:>width$}")?;
            }
        }
        writeln!(f)
    }
}

/// One row of a [`Table`].
pub struct Row<'a> {
    cells: &'a mut [Option<String>],
}

impl Row<'_> {
    /// Set column `col` to `item`, returning whether a value was replaced.
    ///
    /// # Panics
    ///
    /// Panics if `col` is out of bounds.
    pub fn insert<T>(&mut self, item: T, col: usize) -> bool
    where
        T: Display,
    {
        assert!(col < self.cells.len(), "column {col} out of bounds");
        self.cells[col].replace(item.to_string()).is_some()
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        self.write_line(f, &widths, self.header.iter().map(String::as_str))?;

        let total = widths.iter().sum::<usize>()
            + widths.len().saturating_sub(1) * SEPARATOR.len();
        writeln!(f, "{:=>total$}", "")?;

        for row in &self.rows {
            self.write_line(f, &widths, row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        Ok(())
    }
}

/// A boxed one-line heading.
pub struct Banner<'a>(&'a str);

impl<'a> Banner<'a> {
    pub fn new(message: &'a str) -> Self {
        Self(message)
    }
}

impl Display for Banner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = format!("# {} #", self.0);
        let rule = "#".repeat(line.chars().count());
        writeln!(f, "{rule}")?;
        writeln!(f, "{line}")?;
        writeln!(f, "{rule}")
    }
}
