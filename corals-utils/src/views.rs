/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{
    fmt,
    ops::{Index, IndexMut, Range},
};

#[cfg(feature = "rayon")]
use rayon::prelude::{IndexedParallelIterator, ParallelSlice, ParallelSliceMut};
use thiserror::Error;

/// Storage that can be viewed as one dense slice.
///
/// Implemented for borrowed and owned slices so that [`MatrixView`] and [`Matrix`] can
/// share one code path.
///
/// # Safety
///
/// `as_slice` must always return the same slice with the same length.
pub unsafe trait DenseData {
    type Elem;

    /// Return the underlying data as a slice.
    fn as_slice(&self) -> &[Self::Elem];
}

/// A mutable companion to [`DenseData`].
///
/// # Safety
///
/// `as_mut_slice` must span exactly the memory returned by `as_slice`.
pub unsafe trait MutDenseData: DenseData {
    fn as_mut_slice(&mut self) -> &mut [Self::Elem];
}

// SAFETY: Returns the same slice every time.
unsafe impl<T> DenseData for &[T] {
    type Elem = T;
    fn as_slice(&self) -> &[Self::Elem] {
        self
    }
}

// SAFETY: Returns the same slice every time.
unsafe impl<T> DenseData for &mut [T] {
    type Elem = T;
    fn as_slice(&self) -> &[Self::Elem] {
        self
    }
}

// SAFETY: Spans the same memory as `as_slice`.
unsafe impl<T> MutDenseData for &mut [T] {
    fn as_mut_slice(&mut self) -> &mut [Self::Elem] {
        self
    }
}

// SAFETY: Returns the same slice every time.
unsafe impl<T> DenseData for Box<[T]> {
    type Elem = T;
    fn as_slice(&self) -> &[Self::Elem] {
        self
    }
}

// SAFETY: Spans the same memory as `as_slice`.
unsafe impl<T> MutDenseData for Box<[T]> {
    fn as_mut_slice(&mut self) -> &mut [Self::Elem] {
        self
    }
}

////////////
// Matrix //
////////////

/// A dense chunk of memory interpreted as a row-major 2-dimensional matrix.
///
/// Datasets use rows for samples (conditions) and columns for features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixBase<T>
where
    T: DenseData,
{
    data: T,
    nrows: usize,
    ncols: usize,
}

/// An owned row-major matrix.
pub type Matrix<T> = MatrixBase<Box<[T]>>;

/// A borrowed row-major matrix.
pub type MatrixView<'a, T> = MatrixBase<&'a [T]>;

/// A mutably borrowed row-major matrix.
pub type MutMatrixView<'a, T> = MatrixBase<&'a mut [T]>;

#[derive(Debug, Error)]
#[non_exhaustive]
#[error(
    "tried to construct a matrix with {nrows} rows and {ncols} columns over a slice \
     of length {len}"
)]
pub struct TryFromError {
    len: usize,
    nrows: usize,
    ncols: usize,
}

/// A generator for initializing the entries in a matrix via `Matrix::new`.
pub trait Generator<T> {
    fn generate(&mut self) -> T;
}

impl<T> Generator<T> for T
where
    T: Clone,
{
    fn generate(&mut self) -> T {
        self.clone()
    }
}

/// A matrix initializer that invokes the provided lambda to initialize each element.
pub struct Init<F>(pub F);

impl<T, F> Generator<T> for Init<F>
where
    F: FnMut() -> T,
{
    fn generate(&mut self) -> T {
        (self.0)()
    }
}

impl<T> Matrix<T> {
    /// Construct a new matrix initialized with the contents of the generator.
    ///
    /// Elements are initialized in memory order.
    pub fn new<U>(mut generator: U, nrows: usize, ncols: usize) -> Self
    where
        U: Generator<T>,
    {
        let data: Box<[T]> = (0..nrows * ncols).map(|_| generator.generate()).collect();
        Self { data, nrows, ncols }
    }

    /// Construct a matrix from column-producing closure `f`, which is called once per
    /// column with the column index and must return exactly `nrows` values.
    pub fn from_columns<F>(nrows: usize, ncols: usize, mut f: F) -> Self
    where
        T: Copy + Default,
        F: FnMut(usize) -> Vec<T>,
    {
        let mut out = Self::new(T::default(), nrows, ncols);
        for j in 0..ncols {
            let column = f(j);
            assert_eq!(column.len(), nrows, "column {j} has the wrong length");
            for (i, v) in column.into_iter().enumerate() {
                out[(i, j)] = v;
            }
        }
        out
    }

    /// Consume the matrix and return the underlying storage.
    pub fn into_inner(self) -> Box<[T]> {
        self.data
    }
}

impl<T> MatrixBase<T>
where
    T: DenseData,
{
    /// Try to construct a `MatrixBase` over the provided base.
    ///
    /// The length of the base must be equal to `nrows * ncols`.
    pub fn try_from(data: T, nrows: usize, ncols: usize) -> Result<Self, TryFromError> {
        let len = data.as_slice().len();
        if Some(len) != nrows.checked_mul(ncols) {
            Err(TryFromError { len, nrows, ncols })
        } else {
            Ok(Self { data, nrows, ncols })
        }
    }

    /// Return the number of columns in the matrix.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Return the number of rows in the matrix.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Return the `(nrows, ncols)` shape of the matrix.
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Return the underlying data as a slice.
    pub fn as_slice(&self) -> &[T::Elem] {
        self.data.as_slice()
    }

    /// Return the underlying data as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T::Elem]
    where
        T: MutDenseData,
    {
        self.data.as_mut_slice()
    }

    /// Return row `row` as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.nrows()`.
    pub fn row(&self, row: usize) -> &[T::Elem] {
        assert!(
            row < self.nrows(),
            "tried to access row {row} of a matrix with {} rows",
            self.nrows()
        );
        let start = row * self.ncols;
        &self.as_slice()[start..start + self.ncols]
    }

    /// Return row `row` as a mutable slice.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.nrows()`.
    pub fn row_mut(&mut self, row: usize) -> &mut [T::Elem]
    where
        T: MutDenseData,
    {
        assert!(
            row < self.nrows(),
            "tried to access row {row} of a matrix with {} rows",
            self.nrows()
        );
        let ncols = self.ncols;
        let start = row * ncols;
        &mut self.data.as_mut_slice()[start..start + ncols]
    }

    /// Return a iterator over all rows in the matrix.
    pub fn row_iter(&self) -> impl ExactSizeIterator<Item = &[T::Elem]> {
        // `chunks_exact` panics on a zero chunk size, which an empty-column matrix has.
        let ncols = self.ncols().max(1);
        let take = if self.ncols() == 0 { 0 } else { self.nrows() };
        self.data.as_slice().chunks_exact(ncols).take(take)
    }

    /// Return a mutable iterator over all rows in the matrix.
    pub fn row_iter_mut(&mut self) -> impl ExactSizeIterator<Item = &mut [T::Elem]>
    where
        T: MutDenseData,
    {
        let ncols = self.ncols().max(1);
        let take = if self.ncols() == 0 { 0 } else { self.nrows() };
        self.data.as_mut_slice().chunks_exact_mut(ncols).take(take)
    }

    /// Return a parallel iterator over the rows of the matrix.
    #[cfg(feature = "rayon")]
    pub fn par_row_iter(&self) -> impl IndexedParallelIterator<Item = &[T::Elem]>
    where
        T::Elem: Sync,
    {
        self.data.as_slice().par_chunks_exact(self.ncols().max(1))
    }

    /// Return a parallel iterator over the mutable rows of the matrix.
    #[cfg(feature = "rayon")]
    pub fn par_row_iter_mut(&mut self) -> impl IndexedParallelIterator<Item = &mut [T::Elem]>
    where
        T: MutDenseData,
        T::Elem: Send,
    {
        let ncols = self.ncols().max(1);
        self.data.as_mut_slice().par_chunks_exact_mut(ncols)
    }

    /// Return a view over the contiguous rows in `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` is not contained in `0..self.nrows()`.
    pub fn row_range(&self, range: Range<usize>) -> MatrixView<'_, T::Elem> {
        assert!(
            range.start <= range.end && range.end <= self.nrows(),
            "row range {:?} is out of bounds for a matrix with {} rows",
            range,
            self.nrows()
        );
        let ncols = self.ncols;
        MatrixBase {
            data: &self.as_slice()[range.start * ncols..range.end * ncols],
            nrows: range.len(),
            ncols,
        }
    }

    /// Split the rows at `m / 2`, returning the top and bottom halves.
    pub fn split_halves(&self) -> (MatrixView<'_, T::Elem>, MatrixView<'_, T::Elem>) {
        let half = self.nrows() / 2;
        (self.row_range(0..half), self.row_range(half..self.nrows()))
    }

    /// Return an immutable view of the matrix.
    pub fn as_view(&self) -> MatrixView<'_, T::Elem> {
        MatrixBase {
            data: self.as_slice(),
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }

    /// Return a mutable view of the matrix.
    pub fn as_mut_view(&mut self) -> MutMatrixView<'_, T::Elem>
    where
        T: MutDenseData,
    {
        let (nrows, ncols) = (self.nrows, self.ncols);
        MatrixBase {
            data: self.data.as_mut_slice(),
            nrows,
            ncols,
        }
    }

    /// Return a copy of column `col`.
    ///
    /// # Panics
    ///
    /// Panics if `col >= self.ncols()`.
    pub fn column(&self, col: usize) -> Vec<T::Elem>
    where
        T::Elem: Copy,
    {
        assert!(
            col < self.ncols(),
            "tried to access column {col} of a matrix with {} columns",
            self.ncols()
        );
        self.row_iter().map(|row| row[col]).collect()
    }

    /// Return a new matrix containing the columns for which `mask` is `true`, in their
    /// original order.
    ///
    /// # Panics
    ///
    /// Panics if `mask.len() != self.ncols()`.
    pub fn select_columns(&self, mask: &[bool]) -> Matrix<T::Elem>
    where
        T::Elem: Copy,
    {
        assert_eq!(
            mask.len(),
            self.ncols(),
            "column mask length must match the number of columns"
        );
        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
            .collect();

        let data: Box<[T::Elem]> = self
            .row_iter()
            .flat_map(|row| keep.iter().map(move |&j| row[j]))
            .collect();

        MatrixBase {
            data,
            nrows: self.nrows,
            ncols: keep.len(),
        }
    }

    /// Return a new matrix with only the first `ncols` columns.
    pub fn leading_columns(&self, ncols: usize) -> Matrix<T::Elem>
    where
        T::Elem: Copy,
    {
        let ncols = ncols.min(self.ncols());
        let mask: Vec<bool> = (0..self.ncols()).map(|j| j < ncols).collect();
        self.select_columns(&mask)
    }

    /// Return the transpose of `self` as a new matrix.
    pub fn transpose(&self) -> Matrix<T::Elem>
    where
        T::Elem: Copy,
    {
        let (nrows, ncols) = self.shape();
        let mut data = Vec::with_capacity(nrows * ncols);
        for j in 0..ncols {
            data.extend(self.row_iter().map(|row| row[j]));
        }
        MatrixBase {
            data: data.into_boxed_slice(),
            nrows: ncols,
            ncols: nrows,
        }
    }

    /// Return an owned copy of the matrix.
    pub fn to_matrix(&self) -> Matrix<T::Elem>
    where
        T::Elem: Clone,
    {
        MatrixBase {
            data: self.as_slice().into(),
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }
}

impl<T> Index<(usize, usize)> for MatrixBase<T>
where
    T: DenseData,
{
    type Output = T::Elem;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        assert!(
            row < self.nrows() && col < self.ncols(),
            "index ({row}, {col}) is out of bounds for a {}x{} matrix",
            self.nrows(),
            self.ncols()
        );
        &self.as_slice()[row * self.ncols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for MatrixBase<T>
where
    T: MutDenseData,
{
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        assert!(
            row < self.nrows() && col < self.ncols(),
            "index ({row}, {col}) is out of bounds for a {}x{} matrix",
            self.nrows(),
            self.ncols()
        );
        let ncols = self.ncols;
        &mut self.as_mut_slice()[row * ncols + col]
    }
}

impl<T> fmt::Display for MatrixBase<T>
where
    T: DenseData,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.nrows, self.ncols)
    }
}

///////////
// Tests //
///////////
