/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Read and write labeled tables in the corals binary format.
//!
//! The binary format is:
//! - 8-byte header
//!   - `nrows` (u32 LE)
//!   - `ncols` (u32 LE)
//! - Payload: `nrows × ncols` `f64` values, tightly packed in row-major order
//! - `nrows` row labels followed by `ncols` column labels, each a `u32` LE byte length
//!   followed by that many bytes of UTF-8

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, Write},
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::{
    table::Table,
    views::{Matrix, MatrixView},
};

/// Read a matrix of `T` from the binary format (header and payload only).
///
/// Validates that the reader contains enough data before allocating.
pub fn read_bin<T>(reader: &mut (impl Read + Seek)) -> Result<Matrix<T>, ReadBinError>
where
    T: bytemuck::Pod,
{
    let metadata = Metadata::read(reader)?;
    let (nrows, ncols) = metadata.into_dims();
    let type_size = std::mem::size_of::<T>();

    let expected_bytes = nrows
        .checked_mul(ncols)
        .and_then(|n| n.checked_mul(type_size))
        .ok_or(ReadBinError::Overflow {
            nrows: metadata.nrows,
            ncols: metadata.ncols,
            type_size,
        })?;

    let data_start = reader.stream_position()?;
    let end = reader.seek(std::io::SeekFrom::End(0))?;
    let available = end - data_start;
    reader.seek(std::io::SeekFrom::Start(data_start))?;

    if available < expected_bytes as u64 {
        return Err(ReadBinError::SizeMismatch {
            expected: expected_bytes as u64,
            available,
            nrows: metadata.nrows,
            ncols: metadata.ncols,
            type_size,
        });
    }

    let mut data = Matrix::new(<T as bytemuck::Zeroable>::zeroed(), nrows, ncols);
    reader.read_exact(bytemuck::must_cast_slice_mut::<T, u8>(data.as_mut_slice()))?;
    Ok(data)
}

/// Write a matrix of `T` in the binary format (header and payload only).
///
/// Returns the total number of bytes written.
pub fn write_bin<T>(data: MatrixView<'_, T>, writer: &mut impl Write) -> Result<usize, SaveBinError>
where
    T: bytemuck::Pod,
{
    let metadata = Metadata::new(data.nrows(), data.ncols())?;
    let bytes = metadata.write(writer)?;
    writer.write_all(bytemuck::must_cast_slice::<T, u8>(data.as_slice()))?;
    Ok(bytes + std::mem::size_of_val(data.as_slice()))
}

/// Read a labeled [`Table`] (see [module docs](self)).
pub fn read_table(reader: &mut (impl Read + Seek)) -> Result<Table, ReadBinError> {
    let data = read_bin::<f64>(reader)?;
    let rows = read_labels(reader, data.nrows())?;
    let cols = read_labels(reader, data.ncols())?;
    Ok(Table::new(data, rows, cols)?)
}

/// Write a labeled [`Table`] (see [module docs](self)).
pub fn write_table(table: &Table, writer: &mut impl Write) -> Result<usize, SaveBinError> {
    let mut bytes = write_bin(table.data(), writer)?;
    for label in table.row_labels().iter().chain(table.col_labels()) {
        let len: u32 = label
            .len()
            .try_into()
            .map_err(|_| SaveBinError::LabelTooLong(label.len()))?;
        writer.write_u32::<LittleEndian>(len)?;
        writer.write_all(label.as_bytes())?;
        bytes += std::mem::size_of::<u32>() + label.len();
    }
    Ok(bytes)
}

/// Load a table from `path`.
pub fn load_table(path: &Path) -> Result<Table, ReadBinError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_table(&mut reader)
}

/// Save a table to `path`.
///
/// The data is first written to a sibling temporary file which is then renamed over
/// `path`, so readers never observe a partially written table.
pub fn save_table(table: &Table, path: &Path) -> Result<usize, SaveBinError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".temp");
    let temp = PathBuf::from(temp);

    let bytes = {
        let mut writer = BufWriter::new(File::create(&temp)?);
        let bytes = write_table(table, &mut writer)?;
        writer.flush()?;
        bytes
    };
    std::fs::rename(&temp, path)?;
    Ok(bytes)
}

fn read_labels(reader: &mut impl Read, count: usize) -> Result<Vec<String>, ReadBinError> {
    (0..count)
        .map(|index| {
            let len = reader.read_u32::<LittleEndian>()?;
            // Grows with the bytes actually present, not with the declared length.
            let mut buf = Vec::new();
            reader.by_ref().take(u64::from(len)).read_to_end(&mut buf)?;
            if buf.len() != len as usize {
                return Err(ReadBinError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("label {index} declares {len} bytes, found {}", buf.len()),
                )));
            }
            String::from_utf8(buf).map_err(|source| ReadBinError::Label { index, source })
        })
        .collect()
}

/// 8-byte header at the start of a binary table: `nrows` and `ncols` as little-endian u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    nrows: u32,
    ncols: u32,
}

impl Metadata {
    pub fn new(nrows: usize, ncols: usize) -> Result<Self, SaveBinError> {
        let overflow = || SaveBinError::DimensionOverflow { nrows, ncols };
        Ok(Self {
            nrows: nrows.try_into().map_err(|_| overflow())?,
            ncols: ncols.try_into().map_err(|_| overflow())?,
        })
    }

    /// Destructure into (`nrows`, `ncols`) as `usize`.
    pub fn into_dims(&self) -> (usize, usize) {
        (self.nrows as usize, self.ncols as usize)
    }

    /// Deserialize the 8-byte header from a reader.
    pub fn read<R>(reader: &mut R) -> std::io::Result<Self>
    where
        R: Read,
    {
        let nrows = reader.read_u32::<LittleEndian>()?;
        let ncols = reader.read_u32::<LittleEndian>()?;
        Ok(Metadata { nrows, ncols })
    }

    /// Serialize the 8-byte header to a writer. Returns the number of bytes written (always 8).
    pub fn write<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: Write,
    {
        writer.write_u32::<LittleEndian>(self.nrows)?;
        writer.write_u32::<LittleEndian>(self.ncols)?;
        Ok(2 * std::mem::size_of::<u32>())
    }
}

/// Error type for [`read_bin`] and [`read_table`].
#[derive(Debug, Error)]
pub enum ReadBinError {
    /// The reader has fewer bytes remaining than the header declares.
    #[error(
        "binary data too short: header declares {nrows} rows × {ncols} cols × {type_size} bytes = \
         {expected} bytes, but only {available} bytes available"
    )]
    SizeMismatch {
        expected: u64,
        available: u64,
        nrows: u32,
        ncols: u32,
        type_size: usize,
    },

    /// `nrows * ncols` overflows `usize` (corrupt header).
    #[error("header dimensions overflow: {nrows} rows × {ncols} cols × {type_size} bytes overflows")]
    Overflow {
        nrows: u32,
        ncols: u32,
        type_size: usize,
    },

    #[error("label {index} is not valid UTF-8")]
    Label {
        index: usize,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error(transparent)]
    Labels(#[from] crate::table::LabelMismatch),

    /// Underlying IO failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error type for [`write_bin`] and [`write_table`].
#[derive(Debug, Error)]
pub enum SaveBinError {
    /// Matrix dimensions exceed `u32::MAX` and cannot be represented in the binary header.
    #[error("dimensions overflow u32: {nrows} rows × {ncols} cols")]
    DimensionOverflow { nrows: usize, ncols: usize },

    #[error("label of {0} bytes does not fit a u32 length prefix")]
    LabelTooLong(usize),

    /// Underlying IO failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

///////////
// Tests //
///////////
