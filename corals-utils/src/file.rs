/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Table files in either on-disk format, chosen by extension: `.h5` (or `.hdf5`) for
//! HDF5 and `.bin` for the binary format of [`crate::io`].

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    Table,
    io::{ReadBinError, SaveBinError, load_table, save_table},
};

pub const BIN: &str = "bin";
pub const H5: &str = "h5";

/// The extension new table files are written with.
#[cfg(feature = "hdf5")]
pub const DEFAULT_EXTENSION: &str = H5;
#[cfg(not(feature = "hdf5"))]
pub const DEFAULT_EXTENSION: &str = BIN;

#[derive(Debug, Error)]
pub enum TableFileError {
    #[error("{} is not a table file: expected a .{BIN} or .{H5} extension", path.display())]
    Extension { path: PathBuf },

    #[error("{} is an HDF5 file but HDF5 support was not compiled in", path.display())]
    Unsupported { path: PathBuf },

    #[error(transparent)]
    Read(#[from] ReadBinError),

    #[error(transparent)]
    Save(#[from] SaveBinError),

    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] crate::h5::H5Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Bin,
    H5,
}

fn format(path: &Path) -> Result<Format, TableFileError> {
    match path.extension().and_then(OsStr::to_str) {
        Some(BIN) => Ok(Format::Bin),
        Some(H5 | "hdf5") => Ok(Format::H5),
        _ => Err(TableFileError::Extension {
            path: path.to_owned(),
        }),
    }
}

/// Load the table at `path` in the format its extension names.
pub fn load(path: &Path) -> Result<Table, TableFileError> {
    match format(path)? {
        Format::Bin => Ok(load_table(path)?),
        #[cfg(feature = "hdf5")]
        Format::H5 => Ok(crate::h5::load_h5(path)?),
        #[cfg(not(feature = "hdf5"))]
        Format::H5 => Err(TableFileError::Unsupported {
            path: path.to_owned(),
        }),
    }
}

/// Save `table` to `path` in the format its extension names. Both formats replace `path`
/// atomically.
pub fn save(table: &Table, path: &Path) -> Result<(), TableFileError> {
    match format(path)? {
        Format::Bin => {
            save_table(table, path)?;
            Ok(())
        }
        #[cfg(feature = "hdf5")]
        Format::H5 => Ok(crate::h5::save_h5(table, path)?),
        #[cfg(not(feature = "hdf5"))]
        Format::H5 => Err(TableFileError::Unsupported {
            path: path.to_owned(),
        }),
    }
}
