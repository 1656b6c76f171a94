/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

// Views
pub mod views;

pub mod file;
#[cfg(feature = "hdf5")]
pub mod h5;
pub mod io;
pub mod table;
pub use table::Table;
