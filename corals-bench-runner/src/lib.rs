/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Shared plumbing for benchmark commands: where prints go, how results are saved and how
//! tables and timings are formatted.

pub mod output;
pub mod result;
pub mod utils;

pub use output::Output;
pub use result::{atomic_save, atomic_write};
