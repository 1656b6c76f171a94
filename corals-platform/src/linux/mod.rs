/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
#![cfg_attr(
    not(test),
    warn(clippy::panic, clippy::unwrap_used, clippy::expect_used)
)]

mod perf;
pub use perf::{get_peak_workingset_size, get_resident_set_size, reset_peak_workingset_size};
