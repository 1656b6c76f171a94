/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

mod perf;
pub use perf::{get_peak_workingset_size, get_resident_set_size, reset_peak_workingset_size};
