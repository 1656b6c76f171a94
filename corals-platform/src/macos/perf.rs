/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::io;

/// Retrieves the peak resident set size of the current process.
///
/// On macOS, this function uses getrusage to retrieve the maximum resident set size.
/// The ru_maxrss field is reported in bytes on macOS (unlike Linux where it is kilobytes).
pub fn get_peak_workingset_size() -> Option<u64> {
    use libc::{RUSAGE_SELF, getrusage, rusage};

    // SAFETY: `rusage` is plain data and `getrusage` only writes into it.
    let mut usage: rusage = unsafe { std::mem::zeroed() };
    let result = unsafe { getrusage(RUSAGE_SELF, &mut usage) };

    if result == 0 {
        return Some(usage.ru_maxrss as u64);
    }

    None
}

/// The current resident set size is not exposed through a stable libc interface on
/// macOS, so the sampler falls back to the peak value.
pub fn get_resident_set_size() -> Option<u64> {
    get_peak_workingset_size()
}

/// macOS cannot reset the high-water mark.
pub fn reset_peak_workingset_size() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "resetting the peak resident set size is not supported on macOS",
    ))
}
