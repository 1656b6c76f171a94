/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, Write},
    path::Path,
};

/// Retrieves the peak resident set size of the current process.
///
/// This function returns the VmHWM field from the /proc/self/status file, which represents
/// the maximum amount of memory that the process has held in RAM at any point in time.
/// The VmHWM value might be inaccurate, according to
/// https://manpages.ubuntu.com/manpages/jammy/man5/proc.5.html.
///
/// # Returns
///
/// The peak working set size in bytes, or `None` if the operation fails or is not
/// supported on the current platform.
pub fn get_peak_workingset_size() -> Option<u64> {
    read_status_field("VmHWM:")
}

/// Retrieves the current resident set size (VmRSS) of the current process in bytes.
pub fn get_resident_set_size() -> Option<u64> {
    read_status_field("VmRSS:")
}

/// Reset the kernel's peak resident set size for this process to the current value.
///
/// Writes `5` to `/proc/self/clear_refs`. Kernels older than 4.0 do not support this, in
/// which case an error is returned and the high-water mark keeps covering the process
/// lifetime.
pub fn reset_peak_workingset_size() -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open("/proc/self/clear_refs")?;
    file.write_all(b"5")
}

fn read_status_field(field: &str) -> Option<u64> {
    if cfg!(unix) {
        let file = File::open(Path::new("/proc/self/status")).ok()?;
        let reader = io::BufReader::new(file);

        for line in reader.lines() {
            let line = line.ok()?;
            if let Some(rest) = line.strip_prefix(field) {
                // Values are reported in kB.
                return rest
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(|kb| kb * 1024);
            }
        }
    }

    None
}
