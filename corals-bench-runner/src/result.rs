/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Interrupt-safe saving of results.

use std::{
    io::{BufWriter, Write},
    path::Path,
};

use serde::Serialize;

/// Atomically save the serializable `object` to a JSON file at `path`.
///
/// This can fail for a number of reasons:
///
/// 1. `path` is not an valid file path.
/// 2. The temporary file `format!("{}.temp", path)` already exists.
/// 3. Serialization fails.
/// 4. Flushing or renaming fails.
///
/// See [`atomic_write`].
pub fn atomic_save<T>(path: &Path, object: &T) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
{
    atomic_write(path, |temp| {
        let mut writer = BufWriter::new(std::fs::File::create(temp)?);
        serde_json::to_writer_pretty(&mut writer, object)?;
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(())
    })
}

/// Produce the file at `path` by letting `write` fill `format!("{}.temp", path)` and then
/// renaming it over `path`, making the operation safe from interrupts. Parent directories
/// are created as needed.
///
/// On failure the temporary file is removed and `path` is left untouched.
pub fn atomic_write<F>(path: &Path, write: F) -> anyhow::Result<()>
where
    F: FnOnce(&Path) -> anyhow::Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let temp = std::path::PathBuf::from(format!("{}.temp", path.display()));
    if temp.exists() {
        return Err(anyhow::Error::msg(format!(
            "Temporary file {} already exists. Aborting!",
            temp.display()
        )));
    }

    let written = write(&temp).and_then(|()| Ok(std::fs::rename(&temp, path)?));
    if written.is_err() {
        // The write error takes precedence.
        let _ = std::fs::remove_file(&temp);
    }
    written
}

///////////
// Tests //
///////////
