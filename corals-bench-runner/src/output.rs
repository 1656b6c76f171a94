/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Where commands report to.
//!
//! Reports are plain text written through [`Output::sink`]. Progress bars draw to
//! [`Output::draw_target`], which is `stderr` for a terminal run and hidden otherwise, so
//! captured reports never contain bar redraws.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Reports on `stdout`, progress bars on `stderr`.
pub fn default() -> DefaultOutput {
    DefaultOutput::new()
}

pub trait Output {
    fn sink(&mut self) -> &mut dyn std::io::Write;
    fn draw_target(&self) -> ProgressDrawTarget;
}

/// Lets `write!` and `writeln!` take a `&mut dyn Output` directly.
impl std::io::Write for &mut dyn Output {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.sink().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.sink().flush()
    }
}

/// A bar of `count` steps prefixed with `message`.
pub fn progress_bar(
    message: &str,
    count: usize,
    draw_target: ProgressDrawTarget,
) -> anyhow::Result<ProgressBar> {
    let style = ProgressStyle::with_template(&format!(
        "{message} [{{elapsed_precise}}] {{wide_bar}} {{pos}}/{{len}}"
    ))?;
    let progress = ProgressBar::with_draw_target(Some(count as u64), draw_target);
    progress.set_style(style);
    Ok(progress)
}

#[derive(Debug)]
pub struct DefaultOutput(std::io::Stdout);

impl DefaultOutput {
    pub fn new() -> Self {
        Self(std::io::stdout())
    }
}

impl Default for DefaultOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for DefaultOutput {
    fn sink(&mut self) -> &mut dyn std::io::Write {
        &mut self.0
    }

    fn draw_target(&self) -> ProgressDrawTarget {
        ProgressDrawTarget::stderr()
    }
}

/// Discards reports and hides progress bars. Backs `--quiet`.
#[derive(Debug, Default)]
pub struct Sink(std::io::Sink);

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Output for Sink {
    fn sink(&mut self) -> &mut dyn std::io::Write {
        &mut self.0
    }

    fn draw_target(&self) -> ProgressDrawTarget {
        ProgressDrawTarget::hidden()
    }
}

/// Collects reports in memory, for tests and for parents that post-process them.
#[derive(Debug, Default)]
pub struct Memory(Vec<u8>);

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far. Invalid UTF-8 is replaced.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl Output for Memory {
    fn sink(&mut self) -> &mut dyn std::io::Write {
        &mut self.0
    }

    fn draw_target(&self) -> ProgressDrawTarget {
        ProgressDrawTarget::hidden()
    }
}
