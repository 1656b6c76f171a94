/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Sweeps: run a list of experiments over every cached dataset whose name matches a
//! pattern, each in its own process.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::Context as _;
use corals_bench_runner::Output;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    benchmark::MemoryBackend,
    data::{Cache, DatasetSpec, LoadOptions},
    registry::ExperimentId,
};

/// Data prefixes starting with this create a fresh synthetic dataset.
const VOLATILE: &str = "volatile_synthetic";

const RUST: &str = "rust";

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid sweep configuration", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no launcher configured for language \"{0}\"")]
    MissingLauncher(String),

    #[error("the launcher for \"{0}\" is empty")]
    EmptyLauncher(String),

    #[error("cannot read \"{key}<number>_\" from data prefix \"{data}\"")]
    Volatile { data: String, key: &'static str },

    #[error("\"{pattern}\" is not a valid data pattern")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Dataset names are selected when `pattern` matches at their start.
pub fn data_selector(pattern: &str) -> Result<Regex, SweepError> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|source| SweepError::Pattern {
        pattern: pattern.to_owned(),
        source,
    })
}

/// Values shared by every experiment of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Context {
    pub prefix: String,
    pub n_threads: usize,
    pub n_repeat: usize,
    /// A regular expression. Datasets whose names it matches from the start are selected.
    pub data: String,
    pub k_ratio: f64,
    pub threshold: f64,
    pub memory_backend: MemoryBackend,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            prefix: "default".into(),
            n_threads: 1,
            n_repeat: 1,
            data: "synthetic_mn_m-50_n-5000_postprocessed".into(),
            k_ratio: 0.001,
            threshold: 0.9,
            memory_backend: MemoryBackend::default(),
        }
    }
}

/// One experiment of a sweep. `n_threads` and `k_ratio` override the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entry {
    pub lang: String,
    pub algorithm: String,
    #[serde(default)]
    pub n_threads: Option<usize>,
    #[serde(default)]
    pub k_ratio: Option<f64>,
}

/// A parsed sweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    #[serde(default)]
    pub context: Context,
    pub experiments: Vec<Entry>,
    /// Command prefixes for languages other than `rust`.
    #[serde(default)]
    pub launchers: BTreeMap<String, Vec<String>>,
}

impl SweepConfig {
    pub fn load(path: &Path) -> Result<Self, SweepError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SweepError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| SweepError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Check every entry can be launched before anything runs.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.context.data.starts_with(VOLATILE) {
            data_selector(&self.context.data)?;
        }
        for entry in &self.experiments {
            if entry.lang == RUST {
                entry
                    .algorithm
                    .parse::<ExperimentId>()
                    .with_context(|| format!("in sweep entry {entry:?}"))?;
            } else {
                match self.launchers.get(&entry.lang) {
                    None => return Err(SweepError::MissingLauncher(entry.lang.clone()).into()),
                    Some(argv) if argv.is_empty() => {
                        return Err(SweepError::EmptyLauncher(entry.lang.clone()).into());
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

/// Where child processes of the `rust` language come from and what they share.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub executable: PathBuf,
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Launch {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Launch {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Build the command running `entry` on `data`.
pub fn launch(
    config: &SweepConfig,
    entry: &Entry,
    data: &str,
    overwrite: bool,
    invocation: &Invocation,
) -> Result<Launch, SweepError> {
    let context = &config.context;
    let n_threads = entry.n_threads.unwrap_or(context.n_threads);
    let k_ratio = entry.k_ratio.unwrap_or(context.k_ratio);

    if entry.lang == RUST {
        let mut args: Vec<OsString> = vec![
            "--threads".into(),
            n_threads.to_string().into(),
            "--data-dir".into(),
            invocation.data_dir.clone().into(),
            "--out-dir".into(),
            invocation.out_dir.clone().into(),
            "run".into(),
            "--prefix".into(),
            context.prefix.clone().into(),
            "--exp".into(),
            entry.algorithm.clone().into(),
            "--data".into(),
            data.into(),
            "--k-ratio".into(),
            k_ratio.to_string().into(),
            "--threshold".into(),
            context.threshold.to_string().into(),
            "--n-repeat".into(),
            context.n_repeat.to_string().into(),
            "--memory-backend".into(),
            context.memory_backend.as_str().into(),
        ];
        if overwrite {
            args.push("--overwrite".into());
        }
        return Ok(Launch {
            program: invocation.executable.clone().into(),
            args,
        });
    }

    let argv = config
        .launchers
        .get(&entry.lang)
        .ok_or_else(|| SweepError::MissingLauncher(entry.lang.clone()))?;
    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| SweepError::EmptyLauncher(entry.lang.clone()))?;

    let mut args: Vec<OsString> = rest.iter().map(OsString::from).collect();
    for (flag, value) in [
        ("--prefix", context.prefix.clone()),
        ("--exp", entry.algorithm.clone()),
        ("--data", data.to_owned()),
        ("--k_ratio", k_ratio.to_string()),
        ("--threshold", context.threshold.to_string()),
        ("--n_repeat", context.n_repeat.to_string()),
        ("--n_threads", n_threads.to_string()),
        ("--overwrite", overwrite.to_string()),
    ] {
        args.push(flag.into());
        args.push(value.into());
    }
    Ok(Launch {
        program: program.into(),
        args,
    })
}

/// Parse the `(m, n)` of a volatile synthetic data prefix such as
/// `volatile_synthetic_mn_m-50_n-200_`.
pub fn volatile_shape(data: &str) -> Result<(usize, usize), SweepError> {
    let field = |key: &'static str| {
        data.find(key)
            .map(|start| &data[start + key.len()..])
            .and_then(|rest| rest.split_once('_'))
            .and_then(|(value, _)| value.parse::<usize>().ok())
            .ok_or_else(|| SweepError::Volatile {
                data: data.to_owned(),
                key,
            })
    };
    Ok((field("m-")?, field("n-")?))
}

/// Run every experiment of `config` on every selected dataset. Returns the number of
/// processes launched.
pub fn sweep(
    config: &SweepConfig,
    overwrite: bool,
    cache: &Cache,
    invocation: &Invocation,
    mut output: &mut dyn Output,
) -> anyhow::Result<usize> {
    config.validate()?;

    let mut pattern = config.context.data.clone();
    if pattern.starts_with(VOLATILE) {
        writeln!(output, "Creating new dataset ...")?;
        let (m, n) = volatile_shape(&pattern)?;
        let options = LoadOptions {
            prefix: Some("volatile_".into()),
            ..LoadOptions::default()
        };
        let (name, _) = cache.load(&DatasetSpec::synthetic_mn(m, n), &options)?;
        writeln!(output, "Created dataset: {name}")?;
        pattern = regex::escape(&name);
    }
    let selector = data_selector(&pattern)?;

    writeln!(output, "Available data:")?;
    let mut selected = Vec::new();
    for name in cache.benchmark_names()? {
        let hit = selector.is_match(&name);
        writeln!(output, "* [{}] {name}", if hit { "x" } else { " " })?;
        if hit {
            selected.push(name);
        }
    }
    if selected.is_empty() {
        tracing::warn!(%pattern, "no cached dataset matches");
    }

    writeln!(output)?;
    writeln!(output, "Running experiments:")?;
    let rule = "#".repeat(60);
    let context = serde_json::to_string(&config.context)?;
    let mut launched = 0;
    for data in &selected {
        for entry in &config.experiments {
            writeln!(output)?;
            writeln!(output, "{rule}")?;
            writeln!(output, "Context:    {context}")?;
            writeln!(output, "Experiment: {}", serde_json::to_string(entry)?)?;
            writeln!(output, "Overwrite:  {overwrite}")?;
            writeln!(output, "{rule}")?;

            let launch = launch(config, entry, data, overwrite, invocation)?;
            execute(&launch, output)
                .with_context(|| format!("{} on \"{data}\"", entry.algorithm))?;
            launched += 1;
        }
    }
    Ok(launched)
}

// Run `launch` to completion, forwarding its stdout line by line. Stderr is inherited.
fn execute(launch: &Launch, mut output: &mut dyn Output) -> anyhow::Result<()> {
    tracing::debug!(?launch, "spawning");
    let mut child = launch
        .command()
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to start {:?}", launch.program))?;

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            writeln!(output, "{}", line?)?;
        }
    }

    let status = child
        .wait()
        .with_context(|| format!("failed to wait on {:?}", launch.program))?;
    if !status.success() {
        anyhow::bail!("{:?} exited with {status}", launch.program);
    }
    Ok(())
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use corals_bench_runner::output::Memory;

    use super::*;

    const CONFIG: &str = r#"
context:
  prefix: nightly
  n_repeat: 3
  data: synthetic_mn_m-10
  memory_backend: none
experiments:
  - lang: rust
    algorithm: topk_matrix
  - lang: shell
    algorithm: topk_partition
    n_threads: 4
    k_ratio: 0.05
launchers:
  shell: ["sh", "-c", "echo \"$@\"", "sh"]
"#;

    fn invocation(dir: &Path) -> Invocation {
        Invocation {
            executable: "/bin/corals-bench".into(),
            data_dir: dir.join("data"),
            out_dir: dir.join("out"),
        }
    }

    fn strings(launch: &Launch) -> Vec<String> {
        launch
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn defaults_fill_the_context() {
        let config: SweepConfig = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(config.context.prefix, "nightly");
        assert_eq!(config.context.n_threads, 1);
        assert_eq!(config.context.k_ratio, 0.001);
        assert_eq!(config.context.threshold, 0.9);
        assert_eq!(config.context.memory_backend, MemoryBackend::None);
        assert_eq!(config.experiments.len(), 2);
        assert_eq!(config.experiments[1].n_threads, Some(4));

        let config: SweepConfig = serde_yaml::from_str("experiments: []").unwrap();
        assert_eq!(config.context, Context::default());
        assert!(serde_yaml::from_str::<SweepConfig>("experiments: []\nextra: 1").is_err());
    }

    #[test]
    fn launches() {
        let config: SweepConfig = serde_yaml::from_str(CONFIG).unwrap();
        let invocation = invocation(Path::new("/tmp"));

        let rust = launch(&config, &config.experiments[0], "d", true, &invocation).unwrap();
        assert_eq!(rust.program, OsString::from("/bin/corals-bench"));
        let args = strings(&rust);
        assert_eq!(&args[..2], ["--threads", "1"]);
        assert_eq!(args[6], "run");
        assert!(args.windows(2).any(|w| w == ["--exp", "topk_matrix"]));
        assert!(args.windows(2).any(|w| w == ["--n-repeat", "3"]));
        assert_eq!(args.last().map(String::as_str), Some("--overwrite"));

        let shell = launch(&config, &config.experiments[1], "d", false, &invocation).unwrap();
        assert_eq!(shell.program, OsString::from("sh"));
        let args = strings(&shell);
        assert_eq!(&args[..3], ["-c", "echo \"$@\"", "sh"]);
        assert!(args.windows(2).any(|w| w == ["--n_threads", "4"]));
        assert!(args.windows(2).any(|w| w == ["--k_ratio", "0.05"]));
        assert!(args.windows(2).any(|w| w == ["--overwrite", "false"]));
    }

    #[test]
    fn missing_launchers_and_unknown_algorithms_fail_validation() {
        let mut config: SweepConfig = serde_yaml::from_str(CONFIG).unwrap();
        config.validate().unwrap();

        config.launchers.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SweepError>(),
            Some(SweepError::MissingLauncher(lang)) if lang == "shell"
        ));

        config.experiments.truncate(1);
        config.experiments[0].algorithm = "topk_quantum".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn volatile_shapes() {
        assert_eq!(
            volatile_shape("volatile_synthetic_mn_m-50_n-200_").unwrap(),
            (50, 200)
        );
        assert!(volatile_shape("volatile_synthetic_mn_m-50_n-200").is_err());
        assert!(volatile_shape("volatile_synthetic_mn_m-x_n-200_").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn sweep_runs_each_entry_on_each_selected_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().join("data"));
        for (m, n) in [(10, 12), (10, 14), (20, 12)] {
            cache
                .load(&DatasetSpec::synthetic_mn(m, n), &LoadOptions::default())
                .unwrap();
        }

        let mut config: SweepConfig = serde_yaml::from_str(CONFIG).unwrap();
        config.experiments.remove(0);

        let mut output = Memory::new();
        let launched = sweep(&config, false, &cache, &invocation(dir.path()), &mut output).unwrap();
        assert_eq!(launched, 2);

        let contents = output.contents();
        assert!(contents.contains("* [x] synthetic_mn_m-10_n-12_postprocessed"));
        assert!(contents.contains("* [ ] synthetic_mn_m-20_n-12_postprocessed"));
        assert!(contents.contains(
            "--prefix nightly --exp topk_partition --data synthetic_mn_m-10_n-14_postprocessed"
        ));
    }

    #[test]
    fn data_patterns_match_at_the_start() {
        let selector = data_selector("synthetic_mn_m-50_n-.*_postprocessed").unwrap();
        assert!(selector.is_match("synthetic_mn_m-50_n-5000_postprocessed"));
        assert!(selector.is_match("synthetic_mn_m-50_n-20000_postprocessed_nonegatives"));
        assert!(!selector.is_match("synthetic_mn_m-100_n-5000_postprocessed"));
        assert!(!selector.is_match("volatile_synthetic_mn_m-50_n-5000_postprocessed"));

        let err = data_selector("synthetic_mn_m-(50").unwrap_err();
        assert!(matches!(err, SweepError::Pattern { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn wildcard_patterns_select_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().join("data"));
        for (m, n) in [(10, 12), (10, 14), (20, 12)] {
            cache
                .load(&DatasetSpec::synthetic_mn(m, n), &LoadOptions::default())
                .unwrap();
        }

        let mut config: SweepConfig = serde_yaml::from_str(CONFIG).unwrap();
        config.experiments.remove(0);
        config.context.data = "synthetic_mn_m-\\d+_n-12_postprocessed".into();

        let mut output = Memory::new();
        let launched = sweep(&config, false, &cache, &invocation(dir.path()), &mut output).unwrap();
        assert_eq!(launched, 2);

        let contents = output.contents();
        assert!(contents.contains("* [x] synthetic_mn_m-10_n-12_postprocessed"));
        assert!(contents.contains("* [ ] synthetic_mn_m-10_n-14_postprocessed"));
        assert!(contents.contains("* [x] synthetic_mn_m-20_n-12_postprocessed"));
    }

    #[test]
    fn invalid_patterns_fail_validation() {
        let config = SweepConfig {
            context: Context {
                data: "synthetic_mn_m-[".into(),
                ..Context::default()
            },
            experiments: Vec::new(),
            launchers: BTreeMap::new(),
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not a valid data pattern"), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn failing_children_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().join("data"));
        cache
            .load(&DatasetSpec::synthetic_mn(4, 4), &LoadOptions::default())
            .unwrap();

        let config = SweepConfig {
            context: Context {
                data: "synthetic".into(),
                ..Context::default()
            },
            experiments: vec![Entry {
                lang: "shell".into(),
                algorithm: "topk_matrix".into(),
                n_threads: None,
                k_ratio: None,
            }],
            launchers: [("shell".to_owned(), vec!["false".to_owned()])].into(),
        };
        let err = sweep(&config, false, &cache, &invocation(dir.path()), &mut Memory::new())
            .unwrap_err();
        assert!(format!("{err:#}").contains("exited with"), "{err:#}");
    }

    #[test]
    fn volatile_data_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().join("data"));
        let config = SweepConfig {
            context: Context {
                data: "volatile_synthetic_mn_m-6_n-8_".into(),
                ..Context::default()
            },
            experiments: Vec::new(),
            launchers: BTreeMap::new(),
        };
        let mut output = Memory::new();
        sweep(&config, false, &cache, &invocation(dir.path()), &mut output).unwrap();
        assert!(
            output
                .contents()
                .contains("* [x] volatile_synthetic_mn_m-6_n-8_postprocessed")
        );
    }
}
