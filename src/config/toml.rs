//! Configuration file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Parse JSON configuration file
pub fn parse_json_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_json_string(&contents)
        .with_context(|| format!("Failed to parse JSON config file: {}", path.display()))
}

/// Parse JSON configuration from string
///
/// An object with a `workload` section uses the TOML layout. Anything else
/// is read as the flat layout:
///
/// ```json
/// {
///     "num_threads": "4",
///     "max_key_value": "1000",
///     "max_data_size": "4096",
///     "remotes": "localhost:1025:2",
///     "commands": "write read",
///     "groups": "1 2"
/// }
/// ```
pub fn parse_json_string(contents: &str) -> Result<Config> {
    let value: serde_json::Value =
        serde_json::from_str(contents).context("Failed to parse JSON configuration")?;

    if value.get("workload").is_some() {
        return serde_json::from_value(value).context("Failed to parse sectioned JSON configuration");
    }
    let flat: FlatJsonConfig =
        serde_json::from_value(value).context("Failed to parse flat JSON configuration")?;
    Ok(flat.into())
}

/// Single-object JSON layout; values may be numbers or strings
#[derive(Debug, Deserialize)]
struct FlatJsonConfig {
    #[serde(deserialize_with = "super::number")]
    num_threads: usize,
    #[serde(deserialize_with = "super::number")]
    max_key_value: i64,
    #[serde(deserialize_with = "super::number")]
    max_data_size: usize,
    #[serde(deserialize_with = "super::tokens")]
    remotes: Vec<String>,
    #[serde(deserialize_with = "super::tokens")]
    commands: Vec<String>,
    #[serde(default, deserialize_with = "super::tokens")]
    groups: Vec<u32>,
}

impl From<FlatJsonConfig> for Config {
    fn from(flat: FlatJsonConfig) -> Self {
        Config {
            cluster: ClusterConfig {
                remotes: flat.remotes,
                groups: flat.groups,
                ..ClusterConfig::default()
            },
            workload: WorkloadConfig {
                commands: flat.commands,
                max_key_value: flat.max_key_value,
                max_data_size: flat.max_data_size,
                commands_per_worker: default_commands_per_worker(),
                rounds: None,
                repeat: default_repeat(),
                backend_control: false,
                seed: None,
            },
            workers: WorkerConfig {
                threads: flat.num_threads,
            },
            loopback: LoopbackConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Merge CLI arguments with file configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    // Workers
    if let Some(threads) = cli.threads {
        config.workers.threads = threads;
    }

    // Workload
    if let Some(commands) = &cli.commands {
        config.workload.commands = commands.clone();
    }
    if let Some(max_key_value) = cli.max_key_value {
        config.workload.max_key_value = max_key_value;
    }
    if let Some(max_data_size) = cli.max_data_size {
        config.workload.max_data_size = max_data_size;
    }
    if let Some(batch) = cli.commands_per_worker {
        config.workload.commands_per_worker = batch;
    }
    if cli.rounds.is_some() {
        config.workload.rounds = cli.rounds;
    }
    if let Some(repeat) = cli.repeat {
        config.workload.repeat = repeat;
    }
    if cli.seed.is_some() {
        config.workload.seed = cli.seed;
    }
    if cli.backend_control {
        config.workload.backend_control = true;
    }

    // Cluster: repeated flags replace the file's lists
    if !cli.remotes.is_empty() {
        config.cluster.remotes = cli.remotes.clone();
    }
    if !cli.groups.is_empty() {
        config.cluster.groups = cli.groups.clone();
    }

    // Loopback
    if let Some(io_threads) = cli.io_threads {
        config.loopback.io_threads = io_threads;
    }
    if let Some(latency_us) = cli.latency_us {
        config.loopback.latency_us = latency_us;
    }

    // Runtime flags only ever switch on
    config.runtime.debug |= cli.debug;
    config.runtime.dry_run |= cli.dry_run;

    config
}
