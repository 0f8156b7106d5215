//! Configuration module
//!
//! Handles CLI argument parsing, configuration files, and validation. The
//! configuration is parsed once at startup and then passed by reference; no
//! component reads global state.

pub mod cli;
pub mod toml;
pub mod validator;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Complete bomber configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cluster: ClusterConfig,
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub loopback: LoopbackConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load a configuration file
    ///
    /// Files ending in `.json` are parsed as JSON, either sectioned like the
    /// TOML form or as one flat object (`num_threads`, `remotes`, ...);
    /// everything else is parsed as TOML.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => toml::parse_json_file(path),
            _ => toml::parse_toml_file(path),
        }
    }
}

/// Cluster connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Node addresses (`host:port[:family]`)
    #[serde(default, deserialize_with = "tokens")]
    pub remotes: Vec<String>,
    /// Storage groups to replicate into; empty means the session default
    #[serde(default, deserialize_with = "tokens")]
    pub groups: Vec<u32>,
    /// Key namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "bomber".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            remotes: Vec::new(),
            groups: Vec::new(),
            namespace: default_namespace(),
        }
    }
}

/// What each worker issues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Operation names, or `["all"]`; repeated names weight that operation
    #[serde(default, deserialize_with = "tokens")]
    pub commands: Vec<String>,
    /// Keys are drawn from `[0, max_key_value)`
    pub max_key_value: i64,
    /// Payload sizes are drawn from `[1, max_data_size]`
    pub max_data_size: usize,
    /// Operations per worker batch
    #[serde(default = "default_commands_per_worker")]
    pub commands_per_worker: usize,
    /// Rounds per worker; unbounded when absent
    pub rounds: Option<u64>,
    /// Serial issues of each operation per round
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    /// Enable the set_backend_readonly / set_backend_writable operations
    #[serde(default)]
    pub backend_control: bool,
    /// Seed for batch composition and keys
    pub seed: Option<u64>,
}

fn default_commands_per_worker() -> usize {
    10
}

fn default_repeat() -> u32 {
    1
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_threads() -> usize {
    1
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
        }
    }
}

/// In-process loopback cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopbackConfig {
    /// Threads completing requests
    #[serde(default = "default_io_threads")]
    pub io_threads: usize,
    /// Backends registered per remote
    #[serde(default = "default_backends_per_node")]
    pub backends_per_node: u32,
    /// Simulated latency per call (microseconds)
    #[serde(default)]
    pub latency_us: u64,
    /// Percentage of calls failing with a backend error (0-100)
    #[serde(default)]
    pub failure_percent: u8,
}

fn default_io_threads() -> usize {
    num_cpus::get()
}

fn default_backends_per_node() -> u32 {
    2
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            io_threads: default_io_threads(),
            backends_per_node: default_backends_per_node(),
            latency_us: 0,
            failure_percent: 0,
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
    /// Validate and print configuration, then exit
    #[serde(default)]
    pub dry_run: bool,
}

/// Accept either a list or a single whitespace-separated string
///
/// `remotes = "a:1025:2 b:1025:2"` and `remotes = ["a:1025:2", "b:1025:2"]`
/// are equivalent.
fn tokens<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tokens<T> {
        List(Vec<T>),
        Joined(String),
    }

    match Tokens::<T>::deserialize(deserializer)? {
        Tokens::List(list) => Ok(list),
        Tokens::Joined(joined) => joined
            .split_whitespace()
            .map(|token| {
                token
                    .parse()
                    .map_err(|e| de::Error::custom(format!("invalid token `{}`: {}", token, e)))
            })
            .collect(),
    }
}

/// Accept a number or a string holding one
///
/// The flat JSON layout stores every value as text (`"num_threads": "4"`).
fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number<T> {
        Value(T),
        Text(String),
    }

    match Number::<T>::deserialize(deserializer)? {
        Number::Value(value) => Ok(value),
        Number::Text(text) => text
            .trim()
            .parse()
            .map_err(|e| de::Error::custom(format!("invalid number `{}`: {}", text, e))),
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Cluster: {}", self.cluster)?;
        writeln!(f, "  Workload: {}", self.workload)?;
        writeln!(f, "  Workers: {}", self.workers)?;
        writeln!(f, "  Loopback: {}", self.loopback)?;
        Ok(())
    }
}

impl fmt::Display for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "remotes=[{}], groups={:?}, namespace={}",
            self.remotes.join(", "),
            self.groups,
            self.namespace
        )
    }
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "commands=[{}], max_key_value={}, max_data_size={}, commands_per_worker={}",
            self.commands.join(", "),
            self.max_key_value,
            self.max_data_size,
            self.commands_per_worker
        )?;
        match self.rounds {
            Some(rounds) => write!(f, ", rounds={}", rounds)?,
            None => write!(f, ", rounds=unbounded")?,
        }
        if self.repeat > 1 {
            write!(f, ", repeat={}", self.repeat)?;
        }
        if self.backend_control {
            write!(f, ", backend_control")?;
        }
        if let Some(seed) = self.seed {
            write!(f, ", seed={}", seed)?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "threads={}", self.threads)
    }
}

impl fmt::Display for LoopbackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "io_threads={}, backends_per_node={}, latency={}us, failure={}%",
            self.io_threads, self.backends_per_node, self.latency_us, self.failure_percent
        )
    }
}
