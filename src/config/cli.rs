//! CLI argument parsing using clap

use clap::Parser;
use std::path::PathBuf;

/// Bomber - concurrent load generator for key-value storage clusters
#[derive(Parser, Debug)]
#[command(name = "bomber")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short = 'c', long = "config", value_name = "PATH", env = "BOMBER_CONFIG")]
    pub config: PathBuf,

    // === Workers ===
    /// Number of worker threads
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Operations per worker batch
    #[arg(long)]
    pub commands_per_worker: Option<usize>,

    /// Rounds per worker (default: run until terminated)
    #[arg(long)]
    pub rounds: Option<u64>,

    // === Workload ===
    /// Comma-separated operation names, or "all"
    #[arg(long, value_delimiter = ',')]
    pub commands: Option<Vec<String>>,

    /// Upper bound (exclusive) of the integer key space
    #[arg(long)]
    pub max_key_value: Option<i64>,

    /// Upper bound (inclusive) of payload size in bytes
    #[arg(long)]
    pub max_data_size: Option<usize>,

    /// Serial issues of each operation per round
    #[arg(long)]
    pub repeat: Option<u32>,

    /// Seed for batch composition and key generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Enable set_backend_readonly / set_backend_writable operations
    #[arg(long)]
    pub backend_control: bool,

    // === Cluster ===
    /// Node address (host:port[:family]); repeatable, replaces configured remotes
    #[arg(long = "remote", value_name = "ADDR")]
    pub remotes: Vec<String>,

    /// Storage group id; repeatable, replaces configured groups
    #[arg(long = "group", value_name = "ID")]
    pub groups: Vec<u32>,

    // === Loopback cluster ===
    /// Loopback IO threads
    #[arg(long)]
    pub io_threads: Option<usize>,

    /// Simulated per-call latency of the loopback cluster (microseconds)
    #[arg(long)]
    pub latency_us: Option<u64>,

    // === Runtime ===
    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.threads == Some(0) {
            anyhow::bail!("threads must be at least 1");
        }
        if self.commands_per_worker == Some(0) {
            anyhow::bail!("commands_per_worker must be at least 1");
        }
        if self.rounds == Some(0) {
            anyhow::bail!("rounds must be at least 1 (omit for unbounded)");
        }
        if self.repeat == Some(0) {
            anyhow::bail!("repeat must be at least 1");
        }
        if let Some(commands) = &self.commands {
            if commands.iter().all(|c| c.trim().is_empty()) {
                anyhow::bail!("--commands must name at least one operation");
            }
        }
        Ok(())
    }
}
