//! Configuration validation

use super::*;
use crate::error::Error;
use crate::operation::registry;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<(), Error> {
    validate_cluster(&config.cluster)?;
    validate_workload(&config.workload)?;
    validate_workers(&config.workers)?;
    validate_loopback(&config.loopback)?;
    Ok(())
}

/// Validate cluster configuration
pub fn validate_cluster(cluster: &ClusterConfig) -> Result<(), Error> {
    if cluster.remotes.is_empty() {
        return Err(Error::config("at least one remote is required"));
    }
    if let Some(remote) = cluster.remotes.iter().find(|r| r.trim().is_empty()) {
        return Err(Error::config(format!("invalid remote `{}`", remote)));
    }
    if cluster.namespace.is_empty() {
        return Err(Error::config("namespace must not be empty"));
    }
    Ok(())
}

/// Validate workload configuration
///
/// Operation names are resolved here as well, so an unknown name is
/// reported before anything connects.
pub fn validate_workload(workload: &WorkloadConfig) -> Result<(), Error> {
    if workload.commands.is_empty() {
        return Err(Error::config("commands must name at least one operation"));
    }
    if workload.max_key_value <= 0 {
        return Err(Error::config(format!(
            "max_key_value must be greater than 0, got {}",
            workload.max_key_value
        )));
    }
    if workload.max_data_size == 0 {
        return Err(Error::config("max_data_size must be greater than 0"));
    }
    if workload.commands_per_worker == 0 {
        return Err(Error::config("commands_per_worker must be at least 1"));
    }
    if workload.rounds == Some(0) {
        return Err(Error::config("rounds must be at least 1 (omit for unbounded)"));
    }
    if workload.repeat == 0 {
        return Err(Error::config("repeat must be at least 1"));
    }

    let kinds = registry::resolve(&workload.commands)?;
    if !workload.backend_control && kinds.iter().any(|k| k.is_backend_control()) {
        tracing::warn!("backend control operations requested but backend_control is off; they will be skipped");
    }

    Ok(())
}

/// Validate workers configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<(), Error> {
    if workers.threads == 0 {
        return Err(Error::config("workers.threads must be at least 1"));
    }

    if workers.threads > 1024 {
        tracing::warn!(
            threads = workers.threads,
            "very high thread count, this may cause performance issues"
        );
    }

    Ok(())
}

/// Validate loopback cluster configuration
pub fn validate_loopback(loopback: &LoopbackConfig) -> Result<(), Error> {
    if loopback.io_threads == 0 {
        return Err(Error::config("loopback.io_threads must be at least 1"));
    }
    if loopback.backends_per_node == 0 {
        return Err(Error::config("loopback.backends_per_node must be at least 1"));
    }
    if loopback.failure_percent > 100 {
        return Err(Error::config(format!(
            "loopback.failure_percent must be between 0 and 100, got {}",
            loopback.failure_percent
        )));
    }
    Ok(())
}
