//! Bomber - concurrent load generator for key-value storage clusters
//!
//! Bomber keeps a storage cluster busy with a randomized mix of writes,
//! reads, removals and administrative calls, so the cluster can be observed
//! and debugged under sustained pressure. It reports nothing about
//! throughput or latency itself.
//!
//! # Architecture
//!
//! - **Operations**: nine kinds behind one tagged [`operation::Operation`],
//!   selected by name through the [`operation::registry`]
//! - **Workers**: one OS thread per [`worker::ActionBatch`], firing every
//!   operation of a round before waiting on any result
//! - **Coordinator**: the [`coordinator::Dispatcher`] starts, watches and
//!   joins the worker pool
//! - **Sessions**: a [`session::Session`] trait with an in-process loopback
//!   cluster and a recording mock

pub mod config;
pub mod coordinator;
pub mod error;
pub mod generator;
pub mod operation;
pub mod session;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::Dispatcher;
pub use error::Error;
pub use session::Session;

/// Result type used at the process boundary
pub type Result<T> = anyhow::Result<T>;
