//! In-process loopback cluster
//!
//! `LoopbackSession` emulates a small storage cluster inside the bomber
//! process. It exists so the harness can be exercised end to end without any
//! external infrastructure, and so the worker loop sees realistic in-flight
//! behavior: calls are queued to a pool of IO threads and resolve
//! asynchronously, optionally after a simulated latency or with an injected
//! failure.
//!
//! # Model
//!
//! - Every remote added with [`LoopbackSession::add_remote`] becomes a node
//!   with `backends_per_node` backends; the routing table is nodes x backends
//! - Keys are namespaced and hashed onto one backend
//! - Writes are replicated into every configured group
//! - Read-only backends reject writes
//! - Cache writes go to a separate tier and expire after their ttl

use super::{
    AsyncResult, BackendResult, ControlHandle, LookupHandle, MonitorHandle, ObjectInfo, ReadHandle,
    RemoveHandle, Route, Session, WriteHandle,
};
use crate::config::LoopbackConfig;
use crate::error::Error;
use crossbeam::channel::{self, Sender};
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Group used when no groups are configured
const DEFAULT_GROUP: u32 = 0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct BackendState {
    route: Route,
    readonly: bool,
    defrag_runs: u64,
}

#[derive(Debug)]
struct StoredObject {
    backend: usize,
    data: Vec<u8>,
    committed: bool,
}

#[derive(Debug)]
struct CachedObject {
    size: u64,
    expires_at: Instant,
}

/// Shared cluster state, touched only from IO threads and `routes()`
#[derive(Debug, Default)]
struct Cluster {
    backends: RwLock<Vec<BackendState>>,
    objects: Mutex<HashMap<String, StoredObject>>,
    cache: Mutex<HashMap<String, CachedObject>>,
}

/// One request's addressing: the storage key in every target group plus the backend it routes to
#[derive(Debug, Clone)]
struct Placement {
    key: String,
    replicas: Vec<String>,
    backend: usize,
}

impl Cluster {
    fn ensure_writable(&self, backend: usize) -> BackendResult<()> {
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);
        match backends.get(backend) {
            Some(state) if state.readonly => Err(Error::Backend(format!(
                "backend {} is read-only",
                state.route
            ))),
            Some(_) => Ok(()),
            None => Err(Error::EmptyRoutingTable),
        }
    }

    fn write(&self, at: &Placement, data: &[u8], offset: u64) -> BackendResult<ObjectInfo> {
        self.ensure_writable(at.backend)?;
        let mut objects = lock(&self.objects);
        let mut size = 0;
        for replica in &at.replicas {
            let object = objects.entry(replica.clone()).or_insert_with(|| StoredObject {
                backend: at.backend,
                data: Vec::new(),
                committed: true,
            });
            store_at(&mut object.data, data, offset);
            size = object.data.len() as u64;
        }
        Ok(ObjectInfo { size })
    }

    fn prepare(&self, at: &Placement, data: &[u8], offset: u64, total_size: u64) -> BackendResult<ObjectInfo> {
        self.ensure_writable(at.backend)?;
        let mut objects = lock(&self.objects);
        for replica in &at.replicas {
            let mut object = StoredObject {
                backend: at.backend,
                data: vec![0u8; total_size as usize],
                committed: false,
            };
            store_at(&mut object.data, data, offset);
            objects.insert(replica.clone(), object);
        }
        Ok(ObjectInfo { size: total_size })
    }

    fn plain(&self, at: &Placement, data: &[u8], offset: u64, commit_size: Option<u64>) -> BackendResult<ObjectInfo> {
        self.ensure_writable(at.backend)?;
        let mut objects = lock(&self.objects);
        let mut size = 0;
        for replica in &at.replicas {
            let object = match objects.get_mut(replica) {
                Some(object) if !object.committed => object,
                _ => {
                    return Err(Error::Backend(format!(
                        "object {} is not prepared",
                        at.key
                    )))
                }
            };
            store_at(&mut object.data, data, offset);
            if let Some(total_size) = commit_size {
                object.data.resize(total_size as usize, 0);
                object.committed = true;
            }
            size = object.data.len() as u64;
        }
        Ok(ObjectInfo { size })
    }

    fn write_cache(&self, at: &Placement, data: &[u8], ttl: u64) -> BackendResult<ObjectInfo> {
        let size = data.len() as u64;
        let expires_at = Instant::now() + Duration::from_secs(ttl);
        let mut cache = lock(&self.cache);
        for replica in &at.replicas {
            cache.insert(replica.clone(), CachedObject { size, expires_at });
        }
        Ok(ObjectInfo { size })
    }

    fn lookup(&self, at: &Placement) -> BackendResult<ObjectInfo> {
        {
            let objects = lock(&self.objects);
            if let Some(object) = at.replicas.iter().find_map(|r| objects.get(r)) {
                return Ok(ObjectInfo {
                    size: object.data.len() as u64,
                });
            }
        }
        let now = Instant::now();
        let cache = lock(&self.cache);
        at.replicas
            .iter()
            .filter_map(|r| cache.get(r))
            .find(|cached| cached.expires_at > now)
            .map(|cached| ObjectInfo { size: cached.size })
            .ok_or_else(|| Error::NotFound(at.key.clone()))
    }

    fn read(&self, at: &Placement, offset: u64, size: u64) -> BackendResult<Vec<u8>> {
        let objects = lock(&self.objects);
        let object = at
            .replicas
            .iter()
            .find_map(|r| objects.get(r))
            .ok_or_else(|| Error::NotFound(at.key.clone()))?;

        let len = object.data.len() as u64;
        if offset > len {
            return Err(Error::Backend(format!(
                "read of {} at offset {} beyond size {}",
                at.key, offset, len
            )));
        }
        let end = offset.saturating_add(size).min(len);
        Ok(object.data[offset as usize..end as usize].to_vec())
    }

    fn remove(&self, at: &Placement) -> BackendResult<()> {
        self.ensure_writable(at.backend)?;
        let mut removed = false;
        {
            let mut objects = lock(&self.objects);
            for replica in &at.replicas {
                removed |= objects.remove(replica).is_some();
            }
        }
        let mut cache = lock(&self.cache);
        for replica in &at.replicas {
            removed |= cache.remove(replica).is_some();
        }
        if removed {
            Ok(())
        } else {
            Err(Error::NotFound(at.key.clone()))
        }
    }

    fn control(&self, route: &Route, action: impl FnOnce(&mut BackendState)) -> BackendResult<()> {
        let mut backends = self.backends.write().unwrap_or_else(PoisonError::into_inner);
        let state = backends
            .iter_mut()
            .find(|state| state.route == *route)
            .ok_or_else(|| Error::Backend(format!("unknown route {}", route)))?;
        action(state);
        Ok(())
    }

    fn purge_expired_cache(&self) {
        let now = Instant::now();
        lock(&self.cache).retain(|_, cached| cached.expires_at > now);
    }

    fn monitor_stat(&self, categories: u64, namespace: &str, groups: &[u32]) -> serde_json::Value {
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);
        let mut usage = vec![(0u64, 0u64); backends.len()];
        for object in lock(&self.objects).values() {
            if let Some(slot) = usage.get_mut(object.backend) {
                slot.0 += 1;
                slot.1 += object.data.len() as u64;
            }
        }

        let backend_stats: Vec<_> = backends
            .iter()
            .zip(&usage)
            .map(|(state, (objects, bytes))| {
                serde_json::json!({
                    "address": state.route.address,
                    "backend_id": state.route.backend_id,
                    "readonly": state.readonly,
                    "defrag_runs": state.defrag_runs,
                    "objects": objects,
                    "bytes": bytes,
                })
            })
            .collect();

        let cache = lock(&self.cache);
        serde_json::json!({
            "categories": categories,
            "namespace": namespace,
            "groups": groups,
            "backends": backend_stats,
            "cache": {
                "objects": cache.len(),
                "bytes": cache.values().map(|c| c.size).sum::<u64>(),
            },
        })
    }
}

fn store_at(buf: &mut Vec<u8>, data: &[u8], offset: u64) {
    let start = offset as usize;
    let end = start + data.len();
    if buf.len() < end {
        buf.resize(end, 0);
    }
    buf[start..end].copy_from_slice(data);
}

fn parse_remote(address: &str) -> Result<(), Error> {
    let mut parts = address.rsplitn(3, ':').collect::<Vec<_>>();
    parts.reverse();
    let invalid = || Error::config(format!("invalid remote address `{}`, expected host:port[:family]", address));

    let (host, port) = match parts.as_slice() {
        [host, port] => (*host, *port),
        // family is AF_INET (2) or AF_INET6 (10)
        [host, port, family] => match family.parse::<u8>() {
            Ok(2) | Ok(10) => (*host, *port),
            _ => return Err(invalid()),
        },
        _ => return Err(invalid()),
    };

    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}

/// In-process emulated storage cluster
pub struct LoopbackSession {
    cluster: Arc<Cluster>,
    jobs: Option<Sender<Job>>,
    io_threads: Vec<JoinHandle<()>>,
    backends_per_node: u32,
    latency: Duration,
    failure_percent: u8,
    namespace: String,
    groups: Vec<u32>,
}

impl LoopbackSession {
    /// Start the IO thread pool; the cluster has no nodes until remotes are added
    pub fn new(config: &LoopbackConfig) -> Result<Self, Error> {
        if config.io_threads == 0 {
            return Err(Error::config("loopback io_threads must be at least 1"));
        }
        if config.backends_per_node == 0 {
            return Err(Error::config("loopback backends_per_node must be at least 1"));
        }

        let (tx, rx) = channel::unbounded::<Job>();
        let mut io_threads = Vec::with_capacity(config.io_threads);
        for i in 0..config.io_threads {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("loopback-io-{}", i))
                .spawn(move || {
                    for job in rx.iter() {
                        job();
                    }
                })
                .map_err(Error::Spawn)?;
            io_threads.push(handle);
        }

        Ok(Self {
            cluster: Arc::new(Cluster::default()),
            jobs: Some(tx),
            io_threads,
            backends_per_node: config.backends_per_node,
            latency: Duration::from_micros(config.latency_us),
            failure_percent: config.failure_percent,
            namespace: "bomber".to_string(),
            groups: Vec::new(),
        })
    }

    /// Register a node and its backends in the routing table
    pub fn add_remote(&mut self, address: &str) -> Result<(), Error> {
        parse_remote(address)?;

        let mut backends = self.cluster.backends.write().unwrap_or_else(PoisonError::into_inner);
        if backends.iter().any(|state| state.route.address == address) {
            tracing::debug!(remote = %address, "remote already known");
            return Ok(());
        }
        for backend_id in 0..self.backends_per_node {
            backends.push(BackendState {
                route: Route {
                    address: address.to_string(),
                    backend_id,
                },
                readonly: false,
                defrag_runs: 0,
            });
        }
        Ok(())
    }

    pub fn set_groups(&mut self, groups: Vec<u32>) {
        self.groups = groups;
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = namespace.into();
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn groups(&self) -> &[u32] {
        &self.groups
    }

    fn placement(&self, key: &str) -> BackendResult<Placement> {
        let backends = self.cluster.backends.read().unwrap_or_else(PoisonError::into_inner).len();
        if backends == 0 {
            return Err(Error::EmptyRoutingTable);
        }

        let mut hasher = DefaultHasher::new();
        self.namespace.hash(&mut hasher);
        key.hash(&mut hasher);
        let backend = (hasher.finish() % backends as u64) as usize;

        let groups: &[u32] = if self.groups.is_empty() {
            &[DEFAULT_GROUP]
        } else {
            &self.groups
        };
        let replicas = groups
            .iter()
            .map(|group| format!("{}:{}:{}", group, self.namespace, key))
            .collect();

        Ok(Placement {
            key: key.to_string(),
            replicas,
            backend,
        })
    }

    /// Queue a call on the IO pool and hand back its pending handle
    fn submit<T, F>(&self, call: F) -> AsyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Cluster) -> BackendResult<T> + Send + 'static,
    {
        let (completer, handle) = AsyncResult::channel();
        let cluster = Arc::clone(&self.cluster);
        let latency = self.latency;
        let inject_failure =
            self.failure_percent > 0 && rand::thread_rng().gen_range(0..100u8) < self.failure_percent;

        let job: Job = Box::new(move || {
            if !latency.is_zero() {
                thread::sleep(latency);
            }
            let result = if inject_failure {
                Err(Error::Backend("injected failure".to_string()))
            } else {
                call(&cluster)
            };
            completer.complete(result);
        });

        // A closed queue drops the job, and with it the completer, which
        // resolves the handle with an error.
        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(job);
        }
        handle
    }

    fn submit_placed<T, F>(&self, key: &str, call: F) -> AsyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Cluster, &Placement) -> BackendResult<T> + Send + 'static,
    {
        match self.placement(key) {
            Ok(at) => self.submit(move |cluster| call(cluster, &at)),
            Err(e) => AsyncResult::ready(Err(e)),
        }
    }
}

impl Session for LoopbackSession {
    fn write(&self, key: &str, data: &[u8], offset: u64, _total_size: u64) -> WriteHandle {
        let data = data.to_vec();
        self.submit_placed(key, move |cluster, at| cluster.write(at, &data, offset))
    }

    fn write_prepare(&self, key: &str, data: &[u8], offset: u64, total_size: u64) -> WriteHandle {
        let data = data.to_vec();
        self.submit_placed(key, move |cluster, at| cluster.prepare(at, &data, offset, total_size))
    }

    fn write_plain(&self, key: &str, data: &[u8], offset: u64) -> WriteHandle {
        let data = data.to_vec();
        self.submit_placed(key, move |cluster, at| cluster.plain(at, &data, offset, None))
    }

    fn write_commit(&self, key: &str, data: &[u8], offset: u64, total_size: u64) -> WriteHandle {
        let data = data.to_vec();
        self.submit_placed(key, move |cluster, at| {
            cluster.plain(at, &data, offset, Some(total_size))
        })
    }

    fn write_cache(&self, key: &str, data: &[u8], ttl: u64) -> WriteHandle {
        let data = data.to_vec();
        self.submit_placed(key, move |cluster, at| cluster.write_cache(at, &data, ttl))
    }

    fn lookup(&self, key: &str) -> LookupHandle {
        self.submit_placed(key, |cluster, at| cluster.lookup(at))
    }

    fn read(&self, key: &str, offset: u64, size: u64) -> ReadHandle {
        self.submit_placed(key, move |cluster, at| cluster.read(at, offset, size))
    }

    fn remove(&self, key: &str) -> RemoveHandle {
        self.submit_placed(key, |cluster, at| cluster.remove(at))
    }

    fn routes(&self) -> Vec<Route> {
        self.cluster
            .backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|state| state.route.clone())
            .collect()
    }

    fn set_backend_readonly(&self, route: &Route) -> ControlHandle {
        let route = route.clone();
        self.submit(move |cluster| cluster.control(&route, |state| state.readonly = true))
    }

    fn set_backend_writable(&self, route: &Route) -> ControlHandle {
        let route = route.clone();
        self.submit(move |cluster| cluster.control(&route, |state| state.readonly = false))
    }

    fn start_defrag(&self, route: &Route) -> ControlHandle {
        let route = route.clone();
        self.submit(move |cluster| {
            cluster.control(&route, |state| state.defrag_runs += 1)?;
            cluster.purge_expired_cache();
            Ok(())
        })
    }

    fn monitor_stat(&self, categories: u64) -> MonitorHandle {
        let namespace = self.namespace.clone();
        let groups = self.groups.clone();
        self.submit(move |cluster| Ok(cluster.monitor_stat(categories, &namespace, &groups)))
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        // Closing the queue lets IO threads drain remaining jobs and exit
        self.jobs.take();
        for handle in self.io_threads.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("loopback io thread panicked");
            }
        }
    }
}
