// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hash and value caches.
//!
//! Two caches back evaluation:
//!
//! * [`HashCache`] maps a plug, its dirty count and a context hash to the
//!   fingerprint last computed for it. It is bounded by an LRU per shard.
//! * [`ValueCache`] maps fingerprints to computed values. Concurrent requests
//!   for a fingerprint that is being computed wait for the leader to publish
//!   instead of computing again. Entries are only removed by an explicit
//!   [`ValueCache::sweep`] once no [`ValueHandle`] refers to them.

use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::fingerprint::Fingerprint;
use crate::plug::PlugId;
use crate::value::PlugValue;
use lru::LruCache;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// How results for an output plug are cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Cache results; concurrent requests for one fingerprint share a compute
    Standard,
    /// Cache results, but let concurrent requests compute independently
    Concurrent,
    /// Cheap pass-through, never cached
    Uncached,
}

/// Key of the hash cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    /// Plug being hashed
    pub plug: PlugId,
    /// Dirty count of the plug when hashed
    pub dirty_count: u64,
    /// Hash of the evaluation context
    pub context: Fingerprint,
}

impl HashKey {
    fn shard_bits(&self) -> u64 {
        self.context.low_bits() ^ (self.plug.0.as_u128() as u64) ^ self.dirty_count
    }
}

fn capacity(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
}

/// Bounded map from plug + context to fingerprint
pub struct HashCache {
    shards: Vec<Mutex<LruCache<HashKey, Fingerprint>>>,
}

impl HashCache {
    /// Create a cache with `shards` buckets of `capacity` entries each
    pub fn new(shards: usize, capacity_per_shard: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(LruCache::new(capacity(capacity_per_shard))))
            .collect();
        Self { shards }
    }

    fn shard(&self, key: &HashKey) -> &Mutex<LruCache<HashKey, Fingerprint>> {
        &self.shards[(key.shard_bits() % self.shards.len() as u64) as usize]
    }

    /// Look up a fingerprint
    pub fn get(&self, key: &HashKey) -> Option<Fingerprint> {
        self.shard(key).lock().get(key).copied()
    }

    /// Record a fingerprint
    pub fn insert(&self, key: HashKey, fingerprint: Fingerprint) {
        self.shard(&key).lock().put(key, fingerprint);
    }

    /// Number of cached fingerprints
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all fingerprints
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }
}

/// A published value together with its external holder count
#[derive(Clone)]
struct CacheEntry {
    value: Arc<PlugValue>,
    holders: Arc<AtomicUsize>,
}

impl CacheEntry {
    fn new(value: PlugValue) -> Self {
        Self {
            value: Arc::new(value),
            holders: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn handle(&self) -> ValueHandle {
        self.holders.fetch_add(1, Ordering::AcqRel);
        ValueHandle {
            value: Arc::clone(&self.value),
            holders: Some(Arc::clone(&self.holders)),
        }
    }

    fn is_held(&self) -> bool {
        self.holders.load(Ordering::Acquire) > 0
    }
}

/// A computation in progress, awaited by concurrent requesters
struct InFlight {
    result: Mutex<Option<Result<CacheEntry>>>,
    ready: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn complete(&self, result: Result<CacheEntry>) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> Result<ValueHandle> {
        let mut result = self.result.lock();
        while result.is_none() {
            self.ready.wait(&mut result);
        }
        match result.as_ref() {
            Some(Ok(entry)) => Ok(entry.handle()),
            Some(Err(error)) => Err(error.clone()),
            None => Err(GraphError::custom("in-flight computation vanished")),
        }
    }
}

enum Slot {
    Ready(CacheEntry),
    InFlight(Arc<InFlight>),
}

enum Lookup {
    Hit(ValueHandle),
    Wait(Arc<InFlight>),
    Lead(Arc<InFlight>),
    Compute,
}

/// Removes an abandoned in-flight slot if the leader unwinds
struct FlightGuard<'a> {
    cache: &'a ValueCache,
    key: Fingerprint,
    flight: Arc<InFlight>,
    done: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.cache.shard(self.key).write().remove(&self.key);
        self.flight
            .complete(Err(GraphError::custom("computation panicked")));
    }
}

/// Fingerprint-keyed store of computed values
pub struct ValueCache {
    shards: Vec<RwLock<HashMap<Fingerprint, Slot>>>,
}

impl ValueCache {
    /// Create a cache with `shards` independently locked buckets
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| RwLock::new(HashMap::new())).collect();
        Self { shards }
    }

    fn shard(&self, key: Fingerprint) -> &RwLock<HashMap<Fingerprint, Slot>> {
        &self.shards[(key.low_bits() % self.shards.len() as u64) as usize]
    }

    /// Get a published value without computing
    pub fn get(&self, key: Fingerprint) -> Option<ValueHandle> {
        match self.shard(key).read().get(&key) {
            Some(Slot::Ready(entry)) => Some(entry.handle()),
            _ => None,
        }
    }

    /// Return the value for `key`, running `compute` on a miss.
    ///
    /// With [`CachePolicy::Standard`] at most one `compute` runs per key at a
    /// time; other callers block until it publishes. Errors are handed to
    /// every waiter and never stored.
    pub fn get_or_compute<F>(
        &self,
        key: Fingerprint,
        policy: CachePolicy,
        stats: &CacheStats,
        compute: F,
    ) -> Result<ValueHandle>
    where
        F: FnOnce() -> Result<PlugValue>,
    {
        if policy == CachePolicy::Uncached {
            stats.computes.fetch_add(1, Ordering::Relaxed);
            return compute().map(ValueHandle::detached);
        }

        let lookup = self.lookup_read(key, policy).unwrap_or_else(|| self.lookup_write(key, policy));

        match lookup {
            Lookup::Hit(handle) => {
                stats.value_hits.fetch_add(1, Ordering::Relaxed);
                Ok(handle)
            }
            Lookup::Wait(flight) => {
                stats.waits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(fingerprint = %key, "waiting on in-flight compute");
                flight.wait()
            }
            Lookup::Lead(flight) => {
                stats.value_misses.fetch_add(1, Ordering::Relaxed);
                stats.computes.fetch_add(1, Ordering::Relaxed);
                let mut guard = FlightGuard {
                    cache: self,
                    key,
                    flight,
                    done: false,
                };
                let result = compute();
                let published = match result {
                    Ok(value) => {
                        let entry = CacheEntry::new(value);
                        self.shard(key).write().insert(key, Slot::Ready(entry.clone()));
                        Ok(entry)
                    }
                    Err(error) => {
                        self.shard(key).write().remove(&key);
                        Err(error)
                    }
                };
                guard.flight.complete(published.clone());
                guard.done = true;
                published.map(|entry| entry.handle())
            }
            Lookup::Compute => {
                stats.value_misses.fetch_add(1, Ordering::Relaxed);
                stats.computes.fetch_add(1, Ordering::Relaxed);
                let value = compute()?;
                let mut slots = self.shard(key).write();
                let entry = match slots.get(&key) {
                    // Another requester published first; share its value
                    Some(Slot::Ready(existing)) => existing.clone(),
                    _ => {
                        let entry = CacheEntry::new(value);
                        slots.insert(key, Slot::Ready(entry.clone()));
                        entry
                    }
                };
                Ok(entry.handle())
            }
        }
    }

    fn lookup_read(&self, key: Fingerprint, policy: CachePolicy) -> Option<Lookup> {
        match self.shard(key).read().get(&key)? {
            Slot::Ready(entry) => Some(Lookup::Hit(entry.handle())),
            Slot::InFlight(flight) if policy == CachePolicy::Standard => {
                Some(Lookup::Wait(Arc::clone(flight)))
            }
            Slot::InFlight(_) => Some(Lookup::Compute),
        }
    }

    fn lookup_write(&self, key: Fingerprint, policy: CachePolicy) -> Lookup {
        let mut slots = self.shard(key).write();
        match slots.get(&key) {
            Some(Slot::Ready(entry)) => Lookup::Hit(entry.handle()),
            Some(Slot::InFlight(flight)) if policy == CachePolicy::Standard => {
                Lookup::Wait(Arc::clone(flight))
            }
            Some(Slot::InFlight(_)) => Lookup::Compute,
            None if policy == CachePolicy::Standard => {
                let flight = Arc::new(InFlight::new());
                slots.insert(key, Slot::InFlight(Arc::clone(&flight)));
                Lookup::Lead(flight)
            }
            None => Lookup::Compute,
        }
    }

    /// Remove published values that no handle refers to.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut slots = shard.write();
            let before = slots.len();
            slots.retain(|_, slot| match slot {
                Slot::Ready(entry) => entry.is_held(),
                Slot::InFlight(_) => true,
            });
            removed += before - slots.len();
        }
        removed
    }

    /// Drop all published values
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().retain(|_, slot| matches!(slot, Slot::InFlight(_)));
        }
    }

    /// Number of published values
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .read()
                    .values()
                    .filter(|slot| matches!(slot, Slot::Ready(_)))
                    .count()
            })
            .sum()
    }

    /// Whether no values are published
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared reference to a computed value.
///
/// Handles obtained from the value cache count as external holders of the
/// cache entry, which keeps the entry alive across [`ValueCache::sweep`].
pub struct ValueHandle {
    value: Arc<PlugValue>,
    holders: Option<Arc<AtomicUsize>>,
}

impl ValueHandle {
    /// Wrap a value that is not stored in any cache
    pub fn detached(value: PlugValue) -> Self {
        Self {
            value: Arc::new(value),
            holders: None,
        }
    }

    /// Whether two handles refer to the same value object
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.value, &b.value)
    }

    /// Whether this handle refers to a cache entry
    pub fn is_cached(&self) -> bool {
        self.holders.is_some()
    }

    /// Clone the value out of the handle
    pub fn to_value(&self) -> PlugValue {
        (*self.value).clone()
    }
}

impl Clone for ValueHandle {
    fn clone(&self) -> Self {
        if let Some(holders) = &self.holders {
            holders.fetch_add(1, Ordering::AcqRel);
        }
        Self {
            value: Arc::clone(&self.value),
            holders: self.holders.clone(),
        }
    }
}

impl Drop for ValueHandle {
    fn drop(&mut self) {
        if let Some(holders) = &self.holders {
            holders.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Deref for ValueHandle {
    type Target = PlugValue;

    fn deref(&self) -> &PlugValue {
        &self.value
    }
}

impl std::fmt::Debug for ValueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueHandle").field(&*self.value).finish()
    }
}

impl PartialEq for ValueHandle {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialEq<PlugValue> for ValueHandle {
    fn eq(&self, other: &PlugValue) -> bool {
        *self.value == *other
    }
}

/// Live counters updated during evaluation
#[derive(Debug, Default)]
pub struct CacheStats {
    pub(crate) hash_hits: AtomicU64,
    pub(crate) hash_misses: AtomicU64,
    pub(crate) value_hits: AtomicU64,
    pub(crate) value_misses: AtomicU64,
    pub(crate) computes: AtomicU64,
    pub(crate) waits: AtomicU64,
    pub(crate) hash_checks: AtomicU64,
    pub(crate) hash_mismatches: AtomicU64,
}

impl CacheStats {
    /// Take a snapshot of the counters
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            hash_hits: self.hash_hits.load(Ordering::Relaxed),
            hash_misses: self.hash_misses.load(Ordering::Relaxed),
            value_hits: self.value_hits.load(Ordering::Relaxed),
            value_misses: self.value_misses.load(Ordering::Relaxed),
            computes: self.computes.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            hash_checks: self.hash_checks.load(Ordering::Relaxed),
            hash_mismatches: self.hash_mismatches.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.hash_hits,
            &self.hash_misses,
            &self.value_hits,
            &self.value_misses,
            &self.computes,
            &self.waits,
            &self.hash_checks,
            &self.hash_mismatches,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Fingerprints served from the hash cache
    pub hash_hits: u64,
    /// Fingerprints computed
    pub hash_misses: u64,
    /// Values served from the value cache
    pub value_hits: u64,
    /// Values not found in the value cache
    pub value_misses: u64,
    /// Node computes run
    pub computes: u64,
    /// Requests that waited on another thread's compute
    pub waits: u64,
    /// Consistency checks run on cached fingerprints
    pub hash_checks: u64,
    /// Consistency checks that failed
    pub hash_mismatches: u64,
}

/// Evaluation engine state shared by every graph built on it
pub struct Engine {
    config: EngineConfig,
    pub(crate) hash_cache: HashCache,
    pub(crate) value_cache: ValueCache,
    pub(crate) stats: CacheStats,
}

impl Engine {
    /// Create an engine from a configuration
    pub fn new(config: EngineConfig) -> Self {
        Self {
            hash_cache: HashCache::new(config.cache_shards, config.hash_cache_capacity),
            value_cache: ValueCache::new(config.cache_shards),
            stats: CacheStats::default(),
            config,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the value cache
    pub fn value_cache(&self) -> &ValueCache {
        &self.value_cache
    }

    /// Get the hash cache
    pub fn hash_cache(&self) -> &HashCache {
        &self.hash_cache
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    /// Reset the counters
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Remove unreferenced values, returning how many were removed
    pub fn sweep(&self) -> usize {
        let removed = self.value_cache.sweep();
        tracing::debug!(removed, remaining = self.value_cache.len(), "swept value cache");
        removed
    }

    /// Drop every cached fingerprint and value
    pub fn clear(&self) {
        self.hash_cache.clear();
        self.value_cache.clear();
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
