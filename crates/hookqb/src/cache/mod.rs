//! Read-through result caching.
//!
//! Reads that opt in are memoized under a [`Fingerprint`] of their compiled
//! SQL, bind values and optional tag. Writes never invalidate anything on
//! their own; callers purge by tag or forget a fingerprint explicitly.

mod memory;

#[cfg(test)]
mod tests;

pub use memory::MemoryStore;

use crate::compile::CompiledStatement;
use crate::error::OrmResult;
use crate::row::Row;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Deterministic cache key for a compiled read.
///
/// Equality compares the full key material, so two statements whose digests
/// collide never share an entry.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    digest: u64,
    material: Arc<str>,
}

impl Fingerprint {
    pub fn of(stmt: &CompiledStatement, tag: Option<&str>) -> Self {
        let mut material = String::with_capacity(stmt.sql().len() + 16 * stmt.bindings().len());
        if let Some(tag) = tag {
            material.push_str(tag);
        }
        material.push('\u{0}');
        material.push_str(stmt.sql());
        for value in stmt.bindings() {
            material.push('\u{0}');
            value.write_fingerprint(&mut material);
        }

        let mut hasher = DefaultHasher::new();
        material.hash(&mut hasher);
        Self {
            digest: hasher.finish(),
            material: material.into(),
        }
    }

    pub fn digest(&self) -> u64 {
        self.digest
    }

    /// The tag, SQL and encoded bindings the digest was computed from.
    pub fn material(&self) -> &str {
        &self.material
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest && self.material == other.material
    }
}

impl Eq for Fingerprint {}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.digest);
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.digest)
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Entries dropped because their time-to-live ran out.
    pub expirations: u64,
    /// Entries dropped by `forget`, `purge_tag` or `clear`.
    pub purged: u64,
}

/// A key-value store for materialized result sets.
///
/// Implementations must be safe under concurrent access: a reader sees
/// either a complete entry or none.
pub trait CacheStore: Send + Sync {
    /// Look up a live entry.
    fn get(&self, key: &Fingerprint) -> Option<Arc<Vec<Row>>>;

    /// Store `rows` for `ttl`. A zero `ttl` stores nothing.
    fn put(&self, key: Fingerprint, rows: Arc<Vec<Row>>, ttl: Duration, tag: Option<&str>);

    /// Drop one entry. Returns whether it existed.
    fn forget(&self, key: &Fingerprint) -> bool;

    /// Drop every entry stored under `tag`. Returns how many were dropped.
    fn purge_tag(&self, tag: &str) -> usize;

    fn clear(&self);

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Return the cached rows for `key`, or run `load`, store its result and return it.
///
/// Two concurrent misses on the same key may both run `load`; the later
/// store wins.
pub async fn read_through<F, Fut>(
    store: &dyn CacheStore,
    key: Fingerprint,
    ttl: Duration,
    tag: Option<&str>,
    load: F,
) -> OrmResult<Arc<Vec<Row>>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = OrmResult<Vec<Row>>>,
{
    if let Some(rows) = store.get(&key) {
        tracing::trace!(target: "hookqb.cache", key = %key, "hit");
        return Ok(rows);
    }
    tracing::trace!(target: "hookqb.cache", key = %key, "miss");
    let rows = Arc::new(load().await?);
    store.put(key, Arc::clone(&rows), ttl, tag);
    Ok(rows)
}
