use super::{CacheStats, CacheStore, Fingerprint};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::row::Row;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// In-process LRU result cache with per-entry expiry.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    clock: Arc<dyn Clock>,
}

struct MemoryInner {
    capacity: usize,
    map: HashMap<Fingerprint, Entry>,
    order: VecDeque<Fingerprint>,
    stats: CacheStats,
}

struct Entry {
    rows: Arc<Vec<Row>>,
    expires_at: Option<DateTime<Utc>>,
    tag: Option<String>,
}

impl MemoryStore {
    /// A store holding at most `capacity` result sets.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
                stats: CacheStats::default(),
            }),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries)
    }

    /// Use `clock` for expiry decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryStore")
            .field("capacity", &inner.capacity)
            .field("len", &inner.map.len())
            .field("stats", &inner.stats)
            .finish()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &Fingerprint) -> Option<Arc<Vec<Row>>> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let Some(entry) = inner.map.get(key) else {
            inner.stats.misses += 1;
            return None;
        };
        if entry.expires_at.is_some_and(|at| at <= now) {
            inner.remove(key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
            tracing::trace!(target: "hookqb.cache", key = %key, "expired");
            return None;
        }
        let rows = Arc::clone(&entry.rows);
        inner.touch(key);
        inner.stats.hits += 1;
        Some(rows)
    }

    fn put(&self, key: Fingerprint, rows: Arc<Vec<Row>>, ttl: Duration, tag: Option<&str>) {
        if ttl.is_zero() {
            return;
        }
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| self.clock.now().checked_add_signed(delta));
        let entry = Entry {
            rows,
            expires_at,
            tag: tag.map(str::to_string),
        };

        let mut inner = self.lock();
        tracing::trace!(target: "hookqb.cache", key = %key, ttl_secs = ttl.as_secs(), "store");
        if inner.map.insert(key.clone(), entry).is_some() {
            inner.touch(&key);
        } else {
            inner.order.push_back(key);
        }
        inner.stats.stores += 1;
        inner.evict_if_needed();
    }

    fn forget(&self, key: &Fingerprint) -> bool {
        let mut inner = self.lock();
        let removed = inner.remove(key);
        if removed {
            inner.stats.purged += 1;
        }
        removed
    }

    fn purge_tag(&self, tag: &str) -> usize {
        let mut inner = self.lock();
        let keys: Vec<Fingerprint> = inner
            .map
            .iter()
            .filter(|(_, e)| e.tag.as_deref() == Some(tag))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            inner.remove(key);
        }
        inner.stats.purged += keys.len() as u64;
        tracing::trace!(target: "hookqb.cache", tag, purged = keys.len(), "purge tag");
        keys.len()
    }

    fn clear(&self) {
        let mut inner = self.lock();
        inner.stats.purged += inner.map.len() as u64;
        inner.map.clear();
        inner.order.clear();
    }

    fn stats(&self) -> CacheStats {
        self.lock().stats
    }
}

impl MemoryInner {
    fn touch(&mut self, key: &Fingerprint) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove(&mut self, key: &Fingerprint) -> bool {
        if self.map.remove(key).is_none() {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let _ = self.order.remove(pos);
        }
        true
    }

    fn evict_if_needed(&mut self) {
        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.map.remove(&oldest).is_some() {
                self.stats.evictions += 1;
            }
        }
    }
}
