//! The database handle.

use crate::builder::Builder;
use crate::cache::{CacheStats, CacheStore, Fingerprint, MemoryStore};
use crate::clock::{Clock, SystemClock};
use crate::compile::Compiler;
use crate::config::DbConfig;
use crate::error::OrmResult;
use crate::gateway::{Connection, Gateway, StatementResult};
use crate::hook::{HookPipeline, QueryHook, TimestampsHook};
use crate::soft_delete::SoftDeletes;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Owns a [`Connection`] and the strategies every query built from it uses.
///
/// The handle is shared by reference: any number of builders may borrow it
/// at once, each with its own query state.
///
/// # Example
/// ```ignore
/// use hookqb::{Db, DbConfig, TracingHook};
///
/// let db = Db::new(conn)
///     .with_config(DbConfig::load("hookqb.toml")?)
///     .with_hook(TracingHook::new())
///     .with_memory_cache();
///
/// let active = db.table("users").where_eq("status", "active").remember(ttl).get().await?;
/// ```
pub struct Db<C> {
    conn: C,
    config: DbConfig,
    compiler: Compiler,
    soft_deletes: SoftDeletes,
    clock: Arc<dyn Clock>,
    user_hooks: Vec<Arc<dyn QueryHook>>,
    hooks: HookPipeline,
    cache: Option<Arc<dyn CacheStore>>,
    /// The cache is the built-in memory store and follows clock/config changes.
    memory_cache: bool,
}

impl<C: Connection> Db<C> {
    /// Wrap `conn` with the default configuration.
    pub fn new(conn: C) -> Self {
        let compiler = Compiler::new(conn.table_prefix());
        let config = DbConfig::default();
        let mut db = Self {
            conn,
            soft_deletes: SoftDeletes::from_config(&config.soft_deletes),
            config,
            compiler,
            clock: Arc::new(SystemClock),
            user_hooks: Vec::new(),
            hooks: HookPipeline::new(),
            cache: None,
            memory_cache: false,
        };
        db.rebuild_hooks();
        db
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: DbConfig) -> Self {
        self.soft_deletes = SoftDeletes::from_config(&config.soft_deletes);
        self.config = config;
        self.rebuild_hooks();
        self.rebuild_memory_cache();
        self
    }

    /// Add a hook. Hooks run after the built-in timestamps hook, in the order added.
    pub fn with_hook<H: QueryHook + 'static>(self, hook: H) -> Self {
        self.with_hook_arc(Arc::new(hook))
    }

    /// Add an Arc-wrapped hook.
    pub fn with_hook_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.user_hooks.push(hook);
        self.rebuild_hooks();
        self
    }

    /// Use `store` for reads that opt into caching.
    pub fn with_cache<S: CacheStore + 'static>(self, store: S) -> Self {
        self.with_cache_arc(Arc::new(store))
    }

    pub fn with_cache_arc(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(store);
        self.memory_cache = false;
        self
    }

    /// Use an in-memory store sized by the configured `cache.max_entries`.
    /// The store shares the database clock, including one set later.
    pub fn with_memory_cache(mut self) -> Self {
        self.memory_cache = true;
        self.rebuild_memory_cache();
        self
    }

    /// Use `clock` for timestamps and soft-delete markers.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.rebuild_hooks();
        self.rebuild_memory_cache();
        self
    }

    fn rebuild_memory_cache(&mut self) {
        if self.memory_cache {
            let store = MemoryStore::from_config(&self.config.cache).with_clock(self.clock.clone());
            self.cache = Some(Arc::new(store));
        }
    }

    fn rebuild_hooks(&mut self) {
        let mut hooks = HookPipeline::new();
        if self.config.timestamps.enabled {
            hooks = hooks.add(
                TimestampsHook::from_config(&self.config.timestamps).with_clock(self.clock.clone()),
            );
        }
        for hook in &self.user_hooks {
            hooks = hooks.add_arc(hook.clone());
        }
        self.hooks = hooks;
    }

    /// Start a query against `table` (unprefixed).
    pub fn table(&self, table: impl Into<String>) -> Builder<'_, C> {
        Builder::new(self, table.into())
    }

    /// Run raw SQL through the gateway after `#__` prefix substitution.
    pub async fn statement(&self, sql: &str, bindings: &[Value]) -> OrmResult<StatementResult> {
        self.gateway().statement(sql, bindings).await
    }

    /// Run raw SQL unprepared after `#__` prefix substitution.
    pub async fn unprepared(&self, sql: &str) -> OrmResult<bool> {
        self.gateway().unprepared(sql).await
    }

    /// Drop every cached read stored under `tag`. Returns how many entries were dropped.
    pub fn purge_tag(&self, tag: &str) -> usize {
        match &self.cache {
            Some(store) => store.purge_tag(tag),
            None => 0,
        }
    }

    /// Drop one cached read.
    pub fn forget(&self, key: &Fingerprint) -> bool {
        match &self.cache {
            Some(store) => store.forget(key),
            None => false,
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|store| store.stats())
    }

    pub fn gateway(&self) -> Gateway<'_, C> {
        Gateway::new(&self.conn)
    }
}

impl<C> Db<C> {
    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn hooks(&self) -> &HookPipeline {
        &self.hooks
    }

    pub fn soft_deletes(&self) -> &SoftDeletes {
        &self.soft_deletes
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn cache_store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.cache.as_ref()
    }

    /// Release the connection.
    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl<C> fmt::Debug for Db<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("config", &self.config)
            .field("prefix", &self.compiler.prefix())
            .field("hooks", &self.hooks)
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
