//! Connection pool utilities

use crate::error::{OrmError, OrmResult};
use crate::gateway::Connection;
use crate::pg::{PG_LAST_INSERT_ID_SQL, pg_batch, pg_execute, pg_insert_get_id, pg_select};
use crate::row::Row;
use crate::value::Value;
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
use tokio_postgres::NoTls;
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Create a connection pool from a database URL.
///
/// Uses `NoTls` and a maximum of 16 connections. Use
/// [`create_pool_with_manager_config`] to bring a TLS connector or tune the pool.
pub fn create_pool(database_url: &str) -> OrmResult<Pool> {
    create_pool_with_config(database_url, 16)
}

/// Create a connection pool with a custom maximum size.
pub fn create_pool_with_config(database_url: &str, max_size: usize) -> OrmResult<Pool> {
    create_pool_with_manager_config(database_url, NoTls, default_manager_config(), |builder| {
        builder.max_size(max_size)
    })
}

/// Create a connection pool with an injected TLS connector, `ManagerConfig` and `PoolBuilder` tuning.
pub fn create_pool_with_manager_config<T>(
    database_url: &str,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> OrmResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| OrmError::Connection(e.to_string()))?;

    let mgr = Manager::from_config(pg_config, tls, manager_config);
    configure_pool(Pool::builder(mgr))
        .build()
        .map_err(|e| OrmError::Pool(e.to_string()))
}

fn default_manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}

/// A [`Connection`] that checks a client out of a pool for every call.
///
/// Each call may land on a different session. Generated identifiers are
/// therefore read inline with `returning`; the session-scoped
/// [`Connection::last_insert_id`] lookup only sees the checked-out session
/// and is unreliable here.
#[derive(Clone)]
pub struct PoolConnection {
    pool: Pool,
    table_prefix: String,
}

impl PoolConnection {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            table_prefix: String::new(),
        }
    }

    /// Connect with [`create_pool`].
    pub fn connect(database_url: &str) -> OrmResult<Self> {
        Ok(Self::new(create_pool(database_url)?))
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl std::fmt::Debug for PoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnection")
            .field("status", &self.pool.status())
            .field("table_prefix", &self.table_prefix)
            .finish()
    }
}

impl Connection for PoolConnection {
    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    async fn select(&self, sql: &str, bindings: &[Value]) -> OrmResult<Vec<Row>> {
        let obj = self.pool.get().await?;
        let client: &tokio_postgres::Client = &obj;
        pg_select(client, sql, bindings).await
    }

    async fn insert(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        let obj = self.pool.get().await?;
        let client: &tokio_postgres::Client = &obj;
        pg_execute(client, sql, bindings).await
    }

    async fn insert_get_id(
        &self,
        sql: &str,
        bindings: &[Value],
        sequence: Option<&str>,
    ) -> OrmResult<Option<Value>> {
        let obj = self.pool.get().await?;
        let client: &tokio_postgres::Client = &obj;
        pg_insert_get_id(client, sql, bindings, sequence).await
    }

    async fn update(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        let obj = self.pool.get().await?;
        let client: &tokio_postgres::Client = &obj;
        pg_execute(client, sql, bindings).await
    }

    async fn delete(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        let obj = self.pool.get().await?;
        let client: &tokio_postgres::Client = &obj;
        pg_execute(client, sql, bindings).await
    }

    async fn statement(&self, sql: &str, bindings: &[Value]) -> OrmResult<bool> {
        let obj = self.pool.get().await?;
        let client: &tokio_postgres::Client = &obj;
        pg_execute(client, sql, bindings).await?;
        Ok(true)
    }

    async fn unprepared(&self, sql: &str) -> OrmResult<bool> {
        let obj = self.pool.get().await?;
        let client: &tokio_postgres::Client = &obj;
        pg_batch(client, sql).await
    }

    async fn last_insert_id(&self, lookup_sql: Option<&str>) -> OrmResult<Option<Value>> {
        let obj = self.pool.get().await?;
        let client: &tokio_postgres::Client = &obj;
        let rows = pg_select(client, lookup_sql.unwrap_or(PG_LAST_INSERT_ID_SQL), &[]).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_values().into_iter().next())
            .filter(|v| !v.is_null()))
    }
}
