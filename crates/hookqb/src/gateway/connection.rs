//! The connection surface the gateway dispatches onto.

use crate::error::OrmResult;
use crate::row::Row;
use crate::value::Value;

/// Statement used by the default [`Connection::last_insert_id`] lookup.
pub const DEFAULT_LAST_INSERT_ID_SQL: &str = "select last_insert_id() as id";

/// Execution primitives provided by a database driver.
///
/// SQL handed to these methods uses `?` placeholders with `bindings` in
/// placeholder order; drivers with another placeholder syntax translate it.
/// Implementations may be shared across many builders; each call is one
/// atomic round trip from the caller's point of view.
pub trait Connection: Send + Sync {
    /// Prefix substituted for `#__` and prepended to table names.
    fn table_prefix(&self) -> &str {
        ""
    }

    /// Run a read and materialize its rows.
    fn select(
        &self,
        sql: &str,
        bindings: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Run an insert and return the affected row count.
    fn insert(
        &self,
        sql: &str,
        bindings: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Run an insert and return the generated identifier, if the driver reports one inline.
    ///
    /// The default implementation runs [`Connection::insert`] and reports no identifier,
    /// which makes the gateway fall back to [`Connection::last_insert_id`].
    fn insert_get_id(
        &self,
        sql: &str,
        bindings: &[Value],
        sequence: Option<&str>,
    ) -> impl std::future::Future<Output = OrmResult<Option<Value>>> + Send {
        let _ = sequence;
        async move {
            self.insert(sql, bindings).await?;
            Ok(None)
        }
    }

    /// Run an update and return the affected row count.
    fn update(
        &self,
        sql: &str,
        bindings: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Run a delete and return the affected row count.
    fn delete(
        &self,
        sql: &str,
        bindings: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Run any other parametrized statement.
    fn statement(
        &self,
        sql: &str,
        bindings: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<bool>> + Send;

    /// Run SQL without preparing it (no bindings).
    fn unprepared(&self, sql: &str) -> impl std::future::Future<Output = OrmResult<bool>> + Send;

    /// Secondary lookup of the last generated identifier on this connection.
    ///
    /// Runs `lookup_sql` (or [`DEFAULT_LAST_INSERT_ID_SQL`]) and returns the first
    /// column of the first row.
    fn last_insert_id(
        &self,
        lookup_sql: Option<&str>,
    ) -> impl std::future::Future<Output = OrmResult<Option<Value>>> + Send {
        async move {
            let sql = lookup_sql.unwrap_or(DEFAULT_LAST_INSERT_ID_SQL);
            let rows = self.select(sql, &[]).await?;
            Ok(rows
                .into_iter()
                .next()
                .and_then(|row| row.into_values().into_iter().next())
                .filter(|v| !v.is_null()))
        }
    }
}

impl<C: Connection> Connection for &C {
    fn table_prefix(&self) -> &str {
        (**self).table_prefix()
    }

    async fn select(&self, sql: &str, bindings: &[Value]) -> OrmResult<Vec<Row>> {
        (**self).select(sql, bindings).await
    }

    async fn insert(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        (**self).insert(sql, bindings).await
    }

    async fn insert_get_id(
        &self,
        sql: &str,
        bindings: &[Value],
        sequence: Option<&str>,
    ) -> OrmResult<Option<Value>> {
        (**self).insert_get_id(sql, bindings, sequence).await
    }

    async fn update(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        (**self).update(sql, bindings).await
    }

    async fn delete(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        (**self).delete(sql, bindings).await
    }

    async fn statement(&self, sql: &str, bindings: &[Value]) -> OrmResult<bool> {
        (**self).statement(sql, bindings).await
    }

    async fn unprepared(&self, sql: &str) -> OrmResult<bool> {
        (**self).unprepared(sql).await
    }

    async fn last_insert_id(&self, lookup_sql: Option<&str>) -> OrmResult<Option<Value>> {
        (**self).last_insert_id(lookup_sql).await
    }
}
