//! The chainable query builder.
//!
//! Every operation runs the same pipeline: hooks first, then the compiler,
//! then the gateway. Reads may go through the cache and always carry the
//! soft-delete scope unless it was switched off for the query.

use crate::cache::{Fingerprint, read_through};
use crate::compile::CompiledStatement;
use crate::conditions::Conditions;
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::gateway::Connection;
use crate::paginate::RowPages;
use crate::query::{Column, Conjunction, Direction, Expr, ExprGroup, Join, JoinKind, Order, QueryState};
use crate::row::{FromRow, Row};
use crate::soft_delete::{SoftDeletes, TrashedMode};
use crate::value::{Record, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A query against one table of a [`Db`].
///
/// Clause methods consume and return the builder so calls compose left to
/// right. Execution methods borrow it, so one builder can run several
/// operations; each runs the hooks afresh.
///
/// # Example
/// ```ignore
/// let rows = db
///     .table("users")
///     .alias("u")
///     .select(["u.id", "u.name"])
///     .where_eq("u.status", "active")
///     .where_in("u.role", ["admin", "editor"])
///     .latest("u.created_at")
///     .limit(20)
///     .get()
///     .await?;
/// ```
pub struct Builder<'a, C> {
    db: &'a Db<C>,
    state: QueryState,
    soft_deletes: SoftDeletes,
    cache_ttl: Option<Duration>,
}

impl<C> Clone for Builder<'_, C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db,
            state: self.state.clone(),
            soft_deletes: self.soft_deletes.clone(),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl<C> fmt::Debug for Builder<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("state", &self.state)
            .field("soft_deletes", &self.soft_deletes)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl<'a, C: Connection> Builder<'a, C> {
    pub(crate) fn new(db: &'a Db<C>, table: String) -> Self {
        Self {
            db,
            state: QueryState::new(table),
            soft_deletes: db.soft_deletes().clone(),
            cache_ttl: None,
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    // ==================== table ====================

    /// Alias the table: `<table> as <name>`. A second call replaces the first.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.state.set_alias(name);
        self
    }

    /// Same as [`Builder::alias`].
    pub fn as_(self, name: impl Into<String>) -> Self {
        self.alias(name)
    }

    /// Tag the query for cache purging and hook context.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.state.tag = Some(tag.into());
        self
    }

    // ==================== select ====================

    /// Replace the selected columns.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.columns = columns.into_iter().map(|c| Column::Name(c.into())).collect();
        self
    }

    /// Append one selected column.
    pub fn add_select(mut self, column: impl Into<String>) -> Self {
        self.state.columns.push(Column::Name(column.into()));
        self
    }

    /// Append a raw select expression (`#__` receives the prefix).
    pub fn select_raw(mut self, expr: impl Into<String>) -> Self {
        self.state.columns.push(Column::Raw(expr.into()));
        self
    }

    // ==================== where ====================

    fn push(mut self, conjunction: Conjunction, expr: Expr) -> Self {
        self.state.wheres_mut().push(conjunction, expr);
        self
    }

    /// `column <op> ?`
    pub fn where_op(self, column: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Conjunction::And, Expr::compare(column, op, value))
    }

    /// `or column <op> ?`
    pub fn or_where(self, column: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Conjunction::Or, Expr::compare(column, op, value))
    }

    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, "=", value)
    }

    pub fn where_ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, "!=", value)
    }

    pub fn where_gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, ">", value)
    }

    pub fn where_gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, ">=", value)
    }

    pub fn where_lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, "<", value)
    }

    pub fn where_lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, "<=", value)
    }

    pub fn where_like(self, column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.where_op(column, "like", pattern)
    }

    pub fn where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let expr = Expr::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        };
        self.push(Conjunction::And, expr)
    }

    pub fn where_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let expr = Expr::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        };
        self.push(Conjunction::And, expr)
    }

    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.push(Conjunction::And, Expr::is_null(column))
    }

    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        self.push(Conjunction::And, Expr::is_not_null(column))
    }

    pub fn where_between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        let expr = Expr::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
        };
        self.push(Conjunction::And, expr)
    }

    /// Raw predicate with positional `?` bindings; `#__` receives the prefix.
    pub fn where_raw(self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.push(Conjunction::And, Expr::raw(sql, bindings))
    }

    pub fn or_where_raw(self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.push(Conjunction::Or, Expr::raw(sql, bindings))
    }

    /// Parenthesized sub-group joined with `and`.
    ///
    /// ```ignore
    /// db.table("t").where_eq("a", 1).where_group(|g| {
    ///     g.and(Expr::eq("b", 2)).or(Expr::eq("c", 3));
    /// });
    /// // where a = ? and (b = ? or c = ?)
    /// ```
    pub fn where_group(self, f: impl FnOnce(&mut ExprGroup)) -> Self {
        let mut group = ExprGroup::new();
        f(&mut group);
        if group.is_empty() {
            return self;
        }
        self.push(Conjunction::And, Expr::Group(group))
    }

    /// Parenthesized sub-group joined with `or`.
    pub fn or_where_group(self, f: impl FnOnce(&mut ExprGroup)) -> Self {
        let mut group = ExprGroup::new();
        f(&mut group);
        if group.is_empty() {
            return self;
        }
        self.push(Conjunction::Or, Expr::Group(group))
    }

    /// Associative conditions lowered to one raw predicate.
    ///
    /// `bindings` follow the bindings produced by `conditions`; they serve
    /// placeholders written into raw entries.
    pub fn where_with(self, conditions: Conditions, bindings: Vec<Value>) -> Self {
        let (sql, mut lowered) = conditions.to_sql();
        lowered.extend(bindings);
        self.where_raw(sql, lowered)
    }

    // ==================== join ====================

    fn join_kind(mut self, kind: JoinKind, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.state.joins.push(Join {
            kind,
            table: table.into(),
            on: on.into(),
        });
        self
    }

    /// `inner join <prefix><table> on <on>`.
    pub fn join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.join_kind(JoinKind::Inner, table, on)
    }

    pub fn left_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.join_kind(JoinKind::Left, table, on)
    }

    pub fn right_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.join_kind(JoinKind::Right, table, on)
    }

    // ==================== order / paging ====================

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.state.orders.push(Order::Column(column.into(), Direction::Asc));
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.state.orders.push(Order::Column(column.into(), Direction::Desc));
        self
    }

    pub fn order_by_raw(mut self, sql: impl Into<String>) -> Self {
        self.state.orders.push(Order::Raw(sql.into()));
        self
    }

    /// Newest first.
    pub fn latest(self, column: impl Into<String>) -> Self {
        self.order_by_desc(column)
    }

    /// Oldest first.
    pub fn oldest(self, column: impl Into<String>) -> Self {
        self.order_by(column)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.state.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.state.offset = Some(offset);
        self
    }

    /// Limit and offset for a 1-based page. Zero is treated as one.
    pub fn for_page(mut self, page: u64, per_page: u64) -> Self {
        self.state.set_page(page, per_page);
        self
    }

    // ==================== soft deletes / cache ====================

    /// Include soft-deleted rows.
    pub fn with_trashed(mut self) -> Self {
        self.state.trashed = TrashedMode::With;
        self
    }

    /// Only soft-deleted rows.
    pub fn only_trashed(mut self) -> Self {
        self.state.trashed = TrashedMode::Only;
        self
    }

    /// Switch soft deletes off for this query: no read scope, physical deletes.
    pub fn without_soft_deletes(mut self) -> Self {
        self.soft_deletes = SoftDeletes::disabled();
        self
    }

    /// Cache reads of this query for `ttl`.
    pub fn remember(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Cache reads of this query for the configured default time-to-live.
    pub fn cache(self) -> Self {
        let ttl = self.db.config().cache.default_ttl();
        self.remember(ttl)
    }

    // ==================== compile ====================

    fn read_scope(&self, state: &QueryState) -> Option<Expr> {
        let qualifier = self.db.compiler().qualifier(state);
        self.soft_deletes.read_scope(&qualifier, state.trashed)
    }

    fn compile_select(&self, state: &QueryState) -> CompiledStatement {
        let scope = self.read_scope(state);
        self.db.compiler().compile_select(state, scope.as_ref())
    }

    /// The compiled read, without firing hooks.
    pub fn to_statement(&self) -> CompiledStatement {
        self.compile_select(&self.state)
    }

    /// The SQL template of the read, without firing hooks.
    pub fn to_sql(&self) -> String {
        self.to_statement().into_parts().0
    }

    /// The read with bindings inlined. Fires `before-select`. Display only.
    pub fn to_query(&self) -> OrmResult<String> {
        self.db.hooks().fire_select(&self.state)?;
        Ok(self.to_statement().to_query())
    }

    /// Cache key of the read as it would be stored by [`Builder::remember`].
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.to_statement(), self.state.tag())
    }

    // ==================== reads ====================

    /// Fire `before-select` for `state`, compile and run it, honouring the cache.
    async fn read(&self, state: &QueryState) -> OrmResult<Vec<Row>> {
        self.db.hooks().fire_select(state)?;
        let stmt = self.compile_select(state);
        let gateway = self.db.gateway();
        match (self.cache_ttl, self.db.cache_store()) {
            (Some(ttl), Some(store)) => {
                let key = Fingerprint::of(&stmt, state.tag());
                let stmt = &stmt;
                let rows = read_through(store.as_ref(), key, ttl, state.tag(), move || async move {
                    gateway.execute(stmt).await?.into_rows()
                })
                .await?;
                Ok(Arc::unwrap_or_clone(rows))
            }
            _ => gateway.execute(&stmt).await?.into_rows(),
        }
    }

    /// One page of rows, never cached. Pages are laid over the builder's own
    /// offset and limit; `None` once the page starts past that limit.
    pub(crate) async fn fetch_page(&self, page: u64, per_page: u64) -> OrmResult<Option<Vec<Row>>> {
        let per_page = per_page.max(1);
        let start = (page.max(1) - 1).saturating_mul(per_page);
        let mut take = per_page;
        if let Some(limit) = self.state.limit {
            if start >= limit {
                return Ok(None);
            }
            take = take.min(limit - start);
        }
        let mut state = self.state.clone();
        state.limit = Some(take);
        state.offset = Some(self.state.offset.unwrap_or(0).saturating_add(start));
        self.db.hooks().fire_select(&state)?;
        let stmt = self.compile_select(&state);
        self.db.gateway().execute(&stmt).await?.into_rows().map(Some)
    }

    /// Run the read.
    pub async fn get(&self) -> OrmResult<Vec<Row>> {
        self.read(&self.state).await
    }

    /// Run the read and map every row.
    pub async fn get_as<T: FromRow>(&self) -> OrmResult<Vec<T>> {
        self.get().await?.iter().map(T::from_row).collect()
    }

    /// The first row, if any.
    pub async fn first(&self) -> OrmResult<Option<Row>> {
        let mut state = self.state.clone();
        state.limit = Some(1);
        Ok(self.read(&state).await?.into_iter().next())
    }

    /// The first row, or [`OrmError::NotFound`].
    pub async fn first_or_fail(&self) -> OrmResult<Row> {
        self.first()
            .await?
            .ok_or_else(|| OrmError::not_found(format!("no rows in {}", self.state.table())))
    }

    /// The row whose `id` equals `id`.
    pub async fn find(&self, id: impl Into<Value>) -> OrmResult<Option<Row>> {
        self.clone().where_eq("id", id).first().await
    }

    /// Values of one column.
    pub async fn pluck(&self, column: impl Into<String>) -> OrmResult<Vec<Value>> {
        let mut state = self.state.clone();
        state.columns = vec![Column::Name(column.into())];
        let rows = self.read(&state).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_values().into_iter().next().unwrap_or(Value::Null))
            .collect())
    }

    /// One column of the first row.
    pub async fn value(&self, column: impl Into<String>) -> OrmResult<Option<Value>> {
        let mut state = self.state.clone();
        state.columns = vec![Column::Name(column.into())];
        state.limit = Some(1);
        let rows = self.read(&state).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_values().into_iter().next()))
    }

    /// Number of matching rows. Never cached.
    pub async fn count(&self) -> OrmResult<u64> {
        self.db.hooks().fire_select(&self.state)?;
        let scope = self.read_scope(&self.state);
        let stmt = self.db.compiler().compile_count(&self.state, scope.as_ref());
        let rows = self.db.gateway().execute(&stmt).await?.into_rows()?;
        let count = rows
            .first()
            .and_then(|row| row.get_index(0))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Whether any row matches. Never cached.
    pub async fn exists(&self) -> OrmResult<bool> {
        self.db.hooks().fire_select(&self.state)?;
        let scope = self.read_scope(&self.state);
        let stmt = self.db.compiler().compile_exists(&self.state, scope.as_ref());
        let rows = self.db.gateway().execute(&stmt).await?.into_rows()?;
        Ok(rows
            .first()
            .and_then(|row| row.get_index(0))
            .is_some_and(Value::is_truthy))
    }

    /// Iterate the read lazily, one page of `page_size` rows at a time.
    pub fn lazy(self, page_size: u64) -> RowPages<'a, C> {
        RowPages::new(self, page_size)
    }

    // ==================== writes ====================

    /// Insert rows. Every row must carry the same columns; an empty input is a no-op.
    pub async fn insert(&self, rows: Vec<Record>) -> OrmResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let rows = self.db.hooks().fire_insert(&self.state, rows)?;
        let stmt = self.db.compiler().compile_insert(&self.state, &rows)?;
        self.db.gateway().execute(&stmt).await?.into_affected()
    }

    pub async fn insert_one(&self, record: Record) -> OrmResult<u64> {
        self.insert(vec![record]).await
    }

    /// Insert one row and return its generated identifier.
    ///
    /// When the driver does not report the identifier inline, a secondary
    /// lookup runs (`DbConfig::last_insert_id_sql` overrides its SQL).
    pub async fn insert_get_id(&self, record: Record, sequence: Option<&str>) -> OrmResult<Option<Value>> {
        let mut rows = self.db.hooks().fire_insert(&self.state, vec![record])?;
        if rows.len() != 1 {
            return Err(OrmError::validation(format!(
                "insert_get_id expects exactly one row after hooks, got {}",
                rows.len()
            )));
        }
        let record = rows.remove(0);
        let stmt = self
            .db
            .compiler()
            .compile_insert(&self.state, std::slice::from_ref(&record))?;
        let lookup = self.db.config().last_insert_id_sql.as_deref();
        self.db.gateway().insert_get_id(&stmt, sequence, lookup).await
    }

    /// Update the matching rows.
    pub async fn update(&self, values: Record) -> OrmResult<u64> {
        let values = self.db.hooks().fire_update(&self.state, values)?;
        let scope = self.write_scope();
        let stmt = self
            .db
            .compiler()
            .compile_update(&self.state, &values, scope.as_ref())?;
        self.db.gateway().execute(&stmt).await?.into_affected()
    }

    /// Delete the matching rows.
    ///
    /// With soft deletes enabled this stamps the deletion marker on rows that
    /// do not carry it yet instead of removing them. `before-delete` fires
    /// either way; `before-update` does not. Soft-deleting rows that are
    /// already trashed (`only_trashed`) is rejected.
    pub async fn delete(&self) -> OrmResult<u64> {
        if self.soft_deletes.is_enabled() && self.state.trashed == TrashedMode::Only {
            return Err(OrmError::validation(format!(
                "delete on only-trashed {} would match no rows; use force_delete",
                self.state.table()
            )));
        }
        self.db.hooks().fire_delete(&self.state)?;
        let stmt = if self.soft_deletes.is_enabled() {
            let values = self.soft_deletes.deleted_values(self.db.clock().now());
            let scope = self.read_scope_for(TrashedMode::Without);
            self.db
                .compiler()
                .compile_update(&self.state, &values, scope.as_ref())?
        } else {
            self.db.compiler().compile_delete(&self.state, None)
        };
        self.db.gateway().execute(&stmt).await?.into_affected()
    }

    /// Physically delete the matching rows. Only `only_trashed` narrows the
    /// match to soft-deleted rows.
    pub async fn force_delete(&self) -> OrmResult<u64> {
        self.db.hooks().fire_delete(&self.state)?;
        let scope = self.write_scope();
        let stmt = self.db.compiler().compile_delete(&self.state, scope.as_ref());
        self.db.gateway().execute(&stmt).await?.into_affected()
    }

    /// Clear the deletion marker of matching soft-deleted rows.
    pub async fn restore(&self) -> OrmResult<u64> {
        if !self.soft_deletes.is_enabled() {
            return Err(OrmError::validation(format!(
                "restore on {} requires soft deletes",
                self.state.table()
            )));
        }
        let values = self
            .db
            .hooks()
            .fire_update(&self.state, self.soft_deletes.restored_values())?;
        let scope = self.read_scope_for(TrashedMode::Only);
        let stmt = self
            .db
            .compiler()
            .compile_update(&self.state, &values, scope.as_ref())?;
        self.db.gateway().execute(&stmt).await?.into_affected()
    }

    /// Empty the table. Fires `before-delete`; runs on the generic route.
    pub async fn truncate(&self) -> OrmResult<bool> {
        self.db.hooks().fire_delete(&self.state)?;
        let stmt = self.db.compiler().compile_truncate(&self.state);
        self.db.gateway().execute_generic(&stmt).await
    }

    fn read_scope_for(&self, mode: TrashedMode) -> Option<Expr> {
        let qualifier = self.db.compiler().qualifier(&self.state);
        self.soft_deletes.read_scope(&qualifier, mode)
    }

    /// Writes stay unscoped unless the builder asked for trashed rows only.
    fn write_scope(&self) -> Option<Expr> {
        match self.state.trashed {
            TrashedMode::Only => self.read_scope_for(TrashedMode::Only),
            TrashedMode::Without | TrashedMode::With => None,
        }
    }
}
