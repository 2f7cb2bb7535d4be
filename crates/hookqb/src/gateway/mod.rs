//! Statement dispatch.
//!
//! The gateway routes SQL to a [`Connection`] primitive by sniffing its
//! leading keyword. The sniff is textual and deliberately naive: the SQL is
//! trimmed, the first whitespace-delimited token is lower-cased and matched
//! against a fixed table. A leading comment or parenthesis is *not* skipped
//! and sends the statement down the generic route.
//!
//! | leading token | route |
//! |---|---|
//! | `delete` | [`Route::Delete`] |
//! | `update` | [`Route::Update`] |
//! | `insert` | [`Route::Insert`] |
//! | `select` | [`Route::Select`], or [`Route::Statement`] when the text matches `outfile\s` |
//! | `load` | [`Route::Unprepared`] |
//! | anything else | [`Route::Statement`] |

mod connection;


pub use connection::{Connection, DEFAULT_LAST_INSERT_ID_SQL};

use crate::compile::{CompiledStatement, substitute_prefix};
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use std::sync::OnceLock;

/// Classification of SQL text by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Delete,
    Update,
    Insert,
    Select,
    Load,
    /// Any other leading token.
    Other,
}

impl StatementKind {
    /// Sniff the leading keyword of `sql`, case-insensitively.
    pub fn sniff(sql: &str) -> Self {
        let first = sql.split_whitespace().next().unwrap_or("");
        if first.eq_ignore_ascii_case("delete") {
            StatementKind::Delete
        } else if first.eq_ignore_ascii_case("update") {
            StatementKind::Update
        } else if first.eq_ignore_ascii_case("insert") {
            StatementKind::Insert
        } else if first.eq_ignore_ascii_case("select") {
            StatementKind::Select
        } else if first.eq_ignore_ascii_case("load") {
            StatementKind::Load
        } else {
            StatementKind::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Delete => "delete",
            StatementKind::Update => "update",
            StatementKind::Insert => "insert",
            StatementKind::Select => "select",
            StatementKind::Load => "load",
            StatementKind::Other => "other",
        }
    }
}

/// The connection primitive a statement is executed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Delete,
    Update,
    Insert,
    /// Row-materializing read.
    Select,
    /// Generic parametrized statement (exports, DDL, dialect-specific SQL).
    Statement,
    /// Non-parametrized statement (bulk loads).
    Unprepared,
}

impl Route {
    /// Pick the route for `sql` (already prefix-substituted).
    pub fn for_sql(sql: &str) -> Self {
        match StatementKind::sniff(sql) {
            StatementKind::Delete => Route::Delete,
            StatementKind::Update => Route::Update,
            StatementKind::Insert => Route::Insert,
            StatementKind::Select if is_export(sql) => Route::Statement,
            StatementKind::Select => Route::Select,
            StatementKind::Load => Route::Unprepared,
            StatementKind::Other => Route::Statement,
        }
    }
}

/// Whether a SELECT writes its result to a file (`... into outfile '...'`).
pub fn is_export(sql: &str) -> bool {
    static OUTFILE_RE: OnceLock<regex::Regex> = OnceLock::new();
    OUTFILE_RE
        .get_or_init(|| regex::Regex::new(r"(?i)outfile\s").expect("invalid built-in outfile regex"))
        .is_match(sql)
}

/// What a dispatched statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    /// Materialized rows from a read.
    Rows(Vec<Row>),
    /// Affected-row count from an insert, update or delete.
    Affected(u64),
    /// Outcome of a generic or unprepared statement.
    Executed(bool),
}

impl StatementResult {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            StatementResult::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            StatementResult::Affected(n) => Some(*n),
            _ => None,
        }
    }

    /// Rows of a read; any other outcome is an error.
    pub fn into_rows(self) -> OrmResult<Vec<Row>> {
        match self {
            StatementResult::Rows(rows) => Ok(rows),
            other => Err(OrmError::Other(format!(
                "expected a row set, statement produced {other:?}"
            ))),
        }
    }

    /// Affected-row count of a write; any other outcome is an error.
    pub fn into_affected(self) -> OrmResult<u64> {
        match self {
            StatementResult::Affected(n) => Ok(n),
            other => Err(OrmError::Other(format!(
                "expected an affected-row count, statement produced {other:?}"
            ))),
        }
    }
}

/// Dispatches compiled or raw SQL onto a [`Connection`].
#[derive(Debug)]
pub struct Gateway<'a, C> {
    conn: &'a C,
}

impl<C> Clone for Gateway<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Gateway<'_, C> {}

impl<'a, C: Connection> Gateway<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'a C {
        self.conn
    }

    /// Execute a compiled statement. Its SQL is dispatched as-is.
    pub async fn execute(&self, stmt: &CompiledStatement) -> OrmResult<StatementResult> {
        self.dispatch(stmt.sql(), stmt.bindings()).await
    }

    /// Execute a compiled statement on the generic route without sniffing it.
    pub async fn execute_generic(&self, stmt: &CompiledStatement) -> OrmResult<bool> {
        tracing::debug!(
            target: "hookqb.gateway",
            route = ?Route::Statement,
            bindings = stmt.bindings().len(),
            "dispatch"
        );
        self.conn.statement(stmt.sql(), stmt.bindings()).await
    }

    /// Execute raw SQL: substitute the table prefix once, then dispatch.
    pub async fn statement(&self, sql: &str, bindings: &[Value]) -> OrmResult<StatementResult> {
        let sql = substitute_prefix(sql, self.conn.table_prefix());
        self.dispatch(&sql, bindings).await
    }

    /// Run SQL unprepared after prefix substitution.
    pub async fn unprepared(&self, sql: &str) -> OrmResult<bool> {
        let sql = substitute_prefix(sql, self.conn.table_prefix());
        tracing::debug!(target: "hookqb.gateway", route = ?Route::Unprepared, "dispatch");
        self.conn.unprepared(&sql).await
    }

    /// Insert and recover the generated identifier.
    ///
    /// When the driver reports no identifier inline, a secondary lookup runs
    /// on the same connection (`lookup_sql` overrides the driver's default).
    pub async fn insert_get_id(
        &self,
        stmt: &CompiledStatement,
        sequence: Option<&str>,
        lookup_sql: Option<&str>,
    ) -> OrmResult<Option<Value>> {
        if stmt.route() != Route::Insert {
            return Err(OrmError::validation(format!(
                "insert_get_id requires an insert statement, got `{}`",
                stmt.kind().as_str()
            )));
        }
        tracing::debug!(
            target: "hookqb.gateway",
            route = ?Route::Insert,
            bindings = stmt.bindings().len(),
            "dispatch insert_get_id"
        );
        let id = self
            .conn
            .insert_get_id(stmt.sql(), stmt.bindings(), sequence)
            .await?
            .filter(|v| !v.is_null());
        match id {
            Some(id) => Ok(Some(id)),
            None => {
                tracing::debug!(target: "hookqb.gateway", "insert reported no id; running fallback lookup");
                self.conn.last_insert_id(lookup_sql).await
            }
        }
    }

    /// Route `sql` by its leading keyword and run it.
    pub async fn dispatch(&self, sql: &str, bindings: &[Value]) -> OrmResult<StatementResult> {
        let route = Route::for_sql(sql);
        tracing::debug!(
            target: "hookqb.gateway",
            route = ?route,
            bindings = bindings.len(),
            "dispatch"
        );
        match route {
            Route::Delete => self.conn.delete(sql, bindings).await.map(StatementResult::Affected),
            Route::Update => self.conn.update(sql, bindings).await.map(StatementResult::Affected),
            Route::Insert => self.conn.insert(sql, bindings).await.map(StatementResult::Affected),
            Route::Select => self.conn.select(sql, bindings).await.map(StatementResult::Rows),
            Route::Unprepared => self.conn.unprepared(sql).await.map(StatementResult::Executed),
            Route::Statement => {
                let kind = StatementKind::sniff(sql);
                if kind == StatementKind::Other {
                    // Unrecognized leading keyword: run it as a generic statement.
                    tracing::warn!(
                        target: "hookqb.gateway",
                        leading = sql.split_whitespace().next().unwrap_or(""),
                        "statement kind not recognized; using generic route"
                    );
                }
                self.conn
                    .statement(sql, bindings)
                    .await
                    .map(StatementResult::Executed)
            }
        }
    }
}
