//! Lowering of [`QueryState`] into parametrized SQL.
//!
//! Every compile produces a fresh [`CompiledStatement`]; the query state is
//! only borrowed. Placeholders are positional `?` markers and bind values are
//! ordered to match them. Keywords are emitted in lower case.

mod render;


pub use render::render_inline;

use crate::error::{OrmError, OrmResult};
use crate::gateway::{Route, StatementKind};
use crate::query::{Column, Direction, Expr, Order, QueryState};
use crate::value::{Record, Value};

/// Placeholder token replaced with the table prefix in raw SQL.
pub const PREFIX_TOKEN: &str = "#__";

/// Replace every `#__` in `sql` with `prefix`.
///
/// A single left-to-right pass: text introduced by the prefix is never
/// rescanned, so a prefix that itself contains `#__` is inserted verbatim.
pub fn substitute_prefix(sql: &str, prefix: &str) -> String {
    if sql.contains(PREFIX_TOKEN) {
        sql.replace(PREFIX_TOKEN, prefix)
    } else {
        sql.to_string()
    }
}

/// An immutable `(sql, bindings)` pair ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    sql: String,
    bindings: Vec<Value>,
}

impl CompiledStatement {
    pub fn new(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.bindings)
    }

    /// Leading-keyword classification of the SQL text.
    pub fn kind(&self) -> StatementKind {
        StatementKind::sniff(&self.sql)
    }

    /// The gateway route this statement will take.
    pub fn route(&self) -> Route {
        Route::for_sql(&self.sql)
    }

    /// Human-readable SQL with bindings inlined. Display only, never execute it.
    pub fn to_query(&self) -> String {
        render_inline(&self.sql, &self.bindings)
    }
}

/// Lowers query state into SQL for one table prefix.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    prefix: String,
}

impl Compiler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix><table>` plus `as <alias>` when aliased.
    pub fn table_clause(&self, state: &QueryState) -> String {
        match &state.alias {
            Some(alias) => format!("{}{} as {}", self.prefix, state.table, alias),
            None => format!("{}{}", self.prefix, state.table),
        }
    }

    /// Name used to qualify columns of the base table: the alias if any.
    pub fn qualifier(&self, state: &QueryState) -> String {
        match &state.alias {
            Some(alias) => alias.clone(),
            None => format!("{}{}", self.prefix, state.table),
        }
    }

    pub fn compile_select(&self, state: &QueryState, scope: Option<&Expr>) -> CompiledStatement {
        let mut sql = String::from("select ");
        let mut bindings = Vec::new();
        self.push_columns(state, &mut sql);
        sql.push_str(" from ");
        sql.push_str(&self.table_clause(state));
        self.push_joins(state, &mut sql);
        self.push_wheres(state, scope, &mut sql, &mut bindings);
        self.push_orders(state, &mut sql);
        if let Some(limit) = state.limit {
            sql.push_str(&format!(" limit {limit}"));
        }
        if let Some(offset) = state.offset {
            sql.push_str(&format!(" offset {offset}"));
        }
        CompiledStatement::new(sql, bindings)
    }

    pub fn compile_exists(&self, state: &QueryState, scope: Option<&Expr>) -> CompiledStatement {
        let (inner, bindings) = self.compile_select(state, scope).into_parts();
        CompiledStatement::new(format!("select exists({inner}) as result"), bindings)
    }

    /// `count(*)` over the filtered rows; ordering and paging are dropped.
    pub fn compile_count(&self, state: &QueryState, scope: Option<&Expr>) -> CompiledStatement {
        let mut sql = String::from("select count(*) as aggregate from ");
        let mut bindings = Vec::new();
        sql.push_str(&self.table_clause(state));
        self.push_joins(state, &mut sql);
        self.push_wheres(state, scope, &mut sql, &mut bindings);
        CompiledStatement::new(sql, bindings)
    }

    /// Multi-row insert. All rows must carry the same column set.
    pub fn compile_insert(&self, state: &QueryState, rows: &[Record]) -> OrmResult<CompiledStatement> {
        let Some(first) = rows.first() else {
            return Err(OrmError::validation("insert requires at least one row"));
        };
        if first.is_empty() {
            return Err(OrmError::validation("insert requires at least one column"));
        }
        for (i, row) in rows.iter().enumerate().skip(1) {
            if row.len() != first.len() || !row.keys().eq(first.keys()) {
                return Err(OrmError::validation(format!(
                    "insert row {i} has a different column set than row 0"
                )));
            }
        }

        let columns: Vec<&str> = first.keys().map(String::as_str).collect();
        let tuple = format!("({})", vec!["?"; columns.len()].join(", "));

        let mut sql = format!(
            "insert into {}{} ({}) values ",
            self.prefix,
            state.table,
            columns.join(", ")
        );
        let mut bindings = Vec::with_capacity(columns.len() * rows.len());
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&tuple);
            bindings.extend(row.values().cloned());
        }
        Ok(CompiledStatement::new(sql, bindings))
    }

    /// UPDATE of the filtered rows. SET bindings precede WHERE bindings.
    pub fn compile_update(
        &self,
        state: &QueryState,
        values: &Record,
        scope: Option<&Expr>,
    ) -> OrmResult<CompiledStatement> {
        if values.is_empty() {
            return Err(OrmError::validation("update requires at least one column"));
        }
        let mut sql = format!("update {} set ", self.table_clause(state));
        let mut bindings = Vec::with_capacity(values.len());
        for (i, (column, value)) in values.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column);
            sql.push_str(" = ?");
            bindings.push(value.clone());
        }
        self.push_wheres(state, scope, &mut sql, &mut bindings);
        Ok(CompiledStatement::new(sql, bindings))
    }

    pub fn compile_delete(&self, state: &QueryState, scope: Option<&Expr>) -> CompiledStatement {
        let mut sql = format!("delete from {}", self.table_clause(state));
        let mut bindings = Vec::new();
        self.push_wheres(state, scope, &mut sql, &mut bindings);
        CompiledStatement::new(sql, bindings)
    }

    pub fn compile_truncate(&self, state: &QueryState) -> CompiledStatement {
        CompiledStatement::new(format!("truncate table {}{}", self.prefix, state.table), Vec::new())
    }

    fn push_columns(&self, state: &QueryState, sql: &mut String) {
        if state.columns.is_empty() {
            sql.push('*');
            return;
        }
        for (i, column) in state.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            match column {
                Column::Name(name) => sql.push_str(name),
                Column::Raw(raw) => sql.push_str(&substitute_prefix(raw, &self.prefix)),
            }
        }
    }

    fn push_joins(&self, state: &QueryState, sql: &mut String) {
        for join in &state.joins {
            sql.push(' ');
            sql.push_str(join.kind.as_sql());
            sql.push(' ');
            sql.push_str(&self.prefix);
            sql.push_str(&join.table);
            sql.push_str(" on ");
            sql.push_str(&substitute_prefix(&join.on, &self.prefix));
        }
    }

    fn push_wheres(
        &self,
        state: &QueryState,
        scope: Option<&Expr>,
        sql: &mut String,
        bindings: &mut Vec<Value>,
    ) {
        let wheres = &state.wheres;
        if wheres.is_empty() && scope.is_none() {
            return;
        }
        sql.push_str(" where ");
        if !wheres.is_empty() {
            // A top-level `or` must not swallow the scope predicate.
            let wrap = scope.is_some() && wheres.has_or();
            if wrap {
                sql.push('(');
            }
            wheres.build(&self.prefix, sql, bindings);
            if wrap {
                sql.push(')');
            }
        }
        if let Some(scope) = scope {
            if !wheres.is_empty() {
                sql.push_str(" and ");
            }
            scope.build(&self.prefix, sql, bindings);
        }
    }

    fn push_orders(&self, state: &QueryState, sql: &mut String) {
        if state.orders.is_empty() {
            return;
        }
        sql.push_str(" order by ");
        for (i, order) in state.orders.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            match order {
                Order::Column(column, Direction::Asc) => {
                    sql.push_str(column);
                    sql.push_str(" asc");
                }
                Order::Column(column, Direction::Desc) => {
                    sql.push_str(column);
                    sql.push_str(" desc");
                }
                Order::Raw(raw) => sql.push_str(&substitute_prefix(raw, &self.prefix)),
            }
        }
    }
}
