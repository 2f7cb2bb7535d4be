use super::{HookContext, QueryHook, truncate_bytes};
use crate::error::OrmResult;
use crate::value::Record;
use tracing::Level;

/// A `tracing`-based hook that logs every operation before it is compiled.
///
/// Each event carries the hook point, the table, the tag and the predicate
/// template (placeholders only, never bound values).
#[derive(Debug, Clone)]
pub struct TracingHook {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long predicates (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingHook {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    fn emit(&self, ctx: &HookContext<'_>, columns: &[&str]) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let (predicate, bindings) = ctx.state.wheres().to_sql("");
        let predicate = self.truncate(&predicate);
        let tag = ctx.tag().unwrap_or("-");
        let table = ctx.table();
        let event = ctx.event.as_str();
        emit_at_level!(
            self.level,
            target: "hookqb.sql",
            event,
            table,
            tag,
            param_count = bindings.len(),
            predicate = %predicate,
            columns = ?columns,
        );
    }
}

impl QueryHook for TracingHook {
    fn before_insert(&self, ctx: &HookContext<'_>, rows: Vec<Record>) -> OrmResult<Vec<Record>> {
        let columns: Vec<&str> = rows
            .first()
            .map(|r| r.keys().map(String::as_str).collect())
            .unwrap_or_default();
        self.emit(ctx, &columns);
        Ok(rows)
    }

    fn before_update(&self, ctx: &HookContext<'_>, values: Record) -> OrmResult<Record> {
        let columns: Vec<&str> = values.keys().map(String::as_str).collect();
        self.emit(ctx, &columns);
        Ok(values)
    }

    fn before_delete(&self, ctx: &HookContext<'_>) -> OrmResult<()> {
        self.emit(ctx, &[]);
        Ok(())
    }

    fn before_select(&self, ctx: &HookContext<'_>) -> OrmResult<()> {
        self.emit(ctx, &[]);
        Ok(())
    }
}
