use super::{HookContext, QueryHook};
use crate::clock::{Clock, SystemClock};
use crate::config::TimestampConfig;
use crate::error::OrmResult;
use crate::value::{Record, Value};
use std::sync::Arc;

/// Stamps creation and modification times onto write payloads.
///
/// Inserts receive both columns, updates only the modification column.
/// A column the caller already set is left alone.
#[derive(Clone)]
pub struct TimestampsHook {
    created_at: String,
    updated_at: String,
    clock: Arc<dyn Clock>,
}

impl TimestampsHook {
    pub fn new(created_at: impl Into<String>, updated_at: impl Into<String>) -> Self {
        Self {
            created_at: created_at.into(),
            updated_at: updated_at.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &TimestampConfig) -> Self {
        Self::new(config.created_at.clone(), config.updated_at.clone())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }
}

impl Default for TimestampsHook {
    fn default() -> Self {
        Self::new("created_at", "updated_at")
    }
}

impl std::fmt::Debug for TimestampsHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampsHook")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

impl QueryHook for TimestampsHook {
    fn before_insert(&self, _ctx: &HookContext<'_>, mut rows: Vec<Record>) -> OrmResult<Vec<Record>> {
        let now = Value::Timestamp(self.clock.now());
        for row in &mut rows {
            row.entry(self.created_at.clone()).or_insert_with(|| now.clone());
            row.entry(self.updated_at.clone()).or_insert_with(|| now.clone());
        }
        Ok(rows)
    }

    fn before_update(&self, _ctx: &HookContext<'_>, mut values: Record) -> OrmResult<Record> {
        values
            .entry(self.updated_at.clone())
            .or_insert_with(|| Value::Timestamp(self.clock.now()));
        Ok(values)
    }
}
