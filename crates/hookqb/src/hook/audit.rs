use super::{HookContext, HookEvent, QueryHook};
use crate::error::OrmResult;
use crate::value::Record;
use std::sync::{Mutex, PoisonError};

/// One recorded hook firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub event: HookEvent,
    pub table: String,
    pub tag: Option<String>,
    /// Payload columns for inserts and updates, empty otherwise.
    pub columns: Vec<String>,
}

/// Records every hook firing in memory.
#[derive(Debug, Default)]
pub struct AuditHook {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<HookEvent> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.event)
            .collect()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, ctx: &HookContext<'_>, columns: Vec<String>) {
        let entry = AuditEntry {
            event: ctx.event,
            table: ctx.table().to_string(),
            tag: ctx.tag().map(str::to_string),
            columns,
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

impl QueryHook for AuditHook {
    fn before_insert(&self, ctx: &HookContext<'_>, rows: Vec<Record>) -> OrmResult<Vec<Record>> {
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        self.record(ctx, columns);
        Ok(rows)
    }

    fn before_update(&self, ctx: &HookContext<'_>, values: Record) -> OrmResult<Record> {
        self.record(ctx, values.keys().cloned().collect());
        Ok(values)
    }

    fn before_delete(&self, ctx: &HookContext<'_>) -> OrmResult<()> {
        self.record(ctx, Vec::new());
        Ok(())
    }

    fn before_select(&self, ctx: &HookContext<'_>) -> OrmResult<()> {
        self.record(ctx, Vec::new());
        Ok(())
    }
}
