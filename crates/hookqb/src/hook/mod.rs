//! Lifecycle hooks.
//!
//! Four extension points fire before a statement is compiled:
//!
//! - `before-insert` may rewrite or reject the rows to insert.
//! - `before-update` may rewrite or reject the assignments.
//! - `before-delete` fires for its side effects only, even when the delete
//!   is later rewritten into a soft-delete update.
//! - `before-select` fires before every read, for auditing only.
//!
//! Hooks see the query state read-only. Returning an error aborts the
//! operation before any SQL is issued.

mod audit;
mod timestamps;
mod tracing_hook;

#[cfg(test)]
mod tests;

pub use audit::{AuditEntry, AuditHook};
pub use timestamps::TimestampsHook;
pub use tracing_hook::TracingHook;

use crate::error::OrmResult;
use crate::query::QueryState;
use crate::value::Record;
use std::fmt;
use std::sync::Arc;

/// The hook point being fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    Insert,
    Update,
    Delete,
    Select,
}

impl HookEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            HookEvent::Insert => "before-insert",
            HookEvent::Update => "before-update",
            HookEvent::Delete => "before-delete",
            HookEvent::Select => "before-select",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook is told about the operation in flight.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub event: HookEvent,
    pub state: &'a QueryState,
}

impl<'a> HookContext<'a> {
    pub fn new(event: HookEvent, state: &'a QueryState) -> Self {
        Self { event, state }
    }

    /// Unprefixed table name.
    pub fn table(&self) -> &'a str {
        self.state.table()
    }

    pub fn tag(&self) -> Option<&'a str> {
        self.state.tag()
    }
}

/// A lifecycle hook. Every method defaults to a pass-through.
pub trait QueryHook: Send + Sync {
    /// Transform or validate the rows of an insert.
    fn before_insert(&self, ctx: &HookContext<'_>, rows: Vec<Record>) -> OrmResult<Vec<Record>> {
        let _ = ctx;
        Ok(rows)
    }

    /// Transform or validate the assignments of an update.
    fn before_update(&self, ctx: &HookContext<'_>, values: Record) -> OrmResult<Record> {
        let _ = ctx;
        Ok(values)
    }

    fn before_delete(&self, _ctx: &HookContext<'_>) -> OrmResult<()> {
        Ok(())
    }

    fn before_select(&self, _ctx: &HookContext<'_>) -> OrmResult<()> {
        Ok(())
    }
}

/// Runs hooks in registration order; the first error stops the chain.
///
/// ```ignore
/// let hooks = HookPipeline::new()
///     .add(TracingHook::new())
///     .add(AuditHook::new());
/// ```
#[derive(Clone, Default)]
pub struct HookPipeline {
    hooks: Vec<Arc<dyn QueryHook>>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook.
    #[allow(clippy::should_implement_trait)]
    pub fn add<H: QueryHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Add an Arc-wrapped hook.
    pub fn add_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn fire_insert(&self, state: &QueryState, rows: Vec<Record>) -> OrmResult<Vec<Record>> {
        self.before_insert(&HookContext::new(HookEvent::Insert, state), rows)
    }

    pub(crate) fn fire_update(&self, state: &QueryState, values: Record) -> OrmResult<Record> {
        self.before_update(&HookContext::new(HookEvent::Update, state), values)
    }

    pub(crate) fn fire_delete(&self, state: &QueryState) -> OrmResult<()> {
        self.before_delete(&HookContext::new(HookEvent::Delete, state))
    }

    pub(crate) fn fire_select(&self, state: &QueryState) -> OrmResult<()> {
        self.before_select(&HookContext::new(HookEvent::Select, state))
    }
}

impl fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookPipeline")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl QueryHook for HookPipeline {
    fn before_insert(&self, ctx: &HookContext<'_>, rows: Vec<Record>) -> OrmResult<Vec<Record>> {
        let mut rows = rows;
        for hook in &self.hooks {
            rows = hook.before_insert(ctx, rows)?;
        }
        Ok(rows)
    }

    fn before_update(&self, ctx: &HookContext<'_>, values: Record) -> OrmResult<Record> {
        let mut values = values;
        for hook in &self.hooks {
            values = hook.before_update(ctx, values)?;
        }
        Ok(values)
    }

    fn before_delete(&self, ctx: &HookContext<'_>) -> OrmResult<()> {
        for hook in &self.hooks {
            hook.before_delete(ctx)?;
        }
        Ok(())
    }

    fn before_select(&self, ctx: &HookContext<'_>) -> OrmResult<()> {
        for hook in &self.hooks {
            hook.before_select(ctx)?;
        }
        Ok(())
    }
}

/// Truncate `text` to at most `max_bytes` on a UTF-8 boundary.
pub(crate) fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
