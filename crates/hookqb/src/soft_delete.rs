//! Soft-delete filtering.
//!
//! When enabled, reads exclude rows whose deletion marker is set and
//! `delete()` becomes an UPDATE that stamps the marker.

use crate::config::SoftDeleteConfig;
use crate::query::Expr;
use crate::value::{Record, Value};
use chrono::{DateTime, Utc};

/// Which rows a read sees with respect to the deletion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashedMode {
    /// Only rows that are not soft-deleted.
    #[default]
    Without,
    /// All rows.
    With,
    /// Only soft-deleted rows.
    Only,
}

/// Soft-delete strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeletes {
    enabled: bool,
    column: String,
}

impl Default for SoftDeletes {
    fn default() -> Self {
        Self::new("deleted_at")
    }
}

impl SoftDeletes {
    /// Enabled soft deletes using `column` as the deletion marker.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            enabled: true,
            column: column.into(),
        }
    }

    /// Soft deletes switched off: reads are unfiltered and deletes are physical.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            column: "deleted_at".to_string(),
        }
    }

    pub fn from_config(config: &SoftDeleteConfig) -> Self {
        Self {
            enabled: config.enabled,
            column: config.column.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// The marker column qualified with a table name or alias.
    pub fn qualified_column(&self, qualifier: &str) -> String {
        if qualifier.is_empty() {
            self.column.clone()
        } else {
            format!("{}.{}", qualifier, self.column)
        }
    }

    /// The predicate a read must carry, if any.
    pub fn read_scope(&self, qualifier: &str, mode: TrashedMode) -> Option<Expr> {
        if !self.enabled {
            return None;
        }
        match mode {
            TrashedMode::Without => Some(Expr::is_null(self.qualified_column(qualifier))),
            TrashedMode::Only => Some(Expr::is_not_null(self.qualified_column(qualifier))),
            TrashedMode::With => None,
        }
    }

    /// Update payload that marks rows deleted at `now`.
    pub fn deleted_values(&self, now: DateTime<Utc>) -> Record {
        let mut rec = Record::new();
        rec.insert(self.column.clone(), Value::Timestamp(now));
        rec
    }

    /// Update payload that clears the deletion marker.
    pub fn restored_values(&self) -> Record {
        let mut rec = Record::new();
        rec.insert(self.column.clone(), Value::Null);
        rec
    }
}
