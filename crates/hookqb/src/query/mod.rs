//! Query state accumulated by the fragment builder.
//!
//! [`QueryState`] is pure data: adding a fragment never performs I/O. The
//! chainable surface lives on [`crate::Builder`]; this module owns the
//! representation the compiler lowers.

mod expr;

pub use expr::{Conjunction, Expr, ExprGroup};

use crate::soft_delete::TrashedMode;

/// A selected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// Plain column name or `*`.
    Name(String),
    /// Raw select expression; `#__` is replaced with the table prefix.
    Raw(String),
}

/// JOIN flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "inner join",
            JoinKind::Left => "left join",
            JoinKind::Right => "right join",
        }
    }
}

/// A join spec: `<kind> <table> on <on>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    /// Table name, optionally followed by `as <alias>`; receives the table prefix.
    pub table: String,
    /// Raw ON condition; `#__` is replaced with the table prefix.
    pub on: String,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// An ordering spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    Column(String, Direction),
    Raw(String),
}

/// Everything a query has accumulated before compilation.
///
/// Owned by exactly one builder; clones are independent.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub(crate) table: String,
    pub(crate) alias: Option<String>,
    pub(crate) columns: Vec<Column>,
    pub(crate) wheres: ExprGroup,
    pub(crate) joins: Vec<Join>,
    pub(crate) orders: Vec<Order>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) trashed: TrashedMode,
    pub(crate) tag: Option<String>,
}

impl QueryState {
    /// Start a query against `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            columns: Vec::new(),
            wheres: ExprGroup::new(),
            joins: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            trashed: TrashedMode::default(),
            tag: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Set the table alias. A second call replaces the first.
    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = Some(alias.into());
    }

    pub fn wheres(&self) -> &ExprGroup {
        &self.wheres
    }

    pub(crate) fn wheres_mut(&mut self) -> &mut ExprGroup {
        &mut self.wheres
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn trashed(&self) -> TrashedMode {
        self.trashed
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Limit/offset for a 1-based page. The offset saturates at `u64::MAX`.
    pub fn set_page(&mut self, page: u64, per_page: u64) {
        let page = page.max(1);
        let per_page = per_page.max(1);
        self.limit = Some(per_page);
        self.offset = Some((page - 1).saturating_mul(per_page));
    }
}
