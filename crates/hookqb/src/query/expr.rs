//! Predicate tree for WHERE clauses.
//!
//! Expressions render with `?` placeholders; bind values are collected in the
//! same left-to-right order the placeholders appear in the SQL text.

use crate::compile::substitute_prefix;
use crate::value::Value;

/// How a predicate joins the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    fn as_sql(self) -> &'static str {
        match self {
            Conjunction::And => " and ",
            Conjunction::Or => " or ",
        }
    }
}

/// A single predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `column <op> ?`
    Compare {
        column: String,
        op: String,
        value: Value,
    },
    /// `column in (?, ...)` / `column not in (?, ...)`
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// `column is null` / `column is not null`
    Null { column: String, negated: bool },
    /// `column between ? and ?`
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// Raw SQL with positional `?` bindings. `#__` is replaced with the table prefix.
    Raw { sql: String, bindings: Vec<Value> },
    /// Parenthesized sub-group.
    Group(ExprGroup),
}

impl Expr {
    pub fn compare(column: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::Compare {
            column: column.into(),
            op: op.into(),
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, "=", value)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Expr::Null {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Expr::Null {
            column: column.into(),
            negated: true,
        }
    }

    pub fn raw(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Expr::Raw {
            sql: sql.into(),
            bindings,
        }
    }

    /// Render into `sql`, pushing bind values onto `bindings`.
    pub(crate) fn build(&self, prefix: &str, sql: &mut String, bindings: &mut Vec<Value>) {
        match self {
            Expr::Compare { column, op, value } => {
                sql.push_str(column);
                sql.push(' ');
                sql.push_str(op);
                sql.push_str(" ?");
                bindings.push(value.clone());
            }
            Expr::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // `in ()` is invalid SQL; an empty list matches nothing (or everything, negated).
                    sql.push_str(if *negated { "1 = 1" } else { "0 = 1" });
                    return;
                }
                sql.push_str(column);
                sql.push_str(if *negated { " not in (" } else { " in (" });
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('?');
                    bindings.push(v.clone());
                }
                sql.push(')');
            }
            Expr::Null { column, negated } => {
                sql.push_str(column);
                sql.push_str(if *negated { " is not null" } else { " is null" });
            }
            Expr::Between {
                column,
                low,
                high,
                negated,
            } => {
                sql.push_str(column);
                sql.push_str(if *negated {
                    " not between ? and ?"
                } else {
                    " between ? and ?"
                });
                bindings.push(low.clone());
                bindings.push(high.clone());
            }
            Expr::Raw { sql: raw, bindings: raw_bindings } => {
                sql.push_str(&substitute_prefix(raw, prefix));
                bindings.extend(raw_bindings.iter().cloned());
            }
            Expr::Group(group) => {
                sql.push('(');
                group.build(prefix, sql, bindings);
                sql.push(')');
            }
        }
    }
}

/// An ordered list of predicates joined by `and` / `or`.
///
/// The conjunction of the first item is ignored when rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprGroup {
    items: Vec<(Conjunction, Expr)>,
}

impl ExprGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether any top-level item is joined with `or`.
    pub fn has_or(&self) -> bool {
        self.items
            .iter()
            .skip(1)
            .any(|(conj, _)| *conj == Conjunction::Or)
    }

    pub fn and(&mut self, expr: Expr) -> &mut Self {
        self.items.push((Conjunction::And, expr));
        self
    }

    pub fn or(&mut self, expr: Expr) -> &mut Self {
        self.items.push((Conjunction::Or, expr));
        self
    }

    pub fn push(&mut self, conjunction: Conjunction, expr: Expr) -> &mut Self {
        self.items.push((conjunction, expr));
        self
    }

    /// Iterate over `(conjunction, expr)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = &(Conjunction, Expr)> {
        self.items.iter()
    }

    pub(crate) fn build(&self, prefix: &str, sql: &mut String, bindings: &mut Vec<Value>) {
        for (i, (conj, expr)) in self.items.iter().enumerate() {
            if i > 0 {
                sql.push_str(conj.as_sql());
            }
            expr.build(prefix, sql, bindings);
        }
    }

    /// Render to a standalone `(sql, bindings)` pair.
    pub fn to_sql(&self, prefix: &str) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut bindings = Vec::new();
        self.build(prefix, &mut sql, &mut bindings);
        (sql, bindings)
    }
}
