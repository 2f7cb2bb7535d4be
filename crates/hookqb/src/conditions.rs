//! Associative conditions for `where_with`.
//!
//! Each entry pairs a key with a value. The key is a column name optionally
//! followed by an operator (`"age >="`, `"name not like"`); a bare column
//! means `=`. Values lower as follows:
//!
//! - a scalar binds one placeholder;
//! - `NULL` lowers to `is null` (`is not null` for `!=` / `<>`);
//! - a list lowers to `in (...)` (`not in` for `!=` / `<>` / `not in`);
//! - [`Conditions::any`] / [`Conditions::all`] nest a parenthesized group;
//! - [`Conditions::raw`] splices SQL verbatim.
//!
//! # Example
//! ```ignore
//! use hookqb::Conditions;
//!
//! let conds = Conditions::new()
//!     .add("status", "active")
//!     .add("age >=", 18)
//!     .add("role", vec!["admin", "editor"])
//!     .any(|c| c.add("email like", "%@corp.com").add("verified_at !=", None::<i64>));
//! // status = ? and age >= ? and role in (?, ?) and (email like ? or verified_at is not null)
//! ```

use crate::value::Value;

const OPERATORS: &[&str] = &[
    "not like", "not in", "like", "in", "!=", "<>", ">=", "<=", "=", ">", "<",
];

/// One condition value.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Value(Value),
    List(Vec<Value>),
    /// Nested group joined with `or`.
    Any(Conditions),
    /// Nested group joined with `and`.
    All(Conditions),
    /// The key is SQL spliced verbatim.
    Raw,
}

macro_rules! impl_from_scalar {
    ($($t:ty),* $(,)?) => {
        $(impl From<$t> for Condition {
            fn from(value: $t) -> Self {
                Condition::Value(value.into())
            }
        })*
    };
}

impl_from_scalar!(
    Value,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    bool,
    &str,
    String,
    chrono::DateTime<chrono::Utc>,
    uuid::Uuid,
);

impl<T: Into<Value>> From<Option<T>> for Condition {
    fn from(value: Option<T>) -> Self {
        Condition::Value(value.into())
    }
}

/// A vector always lowers to `in (...)`, including `Vec<u8>`.
impl<T: Into<Value>> From<Vec<T>> for Condition {
    fn from(values: Vec<T>) -> Self {
        Condition::List(values.into_iter().map(Into::into).collect())
    }
}

/// An ordered list of `(key, condition)` entries joined with `and`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    entries: Vec<(String, Condition)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, key: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.entries.push((key.into(), condition.into()));
        self
    }

    /// Splice `sql` verbatim.
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.entries.push((sql.into(), Condition::Raw));
        self
    }

    /// Add a nested group whose entries are joined with `or`.
    pub fn any(mut self, f: impl FnOnce(Conditions) -> Conditions) -> Self {
        self.entries
            .push(("OR".to_string(), Condition::Any(f(Conditions::new()))));
        self
    }

    /// Add a nested group whose entries are joined with `and`.
    pub fn all(mut self, f: impl FnOnce(Conditions) -> Conditions) -> Self {
        self.entries
            .push(("AND".to_string(), Condition::All(f(Conditions::new()))));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Lower to a predicate with `?` placeholders and its bindings.
    ///
    /// An empty list lowers to `1 = 1`.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut bindings = Vec::new();
        if self.entries.is_empty() {
            sql.push_str("1 = 1");
        } else {
            self.build(" and ", &mut sql, &mut bindings);
        }
        (sql, bindings)
    }

    fn build(&self, joiner: &str, sql: &mut String, bindings: &mut Vec<Value>) {
        for (i, (key, condition)) in self.entries.iter().enumerate() {
            if i > 0 {
                sql.push_str(joiner);
            }
            match condition {
                Condition::Raw => sql.push_str(key),
                Condition::Any(group) => push_group(group, " or ", sql, bindings),
                Condition::All(group) => push_group(group, " and ", sql, bindings),
                Condition::Value(value) => push_value(key, value, sql, bindings),
                Condition::List(values) => push_list(key, values, sql, bindings),
            }
        }
    }
}

fn push_group(group: &Conditions, joiner: &str, sql: &mut String, bindings: &mut Vec<Value>) {
    if group.is_empty() {
        sql.push_str("1 = 1");
        return;
    }
    sql.push('(');
    group.build(joiner, sql, bindings);
    sql.push(')');
}

fn push_value(key: &str, value: &Value, sql: &mut String, bindings: &mut Vec<Value>) {
    let (column, op) = split_key(key);
    if value.is_null() {
        sql.push_str(column);
        sql.push_str(if negates(op) { " is not null" } else { " is null" });
        return;
    }
    sql.push_str(column);
    sql.push(' ');
    sql.push_str(match op {
        "in" => "=",
        "not in" => "!=",
        other => other,
    });
    sql.push_str(" ?");
    bindings.push(value.clone());
}

fn push_list(key: &str, values: &[Value], sql: &mut String, bindings: &mut Vec<Value>) {
    let (column, op) = split_key(key);
    let negated = negates(op);
    if values.is_empty() {
        sql.push_str(if negated { "1 = 1" } else { "0 = 1" });
        return;
    }
    sql.push_str(column);
    sql.push_str(if negated { " not in (" } else { " in (" });
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
        bindings.push(value.clone());
    }
    sql.push(')');
}

fn negates(op: &str) -> bool {
    matches!(op, "!=" | "<>" | "not in")
}

/// Split `"col op"` into column and lower-cased operator; a bare column means `=`.
fn split_key(key: &str) -> (&str, &str) {
    let key = key.trim();
    let lower = key.to_ascii_lowercase();
    for op in OPERATORS {
        if lower.len() > op.len() && lower.ends_with(op) {
            let head = &key[..key.len() - op.len()];
            let word_op = op.starts_with(|c: char| c.is_ascii_alphabetic());
            // Word operators need a separating space; symbols may be glued on.
            if word_op && !head.ends_with(char::is_whitespace) {
                continue;
            }
            let column = head.trim_end();
            if !column.is_empty() {
                return (column, op);
            }
        }
    }
    (key, "=")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_and_operator_keys() {
        let (sql, bindings) = Conditions::new()
            .add("status", "active")
            .add("age >=", 18)
            .add("name NOT LIKE", "x%")
            .add("score<", 5)
            .to_sql();
        assert_eq!(sql, "status = ? and age >= ? and name not like ? and score < ?");
        assert_eq!(
            bindings,
            vec![Value::from("active"), Value::Int(18), Value::from("x%"), Value::Int(5)]
        );
    }

    #[test]
    fn null_and_lists() {
        let (sql, bindings) = Conditions::new()
            .add("deleted_at", Value::Null)
            .add("verified_at !=", None::<i64>)
            .add("id", vec![1, 2, 3])
            .add("role not in", vec!["guest"])
            .add("tag", Vec::<i64>::new())
            .to_sql();
        assert_eq!(
            sql,
            "deleted_at is null and verified_at is not null and id in (?, ?, ?) \
             and role not in (?) and 0 = 1"
        );
        assert_eq!(bindings.len(), 4);
    }

    #[test]
    fn nested_groups_and_raw() {
        let (sql, bindings) = Conditions::new()
            .add("a", 1)
            .any(|c| c.add("b", 2).all(|c| c.add("c", 3).add("d", 4)))
            .raw("e > f")
            .to_sql();
        assert_eq!(sql, "a = ? and (b = ? or (c = ? and d = ?)) and e > f");
        assert_eq!(bindings.len(), 4);
    }

    #[test]
    fn column_containing_operator_word() {
        assert_eq!(split_key("login"), ("login", "="));
        assert_eq!(split_key("main"), ("main", "="));
        assert_eq!(split_key("x in"), ("x", "in"));
    }

    #[test]
    fn empty_is_tautology() {
        assert_eq!(Conditions::new().to_sql(), ("1 = 1".to_string(), vec![]));
    }
}
