//! In-memory connection shared by the integration tests.
//!
//! Records every primitive call and answers reads from a fixed row set,
//! honouring `limit`/`offset` so paging can be observed.

#![allow(dead_code)]

use hookqb::{Connection, OrmResult, Row, Value};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub route: &'static str,
    pub sql: String,
    pub bindings: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct MemoryConnection {
    prefix: String,
    rows: Vec<Row>,
    affected: u64,
    next_id: i64,
    calls: Mutex<Vec<Call>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self {
            affected: 1,
            next_id: 42,
            ..Self::default()
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls that took `route`.
    pub fn count(&self, route: &str) -> usize {
        self.calls().iter().filter(|c| c.route == route).count()
    }

    pub fn last(&self) -> Option<Call> {
        self.calls().pop()
    }

    pub fn reset(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, route: &'static str, sql: &str, bindings: &[Value]) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                route,
                sql: sql.to_string(),
                bindings: bindings.to_vec(),
            });
    }

    fn page(&self, sql: &str) -> Vec<Row> {
        let offset = clause(sql, " offset ").unwrap_or(0);
        let limit = clause(sql, " limit ").unwrap_or(usize::MAX);
        self.rows.iter().skip(offset).take(limit).cloned().collect()
    }
}

fn clause(sql: &str, keyword: &str) -> Option<usize> {
    let idx = sql.find(keyword)?;
    sql[idx + keyword.len()..]
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// `n` rows of `(id, name)`, ids starting at 1.
pub fn users(n: i64) -> Vec<Row> {
    (1..=n)
        .map(|id| Row::from_pairs([("id", Value::Int(id)), ("name", Value::from(format!("user{id}")))]))
        .collect()
}

impl Connection for MemoryConnection {
    fn table_prefix(&self) -> &str {
        &self.prefix
    }

    async fn select(&self, sql: &str, bindings: &[Value]) -> OrmResult<Vec<Row>> {
        self.record("select", sql, bindings);
        if sql.contains("last_insert_id()") {
            return Ok(vec![Row::from_pairs([("id", self.next_id)])]);
        }
        if sql.starts_with("select count(*) as aggregate") {
            return Ok(vec![Row::from_pairs([("aggregate", self.rows.len() as i64)])]);
        }
        if sql.starts_with("select exists(") {
            return Ok(vec![Row::from_pairs([("result", !self.rows.is_empty())])]);
        }
        Ok(self.page(sql))
    }

    async fn insert(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        self.record("insert", sql, bindings);
        Ok(sql.matches("), (").count() as u64 + 1)
    }

    async fn update(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        self.record("update", sql, bindings);
        Ok(self.affected)
    }

    async fn delete(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        self.record("delete", sql, bindings);
        Ok(self.affected)
    }

    async fn statement(&self, sql: &str, bindings: &[Value]) -> OrmResult<bool> {
        self.record("statement", sql, bindings);
        Ok(true)
    }

    async fn unprepared(&self, sql: &str) -> OrmResult<bool> {
        self.record("unprepared", sql, &[]);
        Ok(true)
    }
}
