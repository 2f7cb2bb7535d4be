//! [`Connection`] adapter for tokio-postgres.
//!
//! Placeholders are renumbered from `?` to `$1, $2, ...` (question marks
//! inside quoted literals, quoted identifiers and comments are left alone),
//! bind values are encoded against the parameter types the server infers,
//! and result columns are decoded into [`Value`]s by their Postgres type.

use crate::error::{OrmError, OrmResult};
use crate::gateway::Connection;
use crate::row::Row;
use crate::value::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::GenericClient;
use tokio_postgres::types::{IsNull, ToSql, Type};

/// Identifier lookup used when no inline id is reported.
pub const PG_LAST_INSERT_ID_SQL: &str = "select lastval() as id";

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::INT2 | Type::INT4 | Type::INT8 => Value::Int(i64::from(*b)).to_sql(ty, out),
                _ => b.to_sql(ty, out),
            },
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::BOOL => (*i != 0).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => i.to_string().to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => f.to_string().to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Text(s) => match *ty {
                Type::UUID => uuid::Uuid::parse_str(s)?.to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
                Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc).to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => Value::Int(s.trim().parse()?).to_sql(ty, out),
                Type::FLOAT4 | Type::FLOAT8 => Value::Float(s.trim().parse()?).to_sql(ty, out),
                _ => s.as_str().to_sql(ty, out),
            },
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
            Value::Timestamp(t) => match *ty {
                Type::TIMESTAMP => t.naive_utc().to_sql(ty, out),
                Type::DATE => t.date_naive().to_sql(ty, out),
                _ => t.to_sql(ty, out),
            },
            Value::Uuid(u) => u.to_sql(ty, out),
            Value::Json(j) => j.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// Rewrite `?` placeholders as `$1, $2, ...`.
pub fn numbered(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' => {
                out.push(ch);
                // Doubled quotes inside a literal close and reopen it, which is equivalent.
                for c in chars.by_ref() {
                    out.push(c);
                    if c == ch {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(ch);
                for c in chars.by_ref() {
                    out.push(c);
                    if c == '\n' {
                        break;
                    }
                }
            }
            '?' => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}

fn params(bindings: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    bindings.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

/// Convert driver rows, sharing one column list.
pub fn convert_rows(rows: &[tokio_postgres::Row]) -> OrmResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|idx| decode(row, idx))
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(Row::new(columns.clone(), values))
        })
        .collect()
}

fn decode(row: &tokio_postgres::Row, idx: usize) -> OrmResult<Value> {
    let column = &row.columns()[idx];
    let fail = |e: tokio_postgres::Error| OrmError::decode(column.name(), e.to_string());
    let value: Value = match *column.type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map_err(fail)?.into(),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).map_err(fail)?.into(),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).map_err(fail)?.into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map_err(fail)?.into(),
        Type::OID => row.try_get::<_, Option<u32>>(idx).map_err(fail)?.into(),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx).map_err(fail)?.into(),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map_err(fail)?.into(),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx).map_err(fail)?.into()
        }
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx).map_err(fail)?.into(),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(fail)?
            .into(),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(fail)?
            .map(|t| t.and_utc())
            .into(),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .map_err(fail)?
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            .into(),
        Type::UUID => row.try_get::<_, Option<uuid::Uuid>>(idx).map_err(fail)?.into(),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(fail)?
            .into(),
        ref other => {
            return Err(OrmError::decode(
                column.name(),
                format!("unsupported column type {other}; cast it in the select list"),
            ));
        }
    };
    Ok(value)
}

pub(crate) async fn pg_select<K>(client: &K, sql: &str, bindings: &[Value]) -> OrmResult<Vec<Row>>
where
    K: GenericClient + Sync,
{
    let rows = client
        .query(numbered(sql).as_str(), &params(bindings))
        .await
        .map_err(OrmError::from_db_error)?;
    convert_rows(&rows)
}

pub(crate) async fn pg_execute<K>(client: &K, sql: &str, bindings: &[Value]) -> OrmResult<u64>
where
    K: GenericClient + Sync,
{
    client
        .execute(numbered(sql).as_str(), &params(bindings))
        .await
        .map_err(OrmError::from_db_error)
}

pub(crate) async fn pg_insert_get_id<K>(
    client: &K,
    sql: &str,
    bindings: &[Value],
    sequence: Option<&str>,
) -> OrmResult<Option<Value>>
where
    K: GenericClient + Sync,
{
    let sql = format!("{sql} returning {}", sequence.unwrap_or("id"));
    let rows = pg_select(client, &sql, bindings).await?;
    Ok(rows
        .into_iter()
        .next()
        .and_then(|row| row.into_values().into_iter().next()))
}

pub(crate) async fn pg_batch<K>(client: &K, sql: &str) -> OrmResult<bool>
where
    K: GenericClient + Sync,
{
    client
        .batch_execute(sql)
        .await
        .map_err(OrmError::from_db_error)?;
    Ok(true)
}

/// A [`Connection`] over a tokio-postgres client or transaction.
///
/// ```ignore
/// let (client, connection) = tokio_postgres::connect(&url, NoTls).await?;
/// tokio::spawn(connection);
/// let db = Db::new(PgConnection::new(client).with_table_prefix("app_"));
/// ```
#[derive(Debug)]
pub struct PgConnection<K = tokio_postgres::Client> {
    client: K,
    table_prefix: String,
}

impl<K> PgConnection<K> {
    pub fn new(client: K) -> Self {
        Self {
            client,
            table_prefix: String::new(),
        }
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn client(&self) -> &K {
        &self.client
    }

    pub fn into_inner(self) -> K {
        self.client
    }
}

impl<K> Connection for PgConnection<K>
where
    K: GenericClient + Send + Sync,
{
    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    async fn select(&self, sql: &str, bindings: &[Value]) -> OrmResult<Vec<Row>> {
        pg_select(&self.client, sql, bindings).await
    }

    async fn insert(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        pg_execute(&self.client, sql, bindings).await
    }

    async fn insert_get_id(
        &self,
        sql: &str,
        bindings: &[Value],
        sequence: Option<&str>,
    ) -> OrmResult<Option<Value>> {
        pg_insert_get_id(&self.client, sql, bindings, sequence).await
    }

    async fn update(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        pg_execute(&self.client, sql, bindings).await
    }

    async fn delete(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        pg_execute(&self.client, sql, bindings).await
    }

    async fn statement(&self, sql: &str, bindings: &[Value]) -> OrmResult<bool> {
        pg_execute(&self.client, sql, bindings).await?;
        Ok(true)
    }

    async fn unprepared(&self, sql: &str) -> OrmResult<bool> {
        pg_batch(&self.client, sql).await
    }

    async fn last_insert_id(&self, lookup_sql: Option<&str>) -> OrmResult<Option<Value>> {
        let rows = pg_select(&self.client, lookup_sql.unwrap_or(PG_LAST_INSERT_ID_SQL), &[]).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_values().into_iter().next())
            .filter(|v| !v.is_null()))
    }
}
