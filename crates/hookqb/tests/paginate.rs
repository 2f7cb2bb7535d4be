mod common;

use common::{MemoryConnection, users};
use futures_util::TryStreamExt;
use hookqb::{AuditHook, Db, OrmError, Value};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn short_last_page_ends_iteration() {
    let db = Db::new(MemoryConnection::new().with_rows(users(25)));
    let mut pages = db.table("users").order_by("id").lazy(10);

    let mut ids = Vec::new();
    while let Some(row) = pages.next().await.unwrap() {
        ids.push(row.try_get::<i64>("id").unwrap());
    }
    assert_eq!(ids, (1..=25).collect::<Vec<_>>());
    assert_eq!(pages.page_fetches(), 3);
    assert!(pages.is_exhausted());

    let sqls: Vec<_> = db.connection().calls().into_iter().map(|c| c.sql).collect();
    assert_eq!(
        sqls,
        vec![
            "select * from users where users.deleted_at is null order by id asc limit 10 offset 0",
            "select * from users where users.deleted_at is null order by id asc limit 10 offset 10",
            "select * from users where users.deleted_at is null order by id asc limit 10 offset 20",
        ]
    );

    // Exhausted iterators stay exhausted.
    assert!(pages.next().await.unwrap().is_none());
    assert_eq!(db.connection().count("select"), 3);
}

#[tokio::test]
async fn exact_multiple_needs_one_empty_page() {
    let db = Db::new(MemoryConnection::new().with_rows(users(20)));
    let pages = db.table("users").lazy(10);
    let ids = pages.map(|row| row.get("id").cloned()).try_collect().await.unwrap();
    assert_eq!(ids.len(), 20);
    assert_eq!(db.connection().count("select"), 3);
}

#[tokio::test]
async fn empty_result_fetches_once() {
    let db = Db::new(MemoryConnection::new());
    let mut pages = db.table("users").lazy(10);
    assert!(pages.next().await.unwrap().is_none());
    assert!(pages.next().await.unwrap().is_none());
    assert_eq!(pages.page_fetches(), 1);
}

#[tokio::test]
async fn pages_are_fetched_only_when_needed() {
    let db = Db::new(MemoryConnection::new().with_rows(users(25)));
    let mut pages = db.table("users").lazy(10);

    assert!(pages.next().await.unwrap().is_some());
    assert_eq!(db.connection().count("select"), 1);
    assert_eq!(pages.current_page(), 2);

    let rest = pages.next_page().await.unwrap().unwrap();
    assert_eq!(rest.len(), 9);
    assert_eq!(db.connection().count("select"), 1);

    let second = pages.next_page().await.unwrap().unwrap();
    assert_eq!(second.len(), 10);
    assert_eq!(db.connection().count("select"), 2);
}

#[tokio::test]
async fn stream_yields_every_row() {
    let db = Db::new(MemoryConnection::new().with_rows(users(7)));
    let names: Vec<Value> = db
        .table("users")
        .lazy(3)
        .map(|row| row.get("name").cloned().unwrap_or(Value::Null))
        .into_stream()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(names.len(), 7);
    assert_eq!(names[6], Value::from("user7"));
    assert_eq!(db.connection().count("select"), 3);
}

#[tokio::test]
async fn try_map_errors_surface_in_place() {
    let db = Db::new(MemoryConnection::new().with_rows(users(3)));
    let mut pages = db.table("users").lazy(10).try_map(|row| {
        let id: i64 = row.try_get("id")?;
        if id == 2 {
            return Err(OrmError::validation("bad row"));
        }
        Ok(id)
    });
    assert_eq!(pages.next().await.unwrap(), Some(1));
    assert!(pages.next().await.unwrap_err().is_validation());
    assert_eq!(pages.next().await.unwrap(), Some(3));
}

#[tokio::test]
async fn zero_page_size_is_one() {
    let db = Db::new(MemoryConnection::new().with_rows(users(2)));
    let pages = db.table("users").lazy(0);
    assert_eq!(pages.page_size(), 1);
    assert_eq!(pages.try_collect().await.unwrap().len(), 2);
    assert_eq!(db.connection().count("select"), 3);
}

#[tokio::test]
async fn every_page_fires_select_and_skips_cache() {
    let audit = Arc::new(AuditHook::new());
    let db = Db::new(MemoryConnection::new().with_rows(users(5)))
        .with_memory_cache()
        .with_hook_arc(audit.clone());

    let rows = db
        .table("users")
        .remember(Duration::from_secs(60))
        .lazy(2)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(audit.events().len(), 3);
    assert_eq!(db.cache_stats().unwrap().stores, 0);
}

#[tokio::test]
async fn query_limit_caps_the_walk() {
    let db = Db::new(MemoryConnection::new().with_rows(users(25)));
    let rows = db.table("users").order_by("id").limit(5).lazy(10).try_collect().await.unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(db.connection().count("select"), 1);
    assert_eq!(
        db.connection().last().unwrap().sql,
        "select * from users where users.deleted_at is null order by id asc limit 5 offset 0"
    );
}

#[tokio::test]
async fn pages_start_at_query_offset() {
    let db = Db::new(MemoryConnection::new().with_rows(users(25)));
    let mut pages = db.table("users").order_by("id").offset(3).limit(12).lazy(5);

    let mut ids = Vec::new();
    while let Some(row) = pages.next().await.unwrap() {
        ids.push(row.try_get::<i64>("id").unwrap());
    }
    assert_eq!(ids, (4..=15).collect::<Vec<_>>());
    assert_eq!(pages.page_fetches(), 3);

    let tails: Vec<_> = db
        .connection()
        .calls()
        .into_iter()
        .map(|c| c.sql.rsplit(" order by ").next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        tails,
        vec![
            "id asc limit 5 offset 3",
            "id asc limit 5 offset 8",
            "id asc limit 2 offset 13",
        ]
    );
}

#[tokio::test]
async fn limit_on_page_boundary_stops_without_extra_query() {
    let db = Db::new(MemoryConnection::new().with_rows(users(25)));
    let mut pages = db.table("users").limit(10).lazy(5);
    let mut n = 0;
    while pages.next().await.unwrap().is_some() {
        n += 1;
    }
    assert_eq!(n, 10);
    assert!(pages.is_exhausted());
    assert_eq!(pages.page_fetches(), 2);
    assert_eq!(db.connection().count("select"), 2);
}
