mod common;

use chrono::{TimeZone, Utc};
use common::{MemoryConnection, users};
use hookqb::{AuditHook, Db, DbConfig, HookEvent, ManualClock, Value};
use std::sync::Arc;

fn db_at(conn: MemoryConnection) -> (Db<MemoryConnection>, chrono::DateTime<Utc>) {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let db = Db::new(conn).with_clock(Arc::new(ManualClock::new(at)));
    (db, at)
}

#[tokio::test]
async fn delete_marks_rows_instead_of_removing_them() {
    let audit = Arc::new(AuditHook::new());
    let (db, at) = db_at(MemoryConnection::new().with_affected(3));
    let db = db.with_hook_arc(audit.clone());

    let n = db.table("posts").where_eq("author_id", 9).delete().await.unwrap();
    assert_eq!(n, 3);

    let call = db.connection().last().unwrap();
    assert_eq!(call.route, "update");
    assert_eq!(
        call.sql,
        "update posts set deleted_at = ? where author_id = ? and posts.deleted_at is null"
    );
    assert_eq!(call.bindings, vec![Value::Timestamp(at), Value::Int(9)]);
    assert_eq!(audit.events(), vec![HookEvent::Delete]);
}

#[tokio::test]
async fn delete_scope_wraps_or_predicates() {
    let (db, _) = db_at(MemoryConnection::new());
    db.table("posts")
        .where_eq("a", 1)
        .or_where("b", "=", 2)
        .delete()
        .await
        .unwrap();
    assert_eq!(
        db.connection().last().unwrap().sql,
        "update posts set deleted_at = ? where (a = ? or b = ?) and posts.deleted_at is null"
    );
}

#[tokio::test]
async fn force_delete_is_physical() {
    let (db, _) = db_at(MemoryConnection::new());
    db.table("posts").where_eq("id", 1).force_delete().await.unwrap();

    let call = db.connection().last().unwrap();
    assert_eq!(call.route, "delete");
    assert_eq!(call.sql, "delete from posts where id = ?");
}

#[tokio::test]
async fn restore_clears_marker_on_trashed_rows() {
    let audit = Arc::new(AuditHook::new());
    let (db, at) = db_at(MemoryConnection::new());
    let db = db.with_hook_arc(audit.clone());

    db.table("posts").where_eq("id", 4).restore().await.unwrap();

    let call = db.connection().last().unwrap();
    assert_eq!(call.route, "update");
    assert_eq!(
        call.sql,
        "update posts set deleted_at = ?, updated_at = ? where id = ? and posts.deleted_at is not null"
    );
    assert_eq!(
        call.bindings,
        vec![Value::Null, Value::Timestamp(at), Value::Int(4)]
    );
    assert_eq!(audit.events(), vec![HookEvent::Update]);
}

#[tokio::test]
async fn trashed_modes_change_read_scope() {
    let db = Db::new(MemoryConnection::new().with_rows(users(1)));

    assert_eq!(
        db.table("posts").to_sql(),
        "select * from posts where posts.deleted_at is null"
    );
    assert_eq!(db.table("posts").with_trashed().to_sql(), "select * from posts");
    assert_eq!(
        db.table("posts").only_trashed().to_sql(),
        "select * from posts where posts.deleted_at is not null"
    );
    assert_eq!(
        db.table("posts").alias("p").only_trashed().count().await.unwrap(),
        1
    );
    assert_eq!(
        db.connection().last().unwrap().sql,
        "select count(*) as aggregate from posts as p where p.deleted_at is not null"
    );
}

#[tokio::test]
async fn custom_marker_column() {
    let db = Db::new(MemoryConnection::new())
        .with_config(DbConfig::default().with_soft_delete_column("removed_at"));
    assert_eq!(
        db.table("posts").to_sql(),
        "select * from posts where posts.removed_at is null"
    );
}

#[tokio::test]
async fn without_soft_deletes_disables_one_query() {
    let db = Db::new(MemoryConnection::new());
    let q = db.table("logs").without_soft_deletes();
    assert_eq!(q.to_sql(), "select * from logs");

    q.clone().where_eq("id", 1).delete().await.unwrap();
    assert_eq!(db.connection().last().unwrap().sql, "delete from logs where id = ?");

    assert!(q.restore().await.unwrap_err().is_validation());
}

#[tokio::test]
async fn disabled_globally() {
    let db = Db::new(MemoryConnection::new())
        .with_config(DbConfig::default().with_soft_deletes(false));

    assert_eq!(db.table("posts").to_sql(), "select * from posts");
    db.table("posts").where_eq("id", 2).delete().await.unwrap();

    let call = db.connection().last().unwrap();
    assert_eq!(call.route, "delete");
    assert_eq!(call.sql, "delete from posts where id = ?");

    let err = db.table("posts").restore().await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(db.connection().count("update"), 0);
}

#[tokio::test]
async fn only_trashed_force_delete_removes_trashed_rows_only() {
    let (db, _) = db_at(MemoryConnection::new());
    db.table("posts").only_trashed().force_delete().await.unwrap();

    let call = db.connection().last().unwrap();
    assert_eq!(call.route, "delete");
    assert_eq!(call.sql, "delete from posts where posts.deleted_at is not null");
}

#[tokio::test]
async fn with_trashed_force_delete_is_unscoped() {
    let (db, _) = db_at(MemoryConnection::new());
    db.table("posts").with_trashed().where_eq("id", 1).force_delete().await.unwrap();
    assert_eq!(db.connection().last().unwrap().sql, "delete from posts where id = ?");
}

#[tokio::test]
async fn only_trashed_update_touches_trashed_rows_only() {
    let (db, at) = db_at(MemoryConnection::new());
    db.table("posts")
        .only_trashed()
        .update(hookqb::record! { "title" => "x" })
        .await
        .unwrap();

    let call = db.connection().last().unwrap();
    assert_eq!(call.route, "update");
    assert_eq!(
        call.sql,
        "update posts set title = ?, updated_at = ? where posts.deleted_at is not null"
    );
    assert_eq!(call.bindings, vec![Value::from("x"), Value::Timestamp(at)]);
}

#[tokio::test]
async fn only_trashed_soft_delete_is_rejected() {
    let audit = Arc::new(AuditHook::new());
    let (db, _) = db_at(MemoryConnection::new());
    let db = db.with_hook_arc(audit.clone());

    let err = db.table("posts").only_trashed().delete().await.unwrap_err();
    assert!(err.is_validation());
    assert!(db.connection().calls().is_empty());
    assert!(audit.events().is_empty());
}
