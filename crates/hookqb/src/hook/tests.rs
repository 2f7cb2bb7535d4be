use super::*;
use crate::clock::ManualClock;
use crate::error::OrmError;
use crate::query::Expr;
use crate::record;
use crate::value::Value;
use chrono::{Duration, TimeZone, Utc};

struct RejectEmail;

impl QueryHook for RejectEmail {
    fn before_insert(&self, _ctx: &HookContext<'_>, rows: Vec<Record>) -> OrmResult<Vec<Record>> {
        if rows.iter().any(|r| r.get("email") == Some(&Value::from(""))) {
            return Err(OrmError::validation("email must not be empty"));
        }
        Ok(rows)
    }
}

struct Uppercase;

impl QueryHook for Uppercase {
    fn before_update(&self, _ctx: &HookContext<'_>, mut values: Record) -> OrmResult<Record> {
        if let Some(Value::Text(s)) = values.get_mut("name") {
            *s = s.to_uppercase();
        }
        Ok(values)
    }
}

#[test]
fn event_names() {
    assert_eq!(HookEvent::Insert.as_str(), "before-insert");
    assert_eq!(HookEvent::Update.to_string(), "before-update");
    assert_eq!(HookEvent::Delete.as_str(), "before-delete");
    assert_eq!(HookEvent::Select.as_str(), "before-select");
}

#[test]
fn pipeline_runs_in_order_and_stops_on_error() {
    let audit = Arc::new(AuditHook::new());
    let pipeline = HookPipeline::new()
        .add(RejectEmail)
        .add_arc(audit.clone());
    let state = QueryState::new("users");

    let err = pipeline
        .fire_insert(&state, vec![record! { "email" => "" }])
        .unwrap_err();
    assert!(err.is_validation());
    assert!(audit.entries().is_empty());

    let rows = pipeline
        .fire_insert(&state, vec![record! { "email" => "a@b.c" }])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(audit.events(), vec![HookEvent::Insert]);
    assert_eq!(audit.entries()[0].columns, vec!["email".to_string()]);
}

#[test]
fn update_transforms_chain() {
    let pipeline = HookPipeline::new().add(Uppercase).add(TimestampsHook::default());
    let values = pipeline
        .fire_update(&QueryState::new("users"), record! { "name" => "al" })
        .unwrap();
    assert_eq!(values.get("name"), Some(&Value::from("AL")));
    assert!(values.contains_key("updated_at"));
    assert!(!values.contains_key("created_at"));
}

#[test]
fn timestamps_fill_only_missing_columns() {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let hook = TimestampsHook::new("created", "modified").with_clock(clock.clone());
    let state = QueryState::new("posts");
    let ctx = HookContext::new(HookEvent::Insert, &state);

    let earlier = start - Duration::days(1);
    let rows = hook
        .before_insert(
            &ctx,
            vec![record! { "title" => "x" }, record! { "title" => "y", "created" => earlier }],
        )
        .unwrap();
    assert_eq!(rows[0].get("created"), Some(&Value::Timestamp(start)));
    assert_eq!(rows[0].get("modified"), Some(&Value::Timestamp(start)));
    assert_eq!(rows[1].get("created"), Some(&Value::Timestamp(earlier)));

    clock.advance(Duration::minutes(5));
    let values = hook
        .before_update(&HookContext::new(HookEvent::Update, &state), record! { "title" => "z" })
        .unwrap();
    assert_eq!(
        values.get("modified"),
        Some(&Value::Timestamp(start + Duration::minutes(5)))
    );
}

#[test]
fn delete_and_select_are_observational() {
    let audit = AuditHook::new();
    let mut state = QueryState::new("orders");
    state.tag = Some("reports".into());
    state.wheres_mut().and(Expr::eq("id", 1));

    audit
        .before_delete(&HookContext::new(HookEvent::Delete, &state))
        .unwrap();
    audit
        .before_select(&HookContext::new(HookEvent::Select, &state))
        .unwrap();

    let entries = audit.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event, HookEvent::Delete);
    assert_eq!(entries[0].table, "orders");
    assert_eq!(entries[0].tag.as_deref(), Some("reports"));
    assert!(entries[1].columns.is_empty());

    audit.clear();
    assert!(audit.entries().is_empty());
}

#[test]
fn tracing_hook_passes_payload_through() {
    let hook = TracingHook::new().level(tracing::Level::TRACE).max_sql_length(4);
    let state = QueryState::new("users");
    let ctx = HookContext::new(HookEvent::Update, &state);
    let values = hook.before_update(&ctx, record! { "a" => 1 }).unwrap();
    assert_eq!(values, record! { "a" => 1 });
}

#[test]
fn truncate_respects_char_boundaries() {
    assert_eq!(truncate_bytes("héllo", 2), "h");
    assert_eq!(truncate_bytes("abc", 10), "abc");
}
