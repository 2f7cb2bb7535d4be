use super::*;
use crate::clock::ManualClock;
use crate::error::OrmError;
use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

fn stmt(id: i64) -> CompiledStatement {
    CompiledStatement::new("select * from users where id = ?", vec![Value::Int(id)])
}

fn rows(n: i64) -> Arc<Vec<Row>> {
    Arc::new((0..n).map(|i| Row::from_pairs([("id", i)])).collect())
}

fn store_with_clock(capacity: usize) -> (MemoryStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    (MemoryStore::new(capacity).with_clock(clock.clone()), clock)
}

#[test]
fn fingerprint_covers_sql_bindings_and_tag() {
    let a = Fingerprint::of(&stmt(1), None);
    assert_eq!(a, Fingerprint::of(&stmt(1), None));
    assert_ne!(a, Fingerprint::of(&stmt(2), None));
    assert_ne!(a, Fingerprint::of(&stmt(1), Some("users")));
    // Same rendered text, different bind types.
    let text = CompiledStatement::new("select * from users where id = ?", vec![Value::from("1")]);
    assert_ne!(a, Fingerprint::of(&text, None));
    assert_eq!(a.to_string().len(), 16);
}

#[test]
fn entries_expire_after_ttl() {
    let (store, clock) = store_with_clock(8);
    let key = Fingerprint::of(&stmt(1), None);
    store.put(key.clone(), rows(2), Duration::from_secs(60), None);

    clock.advance(chrono::Duration::seconds(59));
    assert_eq!(store.get(&key).map(|r| r.len()), Some(2));

    clock.advance(chrono::Duration::seconds(1));
    assert!(store.get(&key).is_none());

    let stats = store.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.expirations, 1);
    assert!(store.is_empty());
}

#[test]
fn zero_ttl_is_not_stored() {
    let (store, _) = store_with_clock(8);
    let key = Fingerprint::of(&stmt(1), None);
    store.put(key.clone(), rows(1), Duration::ZERO, None);
    assert!(store.get(&key).is_none());
    assert_eq!(store.stats().stores, 0);
}

#[test]
fn least_recently_used_is_evicted() {
    let (store, _) = store_with_clock(2);
    let (k1, k2, k3) = (
        Fingerprint::of(&stmt(1), None),
        Fingerprint::of(&stmt(2), None),
        Fingerprint::of(&stmt(3), None),
    );
    let ttl = Duration::from_secs(60);
    store.put(k1.clone(), rows(1), ttl, None);
    store.put(k2.clone(), rows(1), ttl, None);
    assert!(store.get(&k1).is_some());
    store.put(k3.clone(), rows(1), ttl, None);

    assert!(store.get(&k1).is_some());
    assert!(store.get(&k2).is_none());
    assert!(store.get(&k3).is_some());
    assert_eq!(store.stats().evictions, 1);
}

#[test]
fn purge_by_tag_and_forget() {
    let (store, _) = store_with_clock(8);
    let ttl = Duration::from_secs(60);
    let users1 = Fingerprint::of(&stmt(1), Some("users"));
    let users2 = Fingerprint::of(&stmt(2), Some("users"));
    let other = Fingerprint::of(&stmt(3), Some("orders"));
    store.put(users1.clone(), rows(1), ttl, Some("users"));
    store.put(users2.clone(), rows(1), ttl, Some("users"));
    store.put(other.clone(), rows(1), ttl, Some("orders"));

    assert_eq!(store.purge_tag("users"), 2);
    assert!(store.get(&users1).is_none());
    assert!(store.get(&other).is_some());

    assert!(store.forget(&other));
    assert!(!store.forget(&other));
    assert!(store.is_empty());
    assert_eq!(store.stats().purged, 3);
}

#[tokio::test]
async fn read_through_loads_once_within_ttl() {
    let (store, clock) = store_with_clock(8);
    let counter = AtomicUsize::new(0);
    let loads = &counter;
    let load = move || async move {
        loads.fetch_add(1, Ordering::SeqCst);
        Ok::<_, OrmError>(vec![Row::from_pairs([("n", 1)])])
    };

    let key = Fingerprint::of(&stmt(1), None);
    let ttl = Duration::from_secs(10);
    let first = read_through(&store, key.clone(), ttl, None, load).await.unwrap();
    let second = read_through(&store, key.clone(), ttl, None, load).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    clock.advance(chrono::Duration::seconds(10));
    read_through(&store, key, ttl, None, load).await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn read_through_does_not_cache_errors() {
    let (store, _) = store_with_clock(8);
    let key = Fingerprint::of(&stmt(1), None);
    let err = read_through(&store, key.clone(), Duration::from_secs(10), None, || async {
        Err::<Vec<Row>, _>(OrmError::execution("boom"))
    })
    .await
    .unwrap_err();
    assert!(err.is_execution());
    assert!(store.get(&key).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_read_through_returns_complete_rows() {
    let store = Arc::new(MemoryStore::new(8));
    let loads = Arc::new(AtomicUsize::new(0));
    let key = Fingerprint::of(&stmt(1), None);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            let loads = Arc::clone(&loads);
            let key = key.clone();
            tokio::spawn(async move {
                read_through(store.as_ref(), key, Duration::from_secs(60), None, move || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok::<_, OrmError>(rows(50).to_vec())
                })
                .await
            })
        })
        .collect();

    for task in tasks {
        let got = task.await.unwrap().unwrap();
        assert_eq!(got, rows(50));
    }

    let stats = store.stats();
    assert_eq!(stats.hits + stats.misses, 16);
    assert_eq!(loads.load(Ordering::SeqCst) as u64, stats.misses);
    assert!(stats.stores >= 1);
    assert_eq!(store.get(&key), Some(rows(50)));
}
