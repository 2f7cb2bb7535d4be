use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hookqb::{Builder, CompiledStatement, Connection, Db, Fingerprint, OrmResult, Row, Value};

/// Compiles only; every primitive is unreachable from these benchmarks.
struct NoConnection;

impl Connection for NoConnection {
    fn table_prefix(&self) -> &str {
        "app_"
    }

    async fn select(&self, _sql: &str, _bindings: &[Value]) -> OrmResult<Vec<Row>> {
        Ok(Vec::new())
    }

    async fn insert(&self, _sql: &str, _bindings: &[Value]) -> OrmResult<u64> {
        Ok(0)
    }

    async fn update(&self, _sql: &str, _bindings: &[Value]) -> OrmResult<u64> {
        Ok(0)
    }

    async fn delete(&self, _sql: &str, _bindings: &[Value]) -> OrmResult<u64> {
        Ok(0)
    }

    async fn statement(&self, _sql: &str, _bindings: &[Value]) -> OrmResult<bool> {
        Ok(true)
    }

    async fn unprepared(&self, _sql: &str) -> OrmResult<bool> {
        Ok(true)
    }
}

/// select * from app_t where col0 = ? and col1 = ? ... and app_t.deleted_at is null
fn build_query(db: &Db<NoConnection>, n: usize) -> Builder<'_, NoConnection> {
    let mut q = db.table("t");
    for i in 0..n {
        q = q.where_eq(format!("col{i}"), i as i64);
    }
    q.order_by("col0").for_page(3, 50)
}

fn bench_compile_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/select");
    let db = Db::new(NoConnection);

    for n in [1, 5, 10, 50, 100] {
        let q = build_query(&db, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &q, |b, q| {
            b.iter(|| black_box(q.to_statement()));
        });
    }

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/fingerprint");
    let db = Db::new(NoConnection);

    for n in [1, 10, 100] {
        let stmt = build_query(&db, n).to_statement();
        group.bench_with_input(BenchmarkId::from_parameter(n), &stmt, |b, stmt| {
            b.iter(|| black_box(Fingerprint::of(stmt, Some("t"))));
        });
    }

    group.finish();
}

fn bench_to_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/to_query");

    for n in [1, 10, 100] {
        let sql = vec!["c = ?"; n].join(" and ");
        let bindings: Vec<Value> = (0..n)
            .map(|i| if i % 2 == 0 { Value::Int(i as i64) } else { Value::from("it's") })
            .collect();
        let stmt = CompiledStatement::new(sql, bindings);
        group.bench_with_input(BenchmarkId::from_parameter(n), &stmt, |b, stmt| {
            b.iter(|| black_box(stmt.to_query()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile_select, bench_fingerprint, bench_to_query);
criterion_main!(benches);
