use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fluentdb::DatabaseKind;
use fluentdb::session::compile::{SelectParts, classify, compile_insert, compile_select};

fn fields(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("t.col{i}")).collect()
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/select");

    for n in [1, 5, 20, 100] {
        let fields = fields(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &fields, |b, fields| {
            b.iter(|| {
                let parts = SelectParts {
                    fields,
                    from: "book t",
                    where_clause: "t.col0 = ?",
                    order_by: "t.col0",
                    max_results: 50,
                    ..SelectParts::default()
                };
                black_box(compile_select(DatabaseKind::PostgreSql.dialect(), &parts))
            });
        });
    }

    group.finish();
}

fn bench_select_per_dialect(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/select_per_dialect");
    let fields = fields(10);

    for kind in DatabaseKind::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, kind| {
            b.iter(|| {
                let parts = SelectParts {
                    fields: &fields,
                    from: "book t",
                    where_clause: "t.col0 > ?",
                    max_results: 10,
                    schema: "app",
                    ..SelectParts::default()
                };
                black_box(compile_select(kind.dialect(), &parts))
            });
        });
    }

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/insert");

    for n in [5, 20, 100] {
        let fields = fields(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &fields, |b, fields| {
            b.iter(|| black_box(compile_insert(DatabaseKind::H2.dialect(), "", "book", fields)));
        });
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let sql = "/* report */ -- nightly\n  (select b.id, b.updated_at from book b where b.deleted = false)";
    c.bench_function("compile/classify", |b| b.iter(|| black_box(classify(black_box(sql)))));
}

criterion_group!(
    benches,
    bench_select,
    bench_select_per_dialect,
    bench_insert,
    bench_classify
);
criterion_main!(benches);
