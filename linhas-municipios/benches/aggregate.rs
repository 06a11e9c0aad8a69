//! Benchmarks de l'agrégation sur une table consolidée synthétique

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use linhas_geo::VoltageClass;
use linhas_municipios::aggregate::stats;
use linhas_municipios::export::csv::{consolidated_rows, parse_table, to_bytes, CONSOLIDATED_HEADERS};
use linhas_municipios::render::html;
use linhas_municipios::{Affectation, Config, ConsolidatedTable, Summary};

const STATES: [&str; 3] = ["PR", "SC", "RS"];
const VOLTAGES: [u32; 5] = [230, 500, 525, 600, 765];

/// `municipalities` communes réparties sur trois États, chacune touchée
/// par une à trois tensions, plus la couche de base
fn table(municipalities: usize) -> ConsolidatedTable {
    let mut rows = Vec::new();
    for i in 0..municipalities {
        let state = STATES[i % STATES.len()];
        let name = format!("Município {}", i);
        for k in 0..(1 + i % 3) {
            let kv = VOLTAGES[(i + k) % VOLTAGES.len()];
            rows.push(Affectation::new(&name, None, VoltageClass::Kv(kv), state));
        }
        rows.push(Affectation::new(&name, None, VoltageClass::Base, state));
    }
    ConsolidatedTable::from_rows(rows)
}

fn bench_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("summary");
    for size in [500, 5_000] {
        let t = table(size);
        group.throughput(Throughput::Elements(t.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &t, |b, t| {
            b.iter(|| Summary::compute(black_box(t)))
        });
    }
    group.finish();
}

fn bench_csv(c: &mut Criterion) {
    let t = table(5_000);
    let bytes = to_bytes(&CONSOLIDATED_HEADERS, consolidated_rows(&t)).unwrap();
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let mut group = c.benchmark_group("csv");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("write_consolidated", |b| {
        b.iter(|| to_bytes(&CONSOLIDATED_HEADERS, consolidated_rows(black_box(&t))).unwrap())
    });
    group.bench_function("parse_consolidated", |b| {
        b.iter(|| parse_table(black_box(&text)).unwrap())
    });
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let config = Config::from_preset("default").unwrap();
    let t = table(2_000);

    c.bench_function("complete_table", |b| {
        b.iter(|| stats::complete_table(black_box(&t)))
    });
    c.bench_function("render_dashboard", |b| {
        b.iter(|| {
            html::render_dashboard(
                black_box(&t),
                &config,
                "2026-01-01 10:00",
                &html::DashboardExtras::static_report(),
            )
        })
    });
}

criterion_group!(benches, bench_summary, bench_csv, bench_render);
criterion_main!(benches);
