use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polars::prelude::*;
use sisser_analytics::columns::*;
use sisser_analytics::{compute_aggregates, state_view};

const STATES: [&str; 6] = ["GO", "MT", "MS", "PR", "RS", "SP"];
const COMPANIES: [&str; 4] = ["Aliança", "Brasilseg", "Essor", "Mapfre"];

/// Text-typed records shaped like the filtered snapshot.
fn synthetic_records(rows: usize) -> DataFrame {
    let policies: Vec<String> = (0..rows).map(|i| format!("{}", i / 2)).collect();
    let companies: Vec<&str> = (0..rows).map(|i| COMPANIES[i % COMPANIES.len()]).collect();
    let states: Vec<&str> = (0..rows).map(|i| STATES[i % STATES.len()]).collect();
    let towns: Vec<String> = (0..rows).map(|i| format!("Municipio {}", i % 300)).collect();
    let areas: Vec<String> = (0..rows).map(|i| format!("{},{}", i % 500, i % 10)).collect();
    let premiums: Vec<String> = (0..rows).map(|i| format!("{},25", (i * 7) % 9000)).collect();
    let others: Vec<String> = (0..rows).map(|i| format!("{},5", i % 40)).collect();

    df!(
        POLICY => policies,
        COMPANY => companies,
        STATE => states,
        MUNICIPALITY => towns,
        AREA => areas,
        PREMIUM => premiums,
        GUARANTEE_LIMIT => others.clone(),
        ESTIMATED_PRODUCTIVITY => others.clone(),
        INSURED_PRODUCTIVITY => others.clone(),
        FEDERAL_SUBSIDY => others
    )
    .unwrap()
}

fn benchmark_compute_aggregates(c: &mut Criterion) {
    let records = synthetic_records(50_000);

    c.bench_function("compute_aggregates_50k", |b| {
        b.iter(|| black_box(compute_aggregates(black_box(&records)).unwrap()));
    });
}

fn benchmark_state_view(c: &mut Criterion) {
    let records = synthetic_records(50_000);
    let bundle = compute_aggregates(&records).unwrap();

    c.bench_function("state_view_mt_top10", |b| {
        b.iter(|| black_box(state_view(&records, &bundle, "MT", 10).unwrap()));
    });
}

criterion_group!(benches, benchmark_compute_aggregates, benchmark_state_view);
criterion_main!(benches);
