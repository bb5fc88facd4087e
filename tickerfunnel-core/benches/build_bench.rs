//! Criterion benchmarks for the build stage hot paths.
//!
//! Benchmarks:
//! 1. Percentile scoring across a filtered universe
//! 2. Prefix index construction over symbols and company names
//! 3. Metadata document assembly and serialization

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tickerfunnel_core::artifacts::{build_metadata, build_prefix_index};
use tickerfunnel_core::domain::{Fundamentals, ScoringInput};
use tickerfunnel_core::scoring::score_universe;

// ── Helpers ──────────────────────────────────────────────────────────

const WORDS: [&str; 8] = [
    "Global", "Holdings", "Energy", "Systems", "Bancorp", "Therapeutics", "Industries", "Capital",
];

fn symbol(i: usize) -> String {
    let mut n = i;
    let mut s = String::new();
    for _ in 0..4 {
        s.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    s
}

fn make_inputs(n: usize) -> Vec<ScoringInput> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let price = 10.0 + (x * 0.37).sin().abs() * 200.0;
            ScoringInput {
                symbol: symbol(i),
                name: format!("{} {} Inc.", WORDS[i % WORDS.len()], WORDS[(i / 3) % WORDS.len()]),
                exchange: if i % 2 == 0 { "NASDAQ" } else { "NYSE" }.into(),
                price,
                volume: 100_000 + (i as i64 * 7_919) % 5_000_000,
                fundamentals: Fundamentals {
                    market_cap: Some(1e8 + x * 1e7),
                    dividend_yield: (i % 3 != 0).then(|| (x * 0.013).cos().abs() * 0.06),
                    beta: Some(0.5 + (x * 0.11).sin().abs() * 1.5),
                    rsi_14: (i % 5 != 0).then(|| 20.0 + (x * 0.7).sin().abs() * 60.0),
                    ma_200: Some(price * (0.9 + (x * 0.05).cos().abs() * 0.2)),
                    ma_50: Some(price),
                    sector: Some("Technology".into()),
                    ..Default::default()
                },
            }
        })
        .collect()
}

// ── 1. Scoring ───────────────────────────────────────────────────────

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_universe");
    for &n in &[500usize, 3_000] {
        let inputs = make_inputs(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &inputs, |b, inputs| {
            b.iter(|| score_universe(black_box(inputs)))
        });
    }
    group.finish();
}

// ── 2. Prefix Index ──────────────────────────────────────────────────

fn bench_prefix_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefix_index");
    for &n in &[500usize, 3_000] {
        let inputs = make_inputs(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &inputs, |b, inputs| {
            b.iter(|| {
                build_prefix_index(
                    black_box(inputs)
                        .iter()
                        .map(|i| (i.symbol.as_str(), i.name.as_str())),
                )
            })
        });
    }
    group.finish();
}

// ── 3. Metadata ──────────────────────────────────────────────────────

fn bench_metadata(c: &mut Criterion) {
    let inputs = make_inputs(3_000);
    let scores = score_universe(&inputs);
    c.bench_function("metadata_3000_serialize", |b| {
        b.iter(|| {
            let doc = build_metadata(black_box(&inputs), black_box(&scores));
            serde_json::to_vec(&doc).map(|v| v.len()).unwrap_or(0)
        })
    });
}

criterion_group!(benches, bench_scoring, bench_prefix_index, bench_metadata);
criterion_main!(benches);
