//! Performance benchmarks for value normalization
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use form_fill_mcp_server::fill::normalize;
use form_fill_mcp_server::FieldValueMap;

/// A generated answer for a typical bill of sale form
fn bill_of_sale() -> FieldValueMap {
    [
        ("Month", "March"),
        ("Day", "7"),
        ("Year", "2024"),
        ("Year-1", ""),
        ("Print seller's name", "Jane Doe"),
        ("Seller print name 1", "Jane Doe"),
        ("Seller print name 2", "John Doe"),
        ("Seller Address 2", "12 Oak St"),
        ("Buyer name", "Sam Lee"),
        ("Buyer name 2", "Sam Lee"),
        ("Seller State", ""),
        ("Sell zip", "10001"),
    ]
    .into_iter()
    .collect()
}

/// A form with `n` extra text fields beside the normalized ones
fn wide_form(n: usize) -> FieldValueMap {
    let mut values = bill_of_sale();
    for i in 0..n {
        values.insert(format!("Item {}", i), format!("Value {}", i));
        values.insert(format!("Item {} 2", i), String::new());
    }
    values
}

fn bench_normalize(c: &mut Criterion) {
    let values = bill_of_sale();

    c.bench_function("normalize_bill_of_sale", |b| {
        b.iter(|| normalize(black_box(values.clone())));
    });
}

fn bench_normalize_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_wide");

    for count in [10, 100, 500] {
        let values = wide_form(count);
        group.throughput(Throughput::Elements(values.len() as u64));
        group.bench_with_input(BenchmarkId::new("fields", count), &values, |b, values| {
            b.iter(|| normalize(black_box(values.clone())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_normalize_wide);
criterion_main!(benches);
