//! Benchmarks for question translation and record conversion
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gridlens::convert::{convert, encode_batch, DatasetType, Record, RecordValue};
use gridlens::translate::{FixedClock, QueryLanguage, TranslationContext, Translator};
use std::sync::Arc;

const QUESTIONS: [&str; 4] = [
    "Show hydro generation in the southeast over the last 7 days",
    "Compare demand between the south and the northeast yesterday",
    "What was the capacity factor of wind in the northeast last month?",
    "Top 5 consumption peaks this week",
];

fn create_test_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let mut record = Record::new();
            record.insert(
                "timestamp".to_string(),
                RecordValue::Text(format!("2024-01-01T{:02}:00:00Z", i % 24)),
            );
            record.insert("region".to_string(), RecordValue::Text("sudeste".to_string()));
            record.insert("source".to_string(), RecordValue::Text("hidráulica".to_string()));
            record.insert("value".to_string(), RecordValue::Number(i as f64 * 1.5));
            record.insert("unit".to_string(), RecordValue::Text("MW".to_string()));
            record
        })
        .collect()
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");

    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    let translator = Translator::default().with_clock(Arc::new(clock));
    let context = TranslationContext::default();

    for language in [QueryLanguage::Flux, QueryLanguage::InfluxQl] {
        group.bench_function(format!("questions_{}", language), |b| {
            b.iter(|| {
                for question in QUESTIONS {
                    let _ = translator.translate(black_box(question), language, &context);
                }
            })
        });
    }

    group.finish();
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");

    for size in [100, 1000, 10000] {
        let records = create_test_records(size);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("convert_{}", size), |b| {
            b.iter(|| convert(black_box(&records), DatasetType::Generation))
        });

        let conversion = convert(&records, DatasetType::Generation);

        group.bench_function(format!("line_protocol_{}", size), |b| {
            b.iter(|| encode_batch(black_box(&conversion.points)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_translate, bench_convert);
criterion_main!(benches);
