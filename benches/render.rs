use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;

use systemsp::{PointInfo, Policy, Reading, ReadingTemplate, Registry, SystemStatusNotifier};

fn exchanged_data(points: usize) -> String {
    let datapoints: Vec<_> = (0..points)
        .map(|i| {
            json!({
                "label": format!("TS-{i}"),
                "pivot_id": format!("M_2367_3_15_{i}"),
                "pivot_type": if i % 2 == 0 { "SpsTyp" } else { "DpsTyp" },
                "pivot_subtypes": ["acces", "prt.inf"],
                "ts_syst_cycle": 30,
                "protocols": [{ "name": "IEC104", "typeid": "M_SP_NA_1", "address": format!("{i}") }]
            })
        })
        .collect();
    json!({ "exchanged_data": { "datapoints": datapoints } }).to_string()
}

fn bench_import(c: &mut Criterion) {
    let raw = exchanged_data(256);
    let mut group = c.benchmark_group("render");
    group.throughput(Throughput::Elements(256));
    group.bench_function("import_256_datapoints", |b| {
        b.iter(|| {
            let mut registry = Registry::new();
            black_box(registry.import(black_box(&raw)).unwrap());
        });
    });
    group.finish();
}

fn bench_fill(c: &mut Criterion) {
    let template = ReadingTemplate::new(Policy::Event);
    let point = PointInfo::new("M_2367_3_15_4", "DpsTyp", "TS-1");

    let mut group = c.benchmark_group("render");
    group.throughput(Throughput::Elements(1));
    group.bench_function("fill_template", |b| {
        b.iter(|| black_box(template.fill(black_box(&point), 1_700_000_000_123, true).unwrap()));
    });
    group.finish();
}

fn bench_notify_broadcast(c: &mut Criterion) {
    let notifier = SystemStatusNotifier::new();
    notifier.register_sink(Arc::new(|reading: Reading| {
        black_box(reading);
    }));
    notifier.set_enabled(true);
    notifier.set_json_config(&exchanged_data(64)).unwrap();
    notifier.stop_cycles();

    let mut group = c.benchmark_group("render");
    group.throughput(Throughput::Elements(64));
    group.bench_function("notify_64_event_points", |b| {
        b.iter(|| black_box(notifier.notify(r#"{"asset": "prt.inf", "reason": "connected"}"#)));
    });
    group.finish();
}

criterion_group!(render, bench_import, bench_fill, bench_notify_broadcast);
criterion_main!(render);
