// SPDX-License-Identifier: Apache-2.0

use criterion::Throughput;
use criterion::{Criterion, criterion_group, criterion_main};
use secevent::exporters::securityevent::{EventBatch, EventConverter, SecurityEventExporterConfig};
use utilities::otlp::FakeOTLP;

fn convert_logs(c: &mut Criterion) {
    let converter =
        EventConverter::new(SecurityEventExporterConfig::default().default_attributes);

    let input = [
        ("small", FakeOTLP::resource_logs(1)),
        ("medium", FakeOTLP::resource_logs(100)),
        ("large", FakeOTLP::resource_logs(1000)),
    ];

    let mut group = c.benchmark_group("convert_logs");
    for (name, rl) in input.iter() {
        let resource_attrs = rl
            .resource
            .as_ref()
            .map(|r| r.attributes.as_slice())
            .unwrap_or_default();
        let records = &rl.scope_logs[0].log_records;

        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_function(format!("convert {}", name), |b| {
            b.iter(|| {
                let mut batch = EventBatch::new();
                for record in records {
                    if let Ok(event) = converter.convert(record, resource_attrs) {
                        batch.add_event(event);
                    }
                }
                batch
            })
        });
        group.bench_function(format!("convert and encode {}", name), |b| {
            b.iter(|| {
                let mut batch = EventBatch::new();
                for record in records {
                    if let Ok(event) = converter.convert(record, resource_attrs) {
                        batch.add_event(event);
                    }
                }
                batch.to_json()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, convert_logs);
criterion_main!(benches);
