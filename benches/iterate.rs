// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use criterion::*;
use fasttable::types::{ColumnDesc, DataCell, DataRow, DataType, DefaultRow, TableSpec};
use fasttable::{FastTable, FastTableEnv, LegacyRowContainerFactory, StoreOptions, TableFilter};

const NUM_COLUMNS: usize = 8;

fn build_table(rows: usize) -> Arc<FastTable> {
    let env = FastTableEnv::new(StoreOptions::default().with_chunk_size(4096));
    let spec: TableSpec = (0..NUM_COLUMNS)
        .map(|i| match i % 2 {
            0 => ColumnDesc::new(format!("d{i}"), DataType::Double),
            _ => ColumnDesc::new(format!("s{i}"), DataType::String),
        })
        .collect();
    let mut container = LegacyRowContainerFactory
        .create(&env, 0, spec, true)
        .unwrap();
    for r in 0..rows {
        let cells = (0..NUM_COLUMNS)
            .map(|i| match i % 2 {
                0 => DataCell::Double(r as f64),
                _ => DataCell::from(format!("value {r}")),
            })
            .collect();
        container
            .add_row(&DefaultRow::new(format!("Row{r}"), cells))
            .unwrap();
    }
    container.close().unwrap();
    container.table().unwrap()
}

fn iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");
    for rows in [1024, 65536] {
        let table = build_table(rows);
        let filters = [
            ("full", TableFilter::all()),
            ("partial", TableFilter::materialize_columns([0, 3])),
            ("empty", TableFilter::materialize_columns(std::iter::empty())),
        ];
        for (name, filter) in filters {
            group.bench_with_input(BenchmarkId::new(name, rows), &filter, |b, filter| {
                b.iter(|| {
                    for row in table.iterator_with_filter(filter).unwrap() {
                        let row = row.unwrap();
                        black_box(row.cells().unwrap());
                    }
                });
            });
        }
        table.clear();
    }
    group.finish();
}

criterion_group!(benches, iterate);
criterion_main!(benches);
