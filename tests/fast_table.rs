// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use fasttable::legacy::CellSerializerRegistry;
use fasttable::types::{
    ColumnDesc, DataCell, DataRow, DataType, DefaultRow, ExtensionCell, TableSpec,
};
use fasttable::{
    FastTable, FastTableEnv, LegacyRowContainerFactory, LoadContext, Settings, StorageError,
    StoreOptions, TableFilter,
};
use test_case::test_case;

fn env() -> FastTableEnv {
    FastTableEnv::new(StoreOptions::default_for_test())
}

fn build(
    env: &FastTableEnv,
    spec: TableSpec,
    is_row_key: bool,
    rows: &[DefaultRow],
) -> Arc<FastTable> {
    let mut container = LegacyRowContainerFactory
        .create(env, 42, spec, is_row_key)
        .unwrap();
    for row in rows {
        container.add_row(row).unwrap();
    }
    assert_eq!(container.size(), rows.len());
    container.close().unwrap();
    container.table().unwrap()
}

fn reload(env: &FastTableEnv, table: &FastTable, dir: &Path) -> FastTable {
    let data_file = dir.join("table.data");
    let record_file = dir.join("table.json");
    let mut settings = Settings::new();
    table.save_to_file(&data_file, &mut settings).unwrap();
    settings.save_to_file(&record_file).unwrap();

    let settings = Settings::load_from_file(&record_file).unwrap();
    let ctx = LoadContext::from_settings(&settings, data_file, table.table_id()).unwrap();
    FastTable::load(env, ctx).unwrap()
}

fn read_all(table: &FastTable, filter: &TableFilter) -> Vec<(Option<String>, Vec<DataCell>)> {
    table
        .iterator_with_filter(filter)
        .unwrap()
        .map(|row| {
            let row = row.unwrap();
            (row.try_key().map(|k| k.to_string()), row.cells().unwrap())
        })
        .collect()
}

fn r1_r2_table(env: &FastTableEnv) -> Arc<FastTable> {
    let spec = TableSpec::new(vec![
        ColumnDesc::new("n", DataType::Int),
        ColumnDesc::new("s", DataType::String),
    ]);
    build(
        env,
        spec,
        true,
        &[
            DefaultRow::new("r1", vec![1.into(), "a".into()]),
            DefaultRow::new("r2", vec![2.into(), "b".into()]),
        ],
    )
}

#[test]
fn test_full_and_partial_scenario() {
    let env = env();
    let table = r1_r2_table(&env);
    assert_eq!(
        read_all(&table, &TableFilter::all()),
        vec![
            (Some("r1".into()), vec![DataCell::Int(1), "a".into()]),
            (Some("r2".into()), vec![DataCell::Int(2), "b".into()]),
        ]
    );
    assert_eq!(
        read_all(&table, &TableFilter::materialize_columns([1])),
        vec![
            (Some("r1".into()), vec![DataCell::Unmaterialized, "a".into()]),
            (Some("r2".into()), vec![DataCell::Unmaterialized, "b".into()]),
        ]
    );
}

#[test_case(0, 1)]
#[test_case(3, 2)]
#[test_case(4, 5)]
#[test_case(17, 3)]
#[test_case(5, 0)]
fn test_rows_in_append_order(num_rows: usize, num_columns: usize) {
    let env = env();
    let spec: TableSpec = (0..num_columns)
        .map(|c| ColumnDesc::new(format!("c{c}"), DataType::Long))
        .collect();
    let rows: Vec<_> = (0..num_rows)
        .map(|r| {
            DefaultRow::without_key(
                (0..num_columns)
                    .map(|c| DataCell::Long((r * 100 + c) as i64))
                    .collect(),
            )
        })
        .collect();
    let table = build(&env, spec, false, &rows);
    assert_eq!(table.size(), num_rows);

    let read = read_all(&table, &TableFilter::all());
    assert_eq!(read.len(), num_rows);
    for (r, (key, cells)) in read.into_iter().enumerate() {
        assert!(key.is_none());
        assert_eq!(cells, rows[r].cells().unwrap());
    }

    let tempdir = tempfile::tempdir().unwrap();
    let loaded = reload(&env, &table, tempdir.path());
    assert_eq!(loaded.size(), num_rows);
    assert_eq!(read_all(&loaded, &TableFilter::all()).len(), num_rows);
}

#[test]
#[should_panic(expected = "row key requested, but not part of table")]
fn test_key_of_keyless_table() {
    let env = env();
    let spec = TableSpec::new(vec![ColumnDesc::new("b", DataType::Boolean)]);
    let table = build(&env, spec, false, &[DefaultRow::without_key(vec![true.into()])]);
    let row = table.iterator().unwrap().next().unwrap().unwrap();
    row.key();
}

#[test]
fn test_round_trip_all_types() {
    let env = env();
    let tempdir = tempfile::tempdir().unwrap();
    let spec = TableSpec::new(vec![
        ColumnDesc::new("i", DataType::Int),
        ColumnDesc::new("d", DataType::Double),
        ColumnDesc::new("l", DataType::Long),
        ColumnDesc::new("b", DataType::Boolean),
        ColumnDesc::new("s", DataType::String),
    ]);
    let rows = vec![
        DefaultRow::new(
            "Row0",
            vec![
                DataCell::Int(-1),
                DataCell::Double(2.5),
                DataCell::Long(i64::MAX),
                DataCell::Boolean(true),
                "text".into(),
            ],
        ),
        DefaultRow::new(
            "Row1",
            vec![
                DataCell::MISSING,
                DataCell::missing_with_cause("division by zero"),
                DataCell::MISSING,
                DataCell::missing_with_cause(""),
                DataCell::from("k".repeat(70_000)),
            ],
        ),
    ];
    let table = build(&env, spec, true, &rows);
    let expected: Vec<_> = rows
        .iter()
        .map(|row| (Some(row.key().to_string()), row.cells().unwrap()))
        .collect();
    assert_eq!(read_all(&table, &TableFilter::all()), expected);

    let loaded = reload(&env, &table, tempdir.path());
    assert_eq!(loaded.size(), 2);
    assert!(loaded.is_row_key());
    assert_eq!(loaded.spec(), table.spec());
    assert_eq!(read_all(&loaded, &TableFilter::all()), expected);
    loaded.clear();
    table.clear();
}

#[test]
fn test_partial_matches_full() {
    let env = env();
    let spec: TableSpec = ["a", "b", "c", "d"]
        .into_iter()
        .map(|name| ColumnDesc::new(name, DataType::Double))
        .collect();
    let rows: Vec<_> = (0..11)
        .map(|r| {
            DefaultRow::new(
                format!("Row{r}"),
                (0..4).map(|c| DataCell::Double((r * c) as f64)).collect(),
            )
        })
        .collect();
    let table = build(&env, spec, true, &rows);
    let full = read_all(&table, &TableFilter::all());

    for subset in [vec![0], vec![3], vec![1, 2], vec![0, 2, 3]] {
        let partial = read_all(&table, &TableFilter::materialize_columns(subset.clone()));
        assert_eq!(partial.len(), full.len());
        for ((key, cells), (full_key, full_cells)) in partial.iter().zip(&full) {
            assert_eq!(key, full_key);
            for c in 0..4 {
                match subset.contains(&c) {
                    true => assert_eq!(cells[c], full_cells[c]),
                    false => assert_eq!(cells[c], DataCell::Unmaterialized),
                }
            }
        }
    }
}

#[test]
fn test_empty_projection_does_not_open_store() {
    let env = env();
    let tempdir = tempfile::tempdir().unwrap();
    let spec = TableSpec::new(vec![ColumnDesc::new("s", DataType::String)]);
    let rows: Vec<_> = (0..6)
        .map(|r| DefaultRow::without_key(vec![format!("v{r}").into()]))
        .collect();
    let table = build(&env, spec, false, &rows);
    let loaded = reload(&env, &table, tempdir.path());

    let read = read_all(&loaded, &TableFilter::materialize_columns(std::iter::empty()));
    assert_eq!(read.len(), 6);
    assert!(read
        .iter()
        .all(|(key, cells)| key.is_none() && cells == &[DataCell::Unmaterialized]));
    assert!(!loaded.is_open());

    // a projection with columns opens the store
    assert_eq!(read_all(&loaded, &TableFilter::materialize_columns([0])).len(), 6);
    assert!(loaded.is_open());
}

#[test]
fn test_many_cell_classes_round_trip() {
    const NUM_CLASSES: usize = 120;
    let mut serializers = CellSerializerRegistry::default();
    for i in 0..NUM_CLASSES {
        serializers.register_extension(&format!("ext{i}"));
    }
    let env = env().with_serializers(serializers);
    let tempdir = tempfile::tempdir().unwrap();

    let spec = TableSpec::new(vec![ColumnDesc::new("v", DataType::Double)]);
    let cell = |i: usize| {
        DataCell::Extension(ExtensionCell::new(
            format!("ext{i}"),
            Some(i as f64),
            Bytes::from(format!("payload {i}")),
        ))
    };
    // classes appear in reverse order so that tags differ from class indices
    let rows: Vec<_> = (0..NUM_CLASSES)
        .rev()
        .map(|i| DefaultRow::without_key(vec![cell(i)]))
        .collect();
    let table = build(&env, spec, false, &rows);
    let loaded = reload(&env, &table, tempdir.path());

    let read = read_all(&loaded, &TableFilter::all());
    assert_eq!(read.len(), NUM_CLASSES);
    for ((_, cells), i) in read.iter().zip((0..NUM_CLASSES).rev()) {
        assert_eq!(cells[0], cell(i));
        assert_eq!(cells[0].class_name(), Some(format!("ext{i}").as_str()));
    }
}

#[test]
fn test_foreign_cells_keep_exact_type() {
    let env = env();
    let tempdir = tempfile::tempdir().unwrap();
    let spec = TableSpec::new(vec![
        ColumnDesc::new("d", DataType::Double),
        ColumnDesc::new("s", DataType::String),
    ]);
    let rows = vec![
        DefaultRow::without_key(vec![DataCell::Int(7), DataCell::Long(8)]),
        DefaultRow::without_key(vec![DataCell::Long(9), DataCell::Boolean(false)]),
        DefaultRow::without_key(vec![DataCell::Double(1.5), "plain".into()]),
    ];
    let table = build(&env, spec, false, &rows);
    let loaded = reload(&env, &table, tempdir.path());
    for t in [table.as_ref(), &loaded] {
        let cells: Vec<_> = read_all(t, &TableFilter::all())
            .into_iter()
            .map(|(_, cells)| cells)
            .collect();
        assert_eq!(
            cells,
            rows.iter().map(|r| r.cells().unwrap()).collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_unsupported_columns_are_rejected() {
    let env = env();
    let spec = TableSpec::new(vec![ColumnDesc::new(
        "shape",
        DataType::Extension("polygon".into()),
    )]);
    assert!(!LegacyRowContainerFactory.supports(&spec));
    let err = LegacyRowContainerFactory
        .create(&env, 1, spec, false)
        .err()
        .unwrap();
    assert!(matches!(
        err.kind(),
        StorageError::UnsupportedColumnType { .. }
    ));
}

#[test]
fn test_corrupted_data_file() {
    let env = env();
    let tempdir = tempfile::tempdir().unwrap();
    let table = r1_r2_table(&env);
    let loaded = reload(&env, &table, tempdir.path());
    std::fs::write(tempdir.path().join("table.data"), b"garbage").unwrap();
    let err = loaded.iterator().err().unwrap();
    assert!(matches!(err.kind(), StorageError::WithPath { .. }));
}

#[test]
fn test_concurrent_readers() {
    let env = env();
    let tempdir = tempfile::tempdir().unwrap();
    let spec = TableSpec::new(vec![ColumnDesc::new("n", DataType::Int)]);
    let rows: Vec<_> = (0..50)
        .map(|r| DefaultRow::new(format!("Row{r}"), vec![DataCell::Int(r)]))
        .collect();
    let table = build(&env, spec, true, &rows);
    let loaded = reload(&env, &table, tempdir.path());

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| read_all(&loaded, &TableFilter::all())))
            .collect();
        for handle in handles {
            let read = handle.join().unwrap();
            assert_eq!(read.len(), 50);
            assert_eq!(read[49].1, vec![DataCell::Int(49)]);
        }
    });
}
