// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Inspect saved fast tables.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use fasttable::fast_table::{
    load_table_spec, CFG_TABLE_DERIVED_SETTINGS, CFG_TABLE_ID, CFG_TABLE_SPEC,
    FAST_TABLE_CONTAINER_SIZE, FAST_TABLE_CONTAINER_TYPE, FAST_TABLE_MAPPING_TYPE,
    FAST_TABLE_SCHEMA,
};
use fasttable::legacy::TABLE_SCHEMA_MAPPING_ROWKEY;
use fasttable::types::DataRow;
use fasttable::{FastTable, FastTableEnv, LoadContext, Settings, TableFilter};
use itertools::Itertools;
use tracing::level_filters::LevelFilter;
use tracing::info;
use tracing_subscriber::filter;
use tracing_subscriber::prelude::*;

/// Inspect fast tables saved as a settings record and a chunk file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the description of a saved table.
    Info {
        /// Settings record written when the table was saved.
        record: PathBuf,
    },
    /// Print the rows of a saved table.
    Dump {
        /// Settings record written when the table was saved.
        record: PathBuf,
        /// Chunk file holding the table data.
        data_file: PathBuf,
        /// Only materialize these data columns.
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<usize>>,
        /// Stop after this many rows.
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn info(record: &Settings) -> Result<()> {
    let spec = load_table_spec(record.get_section(CFG_TABLE_SPEC)?)?;
    let derived = record.get_section(CFG_TABLE_DERIVED_SETTINGS)?;
    let schema = derived.get_section(FAST_TABLE_SCHEMA)?;
    println!("table id:    {}", record.get_long(CFG_TABLE_ID)?);
    println!("rows:        {}", derived.get_long(FAST_TABLE_CONTAINER_SIZE)?);
    println!("row key:     {}", schema.get_bool(TABLE_SCHEMA_MAPPING_ROWKEY)?);
    println!("store:       {}", derived.get_string(FAST_TABLE_CONTAINER_TYPE)?);
    println!("mapping:     {}", derived.get_string(FAST_TABLE_MAPPING_TYPE)?);
    println!("columns:");
    for (i, column) in spec.columns().iter().enumerate() {
        println!("  {i}: {} {}", column.name, column.data_type);
    }
    Ok(())
}

fn dump(
    record: &Settings,
    data_file: PathBuf,
    columns: Option<Vec<usize>>,
    limit: Option<usize>,
) -> Result<()> {
    let env = FastTableEnv::default();
    let table_id = record.get_long(CFG_TABLE_ID)?;
    let table = FastTable::load(&env, LoadContext::from_settings(record, data_file, table_id)?)?;
    let filter = match columns {
        Some(columns) => TableFilter::materialize_columns(columns),
        None => TableFilter::all(),
    };
    println!("{}", table.spec().columns().iter().map(|c| &c.name).join("\t"));
    let mut iter = table.iterator_with_filter(&filter)?;
    let mut printed = 0;
    for row in iter.by_ref().take(limit.unwrap_or(usize::MAX)) {
        let row = row?;
        let cells = row.cells()?.iter().join("\t");
        match row.try_key() {
            Some(key) => println!("{key}\t{cells}"),
            None => println!("{cells}"),
        }
        printed += 1;
    }
    iter.close();
    info!(rows = printed, total = table.size(), "dump finished");
    table.clear();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr);
    let filter_layer =
        filter::EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    match args.command {
        Command::Info { record } => info(&Settings::load_from_file(record)?),
        Command::Dump {
            record,
            data_file,
            columns,
            limit,
        } => {
            if limit == Some(0) {
                bail!("--limit must be positive");
            }
            dump(&Settings::load_from_file(record)?, data_file, columns, limit)
        }
    }
}
