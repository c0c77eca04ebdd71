// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Columnar storage of row-oriented cells.
//!
//! Every data column is stored as a primitive chunk plus a supplementary
//! binary chunk. Cells of the column's own type only touch the primitive
//! chunk. Cells of any other class are serialized into the supplement behind
//! a one-byte tag from the table's [`DataCellSerMap`].

mod column_spec;
mod mapping;
mod row_container;
mod schema_mapping;
mod ser_map;
mod serializer;

pub use self::column_spec::*;
pub use self::mapping::*;
pub use self::row_container::*;
pub use self::schema_mapping::*;
pub use self::ser_map::*;
pub use self::serializer::*;
