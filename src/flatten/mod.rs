//! JSON column flattening
//!
//! Expands columns whose cells are serialized JSON objects into one flat
//! column per nested key, named `<column>.<key>`. The expanded columns are
//! merged back by row position so row count and row order never change.
//!
//! The key set of each column is the union over the rows being flattened.
//! When flattening batch by batch, two batches may therefore come out with
//! different columns; `Table::concat` reconciles them.

pub mod types;
pub mod flattener;
pub mod detect;

pub use types::{CollisionPolicy, ColumnPlacement, FlattenConfig, DEFAULT_JSON_COLUMNS};
pub use flattener::{flatten, Flattener};
pub use detect::detect_json_columns;
