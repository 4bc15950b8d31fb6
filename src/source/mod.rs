//! Row sources
//!
//! Reads delimited text, plain or compressed, into [`Table`](crate::table::Table)s
//! either all at once or in fixed-size batches. Identifier columns are kept as
//! text and JSON-typed columns are left as unparsed strings.

pub mod compression;
pub mod reader;

pub use compression::{open_input, Compression};
pub use reader::{
    Batches, ReadOptions, RowSource, DEFAULT_BATCH_SIZE, DEFAULT_NROWS, DEFAULT_TEXT_COLUMNS,
};
