//! In-memory tables
//!
//! A column-major representation of delimited records plus a writer that
//! serializes tables back out as CSV or newline-delimited JSON.

pub mod types;
pub mod writer;

pub use types::{Column, Table};
pub use writer::{TableFormat, TableWriter};
