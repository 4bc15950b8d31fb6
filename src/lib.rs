//! # Smelt - flatten JSON columns in delimited files
//!
//! Some exports store whole JSON objects inside CSV cells. Smelt reads such
//! files (plain, gzip or zip) and turns every JSON-typed column into one flat
//! column per nested key, named `<column>.<key>`.
//!
//! ## Modules
//!
//! - **source**: read delimited files into tables, whole or in batches
//! - **flatten**: expand JSON-typed columns
//! - **table**: the column-major table model and its writers
//!
//! ## Quick Start
//!
//! ```rust
//! use smelt::{flatten, Column, Table};
//! use serde_json::json;
//!
//! # fn main() -> smelt::Result<()> {
//! let table = Table::new(vec![
//!     Column::new("fullVisitorId", vec![json!("0123"), json!("0456")]),
//!     Column::new("device", vec![
//!         json!(r#"{"browser": "Chrome", "isMobile": false}"#),
//!         json!(r#"{"browser": "Safari", "operatingSystem": "iOS"}"#),
//!     ]),
//! ])?;
//!
//! let flat = flatten(table, &["device"])?;
//!
//! // fullVisitorId, device.browser, device.isMobile, device.operatingSystem
//! assert_eq!(flat.num_columns(), 4);
//! assert!(flat.is_missing(0, "device.operatingSystem"));
//! # Ok(())
//! # }
//! ```
//!
//! Whole files go through [`load`] or, batch by batch, [`generate`].

use std::path::Path;
use tracing::info;

pub mod error;
pub mod flatten;
pub mod source;
pub mod table;

// Re-export commonly used types for convenience
pub use error::{FlattenError, Result};
pub use flatten::{
    detect_json_columns, flatten, CollisionPolicy, ColumnPlacement, FlattenConfig, Flattener,
};
pub use source::{Batches, Compression, ReadOptions, RowSource};
pub use table::{Column, Table, TableFormat, TableWriter};

/// Read up to `options.nrows` rows of `path` and flatten them as one table
pub fn load(path: impl AsRef<Path>, options: &ReadOptions, config: &FlattenConfig) -> Result<Table> {
    let source = RowSource::open(path, reader_options(options, config))?;
    let table = Flattener::new(config.clone()).flatten(source.read_all()?)?;

    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "loaded flattened table"
    );
    Ok(table)
}

/// Open `path` for batch-wise reading; each batch is flattened on its own
/// as it is pulled from the returned iterator.
pub fn generate(
    path: impl AsRef<Path>,
    options: &ReadOptions,
    config: &FlattenConfig,
) -> Result<FlattenedBatches> {
    let source = RowSource::open(path, reader_options(options, config))?;
    Ok(FlattenedBatches {
        batches: source.batches(),
        flattener: Flattener::new(config.clone()),
        done: false,
    })
}

/// JSON-typed columns must reach the flattener exactly as written
fn reader_options(options: &ReadOptions, config: &FlattenConfig) -> ReadOptions {
    let mut options = options.clone();
    for column in &config.json_columns {
        if !options.raw_columns.contains(column) {
            options.raw_columns.push(column.clone());
        }
    }
    options
}

/// Lazy sequence of flattened batches, in file order.
///
/// Not restartable; stops for good after the first error. Batches may differ
/// in their flattened columns, see [`Table::concat`].
pub struct FlattenedBatches {
    batches: Batches,
    flattener: Flattener,
    done: bool,
}

impl FlattenedBatches {
    pub fn config(&self) -> &FlattenConfig {
        self.flattener.config()
    }
}

impl Iterator for FlattenedBatches {
    type Item = Result<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let flattened = match self.batches.next()? {
            Ok(batch) => self.flattener.flatten(batch),
            Err(e) => Err(e),
        };
        if flattened.is_err() {
            self.done = true;
        }
        Some(flattened)
    }
}

impl std::iter::FusedIterator for FlattenedBatches {}
