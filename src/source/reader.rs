use crate::error::Result;
use crate::source::compression::{open_input, Compression};
use crate::table::{Column, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::io::Read;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_NROWS: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Identifier columns that must never be read as numbers
pub const DEFAULT_TEXT_COLUMNS: [&str; 1] = ["fullVisitorId"];

/// How to read a delimited file into tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub delimiter: u8,

    /// First record names the columns; otherwise columns are named `0`, `1`, ...
    pub has_headers: bool,

    /// Maximum number of data rows to read (`None` reads the whole file)
    pub nrows: Option<usize>,

    /// Rows per batch in batch mode (values below 1 are treated as 1)
    pub batch_size: usize,

    /// Explicit compression; guessed from the extension when unset
    pub compression: Option<Compression>,

    /// Columns kept as text; empty cells become `Null`
    pub text_columns: Vec<String>,

    /// Columns kept verbatim, empty cells included
    pub raw_columns: Vec<String>,

    /// Type the remaining columns as numbers or booleans where every cell allows it
    pub infer_scalars: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            delimiter: b',',
            has_headers: true,
            nrows: Some(DEFAULT_NROWS),
            batch_size: DEFAULT_BATCH_SIZE,
            compression: None,
            text_columns: DEFAULT_TEXT_COLUMNS.iter().map(|s| s.to_string()).collect(),
            raw_columns: Vec::new(),
            infer_scalars: true,
        }
    }
}

/// An open delimited file producing rows in file order
pub struct RowSource {
    path: PathBuf,
    reader: csv::Reader<Box<dyn Read>>,
    headers: Vec<String>,
    options: ReadOptions,
    rows_read: usize,
}

impl RowSource {
    pub fn open(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        let compression = options
            .compression
            .unwrap_or_else(|| Compression::from_path(path));
        let input = open_input(path, compression)?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(options.has_headers)
            .from_reader(input);

        // Without a header line this peeks at the first record to count fields
        let first = reader.headers()?;
        let headers: Vec<String> = if options.has_headers {
            first.iter().map(String::from).collect()
        } else {
            (0..first.len()).map(|i| i.to_string()).collect()
        };

        debug!(
            path = %path.display(),
            ?compression,
            columns = headers.len(),
            "opened row source"
        );

        Ok(RowSource {
            path: path.to_path_buf(),
            reader,
            headers,
            options,
            rows_read: 0,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Read every remaining row, up to the row limit, into one table
    pub fn read_all(mut self) -> Result<Table> {
        let records = self.read_records(usize::MAX)?;
        let table = self.build_table(records, 0)?;

        info!(
            path = %self.path.display(),
            rows = table.num_rows(),
            columns = table.num_columns(),
            "read table"
        );
        Ok(table)
    }

    /// Turn the source into a lazy sequence of fixed-size batches
    pub fn batches(self) -> Batches {
        let batch_size = self.options.batch_size.max(1);
        Batches {
            source: self,
            batch_size,
            done: false,
        }
    }

    fn read_records(&mut self, limit: usize) -> Result<Vec<csv::StringRecord>> {
        let remaining = self
            .options
            .nrows
            .map_or(usize::MAX, |n| n.saturating_sub(self.rows_read));
        let limit = limit.min(remaining);

        let mut records = Vec::new();
        let mut record = csv::StringRecord::new();
        while records.len() < limit && self.reader.read_record(&mut record)? {
            records.push(record.clone());
        }

        self.rows_read += records.len();
        Ok(records)
    }

    fn build_table(&self, records: Vec<csv::StringRecord>, row_offset: usize) -> Result<Table> {
        let mut table = Table::empty(records.len()).with_row_offset(row_offset);

        let columns = self
            .headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let cells: Vec<&str> = records
                    .iter()
                    .map(|record| record.get(idx).unwrap_or(""))
                    .collect();
                Column::new(name.clone(), self.type_cells(name, &cells))
            })
            .collect();

        table.push_columns(columns)?;
        Ok(table)
    }

    fn type_cells(&self, column: &str, cells: &[&str]) -> Vec<Value> {
        let is = |list: &[String]| list.iter().any(|c| c == column);

        if is(&self.options.raw_columns) || !self.options.infer_scalars {
            return cells.iter().map(|c| Value::String(c.to_string())).collect();
        }
        if is(&self.options.text_columns) {
            return cells.iter().map(|c| text_or_null(c)).collect();
        }
        infer_column(cells)
    }
}

/// Lazy, non-restartable batches of a `RowSource`.
///
/// Every batch holds `batch_size` rows except possibly the last. Iteration
/// stops for good after the first error.
pub struct Batches {
    source: RowSource,
    batch_size: usize,
    done: bool,
}

impl Batches {
    pub fn headers(&self) -> &[String] {
        self.source.headers()
    }
}

impl Iterator for Batches {
    type Item = Result<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let row_offset = self.source.rows_read;
        let batch = self
            .source
            .read_records(self.batch_size)
            .and_then(|records| {
                if records.is_empty() {
                    Ok(None)
                } else {
                    self.source.build_table(records, row_offset).map(Some)
                }
            });

        match batch {
            Ok(Some(table)) => {
                debug!(row_offset, rows = table.num_rows(), "read batch");
                Some(Ok(table))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Batches {}

fn text_or_null(cell: &str) -> Value {
    if cell.is_empty() {
        Value::Null
    } else {
        Value::String(cell.to_string())
    }
}

/// Give a column the narrowest type every non-empty cell fits:
/// integer, then float, then boolean, falling back to text.
fn infer_column(cells: &[&str]) -> Vec<Value> {
    let present = || cells.iter().filter(|c| !c.is_empty());

    if present().all(|c| c.parse::<i64>().is_ok()) {
        return cells
            .iter()
            .map(|c| match c.parse::<i64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => Value::Null,
            })
            .collect();
    }

    if present().all(|c| c.parse::<f64>().map_or(false, f64::is_finite)) {
        return cells
            .iter()
            .map(|c| {
                c.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            })
            .collect();
    }

    if present().all(|c| parse_bool(c).is_some()) {
        return cells
            .iter()
            .map(|c| parse_bool(c).map_or(Value::Null, Value::Bool))
            .collect();
    }

    cells.iter().map(|c| text_or_null(c)).collect()
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}
