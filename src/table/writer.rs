use crate::error::{FlattenError, Result};
use crate::table::types::Table;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;

/// Output encoding for flattened tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Delimited text with a single header line
    #[default]
    Csv,
    /// One JSON object per row
    Ndjson,
}

enum Sink<W: Write> {
    Csv {
        writer: csv::Writer<W>,
        header: Option<Vec<String>>,
    },
    Ndjson(W),
}

/// Writes one or more tables to a single output stream
pub struct TableWriter<W: Write> {
    sink: Sink<W>,
}

impl<W: Write> TableWriter<W> {
    pub fn new(writer: W, format: TableFormat) -> Self {
        let sink = match format {
            TableFormat::Csv => Sink::Csv {
                writer: csv::Writer::from_writer(writer),
                header: None,
            },
            TableFormat::Ndjson => Sink::Ndjson(writer),
        };
        TableWriter { sink }
    }

    /// Append the rows of `table`.
    ///
    /// In CSV mode the first table fixes the header; later tables must carry
    /// the same columns in the same order (reconcile with `Table::concat`).
    /// A table without columns has nothing to put in a CSV line and writes
    /// nothing; in NDJSON mode it writes one `{}` per row.
    pub fn write_table(&mut self, table: &Table) -> Result<()> {
        match &mut self.sink {
            Sink::Csv { .. } if table.num_columns() == 0 => {}
            Sink::Csv { writer, header } => {
                let names: Vec<String> =
                    table.column_names().into_iter().map(String::from).collect();
                if let Some(expected) = header.as_ref() {
                    if *expected != names {
                        return Err(FlattenError::HeaderMismatch {
                            expected: expected.clone(),
                            found: names,
                        });
                    }
                } else {
                    writer.write_record(&names)?;
                    *header = Some(names);
                }

                for i in 0..table.num_rows() {
                    let record = table.columns().iter().map(|c| render_cell(&c.values[i]));
                    writer.write_record(record)?;
                }
            }
            Sink::Ndjson(writer) => {
                for row in table.rows() {
                    serde_json::to_writer(&mut *writer, &row).map_err(FlattenError::Encode)?;
                    writeln!(writer).map_err(FlattenError::Write)?;
                }
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Csv { writer, .. } => writer.flush(),
            Sink::Ndjson(writer) => writer.flush(),
        }
        .map_err(FlattenError::Write)
    }
}

/// Text form of a cell: strings verbatim, missing as empty, the rest as JSON
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::types::Column;
    use serde_json::json;

    fn sample() -> Table {
        Table::new(vec![
            Column::new("fullVisitorId", vec![json!("0123"), json!("0456")]),
            Column::new("totals.hits", vec![json!("3"), Value::Null]),
            Column::new("device.flags", vec![json!({"mobile": true}), json!(7)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_csv_writer() {
        let mut buffer = Vec::new();
        {
            let mut writer = TableWriter::new(&mut buffer, TableFormat::Csv);
            writer.write_table(&sample()).unwrap();
            writer.flush().unwrap();
        }

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "fullVisitorId,totals.hits,device.flags");
        assert_eq!(lines[1], r#"0123,3,"{""mobile"":true}""#);
        assert_eq!(lines[2], "0456,,7");
    }

    #[test]
    fn test_csv_writer_rejects_drift() {
        let mut buffer = Vec::new();
        let mut writer = TableWriter::new(&mut buffer, TableFormat::Csv);
        writer.write_table(&sample()).unwrap();

        let other = Table::new(vec![Column::new("fullVisitorId", vec![json!("9")])]).unwrap();
        let err = writer.write_table(&other).unwrap_err();
        assert!(matches!(err, FlattenError::HeaderMismatch { .. }));
    }

    #[test]
    fn test_csv_writer_skips_columnless_tables() {
        let table = Table::empty(2);

        let mut buffer = Vec::new();
        {
            let mut writer = TableWriter::new(&mut buffer, TableFormat::Csv);
            writer.write_table(&table).unwrap();
            writer.write_table(&sample()).unwrap();
            writer.flush().unwrap();
        }

        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(output.lines().next().unwrap(), "fullVisitorId,totals.hits,device.flags");
        assert_eq!(output.lines().count(), 3);
    }

    #[test]
    fn test_ndjson_writer() {
        let mut buffer = Vec::new();
        {
            let mut writer = TableWriter::new(&mut buffer, TableFormat::Ndjson);
            writer.write_table(&sample()).unwrap();
            writer.flush().unwrap();
        }

        let output = String::from_utf8(buffer).unwrap();
        let first: Value = serde_json::from_str(output.lines().next().unwrap()).unwrap();
        assert_eq!(first["fullVisitorId"], "0123");
        assert_eq!(first["device.flags"]["mobile"], true);
        assert_eq!(output.lines().count(), 2);
    }
}
