use crate::error::{FlattenError, Result};
use crate::flatten::types::{CollisionPolicy, ColumnPlacement, FlattenConfig};
use crate::table::{Column, Table};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Expands JSON-typed columns into one column per nested key
pub struct Flattener {
    config: FlattenConfig,
}

impl Flattener {
    pub fn new(config: FlattenConfig) -> Self {
        Flattener { config }
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    /// Flatten every configured column of `table`.
    ///
    /// Row count and row order are preserved. Any missing column or bad cell
    /// fails the whole call; the input table is consumed either way.
    pub fn flatten(&self, mut table: Table) -> Result<Table> {
        let mut requested = HashSet::new();
        for name in &self.config.json_columns {
            if !requested.insert(name.as_str()) {
                return Err(FlattenError::DuplicateColumn(name.clone()));
            }
            if table.position(name).is_none() {
                return Err(FlattenError::MissingColumn(name.clone()));
            }
        }

        for (done, name) in self.config.json_columns.iter().enumerate() {
            let (position, column) = table.remove_column(name)?;
            let expanded = self.expand_column(column, table.row_offset())?;

            debug!(
                column = name.as_str(),
                keys = expanded.len(),
                rows = table.num_rows(),
                "expanded JSON column"
            );

            let mut at = match self.config.placement {
                ColumnPlacement::InPlace => position,
                ColumnPlacement::Append => table.num_columns(),
            };

            if self.config.on_collision == CollisionPolicy::Overwrite {
                let pending = &self.config.json_columns[done + 1..];
                for column in &expanded {
                    // a column still waiting to be flattened is never overwritten
                    if pending.contains(&column.name) {
                        return Err(FlattenError::ColumnCollision(column.name.clone()));
                    }
                    if table.position(&column.name).is_some() {
                        let (idx, _) = table.remove_column(&column.name)?;
                        if idx < at {
                            at -= 1;
                        }
                    }
                }
            }

            table.insert_columns(at, expanded)?;
        }

        Ok(table)
    }

    /// Parse every cell of `column` and split it into one column per key.
    ///
    /// Keys are ordered by first appearance across the rows; a row without a
    /// key gets `Null` in that column. Nested values are kept whole.
    fn expand_column(&self, column: Column, row_offset: usize) -> Result<Vec<Column>> {
        let Column { name, values } = column;
        let num_rows = values.len();

        let mut keys: Vec<String> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut cells: Vec<Vec<Value>> = Vec::new();

        for (row, cell) in values.into_iter().enumerate() {
            let object = parse_object(&name, row_offset + row, cell)?;

            for (key, value) in object {
                let slot = match slots.get(&key) {
                    Some(&slot) => slot,
                    None => {
                        slots.insert(key.clone(), keys.len());
                        keys.push(key);
                        cells.push(vec![Value::Null; num_rows]);
                        keys.len() - 1
                    }
                };
                cells[slot][row] = value;
            }
        }

        Ok(keys
            .into_iter()
            .zip(cells)
            .map(|(key, values)| {
                Column::new(format!("{}{}{}", name, self.config.separator, key), values)
            })
            .collect())
    }
}

/// Flatten `json_columns` of `table` with otherwise default settings
pub fn flatten<S: AsRef<str>>(table: Table, json_columns: &[S]) -> Result<Table> {
    let config = FlattenConfig::for_columns(json_columns.iter().map(|s| s.as_ref().to_string()));
    Flattener::new(config).flatten(table)
}

fn parse_object(column: &str, row: usize, cell: Value) -> Result<Map<String, Value>> {
    let value = match cell {
        Value::String(text) => {
            serde_json::from_str(&text).map_err(|source| FlattenError::MalformedJson {
                column: column.to_string(),
                row,
                source,
            })?
        }
        other => other,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(FlattenError::NotAnObject {
            column: column.to_string(),
            row,
            found: json_type_name(&other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sessions() -> Table {
        Table::new(vec![
            Column::new("fullVisitorId", vec![json!("0123456789012345678"), json!("42")]),
            Column::new(
                "device",
                vec![json!(r#"{"a": 1, "b": "x"}"#), json!(r#"{"b": "y", "c": true}"#)],
            ),
            Column::new("visitNumber", vec![json!(1), json!(2)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_union_schema() {
        let table = flatten(sessions(), &["device"]).unwrap();

        assert_eq!(
            table.column_names(),
            vec!["fullVisitorId", "device.a", "device.b", "device.c", "visitNumber"]
        );
        assert_eq!(*table.get(0, "device.a").unwrap(), 1);
        assert_eq!(*table.get(1, "device.b").unwrap(), "y");
        assert!(table.is_missing(0, "device.c"));
        assert!(table.is_missing(1, "device.a"));
    }

    #[test]
    fn test_rows_keep_order_and_identifiers() {
        let table = flatten(sessions(), &["device"]).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(*table.get(0, "fullVisitorId").unwrap(), "0123456789012345678");
        assert_eq!(*table.get(1, "visitNumber").unwrap(), 2);
        assert_eq!(*table.get(0, "device.b").unwrap(), "x");
    }

    #[test]
    fn test_nested_objects_are_kept_whole() {
        let table = Table::new(vec![Column::new(
            "trafficSource",
            vec![json!(r#"{"source": "google", "adwordsClickInfo": {"page": "1"}}"#)],
        )])
        .unwrap();

        let table = flatten(table, &["trafficSource"]).unwrap();

        assert_eq!(
            table.column_names(),
            vec!["trafficSource.source", "trafficSource.adwordsClickInfo"]
        );
        assert_eq!(
            *table.get(0, "trafficSource.adwordsClickInfo").unwrap(),
            json!({"page": "1"})
        );
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let table = Table::new(vec![Column::new(
            "device",
            vec![json!(r#"{"a": 1}"#), json!("{not json")],
        )])
        .unwrap()
        .with_row_offset(100);

        let err = flatten(table, &["device"]).unwrap_err();
        assert!(matches!(err, FlattenError::MalformedJson { row: 101, .. }));
    }

    #[test]
    fn test_non_object_is_fatal() {
        let table = Table::new(vec![Column::new("totals", vec![json!("[1, 2]")])]).unwrap();

        let err = flatten(table, &["totals"]).unwrap_err();
        assert!(matches!(err, FlattenError::NotAnObject { found: "array", .. }));
    }

    #[test]
    fn test_missing_column() {
        let err = flatten(sessions(), &["geoNetwork"]).unwrap_err();
        assert!(matches!(err, FlattenError::MissingColumn(ref name) if name == "geoNetwork"));
    }

    #[test]
    fn test_append_placement() {
        let mut config = FlattenConfig::for_columns(["device"]);
        config.placement = ColumnPlacement::Append;

        let table = Flattener::new(config).flatten(sessions()).unwrap();

        assert_eq!(
            table.column_names(),
            vec!["fullVisitorId", "visitNumber", "device.a", "device.b", "device.c"]
        );
    }

    #[test]
    fn test_collision_policies() {
        let clashing = || {
            Table::new(vec![
                Column::new("totals.hits", vec![json!("old")]),
                Column::new("totals", vec![json!(r#"{"hits": "3"}"#)]),
            ])
            .unwrap()
        };

        let err = flatten(clashing(), &["totals"]).unwrap_err();
        assert!(matches!(err, FlattenError::ColumnCollision(ref name) if name == "totals.hits"));

        let mut config = FlattenConfig::for_columns(["totals"]);
        config.on_collision = CollisionPolicy::Overwrite;
        let table = Flattener::new(config).flatten(clashing()).unwrap();

        assert_eq!(table.column_names(), vec!["totals.hits"]);
        assert_eq!(*table.get(0, "totals.hits").unwrap(), "3");
    }

    #[test]
    fn test_overwrite_spares_pending_json_columns() {
        let table = Table::new(vec![
            Column::new("a", vec![json!(r#"{"b": 5}"#)]),
            Column::new("a.b", vec![json!(r#"{"c": 1}"#)]),
        ])
        .unwrap();
        let mut config = FlattenConfig::for_columns(["a", "a.b"]);
        config.on_collision = CollisionPolicy::Overwrite;

        let err = Flattener::new(config).flatten(table).unwrap_err();
        assert!(matches!(err, FlattenError::ColumnCollision(ref name) if name == "a.b"));
    }

    #[test]
    fn test_empty_objects_and_empty_tables() {
        let table = Table::new(vec![
            Column::new("id", vec![json!("1"), json!("2")]),
            Column::new("totals", vec![json!("{}"), json!("{}")]),
        ])
        .unwrap();
        let table = flatten(table, &["totals"]).unwrap();
        assert_eq!(table.column_names(), vec!["id"]);
        assert_eq!(table.num_rows(), 2);

        let table = Table::new(vec![Column::new("totals", vec![])]).unwrap();
        let table = flatten(table, &["totals"]).unwrap();
        assert_eq!(table.num_columns(), 0);
        assert!(table.is_empty());
    }
}
