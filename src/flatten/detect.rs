use crate::table::Table;
use serde_json::Value;

/// Names of the columns in which every cell holds a JSON object.
///
/// Only `table` is inspected, so when reading in batches the answer comes
/// from the first batch alone. A table without rows has no JSON columns.
pub fn detect_json_columns(table: &Table) -> Vec<String> {
    if table.is_empty() {
        return Vec::new();
    }

    table
        .columns()
        .iter()
        .filter(|column| column.values.iter().all(holds_json_object))
        .map(|column| column.name.clone())
        .collect()
}

fn holds_json_object(cell: &Value) -> bool {
    match cell {
        Value::Object(_) => true,
        // cheap check before paying for a full parse
        Value::String(text) if text.trim_start().starts_with('{') => {
            matches!(serde_json::from_str::<Value>(text), Ok(Value::Object(_)))
        }
        _ => false,
    }
}
