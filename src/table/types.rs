use crate::error::{FlattenError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One named column of cells. A missing cell is `Value::Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A column-major table with a fixed row count.
///
/// Every column holds exactly `num_rows` cells, so merging columns from two
/// tables is always positional: row `i` of one lines up with row `i` of the
/// other, never matched by content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
    /// Ordinal of the first row within the source it was read from
    row_offset: usize,
}

impl Table {
    /// Build a table from columns of equal length with distinct names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let num_rows = columns.first().map(Column::len).unwrap_or(0);
        let mut table = Table::empty(num_rows);
        table.push_columns(columns)?;
        Ok(table)
    }

    /// A table with `num_rows` rows and no columns yet
    pub fn empty(num_rows: usize) -> Self {
        Table {
            columns: Vec::new(),
            num_rows,
            row_offset: 0,
        }
    }

    /// Build a table from row mappings. Keys not listed in `names` are
    /// ignored; listed names absent from a row become `Null`.
    pub fn from_rows<I>(names: &[String], rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Map<String, Value>>,
    {
        let mut columns: Vec<Column> = names
            .iter()
            .map(|name| Column::new(name.clone(), Vec::new()))
            .collect();
        let mut num_rows = 0;

        for mut row in rows {
            for column in columns.iter_mut() {
                column
                    .values
                    .push(row.remove(&column.name).unwrap_or(Value::Null));
            }
            num_rows += 1;
        }

        let mut table = Table::empty(num_rows);
        table.push_columns(columns)?;
        Ok(table)
    }

    /// Stack tables vertically, reconciling their column sets.
    ///
    /// The result has the union of all columns in first-seen order; a table
    /// lacking a column contributes `Null` cells for it.
    pub fn concat<I>(tables: I) -> Table
    where
        I: IntoIterator<Item = Table>,
    {
        let tables: Vec<Table> = tables.into_iter().collect();
        let row_offset = tables.first().map(|t| t.row_offset).unwrap_or(0);
        let num_rows: usize = tables.iter().map(|t| t.num_rows).sum();

        let mut names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for table in &tables {
            for column in &table.columns {
                if seen.insert(column.name.clone()) {
                    names.push(column.name.clone());
                }
            }
        }

        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(num_rows)))
            .collect();

        for mut table in tables {
            for column in columns.iter_mut() {
                match table.position(&column.name) {
                    Some(idx) => column
                        .values
                        .append(&mut table.columns[idx].values),
                    None => column
                        .values
                        .extend(std::iter::repeat(Value::Null).take(table.num_rows)),
                }
            }
        }

        Table {
            columns,
            num_rows,
            row_offset,
        }
    }

    pub fn with_row_offset(mut self, row_offset: usize) -> Self {
        self.row_offset = row_offset;
        self
    }

    pub fn row_offset(&self) -> usize {
        self.row_offset
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|c| c.values.get(row))
    }

    /// True when the cell is `Null` or the column does not exist
    pub fn is_missing(&self, row: usize, name: &str) -> bool {
        matches!(self.get(row, name), None | Some(Value::Null))
    }

    /// Materialize row `i` as a column-name → value mapping
    pub fn row(&self, i: usize) -> Option<Map<String, Value>> {
        if i >= self.num_rows {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.values[i].clone()))
                .collect(),
        )
    }

    pub fn rows(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        (0..self.num_rows).filter_map(move |i| self.row(i))
    }

    /// Detach a column, returning its former position and its cells
    pub fn remove_column(&mut self, name: &str) -> Result<(usize, Column)> {
        let idx = self
            .position(name)
            .ok_or_else(|| FlattenError::MissingColumn(name.to_string()))?;
        Ok((idx, self.columns.remove(idx)))
    }

    /// Merge columns into the table by row position, starting at index `at`.
    ///
    /// Each column must have exactly `num_rows` cells and a name not already
    /// present. On error the table is left unchanged.
    pub fn insert_columns(&mut self, at: usize, columns: Vec<Column>) -> Result<()> {
        let mut incoming = HashSet::new();
        for column in &columns {
            if column.len() != self.num_rows {
                return Err(FlattenError::RaggedColumns {
                    column: column.name.clone(),
                    expected: self.num_rows,
                    actual: column.len(),
                });
            }
            if self.position(&column.name).is_some() {
                return Err(FlattenError::ColumnCollision(column.name.clone()));
            }
            if !incoming.insert(column.name.as_str()) {
                return Err(FlattenError::DuplicateColumn(column.name.clone()));
            }
        }

        let at = at.min(self.columns.len());
        self.columns.splice(at..at, columns);
        Ok(())
    }

    pub fn push_columns(&mut self, columns: Vec<Column>) -> Result<()> {
        self.insert_columns(self.columns.len(), columns)
    }
}
