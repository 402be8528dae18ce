//! In-memory tabular model shared by every pipeline stage.
//!
//! A [`Table`] is an ordered list of named, typed [`Column`]s. All columns hold
//! the same number of values; constructors and mutators enforce that so stage
//! code can index rows without bounds juggling.

use crate::error::{EtlError, Result};
use serde::Serialize;
use std::fmt;

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            // Debug keeps the fraction, so 1.0 never reads as an integer.
            Value::Real(v) => write!(f, "{v:?}"),
            Value::Text(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// SQL type affinity used when the column is persisted.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            column_type,
            values,
        }
    }

    /// Build a column from raw text cells, inferring the narrowest type that
    /// fits every non-null cell. Empty cells become `Value::Null`.
    ///
    /// Integer literals outside the `i64` range and non-finite floats (`nan`,
    /// `inf`) make the column `Text`, so every cell keeps its exact value.
    pub fn infer(name: impl Into<String>, cells: Vec<String>) -> Self {
        let non_empty = || cells.iter().filter(|c| !c.is_empty());

        let column_type = if non_empty().next().is_none() {
            ColumnType::Text
        } else if non_empty().all(|c| c.trim().parse::<i64>().is_ok()) {
            ColumnType::Integer
        } else if non_empty().all(|c| is_real_literal(c.trim())) {
            ColumnType::Real
        } else {
            ColumnType::Text
        };

        let values = cells
            .into_iter()
            .map(|cell| {
                if cell.is_empty() {
                    return Value::Null;
                }
                // Parses below cannot fail: the type was chosen so they succeed.
                match column_type {
                    ColumnType::Integer => cell.trim().parse().map(Value::Integer).unwrap_or(Value::Null),
                    ColumnType::Real => cell.trim().parse().map(Value::Real).unwrap_or(Value::Null),
                    ColumnType::Text => Value::Text(cell),
                }
            })
            .collect();

        Self::new(name, column_type, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Optional sign followed by ASCII digits only.
fn is_integer_literal(cell: &str) -> bool {
    let digits = cell.strip_prefix(&['+', '-'][..]).unwrap_or(cell);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_real_literal(cell: &str) -> bool {
    if is_integer_literal(cell) {
        // i64 overflow would round distinct keys onto the same f64
        return cell.parse::<i64>().is_ok();
    }
    cell.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, rejecting columns whose lengths disagree.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut table = Table::default();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                let actual = column.len();
                return Err(EtlError::RowCountMismatch {
                    column: column.name,
                    expected: first.len(),
                    actual,
                });
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Rename every column in place, in column order. Row data is untouched.
    pub(crate) fn set_column_names(&mut self, names: Vec<String>) {
        debug_assert_eq!(names.len(), self.columns.len());
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name;
        }
    }

    /// Values of row `index` in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// First `n` rows, keeping every column.
    pub fn head(&self, n: usize) -> Table {
        let take = n.min(self.row_count());
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.column_type, c.values[..take].to_vec()))
                .collect(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .map(|c| {
                c.values
                    .iter()
                    .map(|v| v.to_string().len())
                    .chain(std::iter::once(c.name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c.name, w = *w))
            .collect();
        writeln!(f, "{}", header.join("  "))?;

        for i in 0..self.row_count() {
            let cells: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<w$}", c.values[i].to_string(), w = *w))
                .collect();
            writeln!(f, "{}", cells.join("  "))?;
        }
        Ok(())
    }
}
