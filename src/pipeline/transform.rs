//! Column enrichment for extracted tables.
//!
//! The transform is three steps:
//! 1. Aggregate: count rows per distinct value of the grouping key. Null keys
//!    form a single group of their own.
//! 2. Join: left-join those counts back onto every row as a new integer column.
//!    Output row count always equals input row count.
//! 3. Normalize: lower-case every column name and replace spaces with
//!    underscores. Names that collide after normalization get `_2`, `_3`, ...
//!    suffixes in column order.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};

use crate::constants::{DERIVED_COUNT_COLUMN, GROUP_KEY_COLUMN};
use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::table::{Column, ColumnType, Table, Value};

/// Hashable view of a cell. Reals hash by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Null,
    Integer(i64),
    Real(u64),
    Text(String),
}

impl From<&Value> for GroupKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => GroupKey::Null,
            Value::Integer(v) => GroupKey::Integer(*v),
            // Collapse -0.0 onto 0.0 so equal numbers group together.
            Value::Real(v) => GroupKey::Real(if *v == 0.0 { 0f64.to_bits() } else { v.to_bits() }),
            Value::Text(v) => GroupKey::Text(v.clone()),
        }
    }
}

/// Row counts per distinct key, in first-seen key order.
#[derive(Debug, Clone, Default)]
pub struct KeyCounts {
    order: Vec<GroupKey>,
    counts: HashMap<GroupKey, i64>,
}

impl KeyCounts {
    pub fn get(&self, key: &Value) -> Option<i64> {
        self.counts.get(&GroupKey::from(key)).copied()
    }

    pub fn distinct_keys(&self) -> usize {
        self.order.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, i64)> {
        self.order.iter().map(move |k| (k, self.counts[k]))
    }

    fn record(&mut self, key: GroupKey) {
        match self.counts.get_mut(&key) {
            Some(count) => *count += 1,
            None => {
                self.order.push(key.clone());
                self.counts.insert(key, 1);
            }
        }
    }
}

/// Group rows by `key` and count each group.
pub fn count_rows_per_key(table: &Table, key: &str) -> Result<KeyCounts> {
    let column = table
        .column(key)
        .ok_or_else(|| EtlError::MissingColumn(key.to_string()))?;

    let mut counts = KeyCounts::default();
    for value in &column.values {
        counts.record(GroupKey::from(value));
    }
    Ok(counts)
}

/// Left-join `counts` onto `table` by `key`, appending `column_name`.
/// Rows whose key has no count receive `Null`.
pub fn join_counts(mut table: Table, key: &str, counts: &KeyCounts, column_name: &str) -> Result<Table> {
    let key_column = table
        .column(key)
        .ok_or_else(|| EtlError::MissingColumn(key.to_string()))?;

    let values: Vec<Value> = key_column
        .values
        .iter()
        .map(|v| counts.get(v).map(Value::Integer).unwrap_or(Value::Null))
        .collect();

    table.push_column(Column::new(column_name, ColumnType::Integer, values))?;
    Ok(table)
}

/// Lower-case `name` and replace every space with an underscore.
pub fn clean_column_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Clean every column name, suffixing later duplicates so names stay unique.
pub fn normalize_column_names(table: &mut Table) -> usize {
    let mut taken: HashSet<String> = HashSet::new();
    let mut renamed = 0;
    let mut names = Vec::with_capacity(table.column_count());

    for original in table.column_names() {
        let cleaned = clean_column_name(original);
        let mut candidate = cleaned.clone();
        let mut suffix = 2;
        while taken.contains(&candidate) {
            candidate = format!("{cleaned}_{suffix}");
            suffix += 1;
        }
        if candidate != cleaned {
            debug!("Column '{}' collides after normalization, renamed to '{}'", original, candidate);
        }
        if candidate != original {
            renamed += 1;
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }

    table.set_column_names(names);
    renamed
}

/// Adds a per-key row count column and normalizes column names.
#[derive(Debug, Clone)]
pub struct Transformer {
    group_key: String,
    derived_column: String,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(GROUP_KEY_COLUMN, DERIVED_COUNT_COLUMN)
    }
}

impl Transformer {
    pub fn new(group_key: impl Into<String>, derived_column: impl Into<String>) -> Self {
        Self {
            group_key: group_key.into(),
            derived_column: derived_column.into(),
        }
    }

    #[instrument(skip(self, table), fields(group_key = %self.group_key, rows = table.row_count()))]
    pub fn transform(&self, table: Table) -> Result<Table> {
        let counts = count_rows_per_key(&table, &self.group_key)?;
        metrics::transform::aggregated(counts.distinct_keys());
        debug!("Found {} distinct values of '{}'", counts.distinct_keys(), self.group_key);

        let mut table = join_counts(table, &self.group_key, &counts, &self.derived_column)?;
        let renamed = normalize_column_names(&mut table);
        metrics::transform::columns_renamed(renamed);

        info!(
            "Transformed {} rows; columns: {}",
            table.row_count(),
            table.column_names().join(", ")
        );
        Ok(table)
    }
}
