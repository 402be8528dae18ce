use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::debug;

use crate::app::ports::{TableStorePort, WriteMode};
use crate::constants::IN_MEMORY_STORE;
use crate::error::{EtlError, Result};
use crate::table::{Table, Value};

/// SQLite-backed table store. `":memory:"` opens a private in-memory database
/// that lives as long as this value.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(locator: &str) -> Result<Self> {
        let conn = if locator == IN_MEMORY_STORE {
            Connection::open_in_memory()
        } else {
            let path = Path::new(locator);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)
        }
        .map_err(|e| EtlError::Write(format!("Failed to open store '{}': {}", locator, e)))?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(IN_MEMORY_STORE)
    }

    /// Column names of a persisted table, in declaration order.
    pub fn column_names(&self, table_name: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table_name));
        let mut stmt = self.conn.prepare(&sql).map_err(|e| EtlError::Query(e.to_string()))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| EtlError::Query(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EtlError::Query(e.to_string()))?;
        Ok(names)
    }

    /// Every row of a persisted table in rowid order.
    pub fn select_all(&self, table_name: &str) -> Result<Vec<Vec<Value>>> {
        let sql = format!("SELECT * FROM {} ORDER BY rowid", quote_identifier(table_name));
        let mut stmt = self.conn.prepare(&sql).map_err(|e| EtlError::Query(e.to_string()))?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, SqlValue>(i).map(from_sql_value))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|e| EtlError::Query(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EtlError::Query(e.to_string()))?;
        Ok(rows)
    }
}

impl TableStorePort for SqliteStore {
    fn write_table(&mut self, table: &Table, table_name: &str, mode: WriteMode) -> Result<()> {
        if table_name.trim().is_empty() {
            return Err(EtlError::Write("table name must not be empty".to_string()));
        }
        if table.column_count() == 0 {
            return Err(EtlError::Write(format!("table '{}' has no columns", table_name)));
        }

        let quoted = quote_identifier(table_name);
        let write_err = |e: rusqlite::Error| EtlError::Write(e.to_string());
        let tx = self.conn.transaction().map_err(write_err)?;

        match mode {
            WriteMode::Replace => {
                tx.execute_batch(&format!("DROP TABLE IF EXISTS {quoted};"))
                    .map_err(write_err)?;
            }
        }

        let column_defs: Vec<String> = table
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_identifier(&c.name), c.column_type.sql_type()))
            .collect();
        tx.execute_batch(&format!("CREATE TABLE {quoted} ({});", column_defs.join(", ")))
            .map_err(write_err)?;

        {
            let placeholders = vec!["?"; table.column_count()].join(", ");
            let mut insert = tx
                .prepare(&format!("INSERT INTO {quoted} VALUES ({placeholders})"))
                .map_err(write_err)?;
            for i in 0..table.row_count() {
                let row = table.columns().iter().map(|c| to_sql_value(&c.values[i]));
                insert.execute(params_from_iter(row)).map_err(write_err)?;
            }
        }

        tx.commit().map_err(write_err)?;
        debug!("Replaced table {} with {} rows", table_name, table.row_count());
        Ok(())
    }

    fn count_rows(&self, table_name: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table_name));
        // Statement is scoped to this call and finalized on every return path.
        let mut stmt = self.conn.prepare(&sql).map_err(|e| EtlError::Query(e.to_string()))?;
        let count: i64 = stmt
            .query_row([], |row| row.get(0))
            .map_err(|e| EtlError::Query(e.to_string()))?;
        Ok(count as u64)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
    }
}

fn from_sql_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(v),
        SqlValue::Real(v) => Value::Real(v),
        SqlValue::Text(v) => Value::Text(v),
        SqlValue::Blob(b) => Value::Text(String::from_utf8_lossy(&b).into_owned()),
    }
}
