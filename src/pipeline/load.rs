use std::time::Instant;
use tracing::{info, instrument};

use crate::app::ports::{TableStorePort, WriteMode};
use crate::error::Result;
use crate::observability::metrics;
use crate::table::Table;

/// Persists tables with replace semantics and reports the stored row count.
#[derive(Debug, Default, Clone, Copy)]
pub struct Loader;

impl Loader {
    #[instrument(skip(self, table, store), fields(rows = table.row_count()))]
    pub fn load(&self, table: &Table, store: &mut dyn TableStorePort, table_name: &str) -> Result<u64> {
        let t0 = Instant::now();
        store.write_table(table, table_name, WriteMode::Replace)?;
        let stored = store.count_rows(table_name)?;
        metrics::load::loaded(stored, t0.elapsed().as_secs_f64());
        info!("Loaded table {}; store reports {} rows", table_name, stored);
        Ok(stored)
    }
}
