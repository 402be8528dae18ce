use async_trait::async_trait;

use crate::error::Result;
use crate::table::Table;

// Extract-side ports
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, String>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

// Load-side ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop any existing table of the same name, then create and fill it.
    Replace,
}

/// Relational target for loaded tables. Calls are blocking.
pub trait TableStorePort: Send {
    fn write_table(&mut self, table: &Table, table_name: &str, mode: WriteMode) -> Result<()>;
    fn count_rows(&self, table_name: &str) -> Result<u64>;
}
