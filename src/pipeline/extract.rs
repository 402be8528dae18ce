use csv::ReaderBuilder;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::app::ports::HttpClientPort;
use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::table::{Column, Table};

/// Parse delimited text with a header row into a [`Table`].
///
/// A header-only body yields a zero-row table. A body with no header at all,
/// or rows whose field count differs from the header, is a parse error.
/// Input must be UTF-8; invalid bytes are a parse error, never replaced.
pub fn parse_csv(data: impl AsRef<[u8]>, delimiter: u8) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(data.as_ref());

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(EtlError::Parse("no header row found".to_string()));
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record?;
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push(field.to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| Column::infer(name, raw))
        .collect();
    Table::new(columns)
}

/// Fetches a CSV resource and parses it.
pub struct Extractor {
    http: Box<dyn HttpClientPort>,
}

impl Extractor {
    pub fn new(http: Box<dyn HttpClientPort>) -> Self {
        Self { http }
    }

    #[instrument(skip(self))]
    pub async fn extract(&self, source_url: &str) -> Result<Table> {
        metrics::extract::attempt();
        let t0 = Instant::now();

        let resp = self.http.get(source_url).await.map_err(EtlError::Transport)?;
        debug!(
            "Fetched {} bytes (status {}, content-type {})",
            resp.bytes.len(),
            resp.status,
            resp.content_type
        );
        if !resp.is_success() {
            return Err(EtlError::HttpStatus {
                status: resp.status,
                url: source_url.to_string(),
            });
        }

        let table = parse_csv(&resp.bytes, b',')?;

        metrics::extract::fetched(resp.bytes.len(), table.row_count(), t0.elapsed().as_secs_f64());
        info!(
            "Extracted {} rows x {} columns from {}",
            table.row_count(),
            table.column_count(),
            source_url
        );
        Ok(table)
    }
}
