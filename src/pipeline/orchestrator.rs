use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::{HttpClientPort, TableStorePort};
use crate::config::PipelineConfig;
use crate::constants::PREVIEW_ROWS;
use crate::error::{EtlError, Result};
use crate::infra::http_client::ReqwestHttp;
use crate::infra::sqlite_store::SqliteStore;
use crate::observability::metrics;
use crate::pipeline::extract::Extractor;
use crate::pipeline::load::Loader;
use crate::pipeline::transform::Transformer;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extracting,
    Transforming,
    Loading,
    Validated,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Extracting => "extracting",
            PipelineStage::Transforming => "transforming",
            PipelineStage::Loading => "loading",
            PipelineStage::Validated => "validated",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub source_url: String,
    pub table_name: String,
    pub transformed_rows: u64,
    pub loaded_rows: u64,
    /// `transformed_rows == loaded_rows`
    pub validated: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub preview: Table,
}

/// Extract → transform → load, then compare row counts.
pub struct Pipeline {
    config: PipelineConfig,
    extractor: Extractor,
    transformer: Transformer,
    loader: Loader,
    store: Box<dyn TableStorePort>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        http: Box<dyn HttpClientPort>,
        store: Box<dyn TableStorePort>,
    ) -> Self {
        Self {
            config,
            extractor: Extractor::new(http),
            transformer: Transformer::default(),
            loader: Loader,
            store,
        }
    }

    /// Wire the production adapters: reqwest for the source, SQLite for the store.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let http = match config.request_timeout_secs {
            Some(secs) => ReqwestHttp::with_timeout(Duration::from_secs(secs)).map_err(EtlError::Config)?,
            None => ReqwestHttp::new(),
        };
        let store = SqliteStore::open(&config.store_locator)?;
        Ok(Self::new(config, Box::new(http), Box::new(store)))
    }

    pub fn store(&self) -> &dyn TableStorePort {
        self.store.as_ref()
    }

    /// Run every stage in order. The first failing stage aborts the run.
    #[instrument(skip(self), fields(source_url = %self.config.source_url, table = %self.config.table_name))]
    pub async fn run(&mut self) -> Result<PipelineOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let t0 = Instant::now();
        metrics::pipeline::run_started();
        info!("Starting pipeline run {}", run_id);

        enter(PipelineStage::Extracting);
        let extractor = &self.extractor;
        let source_url = self.config.source_url.as_str();
        let raw = self
            .config
            .retry
            .run(PipelineStage::Extracting.as_str(), EtlError::is_transport, || {
                extractor.extract(source_url)
            })
            .await
            .map_err(|e| failed(PipelineStage::Extracting, e))?;

        enter(PipelineStage::Transforming);
        let transformed = self
            .transformer
            .transform(raw)
            .map_err(|e| failed(PipelineStage::Transforming, e))?;

        enter(PipelineStage::Loading);
        let loaded_rows = self
            .loader
            .load(&transformed, self.store.as_mut(), &self.config.table_name)
            .map_err(|e| failed(PipelineStage::Loading, e))?;

        enter(PipelineStage::Validated);
        let transformed_rows = transformed.row_count() as u64;
        let validated = transformed_rows == loaded_rows;
        metrics::pipeline::run_finished(validated, t0.elapsed().as_secs_f64());
        if validated {
            info!("Row counts match: {} rows", loaded_rows);
        } else {
            warn!(
                "Row count mismatch: transformed {} rows, store reports {}",
                transformed_rows, loaded_rows
            );
        }

        Ok(PipelineOutcome {
            run_id,
            source_url: self.config.source_url.clone(),
            table_name: self.config.table_name.clone(),
            transformed_rows,
            loaded_rows,
            validated,
            started_at,
            finished_at: Utc::now(),
            preview: transformed.head(PREVIEW_ROWS),
        })
    }
}

fn enter(stage: PipelineStage) {
    info!(stage = %stage, "Pipeline stage: {}", stage);
}

fn failed(stage: PipelineStage, e: EtlError) -> EtlError {
    error!(stage = %stage, "Pipeline aborted while {}: {}", stage, e);
    metrics::pipeline::run_failed(stage.as_str());
    e
}

/// Run the pipeline with production adapters and return whether the stored
/// row count matches the transformed row count.
pub async fn run_flow(config: PipelineConfig) -> Result<bool> {
    let mut pipeline = Pipeline::from_config(config)?;
    Ok(pipeline.run().await?.validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{HttpGetResult, WriteMode};
    use async_trait::async_trait;

    struct CsvHttp(&'static str);

    #[async_trait]
    impl HttpClientPort for CsvHttp {
        async fn get(&self, _url: &str) -> std::result::Result<HttpGetResult, String> {
            Ok(HttpGetResult {
                status: 200,
                bytes: self.0.as_bytes().to_vec(),
                content_type: "text/csv".to_string(),
            })
        }
    }

    /// Accepts writes but loses one row.
    struct LossyStore;

    impl TableStorePort for LossyStore {
        fn write_table(&mut self, _table: &Table, _name: &str, _mode: WriteMode) -> Result<()> {
            Ok(())
        }

        fn count_rows(&self, _name: &str) -> Result<u64> {
            Ok(2)
        }
    }

    #[tokio::test]
    async fn test_mismatch_yields_false() {
        let mut pipeline = Pipeline::new(
            PipelineConfig::default(),
            Box::new(CsvHttp("user ID,amount\n1,10\n1,20\n2,5\n")),
            Box::new(LossyStore),
        );
        let outcome = pipeline.run().await.unwrap();
        assert_eq!(outcome.transformed_rows, 3);
        assert_eq!(outcome.loaded_rows, 2);
        assert!(!outcome.validated);
    }

    #[tokio::test]
    async fn test_outcome_preview_is_capped() {
        let body = "user ID\n1\n2\n3\n4\n5\n6\n7\n";
        let mut pipeline = Pipeline::new(
            PipelineConfig::default(),
            Box::new(CsvHttp(body)),
            Box::new(SqliteStore::in_memory().unwrap()),
        );
        let outcome = pipeline.run().await.unwrap();
        assert!(outcome.validated);
        assert_eq!(outcome.transformed_rows, 7);
        assert_eq!(outcome.preview.row_count(), PREVIEW_ROWS);
        assert!(outcome.finished_at >= outcome.started_at);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["validated"], serde_json::json!(true));
        assert_eq!(json["table_name"], serde_json::json!("meals"));
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let config = PipelineConfig {
            table_name: String::new(),
            ..PipelineConfig::default()
        };
        assert!(matches!(Pipeline::from_config(config), Err(EtlError::Config(_))));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::Extracting.to_string(), "extracting");
        assert_eq!(PipelineStage::Validated.as_str(), "validated");
    }
}
