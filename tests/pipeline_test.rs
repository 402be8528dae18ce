use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use meals_etl::app::ports::{HttpClientPort, HttpGetResult, TableStorePort};
use meals_etl::infra::sqlite_store::SqliteStore;
use meals_etl::pipeline::{parse_csv, run_flow, Loader, Pipeline, RetryPolicy, Transformer};
use meals_etl::{EtlError, PipelineConfig, Value};

struct FakeSource {
    body: &'static str,
    calls: Arc<AtomicUsize>,
}

impl FakeSource {
    fn new(body: &'static str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { body, calls: calls.clone() }, calls)
    }
}

#[async_trait]
impl HttpClientPort for FakeSource {
    async fn get(&self, _url: &str) -> std::result::Result<HttpGetResult, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpGetResult {
            status: 200,
            bytes: self.body.as_bytes().to_vec(),
            content_type: "text/csv".to_string(),
        })
    }
}

/// Fails with a transport error a fixed number of times, then serves `body`.
struct FlakySource {
    failures_left: AtomicUsize,
    body: &'static str,
}

#[async_trait]
impl HttpClientPort for FlakySource {
    async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, String> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(format!("connection reset while fetching {url}"));
        }
        Ok(HttpGetResult {
            status: 200,
            bytes: self.body.as_bytes().to_vec(),
            content_type: "text/csv".to_string(),
        })
    }
}

/// Source whose every fetch fails at the transport level.
struct DownSource;

#[async_trait]
impl HttpClientPort for DownSource {
    async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, String> {
        Err(format!("error sending request for url ({url}): connection refused"))
    }
}

fn pipeline_for(body: &'static str) -> Pipeline {
    let (source, _) = FakeSource::new(body);
    Pipeline::new(
        PipelineConfig::default(),
        Box::new(source),
        Box::new(SqliteStore::in_memory().expect("in-memory store")),
    )
}

#[tokio::test]
async fn test_meal_counts_end_to_end() -> Result<()> {
    let mut pipeline = pipeline_for("user ID,amount\n1,10\n1,20\n2,5\n");
    let outcome = pipeline.run().await?;

    assert_eq!(outcome.loaded_rows, 3);
    assert!(outcome.validated);
    assert_eq!(outcome.preview.column_names(), vec!["user_id", "amount", "number_of_meals"]);
    let rows: Vec<Vec<Value>> = (0..3)
        .map(|i| outcome.preview.row(i).unwrap().into_iter().cloned().collect())
        .collect();
    assert_eq!(
        rows,
        vec![
            vec![Value::Integer(1), Value::Integer(10), Value::Integer(2)],
            vec![Value::Integer(1), Value::Integer(20), Value::Integer(2)],
            vec![Value::Integer(2), Value::Integer(5), Value::Integer(1)],
        ]
    );
    assert_eq!(pipeline.store().count_rows("meals")?, 3);
    Ok(())
}

#[tokio::test]
async fn test_header_only_source_validates_with_zero_rows() -> Result<()> {
    let mut pipeline = pipeline_for("user ID,amount\n");
    let outcome = pipeline.run().await?;
    assert_eq!(outcome.transformed_rows, 0);
    assert_eq!(outcome.loaded_rows, 0);
    assert!(outcome.validated);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_source_aborts_with_transport_error() {
    let mut pipeline = Pipeline::new(
        PipelineConfig::default(),
        Box::new(DownSource),
        Box::new(SqliteStore::in_memory().expect("in-memory store")),
    );
    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, EtlError::Transport(ref msg) if msg.contains("connection refused")), "got {err:?}");

    // Nothing was loaded
    assert!(matches!(pipeline.store().count_rows("meals"), Err(EtlError::Query(_))));
}

#[tokio::test]
async fn test_run_flow_rejects_invalid_config_before_fetching() {
    let config = PipelineConfig {
        table_name: String::new(),
        ..PipelineConfig::default()
    };
    let err = run_flow(config).await.unwrap_err();
    assert!(matches!(err, EtlError::Config(_)), "got {err:?}");
}

#[tokio::test]
async fn test_missing_group_key_aborts_before_load() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("etl.db");
    let config = PipelineConfig {
        store_locator: db.to_string_lossy().to_string(),
        ..PipelineConfig::default()
    };
    let (source, _) = FakeSource::new("customer,amount\n1,10\n");
    let mut pipeline = Pipeline::new(config, Box::new(source), Box::new(SqliteStore::open(db.to_str().unwrap())?));

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, EtlError::MissingColumn(ref c) if c == "user ID"));
    // No table was written
    assert!(matches!(pipeline.store().count_rows("meals"), Err(EtlError::Query(_))));
    Ok(())
}

#[tokio::test]
async fn test_rerun_against_file_store_replaces_table() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let locator = dir.path().join("etl.db").to_string_lossy().to_string();

    for _ in 0..2 {
        let (source, _) = FakeSource::new("user ID,amount\n1,10\n2,20\n");
        let config = PipelineConfig {
            store_locator: locator.clone(),
            ..PipelineConfig::default()
        };
        let store = SqliteStore::open(&locator)?;
        let outcome = Pipeline::new(config, Box::new(source), Box::new(store)).run().await?;
        assert!(outcome.validated);
    }

    let store = SqliteStore::open(&locator)?;
    assert_eq!(store.count_rows("meals")?, 2);
    Ok(())
}

#[tokio::test]
async fn test_retry_policy_recovers_from_transient_fetch_failures() -> Result<()> {
    let config = PipelineConfig {
        retry: RetryPolicy::with_attempts(3, 1),
        ..PipelineConfig::default()
    };
    let source = FlakySource {
        failures_left: AtomicUsize::new(2),
        body: "user ID\n5\n5\n",
    };
    let mut pipeline = Pipeline::new(config, Box::new(source), Box::new(SqliteStore::in_memory()?));
    let outcome = pipeline.run().await?;
    assert!(outcome.validated);
    assert_eq!(outcome.loaded_rows, 2);
    Ok(())
}

#[tokio::test]
async fn test_parse_errors_are_not_retried() {
    let (source, calls) = FakeSource::new("user ID,amount\n1\n");
    let config = PipelineConfig {
        retry: RetryPolicy::with_attempts(4, 1),
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::new(config, Box::new(source), Box::new(SqliteStore::in_memory().unwrap()));
    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, EtlError::Parse(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_transform_preserves_data_row_count() -> Result<()> {
    let inputs = [
        "user ID\n",
        "user ID,x\n1,a\n",
        "user ID,x\n1,a\n,b\n1,c\n3,\n,e\n",
        "x,user ID\n\"q,1\",9\n\"q,2\",9\n",
    ];
    for text in inputs {
        let data_rows = text.lines().count() - 1;
        let out = Transformer::default().transform(parse_csv(text, b',')?)?;
        assert_eq!(out.row_count(), data_rows, "input {text:?}");
    }
    Ok(())
}

#[test]
fn test_counts_match_group_sizes() -> Result<()> {
    let text = "user ID,item\n3,a\n,b\n3,c\n4,d\n,e\n3,f\n";
    let before = parse_csv(text, b',')?;
    let keys = before.column("user ID").unwrap().values.clone();
    let after = Transformer::default().transform(before)?;
    let counts = &after.column("number_of_meals").unwrap().values;

    for (key, count) in keys.iter().zip(counts) {
        let expected = keys.iter().filter(|k| *k == key).count() as i64;
        assert_eq!(count, &Value::Integer(expected), "key {key:?}");
    }
    Ok(())
}

#[test]
fn test_load_is_idempotent() -> Result<()> {
    let table = Transformer::default().transform(parse_csv("user ID,amount\n1,10\n1,20\n2,5\n", b',')?)?;
    let mut once = SqliteStore::in_memory()?;
    Loader.load(&table, &mut once, "meals")?;

    let mut twice = SqliteStore::in_memory()?;
    Loader.load(&table, &mut twice, "meals")?;
    Loader.load(&table, &mut twice, "meals")?;

    assert_eq!(once.select_all("meals")?, twice.select_all("meals")?);
    assert_eq!(once.column_names("meals")?, twice.column_names("meals")?);
    assert_eq!(
        twice.column_names("meals")?,
        vec!["user_id", "amount", "number_of_meals"]
    );
    Ok(())
}
