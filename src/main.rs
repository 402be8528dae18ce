use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use meals_etl::config::PipelineConfig;
use meals_etl::logging;
use meals_etl::pipeline::{Pipeline, RetryPolicy};

#[derive(Parser)]
#[command(name = "meals_etl")]
#[command(about = "Extract restaurant transactions, count meals per user, load into SQLite")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML file with pipeline settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV source to fetch
    #[arg(long)]
    source_url: Option<String>,

    /// Target table name
    #[arg(long)]
    table: Option<String>,

    /// SQLite database path, or ":memory:"
    #[arg(long)]
    store: Option<String>,

    /// Total fetch attempts for transport failures
    #[arg(long)]
    retries: Option<u32>,

    /// Print the run outcome as JSON instead of a preview
    #[arg(long)]
    json: bool,

    /// Directory for rolling log files
    #[arg(long, default_value = "logs")]
    log_dir: String,
}

impl Cli {
    fn resolve_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        config.apply_env_overrides();

        if let Some(url) = &self.source_url {
            config.source_url = url.clone();
        }
        if let Some(table) = &self.table {
            config.table_name = table.clone();
        }
        if let Some(store) = &self.store {
            config.store_locator = store.clone();
        }
        if let Some(attempts) = self.retries {
            config.retry = RetryPolicy::with_attempts(attempts, config.retry.initial_backoff_ms);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _guard = logging::init_logging(&cli.log_dir);

    let config = cli.resolve_config()?;
    info!(
        "Running pipeline: source={} table={} store={}",
        config.source_url, config.table_name, config.store_locator
    );

    let mut pipeline = Pipeline::from_config(config)?;
    let outcome = match pipeline.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Err(e.into());
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", outcome.preview);
        println!("{}", outcome.validated);
    }
    Ok(())
}
