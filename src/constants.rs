//! Reference configuration for the meals pipeline.
//! These are the defaults behind `PipelineConfig::default()`.

// Source of the raw transactions
pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/mage-ai/datasets/master/restaurant_user_transactions.csv";

// Target table and store
pub const DEFAULT_TABLE_NAME: &str = "meals";
pub const IN_MEMORY_STORE: &str = ":memory:";

// Transformer columns (pre-normalization names)
pub const GROUP_KEY_COLUMN: &str = "user ID";
pub const DERIVED_COUNT_COLUMN: &str = "number of meals";

/// Rows shown in the run preview
pub const PREVIEW_ROWS: usize = 5;
