//! Metric names and recording helpers for the ETL pipeline.
//!
//! Recording goes through the `metrics` facade; without an installed recorder
//! every call is a no-op, so stages can record unconditionally.

use std::fmt;

/// Enum representing all metric names used in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Pipeline metrics
    PipelineRuns,
    PipelineValidated,
    PipelineMismatched,
    PipelineErrors,
    PipelineDuration,

    // Extract metrics
    ExtractAttempts,
    ExtractDuration,
    ExtractBytes,
    ExtractRows,

    // Transform metrics
    TransformDistinctKeys,
    TransformRenamedColumns,

    // Load metrics
    LoadDuration,
    LoadRows,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PipelineRuns => "etl_pipeline_runs_total",
            MetricName::PipelineValidated => "etl_pipeline_validated_total",
            MetricName::PipelineMismatched => "etl_pipeline_mismatched_total",
            MetricName::PipelineErrors => "etl_pipeline_errors_total",
            MetricName::PipelineDuration => "etl_pipeline_duration_seconds",

            MetricName::ExtractAttempts => "etl_extract_attempts_total",
            MetricName::ExtractDuration => "etl_extract_duration_seconds",
            MetricName::ExtractBytes => "etl_extract_bytes",
            MetricName::ExtractRows => "etl_extract_rows",

            MetricName::TransformDistinctKeys => "etl_transform_distinct_keys",
            MetricName::TransformRenamedColumns => "etl_transform_renamed_columns_total",

            MetricName::LoadDuration => "etl_load_duration_seconds",
            MetricName::LoadRows => "etl_load_rows",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn run_started() {
        ::metrics::counter!(MetricName::PipelineRuns.as_str()).increment(1);
    }

    pub fn run_finished(validated: bool, duration_secs: f64) {
        let name = if validated {
            MetricName::PipelineValidated
        } else {
            MetricName::PipelineMismatched
        };
        ::metrics::counter!(name.as_str()).increment(1);
        ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(duration_secs);
    }

    pub fn run_failed(stage: &'static str) {
        ::metrics::counter!(MetricName::PipelineErrors.as_str(), "stage" => stage).increment(1);
    }
}

pub mod extract {
    use super::MetricName;

    pub fn attempt() {
        ::metrics::counter!(MetricName::ExtractAttempts.as_str()).increment(1);
    }

    pub fn fetched(bytes: usize, rows: usize, duration_secs: f64) {
        ::metrics::histogram!(MetricName::ExtractDuration.as_str()).record(duration_secs);
        ::metrics::histogram!(MetricName::ExtractBytes.as_str()).record(bytes as f64);
        ::metrics::histogram!(MetricName::ExtractRows.as_str()).record(rows as f64);
    }
}

pub mod transform {
    use super::MetricName;

    pub fn aggregated(distinct_keys: usize) {
        ::metrics::histogram!(MetricName::TransformDistinctKeys.as_str()).record(distinct_keys as f64);
    }

    pub fn columns_renamed(count: usize) {
        ::metrics::counter!(MetricName::TransformRenamedColumns.as_str()).increment(count as u64);
    }
}

pub mod load {
    use super::MetricName;

    pub fn loaded(rows: u64, duration_secs: f64) {
        ::metrics::histogram!(MetricName::LoadDuration.as_str()).record(duration_secs);
        ::metrics::histogram!(MetricName::LoadRows.as_str()).record(rows as f64);
    }
}
