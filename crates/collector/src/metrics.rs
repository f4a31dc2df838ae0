use std::path::Path;

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

pub static QUESTIONS_FETCHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "so_pipeline_questions_fetched_total",
        "Question records returned by the API"
    )
    .expect("questions fetched")
});

pub static QUESTIONS_INSERTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "so_pipeline_questions_inserted_total",
        "Question rows written to the questions table"
    )
    .expect("questions inserted")
});

pub static NORMALIZE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "so_pipeline_normalize_failures_total",
        "Question records rejected by the normalizer"
    )
    .expect("normalize failures")
});

pub static API_QUOTA_REMAINING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "so_pipeline_api_quota_remaining",
        "Request quota left as reported by the most recent API response"
    )
    .expect("api quota remaining")
});

pub static STEP_OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "so_pipeline_step_outcomes_total",
        "Pipeline steps executed grouped by step and outcome",
        &["step", "outcome"]
    )
    .expect("step outcomes")
});

pub static STEP_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "so_pipeline_step_duration_seconds",
        "Wall-clock duration of each pipeline step",
        &["step"]
    )
    .expect("step duration")
});

pub static LAST_SUCCESS_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "so_pipeline_last_success_timestamp_seconds",
        "Unix timestamp of the last invocation whose steps all succeeded"
    )
    .expect("last success timestamp")
});

pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Writes the registry atomically for a node-exporter textfile collector.
pub fn write_textfile(path: &Path) -> anyhow::Result<()> {
    let rendered = render()?;
    let staging = path.with_extension("prom.tmp");
    std::fs::write(&staging, rendered)?;
    std::fs::rename(&staging, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_output_lists_registered_series() {
        QUESTIONS_FETCHED_TOTAL.inc_by(0);
        STEP_OUTCOMES_TOTAL
            .with_label_values(&["truncate", "success"])
            .inc();
        let rendered = render().unwrap();
        assert!(rendered.contains("so_pipeline_questions_fetched_total"));
        assert!(rendered.contains("so_pipeline_step_outcomes_total{outcome=\"success\",step=\"truncate\"}"));
    }
}
