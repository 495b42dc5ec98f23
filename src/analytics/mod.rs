// Batch analytics
// Buffered event capture flushed to a pluggable sink

mod processor;
mod sink;
mod types;

use anyhow::Result;
use std::sync::Arc;

pub use processor::BatchAnalyticsProcessor;
pub use sink::{AnalyticsSink, JsonlSink, LogSink};
pub use types::{AnalyticsEvent, AnalyticsEventType, AnalyticsStats};

use crate::config::AnalyticsConfig;

/// JSONL sink when an output directory is configured, log sink otherwise
pub fn create_sink(config: &AnalyticsConfig) -> Result<Arc<dyn AnalyticsSink>> {
    Ok(match &config.output_dir {
        Some(dir) => Arc::new(JsonlSink::new(dir.clone())?),
        None => Arc::new(LogSink),
    })
}
