// Feedback system for response quality tracking
//
// Users rate each response; ratings feed classification error review,
// improvement insights, and an optional JSONL log.

mod collector;
mod log;
mod trends;
mod types;

use anyhow::Result;

pub use collector::FeedbackCollector;
pub use log::FeedbackLog;
pub use trends::HelpfulnessTrend;
pub use types::{
    feedback_options, AccuracyReport, ClassificationErrorRecord, ConfusionEntry,
    ConfusionExample, ErrorPattern, FeedbackDetails, FeedbackOption, FeedbackRecord,
    FeedbackStats, FeedbackType, HealthLevel, Insight, InsightKind, ModelHealth, ToneIssue, Trend,
};

use crate::config::FeedbackConfig;

/// Build the collector described by config
pub fn create_feedback_collector(config: &FeedbackConfig) -> Result<FeedbackCollector> {
    let collector = FeedbackCollector::new(config.trend_window);
    Ok(match &config.log_path {
        Some(path) => collector.with_log(FeedbackLog::new(path.clone())?),
        None => collector,
    })
}
