// Analytics event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventType {
    Classification,
    Crisis,
    Engagement,
    Feedback,
    ResourceClick,
}

impl AnalyticsEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsEventType::Classification => "classification",
            AnalyticsEventType::Crisis => "crisis",
            AnalyticsEventType::Engagement => "engagement",
            AnalyticsEventType::Feedback => "feedback",
            AnalyticsEventType::ResourceClick => "resource_click",
        }
    }
}

impl fmt::Display for AnalyticsEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    #[serde(rename = "type")]
    pub event_type: AnalyticsEventType,
    pub user_id: String,
    pub session_id: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(
        event_type: AnalyticsEventType,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            user_id: user_id.into(),
            session_id: session_id.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// `data.severity` for crisis events
    pub fn severity(&self) -> Option<f64> {
        self.data.get("severity").and_then(|v| v.as_f64())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsStats {
    pub events_queued: u64,
    pub events_processed: u64,
    pub events_failed: u64,
    pub batches_processed: u64,
    pub average_batch_size: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_at: Option<DateTime<Utc>>,
    pub queue_size: usize,
    pub failed_batches: usize,
    pub processing: bool,
}
