// Analytics sinks
//
// Where flushed batches go. One call per event type per flush.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use super::types::{AnalyticsEvent, AnalyticsEventType};

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn write_batch(&self, event_type: AnalyticsEventType, events: &[AnalyticsEvent]) -> Result<()>;
}

/// Logs batch sizes only
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl AnalyticsSink for LogSink {
    async fn write_batch(&self, event_type: AnalyticsEventType, events: &[AnalyticsEvent]) -> Result<()> {
        tracing::info!(event_type = %event_type, count = events.len(), "Analytics batch");
        Ok(())
    }
}

/// Appends each type to `<dir>/<type>.jsonl`
pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create analytics directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, event_type: AnalyticsEventType) -> PathBuf {
        self.dir.join(format!("{}.jsonl", event_type))
    }
}

#[async_trait]
impl AnalyticsSink for JsonlSink {
    async fn write_batch(&self, event_type: AnalyticsEventType, events: &[AnalyticsEvent]) -> Result<()> {
        let path = self.path_for(event_type);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open analytics file: {}", path.display()))?;

        let mut buf = String::new();
        for event in events {
            buf.push_str(&serde_json::to_string(event)?);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .with_context(|| format!("Failed to write analytics file: {}", path.display()))?;

        tracing::debug!(event_type = %event_type, count = events.len(), path = %path.display(), "Wrote analytics batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_jsonl_sink_appends_per_type() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlSink::new(dir.path().join("analytics")).unwrap();

        let events = vec![
            AnalyticsEvent::new(AnalyticsEventType::Feedback, "u1", "s1", serde_json::json!({"type": "helpful"})),
            AnalyticsEvent::new(AnalyticsEventType::Feedback, "u2", "s2", serde_json::json!({"type": "tone_off"})),
        ];
        sink.write_batch(AnalyticsEventType::Feedback, &events).await.unwrap();
        sink.write_batch(AnalyticsEventType::Feedback, &events[..1]).await.unwrap();

        let content = std::fs::read_to_string(sink.path_for(AnalyticsEventType::Feedback)).unwrap();
        assert_eq!(content.lines().count(), 3);
        let first: AnalyticsEvent = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first.user_id, "u1");
        assert!(!sink.path_for(AnalyticsEventType::Crisis).exists());
    }
}
