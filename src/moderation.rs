// Moderation actions invoked by crisis escalation

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

#[async_trait]
pub trait ModerationActions: Send + Sync {
    async fn flag_content(&self, content_id: &str, user_id: &str, reason: &str) -> Result<()>;

    async fn remove_content(&self, content_id: &str, reason: &str) -> Result<()>;

    async fn record_warning(&self, user_id: &str, reason: &str) -> Result<()>;

    async fn suspend_user(&self, user_id: &str, days: u32, reason: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationKind {
    Flag,
    Remove,
    Warning,
    Suspension,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationRecord {
    pub kind: ModerationKind,
    pub target: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspension_days: Option<u32>,
    pub at: DateTime<Utc>,
}

/// Records actions in memory and logs them
#[derive(Default)]
pub struct InMemoryModeration {
    records: Mutex<Vec<ModerationRecord>>,
}

impl InMemoryModeration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ModerationRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn push(&self, kind: ModerationKind, target: &str, reason: &str, suspension_days: Option<u32>) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("moderation record lock poisoned"))?;
        records.push(ModerationRecord {
            kind,
            target: target.to_string(),
            reason: reason.to_string(),
            suspension_days,
            at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl ModerationActions for InMemoryModeration {
    async fn flag_content(&self, content_id: &str, user_id: &str, reason: &str) -> Result<()> {
        tracing::info!(content_id, user_id, reason, "Content flagged for review");
        self.push(ModerationKind::Flag, content_id, reason, None)
    }

    async fn remove_content(&self, content_id: &str, reason: &str) -> Result<()> {
        tracing::info!(content_id, reason, "Content removed");
        self.push(ModerationKind::Remove, content_id, reason, None)
    }

    async fn record_warning(&self, user_id: &str, reason: &str) -> Result<()> {
        tracing::info!(user_id, reason, "Warning recorded");
        self.push(ModerationKind::Warning, user_id, reason, None)
    }

    async fn suspend_user(&self, user_id: &str, days: u32, reason: &str) -> Result<()> {
        tracing::warn!(user_id, days, reason, "User suspended");
        self.push(ModerationKind::Suspension, user_id, reason, Some(days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_actions_in_order() {
        let moderation = InMemoryModeration::new();
        moderation.flag_content("msg-1", "u1", "crisis").await.unwrap();
        moderation.record_warning("u1", "spam").await.unwrap();

        let records = moderation.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, ModerationKind::Flag);
        assert_eq!(records[0].target, "msg-1");
        assert_eq!(records[1].kind, ModerationKind::Warning);
    }

    #[tokio::test]
    async fn test_removal_and_suspension() {
        let moderation = InMemoryModeration::new();
        moderation.remove_content("reply-9", "harassment").await.unwrap();
        moderation.suspend_user("u2", 7, "repeated harassment").await.unwrap();

        let records = moderation.records();
        assert_eq!(records[0].kind, ModerationKind::Remove);
        assert_eq!(records[0].target, "reply-9");
        assert_eq!(records[0].suspension_days, None);
        assert_eq!(records[1].kind, ModerationKind::Suspension);
        assert_eq!(records[1].target, "u2");
        assert_eq!(records[1].suspension_days, Some(7));
    }
}
