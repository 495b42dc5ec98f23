// Crisis audit trail over the JSONL store

use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;

use amani::audit::{
    AuditStore, CrisisAuditLogger, CrisisEvent, CrisisEventDetails, CrisisType, DetectionMethod,
    EscalationLevel, EventFilter, JsonlAuditStore, Outcome,
};
use amani::crisis::{detect_crisis_severity, CrisisEscalationManager};
use amani::moderation::InMemoryModeration;
use amani::notify::LogNotifier;

fn jsonl_logger(dir: &TempDir) -> CrisisAuditLogger {
    let store = JsonlAuditStore::new(dir.path().join("audit").join("crisis.jsonl")).unwrap();
    CrisisAuditLogger::new(Arc::new(store), "test-salt", None)
}

fn details(trigger: &str) -> CrisisEventDetails {
    CrisisEventDetails {
        crisis_type: CrisisType::Suicide,
        severity: 5,
        confidence: 0.95,
        detection_method: DetectionMethod::Regex,
        trigger_text: Some(trigger.to_string()),
        notes: None,
    }
}

#[test]
fn test_event_is_hashed_and_redacted() {
    let dir = TempDir::new().unwrap();
    let logger = jsonl_logger(&dir);

    let id = logger.log_crisis_event(
        "user-42",
        "session-1",
        details("Last night Marcus said call 5551234 or mail me at m@x.com, I want to die"),
    );

    let events = logger.crisis_events(&EventFilter::default()).unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.id, id);
    assert_ne!(event.hashed_user_id, "user-42");
    assert_eq!(event.hashed_user_id, logger.hash_user_id("user-42"));
    assert_eq!(event.escalation_level, EscalationLevel::EmergencyServices);
    assert!(event.human_notified);

    let trigger = event.redacted_trigger.as_deref().unwrap();
    assert!(!trigger.contains("Marcus"));
    assert!(!trigger.contains("5551234"));
    assert!(!trigger.contains("m@x.com"));
    assert!(trigger.contains("[NAME]"));
    assert!(trigger.contains("[NUMBER]"));
    assert!(trigger.contains("[EMAIL]"));
    assert!(trigger.contains("want to die"));
    assert!(trigger.starts_with("Last night [NAME] said"));

    let raw = std::fs::read_to_string(dir.path().join("audit").join("crisis.jsonl")).unwrap();
    assert!(!raw.contains("user-42"));
}

#[test]
fn test_outcome_amendment_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let logger = jsonl_logger(&dir);
        let id = logger.log_crisis_event("user-1", "s", details("I want to end it all"));
        assert!(logger
            .update_outcome(&id, Outcome::UserSafe, Some("called back".to_string()))
            .unwrap());
        assert!(!logger.update_outcome("crisis_missing", Outcome::Resolved, None).unwrap());
        id
    };

    let reopened = jsonl_logger(&dir);
    let events = reopened.crisis_events(&EventFilter::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, id);
    assert_eq!(events[0].outcome, Outcome::UserSafe);
    assert_eq!(events[0].notes.as_deref(), Some("called back"));
    assert!(events[0].outcome_updated_at.is_some());
    assert!(reopened.unresolved_crises().unwrap().is_empty());
}

#[test]
fn test_stats_and_export() {
    let dir = TempDir::new().unwrap();
    let logger = jsonl_logger(&dir);

    let first = logger.log_crisis_event("user-1", "s", details("I want to die"));
    logger.log_crisis_event(
        "user-2",
        "s",
        CrisisEventDetails {
            crisis_type: CrisisType::Despair,
            severity: 3,
            confidence: 0.7,
            detection_method: DetectionMethod::Claude,
            trigger_text: None,
            notes: None,
        },
    );
    logger.update_outcome(&first, Outcome::Resolved, None).unwrap();

    let stats = logger.get_crisis_stats(None).unwrap();
    assert_eq!(stats.total_crisis, 2);
    assert_eq!(stats.by_type.get("suicide"), Some(&1));
    assert_eq!(stats.by_type.get("despair"), Some(&1));
    assert!((stats.resolution_rate - 0.5).abs() < 1e-9);
    assert!((stats.human_notification_rate - 0.5).abs() < 1e-9);

    let export = logger.export_crisis_logs(None, None).unwrap();
    assert_eq!(export.total_events, 2);
    assert!(export.retention_compliance.compliant);
    assert_eq!(export.retention_compliance.retention_years, 5);
    for event in &export.events {
        assert!(event.retention_until > event.timestamp);
    }

    let only_user_two = logger
        .crisis_events(&EventFilter {
            user_id: Some("user-2".to_string()),
            ..EventFilter::default()
        })
        .unwrap();
    assert_eq!(only_user_two.len(), 1);
    assert_eq!(only_user_two[0].crisis_type, CrisisType::Despair);
}

#[tokio::test]
async fn test_check_in_follow_up_persists() {
    let dir = TempDir::new().unwrap();
    let event_id = {
        let audit = Arc::new(jsonl_logger(&dir));
        let manager = CrisisEscalationManager::new(
            Arc::new(LogNotifier),
            Arc::new(InMemoryModeration::new()),
            audit,
        );
        let severity = detect_crisis_severity("I think I need help", None).unwrap();
        let response = manager
            .execute_crisis_response("user-7", "s", "I think I need help", &severity)
            .await;
        assert!(response.actions.iter().all(|a| a.executed));
        response.audit_event_id.unwrap()
    };

    let reopened = jsonl_logger(&dir);
    let events = reopened.crisis_events(&EventFilter::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, event_id);
    assert!(events[0].follow_up_scheduled.unwrap() > events[0].timestamp);
}

struct BrokenStore;

impl AuditStore for BrokenStore {
    fn append(&self, _event: &CrisisEvent) -> Result<()> {
        anyhow::bail!("disk full")
    }

    fn amend(&self, _event: &CrisisEvent) -> Result<()> {
        anyhow::bail!("disk full")
    }

    fn all(&self) -> Result<Vec<CrisisEvent>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_rejected_event_goes_to_emergency_log() {
    let dir = TempDir::new().unwrap();
    let emergency = dir.path().join("emergency.jsonl");
    let logger = CrisisAuditLogger::new(Arc::new(BrokenStore), "salt", Some(emergency.clone()));

    let id = logger.log_crisis_event("user-1", "s", details("I want to die"));

    let raw = std::fs::read_to_string(&emergency).unwrap();
    assert!(raw.contains(&id));
    assert!(!raw.contains("user-1"));
}
