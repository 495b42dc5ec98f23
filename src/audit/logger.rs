// Crisis audit logger
//
// log_crisis_event never fails: if the store rejects an event it goes to the
// emergency file, and if that fails too the serialized event is written to
// the error log.

use anyhow::{Context, Result};
use chrono::{DateTime, Months, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use super::store::AuditStore;
use super::types::{
    CrisisEvent, CrisisEventDetails, CrisisExport, CrisisStats, CrisisType, EscalationLevel,
    EventFilter, Outcome, RetentionCompliance, RETENTION_YEARS,
};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[\w.+-]+@[\w-]+(\.[\w-]+)+\b").expect("email pattern must compile")
});
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\b").expect("number pattern must compile"));
static CAPITALIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\b").expect("name pattern must compile"));

/// Capitalized words that carry crisis meaning and survive redaction
const PRESERVED_WORDS: &[&str] = &[
    "suicide", "suicidal", "kill", "killing", "die", "dying", "dead", "death", "hurt", "harm",
    "cut", "cutting", "pills", "gun", "overdose", "end", "ending", "life", "live", "want",
    "hopeless", "worthless", "goodbye", "burden", "help", "myself", "pain", "please", "tonight",
];

/// Strip identifying details from trigger text
///
/// Capitalized words are treated as names unless they open a sentence.
pub fn redact(text: &str) -> String {
    let text = EMAIL.replace_all(text, "[EMAIL]");
    let text = NUMBER.replace_all(&text, "[NUMBER]");
    CAPITALIZED
        .replace_all(&text, |caps: &Captures| {
            let word = &caps[0];
            let start = caps.get(0).map_or(0, |m| m.start());
            if starts_sentence(&text[..start])
                || PRESERVED_WORDS.contains(&word.to_lowercase().as_str())
            {
                word.to_string()
            } else {
                "[NAME]".to_string()
            }
        })
        .into_owned()
}

fn starts_sentence(preceding: &str) -> bool {
    match preceding.trim_end().chars().last() {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?'),
    }
}

/// Standard actions recorded for a severity
pub fn standard_actions(severity: u8) -> Vec<String> {
    let mut actions = vec![
        "crisis_response_sent",
        "hotline_numbers_provided",
        "logged_in_crisis_database",
    ];
    if severity >= 3 {
        actions.push("flagged_for_review");
    }
    if severity >= 4 {
        actions.push("human_notification_sent");
        actions.push("emergency_contact_prepared");
    }
    if severity >= 5 {
        actions.push("immediate_escalation");
        actions.push("emergency_services_recommended");
    }
    actions.into_iter().map(String::from).collect()
}

/// Resources recorded for a crisis type
pub fn resources_for(crisis_type: CrisisType) -> Vec<String> {
    let mut resources = vec![
        "988_suicide_crisis_lifeline",
        "crisis_text_line_741741",
        "911_emergency_services",
    ];
    match crisis_type {
        CrisisType::Abuse | CrisisType::Violence => {
            resources.push("domestic_violence_hotline");
            resources.push("rainn");
        }
        CrisisType::Suicide | CrisisType::SelfHarm => {
            resources.push("nami_helpline");
            resources.push("samhsa_helpline");
        }
        _ => {}
    }
    resources.into_iter().map(String::from).collect()
}

/// Escalation matrix over severity and confidence
pub fn escalation_level(severity: u8, confidence: f64) -> EscalationLevel {
    if severity >= 5 || (severity >= 4 && confidence >= 0.9) {
        EscalationLevel::EmergencyServices
    } else if severity >= 4 || (severity >= 3 && confidence >= 0.9) {
        EscalationLevel::HumanReview
    } else if severity >= 3 {
        EscalationLevel::Flagged
    } else {
        EscalationLevel::None
    }
}

fn retention_deadline(from: DateTime<Utc>) -> DateTime<Utc> {
    from.checked_add_months(Months::new(RETENTION_YEARS * 12))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub struct CrisisAuditLogger {
    store: Arc<dyn AuditStore>,
    salt: String,
    emergency_log_path: Option<PathBuf>,
}

impl CrisisAuditLogger {
    pub fn new(store: Arc<dyn AuditStore>, salt: impl Into<String>, emergency_log_path: Option<PathBuf>) -> Self {
        Self {
            store,
            salt: salt.into(),
            emergency_log_path,
        }
    }

    /// Salted SHA-256 of a user id, hex encoded
    pub fn hash_user_id(&self, user_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(user_id.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Record a crisis event; returns the event id
    pub fn log_crisis_event(&self, user_id: &str, session_id: &str, details: CrisisEventDetails) -> String {
        let severity = details.severity.clamp(1, 5);
        let confidence = details.confidence.clamp(0.0, 1.0);
        let timestamp = Utc::now();

        let event = CrisisEvent {
            id: format!("crisis_{}", uuid::Uuid::new_v4()),
            timestamp,
            hashed_user_id: self.hash_user_id(user_id),
            session_id: session_id.to_string(),
            crisis_type: details.crisis_type,
            severity,
            confidence,
            detection_method: details.detection_method,
            redacted_trigger: details.trigger_text.as_deref().map(redact),
            actions_taken: standard_actions(severity),
            resources_provided: resources_for(details.crisis_type),
            human_notified: severity >= 4,
            escalation_level: escalation_level(severity, confidence),
            outcome: Outcome::Pending,
            outcome_updated_at: None,
            follow_up_scheduled: None,
            notes: details.notes,
            retention_until: retention_deadline(timestamp),
        };

        match self.store.append(&event) {
            Ok(()) => {
                tracing::info!(
                    event_id = %event.id,
                    crisis_type = event.crisis_type.as_str(),
                    severity,
                    escalation = ?event.escalation_level,
                    "Crisis event logged"
                );
            }
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Audit store rejected crisis event");
                self.write_emergency(&event);
            }
        }

        event.id
    }

    fn write_emergency(&self, event: &CrisisEvent) {
        let json = serde_json::to_string(event)
            .unwrap_or_else(|e| format!("{{\"id\":\"{}\",\"serialize_error\":\"{}\"}}", event.id, e));

        let written = self.emergency_log_path.as_ref().map(|path| -> Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open emergency log: {}", path.display()))?;
            writeln!(file, "{}", json).context("Failed to write emergency log")?;
            Ok(())
        });

        match written {
            Some(Ok(())) => {
                tracing::warn!(event_id = %event.id, "Crisis event written to emergency log");
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, event = %json, "CRISIS EVENT NOT PERSISTED");
            }
            None => {
                tracing::error!(event = %json, "CRISIS EVENT NOT PERSISTED (no emergency log)");
            }
        }
    }

    fn amend(&self, event_id: &str, apply: impl FnOnce(&mut CrisisEvent)) -> Result<bool> {
        let Some(original) = self.store.all()?.into_iter().find(|e| e.id == event_id) else {
            return Ok(false);
        };

        let mut updated = original.clone();
        apply(&mut updated);
        // Identity and retention are fixed at creation
        updated.id = original.id;
        updated.timestamp = original.timestamp;
        updated.hashed_user_id = original.hashed_user_id;
        updated.retention_until = updated.retention_until.max(original.retention_until);

        self.store.amend(&updated)?;
        Ok(true)
    }

    pub fn update_outcome(&self, event_id: &str, outcome: Outcome, notes: Option<String>) -> Result<bool> {
        self.amend(event_id, |event| {
            event.outcome = outcome;
            event.outcome_updated_at = Some(Utc::now());
            if notes.is_some() {
                event.notes = notes;
            }
        })
    }

    pub fn schedule_follow_up(&self, event_id: &str, at: DateTime<Utc>) -> Result<bool> {
        self.amend(event_id, |event| {
            event.follow_up_scheduled = Some(at);
        })
    }

    pub fn crisis_events(&self, filter: &EventFilter) -> Result<Vec<CrisisEvent>> {
        let hashed = filter.user_id.as_deref().map(|id| self.hash_user_id(id));

        Ok(self
            .store
            .all()?
            .into_iter()
            .filter(|e| hashed.as_ref().map_or(true, |h| &e.hashed_user_id == h))
            .filter(|e| filter.crisis_type.map_or(true, |t| e.crisis_type == t))
            .filter(|e| filter.min_severity.map_or(true, |s| e.severity >= s))
            .filter(|e| filter.since.map_or(true, |since| e.timestamp >= since))
            .filter(|e| filter.until.map_or(true, |until| e.timestamp <= until))
            .filter(|e| !filter.unresolved_only || !e.outcome.is_resolved())
            .collect())
    }

    pub fn unresolved_crises(&self) -> Result<Vec<CrisisEvent>> {
        self.crisis_events(&EventFilter {
            unresolved_only: true,
            ..EventFilter::default()
        })
    }

    pub fn get_crisis_stats(&self, since: Option<DateTime<Utc>>) -> Result<CrisisStats> {
        let events = self.crisis_events(&EventFilter {
            since,
            ..EventFilter::default()
        })?;

        let total = events.len();
        if total == 0 {
            return Ok(CrisisStats::default());
        }

        let mut by_type = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        for event in &events {
            *by_type.entry(event.crisis_type.as_str().to_string()).or_insert(0) += 1;
            *by_severity.entry(event.severity).or_insert(0) += 1;
        }

        let rate = |count: usize| count as f64 / total as f64;

        Ok(CrisisStats {
            total_crisis: total,
            by_type,
            by_severity,
            average_confidence: events.iter().map(|e| e.confidence).sum::<f64>() / total as f64,
            human_notification_rate: rate(events.iter().filter(|e| e.human_notified).count()),
            escalation_rate: rate(
                events
                    .iter()
                    .filter(|e| e.escalation_level >= EscalationLevel::HumanReview)
                    .count(),
            ),
            resolution_rate: rate(events.iter().filter(|e| e.outcome.is_resolved()).count()),
        })
    }

    pub fn export_crisis_logs(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<CrisisExport> {
        let events = self.crisis_events(&EventFilter {
            since,
            until,
            ..EventFilter::default()
        })?;

        let violations = events
            .iter()
            .filter(|e| e.retention_until < retention_deadline(e.timestamp))
            .count();

        Ok(CrisisExport {
            total_events: events.len(),
            events,
            export_date: Utc::now(),
            retention_compliance: RetentionCompliance {
                retention_years: RETENTION_YEARS,
                compliant: violations == 0,
                violations,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{DetectionMethod, InMemoryAuditStore};

    fn logger() -> CrisisAuditLogger {
        CrisisAuditLogger::new(Arc::new(InMemoryAuditStore::new()), "salt", None)
    }

    fn details(severity: u8, confidence: f64) -> CrisisEventDetails {
        CrisisEventDetails {
            crisis_type: CrisisType::Suicide,
            severity,
            confidence,
            detection_method: DetectionMethod::Regex,
            trigger_text: Some("Then Marcus said I want to die at 5".to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_redaction() {
        assert_eq!(
            redact("Yesterday Marcus said I want to die at 5"),
            "Yesterday [NAME] said I want to die at [NUMBER]"
        );
        assert_eq!(redact("email me at j.doe@example.com"), "email me at [EMAIL]");
        assert_eq!(redact("Suicide feels close"), "Suicide feels close");
    }

    #[test]
    fn test_sentence_openers_survive_redaction() {
        assert_eq!(
            redact("Everything hurts. Nobody listens! Why does Keisha ignore me?"),
            "Everything hurts. Nobody listens! Why does [NAME] ignore me?"
        );
        assert_eq!(redact("  Tonight is bad"), "  Tonight is bad");
    }

    #[test]
    fn test_escalation_matrix() {
        assert_eq!(escalation_level(5, 0.1), EscalationLevel::EmergencyServices);
        assert_eq!(escalation_level(4, 0.95), EscalationLevel::EmergencyServices);
        assert_eq!(escalation_level(4, 0.5), EscalationLevel::HumanReview);
        assert_eq!(escalation_level(3, 0.9), EscalationLevel::HumanReview);
        assert_eq!(escalation_level(3, 0.5), EscalationLevel::Flagged);
        assert_eq!(escalation_level(2, 0.99), EscalationLevel::None);
    }

    #[test]
    fn test_actions_and_resources() {
        assert_eq!(standard_actions(2).len(), 3);
        assert!(standard_actions(3).contains(&"flagged_for_review".to_string()));
        assert_eq!(standard_actions(5).len(), 8);
        assert!(resources_for(CrisisType::Abuse).contains(&"rainn".to_string()));
        assert!(resources_for(CrisisType::SelfHarm).contains(&"samhsa_helpline".to_string()));
        assert_eq!(resources_for(CrisisType::Despair).len(), 3);
    }

    #[test]
    fn test_log_event_fields() {
        let logger = logger();
        let id = logger.log_crisis_event("user-1", "s1", details(4, 0.8));

        let events = logger.crisis_events(&EventFilter::default()).unwrap();
        let event = &events[0];
        assert_eq!(event.id, id);
        assert_ne!(event.hashed_user_id, "user-1");
        assert_eq!(event.hashed_user_id, logger.hash_user_id("user-1"));
        assert!(event.human_notified);
        assert_eq!(event.escalation_level, EscalationLevel::HumanReview);
        assert_eq!(
            event.redacted_trigger.as_deref(),
            Some("Then [NAME] said I want to die at [NUMBER]")
        );
        assert!(event.retention_until >= event.timestamp + chrono::Duration::days(365 * 5));
    }

    #[test]
    fn test_outcome_update_and_stats() {
        let logger = logger();
        let first = logger.log_crisis_event("u1", "s1", details(5, 0.95));
        logger.log_crisis_event("u2", "s2", details(3, 0.6));

        assert!(logger.update_outcome(&first, Outcome::UserSafe, Some("checked in".into())).unwrap());
        assert!(!logger.update_outcome("missing", Outcome::Resolved, None).unwrap());

        let stats = logger.get_crisis_stats(None).unwrap();
        assert_eq!(stats.total_crisis, 2);
        assert_eq!(stats.resolution_rate, 0.5);
        assert_eq!(stats.human_notification_rate, 0.5);
        assert_eq!(stats.by_severity[&5], 1);

        let unresolved = logger.unresolved_crises().unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].severity, 3);
    }

    #[test]
    fn test_filter_by_user() {
        let logger = logger();
        logger.log_crisis_event("u1", "s1", details(5, 0.95));
        logger.log_crisis_event("u2", "s2", details(3, 0.6));

        let filter = EventFilter {
            user_id: Some("u2".to_string()),
            ..EventFilter::default()
        };
        let events = logger.crisis_events(&filter).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session_id, "s2");
    }

    #[test]
    fn test_export_compliance() {
        let logger = logger();
        logger.log_crisis_event("u1", "s1", details(5, 0.95));
        let export = logger.export_crisis_logs(None, None).unwrap();
        assert_eq!(export.total_events, 1);
        assert!(export.retention_compliance.compliant);
        assert_eq!(export.retention_compliance.retention_years, 5);
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
    fn test_store_failure_goes_to_emergency_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emergency.jsonl");
        let logger = CrisisAuditLogger::new(Arc::new(BrokenStore), "salt", Some(path.clone()));

        let id = logger.log_crisis_event("u1", "s1", details(5, 0.99));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(&id));
    }

    #[test]
    fn test_total_failure_still_returns_id() {
        let logger = CrisisAuditLogger::new(
            Arc::new(BrokenStore),
            "salt",
            Some(PathBuf::from("/nonexistent-dir/for/sure/emergency.jsonl")),
        );
        let id = logger.log_crisis_event("u1", "s1", details(5, 0.99));
        assert!(id.starts_with("crisis_"));
    }
}
