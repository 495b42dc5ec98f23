// Crisis audit record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audit retention period
pub const RETENTION_YEARS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisType {
    Suicide,
    SelfHarm,
    Despair,
    Violence,
    Abuse,
    Other,
}

impl CrisisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrisisType::Suicide => "suicide",
            CrisisType::SelfHarm => "self_harm",
            CrisisType::Despair => "despair",
            CrisisType::Violence => "violence",
            CrisisType::Abuse => "abuse",
            CrisisType::Other => "other",
        }
    }

    /// Crisis type implied by a classifier subcategory
    pub fn from_subcategory(subcategory: &str) -> Self {
        match subcategory {
            "suicide" | "suicidal_ideation" | "immediate_danger" | "ending_life" | "planning"
            | "finality" | "overdose" => CrisisType::Suicide,
            "self_harm" => CrisisType::SelfHarm,
            "despair" | "hopelessness" | "burden" => CrisisType::Despair,
            "violence" => CrisisType::Violence,
            "abuse" => CrisisType::Abuse,
            _ => CrisisType::Other,
        }
    }
}

/// Audit severity (1-5) implied by a classifier subcategory
pub fn severity_for_subcategory(subcategory: &str) -> u8 {
    match subcategory {
        "suicide" | "suicidal_ideation" | "immediate_danger" | "ending_life" | "planning"
        | "overdose" => 5,
        "self_harm" => 4,
        _ => 3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Regex,
    Claude,
    Hybrid,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    None,
    Flagged,
    HumanReview,
    EmergencyServices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    ResourcesProvided,
    Escalated,
    UserSafe,
    Resolved,
    Unknown,
}

impl Outcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Outcome::Resolved | Outcome::UserSafe)
    }
}

/// Caller-supplied facts about a crisis event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisEventDetails {
    pub crisis_type: CrisisType,
    /// 1 (concern) to 5 (imminent danger)
    pub severity: u8,
    pub confidence: f64,
    pub detection_method: DetectionMethod,
    /// Raw trigger text; only the redacted form is stored
    #[serde(default)]
    pub trigger_text: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Immutable audit record (outcome fields may be amended)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub hashed_user_id: String,
    pub session_id: String,
    pub crisis_type: CrisisType,
    pub severity: u8,
    pub confidence: f64,
    pub detection_method: DetectionMethod,
    #[serde(default)]
    pub redacted_trigger: Option<String>,
    pub actions_taken: Vec<String>,
    pub resources_provided: Vec<String>,
    pub human_notified: bool,
    pub escalation_level: EscalationLevel,
    pub outcome: Outcome,
    #[serde(default)]
    pub outcome_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub follow_up_scheduled: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    pub retention_until: DateTime<Utc>,
}

/// Query filter for audit events
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventFilter {
    /// Raw user id; hashed before matching
    pub user_id: Option<String>,
    pub crisis_type: Option<CrisisType>,
    pub min_severity: Option<u8>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub unresolved_only: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrisisStats {
    pub total_crisis: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<u8, usize>,
    pub average_confidence: f64,
    pub human_notification_rate: f64,
    pub escalation_rate: f64,
    pub resolution_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetentionCompliance {
    pub retention_years: u32,
    pub compliant: bool,
    /// Events whose retention date is earlier than required
    pub violations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrisisExport {
    pub total_events: usize,
    pub events: Vec<CrisisEvent>,
    pub export_date: DateTime<Utc>,
    pub retention_compliance: RetentionCompliance,
}
