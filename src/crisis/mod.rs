// Crisis escalation
// Severity tiers and the manager that acts on them

mod manager;
mod severity;

pub use manager::{
    detect_crisis_severity, generate_crisis_response, ActionRecord, ActiveCrisis, AlertStatus,
    CrisisEscalationManager, CrisisResponse, CrisisStatus, DisplayMode, EscalationStats,
    GeneratedCrisisMessage, ModeratorAlert, SeverityMatch, Urgency, CLASSIFICATION_DETECTED,
};
pub use severity::{
    tiers, CrisisAction, CrisisResource, ResourceBundle, SeverityLevel, SeverityTier, ELEVATED,
    MODERATE, SEVERE,
};
