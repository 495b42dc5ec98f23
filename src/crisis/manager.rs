// Crisis escalation manager
//
// Maps a message to a severity tier, runs the tier's actions with per-action
// failure isolation, and tracks one active crisis per user.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::severity::{tiers, CrisisAction, ResourceBundle, SeverityLevel, SeverityTier};
use crate::audit::{CrisisAuditLogger, CrisisEventDetails, CrisisType, DetectionMethod};
use crate::classifier::{Category, Classification, Method};
use crate::moderation::ModerationActions;
use crate::notify::{NotificationChannel, Notifier};
use crate::storage::{InMemoryStore, KeyValueStore};

/// Marker used when severity comes from the classification, not the text
pub const CLASSIFICATION_DETECTED: &str = "classification_detected";

/// Longest message excerpt carried in moderator alerts
const ALERT_EXCERPT_CHARS: usize = 280;

/// Severity detected for a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityMatch {
    pub level: SeverityLevel,
    pub matched_indicator: String,
    pub crisis_type: CrisisType,
    pub confidence: f64,
    pub detection_method: DetectionMethod,
}

impl SeverityMatch {
    pub fn tier(&self) -> &'static SeverityTier {
        self.level.tier()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrisisStatus {
    Active,
    Resolved,
}

/// Open crisis for one user; last write wins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveCrisis {
    pub user_id: String,
    pub session_id: String,
    pub severity: SeverityLevel,
    pub matched_indicator: String,
    pub timestamp: DateTime<Utc>,
    pub status: CrisisStatus,
    /// Set by TRACK_USER_SESSION / INCREASE_MONITORING
    pub monitoring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub action: CrisisAction,
    pub executed: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayMode {
    CrisisBanner,
    UrgentResources,
    ProfessionalHelp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Immediate,
    High,
    Medium,
}

/// Aggregate result of running a tier's actions
#[derive(Debug, Clone, Serialize)]
pub struct CrisisResponse {
    pub user_id: String,
    pub session_id: String,
    pub severity: SeverityLevel,
    pub actions: Vec<ActionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_mode: Option<DisplayMode>,
    pub human_alert_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_event_id: Option<String>,
}

/// User-facing crisis message for a tier
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedCrisisMessage {
    pub response: String,
    pub display_mode: DisplayMode,
    pub disable_normal_chat: bool,
    pub resources: ResourceBundle,
    pub urgency: Urgency,
    pub show_emergency_banner: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Acknowledged,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeratorAlert {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub severity: SeverityLevel,
    pub channel: NotificationChannel,
    pub message_excerpt: String,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub delivered: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EscalationStats {
    pub active_crises: usize,
    pub active_by_severity: BTreeMap<String, usize>,
    pub total_escalations: u64,
    pub escalations_by_severity: BTreeMap<String, u64>,
    pub resolved_crises: usize,
    pub total_alerts: usize,
    pub pending_alerts: usize,
}

/// Severity for a message, severe tier first
///
/// A CRISIS classification is severe even without an indicator phrase.
/// Pure: the same inputs always give the same tier.
pub fn detect_crisis_severity(
    message: &str,
    classification: Option<&Classification>,
) -> Option<SeverityMatch> {
    let text = message.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    let classified_crisis = classification.map_or(false, |c| c.category == Category::Crisis);

    for tier in tiers() {
        let indicator = tier
            .indicators
            .iter()
            .find(|indicator| text.contains(*indicator))
            .map(|s| s.to_string());

        let matched = match (indicator, tier.level) {
            (Some(indicator), _) => indicator,
            (None, SeverityLevel::Severe) if classified_crisis => CLASSIFICATION_DETECTED.to_string(),
            (None, _) => continue,
        };

        let crisis_type = crisis_type_for(tier.level, &matched, classification);
        let base_confidence = classification.map_or(0.9, |c| c.confidence);
        let confidence = if tier.level == SeverityLevel::Severe {
            base_confidence.max(0.9)
        } else {
            base_confidence
        };

        return Some(SeverityMatch {
            level: tier.level,
            matched_indicator: matched,
            crisis_type,
            confidence,
            detection_method: classification.map_or(DetectionMethod::Regex, |c| detection_method_for(c.method)),
        });
    }

    None
}

fn crisis_type_for(
    level: SeverityLevel,
    indicator: &str,
    classification: Option<&Classification>,
) -> CrisisType {
    if let Some(sub) = classification.and_then(|c| c.subcategory.as_deref()) {
        let from_sub = CrisisType::from_subcategory(sub);
        if from_sub != CrisisType::Other {
            return from_sub;
        }
    }

    if ["self harm", "self-harm", "cut myself", "hurt myself"].contains(&indicator) {
        return CrisisType::SelfHarm;
    }

    match level {
        SeverityLevel::Severe => CrisisType::Suicide,
        SeverityLevel::Moderate | SeverityLevel::Elevated => CrisisType::Despair,
    }
}

fn detection_method_for(method: Method) -> DetectionMethod {
    match method {
        Method::ClaudeFull | Method::ClaudeSimple => DetectionMethod::Claude,
        Method::Hybrid => DetectionMethod::Hybrid,
        Method::EscalationProtocol => DetectionMethod::Manual,
        Method::Regex | Method::RuleBased | Method::AbsoluteFallback => DetectionMethod::Regex,
    }
}

/// Crisis message for a tier; canned wording, fixed hotline numbers
pub fn generate_crisis_response(level: SeverityLevel) -> GeneratedCrisisMessage {
    let resources = level.tier().resources();
    match level {
        SeverityLevel::Severe => GeneratedCrisisMessage {
            response: "I'm really concerned about what you've shared, and I'm glad you told me. \
                Your life matters and you don't have to face this alone. \
                Please reach out right now: call or text 988 (Suicide & Crisis Lifeline), \
                or text HELLO to 741741. If you're in immediate danger, call 911. \
                I'm also connecting you with someone from our team."
                .to_string(),
            display_mode: DisplayMode::CrisisBanner,
            disable_normal_chat: true,
            resources,
            urgency: Urgency::Immediate,
            show_emergency_banner: true,
        },
        SeverityLevel::Moderate => GeneratedCrisisMessage {
            response: "It sounds like you're carrying something really heavy right now. \
                You deserve support. You can call or text 988 any time, day or night, \
                or reach SAMHSA at 1-800-662-4357. Would it help to talk to someone right now?"
                .to_string(),
            display_mode: DisplayMode::UrgentResources,
            disable_normal_chat: false,
            resources,
            urgency: Urgency::High,
            show_emergency_banner: false,
        },
        SeverityLevel::Elevated => GeneratedCrisisMessage {
            response: "Thank you for trusting me with this. It sounds like things have been getting harder, \
                and talking with a professional could really help. Therapy for Black Girls and the \
                NAMI HelpLine (1-800-950-6264) are good places to start, and 988 is there any time \
                things feel heavier."
                .to_string(),
            display_mode: DisplayMode::ProfessionalHelp,
            disable_normal_chat: false,
            resources,
            urgency: Urgency::Medium,
            show_emergency_banner: false,
        },
    }
}

#[derive(Default)]
struct ExecutionState {
    display_mode: Option<DisplayMode>,
    human_alert_sent: bool,
    audit_event_id: Option<String>,
}

pub struct CrisisEscalationManager {
    active: Arc<dyn KeyValueStore<ActiveCrisis>>,
    resolved: Mutex<Vec<ActiveCrisis>>,
    alerts: Mutex<Vec<ModeratorAlert>>,
    escalations: Mutex<BTreeMap<SeverityLevel, u64>>,
    notifier: Arc<dyn Notifier>,
    moderation: Arc<dyn ModerationActions>,
    audit: Arc<CrisisAuditLogger>,
}

impl CrisisEscalationManager {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        moderation: Arc<dyn ModerationActions>,
        audit: Arc<CrisisAuditLogger>,
    ) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), notifier, moderation, audit)
    }

    /// Use a specific active-crisis store
    pub fn with_store(
        active: Arc<dyn KeyValueStore<ActiveCrisis>>,
        notifier: Arc<dyn Notifier>,
        moderation: Arc<dyn ModerationActions>,
        audit: Arc<CrisisAuditLogger>,
    ) -> Self {
        Self {
            active,
            resolved: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
            escalations: Mutex::new(BTreeMap::new()),
            notifier,
            moderation,
            audit,
        }
    }

    pub fn detect_crisis_severity(
        &self,
        message: &str,
        classification: Option<&Classification>,
    ) -> Option<SeverityMatch> {
        detect_crisis_severity(message, classification)
    }

    pub fn generate_crisis_response(&self, level: SeverityLevel) -> GeneratedCrisisMessage {
        generate_crisis_response(level)
    }

    /// Record the crisis and run the tier's actions in order
    ///
    /// A failing action is recorded with `executed: false` and the rest
    /// still run.
    pub async fn execute_crisis_response(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
        severity: &SeverityMatch,
    ) -> CrisisResponse {
        let tier = severity.tier();

        tracing::warn!(
            user_id,
            session_id,
            severity = %severity.level,
            indicator = %severity.matched_indicator,
            "Executing crisis response"
        );

        self.active.put(
            user_id,
            ActiveCrisis {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                severity: severity.level,
                matched_indicator: severity.matched_indicator.clone(),
                timestamp: Utc::now(),
                status: CrisisStatus::Active,
                monitoring: false,
                check_in_after: None,
                audit_event_id: None,
                resolution: None,
                resolved_at: None,
            },
        );

        if let Ok(mut counts) = self.escalations.lock() {
            *counts.entry(severity.level).or_insert(0) += 1;
        }

        let mut state = ExecutionState::default();
        let mut actions = Vec::with_capacity(tier.actions.len());

        for &action in tier.actions {
            let result = self
                .execute_action(action, user_id, session_id, message, severity, &mut state)
                .await;

            if let Err(e) = &result {
                tracing::error!(user_id, action = ?action, error = %e, "Crisis action failed");
            }

            actions.push(ActionRecord {
                action,
                executed: result.is_ok(),
                timestamp: Utc::now(),
                error: result.err().map(|e| format!("{:#}", e)),
            });
        }

        if let Some(event_id) = &state.audit_event_id {
            let event_id = event_id.clone();
            self.active.update(user_id, &mut |crisis: &mut ActiveCrisis| {
                crisis.audit_event_id = Some(event_id.clone());
            });
        }

        CrisisResponse {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            severity: severity.level,
            actions,
            display_mode: state.display_mode,
            human_alert_sent: state.human_alert_sent,
            audit_event_id: state.audit_event_id,
        }
    }

    async fn execute_action(
        &self,
        action: CrisisAction,
        user_id: &str,
        session_id: &str,
        message: &str,
        severity: &SeverityMatch,
        state: &mut ExecutionState,
    ) -> Result<()> {
        match action {
            CrisisAction::DisplayCrisisBanner => {
                state.display_mode = Some(DisplayMode::CrisisBanner);
            }
            CrisisAction::AlertHumanModerator => {
                state.human_alert_sent |= self
                    .alert_moderator(NotificationChannel::Emergency, user_id, session_id, message, severity)
                    .await?;
            }
            CrisisAction::AlertModeratorQueue => {
                state.human_alert_sent |= self
                    .alert_moderator(NotificationChannel::Moderation, user_id, session_id, message, severity)
                    .await?;
            }
            CrisisAction::LogHighPriority => {
                state.audit_event_id = Some(self.log_event(user_id, session_id, message, severity, 5).await?);
            }
            CrisisAction::LogMediumPriority => {
                state.audit_event_id = Some(self.log_event(user_id, session_id, message, severity, 4).await?);
            }
            CrisisAction::LogForReview => {
                state.audit_event_id = Some(self.log_event(user_id, session_id, message, severity, 3).await?);
            }
            CrisisAction::TrackUserSession | CrisisAction::IncreaseMonitoring => {
                if !self.active.update(user_id, &mut |crisis: &mut ActiveCrisis| crisis.monitoring = true) {
                    bail!("no active crisis for user {}", user_id);
                }
            }
            CrisisAction::CheckInLater => {
                let at = Utc::now() + ChronoDuration::hours(24);
                if !self.active.update(user_id, &mut |crisis: &mut ActiveCrisis| crisis.check_in_after = Some(at)) {
                    bail!("no active crisis for user {}", user_id);
                }
                if let Some(event_id) = state.audit_event_id.clone() {
                    let audit = Arc::clone(&self.audit);
                    let event = event_id.clone();
                    let scheduled =
                        tokio::task::spawn_blocking(move || audit.schedule_follow_up(&event, at)).await??;
                    if !scheduled {
                        bail!("audit event {} not found for follow-up", event_id);
                    }
                    tracing::info!(user_id, event_id = %event_id, follow_up = %at, "Follow-up scheduled");
                }
            }
            // Presentation actions: carried by generate_crisis_response
            CrisisAction::Provide988Immediately
            | CrisisAction::DisableNormalChat
            | CrisisAction::ProvideCrisisResources
            | CrisisAction::OfferImmediateSupport
            | CrisisAction::SuggestProfessionalHelp
            | CrisisAction::ProvideTherapistDirectory
            | CrisisAction::RecommendResources => {
                tracing::debug!(user_id, action = ?action, "Presentation action recorded");
            }
        }

        Ok(())
    }

    async fn alert_moderator(
        &self,
        channel: NotificationChannel,
        user_id: &str,
        session_id: &str,
        message: &str,
        severity: &SeverityMatch,
    ) -> Result<bool> {
        let excerpt: String = message.chars().take(ALERT_EXCERPT_CHARS).collect();
        let alert_id = format!("alert_{}", uuid::Uuid::new_v4());

        let reason = format!("crisis:{}", severity.level);
        if let Err(e) = self.moderation.flag_content(session_id, user_id, &reason).await {
            tracing::warn!(user_id, error = %e, "Failed to flag crisis content");
        }

        let payload = serde_json::json!({
            "alert_id": alert_id,
            "user_id": user_id,
            "session_id": session_id,
            "severity": severity.level,
            "matched_indicator": severity.matched_indicator,
            "response_time": severity.tier().response_time,
            "message_excerpt": excerpt,
        });

        let delivered = match self.notifier.notify(channel, &payload).await {
            Ok(outcome) => outcome.success,
            Err(e) => {
                tracing::error!(user_id, channel = %channel, error = %e, "Moderator notification failed");
                false
            }
        };

        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(ModeratorAlert {
                id: alert_id,
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                severity: severity.level,
                channel,
                message_excerpt: excerpt,
                status: AlertStatus::Pending,
                created_at: Utc::now(),
                delivered,
            });
        }

        if !delivered {
            bail!("{} notification was not delivered", channel);
        }
        Ok(true)
    }

    /// Audit writes hit the filesystem, so they run on the blocking pool
    async fn log_event(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
        severity: &SeverityMatch,
        audit_severity: u8,
    ) -> Result<String> {
        let audit = Arc::clone(&self.audit);
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        let details = CrisisEventDetails {
            crisis_type: severity.crisis_type,
            severity: audit_severity,
            confidence: severity.confidence,
            detection_method: severity.detection_method,
            trigger_text: Some(message.to_string()),
            notes: Some(format!("indicator: {}", severity.matched_indicator)),
        };

        let event_id =
            tokio::task::spawn_blocking(move || audit.log_crisis_event(&user_id, &session_id, details)).await?;
        Ok(event_id)
    }

    pub fn active_crisis(&self, user_id: &str) -> Option<ActiveCrisis> {
        self.active.get(user_id)
    }

    /// Close a user's active crisis; false if none was open
    pub fn resolve_crisis(&self, user_id: &str, resolution: &str) -> bool {
        let Some(mut crisis) = self.active.remove(user_id) else {
            return false;
        };

        crisis.status = CrisisStatus::Resolved;
        crisis.resolution = Some(resolution.to_string());
        crisis.resolved_at = Some(Utc::now());

        tracing::info!(user_id, severity = %crisis.severity, "Crisis resolved");

        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.push(crisis);
        }
        true
    }

    pub fn moderator_alerts(&self, status: Option<AlertStatus>) -> Vec<ModeratorAlert> {
        self.alerts
            .lock()
            .map(|alerts| {
                alerts
                    .iter()
                    .filter(|a| status.map_or(true, |s| a.status == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn acknowledge_alert(&self, alert_id: &str) -> bool {
        let Ok(mut alerts) = self.alerts.lock() else {
            return false;
        };
        match alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.status = AlertStatus::Acknowledged;
                true
            }
            None => false,
        }
    }

    pub fn escalation_stats(&self) -> EscalationStats {
        let active = self.active.values();
        let mut active_by_severity = BTreeMap::new();
        for crisis in &active {
            *active_by_severity
                .entry(crisis.severity.as_str().to_string())
                .or_insert(0) += 1;
        }

        let escalations = self.escalations.lock().map(|e| e.clone()).unwrap_or_default();
        let alerts = self.moderator_alerts(None);

        EscalationStats {
            active_crises: active.len(),
            active_by_severity,
            total_escalations: escalations.values().sum(),
            escalations_by_severity: escalations
                .into_iter()
                .map(|(level, count)| (level.as_str().to_string(), count))
                .collect(),
            resolved_crises: self.resolved.lock().map(|r| r.len()).unwrap_or(0),
            total_alerts: alerts.len(),
            pending_alerts: alerts.iter().filter(|a| a.status == AlertStatus::Pending).count(),
        }
    }

    /// Drop all state
    pub fn reset(&self) {
        self.active.clear();
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.clear();
        }
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.clear();
        }
        if let Ok(mut escalations) = self.escalations.lock() {
            escalations.clear();
        }
    }
}
