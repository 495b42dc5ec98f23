// Support pipeline
//
// normalize -> crisis scan -> clear-case rules -> degradation chain ->
// resources -> severity/escalation -> reply, with audit and analytics on the
// side. process_message always answers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::json;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::responder::{generate_response, FAILURE_RESPONSE};
use super::session::SessionManager;
use crate::analytics::{create_sink, AnalyticsEventType, AnalyticsSink, BatchAnalyticsProcessor};
use crate::audit::{create_audit_logger, CrisisAuditLogger};
use crate::classifier::{
    classify_obvious, contains_crisis_language, detect_crisis, normalize, Category, Classification,
    ClassificationContext, GracefulDegradation, LlmClassifier, Method,
};
use crate::config::Config;
use crate::crisis::{
    generate_crisis_response, CrisisEscalationManager, DisplayMode, ResourceBundle, SeverityLevel,
    SeverityMatch, Urgency,
};
use crate::feedback::{
    create_feedback_collector, feedback_options, FeedbackCollector, FeedbackDetails, FeedbackOption,
    FeedbackRecord, FeedbackType,
};
use crate::handoff::{ConversationTurn, HandoffContext, HandoffManager, HandoffOutcome, HandoffReason};
use crate::metrics::PipelineMetrics;
use crate::moderation::{InMemoryModeration, ModerationActions};
use crate::notify::{create_notifier, Notifier};
use crate::providers::{create_provider, LlmProvider};
use crate::resources::{load_catalog, Resource, ResourceMatcher, ResourceQuery, ScoredResource};

/// Resources attached to each reply
const RESOURCE_LIMIT: usize = 3;

/// Earlier user messages handed to the model as context
const CONTEXT_MESSAGES: usize = 3;

/// Processed messages remembered for feedback enrichment
const RECENT_REPLY_CAPACITY: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub user_id: String,
    pub session_id: String,
    pub message_count: usize,
    pub conversation_length: usize,
}

/// Crisis details attached to a reply
#[derive(Debug, Clone, Serialize)]
pub struct CrisisInfo {
    pub severity: SeverityLevel,
    pub matched_indicator: String,
    pub display_mode: DisplayMode,
    pub urgency: Urgency,
    pub disable_normal_chat: bool,
    pub show_emergency_banner: bool,
    pub resources: ResourceBundle,
    pub human_alert_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff_ticket_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_level: Option<usize>,
    pub resources_matched: usize,
}

/// Everything the client needs to render one reply
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message_id: String,
    pub response: String,
    pub classification: Classification,
    pub session: SessionInfo,
    pub recommended_resources: Vec<ScoredResource>,
    pub feedback_options: Vec<FeedbackOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crisis: Option<CrisisInfo>,
    pub metadata: ResponseMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn is_crisis(&self) -> bool {
        self.crisis.is_some() || self.classification.is_crisis()
    }
}

#[derive(Debug, Clone)]
struct RecentReply {
    message_id: String,
    text: String,
    response: String,
    classification: Classification,
}

/// Assembles a pipeline; unset collaborators come from config
pub struct PipelineBuilder {
    config: Config,
    provider: Option<Arc<dyn LlmProvider>>,
    notifier: Option<Arc<dyn Notifier>>,
    moderation: Option<Arc<dyn ModerationActions>>,
    sink: Option<Arc<dyn AnalyticsSink>>,
    audit: Option<Arc<CrisisAuditLogger>>,
    metrics: Option<PipelineMetrics>,
    catalog: Option<Vec<Resource>>,
}

impl PipelineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            provider: None,
            notifier: None,
            moderation: None,
            sink: None,
            audit: None,
            metrics: None,
            catalog: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn moderation(mut self, moderation: Arc<dyn ModerationActions>) -> Self {
        self.moderation = Some(moderation);
        self
    }

    pub fn analytics_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn audit(mut self, audit: Arc<CrisisAuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn catalog(mut self, catalog: Vec<Resource>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> Result<SupportPipeline> {
        let config = self.config;
        config.validate()?;

        let provider = match self.provider {
            Some(provider) => provider,
            None => create_provider(&config.model)?,
        };
        let notifier = match self.notifier {
            Some(notifier) => notifier,
            None => create_notifier(&config.notifications)?,
        };
        let moderation = self
            .moderation
            .unwrap_or_else(|| Arc::new(InMemoryModeration::new()));
        let sink = match self.sink {
            Some(sink) => sink,
            None => create_sink(&config.analytics)?,
        };
        let audit = match self.audit {
            Some(audit) => audit,
            None => Arc::new(create_audit_logger(&config.audit)?),
        };
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => PipelineMetrics::new()?,
        };
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => load_catalog(config.resources.catalog_path.as_deref())?,
        };

        let classifier = Arc::new(LlmClassifier::new(provider));
        let degradation = GracefulDegradation::from_config(classifier, &config.degradation)
            .context("Invalid degradation chain")?;

        Ok(SupportPipeline {
            degradation,
            crisis: CrisisEscalationManager::new(Arc::clone(&notifier), moderation, Arc::clone(&audit)),
            handoff: HandoffManager::new(notifier),
            resources: ResourceMatcher::with_resources(catalog),
            analytics: BatchAnalyticsProcessor::new(&config.analytics, sink),
            feedback: create_feedback_collector(&config.feedback)?,
            sessions: SessionManager::new(config.server.max_sessions, config.server.session_timeout_minutes),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_REPLY_CAPACITY)),
            audit,
            metrics,
            config,
        })
    }
}

/// Long-lived service behind the chat endpoint
pub struct SupportPipeline {
    config: Config,
    degradation: GracefulDegradation,
    crisis: CrisisEscalationManager,
    handoff: HandoffManager,
    resources: ResourceMatcher,
    analytics: BatchAnalyticsProcessor,
    feedback: FeedbackCollector,
    audit: Arc<CrisisAuditLogger>,
    sessions: SessionManager,
    metrics: PipelineMetrics,
    recent: Mutex<VecDeque<RecentReply>>,
}

impl SupportPipeline {
    pub fn builder(config: Config) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Classify a message and produce the reply; never fails
    ///
    /// If processing panics the user gets the failure reply, or the severe
    /// crisis message when the text contains crisis language.
    pub async fn process_message(&self, user_id: &str, session_id: &str, text: &str) -> ChatResponse {
        let started = Instant::now();

        match AssertUnwindSafe(self.process_inner(user_id, session_id, text, started))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(_) => {
                tracing::error!(user_id, session_id, "Message processing panicked");
                self.failure_response(user_id, session_id, text, started, "processing failed")
            }
        }
    }

    async fn process_inner(&self, user_id: &str, session_id: &str, text: &str, started: Instant) -> ChatResponse {
        let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());
        let normalized = normalize(text);

        let mut classification = self.classify(user_id, session_id, text, &normalized).await;

        // Tier indicators are only read once the message is crisis-adjacent
        let severity = if classification.category.is_crisis_adjacent() {
            crate::crisis::detect_crisis_severity(text, Some(&classification))
                .or_else(|| crate::crisis::detect_crisis_severity(&normalized, Some(&classification)))
        } else {
            None
        };

        if let Some(s) = &severity {
            if s.level == SeverityLevel::Severe && !classification.is_crisis() {
                tracing::warn!(
                    user_id,
                    from = %classification.category,
                    indicator = %s.matched_indicator,
                    "Severe indicator overrides classification"
                );
                let subcategory = classification.subcategory.take();
                let mut upgraded = Classification::crisis(Method::EscalationProtocol)
                    .with_reasoning(format!("Severe crisis indicator: {}", s.matched_indicator));
                upgraded.subcategory = subcategory;
                upgraded.strategy_used = classification.strategy_used.take();
                upgraded.fallback_level = classification.fallback_level;
                classification = upgraded;
            }
        }

        let recommended_resources = self.match_resources(&classification, text);

        let (response, crisis) = match &severity {
            Some(s) => {
                let (message, info) = self.escalate(user_id, session_id, text, s).await;
                (message, Some(info))
            }
            None => (generate_response(&classification, text), None),
        };

        let session = self.sessions.record_turns(
            user_id,
            session_id,
            vec![
                ConversationTurn::user(text)
                    .with_classification(classification.category, classification.emotional_intensity),
                ConversationTurn::assistant(response.clone()),
            ],
        );

        let processing_time_ms = started.elapsed().as_millis() as u64;
        self.record_analytics(user_id, session_id, &message_id, &classification, crisis.as_ref(), processing_time_ms);
        self.metrics.observe_classification(&classification);
        self.metrics
            .processing_seconds
            .observe(started.elapsed().as_secs_f64());

        self.remember(RecentReply {
            message_id: message_id.clone(),
            text: text.to_string(),
            response: response.clone(),
            classification: classification.clone(),
        });

        tracing::info!(
            user_id,
            session_id,
            message_id = %message_id,
            category = %classification.category,
            method = %classification.method,
            confidence = classification.confidence,
            processing_time_ms,
            "Processed message"
        );

        ChatResponse {
            message_id,
            response,
            session: SessionInfo {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                message_count: session.message_count,
                conversation_length: session.history.len(),
            },
            feedback_options: feedback_options(),
            metadata: ResponseMetadata {
                timestamp: Utc::now(),
                processing_time_ms,
                method: classification.method,
                strategy_used: classification.strategy_used.clone(),
                fallback_level: classification.fallback_level,
                resources_matched: recommended_resources.len(),
            },
            recommended_resources,
            classification,
            crisis,
            error: None,
        }
    }

    /// Crisis scan, then clear-case rules, then the degradation chain
    async fn classify(&self, user_id: &str, session_id: &str, text: &str, normalized: &str) -> Classification {
        let check = detect_crisis(text);
        let check = if check.is_crisis { check } else { detect_crisis(normalized) };
        if check.is_crisis {
            let mut classification = Classification::crisis(Method::Regex);
            if let Some(pattern) = check.matched_pattern {
                classification = classification.with_subcategory(pattern);
            }
            if let Some(matched) = check.matched_text {
                classification = classification.with_reasoning(format!("Crisis language: {}", matched));
            }
            return classification;
        }

        if let Some(classification) = classify_obvious(normalized, text) {
            tracing::debug!(category = %classification.category, "Clear case, skipping model");
            return classification;
        }

        let context = ClassificationContext {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            recent_messages: self
                .sessions
                .get(user_id, session_id)
                .map(|s| s.recent_user_messages(CONTEXT_MESSAGES))
                .unwrap_or_default(),
        };

        self.degradation.classify_with_fallback(normalized, &context).await
    }

    fn match_resources(&self, classification: &Classification, text: &str) -> Vec<ScoredResource> {
        let lowered = text.to_lowercase();
        let wants_cultural = classification.category == Category::Identity
            || self
                .config
                .resources
                .cultural_tags
                .iter()
                .any(|tag| lowered.contains(&tag.to_lowercase()));

        let query = ResourceQuery {
            category: Some(classification.category),
            subcategory: classification.subcategory.clone(),
            emotional_intensity: classification.emotional_intensity,
            cultural_tags: if wants_cultural {
                self.config.resources.cultural_tags.clone()
            } else {
                Vec::new()
            },
        };

        self.resources.fast_resource_match(&query, RESOURCE_LIMIT)
    }

    /// Run the tier's actions and open an urgent handoff when the tier asks
    async fn escalate(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
        severity: &SeverityMatch,
    ) -> (String, CrisisInfo) {
        let executed = self
            .crisis
            .execute_crisis_response(user_id, session_id, text, severity)
            .await;
        let generated = generate_crisis_response(severity.level);

        self.metrics
            .crisis_detections_total
            .with_label_values(&[severity.level.as_str()])
            .inc();

        let mut handoff_ticket_id = None;
        if severity.tier().auto_escalate {
            let mut conversation = self.sessions.history(user_id, session_id);
            conversation.push(ConversationTurn::user(text).with_classification(Category::Crisis, 10));

            match self
                .handoff
                .initiate_human_handoff(user_id, session_id, HandoffReason::Crisis, HandoffContext { conversation })
                .await
            {
                Ok(outcome) => {
                    self.metrics
                        .handoffs_total
                        .with_label_values(&[outcome.ticket.priority.as_str()])
                        .inc();
                    handoff_ticket_id = Some(outcome.ticket.ticket_id);
                }
                Err(e) => tracing::error!(user_id, error = %e, "Crisis handoff failed"),
            }
        }

        let info = CrisisInfo {
            severity: severity.level,
            matched_indicator: severity.matched_indicator.clone(),
            display_mode: generated.display_mode,
            urgency: generated.urgency,
            disable_normal_chat: generated.disable_normal_chat,
            show_emergency_banner: generated.show_emergency_banner,
            resources: generated.resources,
            human_alert_sent: executed.human_alert_sent,
            handoff_ticket_id,
        };

        (generated.response, info)
    }

    fn record_analytics(
        &self,
        user_id: &str,
        session_id: &str,
        message_id: &str,
        classification: &Classification,
        crisis: Option<&CrisisInfo>,
        processing_time_ms: u64,
    ) {
        self.analytics.queue_event(
            AnalyticsEventType::Classification,
            user_id,
            session_id,
            json!({
                "message_id": message_id,
                "category": classification.category,
                "subcategory": classification.subcategory,
                "confidence": classification.confidence,
                "emotional_intensity": classification.emotional_intensity,
                "method": classification.method,
                "strategy_used": classification.strategy_used,
                "fallback_level": classification.fallback_level,
                "processing_time_ms": processing_time_ms,
            }),
        );

        if let Some(crisis) = crisis {
            self.analytics.queue_event(
                AnalyticsEventType::Crisis,
                user_id,
                session_id,
                json!({
                    "message_id": message_id,
                    "severity": classification.emotional_intensity,
                    "tier": crisis.severity,
                    "matched_indicator": crisis.matched_indicator,
                    "human_alert_sent": crisis.human_alert_sent,
                }),
            );
        }
    }

    fn recent(&self) -> MutexGuard<'_, VecDeque<RecentReply>> {
        self.recent.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remember(&self, reply: RecentReply) {
        let mut recent = self.recent();
        if recent.len() >= RECENT_REPLY_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(reply);
    }

    fn failure_response(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
        started: Instant,
        error: &str,
    ) -> ChatResponse {
        let (response, classification, crisis) = if contains_crisis_language(text) {
            let generated = generate_crisis_response(SeverityLevel::Severe);
            let info = CrisisInfo {
                severity: SeverityLevel::Severe,
                matched_indicator: "crisis_language".to_string(),
                display_mode: generated.display_mode,
                urgency: generated.urgency,
                disable_normal_chat: generated.disable_normal_chat,
                show_emergency_banner: generated.show_emergency_banner,
                resources: generated.resources,
                human_alert_sent: false,
                handoff_ticket_id: None,
            };
            (
                generated.response,
                Classification::crisis(Method::EscalationProtocol),
                Some(info),
            )
        } else {
            (
                FAILURE_RESPONSE.to_string(),
                Classification::new(Category::General, 0.0, 1, Method::AbsoluteFallback),
                None,
            )
        };

        let session = self.sessions.get(user_id, session_id);

        ChatResponse {
            message_id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            response,
            session: SessionInfo {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                message_count: session.as_ref().map_or(0, |s| s.message_count),
                conversation_length: session.as_ref().map_or(0, |s| s.history.len()),
            },
            recommended_resources: Vec::new(),
            feedback_options: feedback_options(),
            metadata: ResponseMetadata {
                timestamp: Utc::now(),
                processing_time_ms: started.elapsed().as_millis() as u64,
                method: classification.method,
                strategy_used: None,
                fallback_level: None,
                resources_matched: 0,
            },
            classification,
            crisis,
            error: Some(error.to_string()),
        }
    }

    /// Open a handoff for a user using their session history as context
    pub async fn request_handoff(
        &self,
        user_id: &str,
        session_id: &str,
        reason: HandoffReason,
    ) -> Result<HandoffOutcome> {
        let conversation = self.sessions.history(user_id, session_id);
        let outcome = self
            .handoff
            .initiate_human_handoff(user_id, session_id, reason, HandoffContext { conversation })
            .await?;

        self.metrics
            .handoffs_total
            .with_label_values(&[outcome.ticket.priority.as_str()])
            .inc();
        Ok(outcome)
    }

    /// Record a rating, filling details from the rated reply when known
    pub fn record_feedback(
        &self,
        message_id: &str,
        user_id: &str,
        session_id: &str,
        feedback_type: FeedbackType,
        mut details: FeedbackDetails,
    ) -> FeedbackRecord {
        let known = self
            .recent()
            .iter()
            .rev()
            .find(|r| r.message_id == message_id)
            .cloned();

        if let Some(reply) = known {
            details.message.get_or_insert(reply.text);
            details.response_text.get_or_insert(reply.response);
            details.predicted.get_or_insert(reply.classification.category);
            if details.predicted_subcategory.is_none() {
                details.predicted_subcategory = reply.classification.subcategory;
            }
            details.confidence.get_or_insert(reply.classification.confidence);
            details
                .method
                .get_or_insert_with(|| reply.classification.method.to_string());
            details
                .emotional_intensity
                .get_or_insert(reply.classification.emotional_intensity);
        }

        let record = self
            .feedback
            .record_feedback(message_id, user_id, session_id, feedback_type, details);

        self.analytics.queue_event(
            AnalyticsEventType::Feedback,
            user_id,
            session_id,
            json!({
                "message_id": message_id,
                "feedback_type": feedback_type,
                "predicted": record.details.predicted,
                "actual": record.details.actual,
            }),
        );

        record
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn degradation(&self) -> &GracefulDegradation {
        &self.degradation
    }

    pub fn crisis(&self) -> &CrisisEscalationManager {
        &self.crisis
    }

    pub fn handoff(&self) -> &HandoffManager {
        &self.handoff
    }

    pub fn resources(&self) -> &ResourceMatcher {
        &self.resources
    }

    pub fn analytics(&self) -> &BatchAnalyticsProcessor {
        &self.analytics
    }

    pub fn feedback(&self) -> &FeedbackCollector {
        &self.feedback
    }

    pub fn audit(&self) -> &Arc<CrisisAuditLogger> {
        &self.audit
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Drain queued analytics
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down support pipeline");
        self.analytics.shutdown().await;
    }
}
