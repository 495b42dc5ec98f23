// HTTP request handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::SupportServer;
use crate::audit::{CrisisExport, CrisisStats};
use crate::crisis::{ActiveCrisis, AlertStatus, EscalationStats, ModeratorAlert};
use crate::errors::HandoffError;
use crate::feedback::{FeedbackDetails, FeedbackRecord, FeedbackStats, FeedbackType, Insight, ModelHealth};
use crate::handoff::{HandoffOutcome, HandoffReason, HandoffStats, HandoffTicket, Priority};
use crate::pipeline::ChatResponse;
use crate::resources::ScoredResource;

/// Longest accepted chat message, in characters
const MAX_MESSAGE_CHARS: usize = 5000;

/// Create the main application router
pub fn create_router(server: Arc<SupportServer>) -> Router {
    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/feedback", post(handle_feedback))
        .route("/api/feedback/stats", get(feedback_stats))
        .route("/api/feedback/export", get(feedback_export))
        .route("/api/handoff", post(handle_handoff))
        .route("/api/handoff/pending", get(pending_handoffs))
        .route("/api/handoff/:id/assign", post(assign_handoff))
        .route("/api/handoff/:id/complete", post(complete_handoff))
        .route("/api/crisis/stats", get(crisis_stats))
        .route("/api/crisis/alerts", get(list_alerts))
        .route("/api/crisis/alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/api/crisis/:user_id", get(get_crisis))
        .route("/api/crisis/:user_id/resolve", post(resolve_crisis))
        .route("/api/audit/stats", get(audit_stats))
        .route("/api/audit/export", get(audit_export))
        .route("/api/resources/search", get(search_resources))
        .route("/api/analytics/stats", get(analytics_stats))
        // Health and metrics
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(server)
}

/// Request body for POST /api/chat
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub session_id: String,
    pub message: String,
}

/// Handle POST /api/chat - classify a message and reply
async fn handle_chat(
    State(server): State<Arc<SupportServer>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.user_id.trim().is_empty() || request.session_id.trim().is_empty() {
        return Err(AppError::bad_request("user_id and session_id are required"));
    }
    if request.message.trim().is_empty() {
        return Err(AppError::bad_request("message must not be empty"));
    }
    if request.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::bad_request(format!(
            "message exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let response = server
        .pipeline()
        .process_message(&request.user_id, &request.session_id, &request.message)
        .await;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub message_id: String,
    pub user_id: String,
    pub session_id: String,
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub details: FeedbackDetails,
}

/// Handle POST /api/feedback
async fn handle_feedback(
    State(server): State<Arc<SupportServer>>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackRecord>, AppError> {
    if request.message_id.trim().is_empty() {
        return Err(AppError::bad_request("message_id is required"));
    }

    let record = server.pipeline().record_feedback(
        &request.message_id,
        &request.user_id,
        &request.session_id,
        request.feedback_type,
        request.details,
    );

    Ok(Json(record))
}

#[derive(Debug, Serialize)]
pub struct FeedbackStatsResponse {
    pub stats: FeedbackStats,
    pub insights: Vec<Insight>,
    pub model_health: ModelHealth,
}

/// Handle GET /api/feedback/stats
async fn feedback_stats(State(server): State<Arc<SupportServer>>) -> Json<FeedbackStatsResponse> {
    let feedback = server.pipeline().feedback();
    Json(FeedbackStatsResponse {
        stats: feedback.feedback_stats(),
        insights: feedback.improvement_insights(),
        model_health: feedback.model_health(),
    })
}

/// Handle GET /api/feedback/export
async fn feedback_export(State(server): State<Arc<SupportServer>>) -> Result<Response, AppError> {
    let csv = server.pipeline().feedback().export_csv()?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response())
}

#[derive(Debug, Deserialize)]
pub struct HandoffRequest {
    pub user_id: String,
    pub session_id: String,
    pub reason: HandoffReason,
}

/// Handle POST /api/handoff - open a ticket for a human counselor
async fn handle_handoff(
    State(server): State<Arc<SupportServer>>,
    Json(request): Json<HandoffRequest>,
) -> Result<Json<HandoffOutcome>, AppError> {
    let outcome = server
        .pipeline()
        .request_handoff(&request.user_id, &request.session_id, request.reason)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub priority: Option<Priority>,
}

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub tickets: Vec<HandoffTicket>,
    pub stats: HandoffStats,
}

/// Handle GET /api/handoff/pending
async fn pending_handoffs(
    State(server): State<Arc<SupportServer>>,
    Query(query): Query<PendingQuery>,
) -> Json<PendingResponse> {
    let handoff = server.pipeline().handoff();
    Json(PendingResponse {
        tickets: handoff.pending_tickets(query.priority),
        stats: handoff.handoff_stats(),
    })
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub counselor_id: String,
    pub counselor_name: String,
}

/// Handle POST /api/handoff/:id/assign
async fn assign_handoff(
    State(server): State<Arc<SupportServer>>,
    Path(ticket_id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<HandoffTicket>, AppError> {
    let ticket = server.pipeline().handoff().assign_handoff(
        &ticket_id,
        &request.counselor_id,
        &request.counselor_name,
    )?;
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub outcome: String,
}

/// Handle POST /api/handoff/:id/complete
async fn complete_handoff(
    State(server): State<Arc<SupportServer>>,
    Path(ticket_id): Path<String>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<HandoffTicket>, AppError> {
    let ticket = server
        .pipeline()
        .handoff()
        .complete_handoff(&ticket_id, &request.outcome)?;
    Ok(Json(ticket))
}

/// Handle GET /api/crisis/stats
async fn crisis_stats(State(server): State<Arc<SupportServer>>) -> Json<EscalationStats> {
    Json(server.pipeline().crisis().escalation_stats())
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    pub status: Option<AlertStatus>,
}

/// Handle GET /api/crisis/alerts
async fn list_alerts(
    State(server): State<Arc<SupportServer>>,
    Query(query): Query<AlertQuery>,
) -> Json<Vec<ModeratorAlert>> {
    Json(server.pipeline().crisis().moderator_alerts(query.status))
}

/// Handle POST /api/crisis/alerts/:id/acknowledge
async fn acknowledge_alert(
    State(server): State<Arc<SupportServer>>,
    Path(alert_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if server.pipeline().crisis().acknowledge_alert(&alert_id) {
        tracing::info!(alert_id = %alert_id, "Moderator alert acknowledged");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("Alert {} not found", alert_id)))
    }
}

/// Handle GET /api/crisis/:user_id
async fn get_crisis(
    State(server): State<Arc<SupportServer>>,
    Path(user_id): Path<String>,
) -> Result<Json<ActiveCrisis>, AppError> {
    server
        .pipeline()
        .crisis()
        .active_crisis(&user_id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("No active crisis for user {}", user_id)))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub resolution: String,
}

/// Handle POST /api/crisis/:user_id/resolve
async fn resolve_crisis(
    State(server): State<Arc<SupportServer>>,
    Path(user_id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Result<StatusCode, AppError> {
    if server
        .pipeline()
        .crisis()
        .resolve_crisis(&user_id, &request.resolution)
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("No active crisis for user {}", user_id)))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Handle GET /api/audit/stats
async fn audit_stats(
    State(server): State<Arc<SupportServer>>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<CrisisStats>, AppError> {
    let audit = Arc::clone(server.pipeline().audit());
    let stats = tokio::task::spawn_blocking(move || audit.get_crisis_stats(range.since)).await??;
    Ok(Json(stats))
}

/// Handle GET /api/audit/export
async fn audit_export(
    State(server): State<Arc<SupportServer>>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<CrisisExport>, AppError> {
    let audit = Arc::clone(server.pipeline().audit());
    let export =
        tokio::task::spawn_blocking(move || audit.export_crisis_logs(range.since, range.until)).await??;
    Ok(Json(export))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    5
}

/// Handle GET /api/resources/search
async fn search_resources(
    State(server): State<Arc<SupportServer>>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<ScoredResource>> {
    Json(server.pipeline().resources().search_resources(&query.q, query.limit))
}

/// Handle GET /api/analytics/stats
async fn analytics_stats(State(server): State<Arc<SupportServer>>) -> Json<serde_json::Value> {
    let pipeline = server.pipeline();
    Json(serde_json::json!({
        "analytics": pipeline.analytics().stats(),
        "degradation": pipeline.degradation().strategy_stats(),
        "strategies": pipeline.degradation().strategy_names(),
        "resources": pipeline.resources().stats(),
    }))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub active_crises: usize,
    pub pending_handoffs: usize,
}

/// Handle GET /health - Health check endpoint
pub async fn health_check(State(server): State<Arc<SupportServer>>) -> Json<HealthStatus> {
    let pipeline = server.pipeline();
    Json(HealthStatus {
        status: "healthy".to_string(),
        uptime_seconds: server.uptime().as_secs(),
        active_sessions: pipeline.sessions().active_count(),
        active_crises: pipeline.crisis().escalation_stats().active_crises,
        pending_handoffs: pipeline.handoff().handoff_stats().pending,
    })
}

/// Handle GET /metrics - Prometheus metrics endpoint
pub async fn metrics_endpoint(State(server): State<Arc<SupportServer>>) -> Result<Response, AppError> {
    let pipeline = server.pipeline();
    let metrics = pipeline.metrics();

    let failed: usize = pipeline.analytics().failed_batches().iter().map(Vec::len).sum();
    metrics.analytics_failed_events.set(failed as i64);
    metrics
        .active_crises
        .set(pipeline.crisis().escalation_stats().active_crises as i64);

    let body = metrics.render()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Request rejected before reaching the pipeline
#[derive(Debug, thiserror::Error)]
enum RequestError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

/// Application error wrapper for proper HTTP error responses
pub struct AppError(anyhow::Error);

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(RequestError::BadRequest(message.into()).into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self(RequestError::NotFound(message.into()).into())
    }

    fn status(&self) -> (StatusCode, &'static str) {
        if let Some(err) = self.0.downcast_ref::<RequestError>() {
            return match err {
                RequestError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
                RequestError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error"),
            };
        }
        if let Some(err) = self.0.downcast_ref::<HandoffError>() {
            return match err {
                HandoffError::TicketNotFound(_) => (StatusCode::NOT_FOUND, "not_found_error"),
                HandoffError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state_error"),
            };
        }
        (StatusCode::INTERNAL_SERVER_ERROR, "api_error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, status = %status, "Request rejected");
        }

        let body = serde_json::json!({
            "error": {
                "message": self.0.to_string(),
                "type": error_type
            }
        });

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
