// Configuration structs
//
// Every section has defaults so an empty (or missing) config.toml yields a
// working service with rule-only classification.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub degradation: DegradationConfig,
    pub analytics: AnalyticsConfig,
    pub audit: AuditConfig,
    pub server: ServerConfig,
    pub notifications: NotificationConfig,
    pub resources: ResourceConfig,
    pub feedback: FeedbackConfig,
}

impl Config {
    /// Base directory for amani state (~/.amani)
    pub fn amani_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".amani"))
    }

    /// Check cross-field constraints that serde defaults can't express
    pub fn validate(&self) -> Result<()> {
        self.degradation.validate()?;

        if self.analytics.max_batch_size == 0 {
            bail!("analytics.max_batch_size must be at least 1");
        }
        if self.server.max_sessions == 0 {
            bail!("server.max_sessions must be at least 1");
        }
        if self.audit.store == AuditStoreKind::Jsonl && self.audit.path.is_none() {
            bail!("audit.store = \"jsonl\" requires audit.path");
        }

        Ok(())
    }
}

/// Claude model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// API key (ANTHROPIC_API_KEY overrides)
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Override for the Messages API base URL
    pub base_url: Option<String>,
    /// Retries on 429/5xx before giving up
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            max_retries: 2,
        }
    }
}

/// Per-strategy timeouts for the degradation chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    pub claude_full_timeout_ms: u64,
    pub claude_simple_timeout_ms: u64,
    pub hybrid_timeout_ms: u64,
    pub rule_based_timeout_ms: u64,
    /// Upper bound for the whole chain
    pub total_budget_ms: u64,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            claude_full_timeout_ms: 3000,
            claude_simple_timeout_ms: 2000,
            hybrid_timeout_ms: 1500,
            rule_based_timeout_ms: 100,
            total_budget_ms: 7000,
        }
    }
}

impl DegradationConfig {
    /// Timeouts must be non-increasing along the chain
    pub fn validate(&self) -> Result<()> {
        let chain = [
            ("claude_full", self.claude_full_timeout_ms),
            ("claude_simple", self.claude_simple_timeout_ms),
            ("hybrid", self.hybrid_timeout_ms),
            ("rule_based", self.rule_based_timeout_ms),
        ];

        for pair in chain.windows(2) {
            let (prev_name, prev) = pair[0];
            let (name, timeout) = pair[1];
            if timeout > prev {
                bail!(
                    "degradation timeouts must not increase: {} ({}ms) > {} ({}ms)",
                    name,
                    timeout,
                    prev_name,
                    prev
                );
            }
        }

        if self.rule_based_timeout_ms == 0 {
            bail!("degradation.rule_based_timeout_ms must be greater than 0");
        }
        if self.total_budget_ms == 0 {
            bail!("degradation.total_budget_ms must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub max_batch_size: usize,
    pub max_wait_ms: u64,
    /// Crisis events at or above this severity log a warning on enqueue
    pub crisis_alert_threshold: f64,
    /// Directory for per-type JSONL files; log-only when unset
    pub output_dir: Option<PathBuf>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            max_wait_ms: 5000,
            crisis_alert_threshold: 9.0,
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStoreKind {
    #[default]
    Memory,
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub store: AuditStoreKind,
    /// JSONL audit file (required for the jsonl store)
    pub path: Option<PathBuf>,
    /// Written when the primary store rejects an event
    pub emergency_log_path: Option<PathBuf>,
    /// Salt mixed into hashed user ids
    pub hash_salt: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            store: AuditStoreKind::Memory,
            path: None,
            emergency_log_path: Config::amani_dir().map(|dir| dir.join("crisis-emergency.jsonl")),
            hash_salt: "amani-crisis-audit".to_string(),
        }
    }
}

/// Configuration for the HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8000")
    pub bind_address: String,
    /// Maximum number of tracked sessions
    pub max_sessions: usize,
    /// Session timeout in minutes
    pub session_timeout_minutes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            max_sessions: 1000,
            session_timeout_minutes: 30,
        }
    }
}

/// Webhook targets per notification channel; unset channels log only
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub emergency_webhook: Option<String>,
    pub moderation_webhook: Option<String>,
    pub support_webhook: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// JSON catalog; the bundled catalog is used when unset
    pub catalog_path: Option<PathBuf>,
    /// Cultural relevance tags that earn a ranking boost
    pub cultural_tags: Vec<String>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            cultural_tags: vec![
                "black".to_string(),
                "african-american".to_string(),
                "poc".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Append-only JSONL feedback log
    pub log_path: Option<PathBuf>,
    /// Rolling window for the helpfulness trend
    pub trend_window: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            trend_window: 50,
        }
    }
}
