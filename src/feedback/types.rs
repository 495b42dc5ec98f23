// Feedback record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classifier::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Helpful,
    NotHelpful,
    WrongCategory,
    ToneOff,
}

impl FeedbackType {
    pub const ALL: [FeedbackType; 4] = [
        FeedbackType::Helpful,
        FeedbackType::NotHelpful,
        FeedbackType::WrongCategory,
        FeedbackType::ToneOff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Helpful => "helpful",
            FeedbackType::NotHelpful => "not_helpful",
            FeedbackType::WrongCategory => "wrong_category",
            FeedbackType::ToneOff => "tone_off",
        }
    }

    /// Counts against the error rate
    pub fn is_error(&self) -> bool {
        matches!(self, FeedbackType::WrongCategory | FeedbackType::ToneOff)
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown feedback type: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackOption {
    pub id: FeedbackType,
    pub label: &'static str,
    pub emoji: &'static str,
}

/// Options attached to every chat response
pub fn feedback_options() -> Vec<FeedbackOption> {
    vec![
        FeedbackOption {
            id: FeedbackType::Helpful,
            label: "👍 Helpful",
            emoji: "👍",
        },
        FeedbackOption {
            id: FeedbackType::NotHelpful,
            label: "👎 Not helpful",
            emoji: "👎",
        },
        FeedbackOption {
            id: FeedbackType::WrongCategory,
            label: "🏷️ Wrong topic",
            emoji: "🏷️",
        },
        FeedbackOption {
            id: FeedbackType::ToneOff,
            label: "🗣️ Tone was off",
            emoji: "🗣️",
        },
    ]
}

/// Optional context sent with a rating
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotional_intensity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub message_id: String,
    pub user_id: String,
    pub session_id: String,
    pub feedback_type: FeedbackType,
    pub details: FeedbackDetails,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationErrorRecord {
    pub message_id: String,
    pub original_message: String,
    pub predicted: Option<Category>,
    pub actual: Option<Category>,
    pub predicted_subcategory: Option<String>,
    pub actual_subcategory: Option<String>,
    pub confidence: f64,
    pub method: String,
    pub user_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToneIssue {
    pub message_id: String,
    pub original_message: String,
    pub response_text: String,
    pub emotional_intensity: Option<u8>,
    pub user_comment: Option<String>,
    pub user_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackStats {
    pub helpful: u64,
    pub not_helpful: u64,
    pub wrong_category: u64,
    pub tone_off: u64,
    pub total: u64,
    /// Percent, one decimal
    pub helpful_rate: f64,
    /// Percent of wrong_category + tone_off, one decimal
    pub error_rate: f64,
    pub classification_errors: usize,
    pub tone_issues: usize,
    pub unique_messages: usize,
    pub trend: Trend,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfusionExample {
    pub message: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfusionEntry {
    pub predicted: Option<Category>,
    pub actual: Option<Category>,
    pub count: usize,
    pub examples: Vec<ConfusionExample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Warning,
    Critical,
    Improvement,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPattern {
    pub pattern: String,
    pub count: usize,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccuracyReport {
    /// Percent helpful among the evaluated records
    pub accuracy: f64,
    pub total_feedback: usize,
    pub helpful: usize,
    pub not_helpful: usize,
    pub wrong_category: usize,
    pub tone_off: usize,
    pub error_patterns: Vec<ErrorPattern>,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Excellent,
    Good,
    NeedsImprovement,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelHealth {
    pub health: HealthLevel,
    pub accuracy: f64,
    pub error_rate: f64,
    pub total_feedback: usize,
    pub top_confusions: Vec<ConfusionEntry>,
    pub insights: Vec<Insight>,
}
