// Handoff ticket types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::classifier::Category;

/// Longest excerpt of recent user messages kept in a summary
pub const RECENT_CONTEXT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoffReason {
    Crisis,
    SevereDistress,
    ImmediateDanger,
    SelfHarm,
    ModerateCrisis,
    RepeatedIssues,
    Escalating,
    AiLimitation,
    UserRequest,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Urgent,
    High,
    Medium,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "URGENT",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
        }
    }

    pub fn estimated_wait(&self) -> &'static str {
        match self {
            Priority::Urgent => "< 5 minutes",
            Priority::High => "< 15 minutes",
            Priority::Medium => "< 30 minutes",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn determine_priority(reason: HandoffReason) -> Priority {
    match reason {
        HandoffReason::Crisis
        | HandoffReason::SevereDistress
        | HandoffReason::ImmediateDanger
        | HandoffReason::SelfHarm => Priority::Urgent,
        HandoffReason::ModerateCrisis
        | HandoffReason::RepeatedIssues
        | HandoffReason::Escalating
        | HandoffReason::AiLimitation => Priority::High,
        HandoffReason::UserRequest | HandoffReason::Other => Priority::Medium,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Pending,
    Assigned,
    Completed,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::Assigned => "ASSIGNED",
            TicketStatus::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One entry of conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotional_intensity: Option<u8>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            category: None,
            emotional_intensity: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            ..Self::user(text)
        }
    }

    pub fn with_classification(mut self, category: Category, emotional_intensity: u8) -> Self {
        self.category = Some(category);
        self.emotional_intensity = Some(emotional_intensity);
        self
    }
}

/// What the counselor gets to see
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandoffContext {
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub total_messages: usize,
    pub user_messages: usize,
    pub topics: Vec<Category>,
    /// Mean emotional intensity of classified turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_emotional_intensity: Option<f64>,
    pub key_issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    pub recent_context: String,
}

const KEY_ISSUES: &[(&str, &[&str])] = &[
    ("work", &["job", "work", "career", "employed", "unemployment", "laid off", "fired"]),
    (
        "relationship",
        &["girlfriend", "boyfriend", "wife", "husband", "partner", "relationship", "divorce"],
    ),
    ("family", &["family", "parents", "father", "mother", "kids", "children"]),
    ("mental_health", &["depressed", "anxiety", "stressed", "hopeless", "overwhelmed"]),
    ("financial", &["money", "bills", "debt", "financial", "rent", "mortgage"]),
    ("identity", &["black", "race", "racism", "discrimination", "microaggression"]),
];

/// Issue labels whose keywords appear in the user's messages
pub fn extract_key_issues(messages: &[&str]) -> Vec<String> {
    let all_text = messages.join(" ").to_lowercase();
    KEY_ISSUES
        .iter()
        .filter(|(_, terms)| terms.iter().any(|term| all_text.contains(term)))
        .map(|(issue, _)| issue.to_string())
        .collect()
}

impl ConversationSummary {
    pub fn from_turns(turns: &[ConversationTurn]) -> Self {
        if turns.is_empty() {
            return Self::default();
        }

        let user_texts: Vec<&str> = turns
            .iter()
            .filter(|t| t.role == TurnRole::User)
            .map(|t| t.text.as_str())
            .collect();

        let topics: BTreeSet<Category> = turns.iter().filter_map(|t| t.category).collect();

        let intensities: Vec<f64> = turns
            .iter()
            .filter_map(|t| t.emotional_intensity)
            .map(f64::from)
            .collect();
        let avg_emotional_intensity = if intensities.is_empty() {
            None
        } else {
            let avg = intensities.iter().sum::<f64>() / intensities.len() as f64;
            Some((avg * 10.0).round() / 10.0)
        };

        let duration_minutes = match (turns.first(), turns.last()) {
            (Some(first), Some(last)) if turns.len() >= 2 => {
                Some((last.timestamp - first.timestamp).num_minutes())
            }
            _ => None,
        };

        let recent = user_texts[user_texts.len().saturating_sub(3)..].join(" | ");
        let recent_context = if recent.chars().count() > RECENT_CONTEXT_CHARS {
            let mut cut: String = recent.chars().take(RECENT_CONTEXT_CHARS).collect();
            cut.push_str("...");
            cut
        } else {
            recent
        };

        Self {
            total_messages: turns.len(),
            user_messages: user_texts.len(),
            topics: topics.into_iter().collect(),
            avg_emotional_intensity,
            key_issues: extract_key_issues(&user_texts),
            duration_minutes,
            recent_context,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffTicket {
    pub ticket_id: String,
    pub user_id: String,
    pub session_id: String,
    pub reason: HandoffReason,
    pub priority: Priority,
    pub conversation_summary: ConversationSummary,
    pub status: TicketStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    pub estimated_wait: String,
    pub notification_sent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoffDisplayMode {
    HandoffUrgent,
    HandoffNormal,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandoffOutcome {
    pub ticket: HandoffTicket,
    pub message: String,
    pub estimated_wait: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crisis_resources: Option<crate::crisis::ResourceBundle>,
    pub display_mode: HandoffDisplayMode,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HandoffStats {
    pub active: usize,
    pub pending: usize,
    pub assigned: usize,
    pub completed: usize,
    /// Mean minutes from creation to assignment over completed tickets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_response_minutes: Option<f64>,
    pub priority_breakdown: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_priority_mapping() {
        assert_eq!(determine_priority(HandoffReason::Crisis), Priority::Urgent);
        assert_eq!(determine_priority(HandoffReason::SelfHarm), Priority::Urgent);
        assert_eq!(determine_priority(HandoffReason::AiLimitation), Priority::High);
        assert_eq!(determine_priority(HandoffReason::UserRequest), Priority::Medium);
        assert_eq!(Priority::Urgent.estimated_wait(), "< 5 minutes");
    }

    #[test]
    fn test_unknown_reason_deserializes_to_other() {
        let reason: HandoffReason = serde_json::from_str("\"WANTS_A_HUMAN\"").unwrap();
        assert_eq!(reason, HandoffReason::Other);
        let reason: HandoffReason = serde_json::from_str("\"MODERATE_CRISIS\"").unwrap();
        assert_eq!(reason, HandoffReason::ModerateCrisis);
    }

    #[test]
    fn test_summary() {
        let start = Utc::now() - Duration::minutes(12);
        let mut first = ConversationTurn::user("I got laid off and the rent is due")
            .with_classification(Category::Employment, 7);
        first.timestamp = start;

        let turns = vec![
            first,
            ConversationTurn::assistant("That sounds really stressful."),
            ConversationTurn::user("my wife doesn't know yet")
                .with_classification(Category::Relationship, 6),
        ];

        let summary = ConversationSummary::from_turns(&turns);
        assert_eq!(summary.total_messages, 3);
        assert_eq!(summary.user_messages, 2);
        assert_eq!(summary.topics, vec![Category::Employment, Category::Relationship]);
        assert_eq!(summary.avg_emotional_intensity, Some(6.5));
        assert_eq!(summary.key_issues, vec!["work", "relationship", "financial"]);
        assert_eq!(summary.duration_minutes, Some(12));
        assert!(summary.recent_context.contains(" | "));
    }

    #[test]
    fn test_summary_excerpt_is_bounded() {
        let long = "a".repeat(2_000);
        let turns = vec![ConversationTurn::user(long)];
        let summary = ConversationSummary::from_turns(&turns);
        assert_eq!(summary.recent_context.chars().count(), RECENT_CONTEXT_CHARS + 3);
        assert_eq!(summary.duration_minutes, None);
    }
}
