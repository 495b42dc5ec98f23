// Classification types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum confidence any CRISIS classification may carry
pub const CRISIS_MIN_CONFIDENCE: f64 = 0.9;

/// Support category for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Crisis,
    Employment,
    Relationship,
    MentalHealth,
    Identity,
    TechIssue,
    General,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Crisis,
        Category::Employment,
        Category::Relationship,
        Category::MentalHealth,
        Category::Identity,
        Category::TechIssue,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Crisis => "CRISIS",
            Category::Employment => "EMPLOYMENT",
            Category::Relationship => "RELATIONSHIP",
            Category::MentalHealth => "MENTAL_HEALTH",
            Category::Identity => "IDENTITY",
            Category::TechIssue => "TECH_ISSUE",
            Category::General => "GENERAL",
        }
    }

    /// Categories that warrant a severity check
    pub fn is_crisis_adjacent(&self) -> bool {
        matches!(self, Category::Crisis | Category::MentalHealth)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "CRISIS" => Ok(Category::Crisis),
            "EMPLOYMENT" => Ok(Category::Employment),
            "RELATIONSHIP" | "RELATIONSHIPS" => Ok(Category::Relationship),
            "MENTAL_HEALTH" => Ok(Category::MentalHealth),
            "IDENTITY" => Ok(Category::Identity),
            "TECH_ISSUE" | "TECH" => Ok(Category::TechIssue),
            "GENERAL" => Ok(Category::General),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// How a classification was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Regex,
    ClaudeFull,
    ClaudeSimple,
    Hybrid,
    RuleBased,
    AbsoluteFallback,
    EscalationProtocol,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Regex => "regex",
            Method::ClaudeFull => "claude_full",
            Method::ClaudeSimple => "claude_simple",
            Method::Hybrid => "hybrid",
            Method::RuleBased => "rule_based",
            Method::AbsoluteFallback => "absolute_fallback",
            Method::EscalationProtocol => "escalation_protocol",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub confidence: f64,
    pub emotional_intensity: u8,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambiguous_phrase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_level: Option<usize>,
}

impl Classification {
    /// Build a classification; values are clamped into range
    pub fn new(category: Category, confidence: f64, emotional_intensity: u8, method: Method) -> Self {
        Self {
            category,
            subcategory: None,
            confidence,
            emotional_intensity,
            method,
            reasoning: None,
            ambiguous_phrase: None,
            disambiguation: None,
            strategy_used: None,
            fallback_level: None,
        }
        .sanitized()
    }

    /// Highest-certainty crisis classification
    pub fn crisis(method: Method) -> Self {
        Self::new(Category::Crisis, 1.0, 10, method)
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Clamp confidence to [0, 1], intensity to [1, 10], and lift CRISIS
    /// confidence to the crisis floor
    pub fn sanitized(mut self) -> Self {
        if !self.confidence.is_finite() {
            self.confidence = 0.0;
        }
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.emotional_intensity = self.emotional_intensity.clamp(1, 10);
        if self.category == Category::Crisis && self.confidence < CRISIS_MIN_CONFIDENCE {
            self.confidence = CRISIS_MIN_CONFIDENCE;
        }
        self
    }

    pub fn is_crisis(&self) -> bool {
        self.category == Category::Crisis
    }
}

/// Inbound user message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub user_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Conversation context handed to model strategies
#[derive(Debug, Clone, Default)]
pub struct ClassificationContext {
    pub user_id: String,
    pub session_id: String,
    /// Most recent user messages, oldest first
    pub recent_messages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crisis_confidence_floor() {
        let c = Classification::new(Category::Crisis, 0.4, 9, Method::ClaudeFull);
        assert_eq!(c.confidence, CRISIS_MIN_CONFIDENCE);
    }

    #[test]
    fn test_clamping() {
        let c = Classification::new(Category::General, 1.7, 0, Method::RuleBased);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.emotional_intensity, 1);

        let c = Classification::new(Category::General, f64::NAN, 42, Method::RuleBased);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.emotional_intensity, 10);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("mental_health".parse::<Category>().unwrap(), Category::MentalHealth);
        assert_eq!("Tech".parse::<Category>().unwrap(), Category::TechIssue);
        assert_eq!("tech-issue".parse::<Category>().unwrap(), Category::TechIssue);
        assert!("WEATHER".parse::<Category>().is_err());
    }

    #[test]
    fn test_serialization_shape() {
        let c = Classification::new(Category::Employment, 0.95, 7, Method::Regex)
            .with_subcategory("job_loss");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["category"], "EMPLOYMENT");
        assert_eq!(json["method"], "regex");
        assert_eq!(json["subcategory"], "job_loss");
        assert!(json.get("strategy_used").is_none());
    }
}
