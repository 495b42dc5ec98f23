// Model-backed classification
//
// Builds the classification prompts, calls the provider and parses the
// structured reply. Any failure comes back as a ClassificationError so the
// degradation chain can move on.

use serde::Deserialize;
use std::sync::Arc;

use super::types::{Category, Classification, ClassificationContext, Method};
use crate::errors::ClassificationError;
use crate::providers::{CompletionRequest, LlmProvider};

const FULL_SYSTEM_PROMPT: &str = r#"You are the triage classifier for a peer mental-health support app serving Black men and their communities.

Classify the user's message into exactly one category:
- CRISIS: suicidal thoughts, self-harm, intent to die, immediate danger
- EMPLOYMENT: job loss, workplace stress, career, money tied to work
- RELATIONSHIP: partners, breakups, infidelity, family conflict, friendships
- MENTAL_HEALTH: depression, anxiety, grief, burnout, trauma, therapy questions
- IDENTITY: race, racism, discrimination, masculinity, belonging, sexuality
- TECH_ISSUE: problems using the app itself
- GENERAL: greetings, small talk, anything else

Rules:
- When in doubt between CRISIS and anything else, choose CRISIS.
- emotional_intensity is 1 (calm) to 10 (overwhelming distress).
- If a phrase is ambiguous (e.g. "I'm done", "nothing works"), name it in ambiguous_phrase and explain your reading in disambiguation.

Respond with JSON only:
{"category": "...", "subcategory": "...", "confidence": 0.0, "emotional_intensity": 1, "reasoning": "...", "ambiguous_phrase": null, "disambiguation": null}"#;

const SIMPLE_SYSTEM_PROMPT: &str = "Classify the message as one of CRISIS, EMPLOYMENT, RELATIONSHIP, MENTAL_HEALTH, IDENTITY, TECH_ISSUE, GENERAL. \
If it could be CRISIS, say CRISIS. \
Reply with JSON only: {\"category\": \"...\", \"confidence\": 0.0, \"emotional_intensity\": 1}";

/// Number of prior messages included in the full prompt
const CONTEXT_MESSAGES: usize = 3;

#[derive(Debug, Deserialize)]
struct RawClassification {
    category: String,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default = "default_intensity")]
    emotional_intensity: f64,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    ambiguous_phrase: Option<String>,
    #[serde(default)]
    disambiguation: Option<String>,
}

fn default_confidence() -> f64 {
    0.7
}

fn default_intensity() -> f64 {
    5.0
}

/// Pull the JSON object out of a model reply
///
/// Accepts bare JSON, a ```json fenced block, or the first {...} span.
pub fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if !inner.is_empty() {
                return Some(inner);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// Parse a model reply into a classification
pub fn parse_classification(raw: &str, method: Method) -> Result<Classification, ClassificationError> {
    let json = extract_json(raw)
        .ok_or_else(|| ClassificationError::Parse("no JSON object in reply".to_string()))?;

    let parsed: RawClassification =
        serde_json::from_str(json).map_err(|e| ClassificationError::Parse(e.to_string()))?;

    let category: Category = parsed.category.parse().map_err(ClassificationError::Parse)?;
    let intensity = parsed.emotional_intensity.round().clamp(1.0, 10.0) as u8;

    let mut classification = Classification::new(category, parsed.confidence, intensity, method);
    classification.subcategory = parsed.subcategory.filter(|s| !s.is_empty());
    classification.reasoning = parsed.reasoning;
    classification.ambiguous_phrase = parsed.ambiguous_phrase.filter(|s| !s.is_empty());
    classification.disambiguation = parsed.disambiguation.filter(|s| !s.is_empty());

    Ok(classification)
}

/// Classifier backed by an LLM provider
pub struct LlmClassifier {
    provider: Arc<dyn LlmProvider>,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Full prompt with recent context; system prompt is cached
    pub async fn classify_full(
        &self,
        text: &str,
        context: &ClassificationContext,
    ) -> Result<Classification, ClassificationError> {
        let mut prompt = String::new();
        let recent: Vec<&String> = context
            .recent_messages
            .iter()
            .rev()
            .take(CONTEXT_MESSAGES)
            .collect();
        if !recent.is_empty() {
            prompt.push_str("Earlier messages from this user:\n");
            for msg in recent.into_iter().rev() {
                prompt.push_str("- ");
                prompt.push_str(msg);
                prompt.push('\n');
            }
            prompt.push('\n');
        }
        prompt.push_str("Message to classify:\n");
        prompt.push_str(text);

        let request = CompletionRequest::new(prompt)
            .with_system(FULL_SYSTEM_PROMPT)
            .with_cached_system(true)
            .with_max_tokens(500)
            .with_temperature(0.3);

        self.run(request, Method::ClaudeFull).await
    }

    /// Short prompt with a small token budget
    pub async fn classify_simple(&self, text: &str) -> Result<Classification, ClassificationError> {
        let request = CompletionRequest::new(text)
            .with_system(SIMPLE_SYSTEM_PROMPT)
            .with_max_tokens(200)
            .with_temperature(0.0);

        self.run(request, Method::ClaudeSimple).await
    }

    async fn run(
        &self,
        request: CompletionRequest,
        method: Method,
    ) -> Result<Classification, ClassificationError> {
        if !self.provider.is_configured() {
            return Err(ClassificationError::Model(
                "no model provider configured".to_string(),
            ));
        }

        let response = self.provider.complete(&request).await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                method = %method,
                cache_hit_rate = usage.cache_hit_rate(),
                "Classification prompt cache"
            );
        }

        parse_classification(&response.text, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json(r#"{"a":1}"#), Some(r#"{"a":1}"#));
        assert_eq!(
            extract_json("Here you go:\n```json\n{\"a\":1}\n```\nThanks"),
            Some("{\"a\":1}")
        );
        assert_eq!(extract_json("Sure! {\"a\":1} hope that helps"), Some("{\"a\":1}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_full_reply() {
        let raw = r#"```json
{"category": "EMPLOYMENT", "subcategory": "workplace_stress", "confidence": 0.82,
 "emotional_intensity": 6, "reasoning": "boss conflict", "ambiguous_phrase": "not working",
 "disambiguation": "refers to the job"}
```"#;
        let c = parse_classification(raw, Method::ClaudeFull).unwrap();
        assert_eq!(c.category, Category::Employment);
        assert_eq!(c.subcategory.as_deref(), Some("workplace_stress"));
        assert_eq!(c.emotional_intensity, 6);
        assert_eq!(c.ambiguous_phrase.as_deref(), Some("not working"));
        assert_eq!(c.method, Method::ClaudeFull);
    }

    #[test]
    fn test_parse_crisis_floor_applied() {
        let c = parse_classification(
            r#"{"category":"CRISIS","confidence":0.5,"emotional_intensity":9}"#,
            Method::ClaudeSimple,
        )
        .unwrap();
        assert!(c.confidence >= 0.9);
    }

    #[test]
    fn test_unknown_category_is_parse_error() {
        let err = parse_classification(r#"{"category":"WEATHER"}"#, Method::ClaudeSimple).unwrap_err();
        assert!(matches!(err, ClassificationError::Parse(_)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = parse_classification("{category: CRISIS", Method::ClaudeFull).unwrap_err();
        assert!(matches!(err, ClassificationError::Parse(_)));
    }
}
