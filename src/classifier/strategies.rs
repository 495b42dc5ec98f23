// Built-in degradation strategies

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::degradation::ClassificationStrategy;
use super::normalizer::normalize;
use super::rules::{ambiguous_phrase, classify_general, classify_obvious};
use super::types::{Classification, ClassificationContext, Method};
use super::LlmClassifier;
use crate::errors::ClassificationError;

/// Full prompt with context and prompt caching
pub struct ClaudeFullStrategy {
    classifier: Arc<LlmClassifier>,
    timeout: Duration,
}

impl ClaudeFullStrategy {
    pub fn new(classifier: Arc<LlmClassifier>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }
}

#[async_trait]
impl ClassificationStrategy for ClaudeFullStrategy {
    fn name(&self) -> &str {
        "claude_full"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn classify(
        &self,
        message: &str,
        context: &ClassificationContext,
    ) -> Result<Classification, ClassificationError> {
        self.classifier.classify_full(message, context).await
    }
}

/// Short prompt, small token budget
pub struct ClaudeSimpleStrategy {
    classifier: Arc<LlmClassifier>,
    timeout: Duration,
}

impl ClaudeSimpleStrategy {
    pub fn new(classifier: Arc<LlmClassifier>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }
}

#[async_trait]
impl ClassificationStrategy for ClaudeSimpleStrategy {
    fn name(&self) -> &str {
        "claude_simple"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn classify(
        &self,
        message: &str,
        _context: &ClassificationContext,
    ) -> Result<Classification, ClassificationError> {
        self.classifier.classify_simple(message).await
    }
}

/// Rules first; the model is consulted only for ambiguous phrasing
///
/// A model failure here is not a strategy failure: the keyword rules
/// answer instead.
pub struct HybridStrategy {
    classifier: Arc<LlmClassifier>,
    timeout: Duration,
}

impl HybridStrategy {
    pub fn new(classifier: Arc<LlmClassifier>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }
}

#[async_trait]
impl ClassificationStrategy for HybridStrategy {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn classify(
        &self,
        message: &str,
        _context: &ClassificationContext,
    ) -> Result<Classification, ClassificationError> {
        let normalized = normalize(message);

        if let Some(clear) = classify_obvious(&normalized, message) {
            return Ok(clear.with_method(Method::Hybrid));
        }

        if let Some(phrase) = ambiguous_phrase(&normalized) {
            match self.classifier.classify_simple(&normalized).await {
                Ok(mut classification) => {
                    classification.method = Method::Hybrid;
                    classification.ambiguous_phrase.get_or_insert(phrase);
                    return Ok(classification);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Hybrid model check failed, using keyword rules");
                }
            }
        }

        Ok(classify_general(&normalized).with_method(Method::Hybrid))
    }
}

/// Keyword rules only
pub struct RuleBasedStrategy {
    timeout: Duration,
}

impl RuleBasedStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ClassificationStrategy for RuleBasedStrategy {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn classify(
        &self,
        message: &str,
        _context: &ClassificationContext,
    ) -> Result<Classification, ClassificationError> {
        Ok(classify_general(&normalize(message)))
    }
}
