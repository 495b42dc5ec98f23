// Integration tests for the degradation chain over a real classifier

mod common;

use common::{Behavior, MockProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use amani::classifier::{Category, ClassificationContext, GracefulDegradation, LlmClassifier, Method};
use amani::config::DegradationConfig;

fn chain(provider: Arc<MockProvider>, config: &DegradationConfig) -> GracefulDegradation {
    let classifier = Arc::new(LlmClassifier::new(provider));
    GracefulDegradation::from_config(classifier, config).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_hanging_model_stays_within_budget() {
    let provider = MockProvider::new(Behavior::Hang);
    let config = DegradationConfig::default();
    let degradation = chain(provider.clone(), &config);

    let started = Instant::now();
    let c = degradation
        .classify_with_fallback("nothing works anymore", &ClassificationContext::default())
        .await;

    assert!(started.elapsed() <= Duration::from_millis(config.total_budget_ms));
    // The ambiguous phrase sends hybrid to the model too, so only the rules answer
    assert_eq!(c.strategy_used.as_deref(), Some("rule_based"));
    assert_eq!(c.fallback_level, Some(3));
    assert_eq!(c.method, Method::RuleBased);

    let stats = degradation.strategy_stats();
    assert_eq!(stats.strategies["claude_full"].timeouts, 1);
    assert_eq!(stats.strategies["claude_simple"].timeouts, 1);
    assert_eq!(stats.strategies["hybrid"].timeouts, 1);
    assert_eq!(stats.fallbacks, 1);
}

#[tokio::test]
async fn test_unparseable_reply_falls_to_hybrid() {
    let provider = MockProvider::replying("Sorry, I can't help with that.");
    let degradation = chain(provider.clone(), &DegradationConfig::default());

    let c = degradation
        .classify_with_fallback("my boss keeps piling on work", &ClassificationContext::default())
        .await;

    assert_eq!(c.strategy_used.as_deref(), Some("hybrid"));
    assert_eq!(c.fallback_level, Some(2));
    assert_eq!(c.category, Category::Employment);
    assert_eq!(provider.calls(), 2);

    let stats = degradation.strategy_stats();
    assert_eq!(stats.strategies["claude_full"].failures, 1);
    assert_eq!(stats.strategies["claude_simple"].failures, 1);
}

#[tokio::test]
async fn test_model_crisis_gets_confidence_floor() {
    let provider = MockProvider::replying(
        "```json\n{\"category\": \"CRISIS\", \"confidence\": 0.55, \"emotional_intensity\": 14}\n```",
    );
    let degradation = chain(provider, &DegradationConfig::default());

    let c = degradation
        .classify_with_fallback("i'm so tired of everything", &ClassificationContext::default())
        .await;

    assert_eq!(c.category, Category::Crisis);
    assert_eq!(c.method, Method::ClaudeFull);
    assert!(c.confidence >= 0.9);
    assert_eq!(c.emotional_intensity, 10);
    assert_eq!(c.fallback_level, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_budget_uses_absolute_fallback() {
    let provider = MockProvider::new(Behavior::Hang);
    let config = DegradationConfig {
        total_budget_ms: 2500,
        ..DegradationConfig::default()
    };
    let degradation = chain(provider, &config);

    let c = degradation
        .classify_with_fallback("I lost my job", &ClassificationContext::default())
        .await;

    assert_eq!(c.method, Method::AbsoluteFallback);
    assert_eq!(c.strategy_used.as_deref(), Some("absolute_fallback"));
    assert_eq!(c.fallback_level, Some(4));
    assert_eq!(c.category, Category::Employment);
    assert_eq!(degradation.strategy_stats().absolute_fallbacks, 1);
}
