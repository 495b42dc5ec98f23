// Graceful degradation orchestrator
//
// Tries classification strategies in priority order, each raced against its
// own timeout and the remaining chain budget. A strategy may fail, time out
// or panic; the chain always ends with the absolute fallback, so
// classify_with_fallback never fails.

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use super::rules::absolute_fallback;
use super::strategies::{ClaudeFullStrategy, ClaudeSimpleStrategy, HybridStrategy, RuleBasedStrategy};
use super::types::{Classification, ClassificationContext};
use super::LlmClassifier;
use crate::config::DegradationConfig;
use crate::errors::ClassificationError;

/// One step in the degradation chain
#[async_trait]
pub trait ClassificationStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn timeout(&self) -> Duration;

    async fn classify(
        &self,
        message: &str,
        context: &ClassificationContext,
    ) -> Result<Classification, ClassificationError>;
}

/// Per-strategy counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategyStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
}

/// Chain-wide counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct DegradationStats {
    pub total_requests: u64,
    pub strategies: BTreeMap<String, StrategyStats>,
    /// Requests answered by something other than the first strategy
    pub fallbacks: u64,
    pub absolute_fallbacks: u64,
    pub average_fallback_level: f64,
}

pub struct GracefulDegradation {
    strategies: Vec<Arc<dyn ClassificationStrategy>>,
    total_budget: Duration,
    stats: Mutex<DegradationStats>,
}

impl GracefulDegradation {
    /// Create a chain; timeouts must be non-increasing
    pub fn new(strategies: Vec<Arc<dyn ClassificationStrategy>>, total_budget: Duration) -> Result<Self> {
        for pair in strategies.windows(2) {
            if pair[1].timeout() > pair[0].timeout() {
                bail!(
                    "strategy {} timeout ({:?}) exceeds preceding {} ({:?})",
                    pair[1].name(),
                    pair[1].timeout(),
                    pair[0].name(),
                    pair[0].timeout()
                );
            }
        }

        Ok(Self {
            strategies,
            total_budget,
            stats: Mutex::new(DegradationStats::default()),
        })
    }

    /// Standard four-step chain: claude_full, claude_simple, hybrid, rule_based
    pub fn from_config(classifier: Arc<LlmClassifier>, config: &DegradationConfig) -> Result<Self> {
        config.validate()?;

        let strategies: Vec<Arc<dyn ClassificationStrategy>> = vec![
            Arc::new(ClaudeFullStrategy::new(
                Arc::clone(&classifier),
                Duration::from_millis(config.claude_full_timeout_ms),
            )),
            Arc::new(ClaudeSimpleStrategy::new(
                Arc::clone(&classifier),
                Duration::from_millis(config.claude_simple_timeout_ms),
            )),
            Arc::new(HybridStrategy::new(
                classifier,
                Duration::from_millis(config.hybrid_timeout_ms),
            )),
            Arc::new(RuleBasedStrategy::new(Duration::from_millis(
                config.rule_based_timeout_ms,
            ))),
        ];

        Self::new(strategies, Duration::from_millis(config.total_budget_ms))
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    /// Classify with automatic fallback; never fails
    pub async fn classify_with_fallback(
        &self,
        message: &str,
        context: &ClassificationContext,
    ) -> Classification {
        let deadline = Instant::now() + self.total_budget;

        for (level, strategy) in self.strategies.iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(
                    strategy = strategy.name(),
                    "Classification budget exhausted, skipping to absolute fallback"
                );
                break;
            }

            let limit = strategy.timeout().min(remaining);
            tracing::debug!(
                "Trying strategy {} ({}/{})",
                strategy.name(),
                level + 1,
                self.strategies.len()
            );

            let attempt = AssertUnwindSafe(strategy.classify(message, context)).catch_unwind();
            let outcome = match tokio::time::timeout(limit, attempt).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(ClassificationError::Panicked(strategy.name().to_string())),
                Err(_) => Err(ClassificationError::Timeout {
                    strategy: strategy.name().to_string(),
                    timeout_ms: limit.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(classification) => {
                    let mut classification = classification.sanitized();
                    classification.strategy_used = Some(strategy.name().to_string());
                    classification.fallback_level = Some(level);

                    if level > 0 {
                        tracing::info!(
                            strategy = strategy.name(),
                            level,
                            "Strategy succeeded after {} failed attempts",
                            level
                        );
                    }
                    self.record(strategy.name(), level, None);
                    return classification;
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        kind = e.kind(),
                        error = %e,
                        "Strategy failed (attempt {}/{})",
                        level + 1,
                        self.strategies.len()
                    );
                    self.record(strategy.name(), level, Some(&e));
                }
            }
        }

        let level = self.strategies.len();
        tracing::warn!(level, "All classification strategies failed, using absolute fallback");
        self.record_absolute(level);

        let mut classification = absolute_fallback(message);
        classification.fallback_level = Some(level);
        classification
    }

    fn record(&self, name: &str, level: usize, error: Option<&ClassificationError>) {
        let Ok(mut stats) = self.stats.lock() else {
            return;
        };
        let entry = stats.strategies.entry(name.to_string()).or_default();
        entry.attempts += 1;
        match error {
            None => {
                entry.successes += 1;
                Self::record_answer(&mut stats, level);
            }
            Some(ClassificationError::Timeout { .. }) => entry.timeouts += 1,
            Some(_) => entry.failures += 1,
        }
    }

    fn record_absolute(&self, level: usize) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.absolute_fallbacks += 1;
            Self::record_answer(&mut stats, level);
        }
    }

    fn record_answer(stats: &mut DegradationStats, level: usize) {
        let previous = stats.total_requests as f64;
        stats.total_requests += 1;
        if level > 0 {
            stats.fallbacks += 1;
        }
        stats.average_fallback_level =
            (stats.average_fallback_level * previous + level as f64) / stats.total_requests as f64;
    }

    pub fn strategy_stats(&self) -> DegradationStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn reset_stats(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            *stats = DegradationStats::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Category, Method};

    struct Fixed {
        name: &'static str,
        timeout: Duration,
        behavior: Behavior,
    }

    enum Behavior {
        Succeed(Category),
        Fail,
        Hang,
        Panic,
    }

    #[async_trait]
    impl ClassificationStrategy for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        async fn classify(
            &self,
            _message: &str,
            _context: &ClassificationContext,
        ) -> Result<Classification, ClassificationError> {
            match self.behavior {
                Behavior::Succeed(category) => Ok(Classification::new(category, 0.8, 4, Method::RuleBased)),
                Behavior::Fail => Err(ClassificationError::Model("down".into())),
                Behavior::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Behavior::Panic => panic!("strategy exploded"),
            }
        }
    }

    fn strategy(name: &'static str, ms: u64, behavior: Behavior) -> Arc<dyn ClassificationStrategy> {
        Arc::new(Fixed {
            name,
            timeout: Duration::from_millis(ms),
            behavior,
        })
    }

    #[test]
    fn test_rejects_increasing_timeouts() {
        let result = GracefulDegradation::new(
            vec![
                strategy("a", 100, Behavior::Fail),
                strategy("b", 200, Behavior::Fail),
            ],
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_through_failures_and_panics() {
        let chain = GracefulDegradation::new(
            vec![
                strategy("fail", 300, Behavior::Fail),
                strategy("panic", 200, Behavior::Panic),
                strategy("ok", 100, Behavior::Succeed(Category::Employment)),
            ],
            Duration::from_secs(1),
        )
        .unwrap();

        let c = chain
            .classify_with_fallback("anything", &ClassificationContext::default())
            .await;
        assert_eq!(c.category, Category::Employment);
        assert_eq!(c.strategy_used.as_deref(), Some("ok"));
        assert_eq!(c.fallback_level, Some(2));

        let stats = chain.strategy_stats();
        assert_eq!(stats.strategies["panic"].failures, 1);
        assert_eq!(stats.fallbacks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_reach_absolute_fallback() {
        let chain = GracefulDegradation::new(
            vec![
                strategy("slow", 300, Behavior::Hang),
                strategy("slower", 200, Behavior::Hang),
            ],
            Duration::from_secs(1),
        )
        .unwrap();

        let start = Instant::now();
        let c = chain
            .classify_with_fallback("I want to end it all", &ClassificationContext::default())
            .await;

        assert_eq!(c.category, Category::Crisis);
        assert_eq!(c.method, Method::AbsoluteFallback);
        assert_eq!(c.fallback_level, Some(2));
        assert!(start.elapsed() <= Duration::from_millis(500) + Duration::from_millis(5));
        assert_eq!(chain.strategy_stats().strategies["slow"].timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_budget_caps_chain() {
        let chain = GracefulDegradation::new(
            vec![
                strategy("slow", 3000, Behavior::Hang),
                strategy("slower", 2000, Behavior::Hang),
                strategy("ok", 1000, Behavior::Succeed(Category::General)),
            ],
            Duration::from_millis(4000),
        )
        .unwrap();

        let start = Instant::now();
        let c = chain
            .classify_with_fallback("hello there", &ClassificationContext::default())
            .await;

        // slow uses 3000ms, slower is cut to the remaining 1000ms, budget is gone
        assert_eq!(c.method, Method::AbsoluteFallback);
        assert!(start.elapsed() <= Duration::from_millis(4005));
        assert_eq!(chain.strategy_stats().absolute_fallbacks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stats_keeps_chain() {
        let chain = GracefulDegradation::new(
            vec![
                strategy("fail", 200, Behavior::Fail),
                strategy("ok", 100, Behavior::Succeed(Category::General)),
            ],
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(chain.strategy_names(), vec!["fail".to_string(), "ok".to_string()]);

        chain
            .classify_with_fallback("hello", &ClassificationContext::default())
            .await;
        assert_eq!(chain.strategy_stats().total_requests, 1);

        chain.reset_stats();
        let stats = chain.strategy_stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.fallbacks, 0);
        assert!(stats.strategies.is_empty());
        assert_eq!(chain.strategy_names().len(), 2);
    }
}
