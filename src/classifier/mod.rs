// Message classification
//
// normalizer -> detector -> rules -> degradation chain (model strategies,
// then rules, then absolute fallback).

pub mod degradation;
pub mod detector;
pub mod model;
pub mod normalizer;
pub mod rules;
pub mod strategies;
pub mod types;

pub use degradation::{ClassificationStrategy, DegradationStats, GracefulDegradation, StrategyStats};
pub use detector::{contains_crisis_language, detect_crisis, CrisisCheck};
pub use model::{parse_classification, LlmClassifier};
pub use normalizer::normalize;
pub use rules::{absolute_fallback, ambiguous_phrase, classify_general, classify_obvious};
pub use strategies::{ClaudeFullStrategy, ClaudeSimpleStrategy, HybridStrategy, RuleBasedStrategy};
pub use types::{
    Category, Classification, ClassificationContext, Message, Method, CRISIS_MIN_CONFIDENCE,
};
