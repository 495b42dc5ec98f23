// Rule-based classification
//
// Three tiers of rules, from most to least certain:
// - classify_obvious: clear cases that skip the model entirely
// - classify_general: keyword rules used by the hybrid and rule strategies
// - absolute_fallback: last resort once every strategy has failed

use once_cell::sync::Lazy;
use regex::Regex;

use super::detector::{contains_crisis_language, detect_crisis};
use super::types::{Category, Classification, Method};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("rule pattern must compile")
}

static JOB_LOSS: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(laid off|fired|terminated|lost my job|unemployed|jobless)\b"));
static INFIDELITY: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(girlfriend|boyfriend|wife|husband|partner)\s+(is\s+|was\s+)?(cheating|cheated)\b")
});
static BREAKUP: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(broke up|breaking up|divorce|divorced|divorcing|dumped me)\b"));
static SEVERE_CONDITION: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(severe|major|clinical)\s+depression\b"));
static TECH_ERROR: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(error|bug|crash(es|ed|ing)?|glitch(es|ing)?|freez(e|es|ing)|frozen)\b"));
static GREETING: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)^(hi|hello|hey|sup|what'?s up|good morning|good afternoon|good evening|yo|wassup)[\s!?.]*$")
});

static WORK: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(job|jobs|work|working|career|boss|coworkers?|hired|interview\w*|promotion|salary|paycheck|rent)\b")
});
static RELATIONSHIP: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(girlfriend|boyfriend|wife|husband|partner|relationship|dating|marriage|married|my ex|breakup)\b")
});
static DEPRESSION: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(depress\w*|sad|sadness|hopeless|empty|numb|worthless|lonely|down)\b")
});
static ANXIETY: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(anxi\w*|panic\w*|worr\w*|nervous|stress\w*|overwhelm\w*|overthinking)\b")
});
static IDENTITY: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(identity|racism|racist|discriminat\w*|microaggression\w*|belong\w*|culture|black|gay|queer|lgbtq?\+?|trans|masculinity|code[- ]switch\w*)\b")
});
static TECH: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(app|login|log in|password|button|screen|loading)\b"));

static AMBIGUOUS: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(not working|not (good|well|okay|ok)|can'?t (do|be|figure)\w*|feeling down|lost|broken|need help|nothing works|i'?m done)\b")
});

static FALLBACK_CRISIS: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)(suicide|kill|die|end it all|hurt myself)"));
static FALLBACK_EMPLOYMENT: Lazy<Regex> = Lazy::new(|| compile(r"(?i)(job|work|fired|laid off)"));

/// Classify unambiguous messages without a model call
///
/// Returns None for anything with crisis language, so a clear-case rule can
/// never mask a crisis.
pub fn classify_obvious(normalized: &str, original: &str) -> Option<Classification> {
    if contains_crisis_language(normalized) || contains_crisis_language(original) {
        return None;
    }

    if JOB_LOSS.is_match(normalized) {
        return Some(
            Classification::new(Category::Employment, 0.95, 7, Method::Regex)
                .with_subcategory("job_loss")
                .with_reasoning("Explicit job loss language"),
        );
    }

    if INFIDELITY.is_match(normalized) {
        return Some(
            Classification::new(Category::Relationship, 0.95, 9, Method::Regex)
                .with_subcategory("infidelity")
                .with_reasoning("Explicit infidelity language"),
        );
    }

    if BREAKUP.is_match(normalized) {
        return Some(
            Classification::new(Category::Relationship, 0.9, 8, Method::Regex)
                .with_subcategory("breakup")
                .with_reasoning("Breakup or divorce"),
        );
    }

    if SEVERE_CONDITION.is_match(normalized) {
        return Some(
            Classification::new(Category::MentalHealth, 0.95, 9, Method::Regex)
                .with_subcategory("severe_condition")
                .with_reasoning("Named severe mental health condition"),
        );
    }

    if TECH_ERROR.is_match(normalized) {
        return Some(
            Classification::new(Category::TechIssue, 0.9, 2, Method::Regex)
                .with_subcategory("app_error")
                .with_reasoning("Technical error reported"),
        );
    }

    if GREETING.is_match(normalized.trim()) {
        return Some(
            Classification::new(Category::General, 0.95, 3, Method::Regex)
                .with_subcategory("greeting")
                .with_reasoning("Greeting"),
        );
    }

    None
}

/// Keyword classification for the hybrid and rule-based strategies
pub fn classify_general(text: &str) -> Classification {
    if detect_crisis(text).is_crisis {
        return Classification::crisis(Method::RuleBased)
            .with_reasoning("Crisis language in keyword scan");
    }

    if JOB_LOSS.is_match(text) {
        return Classification::new(Category::Employment, 0.8, 7, Method::RuleBased)
            .with_subcategory("job_loss");
    }

    if RELATIONSHIP.is_match(text) {
        return Classification::new(Category::Relationship, 0.75, 6, Method::RuleBased);
    }

    if DEPRESSION.is_match(text) {
        return Classification::new(Category::MentalHealth, 0.75, 6, Method::RuleBased)
            .with_subcategory("depression");
    }

    if ANXIETY.is_match(text) {
        return Classification::new(Category::MentalHealth, 0.75, 5, Method::RuleBased)
            .with_subcategory("anxiety");
    }

    if WORK.is_match(text) {
        return Classification::new(Category::Employment, 0.7, 5, Method::RuleBased)
            .with_subcategory("workplace");
    }

    if IDENTITY.is_match(text) {
        return Classification::new(Category::Identity, 0.7, 5, Method::RuleBased);
    }

    if TECH_ERROR.is_match(text) || TECH.is_match(text) {
        return Classification::new(Category::TechIssue, 0.7, 2, Method::RuleBased);
    }

    if GREETING.is_match(text.trim()) {
        return Classification::new(Category::General, 0.8, 3, Method::RuleBased)
            .with_subcategory("greeting");
    }

    Classification::new(Category::General, 0.6, 3, Method::RuleBased)
}

/// Ambiguous phrase that justifies a model call, if any
pub fn ambiguous_phrase(text: &str) -> Option<String> {
    AMBIGUOUS.find(text).map(|m| m.as_str().to_lowercase())
}

/// Last-resort classification; pure and instantaneous
pub fn absolute_fallback(text: &str) -> Classification {
    let classification = if FALLBACK_CRISIS.is_match(text) || contains_crisis_language(text) {
        Classification::new(Category::Crisis, 0.9, 10, Method::AbsoluteFallback)
            .with_reasoning("Crisis keyword in absolute fallback")
    } else if FALLBACK_EMPLOYMENT.is_match(text) {
        Classification::new(Category::Employment, 0.6, 5, Method::AbsoluteFallback)
    } else {
        Classification::new(Category::General, 0.5, 3, Method::AbsoluteFallback)
    };

    let mut classification = classification;
    classification.strategy_used = Some("absolute_fallback".to_string());
    classification
}
