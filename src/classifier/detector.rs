// Crisis keyword detector
//
// Runs before anything else in the pipeline. Patterns are tuned toward
// recall: a false positive shows hotline numbers to someone who didn't need
// them, a false negative can cost a life.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Named crisis patterns, checked in order
static CRISIS_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let patterns: &[(&str, &str)] = &[
        (
            "suicidal_ideation",
            r"(?i)\b(suicid\w*|kill(ing)? myself|end it all|want(ed)? to die|better off dead|rather be dead|wish i (was|were) dead)\b",
        ),
        (
            "ending_life",
            r"(?i)\b(end(ing)? my life|take my (own )?life|ending it( all)?)\b",
        ),
        (
            "self_harm",
            r"(?i)\b(hurt(ing)? myself|self[- ]?harm\w*|cut(ting)? myself|cutting)\b",
        ),
        (
            "hopelessness",
            r"(?i)\b(can'?t do this anymore|can'?t go on|can'?t take it anymore|don'?t want to (be here|live)|done with life|no reason to live|not worth living|no point (in )?living)\b",
        ),
        (
            "planning",
            r"(?i)\b(set a date|wrote (a |my )?goodbye|final arrangements|gave away my (things|stuff)|this is my last day)\b",
        ),
        (
            "finality",
            r"(?i)\b(goodbye forever|this is goodbye|won'?t see me again)\b",
        ),
        (
            "burden",
            r"(?i)\b(better off without me|(a )?burden to everyone|nobody would miss me|no one would miss me)\b",
        ),
        ("overdose", r"(?i)\boverdos(e|ed|ing)\b"),
        (
            "immediate_danger",
            r"(?i)\b((i )?(have|got) (the|my|enough) (pills|gun)|have a plan to (die|end it|end my life|kill myself|hurt myself|do it)|(in )?immediate danger|imminent harm)\b",
        ),
    ];

    patterns
        .iter()
        .map(|(name, pattern)| {
            (
                *name,
                Regex::new(pattern).expect("crisis pattern must compile"),
            )
        })
        .collect()
});

/// Outcome of a crisis scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrisisCheck {
    pub is_crisis: bool,
    /// Name of the first pattern that matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    /// Text the pattern matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
}

/// Scan text for crisis language
pub fn detect_crisis(text: &str) -> CrisisCheck {
    let text = text.replace(['\u{2019}', '\u{2018}'], "'");

    for (name, pattern) in CRISIS_PATTERNS.iter() {
        if let Some(found) = pattern.find(&text) {
            tracing::warn!(pattern = name, "Crisis language detected");
            return CrisisCheck {
                is_crisis: true,
                matched_pattern: Some(name.to_string()),
                matched_text: Some(found.as_str().to_lowercase()),
            };
        }
    }

    CrisisCheck::default()
}

/// Whether any crisis pattern matches
pub fn contains_crisis_language(text: &str) -> bool {
    let text = text.replace(['\u{2019}', '\u{2018}'], "'");
    CRISIS_PATTERNS.iter().any(|(_, pattern)| pattern.is_match(&text))
}
