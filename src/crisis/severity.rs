// Escalation severity tiers
//
// Three fixed tiers, checked severe first. Each tier carries its indicator
// phrases, the ordered actions to run, the resources to show and its
// response-time commitment.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Elevated,
    Moderate,
    Severe,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Elevated => "elevated",
            SeverityLevel::Moderate => "moderate",
            SeverityLevel::Severe => "severe",
        }
    }

    pub fn tier(&self) -> &'static SeverityTier {
        match self {
            SeverityLevel::Severe => &SEVERE,
            SeverityLevel::Moderate => &MODERATE,
            SeverityLevel::Elevated => &ELEVATED,
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effects a tier can trigger, run in tier order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrisisAction {
    DisplayCrisisBanner,
    #[serde(rename = "PROVIDE_988_IMMEDIATELY")]
    Provide988Immediately,
    AlertHumanModerator,
    LogHighPriority,
    DisableNormalChat,
    TrackUserSession,
    ProvideCrisisResources,
    AlertModeratorQueue,
    IncreaseMonitoring,
    LogMediumPriority,
    OfferImmediateSupport,
    SuggestProfessionalHelp,
    ProvideTherapistDirectory,
    LogForReview,
    RecommendResources,
    CheckInLater,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisResource {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBundle {
    pub primary: Vec<CrisisResource>,
    pub secondary: Vec<CrisisResource>,
    pub emergency: Vec<CrisisResource>,
}

#[derive(Debug)]
pub struct SeverityTier {
    pub level: SeverityLevel,
    pub indicators: &'static [&'static str],
    pub actions: &'static [CrisisAction],
    pub response_time: &'static str,
    pub priority: u8,
    pub requires_human_intervention: bool,
    pub auto_escalate: bool,
}

pub static SEVERE: SeverityTier = SeverityTier {
    level: SeverityLevel::Severe,
    indicators: &[
        "suicide",
        "suicidal",
        "kill myself",
        "end my life",
        "ending my life",
        "want to die",
        "better off dead",
        "no reason to live",
        "end it all",
        "ending it all",
        "imminent harm",
        "immediate danger",
        "right now",
        "have a plan",
        "have the pills",
        "have the gun",
    ],
    actions: &[
        CrisisAction::DisplayCrisisBanner,
        CrisisAction::Provide988Immediately,
        CrisisAction::AlertHumanModerator,
        CrisisAction::LogHighPriority,
        CrisisAction::DisableNormalChat,
        CrisisAction::TrackUserSession,
    ],
    response_time: "IMMEDIATE",
    priority: 1,
    requires_human_intervention: true,
    auto_escalate: true,
};

pub static MODERATE: SeverityTier = SeverityTier {
    level: SeverityLevel::Moderate,
    indicators: &[
        "self harm",
        "self-harm",
        "cut myself",
        "hurt myself",
        "severe distress",
        "cant take it",
        "can't take it",
        "overwhelming",
        "unbearable",
        "desperate",
        "thoughts of death",
        "thinking about death",
        "hopeless",
        "worthless",
        "no point",
    ],
    actions: &[
        CrisisAction::ProvideCrisisResources,
        CrisisAction::AlertModeratorQueue,
        CrisisAction::IncreaseMonitoring,
        CrisisAction::LogMediumPriority,
        CrisisAction::OfferImmediateSupport,
    ],
    response_time: "< 5 minutes",
    priority: 2,
    requires_human_intervention: true,
    auto_escalate: false,
};

pub static ELEVATED: SeverityTier = SeverityTier {
    level: SeverityLevel::Elevated,
    indicators: &[
        "escalating distress",
        "getting worse",
        "spiraling",
        "repeated mental health",
        "keep coming back",
        "not getting better",
        "struggling badly",
        "need help",
        "desperate for help",
        "losing control",
    ],
    actions: &[
        CrisisAction::SuggestProfessionalHelp,
        CrisisAction::ProvideTherapistDirectory,
        CrisisAction::LogForReview,
        CrisisAction::RecommendResources,
        CrisisAction::CheckInLater,
    ],
    response_time: "< 1 hour",
    priority: 3,
    requires_human_intervention: false,
    auto_escalate: false,
};

/// Tiers in detection order
pub fn tiers() -> [&'static SeverityTier; 3] {
    [&SEVERE, &MODERATE, &ELEVATED]
}

fn resource(
    name: &str,
    phone: Option<&str>,
    text: Option<&str>,
    url: Option<&str>,
    description: &str,
) -> CrisisResource {
    CrisisResource {
        name: name.to_string(),
        phone: phone.map(String::from),
        text: text.map(String::from),
        url: url.map(String::from),
        description: description.to_string(),
    }
}

fn lifeline_988() -> CrisisResource {
    resource(
        "988 Suicide & Crisis Lifeline",
        Some("988"),
        Some("Text HELLO to 741741"),
        Some("https://988lifeline.org"),
        "Free, confidential support 24/7",
    )
}

fn emergency_911() -> CrisisResource {
    resource(
        "Emergency Services",
        Some("911"),
        None,
        None,
        "Call if you are in immediate danger",
    )
}

impl SeverityTier {
    /// Resource bundle shown for this tier
    pub fn resources(&self) -> ResourceBundle {
        match self.level {
            SeverityLevel::Severe => ResourceBundle {
                primary: vec![lifeline_988()],
                secondary: vec![resource(
                    "Crisis Text Line",
                    None,
                    Some("Text HOME to 741741"),
                    Some("https://www.crisistextline.org"),
                    "Text with a trained crisis counselor",
                )],
                emergency: vec![emergency_911()],
            },
            SeverityLevel::Moderate => ResourceBundle {
                primary: vec![lifeline_988()],
                secondary: vec![resource(
                    "SAMHSA National Helpline",
                    Some("1-800-662-4357"),
                    None,
                    Some("https://www.samhsa.gov/find-help/national-helpline"),
                    "Treatment referral and information, 24/7",
                )],
                emergency: vec![emergency_911()],
            },
            SeverityLevel::Elevated => ResourceBundle {
                primary: vec![resource(
                    "Therapy for Black Girls",
                    None,
                    None,
                    Some("https://therapyforblackgirls.com"),
                    "Directory of culturally competent therapists",
                )],
                secondary: vec![
                    resource(
                        "Black Mental Health Alliance",
                        Some("(410) 338-2642"),
                        None,
                        Some("https://blackmentalhealth.com"),
                        "Connects Black communities with culturally competent care",
                    ),
                    resource(
                        "NAMI HelpLine",
                        Some("1-800-950-6264"),
                        None,
                        Some("https://www.nami.org/help"),
                        "Mental health information and referrals",
                    ),
                ],
                emergency: vec![lifeline_988()],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        let levels: Vec<SeverityLevel> = tiers().iter().map(|t| t.level).collect();
        assert_eq!(
            levels,
            vec![SeverityLevel::Severe, SeverityLevel::Moderate, SeverityLevel::Elevated]
        );
        assert!(SeverityLevel::Severe > SeverityLevel::Elevated);
    }

    #[test]
    fn test_only_severe_auto_escalates() {
        assert!(SEVERE.auto_escalate);
        assert!(!MODERATE.auto_escalate);
        assert!(!ELEVATED.auto_escalate);
        assert!(!ELEVATED.requires_human_intervention);
    }

    #[test]
    fn test_severe_resources_include_hotlines() {
        let bundle = SEVERE.resources();
        assert_eq!(bundle.primary[0].phone.as_deref(), Some("988"));
        assert!(bundle.secondary[0].text.as_deref().unwrap().contains("741741"));
        assert_eq!(bundle.emergency[0].phone.as_deref(), Some("911"));
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&CrisisAction::Provide988Immediately).unwrap();
        assert_eq!(json, "\"PROVIDE_988_IMMEDIATELY\"");
        let json = serde_json::to_string(&CrisisAction::AlertHumanModerator).unwrap();
        assert_eq!(json, "\"ALERT_HUMAN_MODERATOR\"");
    }
}
