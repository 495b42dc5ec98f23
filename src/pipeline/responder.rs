// Conversational reply templates

use once_cell::sync::Lazy;
use regex::Regex;

use crate::classifier::{Category, Classification};
use crate::crisis::{generate_crisis_response, SeverityLevel};

/// Reply when processing fails outright
pub const FAILURE_RESPONSE: &str = "I'm having trouble right now. Please try again.";

static ANXIETY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(anxiety|anxious|panic|worried|stress)").expect("anxiety regex"));
static DEPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(depress|sad|hopeless|empty|numb)").expect("depression regex"));
static TRAUMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(trauma|ptsd|flashback|triggered)").expect("trauma regex"));

fn subcategory_is(classification: &Classification, names: &[&str]) -> bool {
    classification
        .subcategory
        .as_deref()
        .map_or(false, |sub| names.contains(&sub))
}

/// Reply text for a non-crisis classification
pub fn generate_response(classification: &Classification, message: &str) -> String {
    let intensity = classification.emotional_intensity;

    match classification.category {
        Category::Crisis => generate_crisis_response(SeverityLevel::Severe).response,
        Category::Employment => {
            if subcategory_is(classification, &["job_loss", "feeling_like_burden", "laid_off", "unemployment"]) {
                "I'm really sorry to hear about your job loss. That's incredibly tough, and it's \
                 understandable to feel stressed about how this impacts the people who count on you. \
                 Losing a job can shake your sense of identity and worth, especially when you feel \
                 responsible for providing. What you're feeling is valid. How are you holding up?"
                    .to_owned()
            } else if intensity >= 7 {
                "Work challenges can be overwhelming, especially when they spill into other parts of \
                 your life. What's been weighing on you most?"
                    .to_owned()
            } else {
                "Work situations can be really stressful. What's going on with work for you?".to_owned()
            }
        }
        Category::Relationship => {
            if subcategory_is(classification, &["infidelity"]) {
                "That kind of betrayal cuts deep. Trust is everything in a relationship, and when \
                 it's broken it shakes your whole world. How are you processing this right now?"
                    .to_owned()
            } else {
                "Relationship struggles can feel isolating. What's been going on?".to_owned()
            }
        }
        Category::MentalHealth => {
            if subcategory_is(classification, &["anxiety"]) || ANXIETY.is_match(message) {
                "Anxiety can feel overwhelming, like your mind is racing and you can't slow it down. \
                 It's real, and it's tough. What's been triggering these feelings for you?"
                    .to_owned()
            } else if subcategory_is(classification, &["depression"]) || DEPRESSION.is_match(message) {
                "Depression can make everything feel heavy and exhausting. Even getting through the \
                 day can feel like too much. You're not alone in this. What's been weighing on you most?"
                    .to_owned()
            } else if subcategory_is(classification, &["trauma", "ptsd"]) || TRAUMA.is_match(message) {
                "Trauma can leave deep wounds that don't always heal easily. What you're experiencing \
                 is a natural response to something difficult. How are you coping with these feelings?"
                    .to_owned()
            } else if intensity >= 8 {
                "What you're going through sounds really tough. These feelings are real and valid. \
                 You're not alone in this. What's been weighing on you most?"
                    .to_owned()
            } else {
                "It sounds like you're going through something difficult. Want to talk about what's \
                 been going on?"
                    .to_owned()
            }
        }
        Category::Identity => {
            "Carrying that kind of weight every day is exhausting, and it's not something you should \
             have to shrug off. Your experience is real. Do you want to tell me more about what happened?"
                .to_owned()
        }
        Category::TechIssue => {
            "Sorry about that! Can you tell me what went wrong? I'll do my best to help.".to_owned()
        }
        Category::General => "I'm here to listen. What's on your mind?".to_owned(),
    }
}
