// Support resource catalog types

use serde::{Deserialize, Serialize};

use crate::classifier::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    CrisisHotline,
    Therapy,
    Article,
    App,
    SupportGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub cultural_relevance: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// What a classification asks of the matcher
#[derive(Debug, Clone, Default)]
pub struct ResourceQuery {
    pub category: Option<Category>,
    pub subcategory: Option<String>,
    pub emotional_intensity: u8,
    /// Cultural relevance tags to boost; empty disables the boost
    pub cultural_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredResource {
    pub resource: Resource,
    pub score: u32,
    pub matched: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceStats {
    pub total_resources: usize,
    pub unique_keywords: usize,
    pub categories: usize,
    pub subcategories: usize,
    pub cultural_contexts: usize,
    pub indexed: bool,
}
