// Smart resource matcher
//
// Precomputed keyword, category and cultural indexes over the catalog.
// Reindexing builds a fresh index and swaps it in whole, so readers never
// see a half-built one.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use super::types::{Resource, ResourceQuery, ResourceStats, ScoredResource};
use crate::classifier::Category;

const CATEGORY_SCORE: u32 = 10;
const SUBCATEGORY_SCORE: u32 = 15;
const CRISIS_BOOST: u32 = 20;
const CULTURAL_BOOST: u32 = 5;

/// Intensity at which crisis resources are boosted
pub const CRISIS_BOOST_INTENSITY: u8 = 8;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "you", "your", "their", "our",
    "can",
];

/// Lowercased unique keywords in first-seen order
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut seen = HashSet::new();
    cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() > 2)
        .filter(|word| !STOPWORDS.contains(word))
        .filter(|word| seen.insert(word.to_string()))
        .map(String::from)
        .collect()
}

#[derive(Default)]
struct ResourceIndex {
    resources: Vec<Resource>,
    keywords: HashMap<String, Vec<usize>>,
    categories: HashMap<Category, Vec<usize>>,
    subcategories: HashMap<String, Vec<usize>>,
    cultural: HashMap<String, Vec<usize>>,
    indexed: bool,
}

impl ResourceIndex {
    fn build(resources: Vec<Resource>) -> Self {
        let mut index = ResourceIndex {
            indexed: true,
            ..Default::default()
        };

        for (pos, resource) in resources.iter().enumerate() {
            let text = format!("{} {}", resource.description, resource.title);
            for keyword in extract_keywords(&text) {
                index.keywords.entry(keyword).or_default().push(pos);
            }

            index.categories.entry(resource.category).or_default().push(pos);

            if let Some(sub) = &resource.subcategory {
                index.subcategories.entry(sub.to_lowercase()).or_default().push(pos);
            }

            for tag in &resource.cultural_relevance {
                index.cultural.entry(tag.to_lowercase()).or_default().push(pos);
            }
        }

        index.resources = resources;
        index
    }
}

struct Candidate {
    score: u32,
    matched: Vec<String>,
    reason: String,
}

/// Accumulates scores keyed by catalog position
#[derive(Default)]
struct Scoreboard {
    entries: BTreeMap<usize, Candidate>,
}

impl Scoreboard {
    fn add(&mut self, pos: usize, score: u32, matched: &str, reason: &str, override_reason: bool) {
        let entry = self.entries.entry(pos).or_insert_with(|| Candidate {
            score: 0,
            matched: Vec::new(),
            reason: reason.to_string(),
        });
        entry.score += score;
        entry.matched.push(matched.to_string());
        if override_reason {
            entry.reason = reason.to_string();
        }
    }

    /// Highest score first; equal scores keep catalog order
    fn ranked(self, resources: &[Resource], limit: usize) -> Vec<ScoredResource> {
        let mut ranked: Vec<(usize, Candidate)> = self.entries.into_iter().collect();
        ranked.sort_by(|a, b| b.1.score.cmp(&a.1.score));
        ranked
            .into_iter()
            .take(limit)
            .map(|(pos, c)| ScoredResource {
                resource: resources[pos].clone(),
                score: c.score,
                matched: c.matched,
                reason: c.reason,
            })
            .collect()
    }
}

pub struct ResourceMatcher {
    index: RwLock<Arc<ResourceIndex>>,
}

impl Default for ResourceMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceMatcher {
    /// Matcher with nothing indexed
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Arc::new(ResourceIndex::default())),
        }
    }

    pub fn with_resources(resources: Vec<Resource>) -> Self {
        let matcher = Self::new();
        matcher.index_resources(resources);
        matcher
    }

    fn snapshot(&self) -> Arc<ResourceIndex> {
        match self.index.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the catalog and all indexes
    pub fn index_resources(&self, resources: Vec<Resource>) {
        let index = Arc::new(ResourceIndex::build(resources));

        tracing::info!(
            resources = index.resources.len(),
            keywords = index.keywords.len(),
            categories = index.categories.len(),
            cultural_contexts = index.cultural.len(),
            "Indexed resources"
        );

        match self.index.write() {
            Ok(mut guard) => *guard = index,
            Err(poisoned) => *poisoned.into_inner() = index,
        }
    }

    /// Rank resources for a classification
    pub fn fast_resource_match(&self, query: &ResourceQuery, limit: usize) -> Vec<ScoredResource> {
        let index = self.snapshot();
        if !index.indexed {
            tracing::warn!("Resource match requested before indexing");
            return Vec::new();
        }

        let mut board = Scoreboard::default();

        if let Some(category) = query.category {
            let reason = format!("Matches category: {}", category);
            for &pos in index.categories.get(&category).into_iter().flatten() {
                board.add(pos, CATEGORY_SCORE, category.as_str(), &reason, false);
            }
        }

        if let Some(sub) = &query.subcategory {
            let key = sub.to_lowercase();
            let reason = format!("Matches subcategory: {}", sub);
            for &pos in index.subcategories.get(&key).into_iter().flatten() {
                board.add(pos, SUBCATEGORY_SCORE, &key, &reason, true);
            }
        }

        if query.emotional_intensity >= CRISIS_BOOST_INTENSITY {
            let reason = format!(
                "Crisis resource - high emotional intensity ({})",
                query.emotional_intensity
            );
            for &pos in index.categories.get(&Category::Crisis).into_iter().flatten() {
                board.add(pos, CRISIS_BOOST, "crisis", &reason, true);
            }
        }

        if !query.cultural_tags.is_empty() {
            // One boost per resource, however many tags it shares
            let mut boosted = HashSet::new();
            for tag in &query.cultural_tags {
                for &pos in index.cultural.get(&tag.to_lowercase()).into_iter().flatten() {
                    if boosted.insert(pos) {
                        board.add(pos, CULTURAL_BOOST, "culturally-relevant", "Culturally relevant resource", false);
                    }
                }
            }
        }

        board.ranked(&index.resources, limit)
    }

    /// Free-text search: one point per shared keyword
    pub fn search_resources(&self, text: &str, limit: usize) -> Vec<ScoredResource> {
        let index = self.snapshot();
        if !index.indexed {
            tracing::warn!("Resource search requested before indexing");
            return Vec::new();
        }

        let mut board = Scoreboard::default();
        for keyword in extract_keywords(text) {
            let reason = format!("Matches keywords: {}", keyword);
            for &pos in index.keywords.get(&keyword).into_iter().flatten() {
                board.add(pos, 1, &keyword, &reason, false);
            }
        }

        board.ranked(&index.resources, limit)
    }

    pub fn resources_by_category(&self, category: Category) -> Vec<Resource> {
        let index = self.snapshot();
        index
            .categories
            .get(&category)
            .into_iter()
            .flatten()
            .map(|&pos| index.resources[pos].clone())
            .collect()
    }

    pub fn crisis_resources(&self) -> Vec<Resource> {
        self.resources_by_category(Category::Crisis)
    }

    pub fn stats(&self) -> ResourceStats {
        let index = self.snapshot();
        ResourceStats {
            total_resources: index.resources.len(),
            unique_keywords: index.keywords.len(),
            categories: index.categories.len(),
            subcategories: index.subcategories.len(),
            cultural_contexts: index.cultural.len(),
            indexed: index.indexed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::default_catalog;

    fn matcher() -> ResourceMatcher {
        ResourceMatcher::with_resources(default_catalog().unwrap())
    }

    #[test]
    fn test_extract_keywords() {
        let words = extract_keywords("The job search, and a RESUME help for you!");
        assert_eq!(words, vec!["job", "search", "resume", "help"]);

        let words = extract_keywords("work-life balance balance");
        assert_eq!(words, vec!["work-life", "balance"]);
    }

    #[test]
    fn test_unindexed_matcher_is_empty() {
        let matcher = ResourceMatcher::new();
        assert!(matcher.search_resources("job", 5).is_empty());
        assert!(!matcher.stats().indexed);
    }

    #[test]
    fn test_subcategory_outranks_category() {
        let matcher = matcher();
        let query = ResourceQuery {
            category: Some(Category::Employment),
            subcategory: Some("job_loss".to_string()),
            emotional_intensity: 5,
            cultural_tags: vec![],
        };
        let results = matcher.fast_resource_match(&query, 3);
        assert_eq!(results[0].resource.id, "employment_dol");
        assert_eq!(results[0].score, 25);
        assert_eq!(results[1].resource.id, "employment_blackcareernetwork");
        assert_eq!(results[1].score, 10);
    }

    #[test]
    fn test_crisis_boost_is_monotone_in_intensity() {
        let matcher = matcher();
        let score_at = |intensity: u8| {
            let query = ResourceQuery {
                category: Some(Category::MentalHealth),
                emotional_intensity: intensity,
                ..Default::default()
            };
            matcher
                .fast_resource_match(&query, 50)
                .into_iter()
                .find(|r| r.resource.id == "crisis_988")
                .map_or(0, |r| r.score)
        };

        let mut last = 0;
        for intensity in 1..=10 {
            let score = score_at(intensity);
            assert!(score >= last);
            last = score;
        }
        assert_eq!(score_at(7), 0);
        assert_eq!(score_at(8), 20);
    }

    #[test]
    fn test_cultural_boost_applied_once() {
        let matcher = matcher();
        let query = ResourceQuery {
            category: Some(Category::Identity),
            cultural_tags: vec!["black".to_string(), "african-american".to_string()],
            emotional_intensity: 3,
            ..Default::default()
        };
        let results = matcher.fast_resource_match(&query, 10);
        assert_eq!(results[0].resource.id, "identity_blackmentalhealth");
        assert_eq!(results[0].score, 15);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let matcher = matcher();
        let query = ResourceQuery {
            category: Some(Category::Crisis),
            ..Default::default()
        };
        let ids: Vec<String> = matcher
            .fast_resource_match(&query, 3)
            .into_iter()
            .map(|r| r.resource.id)
            .collect();
        assert_eq!(ids, vec!["crisis_988", "crisis_text", "crisis_samhsa"]);
    }

    #[test]
    fn test_search_finds_by_title_word() {
        let matcher = matcher();
        for resource in default_catalog().unwrap() {
            let Some(word) = extract_keywords(&resource.title).into_iter().next() else {
                continue;
            };
            let results = matcher.search_resources(&word, 100);
            assert!(
                results.iter().any(|r| r.resource.id == resource.id),
                "{} not found by '{}'",
                resource.id,
                word
            );
        }
    }

    #[test]
    fn test_reindex_replaces_catalog() {
        let matcher = matcher();
        let only = default_catalog()
            .unwrap()
            .into_iter()
            .filter(|r| r.id == "anxiety_calm")
            .collect();
        matcher.index_resources(only);
        assert_eq!(matcher.stats().total_resources, 1);
        assert!(matcher.crisis_resources().is_empty());
    }
}
