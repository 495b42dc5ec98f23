// Support resources
// Bundled catalog plus a precomputed matcher

mod matcher;
mod types;

use anyhow::{Context, Result};
use std::path::Path;

pub use matcher::{extract_keywords, ResourceMatcher, CRISIS_BOOST_INTENSITY};
pub use types::{Resource, ResourceQuery, ResourceStats, ResourceType, ScoredResource};

const DEFAULT_CATALOG: &str = include_str!("../../data/resources.json");

/// The catalog shipped with the binary
pub fn default_catalog() -> Result<Vec<Resource>> {
    serde_json::from_str(DEFAULT_CATALOG).context("Bundled resource catalog is invalid")
}

/// Load a catalog file, or the bundled one when no path is given
pub fn load_catalog(path: Option<&Path>) -> Result<Vec<Resource>> {
    let Some(path) = path else {
        return default_catalog();
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read resource catalog: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse resource catalog: {}", path.display()))
}
