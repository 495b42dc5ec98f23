// Amani - Crisis-aware support service
// Library exports

pub mod analytics;
pub mod audit; // Crisis audit trail
pub mod classifier;
pub mod config;
pub mod crisis;
pub mod errors;
pub mod feedback;
pub mod handoff;
pub mod metrics;
pub mod moderation;
pub mod notify;
pub mod pipeline;
pub mod providers; // Claude API client
pub mod resources;
pub mod server; // HTTP surface
pub mod storage;
