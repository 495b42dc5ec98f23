// Request/response types for model providers
//
// Classification only needs single-turn completions, so the request is a
// system prompt plus one user prompt.

use serde::{Deserialize, Serialize};

/// Single-turn completion request
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// System prompt (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// User prompt
    pub prompt: String,

    /// Model name; empty means the provider default
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 to 1.0, optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Mark the system prompt as cacheable
    #[serde(skip)]
    pub cache_system: bool,
}

impl CompletionRequest {
    /// Create a new request from a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            model: String::new(),
            max_tokens: 500,
            temperature: None,
            cache_system: false,
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Send the system prompt as a cacheable block
    pub fn with_cached_system(mut self, cache: bool) -> Self {
        self.cache_system = cache;
        self
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u32>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u32>,
}

impl Usage {
    /// Share of prompt tokens served from the prompt cache
    pub fn cache_hit_rate(&self) -> f64 {
        let read = self.cache_read_input_tokens.unwrap_or(0) as f64;
        let created = self.cache_creation_input_tokens.unwrap_or(0) as f64;
        let total = read + created + self.input_tokens as f64;
        if total == 0.0 {
            0.0
        } else {
            read / total
        }
    }
}

/// Completion result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Concatenated text blocks
    pub text: String,

    /// Model that generated the response
    pub model: String,

    /// Token usage, when reported
    pub usage: Option<Usage>,

    /// Provider name (e.g., "claude")
    pub provider: String,
}
