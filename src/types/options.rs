//! Generation parameter types

use serde::{Deserialize, Serialize};

/// Sampling parameters for a single generation.
///
/// Absent fields are resolved to engine defaults at the engine boundary,
/// but participate in cache fingerprinting as-is (absent ≠ default), so
/// an explicit value and an omitted one are cache-distinct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Sampling temperature. Higher values make output more random.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerationOptions {
    /// Create options with no overrides (engine defaults apply).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}
