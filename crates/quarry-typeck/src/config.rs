//! Tunables for an inference session.
//!
//! Hosts usually embed these in their own settings file, so every field
//! has a default and a partial table is accepted:
//!
//! ```toml
//! autoderef_limit = 16
//! report_mismatches = false
//! ```

use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Maximum length of a dereference sequence.
    pub autoderef_limit: usize,
    /// Obligations nested deeper than this are dropped.
    pub recursion_limit: u32,
    /// When false, mismatches are still tolerated but not recorded.
    pub report_mismatches: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig { autoderef_limit: 64, recursion_limit: 64, report_mismatches: true }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid inference config: {0}")]
pub struct ConfigError(#[from] toml::de::Error);

impl InferenceConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(content: &str) -> Result<InferenceConfig, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
