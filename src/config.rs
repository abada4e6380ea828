use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Limits and reporting switches shared by every evaluation of a card.
///
/// Missing fields in a config file fall back to the defaults:
///
/// ```
/// use divkit_expr::EvaluatorConfig;
///
/// let config = EvaluatorConfig::from_json(r#"{"max_depth": 32}"#).unwrap();
/// assert_eq!(config.max_depth, 32);
/// assert!(config.warn_on_fallback);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Maximum nesting of AST nodes and custom function calls in one evaluation.
    pub max_depth: usize,
    /// Longest source string accepted by the parser, in characters.
    pub max_expression_length: usize,
    /// Report variable getters that fell back to their default value.
    pub warn_on_fallback: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            max_depth: 256,
            max_expression_length: 16 * 1024,
            warn_on_fallback: true,
        }
    }
}

impl EvaluatorConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
