//! Engine configuration.
//!
//! All knobs have defaults, so an empty TOML document is a valid config:
//!
//! ```toml
//! determinize = true
//! max_dfa_states = 10000
//! max_quantifier = 100
//! max_expansion = 10000
//! shell_cache_min_runes = 4096
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

/// Tuning for compilation and publishing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Try to publish a DFA instead of the merged NFA.
    pub determinize: bool,
    /// Give up on determinizing past this many DFA states and publish the NFA.
    pub max_dfa_states: usize,
    /// Largest bound accepted in a `{m,n}` quantifier.
    pub max_quantifier: u32,
    /// Most atom copies a regexp may unroll to across nested repetitions.
    pub max_expansion: u32,
    /// Rune ranges covering at least this many code points are built once
    /// into a shared template.
    pub shell_cache_min_runes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            determinize: true,
            max_dfa_states: 10_000,
            max_quantifier: 100,
            max_expansion: 10_000,
            shell_cache_min_runes: 4_096,
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML, filling unspecified fields with defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dfa_states == 0 {
            return Err(ConfigError::Invalid {
                message: "max_dfa_states must be at least 1".into(),
            });
        }
        if self.max_quantifier == 0 {
            return Err(ConfigError::Invalid {
                message: "max_quantifier must be at least 1".into(),
            });
        }
        if self.max_expansion == 0 {
            return Err(ConfigError::Invalid {
                message: "max_expansion must be at least 1".into(),
            });
        }
        Ok(())
    }
}
