//! Translator configuration.
//!
//! Only the reference-count policy changes what gets emitted; everything
//! else here tunes diagnostics.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which reference count keeps storage of structured constructs alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefCountPolicy {
    /// Pin storage with the `ompx_hold` map modifier.
    #[default]
    Hold,
    /// Plain dynamic reference counting.
    NoHold,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TranslatorConfig {
    pub structured_ref_count: RefCountPolicy,
    /// Warn whenever an extension map modifier is emitted.
    pub extension_warnings: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            structured_ref_count: RefCountPolicy::Hold,
            extension_warnings: true,
        }
    }
}

impl TranslatorConfig {
    pub fn with_policy(policy: RefCountPolicy) -> Self {
        Self {
            structured_ref_count: policy,
            ..Self::default()
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|source| ConfigError::Parse { source })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        log::debug!("loaded translator config from {}: {:?}", path.display(), config);
        Ok(config)
    }
}
