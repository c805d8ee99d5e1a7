//! Generation settings.

use serde::{Deserialize, Serialize};

/// How migration identifiers are formed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierConvention {
    /// `YYYYMMDDHHMMSS` values.
    #[default]
    Timestamp,
    /// Small increasing integers.
    Sequential,
}

/// Settings for one generation run.
///
/// Passed explicitly to every call; nothing is read from global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Emit lossy column changes instead of failing.
    pub force: bool,
    /// Identifier convention.
    pub convention: IdentifierConvention,
    /// Longest file name a migration may get, extension included.
    pub max_file_name_len: usize,
    /// Migration file extension, without the dot.
    pub file_extension: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            force: false,
            convention: IdentifierConvention::Timestamp,
            max_file_name_len: 255,
            file_extension: "sql".to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts lossy changes.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Sets the identifier convention.
    #[must_use]
    pub fn convention(mut self, convention: IdentifierConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Sets the file name length limit.
    #[must_use]
    pub fn max_file_name_len(mut self, len: usize) -> Self {
        self.max_file_name_len = len;
        self
    }

    /// Sets the file extension.
    #[must_use]
    pub fn file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }
}
