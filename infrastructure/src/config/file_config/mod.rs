//! Raw TOML configuration data types
//!
//! These structs mirror the config file one-to-one. Conversion into
//! application types happens in [`FileConfig::to_council_config`], after
//! [`FileConfig::validate`] has accepted the whole file.

mod council;
mod models;
mod output;
mod provider;

pub use council::FileCouncilConfig;
pub use models::FileModelsConfig;
pub use output::{FileOutputConfig, FileOutputFormat};
pub use provider::{
    FileLoggingConfig, FileProviderConfig, FileServerConfig, FileStorageConfig, StorageBackend,
};

use super::ConfigError;
use council_application::CouncilConfig;
use council_domain::{JudgePersona, Persona, Roster};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Round loop settings
    pub council: FileCouncilConfig,
    /// Role-based model selection
    pub models: FileModelsConfig,
    pub provider: FileProviderConfig,
    pub storage: FileStorageConfig,
    pub server: FileServerConfig,
    pub logging: FileLoggingConfig,
    pub output: FileOutputConfig,
    /// Custom judge persona; the Chief Editor when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgePersona>,
    /// Custom worker roster (`[[workers]]`); the default council when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<Vec<Persona>>,
}

impl FileConfig {
    /// Validate the entire configuration, returning every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.council.issues());
        issues.extend(self.models.issues());

        if let Some(workers) = &self.workers
            && let Err(e) = Roster::new(workers.clone())
        {
            issues.push(format!("workers: {}", e));
        }
        if let Some(judge) = &self.judge
            && judge.instruction.trim().is_empty()
        {
            issues.push("judge.instruction cannot be empty".to_string());
        }
        if self.provider.base_url.trim().is_empty() {
            issues.push("provider.base_url cannot be empty".to_string());
        }

        issues
    }

    /// Build the application configuration, rejecting an invalid file.
    pub fn to_council_config(&self) -> Result<CouncilConfig, ConfigError> {
        let issues = self.validate();
        if !issues.is_empty() {
            return Err(ConfigError::Invalid(issues));
        }

        let roster = match &self.workers {
            Some(workers) => {
                Roster::new(workers.clone()).map_err(|e| ConfigError::Invalid(vec![e.to_string()]))?
            }
            None => Roster::default_council(),
        };

        Ok(CouncilConfig::new(
            roster,
            self.judge.clone().unwrap_or_default(),
            self.models.to_model_config(),
            self.council.to_params(),
        ))
    }
}
