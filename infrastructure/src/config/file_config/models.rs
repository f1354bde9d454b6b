//! Role-based model configuration from TOML (`[models]` section)

use council_domain::{Model, ModelConfig};
use serde::{Deserialize, Serialize};

/// Role-based model configuration from TOML
///
/// # Example
///
/// ```toml
/// [models]
/// worker = "gpt-4o-mini"   # every worker persona
/// judge = "gpt-5"          # scoring and synthesis
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelsConfig {
    pub worker: Option<String>,
    pub judge: Option<String>,
}

impl FileModelsConfig {
    pub(super) fn issues(&self) -> Vec<String> {
        [("worker", &self.worker), ("judge", &self.judge)]
            .into_iter()
            .filter(|(_, value)| value.as_deref().is_some_and(|v| v.trim().is_empty()))
            .map(|(field, _)| format!("models.{}: model name cannot be empty", field))
            .collect()
    }

    /// Resolve into a [`ModelConfig`], falling back to the role defaults
    pub fn to_model_config(&self) -> ModelConfig {
        let mut config = ModelConfig::default();
        if let Some(worker) = non_empty(&self.worker) {
            config = config.with_worker(Model::from_name(worker));
        }
        if let Some(judge) = non_empty(&self.judge) {
            config = config.with_judge(Model::from_name(judge));
        }
        config
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
