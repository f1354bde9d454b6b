//! Role-based model configuration.
//!
//! [`ModelConfig`] groups the model selections for the two council roles.
//! This is a static value object; once created, models don't change at runtime.

use crate::core::model::Model;
use serde::{Deserialize, Serialize};

/// Role-based model configuration.
///
/// - **Worker**: model every worker persona drafts with (fast, cheap)
/// - **Judge**: model that scores, critiques, and synthesizes
///
/// # Example
///
/// ```
/// use council_domain::core::model_config::ModelConfig;
/// use council_domain::Model;
///
/// let config = ModelConfig::default().with_judge(Model::Gpt41);
/// assert_eq!(config.judge, Model::Gpt41);
/// assert_eq!(config.worker, Model::Gpt4oMini);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model for worker drafts.
    pub worker: Model,
    /// Model for the judge.
    pub judge: Model,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            worker: Model::default_worker(),
            judge: Model::default_judge(),
        }
    }
}

impl ModelConfig {
    pub fn with_worker(mut self, model: Model) -> Self {
        self.worker = model;
        self
    }

    pub fn with_judge(mut self, model: Model) -> Self {
        self.judge = model;
        self
    }
}
