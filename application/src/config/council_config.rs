//! Council configuration container.
//!
//! [`CouncilConfig`] groups everything the round orchestrator needs to know
//! about *who* debates and *how*: the worker roster, the judge persona, the
//! models they run on, and the loop parameters. It is set at initialization
//! and stays static for the life of the process.

use crate::config::CouncilParams;
use council_domain::{JudgePersona, ModelConfig, Roster};

#[derive(Debug, Clone, Default)]
pub struct CouncilConfig {
    roster: Roster,
    judge: JudgePersona,
    models: ModelConfig,
    params: CouncilParams,
}

impl CouncilConfig {
    pub fn new(
        roster: Roster,
        judge: JudgePersona,
        models: ModelConfig,
        params: CouncilParams,
    ) -> Self {
        Self {
            roster,
            judge,
            models,
            params,
        }
    }

    // ==================== Accessors ====================

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn judge(&self) -> &JudgePersona {
        &self.judge
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    pub fn params(&self) -> &CouncilParams {
        &self.params
    }

    // ==================== Builder Methods ====================

    pub fn with_roster(mut self, roster: Roster) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_models(mut self, models: ModelConfig) -> Self {
        self.models = models;
        self
    }

    pub fn with_params(mut self, params: CouncilParams) -> Self {
        self.params = params;
        self
    }

    /// Upper bound on external calls in one turn: (worker calls, judge calls)
    pub fn call_budget(&self) -> (usize, usize) {
        self.params.policy.call_budget(self.roster.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::Model;

    #[test]
    fn test_default_council() {
        let config = CouncilConfig::default();
        assert_eq!(config.roster().len(), 3);
        assert_eq!(config.models().worker, Model::Gpt4oMini);
        assert_eq!(config.models().judge, Model::Gpt5);
        assert_eq!(config.call_budget(), (9, 3));
    }

    #[test]
    fn test_builder_overrides_params() {
        let config =
            CouncilConfig::default().with_params(CouncilParams::default().with_max_rounds(5));
        assert_eq!(config.call_budget(), (15, 5));
    }
}
