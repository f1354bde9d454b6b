//! Council parameters: round loop control.
//!
//! [`CouncilParams`] groups the static parameters that control the round loop
//! in [`SessionController`](crate::use_cases::session_controller::SessionController):
//! the termination policy, per-call timeouts and whether worker output is
//! streamed.

use council_domain::TerminationPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilParams {
    /// Finalize-or-continue rule applied after each round
    pub policy: TerminationPolicy,
    /// Timeout for a single worker draft. A worker that exceeds it gets the
    /// failure sentinel as its draft.
    pub worker_timeout: Option<Duration>,
    /// Timeout for the judge call. Exceeding it yields a fail-soft verdict.
    pub judge_timeout: Option<Duration>,
    /// Request incremental delivery from the gateway for worker drafts
    pub streaming: bool,
}

impl Default for CouncilParams {
    fn default() -> Self {
        Self {
            policy: TerminationPolicy::default(),
            worker_timeout: Some(Duration::from_secs(120)),
            judge_timeout: Some(Duration::from_secs(180)),
            streaming: true,
        }
    }
}

impl CouncilParams {
    // ==================== Builder Methods ====================

    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.policy.max_rounds = max;
        self
    }

    pub fn with_score_threshold(mut self, threshold: u8) -> Self {
        self.policy.score_threshold = threshold;
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.worker_timeout = timeout;
        self
    }

    pub fn with_judge_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.judge_timeout = timeout;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn max_rounds(&self) -> u32 {
        self.policy.max_rounds
    }
}
