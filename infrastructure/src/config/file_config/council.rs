//! Round loop configuration from TOML (`[council]` section)

use council_application::CouncilParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw `[council]` section
///
/// # Example
///
/// ```toml
/// [council]
/// max_rounds = 3
/// score_threshold = 90
/// worker_timeout_secs = 120
/// judge_timeout_secs = 180
/// streaming = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCouncilConfig {
    pub max_rounds: u32,
    /// Judge score (0-100) at or above which the session finalizes
    pub score_threshold: u32,
    pub worker_timeout_secs: u64,
    pub judge_timeout_secs: u64,
    /// Stream worker drafts chunk by chunk
    pub streaming: bool,
}

impl Default for FileCouncilConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            score_threshold: 90,
            worker_timeout_secs: 120,
            judge_timeout_secs: 180,
            streaming: true,
        }
    }
}

impl FileCouncilConfig {
    pub(super) fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.max_rounds == 0 {
            issues.push("council.max_rounds must be at least 1".to_string());
        }
        if self.score_threshold > 100 {
            issues.push(format!(
                "council.score_threshold must be between 0 and 100 (got {})",
                self.score_threshold
            ));
        }
        if self.worker_timeout_secs == 0 {
            issues.push("council.worker_timeout_secs must be greater than 0".to_string());
        }
        if self.judge_timeout_secs == 0 {
            issues.push("council.judge_timeout_secs must be greater than 0".to_string());
        }
        issues
    }

    /// Convert to application parameters. Call after validation.
    pub fn to_params(&self) -> CouncilParams {
        CouncilParams::default()
            .with_max_rounds(self.max_rounds)
            .with_score_threshold(self.score_threshold.min(100) as u8)
            .with_worker_timeout(Some(Duration::from_secs(self.worker_timeout_secs)))
            .with_judge_timeout(Some(Duration::from_secs(self.judge_timeout_secs)))
            .with_streaming(self.streaming)
    }
}
