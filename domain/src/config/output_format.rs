//! Output format value object

use serde::{Deserialize, Serialize};

/// Output format for council results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Every round's drafts and verdicts
    Full,
    /// Only the final synthesis (default)
    #[default]
    Synthesis,
    /// JSON output
    Json,
}
