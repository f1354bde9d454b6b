//! Output formatter trait

use council_application::SessionOutcome;
use council_domain::OutputFormat;

/// Trait for formatting council results
pub trait OutputFormatter {
    /// Every round's drafts and verdicts, then the final synthesis
    fn format(&self, outcome: &SessionOutcome) -> String;

    /// Format as JSON
    fn format_json(&self, outcome: &SessionOutcome) -> String;

    /// Format synthesis only (concise output)
    fn format_synthesis_only(&self, outcome: &SessionOutcome) -> String;

    fn render(&self, outcome: &SessionOutcome, format: OutputFormat) -> String {
        match format {
            OutputFormat::Full => self.format(outcome),
            OutputFormat::Synthesis => self.format_synthesis_only(outcome),
            OutputFormat::Json => self.format_json(outcome),
        }
    }
}
