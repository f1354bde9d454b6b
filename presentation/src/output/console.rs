//! Console output formatter for council results

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use council_application::{RoundReport, SessionOutcome};
use council_domain::{
    Draft, Evaluation, HistoryEntry, RoundDecision, Roster, SessionDetail, WorkerId,
};

/// Formats council results for console display
pub struct ConsoleFormatter {
    roster: Roster,
}

impl ConsoleFormatter {
    /// Drafts are labelled with the personas of `roster`
    pub fn new(roster: Roster) -> Self {
        Self { roster }
    }

    fn worker_label(&self, id: &WorkerId) -> String {
        self.roster
            .get(id)
            .map(|p| p.label())
            .unwrap_or_else(|| id.to_string())
    }

    fn format_drafts(&self, output: &mut String, drafts: &[Draft]) {
        for draft in drafts {
            let title = format!("── {} ──", self.worker_label(&draft.worker_id));
            let title = if draft.is_failure() {
                title.red().bold()
            } else {
                title.yellow().bold()
            };
            output.push_str(&format!("\n{}\n{}\n", title, draft.content));
        }
    }

    fn format_evaluation(output: &mut String, evaluation: &Evaluation) {
        output.push_str(&format!(
            "\n{} {}\n",
            "Judge score:".cyan().bold(),
            Self::score(evaluation.score)
        ));
        if !evaluation.critique.is_empty() {
            output.push_str(&format!(
                "{}\n{}\n",
                "Critique:".cyan().bold(),
                Self::indent(&evaluation.critique, "  ")
            ));
        }
    }

    fn format_round(&self, output: &mut String, report: &RoundReport) {
        output.push_str(&Self::section_header(&format!(
            "Turn {} · Round {}",
            report.turn, report.round
        )));
        self.format_drafts(output, &report.drafts);
        Self::format_evaluation(output, &report.evaluation);
        output.push_str(&format!("{}\n", Self::describe_decision(&report.decision)));
    }

    /// One-line summary of a round decision
    pub fn describe_decision(decision: &RoundDecision) -> String {
        match decision {
            RoundDecision::Finalize { reason, .. } => {
                format!("{} {}", "Consensus:".green().bold(), reason)
            }
            RoundDecision::Continue { next_round, .. } => format!(
                "{} round {}",
                "Continuing:".yellow().bold(),
                next_round
            ),
        }
    }

    /// Concluded sessions as a table, newest first
    pub fn format_history(entries: &[HistoryEntry]) -> String {
        if entries.is_empty() {
            return format!("{}\n", "No concluded sessions yet.".dimmed());
        }

        let mut output = Self::header("Council History");
        output.push('\n');
        for entry in entries {
            output.push_str(&format!(
                "\n{} {}  {}  {}\n  {}\n",
                format!("#{}", entry.id).bold(),
                entry.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                Self::score(entry.score),
                entry.query,
                Self::truncate(&entry.final_synthesis, 100).dimmed()
            ));
        }
        output
    }

    /// Every turn and round a session has stored
    pub fn format_detail(&self, detail: &SessionDetail) -> String {
        let session = &detail.session;
        let mut output = Self::header(&format!("Session #{}", session.id));
        output.push('\n');
        output.push_str(&format!(
            "{} {}\n{} {} (turn {}, round {}/{})\n",
            "Question:".cyan().bold(),
            session.query,
            "Status:".cyan().bold(),
            session.status,
            session.turn,
            session.current_round,
            session.max_rounds
        ));
        if let Some(background) = &session.background {
            output.push_str(&format!(
                "{}\n{}\n",
                "Background:".cyan().bold(),
                Self::indent(background, "  ").dimmed()
            ));
        }

        for evaluation in &detail.evaluations {
            output.push_str(&Self::section_header(&format!(
                "Turn {} · Round {}",
                evaluation.turn, evaluation.round
            )));
            let drafts: Vec<Draft> = detail
                .drafts
                .iter()
                .filter(|d| d.key() == evaluation.key())
                .cloned()
                .collect();
            self.format_drafts(&mut output, &drafts);
            Self::format_evaluation(&mut output, evaluation);
        }

        if let Some(answer) = &session.final_consensus {
            output.push_str(&Self::section_header("Final Synthesis"));
            output.push_str(&format!("\n{}\n", answer));
        }
        output.push_str(&Self::footer());
        output
    }

    fn score(score: u8) -> String {
        let text = format!("{:>3}/100", score);
        match score {
            90.. => text.green().bold().to_string(),
            60..=89 => text.yellow().to_string(),
            _ => text.red().to_string(),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn truncate(text: &str, max_chars: usize) -> String {
        let first_line = text.lines().next().unwrap_or_default();
        if first_line.chars().count() <= max_chars && !text.contains('\n') {
            return first_line.to_string();
        }
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, outcome: &SessionOutcome) -> String {
        let mut output = Self::header("Council Results");
        output.push('\n');
        output.push_str(&format!(
            "{} {}\n",
            "Question:".cyan().bold(),
            outcome.session.query
        ));
        output.push_str(&format!(
            "{} {}\n",
            "Council:".cyan().bold(),
            self.roster
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        for report in &outcome.rounds {
            self.format_round(&mut output, report);
        }

        output.push_str(&Self::section_header("Final Synthesis"));
        output.push_str(&format!(
            "\n{}\n",
            outcome.final_synthesis().unwrap_or_default()
        ));
        output.push_str(&Self::footer());
        output
    }

    fn format_json(&self, outcome: &SessionOutcome) -> String {
        serde_json::to_string_pretty(outcome).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_synthesis_only(&self, outcome: &SessionOutcome) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}\n\n",
            "=== Council Conclusion ===".cyan().bold()
        ));
        output.push_str(&format!("{} {}\n\n", "Q:".bold(), outcome.session.query));

        let rounds = outcome.rounds.last().map_or(0, |r| r.round);
        let score = outcome
            .final_score()
            .map(|s| format!("score {}/100", s))
            .unwrap_or_else(|| "unscored".to_string());
        output.push_str(&format!(
            "{}\n\n",
            format!(
                "Session #{} · {} round(s) · {}",
                outcome.session.id, rounds, score
            )
            .dimmed()
        ));

        output.push_str(outcome.final_synthesis().unwrap_or_default());
        output.push('\n');
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{FinalizeReason, JudgeVerdict, RoundKey, Session, SessionId};

    fn outcome() -> SessionOutcome {
        let id = SessionId::new(3);
        let mut session = Session::new(id, "Is remote work better?", 3);
        session.conclude("Hybrid wins.");

        let key = |round| RoundKey::new(id, 1, round);
        let report = |round, score, decision| RoundReport {
            session_id: id,
            turn: 1,
            round,
            drafts: vec![
                Draft::new(key(round), WorkerId::new("worker-a"), "Risky."),
                Draft::failure(key(round), WorkerId::new("worker-b")),
            ],
            evaluation: Evaluation::from_verdict(
                key(round),
                JudgeVerdict::new(score, "Needs data.", "Hybrid wins.", false),
            ),
            decision,
        };

        SessionOutcome {
            session,
            rounds: vec![
                report(
                    1,
                    55,
                    RoundDecision::Continue {
                        next_round: 2,
                        critique: "Needs data.".to_string(),
                    },
                ),
                report(
                    2,
                    93,
                    RoundDecision::Finalize {
                        synthesis: "Hybrid wins.".to_string(),
                        reason: FinalizeReason::ScoreThreshold,
                    },
                ),
            ],
        }
    }

    #[test]
    fn test_full_output_labels_drafts_with_personas() {
        let formatter = ConsoleFormatter::new(Roster::default_council());
        let text = formatter.format(&outcome());

        assert!(text.contains("The Skeptic (Analyst)"));
        assert!(text.contains("The Visionary (Creative)"));
        assert!(text.contains("Round 2"));
        assert!(text.contains("Needs data."));
        assert!(text.contains("score threshold reached"));
        assert!(text.contains("Hybrid wins."));
    }

    #[test]
    fn test_synthesis_only() {
        let formatter = ConsoleFormatter::new(Roster::default_council());
        let text = formatter.render(&outcome(), council_domain::OutputFormat::Synthesis);

        assert!(text.contains("Is remote work better?"));
        assert!(text.contains("2 round(s)"));
        assert!(text.contains("score 93/100"));
        assert!(text.trim_end().ends_with("Hybrid wins."));
        assert!(!text.contains("Risky."));
    }

    #[test]
    fn test_json_is_parseable() {
        let formatter = ConsoleFormatter::new(Roster::default_council());
        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_json(&outcome())).unwrap();

        assert_eq!(json["session"]["status"], "consensus");
        assert_eq!(json["rounds"].as_array().unwrap().len(), 2);
        assert_eq!(json["rounds"][1]["decision"]["decision"], "finalize");
    }

    #[test]
    fn test_unknown_worker_falls_back_to_id() {
        let formatter = ConsoleFormatter::new(Roster::default_council());
        assert_eq!(formatter.worker_label(&WorkerId::new("ghost")), "ghost");
    }

    #[test]
    fn test_empty_history() {
        assert!(ConsoleFormatter::format_history(&[]).contains("No concluded sessions"));
    }

    #[test]
    fn test_truncate_long_synthesis() {
        let text = "x".repeat(150);
        let cut = ConsoleFormatter::truncate(&text, 100);
        assert_eq!(cut.chars().count(), 101);
        assert_eq!(ConsoleFormatter::truncate("short", 100), "short");
    }
}
