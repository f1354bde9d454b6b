//! Live rendering of council events

use colored::Colorize;
use council_application::{CouncilEvent, CouncilEventSink};
use council_domain::{RoundDecision, Roster, WorkerId};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);
const PREVIEW_CHARS: usize = 60;

#[derive(Default)]
struct Bars {
    workers: HashMap<WorkerId, (ProgressBar, usize)>,
    judge: Option<ProgressBar>,
}

/// Reports progress with one spinner per worker and one for the judge
pub struct ProgressReporter {
    multi: MultiProgress,
    labels: HashMap<WorkerId, String>,
    order: Vec<WorkerId>,
    bars: Mutex<Bars>,
}

impl ProgressReporter {
    pub fn new(roster: &Roster) -> Self {
        Self::with_target(roster, ProgressDrawTarget::stderr())
    }

    fn with_target(roster: &Roster, target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            labels: roster.iter().map(|p| (p.id.clone(), p.name.clone())).collect(),
            order: roster.ids(),
            bars: Mutex::new(Bars::default()),
        }
    }

    fn bars(&self) -> MutexGuard<'_, Bars> {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn spinner(&self, prefix: String, message: &'static str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(prefix);
        pb.set_message(message);
        pb.enable_steady_tick(TICK);
        pb
    }

    fn label(&self, id: &WorkerId) -> String {
        self.labels
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }

    fn start_round(&self, round: u32, turn: u32) {
        let title = if turn > 1 {
            format!("Turn {} · Round {}", turn, round)
        } else {
            format!("Round {}", round)
        };
        self.println(format!("{} {}", "->".cyan(), title.bold()));

        let mut bars = self.bars();
        bars.workers = self
            .order
            .iter()
            .map(|id| (id.clone(), (self.spinner(self.label(id), "drafting..."), 0)))
            .collect();
    }

    fn chunk(&self, worker_id: &WorkerId, chunk: &str) {
        let mut bars = self.bars();
        if let Some((pb, chars)) = bars.workers.get_mut(worker_id) {
            *chars += chunk.chars().count();
            let preview: String = chunk
                .lines()
                .last()
                .unwrap_or_default()
                .chars()
                .take(PREVIEW_CHARS)
                .collect();
            pb.set_message(format!("{} chars · {}", chars, preview.dimmed()));
        }
    }

    fn worker_done(&self, worker_id: &WorkerId, content: &str, failed: bool) {
        let mut bars = self.bars();
        if let Some((pb, _)) = bars.workers.remove(worker_id) {
            if failed {
                pb.finish_with_message(format!("{} failed", "x".red()));
            } else {
                pb.finish_with_message(format!(
                    "{} {} chars",
                    "v".green(),
                    content.chars().count()
                ));
            }
        }
    }

    fn judge_started(&self) {
        let pb = self.spinner("Judge".to_string(), "deliberating...");
        self.bars().judge = Some(pb);
    }

    fn judge_done(&self, score: u8, decision: &RoundDecision) {
        if let Some(pb) = self.bars().judge.take() {
            pb.finish_with_message(format!("score {}/100", score));
        }
        match decision {
            RoundDecision::Finalize { reason, .. } => {
                self.println(format!("   {} {}", "consensus:".green(), reason));
            }
            RoundDecision::Continue { critique, .. } if !critique.is_empty() => {
                self.println(format!("   {} {}", "critique:".yellow(), critique.dimmed()));
            }
            RoundDecision::Continue { .. } => {}
        }
    }

    fn clear(&self) {
        let mut bars = self.bars();
        for (_, (pb, _)) in bars.workers.drain() {
            pb.abandon();
        }
        if let Some(pb) = bars.judge.take() {
            pb.abandon();
        }
    }
}

impl CouncilEventSink for ProgressReporter {
    fn emit(&self, event: CouncilEvent) {
        match event {
            CouncilEvent::SessionCreated { session_id, .. } => {
                self.println(format!("{}", format!("Session #{}", session_id).dimmed()));
            }
            CouncilEvent::RoundStarted { turn, round, .. } => self.start_round(round, turn),
            CouncilEvent::WorkerChunk { worker_id, chunk } => self.chunk(&worker_id, &chunk),
            CouncilEvent::WorkerComplete {
                worker_id,
                content,
                failed,
            } => self.worker_done(&worker_id, &content, failed),
            CouncilEvent::WorkersComplete { .. } => {}
            CouncilEvent::JudgeThinking { .. } => self.judge_started(),
            CouncilEvent::JudgeResult {
                evaluation,
                decision,
                ..
            } => self.judge_done(evaluation.score, &decision),
            CouncilEvent::Consensus { rounds, score, .. } => {
                self.println(format!(
                    "{} after {} round(s), score {}/100\n",
                    "Consensus reached".green().bold(),
                    rounds,
                    score
                ));
            }
            CouncilEvent::Error { message } => {
                self.clear();
                self.println(format!("{} {}", "Error:".red().bold(), message));
            }
        }
    }
}

/// Simple text-based progress (no fancy UI), one line per event on stderr
pub struct SimpleProgress;

impl SimpleProgress {
    /// The line printed for `event`, if any
    pub fn describe(event: &CouncilEvent) -> Option<String> {
        match event {
            CouncilEvent::SessionCreated { session_id, .. } => {
                Some(format!("session #{} created", session_id))
            }
            CouncilEvent::RoundStarted { turn, round, .. } => {
                Some(format!("-> turn {} round {}", turn, round))
            }
            CouncilEvent::WorkerChunk { .. } | CouncilEvent::WorkersComplete { .. } => None,
            CouncilEvent::WorkerComplete {
                worker_id, failed, ..
            } => Some(if *failed {
                format!("  x {} (failed)", worker_id)
            } else {
                format!("  v {}", worker_id)
            }),
            CouncilEvent::JudgeThinking { .. } => Some("  judge deliberating".to_string()),
            CouncilEvent::JudgeResult { evaluation, .. } => {
                Some(format!("  judge score {}/100", evaluation.score))
            }
            CouncilEvent::Consensus { rounds, .. } => {
                Some(format!("consensus after {} round(s)", rounds))
            }
            CouncilEvent::Error { message } => Some(format!("error: {}", message)),
        }
    }
}

impl CouncilEventSink for SimpleProgress {
    fn emit(&self, event: CouncilEvent) {
        if let Some(line) = Self::describe(&event) {
            eprintln!("{}", line);
        }
    }
}
