//! REPL (Read-Eval-Print Loop) for interactive chat
//!
//! The first line opens a session; every later line is a follow-up on the
//! concluded session, so the previous synthesis carries forward as
//! background. `/new` drops the session and starts over.
//!
//! A session whose turn was cancelled or failed stays in flight and would
//! only ever resume its stored question. New text therefore never goes to
//! it: `/retry` resumes the interrupted question, anything else starts a
//! fresh session.

use crate::output::console::ConsoleFormatter;
use crate::output::formatter::OutputFormatter;
use crate::progress::reporter::ProgressReporter;
use colored::Colorize;
use council_application::{
    CouncilEvent, CouncilEventSink, GetHistoryUseCase, LlmGateway, NoEvents, SessionController,
    SessionRepository,
};
use council_domain::{OutputFormat, SessionId};
use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

const HISTORY_CAPACITY: usize = 1000;

/// A slash command typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Quit,
    Help,
    New,
    Retry,
    History,
    Session,
    Unknown(String),
}

impl ChatCommand {
    /// Parse a line starting with `/`; `None` for anything else
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }
        Some(match line {
            "/quit" | "/exit" | "/q" => ChatCommand::Quit,
            "/help" | "/h" | "/?" => ChatCommand::Help,
            "/new" | "/reset" => ChatCommand::New,
            "/retry" => ChatCommand::Retry,
            "/history" => ChatCommand::History,
            "/session" => ChatCommand::Session,
            other => ChatCommand::Unknown(other.to_string()),
        })
    }
}

/// A turn that stopped before consensus
#[derive(Debug, Clone, PartialEq, Eq)]
struct Interrupted {
    session: SessionId,
    question: String,
}

/// Forwards events and remembers which session a round started on
struct SessionTracker {
    inner: Arc<dyn CouncilEventSink>,
    session: Mutex<Option<SessionId>>,
}

impl SessionTracker {
    fn new(inner: Arc<dyn CouncilEventSink>) -> Self {
        Self {
            inner,
            session: Mutex::new(None),
        }
    }

    fn session(&self) -> Option<SessionId> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CouncilEventSink for SessionTracker {
    fn emit(&self, event: CouncilEvent) {
        if let CouncilEvent::RoundStarted { session_id, .. } = &event {
            *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(*session_id);
        }
        self.inner.emit(event);
    }
}

/// Interactive chat REPL
pub struct ChatRepl<G: LlmGateway + 'static, R: SessionRepository + 'static> {
    controller: Arc<SessionController<G, R>>,
    history: GetHistoryUseCase<R>,
    formatter: ConsoleFormatter,
    format: OutputFormat,
    show_progress: bool,
    history_file: Option<PathBuf>,
    /// Concluded session that the next question follows up on
    session: Option<SessionId>,
    interrupted: Option<Interrupted>,
}

impl<G: LlmGateway + 'static, R: SessionRepository + 'static> ChatRepl<G, R> {
    pub fn new(controller: Arc<SessionController<G, R>>, repository: Arc<R>) -> Self {
        let formatter = ConsoleFormatter::new(controller.config().roster().clone());
        Self {
            controller,
            history: GetHistoryUseCase::new(repository),
            formatter,
            format: OutputFormat::Synthesis,
            show_progress: true,
            history_file: dirs::data_dir().map(|p| p.join("debate-council").join("history.txt")),
            session: None,
            interrupted: None,
        }
    }

    /// Set whether to show progress
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Continue an existing session instead of starting fresh
    pub fn with_session(mut self, session: Option<SessionId>) -> Self {
        self.session = session;
        self
    }

    fn line_editor(&self) -> Reedline {
        let editor = Reedline::create();
        let Some(path) = &self.history_file else {
            return editor;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match FileBackedHistory::with_file(HISTORY_CAPACITY, path.clone()) {
            Ok(history) => editor.with_history(Box::new(history)),
            Err(e) => {
                tracing::debug!("Chat history unavailable: {}", e);
                editor
            }
        }
    }

    /// Run the interactive REPL
    pub async fn run(&mut self) -> std::io::Result<()> {
        let mut editor = self.line_editor();
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic("council".to_string()),
            DefaultPromptSegment::Empty,
        );

        self.print_welcome();

        loop {
            match editor.read_line(&prompt)? {
                Signal::Success(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    if let Some(command) = ChatCommand::parse(line) {
                        if self.handle_command(command).await {
                            break;
                        }
                        continue;
                    }

                    self.process_question(line).await;
                }
                Signal::CtrlC => {
                    println!("^C");
                    continue;
                }
                Signal::CtrlD => {
                    println!("Bye!");
                    break;
                }
            }
        }

        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("╭─────────────────────────────────────────────╮");
        println!("│          Debate Council - Chat Mode         │");
        println!("╰─────────────────────────────────────────────╯");
        println!();
        println!(
            "Council: {}",
            self.controller
                .config()
                .roster()
                .iter()
                .map(|p| p.label())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("Judge:   {}", self.controller.config().judge().name);
        println!();
        Self::print_help();
    }

    fn print_help() {
        println!("Commands:");
        println!("  /new             - Start a fresh session");
        println!("  /retry           - Resume an interrupted question");
        println!("  /session         - Show the current session");
        println!("  /history         - List concluded sessions");
        println!("  /help, /h, /?    - Show this help");
        println!("  /quit, /exit, /q - Exit chat");
        println!();
        println!("Anything else is a question; later questions follow up on the last answer.");
        println!();
    }

    /// Handle slash commands. Returns true if should exit.
    async fn handle_command(&mut self, command: ChatCommand) -> bool {
        match command {
            ChatCommand::Quit => {
                println!("Bye!");
                return true;
            }
            ChatCommand::Help => Self::print_help(),
            ChatCommand::New => {
                self.session = None;
                self.interrupted = None;
                println!("{}", "Started a fresh session.".dimmed());
            }
            ChatCommand::Retry => {
                let cancel = CancellationToken::new();
                let watcher = cancel_on_ctrl_c(&cancel);
                self.retry(&cancel).await;
                watcher.abort();
            }
            ChatCommand::Session => match self
                .session
                .or(self.interrupted.as_ref().map(|i| i.session))
            {
                Some(id) => match self.history.session_detail(id).await {
                    Ok(detail) => println!("{}", self.formatter.format_detail(&detail)),
                    Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
                },
                None => println!("{}", "No session yet.".dimmed()),
            },
            ChatCommand::History => match self.history.execute().await {
                Ok(entries) => println!("{}", ConsoleFormatter::format_history(&entries)),
                Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
            },
            ChatCommand::Unknown(cmd) => {
                println!("Unknown command: {}", cmd);
                println!("Type /help for available commands");
            }
        }
        false
    }

    async fn process_question(&mut self, question: &str) {
        // Ctrl-C cancels the running session rather than the whole REPL
        let cancel = CancellationToken::new();
        let watcher = cancel_on_ctrl_c(&cancel);
        self.answer(question, &cancel).await;
        watcher.abort();
    }

    /// Ask `question` as a follow-up of the concluded session, or in a fresh one
    async fn answer(&mut self, question: &str, cancel: &CancellationToken) {
        if let Some(interrupted) = self.interrupted.take() {
            println!(
                "{}",
                format!(
                    "Session #{} stays unfinished; starting a fresh session.",
                    interrupted.session
                )
                .dimmed()
            );
        }
        self.run_turn(question, self.session, cancel).await;
    }

    /// Resume the interrupted question on its own session
    async fn retry(&mut self, cancel: &CancellationToken) {
        match self.interrupted.take() {
            Some(Interrupted { session, question }) => {
                self.run_turn(&question, Some(session), cancel).await;
            }
            None => println!("{}", "Nothing to retry.".dimmed()),
        }
    }

    async fn run_turn(
        &mut self,
        question: &str,
        session: Option<SessionId>,
        cancel: &CancellationToken,
    ) {
        println!();

        let inner: Arc<dyn CouncilEventSink> = if self.show_progress {
            Arc::new(ProgressReporter::new(self.controller.config().roster()))
        } else {
            Arc::new(NoEvents)
        };
        let tracker = Arc::new(SessionTracker::new(inner));
        let sink: Arc<dyn CouncilEventSink> = tracker.clone();

        let result = self
            .controller
            .run_session(question, session, sink, cancel)
            .await;

        match result {
            Ok(outcome) => {
                self.session = Some(outcome.session.id);
                println!("{}", self.formatter.render(&outcome, self.format));
            }
            Err(e) => {
                if e.is_cancelled() {
                    println!("{}", "Cancelled.".yellow());
                } else {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
                // A round that started left its session in flight
                if let Some(id) = tracker.session() {
                    self.session = None;
                    self.interrupted = Some(Interrupted {
                        session: id,
                        question: question.to_string(),
                    });
                    println!(
                        "{}",
                        format!(
                            "Session #{} is unfinished. /retry resumes it; \
                             a new question starts a fresh session.",
                            id
                        )
                        .dimmed()
                    );
                }
            }
        }
        println!();
    }
}

fn cancel_on_ctrl_c(cancel: &CancellationToken) -> tokio::task::JoinHandle<()> {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    })
}
