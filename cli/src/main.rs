//! CLI entrypoint for debate-council
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result};
use clap::Parser;
use council_application::{
    ConversationLogger, CouncilEventSink, GetHistoryUseCase, NoConversationLogger, NoEvents,
    SessionController,
};
use council_domain::{OutputFormat, Roster, SessionId};
use council_infrastructure::{
    AnyRepository, ConfigLoader, FileConfig, JsonlConversationLogger, OpenAiGateway,
    StorageBackend,
};
use council_presentation::{
    AppState, ChatRepl, Cli, Command, ConsoleFormatter, OutputFormatter, ProgressReporter,
    SimpleProgress, StorageChoice,
};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_deref());

    if cli.show_config {
        for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("{}", line);
        }
        return Ok(());
    }

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };
    apply_overrides(&mut config, &cli);
    let council = config.to_council_config()?;

    if !config.output.color {
        colored::control::set_override(false);
    }
    let format: OutputFormat = cli
        .output
        .map(Into::into)
        .or(config.output.format)
        .unwrap_or_default();

    info!("Starting debate council");

    // === Dependency Injection ===
    let repository = Arc::new(
        AnyRepository::from_config(&config.storage).context("opening session storage")?,
    );
    info!("Session storage: {}", repository.backend_name());

    let command = cli.command.clone().unwrap_or(Command::Chat);

    if let Command::History { session } = command {
        return show_history(repository, council.roster().clone(), session, format).await;
    }

    let gateway = Arc::new(
        OpenAiGateway::from_env(&config.provider.api_key_env)?
            .with_base_url(&config.provider.base_url),
    );
    let conversation_logger: Arc<dyn ConversationLogger> =
        match config.logging.conversation_log.as_deref() {
            Some(path) => match JsonlConversationLogger::open(path) {
                Some(logger) => {
                    info!("Transcript: {}", logger.path().display());
                    Arc::new(logger)
                }
                None => Arc::new(NoConversationLogger),
            },
            None => Arc::new(NoConversationLogger),
        };

    let controller = Arc::new(
        SessionController::new(gateway, Arc::clone(&repository), council.clone())
            .with_conversation_logger(conversation_logger),
    );

    match command {
        Command::Ask { query, session } => {
            let sink = progress_sink(cli.quiet, format, council.roster());
            let cancel = cancel_on_ctrl_c();

            let outcome = controller
                .run_session(&query, session.map(SessionId::new), sink, &cancel)
                .await?;

            let formatter = ConsoleFormatter::new(council.roster().clone());
            println!("{}", formatter.render(&outcome, format));
        }
        Command::Chat => {
            if repository.backend_name() == "memory" {
                info!("Sessions live only for this chat; use --storage sqlite to keep them");
            }
            let mut repl = ChatRepl::new(controller, repository)
                .with_progress(!cli.quiet)
                .with_format(format);
            repl.run().await?;
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let shutdown = cancel_on_ctrl_c();
            let state = Arc::new(AppState::new(controller, repository, shutdown));
            council_presentation::serve(state, &bind).await?;
        }
        Command::History { .. } => {}
    }

    Ok(())
}

/// Initialize logging based on verbosity level; `RUST_LOG` takes precedence
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "council.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    guard
}

/// CLI flags win over every configuration source
fn apply_overrides(config: &mut FileConfig, cli: &Cli) {
    if let Some(max_rounds) = cli.max_rounds {
        config.council.max_rounds = max_rounds;
    }
    if let Some(threshold) = cli.threshold {
        config.council.score_threshold = threshold;
    }
    if cli.no_stream {
        config.council.streaming = false;
    }
    if let Some(model) = &cli.worker_model {
        config.models.worker = Some(model.clone());
    }
    if let Some(model) = &cli.judge_model {
        config.models.judge = Some(model.clone());
    }
    if let Some(choice) = cli.storage {
        config.storage.backend = match choice {
            StorageChoice::Memory => StorageBackend::Memory,
            StorageChoice::Sqlite => StorageBackend::Sqlite,
        };
    }
    if let Some(db) = &cli.db {
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = Some(db.clone());
    }
    if let Some(path) = &cli.transcript {
        config.logging.conversation_log = Some(path.clone());
    }
}

fn progress_sink(quiet: bool, format: OutputFormat, roster: &Roster) -> Arc<dyn CouncilEventSink> {
    if quiet || format == OutputFormat::Json {
        Arc::new(NoEvents)
    } else if std::io::stderr().is_terminal() {
        Arc::new(ProgressReporter::new(roster))
    } else {
        Arc::new(SimpleProgress)
    }
}

/// A token cancelled by the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping the current round");
            cancel.cancel();
        }
    });
    token
}

async fn show_history(
    repository: Arc<AnyRepository>,
    roster: Roster,
    session: Option<i64>,
    format: OutputFormat,
) -> Result<()> {
    let history = GetHistoryUseCase::new(repository);

    match session {
        Some(id) => {
            let detail = history.session_detail(SessionId::new(id)).await?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                println!("{}", ConsoleFormatter::new(roster).format_detail(&detail));
            }
        }
        None => {
            let entries = history.execute().await?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{}", ConsoleFormatter::format_history(&entries));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "council",
            "--max-rounds",
            "5",
            "--judge-model",
            "gpt-4.1",
            "--db",
            "/tmp/council.db",
            "--no-stream",
            "chat",
        ]);
        let mut config = FileConfig::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.council.max_rounds, 5);
        assert_eq!(config.models.judge.as_deref(), Some("gpt-4.1"));
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(!config.council.streaming);
        // untouched
        assert_eq!(config.council.score_threshold, 90);
    }
}
