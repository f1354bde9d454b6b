//! SQLite session repository
//!
//! Schema (version 1):
//!
//! - `sessions`: one row per debate; a CHECK keeps `status = 'consensus'`
//!   and a non-null `final_consensus` in lockstep
//! - `drafts`: UNIQUE `(session_id, turn, round, worker_id)`
//! - `evaluations`: UNIQUE `(session_id, turn, round)`
//!
//! Child rows are removed with their session (`ON DELETE CASCADE`).

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use council_application::{RepositoryError, SessionRepository};
use council_domain::{Draft, Evaluation, RoundKey, Session, SessionId, SessionStatus, WorkerId};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

const SESSION_COLUMNS: &str = "id, query, status, turn, current_round, max_rounds, \
                               final_consensus, background, created_at, updated_at";
const DRAFT_COLUMNS: &str = "session_id, worker_id, turn, round, content, created_at";
const EVALUATION_COLUMNS: &str =
    "session_id, turn, round, score, critique, synthesis, stop, created_at";

pub struct SqliteSessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionRepository {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                RepositoryError::Backend(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let conn = Connection::open(path.as_ref()).map_err(backend)?;
        Self::from_connection(conn)
    }

    /// A private in-memory database (tests, throwaway runs)
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open_in_memory().map_err(backend)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(backend)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| RepositoryError::Backend(format!("Lock error: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RepositoryError::Backend(format!("storage task failed: {}", e)))?
    }

    /// Load a session, apply a domain mutation and write it back atomically
    async fn mutate_session<F>(&self, id: SessionId, mutate: F) -> Result<Session, RepositoryError>
    where
        F: FnOnce(&mut Session) -> Result<(), RepositoryError> + Send + 'static,
    {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(backend)?;
            let mut session = load_session(&tx, id)?.ok_or(RepositoryError::NotFound(id))?;
            mutate(&mut session)?;
            save_session(&tx, &session)?;
            tx.commit().map_err(backend)?;
            Ok(session)
        })
        .await
    }
}

fn run_migrations(conn: &Connection) -> Result<(), RepositoryError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        [],
    )
    .map_err(backend)?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(backend)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )
        .map_err(backend)?;
        debug!("SQLite schema migrated to version {}", SCHEMA_VERSION);
    }
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<(), RepositoryError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('thinking', 'judging', 'consensus')),
            turn INTEGER NOT NULL DEFAULT 1,
            current_round INTEGER NOT NULL DEFAULT 1,
            max_rounds INTEGER NOT NULL,
            final_consensus TEXT,
            background TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK ((status = 'consensus') = (final_consensus IS NOT NULL))
        );

        CREATE TABLE IF NOT EXISTS drafts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            worker_id TEXT NOT NULL,
            turn INTEGER NOT NULL,
            round INTEGER NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (session_id, turn, round, worker_id)
        );

        CREATE TABLE IF NOT EXISTS evaluations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            turn INTEGER NOT NULL,
            round INTEGER NOT NULL,
            score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
            critique TEXT NOT NULL,
            synthesis TEXT NOT NULL,
            stop INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (session_id, turn, round)
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at DESC);
        "#,
    )
    .map_err(backend)
}

fn backend(e: rusqlite::Error) -> RepositoryError {
    RepositoryError::Backend(e.to_string())
}

fn write_error(e: rusqlite::Error, what: impl FnOnce() -> String) -> RepositoryError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => {
            RepositoryError::Conflict(format!("{} ({})", what(), e))
        }
        _ => backend(e),
    }
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    let status: String = row.get(2)?;
    let status: SessionStatus = status
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Session {
        id: SessionId::new(row.get(0)?),
        query: row.get(1)?,
        status,
        turn: row.get(3)?,
        current_round: row.get(4)?,
        max_rounds: row.get(5)?,
        final_consensus: row.get(6)?,
        background: row.get(7)?,
        created_at: parse_timestamp(row, 8)?,
        updated_at: parse_timestamp(row, 9)?,
    })
}

fn draft_from_row(row: &Row) -> rusqlite::Result<Draft> {
    Ok(Draft {
        session_id: SessionId::new(row.get(0)?),
        worker_id: WorkerId::new(row.get::<_, String>(1)?),
        turn: row.get(2)?,
        round: row.get(3)?,
        content: row.get(4)?,
        created_at: parse_timestamp(row, 5)?,
    })
}

fn evaluation_from_row(row: &Row) -> rusqlite::Result<Evaluation> {
    Ok(Evaluation {
        session_id: SessionId::new(row.get(0)?),
        turn: row.get(1)?,
        round: row.get(2)?,
        score: row.get(3)?,
        critique: row.get(4)?,
        synthesis: row.get(5)?,
        stop: row.get(6)?,
        created_at: parse_timestamp(row, 7)?,
    })
}

fn load_session(conn: &Connection, id: SessionId) -> Result<Option<Session>, RepositoryError> {
    conn.query_row(
        &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
        [id.value()],
        session_from_row,
    )
    .optional()
    .map_err(backend)
}

fn save_session(conn: &Connection, session: &Session) -> Result<(), RepositoryError> {
    conn.execute(
        "UPDATE sessions SET query = ?2, status = ?3, turn = ?4, current_round = ?5, \
         final_consensus = ?6, background = ?7, updated_at = ?8 WHERE id = ?1",
        params![
            session.id.value(),
            session.query,
            session.status.as_str(),
            session.turn,
            session.current_round,
            session.final_consensus,
            session.background,
            timestamp(&session.updated_at),
        ],
    )
    .map_err(backend)?;
    Ok(())
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create_session(
        &self,
        query: &str,
        max_rounds: u32,
    ) -> Result<Session, RepositoryError> {
        let query = query.to_string();
        self.with_conn(move |conn| {
            // Build through the domain constructor so defaults live in one place
            let draft = Session::new(SessionId::new(0), query, max_rounds);
            conn.execute(
                "INSERT INTO sessions (query, status, turn, current_round, max_rounds, \
                 created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    draft.query,
                    draft.status.as_str(),
                    draft.turn,
                    draft.current_round,
                    draft.max_rounds,
                    timestamp(&draft.created_at),
                    timestamp(&draft.updated_at),
                ],
            )
            .map_err(backend)?;
            Ok(Session {
                id: SessionId::new(conn.last_insert_rowid()),
                ..draft
            })
        })
        .await
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        self.with_conn(move |conn| load_session(conn, id)).await
    }

    async fn update_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        round: Option<u32>,
    ) -> Result<(), RepositoryError> {
        if status.is_consensus() {
            return Err(RepositoryError::InvalidState(
                "consensus is recorded with its synthesis".to_string(),
            ));
        }
        self.mutate_session(id, move |s| {
            s.set_status(status, round);
            Ok(())
        })
        .await
        .map(|_| ())
    }

    async fn record_consensus(
        &self,
        id: SessionId,
        synthesis: &str,
    ) -> Result<(), RepositoryError> {
        let synthesis = synthesis.to_string();
        self.mutate_session(id, move |s| {
            s.conclude(synthesis);
            Ok(())
        })
        .await
        .map(|_| ())
    }

    async fn begin_follow_up(
        &self,
        id: SessionId,
        query: &str,
    ) -> Result<Session, RepositoryError> {
        let query = query.to_string();
        self.mutate_session(id, move |s| {
            s.begin_follow_up(query)
                .map(|_| ())
                .map_err(|e| RepositoryError::InvalidState(e.to_string()))
        })
        .await
    }

    async fn create_drafts(&self, drafts: &[Draft]) -> Result<(), RepositoryError> {
        let drafts = drafts.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(backend)?;
            {
                let mut stmt = tx
                    .prepare(&format!(
                        "INSERT INTO drafts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        DRAFT_COLUMNS
                    ))
                    .map_err(backend)?;
                for draft in &drafts {
                    stmt.execute(params![
                        draft.session_id.value(),
                        draft.worker_id.as_str(),
                        draft.turn,
                        draft.round,
                        draft.content,
                        timestamp(&draft.created_at),
                    ])
                    .map_err(|e| {
                        write_error(e, || {
                            format!("draft for {} by {}", draft.key(), draft.worker_id)
                        })
                    })?;
                }
            }
            tx.commit().map_err(backend)
        })
        .await
    }

    async fn create_evaluation(&self, evaluation: &Evaluation) -> Result<(), RepositoryError> {
        let evaluation = evaluation.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO evaluations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    EVALUATION_COLUMNS
                ),
                params![
                    evaluation.session_id.value(),
                    evaluation.turn,
                    evaluation.round,
                    evaluation.score,
                    evaluation.critique,
                    evaluation.synthesis,
                    evaluation.stop,
                    timestamp(&evaluation.created_at),
                ],
            )
            .map_err(|e| write_error(e, || format!("evaluation for {}", evaluation.key())))?;
            Ok(())
        })
        .await
    }

    async fn get_drafts_for(&self, key: RoundKey) -> Result<Vec<Draft>, RepositoryError> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM drafts WHERE session_id = ?1 AND turn = ?2 AND round = ?3 \
                     ORDER BY worker_id",
                    DRAFT_COLUMNS
                ))
                .map_err(backend)?;
            let rows = stmt
                .query_map(
                    params![key.session_id.value(), key.turn, key.round],
                    draft_from_row,
                )
                .map_err(backend)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)
        })
        .await
    }

    async fn get_evaluation_for(
        &self,
        key: RoundKey,
    ) -> Result<Option<Evaluation>, RepositoryError> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM evaluations WHERE session_id = ?1 AND turn = ?2 AND round = ?3",
                    EVALUATION_COLUMNS
                ),
                params![key.session_id.value(), key.turn, key.round],
                evaluation_from_row,
            )
            .optional()
            .map_err(backend)
        })
        .await
    }

    async fn list_drafts(&self, id: SessionId) -> Result<Vec<Draft>, RepositoryError> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM drafts WHERE session_id = ?1 ORDER BY turn, round, worker_id",
                    DRAFT_COLUMNS
                ))
                .map_err(backend)?;
            let rows = stmt
                .query_map([id.value()], draft_from_row)
                .map_err(backend)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)
        })
        .await
    }

    async fn list_evaluations(&self, id: SessionId) -> Result<Vec<Evaluation>, RepositoryError> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM evaluations WHERE session_id = ?1 ORDER BY turn, round",
                    EVALUATION_COLUMNS
                ))
                .map_err(backend)?;
            let rows = stmt
                .query_map([id.value()], evaluation_from_row)
                .map_err(backend)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)
        })
        .await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, RepositoryError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM sessions ORDER BY created_at DESC, id DESC",
                    SESSION_COLUMNS
                ))
                .map_err(backend)?;
            let rows = stmt.query_map([], session_from_row).map_err(backend)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)
        })
        .await
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        self.with_conn(move |conn| {
            let removed = conn
                .execute("DELETE FROM sessions WHERE id = ?1", [id.value()])
                .map_err(backend)?;
            Ok(removed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::JudgeVerdict;

    fn evaluation(key: RoundKey, score: u8) -> Evaluation {
        Evaluation::from_verdict(key, JudgeVerdict::new(score, "tighten it", "answer", false))
    }

    #[tokio::test]
    async fn test_session_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("council.db");

        let id = {
            let repo = SqliteSessionRepository::open(&path).unwrap();
            let session = repo.create_session("Is remote work better?", 3).await.unwrap();
            repo.update_status(session.id, SessionStatus::Judging, Some(2))
                .await
                .unwrap();
            session.id
        };

        // Reopen: data and schema survive, migrations are idempotent
        let repo = SqliteSessionRepository::open(&path).unwrap();
        let loaded = repo.get_session(id).await.unwrap().unwrap();
        assert_eq!(loaded.query, "Is remote work better?");
        assert_eq!(loaded.status, SessionStatus::Judging);
        assert_eq!(loaded.current_round, 2);
        assert_eq!(loaded.max_rounds, 3);
    }

    #[tokio::test]
    async fn test_duplicate_draft_is_conflict_and_batch_rolls_back() {
        let repo = SqliteSessionRepository::open_in_memory().unwrap();
        let session = repo.create_session("q", 3).await.unwrap();
        let key = RoundKey::new(session.id, 1, 1);

        repo.create_drafts(&[Draft::new(key, WorkerId::new("worker-a"), "a")])
            .await
            .unwrap();
        let err = repo
            .create_drafts(&[
                Draft::new(key, WorkerId::new("worker-b"), "b"),
                Draft::new(key, WorkerId::new("worker-a"), "dup"),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
        let stored = repo.get_drafts_for(key).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "a");
    }

    #[tokio::test]
    async fn test_drafts_ordered_by_worker_id() {
        let repo = SqliteSessionRepository::open_in_memory().unwrap();
        let session = repo.create_session("q", 3).await.unwrap();
        let key = RoundKey::new(session.id, 1, 1);

        repo.create_drafts(&[
            Draft::new(key, WorkerId::new("worker-c"), "c"),
            Draft::new(key, WorkerId::new("worker-a"), "a"),
            Draft::new(key, WorkerId::new("worker-b"), "b"),
        ])
        .await
        .unwrap();

        let ids: Vec<String> = repo
            .get_drafts_for(key)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.worker_id.to_string())
            .collect();
        assert_eq!(ids, vec!["worker-a", "worker-b", "worker-c"]);
    }

    #[tokio::test]
    async fn test_one_evaluation_per_round() {
        let repo = SqliteSessionRepository::open_in_memory().unwrap();
        let session = repo.create_session("q", 3).await.unwrap();
        let key = RoundKey::new(session.id, 1, 1);

        repo.create_evaluation(&evaluation(key, 64)).await.unwrap();
        let err = repo.create_evaluation(&evaluation(key, 99)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let stored = repo.get_evaluation_for(key).await.unwrap().unwrap();
        assert_eq!(stored.score, 64);
        assert_eq!(stored.critique, "tighten it");
        assert!(!stored.stop);
    }

    #[tokio::test]
    async fn test_draft_for_unknown_session_is_rejected() {
        let repo = SqliteSessionRepository::open_in_memory().unwrap();
        let key = RoundKey::new(SessionId::new(42), 1, 1);
        let err = repo
            .create_drafts(&[Draft::new(key, WorkerId::new("worker-a"), "a")])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_consensus_and_follow_up() {
        let repo = SqliteSessionRepository::open_in_memory().unwrap();
        let session = repo.create_session("q", 3).await.unwrap();

        repo.record_consensus(session.id, "final answer").await.unwrap();
        let concluded = repo.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(concluded.status, SessionStatus::Consensus);
        assert_eq!(concluded.final_consensus.as_deref(), Some("final answer"));

        let follow_up = repo.begin_follow_up(session.id, "and then?").await.unwrap();
        assert_eq!(follow_up.turn, 2);
        assert_eq!(follow_up.current_round, 1);
        assert_eq!(follow_up.background.as_deref(), Some("final answer"));

        let reloaded = repo.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(reloaded.query, "and then?");
        assert_eq!(reloaded.turn, 2);
        assert_eq!(reloaded.status, SessionStatus::Thinking);
        assert_eq!(reloaded.background.as_deref(), Some("final answer"));
        assert!(reloaded.invariant_holds());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_children() {
        let repo = SqliteSessionRepository::open_in_memory().unwrap();
        let session = repo.create_session("q", 3).await.unwrap();
        let key = RoundKey::new(session.id, 1, 1);
        repo.create_drafts(&[Draft::new(key, WorkerId::new("worker-a"), "a")])
            .await
            .unwrap();
        repo.create_evaluation(&evaluation(key, 10)).await.unwrap();

        assert!(repo.delete_session(session.id).await.unwrap());
        assert!(repo.list_drafts(session.id).await.unwrap().is_empty());
        assert!(repo.list_evaluations(session.id).await.unwrap().is_empty());
        assert!(repo.get_session(session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sessions_newest_first() {
        let repo = SqliteSessionRepository::open_in_memory().unwrap();
        let a = repo.create_session("a", 3).await.unwrap();
        let b = repo.create_session("b", 3).await.unwrap();

        let ids: Vec<SessionId> = repo
            .list_sessions()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_missing_session_update_is_not_found() {
        let repo = SqliteSessionRepository::open_in_memory().unwrap();
        let err = repo
            .update_status(SessionId::new(5), SessionStatus::Thinking, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
