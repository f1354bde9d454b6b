//! Session repository adapters
//!
//! - [`InMemorySessionRepository`]: process-local, the default backend
//! - [`SqliteSessionRepository`]: durable, `rusqlite` with bundled SQLite

mod memory;
mod sqlite;

pub use memory::InMemorySessionRepository;
pub use sqlite::SqliteSessionRepository;

use crate::config::{FileStorageConfig, StorageBackend};
use async_trait::async_trait;
use council_application::{RepositoryError, SessionRepository};
use council_domain::{Draft, Evaluation, RoundKey, Session, SessionId, SessionStatus};

/// Repository chosen at startup from configuration
pub enum AnyRepository {
    Memory(InMemorySessionRepository),
    Sqlite(SqliteSessionRepository),
}

impl AnyRepository {
    pub fn backend_name(&self) -> &'static str {
        match self {
            AnyRepository::Memory(_) => "memory",
            AnyRepository::Sqlite(_) => "sqlite",
        }
    }

    /// Open the backend named in `[storage]`
    pub fn from_config(config: &FileStorageConfig) -> Result<Self, RepositoryError> {
        match config.backend {
            StorageBackend::Memory => Ok(AnyRepository::Memory(InMemorySessionRepository::new())),
            StorageBackend::Sqlite => {
                SqliteSessionRepository::open(config.sqlite_path()).map(AnyRepository::Sqlite)
            }
        }
    }

    fn inner(&self) -> &dyn SessionRepository {
        match self {
            AnyRepository::Memory(repo) => repo,
            AnyRepository::Sqlite(repo) => repo,
        }
    }
}

#[async_trait]
impl SessionRepository for AnyRepository {
    async fn create_session(
        &self,
        query: &str,
        max_rounds: u32,
    ) -> Result<Session, RepositoryError> {
        self.inner().create_session(query, max_rounds).await
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        self.inner().get_session(id).await
    }

    async fn update_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        round: Option<u32>,
    ) -> Result<(), RepositoryError> {
        self.inner().update_status(id, status, round).await
    }

    async fn record_consensus(
        &self,
        id: SessionId,
        synthesis: &str,
    ) -> Result<(), RepositoryError> {
        self.inner().record_consensus(id, synthesis).await
    }

    async fn begin_follow_up(
        &self,
        id: SessionId,
        query: &str,
    ) -> Result<Session, RepositoryError> {
        self.inner().begin_follow_up(id, query).await
    }

    async fn create_drafts(&self, drafts: &[Draft]) -> Result<(), RepositoryError> {
        self.inner().create_drafts(drafts).await
    }

    async fn create_evaluation(&self, evaluation: &Evaluation) -> Result<(), RepositoryError> {
        self.inner().create_evaluation(evaluation).await
    }

    async fn get_drafts_for(&self, key: RoundKey) -> Result<Vec<Draft>, RepositoryError> {
        self.inner().get_drafts_for(key).await
    }

    async fn get_evaluation_for(
        &self,
        key: RoundKey,
    ) -> Result<Option<Evaluation>, RepositoryError> {
        self.inner().get_evaluation_for(key).await
    }

    async fn list_drafts(&self, id: SessionId) -> Result<Vec<Draft>, RepositoryError> {
        self.inner().list_drafts(id).await
    }

    async fn list_evaluations(&self, id: SessionId) -> Result<Vec<Evaluation>, RepositoryError> {
        self.inner().list_evaluations(id).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, RepositoryError> {
        self.inner().list_sessions().await
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        self.inner().delete_session(id).await
    }
}
