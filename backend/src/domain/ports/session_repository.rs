//! Port for persisted login sessions.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{SessionId, SessionKey, SessionToken, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by session repository adapters.
    pub enum SessionRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "session repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "session repository query failed: {message}",
    }
}

/// Storage of `sessions(session_id, uid, session_key, last_access)` rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Start a session for `uid`.
    ///
    /// Rows of the same user last accessed before `cutoff` are removed in
    /// the same transaction.
    async fn create(
        &self,
        uid: UserId,
        key: &SessionKey,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<SessionId, SessionRepositoryError>;

    /// Whether `token` is a live session of `uid`; a live session has its
    /// last access moved to `now`.
    async fn check(
        &self,
        token: &SessionToken,
        uid: UserId,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, SessionRepositoryError>;

    /// Remove the session named by `token` when it belongs to `uid` and its
    /// key matches; anything else is left untouched.
    async fn close(&self, token: &SessionToken, uid: UserId) -> Result<(), SessionRepositoryError>;
}

#[derive(Debug, Clone)]
struct SessionRow {
    id: SessionId,
    uid: UserId,
    key: SessionKey,
    last_access: DateTime<Utc>,
}

/// Process-local session storage.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    rows: Mutex<(i64, Vec<SessionRow>)>,
}

impl InMemorySessionRepository {
    fn with_rows<T>(
        &self,
        f: impl FnOnce(&mut (i64, Vec<SessionRow>)) -> T,
    ) -> Result<T, SessionRepositoryError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| SessionRepositoryError::query("session store poisoned"))?;
        Ok(f(&mut rows))
    }

    /// Number of stored sessions.
    ///
    /// # Errors
    /// Fails only when the store is poisoned.
    pub fn len(&self) -> Result<usize, SessionRepositoryError> {
        self.with_rows(|(_, rows)| rows.len())
    }

    /// Whether no session is stored.
    ///
    /// # Errors
    /// Fails only when the store is poisoned.
    pub fn is_empty(&self) -> Result<bool, SessionRepositoryError> {
        self.len().map(|len| len == 0)
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(
        &self,
        uid: UserId,
        key: &SessionKey,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<SessionId, SessionRepositoryError> {
        self.with_rows(|(next, rows)| {
            rows.retain(|row| row.uid != uid || row.last_access >= cutoff);
            *next += 1;
            let id = SessionId::new(*next);
            rows.push(SessionRow {
                id,
                uid,
                key: key.clone(),
                last_access: now,
            });
            id
        })
    }

    async fn check(
        &self,
        token: &SessionToken,
        uid: UserId,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, SessionRepositoryError> {
        self.with_rows(|(_, rows)| {
            let Some(row) = rows.iter_mut().find(|row| {
                row.id == token.id()
                    && row.uid == uid
                    && row.key.as_str() == token.key().as_str()
                    && row.last_access >= cutoff
            }) else {
                return false;
            };
            row.last_access = now;
            true
        })
    }

    async fn close(&self, token: &SessionToken, uid: UserId) -> Result<(), SessionRepositoryError> {
        self.with_rows(|(_, rows)| {
            rows.retain(|row| {
                row.id != token.id() || row.uid != uid || row.key.as_str() != token.key().as_str()
            });
        })
    }
}
