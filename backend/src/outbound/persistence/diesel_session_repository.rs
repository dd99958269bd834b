//! PostgreSQL-backed `SessionRepository`.
//!
//! A login purges the user's expired rows and opens a new one in the same
//! transaction; a successful check touches `last_access`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{SessionRepository, SessionRepositoryError};
use crate::domain::{SessionId, SessionKey, SessionToken, UserId};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::NewSessionRow;
use super::pool::DbPool;
use super::schema::sessions;

/// Diesel implementation of the `SessionRepository` port.
#[derive(Clone)]
pub struct DieselSessionRepository {
    pool: DbPool,
}

impl DieselSessionRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for DieselSessionRepository {
    async fn create(
        &self,
        uid: UserId,
        key: &SessionKey,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<SessionId, SessionRepositoryError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let row = NewSessionRow {
            uid: uid.value(),
            session_key: key.as_str(),
            last_access: now,
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = conn
            .transaction(|conn| {
                async move {
                    diesel::delete(
                        sessions::table
                            .filter(sessions::uid.eq(row.uid))
                            .filter(sessions::last_access.lt(cutoff)),
                    )
                    .execute(conn)
                    .await?;
                    diesel::insert_into(sessions::table)
                        .values(&row)
                        .returning(sessions::session_id)
                        .get_result::<i64>(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        Ok(SessionId::new(id))
    }

    async fn check(
        &self,
        token: &SessionToken,
        uid: UserId,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let touched = diesel::update(
            sessions::table
                .filter(sessions::session_id.eq(token.id().value()))
                .filter(sessions::uid.eq(uid.value()))
                .filter(sessions::session_key.eq(token.key().as_str()))
                .filter(sessions::last_access.ge(cutoff)),
        )
        .set(sessions::last_access.eq(now))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(touched > 0)
    }

    async fn close(&self, token: &SessionToken, uid: UserId) -> Result<(), SessionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::delete(
            sessions::table
                .filter(sessions::session_id.eq(token.id().value()))
                .filter(sessions::uid.eq(uid.value()))
                .filter(sessions::session_key.eq(token.key().as_str())),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(())
    }
}
