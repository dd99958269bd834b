//! PostgreSQL-backed `CredentialRepository` used by `salt-passwords`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{CredentialRepository, CredentialRepositoryError, PasswordRewrite};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::pool::DbPool;
use super::schema::users;

/// Diesel implementation of the `CredentialRepository` port.
#[derive(Clone)]
pub struct DieselCredentialRepository {
    pool: DbPool,
}

impl DieselCredentialRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for DieselCredentialRepository {
    async fn rewrite_passwords(
        &self,
        rewrite: PasswordRewrite<'_>,
    ) -> Result<usize, CredentialRepositoryError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let stored: Vec<(i64, String)> = users::table
                    .select((users::uid, users::password))
                    .order_by(users::uid)
                    .for_update()
                    .load(conn)
                    .await?;
                let mut updated = 0;
                for (uid, password) in stored {
                    let Some(replacement) = rewrite(&password) else {
                        continue;
                    };
                    diesel::update(users::table.filter(users::uid.eq(uid)))
                        .set(users::password.eq(replacement))
                        .execute(conn)
                        .await?;
                    updated += 1;
                }
                Ok(updated)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }
}
