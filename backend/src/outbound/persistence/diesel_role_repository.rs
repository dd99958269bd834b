//! PostgreSQL-backed `RoleRepository`.
//!
//! New containment pairs are checked against the stored table and inserted
//! in one transaction.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{RoleRepository, RoleRepositoryError, check_containment};
use crate::domain::{Role, UserId};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::NewRoleSetRow;
use super::pool::DbPool;
use super::schema::{role_members, role_sets};

/// Diesel implementation of the `RoleRepository` port.
#[derive(Clone)]
pub struct DieselRoleRepository {
    pool: DbPool,
}

impl DieselRoleRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for DieselRoleRepository {
    async fn containment_pairs(&self) -> Result<Vec<(Role, Role)>, RoleRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let pairs = load_pairs(&mut conn).await.map_err(map_diesel_error)?;
        Ok(pairs)
    }

    async fn add_containment(
        &self,
        container: &Role,
        member: &Role,
    ) -> Result<(), RoleRepositoryError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let row = NewRoleSetRow {
            role_id: container.id(),
            member_role_id: member.id(),
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let stored = load_pairs(conn).await?;
                if let Err(error) = check_containment(stored, container, member) {
                    return Ok(Err(error));
                }
                diesel::insert_into(role_sets::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
                Ok(Ok(()))
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)?
    }

    async fn member_roles(&self, uid: UserId) -> Result<Vec<Role>, RoleRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let roles: Vec<String> = role_members::table
            .filter(role_members::uid.eq(uid.value()))
            .select(role_members::role_id)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(roles.into_iter().map(Role::new).collect())
    }
}

async fn load_pairs(
    conn: &mut diesel_async::AsyncPgConnection,
) -> Result<Vec<(Role, Role)>, diesel::result::Error> {
    let pairs: Vec<(String, String)> = role_sets::table
        .select((role_sets::role_id, role_sets::member_role_id))
        .order_by(role_sets::role_set_id)
        .load(conn)
        .await?;
    Ok(pairs
        .into_iter()
        .map(|(container, member)| (Role::new(container), Role::new(member)))
        .collect())
}
