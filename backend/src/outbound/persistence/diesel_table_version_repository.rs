//! PostgreSQL-backed `TableVersionRepository` over `cached_tables`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{TableVersionRepository, TableVersionRepositoryError};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::pool::DbPool;
use super::schema::cached_tables;

/// Diesel implementation of the `TableVersionRepository` port.
#[derive(Clone)]
pub struct DieselTableVersionRepository {
    pool: DbPool,
}

impl DieselTableVersionRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TableVersionRepository for DieselTableVersionRepository {
    async fn versions(&self) -> Result<BTreeMap<String, i64>, TableVersionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(String, i64)> = cached_tables::table
            .filter(cached_tables::object_schema.eq("public"))
            .select((cached_tables::object_name, cached_tables::version))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().collect())
    }
}
