//! PostgreSQL-backed `MappingRepository`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{MappingRepository, MappingRepositoryError};
use crate::domain::{MappingEntry, TitleVariant};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::{MappingRow, TitleRow};
use super::pool::DbPool;
use super::schema::{mapping, titles};

/// Diesel implementation of the `MappingRepository` port.
#[derive(Clone)]
pub struct DieselMappingRepository {
    pool: DbPool,
}

impl DieselMappingRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn assemble(rows: Vec<MappingRow>, title_rows: Vec<TitleRow>) -> Vec<MappingEntry> {
    let mut by_mapping: BTreeMap<i64, BTreeMap<String, TitleVariant>> = BTreeMap::new();
    for row in title_rows {
        by_mapping.entry(row.mapping_id).or_default().insert(
            row.lang,
            TitleVariant {
                title: row.title,
                description: row.description,
            },
        );
    }
    rows.into_iter()
        .map(|row| MappingEntry {
            titles: by_mapping.remove(&row.mapping_id).unwrap_or_default(),
            mapping_id: row.mapping_id,
            parent: row.parent,
            identifier: row.identifier,
            module: row.modname,
            ord: row.ord,
            tree_order: row.tree_order,
            published: row.published,
            private: row.private,
        })
        .collect()
}

#[async_trait]
impl MappingRepository for DieselMappingRepository {
    async fn entries(&self) -> Result<Vec<MappingEntry>, MappingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<MappingRow> = mapping::table
            .select(MappingRow::as_select())
            .order_by(mapping::tree_order)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let title_rows: Vec<TitleRow> = titles::table
            .select(TitleRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(assemble(rows, title_rows))
    }
}
