//! PostgreSQL-backed `PanelRepository`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::PanelEntry;
use crate::domain::ports::{PanelRepository, PanelRepositoryError};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::PanelRow;
use super::pool::DbPool;
use super::schema::{mapping, panels, titles};

/// Diesel implementation of the `PanelRepository` port.
#[derive(Clone)]
pub struct DieselPanelRepository {
    pool: DbPool,
}

impl DieselPanelRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

type BoundItem = (String, String, bool);

fn to_entry(
    row: PanelRow,
    bound: Option<BoundItem>,
    mapping_titles: &BTreeMap<i64, String>,
) -> PanelEntry {
    let mapping_title = row
        .mapping_id
        .and_then(|id| mapping_titles.get(&id).cloned());
    let (identifier, module, private) = match bound {
        Some((identifier, module, private)) => (Some(identifier), Some(module), private),
        None => (None, None, false),
    };
    PanelEntry {
        panel_id: row.panel_id,
        lang: row.lang,
        title: row.title,
        ord: row.ord,
        identifier,
        module,
        mapping_title,
        private,
        size: row.size.and_then(|size| usize::try_from(size).ok()),
        content: row.content,
        published: row.published,
    }
}

#[async_trait]
impl PanelRepository for DieselPanelRepository {
    async fn panels(&self, lang: &str) -> Result<Vec<PanelEntry>, PanelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(PanelRow, Option<BoundItem>)> = panels::table
            .left_join(mapping::table)
            .filter(panels::lang.eq(lang))
            .select((
                PanelRow::as_select(),
                (mapping::identifier, mapping::modname, mapping::private).nullable(),
            ))
            .order_by(panels::ord)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let mapping_titles: BTreeMap<i64, String> = titles::table
            .filter(titles::lang.eq(lang))
            .select((titles::mapping_id, titles::title))
            .load::<(i64, String)>(&mut conn)
            .await
            .map_err(map_diesel_error)?
            .into_iter()
            .collect();
        Ok(rows
            .into_iter()
            .map(|(row, bound)| to_entry(row, bound, &mapping_titles))
            .collect())
    }
}
