//! Port for reading the URI mapping and menu titles.

use async_trait::async_trait;

use crate::domain::MappingEntry;

use super::define_port_error;

define_port_error! {
    /// Errors raised by mapping repository adapters.
    pub enum MappingRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "mapping repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "mapping repository query failed: {message}",
    }
}

/// Read access to the mapping table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MappingRepository: Send + Sync {
    /// All mapping rows with their titles, sorted by tree order.
    async fn entries(&self) -> Result<Vec<MappingEntry>, MappingRepositoryError>;
}

/// In-memory mapping used by tests and database-less runs.
#[derive(Debug, Default, Clone)]
pub struct FixtureMappingRepository {
    entries: Vec<MappingEntry>,
}

impl FixtureMappingRepository {
    /// Serve `entries`.
    #[must_use]
    pub fn new(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl MappingRepository for FixtureMappingRepository {
    async fn entries(&self) -> Result<Vec<MappingEntry>, MappingRepositoryError> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.tree_order.cmp(&b.tree_order));
        Ok(entries)
    }
}
