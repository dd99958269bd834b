//! Port for the cached table version registry.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by table version adapters.
    pub enum TableVersionRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "table version connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "table version query failed: {message}",
    }
}

/// Read access to `cached_tables`, whose versions a database trigger bumps
/// on every write to the tracked table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TableVersionRepository: Send + Sync {
    /// Current version of every tracked table, keyed by table name.
    async fn versions(&self) -> Result<BTreeMap<String, i64>, TableVersionRepositoryError>;
}

/// In-memory version registry; tests bump versions by hand.
#[derive(Debug, Default)]
pub struct FixtureTableVersionRepository {
    versions: Mutex<BTreeMap<String, i64>>,
}

impl FixtureTableVersionRepository {
    /// Increment the version of `table`.
    ///
    /// # Errors
    /// Fails only when the registry is poisoned.
    pub fn bump(&self, table: &str) -> Result<(), TableVersionRepositoryError> {
        let mut versions = self
            .versions
            .lock()
            .map_err(|_| TableVersionRepositoryError::query("version registry poisoned"))?;
        *versions.entry(table.to_owned()).or_default() += 1;
        Ok(())
    }
}

#[async_trait]
impl TableVersionRepository for FixtureTableVersionRepository {
    async fn versions(&self) -> Result<BTreeMap<String, i64>, TableVersionRepositoryError> {
        self.versions
            .lock()
            .map(|versions| versions.clone())
            .map_err(|_| TableVersionRepositoryError::query("version registry poisoned"))
    }
}
