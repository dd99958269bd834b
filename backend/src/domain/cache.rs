//! Caches of database tables invalidated through version counters.
//!
//! Each cached table has a counter in `cached_tables` bumped by a trigger on
//! every write. The counters are read once per request; a cache reloads its
//! value when the counter differs from the one it was loaded at.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use tracing::debug;

/// Counters of all cached tables, keyed by table name.
pub type TableVersions = BTreeMap<String, i64>;

/// One value derived from a versioned table.
///
/// Concurrent reloads may race; the last stored value wins.
#[derive(Debug)]
pub struct VersionedCache<T> {
    table: &'static str,
    slot: RwLock<Option<(i64, Arc<T>)>>,
}

impl<T> VersionedCache<T> {
    /// Empty cache of values derived from `table`.
    #[must_use]
    pub const fn new(table: &'static str) -> Self {
        Self {
            table,
            slot: RwLock::new(None),
        }
    }

    /// Table the value is derived from.
    #[must_use]
    pub fn table(&self) -> &'static str {
        self.table
    }

    fn version(&self, versions: &TableVersions) -> i64 {
        versions.get(self.table).copied().unwrap_or_default()
    }

    /// The cached value if it is current for `versions`.
    #[must_use]
    pub fn get(&self, versions: &TableVersions) -> Option<Arc<T>> {
        let version = self.version(versions);
        let slot = self.slot.read().ok()?;
        slot.as_ref()
            .filter(|(loaded, _)| *loaded == version)
            .map(|(_, value)| Arc::clone(value))
    }

    /// Store `value` as current for `versions`.
    pub fn store(&self, versions: &TableVersions, value: T) -> Arc<T> {
        let value = Arc::new(value);
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some((self.version(versions), Arc::clone(&value)));
        }
        value
    }

    /// The current value, loading it with `load` when stale.
    ///
    /// # Errors
    /// Whatever `load` fails with; the stale value is kept then.
    pub async fn get_or_try_load<F, Fut, E>(
        &self,
        versions: &TableVersions,
        load: F,
    ) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(versions) {
            return Ok(value);
        }
        debug!(table = self.table, "reloading cached table");
        let value = load().await?;
        Ok(self.store(versions, value))
    }
}
