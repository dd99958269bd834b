//! PostgreSQL-backed `MigrationRunner` used by `upgrade-db`.
//!
//! All scripts run in a single transaction; the first failing script rolls
//! back everything applied before it.

use async_trait::async_trait;
use diesel_async::SimpleAsyncConnection as _;
use tracing::info;

use crate::domain::MigrationScript;
use crate::domain::ports::{MigrationRunner, MigrationRunnerError};

use super::diesel_helpers::map_script_error;
use super::pool::{DbPool, PoolError};

/// Diesel implementation of the `MigrationRunner` port.
#[derive(Clone)]
pub struct DieselMigrationRunner {
    pool: DbPool,
}

impl DieselMigrationRunner {
    /// Create a new runner with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

enum ApplyError {
    Database(diesel::result::Error),
    Script(MigrationRunnerError),
}

impl From<diesel::result::Error> for ApplyError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Database(error)
    }
}

fn map_pool_error(error: PoolError) -> MigrationRunnerError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            MigrationRunnerError::connection(message)
        }
    }
}

#[async_trait]
impl MigrationRunner for DieselMigrationRunner {
    async fn apply(&self, scripts: &[MigrationScript]) -> Result<(), MigrationRunnerError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                for script in scripts {
                    info!(version = script.version, "applying upgrade script");
                    conn.batch_execute(&script.sql)
                        .await
                        .map_err(|err| ApplyError::Script(map_script_error(script.version, &err)))?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| match err {
            ApplyError::Script(error) => error,
            ApplyError::Database(error) => MigrationRunnerError::connection(error.to_string()),
        })
    }
}
