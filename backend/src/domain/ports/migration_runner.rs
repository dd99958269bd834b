//! Port applying SQL upgrade scripts.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::MigrationScript;

use super::define_port_error;

define_port_error! {
    /// Errors raised by migration runners.
    pub enum MigrationRunnerError {
        /// Database connection could not be established.
        Connection { message: String } => "migration connection failed: {message}",
        /// A script failed; the transaction was rolled back.
        Script { version: u32, message: String } =>
            "upgrade script {version} failed: {message}",
    }
}

/// Applies scripts in order inside one transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    /// Apply `scripts` in the given order; all or nothing.
    async fn apply(&self, scripts: &[MigrationScript]) -> Result<(), MigrationRunnerError>;
}

/// Runner recording applied versions, failing on scripts containing a
/// marker text; used to exercise the upgrade plan without a database.
#[derive(Debug, Default)]
pub struct RecordingMigrationRunner {
    failure_marker: Option<String>,
    applied: Mutex<Vec<u32>>,
}

impl RecordingMigrationRunner {
    /// Runner failing every script whose SQL contains `marker`.
    #[must_use]
    pub fn failing_on(marker: &str) -> Self {
        Self {
            failure_marker: Some(marker.to_owned()),
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Versions committed so far.
    ///
    /// # Errors
    /// Fails only when the log is poisoned.
    pub fn applied(&self) -> Result<Vec<u32>, MigrationRunnerError> {
        self.applied
            .lock()
            .map(|applied| applied.clone())
            .map_err(|_| MigrationRunnerError::connection("migration log poisoned"))
    }
}

#[async_trait]
impl MigrationRunner for RecordingMigrationRunner {
    async fn apply(&self, scripts: &[MigrationScript]) -> Result<(), MigrationRunnerError> {
        let mut pending = Vec::with_capacity(scripts.len());
        for script in scripts {
            if self
                .failure_marker
                .as_deref()
                .is_some_and(|marker| script.sql.contains(marker))
            {
                return Err(MigrationRunnerError::script(
                    script.version,
                    "statement failed",
                ));
            }
            pending.push(script.version);
        }
        self.applied
            .lock()
            .map_err(|_| MigrationRunnerError::connection("migration log poisoned"))?
            .extend(pending);
        Ok(())
    }
}
