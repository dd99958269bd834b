//! Port delivering reports of unexpected errors.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::BugReport;

use super::define_port_error;

define_port_error! {
    /// Errors raised by bug report delivery.
    pub enum BugReporterError {
        /// The report could not be delivered.
        Delivery { message: String } => "bug report delivery failed: {message}",
    }
}

/// Delivers bug reports to the configured address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BugReporter: Send + Sync {
    /// Deliver `report` to `address`.
    async fn report(&self, address: &str, report: &BugReport) -> Result<(), BugReporterError>;
}

/// Keeps delivered reports in memory.
#[derive(Debug, Default)]
pub struct CollectingBugReporter {
    reports: Mutex<Vec<(String, BugReport)>>,
}

impl CollectingBugReporter {
    /// Reports delivered so far.
    #[must_use]
    pub fn reports(&self) -> Vec<(String, BugReport)> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BugReporter for CollectingBugReporter {
    async fn report(&self, address: &str, report: &BugReport) -> Result<(), BugReporterError> {
        self.reports
            .lock()
            .map_err(|_| BugReporterError::delivery("report log poisoned"))?
            .push((address.to_owned(), report.clone()));
        Ok(())
    }
}
