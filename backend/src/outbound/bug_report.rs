//! Bug report delivery through the log stream.
//!
//! Reports are emitted at `error!` level under the `wiking::bug_report`
//! target, so a log shipper can route them to the configured address.

use async_trait::async_trait;
use tracing::error;

use crate::domain::BugReport;
use crate::domain::ports::{BugReporter, BugReporterError};

/// `BugReporter` writing each report as one structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBugReporter;

#[async_trait]
impl BugReporter for TracingBugReporter {
    async fn report(&self, address: &str, report: &BugReport) -> Result<(), BugReporterError> {
        error!(
            target: "wiking::bug_report",
            to = address,
            subject = %report.subject(),
            trace_id = report.trace_id.as_deref(),
            "{report}"
        );
        Ok(())
    }
}
