//! Reports of unexpected request failures.

use std::fmt;

use super::{Error, Params, Request};

/// Redacted snapshot of a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugReport {
    /// Requested path.
    pub uri: String,
    /// Server the request was addressed to.
    pub server_uri: String,
    /// Login of the acting user.
    pub user: Option<String>,
    /// Parameters with password-like values masked.
    pub params: Params,
    /// Referring page.
    pub referer: Option<String>,
    /// Client identification.
    pub user_agent: Option<String>,
    /// Correlation id shown to the user.
    pub trace_id: Option<String>,
    /// Error message with full detail.
    pub error: String,
}

impl BugReport {
    /// Snapshot `req` failing with `error`.
    #[must_use]
    pub fn new(req: &Request, error: &Error) -> Self {
        Self {
            uri: req.uri(),
            server_uri: req.server_uri().to_owned(),
            user: req.user().map(|user| user.login().as_str().to_owned()),
            params: req.params().redacted(),
            referer: req.header("referer").map(str::to_owned),
            user_agent: req.header("user-agent").map(str::to_owned),
            trace_id: error.trace_id().map(str::to_owned),
            error: error.message().to_owned(),
        }
    }

    /// Subject line for delivery.
    #[must_use]
    pub fn subject(&self) -> String {
        format!("Wiking error: {}", first_line(&self.error))
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

impl fmt::Display for BugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "URI: {}{}", self.server_uri, self.uri)?;
        if let Some(user) = &self.user {
            writeln!(f, "User: {user}")?;
        }
        if let Some(referer) = &self.referer {
            writeln!(f, "Referer: {referer}")?;
        }
        if let Some(agent) = &self.user_agent {
            writeln!(f, "User agent: {agent}")?;
        }
        if let Some(trace_id) = &self.trace_id {
            writeln!(f, "Trace id: {trace_id}")?;
        }
        for (name, values) in self.params.iter() {
            writeln!(f, "Param {name}: {}", values.join(", "))?;
        }
        write!(f, "\n{}", self.error)
    }
}
