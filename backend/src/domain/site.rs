//! Site-wide settings seen by the dispatch core.

use super::SessionPolicy;

/// Settings derived from the configuration at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSettings {
    /// Site title, prefixed to page titles.
    pub title: String,
    /// Optional subtitle shown in the top bar.
    pub subtitle: Option<String>,
    /// Languages the application offers.
    pub languages: Vec<String>,
    /// Whether anonymous visitors may register.
    pub allow_registration: bool,
    /// Where users with an expired password are sent.
    pub password_change_uri: String,
    /// Serve only the maintenance page.
    pub maintenance: bool,
    /// Lifetime of the login name cookie in days.
    pub login_cookie_days: u32,
    /// Session expiration.
    pub session_policy: SessionPolicy,
    /// Recipient of bug reports; reports are only produced when set.
    pub bug_report_address: Option<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            title: "Wiking site".to_owned(),
            subtitle: None,
            languages: vec!["en".to_owned()],
            allow_registration: true,
            password_change_uri: "/_registration?action=edit".to_owned(),
            maintenance: false,
            login_cookie_days: 30,
            session_policy: SessionPolicy::default(),
            bug_report_address: None,
        }
    }
}

impl SiteSettings {
    /// Path part of the password change URI.
    #[must_use]
    pub fn password_change_path(&self) -> &str {
        self.password_change_uri
            .split('?')
            .next()
            .unwrap_or_default()
    }
}
