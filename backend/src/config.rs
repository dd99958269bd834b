//! Application configuration loaded via OrthoConfig.
//!
//! Values come from the command line, `WIKING_*` environment variables and
//! configuration files. Unset values fall back to the defaults below.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{LanguagePolicy, SessionPolicy, SiteSettings};

const DEFAULT_SITE_TITLE: &str = "Wiking site";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_SESSION_HOURS: u32 = 2;
const DEFAULT_LOGIN_COOKIE_DAYS: u32 = 30;
const DEFAULT_PASSWORD_CHANGE_URI: &str = "/_registration?action=edit";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Errors raised while interpreting configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A `key=value` list contains an entry without `=`.
    #[error("invalid entry '{entry}' in {setting}; expected key=value")]
    InvalidPair {
        /// Setting holding the list.
        setting: &'static str,
        /// Offending entry.
        entry: String,
    },
    /// The bind address does not parse.
    #[error("invalid bind address '{value}': {message}")]
    InvalidBindAddr {
        /// Configured value.
        value: String,
        /// Parser message.
        message: String,
    },
}

/// Settings of a Wiking site.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "WIKING")]
pub struct WikingSettings {
    /// Site title, prefixed to page titles.
    pub site_title: Option<String>,
    /// Subtitle shown in the top bar.
    pub site_subtitle: Option<String>,
    /// Language used when negotiation finds nothing better.
    pub default_language: Option<String>,
    /// Comma separated application languages.
    pub languages: Option<String>,
    /// Comma separated `host=lang` pairs.
    pub default_language_by_domain: Option<String>,
    /// Session expiration in hours.
    pub session_expiration: Option<u32>,
    /// Lifetime of the login name cookie in days.
    pub login_cookie_days: Option<u32>,
    /// Serve only the maintenance page.
    #[ortho_config(default = false)]
    pub maintenance: bool,
    /// Recipient of bug reports.
    pub bug_report_address: Option<String>,
    /// Whether anonymous visitors may register.
    pub allow_registration: Option<bool>,
    /// Where users with an expired password are sent.
    pub password_change_uri: Option<String>,
    /// PostgreSQL URL; without it the server runs on fixtures.
    pub database_url: Option<String>,
    /// Comma separated `component=path` documentation directories.
    pub doc_dirs: Option<String>,
    /// Address the HTTP server binds to.
    pub bind_addr: Option<String>,
}

fn list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn pairs(setting: &'static str, raw: Option<&str>) -> Result<Vec<(String, String)>, ConfigError> {
    list(raw)
        .into_iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
                Ok((key.trim().to_owned(), value.trim().to_owned()))
            }
            _ => Err(ConfigError::InvalidPair { setting, entry }),
        })
        .collect()
}

impl WikingSettings {
    /// Configured default language.
    #[must_use]
    pub fn default_language(&self) -> &str {
        self.default_language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Application languages; the default language when none are listed.
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        let languages = list(self.languages.as_deref());
        if languages.is_empty() {
            vec![self.default_language().to_owned()]
        } else {
            languages
        }
    }

    /// Session expiration policy.
    #[must_use]
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy::from_hours(self.session_expiration.unwrap_or(DEFAULT_SESSION_HOURS))
    }

    /// Settings seen by the dispatch core.
    #[must_use]
    pub fn site_settings(&self) -> SiteSettings {
        SiteSettings {
            title: self
                .site_title
                .clone()
                .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_owned()),
            subtitle: self.site_subtitle.clone(),
            languages: self.languages(),
            allow_registration: self.allow_registration.unwrap_or(true),
            password_change_uri: self
                .password_change_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_PASSWORD_CHANGE_URI.to_owned()),
            maintenance: self.maintenance,
            login_cookie_days: self.login_cookie_days.unwrap_or(DEFAULT_LOGIN_COOKIE_DAYS),
            session_policy: self.session_policy(),
            bug_report_address: self.bug_report_address.clone(),
        }
    }

    /// Language negotiation defaults.
    ///
    /// # Errors
    /// [`ConfigError::InvalidPair`] for a malformed domain entry.
    pub fn language_policy(&self) -> Result<LanguagePolicy, ConfigError> {
        let by_domain = pairs(
            "default_language_by_domain",
            self.default_language_by_domain.as_deref(),
        )?;
        Ok(LanguagePolicy::new(
            self.default_language(),
            by_domain.into_iter().collect(),
        ))
    }

    /// Documentation directories by component.
    ///
    /// # Errors
    /// [`ConfigError::InvalidPair`] for a malformed entry.
    pub fn doc_dirs(&self) -> Result<BTreeMap<String, PathBuf>, ConfigError> {
        Ok(pairs("doc_dirs", self.doc_dirs.as_deref())?
            .into_iter()
            .map(|(component, path)| (component, PathBuf::from(path)))
            .collect())
    }

    /// Address the HTTP server binds to.
    ///
    /// # Errors
    /// [`ConfigError::InvalidBindAddr`] when the value does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let value = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        value
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::InvalidBindAddr {
                value: value.to_owned(),
                message: err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 6] = [
        "WIKING_SITE_TITLE",
        "WIKING_LANGUAGES",
        "WIKING_DEFAULT_LANGUAGE_BY_DOMAIN",
        "WIKING_SESSION_EXPIRATION",
        "WIKING_MAINTENANCE",
        "WIKING_DOC_DIRS",
    ];

    fn load_from_empty_args() -> WikingSettings {
        WikingSettings::load_from_iter([OsString::from("wiking")]).expect("config should load")
    }

    #[rstest]
    fn defaults_are_used_when_missing() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        let site = settings.site_settings();
        assert_eq!(site.title, DEFAULT_SITE_TITLE);
        assert_eq!(site.languages, vec!["en".to_owned()]);
        assert!(site.allow_registration);
        assert!(!site.maintenance);
        assert_eq!(site.password_change_uri, DEFAULT_PASSWORD_CHANGE_URI);
        assert_eq!(site.session_policy, SessionPolicy::from_hours(2));
        assert_eq!(
            settings.bind_addr().expect("default address").port(),
            8080
        );
        assert!(settings.doc_dirs().expect("no directories").is_empty());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("WIKING_SITE_TITLE", Some("Example".to_owned())),
            ("WIKING_LANGUAGES", Some("en, cs".to_owned())),
            (
                "WIKING_DEFAULT_LANGUAGE_BY_DOMAIN",
                Some("www.example.cz=cs".to_owned()),
            ),
            ("WIKING_SESSION_EXPIRATION", Some("8".to_owned())),
            ("WIKING_MAINTENANCE", Some("true".to_owned())),
            ("WIKING_DOC_DIRS", Some("cms=/usr/share/wiking/doc".to_owned())),
        ]);

        let settings = load_from_empty_args();
        let site = settings.site_settings();
        assert_eq!(site.title, "Example");
        assert_eq!(site.languages, vec!["en".to_owned(), "cs".to_owned()]);
        assert!(site.maintenance);
        assert_eq!(site.session_policy, SessionPolicy::from_hours(8));
        assert_eq!(
            settings.doc_dirs().expect("directories").get("cms"),
            Some(&PathBuf::from("/usr/share/wiking/doc"))
        );
        assert!(settings.language_policy().is_ok());
    }

    #[rstest]
    #[case(Some("cms"))]
    #[case(Some("=/tmp"))]
    #[case(Some("cms=/tmp, broken"))]
    fn malformed_pairs_are_rejected(#[case] raw: Option<&str>) {
        assert!(matches!(
            pairs("doc_dirs", raw),
            Err(ConfigError::InvalidPair { .. })
        ));
    }

    #[rstest]
    fn bad_bind_addresses_are_reported() {
        let mut settings = load_from_empty_args();
        settings.bind_addr = Some("localhost".to_owned());
        assert!(matches!(
            settings.bind_addr(),
            Err(ConfigError::InvalidBindAddr { .. })
        ));
    }
}
