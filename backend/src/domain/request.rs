//! Transport-agnostic request state.
//!
//! A [`Request`] is built by the inbound adapter, then consumed and mutated
//! across the resolution chain: the resolver and the modules pop path
//! segments, authentication attaches the user, and handlers queue messages
//! and cookie updates that the adapter writes into the response.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use super::{Action, Error, Role, User};

/// Bytes escaped in a path segment: RFC 3986 `pchar` complement.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encode `segment` for use as one URI path segment.
///
/// # Examples
/// ```
/// use wiking::domain::path_segment;
///
/// assert_eq!(path_segment("a b/c?"), "a%20b%2Fc%3F");
/// assert_eq!(path_segment("news-2024"), "news-2024");
/// ```
#[must_use]
pub fn path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

fn joined(segments: &[String]) -> String {
    let encoded: Vec<String> = segments.iter().map(String::as_str).map(path_segment).collect();
    format!("/{}", encoded.join("/"))
}

/// Parameters whose values never leave the process.
const REDACTED: &str = "***";

/// HTTP method, reduced to what the dispatcher distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET` (and `HEAD`).
    Get,
    /// `POST`.
    Post,
    /// `OPTIONS`.
    Options,
    /// Anything else.
    Other,
}

impl Method {
    /// Parse a method name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" => Self::Get,
            "POST" => Self::Post,
            "OPTIONS" => Self::Options,
            _ => Self::Other,
        }
    }
}

/// Multi-valued request parameters (query string and form body).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, Vec<String>>);

impl Params {
    /// Collect `(name, value)` pairs, keeping every value in order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (name, value) in pairs {
            params.insert(name, value);
        }
        params
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    /// All values of `name`.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.0.get(name).map_or(&[], Vec::as_slice)
    }

    /// Whether `name` was sent, possibly empty.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Append a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Replace all values of `name` with one value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), vec![value.into()]);
    }

    /// Drop `name`.
    pub fn remove(&mut self, name: &str) {
        self.0.remove(name);
    }

    /// Iterate names with their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Copy suitable for logs and bug reports, password-like values masked.
    ///
    /// # Examples
    /// ```
    /// use wiking::domain::Params;
    ///
    /// let params = Params::from_pairs([("login", "joe"), ("new_password", "s3cret")]);
    /// let redacted = params.redacted();
    /// assert_eq!(redacted.get("login"), Some("joe"));
    /// assert_eq!(redacted.get("new_password"), Some("***"));
    /// ```
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|(name, values)| {
                    let masked = if is_secret(name) {
                        values.iter().map(|_| REDACTED.to_owned()).collect()
                    } else {
                        values.clone()
                    };
                    (name.clone(), masked)
                })
                .collect(),
        )
    }
}

fn is_secret(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("password") || lower.contains("passwd")
}

/// Severity of a message shown above the document content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Informational.
    Info,
    /// Something needs attention.
    Warning,
    /// An operation failed.
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Severity.
    pub kind: MessageKind,
    /// Text.
    pub text: String,
}

/// Cookie write requested by the dispatch core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieUpdate {
    /// Cookie name.
    pub name: String,
    /// New value; `None` removes the cookie.
    pub value: Option<String>,
    /// Lifetime in seconds; `None` for a browser session cookie.
    pub max_age: Option<i64>,
}

/// One request travelling through the dispatcher.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: Vec<String>,
    resolved: usize,
    params: Params,
    cookies: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
    server_uri: String,
    user: Option<User>,
    preferred_languages: Vec<String>,
    preview_mode: bool,
    messages: Vec<Message>,
    cookie_updates: Vec<CookieUpdate>,
}

impl Request {
    /// A request for `path`; empty segments are dropped and the rest are
    /// percent-decoded.
    ///
    /// # Examples
    /// ```
    /// use wiking::domain::{Method, Request};
    ///
    /// let mut req = Request::new(Method::Get, "/news/42/");
    /// assert_eq!(req.unresolved_path(), ["news", "42"]);
    /// assert_eq!(req.pop_unresolved().as_deref(), Some("news"));
    /// assert_eq!(req.resolved_uri(), "/news");
    /// ```
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
                .collect(),
            resolved: 0,
            params: Params::default(),
            cookies: BTreeMap::new(),
            headers: BTreeMap::new(),
            server_uri: String::new(),
            user: None,
            preferred_languages: Vec::new(),
            preview_mode: false,
            messages: Vec::new(),
            cookie_updates: Vec::new(),
        }
    }

    /// Replace the parameters.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Add one parameter value.
    #[must_use]
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Add a cookie sent by the client.
    #[must_use]
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Add a header; names are case insensitive.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_owned());
        self
    }

    /// Scheme and authority the request was addressed to, e.g.
    /// `https://www.example.org`.
    #[must_use]
    pub fn with_server_uri(mut self, server_uri: &str) -> Self {
        self.server_uri = server_uri.trim_end_matches('/').to_owned();
        self
    }

    /// Method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Segments not consumed yet.
    #[must_use]
    pub fn unresolved_path(&self) -> &[String] {
        self.path.get(self.resolved..).unwrap_or_default()
    }

    /// Consume the next segment.
    pub fn pop_unresolved(&mut self) -> Option<String> {
        let segment = self.path.get(self.resolved).cloned()?;
        self.resolved += 1;
        Some(segment)
    }

    /// Insert a segment to be consumed next, used when one module forwards
    /// to another under a synthetic path.
    pub fn push_unresolved(&mut self, segment: impl Into<String>) {
        self.path.insert(self.resolved, segment.into());
    }

    /// Segments consumed so far.
    #[must_use]
    pub fn resolved_path(&self) -> &[String] {
        self.path.get(..self.resolved).unwrap_or_default()
    }

    /// URI of the consumed segments, always starting with `/`.
    #[must_use]
    pub fn resolved_uri(&self) -> String {
        joined(self.resolved_path())
    }

    /// Full request path.
    #[must_use]
    pub fn uri(&self) -> String {
        joined(&self.path)
    }

    /// Server scheme and authority.
    #[must_use]
    pub fn server_uri(&self) -> &str {
        &self.server_uri
    }

    /// Host name without the port.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        let authority = self
            .server_uri
            .split_once("://")
            .map_or(self.server_uri.as_str(), |(_, rest)| rest);
        let host = authority.split(':').next().unwrap_or_default();
        (!host.is_empty()).then_some(host)
    }

    /// Whether the path addresses static resources.
    #[must_use]
    pub fn is_resource_request(&self) -> bool {
        self.path.first().is_some_and(|first| first == "_resources")
    }

    /// All parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// First value of parameter `name`, with empty values treated as absent.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).filter(|value| !value.is_empty())
    }

    /// Whether parameter `name` was sent at all.
    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains(name)
    }

    /// Replace parameter `name`.
    pub fn set_param(&mut self, name: &str, value: &str) {
        self.params.set(name, value);
    }

    /// Drop parameter `name`.
    pub fn remove_param(&mut self, name: &str) {
        self.params.remove(name);
    }

    /// The explicitly requested action, if any.
    ///
    /// # Errors
    /// [`Error::invalid_request`] for an unknown action name.
    pub fn action(&self) -> Result<Option<Action>, Error> {
        self.param("action")
            .map(|name| {
                Action::parse(name)
                    .ok_or_else(|| Error::invalid_request(format!("Invalid action: {name}")))
            })
            .transpose()
    }

    /// Cookie sent by the client.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Authenticated user.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Attach (or clear) the authenticated user.
    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    /// Whether the identity holds one of `roles`; `ANYONE` always matches.
    #[must_use]
    pub fn check_roles(&self, roles: &[Role]) -> bool {
        if roles.contains(&Role::ANYONE) {
            return true;
        }
        self.user
            .as_ref()
            .is_some_and(|user| user.roles().contains_any(roles))
    }

    /// Negotiated language preferences, most preferred first.
    #[must_use]
    pub fn preferred_languages(&self) -> &[String] {
        &self.preferred_languages
    }

    /// Store the negotiated language preferences.
    pub fn set_preferred_languages(&mut self, languages: Vec<String>) {
        self.preferred_languages = languages;
    }

    /// First preference present in `variants`, else the first variant.
    #[must_use]
    pub fn preferred_language<'a>(&'a self, variants: &'a [String]) -> Option<&'a str> {
        self.preferred_languages
            .iter()
            .find(|lang| variants.contains(lang))
            .or_else(|| variants.first())
            .map(String::as_str)
    }

    /// Most preferred language regardless of available variants.
    #[must_use]
    pub fn language(&self) -> &str {
        self.preferred_languages
            .first()
            .map_or("en", String::as_str)
    }

    /// Whether unpublished content is shown.
    #[must_use]
    pub fn preview_mode(&self) -> bool {
        self.preview_mode
    }

    /// Set the effective preview mode.
    pub fn set_preview_mode(&mut self, enabled: bool) {
        self.preview_mode = enabled;
    }

    /// Queue a message for the user.
    pub fn message(&mut self, kind: MessageKind, text: impl Into<String>) {
        self.messages.push(Message {
            kind,
            text: text.into(),
        });
    }

    /// Queued messages.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Take the queued messages.
    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    /// Set a cookie with `max_age` seconds of lifetime.
    pub fn set_cookie(&mut self, name: &str, value: impl Into<String>, max_age: Option<i64>) {
        self.cookie_updates.push(CookieUpdate {
            name: name.to_owned(),
            value: Some(value.into()),
            max_age,
        });
    }

    /// Remove a cookie from the client.
    pub fn clear_cookie(&mut self, name: &str) {
        self.cookies.remove(name);
        self.cookie_updates.push(CookieUpdate {
            name: name.to_owned(),
            value: None,
            max_age: None,
        });
    }

    /// Take the pending cookie writes.
    pub fn take_cookie_updates(&mut self) -> Vec<CookieUpdate> {
        std::mem::take(&mut self.cookie_updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn push_unresolved_is_consumed_next() {
        let mut req = Request::new(Method::Get, "/_registration");
        assert_eq!(req.pop_unresolved().as_deref(), Some("_registration"));
        req.push_unresolved("joe");
        assert_eq!(req.unresolved_path(), ["joe"]);
        assert_eq!(req.pop_unresolved().as_deref(), Some("joe"));
        assert_eq!(req.resolved_uri(), "/_registration/joe");
        assert!(req.pop_unresolved().is_none());
    }

    #[rstest]
    fn segments_are_decoded_and_uris_encoded_again() {
        let mut req = Request::new(Method::Get, "/news/caf%C3%A9%20bar/a%2Fb");
        assert_eq!(req.unresolved_path(), ["news", "café bar", "a/b"]);
        req.pop_unresolved();
        req.pop_unresolved();
        assert_eq!(req.resolved_uri(), "/news/caf%C3%A9%20bar");
        assert_eq!(req.uri(), "/news/caf%C3%A9%20bar/a%2Fb");
    }

    #[rstest]
    #[case("https://www.example.org", Some("www.example.org"))]
    #[case("http://localhost:8080", Some("localhost"))]
    #[case("", None)]
    fn host_strips_scheme_and_port(#[case] server: &str, #[case] expected: Option<&str>) {
        let req = Request::new(Method::Get, "/").with_server_uri(server);
        assert_eq!(req.host(), expected);
    }

    #[rstest]
    fn empty_params_are_treated_as_absent() {
        let req = Request::new(Method::Get, "/").with_param("key", "");
        assert!(req.param("key").is_none());
        assert!(req.has_param("key"));
    }

    #[rstest]
    fn anyone_matches_anonymous_requests() {
        let req = Request::new(Method::Get, "/");
        assert!(req.check_roles(&[Role::ANYONE]));
        assert!(!req.check_roles(&[Role::USER]));
    }

    #[rstest]
    fn unknown_action_is_an_invalid_request() {
        let req = Request::new(Method::Get, "/news").with_param("action", "explode");
        let err = req.action().expect_err("unknown action");
        assert_eq!(err.code(), crate::domain::ErrorCode::InvalidRequest);
    }

    #[rstest]
    fn preferred_language_falls_back_to_first_variant() {
        let mut req = Request::new(Method::Get, "/");
        req.set_preferred_languages(vec!["de".to_owned(), "cs".to_owned()]);
        let variants = vec!["en".to_owned(), "cs".to_owned()];
        assert_eq!(req.preferred_language(&variants), Some("cs"));
        let variants = vec!["fr".to_owned()];
        assert_eq!(req.preferred_language(&variants), Some("fr"));
    }

    #[rstest]
    fn redaction_masks_every_password_like_value() {
        let params = Params::from_pairs([
            ("password", "a"),
            ("password_verify", "a"),
            ("old_passwd", "b"),
            ("title", "c"),
        ]);
        let redacted = params.redacted();
        assert_eq!(redacted.get("password"), Some("***"));
        assert_eq!(redacted.get("password_verify"), Some("***"));
        assert_eq!(redacted.get("old_passwd"), Some("***"));
        assert_eq!(redacted.get("title"), Some("c"));
    }
}
