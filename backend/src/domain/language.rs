//! Language negotiation.

use std::collections::BTreeMap;

use super::Request;

/// Cookie persisting an explicit language choice.
pub const LANGUAGE_COOKIE: &str = "wiking_prefered_language";

/// Parameter selecting a language for this and later requests.
pub const SET_LANGUAGE_PARAM: &str = "setlang";

/// Locale hint sent by a well known crawler (`en_US` form).
pub const CRAWLER_LOCALE_PARAM: &str = "fb_locale";

const LANGUAGE_COOKIE_MAX_AGE: i64 = 60 * 60 * 24 * 365;

/// Configured defaults used at the end of the preference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePolicy {
    default: String,
    by_domain: BTreeMap<String, String>,
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self::new("en", BTreeMap::new())
    }
}

impl LanguagePolicy {
    /// Policy with a global default and per-host defaults.
    #[must_use]
    pub fn new(default: impl Into<String>, by_domain: BTreeMap<String, String>) -> Self {
        Self {
            default: default.into(),
            by_domain,
        }
    }

    /// Global default language.
    #[must_use]
    pub fn default_language(&self) -> &str {
        &self.default
    }

    /// Compute the preference list for `req` and store it on the request.
    ///
    /// An explicit `setlang` choice is also persisted in
    /// [`LANGUAGE_COOKIE`].
    pub fn negotiate(&self, req: &mut Request) {
        let mut order: Vec<String> = Vec::new();
        if let Some(lang) = req.param(SET_LANGUAGE_PARAM).and_then(language_tag) {
            req.set_cookie(LANGUAGE_COOKIE, lang.clone(), Some(LANGUAGE_COOKIE_MAX_AGE));
            push_unique(&mut order, lang);
        }
        if let Some(lang) = req
            .param(CRAWLER_LOCALE_PARAM)
            .and_then(|locale| locale.split('_').next())
            .and_then(language_tag)
        {
            push_unique(&mut order, lang);
        }
        if let Some(lang) = req.cookie(LANGUAGE_COOKIE).and_then(language_tag) {
            push_unique(&mut order, lang);
        }
        for lang in parse_accept_language(req.header("accept-language").unwrap_or_default()) {
            push_unique(&mut order, lang);
        }
        if let Some(lang) = req.host().and_then(|host| self.by_domain.get(host)) {
            push_unique(&mut order, lang.clone());
        }
        push_unique(&mut order, self.default.clone());
        req.set_preferred_languages(order);
    }
}

/// Lower-cased two or three letter language code, or `None` for anything
/// else.
fn language_tag(raw: &str) -> Option<String> {
    let lang = raw.trim();
    ((2..=3).contains(&lang.len()) && lang.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| lang.to_ascii_lowercase())
}

fn push_unique(order: &mut Vec<String>, lang: String) {
    if !lang.is_empty() && !order.contains(&lang) {
        order.push(lang);
    }
}

/// Parse an `Accept-Language` header into language codes.
///
/// Entries are ordered by quality (stable for equal values) and country
/// suffixes are stripped. Wildcards, malformed codes, `q=0` entries and
/// duplicates are dropped.
///
/// # Examples
/// ```
/// use wiking::domain::parse_accept_language;
///
/// assert_eq!(
///     parse_accept_language("cs-CZ,en;q=0.5,de;q=0.8,cs;q=0.9,*;q=0.1"),
///     vec!["cs", "de", "en"],
/// );
/// ```
#[must_use]
pub fn parse_accept_language(header: &str) -> Vec<String> {
    let mut entries: Vec<(u16, String)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = parts.next()?.trim();
            let quality = parts
                .filter_map(|param| param.trim().strip_prefix("q="))
                .find_map(parse_quality)
                .unwrap_or(1000);
            let lang = language_tag(tag.split('-').next()?)?;
            (quality > 0).then_some((quality, lang))
        })
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0));
    let mut order = Vec::new();
    for (_, lang) in entries {
        push_unique(&mut order, lang);
    }
    order
}

/// Quality value in thousandths, avoiding float arithmetic.
fn parse_quality(raw: &str) -> Option<u16> {
    let (whole, fraction) = raw.trim().split_once('.').unwrap_or((raw.trim(), ""));
    let whole: u16 = whole.parse().ok()?;
    if whole > 1 || fraction.len() > 3 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{fraction:0<3}");
    let thousandths: u16 = padded.parse().ok()?;
    let value = whole * 1000 + thousandths;
    (value <= 1000).then_some(value)
}
