//! Login sessions.
//!
//! The client keeps `session_id:key` in the session cookie. The server keeps
//! the key with its last access time; a session is valid while it was
//! accessed within the configured expiration window.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

const KEY_BYTES: usize = 64;

/// Session row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(i64);

impl SessionId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Raw identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque session key drawn from the operating system RNG.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(Zeroizing<String>);

impl SessionKey {
    /// Generate a fresh key (64 random bytes, hex encoded).
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0_u8; KEY_BYTES]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(Zeroizing::new(hex::encode(&bytes[..])))
    }

    /// Wrap a key received from the client or read from storage.
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(***)")
    }
}

/// The client-side session cookie value, `session_id:key`.
///
/// # Examples
/// ```
/// use wiking::domain::SessionToken;
///
/// let token: SessionToken = "42:abcdef".parse().expect("valid token");
/// assert_eq!(token.id().value(), 42);
/// assert_eq!(token.to_string(), "42:abcdef");
/// assert!("nonsense".parse::<SessionToken>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    id: SessionId,
    key: SessionKey,
}

impl SessionToken {
    /// Combine a stored id with its key.
    #[must_use]
    pub fn new(id: SessionId, key: SessionKey) -> Self {
        Self { id, key }
    }

    /// Session row identifier.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Session key.
    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }
}

/// Malformed session cookie.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed session token")]
pub struct SessionTokenError;

impl FromStr for SessionToken {
    type Err = SessionTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, key) = s.split_once(':').ok_or(SessionTokenError)?;
        let id = id.parse::<i64>().map_err(|_| SessionTokenError)?;
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SessionTokenError);
        }
        Ok(Self::new(SessionId::new(id), SessionKey::from_string(key)))
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.key.as_str())
    }
}

/// Time based expiration rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    expiration: Duration,
}

impl SessionPolicy {
    /// Sessions expire `hours` after their last access.
    #[must_use]
    pub fn from_hours(hours: u32) -> Self {
        Self {
            expiration: Duration::hours(i64::from(hours)),
        }
    }

    /// The expiration window.
    #[must_use]
    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Oldest last access time still considered valid at `now`.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.expiration
    }

    /// Whether a session last accessed at `last_access` expired at `now`.
    #[must_use]
    pub fn is_expired(&self, last_access: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        last_access < self.cutoff(now)
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from_hours(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn generated_keys_are_long_and_distinct() {
        let first = SessionKey::generate();
        let second = SessionKey::generate();
        assert_eq!(first.as_str().len(), KEY_BYTES * 2);
        assert_ne!(first, second);
    }

    #[rstest]
    #[case("")]
    #[case("12")]
    #[case("x:abc")]
    #[case("12:")]
    #[case("12:not hex")]
    fn malformed_tokens_are_rejected(#[case] raw: &str) {
        assert!(raw.parse::<SessionToken>().is_err());
    }

    #[rstest]
    fn debug_output_hides_the_key() {
        let token = SessionToken::new(SessionId::new(1), SessionKey::from_string("abcd"));
        assert!(!format!("{token:?}").contains("abcd"));
    }

    #[rstest]
    #[case(119, false)]
    #[case(120, false)]
    #[case(121, true)]
    fn expiry_is_measured_from_last_access(#[case] minutes_ago: i64, #[case] expired: bool) {
        let now = Utc::now();
        let policy = SessionPolicy::from_hours(2);
        assert_eq!(
            policy.is_expired(now - Duration::minutes(minutes_ago), now),
            expired
        );
    }
}
