//! User accounts and the authenticated identity.

use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Role, RoleContainment, RoleSet};

/// Validation errors for [`Login`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginNameError {
    /// Blank once trimmed.
    Empty,
    /// Longer than [`Login::MAX_LEN`].
    TooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// Contains characters outside the accepted set.
    InvalidCharacters,
}

impl fmt::Display for LoginNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "login name must not be empty"),
            Self::TooLong { max } => write!(f, "login name must be at most {max} characters"),
            Self::InvalidCharacters => write!(
                f,
                "login name may only contain letters, digits, dots, dashes, underscores or @",
            ),
        }
    }
}

impl std::error::Error for LoginNameError {}

/// Numeric user identifier (the `uid` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
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

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static LOGIN_RE: OnceLock<Regex> = OnceLock::new();

fn login_regex() -> &'static Regex {
    LOGIN_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._@-]+$")
            .unwrap_or_else(|error| panic!("login regex failed to compile: {error}"))
    })
}

/// Login name, unique per user and used as the record's URI segment.
///
/// # Examples
/// ```
/// use wiking::domain::Login;
///
/// assert!(Login::new("joe.doe").is_ok());
/// assert!(Login::new("joe doe").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Login(String);

impl Login {
    /// Maximum accepted length.
    pub const MAX_LEN: usize = 64;

    /// Validate a login name.
    ///
    /// # Errors
    /// [`LoginNameError`] describing the first violated rule.
    pub fn new(value: impl AsRef<str>) -> Result<Self, LoginNameError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(LoginNameError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(LoginNameError::TooLong { max: Self::MAX_LEN });
        }
        if !login_regex().is_match(trimmed) {
            return Err(LoginNameError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The login as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Login {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Login {
    type Error = LoginNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Login> for String {
    fn from(value: Login) -> Self {
        value.0
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account state stored with the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    /// Registered but the activation code was not confirmed yet.
    Unconfirmed,
    /// Confirmed, waiting for approval by an administrator.
    Unapproved,
    /// Fully enabled.
    Enabled,
    /// Blocked by an administrator.
    Blocked,
}

impl AccountState {
    /// Parse the stored column value; unknown values are treated as blocked.
    #[must_use]
    pub fn from_column(value: &str) -> Self {
        match value {
            "new" | "unconfirmed" => Self::Unconfirmed,
            "unapproved" => Self::Unapproved,
            "enabled" => Self::Enabled,
            _ => Self::Blocked,
        }
    }

    /// Computed roles implied by the state.
    fn implied_roles(self) -> Vec<Role> {
        match self {
            Self::Unconfirmed => Vec::new(),
            Self::Unapproved | Self::Blocked => vec![Role::REGISTERED],
            Self::Enabled => vec![Role::REGISTERED, Role::USER],
        }
    }
}

/// A stored user account as returned by the user repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// Identifier.
    pub uid: UserId,
    /// Login name.
    pub login: Login,
    /// Display name.
    pub name: String,
    /// E-mail address.
    pub email: Option<String>,
    /// Account state.
    pub state: AccountState,
    /// Stored password (`prefix:data`).
    pub password: String,
    /// Date after which the password must be changed.
    pub password_expiration: Option<NaiveDate>,
    /// Preferred language stored with the account.
    pub lang: Option<String>,
}

/// The identity a request acts under, with its fully expanded role set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    uid: UserId,
    login: Login,
    name: String,
    email: Option<String>,
    password_expiration: Option<NaiveDate>,
    lang: Option<String>,
    roles: RoleSet,
}

impl User {
    /// Build the identity from an account and its explicitly assigned roles.
    ///
    /// The special roles `ANYONE`, `AUTHENTICATED` and those implied by the
    /// account state are added before expansion through `containment`.
    #[must_use]
    pub fn from_account(
        account: UserAccount,
        assigned: &[Role],
        containment: &RoleContainment,
    ) -> Self {
        let direct = [Role::ANYONE, Role::AUTHENTICATED]
            .into_iter()
            .chain(account.state.implied_roles())
            .chain(assigned.iter().filter(|role| !role.is_special()).cloned());
        Self {
            uid: account.uid,
            login: account.login,
            name: account.name,
            email: account.email,
            password_expiration: account.password_expiration,
            lang: account.lang,
            roles: containment.expand(direct),
        }
    }

    /// Identifier.
    #[must_use]
    pub fn uid(&self) -> UserId {
        self.uid
    }

    /// Login name.
    #[must_use]
    pub fn login(&self) -> &Login {
        &self.login
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// E-mail address.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Preferred language stored with the account.
    #[must_use]
    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Expanded role set.
    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Whether the password expired on or before `today`.
    #[must_use]
    pub fn password_expired(&self, today: NaiveDate) -> bool {
        self.password_expiration.is_some_and(|date| date <= today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn account(state: AccountState) -> UserAccount {
        UserAccount {
            uid: UserId::new(7),
            login: Login::new("joe").expect("valid login"),
            name: "Joe".to_owned(),
            email: None,
            state,
            password: "plain:x".to_owned(),
            password_expiration: NaiveDate::from_ymd_opt(2026, 1, 31),
            lang: None,
        }
    }

    #[rstest]
    #[case("", LoginNameError::Empty)]
    #[case("   ", LoginNameError::Empty)]
    #[case("joe doe", LoginNameError::InvalidCharacters)]
    #[case("joe/doe", LoginNameError::InvalidCharacters)]
    fn invalid_logins_are_rejected(#[case] raw: &str, #[case] expected: LoginNameError) {
        assert_eq!(Login::new(raw), Err(expected));
    }

    #[rstest]
    fn overly_long_logins_are_rejected() {
        let raw = "a".repeat(Login::MAX_LEN + 1);
        assert_eq!(Login::new(raw), Err(LoginNameError::TooLong { max: 64 }));
    }

    #[rstest]
    #[case(AccountState::Enabled, true, true)]
    #[case(AccountState::Unapproved, false, true)]
    #[case(AccountState::Blocked, false, true)]
    #[case(AccountState::Unconfirmed, false, false)]
    fn state_implies_special_roles(
        #[case] state: AccountState,
        #[case] user: bool,
        #[case] registered: bool,
    ) {
        let identity = User::from_account(account(state), &[], &RoleContainment::default());
        assert!(identity.roles().contains(&Role::AUTHENTICATED));
        assert_eq!(identity.roles().contains(&Role::USER), user);
        assert_eq!(identity.roles().contains(&Role::REGISTERED), registered);
    }

    #[rstest]
    fn assigned_roles_are_expanded_and_special_ones_ignored() {
        let identity = User::from_account(
            account(AccountState::Enabled),
            &[Role::ADMIN, Role::OWNER],
            &RoleContainment::standard(),
        );
        assert!(identity.roles().contains(&Role::CONTENT_ADMIN));
        assert!(!identity.roles().contains(&Role::OWNER));
    }

    #[rstest]
    #[case(2026, 1, 30, false)]
    #[case(2026, 1, 31, true)]
    #[case(2026, 2, 1, true)]
    fn password_expiration_is_inclusive(
        #[case] y: i32,
        #[case] m: u32,
        #[case] d: u32,
        #[case] expired: bool,
    ) {
        let identity = User::from_account(
            account(AccountState::Enabled),
            &[],
            &RoleContainment::default(),
        );
        let today = NaiveDate::from_ymd_opt(y, m, d).expect("valid date");
        assert_eq!(identity.password_expired(today), expired);
    }
}
