//! Cookie based authentication.
//!
//! A successful login stores two cookies: the login name, kept for
//! `login_cookie_days`, and the session token `id:key`, kept for the session
//! expiration. Later requests present both; the token is checked against the
//! stored session, which expires after a fixed time without access.

use std::sync::Arc;

use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::ports::{RoleRepository, SessionRepository, UserRepository};
use super::{
    Error, Login, PasswordStorage, Request, RoleContainment, SessionKey, SessionPolicy,
    SessionToken, User, UserAccount,
};

/// Cookie holding the login name.
pub const LOGIN_COOKIE: &str = "wiking_login";
/// Cookie holding the session token.
pub const SESSION_COOKIE: &str = "wiking_session_key";
/// Parameter selecting a login or logout command.
pub const COMMAND_PARAM: &str = "command";
/// Login name parameter of the login form.
pub const LOGIN_PARAM: &str = "login";
/// Password parameter of the login form.
pub const PASSWORD_PARAM: &str = "password";

const SECONDS_PER_DAY: i64 = 86_400;

/// Reason an authentication attempt failed, carried in error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationFailure {
    /// The login form was sent without a login name.
    NoLogin,
    /// The login form was sent without a password.
    NoPassword,
    /// Unknown login or wrong password; deliberately not distinguished.
    InvalidCredentials,
    /// The session cookie no longer matches a live session.
    SessionExpired,
    /// The resource needs an authenticated user.
    LoginRequired,
}

impl AuthenticationFailure {
    /// Text shown above the login form.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoLogin => "Enter your login name, please!",
            Self::NoPassword => "Enter your password, please!",
            Self::InvalidCredentials => "Invalid login!",
            Self::SessionExpired => "Your session expired.  Please log in again.",
            Self::LoginRequired => "Login required.",
        }
    }

    /// The 401 error carrying this failure.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::unauthorized(self.message()).with_details(json!({ "failure": self }))
    }

    /// Failure recorded in `error`, if any.
    #[must_use]
    pub fn of(error: &Error) -> Option<Self> {
        error
            .details()
            .and_then(|details| details.get("failure"))
            .and_then(|failure| serde_json::from_value(failure.clone()).ok())
    }
}

/// Identity established for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// No credentials were presented.
    Anonymous,
    /// Cookies were presented but their session is gone.
    SessionExpired,
    /// Authenticated user.
    User(User),
}

/// Establishes the [`Identity`] of requests and handles login and logout.
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    sessions: Arc<dyn SessionRepository>,
    passwords: Arc<dyn PasswordStorage>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
    login_cookie_days: u32,
}

impl Authenticator {
    /// Authenticator over the given ports.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        sessions: Arc<dyn SessionRepository>,
        passwords: Arc<dyn PasswordStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            roles,
            sessions,
            passwords,
            clock,
            policy: SessionPolicy::default(),
            login_cookie_days: 30,
        }
    }

    /// Override the session expiration.
    #[must_use]
    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the lifetime of the login name cookie.
    #[must_use]
    pub fn with_login_cookie_days(mut self, days: u32) -> Self {
        self.login_cookie_days = days;
        self
    }

    /// Authenticate `req`, performing a requested login or logout.
    ///
    /// Role membership is expanded through `containment`.
    ///
    /// # Errors
    /// 401 errors with an [`AuthenticationFailure`] for failed logins;
    /// internal errors when a repository fails.
    pub async fn authenticate(
        &self,
        req: &mut Request,
        containment: &RoleContainment,
    ) -> Result<Identity, Error> {
        let command = req.param(COMMAND_PARAM).map(str::to_owned);
        match command.as_deref() {
            Some("logout") => {
                self.logout(req).await?;
                Ok(Identity::Anonymous)
            }
            Some("login") => self.login(req, containment).await.map(Identity::User),
            _ => self.resume(req, containment).await,
        }
    }

    async fn login(&self, req: &mut Request, containment: &RoleContainment) -> Result<User, Error> {
        let login = req
            .param(LOGIN_PARAM)
            .ok_or_else(|| AuthenticationFailure::NoLogin.into_error())?
            .to_owned();
        let password = req
            .param(PASSWORD_PARAM)
            .ok_or_else(|| AuthenticationFailure::NoPassword.into_error())?
            .to_owned();
        req.remove_param(PASSWORD_PARAM);
        req.remove_param(COMMAND_PARAM);
        let account = self
            .account(&login)
            .await?
            .filter(|account| self.passwords.check_password(&password, &account.password));
        let Some(account) = account else {
            info!(login = %login, "login failed");
            return Err(AuthenticationFailure::InvalidCredentials.into_error());
        };
        let now = self.clock.utc();
        let key = SessionKey::generate();
        let id = self
            .sessions
            .create(account.uid, &key, now, self.policy.cutoff(now))
            .await
            .map_err(|error| Error::internal(error.to_string()))?;
        req.set_cookie(
            LOGIN_COOKIE,
            account.login.as_str(),
            Some(i64::from(self.login_cookie_days) * SECONDS_PER_DAY),
        );
        req.set_cookie(
            SESSION_COOKIE,
            SessionToken::new(id, key).to_string(),
            Some(self.policy.expiration().num_seconds()),
        );
        info!(login = %login, "user logged in");
        self.user(account, containment).await
    }

    async fn logout(&self, req: &mut Request) -> Result<(), Error> {
        let token = req
            .cookie(SESSION_COOKIE)
            .and_then(|raw| raw.parse::<SessionToken>().ok());
        let login = req.cookie(LOGIN_COOKIE).map(str::to_owned);
        if let (Some(token), Some(login)) = (token, login) {
            if let Some(account) = self.account(&login).await? {
                self.sessions
                    .close(&token, account.uid)
                    .await
                    .map_err(|error| Error::internal(error.to_string()))?;
            }
        }
        req.clear_cookie(SESSION_COOKIE);
        debug!("session closed");
        Ok(())
    }

    async fn resume(
        &self,
        req: &mut Request,
        containment: &RoleContainment,
    ) -> Result<Identity, Error> {
        let (Some(login), Some(raw_token)) = (req.cookie(LOGIN_COOKIE), req.cookie(SESSION_COOKIE))
        else {
            return Ok(Identity::Anonymous);
        };
        let login = login.to_owned();
        let token = raw_token.parse::<SessionToken>();
        let account = match token {
            Ok(_) => self.account(&login).await?,
            Err(_) => None,
        };
        let (Ok(token), Some(account)) = (token, account) else {
            warn!(login = %login, "discarding unusable session cookie");
            req.clear_cookie(SESSION_COOKIE);
            return Ok(Identity::SessionExpired);
        };
        let now = self.clock.utc();
        let live = self
            .sessions
            .check(&token, account.uid, now, self.policy.cutoff(now))
            .await
            .map_err(|error| Error::internal(error.to_string()))?;
        if !live {
            debug!(login = %login, "session expired");
            req.clear_cookie(SESSION_COOKIE);
            return Ok(Identity::SessionExpired);
        }
        self.user(account, containment).await.map(Identity::User)
    }

    async fn account(&self, login: &str) -> Result<Option<UserAccount>, Error> {
        let Ok(login) = Login::new(login) else {
            return Ok(None);
        };
        self.users
            .find_by_login(&login)
            .await
            .map_err(|error| Error::internal(error.to_string()))
    }

    async fn user(&self, account: UserAccount, containment: &RoleContainment) -> Result<User, Error> {
        let assigned = self
            .roles
            .member_roles(account.uid)
            .await
            .map_err(|error| Error::internal(error.to_string()))?;
        Ok(User::from_account(account, &assigned, containment))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ports::{
        FixtureRoleRepository, FixtureUserRepository, InMemorySessionRepository,
        MockSessionRepository,
    };
    use crate::domain::{
        AccountState, ErrorCode, Method, Pbkdf2PasswordStorage, Role, UniversalPasswordStorage,
        UserId,
    };
    use chrono::{DateTime, Duration, Local, TimeZone, Utc};
    use rstest::{fixture, rstest};
    use std::sync::Mutex;

    struct StepClock(Mutex<DateTime<Utc>>);

    impl StepClock {
        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().expect("clock lock");
            *now += by;
        }
    }

    impl Clock for StepClock {
        fn local(&self) -> DateTime<Local> {
            self.utc().with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            *self.0.lock().expect("clock lock")
        }
    }

    struct Harness {
        auth: Authenticator,
        clock: Arc<StepClock>,
        sessions: Arc<InMemorySessionRepository>,
    }

    fn joe() -> UserAccount {
        UserAccount {
            uid: UserId::new(7),
            login: Login::new("joe").expect("login"),
            name: "Joe".to_owned(),
            email: None,
            state: AccountState::Enabled,
            password: "plain:secret".to_owned(),
            password_expiration: None,
            lang: None,
        }
    }

    #[fixture]
    fn harness() -> Harness {
        let clock = Arc::new(StepClock(Mutex::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
                .single()
                .expect("timestamp"),
        )));
        let sessions = Arc::new(InMemorySessionRepository::default());
        let roles = FixtureRoleRepository::default().with_member(UserId::new(7), Role::CONTENT_ADMIN);
        let auth = Authenticator::new(
            Arc::new(FixtureUserRepository::new(vec![joe()])),
            Arc::new(roles),
            sessions.clone(),
            Arc::new(UniversalPasswordStorage::new(
                Pbkdf2PasswordStorage::with_iterations(10),
            )),
            clock.clone(),
        );
        Harness {
            auth,
            clock,
            sessions,
        }
    }

    fn login_request(login: &str, password: &str) -> Request {
        Request::new(Method::Post, "/")
            .with_param(COMMAND_PARAM, "login")
            .with_param(LOGIN_PARAM, login)
            .with_param(PASSWORD_PARAM, password)
    }

    fn cookie_request(updates: &[crate::domain::CookieUpdate]) -> Request {
        updates.iter().fold(Request::new(Method::Get, "/"), |req, update| {
            req.with_cookie(&update.name, update.value.as_deref().unwrap_or_default())
        })
    }

    #[rstest]
    #[case("", "secret", AuthenticationFailure::NoLogin)]
    #[case("joe", "", AuthenticationFailure::NoPassword)]
    #[case("joe", "wrong", AuthenticationFailure::InvalidCredentials)]
    #[case("nobody", "secret", AuthenticationFailure::InvalidCredentials)]
    #[tokio::test]
    async fn failed_logins_report_the_reason(
        harness: Harness,
        #[case] login: &str,
        #[case] password: &str,
        #[case] expected: AuthenticationFailure,
    ) {
        let mut req = login_request(login, password);
        let err = harness
            .auth
            .authenticate(&mut req, &RoleContainment::standard())
            .await
            .expect_err("login fails");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(AuthenticationFailure::of(&err), Some(expected));
        assert!(req.take_cookie_updates().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn login_sets_both_cookies_and_expands_roles(harness: Harness) {
        let mut req = login_request("joe", "secret");
        let identity = harness
            .auth
            .authenticate(&mut req, &RoleContainment::standard())
            .await
            .expect("login");
        let Identity::User(user) = identity else {
            panic!("expected a user");
        };
        assert!(user.roles().contains(&Role::USER));
        assert!(user.roles().contains(&Role::CONTENT_ADMIN));
        assert!(!req.has_param(PASSWORD_PARAM));
        let updates = req.take_cookie_updates();
        let names: Vec<&str> = updates.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec![LOGIN_COOKIE, SESSION_COOKIE]);
        assert!(updates[0].max_age > updates[1].max_age);
        assert_eq!(harness.sessions.len().expect("sessions"), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn sessions_expire_after_inactivity(harness: Harness) {
        let containment = RoleContainment::standard();
        let mut req = login_request("joe", "secret");
        harness
            .auth
            .authenticate(&mut req, &containment)
            .await
            .expect("login");
        let cookies = req.take_cookie_updates();

        harness.clock.advance(Duration::minutes(90));
        let mut next = cookie_request(&cookies);
        let identity = harness
            .auth
            .authenticate(&mut next, &containment)
            .await
            .expect("resume");
        assert!(matches!(identity, Identity::User(_)));

        harness.clock.advance(Duration::minutes(121));
        let mut late = cookie_request(&cookies);
        let identity = harness
            .auth
            .authenticate(&mut late, &containment)
            .await
            .expect("resume");
        assert_eq!(identity, Identity::SessionExpired);
        assert!(late.cookie(SESSION_COOKIE).is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn logout_closes_the_session() {
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_close()
            .withf(|token, uid| token.id().value() == 5 && *uid == UserId::new(7))
            .times(1)
            .return_once(|_, _| Ok(()));
        let auth = Authenticator::new(
            Arc::new(FixtureUserRepository::new(vec![joe()])),
            Arc::new(FixtureRoleRepository::default()),
            Arc::new(sessions),
            Arc::new(UniversalPasswordStorage::default()),
            Arc::new(mockable::DefaultClock),
        );
        let mut req = Request::new(Method::Get, "/")
            .with_param(COMMAND_PARAM, "logout")
            .with_cookie(LOGIN_COOKIE, "joe")
            .with_cookie(SESSION_COOKIE, "5:abcd");
        let identity = auth
            .authenticate(&mut req, &RoleContainment::standard())
            .await
            .expect("logout");
        assert_eq!(identity, Identity::Anonymous);
        assert!(req.cookie(SESSION_COOKIE).is_none());
        assert_eq!(req.cookie(LOGIN_COOKIE), Some("joe"));
    }

    #[rstest]
    #[tokio::test]
    async fn forged_logout_leaves_other_sessions_alive(harness: Harness) {
        let containment = RoleContainment::standard();
        let mut req = login_request("joe", "secret");
        harness
            .auth
            .authenticate(&mut req, &containment)
            .await
            .expect("login");
        let cookies = req.take_cookie_updates();

        for (login, token) in [(None, "1:00"), (Some("joe"), "1:00")] {
            let mut forged = Request::new(Method::Get, "/")
                .with_param(COMMAND_PARAM, "logout")
                .with_cookie(SESSION_COOKIE, token);
            if let Some(login) = login {
                forged = forged.with_cookie(LOGIN_COOKIE, login);
            }
            let identity = harness
                .auth
                .authenticate(&mut forged, &containment)
                .await
                .expect("logout");
            assert_eq!(identity, Identity::Anonymous);
        }
        assert_eq!(harness.sessions.len().expect("sessions"), 1);

        let mut next = cookie_request(&cookies);
        let identity = harness
            .auth
            .authenticate(&mut next, &containment)
            .await
            .expect("resume");
        assert!(matches!(identity, Identity::User(_)));
    }

    #[rstest]
    fn failures_round_trip_through_error_details() {
        let err = AuthenticationFailure::LoginRequired.into_error();
        assert_eq!(AuthenticationFailure::of(&err), Some(AuthenticationFailure::LoginRequired));
        assert_eq!(AuthenticationFailure::of(&Error::forbidden("no")), None);
    }
}
