//! Port for looking up user accounts during authentication.
use async_trait::async_trait;

use crate::domain::{Login, UserAccount};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by user repository adapters.
    pub enum UserRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "user repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "user repository query failed: {message}",
    }
}

/// Read access to user accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch the account with `login`.
    async fn find_by_login(&self, login: &Login)
    -> Result<Option<UserAccount>, UserRepositoryError>;
}

/// In-memory accounts.
#[derive(Debug, Default, Clone)]
pub struct FixtureUserRepository {
    accounts: Vec<UserAccount>,
}

impl FixtureUserRepository {
    /// Serve `accounts`.
    #[must_use]
    pub fn new(accounts: Vec<UserAccount>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl UserRepository for FixtureUserRepository {
    async fn find_by_login(
        &self,
        login: &Login,
    ) -> Result<Option<UserAccount>, UserRepositoryError> {
        Ok(self
            .accounts
            .iter()
            .find(|account| account.login == *login)
            .cloned())
    }
}
