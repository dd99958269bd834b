//! Port for bulk rewriting of stored passwords.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by credential repository adapters.
    pub enum CredentialRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "credential repository connection failed: {message}",
        /// Query or mutation failed; nothing was changed.
        Query { message: String } => "credential repository query failed: {message}",
    }
}

/// Function computing the replacement of one stored password, `None` to
/// keep it.
pub type PasswordRewrite<'a> = &'a (dyn Fn(&str) -> Option<String> + Send + Sync);

/// Transactional access to every user's stored password.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Read all stored passwords and write back those `rewrite` replaces,
    /// inside one transaction. Returns the number of rows updated.
    async fn rewrite_passwords(
        &self,
        rewrite: PasswordRewrite<'_>,
    ) -> Result<usize, CredentialRepositoryError>;
}

/// In-memory credentials keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryCredentialRepository {
    passwords: Mutex<Vec<(UserId, String)>>,
}

impl InMemoryCredentialRepository {
    /// Repository holding `passwords`.
    #[must_use]
    pub fn new(passwords: Vec<(UserId, String)>) -> Self {
        Self {
            passwords: Mutex::new(passwords),
        }
    }

    /// Current stored passwords.
    ///
    /// # Errors
    /// Fails only when the store is poisoned.
    pub fn snapshot(&self) -> Result<Vec<(UserId, String)>, CredentialRepositoryError> {
        self.passwords
            .lock()
            .map(|passwords| passwords.clone())
            .map_err(|_| CredentialRepositoryError::query("credential store poisoned"))
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn rewrite_passwords(
        &self,
        rewrite: PasswordRewrite<'_>,
    ) -> Result<usize, CredentialRepositoryError> {
        let mut passwords = self
            .passwords
            .lock()
            .map_err(|_| CredentialRepositoryError::query("credential store poisoned"))?;
        let mut updated = 0;
        for (_, stored) in passwords.iter_mut() {
            if let Some(replacement) = rewrite(stored.as_str()) {
                *stored = replacement;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
