//! Salting of legacy password records.
//!
//! Plain text passwords become `pbkdf2` records; unsalted md5 digests become
//! `pbkdf2/md5` records computed over the digest, so no plaintext is needed.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::ports::{CredentialRepository, CredentialRepositoryError};
use super::{PasswordScheme, PasswordStorage, Pbkdf2PasswordStorage};

/// Counts of rewritten passwords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RehashSummary {
    /// Converted from `plain`.
    pub from_plain: usize,
    /// Converted from `md5u`.
    pub from_md5: usize,
}

impl RehashSummary {
    /// All converted records.
    #[must_use]
    pub fn total(&self) -> usize {
        self.from_plain + self.from_md5
    }
}

impl fmt::Display for RehashSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total {} passwords updated ({} from plain text, {} from md5).",
            self.total(),
            self.from_plain,
            self.from_md5
        )
    }
}

/// Salted replacement of one stored password, `None` when it needs none.
#[must_use]
pub fn rehash(stored: &str, pbkdf2: &Pbkdf2PasswordStorage) -> Option<(PasswordScheme, String)> {
    let (scheme, data) = PasswordScheme::split(stored)?;
    let salted = match scheme {
        PasswordScheme::Plain => PasswordScheme::Pbkdf2,
        PasswordScheme::UnsaltedMd5 => PasswordScheme::Pbkdf2Md5,
        PasswordScheme::Pbkdf2 | PasswordScheme::Pbkdf2Md5 => return None,
    };
    Some((
        scheme,
        format!("{}:{}", salted.prefix(), pbkdf2.stored_password(data)),
    ))
}

/// Rewrite every legacy password in one transaction.
///
/// # Errors
/// Repository failures; nothing is committed then.
pub async fn salt_passwords(
    credentials: &dyn CredentialRepository,
    pbkdf2: &Pbkdf2PasswordStorage,
) -> Result<RehashSummary, CredentialRepositoryError> {
    let from_plain = AtomicUsize::new(0);
    let from_md5 = AtomicUsize::new(0);
    let rewrite = |stored: &str| {
        let (scheme, replacement) = rehash(stored, pbkdf2)?;
        let counter = if scheme == PasswordScheme::Plain {
            &from_plain
        } else {
            &from_md5
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Some(replacement)
    };
    credentials.rewrite_passwords(&rewrite).await?;
    Ok(RehashSummary {
        from_plain: from_plain.into_inner(),
        from_md5: from_md5.into_inner(),
    })
}
