//! Password storage schemes.
//!
//! Stored passwords are tagged `prefix:data`. The prefix selects the scheme
//! used to verify the password, so legacy records keep working next to
//! salted ones:
//!
//! | prefix       | data                                                   |
//! |--------------|--------------------------------------------------------|
//! | `plain`      | the password itself                                    |
//! | `md5u`       | hex md5 digest of the password, unsalted               |
//! | `pbkdf2`     | `<iterations>$<salt hex>$<hash hex>` (HMAC-SHA256)      |
//! | `pbkdf2/md5` | the `pbkdf2` form computed over the `md5u` hex digest  |
//!
//! The last form lets unsalted md5 records be salted without knowing the
//! plaintext.

use md5::{Digest, Md5};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use tracing::warn;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Default PBKDF2 iteration count for newly stored passwords.
pub const DEFAULT_ITERATIONS: u32 = 60_000;

/// One password hashing scheme.
pub trait PasswordStorage: Send + Sync {
    /// The stored form of `password`, without the scheme prefix.
    fn stored_password(&self, password: &str) -> String;

    /// Whether `password` matches the stored form (again without prefix).
    fn check_password(&self, password: &str, stored: &str) -> bool;
}

/// Scheme identifiers as they appear in the stored prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordScheme {
    /// `plain`.
    Plain,
    /// `md5u`.
    UnsaltedMd5,
    /// `pbkdf2`.
    Pbkdf2,
    /// `pbkdf2/md5`.
    Pbkdf2Md5,
}

impl PasswordScheme {
    /// Prefix written before the `:` separator.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::UnsaltedMd5 => "md5u",
            Self::Pbkdf2 => "pbkdf2",
            Self::Pbkdf2Md5 => "pbkdf2/md5",
        }
    }

    /// Parse a stored prefix.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        [Self::Plain, Self::UnsaltedMd5, Self::Pbkdf2, Self::Pbkdf2Md5]
            .into_iter()
            .find(|scheme| scheme.prefix() == prefix)
    }

    /// Split `prefix:data` into its scheme and data.
    #[must_use]
    pub fn split(stored: &str) -> Option<(Self, &str)> {
        let (prefix, data) = stored.split_once(':')?;
        Some((Self::from_prefix(prefix)?, data))
    }
}

/// Legacy plain text storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextPasswordStorage;

impl PasswordStorage for PlainTextPasswordStorage {
    fn stored_password(&self, password: &str) -> String {
        password.to_owned()
    }

    fn check_password(&self, password: &str, stored: &str) -> bool {
        constant_time_eq(password.as_bytes(), stored.as_bytes())
    }
}

/// Legacy unsalted md5 storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsaltedMd5PasswordStorage;

impl PasswordStorage for UnsaltedMd5PasswordStorage {
    fn stored_password(&self, password: &str) -> String {
        md5_hex(password)
    }

    fn check_password(&self, password: &str, stored: &str) -> bool {
        constant_time_eq(md5_hex(password).as_bytes(), stored.as_bytes())
    }
}

/// Salted PBKDF2-HMAC-SHA256 storage.
#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2PasswordStorage {
    iterations: u32,
}

impl Default for Pbkdf2PasswordStorage {
    fn default() -> Self {
        Self::with_iterations(DEFAULT_ITERATIONS)
    }
}

impl Pbkdf2PasswordStorage {
    /// Storage producing hashes with `iterations` rounds.
    ///
    /// Verification always uses the count recorded in the stored value.
    #[must_use]
    pub const fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
        let mut hash = [0_u8; HASH_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut hash);
        hash
    }
}

impl PasswordStorage for Pbkdf2PasswordStorage {
    fn stored_password(&self, password: &str) -> String {
        let mut salt = [0_u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let hash = Self::derive(password, &salt, self.iterations);
        format!(
            "{}${}${}",
            self.iterations,
            hex::encode(salt),
            hex::encode(hash)
        )
    }

    fn check_password(&self, password: &str, stored: &str) -> bool {
        let mut parts = stored.splitn(3, '$');
        let (Some(iterations), Some(salt), Some(hash)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let (Ok(iterations), Ok(salt), Ok(expected)) =
            (iterations.parse::<u32>(), hex::decode(salt), hex::decode(hash))
        else {
            return false;
        };
        if iterations == 0 {
            return false;
        }
        constant_time_eq(&Self::derive(password, &salt, iterations), &expected)
    }
}

/// PBKDF2 applied over the unsalted md5 digest of the password.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pbkdf2Md5PasswordStorage {
    pbkdf2: Pbkdf2PasswordStorage,
}

impl Pbkdf2Md5PasswordStorage {
    /// Wrap the PBKDF2 storage used for the outer hash.
    #[must_use]
    pub const fn new(pbkdf2: Pbkdf2PasswordStorage) -> Self {
        Self { pbkdf2 }
    }
}

impl PasswordStorage for Pbkdf2Md5PasswordStorage {
    fn stored_password(&self, password: &str) -> String {
        self.pbkdf2.stored_password(&md5_hex(password))
    }

    fn check_password(&self, password: &str, stored: &str) -> bool {
        self.pbkdf2.check_password(&md5_hex(password), stored)
    }
}

/// Dispatches on the stored prefix; new passwords are stored as `pbkdf2`.
///
/// # Examples
/// ```
/// use wiking::domain::{PasswordStorage, Pbkdf2PasswordStorage, UniversalPasswordStorage};
///
/// let storage = UniversalPasswordStorage::new(Pbkdf2PasswordStorage::with_iterations(10));
/// let stored = storage.stored_password("secret");
/// assert!(stored.starts_with("pbkdf2:"));
/// assert!(storage.check_password("secret", &stored));
/// assert!(storage.check_password("bla", "plain:bla"));
/// assert!(!storage.check_password("xx", &stored));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct UniversalPasswordStorage {
    pbkdf2: Pbkdf2PasswordStorage,
}

impl UniversalPasswordStorage {
    /// Universal storage hashing new passwords with `pbkdf2`.
    #[must_use]
    pub const fn new(pbkdf2: Pbkdf2PasswordStorage) -> Self {
        Self { pbkdf2 }
    }

    /// The PBKDF2 storage used for new passwords.
    #[must_use]
    pub const fn pbkdf2(&self) -> &Pbkdf2PasswordStorage {
        &self.pbkdf2
    }
}

impl PasswordStorage for UniversalPasswordStorage {
    fn stored_password(&self, password: &str) -> String {
        format!(
            "{}:{}",
            PasswordScheme::Pbkdf2.prefix(),
            self.pbkdf2.stored_password(password)
        )
    }

    fn check_password(&self, password: &str, stored: &str) -> bool {
        let Some((scheme, data)) = PasswordScheme::split(stored) else {
            warn!("stored password has an unknown storage prefix");
            return false;
        };
        match scheme {
            PasswordScheme::Plain => PlainTextPasswordStorage.check_password(password, data),
            PasswordScheme::UnsaltedMd5 => {
                UnsaltedMd5PasswordStorage.check_password(password, data)
            }
            PasswordScheme::Pbkdf2 => self.pbkdf2.check_password(password, data),
            PasswordScheme::Pbkdf2Md5 => {
                Pbkdf2Md5PasswordStorage::new(self.pbkdf2).check_password(password, data)
            }
        }
    }
}

fn md5_hex(password: &str) -> String {
    hex::encode(Md5::digest(password.as_bytes()))
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
