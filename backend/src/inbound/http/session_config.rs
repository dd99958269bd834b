//! Key and cookie flags for the private flash-message cookie.
//!
//! The Actix cookie session carries only flash messages between a redirect
//! and the page that follows it. Authentication uses its own cookies managed
//! by the dispatch core. Release builds insist on explicit, valid settings;
//! debug builds fall back to defaults with a warning.

use std::path::PathBuf;

use actix_web::cookie::{Key, SameSite};
use mockable::Env;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use zeroize::Zeroize;

const KEY_FILE_DEFAULT: &str = "/var/run/secrets/wiking_session_key";
const KEY_MIN_LEN: usize = 64;
const SECURE_ENV: &str = "WIKING_SESSION_COOKIE_SECURE";
const SAMESITE_ENV: &str = "WIKING_SESSION_SAMESITE";
const EPHEMERAL_ENV: &str = "WIKING_SESSION_ALLOW_EPHEMERAL";
const KEY_FILE_ENV: &str = "WIKING_SESSION_KEY_FILE";
const BOOL_EXPECTED: &str = "1|0|true|false|yes|no";
const SAMESITE_EXPECTED: &str = "Strict|Lax|None";

/// Whether missing or malformed settings are tolerated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    /// Fall back to defaults with a warning.
    Debug,
    /// Reject anything not set explicitly.
    Release,
}

impl BuildMode {
    /// Mode of the running binary.
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }
}

/// Settings for the flash cookie middleware.
pub struct SessionSettings {
    /// Signing and encryption key.
    pub key: Key,
    /// `Secure` cookie flag.
    pub cookie_secure: bool,
    /// `SameSite` policy.
    pub same_site: SameSite,
}

/// Errors raised while reading the settings.
#[derive(thiserror::Error, Debug)]
pub enum SessionConfigError {
    /// A variable required in release builds is missing.
    #[error("missing required environment variable: {name}")]
    MissingEnv {
        /// Variable name.
        name: &'static str,
    },
    /// A variable holds an unusable value.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Value found.
        value: String,
        /// Accepted values.
        expected: &'static str,
    },
    /// The key file cannot be read.
    #[error("failed to read session key at {path}: {source}")]
    KeyRead {
        /// Key file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The key file holds too little material.
    #[error("session key at {path} too short: need >= {min_len} bytes, got {length}")]
    KeyTooShort {
        /// Key file.
        path: PathBuf,
        /// Bytes found.
        length: usize,
        /// Bytes required.
        min_len: usize,
    },
    /// `SameSite=None` on an insecure cookie.
    #[error("WIKING_SESSION_SAMESITE=None requires WIKING_SESSION_COOKIE_SECURE=1")]
    InsecureSameSiteNone,
    /// Generated keys are refused in release builds.
    #[error("WIKING_SESSION_ALLOW_EPHEMERAL must be 0 in release builds")]
    EphemeralNotAllowed,
}

struct Settings<'a, E> {
    env: &'a E,
    mode: BuildMode,
}

impl<E: Env> Settings<'_, E> {
    /// Read `name`, parse it, and fall back to `default` in debug builds.
    fn read<T>(
        &self,
        name: &'static str,
        expected: &'static str,
        default: T,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, SessionConfigError> {
        let Some(value) = self.env.string(name) else {
            if self.mode == BuildMode::Release {
                return Err(SessionConfigError::MissingEnv { name });
            }
            warn!(variable = name, "not set; using default");
            return Ok(default);
        };
        match parse(&value) {
            Some(parsed) => Ok(parsed),
            None if self.mode == BuildMode::Debug => {
                warn!(variable = name, %value, "invalid value; using default");
                Ok(default)
            }
            None => Err(SessionConfigError::InvalidEnv {
                name,
                value,
                expected,
            }),
        }
    }
}

/// Read the flash cookie settings from the environment.
///
/// # Errors
/// See [`SessionConfigError`]; release builds fail on anything not set
/// explicitly.
pub fn session_settings_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<SessionSettings, SessionConfigError> {
    let settings = Settings { env, mode };
    let cookie_secure = settings.read(SECURE_ENV, BOOL_EXPECTED, true, parse_bool)?;
    let default_same_site = match mode {
        BuildMode::Debug => SameSite::Lax,
        BuildMode::Release => SameSite::Strict,
    };
    let same_site = settings.read(
        SAMESITE_ENV,
        SAMESITE_EXPECTED,
        default_same_site,
        parse_same_site,
    )?;
    if same_site == SameSite::None && !cookie_secure {
        if mode == BuildMode::Release {
            return Err(SessionConfigError::InsecureSameSiteNone);
        }
        warn!("SameSite=None on an insecure cookie; browsers may reject it");
    }
    let allow_ephemeral = settings.read(EPHEMERAL_ENV, BOOL_EXPECTED, false, parse_bool)?;
    if allow_ephemeral && mode == BuildMode::Release {
        return Err(SessionConfigError::EphemeralNotAllowed);
    }
    let path = PathBuf::from(
        env.string(KEY_FILE_ENV)
            .unwrap_or_else(|| KEY_FILE_DEFAULT.to_owned()),
    );
    let key = load_key(path, mode, allow_ephemeral)?;
    info!(fingerprint = %key_fingerprint(&key), "flash cookie key loaded");
    Ok(SessionSettings {
        key,
        cookie_secure,
        same_site,
    })
}

fn load_key(
    path: PathBuf,
    mode: BuildMode,
    allow_ephemeral: bool,
) -> Result<Key, SessionConfigError> {
    match std::fs::read(&path) {
        Ok(mut bytes) => {
            let length = bytes.len();
            let result = if mode == BuildMode::Release && length < KEY_MIN_LEN {
                Err(SessionConfigError::KeyTooShort {
                    path,
                    length,
                    min_len: KEY_MIN_LEN,
                })
            } else {
                Ok(Key::derive_from(&bytes))
            };
            bytes.zeroize();
            result
        }
        Err(source) if mode == BuildMode::Debug || allow_ephemeral => {
            warn!(path = %path.display(), error = %source, "using a generated session key");
            Ok(Key::generate())
        }
        Err(source) => Err(SessionConfigError::KeyRead { path, source }),
    }
}

/// Short, non-reversible identifier of `key` for the logs.
#[must_use]
pub fn key_fingerprint(key: &Key) -> String {
    let digest = Sha256::digest(key.signing());
    hex::encode(&digest[..8])
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => Some(SameSite::Strict),
        "lax" => Some(SameSite::Lax),
        "none" => Some(SameSite::None),
        _ => None,
    }
}
