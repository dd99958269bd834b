//! Convert legacy plain text and unsalted md5 passwords to salted PBKDF2.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::env;
use std::io;

use clap::Parser;
use tokio::runtime::Builder;
use wiking::domain::{Pbkdf2PasswordStorage, salt_passwords};
use wiking::outbound::persistence::{DbPool, DieselCredentialRepository, PoolConfig};

/// `salt-passwords` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "salt-passwords",
    about = "Rewrite plain text and unsalted md5 user passwords as salted PBKDF2 hashes",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `DATABASE_URL` when omitted.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
}

fn main() -> io::Result<()> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let database_url = resolve_database_url(args.database_url, env::var("DATABASE_URL").ok())?;
    let pool = DbPool::new(PoolConfig::new(&database_url))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
    let summary = salt_passwords(
        &DieselCredentialRepository::new(pool),
        &Pbkdf2PasswordStorage::default(),
    )
    .await
    .map_err(|error| io::Error::other(format!("no passwords updated: {error}")))?;
    println!("{summary}");
    Ok(())
}

fn resolve_database_url(explicit: Option<String>, from_env: Option<String>) -> io::Result<String> {
    let (value, source) = match (explicit, from_env) {
        (Some(value), _) => (value, "--database-url"),
        (None, Some(value)) => (value, "DATABASE_URL"),
        (None, None) => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "database URL missing: set --database-url or DATABASE_URL",
            ));
        }
    };
    if value.trim().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{source} must not be empty"),
        ));
    }
    Ok(value)
}
