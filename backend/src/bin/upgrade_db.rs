//! Apply the numbered `upgrade.NN.sql` scripts to a Wiking database.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::path::PathBuf;

use cap_std::{ambient_authority, fs::Dir};
use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tokio::runtime::Builder;
use tracing_subscriber::{EnvFilter, fmt};
use wiking::domain::UpgradePlan;
use wiking::outbound::persistence::{DbPool, DieselMigrationRunner, PoolConfig};

/// `upgrade-db` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "upgrade-db",
    about = "Upgrade a Wiking database by applying numbered SQL scripts in one transaction",
    version
)]
struct CliArgs {
    /// PostgreSQL connection URL.
    database_url: String,
    /// Directory holding the `upgrade.NN.sql` scripts.
    directory: PathBuf,
    /// Current database version.
    source: u32,
    /// Version to upgrade to; the highest script present when omitted.
    target: Option<u32>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    fmt()
        .with_env_filter(EnvFilter::new("info"))
        .try_init()
        .map_err(|error| color_eyre::eyre::eyre!("tracing init failed: {error}"))?;
    let args = CliArgs::parse();
    let plan = load_plan(&args)?;
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build the upgrade runtime")?;
    let version = runtime.block_on(upgrade(&args.database_url, &plan))?;
    println!("Database upgraded from version {} to {version}.", plan.source());
    Ok(())
}

fn load_plan(args: &CliArgs) -> Result<UpgradePlan> {
    let dir = Dir::open_ambient_dir(&args.directory, ambient_authority())
        .with_context(|| format!("open script directory '{}'", args.directory.display()))?;
    Ok(UpgradePlan::load(&dir, args.source, args.target)?)
}

async fn upgrade(database_url: &str, plan: &UpgradePlan) -> Result<u32> {
    let pool = DbPool::new(PoolConfig::new(database_url))
        .await
        .wrap_err("failed to create the database pool")?;
    plan.run(&DieselMigrationRunner::new(pool))
        .await
        .wrap_err("upgrade failed, nothing applied")
}
