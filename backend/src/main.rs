//! Wiking entry-point: loads settings and serves every URI through the
//! dispatch core.

mod server;

use std::io;

use ortho_config::OrthoConfig;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use server::{ServerConfig, create_server};
use wiking::WikingSettings;
use wiking::inbound::http::session_config::{BuildMode, session_settings_from_env};
use wiking::outbound::persistence::{DbPool, PoolConfig};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = WikingSettings::load().map_err(|e| io::Error::other(e.to_string()))?;
    let session = session_settings_from_env(
        &mockable::DefaultEnv::new(),
        BuildMode::from_debug_assertions(),
    )
    .map_err(io::Error::other)?;
    let bind_addr = settings.bind_addr().map_err(io::Error::other)?;
    let database_url = settings.database_url.clone();

    let mut config = ServerConfig::new(
        settings,
        session.key,
        session.cookie_secure,
        session.same_site,
        bind_addr,
    );
    if let Some(url) = database_url {
        let pool = DbPool::new(PoolConfig::new(url))
            .await
            .map_err(io::Error::other)?;
        config = config.with_db_pool(pool);
    }

    create_server(config)?.await
}
