//! HTTP server configuration object.

use std::net::SocketAddr;

use actix_web::cookie::{Key, SameSite};
use wiking::WikingSettings;
use wiking::outbound::persistence::DbPool;

/// Everything needed to start the server.
pub struct ServerConfig {
    pub(crate) settings: WikingSettings,
    pub(crate) key: Key,
    pub(crate) cookie_secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
}

impl ServerConfig {
    /// Configuration without a database; the site runs on fixtures.
    #[must_use]
    pub fn new(
        settings: WikingSettings,
        key: Key,
        cookie_secure: bool,
        same_site: SameSite,
        bind_addr: SocketAddr,
    ) -> Self {
        Self {
            settings,
            key,
            cookie_secure,
            same_site,
            bind_addr,
            db_pool: None,
        }
    }

    /// Attach the pool backing every persistence port.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }
}
