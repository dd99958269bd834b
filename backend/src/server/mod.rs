//! Server construction and middleware wiring.

mod config;
mod state_builders;

pub use config::ServerConfig;

use std::sync::Arc;

use actix_session::{SessionMiddleware, config::CookieContentSecurity, storage::CookieSessionStore};
use actix_web::cookie::{Key, SameSite};
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tracing::info;

use wiking::Trace;
use wiking::inbound::http::dispatch;
use wiking::inbound::http::state::HttpState;

use state_builders::build_application;

const FLASH_COOKIE: &str = "wiking_flash";

#[derive(Clone)]
struct AppDependencies {
    http_state: web::Data<HttpState>,
    key: Key,
    cookie_secure: bool,
    same_site: SameSite,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        http_state,
        key,
        cookie_secure,
        same_site,
    } = deps;

    let flash = SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name(FLASH_COOKIE.to_owned())
        .cookie_path("/".to_owned())
        .cookie_secure(cookie_secure)
        .cookie_http_only(true)
        .cookie_content_security(CookieContentSecurity::Private)
        .cookie_same_site(same_site)
        .build();

    App::new()
        .app_data(http_state)
        .wrap(flash)
        .wrap(Trace)
        .default_service(web::route().to(dispatch))
}

/// Construct the Actix HTTP server for `config`.
///
/// # Errors
/// Invalid site settings, or failure to bind the socket.
pub fn create_server(config: ServerConfig) -> std::io::Result<Server> {
    let application = Arc::new(build_application(&config)?);
    let http_state = web::Data::new(HttpState::new(application));
    let ServerConfig {
        settings: _,
        key,
        cookie_secure,
        same_site,
        bind_addr,
        db_pool,
    } = config;
    info!(
        %bind_addr,
        database = db_pool.is_some(),
        "starting wiking"
    );

    let server = HttpServer::new(move || {
        build_app(AppDependencies {
            http_state: http_state.clone(),
            key: key.clone(),
            cookie_secure,
            same_site,
        })
    })
    .bind(bind_addr)?
    .run();
    Ok(server)
}
