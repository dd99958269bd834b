//! Assembly of the dispatch pipeline from configuration.
//!
//! With a pool every port is served by its Diesel adapter; without one the
//! site runs on in-memory fixtures holding a single demo account.

use std::io;
use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::warn;
use wiking::domain::modules::{ModuleDeps, standard_registry};
use wiking::domain::ports::{
    FixtureMappingRepository, FixturePanelRepository, FixtureRoleRepository,
    FixtureTableVersionRepository, FixtureUserRepository, InMemoryRecordStore,
    InMemorySessionRepository, InMemoryTable, MappingRepository, PanelRepository, RecordStore,
    RoleRepository, SessionRepository, TableVersionRepository, UserRepository,
};
use wiking::domain::{
    AccountState, Application, ApplicationPorts, Authenticator, Login, MappingEntry, PanelEntry,
    PasswordStorage, Pbkdf2PasswordStorage, Role, Row, UniversalPasswordStorage, UserAccount,
    UserId,
};
use wiking::outbound::bug_report::TracingBugReporter;
use wiking::outbound::persistence::{
    DbPool, DieselMappingRepository, DieselPanelRepository, DieselRecordStore,
    DieselRoleRepository, DieselSessionRepository, DieselTableVersionRepository,
    DieselUserRepository,
};

use super::ServerConfig;

const DEMO_LOGIN: &str = "admin";
const DEMO_PASSWORD: &str = "admin";

struct Ports {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    sessions: Arc<dyn SessionRepository>,
    mappings: Arc<dyn MappingRepository>,
    panels: Arc<dyn PanelRepository>,
    versions: Arc<dyn TableVersionRepository>,
    store: Arc<dyn RecordStore>,
}

fn diesel_ports(pool: &DbPool) -> Ports {
    Ports {
        users: Arc::new(DieselUserRepository::new(pool.clone())),
        roles: Arc::new(DieselRoleRepository::new(pool.clone())),
        sessions: Arc::new(DieselSessionRepository::new(pool.clone())),
        mappings: Arc::new(DieselMappingRepository::new(pool.clone())),
        panels: Arc::new(DieselPanelRepository::new(pool.clone())),
        versions: Arc::new(DieselTableVersionRepository::new(pool.clone())),
        store: Arc::new(DieselRecordStore::new(pool.clone())),
    }
}

fn fixture_ports(passwords: &dyn PasswordStorage) -> io::Result<Ports> {
    warn!(login = DEMO_LOGIN, "no database configured; serving demo fixtures");
    let admin = UserAccount {
        uid: UserId::new(1),
        login: Login::new(DEMO_LOGIN).map_err(io::Error::other)?,
        name: "Administrator".to_owned(),
        email: None,
        state: AccountState::Enabled,
        password: passwords.stored_password(DEMO_PASSWORD),
        password_expiration: None,
        lang: None,
    };
    let mut users = MappingEntry::new(2, "users", "Users");
    users.private = true;
    Ok(Ports {
        users: Arc::new(FixtureUserRepository::new(vec![admin])),
        roles: Arc::new(
            FixtureRoleRepository::default().with_member(UserId::new(1), Role::ADMIN),
        ),
        sessions: Arc::new(InMemorySessionRepository::default()),
        mappings: Arc::new(FixtureMappingRepository::new(vec![
            MappingEntry::new(1, "news", "News"),
            users,
            MappingEntry::new(3, "sitemap", "SiteMap"),
            MappingEntry::new(4, "about", "Pages"),
        ])),
        panels: Arc::new(FixturePanelRepository::new(vec![PanelEntry::text(
            1,
            "en",
            "Welcome",
            "This site runs without a database.",
        )])),
        versions: Arc::new(FixtureTableVersionRepository::default()),
        store: Arc::new(
            InMemoryRecordStore::default()
                .with_table(InMemoryTable::new("users", "uid").not_null("login"))
                .with_table(InMemoryTable::new("news", "news_id").not_null("title"))
                .with_table(
                    InMemoryTable::new("mapping", "mapping_id").not_null("identifier"),
                )
                .with_table(
                    InMemoryTable::new("pages", "page_id").with_row(
                        Row::new()
                            .with("page_id", 1)
                            .with("identifier", "about")
                            .with("lang", "en")
                            .with("title", "About")
                            .with("content", "This site runs without a database.")
                            .with("published", true),
                    ),
                )
                .with_table(InMemoryTable::new("panels", "panel_id").not_null("lang")),
        ),
    })
}

/// Build the pipeline described by `config`.
///
/// # Errors
/// Malformed language or documentation settings.
pub(super) fn build_application(config: &ServerConfig) -> io::Result<Application> {
    let settings = &config.settings;
    let site = settings.site_settings();
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let passwords = Arc::new(UniversalPasswordStorage::new(
        Pbkdf2PasswordStorage::default(),
    ));
    let ports = match &config.db_pool {
        Some(pool) => diesel_ports(pool),
        None => fixture_ports(passwords.as_ref())?,
    };
    let authenticator = Authenticator::new(
        ports.users,
        ports.roles.clone(),
        ports.sessions,
        passwords.clone(),
        clock.clone(),
    )
    .with_policy(site.session_policy)
    .with_login_cookie_days(site.login_cookie_days);
    let modules = standard_registry(&ModuleDeps {
        store: ports.store,
        passwords,
        roles: ports.roles.clone(),
        doc_dirs: settings.doc_dirs().map_err(io::Error::other)?,
    });
    Ok(Application::new(
        site,
        settings.language_policy().map_err(io::Error::other)?,
        modules,
        authenticator,
        ApplicationPorts {
            mappings: ports.mappings,
            panels: ports.panels,
            roles: ports.roles,
            versions: ports.versions,
            bug_reporter: Arc::new(TracingBugReporter),
        },
        clock,
    ))
}
