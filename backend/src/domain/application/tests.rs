//! Regression coverage for this module.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use mockable::Clock;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::auth::SESSION_COOKIE;
use crate::domain::modules::{ModuleDeps, standard_registry};
use crate::domain::ports::{
    CollectingBugReporter, FixtureMappingRepository, FixturePanelRepository,
    FixtureRoleRepository, FixtureTableVersionRepository, FixtureUserRepository,
    InMemoryRecordStore, InMemorySessionRepository, InMemoryTable, MappingRepositoryError,
    MockMappingRepository,
};
use crate::domain::{
    AccountState, Login, MappingEntry, Method, PanelEntry, Pbkdf2PasswordStorage, Row,
    UniversalPasswordStorage, UserAccount, UserId,
};

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

fn account(uid: i64, login: &str, state: AccountState) -> UserAccount {
    UserAccount {
        uid: UserId::new(uid),
        login: Login::new(login).expect("login"),
        name: login.to_owned(),
        email: None,
        state,
        password: "plain:secret".to_owned(),
        password_expiration: None,
        lang: None,
    }
}

struct Harness {
    store: Arc<InMemoryRecordStore>,
    bugs: Arc<CollectingBugReporter>,
    settings: SiteSettings,
    mappings: Arc<dyn MappingRepository>,
    containment: Vec<(Role, Role)>,
}

impl Harness {
    fn app(&self) -> Application {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
                .single()
                .expect("timestamp"),
        ));
        let passwords = Arc::new(UniversalPasswordStorage::new(
            Pbkdf2PasswordStorage::with_iterations(10),
        ));
        let mut expired = account(4, "old", AccountState::Enabled);
        expired.password_expiration = NaiveDate::from_ymd_opt(2026, 2, 1);
        let users = FixtureUserRepository::new(vec![
            account(1, "joe", AccountState::Enabled),
            account(2, "ann", AccountState::Enabled),
            account(3, "bob", AccountState::Blocked),
            expired,
        ]);
        let roles = Arc::new(self.containment.iter().cloned().fold(
            FixtureRoleRepository::default().with_member(UserId::new(2), Role::ADMIN),
            |roles, (container, member)| roles.with_pair(container, member),
        ));
        let authenticator = Authenticator::new(
            Arc::new(users),
            roles.clone(),
            Arc::new(InMemorySessionRepository::default()),
            passwords.clone(),
            clock.clone(),
        );
        let modules = standard_registry(&ModuleDeps {
            store: self.store.clone(),
            passwords,
            roles: roles.clone(),
            doc_dirs: BTreeMap::new(),
        });
        Application::new(
            self.settings.clone(),
            LanguagePolicy::default(),
            modules,
            authenticator,
            ApplicationPorts {
                mappings: self.mappings.clone(),
                panels: Arc::new(FixturePanelRepository::new(vec![PanelEntry::text(
                    1,
                    "en",
                    "Welcome",
                    "Hello visitor.",
                )])),
                roles,
                versions: Arc::new(FixtureTableVersionRepository::default()),
                bug_reporter: self.bugs.clone(),
            },
            clock,
        )
    }
}

#[fixture]
fn harness() -> Harness {
    let store = Arc::new(
        InMemoryRecordStore::default()
            .with_table(
                InMemoryTable::new("users", "uid")
                    .not_null("login")
                    .with_row(Row::new().with("uid", 1).with("login", "joe")),
            )
            .with_table(InMemoryTable::new("news", "news_id").not_null("title")),
    );
    let mut members = MappingEntry::new(1, "members", "Users");
    members.private = true;
    let mut draft = MappingEntry::new(3, "draft", "News");
    draft.published = false;
    Harness {
        store,
        bugs: Arc::new(CollectingBugReporter::default()),
        settings: SiteSettings {
            title: "Example".to_owned(),
            ..SiteSettings::default()
        },
        mappings: Arc::new(FixtureMappingRepository::new(vec![
            members,
            MappingEntry::new(2, "news", "News"),
            draft,
        ])),
        containment: Vec::new(),
    }
}

fn html(reply: &Reply) -> &str {
    match &reply.body {
        ReplyBody::Html(html) => html,
        other => panic!("expected a page, got {other:?}"),
    }
}

fn logged_in(method: Method, path: &str, login: &str) -> Request {
    Request::new(method, path)
        .with_param(COMMAND_PARAM, "login")
        .with_param(LOGIN_PARAM, login)
        .with_param(PASSWORD_PARAM, "secret")
}

#[rstest]
#[tokio::test]
async fn private_items_depend_on_identity_and_role(harness: Harness) {
    let app = harness.app();
    let anonymous = app.handle(Request::new(Method::Get, "/members")).await;
    assert_eq!(anonymous.status, 401);
    assert!(html(&anonymous).contains("Login required."));

    let blocked = app.handle(logged_in(Method::Get, "/members", "bob")).await;
    assert_eq!(blocked.status, 403);

    let user = app.handle(logged_in(Method::Get, "/members", "joe")).await;
    assert_eq!(user.status, 200);
    assert!(html(&user).contains("class=\"list-view\""));
    assert!(user.cookies.iter().any(|cookie| cookie.name == SESSION_COOKIE));
}

#[rstest]
#[tokio::test]
async fn not_null_violation_rerenders_the_form(harness: Harness) {
    let app = harness.app();
    let req = logged_in(Method::Post, "/news", "ann")
        .with_param("action", "insert")
        .with_param("date", "2026-03-01")
        .with_param("content", "Body");
    let reply = app.handle(req).await;
    assert_eq!(reply.status, 200);
    let page = html(&reply);
    assert_eq!(page.matches("<span class=\"error\">").count(), 1);
    assert!(page.contains("Empty value.  This field is mandatory."));
    assert!(harness.store.rows("news").expect("rows").is_empty());
}

#[rstest]
#[tokio::test]
async fn successful_insert_redirects_with_a_flash_message(harness: Harness) {
    let app = harness.app();
    let req = logged_in(Method::Post, "/news", "ann")
        .with_param("action", "insert")
        .with_param("title", "Hello")
        .with_param("date", "2026-03-01")
        .with_param("content", "Body");
    let reply = app.handle(req).await;
    assert_eq!(reply.body, ReplyBody::Redirect("/news".to_owned()));
    assert_eq!(
        reply.flash.first().map(|m| m.text.as_str()),
        Some("New record was successfully inserted.")
    );
    assert_eq!(harness.store.rows("news").expect("rows").len(), 1);
}

#[rstest]
#[tokio::test]
async fn root_redirects_to_the_first_menu_item(harness: Harness) {
    let reply = harness.app().handle(Request::new(Method::Get, "/")).await;
    assert_eq!(reply.status, 302);
    assert_eq!(reply.body, ReplyBody::Redirect("/members".to_owned()));
}

#[rstest]
#[tokio::test]
async fn pages_carry_menu_and_panels(harness: Harness) {
    let reply = harness.app().handle(Request::new(Method::Get, "/news")).await;
    let page = html(&reply);
    assert!(page.contains("<title>Example - News</title>"));
    assert!(page.contains("<li class=\"current\"><a href=\"/news\""));
    assert!(page.contains("Hello visitor."));
    assert!(!page.contains("href=\"/draft\""));
}

#[rstest]
#[tokio::test]
async fn cyclic_stored_containment_is_skipped(mut harness: Harness) {
    harness.containment = vec![
        (Role::new("editors"), Role::CONTENT_ADMIN),
        (Role::CONTENT_ADMIN, Role::ADMIN),
    ];
    let app = harness.app();
    assert_eq!(app.handle(Request::new(Method::Get, "/news")).await.status, 200);

    let admin = logged_in(Method::Get, "/draft", "ann").with_param(PREVIEW_PARAM, "1");
    assert_eq!(app.handle(admin).await.status, 200);
    assert!(harness.bugs.reports().is_empty());
}

#[rstest]
#[tokio::test]
async fn preview_mode_is_reserved_for_content_admins(harness: Harness) {
    let app = harness.app();
    let visitor = Request::new(Method::Get, "/draft").with_param(PREVIEW_PARAM, "1");
    assert_eq!(app.handle(visitor).await.status, 403);

    let admin = logged_in(Method::Get, "/draft", "ann").with_param(PREVIEW_PARAM, "1");
    let reply = app.handle(admin).await;
    assert_eq!(reply.status, 200);
    assert!(
        reply
            .cookies
            .iter()
            .any(|c| c.name == PREVIEW_COOKIE && c.value.as_deref() == Some("1"))
    );
}

#[rstest]
#[tokio::test]
async fn maintenance_mode_spares_resources(mut harness: Harness) {
    harness.settings.maintenance = true;
    let app = harness.app();
    let reply = app.handle(Request::new(Method::Get, "/news")).await;
    assert_eq!(reply.status, 503);
    assert!(html(&reply).contains(MSG_MAINTENANCE));
    let resource = app
        .handle(Request::new(Method::Get, "/_resources/default.css"))
        .await;
    assert_ne!(resource.status, 503);
}

#[rstest]
#[case(Some("http://evil.example.com/form"), true)]
#[case(Some("not a url"), true)]
#[case(Some("http://www.example.org/news"), false)]
#[case(None, false)]
#[tokio::test]
async fn foreign_submissions_are_refused(
    harness: Harness,
    #[case] referer: Option<&str>,
    #[case] refused: bool,
) {
    let mut req = logged_in(Method::Post, "/news", "ann")
        .with_server_uri("http://www.example.org")
        .with_param(SUBMIT_PARAM, "1")
        .with_param("action", "insert")
        .with_param("title", "Spam")
        .with_param("date", "2026-03-01")
        .with_param("content", "Body");
    if let Some(referer) = referer {
        req = req.with_header("Referer", referer);
    }
    let reply = harness.app().handle(req).await;
    let stored = harness.store.rows("news").expect("rows").len();
    assert_eq!(stored == 0, refused);
    if refused {
        assert_eq!(reply.body, ReplyBody::Redirect("/".to_owned()));
    }
}

#[rstest]
#[tokio::test]
async fn expired_passwords_lead_to_the_change_form(harness: Harness) {
    let app = harness.app();
    let reply = app.handle(logged_in(Method::Get, "/news", "old")).await;
    assert_eq!(
        reply.body,
        ReplyBody::Redirect("/_registration?action=edit".to_owned())
    );
    let texts: Vec<&str> = reply.flash.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec![MSG_PASSWORD_EXPIRED, MSG_ACCESS_RESTRICTED]);
}

#[rstest]
#[tokio::test]
async fn stale_session_cookies_explain_the_login_prompt(harness: Harness) {
    let req = Request::new(Method::Get, "/members")
        .with_cookie(LOGIN_COOKIE, "joe")
        .with_cookie(SESSION_COOKIE, "41:abcdef");
    let reply = harness.app().handle(req).await;
    assert_eq!(reply.status, 401);
    assert!(html(&reply).contains("Your session expired."));
    assert!(
        reply
            .cookies
            .iter()
            .any(|c| c.name == SESSION_COOKIE && c.value.is_none())
    );
}

#[rstest]
#[case("", "Enter your login name, please!")]
#[case("nobody", "Invalid login!")]
#[tokio::test]
async fn failed_logins_show_the_form_again(
    harness: Harness,
    #[case] login: &str,
    #[case] message: &str,
) {
    let reply = harness
        .app()
        .handle(logged_in(Method::Post, "/news", login))
        .await;
    assert_eq!(reply.status, 401);
    let page = html(&reply);
    assert!(page.contains(message));
    assert!(page.contains("name=\"command\" value=\"login\""));
}

#[rstest]
#[tokio::test]
async fn internal_errors_are_reported_once(mut harness: Harness) {
    let mut mappings = MockMappingRepository::new();
    mappings
        .expect_entries()
        .times(1)
        .returning(|| Err(MappingRepositoryError::query("relation \"mapping\" is gone")));
    harness.mappings = Arc::new(mappings);
    harness.settings.bug_report_address = Some("admin@example.org".to_owned());
    let req = Request::new(Method::Post, "/news")
        .with_param("password", "hunter2")
        .with_param("title", "x");
    let reply = harness.app().handle(req).await;
    assert_eq!(reply.status, 500);
    let page = html(&reply);
    assert!(page.contains(MSG_INTERNAL));
    assert!(!page.contains("relation"));
    let reports = harness.bugs.reports();
    assert_eq!(reports.len(), 1);
    let (address, report) = &reports[0];
    assert_eq!(address, "admin@example.org");
    assert_eq!(report.params.get("password"), Some("***"));
    assert!(report.error.contains("relation \"mapping\" is gone"));
}
