//! The request pipeline tying the dispatch core together.
//!
//! [`Application::handle`] takes a transport-neutral [`Request`] through
//! maintenance checks, language negotiation, authentication, preview mode,
//! the cross-site submit guard, URI resolution and the module, and exports
//! the result. Errors never escape: they become error documents.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, error, info, warn};
use url::Url;

use super::auth::{COMMAND_PARAM, LOGIN_COOKIE, LOGIN_PARAM, PASSWORD_PARAM};
use super::ports::{
    BugReporter, MappingRepository, PanelRepository, RoleRepository, TableVersionRepository,
};
use super::{
    AuthenticationFailure, Authenticator, BugReport, Content, CookieUpdate, Document, Error,
    ErrorCode, Exporter, Form, FormField, Identity, InputKind, LanguagePolicy, Link, MappingIndex,
    MenuItem, Message, MessageKind, ModuleContext, ModuleRegistry, Outcome, Page, Request,
    Resolution, Role, RoleContainment, SiteSettings, TableVersions, VersionedCache, build_menu,
    build_panels, resolve, top_level_for,
};

/// Cookie remembering the preview mode choice.
pub const PREVIEW_COOKIE: &str = "wiking_cms_preview_mode";
/// Parameter switching preview mode on (`1`) or off (`0`).
pub const PREVIEW_PARAM: &str = "_wiking_cms_preview_mode";
/// Parameter sent by the submit button of every form.
pub const SUBMIT_PARAM: &str = "submit";

const PREVIEW_COOKIE_MAX_AGE: i64 = 60 * 60 * 24;
const MSG_MAINTENANCE: &str = "The system is temporarily down for maintenance.";
const MSG_PASSWORD_EXPIRED: &str = "Your password expired.";
const MSG_ACCESS_RESTRICTED: &str =
    "Access to the application is now restricted until you change your password.";
const MSG_INTERNAL: &str = "The server was unable to complete your request.";

/// Body of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    /// Exported HTML page.
    Html(String),
    /// Redirect target.
    Redirect(String),
    /// Raw data.
    Data {
        /// MIME type.
        content_type: String,
        /// Payload.
        bytes: Vec<u8>,
    },
}

/// Transport-neutral response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// HTTP status.
    pub status: u16,
    /// Body.
    pub body: ReplyBody,
    /// Cookies to write.
    pub cookies: Vec<CookieUpdate>,
    /// Messages to show on the page the client is redirected to.
    pub flash: Vec<Message>,
}

/// Driven dependencies of the pipeline.
#[derive(Clone)]
pub struct ApplicationPorts {
    /// Mapping rows.
    pub mappings: Arc<dyn MappingRepository>,
    /// Panel rows.
    pub panels: Arc<dyn PanelRepository>,
    /// Role containment.
    pub roles: Arc<dyn RoleRepository>,
    /// Cached table versions.
    pub versions: Arc<dyn TableVersionRepository>,
    /// Bug report delivery.
    pub bug_reporter: Arc<dyn BugReporter>,
}

/// Page chrome collected while serving, reused by error pages.
#[derive(Debug, Default)]
struct Chrome {
    menu: Vec<MenuItem>,
    current: Option<String>,
    session_expired: bool,
}

/// The dispatch core.
pub struct Application {
    settings: SiteSettings,
    language: LanguagePolicy,
    modules: ModuleRegistry,
    authenticator: Authenticator,
    ports: ApplicationPorts,
    clock: Arc<dyn Clock>,
    exporter: Exporter,
    mapping_cache: VersionedCache<MappingIndex>,
    role_cache: VersionedCache<RoleContainment>,
}

impl Application {
    /// Assemble the pipeline.
    #[must_use]
    pub fn new(
        settings: SiteSettings,
        language: LanguagePolicy,
        modules: ModuleRegistry,
        authenticator: Authenticator,
        ports: ApplicationPorts,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let exporter = Exporter::new(&settings);
        Self {
            settings,
            language,
            modules,
            authenticator,
            ports,
            clock,
            exporter,
            mapping_cache: VersionedCache::new("mapping"),
            role_cache: VersionedCache::new("role_sets"),
        }
    }

    /// Site settings.
    #[must_use]
    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    /// Serve one request.
    pub async fn handle(&self, mut req: Request) -> Reply {
        let mut chrome = Chrome::default();
        match self.serve(&mut req, &mut chrome).await {
            Ok(reply) => reply,
            Err(error) => self.error_reply(&mut req, &chrome, error).await,
        }
    }

    async fn serve(&self, req: &mut Request, chrome: &mut Chrome) -> Result<Reply, Error> {
        if self.settings.maintenance && !req.is_resource_request() {
            return Err(Error::service_unavailable(MSG_MAINTENANCE));
        }
        self.language.negotiate(req);
        let versions = self
            .ports
            .versions
            .versions()
            .await
            .map_err(|err| Error::internal(err.to_string()))?;
        let containment = self.role_containment(&versions).await?;
        match self.authenticator.authenticate(req, &containment).await? {
            Identity::User(user) => req.set_user(Some(user)),
            Identity::SessionExpired => chrome.session_expired = true,
            Identity::Anonymous => {}
        }
        apply_preview_mode(req);
        if is_foreign_submit(req) {
            warn!(referer = ?req.header("referer"), "cross-site form submission refused");
            return Ok(redirect(req, "/".to_owned()));
        }
        let mapping = self
            .mapping_cache
            .get_or_try_load(&versions, || async {
                self.ports.mappings.entries().await.map(MappingIndex::new)
            })
            .await
            .map_err(|err| Error::internal(err.to_string()))?;
        let lang = self.page_language(req).to_owned();
        chrome.menu = build_menu(mapping.entries(), &lang, req.preview_mode());
        chrome.current = req
            .unresolved_path()
            .first()
            .and_then(|id| top_level_for(&chrome.menu, id))
            .map(|item| item.id.clone());
        if let Some(target) = self.password_change_redirect(req) {
            return Ok(redirect(req, target));
        }
        let name = match resolve(req, &mapping, &chrome.menu)? {
            Resolution::Redirect(uri) => return Ok(redirect(req, uri)),
            Resolution::Module(name) => name,
        };
        debug!(module = %name, uri = %req.uri(), "dispatching");
        let module = self.modules.module(&name)?;
        let ctx = ModuleContext {
            modules: &self.modules,
            settings: &self.settings,
            menu: &chrome.menu,
        };
        match module.handle(req, &ctx).await? {
            Outcome::Redirect(uri) => Ok(redirect(req, uri)),
            Outcome::Data { content_type, body } => Ok(Reply {
                status: 200,
                body: ReplyBody::Data {
                    content_type,
                    bytes: body,
                },
                cookies: req.take_cookie_updates(),
                flash: Vec::new(),
            }),
            Outcome::Document(document) => Ok(self.page(req, chrome, 200, &document, &lang).await),
        }
    }

    async fn role_containment(
        &self,
        versions: &TableVersions,
    ) -> Result<Arc<RoleContainment>, Error> {
        self.role_cache
            .get_or_try_load(versions, || async {
                let pairs = self.ports.roles.containment_pairs().await?;
                let (table, rejected) = RoleContainment::load(pairs);
                for cycle in &rejected {
                    error!(
                        container = %cycle.container,
                        member = %cycle.member,
                        "ignoring stored role containment closing a cycle"
                    );
                }
                Ok::<_, super::ports::RoleRepositoryError>(table)
            })
            .await
            .map_err(|err| Error::internal(err.to_string()))
    }

    fn page_language<'a>(&'a self, req: &'a Request) -> &'a str {
        req.preferred_language(&self.settings.languages)
            .unwrap_or_else(|| req.language())
    }

    fn password_change_redirect(&self, req: &mut Request) -> Option<String> {
        let today = self.clock.utc().date_naive();
        let expired = req.user().is_some_and(|user| user.password_expired(today));
        if !expired
            || req.is_resource_request()
            || req.uri() == self.settings.password_change_path()
        {
            return None;
        }
        info!(uri = %req.uri(), "password expired, redirecting");
        req.message(MessageKind::Error, MSG_PASSWORD_EXPIRED);
        req.message(MessageKind::Info, MSG_ACCESS_RESTRICTED);
        Some(self.settings.password_change_uri.clone())
    }

    async fn page(
        &self,
        req: &mut Request,
        chrome: &Chrome,
        status: u16,
        document: &Document,
        lang: &str,
    ) -> Reply {
        let entries = if self.settings.maintenance {
            Vec::new()
        } else {
            match self.ports.panels.panels(lang).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(error = %err, "panels unavailable");
                    Vec::new()
                }
            }
        };
        let panels = build_panels(entries, req, &self.modules).await;
        let messages = req.take_messages();
        let uri = req.uri();
        let html = self.exporter.export(&Page {
            document,
            menu: &chrome.menu,
            current: chrome.current.as_deref(),
            panels: &panels,
            messages: &messages,
            user: req.user(),
            lang: document.lang.as_deref().unwrap_or(lang),
            uri: &uri,
            last_change: None,
        });
        Reply {
            status,
            body: ReplyBody::Html(html),
            cookies: req.take_cookie_updates(),
            flash: Vec::new(),
        }
    }

    async fn error_reply(&self, req: &mut Request, chrome: &Chrome, err: Error) -> Reply {
        let mut failure = AuthenticationFailure::of(&err);
        if chrome.session_expired && failure == Some(AuthenticationFailure::LoginRequired) {
            failure = Some(AuthenticationFailure::SessionExpired);
        }
        let document = match (err.code(), failure) {
            (ErrorCode::Unauthorized, Some(failure)) => {
                debug!(?failure, uri = %req.uri(), "authentication required");
                req.message(MessageKind::Error, failure.message());
                self.login_document(req)
            }
            (ErrorCode::InternalError, _) => {
                self.report(req, &err).await;
                let mut content = vec![Content::Paragraph(MSG_INTERNAL.to_owned())];
                if let Some(id) = err.trace_id() {
                    content.push(Content::Paragraph(format!("Reference: {id}")));
                }
                Document::new("Internal Server Error", content)
            }
            (code, _) => {
                debug!(?code, message = %err.message(), uri = %req.uri(), "request refused");
                Document::new(code.title(), vec![Content::Paragraph(err.message().to_owned())])
            }
        };
        let lang = self.page_language(req).to_owned();
        self.page(req, chrome, err.code().status(), &document, &lang)
            .await
    }

    async fn report(&self, req: &Request, err: &Error) {
        let report = BugReport::new(req, err);
        error!(
            trace_id = ?err.trace_id(),
            uri = %report.uri,
            params = ?report.params,
            error = %err,
            "request failed"
        );
        let Some(address) = &self.settings.bug_report_address else {
            return;
        };
        if let Err(delivery) = self.ports.bug_reporter.report(address, &report).await {
            warn!(error = %delivery, "bug report not delivered");
        }
    }

    fn login_document(&self, req: &Request) -> Document {
        let login = req
            .param(LOGIN_PARAM)
            .or_else(|| req.cookie(LOGIN_COOKIE))
            .unwrap_or_default();
        let form = Form {
            action: req.uri(),
            hidden: vec![(COMMAND_PARAM.to_owned(), "login".to_owned())],
            fields: vec![
                FormField {
                    id: LOGIN_PARAM.to_owned(),
                    label: "Login name".to_owned(),
                    kind: InputKind::Text,
                    value: login.to_owned(),
                    required: true,
                    error: None,
                },
                FormField {
                    id: PASSWORD_PARAM.to_owned(),
                    label: "Password".to_owned(),
                    kind: InputKind::Secret,
                    value: String::new(),
                    required: true,
                    error: None,
                },
            ],
            errors: Vec::new(),
            submit_label: "Log in".to_owned(),
        };
        let mut content = vec![Content::Form(form)];
        if self.settings.allow_registration {
            content.push(Content::Link(Link::new(
                "/_registration?action=add",
                "Register a new user account",
            )));
        }
        Document::new("Login", content)
    }
}

fn apply_preview_mode(req: &mut Request) {
    if !req.check_roles(&[Role::CONTENT_ADMIN]) {
        req.set_preview_mode(false);
        return;
    }
    let requested = req.param(PREVIEW_PARAM).map(|value| value == "1");
    let enabled = match requested {
        Some(enabled) => {
            req.set_cookie(
                PREVIEW_COOKIE,
                if enabled { "1" } else { "0" },
                Some(PREVIEW_COOKIE_MAX_AGE),
            );
            enabled
        }
        None => req.cookie(PREVIEW_COOKIE) == Some("1"),
    };
    req.set_preview_mode(enabled);
}

/// A submitted form whose `Referer` points at another origin.
fn is_foreign_submit(req: &Request) -> bool {
    if !req.has_param(SUBMIT_PARAM) {
        return false;
    }
    let Some(referer) = req.header("referer") else {
        return false;
    };
    let Ok(server) = Url::parse(req.server_uri()) else {
        return false;
    };
    Url::parse(referer).map_or(true, |referer| {
        referer.origin().ascii_serialization() != server.origin().ascii_serialization()
    })
}

fn redirect(req: &mut Request, uri: String) -> Reply {
    Reply {
        status: 302,
        body: ReplyBody::Redirect(uri),
        cookies: req.take_cookie_updates(),
        flash: req.take_messages(),
    }
}

#[cfg(test)]
mod tests;
