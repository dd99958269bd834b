//! Transport-agnostic dispatch core.
//!
//! Purpose: resolve requests to modules, authenticate and authorise them,
//! drive the record action state machine and export documents. Everything
//! here reaches the outside world through the traits in [`ports`].
//!
//! Public surface:
//! - [`Application`]: the request pipeline.
//! - [`Request`], [`Document`], [`Error`]: what flows through it.
//! - [`Module`], [`ModuleRegistry`], [`DataModule`]: request handlers.
//! - [`PasswordStorage`] implementations and the [`salt_passwords`] and
//!   [`UpgradePlan`] maintenance operations.

pub mod action;
pub mod application;
pub mod auth;
pub mod bug_report;
pub mod cache;
pub mod data_module;
pub mod document;
pub mod error;
pub mod exporter;
pub mod integrity;
pub mod language;
pub mod menu;
pub mod migration;
pub mod module;
pub mod modules;
pub mod panel;
pub mod password;
pub mod ports;
pub mod record;
pub mod rehash;
pub mod request;
pub mod resolver;
pub mod rights;
pub mod roles;
pub mod session;
pub mod site;
pub mod trace_id;
pub mod user;

pub use self::action::Action;
pub use self::application::{Application, ApplicationPorts, Reply, ReplyBody};
pub use self::auth::{AuthenticationFailure, Authenticator, Identity};
pub use self::bug_report::BugReport;
pub use self::cache::{TableVersions, VersionedCache};
pub use self::data_module::DataModule;
pub use self::document::{
    Content, Document, Form, FormField, InputKind, Link, TableRow, paragraphs,
};
pub use self::error::{Error, ErrorCode};
pub use self::exporter::{Exporter, Page, escape, render_content};
pub use self::integrity::IntegrityMatchers;
pub use self::language::{LanguagePolicy, parse_accept_language};
pub use self::menu::{MappingEntry, MenuItem, TitleVariant, build_menu, first_visible, top_level_for};
pub use self::migration::{MigrationScript, UpgradeError, UpgradePlan, highest_version};
pub use self::module::{Module, ModuleContext, ModuleRegistry, Outcome, Panelizable};
pub use self::panel::{DEFAULT_PANEL_SIZE, Panel, PanelEntry, build_panels};
pub use self::password::{
    PasswordScheme, PasswordStorage, PlainTextPasswordStorage, Pbkdf2Md5PasswordStorage,
    Pbkdf2PasswordStorage, UniversalPasswordStorage, UnsaltedMd5PasswordStorage,
};
pub use self::record::{
    Derivation, Editable, FieldError, FieldSpec, FieldType, MSG_EMPTY, RecordQuery, Row, SortKey,
    TableSpec, VERIFY_SUFFIX, display_value, key_value,
};
pub use self::rehash::{RehashSummary, rehash, salt_passwords};
pub use self::request::{
    CookieUpdate, Message, MessageKind, Method, Params, Request, path_segment,
};
pub use self::resolver::{MappingIndex, Resolution, resolve};
pub use self::rights::Rights;
pub use self::roles::{Role, RoleContainment, RoleCycleError, RoleSet};
pub use self::session::{SessionId, SessionKey, SessionPolicy, SessionToken, SessionTokenError};
pub use self::site::SiteSettings;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user::{AccountState, Login, LoginNameError, User, UserAccount, UserId};
