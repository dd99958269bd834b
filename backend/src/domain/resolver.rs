//! URI resolution: from the first path segment to the module serving it.
//!
//! Fixed system URIs are looked up in a static table first; everything else
//! goes through the mapping rows. A resolved segment is consumed before the
//! module sees the request.

use std::collections::BTreeMap;

use tracing::debug;

use super::modules::{documentation, management, registration, site_map, users};
use super::{
    Action, AuthenticationFailure, Error, MappingEntry, MenuItem, Request, Role, first_visible,
};

const STATIC_MAPPING: &[(&str, &str)] = &[
    ("_doc", documentation::NAME),
    (management::PATH, management::NAME),
    ("_registration", registration::NAME),
    ("_sitemap", site_map::NAME),
];

/// Mapping rows indexed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingIndex {
    entries: Vec<MappingEntry>,
    by_identifier: BTreeMap<String, usize>,
}

impl MappingIndex {
    /// Index `entries`; a repeated identifier keeps its first row.
    #[must_use]
    pub fn new(entries: Vec<MappingEntry>) -> Self {
        let mut by_identifier = BTreeMap::new();
        for (position, entry) in entries.iter().enumerate() {
            by_identifier
                .entry(entry.identifier.clone())
                .or_insert(position);
        }
        Self {
            entries,
            by_identifier,
        }
    }

    /// Row mapped at `identifier`.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&MappingEntry> {
        self.by_identifier
            .get(identifier)
            .and_then(|position| self.entries.get(*position))
    }

    /// All rows in tree order.
    #[must_use]
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Serve the request by the named module.
    Module(String),
    /// Send the client elsewhere.
    Redirect(String),
}

/// Resolve `req`, consuming the segment naming the module.
///
/// # Errors
/// `NotFound` for unmapped identifiers, `Forbidden` for unpublished items
/// outside preview mode, `Unauthorized` or `Forbidden` for private items
/// and for an empty menu, depending on whether a user is logged in.
pub fn resolve(
    req: &mut Request,
    mapping: &MappingIndex,
    menu: &[MenuItem],
) -> Result<Resolution, Error> {
    let Some(identifier) = req.unresolved_path().first().cloned() else {
        return match first_visible(menu) {
            Some(item) => Ok(Resolution::Redirect(format!("/{}", item.id))),
            None => Err(denied(req)),
        };
    };
    if let Some((_, module)) = STATIC_MAPPING.iter().find(|(id, _)| *id == identifier) {
        req.pop_unresolved();
        return Ok(Resolution::Module((*module).to_owned()));
    }
    let entry = mapping
        .get(&identifier)
        .ok_or_else(|| Error::not_found(format!("Not found: {}", req.uri())))?;
    if !entry.published && !req.preview_mode() {
        return Err(Error::forbidden("The item is not published."));
    }
    if entry.private && !req.check_roles(&[Role::USER]) && !registration_carve_out(req, entry) {
        debug!(identifier = %identifier, "private item denied");
        return Err(denied(req));
    }
    req.pop_unresolved();
    Ok(Resolution::Module(entry.module.clone()))
}

/// New accounts must be creatable through a private `Users` item.
///
/// Anything but a literal `add` or `insert` falls back to the privacy check.
fn registration_carve_out(req: &Request, entry: &MappingEntry) -> bool {
    let action = req.param("action");
    entry.module == users::NAME
        && [Action::Add, Action::Insert]
            .iter()
            .any(|allowed| action == Some(allowed.name()))
}

fn denied(req: &Request) -> Error {
    match req.user() {
        Some(_) => Error::forbidden("Access denied."),
        None => AuthenticationFailure::LoginRequired.into_error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AccountState, ErrorCode, Login, Method, RoleContainment, User, UserAccount, UserId,
        build_menu,
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn mapping() -> MappingIndex {
        let mut draft = MappingEntry::new(2, "draft", "News");
        draft.published = false;
        let mut members = MappingEntry::new(3, "members", "Users");
        members.private = true;
        let mut hidden = MappingEntry::new(1, "hidden", "News");
        hidden.ord = None;
        MappingIndex::new(vec![
            hidden,
            draft,
            members,
            MappingEntry::new(4, "news", "News"),
        ])
    }

    fn user(state: AccountState) -> User {
        User::from_account(
            UserAccount {
                uid: UserId::new(1),
                login: Login::new("joe").expect("login"),
                name: "Joe".to_owned(),
                email: None,
                state,
                password: "plain:x".to_owned(),
                password_expiration: None,
                lang: None,
            },
            &[],
            &RoleContainment::standard(),
        )
    }

    #[rstest]
    fn root_redirects_to_the_first_visible_item(mapping: MappingIndex) {
        let menu = build_menu(mapping.entries(), "en", false);
        let mut req = Request::new(Method::Get, "/");
        let resolution = resolve(&mut req, &mapping, &menu).expect("redirect");
        assert_eq!(resolution, Resolution::Redirect("/members".to_owned()));
    }

    #[rstest]
    #[case(None, ErrorCode::Unauthorized)]
    #[case(Some(AccountState::Enabled), ErrorCode::Forbidden)]
    fn empty_menu_denies_root(#[case] state: Option<AccountState>, #[case] expected: ErrorCode) {
        let mut req = Request::new(Method::Get, "/");
        req.set_user(state.map(user));
        let err = resolve(&mut req, &MappingIndex::default(), &[]).expect_err("denied");
        assert_eq!(err.code(), expected);
    }

    #[rstest]
    #[case("/_doc/cms", "Documentation", &["cms"])]
    #[case("/_wmi", "WikingManagementInterface", &[])]
    #[case("/hidden/5", "News", &["5"])]
    fn segments_are_consumed(
        mapping: MappingIndex,
        #[case] path: &str,
        #[case] module: &str,
        #[case] rest: &[&str],
    ) {
        let mut req = Request::new(Method::Get, path);
        let resolution = resolve(&mut req, &mapping, &[]).expect("resolved");
        assert_eq!(resolution, Resolution::Module(module.to_owned()));
        assert_eq!(req.unresolved_path(), rest);
    }

    #[rstest]
    fn unknown_identifiers_are_not_found(mapping: MappingIndex) {
        let mut req = Request::new(Method::Get, "/nothing");
        let err = resolve(&mut req, &mapping, &[]).expect_err("unknown");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[rstest]
    fn unpublished_items_need_preview(mapping: MappingIndex) {
        let mut req = Request::new(Method::Get, "/draft");
        let err = resolve(&mut req, &mapping, &[]).expect_err("unpublished");
        assert_eq!(err.code(), ErrorCode::Forbidden);
        req.set_preview_mode(true);
        assert!(resolve(&mut req, &mapping, &[]).is_ok());
    }

    #[rstest]
    #[case(None, Some(ErrorCode::Unauthorized))]
    #[case(Some(AccountState::Blocked), Some(ErrorCode::Forbidden))]
    #[case(Some(AccountState::Enabled), None)]
    fn private_items_need_a_user(
        mapping: MappingIndex,
        #[case] state: Option<AccountState>,
        #[case] expected: Option<ErrorCode>,
    ) {
        let mut req = Request::new(Method::Get, "/members");
        req.set_user(state.map(user));
        let result = resolve(&mut req, &mapping, &[]);
        assert_eq!(result.err().map(|err| err.code()), expected);
    }

    #[rstest]
    #[case("add", true)]
    #[case("insert", true)]
    #[case("list", false)]
    #[case("edit", false)]
    fn registration_stays_open_on_private_users_items(
        mapping: MappingIndex,
        #[case] action: &str,
        #[case] allowed: bool,
    ) {
        let mut req = Request::new(Method::Get, "/members").with_param("action", action);
        assert_eq!(resolve(&mut req, &mapping, &[]).is_ok(), allowed);
    }

    #[rstest]
    fn the_carve_out_is_limited_to_users(mut mapping: MappingIndex) {
        let mut private_news = MappingEntry::new(9, "internal", "News");
        private_news.private = true;
        let mut entries = mapping.entries().to_vec();
        entries.push(private_news);
        mapping = MappingIndex::new(entries);
        let mut req = Request::new(Method::Get, "/internal").with_param("action", "add");
        let err = resolve(&mut req, &mapping, &[]).expect_err("private");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[rstest]
    #[case(None, "bogus", ErrorCode::Unauthorized)]
    #[case(None, "", ErrorCode::Unauthorized)]
    #[case(Some(AccountState::Blocked), "ADD", ErrorCode::Forbidden)]
    fn unknown_actions_on_private_items_are_denied_not_malformed(
        mapping: MappingIndex,
        #[case] state: Option<AccountState>,
        #[case] action: &str,
        #[case] expected: ErrorCode,
    ) {
        let mut req = Request::new(Method::Get, "/members").with_param("action", action);
        req.set_user(state.map(user));
        let err = resolve(&mut req, &mapping, &[]).expect_err("denied");
        assert_eq!(err.code(), expected);
    }
}
