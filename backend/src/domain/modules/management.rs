//! Management interface (`_wmi`) grouping administrative modules into
//! sections.

use async_trait::async_trait;

use crate::domain::{
    AuthenticationFailure, Error, Module, ModuleContext, Outcome, Request, Role,
};

use super::{mapping, news, pages, panels, role_sets, users};

/// Registered name.
pub const NAME: &str = "WikingManagementInterface";

/// First path segment of the interface.
pub const PATH: &str = "_wmi";

/// Sections and the modules they contain, first module being the default.
const SECTIONS: &[(&str, &[&str])] = &[
    ("users", &[users::NAME, role_sets::NAME]),
    (
        "content",
        &[mapping::NAME, pages::NAME, news::NAME, panels::NAME],
    ),
];

/// Entry point of the management interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagementInterface;

#[async_trait]
impl Module for ManagementInterface {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "Management Interface"
    }

    async fn handle(&self, req: &mut Request, ctx: &ModuleContext<'_>) -> Result<Outcome, Error> {
        if !req.check_roles(&[Role::CONTENT_ADMIN, Role::USER_ADMIN]) {
            return Err(match req.user() {
                None => AuthenticationFailure::LoginRequired.into_error(),
                Some(_) => Error::forbidden("Access to the management interface denied."),
            });
        }
        let Some(section) = req.pop_unresolved() else {
            let (section, modules) = SECTIONS[0];
            return Ok(Outcome::Redirect(format!("/{PATH}/{section}/{}", modules[0])));
        };
        let modules = SECTIONS
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, modules)| *modules)
            .ok_or_else(|| Error::not_found(format!("Not found: {}", req.uri())))?;
        let Some(module) = req.pop_unresolved() else {
            let first = modules.first().copied().unwrap_or_default();
            return Ok(Outcome::Redirect(format!("/{PATH}/{section}/{first}")));
        };
        if !modules.contains(&module.as_str()) {
            return Err(Error::not_found(format!("Not found: {}", req.uri())));
        }
        ctx.modules.module(&module)?.handle(req, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AccountState, ErrorCode, Login, Method, ModuleRegistry, RoleContainment, SiteSettings,
        User, UserAccount, UserId,
    };
    use rstest::rstest;

    fn admin(roles: &[Role]) -> User {
        User::from_account(
            UserAccount {
                uid: UserId::new(1),
                login: Login::new("admin").expect("login"),
                name: "Admin".to_owned(),
                email: None,
                state: AccountState::Enabled,
                password: "plain:x".to_owned(),
                password_expiration: None,
                lang: None,
            },
            roles,
            &RoleContainment::standard(),
        )
    }

    async fn serve(path: &str, user: Option<User>) -> Result<Outcome, Error> {
        let registry = ModuleRegistry::new();
        let settings = SiteSettings::default();
        let ctx = ModuleContext {
            modules: &registry,
            settings: &settings,
            menu: &[],
        };
        let mut req = Request::new(Method::Get, path);
        req.pop_unresolved();
        req.set_user(user);
        ManagementInterface.handle(&mut req, &ctx).await
    }

    #[rstest]
    #[case("/_wmi", "/_wmi/users/Users")]
    #[case("/_wmi/content", "/_wmi/content/Mapping")]
    #[tokio::test]
    async fn sections_redirect_to_their_first_module(#[case] path: &str, #[case] target: &str) {
        let outcome = serve(path, Some(admin(&[Role::ADMIN]))).await.expect("redirect");
        assert_eq!(outcome, Outcome::Redirect(target.to_owned()));
    }

    #[rstest]
    #[case(None, ErrorCode::Unauthorized)]
    #[case(Some(admin(&[])), ErrorCode::Forbidden)]
    #[tokio::test]
    async fn administrators_only(#[case] user: Option<User>, #[case] expected: ErrorCode) {
        let err = serve("/_wmi", user).await.expect_err("denied");
        assert_eq!(err.code(), expected);
    }

    #[rstest]
    #[case("/_wmi/settings")]
    #[case("/_wmi/users/News")]
    #[tokio::test]
    async fn unknown_sections_and_modules_are_not_found(#[case] path: &str) {
        let err = serve(path, Some(admin(&[Role::CONTENT_ADMIN])))
            .await
            .expect_err("unknown");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
