//! Self service account registration and the user's own record.
//!
//! Registration forwards to the `Users` module: `add`/`insert` create a new
//! account when registration is allowed, anything else addresses the
//! current user's own record.

use async_trait::async_trait;

use crate::domain::auth::COMMAND_PARAM;
use crate::domain::{
    Action, AuthenticationFailure, Error, Module, ModuleContext, Outcome, Request,
};

use super::users;

/// Registered name.
pub const NAME: &str = "Registration";

/// Registration and own account management.
#[derive(Debug, Clone, Copy, Default)]
pub struct Registration;

#[async_trait]
impl Module for Registration {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "Registration"
    }

    async fn handle(&self, req: &mut Request, ctx: &ModuleContext<'_>) -> Result<Outcome, Error> {
        if req.param(COMMAND_PARAM) == Some("logout") {
            return Ok(Outcome::Redirect("/".to_owned()));
        }
        let users = ctx.modules.module(users::NAME)?;
        if matches!(req.action()?, Some(Action::Add | Action::Insert)) {
            if !ctx.settings.allow_registration {
                return Err(Error::forbidden("Registration is not allowed."));
            }
            return users.handle(req, ctx).await;
        }
        let Some(user) = req.user() else {
            return Err(AuthenticationFailure::LoginRequired.into_error());
        };
        let own = user.login().as_str().to_owned();
        match req.unresolved_path().first() {
            None => req.push_unresolved(own),
            Some(segment) if *segment == own => {}
            Some(_) => return Err(Error::not_found(format!("Not found: {}", req.uri()))),
        }
        users.handle(req, ctx).await
    }
}
