//! Role containment editor: lists the stored pairs and adds new ones.
//!
//! Every new pair goes through [`RoleRepository::add_containment`], so a
//! pair closing a cycle is refused with an error on the form.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::ports::{RoleRepository, RoleRepositoryError};
use crate::domain::{
    Action, AuthenticationFailure, Content, Document, Error, FieldError, Form, FormField,
    InputKind, Link, MSG_EMPTY, Method, MessageKind, Module, ModuleContext, Outcome, Request,
    Role, TableRow,
};

/// Registered name.
pub const NAME: &str = "RoleSets";

const CONTAINER: &str = "role_id";
const MEMBER: &str = "member_role_id";
const MSG_INSERTED: &str = "New record was successfully inserted.";

/// Containment pairs of the application defined roles.
pub struct RoleSets {
    roles: Arc<dyn RoleRepository>,
}

impl RoleSets {
    /// Module over `roles`.
    #[must_use]
    pub fn new(roles: Arc<dyn RoleRepository>) -> Self {
        Self { roles }
    }

    async fn list(&self, base_uri: &str) -> Result<Document, Error> {
        let pairs = self.roles.containment_pairs().await.map_err(storage_error)?;
        let rows = pairs
            .iter()
            .map(|(container, member)| TableRow {
                link: None,
                cells: vec![container.id().to_owned(), member.id().to_owned()],
            })
            .collect();
        Ok(Document::new(
            "Role Sets",
            vec![
                Content::Table {
                    columns: vec!["Role".to_owned(), "Contained role".to_owned()],
                    rows,
                },
                Content::Link(Link::new(
                    format!("{base_uri}?action={}", Action::Add),
                    "New record",
                )),
            ],
        ))
    }

    fn form(base_uri: &str, req: Option<&Request>, errors: Vec<FieldError>) -> Document {
        let field = |id: &str, label: &str| FormField {
            id: id.to_owned(),
            label: label.to_owned(),
            kind: InputKind::Text,
            value: req
                .and_then(|req| req.param(id))
                .unwrap_or_default()
                .to_owned(),
            required: true,
            error: None,
        };
        let mut form = Form {
            action: base_uri.to_owned(),
            hidden: vec![("action".to_owned(), Action::Insert.name().to_owned())],
            fields: vec![field(CONTAINER, "Role"), field(MEMBER, "Contained role")],
            errors: Vec::new(),
            submit_label: "Save".to_owned(),
        };
        form.apply_errors(errors);
        Document::new("Role Sets", vec![Content::Form(form)]).with_subtitle("New record")
    }

    async fn insert(&self, req: &mut Request, base_uri: &str) -> Result<Outcome, Error> {
        let value = |id: &str| req.param(id).map(str::trim).unwrap_or_default().to_owned();
        let (container, member) = (value(CONTAINER), value(MEMBER));
        let missing: Vec<FieldError> = [(CONTAINER, &container), (MEMBER, &member)]
            .into_iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(id, _)| FieldError::field(id, MSG_EMPTY))
            .collect();
        if !missing.is_empty() {
            return Ok(Outcome::Document(Self::form(base_uri, Some(&*req), missing)));
        }
        let (container, member) = (Role::new(container), Role::new(member));
        match self.roles.add_containment(&container, &member).await {
            Ok(()) => {
                info!(container = %container, member = %member, "role containment added");
                req.message(MessageKind::Info, MSG_INSERTED);
                Ok(Outcome::Redirect(base_uri.to_owned()))
            }
            Err(error @ RoleRepositoryError::Cyclic { .. }) => {
                debug!(%error, "role containment refused");
                let errors = vec![FieldError::field(MEMBER, error.to_string())];
                Ok(Outcome::Document(Self::form(base_uri, Some(&*req), errors)))
            }
            Err(error) => Err(storage_error(error)),
        }
    }
}

fn storage_error(error: RoleRepositoryError) -> Error {
    Error::internal(error.to_string())
}

#[async_trait]
impl Module for RoleSets {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "Role Sets"
    }

    async fn handle(&self, req: &mut Request, _ctx: &ModuleContext<'_>) -> Result<Outcome, Error> {
        if !req.check_roles(&[Role::USER_ADMIN]) {
            return Err(match req.user() {
                None => AuthenticationFailure::LoginRequired.into_error(),
                Some(_) => Error::forbidden("Access denied."),
            });
        }
        if !req.unresolved_path().is_empty() {
            return Err(Error::not_found(format!("Not found: {}", req.uri())));
        }
        let base_uri = req.resolved_uri();
        match req.action()? {
            None | Some(Action::List) => self.list(&base_uri).await.map(Outcome::Document),
            Some(Action::Add) => Ok(Outcome::Document(Self::form(&base_uri, None, Vec::new()))),
            Some(Action::Insert) if req.method() == Method::Post => {
                self.insert(req, &base_uri).await
            }
            Some(Action::Insert) => Err(Error::invalid_request(
                "Action insert must be submitted by POST",
            )),
            Some(action) => Err(Error::invalid_request(format!(
                "Action {action} is not available here"
            ))),
        }
    }
}
