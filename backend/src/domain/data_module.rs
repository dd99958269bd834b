//! Table bound module driving the list/view/add/edit/remove action cycle.
//!
//! The record is addressed by the path segment following the module (the
//! value of the referer column) or by the `key` parameter. Write actions
//! validate the submitted form completely before touching storage; a
//! validation or constraint failure re-renders the originating form with
//! the errors and the values the user typed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::ports::{RecordStore, RecordStoreError};
use super::{
    Action, AuthenticationFailure, Content, Document, Editable, Error, FieldError, FieldType,
    Form, FormField, InputKind, IntegrityMatchers, Link, Method, MessageKind, Module,
    ModuleContext, Outcome, Panelizable, Params, PasswordStorage, RecordQuery, Request, Rights,
    Row, SortKey, TableRow, TableSpec, display_value, key_value, path_segment,
};

/// Parameter addressing a record by its key column.
pub const KEY_PARAM: &str = "key";

const MSG_INSERTED: &str = "New record was successfully inserted.";
const MSG_UPDATED: &str = "The record was successfully updated.";
const MSG_DELETED: &str = "The record was deleted.";
const MSG_CONFIRM_REMOVE: &str = "Please, confirm removing the record permanently.";

/// A module presenting one table through its [`TableSpec`].
pub struct DataModule {
    name: &'static str,
    title: &'static str,
    spec: TableSpec,
    rights: Rights,
    store: Arc<dyn RecordStore>,
    passwords: Arc<dyn PasswordStorage>,
    matchers: IntegrityMatchers,
    panel_sort: Option<Vec<SortKey>>,
}

impl std::fmt::Debug for DataModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataModule")
            .field("name", &self.name)
            .field("table", &self.spec.table)
            .finish_non_exhaustive()
    }
}

impl DataModule {
    /// Module `name` over `spec`, storing rows in `store`.
    #[must_use]
    pub fn new(
        name: &'static str,
        title: &'static str,
        spec: TableSpec,
        rights: Rights,
        store: Arc<dyn RecordStore>,
        passwords: Arc<dyn PasswordStorage>,
    ) -> Self {
        Self {
            name,
            title,
            spec,
            rights,
            store,
            passwords,
            matchers: IntegrityMatchers::default(),
            panel_sort: None,
        }
    }

    /// Use `matchers` to translate constraint violations.
    #[must_use]
    pub fn with_matchers(mut self, matchers: IntegrityMatchers) -> Self {
        self.matchers = matchers;
        self
    }

    /// Offer the most recent records, in `sort` order, to side panels.
    #[must_use]
    pub fn panelized(mut self, sort: Vec<SortKey>) -> Self {
        self.panel_sort = Some(sort);
        self
    }

    /// Field specification.
    #[must_use]
    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    /// Rights table.
    #[must_use]
    pub fn rights(&self) -> &Rights {
        &self.rights
    }

    fn record_uri(&self, base_uri: &str, row: &Row) -> String {
        let referer = row
            .get(self.spec.referer_column())
            .map(display_value)
            .unwrap_or_default();
        format!("{}/{}", base_uri.trim_end_matches('/'), path_segment(&referer))
    }

    fn key_of(&self, row: &Row) -> Value {
        row.get(self.spec.key).cloned().unwrap_or(Value::Null)
    }

    async fn find(&self, column: &str, raw: &str) -> Result<Option<Row>, Error> {
        self.store
            .find(self.spec.table, column, &key_value(raw))
            .await
            .map_err(storage_error)
    }

    async fn resolve_record(&self, req: &mut Request) -> Result<Option<Row>, Error> {
        if let Some(segment) = req.pop_unresolved() {
            if !req.unresolved_path().is_empty() {
                return Err(Error::not_found(format!("Not found: {}", req.uri())));
            }
            return self
                .find(self.spec.referer_column(), &segment)
                .await?
                .map(Some)
                .ok_or_else(|| Error::not_found(format!("Record not found: {segment}")));
        }
        match req.param(KEY_PARAM).map(str::to_owned) {
            Some(key) => self
                .find(self.spec.key, &key)
                .await?
                .map(Some)
                .ok_or_else(|| Error::not_found(format!("Record not found: {key}"))),
            None => Ok(None),
        }
    }

    fn authorize(&self, req: &Request, action: Action, record: Option<&Row>) -> Result<(), Error> {
        let owner = record.and_then(|row| self.spec.owner_of(row));
        if self.rights.permits(action, req.user(), owner) {
            return Ok(());
        }
        debug!(module = self.name, %action, "action denied");
        match req.user() {
            None => Err(AuthenticationFailure::LoginRequired.into_error()),
            Some(_) => Err(Error::forbidden(format!(
                "You are not allowed to {action} records of {}.",
                self.title
            ))),
        }
    }

    async fn list(&self, req: &Request, base_uri: &str) -> Result<Document, Error> {
        let rows = self
            .store
            .select(self.spec.table, &RecordQuery::sorted(&self.spec.sort))
            .await
            .map_err(storage_error)?;
        let columns = self
            .spec
            .columns
            .iter()
            .map(|id| self.spec.label(id).to_owned())
            .collect();
        let rows = rows
            .iter()
            .map(|row| TableRow {
                link: Some(self.record_uri(base_uri, row)),
                cells: self
                    .spec
                    .columns
                    .iter()
                    .map(|id| display_value(&self.spec.value(row, id)))
                    .collect(),
            })
            .collect();
        let mut content = vec![Content::Table { columns, rows }];
        if self.rights.permits(Action::Add, req.user(), None) {
            content.push(Content::Link(Link::new(
                format!("{base_uri}?action={}", Action::Add),
                "New record",
            )));
        }
        Ok(Document::new(self.title, content))
    }

    fn view(&self, row: &Row) -> Document {
        Document::new(self.title, vec![self.field_list(row)])
            .with_subtitle(display_value(&self.spec.value(row, self.spec.title)))
    }

    fn field_list(&self, row: &Row) -> Content {
        Content::FieldList(
            self.spec
                .layout
                .iter()
                .filter(|id| {
                    self.spec
                        .field(id)
                        .is_none_or(|field| field.field_type != FieldType::Password)
                })
                .map(|id| {
                    (
                        self.spec.label(id).to_owned(),
                        display_value(&self.spec.value(row, id)),
                    )
                })
                .collect(),
        )
    }

    /// Render the form of `action` (`add`, `edit` or `remove`).
    fn form_document(
        &self,
        action: Action,
        base_uri: &str,
        record: Option<&Row>,
        submitted: Option<&Params>,
        errors: Vec<FieldError>,
    ) -> Document {
        let target = action.submit_target().unwrap_or(action);
        let mut hidden = vec![("action".to_owned(), target.name().to_owned())];
        let uri = match record {
            Some(row) => {
                hidden.push((KEY_PARAM.to_owned(), display_value(&self.key_of(row))));
                self.record_uri(base_uri, row)
            }
            None => base_uri.to_owned(),
        };
        let fields = if action == Action::Remove {
            Vec::new()
        } else {
            self.form_fields(action == Action::Add, record, submitted)
        };
        let mut form = Form {
            action: uri,
            hidden,
            fields,
            errors: Vec::new(),
            submit_label: match action {
                Action::Remove => "Remove",
                _ => "Save",
            }
            .to_owned(),
        };
        form.apply_errors(errors);
        let (subtitle, mut content) = match (action, record) {
            (Action::Remove, Some(row)) => (
                "Remove",
                vec![self.field_list(row), Content::Paragraph(MSG_CONFIRM_REMOVE.to_owned())],
            ),
            (Action::Edit, _) => ("Edit", Vec::new()),
            _ => ("New record", Vec::new()),
        };
        content.push(Content::Form(form));
        Document::new(self.title, content).with_subtitle(subtitle)
    }

    fn form_fields(
        &self,
        inserting: bool,
        record: Option<&Row>,
        submitted: Option<&Params>,
    ) -> Vec<FormField> {
        self.spec
            .layout
            .iter()
            .filter_map(|id| self.spec.field(id))
            .filter(|field| field.editable != Editable::Never || !inserting)
            .map(|field| {
                let editable = match field.editable {
                    Editable::Always => true,
                    Editable::OnInsert => inserting,
                    Editable::Never => false,
                };
                let kind = match field.field_type {
                    _ if !editable => InputKind::Display,
                    FieldType::Text => InputKind::TextArea,
                    FieldType::Boolean => InputKind::Checkbox,
                    FieldType::Password => InputKind::Password,
                    _ => InputKind::Text,
                };
                let value = match (kind, submitted) {
                    (InputKind::Password, _) => String::new(),
                    (InputKind::Checkbox, Some(params)) => {
                        if params.get(field.id).is_some_and(|v| !v.is_empty()) {
                            "T".to_owned()
                        } else {
                            String::new()
                        }
                    }
                    (InputKind::Display, _) | (_, None) => record
                        .and_then(|row| row.get(field.id))
                        .map(|value| match value {
                            Value::Bool(true) => "T".to_owned(),
                            Value::Bool(false) => String::new(),
                            other => display_value(other),
                        })
                        .unwrap_or_default(),
                    (_, Some(params)) => params.get(field.id).unwrap_or_default().to_owned(),
                };
                FormField {
                    id: field.id.to_owned(),
                    label: field.label.to_owned(),
                    kind,
                    value,
                    // An empty password keeps the stored one when editing.
                    required: field.required
                        && editable
                        && (inserting || field.field_type != FieldType::Password),
                    error: None,
                }
            })
            .collect()
    }

    async fn insert(&self, req: &mut Request, base_uri: &str) -> Result<Outcome, Error> {
        let row = match self
            .spec
            .validate(req.params(), true, self.passwords.as_ref())
        {
            Ok(row) => row,
            Err(errors) => return Ok(self.failed(Action::Add, base_uri, None, req, errors)),
        };
        match self.store.insert(self.spec.table, &row).await {
            Ok(inserted) => {
                info!(module = self.name, key = %display_value(&self.key_of(&inserted)), "record inserted");
                req.message(MessageKind::Info, MSG_INSERTED);
                Ok(Outcome::Redirect(base_uri.to_owned()))
            }
            Err(RecordStoreError::Constraint { message }) => {
                let error = self.matchers.translate(&self.spec, &message);
                Ok(self.failed(Action::Add, base_uri, None, req, vec![error]))
            }
            Err(error) => Err(storage_error(error)),
        }
    }

    async fn update(&self, req: &mut Request, base_uri: &str, record: &Row) -> Result<Outcome, Error> {
        let row = match self
            .spec
            .validate(req.params(), false, self.passwords.as_ref())
        {
            Ok(row) => row,
            Err(errors) => {
                return Ok(self.failed(Action::Edit, base_uri, Some(record), req, errors));
            }
        };
        let key = self.key_of(record);
        match self.store.update(self.spec.table, self.spec.key, &key, &row).await {
            Ok(Some(updated)) => {
                info!(module = self.name, key = %display_value(&key), "record updated");
                req.message(MessageKind::Info, MSG_UPDATED);
                Ok(Outcome::Redirect(self.record_uri(base_uri, &updated)))
            }
            Ok(None) => Err(Error::not_found("Record not found")),
            Err(RecordStoreError::Constraint { message }) => {
                let error = self.matchers.translate(&self.spec, &message);
                Ok(self.failed(Action::Edit, base_uri, Some(record), req, vec![error]))
            }
            Err(error) => Err(storage_error(error)),
        }
    }

    async fn delete(&self, req: &mut Request, base_uri: &str, record: &Row) -> Result<Outcome, Error> {
        let key = self.key_of(record);
        match self.store.delete(self.spec.table, self.spec.key, &key).await {
            Ok(true) => {
                info!(module = self.name, key = %display_value(&key), "record deleted");
                req.message(MessageKind::Info, MSG_DELETED);
                Ok(Outcome::Redirect(base_uri.to_owned()))
            }
            Ok(false) => Err(Error::not_found("Record not found")),
            Err(RecordStoreError::Constraint { message }) => {
                let error = self.matchers.translate(&self.spec, &message);
                Ok(self.failed(Action::Remove, base_uri, Some(record), req, vec![error]))
            }
            Err(error) => Err(storage_error(error)),
        }
    }

    fn failed(
        &self,
        form: Action,
        base_uri: &str,
        record: Option<&Row>,
        req: &Request,
        errors: Vec<FieldError>,
    ) -> Outcome {
        debug!(module = self.name, errors = errors.len(), "form rejected");
        Outcome::Document(self.form_document(form, base_uri, record, Some(req.params()), errors))
    }
}

fn storage_error(error: RecordStoreError) -> Error {
    Error::internal(error.to_string())
}

#[async_trait]
impl Module for DataModule {
    fn name(&self) -> &str {
        self.name
    }

    fn title(&self) -> &str {
        self.title
    }

    async fn handle(&self, req: &mut Request, _ctx: &ModuleContext<'_>) -> Result<Outcome, Error> {
        let base_uri = req.resolved_uri();
        let requested = req.action()?;
        let record = self.resolve_record(req).await?;
        let action = requested.unwrap_or(if record.is_some() {
            Action::View
        } else {
            Action::List
        });
        if action.needs_record() && record.is_none() {
            return Err(Error::not_found(format!("Action {action} needs a record")));
        }
        if action.is_write() && req.method() != Method::Post {
            return Err(Error::invalid_request(format!(
                "Action {action} must be submitted by POST"
            )));
        }
        self.authorize(req, action, record.as_ref())?;
        match (action, record.as_ref()) {
            (Action::List, _) => self.list(req, &base_uri).await.map(Outcome::Document),
            (Action::View, Some(row)) => Ok(Outcome::Document(self.view(row))),
            (Action::Add | Action::Edit | Action::Remove, row) => Ok(Outcome::Document(
                self.form_document(action, &base_uri, row, None, Vec::new()),
            )),
            (Action::Insert, _) => self.insert(req, &base_uri).await,
            (Action::Update, Some(row)) => self.update(req, &base_uri, row).await,
            (Action::Delete, Some(row)) => self.delete(req, &base_uri, row).await,
            (Action::View | Action::Update | Action::Delete, None) => {
                Err(Error::not_found("Record not found"))
            }
        }
    }

    fn panelizable(&self) -> Option<&dyn Panelizable> {
        self.panel_sort.is_some().then_some(self as &dyn Panelizable)
    }
}

#[async_trait]
impl Panelizable for DataModule {
    async fn panelize(
        &self,
        _req: &Request,
        base_uri: &str,
        count: usize,
    ) -> Result<Vec<Content>, Error> {
        let sort = self.panel_sort.as_deref().unwrap_or(&self.spec.sort);
        let rows = self
            .store
            .select(self.spec.table, &RecordQuery::sorted(sort).limit(count))
            .await
            .map_err(storage_error)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Content::ItemList(
            rows.iter()
                .map(|row| {
                    Content::Link(Link::new(
                        self.record_uri(base_uri, row),
                        display_value(&self.spec.value(row, self.spec.title)),
                    ))
                })
                .collect(),
        )])
    }
}
