//! Records as seen through a module's field specification.
//!
//! A [`TableSpec`] declares the fields of one table, how they validate and
//! how they are laid out. Computed fields are explicit [`Derivation`]s that
//! name the fields they read and are evaluated when a record is presented.

use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};

use super::{Params, PasswordStorage, UserId};

/// Mandatory field left empty.
pub const MSG_EMPTY: &str = "Empty value.  This field is mandatory.";
const MSG_NOT_INTEGER: &str = "Not an integer.";
const MSG_BAD_EMAIL: &str = "Invalid e-mail address.";
const MSG_PASSWORD_MISMATCH: &str = "Passwords don't match.";
const MSG_BAD_DATE: &str = "Invalid date format.";
const MSG_TOO_LONG: &str = "Maximal length exceeded.";

/// Suffix of the confirmation parameter sent with password fields.
pub const VERIFY_SUFFIX: &str = "_verify";

/// One table row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Map<String, Value>);

impl Row {
    /// Empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Row from a JSON object; other JSON values yield `None`.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// The row as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Column value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Column value as a string slice, `None` for non-strings.
    #[must_use]
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    /// Column value as an integer.
    #[must_use]
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    /// Set a column.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    /// Builder flavour of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.insert(column, value.into());
        self
    }

    /// Remove a column.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    /// Whether the column is present (possibly null).
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Iterate columns.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display form of a column value (empty for null or missing).
    #[must_use]
    pub fn display(&self, column: &str) -> String {
        self.get(column).map(display_value).unwrap_or_default()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Display form of a value.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "Yes".to_owned(),
        Value::Bool(false) => "No".to_owned(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Value form of a key given in a URI or a `key` parameter.
///
/// Integers are compared as numbers, anything else as text.
#[must_use]
pub fn key_value(raw: &str) -> Value {
    raw.parse::<i64>()
        .map_or_else(|_| Value::String(raw.to_owned()), Value::from)
}

/// Field types the validator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Single line text, optionally length limited.
    String {
        /// Maximal length in characters.
        max_len: Option<usize>,
    },
    /// Multi-line text.
    Text,
    /// Integer number.
    Integer,
    /// Checkbox; absent means false.
    Boolean,
    /// E-mail address.
    Email,
    /// Password with confirmation, stored hashed and never echoed.
    Password,
    /// ISO date.
    Date,
}

/// When a field may be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Editable {
    /// On insert and on update.
    Always,
    /// Only when inserting (e.g. login names).
    OnInsert,
    /// Never by the user.
    Never,
}

/// Declaration of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column name.
    pub id: &'static str,
    /// Label shown to the user.
    pub label: &'static str,
    /// Value type.
    pub field_type: FieldType,
    /// Whether an empty value is rejected by validation.
    pub required: bool,
    /// Editability.
    pub editable: Editable,
}

impl FieldSpec {
    /// An optional, always editable field.
    #[must_use]
    pub const fn new(id: &'static str, label: &'static str, field_type: FieldType) -> Self {
        Self {
            id,
            label,
            field_type,
            required: false,
            editable: Editable::Always,
        }
    }

    /// Mark the field mandatory.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Override editability.
    #[must_use]
    pub const fn editable(mut self, editable: Editable) -> Self {
        self.editable = editable;
        self
    }

    fn editable_on(&self, inserting: bool) -> bool {
        match self.editable {
            Editable::Always => true,
            Editable::OnInsert => inserting,
            Editable::Never => false,
        }
    }
}

/// Computed field evaluated from the fields it depends on.
#[derive(Clone, Copy)]
pub struct Derivation {
    /// Virtual column name.
    pub id: &'static str,
    /// Label shown to the user.
    pub label: &'static str,
    /// Columns read by `compute`.
    pub depends: &'static [&'static str],
    /// Computation.
    pub compute: fn(&Row) -> Value,
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derivation")
            .field("id", &self.id)
            .field("depends", &self.depends)
            .finish_non_exhaustive()
    }
}

/// Sort key for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    /// Column.
    pub column: &'static str,
    /// Descending order.
    pub descending: bool,
}

impl SortKey {
    /// Ascending order by `column`.
    #[must_use]
    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    /// Descending order by `column`.
    #[must_use]
    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Row selection passed to the record store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    /// Equality conditions, all of which must hold.
    pub filters: Vec<(String, Value)>,
    /// Ordering.
    pub sort: Vec<SortKey>,
    /// Maximal number of rows.
    pub limit: Option<usize>,
}

impl RecordQuery {
    /// Select everything in `sort` order.
    #[must_use]
    pub fn sorted(sort: &[SortKey]) -> Self {
        Self {
            filters: Vec::new(),
            sort: sort.to_vec(),
            limit: None,
        }
    }

    /// Add an equality condition.
    #[must_use]
    pub fn filter(mut self, column: &str, value: Value) -> Self {
        self.filters.push((column.to_owned(), value));
        self
    }

    /// Limit the number of rows.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Validation or integrity problem reported back in the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field id, `None` for problems of the whole form.
    pub field: Option<String>,
    /// Message.
    pub message: String,
}

impl FieldError {
    /// Error bound to a field.
    pub fn field(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(id.into()),
            message: message.into(),
        }
    }

    /// Error of the whole form.
    pub fn form(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Field specification of one module's table.
#[derive(Debug, Clone)]
pub struct TableSpec {
    /// Table name.
    pub table: &'static str,
    /// Key column.
    pub key: &'static str,
    /// Column used as the record's URI segment, when different from the key.
    pub referer: Option<&'static str>,
    /// Column holding the owning user id.
    pub owner: Option<&'static str>,
    /// Column used as the record title.
    pub title: &'static str,
    /// Default listing order.
    pub sort: Vec<SortKey>,
    /// Stored fields.
    pub fields: Vec<FieldSpec>,
    /// Computed fields.
    pub derivations: Vec<Derivation>,
    /// Columns shown in listings.
    pub columns: Vec<&'static str>,
    /// Fields shown in forms and record views, in order.
    pub layout: Vec<&'static str>,
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .unwrap_or_else(|error| panic!("e-mail regex failed to compile: {error}"))
    })
}

impl TableSpec {
    /// Column identifying records in URIs.
    #[must_use]
    pub fn referer_column(&self) -> &'static str {
        self.referer.unwrap_or(self.key)
    }

    /// Stored field by id.
    #[must_use]
    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// Label of a stored or computed field; the id when unknown.
    #[must_use]
    pub fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.field(id)
            .map(|field| field.label)
            .or_else(|| {
                self.derivations
                    .iter()
                    .find(|derivation| derivation.id == id)
                    .map(|derivation| derivation.label)
            })
            .unwrap_or(id)
    }

    /// Owner of `row`, when the table has an owner column.
    #[must_use]
    pub fn owner_of(&self, row: &Row) -> Option<UserId> {
        self.owner
            .and_then(|column| row.get_i64(column))
            .map(UserId::new)
    }

    /// Value of `id`, computing it when it is a derivation.
    #[must_use]
    pub fn value(&self, row: &Row, id: &str) -> Value {
        self.derivations
            .iter()
            .find(|derivation| derivation.id == id)
            .map_or_else(
                || row.get(id).cloned().unwrap_or(Value::Null),
                |derivation| (derivation.compute)(row),
            )
    }

    /// Copy of `row` with every derivation evaluated.
    #[must_use]
    pub fn present(&self, row: &Row) -> Row {
        let mut presented = row.clone();
        for derivation in &self.derivations {
            presented.insert(derivation.id, (derivation.compute)(row));
        }
        presented
    }

    /// Validate submitted form values.
    ///
    /// Every editable layout field is checked before anything is written.
    /// Booleans missing from the form are false. When `inserting` is false an
    /// empty password keeps the stored one. Passwords are hashed with
    /// `passwords`.
    ///
    /// # Errors
    /// All field errors found, in layout order.
    pub fn validate(
        &self,
        params: &Params,
        inserting: bool,
        passwords: &dyn PasswordStorage,
    ) -> Result<Row, Vec<FieldError>> {
        let mut row = Row::new();
        let mut errors = Vec::new();
        for field in self
            .layout
            .iter()
            .filter_map(|id| self.field(id))
            .filter(|field| field.editable_on(inserting))
        {
            match validate_field(field, params, inserting, passwords) {
                Ok(Some(value)) => row.insert(field.id, value),
                Ok(None) => {}
                Err(message) => errors.push(FieldError::field(field.id, message)),
            }
        }
        if errors.is_empty() {
            Ok(row)
        } else {
            Err(errors)
        }
    }
}

fn validate_field(
    field: &FieldSpec,
    params: &Params,
    inserting: bool,
    passwords: &dyn PasswordStorage,
) -> Result<Option<Value>, &'static str> {
    let raw = params.get(field.id).unwrap_or_default();
    match field.field_type {
        FieldType::Boolean => Ok(Some(Value::Bool(matches!(
            raw,
            "T" | "t" | "true" | "on" | "1" | "yes"
        )))),
        FieldType::Password => {
            if raw.is_empty() {
                return if !inserting {
                    Ok(None)
                } else if field.required {
                    Err(MSG_EMPTY)
                } else {
                    Ok(Some(Value::Null))
                };
            }
            let verify = params.get(&format!("{}{VERIFY_SUFFIX}", field.id));
            if verify != Some(raw) {
                return Err(MSG_PASSWORD_MISMATCH);
            }
            Ok(Some(Value::String(passwords.stored_password(raw))))
        }
        field_type => {
            let value = if matches!(field_type, FieldType::Text) {
                raw
            } else {
                raw.trim()
            };
            if value.trim().is_empty() {
                return if field.required {
                    Err(MSG_EMPTY)
                } else {
                    Ok(Some(Value::Null))
                };
            }
            validate_typed(field_type, value).map(Some)
        }
    }
}

fn validate_typed(field_type: FieldType, value: &str) -> Result<Value, &'static str> {
    match field_type {
        FieldType::String { max_len: Some(max) } if value.chars().count() > max => {
            Err(MSG_TOO_LONG)
        }
        FieldType::Integer => value
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| MSG_NOT_INTEGER),
        FieldType::Email if !email_regex().is_match(value) => Err(MSG_BAD_EMAIL),
        FieldType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .map_err(|_| MSG_BAD_DATE),
        _ => Ok(Value::String(value.to_owned())),
    }
}
