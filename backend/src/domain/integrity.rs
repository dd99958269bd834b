//! Translation of storage constraint violations into form errors.
//!
//! The storage layer reports violations with the database's own message.
//! Matchers recognise the constraint from that text and point the user at
//! the offending field.

use std::sync::OnceLock;

use regex::Regex;

use super::{FieldError, MSG_EMPTY, TableSpec};

const MSG_DUPLICATE: &str = "This value already exists.  Enter a unique value.";
const MSG_REFERENCED: &str = "The record is referenced by other records.";
const MSG_GENERIC: &str = "Unable to perform a database operation.";

/// One recognised constraint message.
#[derive(Debug, Clone)]
struct Rule {
    pattern: Regex,
    message: String,
}

/// Ordered list of constraint matchers; the first match wins.
///
/// Patterns capture the field id in the `id` group. Without such a group
/// the error is reported for the whole form.
#[derive(Debug, Clone)]
pub struct IntegrityMatchers {
    rules: Vec<Rule>,
}

static BUILTIN_RULES: OnceLock<Vec<Rule>> = OnceLock::new();

fn builtin_rules() -> &'static [Rule] {
    BUILTIN_RULES.get_or_init(|| {
        [
            (
                r#"duplicate key (value )?violates unique constraint "_?[a-z]+_(?P<id>[a-z_]+)_key""#,
                MSG_DUPLICATE,
            ),
            (
                r#"null value in column "(?P<id>[a-z_]+)"( of relation "[a-z_]+")? violates not-null constraint"#,
                MSG_EMPTY,
            ),
            (r"violates foreign key constraint", MSG_REFERENCED),
        ]
        .into_iter()
        .map(|(pattern, message)| Rule {
            pattern: Regex::new(pattern)
                .unwrap_or_else(|error| panic!("integrity pattern failed to compile: {error}")),
            message: message.to_owned(),
        })
        .collect()
    })
}

impl Default for IntegrityMatchers {
    fn default() -> Self {
        Self {
            rules: builtin_rules().to_vec(),
        }
    }
}

impl IntegrityMatchers {
    /// Add a module specific rule, tried before the built-in ones.
    ///
    /// # Errors
    /// [`regex::Error`] when `pattern` does not compile.
    pub fn with_rule(mut self, pattern: &str, message: &str) -> Result<Self, regex::Error> {
        self.rules.insert(
            0,
            Rule {
                pattern: Regex::new(pattern)?,
                message: message.to_owned(),
            },
        );
        Ok(self)
    }

    /// Translate a database message into a form error.
    ///
    /// Field errors carry the field label in front of the message; unknown
    /// violations fall back to a generic form error.
    ///
    /// # Examples
    /// ```
    /// use wiking::domain::{IntegrityMatchers, TableSpec};
    /// # use wiking::domain::{FieldSpec, FieldType};
    /// # let spec = TableSpec {
    /// #     table: "users", key: "uid", referer: None, owner: None, title: "login",
    /// #     sort: vec![], derivations: vec![], columns: vec![], layout: vec![],
    /// #     fields: vec![FieldSpec::new("login", "Login", FieldType::Text)],
    /// # };
    /// let error = IntegrityMatchers::default().translate(
    ///     &spec,
    ///     r#"duplicate key value violates unique constraint "users_login_key""#,
    /// );
    /// assert_eq!(error.field.as_deref(), Some("login"));
    /// assert!(error.message.starts_with("Login: "));
    /// ```
    #[must_use]
    pub fn translate(&self, spec: &TableSpec, message: &str) -> FieldError {
        for rule in &self.rules {
            let Some(captures) = rule.pattern.captures(message) else {
                continue;
            };
            return match captures.name("id") {
                Some(id) => {
                    let id = id.as_str();
                    FieldError::field(id, format!("{}: {}", spec.label(id), rule.message))
                }
                None => FieldError::form(rule.message.clone()),
            };
        }
        FieldError::form(MSG_GENERIC)
    }
}
