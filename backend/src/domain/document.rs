//! Document content tree produced by modules and rendered by the exporter.

use super::{FieldError, MenuItem};

/// A link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Target URI.
    pub uri: String,
    /// Label.
    pub label: String,
}

impl Link {
    /// Link to `uri` labelled `label`.
    pub fn new(uri: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            label: label.into(),
        }
    }
}

/// Input widget kind of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Single line text.
    Text,
    /// Multi-line text.
    TextArea,
    /// Checkbox.
    Checkbox,
    /// Password with a confirmation input.
    Password,
    /// Single password input, e.g. on the login form.
    Secret,
    /// Read only display of the value.
    Display,
}

/// One field of a rendered form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// Parameter name.
    pub id: String,
    /// Label.
    pub label: String,
    /// Widget.
    pub kind: InputKind,
    /// Current value, already in display form.
    pub value: String,
    /// Mandatory marker.
    pub required: bool,
    /// Error shown next to the field.
    pub error: Option<String>,
}

/// Form content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    /// URI the form posts to.
    pub action: String,
    /// Hidden parameters.
    pub hidden: Vec<(String, String)>,
    /// Visible fields.
    pub fields: Vec<FormField>,
    /// Errors not bound to a field.
    pub errors: Vec<String>,
    /// Submit button label.
    pub submit_label: String,
}

impl Form {
    /// Number of field-bound errors.
    #[must_use]
    pub fn field_error_count(&self) -> usize {
        self.fields.iter().filter(|field| field.error.is_some()).count()
    }

    /// Attach `errors` to their fields; unbound ones go to the form.
    pub fn apply_errors(&mut self, errors: Vec<FieldError>) {
        for error in errors {
            let target = error
                .field
                .as_deref()
                .and_then(|id| self.fields.iter_mut().find(|field| field.id == id));
            match target {
                Some(field) => field.error = Some(error.message),
                None => self.errors.push(error.message),
            }
        }
    }
}

/// One row of a table listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Link to the record, placed on the first cell.
    pub link: Option<String>,
    /// Cell texts.
    pub cells: Vec<String>,
}

/// Node of the content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Section heading.
    Heading(String),
    /// Text paragraph.
    Paragraph(String),
    /// Hyperlink.
    Link(Link),
    /// Grouped content.
    Container(Vec<Content>),
    /// Bulleted list.
    ItemList(Vec<Content>),
    /// Tabular listing.
    Table {
        /// Column labels.
        columns: Vec<String>,
        /// Rows.
        rows: Vec<TableRow>,
    },
    /// Label / value pairs of one record.
    FieldList(Vec<(String, String)>),
    /// Form.
    Form(Form),
    /// Menu tree, e.g. a site map.
    Tree(Vec<MenuItem>),
}

/// Result of a module handler, rendered by the exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Page title.
    pub title: String,
    /// Optional subtitle appended to the heading.
    pub subtitle: Option<String>,
    /// Content.
    pub content: Vec<Content>,
    /// Language of the content, when it is language specific.
    pub lang: Option<String>,
    /// Languages the content is available in.
    pub variants: Vec<String>,
}

impl Document {
    /// Document titled `title` with `content`.
    pub fn new(title: impl Into<String>, content: Vec<Content>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            content,
            lang: None,
            variants: Vec::new(),
        }
    }

    /// Set the subtitle.
    #[must_use]
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    /// Set the content language and its available variants.
    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>, variants: Vec<String>) -> Self {
        self.lang = Some(lang.into());
        self.variants = variants;
        self
    }

    /// First form in the content, searching containers.
    #[must_use]
    pub fn form(&self) -> Option<&Form> {
        fn find(content: &[Content]) -> Option<&Form> {
            content.iter().find_map(|node| match node {
                Content::Form(form) => Some(form),
                Content::Container(children) | Content::ItemList(children) => find(children),
                _ => None,
            })
        }
        find(&self.content)
    }
}

/// Split `text` into paragraphs at blank lines.
///
/// # Examples
/// ```
/// use wiking::domain::{Content, paragraphs};
///
/// let content = paragraphs("First line\nsecond line\n\n  \nNext");
/// assert_eq!(
///     content,
///     vec![
///         Content::Paragraph("First line\nsecond line".to_owned()),
///         Content::Paragraph("Next".to_owned()),
///     ]
/// );
/// ```
#[must_use]
pub fn paragraphs(text: &str) -> Vec<Content> {
    let mut content = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !lines.is_empty() {
                content.push(Content::Paragraph(lines.join("\n")));
                lines.clear();
            }
        } else {
            lines.push(line.trim_end());
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn field(id: &str) -> FormField {
        FormField {
            id: id.to_owned(),
            label: id.to_owned(),
            kind: InputKind::Text,
            value: String::new(),
            required: false,
            error: None,
        }
    }

    #[rstest]
    fn errors_are_bound_to_their_fields() {
        let mut form = Form {
            action: "/x".to_owned(),
            hidden: Vec::new(),
            fields: vec![field("a"), field("b")],
            errors: Vec::new(),
            submit_label: "Save".to_owned(),
        };
        form.apply_errors(vec![
            FieldError::field("b", "bad"),
            FieldError::field("zzz", "orphan"),
            FieldError::form("whole"),
        ]);
        assert_eq!(form.field_error_count(), 1);
        assert_eq!(form.errors, vec!["orphan", "whole"]);
    }

    #[rstest]
    fn nested_forms_are_found() {
        let document = Document::new(
            "t",
            vec![Content::Container(vec![Content::Form(Form {
                action: "/".to_owned(),
                hidden: Vec::new(),
                fields: Vec::new(),
                errors: Vec::new(),
                submit_label: "Ok".to_owned(),
            })])],
        );
        assert!(document.form().is_some());
    }

    #[rstest]
    #[case("", 0)]
    #[case("\n \n", 0)]
    #[case("one", 1)]
    #[case("one\r\ntwo\r\n\r\nthree\n", 2)]
    fn blank_lines_separate_paragraphs(#[case] text: &str, #[case] expected: usize) {
        assert_eq!(paragraphs(text).len(), expected);
    }
}
