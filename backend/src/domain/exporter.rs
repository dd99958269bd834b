//! HTML export of a document with its page chrome.
//!
//! The page layout is a fixed tree of named regions. Leaf regions render
//! through their own functions; a region producing nothing is left out,
//! and so is a group whose regions all came out empty.

use super::{
    Content, Document, Form, InputKind, MenuItem, Message, MessageKind, Panel, SiteSettings,
    TableRow, User, VERIFY_SUFFIX,
};
use crate::domain::auth::COMMAND_PARAM;
use crate::domain::language::SET_LANGUAGE_PARAM;

/// Base interactivity library, loaded before any other script.
pub const BASE_SCRIPT: &str = "/_resources/prototype.js";

const STYLESHEETS: &[&str] = &["/_resources/default.css", "/_resources/layout.css"];
const SCRIPTS: &[&str] = &["/_resources/wiking.js"];

/// Everything shown on one page.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    /// Main document.
    pub document: &'a Document,
    /// Navigation tree.
    pub menu: &'a [MenuItem],
    /// Identifier of the top-level menu item the page belongs to.
    pub current: Option<&'a str>,
    /// Side panels.
    pub panels: &'a [Panel],
    /// Messages shown above the content.
    pub messages: &'a [Message],
    /// Logged-in user.
    pub user: Option<&'a User>,
    /// Language the page is rendered in.
    pub lang: &'a str,
    /// Path of the page, target of the language switch links.
    pub uri: &'a str,
    /// Date of the last content change, when known.
    pub last_change: Option<&'a str>,
}

type Render = fn(&Exporter, &Page<'_>) -> Option<String>;

enum Region {
    Leaf(&'static str, Render),
    Group(&'static str, &'static [Region]),
}

const LAYOUT: &[Region] = &[Region::Group(
    "wrapper",
    &[
        Region::Leaf("top", Exporter::top),
        Region::Group(
            "page",
            &[
                Region::Leaf("menu", Exporter::menu),
                Region::Leaf("submenu", Exporter::submenu),
                Region::Leaf("language_selection", Exporter::language_selection),
                Region::Leaf("panels", Exporter::panels),
                Region::Leaf("content", Exporter::content),
                Region::Leaf("clearing", Exporter::clearing),
            ],
        ),
        Region::Group(
            "bottom",
            &[
                Region::Leaf("wiking_bar", Exporter::wiking_bar),
                Region::Leaf("last_change", Exporter::last_change),
                Region::Leaf("footer", Exporter::footer),
            ],
        ),
    ],
)];

/// Escape text for HTML element content and attribute values.
///
/// # Examples
/// ```
/// use wiking::domain::escape;
///
/// assert_eq!(escape(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
/// ```
#[must_use]
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Renders pages for one site.
#[derive(Debug, Clone)]
pub struct Exporter {
    site_title: String,
    site_subtitle: Option<String>,
    languages: Vec<String>,
}

impl Exporter {
    /// Exporter for the configured site.
    #[must_use]
    pub fn new(settings: &SiteSettings) -> Self {
        Self {
            site_title: settings.title.clone(),
            site_subtitle: settings.subtitle.clone(),
            languages: settings.languages.clone(),
        }
    }

    /// Complete HTML page.
    #[must_use]
    pub fn export(&self, page: &Page<'_>) -> String {
        let mut html = String::from("<!DOCTYPE html>\n");
        html.push_str(&format!("<html lang=\"{}\">\n", escape(page.lang)));
        html.push_str(&self.head(page));
        html.push_str("<body>\n");
        for region in LAYOUT {
            if let Some(part) = self.region(region, page) {
                html.push_str(&part);
            }
        }
        html.push_str("</body>\n</html>\n");
        html
    }

    fn region(&self, region: &Region, page: &Page<'_>) -> Option<String> {
        match region {
            Region::Leaf(id, render) => {
                render(self, page).map(|inner| format!("<div id=\"{id}\">{inner}</div>\n"))
            }
            Region::Group(id, children) => {
                let inner: String = children
                    .iter()
                    .filter_map(|child| self.region(child, page))
                    .collect();
                (!inner.is_empty()).then(|| format!("<div id=\"{id}\">\n{inner}</div>\n"))
            }
        }
    }

    fn head(&self, page: &Page<'_>) -> String {
        let mut head = String::from("<head>\n<meta charset=\"utf-8\">\n");
        head.push_str(&format!(
            "<title>{} - {}</title>\n",
            escape(&self.site_title),
            escape(&page.document.title)
        ));
        for href in STYLESHEETS {
            head.push_str(&format!(
                "<link rel=\"stylesheet\" type=\"text/css\" href=\"{href}\">\n"
            ));
        }
        for src in std::iter::once(&BASE_SCRIPT).chain(SCRIPTS) {
            head.push_str(&format!(
                "<script type=\"text/javascript\" src=\"{src}\"></script>\n"
            ));
        }
        head.push_str("</head>\n");
        head
    }

    fn top(&self, _page: &Page<'_>) -> Option<String> {
        let mut top = format!("<div id=\"site-title\"><a href=\"/\">{}</a></div>", escape(&self.site_title));
        if let Some(subtitle) = &self.site_subtitle {
            top.push_str(&format!("<div id=\"site-subtitle\">{}</div>", escape(subtitle)));
        }
        Some(top)
    }

    fn menu(&self, page: &Page<'_>) -> Option<String> {
        let items: String = page
            .menu
            .iter()
            .filter(|item| !item.hidden)
            .map(|item| {
                let class = if page.current == Some(item.id.as_str()) {
                    " class=\"current\""
                } else {
                    ""
                };
                format!(
                    "<li{class}><a href=\"/{}\"{}>{}</a></li>",
                    escape(&item.id),
                    title_attribute(item.description.as_deref()),
                    escape(&item.title)
                )
            })
            .collect();
        (!items.is_empty()).then(|| format!("<ul class=\"menu\">{items}</ul>"))
    }

    /// Local navigation: the visible subtree of the current top-level item.
    fn submenu(&self, page: &Page<'_>) -> Option<String> {
        let current = page.current?;
        let top = page.menu.iter().find(|item| item.id == current)?;
        let tree = menu_tree(&top.children)?;
        Some(format!(
            "<h3>Local navigation: {}</h3>{tree}",
            escape(&top.title)
        ))
    }

    fn language_selection(&self, page: &Page<'_>) -> Option<String> {
        let variants = if page.document.variants.is_empty() {
            &self.languages
        } else {
            &page.document.variants
        };
        if variants.len() < 2 {
            return None;
        }
        let links: Vec<String> = variants
            .iter()
            .map(|lang| {
                if lang == page.lang {
                    format!("<strong>{}</strong>", escape(lang))
                } else {
                    format!(
                        "<a href=\"{}?{SET_LANGUAGE_PARAM}={}\" hreflang=\"{}\">{}</a>",
                        escape(page.uri),
                        escape(lang),
                        escape(lang),
                        escape(lang)
                    )
                }
            })
            .collect();
        Some(links.join(" | "))
    }

    fn panels(&self, page: &Page<'_>) -> Option<String> {
        let panels: String = page
            .panels
            .iter()
            .map(|panel| {
                let heading = match &panel.link {
                    Some(link) => format!(
                        "<a href=\"{}\">{}</a>",
                        escape(link),
                        escape(&panel.title)
                    ),
                    None => escape(&panel.title),
                };
                format!(
                    "<div class=\"panel\" id=\"{}\"><h3>{heading}</h3><div class=\"panel-content\">{}</div></div>",
                    escape(&panel.id),
                    render_content(&panel.content)
                )
            })
            .collect();
        (!panels.is_empty()).then_some(panels)
    }

    fn content(&self, page: &Page<'_>) -> Option<String> {
        let document = page.document;
        let mut content = match &document.subtitle {
            Some(subtitle) => format!(
                "<h1>{} :: {}</h1>",
                escape(&document.title),
                escape(subtitle)
            ),
            None => format!("<h1>{}</h1>", escape(&document.title)),
        };
        if !page.messages.is_empty() {
            content.push_str("<div class=\"messages\">");
            for message in page.messages {
                content.push_str(&format!(
                    "<div class=\"{}\">{}</div>",
                    message_class(message.kind),
                    escape(&message.text)
                ));
            }
            content.push_str("</div>");
        }
        let lang = document
            .lang
            .as_deref()
            .map(|lang| format!(" lang=\"{}\"", escape(lang)))
            .unwrap_or_default();
        content.push_str(&format!(
            "<div class=\"content\"{lang}>{}</div>",
            render_content(&document.content)
        ));
        Some(content)
    }

    fn clearing(&self, _page: &Page<'_>) -> Option<String> {
        Some("&nbsp;".to_owned())
    }

    fn wiking_bar(&self, page: &Page<'_>) -> Option<String> {
        let login = match page.user {
            Some(user) => format!(
                "<span class=\"user\">{}</span> <a href=\"{}?{COMMAND_PARAM}=logout\">Log out</a>",
                escape(user.name()),
                escape(page.uri)
            ),
            None => "<a href=\"/_registration\">Log in</a>".to_owned(),
        };
        Some(login)
    }

    fn last_change(&self, page: &Page<'_>) -> Option<String> {
        page.last_change
            .map(|date| format!("Last change: {}", escape(date)))
    }

    fn footer(&self, _page: &Page<'_>) -> Option<String> {
        Some("<a href=\"/_sitemap\">Site map</a> | Powered by Wiking".to_owned())
    }
}

/// Nested list of the visible `items`, `None` when none is visible.
fn menu_tree(items: &[MenuItem]) -> Option<String> {
    let entries: String = items
        .iter()
        .filter(|item| !item.hidden)
        .map(|item| {
            format!(
                "<li><a href=\"/{}\"{}>{}</a>{}</li>",
                escape(&item.id),
                title_attribute(item.description.as_deref()),
                escape(&item.title),
                menu_tree(&item.children).unwrap_or_default()
            )
        })
        .collect();
    (!entries.is_empty()).then(|| format!("<ul class=\"submenu\">{entries}</ul>"))
}

fn title_attribute(description: Option<&str>) -> String {
    description
        .map(|text| format!(" title=\"{}\"", escape(text)))
        .unwrap_or_default()
}

const fn message_class(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Info => "message",
        MessageKind::Warning => "warning",
        MessageKind::Error => "error",
    }
}

/// Render a content tree.
#[must_use]
pub fn render_content(content: &[Content]) -> String {
    content.iter().map(render_node).collect()
}

fn render_node(node: &Content) -> String {
    match node {
        Content::Heading(text) => format!("<h2>{}</h2>", escape(text)),
        Content::Paragraph(text) => format!("<p>{}</p>", escape(text).replace('\n', "<br/>")),
        Content::Link(link) => format!(
            "<a href=\"{}\">{}</a>",
            escape(&link.uri),
            escape(&link.label)
        ),
        Content::Container(children) => format!("<div>{}</div>", render_content(children)),
        Content::ItemList(items) => {
            let items: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", render_node(item)))
                .collect();
            format!("<ul>{items}</ul>")
        }
        Content::Table { columns, rows } => render_table(columns, rows),
        Content::FieldList(fields) => {
            let rows: String = fields
                .iter()
                .map(|(label, value)| {
                    format!(
                        "<tr><th>{}:</th><td>{}</td></tr>",
                        escape(label),
                        escape(value)
                    )
                })
                .collect();
            format!("<table class=\"field-list\">{rows}</table>")
        }
        Content::Form(form) => render_form(form),
        Content::Tree(items) => render_tree(items),
    }
}

fn render_table(columns: &[String], rows: &[TableRow]) -> String {
    let head: String = columns
        .iter()
        .map(|label| format!("<th>{}</th>", escape(label)))
        .collect();
    let body: String = rows
        .iter()
        .map(|row| {
            let cells: String = row
                .cells
                .iter()
                .enumerate()
                .map(|(position, cell)| match (&row.link, position) {
                    (Some(link), 0) => format!(
                        "<td><a href=\"{}\">{}</a></td>",
                        escape(link),
                        escape(cell)
                    ),
                    _ => format!("<td>{}</td>", escape(cell)),
                })
                .collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();
    format!("<table class=\"list-view\"><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table>")
}

fn render_tree(items: &[MenuItem]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let items: String = items
        .iter()
        .map(|item| {
            format!(
                "<li><a href=\"/{}\"{}>{}</a>{}</li>",
                escape(&item.id),
                title_attribute(item.description.as_deref()),
                escape(&item.title),
                render_tree(&item.children)
            )
        })
        .collect();
    format!("<ul>{items}</ul>")
}

fn render_form(form: &Form) -> String {
    let mut html = format!(
        "<form action=\"{}\" method=\"post\" class=\"edit-form\">",
        escape(&form.action)
    );
    for (name, value) in &form.hidden {
        html.push_str(&format!(
            "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
            escape(name),
            escape(value)
        ));
    }
    if !form.errors.is_empty() {
        html.push_str("<div class=\"errors\">");
        for error in &form.errors {
            html.push_str(&format!("<p class=\"error\">{}</p>", escape(error)));
        }
        html.push_str("</div>");
    }
    for field in &form.fields {
        let id = escape(&field.id);
        let value = escape(&field.value);
        let required = if field.required { " required" } else { "" };
        let marker = if field.required { "*" } else { "" };
        let input = match field.kind {
            InputKind::Text => {
                format!("<input type=\"text\" name=\"{id}\" id=\"{id}\" value=\"{value}\"{required}>")
            }
            InputKind::TextArea => {
                format!("<textarea name=\"{id}\" id=\"{id}\"{required}>{value}</textarea>")
            }
            InputKind::Checkbox => {
                let checked = if field.value.is_empty() { "" } else { " checked" };
                format!("<input type=\"checkbox\" name=\"{id}\" id=\"{id}\" value=\"T\"{checked}>")
            }
            InputKind::Password => format!(
                "<input type=\"password\" name=\"{id}\" id=\"{id}\"{required}> \
                 <input type=\"password\" name=\"{id}{VERIFY_SUFFIX}\"{required}>"
            ),
            InputKind::Secret => {
                format!("<input type=\"password\" name=\"{id}\" id=\"{id}\"{required}>")
            }
            InputKind::Display => format!("<span class=\"value\">{value}</span>"),
        };
        let error = field
            .error
            .as_deref()
            .map(|text| format!("<span class=\"error\">{}</span>", escape(text)))
            .unwrap_or_default();
        html.push_str(&format!(
            "<div class=\"field\"><label for=\"{id}\">{}{marker}:</label> {input}{error}</div>",
            escape(&field.label)
        ));
    }
    html.push_str(&format!(
        "<button type=\"submit\" name=\"submit\" value=\"1\">{}</button></form>",
        escape(&form.submit_label)
    ));
    html
}
