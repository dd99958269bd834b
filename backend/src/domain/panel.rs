//! Side panels shown next to the main content.

use tracing::warn;

use super::{Content, ModuleRegistry, Request, Role, paragraphs};

/// Default number of items a module-bound panel lists.
pub const DEFAULT_PANEL_SIZE: usize = 3;

/// One panel row joined with the mapping item it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelEntry {
    /// Row id.
    pub panel_id: i64,
    /// Language of the panel.
    pub lang: String,
    /// Explicit panel title.
    pub title: Option<String>,
    /// Menu order.
    pub ord: Option<i32>,
    /// Bound mapping identifier.
    pub identifier: Option<String>,
    /// Module of the bound mapping item.
    pub module: Option<String>,
    /// Title of the bound mapping item in `lang`.
    pub mapping_title: Option<String>,
    /// Whether the bound mapping item is private.
    pub private: bool,
    /// Number of module items listed.
    pub size: Option<usize>,
    /// Static text content.
    pub content: Option<String>,
    /// Visible to the public.
    pub published: bool,
}

impl PanelEntry {
    /// Published text panel.
    pub fn text(panel_id: i64, lang: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            panel_id,
            lang: lang.into(),
            title: Some(title.into()),
            ord: None,
            identifier: None,
            module: None,
            mapping_title: None,
            private: false,
            size: None,
            content: Some(text.into()),
            published: true,
        }
    }
}

/// A panel ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    /// Element id.
    pub id: String,
    /// Heading.
    pub title: String,
    /// Link of the heading to the bound module.
    pub link: Option<String>,
    /// Body.
    pub content: Vec<Content>,
}

/// Build the panels visible for `req`.
///
/// Unpublished panels show only in preview mode; panels bound to private
/// items need the `USER` role. A failing module only loses its item list,
/// the panel itself stays.
pub async fn build_panels(
    mut entries: Vec<PanelEntry>,
    req: &Request,
    modules: &ModuleRegistry,
) -> Vec<Panel> {
    entries.retain(|entry| {
        (entry.published || req.preview_mode())
            && (!entry.private || req.check_roles(&[Role::USER]))
    });
    entries.sort_by_key(|entry| (entry.ord.is_none(), entry.ord, entry.panel_id));
    let mut panels = Vec::with_capacity(entries.len());
    for entry in entries {
        let module = entry
            .module
            .as_deref()
            .and_then(|name| modules.module(name).ok());
        let title = entry
            .title
            .clone()
            .or_else(|| entry.mapping_title.clone())
            .or_else(|| module.as_ref().map(|m| m.title().to_owned()))
            .or_else(|| entry.identifier.clone())
            .unwrap_or_default();
        let link = entry.identifier.as_ref().map(|id| format!("/{id}"));
        let mut content = Vec::new();
        if let (Some(module), Some(base)) = (module.as_ref(), link.as_deref()) {
            if let Some(panelizable) = module.panelizable() {
                let count = entry.size.unwrap_or(DEFAULT_PANEL_SIZE);
                match panelizable.panelize(req, base, count).await {
                    Ok(items) => content.extend(items),
                    Err(error) => {
                        warn!(panel = entry.panel_id, error = %error, "panel content failed");
                    }
                }
            }
        }
        if let Some(text) = entry.content.filter(|text| !text.trim().is_empty()) {
            content.extend(paragraphs(&text));
        }
        panels.push(Panel {
            id: format!("panel-{}", entry.panel_id),
            title,
            link,
            content,
        });
    }
    panels
}
