//! Site map.

use async_trait::async_trait;

use crate::domain::{Content, Document, Error, MenuItem, Module, ModuleContext, Outcome, Request};

/// Registered name.
pub const NAME: &str = "SiteMap";

/// Renders every visible menu item as one tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteMap;

fn visible(items: &[MenuItem]) -> Vec<MenuItem> {
    items
        .iter()
        .filter(|item| !item.hidden)
        .map(|item| MenuItem {
            children: visible(&item.children),
            ..item.clone()
        })
        .collect()
}

#[async_trait]
impl Module for SiteMap {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "Site Map"
    }

    async fn handle(&self, req: &mut Request, ctx: &ModuleContext<'_>) -> Result<Outcome, Error> {
        if !req.unresolved_path().is_empty() {
            return Err(Error::not_found(format!("Not found: {}", req.uri())));
        }
        Ok(Outcome::Document(Document::new(
            self.title(),
            vec![Content::Tree(visible(ctx.menu))],
        )))
    }
}
