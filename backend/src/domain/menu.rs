//! Menu tree built from the mapping rows.
//!
//! Every published mapping row becomes a node under its parent. Rows without
//! a menu order stay in the tree, marked hidden: they and their subtree are
//! reachable by direct link but not listed in navigation.

use std::collections::{BTreeMap, BTreeSet};

/// Title and description of a mapping item in one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleVariant {
    /// Menu title.
    pub title: String,
    /// Tooltip / description.
    pub description: Option<String>,
}

/// One mapping row with its titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Row id.
    pub mapping_id: i64,
    /// Parent row id.
    pub parent: Option<i64>,
    /// URI segment.
    pub identifier: String,
    /// Name of the module serving the item.
    pub module: String,
    /// Menu order; `None` hides the item from navigation.
    pub ord: Option<i32>,
    /// Hierarchical order key, rows come sorted by it.
    pub tree_order: String,
    /// Visible to the public.
    pub published: bool,
    /// Requires a logged-in user.
    pub private: bool,
    /// Titles keyed by language code.
    pub titles: BTreeMap<String, TitleVariant>,
}

impl MappingEntry {
    /// Minimal entry, handy for fixtures.
    pub fn new(mapping_id: i64, identifier: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            mapping_id,
            parent: None,
            identifier: identifier.into(),
            module: module.into(),
            ord: Some(i32::try_from(mapping_id).unwrap_or(i32::MAX)),
            tree_order: format!("{mapping_id:08}"),
            published: true,
            private: false,
            titles: BTreeMap::new(),
        }
    }

    /// Title in `lang`, falling back to any title and then the identifier.
    #[must_use]
    pub fn title(&self, lang: &str) -> &str {
        self.variant(lang)
            .map_or(self.identifier.as_str(), |variant| variant.title.as_str())
    }

    fn variant(&self, lang: &str) -> Option<&TitleVariant> {
        self.titles
            .get(lang)
            .or_else(|| self.titles.values().next())
    }
}

/// Node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Mapping identifier, also the URI segment.
    pub id: String,
    /// Title in the requested language.
    pub title: String,
    /// Description in the requested language.
    pub description: Option<String>,
    /// Left out of navigation.
    pub hidden: bool,
    /// Menu order.
    pub order: Option<i32>,
    /// Sub items.
    pub children: Vec<MenuItem>,
    /// Languages the title exists in.
    pub variants: Vec<String>,
}

impl MenuItem {
    /// Find the item `id` in this subtree.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Visible children.
    pub fn visible_children(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter(|child| !child.hidden)
    }
}

/// Build the menu forest for `lang`.
///
/// Unpublished rows and everything below them are dropped unless
/// `include_unpublished` is set. Rows whose parent is unknown become roots.
///
/// # Examples
/// ```
/// use wiking::domain::{MappingEntry, build_menu};
///
/// let mut news = MappingEntry::new(2, "news", "News");
/// news.parent = Some(1);
/// let items = build_menu(&[MappingEntry::new(1, "index", "Pages"), news], "en", false);
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].children[0].id, "news");
/// ```
#[must_use]
pub fn build_menu(entries: &[MappingEntry], lang: &str, include_unpublished: bool) -> Vec<MenuItem> {
    let known: BTreeSet<i64> = entries.iter().map(|entry| entry.mapping_id).collect();
    let included: Vec<&MappingEntry> = entries
        .iter()
        .filter(|entry| include_unpublished || entry.published)
        .collect();
    let mut children: BTreeMap<Option<i64>, Vec<&MappingEntry>> = BTreeMap::new();
    for entry in included {
        let parent = entry.parent.filter(|id| known.contains(id));
        children.entry(parent).or_default().push(entry);
    }
    build_level(&children, None, lang)
}

fn build_level(
    children: &BTreeMap<Option<i64>, Vec<&MappingEntry>>,
    parent: Option<i64>,
    lang: &str,
) -> Vec<MenuItem> {
    let mut level: Vec<&MappingEntry> = children.get(&parent).cloned().unwrap_or_default();
    level.sort_by(|a, b| {
        (a.ord.is_none(), a.ord, &a.tree_order, &a.identifier)
            .cmp(&(b.ord.is_none(), b.ord, &b.tree_order, &b.identifier))
    });
    level
        .into_iter()
        .map(|entry| {
            let variant = entry.variant(lang);
            MenuItem {
                id: entry.identifier.clone(),
                title: entry.title(lang).to_owned(),
                description: variant.and_then(|v| v.description.clone()),
                hidden: entry.ord.is_none(),
                order: entry.ord,
                children: build_level(children, Some(entry.mapping_id), lang),
                variants: entry.titles.keys().cloned().collect(),
            }
        })
        .collect()
}

/// First top-level item shown in navigation.
#[must_use]
pub fn first_visible(items: &[MenuItem]) -> Option<&MenuItem> {
    items.iter().find(|item| !item.hidden)
}

/// Top-level item whose subtree contains `id`.
#[must_use]
pub fn top_level_for<'a>(items: &'a [MenuItem], id: &str) -> Option<&'a MenuItem> {
    items.iter().find(|item| item.find(id).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn entry(id: i64, identifier: &str, parent: Option<i64>, ord: Option<i32>) -> MappingEntry {
        let mut entry = MappingEntry::new(id, identifier, "Pages");
        entry.parent = parent;
        entry.ord = ord;
        entry
    }

    #[fixture]
    fn rows() -> Vec<MappingEntry> {
        let mut about = entry(1, "about", None, Some(2));
        about.titles.insert(
            "cs".to_owned(),
            TitleVariant {
                title: "O nás".to_owned(),
                description: Some("Kdo jsme".to_owned()),
            },
        );
        about.titles.insert(
            "en".to_owned(),
            TitleVariant {
                title: "About".to_owned(),
                description: None,
            },
        );
        vec![
            about,
            entry(2, "team", Some(1), Some(1)),
            entry(3, "secret", Some(1), None),
            entry(4, "inner", Some(3), Some(1)),
            entry(5, "index", None, Some(1)),
            entry(6, "orphan", Some(99), Some(3)),
        ]
    }

    #[rstest]
    fn rows_are_placed_under_their_parents(rows: Vec<MappingEntry>) {
        let items = build_menu(&rows, "en", false);
        let ids: Vec<_> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["index", "about", "orphan"]);
        let about = items.get(1).expect("about present");
        let children: Vec<_> = about.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(children, vec!["team", "secret"]);
    }

    #[rstest]
    fn null_order_hides_but_keeps_the_subtree(rows: Vec<MappingEntry>) {
        let items = build_menu(&rows, "en", false);
        let secret = items
            .iter()
            .find_map(|item| item.find("secret"))
            .expect("secret present");
        assert!(secret.hidden);
        assert_eq!(secret.children.first().map(|c| c.id.as_str()), Some("inner"));
        assert!(!secret.children.iter().any(|c| c.hidden));
        let about = items.iter().find(|item| item.id == "about").expect("about");
        assert_eq!(about.visible_children().count(), 1);
    }

    #[rstest]
    fn unpublished_rows_drop_their_subtree(mut rows: Vec<MappingEntry>) {
        if let Some(about) = rows.first_mut() {
            about.published = false;
        }
        let items = build_menu(&rows, "en", false);
        assert!(items.iter().all(|item| item.find("team").is_none()));
        let preview = build_menu(&rows, "en", true);
        assert!(preview.iter().any(|item| item.find("team").is_some()));
    }

    #[rstest]
    #[case("cs", "O nás", Some("Kdo jsme"))]
    #[case("en", "About", None)]
    #[case("de", "O nás", Some("Kdo jsme"))]
    fn titles_follow_the_language(
        rows: Vec<MappingEntry>,
        #[case] lang: &str,
        #[case] title: &str,
        #[case] description: Option<&str>,
    ) {
        let items = build_menu(&rows, lang, false);
        let about = items.iter().find(|item| item.id == "about").expect("about");
        assert_eq!(about.title, title);
        assert_eq!(about.description.as_deref(), description);
        assert_eq!(about.variants, vec!["cs", "en"]);
    }

    #[rstest]
    fn untitled_items_use_their_identifier(rows: Vec<MappingEntry>) {
        let items = build_menu(&rows, "en", false);
        assert_eq!(first_visible(&items).map(|i| i.title.as_str()), Some("index"));
        assert_eq!(top_level_for(&items, "inner").map(|i| i.id.as_str()), Some("about"));
    }
}
