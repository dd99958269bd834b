//! Pages of text content in several language variants.
//!
//! A page is reached through the mapping item of the same identifier and
//! shown in the variant best matching the user's languages. Under the
//! management interface the `pages` table is edited like any data module.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::ports::RecordStore;
use crate::domain::{
    Action, DataModule, Document, Editable, Error, FieldSpec, FieldType, Module, ModuleContext,
    Outcome, PasswordStorage, RecordQuery, Request, Rights, Role, Row, SortKey, TableSpec,
    display_value, paragraphs,
};

use super::management;

/// Registered name.
pub const NAME: &str = "Pages";

const TABLE: &str = "pages";

/// Field specification of the `pages` table.
#[must_use]
pub fn spec() -> TableSpec {
    TableSpec {
        table: TABLE,
        key: "page_id",
        referer: None,
        owner: None,
        title: "title",
        sort: vec![SortKey::asc("identifier"), SortKey::asc("lang")],
        fields: vec![
            FieldSpec::new("identifier", "Identifier", FieldType::String { max_len: Some(32) })
                .required()
                .editable(Editable::OnInsert),
            FieldSpec::new("lang", "Language", FieldType::String { max_len: Some(2) })
                .required()
                .editable(Editable::OnInsert),
            FieldSpec::new("title", "Title", FieldType::String { max_len: Some(255) }).required(),
            FieldSpec::new("content", "Content", FieldType::Text),
            FieldSpec::new("published", "Published", FieldType::Boolean),
        ],
        derivations: Vec::new(),
        columns: vec!["title", "identifier", "lang", "published"],
        layout: vec!["identifier", "lang", "title", "content", "published"],
    }
}

/// Content administrators only; readers see pages through the mapping.
#[must_use]
pub fn rights() -> Rights {
    Rights::new().allow(&Action::ALL, &[Role::CONTENT_ADMIN])
}

/// Text pages.
pub struct Pages {
    store: Arc<dyn RecordStore>,
    table: DataModule,
}

impl Pages {
    /// Pages stored in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, passwords: Arc<dyn PasswordStorage>) -> Self {
        let table = DataModule::new(NAME, "Pages", spec(), rights(), Arc::clone(&store), passwords);
        Self { store, table }
    }

    async fn show(&self, req: &Request, identifier: &str) -> Result<Outcome, Error> {
        let query = RecordQuery::sorted(&[SortKey::asc("lang")])
            .filter("identifier", Value::from(identifier));
        let rows = self
            .store
            .select(TABLE, &query)
            .await
            .map_err(|error| Error::internal(error.to_string()))?;
        if rows.is_empty() {
            return Err(Error::not_found(format!("Not found: {}", req.uri())));
        }
        let visible: Vec<&Row> = rows
            .iter()
            .filter(|row| req.preview_mode() || row.get("published") == Some(&Value::Bool(true)))
            .collect();
        let variants: Vec<String> = visible
            .iter()
            .filter_map(|row| row.get_str("lang"))
            .map(str::to_owned)
            .collect();
        let Some(lang) = req.preferred_language(&variants) else {
            debug!(identifier = %identifier, "page has no published variant");
            return Err(Error::forbidden("The page is not published."));
        };
        let Some(row) = visible.iter().find(|row| row.get_str("lang") == Some(lang)) else {
            return Err(Error::not_found(format!("Not found: {}", req.uri())));
        };
        let title = row.get("title").map(display_value).unwrap_or_default();
        let text = row.get_str("content").unwrap_or_default();
        let document = Document::new(title, paragraphs(text)).with_lang(lang, variants.clone());
        Ok(Outcome::Document(document))
    }
}

#[async_trait]
impl Module for Pages {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "Pages"
    }

    async fn handle(&self, req: &mut Request, ctx: &ModuleContext<'_>) -> Result<Outcome, Error> {
        let managed = req
            .resolved_path()
            .first()
            .is_some_and(|segment| segment == management::PATH);
        if managed {
            return self.table.handle(req, ctx).await;
        }
        if !req.unresolved_path().is_empty() {
            return Err(Error::not_found(format!("Not found: {}", req.uri())));
        }
        let Some(identifier) = req.resolved_path().last().cloned() else {
            return Err(Error::not_found(format!("Not found: {}", req.uri())));
        };
        self.show(req, &identifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{InMemoryRecordStore, InMemoryTable};
    use crate::domain::{
        AccountState, Content, ErrorCode, Login, Method, ModuleRegistry,
        PlainTextPasswordStorage, RoleContainment, SiteSettings, User, UserAccount, UserId,
    };
    use rstest::{fixture, rstest};

    fn content_admin() -> User {
        User::from_account(
            UserAccount {
                uid: UserId::new(1),
                login: Login::new("editor").expect("login"),
                name: "Editor".to_owned(),
                email: None,
                state: AccountState::Enabled,
                password: "plain:x".to_owned(),
                password_expiration: None,
                lang: None,
            },
            &[Role::CONTENT_ADMIN],
            &RoleContainment::standard(),
        )
    }

    fn page(id: i64, identifier: &str, lang: &str, content: &str, published: bool) -> Row {
        Row::new()
            .with("page_id", id)
            .with("identifier", identifier)
            .with("lang", lang)
            .with("title", format!("{identifier} ({lang})"))
            .with("content", content)
            .with("published", published)
    }

    #[fixture]
    fn pages() -> Pages {
        let store = InMemoryRecordStore::default().with_table(
            InMemoryTable::new(TABLE, "page_id")
                .with_row(page(1, "about", "en", "We are.\n\nStill here.", true))
                .with_row(page(2, "about", "cs", "Jsme.", true))
                .with_row(page(3, "draft", "en", "Soon.", false)),
        );
        Pages::new(Arc::new(store), Arc::new(PlainTextPasswordStorage))
    }

    async fn serve(pages: &Pages, mut req: Request, consumed: usize) -> Result<Outcome, Error> {
        for _ in 0..consumed {
            req.pop_unresolved();
        }
        let registry = ModuleRegistry::new();
        let settings = SiteSettings::default();
        let ctx = ModuleContext {
            modules: &registry,
            settings: &settings,
            menu: &[],
        };
        pages.handle(&mut req, &ctx).await
    }

    #[rstest]
    #[case(&["cs", "en"], "cs", 1)]
    #[case(&["de", "en"], "en", 2)]
    #[tokio::test]
    async fn preferred_variant_is_rendered_into_paragraphs(
        pages: Pages,
        #[case] preferred: &[&str],
        #[case] lang: &str,
        #[case] count: usize,
    ) {
        let mut req = Request::new(Method::Get, "/about");
        req.set_preferred_languages(preferred.iter().map(|l| (*l).to_owned()).collect());
        let Outcome::Document(doc) = serve(&pages, req, 1).await.expect("page") else {
            panic!("expected a document");
        };
        assert_eq!(doc.lang.as_deref(), Some(lang));
        assert_eq!(doc.variants, vec!["cs", "en"]);
        assert_eq!(doc.title, format!("about ({lang})"));
        assert_eq!(doc.content.len(), count);
        assert!(matches!(doc.content.first(), Some(Content::Paragraph(_))));
    }

    #[rstest]
    #[case("/draft", ErrorCode::Forbidden)]
    #[case("/missing", ErrorCode::NotFound)]
    #[case("/about/more", ErrorCode::NotFound)]
    #[tokio::test]
    async fn unpublished_and_unknown_pages_are_refused(
        pages: Pages,
        #[case] path: &str,
        #[case] expected: ErrorCode,
    ) {
        let err = serve(&pages, Request::new(Method::Get, path), 1)
            .await
            .expect_err("refused");
        assert_eq!(err.code(), expected);
    }

    #[rstest]
    #[tokio::test]
    async fn preview_mode_shows_drafts(pages: Pages) {
        let mut req = Request::new(Method::Get, "/draft");
        req.set_preview_mode(true);
        let outcome = serve(&pages, req, 1).await.expect("draft");
        assert!(matches!(outcome, Outcome::Document(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn management_lists_every_variant(pages: Pages) {
        let mut req = Request::new(Method::Get, "/_wmi/content/Pages");
        req.set_user(Some(content_admin()));
        let Outcome::Document(doc) = serve(&pages, req, 3).await.expect("listing") else {
            panic!("expected a document");
        };
        let Some(Content::Table { rows, .. }) = doc.content.first() else {
            panic!("expected a table");
        };
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].link.as_deref(), Some("/_wmi/content/Pages/2"));
    }
}
