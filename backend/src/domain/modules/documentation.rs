//! Static documentation pages served from configured directories.
//!
//! `_doc/<component>/<path>` reads `<path>.<lang>.txt` below the directory
//! configured for `<component>`. Directories are opened with `cap-std`, so a
//! page can never name a file outside its component directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use tracing::debug;

use crate::domain::{Content, Document, Error, Module, ModuleContext, Outcome, Request};

/// Registered name.
pub const NAME: &str = "Documentation";

const FALLBACK_LANGUAGE: &str = "en";
const INDEX_PAGE: &str = "index";

/// Serves text documentation per component.
#[derive(Debug, Clone, Default)]
pub struct Documentation {
    dirs: BTreeMap<String, PathBuf>,
}

/// One page in its best available language.
#[derive(Debug)]
struct Page {
    lang: String,
    text: String,
    variants: Vec<String>,
}

impl Documentation {
    /// Serve `dirs`, keyed by component name.
    #[must_use]
    pub fn new(dirs: BTreeMap<String, PathBuf>) -> Self {
        Self { dirs }
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn read_page(
    root: &Path,
    path: &str,
    preferred: &[String],
    languages: &[String],
) -> std::io::Result<Option<Page>> {
    let dir = Dir::open_ambient_dir(root, ambient_authority())?;
    let variants: Vec<String> = languages
        .iter()
        .filter(|lang| dir.is_file(format!("{path}.{lang}.txt")))
        .cloned()
        .collect();
    let candidates = preferred
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(FALLBACK_LANGUAGE));
    for lang in candidates {
        match dir.read_to_string(format!("{path}.{lang}.txt")) {
            Ok(text) => {
                return Ok(Some(Page {
                    lang: lang.to_owned(),
                    text,
                    variants,
                }));
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(error),
        }
    }
    Ok(None)
}

/// Split page text into its title and paragraphs.
fn parse_page(text: &str, fallback_title: &str) -> (String, Vec<Content>) {
    let mut lines = text.lines().peekable();
    let title = match lines.peek().and_then(|line| line.strip_prefix("# ")) {
        Some(title) => {
            let title = title.trim().to_owned();
            lines.next();
            title
        }
        None => fallback_title.to_owned(),
    };
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(Content::Paragraph(current.join("\n")));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(Content::Paragraph(current.join("\n")));
    }
    (title, paragraphs)
}

#[async_trait]
impl Module for Documentation {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "Documentation"
    }

    async fn handle(&self, req: &mut Request, ctx: &ModuleContext<'_>) -> Result<Outcome, Error> {
        let Some(component) = req.pop_unresolved() else {
            return Err(Error::forbidden("Listing documentation is not allowed."));
        };
        let root = self
            .dirs
            .get(&component)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Unknown documentation: {component}")))?;
        let mut segments = Vec::new();
        while let Some(segment) = req.pop_unresolved() {
            if !valid_segment(&segment) {
                return Err(Error::not_found(format!("Not found: {}", req.uri())));
            }
            segments.push(segment);
        }
        let path = if segments.is_empty() {
            INDEX_PAGE.to_owned()
        } else {
            segments.join("/")
        };
        let preferred = req.preferred_languages().to_vec();
        let languages = ctx.settings.languages.clone();
        let lookup = path.clone();
        let page = tokio::task::spawn_blocking(move || {
            read_page(&root, &lookup, &preferred, &languages)
        })
        .await
        .map_err(|error| Error::internal(format!("documentation reader failed: {error}")))?
        .map_err(|error| Error::internal(format!("documentation unreadable: {error}")))?;
        let Some(page) = page else {
            debug!(component = %component, path = %path, "documentation page missing");
            return Err(Error::not_found(format!("Not found: {}", req.uri())));
        };
        let fallback = segments.last().map_or(component.as_str(), String::as_str);
        let (title, content) = parse_page(&page.text, fallback);
        Ok(Outcome::Document(
            Document::new(title, content).with_lang(page.lang, page.variants),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCode, Method, ModuleRegistry, SiteSettings};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn docs() -> (TempDir, Documentation) {
        let temp = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir(temp.path().join("admin")).expect("subdir");
        std::fs::write(
            temp.path().join("index.en.txt"),
            "# Manual\nFirst paragraph\ncontinues.\n\nSecond.\n",
        )
        .expect("write");
        std::fs::write(temp.path().join("index.cs.txt"), "# Manuál\nText.\n").expect("write");
        std::fs::write(temp.path().join("admin/users.en.txt"), "No heading.\n").expect("write");
        let dirs = BTreeMap::from([("cms".to_owned(), temp.path().to_path_buf())]);
        (temp, Documentation::new(dirs))
    }

    async fn serve(module: &Documentation, req: &mut Request) -> Result<Outcome, Error> {
        let registry = ModuleRegistry::new();
        let settings = SiteSettings {
            languages: vec!["en".to_owned(), "cs".to_owned()],
            ..SiteSettings::default()
        };
        let ctx = ModuleContext {
            modules: &registry,
            settings: &settings,
            menu: &[],
        };
        module.handle(req, &ctx).await
    }

    fn doc_request(path: &str, langs: &[&str]) -> Request {
        let mut req = Request::new(Method::Get, path);
        req.pop_unresolved();
        req.set_preferred_languages(langs.iter().map(|l| (*l).to_owned()).collect());
        req
    }

    #[rstest]
    #[tokio::test]
    async fn pages_follow_the_preferred_language(docs: (TempDir, Documentation)) {
        let (_temp, module) = docs;
        let mut req = doc_request("/_doc/cms", &["cs", "en"]);
        let Outcome::Document(doc) = serve(&module, &mut req).await.expect("page") else {
            panic!("expected a document");
        };
        assert_eq!(doc.title, "Manuál");
        assert_eq!(doc.lang.as_deref(), Some("cs"));
        assert_eq!(doc.variants, vec!["en", "cs"]);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_translations_fall_back_to_english(docs: (TempDir, Documentation)) {
        let (_temp, module) = docs;
        let mut req = doc_request("/_doc/cms", &["de"]);
        let Outcome::Document(doc) = serve(&module, &mut req).await.expect("page") else {
            panic!("expected a document");
        };
        assert_eq!(doc.title, "Manual");
        assert_eq!(
            doc.content,
            vec![
                Content::Paragraph("First paragraph\ncontinues.".to_owned()),
                Content::Paragraph("Second.".to_owned()),
            ]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn nested_pages_without_heading_use_the_file_name(docs: (TempDir, Documentation)) {
        let (_temp, module) = docs;
        let mut req = doc_request("/_doc/cms/admin/users", &["en"]);
        let Outcome::Document(doc) = serve(&module, &mut req).await.expect("page") else {
            panic!("expected a document");
        };
        assert_eq!(doc.title, "users");
    }

    #[rstest]
    #[case("/_doc", ErrorCode::Forbidden)]
    #[case("/_doc/unknown", ErrorCode::NotFound)]
    #[case("/_doc/cms/missing", ErrorCode::NotFound)]
    #[case("/_doc/cms/..", ErrorCode::NotFound)]
    #[tokio::test]
    async fn bad_paths_are_rejected(
        docs: (TempDir, Documentation),
        #[case] path: &str,
        #[case] expected: ErrorCode,
    ) {
        let (_temp, module) = docs;
        let mut req = doc_request(path, &["en"]);
        let err = serve(&module, &mut req).await.expect_err("rejected");
        assert_eq!(err.code(), expected);
    }
}
