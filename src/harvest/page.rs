use std::path::PathBuf;
use std::sync::{LazyLock, RwLock};

use async_trait::async_trait;
use itertools::Itertools;
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{Error, Result};

/// Elements whose content never renders.
const NEVER_VISIBLE: [&str; 5] = ["script", "style", "noscript", "iframe", "template"];

/// Elements that start a new line in the text snapshot.
const BLOCK_ELEMENTS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "li", "main", "nav", "p", "section", "tr",
];

const OVERVIEW_REGIONS: [&str; 4] = [r#"[data-tab="overview"]"#, "#overview", ".carrier-overview", ".overview"];
const DIRECTORY_REGIONS: [&str; 1] = [".carrier-directory"];

static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

/// Parsed snapshot of the live page.
///
/// `scraper::Html` is not `Send`; build a `Document` inside a synchronous
/// scope and drop it before the next `.await`.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(markup: &str) -> Self {
        Self { html: Html::parse_document(markup) }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn body(&self) -> ElementRef<'_> {
        self.html
            .select(&BODY_SEL)
            .next()
            .unwrap_or_else(|| self.html.root_element())
    }

    pub fn title(&self) -> Option<String> {
        self.html
            .select(&TITLE_SEL)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// First visible match of any selector, in order, else `<body>`.
    fn region(&self, selectors: &[&str]) -> ElementRef<'_> {
        selectors
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .find_map(|sel| self.html.select(&sel).find(|el| is_visible(*el)))
            .unwrap_or_else(|| self.body())
    }

    pub fn overview_region(&self) -> ElementRef<'_> {
        self.region(&OVERVIEW_REGIONS)
    }

    pub fn directory_region(&self) -> ElementRef<'_> {
        self.region(&DIRECTORY_REGIONS)
    }
}

// ── Visibility ──

/// Hidden by the element's own attributes or tag.
pub fn is_hidden(el: ElementRef) -> bool {
    let value = el.value();
    if NEVER_VISIBLE.contains(&value.name()) || value.attr("hidden").is_some() {
        return true;
    }
    if value.attr("aria-hidden").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return true;
    }
    value.attr("style").is_some_and(style_hides)
}

/// Visible when neither the element nor any ancestor is hidden.
pub fn is_visible(el: ElementRef) -> bool {
    !is_hidden(el) && !el.ancestors().filter_map(ElementRef::wrap).any(is_hidden)
}

fn style_hides(style: &str) -> bool {
    style.split(';').filter_map(|decl| decl.split_once(':')).any(|(prop, val)| {
        let val = val.trim().trim_end_matches("!important").trim().to_ascii_lowercase();
        match prop.trim().to_ascii_lowercase().as_str() {
            "display" => val == "none",
            "visibility" => val == "hidden",
            "opacity" => val.parse::<f64>().is_ok_and(|o| o == 0.0),
            _ => false,
        }
    })
}

// ── Text ──

/// Visible text under `root`, one text node per line.
pub fn visible_text(root: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(root, &mut raw);
    raw.lines()
        .map(|l| l.split_whitespace().join(" "))
        .filter(|l| !l.is_empty())
        .join("\n")
}

fn collect_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push('\n');
                out.push_str(text);
            }
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else { continue };
                if is_hidden(child_el) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&child_el.value().name());
                if block {
                    out.push('\n');
                }
                collect_text(child_el, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Whitespace-collapsed text of an element, hidden children included.
pub fn element_text(el: ElementRef) -> String {
    el.text().flat_map(str::split_whitespace).join(" ")
}

// ── Page sources ──

/// Where the page's current markup comes from.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn markup(&self) -> Result<String>;
}

/// Markup held in memory. An embedding bridge replaces it as the page changes.
pub struct StaticPage {
    markup: RwLock<String>,
}

impl StaticPage {
    pub fn new(markup: impl Into<String>) -> Self {
        Self { markup: RwLock::new(markup.into()) }
    }

    pub fn replace(&self, markup: impl Into<String>) {
        let mut guard = self.markup.write().unwrap_or_else(|e| e.into_inner());
        *guard = markup.into();
    }
}

#[async_trait]
impl PageSource for StaticPage {
    async fn markup(&self) -> Result<String> {
        let guard = self.markup.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }
}

/// A page file re-read on every call, for browser bridges that keep
/// rewriting a saved copy of the live DOM.
pub struct FilePage {
    path: PathBuf,
}

impl FilePage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for FilePage {
    async fn markup(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| Error::PageSource { path: self.path.clone(), source })
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>ACME | Carriers</title><style>.x{}</style></head><body>
        <nav>Menu</nav>
        <div class="carrier-overview">
          <h1>ACME HAULING</h1>
          <p>MC <b>654321</b></p>
          <div style="display: none">secret one</div>
          <div style="opacity:0">secret two</div>
          <div style="opacity:0.5">faded but shown</div>
          <div aria-hidden="true"><span>secret three</span></div>
          <div hidden>secret four</div>
          <script>var secret = 5;</script>
        </div>
        <div class="carrier-directory" style="visibility:hidden">Directory</div>
    </body></html>"#;

    #[test]
    fn hidden_nodes_are_skipped() {
        let doc = Document::parse(PAGE);
        let text = visible_text(doc.overview_region());
        assert!(text.starts_with("ACME HAULING"));
        assert!(text.contains("faded but shown"));
        assert!(!text.contains("secret"));
        assert!(!text.contains("Menu"));
    }

    #[test]
    fn regions_fall_back_to_body() {
        let doc = Document::parse(PAGE);
        // the directory container is hidden, so the body is used
        assert!(visible_text(doc.directory_region()).contains("Menu"));
        assert_eq!(doc.title().as_deref(), Some("ACME | Carriers"));
    }

    #[tokio::test]
    async fn file_page_rereads_and_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<p>one</p>").unwrap();
        let page = FilePage::new(&path);
        assert_eq!(page.markup().await.unwrap(), "<p>one</p>");
        std::fs::write(&path, "<p>two</p>").unwrap();
        assert_eq!(page.markup().await.unwrap(), "<p>two</p>");

        let missing = FilePage::new(dir.path().join("nope.html"));
        assert!(matches!(missing.markup().await, Err(Error::PageSource { .. })));
    }

    #[tokio::test]
    async fn static_page_can_be_replaced() {
        let page = StaticPage::new("<p>a</p>");
        page.replace("<p>b</p>");
        assert_eq!(page.markup().await.unwrap(), "<p>b</p>");
    }
}
