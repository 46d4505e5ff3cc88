use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use serde::Serialize;

use super::page::{element_text, visible_text, Document};
use crate::error::{Error, Result};

static MC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bMC\s*#?:?\s*(\d{5,8})\b").unwrap());
static CARRIER_PATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/carriers/(\d+)").unwrap());
static H1_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());

/// Name of the load board hosting the carrier pages; headings naming it are page chrome.
const HOST_SITE: &str = "Highway";
const CARRIER_PATH: &str = "/broker/carriers";

/// What the ingestion endpoint keys an upload on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierIdentity {
    pub mc_number: String,
    pub name: Option<String>,
}

impl CarrierIdentity {
    /// Read the MC number and carrier name from the page. Without an MC
    /// number there is nothing to key the upload on.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let text = visible_text(doc.body());
        let mc_number = MC_RE
            .captures(&text)
            .map(|c| c[1].to_string())
            .ok_or(Error::MissingIdentifier)?;
        Ok(Self { mc_number, name: carrier_name(doc) })
    }
}

/// First `<h1>` that does not name the host site, else the title before `|`.
pub fn carrier_name(doc: &Document) -> Option<String> {
    let heading = doc
        .html()
        .select(&H1_SEL)
        .map(element_text)
        .find(|t| !t.is_empty() && !t.contains(HOST_SITE));
    heading.or_else(|| {
        doc.title()
            .filter(|t| !t.contains(HOST_SITE))
            .and_then(|t| t.split('|').next().map(|s| s.trim().to_string()))
            .filter(|t| !t.is_empty())
    })
}

/// Load-board carrier id from a carrier page URL.
pub fn carrier_id(url: &str) -> Option<&str> {
    CARRIER_PATH_RE.captures(url).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Canonical carrier page URL on `base`.
pub fn carrier_url(base: &str, id: &str) -> String {
    format!("{}{}/{}", base.trim_end_matches('/'), CARRIER_PATH, id)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_heading_and_text() {
        let doc = Document::parse(
            "<html><head><title>Highway | Carrier</title></head><body>\
             <h1>Highway</h1><h1>ROADRUNNER FREIGHT LLC</h1><p>MC# 123456</p></body></html>",
        );
        let id = CarrierIdentity::from_document(&doc).unwrap();
        assert_eq!(id.mc_number, "123456");
        assert_eq!(id.name.as_deref(), Some("ROADRUNNER FREIGHT LLC"));
    }

    #[test]
    fn name_from_title_when_no_heading() {
        let doc = Document::parse("<html><head><title>ACME HAULING | Carriers</title></head><body>MC 7654321</body></html>");
        assert_eq!(carrier_name(&doc).as_deref(), Some("ACME HAULING"));
    }

    #[test]
    fn missing_mc_is_an_error() {
        let doc = Document::parse("<html><body><h1>ACME</h1><p>DOT 2345678</p></body></html>");
        assert!(matches!(CarrierIdentity::from_document(&doc), Err(Error::MissingIdentifier)));
    }

    #[test]
    fn carrier_urls() {
        assert_eq!(carrier_id("https://highway.com/broker/carriers/98765/overview"), Some("98765"));
        assert_eq!(carrier_id("https://highway.com/loads"), None);
        assert_eq!(carrier_url("https://highway.com/", "98765"), "https://highway.com/broker/carriers/98765");
    }
}
