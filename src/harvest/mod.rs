pub mod capture;
pub mod directory;
pub mod entities;
pub mod identity;
pub mod locator;
pub mod observer;
pub mod page;

use chrono::{DateTime, Utc};
use scraper::ElementRef;
use serde::Serialize;
use tracing::{debug, info};

use crate::model::SafetyBlock;
use entities::EntityScan;
use page::{visible_text, Document};

/// One region of the page as the harvester saw it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Visible text only
    pub text: String,
    /// Raw markup of the same region
    pub markup: String,
    pub entities: EntityScan,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn of(region: ElementRef) -> Self {
        let text = visible_text(region);
        let entities = EntityScan::scan(&text);
        debug!(
            chars = text.len(),
            emails = entities.emails.len(),
            phones = entities.phones.len(),
            names = entities.names.len(),
            "snapshot taken"
        );
        Self { markup: region.html(), text, entities, captured_at: Utc::now() }
    }

    /// Append the capture result to both forms so either one can be parsed.
    pub fn append_tagged_block(&mut self, block: &SafetyBlock) {
        let encoded = block.encode();
        self.text.push_str(&encoded);
        self.markup.push_str(&encoded);
    }
}

pub fn overview_snapshot(doc: &Document) -> Snapshot {
    Snapshot::of(doc.overview_region())
}

pub fn directory_snapshot(doc: &Document) -> Snapshot {
    Snapshot::of(doc.directory_region())
}

/// Directory upload: structured JSON when the page layout is recognised,
/// else the directory markup for the text parser.
pub fn directory_blob(doc: &Document) -> String {
    match directory::structured_directory(doc).and_then(|d| serde_json::to_string(&d).ok()) {
        Some(json) => {
            info!(bytes = json.len(), "directory sent as structured JSON");
            json
        }
        None => directory_snapshot(doc).markup,
    }
}

// ── Tests ──
