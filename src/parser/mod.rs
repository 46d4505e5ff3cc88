pub mod canonical;
pub mod directory;
pub mod history;
pub mod insurance;
pub mod overview;
pub mod risk;
pub mod safety;
pub mod text;

use tracing::{debug, info};

use crate::model::directory::FmcsaInfo;
use crate::model::{DirectoryRecord, OverviewRecord, StructuredDirectory};

/// Overview snapshot (markup or plain text) → overview record.
pub fn parse_overview(input: &str) -> OverviewRecord {
    let text = text::strip_markup(input);
    debug!(chars = text.len(), "overview text stripped");
    let record = overview::extract(&text);
    info!(
        mc = record.identity.mc_number.as_deref().unwrap_or("-"),
        inspections = record.inspections.history.len(),
        crashes = record.crashes.history.len(),
        "parsed overview"
    );
    record
}

/// Directory snapshot → directory record.
///
/// A JSON object carrying directory lists goes through the structured path;
/// anything else is read as page text.
pub fn parse_directory(input: &str) -> DirectoryRecord {
    let record = match StructuredDirectory::detect(input) {
        Some(structured) => {
            debug!("structured directory payload");
            let mut record = directory::from_structured(structured);
            if record.fmcsa.is_none() && directory::is_restricted(input) {
                record.fmcsa = Some(FmcsaInfo::restricted());
            }
            record
        }
        None => directory::from_text(&text::strip_markup(input)),
    };
    info!(
        users = record.verified_users.len(),
        contacts = record.contacts.len(),
        addresses = record.addresses.len(),
        "parsed directory"
    );
    record
}

// ── Tests ──
