use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::text::{self, DATE};
use crate::model::overview::{AuthorityAction, AuthorityEvent, CrashRecord, InspectionRecord};

// Rows are matched across the whole blob. Cells may land on separate lines
// when the table is built from divs, so columns are split on any whitespace.

static INSPECTION_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"({DATE})\s+([A-Z0-9]{{4,}})\s+([A-Z]{{2}})\s+([A-Z0-9]+)\s+([A-Z]{{2}})\s+([A-Za-z][A-Za-z ]*?)\s+(\d+)\s+(\d+)\b"
    ))
    .unwrap()
});
static CRASH_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"({DATE})\s+([A-Z0-9]+)\s+([A-Z0-9]{{11,17}})\s+([A-Z]{{2}})\s+([A-Z]{{2}})\s+([A-Z0-9]+)\s+(\d+)\s+(\d+)\b"
    ))
    .unwrap()
});
static AUTHORITY_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b([A-Z][A-Z ]{{0,40}}?)[ \t]+(WITHDRAWN|GRANTED|REVOKED)[ \t]+({DATE})")).unwrap()
});

pub fn inspections(text: &str) -> Vec<InspectionRecord> {
    INSPECTION_ROW_RE
        .captures_iter(text)
        .filter_map(|c| inspection_row(&c))
        .collect()
}

fn inspection_row(c: &Captures) -> Option<InspectionRecord> {
    Some(InspectionRecord {
        date: c[1].to_string(),
        report_number: c[2].to_string(),
        state: c[3].to_string(),
        plate_number: c[4].to_string(),
        plate_state: c[5].to_string(),
        inspection_type: c[6].trim().to_string(),
        violations: text::parse_num(&c[7])?,
        out_of_service: text::parse_num(&c[8])?,
    })
}

pub fn crashes(text: &str) -> Vec<CrashRecord> {
    CRASH_ROW_RE
        .captures_iter(text)
        .filter_map(|c| {
            Some(CrashRecord {
                date: c[1].to_string(),
                report_number: c[2].to_string(),
                vin: c[3].to_string(),
                location_state: c[4].to_string(),
                plate_state: c[5].to_string(),
                plate_number: c[6].to_string(),
                fatalities: text::parse_num(&c[7])?,
                injuries: text::parse_num(&c[8])?,
            })
        })
        .collect()
}

pub fn authority_events(text: &str) -> Vec<AuthorityEvent> {
    AUTHORITY_ROW_RE
        .captures_iter(text)
        .filter_map(|c| {
            Some(AuthorityEvent {
                authority_type: c[1].trim().to_string(),
                action: AuthorityAction::parse(&c[2])?,
                date: c[3].to_string(),
            })
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspection_rows_split_across_lines() {
        let text = "Inspection History\n1/12/24 TX12345 TX ABC1234 TX Driver Only 1 0\n\
                    2/3/24\nOK998877\nOK\nXYZ9\nOK\nFull\n0\n0\n";
        let rows = inspections(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].inspection_type, "Driver Only");
        assert_eq!(rows[0].violations, 1);
        assert_eq!(rows[1].report_number, "OK998877");
        assert_eq!(rows[1].inspection_type, "Full");
    }

    #[test]
    fn partial_rows_are_dropped() {
        // plate state missing
        let text = "1/12/24 TX12345 TX ABC1234 Driver 1 0";
        assert!(inspections(text).is_empty());
        // VIN too short
        assert!(crashes("3/4/23 NY123456 1HGCM82 NY NY ABC1234 0 1").is_empty());
    }

    #[test]
    fn crash_rows() {
        let rows = crashes("Crash History\n3/4/23 NY123456 1HGCM82633A004352 NY PA ABC1234 0 2");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vin, "1HGCM82633A004352");
        assert_eq!(rows[0].plate_state, "PA");
        assert_eq!(rows[0].injuries, 2);
    }

    #[test]
    fn authority_rows_do_not_cross_lines() {
        let events = authority_events("Authority History\nCOMMON GRANTED 1/15/19\nBROKER REVOKED 2/1/20");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].authority_type, "COMMON");
        assert_eq!(events[1].action, AuthorityAction::Revoked);
    }
}
