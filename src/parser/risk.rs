use std::sync::LazyLock;

use regex::Regex;

use super::text::{self, DATE, NUMBER};
use crate::model::overview::RiskScore;

static SECTION_START_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bBluewire\b").unwrap());
static SECTION_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Privacy|©|===STRUCTURED_SAFETY_DATA===").unwrap());
static APPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\bAPPS\b[^\d\n]*({NUMBER})")).unwrap());
static HEADLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)Bluewire[^\d\n]*({NUMBER})")).unwrap());
/// Longer labels come first so "Critical Acute Violations" is never read as "Violations".
static COMPONENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(Critical\s*Acute\s*Violations|Crashes|Violations|CSA\s*BASICs?|Driver\s*OOS|New\s*Entrants?|MCS-150|Judicial\s*Hellholes?|Safety\s*Rating)[:\s]+({NUMBER})\s*/\s*100"
    ))
    .unwrap()
});
static UPDATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)Updated\s+at\s+(\d{{1,2}}:\d{{2}}\s*(?:AM|PM)?\s+on\s+{DATE})")).unwrap()
});

/// Composite risk score and its components, read only inside the risk section.
pub fn extract(text: &str) -> Option<RiskScore> {
    let section = text::section(text, &SECTION_START_RE, &SECTION_END_RE)?;

    let mut score = RiskScore {
        composite: text::first_capture(section, [&*APPS_RE, &*HEADLINE_RE])
            .and_then(|s| text::parse_num(&s))
            .filter(|v| in_range(*v)),
        updated: text::first_capture(section, [&*UPDATED_RE]),
        ..Default::default()
    };

    for caps in COMPONENT_RE.captures_iter(section) {
        let Some(value) = text::parse_num::<f64>(&caps[2]).filter(|v| in_range(*v)) else {
            continue;
        };
        let label = caps[1].to_ascii_lowercase();
        let slot = if label.starts_with("critical") {
            &mut score.critical_acute_violations
        } else if label.starts_with("crash") {
            &mut score.crashes
        } else if label.starts_with("violation") {
            &mut score.violations
        } else if label.starts_with("csa") {
            &mut score.csa_basics
        } else if label.starts_with("driver") {
            &mut score.driver_oos
        } else if label.starts_with("new") {
            &mut score.new_entrants
        } else if label.starts_with("mcs") {
            &mut score.mcs150
        } else if label.starts_with("judicial") {
            &mut score.judicial_hellholes
        } else {
            &mut score.safety_rating
        };
        slot.get_or_insert(value);
    }

    (!score.is_empty()).then_some(score)
}

fn in_range(v: f64) -> bool {
    (0.0..=100.0).contains(&v)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION: &str = "Crashes: 250 / 100 elsewhere
Bluewire Risk Score
APPS 72
Crashes: 10 / 100
Violations: 130 / 100
Critical Acute Violations: 20 / 100
CSA BASICs: 55.5 / 100
Driver OOS: 12 / 100
Safety Rating: 40 / 100
Updated at 3:45 PM on 1/2/24
Privacy Policy
Judicial Hellholes: 9 / 100";

    #[test]
    fn components_are_scoped_and_validated() {
        let risk = extract(SECTION).unwrap();
        assert_eq!(risk.composite, Some(72.0));
        assert_eq!(risk.crashes, Some(10.0));
        assert_eq!(risk.critical_acute_violations, Some(20.0));
        assert_eq!(risk.csa_basics, Some(55.5));
        assert_eq!(risk.driver_oos, Some(12.0));
        assert_eq!(risk.safety_rating, Some(40.0));
        assert_eq!(risk.updated.as_deref(), Some("3:45 PM on 1/2/24"));
    }

    #[test]
    fn out_of_range_component_is_omitted_not_clamped() {
        let risk = extract(SECTION).unwrap();
        assert_eq!(risk.violations, None);
        // outside the section
        assert_eq!(risk.judicial_hellholes, None);
    }

    #[test]
    fn composite_from_heading_line() {
        let risk = extract("Bluewire score 64\nnothing else").unwrap();
        assert_eq!(risk.composite, Some(64.0));
        assert!(extract("Bluewire\nPrivacy").is_none());
        assert!(extract("APPS 50").is_none());
    }
}
