use std::sync::LazyLock;

use regex::Regex;

use super::text::{self, FieldCascade, DATE};
use crate::model::overview::{GeneralLiabilityPolicy, Insurance, LimitPolicy, PolicyTerms};

static INSURANCE_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*Insurance\b.*$").unwrap());
static FAMILY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(General\s+Liability|Auto(?:mobile)?(?:[ \t]+Liability)?|Cargo|Trailer\s+Interchange)\b",
    )
    .unwrap()
});
static CARGO_CARRIED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[ \t]*Cargo\s+Carried").unwrap());
/// Headings of the sections that follow insurance on the page.
static TERMINATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:Safety|Unsafe\s+Driving|Inspection|Crash|Bluewire|Authority|ELD|Out\s+of\s+Service|Fleet\s+Size|Cargo\s+Carried)\b|===STRUCTURED_SAFETY_DATA===",
    )
    .unwrap()
});
static ACTIVE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bactive\b").unwrap());
static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(?:in)?active\b").unwrap());

static INSURER: LazyLock<FieldCascade> =
    LazyLock::new(|| FieldCascade::layouts(r"Insurer\s+Name", r"(.+?)(?:[ \t]+Policy\b.*)?$"));
static POLICY_NUMBER: LazyLock<FieldCascade> =
    LazyLock::new(|| FieldCascade::layouts(r"Policy\s*(?:Number|No\.?|#)", r"([A-Z0-9][A-Z0-9-]*)"));
static EFFECTIVE: LazyLock<FieldCascade> =
    LazyLock::new(|| FieldCascade::layouts(r"Effective(?:\s+Date)?", &format!("({DATE})")));
static EXPIRATION: LazyLock<FieldCascade> =
    LazyLock::new(|| FieldCascade::layouts(r"(?:Expiration(?:\s+Date)?|Expires)", &format!("({DATE})")));
static EACH_OCCURRENCE: LazyLock<FieldCascade> =
    LazyLock::new(|| FieldCascade::layouts(r"Each\s+Occ?urr?ence", r"\$?([\d,]+)"));
static GENERAL_AGGREGATE: LazyLock<FieldCascade> =
    LazyLock::new(|| FieldCascade::layouts(r"General\s+Aggregate", r"\$?([\d,]+)"));
static LIMIT: LazyLock<FieldCascade> =
    LazyLock::new(|| FieldCascade::layouts(r"(?:Coverage\s+)?Limit", r"\$?([\d,]+)"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    GeneralLiability,
    Auto,
    Cargo,
    TrailerInterchange,
}

impl Family {
    fn from_heading(heading: &str) -> Family {
        let lower = heading.to_ascii_lowercase();
        if lower.starts_with("general") {
            Family::GeneralLiability
        } else if lower.starts_with("auto") {
            Family::Auto
        } else if lower.starts_with("cargo") {
            Family::Cargo
        } else {
            Family::TrailerInterchange
        }
    }
}

/// All four policy families. Each family is read from its own section, so a
/// field missing in one never borrows a value from a neighbour.
///
/// A family is kept when its section states a status or yields any field.
pub fn extract(text: &str) -> Insurance {
    let region = match INSURANCE_HEADING_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    };

    let mut insurance = Insurance::default();
    for (family, section) in family_sections(region) {
        let terms = policy_terms(section);
        let stated = STATUS_RE.is_match(section);
        match family {
            Family::GeneralLiability if insurance.general_liability.is_none() => {
                let policy = GeneralLiabilityPolicy {
                    terms,
                    each_occurrence: amount(section, &EACH_OCCURRENCE),
                    general_aggregate: amount(section, &GENERAL_AGGREGATE),
                };
                let empty = policy.terms.is_empty()
                    && policy.each_occurrence.is_none()
                    && policy.general_aggregate.is_none();
                if stated || !empty {
                    insurance.general_liability = Some(policy);
                }
            }
            Family::Auto if insurance.auto.is_none() => insurance.auto = limit_policy(terms, section, stated),
            Family::Cargo if insurance.cargo.is_none() => insurance.cargo = limit_policy(terms, section, stated),
            Family::TrailerInterchange if insurance.trailer_interchange.is_none() => {
                insurance.trailer_interchange = limit_policy(terms, section, stated)
            }
            _ => {}
        }
    }
    insurance
}

/// Split the region at family headings; each section stops at the next
/// family heading or at the first heading of an unrelated section.
fn family_sections(region: &str) -> Vec<(Family, &str)> {
    let headings: Vec<_> = FAMILY_RE
        .captures_iter(region)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let line_end = region[whole.start()..].find('\n').map_or(region.len(), |i| whole.start() + i);
            if CARGO_CARRIED_RE.is_match(&region[whole.start()..line_end]) {
                return None;
            }
            Some((Family::from_heading(&c[1]), whole.start(), whole.end()))
        })
        .collect();

    headings
        .iter()
        .enumerate()
        .map(|(i, &(family, start, body_start))| {
            let next = headings.get(i + 1).map_or(region.len(), |h| h.1);
            let end = TERMINATOR_RE
                .find(&region[body_start..next])
                .map_or(next, |t| body_start + t.start());
            (family, &region[start..end])
        })
        .collect()
}

fn policy_terms(section: &str) -> PolicyTerms {
    PolicyTerms {
        active: ACTIVE_RE.is_match(section),
        insurer: INSURER.find(section),
        policy_number: POLICY_NUMBER.find(section),
        effective_date: EFFECTIVE.find(section),
        expiration_date: EXPIRATION.find(section),
    }
}

fn limit_policy(terms: PolicyTerms, section: &str, stated: bool) -> Option<LimitPolicy> {
    let limit = amount(section, &LIMIT);
    (stated || !terms.is_empty() || limit.is_some()).then_some(LimitPolicy { terms, limit })
}

fn amount(section: &str, field: &FieldCascade) -> Option<u64> {
    field.find(section).and_then(|s| text::parse_num(&s))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Cargo Carried: General Freight
Insurance
General Liability
Active
Insurer Name
Progressive Casualty Policy details
Policy Number

GL-100200
Effective Date: 1/1/24
Expiration Date: 1/1/25
Each Occurence: $1,000,000
General Aggregate: $2,000,000
Auto Liability Inactive
Insurer Name: Great West
Policy Number: AU-77
Limit: $750,000
Cargo
Limit: $100,000
Trailer Interchange Active
Insurer Name: Northland
Safety
Unsafe Driving";

    #[test]
    fn families_are_read_independently() {
        let ins = extract(SAMPLE);

        let gl = ins.general_liability.unwrap();
        assert!(gl.terms.active);
        assert_eq!(gl.terms.insurer.as_deref(), Some("Progressive Casualty"));
        assert_eq!(gl.terms.policy_number.as_deref(), Some("GL-100200"));
        assert_eq!(gl.terms.effective_date.as_deref(), Some("1/1/24"));
        assert_eq!(gl.terms.expiration_date.as_deref(), Some("1/1/25"));
        assert_eq!(gl.each_occurrence, Some(1_000_000));
        assert_eq!(gl.general_aggregate, Some(2_000_000));

        let auto = ins.auto.unwrap();
        assert!(!auto.terms.active);
        assert_eq!(auto.terms.insurer.as_deref(), Some("Great West"));
        assert_eq!(auto.limit, Some(750_000));
        // no expiration in the auto section, and none borrowed from general liability
        assert_eq!(auto.terms.expiration_date, None);
    }

    #[test]
    fn sparse_family_keeps_what_it_has() {
        let ins = extract(SAMPLE);
        // Cargo has only a limit: neither active nor named
        let cargo = ins.cargo.unwrap();
        assert!(!cargo.terms.active);
        assert!(cargo.terms.is_empty());
        assert_eq!(cargo.limit, Some(100_000));
        let ti = ins.trailer_interchange.unwrap();
        assert!(ti.terms.active);
        assert_eq!(ti.terms.insurer.as_deref(), Some("Northland"));
    }

    #[test]
    fn bare_family_heading_is_not_reported() {
        let ins = extract("Insurance\nCargo\nSafety\nAuto Liability Inactive\nSafety");
        assert!(ins.cargo.is_none());
        // an explicit status is enough
        assert_eq!(ins.auto, Some(LimitPolicy::default()));
    }

    #[test]
    fn no_insurance_text() {
        assert_eq!(extract("Unsafe Driving\nBASIC Score: 3"), Insurance::default());
    }
}
