use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::text::{self, NUMBER};
use crate::model::overview::{Safety, SafetySource};
use crate::model::safety::{valid_basic_score, valid_percentile};
use crate::model::{BasicCategory, BasicMeasure, SafetyBlock};

static PERCENTILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)CSA\s*Percentile(?:\s*Equivalent)?[:\s]*({NUMBER})\s*%")).unwrap()
});
static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)BASIC\s*Score[:\s]*({NUMBER})")).unwrap());
static TOTAL_VIOLATIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Total\s*Violations[^\d\n]*(\d+)").unwrap());

static UNSAFE_DRIVING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Unsafe\s*Driving").unwrap());
static HOS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Hours[- ]of[- ]Service(?:\s*Compliance)?|\bHOS\b").unwrap());
static VEHICLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Vehicle\s*Maintenance").unwrap());
static SUBSTANCES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Controlled\s*Substances|Drugs?\s+and\s+Alcohol").unwrap());
static FITNESS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Driver\s*Fitness").unwrap());

/// Anything that closes a category section: another category heading, the
/// violation total, the history tables or the tagged block.
static CATEGORY_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)Unsafe\s*Driving|Hours[- ]of[- ]Service|\bHOS\b|Vehicle\s*Maintenance|Controlled\s*Substances|Drugs?\s+and\s+Alcohol|Driver\s*Fitness|Total\s*Violations|Inspection\s*History|Crash\s*History|===STRUCTURED_SAFETY_DATA===",
    )
    .unwrap()
});

fn heading_re(category: BasicCategory) -> &'static Regex {
    match category {
        BasicCategory::UnsafeDriving => &UNSAFE_DRIVING_RE,
        BasicCategory::HoursOfService => &HOS_RE,
        BasicCategory::VehicleMaintenance => &VEHICLE_RE,
        BasicCategory::ControlledSubstances => &SUBSTANCES_RE,
        BasicCategory::DriverFitness => &FITNESS_RE,
    }
}

/// BASIC values for all five categories.
///
/// A decodable tagged block wins outright, explicit nulls included. Only a
/// missing or malformed block lets the per-category text fallback run.
pub fn extract(text: &str) -> Safety {
    let mut safety = Safety {
        total_violations: TOTAL_VIOLATIONS_RE
            .captures(text)
            .and_then(|c| text::parse_num(&c[1])),
        ..Default::default()
    };

    match SafetyBlock::find(text) {
        Ok(Some(block)) => {
            debug!("using tagged safety block");
            for category in BasicCategory::ALL {
                safety.set(category, block.get(category).and_then(BasicMeasure::validated));
            }
            safety.source = Some(SafetySource::TaggedBlock);
            return safety;
        }
        Ok(None) => {}
        Err(e) => warn!("tagged safety block did not decode, falling back to text: {}", e),
    }

    let mut found_any = false;
    for category in BasicCategory::ALL {
        let measure = from_text(text, category);
        found_any |= measure.is_some();
        safety.set(category, measure);
    }
    if found_any {
        safety.source = Some(SafetySource::TextFallback);
    }
    safety
}

/// Scan every section headed by the category and keep the first that yields
/// a value. Navigation strips list all five headings back to back, so the
/// first heading is often an empty section.
pub fn from_text(text: &str, category: BasicCategory) -> Option<BasicMeasure> {
    text::sections(text, heading_re(category), &CATEGORY_END_RE)
        .into_iter()
        .find_map(|section| measure_in(section).validated())
}

/// Percentile and score read from one block of text. Out-of-range values
/// are dropped field by field.
pub fn measure_in(section: &str) -> BasicMeasure {
    BasicMeasure {
        percentile: PERCENTILE_RE
            .captures(section)
            .and_then(|c| text::parse_num::<f64>(&c[1]))
            .filter(|p| valid_percentile(*p)),
        score: SCORE_RE
            .captures(section)
            .and_then(|c| text::parse_num::<f64>(&c[1]))
            .filter(|s| valid_basic_score(*s)),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK_TEXT: &str = "Unsafe Driving\nHours-of-Service Compliance\nVehicle Maintenance\n\
        Unsafe Driving\nCSA Percentile Equivalent\n45%\nBASIC Score\n3.2\n\
        Hours-of-Service Compliance\nCSA Percentile Equivalent: 12.5%\nBASIC Score: 14\n\
        Total Violations: 9";

    #[test]
    fn fallback_skips_empty_navigation_sections() {
        let safety = extract(FALLBACK_TEXT);
        let ud = safety.unsafe_driving.unwrap();
        assert_eq!(ud.percentile, Some(45.0));
        assert_eq!(ud.score, Some(3.2));
        assert_eq!(safety.source, Some(SafetySource::TextFallback));
        assert_eq!(safety.total_violations, Some(9));
    }

    #[test]
    fn out_of_range_basic_score_is_never_accepted() {
        let hos = extract(FALLBACK_TEXT).hours_of_service.unwrap();
        assert_eq!(hos.percentile, Some(12.5));
        assert_eq!(hos.score, None);

        let only_bad = "Driver Fitness\nBASIC Score: 0\nVehicle Maintenance BASIC Score: 10.0";
        let safety = extract(only_bad);
        assert!(safety.driver_fitness.is_none());
        assert!(safety.vehicle_maintenance.is_none());
        assert!(safety.source.is_none());
    }

    #[test]
    fn tagged_block_takes_precedence_over_text() {
        let text = format!(
            "{}\n\n===STRUCTURED_SAFETY_DATA===\n{}",
            FALLBACK_TEXT,
            r#"{"unsafeDriving": {"percentile": 80, "score": 6.1},
                "hoursOfService": null,
                "vehicleMaintenance": {"percentile": "5", "score": null},
                "controlledSubstances": null,
                "driverFitness": null}"#
        );
        let safety = extract(&text);
        assert_eq!(safety.source, Some(SafetySource::TaggedBlock));
        assert_eq!(
            safety.unsafe_driving,
            Some(BasicMeasure { percentile: Some(80.0), score: Some(6.1) })
        );
        // explicit null stays null even though the text has a value
        assert!(safety.hours_of_service.is_none());
        assert_eq!(safety.vehicle_maintenance.unwrap().percentile, Some(5.0));
    }

    #[test]
    fn malformed_block_falls_back_for_safety_only() {
        let text = format!("{}\n\n===STRUCTURED_SAFETY_DATA===\n{{oops", FALLBACK_TEXT);
        let safety = extract(&text);
        assert_eq!(safety.source, Some(SafetySource::TextFallback));
        assert_eq!(safety.unsafe_driving.unwrap().percentile, Some(45.0));
        assert_eq!(safety.total_violations, Some(9));
    }

    #[test]
    fn block_score_out_of_range_becomes_absent() {
        let text = r#"===STRUCTURED_SAFETY_DATA===
{"unsafeDriving": {"percentile": 50, "score": 42}, "driverFitness": {"score": 11}}"#;
        let safety = extract(text);
        assert_eq!(
            safety.unsafe_driving,
            Some(BasicMeasure { percentile: Some(50.0), score: None })
        );
        assert!(safety.driver_fitness.is_none());
        assert_eq!(safety.source, Some(SafetySource::TaggedBlock));
    }
}
