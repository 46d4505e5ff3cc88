use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Delimiter that precedes the pre-verified BASIC block in a harvested blob.
pub const SAFETY_BLOCK_MARKER: &str = "===STRUCTURED_SAFETY_DATA===";

static HOS_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bhos\b").unwrap());

/// The five BASIC safety categories, in the order the carrier page lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BasicCategory {
    UnsafeDriving,
    HoursOfService,
    VehicleMaintenance,
    ControlledSubstances,
    DriverFitness,
}

impl BasicCategory {
    pub const ALL: [BasicCategory; 5] = [
        BasicCategory::UnsafeDriving,
        BasicCategory::HoursOfService,
        BasicCategory::VehicleMaintenance,
        BasicCategory::ControlledSubstances,
        BasicCategory::DriverFitness,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BasicCategory::UnsafeDriving => "Unsafe Driving",
            BasicCategory::HoursOfService => "Hours-of-Service Compliance",
            BasicCategory::VehicleMaintenance => "Vehicle Maintenance",
            BasicCategory::ControlledSubstances => "Controlled Substances and Alcohol",
            BasicCategory::DriverFitness => "Driver Fitness",
        }
    }

    /// Lowercased spellings the page uses for this category in buttons and headings.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            BasicCategory::UnsafeDriving => &["unsafe driving"],
            BasicCategory::HoursOfService => &["hours-of-service", "hours of service"],
            BasicCategory::VehicleMaintenance => &["vehicle maintenance"],
            BasicCategory::ControlledSubstances => &["controlled substances", "alcohol"],
            BasicCategory::DriverFitness => &["driver fitness"],
        }
    }

    /// Fuzzy heading match, tolerating abbreviations like "HOS".
    pub fn matches_heading(self, heading: &str) -> bool {
        let lower = heading.to_lowercase();
        if self.aliases().iter().any(|a| lower.contains(a)) {
            return true;
        }
        self == BasicCategory::HoursOfService && HOS_WORD_RE.is_match(&lower)
    }

    /// Category named by a heading, if any.
    pub fn from_heading(heading: &str) -> Option<BasicCategory> {
        Self::ALL.into_iter().find(|c| c.matches_heading(heading))
    }
}

impl fmt::Display for BasicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One BASIC reading: CSA percentile equivalent and raw BASIC score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicMeasure {
    #[serde(default, deserialize_with = "lenient_number")]
    pub percentile: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub score: Option<f64>,
}

impl BasicMeasure {
    /// Drop values outside their valid ranges; `None` when nothing survives.
    pub fn validated(self) -> Option<BasicMeasure> {
        let percentile = self.percentile.filter(|p| valid_percentile(*p));
        let score = self.score.filter(|s| valid_basic_score(*s));
        if percentile.is_none() && score.is_none() {
            None
        } else {
            Some(BasicMeasure { percentile, score })
        }
    }
}

/// BASIC scores live strictly inside (0, 10).
pub fn valid_basic_score(v: f64) -> bool {
    v > 0.0 && v < 10.0
}

pub fn valid_percentile(v: f64) -> bool {
    (0.0..=100.0).contains(&v)
}

/// The delimiter-tagged block the guided capture appends to both snapshots.
///
/// Every category is always serialized, with `null` meaning the category was
/// attempted and nothing could be read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyBlock {
    #[serde(default)]
    pub unsafe_driving: Option<BasicMeasure>,
    #[serde(default)]
    pub hours_of_service: Option<BasicMeasure>,
    #[serde(default)]
    pub vehicle_maintenance: Option<BasicMeasure>,
    #[serde(default)]
    pub controlled_substances: Option<BasicMeasure>,
    #[serde(default)]
    pub driver_fitness: Option<BasicMeasure>,
}

impl SafetyBlock {
    pub fn get(&self, category: BasicCategory) -> Option<BasicMeasure> {
        match category {
            BasicCategory::UnsafeDriving => self.unsafe_driving,
            BasicCategory::HoursOfService => self.hours_of_service,
            BasicCategory::VehicleMaintenance => self.vehicle_maintenance,
            BasicCategory::ControlledSubstances => self.controlled_substances,
            BasicCategory::DriverFitness => self.driver_fitness,
        }
    }

    pub fn set(&mut self, category: BasicCategory, value: Option<BasicMeasure>) {
        let slot = match category {
            BasicCategory::UnsafeDriving => &mut self.unsafe_driving,
            BasicCategory::HoursOfService => &mut self.hours_of_service,
            BasicCategory::VehicleMaintenance => &mut self.vehicle_maintenance,
            BasicCategory::ControlledSubstances => &mut self.controlled_substances,
            BasicCategory::DriverFitness => &mut self.driver_fitness,
        };
        *slot = value;
    }

    /// Marker plus pretty JSON, ready to append to a snapshot.
    pub fn encode(&self) -> String {
        let json = serde_json::to_string_pretty(self).unwrap_or_default();
        format!("\n\n{}\n{}", SAFETY_BLOCK_MARKER, json)
    }

    /// Locate and decode the block in `text`.
    ///
    /// `Ok(None)` when no marker is present, `Err` when the marker is present
    /// but the JSON after it does not decode. Trailing text after the JSON
    /// object is ignored.
    pub fn find(text: &str) -> Result<Option<SafetyBlock>, serde_json::Error> {
        let Some(idx) = text.find(SAFETY_BLOCK_MARKER) else {
            return Ok(None);
        };
        let rest = &text[idx + SAFETY_BLOCK_MARKER.len()..];
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<SafetyBlock>();
        match stream.next() {
            Some(Ok(block)) => Ok(Some(block)),
            Some(Err(e)) => Err(e),
            None => serde_json::from_str::<SafetyBlock>(rest).map(Some),
        }
    }
}

/// Accepts `12.5`, `"12.5"`, `"12.5%"`, `""` and `null`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }

    Ok(match Option::<NumOrText>::deserialize(deserializer)? {
        Some(NumOrText::Num(n)) => Some(n),
        Some(NumOrText::Text(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        None => None,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hos_abbreviation_matches() {
        assert!(BasicCategory::HoursOfService.matches_heading("HOS Compliance"));
        assert!(BasicCategory::HoursOfService.matches_heading("Hours-of-Service Compliance"));
        assert!(!BasicCategory::HoursOfService.matches_heading("Hospitality"));
        assert!(BasicCategory::ControlledSubstances.matches_heading("Drugs and Alcohol"));
    }

    #[test]
    fn from_heading_picks_category() {
        assert_eq!(
            BasicCategory::from_heading("Vehicle Maintenance"),
            Some(BasicCategory::VehicleMaintenance)
        );
        assert_eq!(BasicCategory::from_heading("ELD Connection Status"), None);
    }

    #[test]
    fn block_encodes_explicit_nulls() {
        let mut block = SafetyBlock::default();
        block.set(
            BasicCategory::UnsafeDriving,
            Some(BasicMeasure { percentile: Some(45.0), score: Some(3.2) }),
        );
        let encoded = block.encode();
        assert!(encoded.contains(SAFETY_BLOCK_MARKER));
        assert!(encoded.contains("\"driverFitness\": null"));
    }

    #[test]
    fn find_ignores_trailing_text() {
        let text = format!(
            "page text{}\n\nPrivacy Policy",
            SafetyBlock {
                hours_of_service: Some(BasicMeasure { percentile: Some(12.0), score: None }),
                ..Default::default()
            }
            .encode()
        );
        let block = SafetyBlock::find(&text).unwrap().unwrap();
        assert_eq!(block.hours_of_service.unwrap().percentile, Some(12.0));
        assert!(block.unsafe_driving.is_none());
    }

    #[test]
    fn find_accepts_string_values() {
        let text = r#"===STRUCTURED_SAFETY_DATA===
{"unsafeDriving": {"percentile": "45%", "score": "3.2"}, "driverFitness": null}"#;
        let block = SafetyBlock::find(text).unwrap().unwrap();
        let ud = block.unsafe_driving.unwrap();
        assert_eq!(ud.percentile, Some(45.0));
        assert_eq!(ud.score, Some(3.2));
    }

    #[test]
    fn find_reports_malformed_block() {
        assert!(SafetyBlock::find("===STRUCTURED_SAFETY_DATA=== {not json").is_err());
        assert!(SafetyBlock::find("===STRUCTURED_SAFETY_DATA===   ").is_err());
        assert!(SafetyBlock::find("no marker here").unwrap().is_none());
    }

    #[test]
    fn validated_drops_out_of_range_score() {
        let m = BasicMeasure { percentile: Some(50.0), score: Some(12.0) }.validated().unwrap();
        assert_eq!(m.score, None);
        assert!(BasicMeasure { percentile: None, score: Some(0.0) }.validated().is_none());
    }
}
