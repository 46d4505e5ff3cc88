use serde::{Deserialize, Serialize};

use super::safety::{BasicCategory, BasicMeasure};

/// Everything the carrier overview tab yields. Every field is optional; a
/// miss leaves it at its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverviewRecord {
    pub identity: Identity,
    pub dispatch_contact: Option<DispatchContact>,
    pub authority_status: Option<AuthorityStatus>,
    pub operating_status: Option<String>,
    pub safety_rating: Option<SafetyRating>,
    pub certifications: Vec<Certification>,
    pub equipment: Equipment,
    pub network: Network,
    pub authority: Authority,
    pub insurance: Insurance,
    pub safety: Safety,
    pub inspections: Inspections,
    pub crashes: Crashes,
    pub operations: Operations,
    pub risk_score: Option<RiskScore>,
    pub eld: Option<EldConnection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    pub name: Option<String>,
    pub mc_number: Option<String>,
    pub dot_number: Option<String>,
    pub scac: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchContact {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorityStatus {
    Active,
    Inactive,
}

impl AuthorityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorityStatus::Active => "ACTIVE",
            AuthorityStatus::Inactive => "INACTIVE",
        }
    }
}

/// FMCSA safety rating, a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyRating {
    Satisfactory,
    Conditional,
    Unsatisfactory,
    Unrated,
}

impl SafetyRating {
    pub const ALL: [SafetyRating; 4] = [
        SafetyRating::Satisfactory,
        SafetyRating::Conditional,
        SafetyRating::Unsatisfactory,
        SafetyRating::Unrated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SafetyRating::Satisfactory => "Satisfactory",
            SafetyRating::Conditional => "Conditional",
            SafetyRating::Unsatisfactory => "Unsatisfactory",
            SafetyRating::Unrated => "Unrated",
        }
    }

    /// Finds a rating word inside `text`. "Unsatisfactory" is checked before
    /// "Satisfactory" since the latter is a substring.
    pub fn find_in(text: &str) -> Option<SafetyRating> {
        let lower = text.to_lowercase();
        [
            SafetyRating::Unsatisfactory,
            SafetyRating::Satisfactory,
            SafetyRating::Conditional,
            SafetyRating::Unrated,
        ]
        .into_iter()
        .find(|r| lower.contains(&r.as_str().to_lowercase()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Certification {
    pub name: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Equipment {
    pub power_units: Option<u32>,
    pub trailers: Option<u32>,
    pub average_fleet_age_years: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    pub served_states: Option<u32>,
    pub cross_border: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Authority {
    pub types: Vec<String>,
    pub history: Vec<AuthorityEvent>,
    pub oos_rates: OosRates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityEvent {
    pub authority_type: String,
    pub action: AuthorityAction,
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorityAction {
    Granted,
    Withdrawn,
    Revoked,
}

impl AuthorityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorityAction::Granted => "GRANTED",
            AuthorityAction::Withdrawn => "WITHDRAWN",
            AuthorityAction::Revoked => "REVOKED",
        }
    }

    pub fn parse(s: &str) -> Option<AuthorityAction> {
        match s.to_ascii_uppercase().as_str() {
            "GRANTED" => Some(AuthorityAction::Granted),
            "WITHDRAWN" => Some(AuthorityAction::Withdrawn),
            "REVOKED" => Some(AuthorityAction::Revoked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OosRates {
    pub driver: Option<OosRate>,
    pub vehicle: Option<OosRate>,
}

/// Out-of-service counts for one inspection kind against the national average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OosRate {
    pub out_of_service: u32,
    pub inspections: u32,
    pub percentage: f64,
    pub national_average: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Insurance {
    pub general_liability: Option<GeneralLiabilityPolicy>,
    pub auto: Option<LimitPolicy>,
    pub cargo: Option<LimitPolicy>,
    pub trailer_interchange: Option<LimitPolicy>,
}

/// Fields shared by every insurance family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyTerms {
    pub active: bool,
    pub insurer: Option<String>,
    pub policy_number: Option<String>,
    pub effective_date: Option<String>,
    pub expiration_date: Option<String>,
}

impl PolicyTerms {
    pub fn is_empty(&self) -> bool {
        !self.active
            && self.insurer.is_none()
            && self.policy_number.is_none()
            && self.effective_date.is_none()
            && self.expiration_date.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralLiabilityPolicy {
    #[serde(flatten)]
    pub terms: PolicyTerms,
    /// Dollars
    pub each_occurrence: Option<u64>,
    pub general_aggregate: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitPolicy {
    #[serde(flatten)]
    pub terms: PolicyTerms,
    pub limit: Option<u64>,
}

/// Where the BASIC values in [`Safety`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SafetySource {
    TaggedBlock,
    TextFallback,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Safety {
    pub unsafe_driving: Option<BasicMeasure>,
    pub hours_of_service: Option<BasicMeasure>,
    pub vehicle_maintenance: Option<BasicMeasure>,
    pub controlled_substances: Option<BasicMeasure>,
    pub driver_fitness: Option<BasicMeasure>,
    pub total_violations: Option<u32>,
    pub source: Option<SafetySource>,
}

impl Safety {
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
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inspections {
    pub count: Option<u32>,
    /// "inspections/power units", e.g. "12/5"
    pub ratio: Option<String>,
    /// "Top N%" ranking, stored as N
    pub percentile: Option<u32>,
    pub history: Vec<InspectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionRecord {
    pub date: String,
    pub report_number: String,
    pub state: String,
    pub plate_number: String,
    pub plate_state: String,
    pub inspection_type: String,
    pub violations: u32,
    pub out_of_service: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Crashes {
    pub count_24_months: Option<u32>,
    pub history: Vec<CrashRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashRecord {
    pub date: String,
    pub report_number: String,
    pub vin: String,
    pub location_state: String,
    pub plate_state: String,
    pub plate_number: String,
    pub fatalities: u32,
    pub injuries: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Operations {
    /// Band such as "10-24"
    pub fleet_size: Option<String>,
    pub cargo_carried: Vec<String>,
}

/// Composite 0–100 risk score and its nine weighted inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskScore {
    pub composite: Option<f64>,
    pub crashes: Option<f64>,
    pub violations: Option<f64>,
    pub csa_basics: Option<f64>,
    pub driver_oos: Option<f64>,
    pub critical_acute_violations: Option<f64>,
    pub new_entrants: Option<f64>,
    pub mcs150: Option<f64>,
    pub judicial_hellholes: Option<f64>,
    pub safety_rating: Option<f64>,
    pub updated: Option<String>,
}

impl RiskScore {
    pub fn is_empty(&self) -> bool {
        *self == RiskScore::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    #[serde(rename = "Not Connected")]
    NotConnected,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::NotConnected => "Not Connected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentStatus {
    Pass,
    #[serde(rename = "Partial Pass")]
    PartialPass,
    Fail,
}

impl AssessmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentStatus::Pass => "Pass",
            AssessmentStatus::PartialPass => "Partial Pass",
            AssessmentStatus::Fail => "Fail",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EldConnection {
    pub status: Option<ConnectionStatus>,
    pub assessment: Option<AssessmentStatus>,
    pub provider: Option<String>,
    pub connected_date: Option<String>,
    /// Minutes since the last ELD sync
    pub last_updated_minutes: Option<u32>,
}

impl EldConnection {
    pub fn is_empty(&self) -> bool {
        *self == EldConnection::default()
    }
}

// ── Tests ──
