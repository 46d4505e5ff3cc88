use serde::{Deserialize, Deserializer, Serialize};

/// Everything the carrier directory tab yields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectoryRecord {
    pub verified_users: Vec<VerifiedUser>,
    pub deactivated_users: Vec<DeactivatedUser>,
    pub contacts: Vec<Contact>,
    pub rate_confirmation_emails: Vec<RateConfirmationEmail>,
    pub dispatch_services: Vec<String>,
    pub addresses: Vec<Address>,
    pub fmcsa: Option<FmcsaInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifiedUser {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// "m/d/yy at h:mmam" plus the sign-in location when known
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeactivatedUser {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactRole {
    Billing,
    Dispatch,
    Claims,
}

impl ContactRole {
    pub fn parse(s: &str) -> Option<ContactRole> {
        match s.trim().to_ascii_lowercase().as_str() {
            "billing" => Some(ContactRole::Billing),
            "dispatch" => Some(ContactRole::Dispatch),
            "claims" => Some(ContactRole::Claims),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContactRole::Billing => "Billing",
            ContactRole::Dispatch => "Dispatch",
            ContactRole::Claims => "Claims",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub role: Option<ContactRole>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created: Option<String>,
}

impl Contact {
    /// Name plus phone or email, or a role plus any one contact field.
    pub fn is_anchored(&self) -> bool {
        let reachable = self.phone.is_some() || self.email.is_some();
        (self.name.is_some() && reachable) || (self.role.is_some() && (self.name.is_some() || reachable))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfirmationEmail {
    pub email: String,
    pub alias: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressKind {
    Physical,
    Mailing,
}

impl AddressKind {
    pub fn parse(s: &str) -> Option<AddressKind> {
        let lower = s.to_ascii_lowercase();
        if lower.contains("physical") {
            Some(AddressKind::Physical)
        } else if lower.contains("mailing") {
            Some(AddressKind::Mailing)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressStatus {
    Current,
    Inactive,
}

impl AddressStatus {
    pub fn parse(s: &str) -> Option<AddressStatus> {
        let lower = s.to_ascii_lowercase();
        if lower.contains("current") {
            Some(AddressStatus::Current)
        } else if lower.contains("inactive") {
            Some(AddressStatus::Inactive)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    #[serde(rename = "type")]
    pub kind: Option<AddressKind>,
    pub status: Option<AddressStatus>,
    pub street: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub first_seen: Option<String>,
}

/// Regulatory contact details. When `restricted` is set every list is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmcsaInfo {
    pub restricted: bool,
    pub names: Vec<String>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub addresses: Vec<String>,
}

impl FmcsaInfo {
    pub fn restricted() -> Self {
        FmcsaInfo { restricted: true, ..Default::default() }
    }
}

// ── Structured directory (harvester output) ──

/// Directory as read from the page structure by the harvester, submitted as
/// JSON in place of the directory markup. Field values are raw cell text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredDirectory {
    #[serde(deserialize_with = "null_as_default")]
    pub verified_users: Vec<RawVerifiedUser>,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub deactivated_users: Vec<DeactivatedUser>,
    #[serde(deserialize_with = "null_as_default")]
    pub contacts: Vec<RawContact>,
    #[serde(deserialize_with = "null_as_default")]
    pub rate_confirmation_emails: Vec<RawRateEmail>,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub dispatch_services: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub addresses: Vec<RawAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comprehensive: Option<Comprehensive>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawVerifiedUser {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub first_seen: Option<String>,
    pub first_seen_location: Option<String>,
    pub last_seen: Option<String>,
    pub last_seen_location: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawContact {
    pub role: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created: Option<String>,
}

impl From<Contact> for RawContact {
    fn from(c: Contact) -> Self {
        RawContact {
            role: c.role.map(|r| r.as_str().to_string()),
            name: c.name,
            phone: c.phone,
            email: c.email,
            created: c.created,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRateEmail {
    pub email: Option<String>,
    pub alias: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAddress {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub address: Option<String>,
    pub first_seen: Option<String>,
}

/// Bulk entity pass over the directory region, kept for recall.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Comprehensive {
    pub all_emails: Vec<String>,
    pub all_phones: Vec<String>,
    pub all_addresses: Vec<String>,
    pub all_names: Vec<String>,
    pub all_dates: Vec<String>,
    pub full_text: String,
}

impl StructuredDirectory {
    const KEYS: [&'static str; 6] = [
        "verifiedUsers",
        "deactivatedUsers",
        "contacts",
        "rateConfirmationEmails",
        "dispatchServices",
        "addresses",
    ];

    /// Decodes `input` when it is a JSON object carrying at least one
    /// directory list. Anything else is left to the text path.
    pub fn detect(input: &str) -> Option<StructuredDirectory> {
        let trimmed = input.trim_start();
        if !trimmed.starts_with('{') {
            return None;
        }
        let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        let obj = value.as_object()?;
        if !Self::KEYS.iter().any(|k| obj.contains_key(*k)) {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Tests ──
