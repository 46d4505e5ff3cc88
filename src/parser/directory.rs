use std::collections::HashSet;
use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use tracing::debug;

use super::text::{self, DATE, EMAIL, PHONE};
use crate::model::directory::*;

const TIME: &str = r"\d{1,2}:\d{2}[ \t]*(?i:[ap]m)?";
const CAPS_NAME: &str = r"[A-Z][A-Z'.-]*(?:[ \t]+[A-Z][A-Z'.-]*)*";
const LOCATION: &str = r"[^,\n]+?,[ \t]*[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)??";
const PLACE: &str = r"[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)*";

static RESTRICTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)You are not authorized to view FMCSA").unwrap());
static SCRIPT_REMNANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)window\["__f__.*?\}|function\s*\([^)]*\)\s*\{[^}]*\}"#).unwrap()
});
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(EMAIL).unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(PHONE).unwrap());

// ── Section boundaries ──

static SECTION_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:Deactivated\b|(?:contacts icon[ \t]+)?Contacts\b|(?:contacts icon[ \t]+)?Rate\s+Confirmation|Dispatch\s+Services|FMCSA\b|Addresses\b|Privacy\b)",
    )
    .unwrap()
});
static USERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:check badge icon[ \t]+)?(?:Verified[ \t]+)?Users\b").unwrap()
});
static DEACTIVATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*Deactivated\s+Users\b").unwrap());
static CONTACTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*(?:contacts icon[ \t]+)?Contacts\b").unwrap());
static RATE_EMAILS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:contacts icon[ \t]+)?Rate\s+Confirmation\s+Emails?\b").unwrap()
});
static DISPATCH_SERVICES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*Dispatch\s+Services\b.*$").unwrap());
static ADDRESSES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?im)^[ \t]*Addresses\b").unwrap());
static ADDRESSES_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*(?:Privacy|Terms|Help|FMCSA\b)|©").unwrap());
static FMCSA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*FMCSA\b").unwrap());
static FMCSA_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*(?:Privacy|Terms)\b|©").unwrap());
static FMCSA_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:FMCSA[ \t]+)?(Names|Phones|Emails|Addresses)[ \t]*:?[ \t]*$").unwrap()
});

// ── Row shapes ──

static USER_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)^[ \t]*({CAPS_NAME})[ \t]+({PHONE})[ \t]+({EMAIL})[ \t]+({DATE}[ \t]+at[ \t]+{TIME})[ \t]+({LOCATION})[ \t]+({DATE}[ \t]+at[ \t]+{TIME})[ \t]+({LOCATION})(?:[ \t]+({PLACE}))?[ \t]*$"
    ))
    .unwrap()
});
static USER_SIMPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"({CAPS_NAME})[ \t]+({PHONE})[ \t]+({EMAIL})")).unwrap());
static DEACTIVATED_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"({CAPS_NAME})\s+({PHONE})(?:\s+({EMAIL}))?")).unwrap());
static CONTACT_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b((?i:Billing|Dispatch|Claims))[ \t]+({CAPS_NAME})[ \t]+({PHONE})[ \t]+({EMAIL})(?:[ \t]+({DATE}[ \t]+at[ \t]+{TIME}))?"
    ))
    .unwrap()
});
static ADDRESS_SEEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(Physical|Mailing)\s+Address\s+(Current|Inactive)\s+([^\n]+?)\s+First\s+Seen:?\s*({DATE})"
    ))
    .unwrap()
});
static ADDRESS_LOOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(Physical|Mailing)\s+Address\s+(Current|Inactive)\s+([^\n]+)").unwrap());
static STREET_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(.+?),\s*({PLACE}),\s*([A-Z]{{2}})\s*(\d{{5}}(?:-\d{{4}})?)")).unwrap()
});
static STREET_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(.+?)\s+({PLACE}),\s*([A-Z]{{2}})\s*(\d{{5}}(?:-\d{{4}})?)")).unwrap()
});
static RATE_EMAIL_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^({EMAIL})(?:[ \t]+(\S+))?(?:[ \t]+(.+?))?[ \t]*$")).unwrap());
static COMPANY_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9&,.' -]{2,}$").unwrap());

// ── Single-line cells ──

static NAME_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z][A-Z' .-]{3,}$").unwrap());
static PHONE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?\d{3}\)?[\s.-]*\d{3}[\s.-]\d{4}").unwrap());
static EMAIL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!("^{EMAIL}$")).unwrap());
static SEEN_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^{DATE}[ \t]+at[ \t]+{TIME}")).unwrap());
static LOCATION_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z .'-]*,[ \t]*[A-Z][A-Za-z]+(?:[ \t]+[A-Z][a-z]+)?$").unwrap());
static PLACE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!("^{PLACE}$")).unwrap());
static HEADER_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:Name|Phone|Email|First|Last|Country|Verified|Deactivated|Current|Inactive|Physical|Mailing|Role|Created|Users|Contacts)\b").unwrap()
});
static ROLE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(Billing|Dispatch|Claims)$").unwrap());

// ── Contact recovery ──

static ROLE_PREFIXED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b((?i:Billing|Dispatch|Claims))\s+([A-Z][A-Za-z' ]{{2,40}}?)(?:\s+({PHONE}))?\s+({EMAIL})"
    ))
    .unwrap()
});
static ROLE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(Billing|Dispatch|Claims)\b").unwrap());
static NAME_BEFORE_EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"([A-Z][A-Za-z'-]+(?:[ \t]+[A-Z][A-Za-z'-]+){{0,3}})[ \t,]+(?:({PHONE})[ \t,]+)?{EMAIL}$"
    ))
    .unwrap()
});
static LEADING_ROLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:Billing|Dispatch|Claims)[ \t]+").unwrap());

/// Characters either side of an unmatched email searched for its owner.
const RECOVERY_WINDOW: usize = 500;

// ── Structured path ──

/// Map harvester-assembled directory JSON straight onto the record.
pub fn from_structured(input: StructuredDirectory) -> DirectoryRecord {
    let verified_users = input
        .verified_users
        .into_iter()
        .map(|u| {
            let first_loc = clean(u.first_seen_location);
            let last_loc = clean(u.last_seen_location);
            let location = match (&first_loc, &last_loc) {
                (Some(a), Some(b)) => Some(format!("{a} / {b}")),
                _ => first_loc.clone().or_else(|| last_loc.clone()),
            };
            VerifiedUser {
                name: clean(u.name),
                phone: clean(u.phone),
                email: clean(u.email),
                first_seen: clean(u.first_seen).map(|s| with_location(s, &first_loc)),
                last_seen: clean(u.last_seen).map(|s| with_location(s, &last_loc)),
                location,
                country: clean(u.country),
            }
        })
        .filter(|u| u.name.is_some() || u.phone.is_some() || u.email.is_some())
        .collect();

    let contacts = input
        .contacts
        .into_iter()
        .map(|c| {
            let name = clean(c.name);
            // the page sometimes repeats the name in the email cell
            let email = clean(c.email).filter(|e| Some(e) != name.as_ref());
            Contact {
                role: c.role.as_deref().and_then(ContactRole::parse),
                name,
                phone: clean(c.phone),
                email,
                created: clean(c.created),
            }
        })
        .filter(Contact::is_anchored)
        .collect();

    let rate_confirmation_emails = input
        .rate_confirmation_emails
        .into_iter()
        .filter_map(|e| {
            Some(RateConfirmationEmail {
                email: clean(e.email)?,
                alias: clean(e.alias),
                description: clean(e.description),
            })
        })
        .collect();

    let addresses = input
        .addresses
        .into_iter()
        .filter_map(|a| {
            let full = clean(a.address)?;
            let parts: Vec<&str> = full.split(',').map(str::trim).collect();
            let street = parts.first().filter(|s| !s.is_empty())?.to_string();
            let mut state_zip = parts.get(2).map(|s| s.split_whitespace()).into_iter().flatten();
            Some(Address {
                kind: a.kind.as_deref().and_then(AddressKind::parse),
                status: a.status.as_deref().and_then(AddressStatus::parse),
                street,
                city: parts.get(1).filter(|s| !s.is_empty()).map(|s| s.to_string()),
                state: state_zip.next().map(str::to_string),
                zip: state_zip.next().map(str::to_string),
                first_seen: clean(a.first_seen),
            })
        })
        .collect();

    let deactivated_users = input
        .deactivated_users
        .into_iter()
        .map(|u| DeactivatedUser { name: clean(u.name), phone: clean(u.phone), email: clean(u.email) })
        .filter(|u| u.name.is_some() || u.phone.is_some() || u.email.is_some())
        .collect();
    let dispatch_services = input
        .dispatch_services
        .into_iter()
        .filter_map(|s| clean(Some(s)))
        .filter(|s| !s.contains("No records found"))
        .unique()
        .collect();
    let restricted = input.comprehensive.as_ref().is_some_and(|c| is_restricted(&c.full_text));

    DirectoryRecord {
        verified_users,
        deactivated_users,
        contacts,
        rate_confirmation_emails,
        dispatch_services,
        addresses,
        fmcsa: restricted.then(FmcsaInfo::restricted),
    }
}

/// True when the page withholds the regulatory contact block.
pub fn is_restricted(text: &str) -> bool {
    RESTRICTED_RE.is_match(text)
}

/// Trimmed value with empty cells and `-` placeholders dropped.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "-")
}

fn with_location(seen: String, location: &Option<String>) -> String {
    match location {
        Some(loc) => format!("{seen} {loc}"),
        None => seen,
    }
}

// ── Text path ──

/// Parse a stripped directory blob.
pub fn from_text(text: &str) -> DirectoryRecord {
    let text = SCRIPT_REMNANT_RE.replace_all(text, "");
    let text = text.as_ref();

    let mut record = DirectoryRecord {
        verified_users: verified_users(text),
        deactivated_users: deactivated_users(text),
        rate_confirmation_emails: rate_confirmation_emails(text),
        dispatch_services: dispatch_services(text),
        addresses: addresses(text),
        fmcsa: fmcsa(text),
        ..Default::default()
    };

    if let Some(section) = text::section(text, &CONTACTS_RE, &SECTION_END_RE) {
        let mut contacts = contact_rows(section);
        let emails: Vec<String> = EMAIL_RE.find_iter(section).map(|m| m.as_str().to_string()).collect();
        let before = contacts.len();
        recover_contacts(&mut contacts, section, &emails);
        debug!("contacts: {} from rows, {} recovered", before, contacts.len() - before);
        record.contacts = contacts;
    }
    record
}

fn verified_users(text: &str) -> Vec<VerifiedUser> {
    let Some(section) = text::section(text, &USERS_RE, &SECTION_END_RE) else {
        return Vec::new();
    };
    let non_empty = |users: Vec<VerifiedUser>| (!users.is_empty()).then_some(users);
    let full_rows = |s: &str| non_empty(USER_ROW_RE.captures_iter(s).map(|c| user_from_row(&c)).collect());
    let by_line = |s: &str| non_empty(users_by_line(s));
    let simple = |s: &str| {
        non_empty(
            USER_SIMPLE_RE
                .captures_iter(s)
                .map(|c| VerifiedUser {
                    name: Some(c[1].trim().to_string()),
                    phone: text::normalize_phone(&c[2]),
                    email: Some(c[3].to_string()),
                    ..Default::default()
                })
                .collect(),
        )
    };
    text::first_success(section, &[&full_rows, &by_line, &simple]).unwrap_or_default()
}

fn user_from_row(c: &regex::Captures) -> VerifiedUser {
    VerifiedUser {
        name: Some(c[1].trim().to_string()),
        phone: text::normalize_phone(&c[2]),
        email: Some(c[3].to_string()),
        first_seen: Some(c[4].to_string()),
        last_seen: Some(c[6].to_string()),
        location: Some(format!("{} / {}", c[5].trim(), c[7].trim())),
        country: c.get(8).map(|m| m.as_str().to_string()),
    }
}

/// Table cells on their own lines: a capitalised name line followed by up
/// to nine lines recognised by value shape.
fn users_by_line(section: &str) -> Vec<VerifiedUser> {
    let lines: Vec<&str> = section.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut users = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if !is_name_line(line) {
            i += 1;
            continue;
        }
        let mut user = VerifiedUser { name: Some(line.to_string()), ..Default::default() };
        let mut locations = Vec::new();
        let mut j = i + 1;
        while j < lines.len() && j < i + 10 {
            let next = lines[j];
            if is_name_line(next) {
                break;
            }
            if user.phone.is_none() && PHONE_LINE_RE.is_match(next) {
                user.phone = text::normalize_phone(next);
            } else if user.email.is_none() && EMAIL_LINE_RE.is_match(next) {
                user.email = Some(next.to_string());
            } else if SEEN_LINE_RE.is_match(next) {
                if user.first_seen.is_none() {
                    user.first_seen = Some(next.to_string());
                } else if user.last_seen.is_none() {
                    user.last_seen = Some(next.to_string());
                }
            } else if LOCATION_LINE_RE.is_match(next) {
                locations.push(next);
            } else if user.country.is_none() && PLACE_LINE_RE.is_match(next) && !HEADER_WORD_RE.is_match(next) {
                user.country = Some(next.to_string());
            }
            j += 1;
        }
        if !locations.is_empty() {
            user.location = Some(locations.join(" / "));
        }
        if user.phone.is_some() || user.email.is_some() {
            users.push(user);
            i = j;
        } else {
            i += 1;
        }
    }
    users
}

fn is_name_line(line: &str) -> bool {
    NAME_LINE_RE.is_match(line) && !HEADER_WORD_RE.is_match(line)
}

fn deactivated_users(text: &str) -> Vec<DeactivatedUser> {
    let Some(section) = text::section(text, &DEACTIVATED_RE, &SECTION_END_RE) else {
        return Vec::new();
    };
    if section.contains("No records found") {
        return Vec::new();
    }
    DEACTIVATED_ROW_RE
        .captures_iter(section)
        .map(|c| DeactivatedUser {
            name: Some(c[1].trim().to_string()),
            phone: text::normalize_phone(&c[2]),
            email: c.get(3).map(|m| m.as_str().to_string()),
        })
        .collect()
}

fn contact_rows(section: &str) -> Vec<Contact> {
    let rows: Vec<Contact> = CONTACT_ROW_RE
        .captures_iter(section)
        .map(|c| Contact {
            role: ContactRole::parse(&c[1]),
            name: Some(c[2].trim().to_string()),
            phone: text::normalize_phone(&c[3]),
            email: Some(c[4].to_string()),
            created: c.get(5).map(|m| m.as_str().to_string()),
        })
        .collect();
    if !rows.is_empty() {
        return rows;
    }
    contacts_by_line(section)
}

fn contacts_by_line(section: &str) -> Vec<Contact> {
    let lines: Vec<&str> = section.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut contacts = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(role) = ROLE_LINE_RE.captures(lines[i]).and_then(|c| ContactRole::parse(&c[1])) else {
            i += 1;
            continue;
        };
        let mut contact = Contact { role: Some(role), ..Default::default() };
        let mut j = i + 1;
        while j < lines.len() && j < i + 6 {
            let next = lines[j];
            if ROLE_LINE_RE.is_match(next) {
                break;
            }
            if contact.name.is_none() && NAME_LINE_RE.is_match(next) {
                contact.name = Some(next.to_string());
            } else if contact.phone.is_none() && PHONE_LINE_RE.is_match(next) {
                contact.phone = text::normalize_phone(next);
            } else if contact.email.is_none() && EMAIL_LINE_RE.is_match(next) {
                contact.email = Some(next.to_string());
            } else if contact.created.is_none() && SEEN_LINE_RE.is_match(next) {
                contact.created = Some(next.to_string());
            }
            j += 1;
        }
        if contact.name.is_some() && (contact.phone.is_some() || contact.email.is_some()) {
            contacts.push(contact);
            i = j;
        } else {
            i += 1;
        }
    }
    contacts
}

/// Second pass for contacts the structural pass missed.
///
/// Runs when there are no contacts yet or when `emails` holds more distinct
/// addresses than the contacts carry. Every candidate is checked against the
/// emails already captured, so a contact is never inserted twice.
pub fn recover_contacts(contacts: &mut Vec<Contact>, text: &str, emails: &[String]) {
    let mut captured: HashSet<String> = contacts
        .iter()
        .filter_map(|c| c.email.as_deref())
        .map(str::to_lowercase)
        .collect();
    let distinct: Vec<&String> = emails.iter().unique_by(|e| e.to_lowercase()).collect();
    if !contacts.is_empty() && distinct.len() <= captured.len() {
        return;
    }

    // "Billing JANE DOE (555) 010-2000 jane@carrier.com"
    for caps in ROLE_PREFIXED_RE.captures_iter(text) {
        let email = caps[4].to_string();
        if captured.contains(&email.to_lowercase()) {
            continue;
        }
        let contact = Contact {
            role: ContactRole::parse(&caps[1]),
            name: Some(caps[2].trim().to_string()),
            phone: caps.get(3).and_then(|m| text::normalize_phone(m.as_str())),
            email: Some(email.clone()),
            created: None,
        };
        if contact.is_anchored() {
            captured.insert(email.to_lowercase());
            contacts.push(contact);
        }
    }

    // Whatever is still unmatched: read the owner from the text around the email
    for email in distinct {
        if captured.contains(&email.to_lowercase()) {
            continue;
        }
        let Some(pos) = text.find(email.as_str()) else {
            continue;
        };
        let end = pos + email.len();
        let around = text::window(text, pos.saturating_sub(RECOVERY_WINDOW), end + RECOVERY_WINDOW);
        let before = text::window(text, pos.saturating_sub(RECOVERY_WINDOW), end);

        let named = NAME_BEFORE_EMAIL_RE.captures(before);
        let name = named
            .as_ref()
            .map(|c| LEADING_ROLE_RE.replace(c[1].trim(), "").to_string())
            .filter(|n| !n.is_empty() && ContactRole::parse(n).is_none());
        let phone = named
            .as_ref()
            .and_then(|c| c.get(2))
            .and_then(|m| text::normalize_phone(m.as_str()))
            .or_else(|| PHONE_RE.find(around).and_then(|m| text::normalize_phone(m.as_str())));

        let contact = Contact {
            role: ROLE_WORD_RE.captures(around).and_then(|c| ContactRole::parse(&c[1])),
            name,
            phone,
            email: Some(email.clone()),
            created: None,
        };
        if contact.is_anchored() {
            captured.insert(email.to_lowercase());
            contacts.push(contact);
        }
    }
}

fn rate_confirmation_emails(text: &str) -> Vec<RateConfirmationEmail> {
    let Some(section) = text::section(text, &RATE_EMAILS_RE, &SECTION_END_RE) else {
        return Vec::new();
    };
    let placeholder = |v: Option<regex::Match>| v.map(|m| m.as_str().trim().to_string()).filter(|s| !s.is_empty() && s != "-");
    section
        .lines()
        .filter_map(|line| RATE_EMAIL_LINE_RE.captures(line.trim()))
        .map(|c| RateConfirmationEmail {
            email: c[1].to_string(),
            alias: placeholder(c.get(2)),
            description: placeholder(c.get(3)),
        })
        .unique_by(|e| e.email.to_lowercase())
        .collect()
}

fn dispatch_services(text: &str) -> Vec<String> {
    let Some(section) = text::section(text, &DISPATCH_SERVICES_RE, &SECTION_END_RE) else {
        return Vec::new();
    };
    if section.contains("No records found") {
        return Vec::new();
    }
    section
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| COMPANY_LINE_RE.is_match(l) && !HEADER_WORD_RE.is_match(l))
        .map(str::to_string)
        .unique()
        .collect()
}

fn addresses(text: &str) -> Vec<Address> {
    let section = text::section(text, &ADDRESSES_RE, &ADDRESSES_END_RE).unwrap_or(text);

    let with_seen: Vec<Address> = ADDRESS_SEEN_RE
        .captures_iter(section)
        .map(|c| address(&c[1], &c[2], &c[3], Some(c[4].to_string())))
        .collect();
    if !with_seen.is_empty() {
        return with_seen;
    }
    ADDRESS_LOOSE_RE
        .captures_iter(section)
        .map(|c| address(&c[1], &c[2], &c[3], None))
        .collect()
}

fn address(kind: &str, status: &str, full: &str, first_seen: Option<String>) -> Address {
    let full = full.trim();
    let mut addr = Address {
        kind: AddressKind::parse(kind),
        status: AddressStatus::parse(status),
        street: full.to_string(),
        first_seen,
        ..Default::default()
    };
    if let Some(c) = STREET_COMMA_RE.captures(full).or_else(|| STREET_SPACE_RE.captures(full)) {
        addr.street = c[1].trim().to_string();
        addr.city = Some(c[2].trim().to_string());
        addr.state = Some(c[3].to_string());
        addr.zip = Some(c[4].to_string());
    }
    addr
}

fn fmcsa(text: &str) -> Option<FmcsaInfo> {
    if is_restricted(text) {
        debug!("FMCSA contact block is restricted");
        return Some(FmcsaInfo::restricted());
    }
    let block = text::section(text, &FMCSA_RE, &FMCSA_END_RE)?;

    let headings: Vec<_> = FMCSA_LIST_RE.captures_iter(block).collect();
    let mut info = FmcsaInfo::default();
    for (i, caps) in headings.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(block.len(), |m| m.start());
        let body = &block[whole.end()..end];
        let lines = body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.contains("No records found"));
        match caps[1].to_ascii_lowercase().as_str() {
            "names" => info.names = lines.map(str::to_string).collect(),
            "phones" => {
                info.phones = PHONE_RE
                    .find_iter(body)
                    .filter_map(|m| text::normalize_phone(m.as_str()))
                    .unique()
                    .collect()
            }
            "emails" => info.emails = EMAIL_RE.find_iter(body).map(|m| m.as_str().to_string()).unique().collect(),
            _ => info.addresses = lines.filter(|l| l.len() > 10).map(str::to_string).collect(),
        }
    }
    Some(info)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
        text::strip_markup(&std::fs::read_to_string(path).unwrap())
    }

    #[test]
    fn full_user_rows() {
        let text = "Users\nName Phone # Email First Seen Last Seen Country\n\
            ODILJON SHARIPOV (708) 252-2371 ops@alistar.com 10/5/22 at 11:16am Reston, Virginia 8/5/25 at 2:56pm Chicago, Illinois Uzbekistan\n\
            Deactivated Users\nNo records found";
        let record = from_text(text);
        assert_eq!(record.verified_users.len(), 1);
        let user = &record.verified_users[0];
        assert_eq!(user.name.as_deref(), Some("ODILJON SHARIPOV"));
        assert_eq!(user.first_seen.as_deref(), Some("10/5/22 at 11:16am"));
        assert_eq!(user.location.as_deref(), Some("Reston, Virginia / Chicago, Illinois"));
        assert_eq!(user.country.as_deref(), Some("Uzbekistan"));
        assert!(record.deactivated_users.is_empty());
    }

    #[test]
    fn users_split_across_lines() {
        let text = "Verified Users\nJANE ROE\n(312) 555-0101\njane@roe.com\n1/2/24 at 9:00am\nAustin, TX\nUnited States\n\
                    JOHN ROE\n312.555.0102\nContacts";
        let users = from_text(text).verified_users;
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].phone.as_deref(), Some("(312) 555-0101"));
        assert_eq!(users[0].location.as_deref(), Some("Austin, TX"));
        assert_eq!(users[0].country.as_deref(), Some("United States"));
        assert_eq!(users[1].phone.as_deref(), Some("(312) 555-0102"));
    }

    #[test]
    fn directory_page_fixture() {
        let record = from_text(&fixture("directory_page.html"));
        assert_eq!(record.contacts.len(), 3);
        assert_eq!(record.contacts[0].role, Some(ContactRole::Billing));
        assert_eq!(record.contacts[0].created.as_deref(), Some("9/29/24 at 7:22pm"));
        // recovered from free text below the table
        let claims = record.contacts.iter().find(|c| c.role == Some(ContactRole::Claims)).unwrap();
        assert_eq!(claims.email.as_deref(), Some("claims@roadrunnerfreight.com"));

        assert_eq!(record.rate_confirmation_emails.len(), 2);
        assert_eq!(record.rate_confirmation_emails[0].alias, None);
        assert_eq!(record.rate_confirmation_emails[1].alias.as_deref(), Some("loads"));

        assert_eq!(record.dispatch_services, vec!["SWIFT DISPATCH LLC"]);

        assert_eq!(record.addresses.len(), 2);
        let physical = &record.addresses[0];
        assert_eq!(physical.street, "9435 Waterstone Blvd, Ste 140");
        assert_eq!(physical.city.as_deref(), Some("Cincinnati"));
        assert_eq!(physical.state.as_deref(), Some("OH"));
        assert_eq!(physical.zip.as_deref(), Some("45249"));
        assert_eq!(physical.first_seen.as_deref(), Some("08/14/24"));

        let fmcsa = record.fmcsa.unwrap();
        assert!(!fmcsa.restricted);
        assert_eq!(fmcsa.phones, vec!["(513) 555-0199"]);
        assert_eq!(fmcsa.emails, vec!["safety@roadrunnerfreight.com"]);
    }

    #[test]
    fn restricted_phrase_empties_regulatory_block_only() {
        let record = from_text(&fixture("directory_restricted.txt"));
        let fmcsa = record.fmcsa.unwrap();
        assert!(fmcsa.restricted);
        assert!(fmcsa.names.is_empty() && fmcsa.phones.is_empty());
        assert!(fmcsa.emails.is_empty() && fmcsa.addresses.is_empty());
        // the rest of the directory is still read
        assert_eq!(record.contacts.len(), 1);
    }

    #[test]
    fn structured_contacts_filter_and_clean() {
        let input = StructuredDirectory::detect(
            r#"{"contacts": [
                {"role": "Billing", "name": "JANE DOE", "phone": "(555) 010-2000", "email": "jane@carrier.com"},
                {"role": "", "name": "BARE NAME", "phone": "", "email": "BARE NAME"},
                {"role": "Claims", "name": "-", "email": "claims@carrier.com"}
            ],
            "addresses": [{"type": "Mailing Address", "status": "Current",
                           "address": "PO Box 12, Dayton, OH 45401", "firstSeen": "1/1/20"}],
            "rateConfirmationEmails": [{"email": "rc@carrier.com", "alias": "-", "description": "-"}, {"alias": "x"}]}"#,
        )
        .unwrap();
        let record = from_structured(input);
        assert_eq!(record.contacts.len(), 2);
        assert_eq!(record.contacts[1].name, None);
        let addr = &record.addresses[0];
        assert_eq!(addr.kind, Some(AddressKind::Mailing));
        assert_eq!(addr.city.as_deref(), Some("Dayton"));
        assert_eq!(addr.zip.as_deref(), Some("45401"));
        assert_eq!(record.rate_confirmation_emails.len(), 1);
        assert_eq!(record.rate_confirmation_emails[0].alias, None);
    }

    #[test]
    fn structured_deactivated_users_and_dispatch_services() {
        let input = StructuredDirectory::detect(
            r#"{"deactivatedUsers": [{"name": "OLD DRIVER", "phone": "(555) 010-4000", "email": "-"}, {"name": " "}],
                "dispatchServices": ["SWIFT DISPATCH LLC", "SWIFT DISPATCH LLC", "No records found"],
                "comprehensive": {"fullText": "You are not authorized to view FMCSA contact information"}}"#,
        )
        .unwrap();
        let record = from_structured(input);
        assert_eq!(record.deactivated_users.len(), 1);
        assert_eq!(record.deactivated_users[0].name.as_deref(), Some("OLD DRIVER"));
        assert_eq!(record.deactivated_users[0].email, None);
        assert_eq!(record.dispatch_services, vec!["SWIFT DISPATCH LLC"]);
        assert!(record.fmcsa.unwrap().restricted);
    }

    #[test]
    fn structured_user_locations() {
        let input = StructuredDirectory::detect(
            r#"{"verifiedUsers": [{"name": "A B", "firstSeen": "1/1/24 at 9:00am", "firstSeenLocation": "Reston, VA",
                "lastSeenLocation": "Chicago, IL"}, {"country": "US"}]}"#,
        )
        .unwrap();
        let users = from_structured(input).verified_users;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].first_seen.as_deref(), Some("1/1/24 at 9:00am Reston, VA"));
        assert_eq!(users[0].location.as_deref(), Some("Reston, VA / Chicago, IL"));
    }

    #[test]
    fn recovery_never_duplicates_captured_emails() {
        let mut contacts = vec![
            Contact { name: Some("JANE DOE".into()), email: Some("jane@carrier.com".into()), ..Default::default() },
            Contact { name: Some("MARK LEE".into()), email: Some("mark@carrier.com".into()), ..Default::default() },
        ];
        let text = "Billing JANE DOE (555) 010-2000 JANE@carrier.com\n\
                    Claims Tom Hart 555-010-3000 tom@carrier.com\n\
                    reach mark@carrier.com anytime";
        let emails: Vec<String> = ["jane@carrier.com", "tom@carrier.com", "mark@carrier.com", "JANE@carrier.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        recover_contacts(&mut contacts, text, &emails);
        assert_eq!(contacts.len(), 3);
        let tom = &contacts[2];
        assert_eq!(tom.name.as_deref(), Some("Tom Hart"));
        assert_eq!(tom.role, Some(ContactRole::Claims));
        assert_eq!(tom.phone.as_deref(), Some("(555) 010-3000"));
    }

    #[test]
    fn recovery_skips_when_contacts_cover_emails() {
        let mut contacts = vec![Contact {
            name: Some("JANE DOE".into()),
            email: Some("jane@carrier.com".into()),
            ..Default::default()
        }];
        recover_contacts(&mut contacts, "Dispatch BOB (555) 010-1000 jane@carrier.com", &["jane@carrier.com".into()]);
        assert_eq!(contacts.len(), 1);
    }

    #[test]
    fn bare_name_is_never_a_contact() {
        let mut contacts = Vec::new();
        recover_contacts(&mut contacts, "some text\nJOHN SMITH\nnothing else", &[]);
        assert!(contacts.is_empty());
        let record = from_text("Contacts\nBilling\nJOHN SMITH\nRate Confirmation Emails");
        assert!(record.contacts.is_empty());
    }
}
