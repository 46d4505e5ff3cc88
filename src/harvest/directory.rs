use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use tracing::{debug, info};

use super::entities::EntityScan;
use super::page::{element_text, visible_text, Document};
use crate::model::directory::{
    Contact, ContactRole, DeactivatedUser, RawAddress, RawContact, RawRateEmail, RawVerifiedUser, StructuredDirectory,
};
use crate::parser::directory::recover_contacts;

/// Upper bound on `comprehensive.fullText`.
pub const MAX_FULL_TEXT: usize = 50_000;

static SECTION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("section").unwrap());
static H2_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").unwrap());
static SECTION_LABEL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.text-xs").unwrap());

static USER_ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"section#verified-users [id^="user-row-"]"#).unwrap());
static ANY_USER_ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"[id^="user-row-"]"#).unwrap());
static USER_NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-5 span.font-normal").unwrap());
static USER_PHONE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-4 span.font-normal").unwrap());
static USER_EMAIL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-9 span.truncate").unwrap());
static USER_SEEN_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-4 .flex-col").unwrap());
static FIRST_SPAN_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span:first-child").unwrap());
static LAST_SPAN_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span:last-child").unwrap());

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".my-2.rounded-md.border-2").unwrap());
static CONTACT_ROLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-2 p").unwrap());
static CONTACT_NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-2 span.font-normal").unwrap());
static CONTACT_PHONE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-4 span.font-normal").unwrap());
static CONTACT_EMAIL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-5 span.font-normal").unwrap());
static CONTACT_CREATED_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-3 span.whitespace-nowrap").unwrap());

static SERVICE_NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.font-normal").unwrap());
static RATE_EMAIL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-1 span.font-normal").unwrap());
static RATE_DESCRIPTION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".col-span-2 span.font-normal").unwrap());

static ADDRESS_CARD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".mb-2.rounded-lg.border-2").unwrap());
static ADDRESS_LABEL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p.text-xs.font-normal").unwrap());
static ADDRESS_STATUS_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".rounded-full div").unwrap());
static ADDRESS_LINE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".mr-4 p").unwrap());

const FIRST_SEEN_PREFIX: &str = "First Seen:";

/// Read the directory tab through its page structure.
///
/// `None` when none of the known row layouts is present; the caller then
/// submits the directory markup for text parsing instead.
pub fn structured_directory(doc: &Document) -> Option<StructuredDirectory> {
    let region = doc.directory_region();
    let mut directory = StructuredDirectory {
        verified_users: region.select(&USER_ROW_SEL).map(verified_user).collect(),
        deactivated_users: section_titled(region, |t| t.contains("Deactivated"))
            .map(|s| s.select(&ANY_USER_ROW_SEL).map(deactivated_user).collect())
            .unwrap_or_default(),
        contacts: section_titled(region, |t| t.contains("Contacts") && !t.contains("Rate"))
            .map(|s| s.select(&ROW_SEL).map(contact).collect())
            .unwrap_or_default(),
        rate_confirmation_emails: section_titled(region, |t| t.contains("Rate Confirmation"))
            .map(|s| s.select(&ROW_SEL).map(rate_email).collect())
            .unwrap_or_default(),
        dispatch_services: section_titled(region, |t| t.contains("Dispatch Services"))
            .map(|s| s.select(&ROW_SEL).filter_map(|row| cell(row, &SERVICE_NAME_SEL)).collect())
            .unwrap_or_default(),
        addresses: address_section(region)
            .map(|s| s.select(&ADDRESS_CARD_SEL).map(address).collect())
            .unwrap_or_default(),
        comprehensive: None,
    };
    if directory.verified_users.is_empty()
        && directory.deactivated_users.is_empty()
        && directory.contacts.is_empty()
        && directory.rate_confirmation_emails.is_empty()
        && directory.dispatch_services.is_empty()
        && directory.addresses.is_empty()
    {
        debug!("no structured directory layout on the page");
        return None;
    }

    let text = visible_text(region);
    let scan = EntityScan::scan(&text);
    let recovered = recover_free_text_contacts(&directory, &text, &scan.emails);
    directory.contacts.extend(recovered);
    info!(
        users = directory.verified_users.len(),
        deactivated = directory.deactivated_users.len(),
        contacts = directory.contacts.len(),
        rate_emails = directory.rate_confirmation_emails.len(),
        dispatch_services = directory.dispatch_services.len(),
        addresses = directory.addresses.len(),
        "structured directory assembled"
    );
    directory.comprehensive = Some(scan.into_comprehensive(&text, MAX_FULL_TEXT));
    Some(directory)
}

/// Contacts mentioned only in free text. Emails that belong to users or rate
/// mailboxes are left out so they do not turn into contacts.
fn recover_free_text_contacts(directory: &StructuredDirectory, text: &str, emails: &[String]) -> Vec<RawContact> {
    let claimed: HashSet<String> = directory
        .verified_users
        .iter()
        .filter_map(|u| u.email.as_deref())
        .chain(directory.rate_confirmation_emails.iter().filter_map(|e| e.email.as_deref()))
        .map(str::to_lowercase)
        .collect();
    let unclaimed: Vec<String> = emails
        .iter()
        .filter(|e| !claimed.contains(&e.to_lowercase()))
        .cloned()
        .collect();

    let mut known: Vec<Contact> = directory
        .contacts
        .iter()
        .map(|c| Contact {
            role: c.role.as_deref().and_then(ContactRole::parse),
            name: c.name.clone(),
            phone: c.phone.clone(),
            email: c.email.clone(),
            created: c.created.clone(),
        })
        .collect();
    let before = known.len();
    recover_contacts(&mut known, text, &unclaimed);
    if known.len() > before {
        debug!(count = known.len() - before, "recovered contacts from free text");
    }
    known.into_iter().skip(before).map(RawContact::from).collect()
}

// ── Rows ──

fn cell(row: ElementRef, sel: &Selector) -> Option<String> {
    row.select(sel).next().map(element_text).filter(|t| !t.is_empty())
}

fn cells(row: ElementRef, sel: &Selector) -> Vec<String> {
    row.select(sel).map(element_text).collect()
}

fn verified_user(row: ElementRef) -> RawVerifiedUser {
    let names = cells(row, &USER_NAME_SEL);
    let seen: Vec<ElementRef> = row.select(&USER_SEEN_SEL).collect();
    let seen_part = |idx: usize, sel: &Selector| seen.get(idx).and_then(|s| cell(*s, sel));
    RawVerifiedUser {
        name: names.first().cloned(),
        phone: cell(row, &USER_PHONE_SEL),
        email: cell(row, &USER_EMAIL_SEL),
        first_seen: seen_part(0, &FIRST_SPAN_SEL),
        first_seen_location: seen_part(0, &LAST_SPAN_SEL),
        last_seen: seen_part(1, &FIRST_SPAN_SEL),
        last_seen_location: seen_part(1, &LAST_SPAN_SEL),
        country: names.get(1).cloned(),
    }
}

fn deactivated_user(row: ElementRef) -> DeactivatedUser {
    DeactivatedUser {
        name: cell(row, &USER_NAME_SEL),
        phone: cell(row, &USER_PHONE_SEL),
        email: cell(row, &USER_EMAIL_SEL),
    }
}

fn contact(row: ElementRef) -> RawContact {
    RawContact {
        role: cell(row, &CONTACT_ROLE_SEL),
        name: cell(row, &CONTACT_NAME_SEL),
        phone: cell(row, &CONTACT_PHONE_SEL),
        email: cell(row, &CONTACT_EMAIL_SEL),
        created: cell(row, &CONTACT_CREATED_SEL),
    }
}

fn rate_email(row: ElementRef) -> RawRateEmail {
    let mut values = cells(row, &RATE_EMAIL_SEL).into_iter();
    RawRateEmail {
        email: values.next(),
        alias: values.next(),
        description: cell(row, &RATE_DESCRIPTION_SEL),
    }
}

fn address(card: ElementRef) -> RawAddress {
    let labels = cells(card, &ADDRESS_LABEL_SEL);
    let first_seen = labels
        .iter()
        .skip(1)
        .last()
        .map(|l| l.trim_start_matches(FIRST_SEEN_PREFIX).trim().to_string());
    RawAddress {
        kind: labels.first().cloned(),
        status: cell(card, &ADDRESS_STATUS_SEL),
        address: cell(card, &ADDRESS_LINE_SEL),
        first_seen,
    }
}

// ── Sections ──

fn section_titled<'a>(region: ElementRef<'a>, title: impl Fn(&str) -> bool) -> Option<ElementRef<'a>> {
    region
        .select(&SECTION_SEL)
        .find(|s| s.select(&H2_SEL).next().is_some_and(|h| title(&element_text(h))))
}

fn address_section(region: ElementRef<'_>) -> Option<ElementRef<'_>> {
    region.select(&SECTION_SEL).find(|s| {
        s.select(&SECTION_LABEL_SEL)
            .any(|l| element_text(l).to_lowercase().contains("address"))
    })
}

// ── Tests ──
