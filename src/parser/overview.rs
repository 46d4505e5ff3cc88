use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

use super::text::{self, DATE, EMAIL, NUMBER, PHONE};
use super::{history, insurance, risk, safety};
use crate::model::overview::*;

// ── Identity ──

static CARRIER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*Carrier\s*Name[: \t]+(.+)$").unwrap());
static CAPS_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*([A-Z][A-Z&.,' -]{2,60})[ \t]*$").unwrap());
static MC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bMC\s*[#:-]?\s*(\d{5,8})\b").unwrap());
static DOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:US)?DOT\s*#?:?\s*(\d{6,8})\b").unwrap());
static SCAC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bSCAC[:\s]+([A-Z]{2,4})\b").unwrap());

static DISPATCH_CONTACT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Dispatch\s*Contact").unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(PHONE).unwrap());
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(EMAIL).unwrap());

// ── Status ──

static AUTHORITY_STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)DOT\s*STATUS[:\s]*(ACTIVE|INACTIVE)\b").unwrap());
static OPERATING_STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:Operating\s*Status)[:\s]*([A-Z][A-Za-z ]{0,30})").unwrap());
static OPERATING_STOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:Safety|rating|Certifications|CARB|ELD|The|carrier|credentials)\b").unwrap()
});
static SAFETY_RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:Safety\s*Rating)[:\s]*([A-Z][A-Za-z ]{0,30})").unwrap());
static SAFETY_RATING_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Effective\s+Safety\s+Rating\s+Date[^\n]*\n[ \t]*([A-Za-z]+)").unwrap());
static RATING_STOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:Unsafe|Hours|Certifications|CARB|ELD|The|carrier|Effective)\b").unwrap()
});

/// Certifications the overview advertises, with the label pattern that finds each.
const CERTIFICATIONS: [(&str, &str); 2] = [
    ("CARB Truck and Bus", r"CARB\s+Truck\s+and\s+Bus"),
    ("Tank Endorsed Drivers", r"Tank\s+Endorsed\s+Drivers"),
];

static CERTIFICATION_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    CERTIFICATIONS
        .iter()
        .map(|(name, label)| {
            let pattern = format!(
                r"(?i){label}(?:[ \t]+(?:Certified|Highway\s+Verified|Self\s+Reported))*(?:[ \t]+({DATE}))?"
            );
            (*name, Regex::new(&pattern).unwrap())
        })
        .collect()
});
/// Any other "<name> Certified" line.
static CERTIFIED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?im)^[ \t]*([A-Z][A-Za-z0-9&/.'() -]{{1,60}}?)[ \t]+Certified\b(?:[ \t]+(?:Highway\s+Verified|Self\s+Reported))*(?:[ \t]+({DATE}))?[ \t]*$"
    ))
    .unwrap()
});

// ── Equipment / network ──

static POWER_UNITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)[ \t]+Power[ \t]+Units").unwrap());
static POWER_UNITS_ABOVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*(\d+)[ \t]*\n[ \t]*Power\s+Units").unwrap());
static TRAILERS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)[ \t]+Trailers?\b").unwrap());
static TRAILERS_ABOVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*(\d+)[ \t]*\n[ \t]*Trailers?\b").unwrap());
static FLEET_AGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Average\s*Fleet\s*Age[^\d]{0,20}(\d+)\s*yrs?").unwrap());
static STATES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)[ \t]+States\b").unwrap());
static STATES_ABOVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*(\d+)[ \t]*\n[ \t]*States\b").unwrap());
static CROSS_BORDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Cross\s*Border[:\s]+(Yes|No)\b").unwrap());

// ── Authority ──

static AUTHORITY_TYPES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*Authority\s*Types?[: \t]*(.*)$").unwrap());
static AUTHORITY_KIND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(Common|Contract|Broker)\b").unwrap());
static DRIVER_OOS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bDriver[ \t]+(\d+)[ \t]+(\d+)[ \t]+({NUMBER})%[ \t]+({NUMBER})%")).unwrap()
});
static VEHICLE_OOS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bVehicle[ \t]+(\d+)[ \t]+(\d+)[ \t]+({NUMBER})%[ \t]+({NUMBER})%")).unwrap()
});

// ── Inspections / crashes summary ──

static INSPECTION_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)[ \t]+Inspections\b").unwrap());
static INSPECTION_RATIO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Inspection-to-Fleet\s*Ratio[^\d\n]*(\d+)\s*/\s*(\d+)").unwrap());
static PERCENTILE_RANK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Top\s+(\d+)%\s*(?:Percentile\s+Ranking)?").unwrap());
static CRASH_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)[ \t]+Reported\s+Crash(?:es)?\b").unwrap());

// ── Operations ──

static FLEET_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Fleet\s*Size[:\s]+(\d+\s*-\s*\d+|\d+\+?)").unwrap());
static CARGO_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*Cargo\s+Carried[: \t]*(.*)$").unwrap());
const CARGO_PHRASES: [&str; 5] = [
    "General Freight",
    "Intermodal Containers",
    "Household Goods",
    "Refrigerated Food",
    "Building Materials",
];

// ── ELD ──

static ELD_STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Connection\s+Status[: \t]*(?:\n[ \t]*)?(Not\s+Connected|Connected)").unwrap()
});
static ASSESSMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Assessment\s+Status[: \t]*(?:\n[ \t]*)?(Partial\s+Pass|Pass|Fail)").unwrap()
});
static ELD_PROVIDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:ELD\s+Provider)[: \t]*(?:\n[ \t]*)?([A-Z][A-Za-z ]+)").unwrap());
static PROVIDER_STOP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:Connected|Updated|Assessment|Connection)\b").unwrap());
static KNOWN_PROVIDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(Greenlight|Samsara|Geotab|Omnitracs|PeopleNet|KeepTruckin|Motive|Verizon\s+Connect|Teletrac|Zonar|BigRoad|GPS\s+Insight|Linxup)\s+ELD\b",
    )
    .unwrap()
});
static CONNECTED_ON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)Connected\s+on\s+({DATE})")).unwrap());
static UPDATED_AGO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Updated\s+(\d+)\s+minutes?\s+ago").unwrap());

/// Build the overview record from stripped text.
pub fn extract(text: &str) -> OverviewRecord {
    let history = history::authority_events(text);
    let mut types = authority_types(text);
    if types.is_empty() {
        types = history
            .iter()
            .map(|e| title_case(&e.authority_type))
            .unique()
            .collect();
    }

    OverviewRecord {
        identity: Identity {
            name: carrier_name(text),
            mc_number: text::first_capture(text, [&*MC_RE]),
            dot_number: text::first_capture(text, [&*DOT_RE]),
            scac: text::first_capture(text, [&*SCAC_RE]).map(|s| s.to_uppercase()),
        },
        dispatch_contact: dispatch_contact(text),
        authority_status: authority_status(text),
        operating_status: operating_status(text),
        safety_rating: safety_rating(text),
        certifications: certifications(text),
        equipment: Equipment {
            power_units: count(text, &POWER_UNITS_RE, &POWER_UNITS_ABOVE_RE),
            trailers: count(text, &TRAILERS_RE, &TRAILERS_ABOVE_RE),
            average_fleet_age_years: text::first_capture(text, [&*FLEET_AGE_RE]).and_then(|s| text::parse_num(&s)),
        },
        network: Network {
            served_states: count(text, &STATES_RE, &STATES_ABOVE_RE),
            cross_border: text::first_capture(text, [&*CROSS_BORDER_RE]).map(|s| s.eq_ignore_ascii_case("yes")),
        },
        authority: Authority {
            types,
            history,
            oos_rates: OosRates {
                driver: oos_rate(text, &DRIVER_OOS_RE),
                vehicle: oos_rate(text, &VEHICLE_OOS_RE),
            },
        },
        insurance: insurance::extract(text),
        safety: safety::extract(text),
        inspections: Inspections {
            count: text::first_capture(text, [&*INSPECTION_COUNT_RE]).and_then(|s| text::parse_num(&s)),
            ratio: INSPECTION_RATIO_RE
                .captures(text)
                .map(|c| format!("{}/{}", &c[1], &c[2])),
            percentile: text::first_capture(text, [&*PERCENTILE_RANK_RE]).and_then(|s| text::parse_num(&s)),
            history: history::inspections(text),
        },
        crashes: Crashes {
            count_24_months: text::first_capture(text, [&*CRASH_COUNT_RE]).and_then(|s| text::parse_num(&s)),
            history: history::crashes(text),
        },
        operations: Operations {
            fleet_size: text::first_capture(text, [&*FLEET_SIZE_RE]).map(|s| s.replace(' ', "")),
            cargo_carried: cargo_carried(text),
        },
        risk_score: risk::extract(text),
        eld: eld(text),
    }
}

fn carrier_name(text: &str) -> Option<String> {
    let labelled = |t: &str| text::first_capture(t, [&*CARRIER_NAME_RE]);
    // Unlabelled pages lead with the legal name in capitals
    let caps_line = |t: &str| {
        CAPS_LINE_RE
            .captures_iter(t)
            .map(|c| c[1].trim().to_string())
            .find(|line| {
                let first = line.split_whitespace().next().unwrap_or_default();
                !matches!(first, "DOT" | "USDOT" | "MC" | "SCAC" | "ACTIVE" | "INACTIVE")
                    && line.chars().filter(|c| c.is_ascii_alphabetic()).count() >= 3
            })
    };
    text::first_success(text, &[&labelled, &caps_line])
}

fn dispatch_contact(text: &str) -> Option<DispatchContact> {
    let m = DISPATCH_CONTACT_RE.find(text)?;
    let window = text[m.end()..].lines().take(4).join("\n");
    let contact = DispatchContact {
        phone: PHONE_RE.find(&window).and_then(|p| text::normalize_phone(p.as_str())),
        email: EMAIL_RE.find(&window).map(|e| e.as_str().to_string()),
    };
    (contact.phone.is_some() || contact.email.is_some()).then_some(contact)
}

fn authority_status(text: &str) -> Option<AuthorityStatus> {
    let status = text::first_capture(text, [&*AUTHORITY_STATUS_RE])?;
    if status.eq_ignore_ascii_case("active") {
        Some(AuthorityStatus::Active)
    } else {
        Some(AuthorityStatus::Inactive)
    }
}

fn operating_status(text: &str) -> Option<String> {
    OPERATING_STATUS_RE
        .captures_iter(text)
        .find_map(|c| text::trim_scalar(&c[1], &OPERATING_STOP_RE, 50))
}

fn safety_rating(text: &str) -> Option<SafetyRating> {
    let labelled = |t: &str| {
        SAFETY_RATING_RE.captures_iter(t).find_map(|c| {
            let trimmed = text::trim_scalar(&c[1], &RATING_STOP_RE, 40)?;
            SafetyRating::find_in(&trimmed)
        })
    };
    let after_date = |t: &str| {
        SAFETY_RATING_DATE_RE
            .captures(t)
            .and_then(|c| SafetyRating::find_in(&c[1]))
    };
    text::first_success(text, &[&labelled, &after_date])
}

/// Known labels wherever they appear plus every other certified line, in page order.
fn certifications(text: &str) -> Vec<Certification> {
    let known = CERTIFICATION_RES.iter().filter_map(|(name, re)| {
        let caps = re.captures(text)?;
        let cert = Certification {
            name: name.to_string(),
            date: caps.get(1).map(|m| m.as_str().to_string()),
        };
        Some((caps.get(0)?.start(), cert))
    });
    let listed = CERTIFIED_LINE_RE.captures_iter(text).filter_map(|caps| {
        let cert = Certification {
            name: caps[1].trim().to_string(),
            date: caps.get(2).map(|m| m.as_str().to_string()),
        };
        Some((caps.get(0)?.start(), cert))
    });

    known
        .chain(listed)
        .sorted_by_key(|(start, _)| *start)
        .map(|(_, cert)| cert)
        .unique_by(|cert| cert.name.to_lowercase())
        .collect()
}

/// A count written before its label, either on the same line or on the line above.
fn count(text: &str, same_line: &Regex, above: &Regex) -> Option<u32> {
    text::first_capture(text, [same_line, above]).and_then(|s| text::parse_num(&s))
}

fn authority_types(text: &str) -> Vec<String> {
    let Some(caps) = AUTHORITY_TYPES_RE.captures(text) else {
        return Vec::new();
    };
    let whole = caps.get(0).map(|m| m.end()).unwrap_or_default();
    let mut line = caps[1].trim().to_string();
    if line.is_empty() {
        line = text[whole..].trim_start_matches('\n').lines().next().unwrap_or_default().to_string();
    }
    AUTHORITY_KIND_RE
        .captures_iter(&line)
        .map(|c| title_case(&c[1]))
        .unique()
        .collect()
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .join(" ")
}

fn oos_rate(text: &str, re: &Regex) -> Option<OosRate> {
    let caps = re.captures(text)?;
    Some(OosRate {
        out_of_service: text::parse_num(&caps[1])?,
        inspections: text::parse_num(&caps[2])?,
        percentage: text::parse_num(&caps[3])?,
        national_average: text::parse_num(&caps[4])?,
    })
}

fn cargo_carried(text: &str) -> Vec<String> {
    if let Some(caps) = CARGO_LINE_RE.captures(text) {
        let mut line = caps[1].trim().to_string();
        if line.is_empty() {
            let end = caps.get(0).map(|m| m.end()).unwrap_or_default();
            line = text[end..].trim_start_matches('\n').lines().next().unwrap_or_default().to_string();
        }
        let items: Vec<String> = line
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !items.is_empty() {
            return items;
        }
    }
    CARGO_PHRASES
        .iter()
        .filter(|phrase| text.contains(*phrase))
        .map(|phrase| phrase.to_string())
        .collect()
}

fn eld(text: &str) -> Option<EldConnection> {
    let status = text::first_capture(text, [&*ELD_STATUS_RE]).map(|s| {
        if s.to_ascii_lowercase().starts_with("not") {
            ConnectionStatus::NotConnected
        } else {
            ConnectionStatus::Connected
        }
    });
    let assessment = text::first_capture(text, [&*ASSESSMENT_RE]).map(|s| {
        match s.to_ascii_lowercase().as_str() {
            "pass" => AssessmentStatus::Pass,
            "fail" => AssessmentStatus::Fail,
            _ => AssessmentStatus::PartialPass,
        }
    });

    let labelled = |t: &str| {
        ELD_PROVIDER_RE.captures_iter(t).find_map(|c| {
            let name = text::trim_scalar(&c[1], &PROVIDER_STOP_RE, 50)?;
            let name = name.strip_suffix(" ELD").unwrap_or(&name).trim().to_string();
            (!name.is_empty()).then_some(name)
        })
    };
    let known = |t: &str| text::first_capture(t, [&*KNOWN_PROVIDER_RE]);

    let connection = EldConnection {
        status,
        assessment,
        provider: text::first_success(text, &[&labelled, &known]),
        connected_date: text::first_capture(text, [&*CONNECTED_ON_RE]),
        last_updated_minutes: text::first_capture(text, [&*UPDATED_AGO_RE]).and_then(|s| text::parse_num(&s)),
    };
    (!connection.is_empty()).then_some(connection)
}

// ── Tests ──
