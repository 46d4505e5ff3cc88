use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use serde::Serialize;

use crate::model::directory::Comprehensive;
use crate::parser::text::{EMAIL, PHONE};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!(r"\b{EMAIL}\b")).unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(PHONE).unwrap());
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\d+\s+[A-Za-z0-9 ,.-]+?\b(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Circle|Cir|Parkway|Pkwy)\b[\s,]+[A-Za-z ]+,\s*[A-Z]{2}\s+\d{5}(?:-\d{4})?",
    )
    .unwrap()
});
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){1,3}\b").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{2}-\d{2}|[A-Z][a-z]+\s+\d{1,2},?\s+\d{4})\b").unwrap()
});
static MC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bMC\s*:?\s*(\d{5,8})\b").unwrap());
static DOT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(?:US)?DOT\s*:?\s*(\d{6,8})\b").unwrap());

/// Addresses on these hosts are placeholders or belong to the load board itself.
const IGNORED_EMAIL_HOSTS: [&str; 4] = ["example.com", "test.com", "localhost", "highway.com"];
/// Words that mark a capitalised phrase as page chrome rather than a person.
const NAME_NOISE: [&str; 4] = ["Highway", "Carrier", "Directory", "Overview"];

/// Opportunistic entity pass over a text snapshot. Kept for recall even
/// when structured extraction of a field fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityScan {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<String>,
    pub names: Vec<String>,
    pub dates: Vec<String>,
    pub mc_numbers: Vec<String>,
    pub dot_numbers: Vec<String>,
}

impl EntityScan {
    pub fn scan(text: &str) -> Self {
        let all = |re: &Regex| re.find_iter(text).map(|m| m.as_str().trim().to_string()).unique().collect_vec();
        let group = |re: &Regex| re.captures_iter(text).map(|c| c[1].to_string()).unique().collect_vec();

        Self {
            emails: all(&EMAIL_RE)
                .into_iter()
                .filter(|e| !is_ignored_email(e))
                .collect(),
            phones: all(&PHONE_RE),
            addresses: all(&ADDRESS_RE),
            names: all(&NAME_RE)
                .into_iter()
                .filter(|n| n.len() > 3 && n.len() < 50 && !NAME_NOISE.iter().any(|w| n.contains(w)))
                .collect(),
            dates: all(&DATE_RE),
            mc_numbers: group(&MC_RE),
            dot_numbers: group(&DOT_RE),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == EntityScan::default()
    }

    /// Directory form, with the scanned text capped at `max_text` bytes.
    pub fn into_comprehensive(self, full_text: &str, max_text: usize) -> Comprehensive {
        let mut end = full_text.len().min(max_text);
        while !full_text.is_char_boundary(end) {
            end -= 1;
        }
        Comprehensive {
            all_emails: self.emails,
            all_phones: self.phones,
            all_addresses: self.addresses,
            all_names: self.names,
            all_dates: self.dates,
            full_text: full_text[..end].to_string(),
        }
    }
}

/// Host equal to an ignored host or one of its subdomains.
fn is_ignored_email(email: &str) -> bool {
    let Some((_, host)) = email.rsplit_once('@') else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    IGNORED_EMAIL_HOSTS
        .iter()
        .any(|h| host == *h || host.strip_suffix(h).is_some_and(|rest| rest.ends_with('.')))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Reach out to Mary Stone at mary@roadrunnerfreight.com or (513) 555-0150.
Support: help@highway.com
Office: 9435 Waterstone Blvd, Cincinnati, OH 45249
MC 123456 USDOT 2345678
Created 9/29/24 and again on March 3, 2024
Carrier Overview";

    #[test]
    fn scan_finds_each_kind() {
        let scan = EntityScan::scan(TEXT);
        assert_eq!(scan.emails, vec!["mary@roadrunnerfreight.com"]);
        assert_eq!(scan.phones, vec!["(513) 555-0150"]);
        assert_eq!(scan.addresses.len(), 1);
        assert!(scan.addresses[0].ends_with("OH 45249"));
        assert!(scan.names.contains(&"Mary Stone".to_string()));
        assert!(!scan.names.iter().any(|n| n.contains("Overview")));
        assert_eq!(scan.dates, vec!["9/29/24", "March 3, 2024"]);
        assert_eq!(scan.mc_numbers, vec!["123456"]);
        assert_eq!(scan.dot_numbers, vec!["2345678"]);
    }

    #[test]
    fn ignored_hosts_match_whole_domains_only() {
        let scan = EntityScan::scan("ops@contest.com news@latest.com qa@test.com a@mail.example.com b@highway.com");
        assert_eq!(scan.emails, vec!["ops@contest.com", "news@latest.com"]);
    }

    #[test]
    fn comprehensive_caps_text_on_char_boundary() {
        let c = EntityScan::default().into_comprehensive("ab€cd", 3);
        assert_eq!(c.full_text, "ab");
    }
}
