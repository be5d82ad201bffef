use super::lexicon::{is_common_phrase, is_non_name_word};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Per-class cap so pathological pages cannot balloon the result.
const MAX_PER_CLASS: usize = 25;

pub(crate) const MONTHS: &str = r"(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)";

const ORG_SUFFIXES: &str =
    r"(?:Inc|LLC|Ltd|Corp|Corporation|Company|Co|Group|GmbH|PLC|Foundation|Association)";

static RE_CAP_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\b").expect("valid cap-word regex"));
static RE_ORG_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^,?\s+{}\b", ORG_SUFFIXES)).expect("valid org-suffix regex"));
static RE_ORG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b((?:[A-Z][A-Za-z0-9&'\-]*\s+){{0,4}}[A-Z][A-Za-z0-9&'\-]*),?\s+{}\b\.?",
        ORG_SUFFIXES
    ))
    .expect("valid organization regex")
});
static RE_LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:in|at|from|near|visit|located in)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?(?:,\s*[A-Z][a-zA-Z]+)?)")
        .expect("valid location regex")
});
static RE_PRODUCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][A-Za-z0-9]*(?:\s+[A-Z0-9][A-Za-z0-9]*){0,3}\s+(?:Pro|Max|Plus|Mini|Ultra|Lite|Edition|Series|\d{1,4}[A-Za-z]?))\b")
        .expect("valid product regex")
});
static RE_MODEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bmodel\s*(?:#|no\.?|number)?\s*:?\s*([A-Z0-9][A-Z0-9\-]{2,})")
        .expect("valid model regex")
});
pub(crate) static RE_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[$€£]\s?\d{1,3}(?:,\d{3})*(?:\.\d{1,2})?|\b\d+(?:\.\d{1,2})?\s?(?:USD|EUR|GBP|dollars)\b|\b(?:USD|EUR|GBP)\s?\d+(?:\.\d{1,2})?)")
        .expect("valid price regex")
});
pub(crate) static RE_DATE_ISO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})(T\d{2}:\d{2}(?::\d{2})?(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)?\b")
        .expect("valid ISO date regex")
});
pub(crate) static RE_DATE_US: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b").expect("valid US date regex"));
pub(crate) static RE_DATE_LONG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b({})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b", MONTHS))
        .expect("valid long-form date regex")
});
pub(crate) static RE_DATE_DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({})\.?,?\s+(\d{{4}})\b", MONTHS))
        .expect("valid day-first date regex")
});
static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});
pub(crate) static RE_PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[\s.\-]?)?\(?\b\d{3}\)?[\s.\-]?\d{3}[\s.\-]\d{4}\b").expect("valid phone regex")
});
static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"')]+"#).expect("valid url regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub people: Vec<String>,
    pub organizations: Vec<String>,
    pub locations: Vec<String>,
    pub products: Vec<String>,
    pub prices: Vec<String>,
    pub dates: Vec<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub urls: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && list.len() < MAX_PER_CLASS && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Run every entity family over `text`. Families are independent; a match
/// in one never suppresses another except that person candidates which are
/// really organization names are dropped.
pub fn extract_entities(text: &str) -> Entities {
    let mut entities = Entities::default();

    for caps in RE_ORG.captures_iter(text) {
        let name = caps.get(0).map(|m| m.as_str()).unwrap_or("");
        let name = name.strip_prefix("The ").unwrap_or(name).trim_end_matches('.');
        push_unique(&mut entities.organizations, name);
    }

    entities.people = extract_people(text, &entities.organizations);

    for caps in RE_LOCATION.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let first = m.as_str().split_whitespace().next().unwrap_or("");
            if !is_non_name_word(first.trim_end_matches(',')) {
                push_unique(&mut entities.locations, m.as_str());
            }
        }
    }

    for caps in RE_PRODUCT.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let first = m.as_str().split_whitespace().next().unwrap_or("");
            if !is_non_name_word(first) && !is_common_phrase(m.as_str()) {
                push_unique(&mut entities.products, m.as_str());
            }
        }
    }
    for caps in RE_MODEL.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            push_unique(&mut entities.products, m.as_str());
        }
    }

    for m in RE_PRICE.find_iter(text) {
        push_unique(&mut entities.prices, m.as_str());
    }

    for re in [&*RE_DATE_ISO, &*RE_DATE_US, &*RE_DATE_LONG, &*RE_DATE_DAY_FIRST] {
        for m in re.find_iter(text) {
            push_unique(&mut entities.dates, m.as_str());
        }
    }

    for m in RE_EMAIL.find_iter(text) {
        push_unique(&mut entities.emails, m.as_str());
    }
    for m in RE_PHONE.find_iter(text) {
        push_unique(&mut entities.phones, m.as_str());
    }
    for m in RE_URL.find_iter(text) {
        push_unique(&mut entities.urls, m.as_str().trim_end_matches(&['.', ',', ';', ':'][..]));
    }

    entities
}

/// Adjacent capitalized word pairs, skipping boilerplate phrases, calendar
/// words and the leading part of organization names.
fn extract_people(text: &str, organizations: &[String]) -> Vec<String> {
    let words: Vec<_> = RE_CAP_WORD.find_iter(text).collect();
    let mut people = Vec::new();
    let mut i = 0;

    while i + 1 < words.len() {
        let (a, b) = (words[i], words[i + 1]);
        let gap = &text[a.end()..b.start()];
        let adjacent = !gap.is_empty() && gap.chars().all(|c| c == ' ');

        if adjacent && !is_non_name_word(a.as_str()) && !is_non_name_word(b.as_str()) {
            let candidate = format!("{} {}", a.as_str(), b.as_str());
            let followed_by_suffix = RE_ORG_SUFFIX.is_match(&text[b.end()..]);
            let inside_org = organizations.iter().any(|o| o.contains(&candidate));
            if !followed_by_suffix && !inside_org && !is_common_phrase(&candidate) {
                push_unique(&mut people, &candidate);
                i += 2;
                continue;
            }
        }
        i += 1;
    }

    people
}
