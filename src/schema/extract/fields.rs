//! Field parsers shared by the per-type extractors. Every helper returns
//! `None` when the page does not contain the value; nothing is guessed.

use crate::nlp::entities::{
    RE_DATE_DAY_FIRST, RE_DATE_ISO, RE_DATE_LONG, RE_DATE_US, RE_PHONE, RE_PRICE,
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Characters of context searched before a price for a `price` label.
const PRICE_LABEL_WINDOW: usize = 40;

static RE_PRICE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:price|now|sale|cost|only)\b").expect("valid price label regex"));
static RE_PRICE_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([$€£])?\s?(USD|EUR|GBP)?\s?(\d[\d,]*(?:\.\d{1,2})?)\s?(USD|EUR|GBP|dollars)?")
        .expect("valid price parts regex")
});
static RE_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(\d{1,6}\s+(?:[A-Z0-9][A-Za-z0-9.']*\s+){0,4}(?i:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|way|court|ct|place|pl)\.?(?:,?\s+(?i:suite|ste|apt|unit|#)\s*[\w\-]+)?),\s*([A-Z][A-Za-z .]+?),\s*([A-Z]{2})\s+(\d{5}(?:-\d{4})?)\b",
    )
    .expect("valid address regex")
});
static RE_EMAIL_ADDR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}\b")
        .expect("valid email regex")
});
static RE_HM_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:(\d+)\s*(?:hours?|hrs?|h)\b)?\s*(?:and\s+)?(?:(\d+)\s*(?:minutes?|mins?|m)\b)?\s*(?:(\d+)\s*(?:seconds?|secs?|s)\b)?")
        .expect("valid duration regex")
});
static RE_CLOCK_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:(\d{1,2}):)?(\d{1,2}):(\d{2})\s*$").expect("valid clock regex"));
static RE_ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^P(?:\d+D)?(?:T(?:\d+H)?(?:\d+M)?(?:\d+(?:\.\d+)?S)?)?$").expect("valid ISO duration regex")
});
static RE_RATING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d(?:\.\d)?)\s*(?:out of|/)\s*(5|10)\b(?:\s*stars?)?").expect("valid rating regex")
});
static RE_REVIEW_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d[\d,]*)\s+(?:reviews?|ratings?)\b").expect("valid review count regex")
});
static RE_HOURS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?(?:\s*(?:-|–|to|through)\s*(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?)?:?\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\s*(?:-|–|to)\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)?",
    )
    .expect("valid opening hours regex")
});

// ───────────────────────────────────────────────────────────────────────────
// Prices
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    /// Decimal amount without thousands separators, e.g. `"1299.99"`.
    pub amount: String,
    pub currency: Option<String>,
}

/// First price in `text`, preferring one preceded by a price-like label
/// ("Price:", "Now", "Sale").
pub fn find_price(text: &str) -> Option<Price> {
    let matches: Vec<_> = RE_PRICE.find_iter(text).collect();
    let labelled = matches.iter().find(|m| {
        let start = floor_char_boundary(text, m.start().saturating_sub(PRICE_LABEL_WINDOW));
        RE_PRICE_LABEL.is_match(&text[start..m.start()])
    });
    labelled.or(matches.first()).and_then(|m| parse_price(m.as_str()))
}

/// Parse one price expression into amount and ISO currency code.
pub fn parse_price(raw: &str) -> Option<Price> {
    let caps = RE_PRICE_PARTS.captures(raw.trim())?;
    let amount = caps.get(3)?.as_str().replace(',', "");
    if amount.parse::<f64>().is_err() {
        return None;
    }

    let currency = caps
        .get(1)
        .map(|m| match m.as_str() {
            "$" => "USD",
            "€" => "EUR",
            _ => "GBP",
        })
        .or_else(|| caps.get(2).map(|m| m.as_str()))
        .or_else(|| caps.get(4).map(|m| m.as_str()))
        .map(|c| match c.to_ascii_uppercase().as_str() {
            "DOLLARS" => "USD".to_string(),
            other => other.to_string(),
        });

    Some(Price { amount, currency })
}

// ───────────────────────────────────────────────────────────────────────────
// Dates
// ───────────────────────────────────────────────────────────────────────────

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    let n = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

fn ymd(year: i32, month: u32, day: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Normalize a date string to ISO 8601. Date-times already in ISO form are
/// kept whole; anything unparseable comes back unchanged (trimmed).
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim();
    if let Some(c) = RE_DATE_ISO.captures(s) {
        if c.get(4).is_some() && c.get(0).map(|m| m.as_str()) == Some(s) {
            return s.to_string();
        }
        let parsed = (|| ymd(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?))();
        if let Some(d) = parsed {
            return d;
        }
    }
    if let Some(c) = RE_DATE_US.captures(s) {
        let year: i32 = match c[3].len() {
            2 => 2000 + c[3].parse::<i32>().unwrap_or(0),
            _ => c[3].parse().unwrap_or(0),
        };
        if let Some(d) = (|| ymd(year, c[1].parse().ok()?, c[2].parse().ok()?))() {
            return d;
        }
    }
    if let Some(c) = RE_DATE_LONG.captures(s) {
        if let Some(d) = (|| ymd(c[3].parse().ok()?, month_number(&c[1])?, c[2].parse().ok()?))() {
            return d;
        }
    }
    if let Some(c) = RE_DATE_DAY_FIRST.captures(s) {
        if let Some(d) = (|| ymd(c[3].parse().ok()?, month_number(&c[2])?, c[1].parse().ok()?))() {
            return d;
        }
    }
    s.to_string()
}

/// Earliest date of any supported family in `text`, normalized.
pub fn find_date(text: &str) -> Option<String> {
    find_dates(text).into_iter().next()
}

/// Every date in `text` in reading order, normalized and deduplicated.
pub fn find_dates(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = Vec::new();
    for re in [&*RE_DATE_ISO, &*RE_DATE_US, &*RE_DATE_LONG, &*RE_DATE_DAY_FIRST] {
        for m in re.find_iter(text) {
            let overlaps = found
                .iter()
                .any(|(start, s)| m.start() < start + s.len() && *start < m.end());
            if !overlaps {
                found.push((m.start(), m.as_str()));
            }
        }
    }
    found.sort_by_key(|(start, _)| *start);

    let mut out: Vec<String> = Vec::new();
    for (_, raw) in found {
        let normalized = normalize_date(raw);
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

/// Date that follows one of `labels` (e.g. "Published", "Updated on").
pub fn find_labeled_date(text: &str, labels: &[&str]) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    for label in labels {
        let mut search_from = 0;
        while let Some(pos) = lower[search_from..].find(label) {
            let after = search_from + pos + label.len();
            let end = floor_char_boundary(text, (after + 60).min(text.len()));
            let window = &text[after..end];
            if let Some(date) = leading_date(window) {
                return Some(date);
            }
            search_from = after;
        }
    }
    None
}

fn leading_date(window: &str) -> Option<String> {
    let trimmed = window.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    let trimmed = trimmed
        .strip_prefix("on ")
        .or_else(|| trimmed.strip_prefix("On "))
        .unwrap_or(trimmed);
    for re in [&*RE_DATE_ISO, &*RE_DATE_US, &*RE_DATE_LONG, &*RE_DATE_DAY_FIRST] {
        if let Some(m) = re.find(trimmed) {
            if m.start() == 0 {
                return Some(normalize_date(m.as_str()));
            }
        }
    }
    None
}

pub fn is_iso_date(value: &str) -> bool {
    RE_DATE_ISO
        .find(value.trim())
        .map(|m| m.start() == 0 && m.end() == value.trim().len())
        .unwrap_or(false)
}

// ───────────────────────────────────────────────────────────────────────────
// Contact details
// ───────────────────────────────────────────────────────────────────────────

/// US-style `street, city, ST 12345` address as a `PostalAddress` object.
pub fn find_address(text: &str) -> Option<Value> {
    let c = RE_ADDRESS.captures(text)?;
    Some(json!({
        "@type": "PostalAddress",
        "streetAddress": c[1].trim(),
        "addressLocality": c[2].trim(),
        "addressRegion": &c[3],
        "postalCode": &c[4],
        "addressCountry": "US",
    }))
}

pub fn find_phone(text: &str) -> Option<String> {
    RE_PHONE.find(text).map(|m| m.as_str().trim().to_string())
}

pub fn find_email(text: &str) -> Option<String> {
    RE_EMAIL_ADDR.find(text).map(|m| m.as_str().to_string())
}

/// Compiled label patterns, keyed by lowercased label.
type LabelPatterns = Lazy<Mutex<HashMap<String, Regex>>>;

static LABELED_TEXT: LabelPatterns = Lazy::new(Default::default);
static LABELED_DURATION: LabelPatterns = Lazy::new(Default::default);

/// Pattern for `label` from `patterns`, compiling it on first use.
fn labeled_pattern(
    patterns: &LabelPatterns,
    label: &str,
    build: impl FnOnce(&str) -> String,
) -> Option<Regex> {
    let key = label.to_lowercase();
    let mut patterns = patterns.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = patterns.get(&key) {
        return Some(re.clone());
    }
    let re = Regex::new(&build(&regex::escape(&key))).ok()?;
    patterns.insert(key, re.clone());
    Some(re)
}

/// Text following `label:` up to the end of the sentence or line.
pub fn find_labeled_text(text: &str, label: &str) -> Option<String> {
    let re = labeled_pattern(&LABELED_TEXT, label, |label| {
        format!(r"(?i)\b{}\s*:\s*([^.;\n|]{{2,80}})", label)
    })?;
    let value = re.captures(text)?.get(1)?.as_str().trim().to_string();
    (!value.is_empty()).then_some(value)
}

// ───────────────────────────────────────────────────────────────────────────
// Availability, ratings, hours
// ───────────────────────────────────────────────────────────────────────────

/// schema.org availability URL for the first stock phrase in `text`.
pub fn infer_availability(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if lower.contains("out of stock") || lower.contains("sold out") || lower.contains("unavailable") {
        Some("https://schema.org/OutOfStock")
    } else if lower.contains("pre-order") || lower.contains("preorder") || lower.contains("pre order") {
        Some("https://schema.org/PreOrder")
    } else if lower.contains("in stock") || lower.contains("available now") {
        Some("https://schema.org/InStock")
    } else {
        None
    }
}

pub fn find_rating(text: &str) -> Option<Value> {
    let c = RE_RATING.captures(text)?;
    let value: f64 = c[1].parse().ok()?;
    let best: f64 = c[2].parse().ok()?;
    if value > best {
        return None;
    }
    let mut rating = json!({
        "@type": "AggregateRating",
        "ratingValue": c[1].to_string(),
        "bestRating": c[2].to_string(),
    });
    if let Some(count) = RE_REVIEW_COUNT.captures(text) {
        rating["reviewCount"] = Value::String(count[1].replace(',', ""));
    }
    Some(rating)
}

fn day_code(name: &str) -> &'static str {
    match name.to_ascii_lowercase().get(..3).unwrap_or("") {
        "mon" => "Mo",
        "tue" => "Tu",
        "wed" => "We",
        "thu" => "Th",
        "fri" => "Fr",
        "sat" => "Sa",
        _ => "Su",
    }
}

fn to_24h(hour: &str, minute: Option<&str>, meridiem: Option<&str>) -> Option<String> {
    let mut h: u32 = hour.parse().ok()?;
    let m: u32 = minute.map(|m| m.parse().unwrap_or(0)).unwrap_or(0);
    match meridiem.map(|s| s.to_ascii_lowercase()) {
        Some(ref p) if p == "pm" && h < 12 => h += 12,
        Some(ref p) if p == "am" && h == 12 => h = 0,
        _ => {}
    }
    (h < 24 && m < 60).then(|| format!("{:02}:{:02}", h, m))
}

/// `"Monday - Friday: 9am - 5pm"` → `["Mo-Fr 09:00-17:00"]`.
pub fn parse_opening_hours(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for c in RE_HOURS.captures_iter(text) {
        let days = match c.get(2) {
            Some(end) => format!("{}-{}", day_code(&c[1]), day_code(end.as_str())),
            None => day_code(&c[1]).to_string(),
        };
        let close_meridiem = c.get(8).map(|m| m.as_str());
        let open_meridiem = c.get(5).map(|m| m.as_str()).or(close_meridiem.map(|_| "am"));
        let open = to_24h(&c[3], c.get(4).map(|m| m.as_str()), open_meridiem);
        let close = to_24h(&c[6], c.get(7).map(|m| m.as_str()), close_meridiem);
        if let (Some(open), Some(close)) = (open, close) {
            let spec = format!("{} {}-{}", days, open, close);
            if !out.contains(&spec) {
                out.push(spec);
            }
        }
    }
    out
}

// ───────────────────────────────────────────────────────────────────────────
// Durations
// ───────────────────────────────────────────────────────────────────────────

fn iso_duration(hours: u64, minutes: u64, seconds: u64) -> Option<String> {
    if hours == 0 && minutes == 0 && seconds == 0 {
        return None;
    }
    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if seconds > 0 {
        out.push_str(&format!("{}S", seconds));
    }
    Some(out)
}

pub fn is_iso_duration(value: &str) -> bool {
    value.len() > 1 && RE_ISO_DURATION.is_match(value)
}

/// `"1 hour 30 minutes"` → `PT1H30M`, `"12:34"` → `PT12M34S`,
/// `"1:02:03"` → `PT1H2M3S`. ISO durations pass through.
pub fn parse_duration(raw: &str) -> Option<String> {
    let s = raw.trim();
    if is_iso_duration(s) {
        return Some(s.to_string());
    }
    if let Some(c) = RE_CLOCK_DURATION.captures(s) {
        let h = c.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let m = c[2].parse().ok()?;
        let sec = c[3].parse().ok()?;
        return iso_duration(h, m, sec);
    }
    let c = RE_HM_DURATION.captures(s)?;
    let num = |i: usize| c.get(i).and_then(|m| m.as_str().parse::<u64>().ok()).unwrap_or(0);
    iso_duration(num(1), num(2), num(3))
}

/// Seconds count (as in `og:video:duration`) to an ISO duration.
pub fn seconds_to_duration(raw: &str) -> Option<String> {
    let total: u64 = raw.trim().parse().ok()?;
    iso_duration(total / 3600, (total % 3600) / 60, total % 60)
}

/// Duration that follows `label` ("Prep time: 15 minutes").
pub fn find_labeled_duration(text: &str, label: &str) -> Option<String> {
    let re = labeled_pattern(&LABELED_DURATION, label, |label| {
        format!(
            r"(?i)\b{}\s*:?\s*(\d{{1,2}}:\d{{2}}(?::\d{{2}})?|(?:\d+\s*(?:hours?|hrs?|h)\b\s*(?:and\s+)?)?(?:\d+\s*(?:minutes?|mins?|m)\b)?)",
            label
        )
    })?;
    let captured = re.captures(text)?.get(1)?.as_str();
    parse_duration(captured)
}

// ───────────────────────────────────────────────────────────────────────────
// Misc
// ───────────────────────────────────────────────────────────────────────────

/// Largest char boundary not above `index`.
pub(crate) fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// `true` for strings that read like an ingredient line: a leading quantity
/// or a measuring unit.
pub fn looks_like_ingredient(line: &str) -> bool {
    static RE_INGREDIENT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)^\s*(?:[\d½¼¾⅓⅔⅛]|a\s+(?:pinch|dash|handful)|pinch|dash)|\b(?:cups?|tablespoons?|teaspoons?|tbsp|tsp|grams?|kg|ml|oz|ounces?|lbs?|pounds?|cloves?)\b",
        )
        .expect("valid ingredient regex")
    });
    line.len() <= 200 && RE_INGREDIENT.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_patterns_compile_once_per_label() {
        let text = "Batch Size: twelve rolls. Rest time: 2 hours";
        assert_eq!(find_labeled_text(text, "Batch Size").as_deref(), Some("twelve rolls"));
        assert_eq!(find_labeled_text(text, "batch size").as_deref(), Some("twelve rolls"));
        assert_eq!(find_labeled_duration(text, "REST TIME").as_deref(), Some("PT2H"));
        assert_eq!(find_labeled_duration(text, "rest time").as_deref(), Some("PT2H"));

        let text_patterns = LABELED_TEXT.lock().unwrap();
        assert!(text_patterns.contains_key("batch size"));
        assert!(!text_patterns.contains_key("Batch Size"));
        drop(text_patterns);
        assert!(LABELED_DURATION.lock().unwrap().contains_key("rest time"));
    }

    #[test]
    fn price_families_and_currency() {
        assert_eq!(
            find_price("Price: $19.99. Add to cart."),
            Some(Price {
                amount: "19.99".into(),
                currency: Some("USD".into())
            })
        );
        assert_eq!(parse_price("€1,299").unwrap().amount, "1299");
        assert_eq!(parse_price("€1,299").unwrap().currency.as_deref(), Some("EUR"));
        assert_eq!(parse_price("45 GBP").unwrap().currency.as_deref(), Some("GBP"));
        assert_eq!(parse_price("USD 12.50").unwrap().amount, "12.50");
        assert_eq!(parse_price("10 dollars").unwrap().currency.as_deref(), Some("USD"));
        assert_eq!(find_price("no prices here"), None);
    }

    #[test]
    fn labelled_price_beats_earlier_one() {
        let p = find_price("Save $5 today! Sale price: $45.00").unwrap();
        assert_eq!(p.amount, "45.00");
    }

    #[test]
    fn dates_normalize_to_iso() {
        assert_eq!(normalize_date("March 5, 2024"), "2024-03-05");
        assert_eq!(normalize_date("5 Mar 2024"), "2024-03-05");
        assert_eq!(normalize_date("3/5/2024"), "2024-03-05");
        assert_eq!(normalize_date("2024-03-05"), "2024-03-05");
        assert_eq!(normalize_date("2024-03-05T10:00:00Z"), "2024-03-05T10:00:00Z");
        assert_eq!(normalize_date("sometime soon"), "sometime soon");
        assert_eq!(normalize_date("13/45/2024"), "13/45/2024");
    }

    #[test]
    fn dates_in_reading_order() {
        assert_eq!(
            find_dates("From June 1, 2024 until 2024-06-03."),
            vec!["2024-06-01", "2024-06-03"]
        );
        assert_eq!(
            find_labeled_date("Posted by Ann. Updated: Jan 2, 2023", &["updated"]),
            Some("2023-01-02".into())
        );
    }

    #[test]
    fn address_phone_email() {
        let text = "Find us at 123 Main Street, Springfield, IL 62704. Call (217) 555-0199 or hi@diner.example.com";
        let address = find_address(text).unwrap();
        assert_eq!(address["streetAddress"], "123 Main Street");
        assert_eq!(address["addressLocality"], "Springfield");
        assert_eq!(address["addressRegion"], "IL");
        assert_eq!(address["postalCode"], "62704");
        assert_eq!(find_phone(text).as_deref(), Some("(217) 555-0199"));
        assert_eq!(find_email(text).as_deref(), Some("hi@diner.example.com"));
    }

    #[test]
    fn availability_phrases() {
        assert_eq!(infer_availability("Currently OUT OF STOCK"), Some("https://schema.org/OutOfStock"));
        assert_eq!(infer_availability("Pre-order today"), Some("https://schema.org/PreOrder"));
        assert_eq!(infer_availability("In stock and ready"), Some("https://schema.org/InStock"));
        assert_eq!(infer_availability("Call for details"), None);
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("1 hour 30 minutes").as_deref(), Some("PT1H30M"));
        assert_eq!(parse_duration("45 mins").as_deref(), Some("PT45M"));
        assert_eq!(parse_duration("12:34").as_deref(), Some("PT12M34S"));
        assert_eq!(parse_duration("1:02:03").as_deref(), Some("PT1H2M3S"));
        assert_eq!(parse_duration("PT5M").as_deref(), Some("PT5M"));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(seconds_to_duration("754").as_deref(), Some("PT12M34S"));
        assert_eq!(
            find_labeled_duration("Prep time: 15 minutes. Cook time: 1 hr 5 min", "cook time").as_deref(),
            Some("PT1H5M")
        );
    }

    #[test]
    fn ratings_and_hours() {
        let r = find_rating("Rated 4.5 out of 5 stars (1,204 reviews)").unwrap();
        assert_eq!(r["ratingValue"], "4.5");
        assert_eq!(r["reviewCount"], "1204");
        assert_eq!(find_rating("7 out of 5"), None);

        assert_eq!(
            parse_opening_hours("Hours: Monday - Friday: 9am - 5pm, Sat 10:00-14:00"),
            vec!["Mo-Fr 09:00-17:00", "Sa 10:00-14:00"]
        );
    }

    #[test]
    fn ingredient_lines() {
        assert!(looks_like_ingredient("2 cups flour"));
        assert!(looks_like_ingredient("A pinch of salt"));
        assert!(looks_like_ingredient("Salt, 1 tsp"));
        assert!(!looks_like_ingredient("Home"));
    }
}
