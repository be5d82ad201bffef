use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Faq,
    Recipe,
    Product,
    Event,
    Business,
    HowTo,
    Article,
    General,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Faq => "faq",
            ContentType::Recipe => "recipe",
            ContentType::Product => "product",
            ContentType::Event => "event",
            ContentType::Business => "business",
            ContentType::HowTo => "how_to",
            ContentType::Article => "article",
            ContentType::General => "general",
        }
    }
}

/// Ordered pattern checks per content type. FAQ and recipe come first so
/// pages with a question list or an ingredient list are not swallowed by
/// the broader article/product rules.
const RULES: &[(ContentType, &[&str])] = &[
    (
        ContentType::Faq,
        &[
            r"(?i)\bfrequently asked questions\b|\bfaqs?\b",
            r"(?:^|\s)(?:Q|Question):\s",
            r"(?i)\b(?:how|what|why|when|can|do|does|is)\b[^.?!\n]{3,120}\?(?:.*?\?){2,}",
            r"(?:^|\s)(?:A|Answer):\s",
        ],
    ),
    (
        ContentType::Recipe,
        &[
            r"(?i)\bingredients?\b",
            r"(?i)\b(?:cups?|tablespoons?|teaspoons?|tbsp|tsp|grams?|oz|ounces?)\b",
            r"(?i)\b(?:prep|cook|total)\s*time\b",
            r"(?i)\b(?:preheat|bake|simmer|whisk|stir|servings?|serves)\b",
        ],
    ),
    (
        ContentType::Product,
        &[
            r"[$€£]\s?\d",
            r"(?i)\badd to (?:cart|bag|basket)\b|\bbuy now\b",
            r"(?i)\bin stock\b|\bout of stock\b|\bpre-?order\b",
            r"(?i)\b(?:sku|model(?: number)?|specifications?|free shipping|warranty)\b",
        ],
    ),
    (
        ContentType::Event,
        &[
            r"(?i)\b(?:tickets?|register now|rsvp)\b",
            r"(?i)\b(?:venue|doors open|lineup|conference|concert|festival|webinar)\b",
            r"(?i)\b(?:starts?|begins?|ends?)\s+(?:at|on)\b",
            r"(?i)\b\d{1,2}(?::\d{2})?\s?(?:am|pm)\b",
        ],
    ),
    (
        ContentType::Business,
        &[
            r"(?i)\b(?:opening hours|hours of operation|open (?:daily|monday|mon))\b",
            r"(?i)\b\d+\s+\w+(?:\s\w+)?\s(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr)\b",
            r"\(?\b\d{3}\)?[\s.\-]?\d{3}[\s.\-]\d{4}\b",
            r"(?i)\b(?:visit us|directions|reservations?|walk-ins?|call us)\b",
        ],
    ),
    (
        ContentType::HowTo,
        &[
            r"(?i)\bhow to\b",
            r"(?i)\bstep\s*(?:\d+|one|two|three)\b",
            r"(?i)\b(?:you will need|what you'?ll need|tools? required|materials)\b",
            r"(?i)\b(?:first|next|then|finally),",
        ],
    ),
    (
        ContentType::Article,
        &[
            r"\b(?i:by|written by|author)\s+[A-Z][a-z]+",
            r"(?i)\b(?:published|posted|updated)\b",
            r"(?i)\b(?:min(?:ute)? read|comments?|share this)\b",
            r"(?i)\b(?:according to|reported|said)\b",
        ],
    ),
];

static COMPILED: Lazy<Vec<(ContentType, Vec<Regex>)>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|(kind, patterns)| {
            let compiled = patterns
                .iter()
                .map(|p| Regex::new(p).expect("valid classification pattern"))
                .collect();
            (*kind, compiled)
        })
        .collect()
});

/// First content type (in rule order) with at least `min_matches` of its
/// checks matching, else [`ContentType::General`].
pub fn classify_content(text: &str, min_matches: usize) -> ContentType {
    if text.trim().is_empty() {
        return ContentType::General;
    }
    let min_matches = min_matches.max(1);

    for (kind, checks) in COMPILED.iter() {
        let hits = checks.iter().filter(|re| re.is_match(text)).count();
        if hits >= min_matches {
            return *kind;
        }
    }
    ContentType::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_wins_over_product() {
        let text = "Ingredients: 2 cups flour, 1 tsp salt. Prep time 10 minutes. Buy now for $5!";
        assert_eq!(classify_content(text, 2), ContentType::Recipe);
    }

    #[test]
    fn faq_is_checked_first() {
        let text = "Frequently Asked Questions\nQ: How do I reset it?\nA: Hold the button. Add to cart for $9.";
        assert_eq!(classify_content(text, 2), ContentType::Faq);
    }

    #[test]
    fn question_answer_markers_match_inside_collapsed_text() {
        let text = "Support centre. Q: How do I reset it? A: Hold the button for five seconds.";
        assert_eq!(classify_content(text, 2), ContentType::Faq);
    }

    #[test]
    fn product_needs_two_signals() {
        assert_eq!(classify_content("Only $19.99", 2), ContentType::General);
        assert_eq!(
            classify_content("Only $19.99. In stock, add to cart.", 2),
            ContentType::Product
        );
        assert_eq!(classify_content("Only $19.99", 1), ContentType::Product);
    }

    #[test]
    fn empty_text_is_general() {
        assert_eq!(classify_content("   ", 2), ContentType::General);
        assert_eq!(ContentType::HowTo.as_str(), "how_to");
    }
}
