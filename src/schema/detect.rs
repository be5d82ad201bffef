//! Rule-table driven schema type detection.
//!
//! Each detectable type owns a [`TypeRule`]: the OpenGraph types that name
//! it, the content classification that agrees with it and a list of
//! weighted indicators. Scores are independent per type; adding a type is
//! adding a table entry.

use crate::core::config::DetectionConfig;
use crate::nlp::{ContentAnalysis, ContentType};
use crate::types::{DetectionCandidate, ParsedPage, SchemaType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

const OG_TYPE_WEIGHT: f64 = 0.4;
const EXISTING_JSON_LD_WEIGHT: f64 = 0.5;
const MICRODATA_WEIGHT: f64 = 0.3;
const CONTENT_TYPE_WEIGHT: f64 = 0.15;

/// Where an indicator looks.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    /// Regex over the page body text.
    Text(&'static str),
    /// Regex over the page URL.
    Url(&'static str),
    /// Regex over the title and headings.
    Title(&'static str),
    /// A meta, OpenGraph or Twitter key is present and non-empty.
    MetaPresent(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Indicator {
    pub signal: Signal,
    pub weight: f64,
    pub label: &'static str,
}

const fn ind(signal: Signal, weight: f64, label: &'static str) -> Indicator {
    Indicator {
        signal,
        weight,
        label,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TypeRule {
    pub schema_type: SchemaType,
    /// First dot-segment of `og:type` values that name this type.
    pub og_types: &'static [&'static str],
    pub content_type: Option<ContentType>,
    pub indicators: &'static [Indicator],
}

use Signal::{MetaPresent, Text, Title, Url};

/// Declaration order doubles as the tie-break order.
pub const RULES: &[TypeRule] = &[
    TypeRule {
        schema_type: SchemaType::Product,
        og_types: &["product"],
        content_type: Some(ContentType::Product),
        indicators: &[
            ind(Text(r"[$€£]\s?\d"), 0.3, "currency price"),
            ind(MetaPresent("product:price:amount"), 0.2, "product price meta"),
            ind(Text(r"(?i)\b(?:add to (?:cart|bag|basket)|buy now)\b"), 0.15, "purchase call to action"),
            ind(Text(r"(?i)\b(?:in stock|out of stock|pre-?order|sold out)\b"), 0.1, "availability phrase"),
            ind(Text(r"(?i)\b(?:sku|mpn|upc|model (?:no|number))\b"), 0.1, "product identifier"),
            ind(Url(r"(?i)/(?:products?|item|shop|p)/"), 0.1, "product URL path"),
            ind(Text(r"(?i)\b(?:free shipping|free returns|warranty)\b"), 0.05, "shipping or warranty terms"),
            ind(Text(r"(?i)\b(?:\d(?:\.\d)? out of 5|customer reviews?|\d+ ratings?)\b"), 0.05, "rating summary"),
        ],
    },
    TypeRule {
        schema_type: SchemaType::Article,
        og_types: &["article"],
        content_type: Some(ContentType::Article),
        indicators: &[
            ind(MetaPresent("article:published_time"), 0.2, "article publish time meta"),
            ind(Url(r"(?i)/(?:blog|news|articles?|posts?|\d{4}/\d{2})/"), 0.15, "article URL path"),
            ind(MetaPresent("author"), 0.1, "author meta"),
            ind(Text(r"\b(?i:by|written by)\s+[A-Z][a-z]+"), 0.1, "byline"),
            ind(Text(r"(?i)\b(?:published|updated|posted)\b(?:\s+on)?"), 0.1, "publication date phrase"),
            ind(Text(r"(?i)\b\d+\s*min(?:ute)?s? read\b"), 0.1, "reading time"),
            ind(Text(r"(?i)\b(?:share this|related (?:posts|articles)|comments?)\b"), 0.05, "article furniture"),
        ],
    },
    TypeRule {
        schema_type: SchemaType::LocalBusiness,
        og_types: &["business", "restaurant", "place"],
        content_type: Some(ContentType::Business),
        indicators: &[
            ind(
                Text(r"(?i)\b\d+\s+[A-Za-z0-9 .]{2,40}?\s(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|way)\b"),
                0.2,
                "street address",
            ),
            ind(MetaPresent("business:contact_data:street_address"), 0.2, "business address meta"),
            ind(Text(r"\(?\b\d{3}\)?[\s.\-]?\d{3}[\s.\-]\d{4}\b"), 0.15, "phone number"),
            ind(
                Text(r"(?i)\b(?:opening hours|hours of operation|open (?:daily|today|mon(?:day)?)|mon(?:day)?\s*[-–]\s*(?:fri|sat|sun))"),
                0.15,
                "opening hours",
            ),
            ind(Text(r"(?i)\b(?:visit us|get directions|directions|find us)\b"), 0.1, "visit or directions"),
            ind(Text(r"(?i)\b(?:reservations?|book a table|walk-ins?)\b"), 0.05, "reservations"),
        ],
    },
    TypeRule {
        schema_type: SchemaType::Event,
        og_types: &["event"],
        content_type: Some(ContentType::Event),
        indicators: &[
            ind(Text(r"(?i)\b(?:buy tickets|tickets?|register now|rsvp)\b"), 0.2, "tickets or registration"),
            ind(MetaPresent("event:start_time"), 0.2, "event start meta"),
            ind(
                Text(r"(?i)\b(?:conference|concert|festival|workshop|webinar|meetup|summit|exhibition)\b"),
                0.15,
                "event keyword",
            ),
            ind(
                Text(r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?\b"),
                0.1,
                "calendar date",
            ),
            ind(Text(r"(?i)\b\d{1,2}(?::\d{2})?\s?(?:am|pm)\b"), 0.1, "time of day"),
            ind(Text(r"(?i)\b(?:venue|location|doors open)\b"), 0.1, "venue"),
        ],
    },
    TypeRule {
        schema_type: SchemaType::Recipe,
        og_types: &["recipe"],
        content_type: Some(ContentType::Recipe),
        indicators: &[
            ind(Text(r"(?i)\bingredients?\b"), 0.25, "ingredients section"),
            ind(
                Text(r"(?i)\b\d+(?:/\d+)?\s*(?:cups?|tablespoons?|teaspoons?|tbsp|tsp|grams?|g|kg|ml|oz|ounces?|lbs?|pounds?)\b"),
                0.15,
                "measured quantities",
            ),
            ind(Text(r"(?i)\b(?:prep|cook|total)\s*time\b"), 0.15, "prep or cook time"),
            ind(Text(r"(?i)\b(?:servings?|serves|yield)\b"), 0.1, "yield"),
            ind(Title(r"(?i)\b(?:instructions|directions|method)\b"), 0.1, "instructions heading"),
            ind(Text(r"(?i)\b(?:preheat|bake|simmer|whisk|saute|sauté|stir in)\b"), 0.05, "cooking verbs"),
        ],
    },
    TypeRule {
        schema_type: SchemaType::VideoObject,
        og_types: &["video"],
        content_type: None,
        indicators: &[
            ind(MetaPresent("video"), 0.3, "og:video"),
            ind(MetaPresent("player"), 0.15, "twitter player card"),
            ind(Url(r"(?i)(?:youtube\.com|youtu\.be|vimeo\.com|/watch|/videos?/)"), 0.15, "video URL"),
            ind(Text(r"(?i)\b(?:watch|views|episode|video)\b"), 0.1, "video vocabulary"),
            ind(Text(r"\b\d{1,2}:\d{2}(?::\d{2})?\b"), 0.05, "clock duration"),
        ],
    },
];

struct CompiledIndicator {
    signal: Signal,
    pattern: Option<Regex>,
    weight: f64,
    label: &'static str,
}

struct CompiledRule {
    rule: &'static TypeRule,
    indicators: Vec<CompiledIndicator>,
}

static COMPILED: Lazy<Vec<CompiledRule>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|rule| CompiledRule {
            rule,
            indicators: rule
                .indicators
                .iter()
                .map(|i| {
                    let pattern = match i.signal {
                        Text(p) | Url(p) | Title(p) => {
                            Some(Regex::new(p).expect("valid detection pattern"))
                        }
                        MetaPresent(_) => None,
                    };
                    CompiledIndicator {
                        signal: i.signal,
                        pattern,
                        weight: i.weight,
                        label: i.label,
                    }
                })
                .collect(),
        })
        .collect()
});

#[derive(Debug, Clone)]
pub struct TypeDetector {
    hint_boost: f64,
    min_confidence: f64,
    fallback_confidence: f64,
}

impl Default for TypeDetector {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

impl TypeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            hint_boost: config.hint_boost,
            min_confidence: config.min_confidence,
            fallback_confidence: config.fallback_confidence,
        }
    }

    /// Ranked candidates, highest confidence first. Never empty: a `WebPage`
    /// fallback leads the list when nothing reaches the minimum confidence.
    pub fn detect(
        &self,
        page: &ParsedPage,
        analysis: &ContentAnalysis,
        hints: &[SchemaType],
    ) -> Vec<DetectionCandidate> {
        let headings = std::iter::once(page.title.as_str())
            .chain(page.headings.iter().map(|h| h.as_str()))
            .collect::<Vec<_>>()
            .join("\n");
        let existing: Vec<SchemaType> = page
            .existing_types()
            .iter()
            .filter_map(|t| SchemaType::parse_str(t))
            .collect();
        let microdata: Vec<SchemaType> = page
            .microdata_types
            .iter()
            .filter_map(|t| SchemaType::parse_str(t))
            .collect();
        let og_type = page
            .og("type")
            .map(|t| t.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let mut candidates: Vec<DetectionCandidate> = COMPILED
            .iter()
            .filter_map(|compiled| {
                let ctx = ScoreContext {
                    page,
                    analysis,
                    headings: &headings,
                    og_type: &og_type,
                    existing: &existing,
                    microdata: &microdata,
                };
                score_rule(compiled, &ctx)
            })
            .collect();

        for candidate in candidates.iter_mut() {
            if hints.contains(&candidate.schema_type) {
                candidate.confidence = round3((candidate.confidence * self.hint_boost).min(1.0));
                candidate.indicators.push("target type hint".to_string());
            }
        }

        // Stable sort keeps declaration order among equal scores.
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        let top = candidates.first().map(|c| c.confidence).unwrap_or(0.0);
        if top < self.min_confidence {
            candidates.insert(
                0,
                DetectionCandidate {
                    schema_type: SchemaType::WebPage,
                    confidence: self.fallback_confidence,
                    indicators: vec!["fallback: no specific type reached minimum confidence".to_string()],
                },
            );
        }

        debug!(
            "detected {} for {} ({} candidates)",
            candidates[0].schema_type,
            page.url,
            candidates.len()
        );
        candidates
    }
}

struct ScoreContext<'a> {
    page: &'a ParsedPage,
    analysis: &'a ContentAnalysis,
    headings: &'a str,
    og_type: &'a str,
    existing: &'a [SchemaType],
    microdata: &'a [SchemaType],
}

fn score_rule(compiled: &CompiledRule, ctx: &ScoreContext<'_>) -> Option<DetectionCandidate> {
    let rule = compiled.rule;
    let mut score = 0.0;
    let mut indicators = Vec::new();

    let og_head = ctx.og_type.split('.').next().unwrap_or("");
    if !og_head.is_empty() && rule.og_types.contains(&og_head) {
        score += OG_TYPE_WEIGHT;
        indicators.push(format!("og:type={}", ctx.og_type));
    }
    if ctx.existing.contains(&rule.schema_type) {
        score += EXISTING_JSON_LD_WEIGHT;
        indicators.push("existing JSON-LD @type".to_string());
    }
    if ctx.microdata.contains(&rule.schema_type) {
        score += MICRODATA_WEIGHT;
        indicators.push("microdata itemtype".to_string());
    }
    if rule.content_type == Some(ctx.analysis.content_type) {
        score += CONTENT_TYPE_WEIGHT;
        indicators.push(format!("content classified as {}", ctx.analysis.content_type.as_str()));
    }

    for indicator in &compiled.indicators {
        let hit = match (indicator.signal, &indicator.pattern) {
            (Text(_), Some(re)) => re.is_match(&ctx.page.body_text),
            (Url(_), Some(re)) => re.is_match(&ctx.page.url),
            (Title(_), Some(re)) => re.is_match(ctx.headings),
            (MetaPresent(key), _) => {
                ctx.page.meta(key).is_some() || ctx.page.og(key).is_some() || ctx.page.twitter(key).is_some()
            }
            _ => false,
        };
        if hit {
            score += indicator.weight;
            indicators.push(indicator.label.to_string());
        }
    }

    (score > 0.0).then(|| DetectionCandidate {
        schema_type: rule.schema_type,
        confidence: round3(score.min(1.0)),
        indicators,
    })
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
