use crate::schema::validate::{ValidationOptions, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ───────────────────────────────────────────────────────────────────────────
// Schema types
// ───────────────────────────────────────────────────────────────────────────

/// schema.org types the engine knows how to detect and extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaType {
    Product,
    Article,
    LocalBusiness,
    Event,
    Recipe,
    VideoObject,
    WebPage,
}

impl SchemaType {
    /// Detectable types in declaration order. Ties in detection confidence
    /// are broken by this order.
    pub const DETECTABLE: [SchemaType; 6] = [
        SchemaType::Product,
        SchemaType::Article,
        SchemaType::LocalBusiness,
        SchemaType::Event,
        SchemaType::Recipe,
        SchemaType::VideoObject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Product => "Product",
            SchemaType::Article => "Article",
            SchemaType::LocalBusiness => "LocalBusiness",
            SchemaType::Event => "Event",
            SchemaType::Recipe => "Recipe",
            SchemaType::VideoObject => "VideoObject",
            SchemaType::WebPage => "WebPage",
        }
    }

    /// Case-insensitive parse that also folds common schema.org subtypes onto
    /// the type we extract for them.
    pub fn parse_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "product" | "productgroup" => Some(SchemaType::Product),
            "article" | "newsarticle" | "blogposting" | "techarticle" | "report" => {
                Some(SchemaType::Article)
            }
            "localbusiness" | "restaurant" | "store" | "foodestablishment" | "cafeorcoffeeshop" => {
                Some(SchemaType::LocalBusiness)
            }
            "event" | "musicevent" | "businessevent" | "educationevent" => Some(SchemaType::Event),
            "recipe" => Some(SchemaType::Recipe),
            "videoobject" | "video" => Some(SchemaType::VideoObject),
            "webpage" => Some(SchemaType::WebPage),
            _ => None,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Parsed page
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub text: String,
    /// `true` when the item came from an `<ol>`.
    pub ordered: bool,
}

/// Structural facts pulled out of one HTML document.
///
/// Built once by the page parser and only read afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPage {
    pub url: String,
    pub title: String,
    pub description: String,
    pub body_text: String,
    pub images: Vec<String>,
    /// `<meta name=…>` / non-OpenGraph `<meta property=…>` / `itemprop` pairs.
    pub meta_tags: BTreeMap<String, String>,
    /// OpenGraph tags keyed without the `og:` prefix.
    pub open_graph: BTreeMap<String, String>,
    /// Twitter card tags keyed without the `twitter:` prefix.
    pub twitter_card: BTreeMap<String, String>,
    /// Flattened JSON-LD objects already embedded in the page.
    pub existing_schemas: Vec<serde_json::Value>,
    /// Trailing segment of every `itemtype` URL (`https://schema.org/Product` → `Product`).
    pub microdata_types: Vec<String>,
    pub headings: Vec<String>,
    pub list_items: Vec<ListItem>,
    pub language: Option<String>,
    pub canonical_url: Option<String>,
}

impl ParsedPage {
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta_tags
            .get(key)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn og(&self, key: &str) -> Option<&str> {
        self.open_graph
            .get(key)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn twitter(&self, key: &str) -> Option<&str> {
        self.twitter_card
            .get(key)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// `@type` values of the embedded JSON-LD objects.
    pub fn existing_types(&self) -> Vec<String> {
        let mut out = Vec::new();
        for schema in &self.existing_schemas {
            match schema.get("@type") {
                Some(serde_json::Value::String(s)) => out.push(s.clone()),
                Some(serde_json::Value::Array(items)) => {
                    out.extend(items.iter().filter_map(|v| v.as_str().map(str::to_string)))
                }
                _ => {}
            }
        }
        out
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Detection / extraction
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    pub confidence: f64,
    pub indicators: Vec<String>,
}

/// A JSON-LD object tagged with the type it was extracted as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    pub data: serde_json::Value,
}

// ───────────────────────────────────────────────────────────────────────────
// Pipeline options / results
// ───────────────────────────────────────────────────────────────────────────

/// `(url, completed, total)`, fired once per finished URL in a batch.
pub type ProgressCallback = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Types the caller expects; their confidence is boosted during detection.
    pub target_types: Vec<SchemaType>,
    /// `None` defers to `generation.useCache` in the config.
    pub use_cache: Option<bool>,
    pub auto_fix: bool,
    pub validation: ValidationOptions,
    /// Passed through untouched for downstream optimizers.
    pub optimize_for: Vec<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            target_types: Vec::new(),
            use_cache: None,
            auto_fix: true,
            validation: ValidationOptions::default(),
            optimize_for: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct BatchOptions {
    /// `None` defers to `generation.concurrency` in the config.
    pub concurrency: Option<usize>,
    /// Overall deadline for the batch, measured from its start.
    pub timeout_ms: Option<u64>,
    pub progress: Option<ProgressCallback>,
    pub cancel: Option<CancellationToken>,
    pub generate: GenerateOptions,
}

impl fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOptions")
            .field("concurrency", &self.concurrency)
            .field("timeout_ms", &self.timeout_ms)
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel.is_some())
            .field("generate", &self.generate)
            .finish()
    }
}

/// Externally visible unit of work: exactly one per input URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub url: String,
    pub success: bool,
    pub detected_type: Option<SchemaType>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<DetectionCandidate>,
    pub schema: Option<serde_json::Value>,
    pub validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub from_cache: bool,
    #[serde(default)]
    pub duration_ms: u64,
}

impl GenerationResult {
    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            detected_type: None,
            confidence: 0.0,
            candidates: Vec::new(),
            schema: None,
            validation: None,
            keywords: Vec::new(),
            fingerprint: None,
            error: Some(error.into()),
            from_cache: false,
            duration_ms: 0,
        }
    }

    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::failure(url, "cancelled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_type_parse_folds_subtypes() {
        assert_eq!(SchemaType::parse_str("NewsArticle"), Some(SchemaType::Article));
        assert_eq!(SchemaType::parse_str(" restaurant "), Some(SchemaType::LocalBusiness));
        assert_eq!(SchemaType::parse_str("product"), Some(SchemaType::Product));
        assert_eq!(SchemaType::parse_str("Spaceship"), None);
    }

    #[test]
    fn existing_types_reads_strings_and_arrays() {
        let page = ParsedPage {
            existing_schemas: vec![
                serde_json::json!({"@type": "Product"}),
                serde_json::json!({"@type": ["Article", "NewsArticle"]}),
                serde_json::json!({"name": "untyped"}),
            ],
            ..Default::default()
        };
        assert_eq!(page.existing_types(), vec!["Product", "Article", "NewsArticle"]);
    }

    #[test]
    fn failure_result_serializes_camel_case() {
        let r = GenerationResult::cancelled("https://a.test/");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["error"], "cancelled");
        assert_eq!(v["fromCache"], false);
        assert!(v.get("detectedType").is_some());
    }
}
