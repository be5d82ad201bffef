use crate::schema::builder::SCHEMA_CONTEXT;
use crate::schema::extract::fields::{is_iso_date, is_iso_duration, normalize_date, parse_duration, parse_price};
use crate::types::SchemaType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const MAX_HEADLINE_CHARS: usize = 110;
const DATE_FIELDS: &[&str] = &["datePublished", "dateModified", "startDate", "endDate", "uploadDate"];
const DURATION_FIELDS: &[&str] = &["duration", "prepTime", "cookTime", "totalTime"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationOptions {
    /// Missing recommended fields become warnings instead of suggestions.
    pub strict: bool,
    pub check_guidelines: bool,
    pub suggest_fixes: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            strict: false,
            check_guidelines: true,
            suggest_fixes: true,
        }
    }
}

/// One auto-fix directive: set the dotted `field` path to `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub field: String,
    pub value: Value,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub fixes: Vec<Fix>,
    /// `100 − 20·errors − 10·warnings − 2·suggestions`, floored at 0.
    pub score: u32,
}

/// Required and recommended top-level (or dotted) fields per type.
pub fn field_requirements(schema_type: SchemaType) -> (&'static [&'static str], &'static [&'static str]) {
    match schema_type {
        SchemaType::Product => (
            &["name", "offers"],
            &["image", "description", "brand", "sku", "aggregateRating", "offers.priceCurrency", "offers.availability"],
        ),
        SchemaType::Article => (
            &["headline"],
            &["author", "datePublished", "dateModified", "image", "publisher"],
        ),
        SchemaType::LocalBusiness => (
            &["name", "address"],
            &["telephone", "openingHours", "image", "url", "priceRange"],
        ),
        SchemaType::Event => (
            &["name", "startDate", "location"],
            &["endDate", "description", "image", "offers", "organizer"],
        ),
        SchemaType::Recipe => (
            &["name", "recipeIngredient"],
            &["image", "recipeInstructions", "prepTime", "cookTime", "recipeYield", "author"],
        ),
        SchemaType::VideoObject => (
            &["name", "thumbnailUrl", "uploadDate"],
            &["description", "duration", "contentUrl", "embedUrl"],
        ),
        SchemaType::WebPage => (&["name"], &["description", "url"]),
    }
}

fn present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// Resolve a dotted path. Numeric segments index arrays; a name segment
/// applied to an array looks inside its first element.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(i) => items.get(i)?,
                Err(_) => items.first()?.get(segment)?,
            },
            _ => return None,
        };
    }
    Some(current)
}

struct Report<'o> {
    opts: &'o ValidationOptions,
    errors: Vec<String>,
    warnings: Vec<String>,
    suggestions: Vec<String>,
    fixes: Vec<Fix>,
}

impl Report<'_> {
    fn fix(&mut self, field: impl Into<String>, value: Value, reason: impl Into<String>) {
        if self.opts.suggest_fixes {
            self.fixes.push(Fix {
                field: field.into(),
                value,
                reason: reason.into(),
            });
        }
    }

    fn finish(self) -> ValidationResult {
        let penalty = 20 * self.errors.len() + 10 * self.warnings.len() + 2 * self.suggestions.len();
        ValidationResult {
            valid: self.errors.is_empty(),
            score: 100usize.saturating_sub(penalty) as u32,
            errors: self.errors,
            warnings: self.warnings,
            suggestions: self.suggestions,
            fixes: self.fixes,
        }
    }
}

/// Three-layer schema validation: structure, type requirements, then
/// optional publishing guidelines. Issues are data; validation never fails.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, schema: &Value, opts: &ValidationOptions) -> ValidationResult {
        let mut report = Report {
            opts,
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
            fixes: Vec::new(),
        };

        let Some(object) = schema.as_object() else {
            report.errors.push("schema must be a JSON object".to_string());
            return report.finish();
        };

        // Structural layer.
        match object.get("@context") {
            None => {
                report.errors.push("missing @context".to_string());
                report.fix("@context", json!(SCHEMA_CONTEXT), "JSON-LD requires a schema.org @context");
            }
            Some(Value::String(ctx)) if !ctx.contains("schema.org") => {
                report.warnings.push(format!("@context '{}' does not reference schema.org", ctx));
            }
            _ => {}
        }

        let type_name = match object.get("@type") {
            Some(Value::String(t)) if !t.trim().is_empty() => Some(t.clone()),
            Some(Value::Array(ts)) => ts.iter().find_map(|t| t.as_str().map(str::to_string)),
            _ => None,
        };
        let Some(type_name) = type_name else {
            report.errors.push("missing @type".to_string());
            return report.finish();
        };

        // Type layer.
        match SchemaType::parse_str(&type_name) {
            Some(schema_type) => {
                let (required, recommended) = field_requirements(schema_type);
                for field in required {
                    if !present(lookup(schema, field)) {
                        report
                            .errors
                            .push(format!("{} is missing required field '{}'", type_name, field));
                    }
                }
                for field in recommended {
                    if !present(lookup(schema, field)) {
                        let message = format!("{} should include recommended field '{}'", type_name, field);
                        if opts.strict {
                            report.warnings.push(message);
                        } else {
                            report.suggestions.push(message);
                        }
                    }
                }
            }
            None => report.warnings.push(format!(
                "@type '{}' is not a supported type; only structural checks were applied",
                type_name
            )),
        }

        if opts.check_guidelines {
            check_offers(schema, &mut report);
            check_dates(schema, &mut report);
            check_durations(schema, &mut report);
            check_entities(schema, &mut report);
            check_image(schema, &mut report);
            if let Some(headline) = schema.get("headline").and_then(Value::as_str) {
                if headline.chars().count() > MAX_HEADLINE_CHARS {
                    report.warnings.push(format!(
                        "headline is {} characters; keep it within {}",
                        headline.chars().count(),
                        MAX_HEADLINE_CHARS
                    ));
                }
            }
        }

        report.finish()
    }

    /// Deep copy of `schema` with every fix applied. The input is untouched.
    pub fn apply_fixes(&self, schema: &Value, fixes: &[Fix]) -> Value {
        apply_fixes(schema, fixes)
    }
}

pub fn apply_fixes(schema: &Value, fixes: &[Fix]) -> Value {
    let mut out = schema.clone();
    for fix in fixes {
        set_path(&mut out, &fix.field, fix.value.clone());
    }
    out
}

/// Set a dotted path, creating intermediate objects. Numeric segments
/// index existing arrays; out-of-range indices leave the value unchanged.
fn set_path(root: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        current = match current {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Default::default())),
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(v) => v,
                None => return,
            },
            _ => return,
        };
    }

    match current {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
        }
        Value::Array(items) => {
            if let Some(slot) = last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *slot = value;
            }
        }
        _ => {}
    }
}

/// `(path prefix, offer object)` for `offers` given as object or array.
fn offers(schema: &Value) -> Vec<(String, &serde_json::Map<String, Value>)> {
    match schema.get("offers") {
        Some(Value::Object(o)) => vec![("offers".to_string(), o)],
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_object().map(|o| (format!("offers.{}", i), o)))
            .collect(),
        _ => Vec::new(),
    }
}

fn check_offers(schema: &Value, report: &mut Report<'_>) {
    for (prefix, offer) in offers(schema) {
        match offer.get("price") {
            Some(Value::Number(_)) => {}
            Some(Value::String(raw)) => {
                if raw.trim().parse::<f64>().is_ok() {
                    // Already a plain decimal.
                } else if let Some(parsed) = parse_price(raw) {
                    report.warnings.push(format!(
                        "{}.price '{}' should be a plain number without symbols or separators",
                        prefix, raw
                    ));
                    report.fix(
                        format!("{}.price", prefix),
                        json!(parsed.amount),
                        "strip currency symbols and thousands separators",
                    );
                    if !present(offer.get("priceCurrency")) {
                        if let Some(currency) = parsed.currency {
                            report.fix(
                                format!("{}.priceCurrency", prefix),
                                json!(currency),
                                "currency inferred from the price symbol",
                            );
                        }
                    }
                } else {
                    report
                        .warnings
                        .push(format!("{}.price '{}' is not a number", prefix, raw));
                }
            }
            Some(_) => report.warnings.push(format!("{}.price must be a number or numeric string", prefix)),
            None => report.warnings.push(format!("{} has no price", prefix)),
        }

        if let Some(currency) = offer.get("priceCurrency").and_then(Value::as_str) {
            let upper = currency.trim().to_ascii_uppercase();
            if upper.len() != 3 || !upper.chars().all(|c| c.is_ascii_alphabetic()) {
                report
                    .warnings
                    .push(format!("{}.priceCurrency '{}' is not an ISO 4217 code", prefix, currency));
            } else if upper != currency {
                report.warnings.push(format!("{}.priceCurrency should be upper case", prefix));
                report.fix(format!("{}.priceCurrency", prefix), json!(upper), "ISO 4217 codes are upper case");
            }
        }

        if let Some(availability) = offer.get("availability").and_then(Value::as_str) {
            if !availability.starts_with("https://schema.org/") && !availability.starts_with("http://schema.org/") {
                report.warnings.push(format!(
                    "{}.availability '{}' should be a schema.org ItemAvailability URL",
                    prefix, availability
                ));
                if let Some(url) = availability_url(availability) {
                    report.fix(format!("{}.availability", prefix), json!(url), "use the schema.org enumeration URL");
                }
            }
        }
    }
}

fn availability_url(value: &str) -> Option<&'static str> {
    let compact: String = value.to_ascii_lowercase().chars().filter(|c| c.is_alphanumeric()).collect();
    match compact.as_str() {
        "instock" | "available" => Some("https://schema.org/InStock"),
        "outofstock" | "soldout" | "unavailable" => Some("https://schema.org/OutOfStock"),
        "preorder" => Some("https://schema.org/PreOrder"),
        "discontinued" => Some("https://schema.org/Discontinued"),
        _ => None,
    }
}

fn check_dates(schema: &Value, report: &mut Report<'_>) {
    for field in DATE_FIELDS {
        let Some(raw) = schema.get(*field).and_then(Value::as_str) else {
            continue;
        };
        if is_iso_date(raw) {
            continue;
        }
        report
            .warnings
            .push(format!("{} '{}' is not an ISO 8601 date", field, raw));
        let normalized = normalize_date(raw);
        if is_iso_date(&normalized) {
            report.fix(*field, json!(normalized), "normalize to ISO 8601");
        }
    }
}

fn check_durations(schema: &Value, report: &mut Report<'_>) {
    for field in DURATION_FIELDS {
        let Some(raw) = schema.get(*field).and_then(Value::as_str) else {
            continue;
        };
        if is_iso_duration(raw) {
            continue;
        }
        report
            .warnings
            .push(format!("{} '{}' is not an ISO 8601 duration", field, raw));
        if let Some(iso) = parse_duration(raw) {
            report.fix(*field, json!(iso), "normalize to an ISO 8601 duration");
        }
    }
}

/// `publisher` must be an Organization object; `author` should be a
/// Person or Organization object.
fn check_entities(schema: &Value, report: &mut Report<'_>) {
    match schema.get("publisher") {
        Some(Value::String(name)) => {
            report
                .warnings
                .push("publisher should be an Organization object, not a string".to_string());
            report.fix(
                "publisher",
                json!({"@type": "Organization", "name": name}),
                "wrap the publisher name in an Organization",
            );
        }
        Some(Value::Object(o)) if !o.contains_key("@type") => {
            report.warnings.push("publisher is missing @type".to_string());
            report.fix("publisher.@type", json!("Organization"), "publisher must be an Organization");
        }
        Some(Value::Object(o)) if !present(o.get("name")) => {
            report.warnings.push("publisher has no name".to_string());
        }
        _ => {}
    }

    if let Some(Value::String(name)) = schema.get("author") {
        report
            .suggestions
            .push("author should be a Person or Organization object".to_string());
        report.fix(
            "author",
            json!({"@type": "Person", "name": name}),
            "wrap the author name in a Person",
        );
    }
}

fn check_image(schema: &Value, report: &mut Report<'_>) {
    for field in ["image", "thumbnailUrl"] {
        let image = match schema.get(field) {
            Some(Value::String(s)) => Some((field.to_string(), s.as_str())),
            Some(Value::Array(items)) => items
                .first()
                .and_then(Value::as_str)
                .map(|s| (format!("{}.0", field), s)),
            _ => None,
        };
        let Some((path, src)) = image else {
            continue;
        };
        if src.starts_with("http://") || src.starts_with("https://") {
            continue;
        }
        report
            .warnings
            .push(format!("{} '{}' should be an absolute URL", field, src));

        let base = ["url", "mainEntityOfPage", "offers.url"]
            .iter()
            .filter_map(|p| lookup(schema, p).and_then(Value::as_str))
            .find_map(|u| url::Url::parse(u).ok());
        if let Some(resolved) = base.and_then(|b| b.join(src).ok()) {
            report.fix(path, json!(resolved.to_string()), "resolve against the page URL");
        }
    }
}
