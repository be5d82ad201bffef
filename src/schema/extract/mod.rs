//! Per-type field extraction over a [`ParsedPage`].
//!
//! Extraction only reads the page. Fields the page does not carry are left
//! out of the record rather than filled with placeholders.

pub mod fields;

use crate::schema::builder::SchemaBuilder;
use crate::types::{ExtractedSchema, ListItem, ParsedPage, SchemaType};
use fields::*;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

static RE_BYLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:by|written by|author:)\s+([A-Z][a-zA-Z'\-]+(?:\s+[A-Z][a-zA-Z'\-]+){1,2})")
        .expect("valid byline regex")
});
static RE_SKU: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bsku\s*[:#]?\s*([A-Z0-9][A-Z0-9\-]{2,})").expect("valid sku regex")
});
static RE_BRAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:brand)\s*:\s*([A-Z][\w&'\-]*(?:\s+[A-Z][\w&'\-]*){0,2})").expect("valid brand regex")
});
static RE_YIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:serves|servings?|yield|makes)\s*:?\s*(\d+(?:\s*(?:-|to)\s*\d+)?)").expect("valid yield regex")
});
static RE_CALORIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{2,4})\s*(?:kcal|calories)\b").expect("valid calories regex"));
static RE_ORGANIZER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:organized by|hosted by|presented by)\s+([A-Z][\w&'\-]*(?:\s+[A-Z][\w&'\-]*){0,4})")
        .expect("valid organizer regex")
});
static RE_PRICE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bprice range\s*:?\s*(\${1,4}|[$€£]?\d+\s*(?:-|–|to)\s*[$€£]?\d+)").expect("valid price range regex")
});
static RE_YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([A-Za-z0-9_\-]{6,})")
        .expect("valid youtube regex")
});

/// Text searched by the pattern extractors: description first, then body.
fn haystack(page: &ParsedPage) -> String {
    if page.description.is_empty() {
        page.body_text.clone()
    } else {
        format!("{}\n{}", page.description, page.body_text)
    }
}

fn first_meta<'a>(page: &'a ParsedPage, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| {
        page.meta(k)
            .or_else(|| page.og(k))
            .or_else(|| page.twitter(k))
    })
}

fn page_name(page: &ParsedPage) -> Option<String> {
    page.og("title")
        .map(str::to_string)
        .or_else(|| (!page.title.is_empty()).then(|| page.title.clone()))
        .or_else(|| page.headings.first().cloned())
}

fn page_image(page: &ParsedPage) -> Option<String> {
    page.og("image")
        .or_else(|| page.twitter("image"))
        .map(str::to_string)
        .or_else(|| page.images.first().cloned())
}

fn page_url(page: &ParsedPage) -> Option<String> {
    page.canonical_url
        .clone()
        .or_else(|| page.og("url").map(str::to_string))
        .or_else(|| (!page.url.is_empty()).then(|| page.url.clone()))
}

fn description(page: &ParsedPage) -> Option<String> {
    (!page.description.is_empty()).then(|| page.description.clone())
}

/// Named entity object (`Person`, `Organization`, `Brand`) from a bare name.
fn named(kind: &str, name: Option<String>) -> SchemaBuilder {
    SchemaBuilder::nested(kind).set_opt("name", name)
}

fn byline(text: &str) -> Option<String> {
    RE_BYLINE.captures(text).map(|c| c[1].trim().to_string())
}

/// Type-specific JSON-LD extraction.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, schema_type: SchemaType, page: &ParsedPage) -> ExtractedSchema {
        let text = haystack(page);
        let data = match schema_type {
            SchemaType::Product => self.product(page, &text),
            SchemaType::Article => self.article(page, &text),
            SchemaType::LocalBusiness => self.local_business(page, &text),
            SchemaType::Event => self.event(page, &text),
            SchemaType::Recipe => self.recipe(page, &text),
            SchemaType::VideoObject => self.video(page, &text),
            SchemaType::WebPage => self.web_page(page),
        };
        let data = merge_existing(data, schema_type, page);

        debug!(
            "extracted {} with {} fields from {}",
            schema_type,
            data.as_object().map(|o| o.len()).unwrap_or(0),
            page.url
        );
        ExtractedSchema { schema_type, data }
    }

    fn offer(&self, page: &ParsedPage, text: &str) -> SchemaBuilder {
        let meta_amount = first_meta(page, &["product:price:amount", "price"]);
        let meta_currency = first_meta(page, &["product:price:currency", "pricecurrency"]);

        let (price, currency) = match meta_amount.and_then(parse_price) {
            Some(p) => (
                Some(p.amount),
                meta_currency.map(|c| c.to_ascii_uppercase()).or(p.currency),
            ),
            None => match find_price(text) {
                Some(p) => (Some(p.amount), p.currency),
                None => (None, None),
            },
        };

        SchemaBuilder::nested("Offer")
            .set_opt("price", price)
            .set_opt("priceCurrency", currency)
            .set_opt(
                "availability",
                first_meta(page, &["product:availability", "availability"])
                    .and_then(infer_availability_from_meta)
                    .or_else(|| infer_availability(text)),
            )
            .set_opt("url", page_url(page))
    }

    fn product(&self, page: &ParsedPage, text: &str) -> Value {
        let brand = first_meta(page, &["product:brand", "brand"])
            .map(str::to_string)
            .or_else(|| RE_BRAND.captures(text).map(|c| c[1].trim().to_string()));
        let sku = first_meta(page, &["product:retailer_item_id", "sku"])
            .map(str::to_string)
            .or_else(|| RE_SKU.captures(text).map(|c| c[1].to_string()));

        let offer = self.offer(page, text);
        let has_price = offer.has("price");
        let mut builder = SchemaBuilder::new("Product")
            .set_opt("name", page_name(page))
            .set_opt("description", description(page))
            .set_opt("image", page_image(page))
            .set_opt("sku", sku)
            .set_object("brand", named("Brand", brand));
        if has_price {
            builder = builder.set_object("offers", offer);
        }
        builder.set_opt("aggregateRating", find_rating(text)).build()
    }

    fn article(&self, page: &ParsedPage, text: &str) -> Value {
        let headline = page_name(page);
        let author = first_meta(page, &["author", "article:author"])
            .filter(|a| !a.starts_with("http"))
            .map(str::to_string)
            .or_else(|| byline(text));
        let published = first_meta(page, &["article:published_time", "datepublished", "date", "pubdate"])
            .map(normalize_date)
            .or_else(|| find_labeled_date(text, &["published", "posted"]));
        let modified = first_meta(page, &["article:modified_time", "datemodified"])
            .map(normalize_date)
            .or_else(|| page.og("updated_time").map(normalize_date))
            .or_else(|| find_labeled_date(text, &["updated", "modified"]));
        let publisher = page.og("site_name").map(str::to_string);
        let word_count = page.body_text.split_whitespace().count();

        SchemaBuilder::new("Article")
            .set_opt("headline", headline)
            .set_opt("description", description(page))
            .set_opt("image", page_image(page))
            .set_object("author", named("Person", author))
            .set_opt("datePublished", published)
            .set_opt("dateModified", modified)
            .set_object("publisher", named("Organization", publisher))
            .set_opt("mainEntityOfPage", page_url(page))
            .set_opt("articleSection", first_meta(page, &["article:section"]))
            .set_opt("keywords", page.meta("keywords"))
            .set_opt("inLanguage", page.language.clone())
            .set_opt("wordCount", (word_count > 0).then_some(word_count))
            .build()
    }

    fn local_business(&self, page: &ParsedPage, text: &str) -> Value {
        let address = meta_address(page).or_else(|| find_address(text));
        let telephone = first_meta(page, &["business:contact_data:phone_number", "telephone"])
            .map(str::to_string)
            .or_else(|| find_phone(text));
        let email = first_meta(page, &["business:contact_data:email", "email"])
            .map(str::to_string)
            .or_else(|| find_email(text));
        let hours = parse_opening_hours(text);
        let price_range = RE_PRICE_RANGE.captures(text).map(|c| c[1].to_string());

        SchemaBuilder::new("LocalBusiness")
            .set_opt("name", first_meta(page, &["site_name"]).map(str::to_string).or_else(|| page_name(page)))
            .set_opt("description", description(page))
            .set_opt("image", page_image(page))
            .set_opt("url", page_url(page))
            .set_opt("address", address)
            .set_opt("telephone", telephone)
            .set_opt("email", email)
            .set_list("openingHours", hours)
            .set_opt("priceRange", price_range)
            .build()
    }

    fn event(&self, page: &ParsedPage, text: &str) -> Value {
        let dates = find_dates(text);
        let start = first_meta(page, &["event:start_time", "startdate"])
            .map(normalize_date)
            .or_else(|| find_labeled_date(text, &["starts", "start date", "date"]))
            .or_else(|| dates.first().cloned());
        let end = first_meta(page, &["event:end_time", "enddate"])
            .map(normalize_date)
            .or_else(|| find_labeled_date(text, &["ends", "end date", "until"]));

        let venue = find_labeled_text(text, "venue").or_else(|| find_labeled_text(text, "location"));
        let address = find_address(text);
        let location = SchemaBuilder::nested("Place")
            .set_opt("name", venue)
            .set_opt("address", address);

        let offer = self.offer(page, text);
        let has_price = offer.has("price");
        let organizer = RE_ORGANIZER.captures(text).map(|c| c[1].trim().to_string());

        let mut builder = SchemaBuilder::new("Event")
            .set_opt("name", page_name(page))
            .set_opt("description", description(page))
            .set_opt("image", page_image(page))
            .set_opt("url", page_url(page))
            .set_opt("startDate", start)
            .set_opt("endDate", end)
            .set_object("location", location)
            .set_object("organizer", named("Organization", organizer));
        if has_price {
            builder = builder.set_object("offers", offer);
        }
        builder.build()
    }

    fn recipe(&self, page: &ParsedPage, text: &str) -> Value {
        let ingredients: Vec<String> = page
            .list_items
            .iter()
            .filter(|i| !i.ordered && looks_like_ingredient(&i.text))
            .map(|i| i.text.clone())
            .collect();
        let steps: Vec<Value> = page
            .list_items
            .iter()
            .filter(|i| i.ordered && !looks_like_short_link(i))
            .map(|i| json!({"@type": "HowToStep", "text": i.text}))
            .collect();
        let recipe_yield = RE_YIELD.captures(text).map(|c| c[1].to_string());
        let nutrition = SchemaBuilder::nested("NutritionInformation").set_opt(
            "calories",
            RE_CALORIES.captures(text).map(|c| format!("{} calories", &c[1])),
        );

        SchemaBuilder::new("Recipe")
            .set_opt("name", page_name(page))
            .set_opt("description", description(page))
            .set_opt("image", page_image(page))
            .set_object("author", named("Person", first_meta(page, &["author"]).map(str::to_string).or_else(|| byline(text))))
            .set_opt("datePublished", first_meta(page, &["article:published_time", "datepublished"]).map(normalize_date))
            .set_opt("prepTime", find_labeled_duration(text, "prep time"))
            .set_opt("cookTime", find_labeled_duration(text, "cook time"))
            .set_opt("totalTime", find_labeled_duration(text, "total time"))
            .set_opt("recipeYield", recipe_yield)
            .set_opt("recipeCuisine", find_labeled_text(text, "cuisine"))
            .set_opt("recipeCategory", find_labeled_text(text, "course"))
            .set_list("recipeIngredient", ingredients)
            .set_list("recipeInstructions", steps)
            .set_object("nutrition", nutrition)
            .set_opt("aggregateRating", find_rating(text))
            .build()
    }

    fn video(&self, page: &ParsedPage, text: &str) -> Value {
        let content_url = first_meta(page, &["video:secure_url", "video:url", "video"])
            .filter(|u| !is_player_url(u))
            .map(str::to_string);
        let embed_url = page
            .twitter("player")
            .map(str::to_string)
            .or_else(|| first_meta(page, &["video:url", "video"]).filter(|u| is_player_url(u)).map(str::to_string))
            .or_else(|| {
                RE_YOUTUBE_ID
                    .captures(&page.url)
                    .map(|c| format!("https://www.youtube.com/embed/{}", &c[1]))
            });
        let upload_date = first_meta(page, &["video:release_date", "uploaddate", "datepublished"])
            .map(normalize_date)
            .or_else(|| find_labeled_date(text, &["uploaded", "published", "premiered"]));
        let duration = first_meta(page, &["video:duration"])
            .and_then(seconds_to_duration)
            .or_else(|| first_meta(page, &["duration"]).and_then(parse_duration))
            .or_else(|| find_labeled_duration(text, "duration"));

        SchemaBuilder::new("VideoObject")
            .set_opt("name", page_name(page))
            .set_opt("description", description(page))
            .set_opt("thumbnailUrl", page_image(page))
            .set_opt("uploadDate", upload_date)
            .set_opt("duration", duration)
            .set_opt("contentUrl", content_url)
            .set_opt("embedUrl", embed_url)
            .set_opt("url", page_url(page))
            .build()
    }

    fn web_page(&self, page: &ParsedPage) -> Value {
        SchemaBuilder::new("WebPage")
            .set_opt("name", page_name(page))
            .set_opt("description", description(page))
            .set_opt("url", page_url(page))
            .set_opt("image", page_image(page))
            .set_opt("inLanguage", page.language.clone())
            .set_opt("keywords", page.meta("keywords"))
            .build()
    }
}

fn infer_availability_from_meta(value: &str) -> Option<&'static str> {
    let compact: String = value.to_ascii_lowercase().chars().filter(|c| c.is_alphanumeric()).collect();
    match compact.as_str() {
        s if s.ends_with("instock") => Some("https://schema.org/InStock"),
        s if s.ends_with("outofstock") || s.ends_with("soldout") => Some("https://schema.org/OutOfStock"),
        s if s.ends_with("preorder") => Some("https://schema.org/PreOrder"),
        _ => infer_availability(value),
    }
}

fn is_player_url(url: &str) -> bool {
    url.contains("/embed/") || url.contains("player.")
}

/// Navigation lists are ordered lists too; steps carry real sentences.
fn looks_like_short_link(item: &ListItem) -> bool {
    item.text.split_whitespace().count() < 3
}

fn meta_address(page: &ParsedPage) -> Option<Value> {
    let street = page.meta("business:contact_data:street_address")?;
    let value = SchemaBuilder::nested("PostalAddress")
        .set("streetAddress", street)
        .set_opt("addressLocality", page.meta("business:contact_data:locality"))
        .set_opt("addressRegion", page.meta("business:contact_data:region"))
        .set_opt("postalCode", page.meta("business:contact_data:postal_code"))
        .set_opt("addressCountry", page.meta("business:contact_data:country_name"))
        .build();
    Some(value)
}

/// Fill fields the page's own JSON-LD declares for the same type but the
/// pattern extractors missed. Extracted values win on conflict.
fn merge_existing(mut data: Value, schema_type: SchemaType, page: &ParsedPage) -> Value {
    let existing = page.existing_schemas.iter().find(|s| match s.get("@type") {
        Some(Value::String(t)) => SchemaType::parse_str(t) == Some(schema_type),
        Some(Value::Array(ts)) => ts
            .iter()
            .filter_map(Value::as_str)
            .any(|t| SchemaType::parse_str(t) == Some(schema_type)),
        _ => false,
    });
    let Some(Value::Object(existing)) = existing else {
        return data;
    };
    if let Some(target) = data.as_object_mut() {
        for (key, value) in existing {
            if !key.starts_with('@') && !target.contains_key(key) {
                target.insert(key.clone(), value.clone());
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::PageParser;

    fn extract(schema_type: SchemaType, html: &str, url: &str) -> Value {
        let page = PageParser::new().parse(html, url);
        FieldExtractor::new().extract(schema_type, &page).data
    }

    #[test]
    fn product_price_from_body_text() {
        let data = extract(
            SchemaType::Product,
            r#"<title>Widget</title><meta property="og:type" content="product">Price: $19.99. Add to cart."#,
            "https://shop.test/widget",
        );
        assert_eq!(data["@type"], "Product");
        assert_eq!(data["name"], "Widget");
        assert_eq!(data["offers"]["price"], "19.99");
        assert_eq!(data["offers"]["priceCurrency"], "USD");
        assert!(data.get("brand").is_none());
        assert!(data.get("aggregateRating").is_none());
    }

    #[test]
    fn product_meta_wins_and_availability_is_read() {
        let data = extract(
            SchemaType::Product,
            r#"<head><meta property="product:price:amount" content="1,049.00">
               <meta property="product:price:currency" content="eur">
               <meta property="og:image" content="/img/a.jpg"></head>
               <body><p>Was $1,199. Brand: Acme. SKU: AC-1000. Out of stock. 4.2 out of 5 (87 reviews)</p></body>"#,
            "https://shop.test/p/a",
        );
        assert_eq!(data["offers"]["price"], "1049.00");
        assert_eq!(data["offers"]["priceCurrency"], "EUR");
        assert_eq!(data["offers"]["availability"], "https://schema.org/OutOfStock");
        assert_eq!(data["brand"]["name"], "Acme");
        assert_eq!(data["sku"], "AC-1000");
        assert_eq!(data["image"], "/img/a.jpg");
        assert_eq!(data["aggregateRating"]["reviewCount"], "87");
    }

    #[test]
    fn article_fields() {
        let data = extract(
            SchemaType::Article,
            r#"<head><title>Big News</title>
               <meta property="og:site_name" content="Daily Planet">
               <meta property="article:published_time" content="2024-05-01T08:00:00Z"></head>
               <body><article><h1>Big News</h1><p>By Lois Lane. Updated: May 2, 2024. Something happened.</p></article></body>"#,
            "https://planet.test/news/big",
        );
        assert_eq!(data["headline"], "Big News");
        assert_eq!(data["author"]["name"], "Lois Lane");
        assert_eq!(data["datePublished"], "2024-05-01T08:00:00Z");
        assert_eq!(data["dateModified"], "2024-05-02");
        assert_eq!(data["publisher"]["@type"], "Organization");
        assert_eq!(data["publisher"]["name"], "Daily Planet");
    }

    #[test]
    fn local_business_contact_details() {
        let data = extract(
            SchemaType::LocalBusiness,
            r#"<title>Joe's Diner</title><p>Visit us at 42 Elm Street, Springfield, IL 62704.
               Call (217) 555-0100. Open Monday - Friday: 7am - 3pm. Price range: $$</p>"#,
            "https://joes.test/",
        );
        assert_eq!(data["name"], "Joe's Diner");
        assert_eq!(data["address"]["postalCode"], "62704");
        assert_eq!(data["telephone"], "(217) 555-0100");
        assert_eq!(data["openingHours"][0], "Mo-Fr 07:00-15:00");
        assert_eq!(data["priceRange"], "$$");
    }

    #[test]
    fn event_fields() {
        let data = extract(
            SchemaType::Event,
            r#"<title>RustConf</title><p>Date: September 10, 2024. Venue: Convention Center.
               Tickets from $99. Hosted by Rust Foundation</p>"#,
            "https://conf.test/",
        );
        assert_eq!(data["startDate"], "2024-09-10");
        assert_eq!(data["location"]["@type"], "Place");
        assert_eq!(data["location"]["name"], "Convention Center");
        assert_eq!(data["offers"]["price"], "99");
        assert_eq!(data["organizer"]["name"], "Rust Foundation");
    }

    #[test]
    fn recipe_lists_and_times() {
        let data = extract(
            SchemaType::Recipe,
            r#"<title>Pancakes</title><main>
               <p>Prep time: 10 minutes. Cook time: 15 minutes. Serves 4.</p>
               <ul><li>2 cups flour</li><li>1 tbsp sugar</li><li>Pinterest</li></ul>
               <ol><li>Whisk the dry ingredients together.</li><li>Cook on a hot griddle until golden.</li></ol>
               </main>"#,
            "https://food.test/pancakes",
        );
        assert_eq!(data["recipeIngredient"], json!(["2 cups flour", "1 tbsp sugar"]));
        assert_eq!(data["recipeInstructions"][0]["@type"], "HowToStep");
        assert_eq!(data["recipeInstructions"].as_array().unwrap().len(), 2);
        assert_eq!(data["prepTime"], "PT10M");
        assert_eq!(data["cookTime"], "PT15M");
        assert_eq!(data["recipeYield"], "4");
        assert!(data.get("nutrition").is_none());
    }

    #[test]
    fn video_fields() {
        let data = extract(
            SchemaType::VideoObject,
            r#"<head><title>Launch</title>
               <meta property="og:image" content="https://cdn.test/thumb.jpg">
               <meta property="og:video:duration" content="125">
               <meta property="video:release_date" content="2023-11-20"></head><body>Watch now</body>"#,
            "https://www.youtube.com/watch?v=abc123XYZ",
        );
        assert_eq!(data["thumbnailUrl"], "https://cdn.test/thumb.jpg");
        assert_eq!(data["duration"], "PT2M5S");
        assert_eq!(data["uploadDate"], "2023-11-20");
        assert_eq!(data["embedUrl"], "https://www.youtube.com/embed/abc123XYZ");
    }

    #[test]
    fn never_fabricates() {
        let data = extract(SchemaType::Product, "<p>nothing useful</p>", "");
        assert_eq!(
            data,
            json!({"@context": "https://schema.org", "@type": "Product"})
        );
    }

    #[test]
    fn existing_json_ld_fills_gaps() {
        let data = extract(
            SchemaType::Product,
            r#"<title>Kettle</title><script type="application/ld+json">
               {"@type":"Product","name":"Other","gtin13":"0123456789012"}</script>"#,
            "https://shop.test/kettle",
        );
        assert_eq!(data["name"], "Kettle");
        assert_eq!(data["gtin13"], "0123456789012");
    }
}
