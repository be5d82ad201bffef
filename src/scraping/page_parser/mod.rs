mod clean;
mod jsonld;
mod metadata;

use crate::types::ParsedPage;
use scraper::Html;
use tracing::debug;
use url::Url;

/// Upper bound on extracted body text, in characters. Keeps keyword and
/// entity passes cheap on very long pages.
pub const DEFAULT_MAX_BODY_CHARS: usize = 20_000;

/// Turns raw HTML into a [`ParsedPage`].
///
/// Every sub-extraction is best-effort: a missing or malformed element
/// produces an empty default, so parsing itself never fails.
#[derive(Debug, Clone)]
pub struct PageParser {
    max_body_chars: usize,
}

impl PageParser {
    pub fn new() -> Self {
        Self {
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }

    pub fn with_max_body_chars(mut self, max: usize) -> Self {
        self.max_body_chars = max.max(1);
        self
    }

    pub fn parse(&self, html: &str, base_url: &str) -> ParsedPage {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();
        if base.is_none() {
            debug!("base URL '{}' is not absolute; relative images kept as-is", base_url);
        }

        let (meta_tags, open_graph, twitter_card) = self.collect_meta(&document);
        let title = self.extract_title(&document, &open_graph);
        let description = self.extract_description(&meta_tags, &open_graph, &twitter_card);
        let body_text = self.extract_body_text(&document);
        let images = self.extract_images(&document, base.as_ref());
        let existing_schemas = self.extract_existing_schemas(&document);
        let microdata_types = self.extract_microdata_types(&document);
        let headings = self.extract_headings(&document);
        let list_items = self.extract_list_items(&document);
        let language = self.extract_language(&document);
        let canonical_url = self.extract_canonical(&document, base.as_ref());

        debug!(
            "parsed {}: title={:?}, {} chars body, {} images, {} existing schemas",
            base_url,
            title,
            body_text.len(),
            images.len(),
            existing_schemas.len()
        );

        ParsedPage {
            url: base_url.to_string(),
            title,
            description,
            body_text,
            images,
            meta_tags,
            open_graph,
            twitter_card,
            existing_schemas,
            microdata_types,
            headings,
            list_items,
            language,
            canonical_url,
        }
    }
}

impl Default for PageParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_product_snippet() {
        let html = r#"<title>Widget</title><meta property="og:type" content="product">Price: $19.99. Add to cart."#;
        let page = PageParser::new().parse(html, "https://shop.example.com/widget");

        assert_eq!(page.title, "Widget");
        assert_eq!(page.og("type"), Some("product"));
        assert!(page.body_text.contains("Price: $19.99. Add to cart."));
        assert!(page.images.is_empty());
    }

    #[test]
    fn title_falls_back_to_og_then_h1() {
        let parser = PageParser::new();

        let og = parser.parse(
            r#"<html><head><meta property="og:title" content="From OG"></head><body><h1>Heading</h1></body></html>"#,
            "https://a.test/",
        );
        assert_eq!(og.title, "From OG");

        let h1 = parser.parse("<html><body><h1> Heading </h1></body></html>", "https://a.test/");
        assert_eq!(h1.title, "Heading");

        let none = parser.parse("<html><body><p>text</p></body></html>", "https://a.test/");
        assert_eq!(none.title, "");
    }

    #[test]
    fn images_are_absolute_and_deduplicated() {
        let html = r#"<body>
            <img src="/img/a.png">
            <img src="//cdn.example.com/b.png">
            <img src="c.png">
            <img src="https://other.test/d.png">
            <img src="/img/a.png">
            <img src="data:image/gif;base64,R0lGOD" data-src="/lazy.png">
        </body>"#;
        let page = PageParser::new().parse(html, "https://example.com/shop/item");
        assert_eq!(
            page.images,
            vec![
                "https://example.com/img/a.png",
                "https://cdn.example.com/b.png",
                "https://example.com/shop/c.png",
                "https://other.test/d.png",
                "https://example.com/lazy.png",
            ]
        );
    }

    #[test]
    fn body_prefers_main_and_strips_scripts() {
        let html = r#"<html><body>
            <div class="nav">Home | Shop</div>
            <main>
              <p>Real   content
                 here.</p>
              <script>var x = "ignore me";</script>
              <style>.a { color: red }</style>
            </main>
        </body></html>"#;
        let page = PageParser::new().parse(html, "https://a.test/");
        assert_eq!(page.body_text, "Real content here.");
    }

    #[test]
    fn body_text_is_truncated() {
        let long = "word ".repeat(1000);
        let html = format!("<body><p>{}</p></body>", long);
        let page = PageParser::new()
            .with_max_body_chars(100)
            .parse(&html, "https://a.test/");
        assert_eq!(page.body_text.chars().count(), 100);
    }

    #[test]
    fn malformed_markup_degrades_to_defaults() {
        let page = PageParser::new().parse("<<<>>> <meta content=> <script type='application/ld+json'>{oops", "not a url");
        assert_eq!(page.title, "");
        assert!(page.existing_schemas.is_empty());
        assert!(page.open_graph.is_empty());
        assert_eq!(page.url, "not a url");
    }
}
