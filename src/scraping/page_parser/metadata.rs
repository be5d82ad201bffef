use super::PageParser;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

type MetaMaps = (
    BTreeMap<String, String>,
    BTreeMap<String, String>,
    BTreeMap<String, String>,
);

impl PageParser {
    /// Split every `<meta … content=…>` into plain, OpenGraph and Twitter maps.
    /// The first occurrence of a key wins.
    pub(super) fn collect_meta(&self, document: &Html) -> MetaMaps {
        let mut meta = BTreeMap::new();
        let mut og = BTreeMap::new();
        let mut twitter = BTreeMap::new();

        let Ok(selector) = Selector::parse("meta[content]") else {
            return (meta, og, twitter);
        };

        for element in document.select(&selector) {
            let attrs = element.value();
            let Some(content) = attrs.attr("content") else {
                continue;
            };
            let content = content.trim().to_string();
            let key = attrs
                .attr("property")
                .or_else(|| attrs.attr("name"))
                .or_else(|| attrs.attr("itemprop"))
                .map(|k| k.trim().to_ascii_lowercase());
            let Some(key) = key.filter(|k| !k.is_empty()) else {
                continue;
            };

            if let Some(rest) = key.strip_prefix("og:") {
                og.entry(rest.to_string()).or_insert(content);
            } else if let Some(rest) = key.strip_prefix("twitter:") {
                twitter.entry(rest.to_string()).or_insert(content);
            } else {
                meta.entry(key).or_insert(content);
            }
        }

        (meta, og, twitter)
    }

    /// `<title>` → `og:title` → first `<h1>` → empty.
    pub(super) fn extract_title(&self, document: &Html, og: &BTreeMap<String, String>) -> String {
        if let Ok(title_selector) = Selector::parse("title") {
            if let Some(title_element) = document.select(&title_selector).next() {
                let title = title_element.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    return title;
                }
            }
        }

        if let Some(og_title) = og.get("title").filter(|t| !t.is_empty()) {
            return og_title.clone();
        }

        if let Ok(h1_selector) = Selector::parse("h1") {
            if let Some(h1_element) = document.select(&h1_selector).next() {
                let h1_text = self.clean_text(&h1_element.text().collect::<String>());
                if !h1_text.is_empty() {
                    return h1_text;
                }
            }
        }

        String::new()
    }

    /// Meta description → `og:description` → `twitter:description` → empty.
    pub(super) fn extract_description(
        &self,
        meta: &BTreeMap<String, String>,
        og: &BTreeMap<String, String>,
        twitter: &BTreeMap<String, String>,
    ) -> String {
        [meta.get("description"), og.get("description"), twitter.get("description")]
            .into_iter()
            .flatten()
            .find(|d| !d.is_empty())
            .cloned()
            .unwrap_or_default()
    }

    /// Image URLs in document order, resolved against the page URL and
    /// deduplicated. Inline `data:` placeholders fall back to `data-src`.
    pub(super) fn extract_images(&self, document: &Html, base: Option<&Url>) -> Vec<String> {
        let mut images = Vec::new();
        let mut seen = HashSet::new();

        let Ok(selector) = Selector::parse("img") else {
            return images;
        };

        for element in document.select(&selector) {
            let attrs = element.value();
            let src = [attrs.attr("src"), attrs.attr("data-src")]
                .into_iter()
                .flatten()
                .map(str::trim)
                .find(|s| !s.is_empty() && !s.starts_with("data:"));
            let Some(src) = src else {
                continue;
            };

            let absolute = resolve_url(src, base);
            if seen.insert(absolute.clone()) {
                images.push(absolute);
            }
        }

        images
    }

    pub(super) fn extract_microdata_types(&self, document: &Html) -> Vec<String> {
        let mut out = Vec::new();
        let Ok(selector) = Selector::parse("[itemtype]") else {
            return out;
        };
        for element in document.select(&selector) {
            let Some(itemtype) = element.value().attr("itemtype") else {
                continue;
            };
            for t in itemtype.split_whitespace() {
                let tail = t.trim_end_matches('/').rsplit(|c: char| c == '/' || c == '#').next().unwrap_or("");
                if !tail.is_empty() && !out.iter().any(|x| x == tail) {
                    out.push(tail.to_string());
                }
            }
        }
        out
    }

    /// Headings h1–h6 in document order.
    pub(super) fn extract_headings(&self, document: &Html) -> Vec<String> {
        let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .map(|h| self.clean_text(&h.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub(super) fn extract_language(&self, document: &Html) -> Option<String> {
        let selector = Selector::parse("html").ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("lang"))
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
    }

    pub(super) fn extract_canonical(&self, document: &Html, base: Option<&Url>) -> Option<String> {
        let selector = Selector::parse("link[rel=\"canonical\"]").ok()?;
        let href = document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("href"))?
            .trim();
        if href.is_empty() {
            return None;
        }
        Some(resolve_url(href, base))
    }
}

/// Resolve protocol-relative, absolute-path and relative references against
/// the page URL. Without a usable base, protocol-relative references get
/// `https:` and everything else is returned untouched.
pub(crate) fn resolve_url(src: &str, base: Option<&Url>) -> String {
    match base {
        Some(base) => base
            .join(src)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| src.to_string()),
        None if src.starts_with("//") => format!("https:{}", src),
        None => src.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_tags_are_split_by_prefix() {
        let html = r#"<head>
            <meta name="description" content=" A fine widget ">
            <meta property="og:type" content="product">
            <meta property="og:image" content="/first.png">
            <meta property="og:image" content="/second.png">
            <meta name="twitter:card" content="summary">
            <meta property="product:price:amount" content="19.99">
            <meta name="empty">
        </head>"#;
        let document = Html::parse_document(html);
        let (meta, og, twitter) = PageParser::new().collect_meta(&document);

        assert_eq!(meta.get("description").map(String::as_str), Some("A fine widget"));
        assert_eq!(meta.get("product:price:amount").map(String::as_str), Some("19.99"));
        assert_eq!(og.get("type").map(String::as_str), Some("product"));
        assert_eq!(og.get("image").map(String::as_str), Some("/first.png"));
        assert_eq!(twitter.get("card").map(String::as_str), Some("summary"));
        assert!(!meta.contains_key("empty"));
    }

    #[test]
    fn microdata_types_use_tail_segment() {
        let html = r#"<div itemscope itemtype="https://schema.org/Product">
            <div itemtype="http://schema.org/Offer"></div>
            <div itemtype="https://schema.org/Product"></div></div>"#;
        let document = Html::parse_document(html);
        assert_eq!(
            PageParser::new().extract_microdata_types(&document),
            vec!["Product", "Offer"]
        );
    }

    #[test]
    fn resolve_without_base() {
        assert_eq!(resolve_url("//cdn.test/a.png", None), "https://cdn.test/a.png");
        assert_eq!(resolve_url("/a.png", None), "/a.png");
    }
}
