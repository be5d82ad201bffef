use super::PageParser;
use crate::types::ListItem;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Containers that usually hold the page's primary content, best first.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=main]",
    "[itemprop=articleBody]",
    ".entry-content",
    ".post-content",
    ".article-content",
    ".main-content",
    "#content",
    ".content",
];

impl PageParser {
    /// Visible text of the main content container (or `<body>` when none is
    /// present), scripts and styles removed, whitespace collapsed, truncated.
    pub(super) fn extract_body_text(&self, document: &Html) -> String {
        let mut text = String::new();

        for sel_str in CONTENT_SELECTORS {
            let Ok(sel) = Selector::parse(sel_str) else {
                continue;
            };
            if let Some(container) = document.select(&sel).next() {
                let mut parts = Vec::new();
                self.extract_text_recursive(&container, &mut parts);
                let cleaned = self.clean_text(&parts.join(" "));
                if !cleaned.is_empty() {
                    text = cleaned;
                    break;
                }
            }
        }

        if text.is_empty() {
            text = self.fallback_text_extraction(document);
        }

        if text.chars().count() > self.max_body_chars {
            text = text.chars().take(self.max_body_chars).collect();
        }
        text
    }

    fn fallback_text_extraction(&self, document: &Html) -> String {
        let mut text_parts = Vec::new();

        if let Ok(body_selector) = Selector::parse("body") {
            if let Some(body) = document.select(&body_selector).next() {
                self.extract_text_recursive(&body, &mut text_parts);
            }
        }

        self.clean_text(&text_parts.join(" "))
    }

    fn extract_text_recursive(&self, element: &ElementRef, text_parts: &mut Vec<String>) {
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                let tag_name = child_element.value().name();
                if matches!(
                    tag_name,
                    "script" | "style" | "noscript" | "template" | "svg" | "canvas" | "iframe"
                ) {
                    continue;
                }
                self.extract_text_recursive(&child_element, text_parts);
            } else if let Some(text_node) = child.value().as_text() {
                text_parts.push(text_node.text.to_string());
            }
        }
    }

    /// Collapse whitespace runs into single spaces.
    pub(super) fn clean_text(&self, text: &str) -> String {
        RE_WHITESPACE.replace_all(text, " ").trim().to_string()
    }

    /// `<li>` texts, tagged with whether their list is ordered.
    pub(super) fn extract_list_items(&self, document: &Html) -> Vec<ListItem> {
        let Ok(selector) = Selector::parse("li") else {
            return Vec::new();
        };

        document
            .select(&selector)
            .filter_map(|li| {
                let mut parts = Vec::new();
                self.extract_text_recursive(&li, &mut parts);
                let text = self.clean_text(&parts.join(" "));
                if text.is_empty() {
                    return None;
                }
                let ordered = li
                    .parent()
                    .and_then(ElementRef::wrap)
                    .map(|p| p.value().name() == "ol")
                    .unwrap_or(false);
                Some(ListItem { text, ordered })
            })
            .collect()
    }
}
