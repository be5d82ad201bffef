//! Lexical content analysis: keywords, entities, content classification and
//! readability, all from static tables and pattern families.

pub mod classify;
pub mod entities;
pub mod keywords;
pub mod lexicon;
pub mod readability;

use serde::{Deserialize, Serialize};

pub use classify::{classify_content, ContentType};
pub use entities::{extract_entities, Entities};
pub use keywords::{extract_keywords, Keyword, KeywordOptions};
pub use readability::{Difficulty, Readability, TextMetadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysis {
    pub keywords: Vec<Keyword>,
    pub entities: Entities,
    pub content_type: ContentType,
    pub readability: Readability,
    pub metadata: TextMetadata,
}

impl ContentAnalysis {
    pub fn keyword_terms(&self) -> Vec<String> {
        self.keywords.iter().map(|k| k.term.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    keyword_options: KeywordOptions,
    min_matches: usize,
}

impl Default for ContentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentAnalyzer {
    pub fn new() -> Self {
        Self {
            keyword_options: KeywordOptions::default(),
            min_matches: 2,
        }
    }

    /// Pattern checks a content type must hit before it is accepted.
    pub fn with_min_matches(mut self, min_matches: usize) -> Self {
        self.min_matches = min_matches;
        self
    }

    pub fn with_keyword_options(mut self, options: KeywordOptions) -> Self {
        self.keyword_options = options;
        self
    }

    pub fn analyze(&self, text: &str) -> ContentAnalysis {
        ContentAnalysis {
            keywords: extract_keywords(text, &self.keyword_options),
            entities: extract_entities(text),
            content_type: classify_content(text, self.min_matches),
            readability: readability::readability(text),
            metadata: readability::text_metadata(text),
        }
    }
}
