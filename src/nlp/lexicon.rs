//! Static word tables used in place of a real corpus.
//!
//! Severity tiers, most to least aggressive:
//! * stop words are dropped outright,
//! * very-common words are kept but heavily down-weighted,
//! * common words are mildly down-weighted.

use once_cell::sync::Lazy;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordTier {
    Stop,
    VeryCommon,
    Common,
    Regular,
}

impl WordTier {
    /// Inverse-frequency proxy for the tier.
    pub fn weight(&self) -> f64 {
        match self {
            WordTier::Stop => 0.0,
            WordTier::VeryCommon => 0.3,
            WordTier::Common => 0.6,
            WordTier::Regular => 1.0,
        }
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing", "don't", "down",
    "during", "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
    "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is",
    "isn't", "it", "it's", "its", "itself", "just", "let's", "me", "more", "most", "my", "myself",
    "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than",
    "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
    "you", "your", "yours", "yourself", "yourselves", "you're", "we're", "they're", "i'm",
    "can't", "won't", "didn't", "doesn't", "wasn't", "weren't", "hasn't", "haven't",
];

const VERY_COMMON_WORDS: &[&str] = &[
    "get", "got", "make", "made", "one", "two", "new", "like", "time", "use", "used", "using",
    "way", "well", "may", "many", "much", "even", "back", "still", "see", "know", "need", "want",
    "go", "going", "come", "take", "good", "great", "first", "last", "year", "years", "day",
    "days", "people", "thing", "things", "really", "every", "something", "anything", "lot",
    "click", "page", "home", "read", "view", "menu", "search", "login", "sign", "privacy",
    "policy", "terms", "cookie", "cookies", "copyright", "rights", "reserved",
];

const COMMON_WORDS: &[&str] = &[
    "best", "top", "free", "help", "information", "online", "find", "including", "include",
    "includes", "available", "work", "works", "part", "based", "high", "low", "long", "small",
    "large", "big", "little", "right", "left", "next", "previous", "today", "week", "month",
    "contact", "service", "services", "world", "number", "different",
    "place", "point", "group", "case", "system", "question", "important", "however",
    "example", "share", "post", "posts", "comment", "comments", "subscribe", "email", "follow",
    "learn", "shop", "buy", "sale", "price", "order", "item", "items", "product",
    "products", "quality", "design", "easy", "simple", "perfect", "love", "feel", "look",
];

/// Capitalized bigrams that look like names but are boilerplate.
pub const COMMON_PHRASES: &[&str] = &[
    "read more", "click here", "learn more", "sign up", "log in", "sign in", "add to",
    "buy now", "shop now", "privacy policy", "terms of", "contact us", "about us", "free shipping",
    "customer reviews", "home page", "related posts", "related articles", "all rights",
    "view all", "see all", "show more", "load more", "get started", "find out", "our story",
    "best sellers", "new arrivals", "gift cards", "customer service", "terms conditions",
    "cookie policy", "follow us", "share this", "leave a", "next post", "previous post",
];

/// Capitalized words that never start or end a person's name.
pub const NON_NAME_WORDS: &[&str] = &[
    "the", "this", "that", "these", "those", "our", "your", "my", "his", "her", "their", "we",
    "you", "it", "a", "an", "and", "or", "but", "if", "in", "on", "at", "by", "for", "with",
    "from", "to", "of", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
    "sunday", "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december", "new", "best", "top", "free", "home",
    "read", "more", "click", "add", "buy", "shop", "view", "price", "sale", "street", "avenue",
    "road", "inc", "llc", "corp", "company", "posted", "published", "updated", "step", "prep",
    "cook", "total", "open", "hours", "tickets", "watch", "subscribe",
];

static STOP_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOP_WORDS.iter().copied().collect());
static VERY_COMMON_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| VERY_COMMON_WORDS.iter().copied().collect());
static COMMON_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| COMMON_WORDS.iter().copied().collect());
static NON_NAME_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| NON_NAME_WORDS.iter().copied().collect());

/// Tier of a lowercase token.
pub fn word_tier(word: &str) -> WordTier {
    if STOP_SET.contains(word) {
        WordTier::Stop
    } else if VERY_COMMON_SET.contains(word) {
        WordTier::VeryCommon
    } else if COMMON_SET.contains(word) {
        WordTier::Common
    } else {
        WordTier::Regular
    }
}

pub fn is_common_phrase(phrase: &str) -> bool {
    let lower = phrase.to_ascii_lowercase();
    COMMON_PHRASES.iter().any(|p| lower.starts_with(p))
}

pub fn is_non_name_word(word: &str) -> bool {
    NON_NAME_SET.contains(word.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers() {
        assert_eq!(word_tier("the"), WordTier::Stop);
        assert_eq!(word_tier("click"), WordTier::VeryCommon);
        assert_eq!(word_tier("shipping"), WordTier::Regular);
        assert_eq!(word_tier("free"), WordTier::Common);
        assert!(WordTier::Common.weight() > WordTier::VeryCommon.weight());
    }

    #[test]
    fn phrase_denylist_is_case_insensitive() {
        assert!(is_common_phrase("Read More"));
        assert!(is_common_phrase("Privacy Policy"));
        assert!(!is_common_phrase("Jane Doe"));
    }
}
