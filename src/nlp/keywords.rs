use super::lexicon::{word_tier, WordTier};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub term: String,
    pub score: f64,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct KeywordOptions {
    pub max_keywords: usize,
    /// Also rank 2–3 word phrases that repeat at least twice.
    pub include_phrases: bool,
    pub min_word_len: usize,
}

impl Default for KeywordOptions {
    fn default() -> Self {
        Self {
            max_keywords: 10,
            include_phrases: true,
            min_word_len: 3,
        }
    }
}

/// Lowercase word tokens. Apostrophes inside words survive so contractions
/// hit the stop-word table.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|s| s.trim_matches('\''))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rarity proxy: tier weight with a small bonus for longer words.
fn idf_proxy(word: &str, tier: WordTier) -> f64 {
    let len = word.chars().count().min(12) as f64;
    tier.weight() * (1.0 + (len - 3.0).max(0.0) * 0.05)
}

/// Term-frequency keywords weighted by the static inverse-frequency proxy.
pub fn extract_keywords(text: &str, opts: &KeywordOptions) -> Vec<Keyword> {
    let tokens = tokenize(text);
    if tokens.is_empty() || opts.max_keywords == 0 {
        return Vec::new();
    }
    let total = tokens.len() as f64;

    // `None` marks a phrase break (stop word, short token or number).
    let mut stream: Vec<Option<(&str, WordTier)>> = Vec::with_capacity(tokens.len());
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &tokens {
        let tier = word_tier(token);
        let usable = tier != WordTier::Stop
            && token.chars().count() >= opts.min_word_len
            && !token.chars().all(|c| c.is_ascii_digit());
        if usable {
            *counts.entry(token.as_str()).or_default() += 1;
            stream.push(Some((token.as_str(), tier)));
        } else {
            stream.push(None);
        }
    }

    let mut keywords: Vec<Keyword> = counts
        .iter()
        .map(|(word, count)| {
            let tier = word_tier(word);
            Keyword {
                term: word.to_string(),
                score: (*count as f64 / total) * idf_proxy(word, tier) * 100.0,
                count: *count,
            }
        })
        .collect();

    if opts.include_phrases {
        keywords.extend(extract_phrases(&stream, total));
    }

    keywords.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.term.cmp(&b.term))
    });
    keywords.truncate(opts.max_keywords);
    keywords
}

fn extract_phrases(stream: &[Option<(&str, WordTier)>], total: f64) -> Vec<Keyword> {
    let mut phrase_counts: HashMap<String, (usize, f64, usize)> = HashMap::new();

    for n in 2..=3usize {
        for window in stream.windows(n) {
            let Some(parts) = window.iter().copied().collect::<Option<Vec<_>>>() else {
                continue;
            };
            let phrase = parts.iter().map(|(w, _)| *w).collect::<Vec<_>>().join(" ");
            let avg_weight = parts.iter().map(|(_, t)| t.weight()).sum::<f64>() / n as f64;
            let entry = phrase_counts.entry(phrase).or_insert((0, avg_weight, n));
            entry.0 += 1;
        }
    }

    phrase_counts
        .into_iter()
        .filter(|(_, (count, _, _))| *count >= 2)
        .map(|(term, (count, weight, n))| Keyword {
            term,
            score: (count as f64 / total) * weight * n as f64 * 100.0,
            count,
        })
        .collect()
}
