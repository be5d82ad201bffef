use super::keywords::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const WORDS_PER_MINUTE: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    VeryEasy,
    Easy,
    FairlyEasy,
    Standard,
    FairlyDifficult,
    Difficult,
    VeryDifficult,
    Unknown,
}

impl Difficulty {
    fn from_flesch(score: f64) -> Self {
        match score {
            s if s >= 90.0 => Difficulty::VeryEasy,
            s if s >= 80.0 => Difficulty::Easy,
            s if s >= 70.0 => Difficulty::FairlyEasy,
            s if s >= 60.0 => Difficulty::Standard,
            s if s >= 50.0 => Difficulty::FairlyDifficult,
            s if s >= 30.0 => Difficulty::Difficult,
            _ => Difficulty::VeryDifficult,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readability {
    /// Flesch Reading Ease, clamped to `[0, 100]`.
    pub flesch_score: f64,
    /// Flesch-Kincaid grade level, never negative.
    pub grade_level: f64,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMetadata {
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_words_per_sentence: f64,
    pub avg_syllables_per_word: f64,
    pub reading_time_minutes: u32,
    /// Distinct words over total words.
    pub lexical_diversity: f64,
}

/// Vowel-group approximation: each run of `aeiouy` is one syllable, a silent
/// trailing `e` does not count, and every word has at least one.
pub fn count_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let chars: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    if chars.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut prev_vowel = false;
    for &c in &chars {
        let vowel = is_vowel(c);
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }

    let n = chars.len();
    if n > 2 && chars[n - 1] == 'e' && chars[n - 2] != 'l' && !is_vowel(chars[n - 2]) && count > 1 {
        count -= 1;
    }
    count.max(1)
}

/// Sentences are runs of text terminated by `.`, `!` or `?`. A trailing
/// fragment without terminator still counts.
pub fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| s.chars().any(|c| c.is_alphanumeric()))
        .count()
}

fn words(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|w| w.chars().any(|c| c.is_alphabetic()))
        .collect()
}

pub fn readability(text: &str) -> Readability {
    let words = words(text);
    let sentences = count_sentences(text);
    if words.is_empty() || sentences == 0 {
        return Readability {
            flesch_score: 0.0,
            grade_level: 0.0,
            difficulty: Difficulty::Unknown,
        };
    }

    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();
    let wps = words.len() as f64 / sentences as f64;
    let spw = syllables as f64 / words.len() as f64;

    let flesch = (206.835 - 1.015 * wps - 84.6 * spw).clamp(0.0, 100.0);
    let grade = (0.39 * wps + 11.8 * spw - 15.59).max(0.0);

    Readability {
        flesch_score: round1(flesch),
        grade_level: round1(grade),
        difficulty: Difficulty::from_flesch(flesch),
    }
}

pub fn text_metadata(text: &str) -> TextMetadata {
    let words = words(text);
    if words.is_empty() {
        return TextMetadata::default();
    }
    let sentences = count_sentences(text).max(1);
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();
    let distinct: HashSet<&str> = words.iter().map(|w| w.as_str()).collect();
    let wc = words.len() as f64;

    TextMetadata {
        word_count: words.len(),
        sentence_count: sentences,
        avg_words_per_sentence: round1(wc / sentences as f64),
        avg_syllables_per_word: round2(syllables as f64 / wc),
        reading_time_minutes: ((wc / WORDS_PER_MINUTE).ceil() as u32).max(1),
        lexical_diversity: round2(distinct.len() as f64 / wc),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syllable_heuristic() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("beautiful"), 3);
        assert_eq!(count_syllables("rhythm"), 1);
        assert_eq!(count_syllables("42"), 0);
    }

    #[test]
    fn simple_text_is_easy() {
        let r = readability("The cat sat. The dog ran. We had fun.");
        assert!(r.flesch_score >= 90.0);
        assert_eq!(r.difficulty, Difficulty::VeryEasy);
        assert_eq!(r.grade_level, 0.0);
    }

    #[test]
    fn dense_text_scores_low_but_never_negative() {
        let r = readability(
            "Institutionalized interdisciplinary characterization methodologies necessitate \
             comprehensive organizational reconfiguration considerations",
        );
        assert_eq!(r.flesch_score, 0.0);
        assert_eq!(r.difficulty, Difficulty::VeryDifficult);
        assert!(r.grade_level > 16.0);
    }

    #[test]
    fn empty_text_is_unknown() {
        let r = readability("   ");
        assert_eq!(r.difficulty, Difficulty::Unknown);
        assert_eq!(text_metadata(""), TextMetadata::default());
    }

    #[test]
    fn metadata_counts() {
        let m = text_metadata("One two three. Three two one!");
        assert_eq!(m.word_count, 6);
        assert_eq!(m.sentence_count, 2);
        assert_eq!(m.avg_words_per_sentence, 3.0);
        assert_eq!(m.reading_time_minutes, 1);
        assert_eq!(m.lexical_diversity, 0.5);
    }
}
