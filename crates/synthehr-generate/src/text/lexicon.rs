use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::thesaurus::Thesaurus;
use super::{AnalyzedToken, TextAnalysisError, TextAnalyzer};

static TOKEN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’\-.][\p{L}\p{N}]+)*|[^\s\p{L}\p{N}]").ok()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Adjective,
    Verb,
    Adverb,
    Determiner,
    Preposition,
    Pronoun,
    Conjunction,
    Numeral,
    Punctuation,
    Other,
}

impl PartOfSpeech {
    pub fn is_content(self) -> bool {
        matches!(self, PartOfSpeech::Noun | PartOfSpeech::Adjective)
    }
}

const DETERMINERS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "each", "every", "no", "some", "any",
    "all", "both", "either", "neither",
];
const PREPOSITIONS: &[&str] = &[
    "of", "in", "on", "at", "by", "for", "with", "without", "from", "to", "into", "onto", "over",
    "under", "after", "before", "during", "since", "until", "per", "via", "within", "about",
    "against", "between", "through",
];
const PRONOUNS: &[&str] = &[
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "his", "its",
    "our", "their", "my", "your", "who", "which", "what",
];
const CONJUNCTIONS: &[&str] = &["and", "or", "but", "nor", "so", "yet", "if", "because", "while", "as"];
const AUXILIARIES: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "being", "has", "have", "had", "do", "does", "did",
    "will", "would", "can", "could", "should", "may", "might", "must", "shall",
];
const ADVERBS: &[&str] = &["not", "very", "also", "again", "now", "then", "still", "often"];

const ADJECTIVE_SUFFIXES: &[&str] = &[
    "ous", "ful", "less", "ive", "able", "ible", "al", "ic", "ary", "ish", "oid",
];
const VERB_SUFFIXES: &[&str] = &["ing", "ed", "ize", "ise", "ate"];

/// Split text into word and punctuation tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    match TOKEN.as_ref() {
        Some(re) => re.find_iter(text).map(|m| m.as_str()).collect(),
        None => text.split_whitespace().collect(),
    }
}

/// Built-in analyzer: regex tokenizer, closed-class and suffix tagging, thesaurus lookup.
#[derive(Debug, Clone)]
pub struct LexiconAnalyzer {
    thesaurus: Thesaurus,
}

impl LexiconAnalyzer {
    pub fn new(thesaurus: Thesaurus) -> Self {
        Self { thesaurus }
    }

    pub fn tag(&self, token: &str) -> PartOfSpeech {
        if token.chars().all(|c| !c.is_alphanumeric()) {
            return PartOfSpeech::Punctuation;
        }
        if token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return PartOfSpeech::Numeral;
        }

        let lower = token.to_lowercase();
        let word = lower.as_str();
        if DETERMINERS.contains(&word) {
            return PartOfSpeech::Determiner;
        }
        if PREPOSITIONS.contains(&word) {
            return PartOfSpeech::Preposition;
        }
        if PRONOUNS.contains(&word) {
            return PartOfSpeech::Pronoun;
        }
        if CONJUNCTIONS.contains(&word) {
            return PartOfSpeech::Conjunction;
        }
        if AUXILIARIES.contains(&word) {
            return PartOfSpeech::Verb;
        }
        if ADVERBS.contains(&word) {
            return PartOfSpeech::Adverb;
        }
        if let Some(pos) = self.thesaurus.lookup(word).and_then(|entry| entry.pos) {
            return pos;
        }

        if word.len() > 4 && word.ends_with("ly") {
            PartOfSpeech::Adverb
        } else if ADJECTIVE_SUFFIXES
            .iter()
            .any(|suffix| word.len() > suffix.len() + 2 && word.ends_with(suffix))
        {
            PartOfSpeech::Adjective
        } else if VERB_SUFFIXES
            .iter()
            .any(|suffix| word.len() > suffix.len() + 2 && word.ends_with(suffix))
        {
            PartOfSpeech::Verb
        } else {
            PartOfSpeech::Noun
        }
    }
}

impl Default for LexiconAnalyzer {
    fn default() -> Self {
        Self::new(Thesaurus::builtin())
    }
}

impl TextAnalyzer for LexiconAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<AnalyzedToken>, TextAnalysisError> {
        let tokens = tokenize(text)
            .into_iter()
            .map(|token| {
                if !self.tag(token).is_content() {
                    return AnalyzedToken::plain(token);
                }
                let synonyms = self
                    .thesaurus
                    .lookup(token)
                    .map(|entry| entry.synonyms.clone())
                    .unwrap_or_default();
                AnalyzedToken::content(token, synonyms)
            })
            .collect();
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_words_and_punctuation() {
        assert_eq!(
            tokenize("Severe pain, left knee (2 days)."),
            vec!["Severe", "pain", ",", "left", "knee", "(", "2", "days", ")", "."]
        );
        assert_eq!(tokenize("follow-up isn't 7.4"), vec!["follow-up", "isn't", "7.4"]);
    }

    #[test]
    fn tags_closed_classes_and_suffixes() {
        let analyzer = LexiconAnalyzer::default();
        assert_eq!(analyzer.tag("the"), PartOfSpeech::Determiner);
        assert_eq!(analyzer.tag(","), PartOfSpeech::Punctuation);
        assert_eq!(analyzer.tag("120"), PartOfSpeech::Numeral);
        assert_eq!(analyzer.tag("Acute"), PartOfSpeech::Adjective);
        assert_eq!(analyzer.tag("infectious"), PartOfSpeech::Adjective);
        assert_eq!(analyzer.tag("quickly"), PartOfSpeech::Adverb);
        assert_eq!(analyzer.tag("walking"), PartOfSpeech::Verb);
        assert_eq!(analyzer.tag("knee"), PartOfSpeech::Noun);
    }

    #[test]
    fn only_content_tokens_carry_synonyms() {
        let analyzer = LexiconAnalyzer::default();
        let tokens = analyzer.analyze("The patient has severe pain.").expect("analyze");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["The", "patient", "has", "severe", "pain", "."]);
        assert!(!tokens[0].content);
        assert!(tokens[1].content && !tokens[1].synonyms.is_empty());
        assert!(!tokens[2].content && tokens[2].synonyms.is_empty());
        assert!(tokens[3].content);
        assert!(!tokens[5].content);
    }
}
