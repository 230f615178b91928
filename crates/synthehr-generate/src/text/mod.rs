//! Text-analysis seam used by the variation engine for free text.
//!
//! The engine only needs one thing from a backend: the tokens of a text and,
//! for each content-bearing token, the words that could replace it. The
//! built-in [`LexiconAnalyzer`] does this with a regex tokenizer, a small
//! heuristic part-of-speech tagger and a thesaurus.

mod lexicon;
mod thesaurus;

use thiserror::Error;

pub use lexicon::{LexiconAnalyzer, PartOfSpeech, tokenize};
pub use thesaurus::{Thesaurus, ThesaurusEntry};

/// One token of analyzed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedToken {
    pub text: String,
    /// Noun or adjective: eligible for synonym replacement.
    pub content: bool,
    /// Candidate replacements. Empty for non-content tokens.
    pub synonyms: Vec<String>,
}

impl AnalyzedToken {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            content: false,
            synonyms: Vec::new(),
        }
    }

    pub fn content(text: impl Into<String>, synonyms: Vec<String>) -> Self {
        Self {
            text: text.into(),
            content: true,
            synonyms,
        }
    }
}

#[derive(Debug, Error)]
pub enum TextAnalysisError {
    #[error("analysis backend unavailable: {0}")]
    Unavailable(String),
    #[error("analysis failed: {0}")]
    Failed(String),
    #[error("thesaurus io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("thesaurus json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tokenize and tag text, returning synonym candidates per token.
pub trait TextAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<Vec<AnalyzedToken>, TextAnalysisError>;
}
