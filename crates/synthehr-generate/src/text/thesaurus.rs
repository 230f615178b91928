use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TextAnalysisError;
use super::lexicon::PartOfSpeech;

/// Synonyms for one headword, optionally pinned to a part of speech.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThesaurusEntry {
    #[serde(default)]
    pub pos: Option<PartOfSpeech>,
    pub synonyms: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Synonyms(Vec<String>),
    Entry(ThesaurusEntry),
}

/// Case-insensitive headword → synonyms lookup.
#[derive(Debug, Clone, Default)]
pub struct Thesaurus {
    entries: BTreeMap<String, ThesaurusEntry>,
}

const BUILTIN: &[(&str, PartOfSpeech, &[&str])] = &[
    ("patient", PartOfSpeech::Noun, &["client", "case", "subject"]),
    ("pain", PartOfSpeech::Noun, &["ache", "discomfort", "soreness", "hurting"]),
    ("fever", PartOfSpeech::Noun, &["pyrexia", "febrility", "temperature"]),
    ("cough", PartOfSpeech::Noun, &["coughing", "tussis"]),
    ("headache", PartOfSpeech::Noun, &["cephalalgia", "head ache"]),
    ("nausea", PartOfSpeech::Noun, &["sickness", "queasiness"]),
    ("fatigue", PartOfSpeech::Noun, &["tiredness", "weariness", "exhaustion"]),
    ("swelling", PartOfSpeech::Noun, &["oedema", "edema", "puffiness"]),
    ("rash", PartOfSpeech::Noun, &["eruption", "skin eruption"]),
    ("injury", PartOfSpeech::Noun, &["trauma", "hurt", "harm"]),
    ("wound", PartOfSpeech::Noun, &["lesion", "injury"]),
    ("blood", PartOfSpeech::Noun, &["haemoglobin", "lifeblood"]),
    ("sample", PartOfSpeech::Noun, &["specimen", "sampling"]),
    ("specimen", PartOfSpeech::Noun, &["sample", "example"]),
    ("test", PartOfSpeech::Noun, &["trial", "examination", "assay"]),
    ("result", PartOfSpeech::Noun, &["outcome", "finding", "consequence"]),
    ("finding", PartOfSpeech::Noun, &["determination", "observation", "result"]),
    ("report", PartOfSpeech::Noun, &["account", "study", "written report"]),
    ("panel", PartOfSpeech::Noun, &["board", "battery"]),
    ("gas", PartOfSpeech::Noun, &["gaseous state", "vapour"]),
    ("pressure", PartOfSpeech::Noun, &["pressing", "force"]),
    ("level", PartOfSpeech::Noun, &["degree", "grade", "stage"]),
    ("dose", PartOfSpeech::Noun, &["dosage", "amount"]),
    ("medication", PartOfSpeech::Noun, &["medicine", "medicament", "drug"]),
    ("treatment", PartOfSpeech::Noun, &["therapy", "intervention", "handling"]),
    ("diagnosis", PartOfSpeech::Noun, &["diagnosing", "identification"]),
    ("history", PartOfSpeech::Noun, &["account", "chronicle", "record"]),
    ("condition", PartOfSpeech::Noun, &["status", "state", "disorder"]),
    ("problem", PartOfSpeech::Noun, &["issue", "trouble", "job"]),
    ("comment", PartOfSpeech::Noun, &["remark", "note", "annotation"]),
    ("note", PartOfSpeech::Noun, &["annotation", "notation", "comment"]),
    ("doctor", PartOfSpeech::Noun, &["physician", "medico", "doc"]),
    ("nurse", PartOfSpeech::Noun, &["caregiver", "nursing staff"]),
    ("hospital", PartOfSpeech::Noun, &["infirmary", "clinic"]),
    ("visit", PartOfSpeech::Noun, &["encounter", "consultation", "call"]),
    ("arterial", PartOfSpeech::Adjective, &["arteria"]),
    ("acute", PartOfSpeech::Adjective, &["sharp", "severe", "intense"]),
    ("chronic", PartOfSpeech::Adjective, &["persistent", "long-term", "inveterate"]),
    ("severe", PartOfSpeech::Adjective, &["serious", "grave", "terrible"]),
    ("mild", PartOfSpeech::Adjective, &["slight", "gentle", "balmy"]),
    ("normal", PartOfSpeech::Adjective, &["usual", "typical", "regular"]),
    ("abnormal", PartOfSpeech::Adjective, &["unusual", "irregular", "atypical"]),
    ("stable", PartOfSpeech::Adjective, &["steady", "unchanging", "constant"]),
    ("high", PartOfSpeech::Adjective, &["elevated", "raised", "eminent"]),
    ("low", PartOfSpeech::Adjective, &["reduced", "depleted", "small"]),
    ("final", PartOfSpeech::Adjective, &["concluding", "last", "terminal"]),
    ("initial", PartOfSpeech::Adjective, &["first", "opening", "starting"]),
    ("recent", PartOfSpeech::Adjective, &["new", "late", "fresh"]),
    ("left", PartOfSpeech::Adjective, &["left-hand", "leftist"]),
    ("right", PartOfSpeech::Adjective, &["right-hand", "correct", "proper"]),
];

impl Thesaurus {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Small clinical/general English thesaurus shipped with the crate.
    pub fn builtin() -> Self {
        let mut thesaurus = Self::empty();
        for (word, pos, synonyms) in BUILTIN {
            thesaurus.insert(
                word,
                Some(*pos),
                synonyms.iter().map(|syn| syn.to_string()).collect(),
            );
        }
        thesaurus
    }

    /// Parse `{"word": ["syn", ...]}` or `{"word": {"pos": "noun", "synonyms": [...]}}`.
    pub fn from_json_str(json: &str) -> Result<Self, TextAnalysisError> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(json)?;
        let mut thesaurus = Self::empty();
        for (word, entry) in raw {
            match entry {
                RawEntry::Synonyms(synonyms) => thesaurus.insert(&word, None, synonyms),
                RawEntry::Entry(entry) => thesaurus.insert(&word, entry.pos, entry.synonyms),
            }
        }
        Ok(thesaurus)
    }

    pub fn from_path(path: &Path) -> Result<Self, TextAnalysisError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Add synonyms for `word`. Underscores in synonyms become spaces and an
    /// existing entry is extended rather than replaced.
    pub fn insert(&mut self, word: &str, pos: Option<PartOfSpeech>, synonyms: Vec<String>) {
        let entry = self
            .entries
            .entry(word.to_lowercase())
            .or_insert_with(|| ThesaurusEntry {
                pos,
                synonyms: Vec::new(),
            });
        if pos.is_some() {
            entry.pos = pos;
        }
        for synonym in synonyms {
            let synonym = synonym.replace('_', " ");
            if !synonym.is_empty() && !entry.synonyms.contains(&synonym) {
                entry.synonyms.push(synonym);
            }
        }
    }

    pub fn merge(&mut self, other: Thesaurus) {
        for (word, entry) in other.entries {
            self.insert(&word, entry.pos, entry.synonyms);
        }
    }

    pub fn lookup(&self, word: &str) -> Option<&ThesaurusEntry> {
        self.entries.get(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_both_entry_shapes() {
        let thesaurus = Thesaurus::from_json_str(
            r#"{"Heart": ["ticker", "cardiac_muscle"], "swift": {"pos": "adjective", "synonyms": ["quick"]}}"#,
        )
        .expect("parse thesaurus");

        let heart = thesaurus.lookup("heart").expect("heart entry");
        assert_eq!(heart.synonyms, vec!["ticker", "cardiac muscle"]);
        assert_eq!(heart.pos, None);

        let swift = thesaurus.lookup("SWIFT").expect("swift entry");
        assert_eq!(swift.pos, Some(PartOfSpeech::Adjective));
    }

    #[test]
    fn merge_extends_existing_entries() {
        let mut thesaurus = Thesaurus::builtin();
        let before = thesaurus.lookup("pain").map(|e| e.synonyms.len()).unwrap_or(0);
        let extra = Thesaurus::from_json_str(r#"{"pain": ["agony", "ache"]}"#).expect("parse");
        thesaurus.merge(extra);
        let entry = thesaurus.lookup("pain").expect("pain entry");
        assert_eq!(entry.synonyms.len(), before + 1);
        assert_eq!(entry.pos, Some(PartOfSpeech::Noun));
    }
}
