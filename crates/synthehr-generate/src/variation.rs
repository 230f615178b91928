use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

use synthehr_core::{NodeKind, NodeVisitor, walk_mut};

use crate::coded::CodedTextTable;
use crate::text::{AnalyzedToken, TextAnalyzer};

/// Knobs for the per-kind mutation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationOptions {
    /// Chance that an eligible free-text token is swapped for a synonym.
    pub text_replace_probability: f64,
    /// Quantities are scaled by a factor drawn from `[1 - j, 1 + j]`.
    pub quantity_jitter: f64,
    /// Timestamps move back by up to this many whole days...
    pub date_window_days: i64,
    /// ...plus up to this many whole minutes.
    pub date_window_minutes: i64,
}

impl Default for VariationOptions {
    fn default() -> Self {
        Self {
            text_replace_probability: 0.30,
            quantity_jitter: 0.15,
            date_window_days: 730,
            date_window_minutes: 1440,
        }
    }
}

/// Produces randomized, structurally identical copies of canonical documents.
///
/// The engine holds no per-call state; one instance is shared by every
/// generation task and each call works on its own deep copy.
pub struct VariationEngine {
    analyzer: Arc<dyn TextAnalyzer>,
    coded: CodedTextTable,
    options: VariationOptions,
}

impl VariationEngine {
    pub fn new(analyzer: Arc<dyn TextAnalyzer>, coded: CodedTextTable) -> Self {
        Self {
            analyzer,
            coded,
            options: VariationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: VariationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &VariationOptions {
        &self.options
    }

    /// Deep-copy `canonical` and perturb every typed value in the copy.
    pub fn vary<R: Rng + ?Sized>(&self, canonical: &Value, rng: &mut R) -> Value {
        self.vary_at(canonical, Utc::now(), rng)
    }

    /// Same as [`VariationEngine::vary`] with an explicit reference time.
    pub fn vary_at<R: Rng + ?Sized>(
        &self,
        canonical: &Value,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Value {
        let mut variant = canonical.clone();
        let mut mutator = Mutator {
            engine: self,
            rng,
            now,
        };
        walk_mut(&mut variant, &mut mutator);
        variant
    }

    /// Swap some nouns and adjectives for synonyms.
    ///
    /// Returns `text` unchanged when the analyzer fails or offers no
    /// usable synonym for any token.
    pub fn scramble_text<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let analyzed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.analyzer.analyze(text)
        }));
        let tokens = match analyzed {
            Ok(Ok(tokens)) => tokens,
            Ok(Err(err)) => {
                debug!(error = %err, "text analysis failed, keeping original text");
                return text.to_string();
            }
            Err(_) => {
                debug!("text analysis panicked, keeping original text");
                return text.to_string();
            }
        };

        let mut replaceable = false;
        let mut words: Vec<&str> = Vec::with_capacity(tokens.len());
        for token in &tokens {
            let candidates = replacement_candidates(token);
            if candidates.is_empty() {
                words.push(&token.text);
                continue;
            }
            replaceable = true;
            if rng.random::<f64>() < self.options.text_replace_probability {
                words.push(candidates[rng.random_range(0..candidates.len())]);
            } else {
                words.push(&token.text);
            }
        }

        if !replaceable {
            return text.to_string();
        }
        words.join(" ").replace(" ,", ",").replace(" .", ".")
    }

    /// Scale a magnitude by a random factor and round to two decimals.
    pub fn jitter_magnitude<R: Rng + ?Sized>(&self, magnitude: f64, rng: &mut R) -> f64 {
        let jitter = self.options.quantity_jitter;
        if !jitter.is_finite() || jitter == 0.0 {
            return (magnitude * 100.0).round() / 100.0;
        }
        let jitter = jitter.abs().min(1.0);
        let factor = rng.random_range((1.0 - jitter)..=(1.0 + jitter));
        (magnitude * factor * 100.0).round() / 100.0
    }

    /// A timestamp up to the configured window before `now`, as extended ISO-8601 UTC.
    pub fn backdated_timestamp<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> String {
        let days = rng.random_range(0..=self.options.date_window_days.max(0));
        let minutes = rng.random_range(0..=self.options.date_window_minutes.max(0));
        let stamp = TimeDelta::try_days(days)
            .zip(TimeDelta::try_minutes(minutes))
            .and_then(|(days, minutes)| days.checked_add(&minutes))
            .and_then(|offset| now.checked_sub_signed(offset))
            .unwrap_or(now);
        stamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

struct Mutator<'a, R: ?Sized> {
    engine: &'a VariationEngine,
    rng: &'a mut R,
    now: DateTime<Utc>,
}

impl<R: Rng + ?Sized> NodeVisitor for Mutator<'_, R> {
    fn visit(&mut self, kind: NodeKind, record: &mut Map<String, Value>) {
        match kind {
            NodeKind::DvText => {
                if let Some(Value::String(text)) = record.get_mut("value") {
                    *text = self.engine.scramble_text(text, &mut *self.rng);
                }
            }
            NodeKind::DvCodedText => {
                let replacement = record
                    .get("defining_code")
                    .and_then(|code| code.get("code_string"))
                    .and_then(Value::as_str)
                    .and_then(|code| self.engine.coded.displays(code))
                    .map(|displays| displays[self.rng.random_range(0..displays.len())].clone());
                if let Some(display) = replacement {
                    record.insert("value".to_string(), Value::String(display));
                }
            }
            NodeKind::DvQuantity => {
                let Some(magnitude) = record.get("magnitude").and_then(magnitude_value) else {
                    return;
                };
                let varied = self.engine.jitter_magnitude(magnitude, &mut *self.rng);
                if let Some(number) = Number::from_f64(varied) {
                    record.insert("magnitude".to_string(), Value::Number(number));
                }
            }
            NodeKind::DvDateTime => {
                if record.contains_key("value") {
                    let stamp = self.engine.backdated_timestamp(self.now, &mut *self.rng);
                    record.insert("value".to_string(), Value::String(stamp));
                }
            }
            _ => {}
        }
    }
}

fn magnitude_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok().filter(|m| m.is_finite()),
        _ => None,
    }
}

fn replacement_candidates(token: &AnalyzedToken) -> Vec<&str> {
    if !token.content || is_punctuation(&token.text) {
        return Vec::new();
    }
    let original = token.text.to_lowercase();
    token
        .synonyms
        .iter()
        .map(String::as_str)
        .filter(|synonym| synonym.to_lowercase() != original)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn is_punctuation(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_punctuation())
}
