use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::DispatchError;

/// Terminology code → alternative display texts for `DV_CODED_TEXT` values.
#[derive(Debug, Clone, Default)]
pub struct CodedTextTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl CodedTextTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// LOINC blood-gas codes and local status codes used by the bundled templates.
    pub fn clinical() -> Self {
        let mut table = Self::empty();
        table.insert(
            "24336-0",
            ["Gas panel - Arterial blood", "Arterial blood gas", "ABG panel"],
        );
        table.insert(
            "2019-8",
            ["CO2 (BldA) [Partial pressure]", "pCO2 Arterial", "Arterial CO2 tension"],
        );
        table.insert("2703-7", ["Oxygen (BldA) [Partial pressure]", "pO2 Arterial"]);
        table.insert("2744-1", ["pH (BldA)", "Arterial pH"]);
        table.insert("at0012", ["final", "completed", "done"]);
        table.insert("at0013", ["registered", "initial", "preliminary"]);
        table
    }

    /// Read `{"code": ["display", ...]}` from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, DispatchError> {
        let contents = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, Vec<String>> = serde_json::from_str(&contents)?;
        Ok(Self { entries })
    }

    pub fn insert<I, S>(&mut self, code: &str, displays: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let displays = displays.into_iter().map(Into::into).collect();
        self.entries.insert(code.to_string(), displays);
    }

    /// Add or replace every code from `other`.
    pub fn merge(&mut self, other: CodedTextTable) {
        self.entries.extend(other.entries);
    }

    pub fn displays(&self, code: &str) -> Option<&[String]> {
        self.entries
            .get(code)
            .map(Vec::as_slice)
            .filter(|displays| !displays.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
