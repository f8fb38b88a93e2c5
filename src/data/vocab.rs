use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Localized display name of a parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocalizedName {
    pub locale: String,
    pub name: String,
}

/// One entry of the parameter vocabulary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabEntry {
    pub id: String,
    pub measurement_name: Vec<LocalizedName>,
    /// Empty for unitless quantities (salinity, pH).
    #[serde(default)]
    pub measurement_unit: String,
}

// ---------------------------------------------------------------------------
// Vocabulary – code → (localized names, unit)
// ---------------------------------------------------------------------------

const BUILTIN_VOCABS: &str = include_str!("../../assets/vocabs.json");

/// Read-only lookup table keyed by parameter code.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: HashMap<String, VocabEntry>,
}

impl Vocabulary {
    /// The table shipped with the application.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_VOCABS).context("parsing built-in vocabulary")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let list: Vec<VocabEntry> = serde_json::from_str(text)?;
        Ok(Self::from_entries(list))
    }

    pub fn from_entries(list: Vec<VocabEntry>) -> Self {
        let entries = list.into_iter().map(|e| (e.id.clone(), e)).collect();
        Vocabulary { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Name of `code` in exactly `locale`.
    pub fn measurement_name(&self, code: &str, locale: &str) -> Option<&str> {
        self.entries
            .get(code)?
            .measurement_name
            .iter()
            .find(|n| n.locale == locale)
            .map(|n| n.name.as_str())
    }

    /// Unit of `code`; `None` for unknown codes and for unitless entries.
    pub fn measurement_unit(&self, code: &str) -> Option<&str> {
        self.entries
            .get(code)
            .map(|e| e.measurement_unit.as_str())
            .filter(|u| !u.is_empty())
    }

    /// Label for charts and lists: requested locale, then English, then the
    /// raw code.
    pub fn display_name<'a>(&'a self, code: &'a str, locale: &str) -> &'a str {
        self.measurement_name(code, locale)
            .or_else(|| self.measurement_name(code, "en"))
            .unwrap_or(code)
    }
}
