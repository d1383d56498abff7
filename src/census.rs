use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::language::LanguageReference;
use crate::lexer::{Lexer, Token, TokenKind};

/// `meta.source` for text analyzed straight from memory.
pub const IN_MEMORY_SOURCE: &str = "in_memory";

/// Name → count, remembering the order names were first seen.
///
/// `ranked()` sorts by descending count with a stable sort, so equal counts
/// keep first-seen order. Serializes as a JSON object in stored order.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &str, n: u64) {
        match self.index.get(name) {
            Some(&i) => self.entries[i].1 += n,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), n));
            }
        }
    }

    /// Add every count of `other`; names new to `self` go last, in `other`'s order.
    pub fn merge(&mut self, other: &FrequencyTable) {
        for (name, n) in &other.entries {
            self.add(name, *n);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.index.get(name).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), *n))
    }

    pub fn top(&self, n: usize) -> &[(String, u64)] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn ranked(mut self) -> Self {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (k, _))| (k.clone(), i))
            .collect();
        self
    }
}

impl PartialEq for FrequencyTable {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for FrequencyTable {}

impl Serialize for FrequencyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, n) in &self.entries {
            map.serialize_entry(k, n)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FrequencyTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = FrequencyTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of name to non-negative count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FrequencyTable, A::Error> {
                let mut table = FrequencyTable::new();
                while let Some((k, n)) = access.next_entry::<String, u64>()? {
                    table.add(&k, n);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Counts for one unit of text (or many, after merging).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub keywords: FrequencyTable,
    pub builtins: FrequencyTable,
    pub dunders: FrequencyTable,
    /// Every name-class token seen, classified or not.
    pub tokens: u64,
}

impl Tally {
    /// Lex and classify `src` in one pass. Scanning faults just end the pass.
    pub fn from_source(src: &str, reference: &LanguageReference) -> Self {
        let mut tally = Tally::default();
        for token in Lexer::new(src, reference) {
            tally.observe(token, reference);
        }
        tally
    }

    /// Keywords are exclusive; builtin and special-method checks are independent.
    pub fn observe(&mut self, token: Token<'_>, reference: &LanguageReference) {
        self.tokens += 1;
        match token.kind {
            TokenKind::Keyword => self.keywords.record(token.text),
            TokenKind::Identifier => {
                if reference.is_builtin(token.text) {
                    self.builtins.record(token.text);
                }
                if reference.is_special_method(token.text) {
                    self.dunders.record(token.text);
                }
            }
        }
    }

    pub fn merge(&mut self, other: &Tally) {
        self.keywords.merge(&other.keywords);
        self.builtins.merge(&other.builtins);
        self.dunders.merge(&other.dunders);
        self.tokens += other.tokens;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub source: String,
    pub language_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_processed: Option<u64>,
    pub total_tokens_analyzed: u64,
    pub total_keyword_occurrences: u64,
    pub total_builtin_occurrences: u64,
    pub total_dunder_occurrences: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

/// The unit that is cached and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub meta: Meta,
    pub keyword_freq: FrequencyTable,
    pub builtin_freq: FrequencyTable,
    pub dunder_freq: FrequencyTable,
}

impl AnalysisResult {
    pub fn from_tally(tally: Tally, source: &str, reference: &LanguageReference) -> Self {
        let meta = Meta {
            source: source.to_string(),
            language_reference: reference.version.to_string(),
            files_processed: None,
            total_tokens_analyzed: tally.tokens,
            total_keyword_occurrences: tally.keywords.total(),
            total_builtin_occurrences: tally.builtins.total(),
            total_dunder_occurrences: tally.dunders.total(),
            total_bytes: None,
            repo_url: None,
        };
        Self {
            meta,
            keyword_freq: tally.keywords.ranked(),
            builtin_freq: tally.builtins.ranked(),
            dunder_freq: tally.dunders.ranked(),
        }
    }

    /// Per-category totals agree with the tables. Records failing this are
    /// treated as damaged when read back from disk.
    pub fn is_consistent(&self) -> bool {
        self.keyword_freq.total() == self.meta.total_keyword_occurrences
            && self.builtin_freq.total() == self.meta.total_builtin_occurrences
            && self.dunder_freq.total() == self.meta.total_dunder_occurrences
    }
}

/// Analyze one text unit held in memory.
pub fn analyze_text(text: &str, source: &str, reference: &LanguageReference) -> AnalysisResult {
    AnalysisResult::from_tally(Tally::from_source(text, reference), source, reference)
}

/// Best-effort text decoding: invalid UTF-8 is replaced, and `\r\n` / `\r`
/// become `\n` (universal newlines).
pub fn decode_source(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.into_owned()
    }
}
