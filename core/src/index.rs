use crate::error::ParseError;
use crate::tokenizer::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type DocId = u32;

/// Indexed fields. `id` and `filename` are keyword fields indexed verbatim,
/// `content` goes through the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Id,
    Filename,
    Content,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Id, Field::Filename, Field::Content];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Filename => "filename",
            Field::Content => "content",
        }
    }

    /// Keyword fields (`id`, `filename`) match their value verbatim. In a
    /// query a leading `+`, `-` or `!` is an operator, so a value starting
    /// with one is written escaped (`\-draft`) or after a field prefix
    /// (`id:-draft`).
    pub fn is_analyzed(self) -> bool {
        matches!(self, Field::Content)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ParseError::UnknownField { name: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_freq: u32,
}

/// Postings of one term plus the statistics derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermInfo {
    /// Number of postings, i.e. distinct documents containing the term.
    pub doc_freq: u32,
    /// Sum of `term_freq` over all postings.
    pub total_term_freq: u64,
    pub postings: Vec<Posting>, // sorted by doc_id
}

/// Term dictionary and collection statistics of a single field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldIndex {
    pub terms: BTreeMap<String, TermInfo>,
    pub sum_doc_freq: u64,
    pub sum_total_term_freq: u64,
    /// Documents with at least one term in this field.
    pub doc_count: u32,
}

impl FieldIndex {
    /// Appends a posting. Callers must add documents in ascending doc id order.
    pub(crate) fn add_posting(&mut self, term: String, doc_id: DocId, term_freq: u32) {
        let info = self.terms.entry(term).or_default();
        debug_assert!(info.postings.last().map_or(true, |p| p.doc_id < doc_id));
        info.postings.push(Posting { doc_id, term_freq });
        info.doc_freq += 1;
        info.total_term_freq += u64::from(term_freq);
        self.sum_doc_freq += 1;
        self.sum_total_term_freq += u64::from(term_freq);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDoc {
    pub external_id: String,
    pub filename: String,
    /// Number of analyzed tokens in the content field.
    pub token_count: u32,
}

/// Frozen index snapshot. Built once by [`crate::IndexBuilder`], read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    pub(crate) fields: BTreeMap<Field, FieldIndex>,
    pub(crate) docs: Vec<StoredDoc>,
    pub(crate) analyzer: AnalyzerConfig,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub(crate) fn from_parts(fields: BTreeMap<Field, FieldIndex>, docs: Vec<StoredDoc>, analyzer: AnalyzerConfig) -> Self {
        Self { fields, docs, analyzer }
    }

    pub fn num_docs(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn num_terms(&self) -> u64 {
        self.fields.values().map(|f| f.terms.len() as u64).sum()
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&StoredDoc> {
        self.docs.get(doc_id as usize)
    }

    pub fn docs(&self) -> &[StoredDoc] {
        &self.docs
    }

    pub fn field(&self, field: Field) -> Option<&FieldIndex> {
        self.fields.get(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &FieldIndex)> {
        self.fields.iter().map(|(f, idx)| (*f, idx))
    }

    pub fn term(&self, field: Field, term: &str) -> Option<&TermInfo> {
        self.fields.get(&field)?.terms.get(term)
    }

    pub fn postings(&self, field: Field, term: &str) -> &[Posting] {
        self.term(field, term).map_or(&[], |info| info.postings.as_slice())
    }

    /// Analyzer settings the index was built with; queries must use the same.
    pub fn analyzer(&self) -> &AnalyzerConfig {
        &self.analyzer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip() {
        for f in Field::ALL {
            assert_eq!(f.as_str().parse::<Field>().unwrap(), f);
        }
        assert!(matches!("title".parse::<Field>(), Err(ParseError::UnknownField { .. })));
        assert!("Content".parse::<Field>().is_err());
    }

    #[test]
    fn add_posting_keeps_statistics() {
        let mut fi = FieldIndex::default();
        fi.add_posting("rust".into(), 0, 3);
        fi.add_posting("rust".into(), 2, 1);
        fi.add_posting("go".into(), 2, 1);
        let info = &fi.terms["rust"];
        assert_eq!(info.doc_freq, 2);
        assert_eq!(info.total_term_freq, 4);
        assert_eq!(fi.sum_doc_freq, 3);
        assert_eq!(fi.sum_total_term_freq, 5);
    }

    #[test]
    fn missing_terms_have_no_postings() {
        let index = InvertedIndex::new();
        assert_eq!(index.num_docs(), 0);
        assert!(index.postings(Field::Content, "anything").is_empty());
        assert!(index.term(Field::Id, "x").is_none());
    }
}
