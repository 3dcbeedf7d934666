use crate::{Field, InvertedIndex};
use serde::Serialize;
use std::fmt;

/// Collection statistics of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldStats {
    pub field: Field,
    pub doc_count: u32,
    pub unique_terms: u64,
    pub sum_doc_freq: u64,
    pub sum_total_term_freq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub num_docs: u32,
    pub fields: Vec<FieldStats>,
}

impl IndexStats {
    /// Aggregates for every known field; fields without terms report zeros.
    pub fn collect(index: &InvertedIndex) -> Self {
        let fields = Field::ALL
            .into_iter()
            .map(|field| match index.field(field) {
                Some(fi) => FieldStats {
                    field,
                    doc_count: fi.doc_count,
                    unique_terms: fi.terms.len() as u64,
                    sum_doc_freq: fi.sum_doc_freq,
                    sum_total_term_freq: fi.sum_total_term_freq,
                },
                None => FieldStats { field, doc_count: 0, unique_terms: 0, sum_doc_freq: 0, sum_total_term_freq: 0 },
            })
            .collect();
        Self { num_docs: index.num_docs(), fields }
    }

    pub fn field(&self, field: Field) -> Option<&FieldStats> {
        self.fields.iter().find(|s| s.field == field)
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "documents in index: {}", self.num_docs)?;
        for s in &self.fields {
            writeln!(f, "field {}", s.field)?;
            writeln!(f, "  documents with field: {}", s.doc_count)?;
            writeln!(f, "  distinct terms: {}", s.unique_terms)?;
            writeln!(f, "  sum of df: {}", s.sum_doc_freq)?;
            writeln!(f, "  sum of tf: {}", s.sum_total_term_freq)?;
        }
        Ok(())
    }
}

/// Number of documents containing `term` in `field`; 0 when absent.
pub fn doc_freq(index: &InvertedIndex, field: Field, term: &str) -> u32 {
    index.term(field, term).map_or(0, |info| info.doc_freq)
}

/// Occurrences of `term` in `field` across the collection; 0 when absent.
pub fn total_term_freq(index: &InvertedIndex, field: Field, term: &str) -> u64 {
    index.term(field, term).map_or(0, |info| info.total_term_freq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_index_reports_zeros() {
        let stats = IndexStats::collect(&InvertedIndex::new());
        assert_eq!(stats.num_docs, 0);
        assert_eq!(stats.fields.len(), 3);
        assert!(stats.fields.iter().all(|s| s.sum_doc_freq == 0 && s.sum_total_term_freq == 0));
        let report = stats.to_string();
        assert!(report.starts_with("documents in index: 0\n"));
        assert!(report.contains("field content\n"));
    }
}
