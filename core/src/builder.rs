use crate::error::BuildError;
use crate::tokenizer::{Analyzer, AnalyzerConfig};
use crate::{DocId, Field, FieldIndex, InvertedIndex, StoredDoc};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// A document handed over by the discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub external_id: String,
    pub filename: String,
    pub content: String,
}

impl Document {
    pub fn new(external_id: impl Into<String>, filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self { external_id: external_id.into(), filename: filename.into(), content: content.into() }
    }
}

/// What to do when a document cannot be ingested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Skip the document and keep a warning.
    #[default]
    SkipFailed,
    /// Abort the whole build on the first failure.
    AllOrNothing,
}

#[derive(Debug)]
pub struct BuildOutput {
    pub index: InvertedIndex,
    /// Documents skipped under [`FailurePolicy::SkipFailed`].
    pub warnings: Vec<BuildError>,
}

/// Per-document term frequencies, computed without touching shared state.
struct AnalyzedDoc {
    stored: StoredDoc,
    terms: Vec<(Field, String, u32)>,
}

fn analyze_document(analyzer: &Analyzer, doc: Document) -> AnalyzedDoc {
    let mut terms = Vec::new();
    // keyword fields: the whole value is a single term
    if !doc.external_id.is_empty() {
        terms.push((Field::Id, doc.external_id.clone(), 1));
    }
    if !doc.filename.is_empty() {
        terms.push((Field::Filename, doc.filename.clone(), 1));
    }

    let tokens = analyzer.analyze(&doc.content);
    let token_count = tokens.len() as u32;
    let mut tf_counts: HashMap<String, u32> = HashMap::new();
    for term in tokens {
        *tf_counts.entry(term).or_insert(0) += 1;
    }
    terms.extend(tf_counts.into_iter().map(|(term, tf)| (Field::Content, term, tf)));

    AnalyzedDoc {
        stored: StoredDoc { external_id: doc.external_id, filename: doc.filename, token_count },
        terms,
    }
}

/// Accumulates documents into postings lists. Doc ids are handed out
/// sequentially from 0, so every postings list stays sorted without a sort step.
pub struct IndexBuilder {
    analyzer: Analyzer,
    policy: FailurePolicy,
    fields: BTreeMap<Field, FieldIndex>,
    docs: Vec<StoredDoc>,
    warnings: Vec<BuildError>,
}

impl IndexBuilder {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            analyzer: Analyzer::new(config),
            policy: FailurePolicy::default(),
            fields: BTreeMap::new(),
            docs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn add_document(&mut self, doc: Document) -> Result<DocId, BuildError> {
        let analyzed = analyze_document(&self.analyzer, doc);
        self.merge(analyzed)
    }

    /// Tokenizes the batch on the rayon pool, then merges the results in input
    /// order. Produces exactly what sequential `add_document` calls would.
    pub fn add_documents_parallel(&mut self, docs: Vec<Document>) -> Result<Vec<DocId>, BuildError> {
        let analyzer = &self.analyzer;
        let analyzed: Vec<AnalyzedDoc> = docs.into_par_iter().map(|d| analyze_document(analyzer, d)).collect();
        analyzed.into_iter().map(|a| self.merge(a)).collect()
    }

    /// Reports a document the caller failed to load.
    pub fn record_failure(&mut self, error: BuildError) -> Result<(), BuildError> {
        match self.policy {
            FailurePolicy::AllOrNothing => Err(error),
            FailurePolicy::SkipFailed => {
                tracing::warn!(error = %error, "skipping document");
                self.warnings.push(error);
                Ok(())
            }
        }
    }

    fn merge(&mut self, analyzed: AnalyzedDoc) -> Result<DocId, BuildError> {
        let doc_id = DocId::try_from(self.docs.len()).map_err(|_| BuildError::TooManyDocuments)?;
        let mut seen = [false; Field::ALL.len()];
        for (field, term, tf) in analyzed.terms {
            let field_index = self.fields.entry(field).or_default();
            if !seen[field as usize] {
                seen[field as usize] = true;
                field_index.doc_count += 1;
            }
            field_index.add_posting(term, doc_id, tf);
        }
        self.docs.push(analyzed.stored);
        Ok(doc_id)
    }

    /// Freezes the accumulated postings into a read-only snapshot.
    pub fn finish(self) -> BuildOutput {
        let index = InvertedIndex::from_parts(self.fields, self.docs, *self.analyzer.config());
        tracing::info!(
            num_docs = index.num_docs(),
            num_terms = index.num_terms(),
            skipped = self.warnings.len(),
            "index build complete"
        );
        BuildOutput { index, warnings: self.warnings }
    }
}

/// Builds a snapshot from `(external_id, filename, content)` documents. `Err`
/// items are load failures reported by the caller and handled per `policy`.
pub fn build<I>(documents: I, config: AnalyzerConfig, policy: FailurePolicy) -> Result<BuildOutput, BuildError>
where
    I: IntoIterator<Item = Result<Document, BuildError>>,
{
    let mut builder = IndexBuilder::new(config).with_policy(policy);
    for doc in documents {
        match doc {
            Ok(doc) => {
                builder.add_document(doc)?;
            }
            Err(e) => builder.record_failure(e)?,
        }
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_fields_are_verbatim() {
        let mut b = IndexBuilder::new(AnalyzerConfig::default());
        b.add_document(Document::new("Doc-1", "Notes Final.TXT", "hello")).unwrap();
        let index = b.finish().index;
        assert_eq!(index.term(Field::Id, "Doc-1").unwrap().doc_freq, 1);
        assert_eq!(index.term(Field::Filename, "Notes Final.TXT").unwrap().doc_freq, 1);
        assert!(index.term(Field::Content, "hello").is_some());
    }

    #[test]
    fn token_count_and_field_doc_count() {
        let mut b = IndexBuilder::new(AnalyzerConfig::default());
        b.add_document(Document::new("a", "a.txt", "one two two")).unwrap();
        b.add_document(Document::new("b", "b.txt", "")).unwrap();
        let index = b.finish().index;
        assert_eq!(index.doc(0).unwrap().token_count, 3);
        assert_eq!(index.doc(1).unwrap().token_count, 0);
        assert_eq!(index.field(Field::Content).unwrap().doc_count, 1);
        assert_eq!(index.field(Field::Id).unwrap().doc_count, 2);
    }

    #[test]
    fn all_or_nothing_aborts() {
        let docs = vec![
            Ok(Document::new("a", "a.txt", "x")),
            Err(BuildError::Decode { path: "b.txt".into() }),
        ];
        let err = build(docs, AnalyzerConfig::default(), FailurePolicy::AllOrNothing).unwrap_err();
        assert!(matches!(err, BuildError::Decode { .. }));
    }
}
