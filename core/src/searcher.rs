use crate::error::{ParseError, SearchError};
use crate::persist::{load_index, IndexPaths};
use crate::query::{Query, QueryParser};
use crate::search::{evaluate_with_cancel, CancelFlag};
use crate::stats::{self, IndexStats};
use crate::tokenizer::Analyzer;
use crate::{DocId, Field, InvertedIndex};
use anyhow::Result;
use parking_lot::RwLock;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub external_id: String,
    pub filename: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    /// The parsed query that was executed.
    pub query: Query,
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
    pub took: Duration,
}

/// Query API over the current index snapshot.
///
/// Readers clone the current `Arc` and evaluate without holding any lock;
/// [`Searcher::publish`] swaps in a fully built snapshot while in-flight
/// queries finish against the one they started with.
pub struct Searcher {
    current: RwLock<Arc<InvertedIndex>>,
    default_field: Field,
}

impl Searcher {
    pub fn new(index: InvertedIndex) -> Self {
        Self::from_shared(Arc::new(index))
    }

    pub fn from_shared(index: Arc<InvertedIndex>) -> Self {
        Self { current: RwLock::new(index), default_field: Field::Content }
    }

    /// Loads a persisted snapshot; it is validated before it becomes searchable.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let index = load_index(&IndexPaths::new(dir))?;
        Ok(Self::new(index))
    }

    pub fn with_default_field(mut self, field: Field) -> Self {
        self.default_field = field;
        self
    }

    pub fn snapshot(&self) -> Arc<InvertedIndex> {
        self.current.read().clone()
    }

    /// Makes `index` the current snapshot and returns the previous one.
    pub fn publish(&self, index: InvertedIndex) -> Arc<InvertedIndex> {
        let next = Arc::new(index);
        let (num_docs, num_terms) = (next.num_docs(), next.num_terms());
        let previous = std::mem::replace(&mut *self.current.write(), next);
        tracing::info!(num_docs, num_terms, "published index snapshot");
        previous
    }

    pub fn parse(&self, query: &str) -> Result<Query, ParseError> {
        let snapshot = self.snapshot();
        self.parser(&snapshot).parse(query)
    }

    fn parser(&self, index: &InvertedIndex) -> QueryParser {
        QueryParser::new(self.default_field, Analyzer::new(*index.analyzer()))
    }

    pub fn search(&self, query: &str, k: usize) -> Result<SearchResults, SearchError> {
        self.search_with_cancel(query, k, &CancelFlag::new())
    }

    pub fn search_with_cancel(&self, query: &str, k: usize, cancel: &CancelFlag) -> Result<SearchResults, SearchError> {
        let start = Instant::now();
        let snapshot = self.snapshot();
        let parsed = self.parser(&snapshot).parse(query)?;
        let top = evaluate_with_cancel(&parsed, &snapshot, k, cancel)?;

        let hits = top
            .hits
            .into_iter()
            .filter_map(|r| {
                let doc = snapshot.doc(r.doc_id)?;
                Some(SearchHit {
                    doc_id: r.doc_id,
                    external_id: doc.external_id.clone(),
                    filename: doc.filename.clone(),
                    score: r.score,
                })
            })
            .collect();
        let took = start.elapsed();
        tracing::debug!(query = %parsed, total_hits = top.total_hits, took_ms = took.as_millis() as u64, "search");
        Ok(SearchResults { query: parsed, total_hits: top.total_hits, hits, took })
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats::collect(&self.snapshot())
    }

    pub fn doc_freq(&self, field: Field, term: &str) -> u32 {
        stats::doc_freq(&self.snapshot(), field, term)
    }

    pub fn total_term_freq(&self, field: Field, term: &str) -> u64 {
        stats::total_term_freq(&self.snapshot(), field, term)
    }
}
