//! In-memory inverted index with boolean, field-scoped queries and TF-IDF
//! top-k ranking.
//!
//! Documents go through [`IndexBuilder`] into a frozen [`InvertedIndex`]
//! snapshot, which is shared read-only between concurrent queries via
//! [`Searcher`].

pub mod builder;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod search;
pub mod searcher;
pub mod stats;
pub mod tokenizer;

pub use builder::{build, BuildOutput, Document, FailurePolicy, IndexBuilder};
pub use error::{BuildError, ParseError, SearchError, SnapshotError};
pub use index::{DocId, Field, FieldIndex, InvertedIndex, Posting, StoredDoc, TermInfo};
pub use query::{parse, Query, QueryParser};
pub use search::{evaluate, evaluate_with_cancel, CancelFlag, ScoredResult, TopDocs};
pub use searcher::{SearchHit, SearchResults, Searcher};
pub use stats::{doc_freq, total_term_freq, FieldStats, IndexStats};
pub use tokenizer::{tokenize, Analyzer, AnalyzerConfig};
