use thiserror::Error;

/// Malformed query syntax. Reported to the caller; no index state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("query is empty")]
    Empty,

    #[error("unbalanced parenthesis at offset {offset}")]
    UnbalancedGroup { offset: usize },

    #[error("empty group at offset {offset}")]
    EmptyGroup { offset: usize },

    #[error("groups nested deeper than {max} levels at offset {offset}")]
    NestingTooDeep { offset: usize, max: usize },

    #[error("unknown field `{name}`")]
    UnknownField { name: String },

    #[error("`{operator}` at offset {offset} is not followed by a term")]
    DanglingOperator { operator: String, offset: usize },

    #[error("unexpected `{operator}` at offset {offset}")]
    MisplacedConjunction { operator: String, offset: usize },
}

/// Failure to ingest one document. Skipped with a warning unless the build
/// runs all-or-nothing.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{path}` is not valid UTF-8")]
    Decode { path: String },

    #[error("document `{external_id}` rejected: {reason}")]
    Rejected { external_id: String, reason: String },

    #[error("too many documents for a 32-bit doc id space")]
    TooManyDocuments,
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("query was cancelled")]
    Cancelled,
}

/// Structural problems found while loading a persisted snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}
