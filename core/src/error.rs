use crate::DocId;
use std::io;
use thiserror::Error;

/// Errors raised while building, loading or querying an index.
///
/// Malformed input and contract violations are fatal for the current run;
/// query, tunable and missing-part errors only reject a single request and
/// the caller can carry on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed {context} at line {line}: {message}")]
    Malformed {
        context: String,
        line: usize,
        message: String,
    },

    #[error("term '{stem}' already has postings for document {doc}")]
    DuplicateDocument { stem: String, doc: DocId },

    #[error("term '{stem}' has no postings for document {doc}")]
    MissingDocument { stem: String, doc: DocId },

    #[error("term '{stem}' already has position {pos} in document {doc}")]
    DuplicatePosition { stem: String, doc: DocId, pos: u32 },

    #[error("term '{stem}' has no postings to compute IDF")]
    EmptyPostings { stem: String },

    #[error("the model has no vector for document {0}")]
    UnknownVector(DocId),

    #[error("the model already has a vector for document {0}")]
    DuplicateVector(DocId),

    #[error("no document with id {0}")]
    UnknownDocument(DocId),

    #[error("invalid query '{0}'")]
    InvalidQuery(String),

    #[error("invalid value for {name}: {value}")]
    InvalidTunable { name: &'static str, value: usize },

    #[error("positional queries need the tiered index to be loaded")]
    IndexNotLoaded,

    #[error("ranked search needs the vector space models to be loaded")]
    ModelsNotLoaded,

    #[error("the record file of document {0} is not known")]
    UnknownSource(DocId),
}

impl Error {
    pub(crate) fn malformed(
        context: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Error::Malformed { context: context.into(), line, message: message.into() }
    }

    /// Whether the error only rejects one request rather than the whole run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidQuery(_)
                | Error::InvalidTunable { .. }
                | Error::IndexNotLoaded
                | Error::ModelsNotLoaded
                | Error::UnknownSource(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
