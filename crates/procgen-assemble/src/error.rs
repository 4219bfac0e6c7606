use procgen_ingest_catalog::{CatalogError, NormalizeError, ResolveError};
use procgen_ingest_docs::LexError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("{function}: {source}")]
    Resolve {
        function: String,
        #[source]
        source: ResolveError,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("metadata gathering did not finish within {0:?}")]
    Timeout(Duration),
    #[error("gather task failed: {0}")]
    Task(String),
}

/// Why a package contributed no documentation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocsError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Lex(#[from] LexError),
}
