use procgen_model::{CompositeKind, TypeKey};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("invalid catalog snapshot: {0}")]
    Snapshot(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Snapshot(err.to_string())
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("{function}: row {sequence} at level {level} has no composite parent at level {parent}")]
    OrphanLevel {
        function: String,
        sequence: u32,
        level: u32,
        parent: u32,
    },
    #[error("{function}: collection {collection:?} already has an element (row {sequence})")]
    CollectionArity {
        function: String,
        collection: String,
        sequence: u32,
    },
    #[error("{function}: sequence {sequence} does not follow {previous}")]
    OutOfOrder {
        function: String,
        sequence: u32,
        previous: u32,
    },
}

/// Resolution failures are cached per key and handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("composite type {key} not found in the catalog")]
    NotFound { key: TypeKey },
    #[error("unknown composite type code {data_kind:?}")]
    UnknownCompositeKind { data_kind: String },
    #[error("unknown scalar type {data_kind:?} ({context})")]
    UnknownScalarType { data_kind: String, context: String },
    #[error("recursive type {key} is not supported: {}", format_path(.path))]
    UnsupportedRecursiveType { key: TypeKey, path: Vec<TypeKey> },
    #[error("{key} is a {found}, not a {expected}")]
    KindMismatch {
        key: TypeKey,
        expected: CompositeKind,
        found: CompositeKind,
    },
    #[error("{context}: composite {member:?} has no type reference and no element")]
    MissingElement { context: String, member: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ResolveError {
    /// Failures the skip policy may turn into a warning.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            ResolveError::NotFound { .. }
                | ResolveError::UnknownCompositeKind { .. }
                | ResolveError::UnknownScalarType { .. }
                | ResolveError::MissingElement { .. }
        )
    }
}

fn format_path(path: &[TypeKey]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let a = TypeKey::new("APP", "PKG", "A");
        let b = TypeKey::new("APP", "PKG", "B");
        let err = ResolveError::UnsupportedRecursiveType {
            key: a.clone(),
            path: vec![a.clone(), b, a],
        };
        assert_eq!(
            err.to_string(),
            "recursive type APP.PKG.A is not supported: APP.PKG.A -> APP.PKG.B -> APP.PKG.A"
        );
        assert!(!err.is_skippable());
    }
}
