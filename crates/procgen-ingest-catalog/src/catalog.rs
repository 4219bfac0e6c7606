//! Catalog access.
//!
//! The live catalog queries are an external collaborator; the pipeline only
//! sees [`CatalogSource`]. [`SnapshotCatalog`] serves a JSON export of the
//! same data and backs the CLI and the tests.

use crate::error::CatalogError;
use crate::row::{type_ref, ArgumentRow, TypeSpec};
use async_trait::async_trait;
use procgen_model::TypeKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// One record attribute, or a collection's element, as the catalog lists it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberRow {
    pub name: String,
    pub data_kind: String,
    pub precision: u32,
    pub scale: i32,
    pub length: u32,
    pub charset: String,
    pub type_owner: String,
    pub type_package: String,
    pub type_name: String,
}

impl MemberRow {
    pub fn type_spec(&self) -> TypeSpec {
        TypeSpec {
            data_kind: self.data_kind.clone(),
            precision: self.precision,
            scale: self.scale,
            length: self.length,
            charset: self.charset.clone(),
            type_ref: type_ref(&self.type_owner, &self.type_package, &self.type_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRow {
    pub element: MemberRow,
    /// Index-by (associative) table rather than a dense array.
    #[serde(default)]
    pub indexed: bool,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// The full argument listing, in `(owner, package, object, sequence)` order.
    async fn argument_rows(&self) -> Result<Vec<ArgumentRow>, CatalogError>;

    /// Attributes of a record type in declared order; empty when unknown.
    async fn record_attributes(&self, key: &TypeKey) -> Result<Vec<MemberRow>, CatalogError>;

    /// Element of a collection type, `None` when unknown.
    async fn collection_element(&self, key: &TypeKey)
        -> Result<Option<CollectionRow>, CatalogError>;

    /// Source text of a package specification, `None` when unavailable.
    async fn package_source(&self, package: &str) -> Result<Option<String>, CatalogError>;
}

// ============================================================================
// JSON snapshot
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordEntry {
    #[serde(flatten)]
    key: TypeKey,
    attributes: Vec<MemberRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionEntry {
    #[serde(flatten)]
    key: TypeKey,
    #[serde(flatten)]
    collection: CollectionRow,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SnapshotFile {
    arguments: Vec<ArgumentRow>,
    records: Vec<RecordEntry>,
    collections: Vec<CollectionEntry>,
    sources: BTreeMap<String, String>,
}

/// In-memory catalog loaded from a JSON export.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCatalog {
    arguments: Vec<ArgumentRow>,
    records: HashMap<TypeKey, Vec<MemberRow>>,
    collections: HashMap<TypeKey, CollectionRow>,
    sources: HashMap<String, String>,
}

impl SnapshotCatalog {
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let file: SnapshotFile = serde_json::from_str(text)?;
        let mut catalog = SnapshotCatalog {
            arguments: file.arguments,
            ..SnapshotCatalog::default()
        };
        for r in file.records {
            catalog.records.insert(r.key, r.attributes);
        }
        for c in file.collections {
            catalog.collections.insert(c.key, c.collection);
        }
        for (package, text) in file.sources {
            catalog.sources.insert(package.to_ascii_uppercase(), text);
        }
        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn with_arguments(mut self, rows: Vec<ArgumentRow>) -> Self {
        self.arguments = rows;
        self
    }

    pub fn with_record(mut self, key: TypeKey, attributes: Vec<MemberRow>) -> Self {
        self.records.insert(key, attributes);
        self
    }

    pub fn with_collection(mut self, key: TypeKey, collection: CollectionRow) -> Self {
        self.collections.insert(key, collection);
        self
    }

    pub fn with_source(mut self, package: &str, text: impl Into<String>) -> Self {
        self.sources.insert(package.to_ascii_uppercase(), text.into());
        self
    }
}

#[async_trait]
impl CatalogSource for SnapshotCatalog {
    async fn argument_rows(&self) -> Result<Vec<ArgumentRow>, CatalogError> {
        Ok(self.arguments.clone())
    }

    async fn record_attributes(&self, key: &TypeKey) -> Result<Vec<MemberRow>, CatalogError> {
        Ok(self.records.get(key).cloned().unwrap_or_default())
    }

    async fn collection_element(
        &self,
        key: &TypeKey,
    ) -> Result<Option<CollectionRow>, CatalogError> {
        Ok(self.collections.get(key).cloned())
    }

    async fn package_source(&self, package: &str) -> Result<Option<String>, CatalogError> {
        Ok(self.sources.get(&package.to_ascii_uppercase()).cloned())
    }
}
