//! Catalog ingestion for procgen
//!
//! Turns the catalog's flat, level-tagged argument listing into nested
//! per-function argument trees, and resolves referenced composite types:
//!
//! - [`row`]: the argument-row contract and type specs shared with members.
//! - [`normalize`]: the level-stack tree builder.
//! - [`catalog`]: the async [`CatalogSource`] trait and a JSON snapshot source.
//! - [`single_flight`]: promise-per-key map used for every shared cache.
//! - [`resolver`]: memoized, cycle-detecting composite type resolution.

pub mod catalog;
pub mod error;
pub mod normalize;
pub mod resolver;
pub mod row;
pub mod single_flight;

pub use catalog::{CatalogSource, CollectionRow, MemberRow, SnapshotCatalog};
pub use error::{CatalogError, NormalizeError, ResolveError};
pub use normalize::{normalize, NameFilter, RawFunction, RawNode, RowNormalizer};
pub use resolver::{Resolution, TypeResolver};
pub use row::{ArgumentRow, Classified, TypeSpec};
pub use single_flight::SingleFlight;
