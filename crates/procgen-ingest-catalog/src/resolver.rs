//! Composite type resolution.
//!
//! Two single-flight caches back the resolver:
//!
//! - definitions: one catalog fetch per [`TypeKey`], never recursing, so a
//!   fetch cannot wait on itself;
//! - closures: the transitive definition set of a root `(kind, key)`, built
//!   by a depth-first walk over cached definitions.
//!
//! The walk keeps the chain of keys being built; meeting a key already on the
//! chain is a structural cycle and fails with
//! [`ResolveError::UnsupportedRecursiveType`].

use crate::catalog::{CatalogSource, CollectionRow, MemberRow};
use crate::error::ResolveError;
use crate::row::Classified;
use crate::single_flight::SingleFlight;
use procgen_model::{
    Attribute, CompositeKind, CompositeType, DataType, Indexing, TypeArena, TypeKey,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A resolved root with every definition it reaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub root: CompositeType,
    pub types: TypeArena,
}

#[derive(Debug)]
enum Definition {
    Record(Vec<MemberRow>),
    Collection(CollectionRow),
}

impl Definition {
    fn kind(&self) -> CompositeKind {
        match self {
            Definition::Record(_) => CompositeKind::Record,
            Definition::Collection(_) => CompositeKind::Collection,
        }
    }
}

type Walk<'a> = Pin<Box<dyn Future<Output = Result<(), ResolveError>> + Send + 'a>>;

pub struct TypeResolver<C> {
    catalog: Arc<C>,
    definitions: SingleFlight<TypeKey, Result<Arc<Definition>, ResolveError>>,
    closures: SingleFlight<(CompositeKind, TypeKey), Result<Arc<Resolution>, ResolveError>>,
    fetches: AtomicUsize,
}

impl<C: CatalogSource> TypeResolver<C> {
    pub fn new(catalog: Arc<C>) -> Self {
        TypeResolver {
            catalog,
            definitions: SingleFlight::new(),
            closures: SingleFlight::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Resolve a composite and everything it references. Repeated and
    /// concurrent calls for the same root share one result.
    pub async fn resolve(
        &self,
        kind: CompositeKind,
        key: &TypeKey,
    ) -> Result<Arc<Resolution>, ResolveError> {
        self.closures
            .get_or_run((kind, key.clone()), || async {
                self.build(kind, key.clone()).await.map(Arc::new)
            })
            .await
    }

    /// [`resolve`](Self::resolve) from a catalog type code.
    pub async fn resolve_code(
        &self,
        data_kind: &str,
        key: &TypeKey,
    ) -> Result<Arc<Resolution>, ResolveError> {
        let kind =
            CompositeKind::from_catalog(data_kind).ok_or_else(|| ResolveError::UnknownCompositeKind {
                data_kind: data_kind.to_string(),
            })?;
        self.resolve(kind, key).await
    }

    /// Completed resolution of a root, without starting one.
    pub fn cached(
        &self,
        kind: CompositeKind,
        key: &TypeKey,
    ) -> Option<Result<Arc<Resolution>, ResolveError>> {
        self.closures.get(&(kind, key.clone()))
    }

    /// Catalog definition fetches performed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn build(&self, kind: CompositeKind, key: TypeKey) -> Result<Resolution, ResolveError> {
        let mut types = TypeArena::default();
        let mut chain = Vec::new();
        self.walk(kind, key.clone(), &mut chain, &mut types).await?;
        let root = match kind {
            CompositeKind::Cursor => CompositeType::Cursor { key },
            _ => types
                .get(&key)
                .cloned()
                .ok_or(ResolveError::NotFound { key })?,
        };
        Ok(Resolution { root, types })
    }

    fn walk<'a>(
        &'a self,
        kind: CompositeKind,
        key: TypeKey,
        chain: &'a mut Vec<TypeKey>,
        types: &'a mut TypeArena,
    ) -> Walk<'a> {
        Box::pin(async move {
            // A cursor's rows are the record under the same key.
            let kind = match kind {
                CompositeKind::Cursor => CompositeKind::Record,
                other => other,
            };
            if let Some(at) = chain.iter().position(|k| *k == key) {
                let mut path = chain[at..].to_vec();
                path.push(key.clone());
                return Err(ResolveError::UnsupportedRecursiveType { key, path });
            }
            if types.contains(&key) {
                return Ok(());
            }

            let def = self.definition(kind, &key).await?;
            chain.push(key.clone());
            let built = match def.as_ref() {
                Definition::Record(members) => {
                    let mut attributes = Vec::with_capacity(members.len());
                    for m in members {
                        let data_type = member_type(m, &key)?;
                        if let DataType::Composite(r) = &data_type {
                            self.walk(r.kind, r.key.clone(), chain, types).await?;
                        }
                        attributes.push(Attribute {
                            name: m.name.clone(),
                            data_type,
                        });
                    }
                    CompositeType::Record {
                        key: key.clone(),
                        attributes,
                    }
                }
                Definition::Collection(c) => {
                    let element = member_type(&c.element, &key)?;
                    if let DataType::Composite(r) = &element {
                        self.walk(r.kind, r.key.clone(), chain, types).await?;
                    }
                    CompositeType::Collection {
                        key: key.clone(),
                        element,
                        indexing: if c.indexed {
                            Indexing::Associative
                        } else {
                            Indexing::Dense
                        },
                    }
                }
            };
            chain.pop();
            types.insert(built);
            Ok(())
        })
    }

    async fn definition(
        &self,
        kind: CompositeKind,
        key: &TypeKey,
    ) -> Result<Arc<Definition>, ResolveError> {
        let def = self
            .definitions
            .get_or_run(key.clone(), || self.fetch(kind, key.clone()))
            .await?;
        if def.kind() != kind {
            return Err(ResolveError::KindMismatch {
                key: key.clone(),
                expected: kind,
                found: def.kind(),
            });
        }
        Ok(def)
    }

    async fn fetch(&self, kind: CompositeKind, key: TypeKey) -> Result<Arc<Definition>, ResolveError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        debug!(key = %key, kind = %kind, "fetching composite definition");
        let def = match kind {
            CompositeKind::Collection => match self.catalog.collection_element(&key).await? {
                Some(c) => Definition::Collection(c),
                None => return Err(ResolveError::NotFound { key }),
            },
            CompositeKind::Record | CompositeKind::Cursor => {
                let members = self.catalog.record_attributes(&key).await?;
                if members.is_empty() {
                    return Err(ResolveError::NotFound { key });
                }
                Definition::Record(members)
            }
        };
        Ok(Arc::new(def))
    }
}

fn member_type(member: &MemberRow, parent: &TypeKey) -> Result<DataType, ResolveError> {
    let context = if member.name.is_empty() {
        parent.to_string()
    } else {
        format!("{}.{}", parent, member.name)
    };
    match member.type_spec().classify(&context)? {
        Classified::Scalar(s) => Ok(DataType::Scalar(s)),
        Classified::Composite {
            kind,
            type_ref: Some(key),
        } => Ok(DataType::composite(kind, key)),
        Classified::Composite { type_ref: None, .. } => Err(ResolveError::MissingElement {
            context,
            member: member.data_kind.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SnapshotCatalog;
    use crate::error::CatalogError;
    use crate::row::ArgumentRow;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::task::JoinSet;

    /// Snapshot catalog that answers slowly and counts definition fetches per key.
    struct SlowCatalog {
        inner: SnapshotCatalog,
        calls: Mutex<HashMap<TypeKey, usize>>,
    }

    impl SlowCatalog {
        fn new(inner: SnapshotCatalog) -> Self {
            SlowCatalog {
                inner,
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self, key: &TypeKey) -> usize {
            self.calls.lock().get(key).copied().unwrap_or(0)
        }

        async fn hit(&self, key: &TypeKey) {
            *self.calls.lock().entry(key.clone()).or_default() += 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[async_trait]
    impl CatalogSource for SlowCatalog {
        async fn argument_rows(&self) -> Result<Vec<ArgumentRow>, CatalogError> {
            self.inner.argument_rows().await
        }

        async fn record_attributes(&self, key: &TypeKey) -> Result<Vec<MemberRow>, CatalogError> {
            self.hit(key).await;
            self.inner.record_attributes(key).await
        }

        async fn collection_element(
            &self,
            key: &TypeKey,
        ) -> Result<Option<CollectionRow>, CatalogError> {
            self.hit(key).await;
            self.inner.collection_element(key).await
        }

        async fn package_source(&self, package: &str) -> Result<Option<String>, CatalogError> {
            self.inner.package_source(package).await
        }
    }

    fn member(name: &str, kind: &str, type_name: &str) -> MemberRow {
        MemberRow {
            name: name.into(),
            data_kind: kind.into(),
            type_owner: if type_name.is_empty() { "" } else { "APP" }.into(),
            type_package: if type_name.is_empty() { "" } else { "PKG" }.into(),
            type_name: type_name.into(),
            ..MemberRow::default()
        }
    }

    fn key(name: &str) -> TypeKey {
        TypeKey::new("APP", "PKG", name)
    }

    #[tokio::test]
    async fn resolves_collection_of_record() {
        let catalog = SnapshotCatalog::default()
            .with_collection(
                key("T_TAB"),
                CollectionRow {
                    element: member("", "PL/SQL RECORD", "T_REC"),
                    indexed: true,
                },
            )
            .with_record(
                key("T_REC"),
                vec![member("ID", "NUMBER", ""), member("NAME", "VARCHAR2", "")],
            );
        let resolver = TypeResolver::new(Arc::new(catalog));
        let res = resolver
            .resolve(CompositeKind::Collection, &key("T_TAB"))
            .await
            .expect("resolve");
        assert!(matches!(
            res.root,
            CompositeType::Collection {
                indexing: Indexing::Associative,
                ..
            }
        ));
        assert!(res.types.contains(&key("T_REC")));
        assert_eq!(resolver.fetch_count(), 2);

        let again = resolver
            .resolve(CompositeKind::Collection, &key("T_TAB"))
            .await
            .expect("resolve");
        assert!(Arc::ptr_eq(&res, &again));
        assert_eq!(resolver.fetch_count(), 2);
    }

    #[tokio::test]
    async fn cursor_uses_record_at_its_key() {
        let catalog =
            SnapshotCatalog::default().with_record(key("C_ROWS"), vec![member("ID", "NUMBER", "")]);
        let resolver = TypeResolver::new(Arc::new(catalog));
        let res = resolver
            .resolve(CompositeKind::Cursor, &key("C_ROWS"))
            .await
            .expect("resolve");
        assert_eq!(res.root, CompositeType::Cursor { key: key("C_ROWS") });
        assert!(matches!(
            res.types.get(&key("C_ROWS")),
            Some(CompositeType::Record { .. })
        ));

        // The record behind the cursor was fetched once and is shared.
        resolver
            .resolve(CompositeKind::Record, &key("C_ROWS"))
            .await
            .expect("resolve");
        assert_eq!(resolver.fetch_count(), 1);
    }

    #[tokio::test]
    async fn self_reference_is_a_cycle() {
        let catalog = SnapshotCatalog::default()
            .with_record(
                key("NODE"),
                vec![member("ID", "NUMBER", ""), member("KIDS", "TABLE", "NODES")],
            )
            .with_collection(
                key("NODES"),
                CollectionRow {
                    element: member("", "OBJECT", "NODE"),
                    indexed: false,
                },
            );
        let resolver = TypeResolver::new(Arc::new(catalog));
        let err = resolver
            .resolve(CompositeKind::Record, &key("NODE"))
            .await
            .expect_err("cycle");
        match err {
            ResolveError::UnsupportedRecursiveType { key: k, path } => {
                assert_eq!(k, key("NODE"));
                assert_eq!(path, vec![key("NODE"), key("NODES"), key("NODE")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_and_unknown_types() {
        let catalog = SnapshotCatalog::default()
            .with_record(key("R"), vec![member("X", "OPAQUE/XMLTYPE", "XMLTYPE")]);
        let resolver = TypeResolver::new(Arc::new(catalog));
        assert!(matches!(
            resolver.resolve(CompositeKind::Record, &key("NOPE")).await,
            Err(ResolveError::NotFound { .. })
        ));
        assert!(matches!(
            resolver.resolve(CompositeKind::Record, &key("R")).await,
            Err(ResolveError::UnknownCompositeKind { .. })
        ));
        assert!(matches!(
            resolver.resolve_code("MYSTERY", &key("R")).await,
            Err(ResolveError::UnknownCompositeKind { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resolves_fetch_each_key_once() {
        let catalog = Arc::new(SlowCatalog::new(
            SnapshotCatalog::default()
                .with_record(key("LEFT"), vec![member("C", "PL/SQL RECORD", "CHILD")])
                .with_record(key("RIGHT"), vec![member("C", "PL/SQL RECORD", "CHILD")])
                .with_record(key("CHILD"), vec![member("V", "VARCHAR2", "")]),
        ));
        let resolver = Arc::new(TypeResolver::new(catalog.clone()));

        let mut tasks = JoinSet::new();
        for i in 0..32 {
            let resolver = resolver.clone();
            let root = if i % 2 == 0 { key("LEFT") } else { key("RIGHT") };
            tasks.spawn(async move {
                let res = resolver.resolve(CompositeKind::Record, &root).await;
                (root, res)
            });
        }
        let mut left = Vec::new();
        let mut right = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (root, res) = joined.expect("join");
            let res = res.expect("resolve");
            if root == key("LEFT") {
                left.push(res);
            } else {
                right.push(res);
            }
        }

        assert_eq!(left.len(), 16);
        assert_eq!(right.len(), 16);
        assert!(left.iter().all(|r| Arc::ptr_eq(r, &left[0])));
        assert!(right.iter().all(|r| Arc::ptr_eq(r, &right[0])));
        assert!(left[0].types.contains(&key("CHILD")));
        assert!(right[0].types.contains(&key("CHILD")));
        assert_eq!(resolver.fetch_count(), 3);
        for name in ["LEFT", "RIGHT", "CHILD"] {
            assert_eq!(catalog.calls(&key(name)), 1, "{name}");
        }
    }

    #[tokio::test]
    async fn diamond_references_resolve_once() {
        let catalog = SnapshotCatalog::default()
            .with_record(
                key("TOP"),
                vec![member("A", "PL/SQL RECORD", "LEAF"), member("B", "PL/SQL RECORD", "LEAF")],
            )
            .with_record(key("LEAF"), vec![member("V", "VARCHAR2", "")]);
        let resolver = TypeResolver::new(Arc::new(catalog));
        let res = resolver
            .resolve(CompositeKind::Record, &key("TOP"))
            .await
            .expect("resolve");
        assert_eq!(res.types.len(), 2);
        assert_eq!(resolver.fetch_count(), 2);
    }
}
