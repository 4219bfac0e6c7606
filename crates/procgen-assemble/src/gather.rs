//! Concurrent metadata gathering.
//!
//! Rows are consumed in catalog order on the calling task. The first time a
//! package or a composite root shows up, a task is spawned for it on a pool
//! bounded by `GenConfig::workers`. Results land in promise-per-key maps (the
//! resolver's own caches and a docs map) and are joined by key once the row
//! stream is done. The whole phase runs under one deadline; when it expires
//! the task set is dropped, which aborts whatever is still in flight.

use crate::assembler::{Assembled, AssemblyInput, ModelAssembler};
use crate::convert::ResolutionTable;
use crate::error::{AssembleError, DocsError};
use procgen_ingest_catalog::{
    CatalogSource, NameFilter, RowNormalizer, SingleFlight, TypeResolver,
};
use procgen_ingest_docs::{parse_package_source, AnnotationEngine, PackageDocs};
use procgen_model::{Annotation, CompositeKind, GenConfig, TypeKey};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

type DocsMap = SingleFlight<String, Result<PackageDocs, DocsError>>;

pub struct Gatherer<C> {
    catalog: Arc<C>,
    config: GenConfig,
    filter: Option<NameFilter>,
    annotations: Vec<Annotation>,
}

struct Gathered {
    input: AssemblyInput,
    type_fetches: usize,
}

impl<C: CatalogSource + 'static> Gatherer<C> {
    pub fn new(catalog: Arc<C>, config: GenConfig) -> Self {
        Gatherer {
            catalog,
            config,
            filter: None,
            annotations: Vec::new(),
        }
    }

    /// Only objects whose `package.object` name passes take part.
    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Directives applied on top of the in-source ones.
    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations.extend(annotations);
        self
    }

    /// Gather under the deadline, then assemble.
    pub async fn run(&self) -> Result<Assembled, AssembleError> {
        let budget = Duration::from_secs(self.config.deadline_secs);
        let gathered = match timeout_at(Instant::now() + budget, self.gather()).await {
            Ok(gathered) => gathered?,
            Err(_) => {
                warn!(deadline = ?budget, "metadata gathering timed out");
                return Err(AssembleError::Timeout(budget));
            }
        };
        let mut assembled = ModelAssembler::new(self.config.clone()).assemble(gathered.input)?;
        assembled.summary.type_fetches = gathered.type_fetches;
        Ok(assembled)
    }

    async fn gather(&self) -> Result<Gathered, AssembleError> {
        let rows = self.catalog.argument_rows().await?;
        let resolver = Arc::new(TypeResolver::new(self.catalog.clone()));
        let docs: Arc<DocsMap> = Arc::new(SingleFlight::new());
        let engine = Arc::new(AnnotationEngine::new(self.config.markers.clone()));
        let permits = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();

        let mut normalizer = match &self.filter {
            Some(filter) => RowNormalizer::with_filter(filter.clone()),
            None => RowNormalizer::new(),
        };
        let mut packages = BTreeSet::new();
        let mut roots: HashSet<(CompositeKind, TypeKey)> = HashSet::new();
        let mut functions = Vec::new();

        for row in &rows {
            if !normalizer.accepts(row) {
                continue;
            }
            let package = row.package.to_ascii_uppercase();
            if packages.insert(package.clone()) {
                let catalog = self.catalog.clone();
                let docs = docs.clone();
                let engine = engine.clone();
                let permits = permits.clone();
                tasks.spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    docs.get_or_run(package.clone(), || fetch_docs(catalog, package, engine))
                        .await;
                });
            }

            let spec = row.type_spec();
            if let (Some(kind), Some(key)) = (spec.composite_kind(), spec.type_ref) {
                if roots.insert((kind, key.clone())) {
                    let resolver = resolver.clone();
                    let permits = permits.clone();
                    tasks.spawn(async move {
                        let Ok(_permit) = permits.acquire_owned().await else {
                            return;
                        };
                        if let Err(err) = resolver.resolve(kind, &key).await {
                            debug!(key = %key, error = %err, "resolution failed");
                        }
                    });
                }
            }

            if let Some(f) = normalizer.push(row)? {
                functions.push(f);
            }
        }
        functions.extend(normalizer.finish());

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|err| AssembleError::Task(err.to_string()))?;
        }

        let mut resolutions = ResolutionTable::default();
        for (kind, key) in roots {
            if let Some(result) = resolver.cached(kind, &key) {
                resolutions.insert(kind, key, result);
            }
        }

        let mut warnings = Vec::new();
        let mut by_package = BTreeMap::new();
        for package in packages {
            let parsed = match docs.get(&package) {
                Some(Ok(parsed)) => parsed,
                Some(Err(err)) => {
                    warn!(package = %package, error = %err, "no documentation for package");
                    warnings.push(format!("{package}: {err}"));
                    PackageDocs::empty(&package)
                }
                None => PackageDocs::empty(&package),
            };
            by_package.insert(package, parsed);
        }

        Ok(Gathered {
            input: AssemblyInput {
                functions,
                resolutions,
                packages: by_package,
                extra_annotations: self.annotations.clone(),
                warnings,
            },
            type_fetches: resolver.fetch_count(),
        })
    }
}

async fn fetch_docs<C: CatalogSource>(
    catalog: Arc<C>,
    package: String,
    engine: Arc<AnnotationEngine>,
) -> Result<PackageDocs, DocsError> {
    match catalog.package_source(&package).await? {
        Some(source) => Ok(parse_package_source(&package, &source, &engine)?),
        None => Ok(PackageDocs::empty(&package)),
    }
}
