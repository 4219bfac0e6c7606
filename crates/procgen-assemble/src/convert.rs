//! Argument trees to typed functions.
//!
//! Referenced composites come from the resolver's results. Composites the
//! rows spell out inline (no type reference, or a reference the catalog does
//! not know) are built from the rows under a synthesized key.

use procgen_ingest_catalog::{Classified, RawFunction, RawNode, Resolution, ResolveError};
use procgen_model::naming::inline_type_name;
use procgen_model::{
    Argument, Attribute, CompositeKind, CompositeType, DataType, Function, Indexing, TypeArena,
    TypeKey,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolver outcomes by root, as joined after the gather phase.
#[derive(Debug, Clone, Default)]
pub struct ResolutionTable {
    entries: HashMap<(CompositeKind, TypeKey), Result<Arc<Resolution>, ResolveError>>,
}

impl ResolutionTable {
    pub fn insert(
        &mut self,
        kind: CompositeKind,
        key: TypeKey,
        result: Result<Arc<Resolution>, ResolveError>,
    ) {
        self.entries.insert((kind, key), result);
    }

    pub fn get(
        &self,
        kind: CompositeKind,
        key: &TypeKey,
    ) -> Option<&Result<Arc<Resolution>, ResolveError>> {
        self.entries.get(&(kind, key.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) struct Converter<'a> {
    resolutions: &'a ResolutionTable,
    owner: String,
    package: String,
    object: String,
    pub(crate) types: TypeArena,
}

impl<'a> Converter<'a> {
    pub(crate) fn new(resolutions: &'a ResolutionTable, raw: &RawFunction) -> Self {
        Converter {
            resolutions,
            owner: raw.owner.clone(),
            package: raw.package.clone(),
            object: raw.name.clone(),
            types: TypeArena::default(),
        }
    }

    pub(crate) fn function(&mut self, raw: &RawFunction) -> Result<Function, ResolveError> {
        let mut f = Function::new(&raw.owner, &raw.package, &raw.name);
        for (i, node) in raw.arguments.iter().enumerate() {
            let mut path = vec![node.name.clone()];
            let data_type = self.node_type(node, &mut path)?;
            f.arguments.push(Argument {
                name: node.name.clone(),
                data_type,
                direction: node.direction,
                position: i as u32 + 1,
            });
        }
        if let Some(ret) = &raw.returns {
            let mut path = vec!["RET".to_string()];
            f.returns = Some(Attribute {
                name: "ret".to_string(),
                data_type: self.node_type(ret, &mut path)?,
            });
        }
        Ok(f)
    }

    fn context(&self, path: &[String]) -> String {
        format!("{}.{}.{}", self.package, self.object, path.join("."))
    }

    fn node_type(&mut self, node: &RawNode, path: &mut Vec<String>) -> Result<DataType, ResolveError> {
        let resolutions = self.resolutions;
        match node.spec.classify(&self.context(path))? {
            Classified::Scalar(s) => Ok(DataType::Scalar(s)),
            Classified::Composite {
                kind,
                type_ref: Some(key),
            } => match resolutions.get(kind, &key) {
                Some(Ok(res)) => {
                    self.types.extend(&res.types);
                    Ok(DataType::composite(kind, key))
                }
                Some(Err(ResolveError::NotFound { .. })) | None if !node.children.is_empty() => {
                    self.inline(kind, node, path, Some(key))
                }
                Some(Err(err)) => Err(err.clone()),
                None => Err(ResolveError::NotFound { key }),
            },
            Classified::Composite {
                kind,
                type_ref: None,
            } => self.inline(kind, node, path, None),
        }
    }

    fn synthesized(&self, path: &[String], suffix: &str) -> TypeKey {
        let parts: Vec<&str> = path.iter().map(String::as_str).collect();
        TypeKey::new(
            &self.owner,
            &self.package,
            inline_type_name(&self.object, &parts, suffix),
        )
    }

    fn child_type(
        &mut self,
        child: &RawNode,
        path: &mut Vec<String>,
        fallback: &str,
    ) -> Result<DataType, ResolveError> {
        let name = if child.name.is_empty() {
            fallback.to_string()
        } else {
            child.name.clone()
        };
        path.push(name);
        let out = self.node_type(child, path);
        path.pop();
        out
    }

    fn inline(
        &mut self,
        kind: CompositeKind,
        node: &RawNode,
        path: &mut Vec<String>,
        key: Option<TypeKey>,
    ) -> Result<DataType, ResolveError> {
        let context = self.context(path);
        let missing = || ResolveError::MissingElement {
            context: context.clone(),
            member: node.spec.data_kind.clone(),
        };
        match kind {
            CompositeKind::Record => {
                let key = key.unwrap_or_else(|| self.synthesized(path, "rec"));
                let mut attributes = Vec::with_capacity(node.children.len());
                for child in &node.children {
                    let data_type = self.child_type(child, path, "FIELD")?;
                    attributes.push(Attribute {
                        name: child.name.clone(),
                        data_type,
                    });
                }
                self.types.insert(CompositeType::Record {
                    key: key.clone(),
                    attributes,
                });
                Ok(DataType::composite(CompositeKind::Record, key))
            }
            CompositeKind::Collection => {
                let child = node.children.first().ok_or_else(missing)?;
                let key = key.unwrap_or_else(|| self.synthesized(path, "tab"));
                let element = self.child_type(child, path, "ITEM")?;
                self.types.insert(CompositeType::Collection {
                    key: key.clone(),
                    element,
                    indexing: indexing_of(&node.spec.data_kind),
                });
                Ok(DataType::composite(CompositeKind::Collection, key))
            }
            CompositeKind::Cursor => {
                let child = node.children.first().ok_or_else(missing)?;
                match self.child_type(child, path, "ROW")? {
                    DataType::Composite(r) if r.kind == CompositeKind::Record => {
                        Ok(DataType::composite(CompositeKind::Cursor, r.key))
                    }
                    _ => Err(missing()),
                }
            }
        }
    }
}

fn indexing_of(data_kind: &str) -> Indexing {
    match data_kind.trim().to_ascii_uppercase().as_str() {
        "PL/SQL TABLE" | "PL/SQL INDEX TABLE" => Indexing::Associative,
        _ => Indexing::Dense,
    }
}
