//! Level-stack reconstruction of argument trees.
//!
//! Rows of one function arrive in sequence order. A stack holds the open row
//! at each level; a row at level `n` closes everything at `n` and deeper,
//! then attaches below the open composite at `n - 1`.

use crate::error::NormalizeError;
use crate::row::{ArgumentRow, TypeSpec};
use procgen_model::{CompositeKind, Direction};
use std::sync::Arc;

/// Predicate over `package.object` names; `false` drops the object.
pub type NameFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One argument, return value or nested member as the rows describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    pub name: String,
    pub direction: Direction,
    pub sequence: u32,
    pub spec: TypeSpec,
    /// Nested rows: attributes of a record, the single element of a
    /// collection or cursor.
    pub children: Vec<RawNode>,
}

impl RawNode {
    fn from_row(row: &ArgumentRow) -> Self {
        RawNode {
            name: row.argument_name.clone(),
            direction: row.direction(),
            sequence: row.sequence,
            spec: row.type_spec(),
            children: Vec::new(),
        }
    }

    pub fn composite_kind(&self) -> Option<CompositeKind> {
        self.spec.composite_kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFunction {
    pub owner: String,
    pub package: String,
    pub name: String,
    pub subprogram_id: u32,
    pub arguments: Vec<RawNode>,
    pub returns: Option<RawNode>,
}

impl RawFunction {
    pub fn qualified_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }
}

struct Open {
    node: RawNode,
    is_return: bool,
}

struct Current {
    function: RawFunction,
    stack: Vec<Open>,
    last_sequence: Option<u32>,
}

impl Current {
    fn start(row: &ArgumentRow) -> Self {
        Current {
            function: RawFunction {
                owner: row.owner.clone(),
                package: row.package.clone(),
                name: row.object.clone(),
                subprogram_id: row.subprogram_id,
                arguments: Vec::new(),
                returns: None,
            },
            stack: Vec::new(),
            last_sequence: None,
        }
    }

    fn same_object(&self, row: &ArgumentRow) -> bool {
        let f = &self.function;
        f.owner == row.owner
            && f.package == row.package
            && f.name == row.object
            && f.subprogram_id == row.subprogram_id
    }

    /// Close open rows down to `depth` entries.
    fn close_to(&mut self, depth: usize) {
        while self.stack.len() > depth {
            let Some(open) = self.stack.pop() else {
                break;
            };
            match self.stack.last_mut() {
                Some(parent) => parent.node.children.push(open.node),
                None if open.is_return => self.function.returns = Some(open.node),
                None => self.function.arguments.push(open.node),
            }
        }
    }

    fn push(&mut self, row: &ArgumentRow) -> Result<(), NormalizeError> {
        if let Some(previous) = self.last_sequence {
            if row.sequence <= previous {
                return Err(NormalizeError::OutOfOrder {
                    function: self.function.qualified_name(),
                    sequence: row.sequence,
                    previous,
                });
            }
        }
        self.last_sequence = Some(row.sequence);

        if row.is_placeholder() {
            return Ok(());
        }

        let level = row.level as usize;
        self.close_to(level);
        if level > 0 {
            let orphan = || NormalizeError::OrphanLevel {
                function: self.function.qualified_name(),
                sequence: row.sequence,
                level: row.level,
                parent: row.level - 1,
            };
            if self.stack.len() != level {
                return Err(orphan());
            }
            let parent = &self.stack[level - 1].node;
            match parent.composite_kind() {
                None => return Err(orphan()),
                Some(CompositeKind::Collection | CompositeKind::Cursor)
                    if !parent.children.is_empty() =>
                {
                    return Err(NormalizeError::CollectionArity {
                        function: self.function.qualified_name(),
                        collection: parent.name.clone(),
                        sequence: row.sequence,
                    });
                }
                Some(_) => {}
            }
        }

        let is_return =
            level == 0 && row.argument_name.is_empty() && self.function.returns.is_none();
        self.stack.push(Open {
            node: RawNode::from_row(row),
            is_return,
        });
        Ok(())
    }

    fn finish(mut self) -> RawFunction {
        self.close_to(0);
        self.function
    }
}

/// Streaming row grouper: feed rows in catalog order, collect functions.
#[derive(Default)]
pub struct RowNormalizer {
    filter: Option<NameFilter>,
    current: Option<Current>,
}

impl RowNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: NameFilter) -> Self {
        RowNormalizer {
            filter: Some(filter),
            current: None,
        }
    }

    /// Whether rows of this object take part in the run.
    pub fn accepts(&self, row: &ArgumentRow) -> bool {
        if row.is_hidden() {
            return false;
        }
        match &self.filter {
            Some(filter) => filter(&row.function_name()),
            None => true,
        }
    }

    /// Consume one row; returns the previous function when this row starts
    /// a new one.
    pub fn push(&mut self, row: &ArgumentRow) -> Result<Option<RawFunction>, NormalizeError> {
        if !self.accepts(row) {
            return Ok(None);
        }
        let flushed = match self.current.take() {
            Some(current) if current.same_object(row) => {
                self.current = Some(current);
                None
            }
            Some(current) => Some(current.finish()),
            None => None,
        };
        let current = self.current.get_or_insert_with(|| Current::start(row));
        current.push(row)?;
        Ok(flushed)
    }

    pub fn finish(self) -> Option<RawFunction> {
        self.current.map(Current::finish)
    }
}

/// Normalize a complete row stream.
pub fn normalize<'a>(
    rows: impl IntoIterator<Item = &'a ArgumentRow>,
) -> Result<Vec<RawFunction>, NormalizeError> {
    let mut normalizer = RowNormalizer::new();
    let mut out = Vec::new();
    for row in rows {
        if let Some(f) = normalizer.push(row)? {
            out.push(f);
        }
    }
    out.extend(normalizer.finish());
    Ok(out)
}
