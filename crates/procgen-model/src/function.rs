//! Functions, their arguments, annotations and documentation.

use crate::types::{Attribute, DataType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    pub fn from_catalog(code: &str) -> Direction {
        let code = code.trim().to_ascii_uppercase();
        match code.as_str() {
            "OUT" => Direction::Out,
            "IN/OUT" | "IN OUT" | "INOUT" | "IN_OUT" => Direction::InOut,
            _ => Direction::In,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    pub fn is_output(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
            Direction::InOut => "IN/OUT",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub data_type: DataType,
    pub direction: Direction,
    /// 1-based ordinal among the function's arguments, in catalog order.
    pub position: u32,
}

/// Parsed documentation block of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocBlock {
    /// The comment text as written, directives removed.
    pub raw: String,
    /// Text before the first input/output header.
    pub common: String,
    /// Per-parameter descriptions from the input section.
    pub input: BTreeMap<String, String>,
    /// Per-parameter descriptions from the output section.
    pub output: BTreeMap<String, String>,
}

impl DocBlock {
    /// Description of a parameter, looked up case-insensitively in the
    /// section matching its direction.
    pub fn describe(&self, name: &str, direction: Direction) -> Option<&str> {
        let sections = if direction.is_input() {
            [&self.input, &self.output]
        } else {
            [&self.output, &self.input]
        };
        sections.into_iter().find_map(|section| {
            section
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

/// Link from a function to the function actually called in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub function: Box<Function>,
    /// The target exchanges one JSON document instead of typed parameters.
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub owner: String,
    pub package: String,
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<Argument>,
    pub returns: Option<Attribute>,
    pub doc: DocBlock,
    pub replacement: Option<Replacement>,
    /// Upper-cased handler names applied around every call.
    pub handlers: Vec<String>,
    pub max_table_size: Option<u32>,
}

impl Function {
    pub fn new(owner: impl Into<String>, package: impl Into<String>, name: impl Into<String>) -> Self {
        Function {
            owner: owner.into(),
            package: package.into(),
            name: name.into(),
            alias: None,
            arguments: Vec::new(),
            returns: None,
            doc: DocBlock::default(),
            replacement: None,
            handlers: Vec::new(),
            max_table_size: None,
        }
    }

    /// The exposed name: the alias when renamed.
    pub fn exposed_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Lower-cased `package.name` of the catalog object; the doc and directive
    /// lookup key.
    pub fn catalog_key(&self) -> String {
        qualified_key(&self.package, &self.name)
    }

    /// Lower-cased `package.exposed_name`; the sort key.
    pub fn qualified_name(&self) -> String {
        qualified_key(&self.package, self.exposed_name())
    }

    /// Database object to invoke: the replacement's target when present.
    pub fn call_target(&self) -> String {
        match &self.replacement {
            Some(r) => r.function.call_target(),
            None if self.package.is_empty() => self.name.clone(),
            None => format!("{}.{}", self.package, self.name),
        }
    }

    pub fn is_json_replaced(&self) -> bool {
        self.replacement.as_ref().is_some_and(|r| r.json)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|a| a.direction.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|a| a.direction.is_output())
    }

    /// Whether the response is a stream: some output is a cursor.
    pub fn is_streaming(&self) -> bool {
        self.outputs().any(|a| a.data_type.is_cursor())
            || self.returns.as_ref().is_some_and(|r| r.data_type.is_cursor())
    }

    /// Every data type the function mentions.
    pub fn data_types(&self) -> impl Iterator<Item = &DataType> {
        self.arguments
            .iter()
            .map(|a| &a.data_type)
            .chain(self.returns.iter().map(|r| &r.data_type))
    }

    /// Effective collection cap given the configured default.
    pub fn table_cap(&self, default: u32) -> u32 {
        self.max_table_size.unwrap_or(default)
    }
}

pub fn qualified_key(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_lowercase()
    } else {
        format!("{}.{}", package.to_lowercase(), name.to_lowercase())
    }
}

// ============================================================================
// Annotations
// ============================================================================

/// Directive verbs, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    Private,
    Rename,
    Replace,
    ReplaceJson,
    Handle,
    MaxTableSize,
}

impl AnnotationKind {
    pub fn from_verb(verb: &str) -> Option<AnnotationKind> {
        let kind = match verb.to_ascii_lowercase().as_str() {
            "private" => AnnotationKind::Private,
            "rename" => AnnotationKind::Rename,
            "replace" => AnnotationKind::Replace,
            "replace_json" => AnnotationKind::ReplaceJson,
            "handle" => AnnotationKind::Handle,
            "max-table-size" | "max_table_size" => AnnotationKind::MaxTableSize,
            _ => return None,
        };
        Some(kind)
    }

    pub fn verb(self) -> &'static str {
        match self {
            AnnotationKind::Private => "private",
            AnnotationKind::Rename => "rename",
            AnnotationKind::Replace => "replace",
            AnnotationKind::ReplaceJson => "replace_json",
            AnnotationKind::Handle => "handle",
            AnnotationKind::MaxTableSize => "max-table-size",
        }
    }
}

/// A directive attached to a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub package: String,
    pub kind: AnnotationKind,
    pub name: String,
    /// Second name of `rename` and `replace*` directives.
    pub other: Option<String>,
    /// Size of `max-table-size` directives.
    pub size: Option<u32>,
    /// Source line of the directive, when it came from source text.
    pub line: Option<usize>,
}

impl Annotation {
    pub fn new(package: impl Into<String>, kind: AnnotationKind, name: impl Into<String>) -> Self {
        Annotation {
            package: package.into(),
            kind,
            name: name.into(),
            other: None,
            size: None,
            line: None,
        }
    }

    pub fn with_other(mut self, other: impl Into<String>) -> Self {
        self.other = Some(other.into());
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Lower-cased `package.name` this directive targets.
    pub fn target_key(&self) -> String {
        qualified_key(&self.package, &self.name)
    }

    pub fn other_key(&self) -> Option<String> {
        self.other.as_deref().map(|o| qualified_key(&self.package, o))
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.kind.verb())?;
        match (&self.other, self.size) {
            (Some(other), _) => write!(f, " {} => {}", self.name, other),
            (None, Some(size)) => write!(f, " {}={}", self.name, size),
            (None, None) => write!(f, " {}", self.name),
        }
    }
}
