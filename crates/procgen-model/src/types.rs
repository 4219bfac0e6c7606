//! Data types of the canonical model.
//!
//! Composite definitions live in a [`TypeArena`] keyed by [`TypeKey`];
//! every reference to a composite (an argument, an attribute, a collection
//! element) is a [`CompositeRef`] holding only the kind and the key.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Default length of an unsized VARCHAR-like value.
pub const DEFAULT_VARCHAR_LENGTH: u32 = 32767;
/// Default length of an unsized CHAR-like value.
pub const DEFAULT_CHAR_LENGTH: u32 = 10;

// ============================================================================
// Keys
// ============================================================================

/// Identity of a user-defined catalog type: `(owner, package, name)`.
///
/// Package is empty for schema-level types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TypeKey {
    pub owner: String,
    pub package: String,
    pub name: String,
}

impl TypeKey {
    pub fn new(
        owner: impl Into<String>,
        package: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeKey {
            owner: owner.into(),
            package: package.into(),
            name: name.into(),
        }
    }

    /// Non-empty parts, outermost first.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        [&self.owner, &self.package, &self.name]
            .into_iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.parts().collect();
        f.write_str(&parts.join("."))
    }
}

// ============================================================================
// Scalars
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Text,
    /// Machine integer (PLS_INTEGER and friends).
    Integer,
    /// Exact decimal (NUMBER with optional precision and scale).
    Number,
    /// Binary floating point.
    Float,
    DateTime,
    Raw,
    Clob,
    Blob,
    Boolean,
}

/// A catalog scalar with its size facets. Zero means "not given".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarType {
    pub kind: ScalarKind,
    /// Catalog spelling, upper-cased (`VARCHAR2`, `NUMBER`, ...).
    pub catalog_name: String,
    pub precision: u32,
    pub scale: i32,
    pub length: u32,
    pub charset: String,
}

impl ScalarType {
    /// Map a catalog data kind to a scalar. `None` when the kind is not a
    /// known scalar (it may be a composite, or simply unknown).
    pub fn from_catalog(
        data_kind: &str,
        precision: u32,
        scale: i32,
        length: u32,
        charset: &str,
    ) -> Option<ScalarType> {
        let name = data_kind.trim().to_ascii_uppercase();
        let kind = scalar_kind(&name)?;
        let mut length = length;
        if length == 0 {
            match name.as_str() {
                "CHAR" | "NCHAR" => length = DEFAULT_CHAR_LENGTH,
                _ if kind == ScalarKind::Text => length = DEFAULT_VARCHAR_LENGTH,
                _ => {}
            }
        }
        let (precision, scale) = match name.as_str() {
            "INTEGER" | "INT" | "SMALLINT" if precision == 0 => (38, 0),
            _ => (precision, scale),
        };
        Some(ScalarType {
            kind,
            catalog_name: name,
            precision,
            scale,
            length,
            charset: charset.trim().to_string(),
        })
    }

    /// Human-readable catalog type with facets: `VARCHAR2(100)`,
    /// `NUMBER(12, 2)`, `NUMBER(9)`, `INTEGER(10)`.
    pub fn abs_type(&self) -> String {
        match self.kind {
            ScalarKind::Text | ScalarKind::Raw if self.length > 0 => {
                format!("{}({})", self.catalog_name, self.length)
            }
            ScalarKind::Number => match (self.precision, self.scale) {
                (0, 0) => self.catalog_name.clone(),
                (p, 0) => format!("{}({})", self.catalog_name, p),
                (p, s) => format!("{}({}, {})", self.catalog_name, p, s),
            },
            ScalarKind::Integer => format!("{}(10)", self.catalog_name),
            _ => self.catalog_name.clone(),
        }
    }

    /// Whether the value is an exact integer (no fractional digits).
    pub fn is_integral(&self) -> bool {
        match self.kind {
            ScalarKind::Integer => true,
            ScalarKind::Number => self.scale <= 0 && self.precision > 0,
            _ => false,
        }
    }
}

fn scalar_kind(name: &str) -> Option<ScalarKind> {
    let kind = match name {
        "CHAR" | "NCHAR" | "VARCHAR" | "VARCHAR2" | "NVARCHAR2" | "NVARCHAR" | "STRING"
        | "LONG" | "ROWID" | "UROWID" => ScalarKind::Text,
        "PLS_INTEGER" | "BINARY_INTEGER" | "SIMPLE_INTEGER" | "NATURAL" | "NATURALN"
        | "POSITIVE" | "POSITIVEN" | "SIGNTYPE" | "PL/SQL PLS INTEGER"
        | "PL/SQL BINARY INTEGER" => ScalarKind::Integer,
        "NUMBER" | "DECIMAL" | "NUMERIC" | "INTEGER" | "INT" | "SMALLINT" => ScalarKind::Number,
        "FLOAT" | "REAL" | "DOUBLE PRECISION" | "BINARY_FLOAT" | "BINARY_DOUBLE" => {
            ScalarKind::Float
        }
        "DATE" => ScalarKind::DateTime,
        n if n.starts_with("TIMESTAMP") => ScalarKind::DateTime,
        "RAW" | "LONG RAW" => ScalarKind::Raw,
        "CLOB" | "NCLOB" => ScalarKind::Clob,
        "BLOB" | "BFILE" => ScalarKind::Blob,
        "BOOLEAN" | "PL/SQL BOOLEAN" => ScalarKind::Boolean,
        _ => return None,
    };
    Some(kind)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigitsError {
    #[error("want NUMBER({precision},{scale}), has {value:?}")]
    TooManyDigits {
        value: String,
        precision: u32,
        scale: i32,
    },
    #[error("want number, has {found:?} in {value:?}")]
    NotANumber { value: String, found: char },
}

/// Check that a decimal literal fits `NUMBER(precision, scale)`.
///
/// An empty literal is accepted (NULL). Precision and scale both zero mean
/// an unconstrained NUMBER (38 significant digits).
pub fn check_digits(value: &str, precision: u32, scale: i32) -> Result<(), DigitsError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('+'))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Ok(());
    }

    let unconstrained = precision == 0 && scale == 0;
    let (int_budget, frac_budget) = if unconstrained {
        (38i64, 38i64)
    } else {
        let precision = if precision == 0 { 38 } else { i64::from(precision) };
        let scale = i64::from(scale.max(0));
        ((precision - scale).max(0), scale)
    };

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    for c in int_part.chars().chain(frac_part.chars()) {
        if !c.is_ascii_digit() {
            return Err(DigitsError::NotANumber {
                value: value.to_string(),
                found: c,
            });
        }
    }
    let significant_int = int_part.trim_start_matches('0').len() as i64;
    if significant_int > int_budget || frac_part.len() as i64 > frac_budget {
        return Err(DigitsError::TooManyDigits {
            value: value.to_string(),
            precision,
            scale,
        });
    }
    Ok(())
}

// ============================================================================
// Composites
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompositeKind {
    Record,
    Collection,
    /// Stream of records; the rows are the Record stored at the same key.
    Cursor,
}

impl CompositeKind {
    /// Map a catalog type code to a composite kind.
    pub fn from_catalog(data_kind: &str) -> Option<CompositeKind> {
        match data_kind.trim().to_ascii_uppercase().as_str() {
            "PL/SQL RECORD" | "OBJECT" | "RECORD" => Some(CompositeKind::Record),
            "PL/SQL TABLE" | "PL/SQL INDEX TABLE" | "TABLE" | "VARRAY" | "VARYING ARRAY"
            | "COLLECTION" => Some(CompositeKind::Collection),
            "REF CURSOR" | "CURSOR" => Some(CompositeKind::Cursor),
            _ => None,
        }
    }
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompositeKind::Record => "record",
            CompositeKind::Collection => "collection",
            CompositeKind::Cursor => "cursor",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indexing {
    Dense,
    /// Index-by table (associative array).
    Associative,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeRef {
    pub kind: CompositeKind,
    pub key: TypeKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Scalar(ScalarType),
    Composite(CompositeRef),
}

impl DataType {
    pub fn composite(kind: CompositeKind, key: TypeKey) -> Self {
        DataType::Composite(CompositeRef { kind, key })
    }

    pub fn as_composite(&self) -> Option<&CompositeRef> {
        match self {
            DataType::Composite(r) => Some(r),
            DataType::Scalar(_) => None,
        }
    }

    pub fn is_cursor(&self) -> bool {
        matches!(self, DataType::Composite(r) if r.kind == CompositeKind::Cursor)
    }
}

/// A named member of a record, or a function's return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeType {
    Record {
        key: TypeKey,
        attributes: Vec<Attribute>,
    },
    Collection {
        key: TypeKey,
        element: DataType,
        indexing: Indexing,
    },
    Cursor {
        key: TypeKey,
    },
}

impl CompositeType {
    pub fn key(&self) -> &TypeKey {
        match self {
            CompositeType::Record { key, .. }
            | CompositeType::Collection { key, .. }
            | CompositeType::Cursor { key } => key,
        }
    }

    pub fn kind(&self) -> CompositeKind {
        match self {
            CompositeType::Record { .. } => CompositeKind::Record,
            CompositeType::Collection { .. } => CompositeKind::Collection,
            CompositeType::Cursor { .. } => CompositeKind::Cursor,
        }
    }

    /// Direct composite references of this definition.
    pub fn references(&self) -> Vec<CompositeRef> {
        let as_record = |key: &TypeKey| CompositeRef {
            kind: CompositeKind::Record,
            key: key.clone(),
        };
        match self {
            CompositeType::Record { attributes, .. } => attributes
                .iter()
                .filter_map(|a| a.data_type.as_composite().cloned())
                .collect(),
            CompositeType::Collection { element, .. } => {
                element.as_composite().cloned().into_iter().collect()
            }
            CompositeType::Cursor { key } => vec![as_record(key)],
        }
    }
}

// ============================================================================
// Arena
// ============================================================================

/// Composite definitions by key. Records and collections are stored; a
/// cursor is never stored, its rows are the Record under the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CompositeType>", into = "Vec<CompositeType>")]
pub struct TypeArena {
    defs: BTreeMap<TypeKey, CompositeType>,
}

impl From<Vec<CompositeType>> for TypeArena {
    fn from(defs: Vec<CompositeType>) -> Self {
        let mut arena = TypeArena::default();
        for def in defs {
            arena.insert(def);
        }
        arena
    }
}

impl From<TypeArena> for Vec<CompositeType> {
    fn from(arena: TypeArena) -> Self {
        arena.defs.into_values().collect()
    }
}

impl TypeArena {
    /// Insert a definition; the first definition under a key wins.
    /// Returns false when the key was already present.
    pub fn insert(&mut self, def: CompositeType) -> bool {
        if matches!(def, CompositeType::Cursor { .. }) {
            return false;
        }
        if self.defs.contains_key(def.key()) {
            return false;
        }
        self.defs.insert(def.key().clone(), def);
        true
    }

    pub fn extend(&mut self, other: &TypeArena) {
        for def in other.iter() {
            self.insert(def.clone());
        }
    }

    pub fn get(&self, key: &TypeKey) -> Option<&CompositeType> {
        self.defs.get(key)
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.defs.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompositeType> {
        self.defs.values()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = (&TypeKey, &[Attribute])> {
        self.defs.iter().filter_map(|(k, d)| match d {
            CompositeType::Record { attributes, .. } => Some((k, attributes.as_slice())),
            _ => None,
        })
    }

    /// Element type of a collection, or the row record of a cursor.
    pub fn element_of(&self, r: &CompositeRef) -> Option<DataType> {
        match r.kind {
            CompositeKind::Cursor => Some(DataType::composite(CompositeKind::Record, r.key.clone())),
            CompositeKind::Collection => match self.defs.get(&r.key) {
                Some(CompositeType::Collection { element, .. }) => Some(element.clone()),
                _ => None,
            },
            CompositeKind::Record => None,
        }
    }

    /// The sub-arena reachable from the given data types.
    pub fn reachable_from<'a>(&self, roots: impl IntoIterator<Item = &'a DataType>) -> TypeArena {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<TypeKey> = roots
            .into_iter()
            .filter_map(|dt| dt.as_composite().map(|r| r.key.clone()))
            .collect();
        let mut out = TypeArena::default();
        while let Some(key) = pending.pop() {
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(def) = self.defs.get(&key) {
                pending.extend(def.references().into_iter().map(|r| r.key));
                out.insert(def.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_follow_precision_and_scale() {
        assert!(check_digits("", 0, 0).is_ok());
        assert!(check_digits("0", 32, 4).is_ok());
        assert!(check_digits("-12.3", 3, 1).is_ok());
        assert!(check_digits("12.34", 3, 1).is_err());
        assert!(check_digits("123", 3, 1).is_err());
        assert!(matches!(
            check_digits("1x", 5, 0),
            Err(DigitsError::NotANumber { found: 'x', .. })
        ));
    }

    #[test]
    fn unsized_strings_get_default_lengths() {
        let v = ScalarType::from_catalog("varchar2", 0, 0, 0, "").expect("scalar");
        assert_eq!(v.length, DEFAULT_VARCHAR_LENGTH);
        let c = ScalarType::from_catalog("CHAR", 0, 0, 0, "").expect("scalar");
        assert_eq!(c.length, DEFAULT_CHAR_LENGTH);
        assert_eq!(c.abs_type(), "CHAR(10)");
    }

    #[test]
    fn abs_type_renders_facets() {
        let n = ScalarType::from_catalog("NUMBER", 12, 2, 0, "").expect("scalar");
        assert_eq!(n.abs_type(), "NUMBER(12, 2)");
        let n = ScalarType::from_catalog("NUMBER", 9, 0, 0, "").expect("scalar");
        assert_eq!(n.abs_type(), "NUMBER(9)");
        let i = ScalarType::from_catalog("PLS_INTEGER", 0, 0, 0, "").expect("scalar");
        assert_eq!(i.abs_type(), "PLS_INTEGER(10)");
        assert!(ScalarType::from_catalog("PL/SQL RECORD", 0, 0, 0, "").is_none());
    }

    #[test]
    fn composite_kinds_map_catalog_codes() {
        assert_eq!(
            CompositeKind::from_catalog("PL/SQL TABLE"),
            Some(CompositeKind::Collection)
        );
        assert_eq!(
            CompositeKind::from_catalog("object"),
            Some(CompositeKind::Record)
        );
        assert_eq!(
            CompositeKind::from_catalog("REF CURSOR"),
            Some(CompositeKind::Cursor)
        );
        assert_eq!(CompositeKind::from_catalog("OPAQUE/XMLTYPE"), None);
    }

    #[test]
    fn arena_prunes_to_reachable() {
        let rec = TypeKey::new("APP", "PKG", "REC");
        let tab = TypeKey::new("APP", "PKG", "TAB");
        let lone = TypeKey::new("APP", "PKG", "LONE");
        let mut arena = TypeArena::default();
        arena.insert(CompositeType::Record {
            key: rec.clone(),
            attributes: vec![],
        });
        arena.insert(CompositeType::Collection {
            key: tab.clone(),
            element: DataType::composite(CompositeKind::Record, rec.clone()),
            indexing: Indexing::Dense,
        });
        arena.insert(CompositeType::Record {
            key: lone.clone(),
            attributes: vec![],
        });
        let root = DataType::composite(CompositeKind::Collection, tab.clone());
        let pruned = arena.reachable_from([&root]);
        assert!(pruned.contains(&rec));
        assert!(pruned.contains(&tab));
        assert!(!pruned.contains(&lone));
    }

    #[test]
    fn arena_round_trips_through_json() {
        let mut arena = TypeArena::default();
        arena.insert(CompositeType::Record {
            key: TypeKey::new("", "PKG", "REC"),
            attributes: vec![],
        });
        let json = serde_json::to_string(&arena).expect("serialize");
        let back: TypeArena = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(arena, back);
    }
}
