//! The catalog's argument-row contract.

use crate::error::ResolveError;
use procgen_model::{CompositeKind, Direction, ScalarType, TypeKey};
use serde::{Deserialize, Serialize};

/// One flat row of the argument listing, ordered by
/// `(owner, package, object, sequence)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgumentRow {
    pub owner: String,
    pub package: String,
    pub object: String,
    /// Distinguishes overloads of the same object.
    pub subprogram_id: u32,
    pub sequence: u32,
    pub level: u32,
    pub argument_name: String,
    pub direction: String,
    pub data_kind: String,
    pub precision: u32,
    pub scale: i32,
    pub length: u32,
    pub charset: String,
    pub type_owner: String,
    pub type_package: String,
    pub type_name: String,
    pub type_link: String,
}

impl ArgumentRow {
    /// `package.object`, as given by the catalog.
    pub fn function_name(&self) -> String {
        if self.package.is_empty() {
            self.object.clone()
        } else {
            format!("{}.{}", self.package, self.object)
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::from_catalog(&self.direction)
    }

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

    /// Catalog placeholder of a parameterless subprogram.
    pub fn is_placeholder(&self) -> bool {
        self.level == 0 && self.argument_name.is_empty() && self.data_kind.trim().is_empty()
    }

    /// Whether the object is hidden (name ends with `#`).
    pub fn is_hidden(&self) -> bool {
        self.object.ends_with('#')
    }
}

/// Key of a user-defined type reference. A package-level type carries the
/// package in `type_package` and its name in `type_name`; a schema-level type
/// only fills `type_package`.
pub fn type_ref(owner: &str, package: &str, name: &str) -> Option<TypeKey> {
    match (package.trim(), name.trim()) {
        ("", "") => None,
        (package, "") => Some(TypeKey::new(owner.trim(), "", package)),
        (package, name) => Some(TypeKey::new(owner.trim(), package, name)),
    }
}

/// Type information of a row or record member, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub data_kind: String,
    pub precision: u32,
    pub scale: i32,
    pub length: u32,
    pub charset: String,
    pub type_ref: Option<TypeKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Scalar(ScalarType),
    Composite {
        kind: CompositeKind,
        type_ref: Option<TypeKey>,
    },
}

impl TypeSpec {
    pub fn composite_kind(&self) -> Option<CompositeKind> {
        CompositeKind::from_catalog(&self.data_kind)
    }

    /// Decide scalar vs composite. A type reference with an unknown code is
    /// an unknown composite; anything else unknown is an unknown scalar.
    pub fn classify(&self, context: &str) -> Result<Classified, ResolveError> {
        if let Some(kind) = self.composite_kind() {
            return Ok(Classified::Composite {
                kind,
                type_ref: self.type_ref.clone(),
            });
        }
        if let Some(scalar) = ScalarType::from_catalog(
            &self.data_kind,
            self.precision,
            self.scale,
            self.length,
            &self.charset,
        ) {
            return Ok(Classified::Scalar(scalar));
        }
        if self.type_ref.is_some() {
            Err(ResolveError::UnknownCompositeKind {
                data_kind: self.data_kind.clone(),
            })
        } else {
            Err(ResolveError::UnknownScalarType {
                data_kind: self.data_kind.clone(),
                context: context.to_string(),
            })
        }
    }
}
