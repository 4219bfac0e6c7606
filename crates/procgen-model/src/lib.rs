//! procgen canonical model
//!
//! Everything downstream of catalog ingestion speaks these types:
//!
//! - [`types`]: scalar and composite data types, keyed by [`TypeKey`] in a
//!   [`TypeArena`] so references never form ownership cycles.
//! - [`function`]: functions, arguments, annotations and documentation blocks.
//! - [`naming`]: the single source of message, field and call identifiers.
//! - [`layout`]: the field-correspondence table built once when the model is
//!   frozen and consumed verbatim by every emitter.
//! - [`config`]: generation options shared by the pipeline and the CLI.

pub mod config;
pub mod function;
pub mod layout;
pub mod naming;
pub mod types;

pub use config::GenConfig;
pub use function::{
    Annotation, AnnotationKind, Argument, Direction, DocBlock, Function, Replacement,
};
pub use layout::{
    CallLayout, ElementSpec, FieldSlot, FieldSpec, FieldTable, Layout, SlotSource, WireKind,
};
pub use types::{
    check_digits, Attribute, CompositeKind, CompositeRef, CompositeType, DataType, DigitsError,
    Indexing, ScalarKind, ScalarType, TypeArena, TypeKey,
};

use serde::{Deserialize, Serialize};

/// A frozen, fully-typed model: the only input the emitters accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub functions: Vec<Function>,
    pub types: TypeArena,
    pub layout: Layout,
}

impl Model {
    /// Freeze a function set: prune the arena to the types the functions
    /// reach and compute the field-correspondence table.
    pub fn freeze(functions: Vec<Function>, types: TypeArena, config: &GenConfig) -> Self {
        let types = types.reachable_from(functions.iter().flat_map(Function::data_types));
        let layout = Layout::build(&functions, &types, config);
        Model {
            functions,
            types,
            layout,
        }
    }

    /// Distinct packages, in function order.
    pub fn packages(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for f in &self.functions {
            if !out.iter().any(|p| p.eq_ignore_ascii_case(&f.package)) {
                out.push(&f.package);
            }
        }
        out
    }

    pub fn functions_in<'a>(&'a self, package: &'a str) -> impl Iterator<Item = &'a Function> + 'a {
        self.functions
            .iter()
            .filter(move |f| f.package.eq_ignore_ascii_case(package))
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
