//! Model assembly for procgen
//!
//! ```text
//! catalog rows ──► RowNormalizer ──────────────┐
//!      │                                       ▼
//!      ├─► per type key:  TypeResolver  ──► ModelAssembler ──► Model
//!      │                                       ▲
//!      └─► per package:   source ─► docs ──────┘
//! ```
//!
//! [`Gatherer`] runs the left-hand side concurrently under one deadline;
//! [`ModelAssembler`] merges the results, applies directives and freezes the
//! model for the emitters.

pub mod assembler;
pub mod convert;
pub mod error;
pub mod gather;

pub use assembler::{
    apply_annotations, Assembled, AssemblyInput, ModelAssembler, RunSummary, SkippedFunction,
};
pub use convert::ResolutionTable;
pub use error::{AssembleError, DocsError};
pub use gather::Gatherer;
