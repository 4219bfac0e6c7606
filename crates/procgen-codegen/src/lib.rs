//! Emitters for procgen
//!
//! Every emitter walks the same frozen [`Model`] and takes message names,
//! field names and ordinals from its [`Layout`](procgen_model::Layout), never
//! recomputing them:
//!
//! ```text
//!                 ┌─► ProtoEmitter    ─► <package>.proto
//! Model + Layout ─┼─► WrapperEmitter  ─► <package>.rs
//!                 └─► FixtureEmitter  ─► fixtures/<call>.json
//! ```

pub mod error;
pub mod fixtures;
pub mod proto;
pub mod wrapper;

pub use error::EmitError;
pub use fixtures::FixtureEmitter;
pub use proto::ProtoEmitter;
pub use wrapper::WrapperEmitter;

use procgen_model::{CallLayout, Function, GenConfig, Model};
use serde::Serialize;

/// One generated file, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: String,
    pub contents: String,
}

pub trait Emitter {
    fn name(&self) -> &'static str;

    fn emit(&self, model: &Model, config: &GenConfig) -> Result<Vec<Artifact>, EmitError>;
}

/// The three standard emitters.
pub fn emitters() -> Vec<Box<dyn Emitter>> {
    vec![
        Box::new(ProtoEmitter),
        Box::new(WrapperEmitter),
        Box::new(FixtureEmitter),
    ]
}

/// Run every standard emitter over one model.
pub fn emit_all(model: &Model, config: &GenConfig) -> Result<Vec<Artifact>, EmitError> {
    let mut out = Vec::new();
    for emitter in emitters() {
        let artifacts = emitter.emit(model, config)?;
        tracing::debug!(emitter = emitter.name(), files = artifacts.len(), "emitted");
        out.extend(artifacts);
    }
    Ok(out)
}

pub(crate) fn call_layout<'a>(model: &'a Model, f: &Function) -> Result<&'a CallLayout, EmitError> {
    model
        .layout
        .call(f)
        .ok_or_else(|| EmitError::MissingLayout {
            function: f.qualified_name(),
        })
}

/// Prefix every line of `text` (trailing blanks trimmed, blank edges
/// dropped).
pub(crate) fn comment_lines(text: &str, prefix: &str) -> String {
    let text = text.trim_matches('\n').trim_end();
    if text.trim().is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            out.push_str(prefix.trim_end());
        } else {
            out.push_str(prefix);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_lines_prefixes_and_trims() {
        assert_eq!(comment_lines("\nfirst\n\n  second  \n", "// "), "// first\n//\n//   second\n");
        assert_eq!(comment_lines("  \n", "// "), "");
    }
}
