//! Documentation and directive ingestion from package source
//!
//! One call per package: [`parse_package_source`] lexes the source, pulls
//! directives out of comments and pairs the remaining comment text with the
//! declaration that follows it.

pub mod annotations;
pub mod docs;
pub mod lexer;

pub use annotations::{parse_directive, AnnotationEngine, DirectiveError, ScannedComment};
pub use docs::{declared_names, split_doc, DocExtractor};
pub use lexer::{lex, tokenize, LexError, Lexer, Token};

use procgen_model::{Annotation, DocBlock};
use std::collections::BTreeMap;

/// Everything one package's source contributes to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDocs {
    pub package: String,
    /// Parsed documentation by lower-cased `package.name`.
    pub docs: BTreeMap<String, DocBlock>,
    pub annotations: Vec<Annotation>,
    pub warnings: Vec<DirectiveError>,
}

impl PackageDocs {
    pub fn empty(package: &str) -> Self {
        PackageDocs {
            package: package.to_string(),
            ..PackageDocs::default()
        }
    }

    pub fn doc(&self, key: &str) -> Option<&DocBlock> {
        self.docs.get(key)
    }
}

pub fn parse_package_source(
    package: &str,
    source: &str,
    engine: &AnnotationEngine,
) -> Result<PackageDocs, LexError> {
    let mut out = PackageDocs::empty(package);
    let mut extractor = DocExtractor::new();
    for token in lex(source) {
        match token? {
            Token::Comment { text, line, block } => {
                let text = if block { text.trim_start_matches('*') } else { text };
                let scanned = engine.scan_comment(package, text, line);
                out.annotations.extend(scanned.annotations);
                out.warnings.extend(scanned.warnings);
                extractor.comment(&scanned.text);
            }
            Token::Code { text, .. } => extractor.code(package, text),
        }
    }
    out.docs = extractor
        .finish()
        .into_iter()
        .map(|(key, raw)| (key, split_doc(&raw)))
        .collect();
    tracing::debug!(
        package = %package,
        docs = out.docs.len(),
        annotations = out.annotations.len(),
        "parsed package source"
    );
    Ok(out)
}
