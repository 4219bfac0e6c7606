//! Directive scanning.
//!
//! A directive is a comment line `<marker>:<verb> <args>`:
//!
//! ```text
//! -- procgen:private   internal_helper
//! -- procgen:rename    get_usr => get_user
//! -- procgen:replace   slow => fast
//! -- procgen:replace_json slow => slow_json
//! -- procgen:handle    audit
//! -- procgen:max-table-size list_users = 500
//! ```
//!
//! Lines with other markers are ordinary documentation. A malformed
//! directive is reported and skipped; scanning continues.

use procgen_model::{Annotation, AnnotationKind};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static DIRECTIVE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\*?\s*([A-Za-z][A-Za-z0-9_-]*):\s*(.*)$").expect("directive regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("line {line}: malformed directive {text:?}: {reason}")]
    MalformedDirective {
        line: usize,
        text: String,
        reason: String,
    },
}

/// A comment with its directives taken out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedComment {
    pub text: String,
    pub annotations: Vec<Annotation>,
    pub warnings: Vec<DirectiveError>,
}

#[derive(Debug, Clone)]
pub struct AnnotationEngine {
    markers: Vec<String>,
}

impl AnnotationEngine {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnnotationEngine {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    fn is_marker(&self, word: &str) -> bool {
        self.markers.iter().any(|m| m.eq_ignore_ascii_case(word))
    }

    /// Split a comment into documentation text and directives.
    /// `first_line` is the source line the comment starts on.
    pub fn scan_comment(&self, package: &str, comment: &str, first_line: usize) -> ScannedComment {
        let mut out = ScannedComment::default();
        let mut kept = Vec::new();
        for (i, line) in comment.lines().enumerate() {
            let Some(caps) = DIRECTIVE_LINE.captures(line) else {
                kept.push(line);
                continue;
            };
            if !self.is_marker(&caps[1]) {
                kept.push(line);
                continue;
            }
            let body = caps.get(2).map_or("", |m| m.as_str());
            match parse_directive(package, body, first_line + i) {
                Ok(a) => out.annotations.push(a),
                Err(err) => {
                    tracing::warn!(package = %package, error = %err, "skipping directive");
                    out.warnings.push(err);
                }
            }
        }
        out.text = kept.join("\n");
        out
    }
}

/// Parse the part after `<marker>:`.
pub fn parse_directive(package: &str, body: &str, line: usize) -> Result<Annotation, DirectiveError> {
    let malformed = |reason: &str| DirectiveError::MalformedDirective {
        line,
        text: body.trim().to_string(),
        reason: reason.to_string(),
    };

    let body = body.trim();
    let (verb, args) = match body.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (body, ""),
    };
    if verb.is_empty() {
        return Err(malformed("missing verb"));
    }
    let kind = AnnotationKind::from_verb(verb).ok_or_else(|| malformed("unknown verb"))?;

    let mut annotation = match kind {
        AnnotationKind::Private | AnnotationKind::Handle => {
            let name = checked_name(args).ok_or_else(|| malformed("expected one name"))?;
            Annotation::new(package, kind, name)
        }
        AnnotationKind::Rename | AnnotationKind::Replace | AnnotationKind::ReplaceJson => {
            let (name, other) = args
                .split_once("=>")
                .ok_or_else(|| malformed("expected `name => other`"))?;
            let name = checked_name(name).ok_or_else(|| malformed("bad name"))?;
            let other = checked_name(other).ok_or_else(|| malformed("bad second name"))?;
            Annotation::new(package, kind, name).with_other(other)
        }
        AnnotationKind::MaxTableSize => {
            let (name, size) = args
                .split_once('=')
                .ok_or_else(|| malformed("expected `name = size`"))?;
            let name = checked_name(name).ok_or_else(|| malformed("bad name"))?;
            let size: u32 = size
                .trim()
                .parse()
                .map_err(|_| malformed("non-integer size"))?;
            if size == 0 {
                return Err(malformed("size must be positive"));
            }
            Annotation::new(package, kind, name).with_size(size)
        }
    };
    annotation.line = Some(line);
    Ok(annotation)
}

fn checked_name(text: &str) -> Option<&str> {
    let name = text.trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'));
    valid.then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AnnotationEngine {
        AnnotationEngine::new(["x", "procgen"])
    }

    #[test]
    fn rename_directive() {
        let scanned = engine().scan_comment("pkg", "x:rename foo => bar", 7);
        assert_eq!(scanned.text, "");
        assert_eq!(
            scanned.annotations,
            vec![Annotation {
                line: Some(7),
                ..Annotation::new("pkg", AnnotationKind::Rename, "foo").with_other("bar")
            }]
        );
    }

    #[test]
    fn documentation_lines_are_kept() {
        let comment = "Does X.\nin:\n  - p_a - A\nprocgen:private helper\nhttp://example.invalid";
        let scanned = engine().scan_comment("pkg", comment, 1);
        assert_eq!(scanned.text, "Does X.\nin:\n  - p_a - A\nhttp://example.invalid");
        assert_eq!(scanned.annotations.len(), 1);
        assert_eq!(scanned.annotations[0].kind, AnnotationKind::Private);
        assert_eq!(scanned.annotations[0].line, Some(4));
    }

    #[test]
    fn malformed_directives_are_skipped() {
        let comment = "x:max-table-size foo = lots\nx:\nx:frobnicate a\nx:handle audit";
        let scanned = engine().scan_comment("pkg", comment, 10);
        assert_eq!(scanned.warnings.len(), 3);
        assert!(matches!(
            &scanned.warnings[0],
            DirectiveError::MalformedDirective { line: 10, reason, .. } if reason == "non-integer size"
        ));
        assert_eq!(scanned.annotations.len(), 1);
        assert_eq!(scanned.annotations[0].name, "audit");
    }

    #[test]
    fn max_table_size_parses() {
        let a = parse_directive("pkg", "max-table-size list_users = 500", 1).expect("directive");
        assert_eq!(a.size, Some(500));
        assert_eq!(a.name, "list_users");
    }

    #[test]
    fn block_comment_star_prefix() {
        let scanned = engine().scan_comment("pkg", "\n * procgen:handle audit\n", 1);
        assert_eq!(scanned.annotations.len(), 1);
    }
}
