//! Declaration documentation.
//!
//! The comment text accumulated right before a `FUNCTION <name>` or
//! `PROCEDURE <name>` header documents that declaration. The text is then
//! split into a common part and input/output sections, and each section into
//! `- name - description` bullets.

use procgen_model::DocBlock;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:FUNCTION|PROCEDURE)\s+("[^"]+"|[A-Za-z][A-Za-z0-9_$#]*)"#)
        .expect("declaration regex")
});

static INPUT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\n[ \t]*(?:- )?in(?:put)?:?[ \t]*\n").expect("input header regex")
});

static OUTPUT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\n[ \t]*(?:(?:- )?out(?:put)?|ret(?:urns?)?):?[ \t]*\n")
        .expect("output header regex")
});

/// Accumulates comment text and hands it to the next declaration.
#[derive(Debug, Default)]
pub struct DocExtractor {
    pending: String,
    docs: BTreeMap<String, String>,
}

impl DocExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add documentation text (directives already removed).
    pub fn comment(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if !self.pending.is_empty() {
            self.pending.push('\n');
        }
        self.pending.push_str(text);
    }

    /// Consume a code span. Declarations in it take the pending text (the
    /// first one only); any other code drops it. Blank code keeps it.
    pub fn code(&mut self, package: &str, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        if let Some(name) = DECLARATION.captures(text).and_then(|c| c.get(1)) {
            let name = name.as_str().trim_matches('"');
            let key = procgen_model::function::qualified_key(package, name);
            if !pending.trim().is_empty() {
                self.docs.entry(key).or_insert(pending);
            }
        }
    }

    /// Raw documentation by lower-cased `package.name`.
    pub fn finish(self) -> BTreeMap<String, String> {
        self.docs
    }
}

/// Names declared in a code span, in order.
pub fn declared_names(code: &str) -> Vec<String> {
    DECLARATION
        .captures_iter(code)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_matches('"').to_string())
        .collect()
}

/// Split raw documentation into its sections.
pub fn split_doc(raw: &str) -> DocBlock {
    let raw = trim_start_empty_lines(raw).trim_end();
    let text = format!("\n{raw}\n");

    let (before_output, output) = match OUTPUT_HEADER.find(&text) {
        // Keep the newline the header match starts with, so an input header
        // right above the output header still matches.
        Some(m) => (&text[..m.start() + 1], &text[m.end()..]),
        None => (text.as_str(), ""),
    };
    let (common, input) = match INPUT_HEADER.find(before_output) {
        Some(m) => (&before_output[..m.start()], &before_output[m.end()..]),
        None => (before_output, ""),
    };

    DocBlock {
        raw: raw.to_string(),
        common: common.trim().to_string(),
        input: parse_items(input),
        output: parse_items(output),
    }
}

fn trim_start_empty_lines(text: &str) -> &str {
    let mut rest = text;
    while let Some(nl) = rest.find('\n') {
        if !rest[..nl].trim().is_empty() {
            break;
        }
        rest = &rest[nl + 1..];
    }
    rest
}

/// Group lines into items: a line indented no deeper than the first line of
/// the current item starts a new one.
fn split_by_offset(section: &str) -> Vec<Vec<&str>> {
    let mut items: Vec<Vec<&str>> = Vec::new();
    let mut item_offset = 0usize;
    for line in section.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let offset = line.len() - line.trim_start().len();
        match items.last_mut() {
            Some(item) if offset > item_offset => item.push(line.trim()),
            _ => {
                items.push(vec![line.trim()]);
                item_offset = offset;
            }
        }
    }
    items
}

/// `- name - description` items into a map. Items not starting with a
/// bullet are ignored.
fn parse_items(section: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for item in split_by_offset(section) {
        let Some((first, rest)) = item.split_first() else {
            continue;
        };
        let Some(body) = first.strip_prefix('-').or_else(|| first.strip_prefix('*')) else {
            continue;
        };
        let body = body.trim();
        let (name, description) = match body.find(['-', ':']) {
            Some(at) => (body[..at].trim(), body[at + 1..].trim()),
            None => (body, ""),
        };
        if name.is_empty() {
            continue;
        }
        let mut description = description.to_string();
        for line in rest {
            if !description.is_empty() {
                description.push('\n');
            }
            description.push_str(line);
        }
        out.insert(name.to_string(), description);
    }
    out
}
