//! Identifier rules shared by every emitter.
//!
//! Message names are PascalCase with `__` between namespace parts
//! (`DbWeb__GetUser__Request`); field and call identifiers are lower snake
//! case.

use crate::function::Function;
use crate::types::TypeKey;

const HIDDEN_SUFFIX: &str = "_hidden";

/// Words that cannot be raw identifiers in Rust.
const UNRAWABLE: &[&str] = &["crate", "self", "super", "_"];

pub const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "final", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "macro", "match",
    "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "static", "struct", "trait",
    "true", "try", "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while",
    "yield", "abstract", "become", "do",
];

/// PascalCase a catalog name: `GET_USER` → `GetUser`, `REC_2` → `Rec_2`.
/// `__` separators survive; a trailing `#` becomes `Hidden`.
pub fn pascal_case(text: &str) -> String {
    text.split("__")
        .map(pascal_segment)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("__")
}

fn pascal_segment(segment: &str) -> String {
    let (segment, hidden) = strip_hidden(segment);
    let keep_case = segment.chars().any(|c| c.is_ascii_lowercase());
    let mut out = String::with_capacity(segment.len());
    let mut upper_next = true;
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_ascii_alphanumeric() {
            if chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                out.push('_');
            }
            upper_next = true;
            continue;
        }
        if upper_next {
            out.push(c.to_ascii_uppercase());
        } else if keep_case {
            out.push(c);
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper_next = false;
    }
    if hidden {
        out.push_str("Hidden");
    }
    out
}

fn strip_hidden(name: &str) -> (&str, bool) {
    match name.strip_suffix('#') {
        Some(rest) => (rest, true),
        None => (name, false),
    }
}

/// Lower snake identifier for a field or parameter. Rust keywords are left
/// as is (emitters that need it write them raw); words that cannot be raw
/// get a trailing underscore.
pub fn field_ident(name: &str) -> String {
    let (name, hidden) = strip_hidden(name.trim());
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if hidden {
        out.push_str(HIDDEN_SUFFIX);
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "f_");
    }
    if UNRAWABLE.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

/// How a Rust emitter writes a field identifier.
pub fn rust_ident(ident: &str) -> String {
    if RUST_KEYWORDS.contains(&ident) {
        format!("r#{ident}")
    } else {
        ident.to_string()
    }
}

/// `Package__Name` of a function, using its exposed name.
pub fn function_base(f: &Function) -> String {
    if f.package.is_empty() {
        pascal_case(f.exposed_name())
    } else {
        format!("{}__{}", pascal_case(&f.package), pascal_case(f.exposed_name()))
    }
}

pub fn request_message(f: &Function) -> String {
    format!("{}__Request", function_base(f))
}

pub fn response_message(f: &Function) -> String {
    format!("{}__Response", function_base(f))
}

/// Message of a composite type: its non-empty key parts, PascalCased.
pub fn composite_message(key: &TypeKey) -> String {
    key.parts()
        .map(pascal_case)
        .collect::<Vec<_>>()
        .join("__")
}

pub fn service_name(package: &str) -> String {
    if package.is_empty() {
        "Procedures".to_string()
    } else {
        pascal_case(package)
    }
}

pub fn rpc_name(f: &Function) -> String {
    pascal_case(f.exposed_name())
}

/// `package__name` call identifier of a function.
pub fn call_ident(f: &Function) -> String {
    let name = field_ident(f.exposed_name());
    if f.package.is_empty() {
        name
    } else {
        format!("{}__{}", field_ident(&f.package), name)
    }
}

/// SCREAMING case of [`call_ident`], for constants.
pub fn const_ident(f: &Function) -> String {
    call_ident(f).to_ascii_uppercase()
}

/// Synthesized key part for composites given inline by argument rows.
pub fn inline_type_name(object: &str, path: &[&str], suffix: &str) -> String {
    let mut name = object.to_ascii_uppercase();
    for p in path {
        name.push_str("__");
        name.push_str(&p.to_ascii_uppercase());
    }
    name.push('_');
    name.push_str(&suffix.to_ascii_uppercase());
    name
}
