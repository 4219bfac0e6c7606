//! The merge step.
//!
//! Inputs are joined by key (functions by qualified name, docs by catalog
//! key, resolutions by `(kind, TypeKey)`), so the order in which the gather
//! tasks completed does not matter. Directives are applied once, in verb
//! order, and the result is frozen.

use crate::convert::{Converter, ResolutionTable};
use crate::error::AssembleError;
use procgen_ingest_catalog::RawFunction;
use procgen_ingest_docs::PackageDocs;
use procgen_model::{
    Annotation, AnnotationKind, Function, GenConfig, Model, Replacement, TypeArena,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Everything the gather phase produced.
#[derive(Debug, Default)]
pub struct AssemblyInput {
    pub functions: Vec<RawFunction>,
    pub resolutions: ResolutionTable,
    /// Per package, keyed by upper-cased package name.
    pub packages: BTreeMap<String, PackageDocs>,
    /// Directives from outside the sources (CLI rules).
    pub extra_annotations: Vec<Annotation>,
    /// Problems the gather phase recovered from.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFunction {
    pub function: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub functions: usize,
    pub skipped: Vec<SkippedFunction>,
    pub composite_types: usize,
    pub directives: usize,
    pub warnings: Vec<String>,
    pub type_fetches: usize,
}

#[derive(Debug, Clone)]
pub struct Assembled {
    pub model: Model,
    pub summary: RunSummary,
}

pub struct ModelAssembler {
    config: GenConfig,
}

impl ModelAssembler {
    pub fn new(config: GenConfig) -> Self {
        ModelAssembler { config }
    }

    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    pub fn assemble(&self, input: AssemblyInput) -> Result<Assembled, AssembleError> {
        let mut summary = RunSummary {
            warnings: input.warnings.clone(),
            ..RunSummary::default()
        };
        let mut types = TypeArena::default();
        let mut functions: Vec<Function> = Vec::with_capacity(input.functions.len());
        let mut seen = BTreeSet::new();

        for raw in &input.functions {
            let mut converter = Converter::new(&input.resolutions, raw);
            let mut function = match converter.function(raw) {
                Ok(f) => f,
                Err(err) if err.is_skippable() && self.config.skip_missing_table_of => {
                    warn!(function = %raw.qualified_name(), error = %err, "skipping function");
                    summary.skipped.push(SkippedFunction {
                        function: raw.qualified_name(),
                        reason: err.to_string(),
                    });
                    continue;
                }
                Err(source) => {
                    return Err(AssembleError::Resolve {
                        function: raw.qualified_name(),
                        source,
                    })
                }
            };
            if !seen.insert(function.catalog_key()) {
                warn!(function = %raw.qualified_name(), "skipping overload");
                summary.skipped.push(SkippedFunction {
                    function: raw.qualified_name(),
                    reason: "overloaded name".to_string(),
                });
                continue;
            }
            types.extend(&converter.types);
            if let Some(doc) = input
                .packages
                .get(&function.package.to_ascii_uppercase())
                .and_then(|p| p.doc(&function.catalog_key()))
            {
                function.doc = doc.clone();
            }
            functions.push(function);
        }

        let mut annotations: Vec<Annotation> = input
            .packages
            .values()
            .flat_map(|p| p.annotations.iter().cloned())
            .collect();
        annotations.extend(input.extra_annotations.iter().cloned());
        summary.directives = annotations.len();
        summary.warnings.extend(
            input
                .packages
                .values()
                .flat_map(|p| p.warnings.iter().map(ToString::to_string)),
        );
        summary.warnings.extend(apply_annotations(&mut functions, annotations));

        functions.sort_by_key(Function::qualified_name);
        let model = Model::freeze(functions, types, &self.config);
        summary.functions = model.functions.len();
        summary.composite_types = model.types.len();
        info!(
            functions = summary.functions,
            skipped = summary.skipped.len(),
            composite_types = summary.composite_types,
            directives = summary.directives,
            warnings = summary.warnings.len(),
            "model assembled"
        );
        Ok(Assembled { model, summary })
    }
}

// ============================================================================
// Directives
// ============================================================================

/// Apply directives to a function set in verb order (stable within a verb).
/// Returns the warnings for directives that could not be applied.
pub fn apply_annotations(
    functions: &mut Vec<Function>,
    mut annotations: Vec<Annotation>,
) -> Vec<String> {
    annotations.sort_by_key(|a| a.kind);
    let mut warnings = Vec::new();
    for a in &annotations {
        match apply_one(functions, a) {
            Ok(()) => debug!(directive = %a, "applied directive"),
            Err(msg) => {
                warn!(directive = %a, reason = %msg, "directive not applied");
                warnings.push(format!("{a}: {msg}"));
            }
        }
    }
    warnings
}

/// Every directive kind names its functions by catalog name, so a rename
/// never changes what a later directive refers to.
fn position(functions: &[Function], key: &str) -> Option<usize> {
    functions.iter().position(|f| f.catalog_key() == key)
}

fn apply_one(functions: &mut Vec<Function>, a: &Annotation) -> Result<(), String> {
    let target = a.target_key();
    match a.kind {
        AnnotationKind::Private => {
            let at = position(functions, &target).ok_or("no such function")?;
            functions.remove(at);
        }
        AnnotationKind::Rename => {
            let alias = a.other.as_deref().ok_or("missing alias")?;
            let other = a.other_key().ok_or("missing alias")?;
            if functions.iter().any(|f| f.qualified_name() == other) {
                return Err(format!("{other} already exists"));
            }
            let at = position(functions, &target).ok_or("no such function")?;
            functions[at].alias = Some(alias.to_string());
        }
        AnnotationKind::Replace | AnnotationKind::ReplaceJson => {
            let other = a.other_key().ok_or("missing replacement")?;
            if other == target {
                return Err("function cannot replace itself".to_string());
            }
            position(functions, &target).ok_or("no such function")?;
            let from = position(functions, &other).ok_or("no such replacement")?;
            let replacement = functions.remove(from);
            let at = position(functions, &target).ok_or("no such function")?;
            functions[at].replacement = Some(Replacement {
                function: Box::new(replacement),
                json: a.kind == AnnotationKind::ReplaceJson,
            });
        }
        AnnotationKind::Handle => {
            let handler = a.name.to_ascii_uppercase();
            for f in functions
                .iter_mut()
                .filter(|f| f.package.eq_ignore_ascii_case(&a.package))
            {
                if !f.handlers.contains(&handler) {
                    f.handlers.push(handler.clone());
                }
            }
        }
        AnnotationKind::MaxTableSize => {
            let size = a.size.ok_or("missing size")?;
            let at = position(functions, &target).ok_or("no such function")?;
            let cap = &mut functions[at].max_table_size;
            *cap = Some(cap.map_or(size, |c| c.max(size)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgen_ingest_catalog::{normalize, ArgumentRow};
    use procgen_ingest_docs::{parse_package_source, AnnotationEngine};

    fn row(object: &str, seq: u32, name: &str, kind: &str, dir: &str) -> ArgumentRow {
        ArgumentRow {
            owner: "APP".into(),
            package: "PKG".into(),
            object: object.into(),
            sequence: seq,
            argument_name: name.into(),
            direction: dir.into(),
            data_kind: kind.into(),
            ..ArgumentRow::default()
        }
    }

    fn functions(names: &[&str]) -> Vec<Function> {
        names.iter().map(|n| Function::new("APP", "PKG", *n)).collect()
    }

    fn names(functions: &[Function]) -> Vec<String> {
        functions.iter().map(Function::qualified_name).collect()
    }

    #[test]
    fn rename_sets_alias() {
        let mut fs = functions(&["FOO"]);
        let warnings = apply_annotations(
            &mut fs,
            vec![Annotation::new("PKG", AnnotationKind::Rename, "foo").with_other("bar")],
        );
        assert!(warnings.is_empty());
        assert_eq!(fs[0].alias.as_deref(), Some("bar"));
        assert_eq!(fs[0].qualified_name(), "pkg.bar");
        assert_eq!(fs[0].catalog_key(), "pkg.foo");
    }

    #[test]
    fn rename_onto_existing_name_is_refused() {
        let mut fs = functions(&["FOO", "BAR"]);
        let warnings = apply_annotations(
            &mut fs,
            vec![Annotation::new("PKG", AnnotationKind::Rename, "foo").with_other("bar")],
        );
        assert_eq!(warnings.len(), 1);
        assert!(fs[0].alias.is_none());
    }

    #[test]
    fn max_table_size_only_grows() {
        let mut fs = functions(&["FOO"]);
        apply_annotations(
            &mut fs,
            vec![
                Annotation::new("PKG", AnnotationKind::MaxTableSize, "foo").with_size(10),
                Annotation::new("PKG", AnnotationKind::MaxTableSize, "foo").with_size(5),
            ],
        );
        assert_eq!(fs[0].max_table_size, Some(10));
    }

    #[test]
    fn directives_after_a_rename_use_the_catalog_name() {
        let mut fs = functions(&["FOO", "OTHER"]);
        let warnings = apply_annotations(
            &mut fs,
            vec![
                Annotation::new("PKG", AnnotationKind::Rename, "foo").with_other("bar"),
                Annotation::new("PKG", AnnotationKind::MaxTableSize, "foo").with_size(9),
                Annotation::new("PKG", AnnotationKind::MaxTableSize, "bar").with_size(50),
            ],
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no such function"));
        assert_eq!(fs[0].qualified_name(), "pkg.bar");
        assert_eq!(fs[0].max_table_size, Some(9));
        assert_eq!(fs[1].max_table_size, None);
    }

    #[test]
    fn private_runs_before_rename() {
        let mut fs = functions(&["FOO", "HELPER"]);
        let warnings = apply_annotations(
            &mut fs,
            vec![
                Annotation::new("PKG", AnnotationKind::Rename, "foo").with_other("helper"),
                Annotation::new("PKG", AnnotationKind::Private, "helper"),
            ],
        );
        assert!(warnings.is_empty());
        assert_eq!(names(&fs), vec!["pkg.helper"]);
        assert_eq!(fs[0].name, "FOO");
    }

    #[test]
    fn replace_moves_the_target_under_the_function() {
        let mut fs = functions(&["SLOW", "FAST", "OTHER"]);
        apply_annotations(
            &mut fs,
            vec![Annotation::new("PKG", AnnotationKind::ReplaceJson, "slow").with_other("fast")],
        );
        assert_eq!(names(&fs), vec!["pkg.slow", "pkg.other"]);
        assert_eq!(fs[0].call_target(), "PKG.FAST");
        assert!(fs[0].is_json_replaced());
    }

    #[test]
    fn handle_tags_the_whole_package() {
        let mut fs = functions(&["A", "B"]);
        fs.push(Function::new("APP", "OTHER", "C"));
        apply_annotations(
            &mut fs,
            vec![
                Annotation::new("PKG", AnnotationKind::Handle, "audit"),
                Annotation::new("pkg", AnnotationKind::Handle, "AUDIT"),
            ],
        );
        assert_eq!(fs[0].handlers, vec!["AUDIT".to_string()]);
        assert_eq!(fs[1].handlers, vec!["AUDIT".to_string()]);
        assert!(fs[2].handlers.is_empty());
    }

    #[test]
    fn skip_policy_controls_unknown_scalars() {
        let rows = vec![
            row("GOOD", 1, "P_ID", "NUMBER", "IN"),
            row("BAD", 1, "P_X", "XMLTYPE", "IN"),
        ];
        let input = || AssemblyInput {
            functions: normalize(&rows).expect("normalize"),
            ..AssemblyInput::default()
        };

        let assembled = ModelAssembler::new(GenConfig::default())
            .assemble(input())
            .expect("assemble");
        assert_eq!(names(&assembled.model.functions), vec!["pkg.good"]);
        assert_eq!(assembled.summary.skipped.len(), 1);
        assert_eq!(assembled.summary.skipped[0].function, "PKG.BAD");

        let strict = GenConfig {
            skip_missing_table_of: false,
            ..GenConfig::default()
        };
        let err = ModelAssembler::new(strict)
            .assemble(input())
            .expect_err("abort");
        assert!(matches!(err, AssembleError::Resolve { ref function, .. } if function == "PKG.BAD"));
    }

    #[test]
    fn second_overload_is_skipped() {
        let mut first = row("FIND", 1, "P_ID", "NUMBER", "IN");
        first.subprogram_id = 1;
        let mut second = row("FIND", 1, "P_NAME", "VARCHAR2", "IN");
        second.subprogram_id = 2;
        let raw = normalize(&[first, second]).expect("normalize");
        assert_eq!(raw.len(), 2);

        let assembled = ModelAssembler::new(GenConfig::default())
            .assemble(AssemblyInput {
                functions: raw,
                ..AssemblyInput::default()
            })
            .expect("assemble");
        let fs = &assembled.model.functions;
        assert_eq!(names(fs), vec!["pkg.find"]);
        assert_eq!(fs[0].arguments[0].name, "P_ID");
        assert_eq!(assembled.summary.skipped.len(), 1);
        assert_eq!(assembled.summary.skipped[0].function, "PKG.FIND");
        assert_eq!(assembled.summary.skipped[0].reason, "overloaded name");
    }

    #[test]
    fn docs_and_directives_from_package_source() {
        let rows = vec![
            row("GET_USR", 1, "P_ID", "NUMBER", "IN"),
            row("LIST_USERS", 1, "P_LIMIT", "PLS_INTEGER", "IN"),
        ];
        let source = "PACKAGE pkg IS\n\
            -- procgen:rename get_usr => get_user\n\
            -- Fetch one user.\n\
            -- in:\n\
            --   - p_id - user id\n\
            FUNCTION get_usr(p_id NUMBER) RETURN VARCHAR2;\n\
            PROCEDURE list_users(p_limit PLS_INTEGER);\n\
            END;\n";
        let docs = parse_package_source("PKG", source, &AnnotationEngine::new(["procgen"]))
            .expect("docs");
        let input = AssemblyInput {
            functions: normalize(&rows).expect("normalize"),
            packages: BTreeMap::from([("PKG".to_string(), docs)]),
            ..AssemblyInput::default()
        };
        let assembled = ModelAssembler::new(GenConfig::default())
            .assemble(input)
            .expect("assemble");
        let fs = &assembled.model.functions;
        assert_eq!(names(fs), vec!["pkg.get_user", "pkg.list_users"]);
        assert_eq!(fs[0].doc.common, "Fetch one user.");
        assert_eq!(
            fs[0].doc.input.get("p_id").map(String::as_str),
            Some("user id")
        );
        assert_eq!(assembled.summary.directives, 1);
    }
}
