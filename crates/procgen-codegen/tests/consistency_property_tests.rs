//! The three emitters must agree on every field name and number.

use procgen_codegen::{emit_all, Artifact};
use procgen_model::naming::const_ident;
use procgen_model::{
    Argument, Attribute, DataType, Direction, Function, GenConfig, Model, ScalarType, TypeArena,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

const KINDS: &[&str] = &["VARCHAR2", "NUMBER", "PLS_INTEGER", "DATE", "CLOB", "RAW", "BOOLEAN"];

fn arb_argument() -> impl Strategy<Value = (String, usize, u8)> {
    ("[A-Z][A-Z_]{0,6}", 0..KINDS.len(), 0u8..3)
}

fn arb_function() -> impl Strategy<Value = Function> {
    (
        "[A-Z]{1,8}",
        prop::collection::vec(arb_argument(), 0..8),
        prop::option::of(0..KINDS.len()),
    )
        .prop_map(|(name, args, ret)| {
            let scalar = |i: usize| {
                DataType::Scalar(ScalarType::from_catalog(KINDS[i], 0, 0, 0, "").expect("scalar"))
            };
            let mut f = Function::new("APP", "PKG", name);
            f.arguments = args
                .into_iter()
                .enumerate()
                .map(|(i, (name, kind, dir))| Argument {
                    name,
                    data_type: scalar(kind),
                    direction: match dir {
                        0 => Direction::In,
                        1 => Direction::Out,
                        _ => Direction::InOut,
                    },
                    position: i as u32 + 1,
                })
                .collect();
            f.returns = ret.map(|k| Attribute {
                name: "ret".into(),
                data_type: scalar(k),
            });
            f
        })
}

fn artifact<'a>(artifacts: &'a [Artifact], suffix: &str) -> &'a str {
    artifacts
        .iter()
        .find(|a| a.path.ends_with(suffix))
        .map(|a| a.contents.as_str())
        .expect("artifact")
}

/// `(message, field) -> number` from proto text.
fn proto_numbers(proto: &str) -> BTreeMap<(String, String), u32> {
    let mut out = BTreeMap::new();
    let mut message = None;
    for line in proto.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("message ") {
            message = rest.strip_suffix(" {").map(str::to_string);
        } else if line == "}" {
            message = None;
        } else if let (Some(m), Some((decl, number))) = (&message, line.split_once(" = ")) {
            if line.starts_with("//") {
                continue;
            }
            let field = decl.rsplit(' ').next().expect("field").to_string();
            let number = number.trim_end_matches(';').parse().expect("number");
            out.insert((m.clone(), field), number);
        }
    }
    out
}

/// `(field, ordinal, direction)` of one CallSpec.
fn wrapper_params(code: &str, constant: &str) -> Vec<(String, u32, String)> {
    let start = code
        .find(&format!("pub static {constant}: CallSpec"))
        .expect("call spec");
    let block = &code[start..];
    let block = &block[..block.find("};").expect("end of spec")];
    block
        .lines()
        .filter(|l| l.trim_start().starts_with("Param {"))
        .map(|l| {
            let value = |key: &str| {
                let at = l.find(key).expect("key") + key.len();
                l[at..].split(',').next().expect("value").trim().to_string()
            };
            (
                value("field:").trim_matches('"').to_string(),
                value("ordinal:").parse().expect("ordinal"),
                value("direction:"),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn emitters_agree_on_field_numbers(functions in prop::collection::vec(arb_function(), 1..4)) {
        let mut functions = functions;
        functions.sort_by_key(Function::qualified_name);
        functions.dedup_by_key(|f| f.qualified_name());
        let config = GenConfig::default();
        let model = Model::freeze(functions, TypeArena::default(), &config);
        let artifacts = emit_all(&model, &config).expect("emit");
        let proto = proto_numbers(artifact(&artifacts, ".proto"));
        let code = artifact(&artifacts, ".rs");

        for f in &model.functions {
            let call = model.layout.call(f).expect("layout");
            let fixture: serde_json::Value = serde_json::from_str(artifact(
                &artifacts,
                &format!("/{}.json", procgen_model::naming::call_ident(f)),
            ))
            .expect("fixture json");

            for (field, ordinal, direction) in wrapper_params(code, &const_ident(f)) {
                let mut messages = Vec::new();
                if direction != "Direction::Out" {
                    messages.push((&call.request.message, "request"));
                }
                if direction != "Direction::In" {
                    messages.push((&call.response.message, "response"));
                }
                for (message, side) in messages {
                    prop_assert_eq!(
                        proto.get(&(message.clone(), field.clone())).copied(),
                        Some(ordinal)
                    );
                    prop_assert_eq!(
                        fixture["ordinals"][side][&field].as_u64(),
                        Some(u64::from(ordinal))
                    );
                }
            }
            let proto_fields = proto
                .keys()
                .filter(|(m, _)| *m == call.request.message || *m == call.response.message)
                .count();
            prop_assert_eq!(
                proto_fields,
                call.request.slots.len() + call.response.slots.len()
            );
        }
    }
}
