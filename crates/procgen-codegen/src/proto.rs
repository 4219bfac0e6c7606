//! proto3 schema emitter.
//!
//! One request and one response message per function, one message per
//! composite type, and one service per package. A function producing a
//! cursor gets a streaming response.

use crate::{call_layout, comment_lines, Artifact, EmitError, Emitter};
use procgen_model::naming::{rpc_name, service_name};
use procgen_model::{
    DataType, ElementSpec, FieldSlot, FieldSpec, FieldTable, GenConfig, Model, WireKind,
};

const TIMESTAMP_IMPORT: &str = "google/protobuf/timestamp.proto";

pub struct ProtoEmitter;

impl Emitter for ProtoEmitter {
    fn name(&self) -> &'static str {
        "proto"
    }

    fn emit(&self, model: &Model, config: &GenConfig) -> Result<Vec<Artifact>, EmitError> {
        Ok(vec![Artifact {
            path: format!("{}.proto", config.idl_package),
            contents: render(model, config)?,
        }])
    }
}

pub fn wire_type(wire: WireKind) -> &'static str {
    match wire {
        WireKind::String => "string",
        WireKind::Int32 => "int32",
        WireKind::Int64 => "int64",
        WireKind::Double => "double",
        WireKind::Bool => "bool",
        WireKind::Bytes => "bytes",
        WireKind::Timestamp => "google.protobuf.Timestamp",
    }
}

fn field_type(spec: &FieldSpec) -> String {
    let element = match &spec.element {
        ElementSpec::Scalar { wire, .. } => wire_type(*wire),
        ElementSpec::Message { name, .. } => name.as_str(),
    };
    if spec.repeated {
        format!("repeated {element}")
    } else {
        element.to_string()
    }
}

fn uses_timestamp(model: &Model) -> bool {
    let tables = model
        .layout
        .calls
        .values()
        .flat_map(|c| [&c.request, &c.response])
        .chain(model.layout.messages.values());
    tables
        .flat_map(|t| t.slots.iter())
        .any(|s| matches!(s.spec.element, ElementSpec::Scalar { wire: WireKind::Timestamp, .. }))
}

pub fn render(model: &Model, config: &GenConfig) -> Result<String, EmitError> {
    let mut out = String::new();
    out.push_str("// Code generated by procgen. DO NOT EDIT.\n");
    out.push_str("syntax = \"proto3\";\n\n");
    out.push_str(&format!("package {};\n", config.idl_package));
    if uses_timestamp(model) {
        out.push_str(&format!("\nimport \"{TIMESTAMP_IMPORT}\";\n"));
    }

    for f in &model.functions {
        let call = call_layout(model, f)?;
        let common = f.doc.common.as_str();
        write_message(&mut out, &call.request, common);
        write_message(&mut out, &call.response, common);
    }
    for table in model.layout.messages.values() {
        write_message(&mut out, table, "");
    }

    for package in model.packages() {
        out.push_str(&format!("\nservice {} {{\n", service_name(package)));
        for f in model.functions_in(package) {
            let call = call_layout(model, f)?;
            out.push_str(&comment_lines(&f.doc.common, "  // "));
            let stream = if call.streaming { "stream " } else { "" };
            out.push_str(&format!(
                "  rpc {} ({}) returns ({}{}) {{}}\n",
                rpc_name(f),
                call.request.message,
                stream,
                call.response.message
            ));
        }
        out.push_str("}\n");
    }
    Ok(out)
}

fn write_message(out: &mut String, table: &FieldTable, doc: &str) {
    out.push('\n');
    out.push_str(&comment_lines(doc, "// "));
    out.push_str(&format!("message {} {{\n", table.message));
    for slot in &table.slots {
        out.push_str(&comment_lines(&field_comment(slot), "  // "));
        out.push_str(&format!(
            "  {} {} = {};\n",
            field_type(&slot.spec),
            slot.field,
            slot.ordinal
        ));
    }
    out.push_str("}\n");
}

fn field_comment(slot: &FieldSlot) -> String {
    let mut lines = Vec::new();
    if let Some(doc) = slot.doc.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(doc.to_string());
    }
    match &slot.data_type {
        DataType::Scalar(s) => lines.push(s.abs_type()),
        DataType::Composite(r) => lines.push(format!("{} {}", r.kind, r.key)),
    }
    lines.join("\n")
}
