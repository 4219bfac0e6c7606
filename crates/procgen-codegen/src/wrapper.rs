//! Rust wrapper-code emitter.
//!
//! Generates, for the whole model:
//!
//! - a serde struct per message, fields in ordinal order;
//! - a `CallSpec` constant per function: the anonymous block to execute, the
//!   bound parameters with their ordinals, replacement target, handler tags
//!   and table cap;
//! - a typed wrapper per function over a caller-supplied `Session`;
//! - `handlers()`, a name-to-wrapper table for dynamic dispatch.

use crate::{call_layout, comment_lines, Artifact, EmitError, Emitter};
use procgen_model::naming::{call_ident, const_ident, rust_ident};
use procgen_model::{
    CallLayout, DataType, Direction, ElementSpec, FieldSpec, FieldTable, Function, GenConfig,
    Model, SlotSource, WireKind,
};

pub struct WrapperEmitter;

impl Emitter for WrapperEmitter {
    fn name(&self) -> &'static str {
        "wrapper"
    }

    fn emit(&self, model: &Model, config: &GenConfig) -> Result<Vec<Artifact>, EmitError> {
        Ok(vec![Artifact {
            path: format!("{}.rs", config.idl_package),
            contents: render(model, config)?,
        }])
    }
}

const PRELUDE: &str = r#"#![allow(non_camel_case_types, non_snake_case, dead_code, clippy::all)]

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    InOut,
}

/// A bound parameter of a call.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    /// Database parameter name.
    pub name: &'static str,
    /// Field in the request/response message.
    pub field: &'static str,
    /// Field number, shared with the IDL schema.
    pub ordinal: u32,
    pub direction: Direction,
    pub catalog_type: &'static str,
}

/// Everything needed to execute one function.
#[derive(Debug, Clone, Copy)]
pub struct CallSpec {
    /// Lower-cased `package.name`, as exposed.
    pub function: &'static str,
    /// Database object actually called.
    pub target: &'static str,
    pub plsql: &'static str,
    pub params: &'static [Param],
    pub streaming: bool,
    pub json_replacement: bool,
    pub handlers: &'static [&'static str],
    pub max_table_size: u32,
}

/// Executes calls against a database connection.
pub trait Session {
    type Error;

    fn call<Req, Resp>(&mut self, spec: &'static CallSpec, request: &Req) -> Result<Resp, Self::Error>
    where
        Req: Serialize,
        Resp: DeserializeOwned;

    fn call_stream<Req, Resp>(
        &mut self,
        spec: &'static CallSpec,
        request: &Req,
    ) -> Result<Vec<Resp>, Self::Error>
    where
        Req: Serialize,
        Resp: DeserializeOwned;
}

#[derive(Debug)]
pub enum DispatchError<E> {
    Json(serde_json::Error),
    Call(E),
}

pub type Handler<S> =
    fn(&mut S, serde_json::Value) -> Result<serde_json::Value, DispatchError<<S as Session>::Error>>;
"#;

pub fn render(model: &Model, config: &GenConfig) -> Result<String, EmitError> {
    let mut out = String::new();
    out.push_str("//! Code generated by procgen. DO NOT EDIT.\n");
    out.push_str(PRELUDE);

    for f in &model.functions {
        let call = call_layout(model, f)?;
        let common = f.doc.common.as_str();
        write_struct(&mut out, &call.request, common);
        write_struct(&mut out, &call.response, common);
    }
    for table in model.layout.messages.values() {
        write_struct(&mut out, table, "");
    }

    for f in &model.functions {
        let call = call_layout(model, f)?;
        write_call_spec(&mut out, f, call, config);
        write_wrapper(&mut out, f, call);
    }
    write_dispatch(&mut out, model)?;
    Ok(out)
}

pub fn rust_type(spec: &FieldSpec) -> String {
    let element = match &spec.element {
        ElementSpec::Scalar { wire, .. } => match wire {
            WireKind::String => "String",
            WireKind::Int32 => "i32",
            WireKind::Int64 => "i64",
            WireKind::Double => "f64",
            WireKind::Bool => "bool",
            WireKind::Bytes => "Vec<u8>",
            WireKind::Timestamp => "chrono::NaiveDateTime",
        },
        ElementSpec::Message { name, .. } => name.as_str(),
    };
    if spec.repeated {
        format!("Vec<{element}>")
    } else {
        format!("Option<{element}>")
    }
}

fn write_struct(out: &mut String, table: &FieldTable, doc: &str) {
    out.push('\n');
    out.push_str(&comment_lines(doc, "/// "));
    out.push_str("#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]\n");
    out.push_str("#[serde(default)]\n");
    out.push_str(&format!("pub struct {} {{\n", table.message));
    for slot in &table.slots {
        if let Some(doc) = &slot.doc {
            out.push_str(&comment_lines(doc, "    /// "));
        }
        out.push_str(&format!(
            "    pub {}: {},\n",
            rust_ident(&slot.field),
            rust_type(&slot.spec)
        ));
    }
    out.push_str("}\n");
}

/// The anonymous block executing `f`, with one bind per parameter.
pub fn plsql_block(f: &Function) -> String {
    let target = f.call_target();
    if f.is_json_replaced() {
        return format!("BEGIN :ret := {target}(:request); END;");
    }
    let binds: Vec<String> = f
        .arguments
        .iter()
        .map(|a| format!("{} => :{}", a.name, a.position))
        .collect();
    let call = format!("{target}({})", binds.join(", "));
    match &f.returns {
        Some(_) => format!("BEGIN :{} := {call}; END;", f.arguments.len() + 1),
        None => format!("BEGIN {call}; END;"),
    }
}

fn catalog_type(data_type: &DataType) -> String {
    match data_type {
        DataType::Scalar(s) => s.abs_type(),
        DataType::Composite(r) => r.key.to_string(),
    }
}

fn direction_path(direction: Direction) -> &'static str {
    match direction {
        Direction::In => "Direction::In",
        Direction::Out => "Direction::Out",
        Direction::InOut => "Direction::InOut",
    }
}

fn write_call_spec(out: &mut String, f: &Function, call: &CallLayout, config: &GenConfig) {
    let mut params = String::new();
    for arg in &f.arguments {
        // In/out parameters appear in both messages under one name.
        let field = call
            .request
            .slots
            .iter()
            .chain(call.response.slots.iter())
            .find(|s| matches!(&s.source, SlotSource::Parameter { position, .. } if *position == arg.position))
            .map_or("", |s| s.field.as_str());
        params.push_str(&format!(
            "        Param {{ name: {:?}, field: {:?}, ordinal: {}, direction: {}, catalog_type: {:?} }},\n",
            arg.name,
            field,
            arg.position,
            direction_path(arg.direction),
            catalog_type(&arg.data_type),
        ));
    }
    if let Some(ret) = &f.returns {
        let field = call
            .response
            .slots
            .iter()
            .find(|s| s.source == SlotSource::Return)
            .map_or("", |s| s.field.as_str());
        params.push_str(&format!(
            "        Param {{ name: \"\", field: {:?}, ordinal: {}, direction: Direction::Out, catalog_type: {:?} }},\n",
            field,
            f.arguments.len() + 1,
            catalog_type(&ret.data_type),
        ));
    }
    let handlers: Vec<String> = f.handlers.iter().map(|h| format!("{h:?}")).collect();

    out.push_str(&format!("\npub static {}: CallSpec = CallSpec {{\n", const_ident(f)));
    out.push_str(&format!("    function: {:?},\n", call.function));
    out.push_str(&format!("    target: {:?},\n", f.call_target()));
    out.push_str(&format!("    plsql: {:?},\n", plsql_block(f)));
    out.push_str(&format!("    params: &[\n{params}    ],\n"));
    out.push_str(&format!("    streaming: {},\n", call.streaming));
    out.push_str(&format!("    json_replacement: {},\n", f.is_json_replaced()));
    out.push_str(&format!("    handlers: &[{}],\n", handlers.join(", ")));
    out.push_str(&format!(
        "    max_table_size: {},\n",
        f.table_cap(config.max_table_size)
    ));
    out.push_str("};\n");
}

fn write_wrapper(out: &mut String, f: &Function, call: &CallLayout) {
    let (ret, method) = if call.streaming {
        (format!("Vec<{}>", call.response.message), "call_stream")
    } else {
        (call.response.message.clone(), "call")
    };
    out.push('\n');
    out.push_str(&comment_lines(&f.doc.common, "/// "));
    out.push_str(&format!(
        "pub fn {}<S: Session>(session: &mut S, request: &{}) -> Result<{ret}, S::Error> {{\n",
        call_ident(f),
        call.request.message
    ));
    out.push_str(&format!("    session.{method}(&{}, request)\n", const_ident(f)));
    out.push_str("}\n");
}

fn write_dispatch(out: &mut String, model: &Model) -> Result<(), EmitError> {
    out.push_str("\n/// Wrappers by lower-cased `package.name`, over JSON messages.\n");
    out.push_str("pub fn handlers<S: Session>() -> BTreeMap<&'static str, Handler<S>> {\n");
    out.push_str("    let mut table: BTreeMap<&'static str, Handler<S>> = BTreeMap::new();\n");
    for f in &model.functions {
        let call = call_layout(model, f)?;
        out.push_str(&format!(
            "    table.insert({:?}, |session, input| {{\n",
            call.function
        ));
        out.push_str(&format!(
            "        let request: {} = serde_json::from_value(input).map_err(DispatchError::Json)?;\n",
            call.request.message
        ));
        out.push_str(&format!(
            "        let response = {}(session, &request).map_err(DispatchError::Call)?;\n",
            call_ident(f)
        ));
        out.push_str("        serde_json::to_value(response).map_err(DispatchError::Json)\n");
        out.push_str("    });\n");
    }
    out.push_str("    table\n}\n");
    Ok(())
}
