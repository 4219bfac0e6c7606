//! Smoke-call fixtures.
//!
//! One JSON document per function: the call metadata, the field ordinals of
//! both messages, and a deterministic sample request. Numeric samples are
//! checked against their `NUMBER(p, s)` facets before they are written, so a
//! fixture never carries a value the database would reject.

use crate::{call_layout, Artifact, EmitError, Emitter};
use chrono::NaiveDate;
use procgen_model::naming::call_ident;
use procgen_model::{
    check_digits, CallLayout, ElementSpec, FieldSpec, FieldTable, Function, GenConfig, Model,
    ScalarKind, ScalarType, WireKind,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Collections in samples hold at most this many items (and never more than
/// the function's table cap).
const SAMPLE_ITEMS: u32 = 2;

pub struct FixtureEmitter;

impl Emitter for FixtureEmitter {
    fn name(&self) -> &'static str {
        "fixtures"
    }

    fn emit(&self, model: &Model, config: &GenConfig) -> Result<Vec<Artifact>, EmitError> {
        let mut out = Vec::with_capacity(model.functions.len());
        for f in &model.functions {
            let fixture = fixture(model, config, f)?;
            out.push(Artifact {
                path: format!("fixtures/{}.json", call_ident(f)),
                contents: serde_json::to_string_pretty(&fixture)? + "\n",
            });
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ordinals {
    pub request: BTreeMap<String, u32>,
    pub response: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fixture {
    pub function: String,
    pub target: String,
    pub request_message: String,
    pub response_message: String,
    pub streaming: bool,
    pub json_replacement: bool,
    pub handlers: Vec<String>,
    pub max_table_size: u32,
    pub ordinals: Ordinals,
    pub request: Value,
}

pub fn fixture(model: &Model, config: &GenConfig, f: &Function) -> Result<Fixture, EmitError> {
    let call: &CallLayout = call_layout(model, f)?;
    let sampler = Sampler {
        model,
        function: call.function.as_str(),
        items: SAMPLE_ITEMS.min(f.table_cap(config.max_table_size)),
    };
    Ok(Fixture {
        function: call.function.clone(),
        target: f.call_target(),
        request_message: call.request.message.clone(),
        response_message: call.response.message.clone(),
        streaming: call.streaming,
        json_replacement: f.is_json_replaced(),
        handlers: f.handlers.clone(),
        max_table_size: f.table_cap(config.max_table_size),
        ordinals: Ordinals {
            request: ordinals(&call.request),
            response: ordinals(&call.response),
        },
        request: sampler.message(&call.request, 0)?,
    })
}

fn ordinals(table: &FieldTable) -> BTreeMap<String, u32> {
    table
        .slots
        .iter()
        .map(|s| (s.field.clone(), s.ordinal))
        .collect()
}

struct Sampler<'a> {
    model: &'a Model,
    function: &'a str,
    items: u32,
}

impl Sampler<'_> {
    fn message(&self, table: &FieldTable, depth: u64) -> Result<Value, EmitError> {
        let mut out = Map::new();
        for slot in &table.slots {
            let seed = u64::from(slot.ordinal) + 10 * depth;
            out.insert(slot.field.clone(), self.field(&slot.field, &slot.spec, seed, depth)?);
        }
        Ok(Value::Object(out))
    }

    fn field(&self, field: &str, spec: &FieldSpec, seed: u64, depth: u64) -> Result<Value, EmitError> {
        if !spec.repeated {
            return self.element(field, &spec.element, seed, depth);
        }
        let mut items = Vec::new();
        for i in 0..u64::from(self.items) {
            items.push(self.element(field, &spec.element, seed + i, depth)?);
        }
        Ok(Value::Array(items))
    }

    fn element(
        &self,
        field: &str,
        element: &ElementSpec,
        seed: u64,
        depth: u64,
    ) -> Result<Value, EmitError> {
        match element {
            ElementSpec::Message { name, .. } => {
                let table = self
                    .model
                    .layout
                    .message(name)
                    .ok_or_else(|| EmitError::MissingMessage { name: name.clone() })?;
                self.message(table, depth + 1)
            }
            ElementSpec::Scalar { wire, scalar } => self.scalar(field, *wire, scalar, seed),
        }
    }

    fn scalar(&self, field: &str, wire: WireKind, scalar: &ScalarType, seed: u64) -> Result<Value, EmitError> {
        let numeric = matches!(
            scalar.kind,
            ScalarKind::Number | ScalarKind::Integer | ScalarKind::Float
        );
        if numeric {
            let text = numeric_sample(scalar, wire, seed);
            if scalar.kind != ScalarKind::Float {
                check_digits(&text, scalar.precision, scalar.scale).map_err(|source| {
                    EmitError::Fixture {
                        function: self.function.to_string(),
                        field: field.to_string(),
                        source,
                    }
                })?;
            }
            return typed_sample(&text, wire).ok_or_else(|| self.bad_sample(field, text, wire));
        }
        Ok(match wire {
            WireKind::Bool => Value::Bool(seed % 2 == 1),
            WireKind::Bytes => {
                let len = if scalar.length == 0 { 4 } else { scalar.length.min(4) };
                Value::from((0..len).map(|i| (seed + u64::from(i)) % 256).collect::<Vec<_>>())
            }
            WireKind::Timestamp => timestamp_sample(seed)
                .map(Value::String)
                .ok_or_else(|| self.bad_sample(field, seed.to_string(), wire))?,
            _ => Value::String(text_sample(field, scalar.length)),
        })
    }

    fn bad_sample(&self, field: &str, value: String, wire: WireKind) -> EmitError {
        EmitError::Sample {
            function: self.function.to_string(),
            field: field.to_string(),
            value,
            wire: format!("{wire:?}"),
        }
    }
}

/// JSON value of numeric sample text on the given wire, `None` when the text
/// does not parse as that wire type.
fn typed_sample(text: &str, wire: WireKind) -> Option<Value> {
    match wire {
        WireKind::Int32 | WireKind::Int64 => text.parse::<i64>().ok().map(Value::from),
        WireKind::Double => text.parse::<f64>().ok().map(Value::from),
        _ => Some(Value::String(text.to_string())),
    }
}

/// Decimal text fitting the scalar's facets: up to four integer digits,
/// two fraction digits when the scale allows them.
pub fn numeric_sample(scalar: &ScalarType, wire: WireKind, seed: u64) -> String {
    let scale = i64::from(scalar.scale.max(0));
    let int_digits = match (scalar.kind, scalar.precision) {
        (ScalarKind::Number, p) if p > 0 => (i64::from(p) - scale).clamp(0, 4),
        _ => 4,
    };
    let int_part = if int_digits == 0 {
        0
    } else {
        seed % 10u64.pow(int_digits as u32)
    };
    let fraction_digits = if scale > 0 {
        scale.min(2)
    } else if wire == WireKind::Double || (wire == WireKind::String && !scalar.is_integral()) {
        if scalar.kind == ScalarKind::Number && scalar.precision > 0 {
            0
        } else {
            1
        }
    } else {
        0
    };
    if fraction_digits == 0 {
        int_part.to_string()
    } else {
        format!("{int_part}.{}", "5".repeat(fraction_digits as usize))
    }
}

fn text_sample(field: &str, length: u32) -> String {
    if length == 0 {
        return field.to_string();
    }
    field.chars().take(length as usize).collect()
}

fn timestamp_sample(seed: u64) -> Option<String> {
    NaiveDate::from_ymd_opt(2020, 1, 1 + (seed % 28) as u32)
        .and_then(|d| d.and_hms_opt(12, (seed % 60) as u32, 0))
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}
