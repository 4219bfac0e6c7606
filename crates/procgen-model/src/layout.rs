//! The field-correspondence table.
//!
//! Built once when the model is frozen. Every emitter reads message names,
//! field names, ordinals and wire kinds from here and nowhere else, so the
//! wrapper code, the IDL schema and the fixtures agree by construction.

use crate::config::GenConfig;
use crate::function::{Direction, Function};
use crate::naming;
use crate::types::{
    Attribute, CompositeKind, CompositeType, DataType, ScalarKind, ScalarType, TypeArena, TypeKey,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Name of the return-value field in a response message.
pub const RETURN_FIELD: &str = "ret";
/// Name of the single field of a nested-collection wrapper message.
pub const ITEMS_FIELD: &str = "items";

/// Wire representation of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireKind {
    String,
    Int32,
    Int64,
    Double,
    Bool,
    Bytes,
    Timestamp,
}

impl WireKind {
    pub fn of(scalar: &ScalarType, number_as_string: bool) -> WireKind {
        match scalar.kind {
            ScalarKind::Text | ScalarKind::Clob => WireKind::String,
            ScalarKind::Integer | ScalarKind::Number | ScalarKind::Float if number_as_string => {
                WireKind::String
            }
            ScalarKind::Integer => WireKind::Int32,
            ScalarKind::Number if scalar.is_integral() && scalar.precision <= 18 => {
                WireKind::Int64
            }
            ScalarKind::Number | ScalarKind::Float => WireKind::Double,
            ScalarKind::DateTime => WireKind::Timestamp,
            ScalarKind::Raw | ScalarKind::Blob => WireKind::Bytes,
            ScalarKind::Boolean => WireKind::Bool,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementSpec {
    Scalar { wire: WireKind, scalar: ScalarType },
    Message { name: String, key: TypeKey },
}

/// Shape of one message field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub repeated: bool,
    pub element: ElementSpec,
}

impl FieldSpec {
    pub fn of(data_type: &DataType, types: &TypeArena, config: &GenConfig) -> FieldSpec {
        match data_type {
            DataType::Scalar(s) => FieldSpec {
                repeated: false,
                element: scalar_element(s, config),
            },
            DataType::Composite(r) => match r.kind {
                CompositeKind::Record => FieldSpec {
                    repeated: false,
                    element: message_element(&r.key),
                },
                CompositeKind::Collection | CompositeKind::Cursor => {
                    let element = match types.element_of(r) {
                        Some(DataType::Scalar(s)) => scalar_element(&s, config),
                        Some(DataType::Composite(inner)) => message_element(&inner.key),
                        None => message_element(&r.key),
                    };
                    FieldSpec {
                        repeated: true,
                        element,
                    }
                }
            },
        }
    }

    pub fn message_name(&self) -> Option<&str> {
        match &self.element {
            ElementSpec::Message { name, .. } => Some(name),
            ElementSpec::Scalar { .. } => None,
        }
    }
}

fn scalar_element(s: &ScalarType, config: &GenConfig) -> ElementSpec {
    ElementSpec::Scalar {
        wire: WireKind::of(s, config.number_as_string),
        scalar: s.clone(),
    }
}

fn message_element(key: &TypeKey) -> ElementSpec {
    ElementSpec::Message {
        name: naming::composite_message(key),
        key: key.clone(),
    }
}

/// Where a field's value comes from on the database side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotSource {
    Parameter {
        name: String,
        position: u32,
        direction: Direction,
    },
    Return,
    Attribute {
        name: String,
    },
    Items,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlot {
    pub field: String,
    pub ordinal: u32,
    pub source: SlotSource,
    pub data_type: DataType,
    pub spec: FieldSpec,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTable {
    pub message: String,
    /// Composite key for type messages; `None` for request/response.
    pub key: Option<TypeKey>,
    pub slots: Vec<FieldSlot>,
}

impl FieldTable {
    pub fn slot(&self, field: &str) -> Option<&FieldSlot> {
        self.slots.iter().find(|s| s.field == field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLayout {
    /// Lower-cased `package.exposed_name`.
    pub function: String,
    pub request: FieldTable,
    pub response: FieldTable,
    pub streaming: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub calls: BTreeMap<String, CallLayout>,
    /// Composite messages by message name.
    pub messages: BTreeMap<String, FieldTable>,
}

impl Layout {
    pub fn build(functions: &[Function], types: &TypeArena, config: &GenConfig) -> Layout {
        let mut layout = Layout::default();
        for f in functions {
            let call = call_layout(f, types, config);
            layout.calls.insert(call.function.clone(), call);
        }
        for (key, attributes) in types.records() {
            let table = record_table(key, attributes, types, config);
            layout.messages.insert(table.message.clone(), table);
        }
        for wrapper in collection_wrappers(types, config) {
            layout.messages.insert(wrapper.message.clone(), wrapper);
        }
        layout
    }

    pub fn call(&self, f: &Function) -> Option<&CallLayout> {
        self.calls.get(&f.qualified_name())
    }

    pub fn message(&self, name: &str) -> Option<&FieldTable> {
        self.messages.get(name)
    }
}

fn call_layout(f: &Function, types: &TypeArena, config: &GenConfig) -> CallLayout {
    let slot = |field: String, ordinal: u32, source: SlotSource, dt: &DataType, doc: Option<&str>| {
        FieldSlot {
            field,
            ordinal,
            source,
            data_type: dt.clone(),
            spec: FieldSpec::of(dt, types, config),
            doc: doc.map(str::to_string),
        }
    };

    // One name per parameter, shared by both messages.
    let mut request = Vec::new();
    let mut response = Vec::new();
    let mut names = BTreeSet::new();
    for arg in &f.arguments {
        let source = SlotSource::Parameter {
            name: arg.name.clone(),
            position: arg.position,
            direction: arg.direction,
        };
        let field = unique(&mut names, naming::field_ident(&arg.name));
        if arg.direction.is_input() {
            let doc = f.doc.describe(&arg.name, Direction::In);
            request.push(slot(field.clone(), arg.position, source.clone(), &arg.data_type, doc));
        }
        if arg.direction.is_output() {
            let doc = f.doc.describe(&arg.name, Direction::Out);
            response.push(slot(field, arg.position, source, &arg.data_type, doc));
        }
    }
    if let Some(ret) = &f.returns {
        let ordinal = f.arguments.len() as u32 + 1;
        let doc = f.doc.describe(RETURN_FIELD, Direction::Out);
        let name = unique(&mut names, RETURN_FIELD.to_string());
        response.push(slot(name, ordinal, SlotSource::Return, &ret.data_type, doc));
    }

    CallLayout {
        function: f.qualified_name(),
        request: FieldTable {
            message: naming::request_message(f),
            key: None,
            slots: request,
        },
        response: FieldTable {
            message: naming::response_message(f),
            key: None,
            slots: response,
        },
        streaming: f.is_streaming(),
    }
}

fn record_table(
    key: &TypeKey,
    attributes: &[Attribute],
    types: &TypeArena,
    config: &GenConfig,
) -> FieldTable {
    let mut names = BTreeSet::new();
    let slots = attributes
        .iter()
        .enumerate()
        .map(|(i, a)| FieldSlot {
            field: unique(&mut names, naming::field_ident(&a.name)),
            ordinal: i as u32 + 1,
            source: SlotSource::Attribute {
                name: a.name.clone(),
            },
            data_type: a.data_type.clone(),
            spec: FieldSpec::of(&a.data_type, types, config),
            doc: None,
        })
        .collect();
    FieldTable {
        message: naming::composite_message(key),
        key: Some(key.clone()),
        slots,
    }
}

/// Wrapper messages for collections whose elements are collections.
fn collection_wrappers(types: &TypeArena, config: &GenConfig) -> Vec<FieldTable> {
    let mut wanted = BTreeSet::new();
    for def in types.iter() {
        if let CompositeType::Collection { element, .. } = def {
            match element.as_composite() {
                Some(inner) if inner.kind == CompositeKind::Collection => {
                    wanted.insert(inner.key.clone());
                }
                _ => {}
            }
        }
    }
    let mut out = Vec::new();
    for key in wanted {
        let data_type = DataType::composite(CompositeKind::Collection, key.clone());
        out.push(FieldTable {
            message: naming::composite_message(&key),
            key: Some(key),
            slots: vec![FieldSlot {
                field: ITEMS_FIELD.to_string(),
                ordinal: 1,
                source: SlotSource::Items,
                spec: FieldSpec::of(&data_type, types, config),
                data_type,
                doc: None,
            }],
        });
    }
    out
}

fn unique(taken: &mut BTreeSet<String>, mut name: String) -> String {
    while taken.contains(&name) {
        name.push('_');
    }
    taken.insert(name.clone());
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Argument;
    use crate::types::Indexing;

    fn scalar(kind: &str, precision: u32, scale: i32) -> DataType {
        DataType::Scalar(ScalarType::from_catalog(kind, precision, scale, 0, "").expect("scalar"))
    }

    fn sample() -> (Function, TypeArena) {
        let rec = TypeKey::new("APP", "PKG", "T_REC");
        let tab = TypeKey::new("APP", "PKG", "T_TAB");
        let mut types = TypeArena::default();
        types.insert(CompositeType::Record {
            key: rec.clone(),
            attributes: vec![
                Attribute {
                    name: "ID".into(),
                    data_type: scalar("NUMBER", 9, 0),
                },
                Attribute {
                    name: "NAME".into(),
                    data_type: scalar("VARCHAR2", 0, 0),
                },
            ],
        });
        types.insert(CompositeType::Collection {
            key: tab.clone(),
            element: DataType::composite(CompositeKind::Record, rec),
            indexing: Indexing::Associative,
        });

        let mut f = Function::new("APP", "PKG", "FOO");
        f.arguments.push(Argument {
            name: "P_INT".into(),
            data_type: scalar("PLS_INTEGER", 0, 0),
            direction: Direction::In,
            position: 1,
        });
        f.arguments.push(Argument {
            name: "P_IO".into(),
            data_type: scalar("NUMBER", 0, 0),
            direction: Direction::InOut,
            position: 2,
        });
        f.returns = Some(Attribute {
            name: String::new(),
            data_type: DataType::composite(CompositeKind::Collection, tab),
        });
        (f, types)
    }

    #[test]
    fn request_and_response_ordinals() {
        let (f, types) = sample();
        let layout = Layout::build(std::slice::from_ref(&f), &types, &GenConfig::default());
        let call = layout.call(&f).expect("call layout");
        assert_eq!(call.request.message, "Pkg__Foo__Request");
        let req: Vec<(&str, u32)> = call
            .request
            .slots
            .iter()
            .map(|s| (s.field.as_str(), s.ordinal))
            .collect();
        assert_eq!(req, vec![("p_int", 1), ("p_io", 2)]);
        let resp: Vec<(&str, u32)> = call
            .response
            .slots
            .iter()
            .map(|s| (s.field.as_str(), s.ordinal))
            .collect();
        assert_eq!(resp, vec![("p_io", 2), ("ret", 3)]);

        let ret = call.response.slot("ret").expect("ret slot");
        assert!(ret.spec.repeated);
        assert_eq!(ret.spec.message_name(), Some("App__Pkg__TRec"));
    }

    #[test]
    fn record_messages_number_attributes() {
        let (f, types) = sample();
        let layout = Layout::build(std::slice::from_ref(&f), &types, &GenConfig::default());
        let rec = layout.message("App__Pkg__TRec").expect("record message");
        assert_eq!(rec.slots[0].ordinal, 1);
        assert_eq!(rec.slots[1].field, "name");
        assert!(matches!(
            rec.slots[0].spec.element,
            ElementSpec::Scalar {
                wire: WireKind::Int64,
                ..
            }
        ));
    }

    #[test]
    fn number_as_string_changes_wire_kind() {
        let s = ScalarType::from_catalog("NUMBER", 9, 0, 0, "").expect("scalar");
        assert_eq!(WireKind::of(&s, false), WireKind::Int64);
        assert_eq!(WireKind::of(&s, true), WireKind::String);
        let d = ScalarType::from_catalog("NUMBER", 0, 0, 0, "").expect("scalar");
        assert_eq!(WireKind::of(&d, false), WireKind::Double);
    }
}
