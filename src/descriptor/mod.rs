//! Immutable value types produced once from a `CodeGeneratorRequest`.
//!
//! These are plain records: equality and stable hashing on identity
//! fields (`TypeName`, file path, `(declaring_type, name)`), no behavior
//! beyond accessors, matching the "tagged variants over class hierarchies"
//! design note for the data carried on the event stream.

mod docs;
mod type_name;

pub use docs::{Comments, DocIndex};
pub use type_name::{TypeName, DEFAULT_TYPE_URL_PREFIX};

use prost_types::field_descriptor_proto::{Label, Type as WireType};
use prost_types::{FieldDescriptorProto, UninterpretedOption};

/// A single Protobuf option attached to a file, type, field, or rpc.
///
/// This does not attempt full extension-registry resolution: unknown
/// (custom/extension) options surface as their literal dotted name and a
/// textual rendering of whichever `UninterpretedOption` variant is set,
/// and the handful of options protoc resolves into typed fields that are
/// common across descriptor kinds (`deprecated`) are surfaced the same
/// way so callers have one uniform shape to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    pub name: String,
    pub value: String,
}

pub(crate) fn deprecated_option(is_deprecated: Option<bool>) -> Vec<OptionEntry> {
    match is_deprecated {
        Some(true) => vec![OptionEntry {
            name: "deprecated".to_string(),
            value: "true".to_string(),
        }],
        _ => Vec::new(),
    }
}

pub(crate) fn uninterpreted_options(raw: &[UninterpretedOption]) -> Vec<OptionEntry> {
    raw.iter()
        .map(|opt| {
            let name = opt
                .name
                .iter()
                .map(|part| {
                    if part.is_extension {
                        format!("({})", part.name_part)
                    } else {
                        part.name_part.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(".");
            let value = if let Some(v) = &opt.identifier_value {
                v.clone()
            } else if let Some(v) = &opt.string_value {
                String::from_utf8_lossy(v).into_owned()
            } else if let Some(v) = opt.positive_int_value {
                v.to_string()
            } else if let Some(v) = opt.negative_int_value {
                v.to_string()
            } else if let Some(v) = opt.double_value {
                v.to_string()
            } else if let Some(v) = &opt.aggregate_value {
                v.clone()
            } else {
                String::new()
            };
            OptionEntry { name, value }
        })
        .collect()
}

/// A `.proto` source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub path: String,
    pub package: String,
    pub syntax: Syntax,
    pub options: Vec<OptionEntry>,
    pub doc: Comments,
}

/// The `syntax` declaration of a `.proto` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

impl From<&str> for Syntax {
    fn from(s: &str) -> Self {
        match s {
            "proto3" => Syntax::Proto3,
            _ => Syntax::Proto2,
        }
    }
}

/// A `message` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    pub name: TypeName,
    pub fields: Vec<Field>,
    pub oneofs: Vec<String>,
    pub nested_types: Vec<TypeName>,
    pub nested_enums: Vec<TypeName>,
    pub options: Vec<OptionEntry>,
    pub doc: Comments,
}

/// An `enum` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: TypeName,
    pub constants: Vec<EnumConstant>,
    pub options: Vec<OptionEntry>,
    pub doc: Comments,
}

/// A single constant of an `enum` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
    pub name: String,
    pub number: i32,
    pub options: Vec<OptionEntry>,
    pub doc: Comments,
}

/// A `service` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: TypeName,
    pub rpcs: Vec<Rpc>,
    pub options: Vec<OptionEntry>,
    pub doc: Comments,
}

/// A single `rpc` declared on a `service`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpc {
    pub name: String,
    pub input_type: TypeName,
    pub output_type: TypeName,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub options: Vec<OptionEntry>,
    pub doc: Comments,
}

/// Whether a field is singular, required (proto2 only), or repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Optional,
    Required,
    Repeated,
}

impl From<Label> for Cardinality {
    fn from(label: Label) -> Self {
        match label {
            Label::Optional => Cardinality::Optional,
            Label::Required => Cardinality::Required,
            Label::Repeated => Cardinality::Repeated,
        }
    }
}

/// The scalar Protobuf wire types, i.e. everything that is neither a
/// message, an enum, nor a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Bytes,
    Uint32,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl PrimitiveType {
    fn from_wire_type(t: WireType) -> Option<Self> {
        Some(match t {
            WireType::Double => PrimitiveType::Double,
            WireType::Float => PrimitiveType::Float,
            WireType::Int64 => PrimitiveType::Int64,
            WireType::Uint64 => PrimitiveType::Uint64,
            WireType::Int32 => PrimitiveType::Int32,
            WireType::Fixed64 => PrimitiveType::Fixed64,
            WireType::Fixed32 => PrimitiveType::Fixed32,
            WireType::Bool => PrimitiveType::Bool,
            WireType::String => PrimitiveType::String,
            WireType::Bytes => PrimitiveType::Bytes,
            WireType::Uint32 => PrimitiveType::Uint32,
            WireType::Sfixed32 => PrimitiveType::Sfixed32,
            WireType::Sfixed64 => PrimitiveType::Sfixed64,
            WireType::Sint32 => PrimitiveType::Sint32,
            WireType::Sint64 => PrimitiveType::Sint64,
            WireType::Message | WireType::Enum | WireType::Group => return None,
        })
    }
}

/// The resolved type of a field, after collapsing map-entry synthesis and
/// `repeated` into explicit `Map`/`List` variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(PrimitiveType),
    Message(TypeName),
    Enum(TypeName),
    Map(Box<FieldType>, Box<FieldType>),
    List(Box<FieldType>),
}

/// A field declared on a `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub declaring_type: TypeName,
    pub number: i32,
    pub r#type: FieldType,
    pub cardinality: Cardinality,
    pub oneof_name: Option<String>,
    pub options: Vec<OptionEntry>,
    pub doc: Comments,
}

/// Resolves a field's wire-level type/label into the core `FieldType`,
/// looking up the key/value types of a map field from the synthetic
/// map-entry nested message `protoc` generates for it.
///
/// Returns `None` for `ResolutionFailure`-triggering input: a `Message` or
/// `Enum` field whose `type_name` does not resolve against `resolve`.
pub(crate) fn resolve_field_type(
    field: &FieldDescriptorProto,
    map_entry: Option<(&FieldDescriptorProto, &FieldDescriptorProto)>,
    resolve: impl Fn(&str) -> Option<TypeName>,
) -> Option<FieldType> {
    if let Some((key_field, value_field)) = map_entry {
        let key = resolve_field_type(key_field, None, &resolve)?;
        let value = resolve_field_type(value_field, None, &resolve)?;
        return Some(FieldType::Map(Box::new(key), Box::new(value)));
    }

    let base = match field.r#type() {
        WireType::Message | WireType::Group => FieldType::Message(resolve(field.type_name())?),
        WireType::Enum => FieldType::Enum(resolve(field.type_name())?),
        other => FieldType::Primitive(PrimitiveType::from_wire_type(other)?),
    };

    if field.label() == Label::Repeated {
        Some(FieldType::List(Box::new(base)))
    } else {
        Some(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deprecated_option_true_surfaces_entry() {
        let opts = deprecated_option(Some(true));
        assert_eq!(opts, vec![OptionEntry { name: "deprecated".into(), value: "true".into() }]);
    }

    #[test]
    fn deprecated_option_false_or_absent_is_empty() {
        assert!(deprecated_option(Some(false)).is_empty());
        assert!(deprecated_option(None).is_empty());
    }

    #[test]
    fn resolves_scalar_field_type() {
        let field = FieldDescriptorProto {
            name: Some("count".into()),
            r#type: Some(WireType::Int32 as i32),
            label: Some(Label::Optional as i32),
            ..Default::default()
        };
        let resolved = resolve_field_type(&field, None, |_| None).unwrap();
        assert_eq!(resolved, FieldType::Primitive(PrimitiveType::Int32));
    }

    #[test]
    fn resolves_repeated_scalar_as_list() {
        let field = FieldDescriptorProto {
            name: Some("tags".into()),
            r#type: Some(WireType::String as i32),
            label: Some(Label::Repeated as i32),
            ..Default::default()
        };
        let resolved = resolve_field_type(&field, None, |_| None).unwrap();
        assert_eq!(
            resolved,
            FieldType::List(Box::new(FieldType::Primitive(PrimitiveType::String)))
        );
    }

    #[test]
    fn unresolved_message_type_is_none() {
        let field = FieldDescriptorProto {
            name: Some("child".into()),
            r#type: Some(WireType::Message as i32),
            label: Some(Label::Optional as i32),
            type_name: Some(".unknown.Child".into()),
            ..Default::default()
        };
        assert!(resolve_field_type(&field, None, |_| None).is_none());
    }

    #[test]
    fn resolves_map_field() {
        let key_field = FieldDescriptorProto {
            name: Some("key".into()),
            r#type: Some(WireType::String as i32),
            label: Some(Label::Optional as i32),
            ..Default::default()
        };
        let value_field = FieldDescriptorProto {
            name: Some("value".into()),
            r#type: Some(WireType::Int32 as i32),
            label: Some(Label::Optional as i32),
            ..Default::default()
        };
        let field = FieldDescriptorProto {
            name: Some("counts".into()),
            r#type: Some(WireType::Message as i32),
            label: Some(Label::Repeated as i32),
            type_name: Some(".pkg.CountsEntry".into()),
            ..Default::default()
        };
        let resolved =
            resolve_field_type(&field, Some((&key_field, &value_field)), |_| None).unwrap();
        assert_eq!(
            resolved,
            FieldType::Map(
                Box::new(FieldType::Primitive(PrimitiveType::String)),
                Box::new(FieldType::Primitive(PrimitiveType::Int32)),
            )
        );
    }
}
