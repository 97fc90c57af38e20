//! Cross-file type name resolution.
//!
//! Field type references and RPC input/output types are fully-qualified
//! dotted names (`.package.Outer.Inner`). Resolving them to a `TypeName`
//! requires looking across *every* file the request carries, including
//! ones that are only imported (not in `files_to_generate`) — the
//! resolution lookup is available for those even though they never
//! produce their own events.

use std::collections::HashMap;

use prost_types::FileDescriptorProto;

use crate::descriptor::TypeName;

/// Maps the dotted Protobuf name of every message and enum declared across
/// a `CodeGeneratorRequest`'s file set to its `TypeName`.
pub struct TypeRegistry {
    by_qualified_name: HashMap<String, TypeName>,
}

impl TypeRegistry {
    pub fn build(files: &[FileDescriptorProto]) -> Self {
        let mut by_qualified_name = HashMap::new();
        for file in files {
            let package = file.package().to_string();
            for message in &file.message_type {
                index_message(&package, &[], message, &mut by_qualified_name);
            }
            for enum_type in &file.enum_type {
                index_enum(&package, &[], enum_type, &mut by_qualified_name);
            }
        }
        TypeRegistry { by_qualified_name }
    }

    /// Resolves a fully-qualified Protobuf name (leading `.`) to the
    /// `TypeName` the rest of the pipeline uses as identity.
    pub fn resolve(&self, fq_name: &str) -> Option<TypeName> {
        let trimmed = fq_name.strip_prefix('.').unwrap_or(fq_name);
        self.by_qualified_name.get(trimmed).cloned()
    }
}

fn index_message(
    package: &str,
    nesting: &[String],
    message: &prost_types::DescriptorProto,
    out: &mut HashMap<String, TypeName>,
) {
    let type_name = TypeName::new(package, nesting.to_vec(), message.name());
    out.insert(type_name.qualified_name(), type_name.clone());

    let mut child_nesting = nesting.to_vec();
    child_nesting.push(message.name().to_string());

    for nested in &message.nested_type {
        if is_map_entry(nested) {
            continue;
        }
        index_message(package, &child_nesting, nested, out);
    }
    for nested_enum in &message.enum_type {
        index_enum(package, &child_nesting, nested_enum, out);
    }
}

fn index_enum(
    package: &str,
    nesting: &[String],
    enum_type: &prost_types::EnumDescriptorProto,
    out: &mut HashMap<String, TypeName>,
) {
    let type_name = TypeName::new(package, nesting.to_vec(), enum_type.name());
    out.insert(type_name.qualified_name(), type_name);
}

pub(crate) fn is_map_entry(message: &prost_types::DescriptorProto) -> bool {
    message
        .options
        .as_ref()
        .and_then(|o| o.map_entry)
        .unwrap_or(false)
}
