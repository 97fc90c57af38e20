//! The event model: a finite, ordered stream of tagged variants describing
//! a walk over a descriptor set.
//!
//! Every entity event carries the identity the projection substrate keys
//! on. Keeping the stream a flat enum (rather than a visitor-callback
//! hierarchy) is deliberate: dispatch is pattern matching, not virtual
//! calls, and the orchestrator can hand the same event to every
//! registered repository without any of them needing to know about the
//! others.

use crate::descriptor::{EnumType, Field, File, MessageType, OptionEntry, Rpc, Service, TypeName};

/// One element of the compiler-event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FileEntered(File),
    FileOptionDiscovered { file: String, option: OptionEntry },
    FileExited(String),

    TypeEntered(MessageType),
    TypeOptionDiscovered { r#type: TypeName, option: OptionEntry },
    TypeExited(TypeName),

    OneofGroupEntered { declaring_type: TypeName, name: String },
    OneofGroupExited { declaring_type: TypeName, name: String },

    FieldEntered(Field),
    FieldOptionDiscovered {
        declaring_type: TypeName,
        field: String,
        option: OptionEntry,
    },
    FieldExited { declaring_type: TypeName, field: String },

    EnumEntered(EnumType),
    EnumOptionDiscovered { r#enum: TypeName, option: OptionEntry },
    EnumConstantDiscovered {
        r#enum: TypeName,
        name: String,
        number: i32,
    },
    EnumExited(TypeName),

    ServiceEntered(Service),
    ServiceOptionDiscovered { service: TypeName, option: OptionEntry },
    RpcDiscovered(Rpc),
    ServiceExited(TypeName),
}

impl Event {
    /// The identity this event should route to in a keyed projection, if
    /// any. Repositories whose routing function looks at a different
    /// field of the event than this default can ignore it and match on
    /// `Event` directly.
    pub fn identity(&self) -> Option<EventIdentity<'_>> {
        use Event::*;
        Some(match self {
            FileEntered(file) => EventIdentity::File(&file.path),
            FileOptionDiscovered { file, .. } => EventIdentity::File(file),
            FileExited(path) => EventIdentity::File(path),
            TypeEntered(message) => EventIdentity::Type(&message.name),
            TypeOptionDiscovered { r#type, .. } => EventIdentity::Type(r#type),
            TypeExited(name) => EventIdentity::Type(name),
            OneofGroupEntered { declaring_type, .. } => EventIdentity::Type(declaring_type),
            OneofGroupExited { declaring_type, .. } => EventIdentity::Type(declaring_type),
            FieldEntered(field) => EventIdentity::Type(&field.declaring_type),
            FieldOptionDiscovered { declaring_type, .. } => EventIdentity::Type(declaring_type),
            FieldExited { declaring_type, .. } => EventIdentity::Type(declaring_type),
            EnumEntered(e) => EventIdentity::Type(&e.name),
            EnumOptionDiscovered { r#enum, .. } => EventIdentity::Type(r#enum),
            EnumConstantDiscovered { r#enum, .. } => EventIdentity::Type(r#enum),
            EnumExited(name) => EventIdentity::Type(name),
            ServiceEntered(service) => EventIdentity::Type(&service.name),
            ServiceOptionDiscovered { service, .. } => EventIdentity::Type(service),
            RpcDiscovered(rpc) => EventIdentity::Type(&rpc.input_type),
            ServiceExited(name) => EventIdentity::Type(name),
        })
    }
}

/// The two shapes of identity an event can carry: a file path, or a type
/// name (messages, enums, services all share the `TypeName` identity
/// space since Protobuf names them in one namespace).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventIdentity<'a> {
    File(&'a str),
    Type(&'a TypeName),
}
