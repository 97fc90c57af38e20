//! The lazy compiler-event producer.
//!
//! `EventProducer` turns a `CodeGeneratorRequest` into a finite, ordered
//! `Iterator<Item = Result<Event>>` without ever materializing the full
//! event list. Rust has no stackful coroutines on stable, so the walk over
//! the descriptor tree is simulated explicitly as a stack of `Frame`s, one
//! per currently-open file/message/enum/service, each tracking which phase
//! of its own lifecycle it is in. `next()` repeatedly steps the top frame:
//! a step either produces an event, pushes a child frame (recursing into a
//! nested type), or finishes and pops itself, never doing more work than
//! whatever the caller's next pull demands.
//!
//! An entity's own event payload (e.g. `MessageType.fields`, fully
//! resolved) is computed the moment that entity's own event is pulled, not
//! before — laziness applies across entities, not within one. Nested
//! messages and enums appear in a parent's payload only as `TypeName`
//! stubs; their own `TypeEntered`/`EnumEntered` events, and the resolution
//! work behind them, happen only when a later pull reaches their frame.

use std::collections::VecDeque;
use std::rc::Rc;

use prost_types::compiler::CodeGeneratorRequest;
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto, ServiceDescriptorProto};

use crate::descriptor::{
    deprecated_option, resolve_field_type, uninterpreted_options, Cardinality, Comments, DocIndex,
    EnumConstant, EnumType, Field, File, MessageType, OptionEntry, Rpc, Service, Syntax, TypeName,
};
use crate::error::{PipelineError, Result};
use crate::event::Event;
use crate::registry::{is_map_entry, TypeRegistry};

struct FileDescriptorProtoLocations;
impl FileDescriptorProtoLocations {
    const MESSAGE_TYPE: i32 = 4;
    const ENUM_TYPE: i32 = 5;
    const SERVICE: i32 = 6;
}

struct DescriptorLocations;
impl DescriptorLocations {
    const FIELD: i32 = 2;
    const NESTED_TYPE: i32 = 3;
    const ENUM_TYPE: i32 = 4;
}

struct EnumDescriptorLocations;
impl EnumDescriptorLocations {
    const VALUE: i32 = 2;
}

struct ServiceDescriptorLocations;
impl ServiceDescriptorLocations {
    const METHOD: i32 = 2;
}

fn file_options(opts: Option<&prost_types::FileOptions>) -> Vec<OptionEntry> {
    opts.map(|o| uninterpreted_options(&o.uninterpreted_option))
        .unwrap_or_default()
}

fn message_options(opts: Option<&prost_types::MessageOptions>) -> Vec<OptionEntry> {
    opts.map(|o| {
        let mut entries = deprecated_option(o.deprecated);
        entries.extend(uninterpreted_options(&o.uninterpreted_option));
        entries
    })
    .unwrap_or_default()
}

fn enum_options(opts: Option<&prost_types::EnumOptions>) -> Vec<OptionEntry> {
    opts.map(|o| {
        let mut entries = deprecated_option(o.deprecated);
        entries.extend(uninterpreted_options(&o.uninterpreted_option));
        entries
    })
    .unwrap_or_default()
}

fn enum_value_options(opts: Option<&prost_types::EnumValueOptions>) -> Vec<OptionEntry> {
    opts.map(|o| {
        let mut entries = deprecated_option(o.deprecated);
        entries.extend(uninterpreted_options(&o.uninterpreted_option));
        entries
    })
    .unwrap_or_default()
}

fn service_options(opts: Option<&prost_types::ServiceOptions>) -> Vec<OptionEntry> {
    opts.map(|o| {
        let mut entries = deprecated_option(o.deprecated);
        entries.extend(uninterpreted_options(&o.uninterpreted_option));
        entries
    })
    .unwrap_or_default()
}

fn method_options(opts: Option<&prost_types::MethodOptions>) -> Vec<OptionEntry> {
    opts.map(|o| {
        let mut entries = deprecated_option(o.deprecated);
        entries.extend(uninterpreted_options(&o.uninterpreted_option));
        entries
    })
    .unwrap_or_default()
}

fn field_options(opts: Option<&prost_types::FieldOptions>) -> Vec<OptionEntry> {
    opts.map(|o| {
        let mut entries = deprecated_option(o.deprecated);
        entries.extend(uninterpreted_options(&o.uninterpreted_option));
        entries
    })
    .unwrap_or_default()
}

/// Finds the synthetic map-entry nested type backing `field`, if `field` is
/// a map field, so its key/value can be folded into `FieldType::Map`
/// instead of surfacing the entry as its own nested message.
fn map_entry_fields<'a>(
    declaring: &'a DescriptorProto,
    field: &FieldDescriptorProto,
) -> Option<(&'a FieldDescriptorProto, &'a FieldDescriptorProto)> {
    if field.r#type() != prost_types::field_descriptor_proto::Type::Message {
        return None;
    }
    let short_name = field.type_name().rsplit('.').next()?;
    let entry = declaring
        .nested_type
        .iter()
        .find(|n| n.name() == short_name && is_map_entry(n))?;
    Some((entry.field.first()?, entry.field.get(1)?))
}

/// `None` for a field that belongs to no real oneof: either it was never in
/// one, or it is the single synthetic oneof `protoc` wraps a proto3
/// `optional` scalar field in, which is not a user-declared oneof group.
fn real_oneof_name(declaring: &DescriptorProto, field: &FieldDescriptorProto) -> Option<String> {
    if field.proto3_optional.unwrap_or(false) {
        return None;
    }
    let idx = field.oneof_index?;
    declaring
        .oneof_decl
        .get(idx as usize)
        .map(|o| o.name().to_string())
}

fn resolve_fields(
    declaring: &DescriptorProto,
    type_name: &TypeName,
    path: &[i32],
    docs: &DocIndex,
    registry: &TypeRegistry,
) -> Result<Vec<Field>> {
    declaring
        .field
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let map_entry = map_entry_fields(declaring, field);
            let field_type = resolve_field_type(field, map_entry, |name| registry.resolve(name))
                .ok_or_else(|| {
                    PipelineError::DescriptorResolution(format!(
                        "cannot resolve type of field {}.{}",
                        type_name,
                        field.name()
                    ))
                })?;
            let mut field_path = path.to_vec();
            field_path.push(DescriptorLocations::FIELD);
            field_path.push(idx as i32);
            Ok(Field {
                name: field.name().to_string(),
                declaring_type: type_name.clone(),
                number: field.number(),
                r#type: field_type,
                cardinality: Cardinality::from(field.label()),
                oneof_name: real_oneof_name(declaring, field),
                options: field_options(field.options.as_ref()),
                doc: docs.resolve(&field_path),
            })
        })
        .collect()
}

fn resolve_constants(
    declaring: &EnumDescriptorProto,
    path: &[i32],
    docs: &DocIndex,
) -> Vec<EnumConstant> {
    declaring
        .value
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            let mut value_path = path.to_vec();
            value_path.push(EnumDescriptorLocations::VALUE);
            value_path.push(idx as i32);
            EnumConstant {
                name: value.name().to_string(),
                number: value.number(),
                options: enum_value_options(value.options.as_ref()),
                doc: docs.resolve(&value_path),
            }
        })
        .collect()
}

fn resolve_rpcs(
    declaring: &ServiceDescriptorProto,
    type_name: &TypeName,
    path: &[i32],
    docs: &DocIndex,
    registry: &TypeRegistry,
) -> Result<Vec<Rpc>> {
    declaring
        .method
        .iter()
        .enumerate()
        .map(|(idx, method)| {
            let mut method_path = path.to_vec();
            method_path.push(ServiceDescriptorLocations::METHOD);
            method_path.push(idx as i32);
            let input_type = registry.resolve(method.input_type()).ok_or_else(|| {
                PipelineError::DescriptorResolution(format!(
                    "cannot resolve input type of rpc {}.{}",
                    type_name,
                    method.name()
                ))
            })?;
            let output_type = registry.resolve(method.output_type()).ok_or_else(|| {
                PipelineError::DescriptorResolution(format!(
                    "cannot resolve output type of rpc {}.{}",
                    type_name,
                    method.name()
                ))
            })?;
            Ok(Rpc {
                name: method.name().to_string(),
                input_type,
                output_type,
                client_streaming: method.client_streaming(),
                server_streaming: method.server_streaming(),
                options: method_options(method.options.as_ref()),
                doc: docs.resolve(&method_path),
            })
        })
        .collect()
}

/// What a single `Frame::step` accomplished.
enum StepOutcome {
    Emit(Result<Event>),
    Push(Frame),
    /// No event yet; call `step` again immediately on the same frame.
    Continue,
    /// This frame is finished; pop it and resume its parent.
    Done,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FilePhase {
    Entered,
    Options(usize),
    Messages(usize),
    Enums(usize),
    Services(usize),
    Exiting,
    Exited,
}

struct FileFrame {
    path: String,
    descriptor: FileDescriptorProto,
    docs: Rc<DocIndex>,
    options: Vec<OptionEntry>,
    phase: FilePhase,
}

impl FileFrame {
    fn new(descriptor: FileDescriptorProto) -> Self {
        let docs = Rc::new(DocIndex::new(descriptor.source_code_info.clone()));
        let options = file_options(descriptor.options.as_ref());
        FileFrame {
            path: descriptor.name().to_string(),
            descriptor,
            docs,
            options,
            phase: FilePhase::Entered,
        }
    }

    fn step(&mut self, _registry: &TypeRegistry) -> StepOutcome {
        match self.phase {
            FilePhase::Entered => {
                let file = File {
                    path: self.path.clone(),
                    package: self.descriptor.package().to_string(),
                    syntax: Syntax::from(self.descriptor.syntax()),
                    options: self.options.clone(),
                    doc: self.docs.resolve(&[]),
                };
                self.phase = FilePhase::Options(0);
                StepOutcome::Emit(Ok(Event::FileEntered(file)))
            }
            FilePhase::Options(idx) => {
                if idx < self.options.len() {
                    self.phase = FilePhase::Options(idx + 1);
                    StepOutcome::Emit(Ok(Event::FileOptionDiscovered {
                        file: self.path.clone(),
                        option: self.options[idx].clone(),
                    }))
                } else {
                    self.phase = FilePhase::Messages(0);
                    StepOutcome::Continue
                }
            }
            FilePhase::Messages(idx) => {
                if idx < self.descriptor.message_type.len() {
                    self.phase = FilePhase::Messages(idx + 1);
                    let message = &self.descriptor.message_type[idx];
                    if is_map_entry(message) {
                        return StepOutcome::Continue;
                    }
                    let type_name = TypeName::new(self.descriptor.package(), vec![], message.name());
                    let path = vec![FileDescriptorProtoLocations::MESSAGE_TYPE, idx as i32];
                    StepOutcome::Push(Frame::Message(MessageFrame::new(
                        type_name,
                        message.clone(),
                        path,
                        Rc::clone(&self.docs),
                    )))
                } else {
                    self.phase = FilePhase::Enums(0);
                    StepOutcome::Continue
                }
            }
            FilePhase::Enums(idx) => {
                if idx < self.descriptor.enum_type.len() {
                    self.phase = FilePhase::Enums(idx + 1);
                    let enum_type = &self.descriptor.enum_type[idx];
                    let type_name = TypeName::new(self.descriptor.package(), vec![], enum_type.name());
                    let path = vec![FileDescriptorProtoLocations::ENUM_TYPE, idx as i32];
                    StepOutcome::Push(Frame::Enum(EnumFrame::new(
                        type_name,
                        enum_type.clone(),
                        path,
                        Rc::clone(&self.docs),
                    )))
                } else {
                    self.phase = FilePhase::Services(0);
                    StepOutcome::Continue
                }
            }
            FilePhase::Services(idx) => {
                if idx < self.descriptor.service.len() {
                    self.phase = FilePhase::Services(idx + 1);
                    let service = &self.descriptor.service[idx];
                    let type_name = TypeName::new(self.descriptor.package(), vec![], service.name());
                    let path = vec![FileDescriptorProtoLocations::SERVICE, idx as i32];
                    StepOutcome::Push(Frame::Service(ServiceFrame::new(
                        type_name,
                        service.clone(),
                        path,
                        Rc::clone(&self.docs),
                    )))
                } else {
                    self.phase = FilePhase::Exiting;
                    StepOutcome::Continue
                }
            }
            FilePhase::Exiting => {
                self.phase = FilePhase::Exited;
                StepOutcome::Emit(Ok(Event::FileExited(self.path.clone())))
            }
            FilePhase::Exited => StepOutcome::Done,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
enum MessagePhase {
    Entered,
    Options(usize),
    NestedMessages(usize),
    NestedEnums(usize),
    FieldTransition(usize),
    FieldEmit(usize),
    FieldOptions(usize, usize),
    FieldExit(usize),
    Exiting,
    Exited,
}

struct MessageFrame {
    type_name: TypeName,
    descriptor: DescriptorProto,
    path: Vec<i32>,
    docs: Rc<DocIndex>,
    options: Vec<OptionEntry>,
    oneofs: Vec<String>,
    nested_type_names: Vec<TypeName>,
    nested_enum_names: Vec<TypeName>,
    fields: Vec<Field>,
    current_oneof: Option<String>,
    phase: MessagePhase,
    pending: VecDeque<Event>,
}

impl MessageFrame {
    fn new(type_name: TypeName, descriptor: DescriptorProto, path: Vec<i32>, docs: Rc<DocIndex>) -> Self {
        let options = message_options(descriptor.options.as_ref());
        let nested_type_names = descriptor
            .nested_type
            .iter()
            .filter(|n| !is_map_entry(n))
            .map(|n| type_name.nested(n.name()))
            .collect();
        let nested_enum_names = descriptor
            .enum_type
            .iter()
            .map(|e| type_name.nested(e.name()))
            .collect();
        let synthetic_oneofs: std::collections::HashSet<i32> = descriptor
            .field
            .iter()
            .filter(|f| f.proto3_optional.unwrap_or(false))
            .filter_map(|f| f.oneof_index)
            .collect();
        let oneofs = descriptor
            .oneof_decl
            .iter()
            .enumerate()
            .filter(|(idx, _)| !synthetic_oneofs.contains(&(*idx as i32)))
            .map(|(_, o)| o.name().to_string())
            .collect();
        MessageFrame {
            type_name,
            descriptor,
            path,
            docs,
            options,
            oneofs,
            nested_type_names,
            nested_enum_names,
            fields: Vec::new(),
            current_oneof: None,
            phase: MessagePhase::Entered,
            pending: VecDeque::new(),
        }
    }

    fn step(&mut self, registry: &TypeRegistry) -> StepOutcome {
        if let Some(event) = self.pending.pop_front() {
            return StepOutcome::Emit(Ok(event));
        }
        match self.phase.clone() {
            MessagePhase::Entered => {
                let fields =
                    match resolve_fields(&self.descriptor, &self.type_name, &self.path, &self.docs, registry) {
                        Ok(fields) => fields,
                        Err(err) => return StepOutcome::Emit(Err(err)),
                    };
                self.fields = fields.clone();
                let message = MessageType {
                    name: self.type_name.clone(),
                    fields,
                    oneofs: self.oneofs.clone(),
                    nested_types: self.nested_type_names.clone(),
                    nested_enums: self.nested_enum_names.clone(),
                    options: self.options.clone(),
                    doc: self.docs.resolve(&self.path),
                };
                self.phase = MessagePhase::Options(0);
                StepOutcome::Emit(Ok(Event::TypeEntered(message)))
            }
            MessagePhase::Options(idx) => {
                if idx < self.options.len() {
                    self.phase = MessagePhase::Options(idx + 1);
                    StepOutcome::Emit(Ok(Event::TypeOptionDiscovered {
                        r#type: self.type_name.clone(),
                        option: self.options[idx].clone(),
                    }))
                } else {
                    self.phase = MessagePhase::NestedMessages(0);
                    StepOutcome::Continue
                }
            }
            MessagePhase::NestedMessages(idx) => {
                if idx < self.descriptor.nested_type.len() {
                    self.phase = MessagePhase::NestedMessages(idx + 1);
                    let nested = &self.descriptor.nested_type[idx];
                    if is_map_entry(nested) {
                        return StepOutcome::Continue;
                    }
                    let child_name = self.type_name.nested(nested.name());
                    let mut child_path = self.path.clone();
                    child_path.push(DescriptorLocations::NESTED_TYPE);
                    child_path.push(idx as i32);
                    StepOutcome::Push(Frame::Message(MessageFrame::new(
                        child_name,
                        nested.clone(),
                        child_path,
                        Rc::clone(&self.docs),
                    )))
                } else {
                    self.phase = MessagePhase::NestedEnums(0);
                    StepOutcome::Continue
                }
            }
            MessagePhase::NestedEnums(idx) => {
                if idx < self.descriptor.enum_type.len() {
                    self.phase = MessagePhase::NestedEnums(idx + 1);
                    let nested = &self.descriptor.enum_type[idx];
                    let child_name = self.type_name.nested(nested.name());
                    let mut child_path = self.path.clone();
                    child_path.push(DescriptorLocations::ENUM_TYPE);
                    child_path.push(idx as i32);
                    StepOutcome::Push(Frame::Enum(EnumFrame::new(
                        child_name,
                        nested.clone(),
                        child_path,
                        Rc::clone(&self.docs),
                    )))
                } else {
                    self.phase = MessagePhase::FieldTransition(0);
                    StepOutcome::Continue
                }
            }
            MessagePhase::FieldTransition(idx) => {
                if idx >= self.fields.len() {
                    self.phase = MessagePhase::Exiting;
                    if let Some(name) = self.current_oneof.take() {
                        return StepOutcome::Emit(Ok(Event::OneofGroupExited {
                            declaring_type: self.type_name.clone(),
                            name,
                        }));
                    }
                    return StepOutcome::Continue;
                }
                let wanted = self.fields[idx].oneof_name.clone();
                if wanted != self.current_oneof {
                    if let Some(prev) = self.current_oneof.take() {
                        self.pending.push_back(Event::OneofGroupExited {
                            declaring_type: self.type_name.clone(),
                            name: prev,
                        });
                    }
                    if let Some(next) = &wanted {
                        self.pending.push_back(Event::OneofGroupEntered {
                            declaring_type: self.type_name.clone(),
                            name: next.clone(),
                        });
                    }
                    self.current_oneof = wanted;
                }
                self.phase = MessagePhase::FieldEmit(idx);
                StepOutcome::Continue
            }
            MessagePhase::FieldEmit(idx) => {
                self.phase = MessagePhase::FieldOptions(idx, 0);
                StepOutcome::Emit(Ok(Event::FieldEntered(self.fields[idx].clone())))
            }
            MessagePhase::FieldOptions(idx, opt_idx) => {
                let options = &self.fields[idx].options;
                if opt_idx < options.len() {
                    self.phase = MessagePhase::FieldOptions(idx, opt_idx + 1);
                    StepOutcome::Emit(Ok(Event::FieldOptionDiscovered {
                        declaring_type: self.type_name.clone(),
                        field: self.fields[idx].name.clone(),
                        option: options[opt_idx].clone(),
                    }))
                } else {
                    self.phase = MessagePhase::FieldExit(idx);
                    StepOutcome::Continue
                }
            }
            MessagePhase::FieldExit(idx) => {
                self.phase = MessagePhase::FieldTransition(idx + 1);
                StepOutcome::Emit(Ok(Event::FieldExited {
                    declaring_type: self.type_name.clone(),
                    field: self.fields[idx].name.clone(),
                }))
            }
            MessagePhase::Exiting => {
                self.phase = MessagePhase::Exited;
                StepOutcome::Emit(Ok(Event::TypeExited(self.type_name.clone())))
            }
            MessagePhase::Exited => StepOutcome::Done,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EnumPhase {
    Entered,
    Options(usize),
    Constants(usize),
    Exiting,
    Exited,
}

struct EnumFrame {
    type_name: TypeName,
    descriptor: EnumDescriptorProto,
    path: Vec<i32>,
    docs: Rc<DocIndex>,
    options: Vec<OptionEntry>,
    constants: Vec<EnumConstant>,
    phase: EnumPhase,
}

impl EnumFrame {
    fn new(type_name: TypeName, descriptor: EnumDescriptorProto, path: Vec<i32>, docs: Rc<DocIndex>) -> Self {
        let options = enum_options(descriptor.options.as_ref());
        EnumFrame {
            type_name,
            descriptor,
            path,
            docs,
            options,
            constants: Vec::new(),
            phase: EnumPhase::Entered,
        }
    }

    fn step(&mut self) -> StepOutcome {
        match self.phase {
            EnumPhase::Entered => {
                let constants = resolve_constants(&self.descriptor, &self.path, &self.docs);
                self.constants = constants.clone();
                let enum_type = EnumType {
                    name: self.type_name.clone(),
                    constants,
                    options: self.options.clone(),
                    doc: self.docs.resolve(&self.path),
                };
                self.phase = EnumPhase::Options(0);
                StepOutcome::Emit(Ok(Event::EnumEntered(enum_type)))
            }
            EnumPhase::Options(idx) => {
                if idx < self.options.len() {
                    self.phase = EnumPhase::Options(idx + 1);
                    StepOutcome::Emit(Ok(Event::EnumOptionDiscovered {
                        r#enum: self.type_name.clone(),
                        option: self.options[idx].clone(),
                    }))
                } else {
                    self.phase = EnumPhase::Constants(0);
                    StepOutcome::Continue
                }
            }
            EnumPhase::Constants(idx) => {
                if idx < self.constants.len() {
                    self.phase = EnumPhase::Constants(idx + 1);
                    let constant = &self.constants[idx];
                    StepOutcome::Emit(Ok(Event::EnumConstantDiscovered {
                        r#enum: self.type_name.clone(),
                        name: constant.name.clone(),
                        number: constant.number,
                    }))
                } else {
                    self.phase = EnumPhase::Exiting;
                    StepOutcome::Continue
                }
            }
            EnumPhase::Exiting => {
                self.phase = EnumPhase::Exited;
                StepOutcome::Emit(Ok(Event::EnumExited(self.type_name.clone())))
            }
            EnumPhase::Exited => StepOutcome::Done,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ServicePhase {
    Entered,
    Options(usize),
    Rpcs(usize),
    Exiting,
    Exited,
}

struct ServiceFrame {
    type_name: TypeName,
    descriptor: ServiceDescriptorProto,
    path: Vec<i32>,
    docs: Rc<DocIndex>,
    options: Vec<OptionEntry>,
    rpcs: Vec<Rpc>,
    phase: ServicePhase,
}

impl ServiceFrame {
    fn new(type_name: TypeName, descriptor: ServiceDescriptorProto, path: Vec<i32>, docs: Rc<DocIndex>) -> Self {
        let options = service_options(descriptor.options.as_ref());
        ServiceFrame {
            type_name,
            descriptor,
            path,
            docs,
            options,
            rpcs: Vec::new(),
            phase: ServicePhase::Entered,
        }
    }

    fn step(&mut self, registry: &TypeRegistry) -> StepOutcome {
        match self.phase {
            ServicePhase::Entered => {
                let rpcs = match resolve_rpcs(&self.descriptor, &self.type_name, &self.path, &self.docs, registry) {
                    Ok(rpcs) => rpcs,
                    Err(err) => return StepOutcome::Emit(Err(err)),
                };
                self.rpcs = rpcs.clone();
                let service = Service {
                    name: self.type_name.clone(),
                    rpcs,
                    options: self.options.clone(),
                    doc: self.docs.resolve(&self.path),
                };
                self.phase = ServicePhase::Options(0);
                StepOutcome::Emit(Ok(Event::ServiceEntered(service)))
            }
            ServicePhase::Options(idx) => {
                if idx < self.options.len() {
                    self.phase = ServicePhase::Options(idx + 1);
                    StepOutcome::Emit(Ok(Event::ServiceOptionDiscovered {
                        service: self.type_name.clone(),
                        option: self.options[idx].clone(),
                    }))
                } else {
                    self.phase = ServicePhase::Rpcs(0);
                    StepOutcome::Continue
                }
            }
            ServicePhase::Rpcs(idx) => {
                if idx < self.rpcs.len() {
                    self.phase = ServicePhase::Rpcs(idx + 1);
                    StepOutcome::Emit(Ok(Event::RpcDiscovered(self.rpcs[idx].clone())))
                } else {
                    self.phase = ServicePhase::Exiting;
                    StepOutcome::Continue
                }
            }
            ServicePhase::Exiting => {
                self.phase = ServicePhase::Exited;
                StepOutcome::Emit(Ok(Event::ServiceExited(self.type_name.clone())))
            }
            ServicePhase::Exited => StepOutcome::Done,
        }
    }
}

enum Frame {
    File(FileFrame),
    Message(MessageFrame),
    Enum(EnumFrame),
    Service(ServiceFrame),
}

impl Frame {
    fn step(&mut self, registry: &TypeRegistry) -> StepOutcome {
        match self {
            Frame::File(frame) => frame.step(registry),
            Frame::Message(frame) => frame.step(registry),
            Frame::Enum(frame) => frame.step(),
            Frame::Service(frame) => frame.step(registry),
        }
    }
}

/// Produces the compiler-event stream for the files a `CodeGeneratorRequest`
/// asks to be generated, in request order, pulling exactly as much work as
/// the consumer demands.
pub struct EventProducer {
    registry: TypeRegistry,
    stack: Vec<Frame>,
}

impl EventProducer {
    pub fn new(request: &CodeGeneratorRequest) -> Result<Self> {
        let registry = TypeRegistry::build(&request.proto_file);
        let mut stack = Vec::with_capacity(request.file_to_generate.len());
        for name in request.file_to_generate.iter().rev() {
            let descriptor = request
                .proto_file
                .iter()
                .find(|file| file.name() == name)
                .ok_or_else(|| {
                    PipelineError::DescriptorResolution(format!(
                        "file to generate not present in request: {name}"
                    ))
                })?
                .clone();
            stack.push(Frame::File(FileFrame::new(descriptor)));
        }
        Ok(EventProducer { registry, stack })
    }
}

impl Iterator for EventProducer {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.step(&self.registry) {
                StepOutcome::Emit(event) => {
                    if event.is_err() {
                        self.stack.clear();
                    }
                    return Some(event);
                }
                StepOutcome::Push(frame) => self.stack.push(frame),
                StepOutcome::Continue => {}
                StepOutcome::Done => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::field_descriptor_proto::{Label, Type as WireType};

    fn scalar_field(name: &str, number: i32) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(WireType::Int32 as i32),
            ..Default::default()
        }
    }

    fn request_for(files: Vec<FileDescriptorProto>, to_generate: Vec<&str>) -> CodeGeneratorRequest {
        CodeGeneratorRequest {
            file_to_generate: to_generate.into_iter().map(String::from).collect(),
            proto_file: files,
            ..Default::default()
        }
    }

    #[test]
    fn file_enter_and_exit_bracket_the_stream() {
        let file = FileDescriptorProto {
            name: Some("a.proto".into()),
            package: Some("pkg".into()),
            syntax: Some("proto3".into()),
            ..Default::default()
        };
        let request = request_for(vec![file], vec!["a.proto"]);
        let events: Vec<Event> = EventProducer::new(&request)
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::FileEntered(_)));
        assert!(matches!(&events[1], Event::FileExited(path) if path == "a.proto"));
    }

    #[test]
    fn message_with_map_field_excludes_entry_from_nested_types() {
        let key = scalar_field("key", 1);
        let mut value = scalar_field("value", 2);
        value.r#type = Some(WireType::Int32 as i32);
        let mut entry = DescriptorProto {
            name: Some("CountsEntry".into()),
            field: vec![key, value],
            ..Default::default()
        };
        entry.options = Some(prost_types::MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        });

        let mut map_field = scalar_field("counts", 1);
        map_field.r#type = Some(WireType::Message as i32);
        map_field.label = Some(Label::Repeated as i32);
        map_field.type_name = Some(".pkg.Outer.CountsEntry".into());

        let outer = DescriptorProto {
            name: Some("Outer".into()),
            field: vec![map_field],
            nested_type: vec![entry],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("a.proto".into()),
            package: Some("pkg".into()),
            message_type: vec![outer],
            ..Default::default()
        };
        let request = request_for(vec![file], vec!["a.proto"]);
        let events: Vec<Event> = EventProducer::new(&request)
            .unwrap()
            .map(|e| e.unwrap())
            .collect();

        let type_entered = events
            .iter()
            .find_map(|e| match e {
                Event::TypeEntered(m) => Some(m),
                _ => None,
            })
            .unwrap();
        assert!(type_entered.nested_types.is_empty());
        assert!(matches!(type_entered.fields[0].r#type, crate::descriptor::FieldType::Map(_, _)));
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::TypeEntered(m) if m.name.simple_name() == "CountsEntry")));
    }

    #[test]
    fn real_oneof_brackets_its_member_fields() {
        let mut a = scalar_field("a", 1);
        a.oneof_index = Some(0);
        let mut b = scalar_field("b", 2);
        b.oneof_index = Some(0);
        let c = scalar_field("c", 3);

        let message = DescriptorProto {
            name: Some("Choice".into()),
            field: vec![a, b, c],
            oneof_decl: vec![prost_types::OneofDescriptorProto {
                name: Some("which".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("a.proto".into()),
            package: Some("pkg".into()),
            message_type: vec![message],
            ..Default::default()
        };
        let request = request_for(vec![file], vec!["a.proto"]);
        let events: Vec<Event> = EventProducer::new(&request)
            .unwrap()
            .map(|e| e.unwrap())
            .collect();

        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                Event::OneofGroupEntered { .. } => "enter",
                Event::OneofGroupExited { .. } => "exit",
                Event::FieldEntered(f) if f.name == "a" => "field:a",
                Event::FieldEntered(f) if f.name == "b" => "field:b",
                Event::FieldEntered(f) if f.name == "c" => "field:c",
                _ => "other",
            })
            .filter(|k| *k != "other")
            .collect();
        assert_eq!(kinds, vec!["enter", "field:a", "field:b", "exit", "field:c"]);
    }

    #[test]
    fn proto3_optional_field_is_not_treated_as_a_oneof() {
        let mut opt = scalar_field("maybe", 1);
        opt.oneof_index = Some(0);
        opt.proto3_optional = Some(true);
        let message = DescriptorProto {
            name: Some("Choice".into()),
            field: vec![opt],
            oneof_decl: vec![prost_types::OneofDescriptorProto {
                name: Some("_maybe".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("a.proto".into()),
            package: Some("pkg".into()),
            message_type: vec![message],
            ..Default::default()
        };
        let request = request_for(vec![file], vec!["a.proto"]);
        let events: Vec<Event> = EventProducer::new(&request)
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        assert!(!events.iter().any(|e| matches!(e, Event::OneofGroupEntered { .. })));
    }

    #[test]
    fn unresolvable_field_type_terminates_stream_with_error() {
        let mut bad = scalar_field("child", 1);
        bad.r#type = Some(WireType::Message as i32);
        bad.type_name = Some(".pkg.Missing".into());
        let message = DescriptorProto {
            name: Some("Outer".into()),
            field: vec![bad],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("a.proto".into()),
            package: Some("pkg".into()),
            message_type: vec![message],
            ..Default::default()
        };
        let request = request_for(vec![file], vec!["a.proto"]);
        let mut producer = EventProducer::new(&request).unwrap();
        assert!(matches!(producer.next(), Some(Ok(Event::FileEntered(_)))));
        assert!(matches!(
            producer.next(),
            Some(Err(PipelineError::DescriptorResolution(_)))
        ));
        assert!(producer.next().is_none());
    }

    #[test]
    fn file_to_generate_not_in_request_is_rejected_up_front() {
        let request = request_for(vec![], vec!["missing.proto"]);
        assert!(matches!(
            EventProducer::new(&request),
            Err(PipelineError::DescriptorResolution(_))
        ));
    }
}
