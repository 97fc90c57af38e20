#![doc(html_root_url = "https://docs.rs/protoforge/0.1.0")]

//! `protoforge` post-processes Protobuf-generated source code.
//!
//! Rather than generating target-language code itself, `protoforge` reads a
//! `protoc` plugin's `CodeGeneratorRequest`, replays it as a stream of
//! compiler events (file entered, type entered, field entered, ...), and
//! lets plugins project that stream into queryable state and renderers
//! edit an existing directory of already-generated source files in
//! response -- adding validation, wiring dependency injection, inserting
//! builder methods, and the like, without needing a `protoc` code
//! generator of their own.
//!
//! ## Example
//!
//! ```no_run
//! use protoforge::{InsertionPoint, InsertionPointPrinter, Pipeline};
//!
//! fn main() -> protoforge::Result<()> {
//!     let request_bytes = std::fs::read("request.bin")?;
//!
//!     let pipeline = Pipeline::builder()
//!         .renderer(
//!             InsertionPointPrinter::new("//")
//!                 .leading(InsertionPoint::new("class_scope"))
//!                 .for_files(|path| path.has_extension("java")),
//!         )
//!         .build();
//!
//!     pipeline.run_request(&request_bytes, "generated-java")?;
//!     Ok(())
//! }
//! ```

mod descriptor;
mod error;
mod event;
mod insertion_point;
mod pipeline;
mod plugin;
mod producer;
mod projection;
mod registry;
mod source_set;

pub use descriptor::{
    Cardinality, Comments, DocIndex, EnumConstant, EnumType, Field, FieldType, File, MessageType,
    OptionEntry, PrimitiveType, Rpc, Service, Syntax, TypeName, DEFAULT_TYPE_URL_PREFIX,
};
pub use error::{PipelineError, Result};
pub use event::{Event, EventIdentity};
pub use insertion_point::{InsertionPoint, InsertionPointPrinter};
pub use pipeline::{OnceSlot, Pipeline, PipelineBuilder};
pub use plugin::{Plugin, Renderer};
pub use producer::EventProducer;
pub use projection::{Projection, ProjectionContext, QueryBuilder};
pub use registry::TypeRegistry;
pub use source_set::{FileHandle, Insertion, RelativePath, SourceSet};

/// Re-exported so callers never need to depend on `prost-types` directly
/// just to decode the bytes `run_request` accepts.
pub use prost_types::compiler::CodeGeneratorRequest;
