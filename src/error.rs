//! Crate-wide error type.
//!
//! Every phase of the pipeline (producer, projection substrate, source set,
//! orchestrator) reports failure through this single tagged-variant enum,
//! per the error table in the pipeline specification.

use std::path::PathBuf;

/// Failure modes surfaced by the pipeline.
///
/// The orchestrator (`Pipeline::run`) surfaces the first error it
/// encounters and does not attempt to roll back partial filesystem writes.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The request bytes are not a valid `CodeGeneratorRequest`.
    #[error("failed to parse code generator request: {0}")]
    RequestParse(#[from] prost::DecodeError),

    /// A field references a type name that could not be resolved against
    /// the descriptor set.
    #[error("unresolved type reference: {0}")]
    DescriptorResolution(String),

    /// I/O failure while reading a source file.
    #[error("failed to read source file {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `SourceSet::file` found no match, or `delete` targeted an unknown path.
    #[error("no source file found at {0}")]
    FileNotFound(PathBuf),

    /// `SourceSet::file` matched more than one stored path by suffix.
    #[error("path {path} is ambiguous, matches: {}", candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    AmbiguousPath {
        path: PathBuf,
        candidates: Vec<PathBuf>,
    },

    /// A one-shot field (e.g. a renderer's injected projection context) was
    /// set more than once.
    #[error("illegal reassignment of {0}")]
    IllegalReassignment(&'static str),

    /// External instantiation of a plugin or renderer failed. The core
    /// never constructs this itself; it exists so orchestrators embedding
    /// the pipeline can report this failure mode through the same type.
    #[error("plugin or renderer has no public zero-argument constructor: {0}")]
    MissingPublicZeroArgCtor(String),

    /// I/O failure during flush.
    #[error("failed to write source file {path}: {source}")]
    SourceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
