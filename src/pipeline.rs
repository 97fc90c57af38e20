//! The orchestrator: wires plugins, renderers, an event stream and a
//! source tree together into one deterministic run.
//!
//! A run always proceeds through the same five phases, each a full
//! happens-before barrier against the next:
//!
//! 1. build context -- every plugin registers its projections
//! 2. drain events -- the producer's stream is dispatched to the context
//! 3. render -- the source tree is read, then every renderer runs in
//!    registration order
//! 4. flush -- changed files are written, deleted files removed
//! 5. close -- the source set is dropped
//!
//! A pipeline is assembled with a fluent builder, then consumed by a
//! single terminal call that does the work.

use std::cell::RefCell;
use std::path::PathBuf;

use prost::Message;
use prost_types::compiler::CodeGeneratorRequest;

use crate::error::{PipelineError, Result};
use crate::plugin::{Plugin, Renderer};
use crate::producer::EventProducer;
use crate::projection::ProjectionContext;
use crate::source_set::SourceSet;

/// A cell that accepts at most one value. Used to smuggle a run's
/// `ProjectionContext` into renderers that need to stash it for a later
/// call (an external tool layering its own phase on top of `Pipeline`),
/// rejecting a second write instead of silently overwriting the first.
#[derive(Default)]
pub struct OnceSlot<T> {
    value: RefCell<Option<T>>,
}

impl<T> OnceSlot<T> {
    pub fn new() -> Self {
        OnceSlot { value: RefCell::new(None) }
    }

    /// Sets the slot's value. Fails if it was already set.
    pub fn set(&self, name: &'static str, value: T) -> Result<()> {
        let mut slot = self.value.borrow_mut();
        if slot.is_some() {
            return Err(PipelineError::IllegalReassignment(name));
        }
        *slot = Some(value);
        Ok(())
    }

    pub fn get(&self) -> std::cell::Ref<'_, Option<T>> {
        self.value.borrow()
    }
}

/// Builds a `Pipeline` from an ordered list of plugins and renderers.
#[derive(Default)]
pub struct PipelineBuilder {
    plugins: Vec<Box<dyn Plugin>>,
    renderers: Vec<Box<dyn Renderer>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        PipelineBuilder::default()
    }

    /// Adds a plugin. Plugins register their projections in the order
    /// they were added, before any event is drained.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Adds a renderer. Renderers run in the order they were added,
    /// after every event has been drained into the projection context.
    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderers.push(Box::new(renderer));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline { plugins: self.plugins, renderers: self.renderers }
    }
}

/// An assembled, runnable pipeline.
pub struct Pipeline {
    plugins: Vec<Box<dyn Plugin>>,
    renderers: Vec<Box<dyn Renderer>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs the pipeline against an already-parsed request and a source
    /// tree rooted at `source_dir`, writing results back into the same
    /// tree.
    pub fn run(&self, request: &CodeGeneratorRequest, source_dir: impl Into<PathBuf>) -> Result<()> {
        log::debug!("building projection context from {} plugin(s)", self.plugins.len());
        let mut context = ProjectionContext::new();
        for plugin in &self.plugins {
            plugin.register(&mut context);
        }

        log::debug!("draining event stream for {} file(s) to generate", request.file_to_generate.len());
        for event in EventProducer::new(request)? {
            context.dispatch(&event?);
        }

        let mut source_set = SourceSet::from_directory(source_dir.into())?;
        log::debug!("running {} renderer(s)", self.renderers.len());
        for renderer in &self.renderers {
            renderer.render(&context, &mut source_set)?;
        }

        source_set.write()
    }

    /// As `run`, but parses `request_bytes` as a `CodeGeneratorRequest`
    /// first (the `protoc` plugin wire format: a serialized
    /// `CodeGeneratorRequest` on stdin).
    pub fn run_request(&self, request_bytes: &[u8], source_dir: impl Into<PathBuf>) -> Result<()> {
        let request = CodeGeneratorRequest::decode(request_bytes)?;
        self.run(&request, source_dir)
    }
}
