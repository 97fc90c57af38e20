//! The extension contracts a pipeline run is built from.
//!
//! A `Plugin` listens to the event stream by registering projections; a
//! `Renderer` reads projections and edits the source set. Both run as
//! trait objects so a `Pipeline` can hold a heterogeneous, ordered list
//! of them without knowing their concrete types.

use crate::error::Result;
use crate::projection::ProjectionContext;
use crate::source_set::SourceSet;

/// Registers the projections a pipeline run needs before any event is
/// drained. A plugin that needs no state of its own (only renderers) may
/// leave `register` as a no-op.
pub trait Plugin {
    fn register(&self, context: &mut ProjectionContext);
}

/// Reads projected state out of a `ProjectionContext` and edits the
/// `SourceSet` in response. Runs after every event has been drained, in
/// the order renderers were added to the pipeline.
pub trait Renderer {
    fn render(&self, context: &ProjectionContext, source_set: &mut SourceSet) -> Result<()>;
}
