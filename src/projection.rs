//! The projection substrate: plugin-registered repositories that turn the
//! compiler event stream into queryable, keyed state.
//!
//! A repository is a `Projection` type plus the key it is stored under: a
//! free-standing routing function decides which events it cares about and
//! what key to file them under, and an apply function folds one event into
//! the record at that key. The substrate dispatches every event to every
//! registered repository before any renderer runs, and within one key
//! updates are applied in event order — exactly the ordering C already
//! guarantees, so the substrate adds no ordering machinery of its own
//! beyond "don't let two repositories see events out of order relative to
//! each other".
//!
//! Storage is a type-erased map keyed by `TypeId`, since plugins register
//! repositories of types this crate has never heard of; `select::<P>()`
//! downcasts back to the concrete repository a renderer asked for.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::Hash;

use crate::event::Event;

/// A projection repository: accumulates a keyed record from a subset of
/// the event stream.
///
/// `route` decides, for a given event, which key (if any) it updates.
/// `apply` folds that event into whatever record currently sits at that
/// key (`None` on the record's first event) and returns the new record.
pub trait Projection: Sized + 'static {
    type Key: Eq + Hash + Clone + 'static;

    fn route(event: &Event) -> Option<Self::Key>;
    fn apply(current: Option<Self>, event: &Event) -> Self;
}

struct Repository<P: Projection> {
    records: HashMap<P::Key, P>,
}

impl<P: Projection> Repository<P> {
    fn new() -> Self {
        Repository { records: HashMap::new() }
    }
}

trait DynRepository: Any {
    fn handle(&mut self, event: &Event);
    fn as_any(&self) -> &dyn Any;
}

impl<P: Projection> DynRepository for Repository<P> {
    fn handle(&mut self, event: &Event) {
        if let Some(key) = P::route(event) {
            let previous = self.records.remove(&key);
            self.records.insert(key, P::apply(previous, event));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The projection substrate for a single pipeline run: built up by plugins
/// during the "build context" phase, fed every event during "drain
/// events", then handed to renderers read-only.
#[derive(Default)]
pub struct ProjectionContext {
    repositories: HashMap<TypeId, Box<dyn DynRepository>>,
}

impl ProjectionContext {
    pub fn new() -> Self {
        ProjectionContext { repositories: HashMap::new() }
    }

    /// Registers a repository for `P`, if one is not already registered.
    /// Idempotent so plugins don't need to coordinate registration order
    /// for projections they share.
    pub fn register<P: Projection>(&mut self) {
        self.repositories
            .entry(TypeId::of::<Repository<P>>())
            .or_insert_with(|| Box::new(Repository::<P>::new()));
    }

    /// Dispatches one event to every registered repository.
    pub fn dispatch(&mut self, event: &Event) {
        for repository in self.repositories.values_mut() {
            repository.handle(event);
        }
    }

    /// Starts a read-only query against the repository for `P`. Returns an
    /// empty query if no repository for `P` was registered.
    pub fn select<P: Projection>(&self) -> QueryBuilder<'_, P> {
        let records = self
            .repositories
            .get(&TypeId::of::<Repository<P>>())
            .and_then(|repository| repository.as_any().downcast_ref::<Repository<P>>())
            .map(|repository| repository.records.values().collect())
            .unwrap_or_default();
        QueryBuilder { records }
    }
}

/// A read-only view over one projection's records, supporting predicate
/// filters chained before materializing results.
pub struct QueryBuilder<'a, P> {
    records: Vec<&'a P>,
}

impl<'a, P> QueryBuilder<'a, P> {
    pub fn filter(mut self, predicate: impl Fn(&P) -> bool) -> Self {
        self.records.retain(|record| predicate(record));
        self
    }

    pub fn by_key(self, key: &P::Key, keyed: impl Fn(&P) -> &P::Key) -> Self
    where
        P: Projection,
    {
        self.filter(|record| keyed(record) == key)
    }

    pub fn all(self) -> Vec<&'a P> {
        self.records
    }

    pub fn first(mut self) -> Option<&'a P> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records.remove(0))
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
