//! Live handle registry.
//!
//! Owns every open batch and iterator between its `*Begin` record and the
//! record that closes it. Batches and iterators live in separate maps keyed by
//! handle suffix; the registry does not stop one suffix from naming both.

use crate::error::{HandleKind, ReplayError};
use indexmap::IndexMap;
use kvtrace_core::HandleId;
use kvtrace_storage::{ReadCursor, WriteBatch};

/// Lookup of a handle that is not registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot find {kind} {handle}")]
pub struct HandleNotFound {
    /// Kind looked up
    pub kind: HandleKind,
    /// Suffix looked up
    pub handle: HandleId,
}

impl HandleNotFound {
    /// Attach the record number that performed the lookup
    #[must_use]
    pub fn at(self, seq: u64) -> ReplayError {
        ReplayError::HandleNotFound {
            seq,
            kind: self.kind,
            handle: self.handle,
        }
    }
}

/// Open batches and iterators by handle suffix, in registration order
#[derive(Debug)]
pub struct ResourceRegistry<B = WriteBatch, C = ReadCursor> {
    batches: IndexMap<HandleId, B>,
    iterators: IndexMap<HandleId, C>,
}

impl<B, C> ResourceRegistry<B, C> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            batches: IndexMap::with_capacity(4),
            iterators: IndexMap::with_capacity(4),
        }
    }

    /// Register a batch; returns the batch it replaced, if the handle was live
    pub fn register_batch(&mut self, handle: HandleId, batch: B) -> Option<B> {
        self.batches.insert(handle, batch)
    }

    /// Register an iterator; returns the iterator it replaced, if the handle was live
    pub fn register_iterator(&mut self, handle: HandleId, cursor: C) -> Option<C> {
        self.iterators.insert(handle, cursor)
    }

    /// Look up a batch
    ///
    /// # Errors
    ///
    /// Returns [`HandleNotFound`] if no batch is registered under `handle`
    pub fn lookup_batch(&self, handle: &HandleId) -> Result<&B, HandleNotFound> {
        self.batches
            .get(handle)
            .ok_or_else(|| not_found(HandleKind::Batch, handle))
    }

    /// Look up an iterator for advancing
    ///
    /// # Errors
    ///
    /// Returns [`HandleNotFound`] if no iterator is registered under `handle`
    pub fn lookup_iterator(&mut self, handle: &HandleId) -> Result<&mut C, HandleNotFound> {
        self.iterators
            .get_mut(handle)
            .ok_or_else(|| not_found(HandleKind::Iterator, handle))
    }

    /// Remove a batch, handing it back to the caller
    ///
    /// # Errors
    ///
    /// Returns [`HandleNotFound`] if no batch is registered under `handle`
    pub fn release_batch(&mut self, handle: &HandleId) -> Result<B, HandleNotFound> {
        self.batches
            .shift_remove(handle)
            .ok_or_else(|| not_found(HandleKind::Batch, handle))
    }

    /// Remove an iterator, handing it back to the caller
    ///
    /// # Errors
    ///
    /// Returns [`HandleNotFound`] if no iterator is registered under `handle`
    pub fn release_iterator(&mut self, handle: &HandleId) -> Result<C, HandleNotFound> {
        self.iterators
            .shift_remove(handle)
            .ok_or_else(|| not_found(HandleKind::Iterator, handle))
    }

    /// Whether a batch is registered under `handle`
    #[must_use]
    pub fn has_batch(&self, handle: &HandleId) -> bool {
        self.batches.contains_key(handle)
    }

    /// Oldest open batch
    #[must_use]
    pub fn first_batch(&self) -> Option<&HandleId> {
        self.batches.keys().next()
    }

    /// Open batch count
    #[must_use]
    pub fn open_batches(&self) -> usize {
        self.batches.len()
    }

    /// Open iterator count
    #[must_use]
    pub fn open_iterators(&self) -> usize {
        self.iterators.len()
    }

    /// No batch and no iterator is open
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty() && self.iterators.is_empty()
    }
}

impl<B, C> Default for ResourceRegistry<B, C> {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(kind: HandleKind, handle: &HandleId) -> HandleNotFound {
    HandleNotFound {
        kind,
        handle: handle.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestRegistry = ResourceRegistry<&'static str, u32>;

    fn h(name: &str) -> HandleId {
        HandleId::new(name)
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = TestRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.open_batches(), 0);
        assert_eq!(registry.open_iterators(), 0);
    }

    #[test]
    fn test_register_lookup_release_batch() {
        let mut registry = TestRegistry::new();
        assert!(registry.register_batch(h("b1"), "txn").is_none());
        assert_eq!(registry.lookup_batch(&h("b1")), Ok(&"txn"));
        assert!(registry.has_batch(&h("b1")));
        assert!(!registry.is_empty());

        assert_eq!(registry.release_batch(&h("b1")), Ok("txn"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_iterator_advances_in_place() {
        let mut registry = TestRegistry::new();
        registry.register_iterator(h("it"), 0);
        *registry.lookup_iterator(&h("it")).unwrap() += 1;
        *registry.lookup_iterator(&h("it")).unwrap() += 1;
        assert_eq!(registry.release_iterator(&h("it")), Ok(2));
    }

    #[test]
    fn test_missing_handles() {
        let mut registry = TestRegistry::new();
        let err = registry.lookup_batch(&h("nope")).unwrap_err();
        assert_eq!(err.kind, HandleKind::Batch);
        assert_eq!(err.handle, h("nope"));

        let err = registry.release_iterator(&h("nope")).unwrap_err();
        assert_eq!(err.kind, HandleKind::Iterator);
        assert!(matches!(
            err.at(4),
            ReplayError::HandleNotFound { seq: 4, kind: HandleKind::Iterator, .. }
        ));
    }

    #[test]
    fn test_rebegin_overwrites() {
        let mut registry = TestRegistry::new();
        registry.register_batch(h("b"), "first");
        assert_eq!(registry.register_batch(h("b"), "second"), Some("first"));
        assert_eq!(registry.open_batches(), 1);
        assert_eq!(registry.lookup_batch(&h("b")), Ok(&"second"));
    }

    #[test]
    fn test_maps_are_independent() {
        let mut registry = TestRegistry::new();
        registry.register_batch(h("x"), "txn");
        registry.register_iterator(h("x"), 9);
        assert_eq!(registry.open_batches(), 1);
        assert_eq!(registry.open_iterators(), 1);

        registry.release_batch(&h("x")).unwrap();
        assert!(!registry.is_empty());
        assert_eq!(registry.lookup_iterator(&h("x")), Ok(&mut 9));
    }
}
