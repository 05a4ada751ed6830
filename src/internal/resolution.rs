//! Per-call resolution state and circular dependency detection.

use std::cell::RefCell;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{ContainerError, ContainerResult, ResolutionTrace};
use crate::internal::waits;
use crate::key::ComponentKey;
use crate::store::ScopeStore;

type InFlightStack = SmallVec<[ComponentKey; 8]>;

/// In-flight key stack for one top-level resolution.
///
/// Created fresh for every top-level `get` and passed down the call tree by
/// reference, so concurrent callers never see each other's keys. It also
/// carries the named-scope stores that are active for the caller.
pub(crate) struct ResolutionContext<'s> {
    id: u64,
    stack: RefCell<InFlightStack>,
    max_depth: usize,
    scopes: &'s [Arc<ScopeStore>],
}

impl<'s> ResolutionContext<'s> {
    pub(crate) fn new(max_depth: usize, scopes: &'s [Arc<ScopeStore>]) -> Self {
        Self {
            id: waits::next_id(),
            stack: RefCell::new(SmallVec::new()),
            max_depth,
            scopes,
        }
    }

    /// Pushes `key`, failing if it is already in flight.
    ///
    /// The returned guard pops the key when dropped.
    pub(crate) fn enter(&self, key: &ComponentKey) -> ContainerResult<InFlight<'_>> {
        let mut stack = self.stack.borrow_mut();

        // Circular detection before pushing
        if let Some(first) = stack.iter().position(|k| k == key) {
            let mut path: Vec<ComponentKey> = stack[first..].to_vec();
            path.push(key.clone());
            return Err(ContainerError::CircularDependency { path });
        }

        if stack.len() >= self.max_depth {
            return Err(ContainerError::DepthExceeded {
                key: key.clone(),
                depth: stack.len(),
            });
        }

        stack.push(key.clone());
        Ok(InFlight {
            stack: &self.stack,
            key: key.clone(),
        })
    }

    /// Identifies this resolution in the waits-for graph.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// True when `key` is being resolved further up this call tree.
    pub(crate) fn is_in_flight(&self, key: &ComponentKey) -> bool {
        self.stack.borrow().iter().any(|k| k == key)
    }

    /// Cycle path from the first in-flight occurrence of `from`, followed by
    /// `tail`.
    pub(crate) fn cycle_path(&self, from: &ComponentKey, tail: Vec<ComponentKey>) -> Vec<ComponentKey> {
        let stack = self.stack.borrow();
        let start = stack.iter().position(|k| k == from).unwrap_or(0);
        let mut path = stack[start..].to_vec();
        path.extend(tail);
        path
    }

    /// Snapshot of the in-flight keys, outermost first.
    pub(crate) fn trace(&self) -> ResolutionTrace {
        ResolutionTrace(self.stack.borrow().to_vec())
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Innermost active store for the named scope.
    pub(crate) fn active_store(&self, name: &str) -> Option<&Arc<ScopeStore>> {
        self.scopes.iter().rev().find(|store| store.name() == name)
    }
}

/// Guard for one in-flight key.
pub(crate) struct InFlight<'r> {
    stack: &'r RefCell<InFlightStack>,
    key: ComponentKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let popped = self.stack.borrow_mut().pop();
        debug_assert_eq!(popped.as_ref(), Some(&self.key));
    }
}
