//! Binding storage and candidate ordering.

use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::binding::{Binding, BindingId, CastFn};
use crate::error::{ContainerError, ContainerResult};
use crate::internal::{Map, Set};
use crate::key::ComponentKey;

/// Registered binding as seen through one of its types.
struct Entry {
    binding: Arc<Binding>,
    /// Present when the binding is reached through an exposure.
    cast: Option<CastFn>,
}

#[derive(Default)]
struct RegistryState {
    bindings: Vec<Arc<Binding>>,
    by_type: Map<TypeId, Vec<Entry>>,
}

/// A binding eligible for a requested key, with its qualifier rank.
#[derive(Clone)]
pub(crate) struct Candidate {
    pub(crate) binding: Arc<Binding>,
    pub(crate) cast: Option<CastFn>,
    pub(crate) rank: u8,
}

/// Rank of a default binding serving a qualified request.
pub(crate) const FALLBACK_RANK: u8 = 1;

/// Qualifier rank of a binding for a request; lower is preferred.
///
/// `None` means the binding cannot serve the request at all.
pub(crate) fn qualifier_rank(requested: Option<&str>, bound: Option<&str>) -> Option<u8> {
    match (requested, bound) {
        (None, None) => Some(0),
        (Some(r), Some(b)) if r == b => Some(0),
        (Some(_), None) => Some(FALLBACK_RANK),
        (None, Some(_)) => Some(2),
        (Some(_), Some(_)) => None,
    }
}

/// Registry of all bindings, read-mostly after composition.
///
/// Duplicates are accepted here; ties are reported when the key is first
/// resolved so that composition code can override earlier bindings by
/// priority.
#[derive(Default)]
pub struct BindingRegistry {
    state: RwLock<RegistryState>,
    resolved: RwLock<Set<TypeId>>,
    sealed: AtomicBool,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `binding`, assigning its registration-order id.
    pub(crate) fn register(&self, mut binding: Binding) -> ContainerResult<BindingId> {
        if self.sealed.load(Ordering::Acquire) {
            return Err(ContainerError::Sealed { key: binding.key });
        }
        {
            let resolved = self.resolved.read();
            let rebinds = std::iter::once(&binding.key)
                .chain(binding.exposures.iter().map(|e| &e.key))
                .any(|key| resolved.contains(&key.type_id()));
            if rebinds {
                return Err(ContainerError::BindingAfterResolution { key: binding.key });
            }
        }

        let mut state = self.state.write();
        let id = BindingId(state.bindings.len());
        binding.id = id;

        let binding = Arc::new(binding);
        state
            .by_type
            .entry(binding.key.type_id())
            .or_default()
            .push(Entry {
                binding: binding.clone(),
                cast: None,
            });
        for exposure in &binding.exposures {
            state
                .by_type
                .entry(exposure.key.type_id())
                .or_default()
                .push(Entry {
                    binding: binding.clone(),
                    cast: Some(exposure.cast.clone()),
                });
        }
        state.bindings.push(binding.clone());

        debug!(
            binding = %id,
            key = %binding.key,
            scope = %binding.scope,
            priority = binding.priority,
            exposures = binding.exposures.len(),
            "binding registered"
        );
        Ok(id)
    }

    /// Bindings that can serve `key`, best first.
    ///
    /// Ordered by qualifier rank, then priority (higher first), then
    /// registration order. Conditions are not evaluated here.
    pub(crate) fn candidates(&self, key: &ComponentKey) -> Vec<Candidate> {
        let state = self.state.read();
        let Some(entries) = state.by_type.get(&key.type_id()) else {
            return Vec::new();
        };

        let mut candidates: Vec<Candidate> = entries
            .iter()
            .filter_map(|entry| {
                let rank = qualifier_rank(key.qualifier(), entry.binding.key.qualifier())?;
                Some(Candidate {
                    binding: entry.binding.clone(),
                    cast: entry.cast.clone(),
                    rank,
                })
            })
            .collect();
        drop(state);

        candidates.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then_with(|| b.binding.priority.cmp(&a.binding.priority))
                .then_with(|| a.binding.id.cmp(&b.binding.id))
        });
        candidates
    }

    /// True when some binding could serve `key`, ignoring conditions.
    pub fn contains(&self, key: &ComponentKey) -> bool {
        let state = self.state.read();
        state.by_type.get(&key.type_id()).map_or(false, |entries| {
            entries
                .iter()
                .any(|e| qualifier_rank(key.qualifier(), e.binding.key.qualifier()).is_some())
        })
    }

    /// All bindings in registration order.
    pub fn bindings(&self) -> Vec<Arc<Binding>> {
        self.state.read().bindings.clone()
    }

    pub fn get(&self, id: BindingId) -> Option<Arc<Binding>> {
        self.state.read().bindings.get(id.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records that `key`'s type has been handed out; later rebinding fails.
    pub(crate) fn mark_resolved(&self, key: &ComponentKey) {
        if self.resolved.read().contains(&key.type_id()) {
            return;
        }
        self.resolved.write().insert(key.type_id());
    }

    /// Rejects every later registration.
    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::AcqRel) {
            debug!(bindings = self.len(), "binding registry sealed");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("bindings", &self.len())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
