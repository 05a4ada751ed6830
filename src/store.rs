//! Scope stores and the scope manager.
//!
//! Every cached instance lives in a [`ScopeStore`]: the container-lifetime
//! store named `"singleton"` or a named store opened by
//! [`ApplicationContext::enter_scope`](crate::ApplicationContext::enter_scope).
//! Each binding owns one `OnceCell` slot per store, so construction is
//! claimed per binding and unrelated bindings never wait on each other.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::binding::{Binding, BindingId};
use crate::error::{ContainerError, ContainerResult};
use crate::instance::Instance;
use crate::internal::destroy_bag::{AsyncHook, SyncHook};
use crate::internal::waits::{self, SlotId};
use crate::internal::{DestroyBag, DestroyEntry, Map, ResolutionContext};
use crate::scope::{Scope, SINGLETON_SCOPE};

/// Result of running a binding's construction pipeline.
pub(crate) struct Constructed {
    /// What callers receive (possibly a proxy).
    pub(crate) instance: Instance,
    /// The component itself, handed to pre-destroy hooks.
    pub(crate) target: Instance,
}

/// Instances and pending pre-destroy hooks of one scope.
pub struct ScopeStore {
    id: u64,
    name: Arc<str>,
    cells: RwLock<Map<BindingId, Arc<OnceCell<Instance>>>>,
    destroy: Mutex<DestroyBag>,
    closed: AtomicBool,
}

impl ScopeStore {
    pub(crate) fn new(name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self {
            id: waits::next_id(),
            name: name.into(),
            cells: RwLock::new(Map::default()),
            destroy: Mutex::new(DestroyBag::default()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of constructed instances held.
    pub fn len(&self) -> usize {
        self.cells.read().values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Instances whose pre-destroy hooks have not run yet.
    pub fn pending_destroy(&self) -> usize {
        self.destroy.lock().len()
    }

    pub(crate) fn cached(&self, id: BindingId) -> Option<Instance> {
        self.cells.read().get(&id).and_then(|cell| cell.get().cloned())
    }

    fn cell(&self, id: BindingId) -> Arc<OnceCell<Instance>> {
        if let Some(cell) = self.cells.read().get(&id) {
            return cell.clone();
        }
        self.cells.write().entry(id).or_default().clone()
    }

    /// Returns the stored instance or constructs it exactly once.
    ///
    /// Concurrent callers for the same binding block until the winner
    /// finishes and then share its instance. A caller whose wait would close
    /// a cycle with other in-progress constructions fails with
    /// `CircularDependency` instead of blocking. A failed construction
    /// leaves the slot empty so a later call can retry. The flag is `true`
    /// only for the caller that constructed.
    pub(crate) fn get_or_try_init<F>(
        &self,
        binding: &Binding,
        rc: &ResolutionContext<'_>,
        construct: F,
    ) -> ContainerResult<(Instance, bool)>
    where
        F: FnOnce() -> ContainerResult<Constructed>,
    {
        if self.is_closed() {
            return Err(self.closed_error(binding, rc));
        }

        let cell = self.cell(binding.id);
        if let Some(instance) = cell.get() {
            return Ok((instance.clone(), false));
        }

        let slot = SlotId {
            store: self.id,
            binding: binding.id,
        };
        let graph = waits::graph();
        let _waiting = graph.wait_for(rc.id(), slot, &binding.key).map_err(|deadlock| {
            let path = rc.cycle_path(&deadlock.closing, deadlock.chain);
            debug!(key = %binding.key, store = %self.name, "construction would wait on itself");
            ContainerError::CircularDependency { path }
        })?;

        let mut fresh = false;
        let instance = cell
            .get_or_try_init(|| {
                let _claim = graph.claim(rc.id(), slot, &binding.key);
                let Constructed { instance, target } = construct()?;
                self.commit(binding, &target, rc)?;
                fresh = true;
                Ok::<_, ContainerError>(instance)
            })?
            .clone();

        if !fresh {
            trace!(key = %binding.key, store = %self.name, "instance shared with concurrent constructor");
        }
        Ok((instance, fresh))
    }

    fn closed_error(&self, binding: &Binding, rc: &ResolutionContext<'_>) -> ContainerError {
        if &*self.name == SINGLETON_SCOPE {
            ContainerError::Closed {
                key: binding.key.clone(),
            }
        } else {
            ContainerError::ScopeClosed {
                scope: self.name.clone(),
                key: binding.key.clone(),
                trace: rc.trace(),
            }
        }
    }

    /// Records the destroy hooks of a freshly constructed instance.
    ///
    /// When the store closed while the instance was being built, its sync
    /// hooks run right away and the construction fails.
    fn commit(&self, binding: &Binding, target: &Instance, rc: &ResolutionContext<'_>) -> ContainerResult<()> {
        let entry = destroy_entry(binding, target);
        let mut bag = self.destroy.lock();
        if !self.is_closed() {
            if let Some(entry) = entry {
                bag.push(entry);
            }
            return Ok(());
        }
        drop(bag);

        let mut late = DestroyBag::default();
        if let Some(entry) = entry {
            late.push(entry);
        }
        let ran = late.run_sync_reverse();
        debug!(key = %binding.key, store = %self.name, hooks = ran, "store closed during construction");
        Err(self.closed_error(binding, rc))
    }

    fn begin_close(&self) -> Option<DestroyBag> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(mem::take(&mut *self.destroy.lock()))
    }

    /// Runs synchronous pre-destroy hooks in reverse construction order and
    /// releases every instance. Closing twice is a no-op.
    pub fn close(&self) {
        if let Some(mut bag) = self.begin_close() {
            let ran = bag.run_sync_reverse();
            self.cells.write().clear();
            debug!(store = %self.name, hooks = ran, "scope store closed");
        }
    }

    /// Like [`close`](Self::close) but also awaits asynchronous hooks.
    pub async fn close_async(&self) {
        if let Some(mut bag) = self.begin_close() {
            let ran = bag.run_all_reverse().await;
            self.cells.write().clear();
            debug!(store = %self.name, hooks = ran, "scope store closed");
        }
    }
}

fn destroy_entry(binding: &Binding, target: &Instance) -> Option<DestroyEntry> {
    if !binding.has_destroy_hooks() {
        return None;
    }
    let sync = binding
        .pre_destroy
        .iter()
        .map(|hook| {
            let hook = hook.clone();
            let target = target.clone();
            Box::new(move || hook(&target)) as SyncHook
        })
        .collect();
    let asyncs = binding
        .pre_destroy_async
        .iter()
        .map(|hook| {
            let hook = hook.clone();
            let target = target.clone();
            Box::new(move || hook(target)) as AsyncHook
        })
        .collect();
    Some(DestroyEntry {
        key: binding.key.clone(),
        sync,
        asyncs,
    })
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("name", &self.name)
            .field("instances", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Chooses the store for a binding and obtains instances from it.
pub struct ScopeManager {
    singletons: Arc<ScopeStore>,
}

impl ScopeManager {
    pub(crate) fn new() -> Self {
        Self {
            singletons: ScopeStore::new(SINGLETON_SCOPE),
        }
    }

    /// The container-lifetime store.
    pub fn singletons(&self) -> &Arc<ScopeStore> {
        &self.singletons
    }

    /// Store backing `binding` for this resolution, `None` for prototypes.
    fn store_for<'r>(
        &'r self,
        binding: &Binding,
        rc: &'r ResolutionContext<'_>,
    ) -> ContainerResult<Option<&'r Arc<ScopeStore>>> {
        match &binding.scope {
            Scope::Singleton => Ok(Some(&self.singletons)),
            Scope::Prototype => Ok(None),
            Scope::Named(name) => match rc.active_store(name) {
                Some(store) => Ok(Some(store)),
                None => Err(ContainerError::ScopeNotActive {
                    scope: name.clone(),
                    key: binding.key.clone(),
                    trace: rc.trace(),
                }),
            },
        }
    }

    /// Cached instance for `binding`, if its store already holds one.
    pub(crate) fn cached(
        &self,
        binding: &Binding,
        rc: &ResolutionContext<'_>,
    ) -> ContainerResult<Option<Instance>> {
        Ok(self
            .store_for(binding, rc)?
            .and_then(|store| store.cached(binding.id)))
    }

    /// Obtains the instance for `binding`, constructing it when the store
    /// has none. Prototypes construct on every call.
    pub(crate) fn obtain<F>(
        &self,
        binding: &Binding,
        rc: &ResolutionContext<'_>,
        construct: F,
    ) -> ContainerResult<(Instance, bool)>
    where
        F: FnOnce() -> ContainerResult<Constructed>,
    {
        match self.store_for(binding, rc)? {
            Some(store) => store.get_or_try_init(binding, rc, construct),
            None => construct().map(|constructed| (constructed.instance, true)),
        }
    }
}
