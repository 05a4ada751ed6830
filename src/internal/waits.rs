//! Waits-for graph over in-progress constructions.
//!
//! The in-flight stack of one resolution cannot see a cycle that spans two
//! threads: thread 1 builds `A` and waits for `B` while thread 2 builds `B`
//! and waits for `A`. Every construction therefore records its owner here
//! and every resolution records the slot it is about to block on. Before
//! blocking, the chain of owners is walked; reaching the current resolution
//! again means blocking would never end.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::binding::BindingId;
use crate::internal::Map;
use crate::key::ComponentKey;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static GRAPH: Lazy<WaitGraph> = Lazy::new(WaitGraph::default);

/// Process-unique id for resolutions and scope stores.
pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn graph() -> &'static WaitGraph {
    &GRAPH
}

/// One binding's slot in one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId {
    pub(crate) store: u64,
    pub(crate) binding: BindingId,
}

struct Owner {
    resolution: u64,
    thread: ThreadId,
    key: ComponentKey,
}

struct Waiting {
    slot: SlotId,
    key: ComponentKey,
}

#[derive(Default)]
struct Edges {
    owners: Map<SlotId, Owner>,
    waiting: Map<u64, Waiting>,
}

#[derive(Default)]
pub(crate) struct WaitGraph {
    edges: Mutex<Edges>,
}

/// A cycle found before blocking.
///
/// `closing` is the key of the slot owned by the blocked resolution itself;
/// `chain` lists the keys of the slots other resolutions wait on, ending at
/// `closing`.
#[derive(Debug)]
pub(crate) struct Deadlock {
    pub(crate) closing: ComponentKey,
    pub(crate) chain: Vec<ComponentKey>,
}

impl WaitGraph {
    /// Records that `resolution` is about to block on `slot`.
    ///
    /// Fails when the owner chain of `slot` leads back to `resolution`, or
    /// to another resolution running on this thread further up the stack.
    pub(crate) fn wait_for(
        &self,
        resolution: u64,
        slot: SlotId,
        key: &ComponentKey,
    ) -> Result<WaitGuard<'_>, Deadlock> {
        let current_thread = thread::current().id();
        let mut edges = self.edges.lock();

        let mut chain = Vec::new();
        let mut at = slot;
        // Each hop visits a distinct owner, so the walk is bounded.
        for _ in 0..=edges.owners.len() {
            let Some(owner) = edges.owners.get(&at) else {
                break;
            };
            if owner.resolution == resolution || owner.thread == current_thread {
                let closing = owner.key.clone();
                if chain.is_empty() {
                    chain.push(closing.clone());
                }
                return Err(Deadlock { closing, chain });
            }
            let Some(next) = edges.waiting.get(&owner.resolution) else {
                break;
            };
            chain.push(next.key.clone());
            at = next.slot;
        }

        edges.waiting.insert(
            resolution,
            Waiting {
                slot,
                key: key.clone(),
            },
        );
        Ok(WaitGuard {
            graph: self,
            resolution,
        })
    }

    /// Records `resolution` as the constructor of `slot`.
    ///
    /// Once constructing, the resolution no longer waits on anything.
    pub(crate) fn claim(&self, resolution: u64, slot: SlotId, key: &ComponentKey) -> ClaimGuard<'_> {
        let mut edges = self.edges.lock();
        edges.waiting.remove(&resolution);
        edges.owners.insert(
            slot,
            Owner {
                resolution,
                thread: thread::current().id(),
                key: key.clone(),
            },
        );
        ClaimGuard { graph: self, slot }
    }
}

/// Removes a waiting edge when the wait ends.
pub(crate) struct WaitGuard<'g> {
    graph: &'g WaitGraph,
    resolution: u64,
}

impl std::fmt::Debug for WaitGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitGuard")
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.graph.edges.lock().waiting.remove(&self.resolution);
    }
}

/// Releases a slot's owner record when construction ends, successfully or not.
pub(crate) struct ClaimGuard<'g> {
    graph: &'g WaitGraph,
    slot: SlotId,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.graph.edges.lock().owners.remove(&self.slot);
    }
}
