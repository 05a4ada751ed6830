//! Pre-destroy hooks recorded in construction order.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::key::ComponentKey;

/// Future type for asynchronous pre-destroy hooks.
pub(crate) type BoxFutureUnit = Pin<Box<dyn Future<Output = ()> + Send>>;

pub(crate) type SyncHook = Box<dyn FnOnce() + Send>;
pub(crate) type AsyncHook = Box<dyn FnOnce() -> BoxFutureUnit + Send>;

/// Hooks belonging to one constructed instance.
pub(crate) struct DestroyEntry {
    pub(crate) key: ComponentKey,
    pub(crate) sync: Vec<SyncHook>,
    pub(crate) asyncs: Vec<AsyncHook>,
}

/// Pre-destroy hooks with LIFO execution across instances.
///
/// Hooks of a single instance run in declaration order; instances are torn
/// down in reverse construction order.
#[derive(Default)]
pub(crate) struct DestroyBag {
    entries: Vec<DestroyEntry>,
}

impl DestroyBag {
    pub(crate) fn push(&mut self, entry: DestroyEntry) {
        if !entry.sync.is_empty() || !entry.asyncs.is_empty() {
            self.entries.push(entry);
        }
    }

    /// Runs synchronous hooks in reverse construction order.
    ///
    /// Asynchronous hooks cannot run here and are reported, not executed.
    pub(crate) fn run_sync_reverse(&mut self) -> usize {
        let mut ran = 0;
        while let Some(entry) = self.entries.pop() {
            for hook in entry.sync {
                hook();
                ran += 1;
            }
            if !entry.asyncs.is_empty() {
                warn!(
                    key = %entry.key,
                    skipped = entry.asyncs.len(),
                    "async pre-destroy hooks skipped; use close_async()"
                );
            }
        }
        ran
    }

    /// Runs all hooks in reverse construction order, awaiting async ones.
    pub(crate) async fn run_all_reverse(&mut self) -> usize {
        let mut ran = 0;
        while let Some(entry) = self.entries.pop() {
            for hook in entry.sync {
                hook();
                ran += 1;
            }
            for hook in entry.asyncs {
                hook().await;
                ran += 1;
            }
        }
        ran
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
