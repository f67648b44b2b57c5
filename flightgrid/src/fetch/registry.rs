//! In-flight fetch registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{FutureExt, Shared};

use crate::fetch::TileKey;
use crate::record::Flight;
use crate::upstream::TileFetchError;
use crate::BoxFuture;

/// Outcome of one tile fetch, shared by every waiter.
pub type TileResult = Result<Arc<Vec<Flight>>, TileFetchError>;

/// A fetch that any number of callers can await.
pub type SharedFetch = Shared<BoxFuture<'static, TileResult>>;

/// Whether [`InFlightRegistry::join_or_start`] started a new fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// No fetch was pending; the caller's fetch was registered.
    Started,
    /// The caller joined a fetch already in flight.
    Joined,
}

/// Pending tile fetches keyed by `(tile, time bucket)`.
///
/// At most one fetch per key is outstanding. Each fetch runs on its own task
/// and removes its entry when it settles, whatever the outcome and whether or
/// not anyone is still waiting, so the next bucket or a retry after a failure
/// starts afresh. Cloning yields a handle to the same registry.
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    pending: Arc<DashMap<TileKey, SharedFetch>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pending fetch for `key`, or registers the one built by
    /// `start`.
    ///
    /// The check and the insert happen under the key's shard lock, so two
    /// concurrent callers can never both start a fetch. `start` is only
    /// called when nothing is pending and must not touch the registry.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn join_or_start<F>(&self, key: TileKey, start: F) -> (SharedFetch, Registration)
    where
        F: FnOnce() -> BoxFuture<'static, TileResult>,
    {
        match self.pending.entry(key) {
            Entry::Occupied(entry) => (entry.get().clone(), Registration::Joined),
            Entry::Vacant(entry) => {
                let fetch = start();
                let pending = Arc::clone(&self.pending);
                // The removal blocks on this shard until the insert below
                // releases it.
                let task = tokio::spawn(async move {
                    let result = fetch.await;
                    pending.remove(&key);
                    result
                });
                let settled: BoxFuture<'static, TileResult> = Box::pin(async move {
                    task.await
                        .unwrap_or_else(|e| Err(TileFetchError::Transport(format!("fetch task failed: {e}"))))
                });
                let shared = settled.shared();
                entry.insert(shared.clone());
                (shared, Registration::Started)
            }
        }
    }

    /// Number of fetches currently in flight.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.pending.contains_key(key)
    }
}
