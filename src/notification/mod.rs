//! Change notification: a sink seam for external delivery plus an observer
//! registry with explicit subscription lifecycle.
//!
//! Query results are plain snapshots; anything that wants to hear about
//! later changes attaches an observer and holds the returned
//! [`Subscription`], which detaches on drop. Fan-out to collection-level
//! watchers happens here, not in the executor: a committed change to
//! `albums/3/tracks/7` reaches watchers of that item, of `albums/3/tracks`,
//! and of `albums`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::resource_uri::ResourceUri;

/// External delivery seam. The sink decides whether a change stays local or
/// propagates to a remote sync layer; the `sync_to_network` flag is threaded
/// through from provider configuration unchanged.
#[cfg_attr(test, mockall::automock)]
pub trait ChangeSink: Send + Sync {
    fn on_change(&self, uri: &ResourceUri, sync_to_network: bool);
}

/// A sink that drops every change on the floor. Useful for embedders that
/// only care about locally attached observers.
#[derive(Debug, Default)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn on_change(&self, _uri: &ResourceUri, _sync_to_network: bool) {}
}

/// Locally attached observer, invalidated when a covering change commits.
pub trait ChangeObserver: Send + Sync {
    fn on_invalidated(&self, changed: &ResourceUri);
}

struct ObserverEntry {
    watched: Vec<String>,
    observer: Weak<dyn ChangeObserver>,
}

type ObserverTable = Mutex<HashMap<u64, ObserverEntry>>;

pub struct NotificationDispatcher {
    sink: Arc<dyn ChangeSink>,
    sync_to_network: bool,
    observers: Arc<ObserverTable>,
    next_id: AtomicU64,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn ChangeSink>, sync_to_network: bool) -> Self {
        NotificationDispatcher {
            sink,
            sync_to_network,
            observers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Record that `observer` depends on `watched`. The observer is held
    /// weakly; the returned subscription detaches it eagerly on drop.
    pub fn attach(
        &self,
        watched: &ResourceUri,
        observer: &Arc<dyn ChangeObserver>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = ObserverEntry {
            watched: watched.path().to_vec(),
            observer: Arc::downgrade(observer),
        };
        self.observers
            .lock()
            .expect("observer table poisoned")
            .insert(id, entry);
        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    /// Deliver a committed change: once to the sink, then to every live
    /// observer whose watched path covers the changed path. Called by the
    /// executor exactly once per committed mutation, after commit.
    pub fn notify(&self, changed: &ResourceUri) {
        log::debug!("notifying change on {}", changed);
        self.sink.on_change(changed, self.sync_to_network);

        let targets: Vec<Arc<dyn ChangeObserver>> = {
            let mut table = self.observers.lock().expect("observer table poisoned");
            table.retain(|_, entry| entry.observer.strong_count() > 0);
            table
                .values()
                .filter(|entry| covers(&entry.watched, changed.path()))
                .filter_map(|entry| entry.observer.upgrade())
                .collect()
        };
        for observer in targets {
            observer.on_invalidated(changed);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().expect("observer table poisoned").len()
    }
}

/// Watched path covers a change when it equals the changed path or is an
/// ancestor of it. Segments are compared as whole tokens, so watching
/// `tracks/5` is never triggered by a change to `tracks/50`.
fn covers(watched: &[String], changed: &[String]) -> bool {
    watched.len() <= changed.len() && watched.iter().zip(changed).all(|(w, c)| w == c)
}

/// Handle for one attached observer. Detaches on `detach()` or on drop;
/// detaching is idempotent.
pub struct Subscription {
    id: u64,
    observers: Weak<ObserverTable>,
}

impl Subscription {
    pub fn detach(&self) {
        if let Some(table) = self.observers.upgrade() {
            table.lock().expect("observer table poisoned").remove(&self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
