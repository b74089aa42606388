//! Process-wide table of live sessions, keyed by id.
//!
//! The registry holds only weak references; a session's lifetime is
//! governed by its pin and its external handle. Looking up an id whose
//! session has already terminated returns `None` rather than a dangling
//! reference, so stale ids held by callers fail safely.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::session::RequestSession;

static GLOBAL: LazyLock<SessionRegistry> = LazyLock::new(SessionRegistry::new);

/// Id allocator plus id-to-session lookup table.
///
/// Inserts and removals happen on session start and terminal transition;
/// lookups may come concurrently from any caller resolving a pending
/// challenge or cancelling by id.
pub struct SessionRegistry {
    next_id: AtomicU32,
    entries: RwLock<HashMap<u32, Weak<RequestSession>>>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry backing the id-keyed session API.
    pub fn global() -> &'static SessionRegistry {
        &GLOBAL
    }

    /// Hands out the next session id. Ids are never reused while any
    /// session from this registry is alive.
    pub fn allocate_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn register(&self, id: u32, session: &Arc<RequestSession>) {
        let previous = self
            .entries
            .write()
            .insert(id, Arc::downgrade(session));
        debug_assert!(previous.is_none(), "session id {id} registered twice");
        debug!(target: "netload.registry", id, "session registered");
    }

    /// Resolves an id to a live session, or `None` once it has terminated.
    pub fn lookup(&self, id: u32) -> Option<Arc<RequestSession>> {
        self.entries.read().get(&id).and_then(Weak::upgrade)
    }

    pub fn unregister(&self, id: u32) {
        if self.entries.write().remove(&id).is_some() {
            debug!(target: "netload.registry", id, "session unregistered");
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: u32) -> bool {
        self.entries.read().contains_key(&id)
    }
}
