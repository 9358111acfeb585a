use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::session::{PtySession, SessionId, SessionInfo};

#[derive(Default)]
struct Table {
    live: HashMap<SessionId, Arc<PtySession>>,
    /// IDs handed out by `allocate_id` whose session is still being spawned.
    reserved: HashSet<SessionId>,
}

/// In-memory table of live terminal sessions.
///
/// IDs are allocated under the same lock that guards the table, so
/// concurrent starts can never be handed the same identifier.
#[derive(Default)]
pub struct SessionRegistry {
    table: Mutex<Table>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh identifier that no live or pending session uses.
    pub fn allocate_id(&self) -> SessionId {
        let mut table = self.lock();
        loop {
            let id = SessionId::new();
            if !table.live.contains_key(&id) && table.reserved.insert(id) {
                return id;
            }
        }
    }

    /// Give back a reservation whose session never came up.
    pub fn release(&self, id: SessionId) {
        self.lock().reserved.remove(&id);
    }

    /// Register a session under its reserved identifier.
    pub fn insert(&self, session: Arc<PtySession>) {
        let mut table = self.lock();
        table.reserved.remove(&session.id());
        table.live.insert(session.id(), session);
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<PtySession>> {
        self.lock().live.get(&id).cloned()
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<PtySession>> {
        self.lock().live.remove(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.lock().live.contains_key(&id)
    }

    /// Live session IDs, sorted.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.lock().live.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Snapshots of all live sessions, sorted by ID.
    pub fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<PtySession>> = self.lock().live.values().cloned().collect();
        let mut infos: Vec<SessionInfo> = sessions.iter().map(|s| s.info()).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
