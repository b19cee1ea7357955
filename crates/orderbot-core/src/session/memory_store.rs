use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use super::store::{SenderGuard, SessionStore};
use super::Session;

/// Lock entries are swept once the table grows past this many senders.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// In-process session store. Sessions live until the process exits; per-sender
/// lock entries are dropped again once nobody holds or waits on them.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_lock(&self, sender_id: &str) -> Arc<Mutex<()>> {
        // Clone the Arc out so the shard guard is released before awaiting.
        self.locks
            .entry(sender_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop lock entries that only the table still references. Holders and waiters
    /// keep their own clone of the `Arc`, so a count of one means the lock is idle.
    fn prune_idle_locks(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn lock(&self, sender_id: &str) -> SenderGuard {
        if self.locks.len() > LOCK_PRUNE_THRESHOLD {
            self.prune_idle_locks();
        }
        self.sender_lock(sender_id).lock_owned().await
    }

    fn get_or_create(&self, sender_id: &str) -> Session {
        self.sessions
            .entry(sender_id.to_string())
            .or_insert_with(|| Session::new(sender_id))
            .clone()
    }

    fn replace(&self, sender_id: &str, session: Session) {
        self.sessions.insert(sender_id.to_string(), session);
    }

    fn remove(&self, sender_id: &str) -> bool {
        // A lock still held or awaited stays so in-flight holders keep excluding newcomers.
        self.locks
            .remove_if(sender_id, |_, lock| Arc::strong_count(lock) == 1);
        self.sessions.remove(sender_id).is_some()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
