use async_trait::async_trait;

use crate::session::Session;

/// Held for the duration of one sender's request; releasing it lets the next
/// queued request for the same sender proceed.
pub type SenderGuard = tokio::sync::OwnedMutexGuard<()>;

/// Trait for session storage backends.
///
/// Requests for the same sender are serialized through [`SessionStore::lock`];
/// requests for different senders never wait on each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Wait for exclusive access to one sender's session. Waiters are served in
    /// arrival order.
    async fn lock(&self, sender_id: &str) -> SenderGuard;

    /// Snapshot of the sender's session, creating a fresh `Idle` one if absent.
    fn get_or_create(&self, sender_id: &str) -> Session;

    /// Overwrite the sender's session.
    fn replace(&self, sender_id: &str, session: Session);

    /// Delete a session. Returns whether one existed.
    fn remove(&self, sender_id: &str) -> bool;

    /// Number of stored sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
