use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::types::Direction;

use super::{ConversationEntry, ConversationLog, OrderDraft, OrderIdGenerator, OrderRecord, OrderSink};

/// Keeps orders in memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryOrderSink {
    orders: Mutex<Vec<OrderRecord>>,
    ids: OrderIdGenerator,
}

impl MemoryOrderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> Vec<OrderRecord> {
        self.orders.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl OrderSink for MemoryOrderSink {
    async fn save(&self, draft: &OrderDraft) -> Result<OrderRecord, PersistenceError> {
        let record = OrderRecord::from_draft(self.ids.next_id(&draft.sender_id), draft);
        self.orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(record)
    }
}

/// Keeps transcript entries in memory.
#[derive(Debug, Default)]
pub struct MemoryConversationLog {
    entries: Mutex<Vec<ConversationEntry>>,
}

impl MemoryConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ConversationEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Entries for one sender, oldest first.
    pub fn entries_for(&self, sender_id: &str) -> Vec<ConversationEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.sender_id == sender_id)
            .collect()
    }
}

#[async_trait]
impl ConversationLog for MemoryConversationLog {
    async fn append(
        &self,
        sender_id: &str,
        direction: Direction,
        text: &str,
    ) -> Result<(), PersistenceError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ConversationEntry::now(sender_id, direction, text));
        Ok(())
    }
}
