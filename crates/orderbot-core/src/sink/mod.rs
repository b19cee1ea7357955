//! Append-only record sinks for finalized orders and conversation transcripts.

pub mod csv_file;
pub mod memory;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::types::Direction;
use crate::util;

pub use csv_file::{CsvConversationLog, CsvOrderSink};
pub use memory::{MemoryConversationLog, MemoryOrderSink};

/// Written into order columns whose session field was never filled.
pub const MISSING_FIELD: &str = "N/A";

/// Order fields taken from a session at the moment of finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub sender_id: String,
    pub product: Option<String>,
    pub address: Option<String>,
    pub payment_method: Option<String>,
}

/// A persisted order. Column names and order are part of the file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub timestamp: String,
    #[serde(rename = "customer_phone")]
    pub sender_id: String,
    #[serde(rename = "product_details")]
    pub product: String,
    #[serde(rename = "delivery_address")]
    pub address: String,
    pub payment_method: String,
}

impl OrderRecord {
    pub fn from_draft(order_id: String, draft: &OrderDraft) -> Self {
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| MISSING_FIELD.to_string());
        Self {
            order_id,
            timestamp: util::record_timestamp(),
            sender_id: draft.sender_id.clone(),
            product: field(&draft.product),
            address: field(&draft.address),
            payment_method: field(&draft.payment_method),
        }
    }
}

/// One transcript line. Column names and order are part of the file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: String,
    #[serde(rename = "from_number")]
    pub sender_id: String,
    #[serde(rename = "message_type")]
    pub direction: Direction,
    #[serde(rename = "message_content")]
    pub text: String,
}

impl ConversationEntry {
    pub fn now(sender_id: &str, direction: Direction, text: &str) -> Self {
        Self {
            timestamp: util::record_timestamp(),
            sender_id: sender_id.to_string(),
            direction,
            text: text.to_string(),
        }
    }
}

/// Persists finalized orders. Must be safe to call from concurrent tasks.
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Write one order and return the stored record, including its new id.
    async fn save(&self, draft: &OrderDraft) -> Result<OrderRecord, PersistenceError>;
}

/// Records every inbound and outbound message.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn append(
        &self,
        sender_id: &str,
        direction: Direction,
        text: &str,
    ) -> Result<(), PersistenceError>;
}

/// Generates `ORD-<YYYYmmddHHMMSS>-<sender tail>-<seq>` ids.
///
/// The sequence number makes ids unique within a process even when one sender
/// places several orders inside the same second.
#[derive(Debug, Default)]
pub struct OrderIdGenerator {
    seq: AtomicU64,
}

impl OrderIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, sender_id: &str) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "ORD-{}-{}-{:04}",
            util::compact_timestamp(),
            util::tail_chars(sender_id, 4),
            seq
        )
    }
}
