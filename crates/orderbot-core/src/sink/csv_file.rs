use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::PersistenceError;
use crate::types::Direction;

use super::{ConversationEntry, ConversationLog, OrderDraft, OrderIdGenerator, OrderRecord, OrderSink};

/// Append one row, writing the header first if the file is new or empty.
fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let needs_header = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

/// Push the write off the runtime. The file lock is taken on the blocking thread,
/// so a write whose caller was dropped still excludes the next one until it is done.
async fn append_locked<T>(lock: &Arc<Mutex<()>>, path: &Path, row: T) -> Result<(), PersistenceError>
where
    T: Serialize + Send + 'static,
{
    let lock = Arc::clone(lock);
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        append_row(&path, &row)
    })
    .await
    .map_err(|e| PersistenceError::Task(e.to_string()))?
}

/// Orders file with columns
/// `order_id,timestamp,customer_phone,product_details,delivery_address,payment_method`.
pub struct CsvOrderSink {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
    ids: OrderIdGenerator,
}

impl CsvOrderSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
            ids: OrderIdGenerator::new(),
        }
    }

    /// Read every stored order. A missing file means no orders yet.
    pub fn load_all(path: &Path) -> Result<Vec<OrderRecord>, PersistenceError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(path)?;
        let mut orders = Vec::new();
        for row in reader.deserialize() {
            orders.push(row?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderSink for CsvOrderSink {
    async fn save(&self, draft: &OrderDraft) -> Result<OrderRecord, PersistenceError> {
        let record = OrderRecord::from_draft(self.ids.next_id(&draft.sender_id), draft);
        append_locked(&self.write_lock, &self.path, record.clone()).await?;
        info!("Order {} saved to {}", record.order_id, self.path.display());
        Ok(record)
    }
}

/// Transcript file with columns `timestamp,from_number,message_type,message_content`.
pub struct CsvConversationLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl CsvConversationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl ConversationLog for CsvConversationLog {
    async fn append(
        &self,
        sender_id: &str,
        direction: Direction,
        text: &str,
    ) -> Result<(), PersistenceError> {
        let entry = ConversationEntry::now(sender_id, direction, text);
        append_locked(&self.write_lock, &self.path, entry).await
    }
}
