use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::checkout::{CheckoutFlow, Decision, DEFAULT_APOLOGY};
use crate::config::Config;
use crate::error::{OrderbotError, Result};
use crate::provider::CompletionProvider;
use crate::session::{MemorySessionStore, SenderGuard, SessionStore};
use crate::sink::{ConversationLog, CsvConversationLog, CsvOrderSink, OrderSink};
use crate::types::{Direction, InboundMessage};
use crate::util::truncate_string;

/// Text sent back for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Set when this message completed an order.
    pub order_id: Option<String>,
}

/// Runs one inbound message through log, session, checkout, order and reply.
pub struct WebhookHandler {
    sessions: Arc<dyn SessionStore>,
    provider: Arc<dyn CompletionProvider>,
    orders: Arc<dyn OrderSink>,
    log: Arc<dyn ConversationLog>,
    flow: CheckoutFlow,
    apology: String,
}

impl WebhookHandler {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        provider: Arc<dyn CompletionProvider>,
        orders: Arc<dyn OrderSink>,
        log: Arc<dyn ConversationLog>,
    ) -> Self {
        Self {
            sessions,
            provider,
            orders,
            log,
            flow: CheckoutFlow::default(),
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }

    /// In-memory sessions with CSV sinks at the configured paths.
    pub fn from_config(config: &Config, provider: Arc<dyn CompletionProvider>) -> Self {
        Self::new(
            Arc::new(MemorySessionStore::new()),
            provider,
            Arc::new(CsvOrderSink::new(config.orders_path())),
            Arc::new(CsvConversationLog::new(config.conversation_path())),
        )
        .with_flow(CheckoutFlow::from_config(&config.checkout))
        .with_apology(config.checkout.apology_text.clone())
    }

    pub fn with_flow(mut self, flow: CheckoutFlow) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_apology(mut self, apology: impl Into<String>) -> Self {
        self.apology = apology.into();
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Handle one message. Never fails: provider and order-sink errors become
    /// the apology text and leave the sender's session as it was.
    ///
    /// Dropping the returned future before the provider answers abandons the
    /// request without touching the session. Once a decision exists, saving the
    /// order and replacing the session finish even if the caller goes away.
    pub async fn handle(&self, msg: &InboundMessage) -> Reply {
        let sender = msg.sender_id.as_str();
        let guard = Arc::new(self.sessions.lock(sender).await);

        info!(
            "[{}] Message from {}: {}",
            msg.channel,
            sender,
            truncate_string(&msg.content, 80, "...")
        );
        debug!(
            "Inbound {} from {} ({})",
            msg.message_id.as_deref().unwrap_or("-"),
            sender,
            msg.profile_name.as_deref().unwrap_or("no profile name")
        );
        self.record(sender, Direction::User, &msg.content).await;

        let reply = match self.process(&guard, sender, &msg.content).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to handle message from {}: {}", sender, e);
                Reply {
                    text: self.apology.clone(),
                    order_id: None,
                }
            }
        };

        self.record(sender, Direction::Bot, &reply.text).await;
        reply
    }

    async fn process(&self, guard: &Arc<SenderGuard>, sender: &str, text: &str) -> Result<Reply> {
        let session = self.sessions.get_or_create(sender);
        let Decision {
            session: next,
            outbound,
            order,
            ..
        } = self.flow.decide(&session, text, self.provider.as_ref()).await?;

        // The commit task shares the sender lock, so nothing else sees this
        // sender until both the order and the new session are in place.
        let held = Arc::clone(guard);
        let sessions = self.sessions.clone();
        let orders = self.orders.clone();
        let sender_id = sender.to_string();
        let commit = tokio::spawn(async move {
            let _held = held;
            let order_id = match order {
                Some(draft) => {
                    let record = orders.save(&draft).await?;
                    info!("Order {} finalized for {}", record.order_id, sender_id);
                    Some(record.order_id)
                }
                None => None,
            };
            sessions.replace(&sender_id, next);
            Ok::<_, OrderbotError>(order_id)
        });

        let order_id = commit
            .await
            .map_err(|e| OrderbotError::Other(format!("Commit task failed: {}", e)))??;
        Ok(Reply {
            text: outbound,
            order_id,
        })
    }

    async fn record(&self, sender: &str, direction: Direction, text: &str) {
        if let Err(e) = self.log.append(sender, direction, text).await {
            warn!("Failed to log {} message for {}: {}", direction, sender, e);
        }
    }
}
