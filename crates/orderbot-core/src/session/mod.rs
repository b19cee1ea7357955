pub mod store;
pub mod memory_store;

use serde::{Deserialize, Serialize};

pub use memory_store::MemorySessionStore;
pub use store::{SenderGuard, SessionStore};

/// Where a sender is in the checkout flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Idle,
    AwaitingAddress,
    AwaitingPayment,
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutState::Idle => write!(f, "idle"),
            CheckoutState::AwaitingAddress => write!(f, "awaiting_address"),
            CheckoutState::AwaitingPayment => write!(f, "awaiting_payment"),
        }
    }
}

/// One sender's in-progress interaction.
///
/// `address` is set whenever `state` is `AwaitingPayment`, and `product` is set
/// whenever `address` is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub sender_id: String,
    pub state: CheckoutState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

impl Session {
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            state: CheckoutState::Idle,
            product: None,
            address: None,
            payment_method: None,
        }
    }

    /// True when the session carries no checkout data at all.
    pub fn is_fresh(&self) -> bool {
        self.state == CheckoutState::Idle
            && self.product.is_none()
            && self.address.is_none()
            && self.payment_method.is_none()
    }

    /// Drop all order data and return to `Idle`.
    pub fn reset(&mut self) {
        self.state = CheckoutState::Idle;
        self.product = None;
        self.address = None;
        self.payment_method = None;
    }

    /// Check the field/state invariants.
    pub fn is_consistent(&self) -> bool {
        let address_ok = self.state != CheckoutState::AwaitingPayment || self.address.is_some();
        let product_ok = self.address.is_none() || self.product.is_some();
        let awaiting_ok = self.state != CheckoutState::AwaitingAddress || self.product.is_some();
        address_ok && product_ok && awaiting_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_new() {
        let session = Session::new("whatsapp:+1555");
        assert_eq!(session.sender_id, "whatsapp:+1555");
        assert_eq!(session.state, CheckoutState::Idle);
        assert!(session.is_fresh());
        assert!(session.is_consistent());
    }

    #[test]
    fn test_session_reset() {
        let mut session = Session::new("a");
        session.state = CheckoutState::AwaitingPayment;
        session.product = Some("headphones".into());
        session.address = Some("221B Baker St".into());
        session.payment_method = Some("UPI".into());
        assert!(!session.is_fresh());

        session.reset();
        assert_eq!(session, Session::new("a"));
    }

    #[test]
    fn test_session_consistency() {
        let mut session = Session::new("a");
        session.state = CheckoutState::AwaitingPayment;
        assert!(!session.is_consistent());

        session.address = Some("somewhere".into());
        assert!(!session.is_consistent());

        session.product = Some("kettle".into());
        assert!(session.is_consistent());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&CheckoutState::AwaitingAddress).unwrap();
        assert_eq!(json, "\"awaiting_address\"");
        assert_eq!(CheckoutState::AwaitingPayment.to_string(), "awaiting_payment");
        assert_eq!(CheckoutState::default(), CheckoutState::Idle);
    }
}
