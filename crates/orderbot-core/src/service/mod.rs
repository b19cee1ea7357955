pub mod webhook;

#[cfg(feature = "http-api")]
pub mod http;

pub use webhook::{Reply, WebhookHandler};
