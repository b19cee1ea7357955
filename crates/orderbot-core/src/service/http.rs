use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::channel::is_allowed;
use crate::channel::twilio::{twiml_empty, twiml_message, TwilioWebhook};
use crate::config::Config;
use crate::provider::CompletionProvider;
use crate::service::webhook::WebhookHandler;

/// Shared application state for the HTTP server.
pub struct AppState {
    pub handler: WebhookHandler,
    pub allow_from: Vec<String>,
}

impl AppState {
    pub fn new(handler: WebhookHandler) -> Self {
        Self {
            handler,
            allow_from: Vec::new(),
        }
    }

    /// Build state with CSV sinks and allow-list taken from config.
    pub fn from_config(config: &Config, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            handler: WebhookHandler::from_config(config, provider),
            allow_from: config.gateway.allow_from.clone(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
}

/// Create the axum Router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn twiml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

/// POST /webhook - Twilio messaging webhook
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    Form(form): Form<TwilioWebhook>,
) -> Response {
    let msg = match form.into_inbound() {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Rejected webhook: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    if !is_allowed(&msg.sender_id, &state.allow_from) {
        warn!("Access denied for sender {}", msg.sender_id);
        return twiml(twiml_empty());
    }

    let reply = state.handler.handle(&msg).await;
    twiml(twiml_message(&reply.text))
}

/// GET /health
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions: state.handler.sessions().len(),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Start the HTTP server on the given address.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Webhook server listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
