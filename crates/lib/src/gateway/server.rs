//! Gateway HTTP server: health probe, webhook verification handshake, event ingestion.

use crate::config::{self, Config};
use crate::dispatch::Dispatcher;
use crate::error::PipelineError;
use crate::messenger::parse_payload;
use crate::pipeline::ReplyPipeline;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const SUBSCRIBE_MODE: &str = "subscribe";

/// How long shutdown waits for queued pipelines to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for the webhook handlers. Read-only after startup.
#[derive(Clone)]
pub struct GatewayState {
    pub port: u16,
    /// Pre-shared secret for the subscription handshake. None rejects every handshake.
    verify_token: Option<Arc<str>>,
    dispatcher: Dispatcher,
}

impl GatewayState {
    pub fn new(port: u16, verify_token: Option<String>, dispatcher: Dispatcher) -> Self {
        Self {
            port,
            verify_token: verify_token.map(Arc::from),
            dispatcher,
        }
    }
}

/// Routes: `GET /` health; `GET|POST /webhook` (also served at `/messenger/webhook`).
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/messenger/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// When bind is not loopback, a verify token must be configured or startup fails.
/// Blocks until shutdown (e.g. Ctrl+C), then drains the dispatch queue.
/// `config_path` is used to resolve the tenants file and the interaction log.
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    let verify_token = config::resolve_verify_token(&config);
    if !config::is_loopback_bind(&bind) && verify_token.is_none() {
        anyhow::bail!(
            "refusing to bind gateway to {} without a webhook verify token (set messenger.verifyToken or FB_VERIFY_TOKEN)",
            bind
        );
    }
    if verify_token.is_none() {
        log::warn!("no webhook verify token configured; subscription handshakes will be rejected");
    }

    let pipeline = ReplyPipeline::from_config(&config, &config_path);
    let (dispatcher, worker) = Dispatcher::start(Arc::new(pipeline), &config.dispatch);
    let state = GatewayState::new(config.gateway.port, verify_token, dispatcher);
    let app = router(state);

    let bind_addr = format!("{}:{}", bind, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    // The router (and with it the last dispatcher clone) is gone; the worker drains and exits.
    match tokio::time::timeout(DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => log::info!("dispatch queue drained"),
        Ok(Err(e)) => log::warn!("dispatch worker failed: {}", e),
        Err(_) => log::warn!("dispatch queue not drained within {:?}", DRAIN_TIMEOUT),
    }
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}

/// Handshake query: `hub.mode`, `hub.verify_token`, `hub.challenge`.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Returns the challenge to echo when the handshake is valid.
fn check_handshake<'a>(
    params: &'a VerifyParams,
    expected: Option<&str>,
) -> Result<&'a str, PipelineError> {
    let expected = expected.ok_or(PipelineError::VerificationFailed)?;
    let mode = params.mode.as_deref();
    let token = params.verify_token.as_deref().map(str::trim);
    let challenge = params.challenge.as_deref().filter(|c| !c.is_empty());
    match (mode, token, challenge) {
        (Some(SUBSCRIBE_MODE), Some(t), Some(c)) if t == expected => Ok(c),
        _ => Err(PipelineError::VerificationFailed),
    }
}

/// GET /webhook — subscription handshake. Echoes the challenge verbatim as text/plain or answers 403.
async fn verify_webhook(
    State(state): State<GatewayState>,
    params: Option<Query<VerifyParams>>,
) -> Response {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    match check_handshake(&params, state.verify_token.as_deref()) {
        Ok(challenge) => {
            log::info!("webhook: subscription verified");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                challenge.to_string(),
            )
                .into_response()
        }
        Err(e) => {
            log::warn!(
                "webhook: {} (mode: {:?}, token provided: {}, challenge provided: {})",
                e,
                params.mode,
                params.verify_token.is_some(),
                params.challenge.is_some()
            );
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

/// POST /webhook — receives a batch of page events and queues the actionable ones.
/// Always 200: a malformed or foreign body is acknowledged as ignored.
async fn receive_webhook(
    State(state): State<GatewayState>,
    body: Bytes,
) -> Json<serde_json::Value> {
    let events = match parse_payload(&body) {
        Ok(events) => events,
        Err(e) => {
            log::warn!("webhook: ignoring body: {}", e);
            return Json(json!({ "status": "ignored" }));
        }
    };
    let mut queued = 0usize;
    let mut skipped = 0usize;
    for event in events {
        if event.actionable_text().is_none() {
            skipped += 1;
            continue;
        }
        let sender_id = event.sender_id.clone();
        match state.dispatcher.dispatch(event) {
            Ok(()) => queued += 1,
            Err(e) => log::warn!("webhook: dropping event from {}: {}", sender_id, e),
        }
    }
    log::debug!("webhook: queued {} event(s), skipped {}", queued, skipped);
    Json(json!({ "status": "success" }))
}
