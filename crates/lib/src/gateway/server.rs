//! Gateway HTTP server: Bot Framework messaging endpoint plus the two broadcast triggers.

use crate::adapter::{AdapterError, BotAdapter};
use crate::auth::{JwtValidator, TokenProvider};
use crate::broadcast::{BroadcastMessage, Broadcaster};
use crate::channels::{ConnectorClient, TeamsClient};
use crate::config::{self, AppCredentials, Config};
use crate::handler::{ActivityHandler, LoggingBot};
use crate::schema::Activity;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared state for the gateway: config, adapter, bot, and broadcaster. All read-only after startup.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub adapter: Arc<BotAdapter>,
    pub bot: Arc<dyn ActivityHandler>,
    pub broadcaster: Arc<Broadcaster>,
}

impl GatewayState {
    /// Resolve credentials once from config and environment, then wire the stack.
    pub fn from_config(config: Config, bot: Arc<dyn ActivityHandler>) -> Self {
        let credentials = Arc::new(config::resolve_app_credentials(&config));
        Self::new(config, credentials, bot)
    }

    /// Wire the production stack: token provider, connector, JWT validator, adapter, and a
    /// broadcaster bound to the configured service URL. All of them share `credentials`.
    pub fn new(config: Config, credentials: Arc<AppCredentials>, bot: Arc<dyn ActivityHandler>) -> Self {
        if credentials.auth_disabled() {
            log::warn!("no MicrosoftAppId configured: inbound requests are not authenticated");
        }
        let connector = ConnectorClient::new(TokenProvider::new(credentials.clone()));
        let validator = Arc::new(JwtValidator::new(credentials));
        let adapter = BotAdapter::new(validator, Arc::new(connector.clone()));
        let teams = TeamsClient::new(connector, config.broadcast.service_url.clone());
        let broadcaster = Broadcaster::new(Arc::new(teams), config.broadcast.failure_policy);
        Self {
            config: Arc::new(config),
            adapter: Arc::new(adapter),
            bot,
            broadcaster: Arc::new(broadcaster),
        }
    }
}

/// Routes: health, messaging endpoint, broadcast triggers.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/api/messages", post(messages))
        .route("/api/messages/send", post(send_image))
        .route("/api/messages/send-execsum", post(send_execsum))
        .with_state(state)
}

/// Run the gateway with the built-in logging bot until SIGINT/SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    let credentials = Arc::new(config::resolve_app_credentials(&config));
    let bot = Arc::new(LoggingBot::new(credentials.app_id.clone()));
    serve(GatewayState::new(config, credentials, bot)).await
}

/// Run the gateway with a caller-supplied bot.
pub async fn run_gateway_with(config: Config, bot: Arc<dyn ActivityHandler>) -> Result<()> {
    serve(GatewayState::from_config(config, bot)).await
}

async fn serve(state: GatewayState) -> Result<()> {
    let bind_addr = format!("{}:{}", state.config.gateway.bind, state.config.gateway.port);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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

/// True when the Content-Type header names a JSON media type.
fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}

/// POST /api/messages — one inbound activity. 415 for non-JSON, 400 for unparsable body,
/// 401 when authentication fails; invoke responses are forwarded, anything else is 200 empty.
async fn messages(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    if !is_json_content_type(&headers) {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }
    let activity: Activity = match serde_json::from_slice(&body) {
        Ok(a) => a,
        Err(e) => {
            log::debug!("rejecting activity: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match state
        .adapter
        .process_activity(activity, auth_header, state.bot.as_ref())
        .await
    {
        Ok(Some(invoke)) => {
            let status = StatusCode::from_u16(invoke.status).unwrap_or(StatusCode::OK);
            match invoke.body {
                Some(body) => (status, Json(body)).into_response(),
                None => status.into_response(),
            }
        }
        Ok(None) => StatusCode::OK.into_response(),
        Err(AdapterError::Unauthorized(e)) => {
            log::warn!("rejecting activity: {}", e);
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

/// POST /api/messages/send — broadcast the configured image to every channel of the team.
async fn send_image(State(state): State<GatewayState>) -> Response {
    let message = BroadcastMessage::image(&state.config.broadcast);
    run_broadcast(&state, &message).await
}

/// POST /api/messages/send-execsum — broadcast the exec summary card.
async fn send_execsum(State(state): State<GatewayState>) -> Response {
    let message = BroadcastMessage::execsum(&state.config.broadcast);
    run_broadcast(&state, &message).await
}

/// Always 200: the report is the body when the channel lookup succeeded, otherwise the error is
/// only logged.
async fn run_broadcast(state: &GatewayState, message: &BroadcastMessage) -> Response {
    let team_id = &state.config.broadcast.team_id;
    match state.broadcaster.broadcast(team_id, message).await {
        Ok(report) => {
            if !report.is_complete() {
                log::warn!(
                    "broadcast to team {}: {} failed, {} skipped",
                    team_id,
                    report.failed.len(),
                    report.skipped.len()
                );
            }
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => {
            log::error!("broadcast to team {} failed: {:?}", team_id, anyhow::Error::from(e));
            StatusCode::OK.into_response()
        }
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}
