//! Webhook HTTP server: handshake verification, message dispatch, health.

use crate::channels::{Responder, WebhookPayload, WhatsAppChannel};
use crate::config::{self, Config};
use crate::monitoring::{MetricSource, MonitoringClient};
use crate::routing::{self, Action};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const HUB_MODE_SUBSCRIBE: &str = "subscribe";

/// Shared state for the gateway (config, channel, monitoring client).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Handshake secret, resolved once at startup.
    pub verify_token: String,
    pub whatsapp: Arc<WhatsAppChannel>,
    pub monitoring: Arc<MonitoringClient>,
}

/// Meta handshake query parameters (`hub.*` keys).
#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode", default)]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token", default)]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge", default)]
    challenge: Option<String>,
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Refuses to start without a webhook verify token. Blocks until shutdown.
pub async fn run_gateway(config: Config) -> Result<()> {
    let verify_token = config::resolve_verify_token(&config).context(
        "refusing to start without a webhook verify token (set VERIFY_TOKEN or gateway.verifyToken)",
    )?;

    let token = config::resolve_whatsapp_token(&config);
    let phone_number_id = config::resolve_phone_number_id(&config);
    if token.is_none() || phone_number_id.is_none() {
        log::warn!("whatsapp credentials not fully configured; outbound replies will fail");
    }
    let whatsapp = Arc::new(WhatsAppChannel::new(
        token,
        phone_number_id,
        config.whatsapp.api_base.clone(),
    ));
    let monitoring = Arc::new(MonitoringClient::new(config::resolve_monitoring(&config))?);

    let bind = config.gateway.bind.trim().to_string();
    let port = config.gateway.port;
    let state = GatewayState {
        config: Arc::new(config),
        verify_token,
        whatsapp,
        monitoring,
    };

    let app = Router::new()
        .route("/", get(health_http))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state);

    let bind_addr = format!("{}:{}", bind, port);
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
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
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
        "port": state.config.gateway.port,
    }))
}

/// GET /webhook — Meta handshake: echo the challenge iff mode is "subscribe"
/// and the token matches, else 403. No side effects.
async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let mode_ok = params.mode.as_deref() == Some(HUB_MODE_SUBSCRIBE);
    let token_ok = params.verify_token.as_deref() == Some(state.verify_token.as_str());
    if mode_ok && token_ok {
        log::info!("webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        log::warn!("webhook verification rejected");
        StatusCode::FORBIDDEN.into_response()
    }
}

/// POST /webhook — receives WhatsApp callback JSON; extracts the first
/// message and dispatches. Callbacks without a message (delivery receipts,
/// status updates) are acknowledged with no further action.
async fn receive_webhook(State(state): State<GatewayState>, body: Bytes) -> StatusCode {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::debug!("webhook body did not parse: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    let Some(message) = payload.first_message() else {
        return StatusCode::OK;
    };
    log::info!(
        "incoming message: {}",
        message.text().or(message.button_id()).unwrap_or("<none>")
    );
    let action = routing::classify(message.text(), message.button_id());
    dispatch(&*state.whatsapp, &*state.monitoring, &message.from, action).await;
    StatusCode::OK
}

/// Perform the action for one message. The reply is best-effort: send
/// failures are logged and never escalated to the webhook response.
async fn dispatch(
    responder: &dyn Responder,
    metrics: &dyn MetricSource,
    from: &str,
    action: Action,
) {
    let sent = match action {
        Action::Menu => responder.send_menu(from).await,
        Action::CpuMetric => {
            let reply = match metrics.fetch_cpu(routing::CPU_WINDOW).await {
                Some(v) => routing::cpu_reply(v),
                None => routing::CPU_UNAVAILABLE_REPLY.to_string(),
            };
            responder.send_text(from, &reply).await
        }
        Action::MemPlaceholder => responder.send_text(from, routing::MEM_PLACEHOLDER_REPLY).await,
        Action::DiskPlaceholder => responder.send_text(from, routing::DISK_PLACEHOLDER_REPLY).await,
        Action::Echo(text) => responder.send_text(from, &routing::echo_reply(&text)).await,
        Action::Ignore => Ok(()),
    };
    if let Err(e) = sent {
        log::warn!("sending reply failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Debug, PartialEq)]
    enum Sent {
        Text { to: String, body: String },
        Menu { to: String },
    }

    #[derive(Default)]
    struct RecordingResponder {
        sent: Mutex<Vec<Sent>>,
        fail: bool,
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn send_text(&self, to: &str, body: &str) -> Result<(), String> {
            self.sent.lock().await.push(Sent::Text {
                to: to.to_string(),
                body: body.to_string(),
            });
            if self.fail {
                Err("send failed".to_string())
            } else {
                Ok(())
            }
        }

        async fn send_menu(&self, to: &str) -> Result<(), String> {
            self.sent.lock().await.push(Sent::Menu { to: to.to_string() });
            Ok(())
        }
    }

    struct FixedMetric {
        value: Option<f64>,
        calls: AtomicUsize,
    }

    impl FixedMetric {
        fn new(value: Option<f64>) -> Self {
            Self {
                value,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetricSource for FixedMetric {
        async fn fetch_cpu(&self, window: &str) -> Option<f64> {
            assert_eq!(window, "1h");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.value
        }
    }

    #[tokio::test]
    async fn menu_action_sends_menu() {
        let responder = RecordingResponder::default();
        let metrics = FixedMetric::new(None);
        dispatch(&responder, &metrics, "100", Action::Menu).await;
        let sent = responder.sent.lock().await;
        assert_eq!(*sent, vec![Sent::Menu { to: "100".to_string() }]);
        assert_eq!(metrics.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cpu_action_replies_with_formatted_value() {
        let responder = RecordingResponder::default();
        let metrics = FixedMetric::new(Some(42.567));
        dispatch(&responder, &metrics, "100", Action::CpuMetric).await;
        let sent = responder.sent.lock().await;
        assert_eq!(
            *sent,
            vec![Sent::Text {
                to: "100".to_string(),
                body: "🔥 *CPU Utilization (1h)*: 42.57%".to_string(),
            }]
        );
        assert_eq!(metrics.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cpu_action_replies_with_notice_when_unavailable() {
        let responder = RecordingResponder::default();
        let metrics = FixedMetric::new(None);
        dispatch(&responder, &metrics, "100", Action::CpuMetric).await;
        let sent = responder.sent.lock().await;
        assert_eq!(
            *sent,
            vec![Sent::Text {
                to: "100".to_string(),
                body: routing::CPU_UNAVAILABLE_REPLY.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn placeholder_actions_skip_the_metric_source() {
        let responder = RecordingResponder::default();
        let metrics = FixedMetric::new(Some(99.0));
        dispatch(&responder, &metrics, "100", Action::MemPlaceholder).await;
        dispatch(&responder, &metrics, "100", Action::DiskPlaceholder).await;
        let sent = responder.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(metrics.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ignore_action_sends_nothing() {
        let responder = RecordingResponder::default();
        let metrics = FixedMetric::new(Some(1.0));
        dispatch(&responder, &metrics, "100", Action::Ignore).await;
        assert!(responder.sent.lock().await.is_empty());
        assert_eq!(metrics.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_failure_is_swallowed() {
        let responder = RecordingResponder {
            fail: true,
            ..Default::default()
        };
        let metrics = FixedMetric::new(None);
        dispatch(&responder, &metrics, "100", Action::Echo("x".to_string())).await;
        let sent = responder.sent.lock().await;
        assert_eq!(sent.len(), 1);
    }
}
