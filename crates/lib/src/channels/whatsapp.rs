//! WhatsApp Cloud API channel: webhook payload types and outbound sends.

use crate::channels::Responder;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Graph API base URL. Override via config `whatsapp.apiBase` (tests, version bumps).
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v17.0";

#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    #[error("whatsapp request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("whatsapp api error: {0}")]
    Api(String),
    #[error("whatsapp channel not configured: missing {0}")]
    NotConfigured(&'static str),
}

/// Webhook callback body. Meta nests the message under
/// `entry[0].changes[0].value.messages[0]`; anything without that path is a
/// non-message event (delivery receipt, status update).
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

/// One incoming message. Either `text` or `interactive.button_reply` is
/// populated for the shapes this gateway handles.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub from: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub interactive: Option<Interactive>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct Interactive {
    #[serde(default)]
    pub button_reply: Option<ButtonReply>,
}

#[derive(Debug, Deserialize)]
pub struct ButtonReply {
    pub id: String,
}

impl WebhookPayload {
    /// First message entry, if the callback carries one.
    pub fn first_message(&self) -> Option<&IncomingMessage> {
        self.entry
            .first()?
            .changes
            .first()?
            .value
            .messages
            .first()
    }
}

impl IncomingMessage {
    pub fn text(&self) -> Option<&str> {
        self.text.as_ref().map(|t| t.body.as_str())
    }

    pub fn button_id(&self) -> Option<&str> {
        self.interactive
            .as_ref()?
            .button_reply
            .as_ref()
            .map(|b| b.id.as_str())
    }
}

/// WhatsApp channel: sends text and interactive-button messages via the Graph API.
pub struct WhatsAppChannel {
    token: Option<String>,
    phone_number_id: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(
        token: Option<String>,
        phone_number_id: Option<String>,
        api_base: Option<String>,
    ) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            token,
            phone_number_id,
            api_base,
            client: reqwest::Client::new(),
        }
    }

    /// Send a plain-text message.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), WhatsAppError> {
        self.post_message(text_payload(to, body)).await
    }

    /// Send the three-button menu (cpu / mem / disk).
    pub async fn send_menu(&self, to: &str) -> Result<(), WhatsAppError> {
        self.post_message(menu_payload(to)).await
    }

    async fn post_message(&self, payload: serde_json::Value) -> Result<(), WhatsAppError> {
        let token = self
            .token
            .as_ref()
            .ok_or(WhatsAppError::NotConfigured("token"))?;
        let phone_number_id = self
            .phone_number_id
            .as_ref()
            .ok_or(WhatsAppError::NotConfigured("phone number id"))?;
        let url = format!("{}/{}/messages", self.api_base, phone_number_id);
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(WhatsAppError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

fn text_payload(to: &str, body: &str) -> serde_json::Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "text": { "body": body },
    })
}

fn menu_payload(to: &str) -> serde_json::Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "button",
            "body": { "text": "👋 Hi! Please choose an option:" },
            "action": {
                "buttons": [
                    { "type": "reply", "reply": { "id": "cpu", "title": "CPU Usage" } },
                    { "type": "reply", "reply": { "id": "mem", "title": "Memory" } },
                    { "type": "reply", "reply": { "id": "disk", "title": "Disk" } },
                ],
            },
        },
    })
}

#[async_trait]
impl Responder for WhatsAppChannel {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), String> {
        WhatsAppChannel::send_text(self, to, body)
            .await
            .map_err(|e| e.to_string())
    }

    async fn send_menu(&self, to: &str) -> Result<(), String> {
        WhatsAppChannel::send_menu(self, to)
            .await
            .map_err(|e| e.to_string())
    }
}
