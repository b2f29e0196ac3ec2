//! Communication channels (WhatsApp Cloud API).
//!
//! The `Responder` trait is the seam the message router sends replies through;
//! `WhatsAppChannel` is the production implementation.

mod whatsapp;

pub use whatsapp::{
    IncomingMessage, WebhookPayload, WhatsAppChannel, WhatsAppError, DEFAULT_API_BASE,
};

use async_trait::async_trait;

/// Outbound side of a chat channel: plain text and the button menu.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Send a plain-text message to a recipient.
    async fn send_text(&self, to: &str, body: &str) -> Result<(), String>;

    /// Send the interactive menu (CPU / Memory / Disk reply buttons).
    async fn send_menu(&self, to: &str) -> Result<(), String>;
}
