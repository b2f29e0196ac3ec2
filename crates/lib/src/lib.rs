//! wagate core library — configuration, WhatsApp channel, monitoring client,
//! and the webhook gateway used by the CLI binary.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod monitoring;
pub mod routing;
