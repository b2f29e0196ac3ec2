//! Gateway: webhook HTTP server.
//!
//! One port serves the Meta verification handshake (GET /webhook), message
//! callbacks (POST /webhook), and a health probe (GET /).

mod server;

pub use server::{run_gateway, GatewayState};
