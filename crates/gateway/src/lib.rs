//! Gateway: HTTP server in front of the WhatsApp Web session.
//!
//! Lifecycle:
//! 1. Load config, open the upload store
//! 2. Build shared state around the messaging client
//! 3. Start the session pump (lifecycle events → readiness flag, pending QR)
//! 4. Start the client and the upload retention sweeper
//! 5. Serve `/get-qr`, `/send-message`, `/send-media`, `/health`

pub mod auth;
pub mod error;
pub mod messages;
pub mod server;
pub mod session;
pub mod state;

pub use {
    error::ApiError,
    server::{build_gateway_app, start_gateway},
    state::{GatewayOptions, GatewayState, SessionState},
};
