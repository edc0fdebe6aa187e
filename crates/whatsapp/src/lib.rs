//! WhatsApp Web backend: login QR rendering and a `whatsapp-rust` powered
//! [`MessagingClient`](wabridge_channels::MessagingClient).
//!
//! The real client needs the `web-client` feature. Without it,
//! [`WhatsAppWebClient`] still builds but never leaves the disconnected phase
//! and rejects every send.

pub mod client;
pub mod qr;

pub use client::{WhatsAppWebClient, WhatsAppWebOptions};

/// Backend identifier reported by [`WhatsAppWebClient`].
pub const CLIENT_ID: &str = "whatsapp-web";
