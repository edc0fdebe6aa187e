//! Messaging client seam.
//!
//! The WhatsApp Web session is owned by an external library. This crate
//! describes what the HTTP layer needs from it: a send operation, a
//! lifecycle notifier, recipient addressing and the media wrapper.

pub mod chat_id;
pub mod client;
pub mod error;
pub mod media;
pub mod session;

pub use {
    chat_id::ChatId,
    client::{MessagingClient, OutboundMessage, SentMessage},
    error::ChannelError,
    media::{MediaAttachment, MediaKind},
    session::{SessionEvent, SessionNotifier, SessionPhase},
};
