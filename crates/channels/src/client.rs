use async_trait::async_trait;

use crate::{
    chat_id::ChatId,
    error::ChannelError,
    media::MediaAttachment,
    session::{SessionNotifier, SessionPhase},
};

/// Payload of a single outbound message.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Text(String),
    Media(MediaAttachment),
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Media(_) => "media",
        }
    }
}

/// What the client reported for an accepted send.
#[derive(Debug, Clone, Default)]
pub struct SentMessage {
    /// Library-assigned message id, when it exposes one.
    pub id: Option<String>,
}

/// A WhatsApp Web session owned by an external library.
///
/// Implementations drive their own lifecycle and publish it through
/// [`MessagingClient::notifier`]; callers only observe it.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Backend identifier (e.g. "whatsapp-web").
    fn id(&self) -> &str;

    /// Begin connecting. Returns once the session is running in the
    /// background, not once it is ready.
    async fn start(&self) -> Result<(), ChannelError>;

    /// Send one message. Resolves when the library accepted or rejected it.
    async fn send(&self, to: &ChatId, message: OutboundMessage)
    -> Result<SentMessage, ChannelError>;

    /// Lifecycle notifications and the current phase.
    fn notifier(&self) -> &SessionNotifier;

    fn phase(&self) -> SessionPhase {
        self.notifier().phase()
    }
}
