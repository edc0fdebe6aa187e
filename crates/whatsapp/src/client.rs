use std::path::PathBuf;

use {
    async_trait::async_trait,
    wabridge_channels::{
        ChannelError, ChatId, MessagingClient, OutboundMessage, SentMessage, SessionNotifier,
    },
};

use crate::CLIENT_ID;

/// Settings for a linked-device session.
#[derive(Debug, Clone)]
pub struct WhatsAppWebOptions {
    /// Directory holding the session database.
    pub session_dir: PathBuf,
    /// Name shown under "Linked devices" on the phone.
    pub device_name: String,
}

impl WhatsAppWebOptions {
    pub fn session_db_path(&self) -> PathBuf {
        self.session_dir.join("whatsapp.db")
    }
}

#[cfg(feature = "web-client")]
pub use web::WhatsAppWebClient;

#[cfg(feature = "web-client")]
mod web {
    use std::sync::Arc;

    use {
        tokio::sync::RwLock,
        tracing::{debug, info, warn},
        wacore::types::events::Event,
        wacore_binary::jid::Jid,
        wabridge_channels::{MediaAttachment, MediaKind, SessionEvent},
        waproto::whatsapp::{self as wa, message as wam},
        whatsapp_rust::{
            bot::Bot, client::Client, download::MediaType, store::SqliteStore,
        },
        whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory,
        whatsapp_rust_ureq_http_client::UreqHttpClient,
    };

    use super::*;

    /// WhatsApp Web session driven by `whatsapp-rust`.
    pub struct WhatsAppWebClient {
        options: WhatsAppWebOptions,
        notifier: Arc<SessionNotifier>,
        /// Set once the bot reports `Connected`, cleared on logout.
        client: Arc<RwLock<Option<Arc<Client>>>>,
    }

    impl WhatsAppWebClient {
        pub fn new(options: WhatsAppWebOptions) -> Self {
            Self {
                options,
                notifier: Arc::new(SessionNotifier::new()),
                client: Arc::new(RwLock::new(None)),
            }
        }

        async fn connected_client(&self) -> Result<Arc<Client>, ChannelError> {
            self.client
                .read()
                .await
                .as_ref()
                .map(Arc::clone)
                .ok_or(ChannelError::NotReady)
        }
    }

    /// `c.us` is the WhatsApp Web name for the phone-number server.
    fn to_jid(chat: &ChatId) -> Result<Jid, ChannelError> {
        let server = match chat.server() {
            wabridge_channels::chat_id::USER_SERVER => "s.whatsapp.net",
            other => other,
        };
        let raw = format!("{}@{server}", chat.user());
        raw.parse::<Jid>()
            .map_err(|e| ChannelError::InvalidRecipient(format!("{raw}: {e}")))
    }

    fn media_type(kind: MediaKind) -> MediaType {
        match kind {
            MediaKind::Image => MediaType::Image,
            MediaKind::Video => MediaType::Video,
            MediaKind::Audio => MediaType::Audio,
            MediaKind::Document => MediaType::Document,
        }
    }

    async fn media_message(
        client: &Client,
        media: MediaAttachment,
    ) -> Result<wa::Message, ChannelError> {
        let kind = media.kind();
        debug!(
            file = %media.file_name,
            mime = %media.mime_type,
            size = media.size(),
            ?kind,
            "uploading media"
        );
        let MediaAttachment {
            file_name,
            mime_type,
            data,
        } = media;
        let upload = client
            .upload(data, media_type(kind))
            .await
            .map_err(ChannelError::send)?;

        let message = match kind {
            MediaKind::Image => wa::Message {
                image_message: Some(Box::new(wam::ImageMessage {
                    url: Some(upload.url),
                    direct_path: Some(upload.direct_path),
                    media_key: Some(upload.media_key),
                    file_enc_sha256: Some(upload.file_enc_sha256),
                    file_sha256: Some(upload.file_sha256),
                    file_length: Some(upload.file_length),
                    mimetype: Some(mime_type),
                    ..Default::default()
                })),
                ..Default::default()
            },
            MediaKind::Video => wa::Message {
                video_message: Some(Box::new(wam::VideoMessage {
                    url: Some(upload.url),
                    direct_path: Some(upload.direct_path),
                    media_key: Some(upload.media_key),
                    file_enc_sha256: Some(upload.file_enc_sha256),
                    file_sha256: Some(upload.file_sha256),
                    file_length: Some(upload.file_length),
                    mimetype: Some(mime_type),
                    ..Default::default()
                })),
                ..Default::default()
            },
            MediaKind::Audio => wa::Message {
                audio_message: Some(Box::new(wam::AudioMessage {
                    url: Some(upload.url),
                    direct_path: Some(upload.direct_path),
                    media_key: Some(upload.media_key),
                    file_enc_sha256: Some(upload.file_enc_sha256),
                    file_sha256: Some(upload.file_sha256),
                    file_length: Some(upload.file_length),
                    mimetype: Some(mime_type),
                    ..Default::default()
                })),
                ..Default::default()
            },
            MediaKind::Document => wa::Message {
                document_message: Some(Box::new(wam::DocumentMessage {
                    url: Some(upload.url),
                    direct_path: Some(upload.direct_path),
                    media_key: Some(upload.media_key),
                    file_enc_sha256: Some(upload.file_enc_sha256),
                    file_sha256: Some(upload.file_sha256),
                    file_length: Some(upload.file_length),
                    mimetype: Some(mime_type),
                    file_name: Some(file_name),
                    ..Default::default()
                })),
                ..Default::default()
            },
        };
        Ok(message)
    }

    #[async_trait]
    impl MessagingClient for WhatsAppWebClient {
        fn id(&self) -> &str {
            CLIENT_ID
        }

        async fn start(&self) -> Result<(), ChannelError> {
            tokio::fs::create_dir_all(&self.options.session_dir).await?;
            let db_path = self.options.session_db_path();
            info!(session = %db_path.display(), "starting WhatsApp Web session");

            let backend = Arc::new(
                SqliteStore::new(&db_path.to_string_lossy())
                    .await
                    .map_err(|e| ChannelError::Send(format!("session store init failed: {e}")))?,
            );

            let notifier = Arc::clone(&self.notifier);
            let client_slot = Arc::clone(&self.client);

            let mut bot = Bot::builder()
                .with_backend(backend)
                .with_transport_factory(TokioWebSocketTransportFactory::new())
                .with_http_client(UreqHttpClient::new())
                .with_device_props(
                    Some(self.options.device_name.clone()),
                    None,
                    Some(wa::device_props::PlatformType::Desktop),
                )
                .on_event(move |event, client| {
                    let notifier = Arc::clone(&notifier);
                    let client_slot = Arc::clone(&client_slot);
                    async move {
                        match event {
                            Event::PairingQrCode { code, .. } => {
                                info!("login QR code received");
                                notifier.emit(SessionEvent::Qr(code));
                            },
                            Event::PairSuccess(_) => {
                                info!("WhatsApp client authenticated");
                                notifier.emit(SessionEvent::Authenticated);
                            },
                            Event::Connected(_) => {
                                *client_slot.write().await = Some(client);
                                info!("WhatsApp client is ready");
                                notifier.emit(SessionEvent::Ready);
                            },
                            Event::Disconnected(_) => {
                                warn!("WhatsApp client disconnected");
                                notifier.emit(SessionEvent::Disconnected("connection lost".into()));
                            },
                            Event::LoggedOut(_) => {
                                warn!("WhatsApp client was logged out");
                                *client_slot.write().await = None;
                                notifier.emit(SessionEvent::AuthFailure("logged out".into()));
                            },
                            _ => {},
                        }
                    }
                })
                .build()
                .await
                .map_err(|e| ChannelError::Send(format!("whatsapp bot build failed: {e}")))?;

            // Running in the background; the join handle is not needed.
            let _handle = bot
                .run()
                .await
                .map_err(|e| ChannelError::Send(format!("whatsapp bot run failed: {e}")))?;
            Ok(())
        }

        async fn send(
            &self,
            to: &ChatId,
            message: OutboundMessage,
        ) -> Result<SentMessage, ChannelError> {
            let client = self.connected_client().await?;
            let jid = to_jid(to)?;
            let kind = message.kind();
            let outgoing = match message {
                OutboundMessage::Text(text) => wa::Message {
                    conversation: Some(text),
                    ..Default::default()
                },
                OutboundMessage::Media(media) => media_message(&client, media).await?,
            };
            let id = client
                .send_message(jid, outgoing)
                .await
                .map_err(ChannelError::send)?;
            debug!(to = %to, kind, id = %id, "message sent");
            Ok(SentMessage { id: Some(id) })
        }

        fn notifier(&self) -> &SessionNotifier {
            &self.notifier
        }
    }

}

#[cfg(not(feature = "web-client"))]
pub use stub::WhatsAppWebClient;

#[cfg(not(feature = "web-client"))]
mod stub {
    use tracing::warn;

    use super::*;

    /// Placeholder used when the crate is built without `web-client`.
    pub struct WhatsAppWebClient {
        options: WhatsAppWebOptions,
        notifier: SessionNotifier,
    }

    impl WhatsAppWebClient {
        pub fn new(options: WhatsAppWebOptions) -> Self {
            Self {
                options,
                notifier: SessionNotifier::new(),
            }
        }
    }

    #[async_trait]
    impl MessagingClient for WhatsAppWebClient {
        fn id(&self) -> &str {
            CLIENT_ID
        }

        async fn start(&self) -> Result<(), ChannelError> {
            warn!(
                session = %self.options.session_db_path().display(),
                "built without the `web-client` feature; the WhatsApp session stays disconnected"
            );
            Ok(())
        }

        async fn send(
            &self,
            _to: &ChatId,
            _message: OutboundMessage,
        ) -> Result<SentMessage, ChannelError> {
            Err(ChannelError::NotReady)
        }

        fn notifier(&self) -> &SessionNotifier {
            &self.notifier
        }
    }

    #[cfg(test)]
    mod tests {
        use {super::*, wabridge_channels::SessionPhase};

        fn client() -> WhatsAppWebClient {
            WhatsAppWebClient::new(WhatsAppWebOptions {
                session_dir: PathBuf::from("/tmp/wabridge-test-session"),
                device_name: "test".into(),
            })
        }

        #[tokio::test]
        async fn stub_never_becomes_ready() {
            let client = client();
            client.start().await.unwrap();
            assert_eq!(client.phase(), SessionPhase::Disconnected);
            assert_eq!(client.id(), CLIENT_ID);
        }

        #[tokio::test]
        async fn stub_rejects_sends() {
            let to = ChatId::from_phone("15551234567").unwrap();
            let err = client()
                .send(&to, OutboundMessage::Text("hi".into()))
                .await
                .unwrap_err();
            assert!(matches!(err, ChannelError::NotReady));
        }
    }
}
