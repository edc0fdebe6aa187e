use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    anyhow::Context,
    axum::{
        Router,
        extract::{DefaultBodyLimit, Query, State},
        middleware,
        response::{Html, IntoResponse, Json, Response},
        routing::{get, post},
    },
    serde::Deserialize,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{error, info},
    wabridge_channels::MessagingClient,
    wabridge_config::BridgeConfig,
    wabridge_media::{UploadStore, cleanup},
    wabridge_whatsapp::qr,
};

use crate::{
    auth, error::ApiError, messages, session::spawn_session_pump, state::GatewayOptions,
    state::GatewayState,
};

const QR_PAGE: &str = include_str!("assets/qr.html");

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/get-qr", get(qr_handler))
        .route("/send-message", post(messages::send_message))
        .route("/send-media", post(messages::send_media))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the bridge: session pump, messaging client, retention sweeper and
/// the HTTP listener. Returns when the server shuts down.
pub async fn start_gateway(config: BridgeConfig, client: Arc<dyn MessagingClient>) -> anyhow::Result<()> {
    let uploads = UploadStore::new(&config.uploads.dir)
        .with_context(|| format!("failed to create uploads dir {}", config.uploads.dir.display()))?;
    let resolved_auth = auth::resolve_auth(config.server.api_token.clone());
    let auth_enabled = resolved_auth.token.is_some();

    let state = GatewayState::new(
        Arc::clone(&client),
        uploads,
        resolved_auth,
        GatewayOptions::from(&config),
    );

    spawn_session_pump(Arc::clone(&state), config.whatsapp.print_qr);

    if config.uploads.retention_secs > 0 {
        cleanup::spawn_retention_task(
            state.uploads.dir().to_path_buf(),
            Duration::from_secs(config.uploads.retention_secs),
            Duration::from_secs(config.uploads.sweep_interval_secs.max(1)),
        );
    }

    client
        .start()
        .await
        .context("failed to start the WhatsApp client")?;

    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Startup banner.
    let lines = [
        format!("wabridge v{}", state.version),
        format!("listening on http://{addr}/"),
        format!("client: {}, auth: {}", client.id(), if auth_enabled { "token" } else { "off" }),
        format!("uploads: {}", state.uploads.dir().display()),
    ];
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "hostname": state.hostname,
        "client": state.client.id(),
        "phase": state.session.phase().await,
        "ready": state.session.is_ready(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct QrQuery {
    format: Option<String>,
}

async fn qr_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<QrQuery>,
) -> Result<Response, ApiError> {
    let Some(code) = state.session.pending_qr().await else {
        return Err(ApiError::QrUnavailable);
    };
    let image = qr::render_data_url(&code).map_err(|e| {
        error!(error = %e, "failed to render login QR");
        ApiError::QrRender
    })?;

    if query.format.as_deref() == Some("json") {
        return Ok(Json(serde_json::json!({ "qr": code, "image": image })).into_response());
    }
    Ok(Html(QR_PAGE.replace("{{QR_IMAGE}}", &image)).into_response())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        std::sync::Mutex,
        wabridge_channels::{
            ChannelError, ChatId, OutboundMessage, SentMessage, SessionEvent, SessionNotifier,
        },
    };

    use crate::auth::resolve_auth;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n0000";

    #[derive(Default)]
    struct FakeClient {
        notifier: SessionNotifier,
        sent: Mutex<Vec<(String, OutboundMessage)>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl MessagingClient for FakeClient {
        fn id(&self) -> &str {
            "fake"
        }

        async fn start(&self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn send(
            &self,
            to: &ChatId,
            message: OutboundMessage,
        ) -> Result<SentMessage, ChannelError> {
            if let Some(reason) = &self.fail_with {
                return Err(ChannelError::send(reason));
            }
            self.sent.lock().unwrap().push((to.to_string(), message));
            Ok(SentMessage {
                id: Some("msg-1".into()),
            })
        }

        fn notifier(&self) -> &SessionNotifier {
            &self.notifier
        }
    }

    struct Harness {
        base: String,
        state: Arc<GatewayState>,
        client: Arc<FakeClient>,
        uploads: tempfile::TempDir,
        http: reqwest::Client,
    }

    impl Harness {
        async fn start(client: FakeClient, token: Option<&str>, delete_after_send: bool) -> Self {
            let uploads = tempfile::tempdir().unwrap();
            let client = Arc::new(client);
            let state = GatewayState::new(
                Arc::clone(&client) as Arc<dyn MessagingClient>,
                UploadStore::new(uploads.path()).unwrap(),
                resolve_auth(token.map(str::to_string)),
                GatewayOptions {
                    qr_ttl: Duration::from_secs(60),
                    delete_after_send,
                    max_upload_bytes: 1024 * 1024,
                },
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let app = build_gateway_app(Arc::clone(&state));
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            Self {
                base: format!("http://{addr}"),
                state,
                client,
                uploads,
                http: reqwest::Client::new(),
            }
        }

        async fn ready(client: FakeClient) -> Self {
            let harness = Self::start(client, None, false).await;
            harness.state.session.apply(&SessionEvent::Ready).await;
            harness
        }

        fn url(&self, path: &str) -> String {
            format!("{}{path}", self.base)
        }

        fn uploaded_files(&self) -> Vec<String> {
            std::fs::read_dir(self.uploads.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        }

        async fn post_json(&self, path: &str, body: serde_json::Value) -> (u16, String) {
            let resp = self.http.post(self.url(path)).json(&body).send().await.unwrap();
            (resp.status().as_u16(), resp.text().await.unwrap())
        }

        async fn post_form(&self, form: reqwest::multipart::Form) -> (u16, String) {
            let resp = self
                .http
                .post(self.url("/send-media"))
                .multipart(form)
                .send()
                .await
                .unwrap();
            (resp.status().as_u16(), resp.text().await.unwrap())
        }
    }

    fn png_form(phone: &str) -> reqwest::multipart::Form {
        let part = reqwest::multipart::Part::bytes(PNG_BYTES.to_vec())
            .file_name("photo.png")
            .mime_str("image/png")
            .unwrap();
        reqwest::multipart::Form::new()
            .text("phoneNumber", phone.to_string())
            .part("file", part)
    }

    // ── /get-qr ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn qr_unavailable_until_first_code() {
        let h = Harness::start(FakeClient::default(), None, false).await;
        let resp = h.http.get(h.url("/get-qr")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 503);
        assert_eq!(
            resp.text().await.unwrap(),
            "QR code not available yet, please try again."
        );
    }

    #[tokio::test]
    async fn qr_page_embeds_png_data_url() {
        let h = Harness::start(FakeClient::default(), None, false).await;
        h.state.session.apply(&SessionEvent::Qr("2@abc,def".into())).await;

        let resp = h.http.get(h.url("/get-qr")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"));
        let body = resp.text().await.unwrap();
        assert!(body.contains("<img src=\"data:image/png;base64,"));
        assert!(!body.contains("{{QR_IMAGE}}"));

        let json: serde_json::Value = h
            .http
            .get(h.url("/get-qr?format=json"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["qr"], "2@abc,def");
        assert!(json["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn qr_render_failure_is_500() {
        let h = Harness::start(FakeClient::default(), None, false).await;
        // Longer than any QR version can hold.
        h.state.session.apply(&SessionEvent::Qr("x".repeat(5000))).await;

        let resp = h.http.get(h.url("/get-qr")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 500);
        assert_eq!(resp.text().await.unwrap(), "Error generating QR code image.");
    }

    #[tokio::test]
    async fn qr_cleared_once_ready() {
        let h = Harness::start(FakeClient::default(), None, false).await;
        h.state.session.apply(&SessionEvent::Qr("2@abc".into())).await;
        h.state.session.apply(&SessionEvent::Ready).await;
        let resp = h.http.get(h.url("/get-qr")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 503);
    }

    #[tokio::test]
    async fn session_pump_mirrors_client_events() {
        let h = Harness::start(FakeClient::default(), None, false).await;
        spawn_session_pump(Arc::clone(&h.state), false);
        tokio::task::yield_now().await;

        h.client.notifier.emit(SessionEvent::Qr("2@pumped".into()));
        h.client.notifier.emit(SessionEvent::Ready);
        for _ in 0..100 {
            if h.state.session.is_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(h.state.session.is_ready());
        assert_eq!(h.state.session.pending_qr().await, None);
    }

    // ── /send-message ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn send_message_rejected_when_not_ready() {
        let h = Harness::start(FakeClient::default(), None, false).await;
        let (status, body) = h
            .post_json("/send-message", serde_json::json!({ "phoneNumber": "1555", "message": "hi" }))
            .await;
        assert_eq!(status, 503);
        assert_eq!(body, "WhatsApp client not ready. Please try again later.");
        assert!(h.client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_message_requires_both_fields() {
        let h = Harness::ready(FakeClient::default()).await;
        let (status, body) = h
            .post_json("/send-message", serde_json::json!({ "phoneNumber": "15551234567" }))
            .await;
        assert_eq!(status, 400);
        assert_eq!(body, "Phone number and message are required.");

        let resp = h
            .http
            .post(h.url("/send-message"))
            .body("phoneNumber=1&message=2")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn send_message_targets_user_chat() {
        let h = Harness::ready(FakeClient::default()).await;
        let (status, body) = h
            .post_json(
                "/send-message",
                serde_json::json!({ "phoneNumber": "+15551234567", "message": "hi" }),
            )
            .await;
        assert_eq!(status, 200);
        assert_eq!(body, "Message sent successfully!");

        let (status, _) = h
            .post_json(
                "/send-message",
                serde_json::json!({ "phoneNumber": 15551234567u64, "message": "again" }),
            )
            .await;
        assert_eq!(status, 200);

        let sent = h.client.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "15551234567@c.us");
        assert!(matches!(&sent[0].1, OutboundMessage::Text(t) if t == "hi"));
        assert_eq!(sent[1].0, "15551234567@c.us");
    }

    #[tokio::test]
    async fn send_message_reports_library_error() {
        let client = FakeClient {
            fail_with: Some("chat not found".into()),
            ..FakeClient::default()
        };
        let h = Harness::ready(client).await;
        let (status, body) = h
            .post_json("/send-message", serde_json::json!({ "phoneNumber": "1555", "message": "hi" }))
            .await;
        assert_eq!(status, 500);
        assert_eq!(body, "Failed to send the message: chat not found");
    }

    // ── /send-media ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn send_media_rejected_when_not_ready_without_storing() {
        let h = Harness::start(FakeClient::default(), None, false).await;
        let (status, _) = h.post_form(png_form("15551234567")).await;
        assert_eq!(status, 503);
        assert!(h.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn send_media_requires_phone_and_file() {
        let h = Harness::ready(FakeClient::default()).await;
        let form = reqwest::multipart::Form::new().text("phoneNumber", "15551234567");
        let (status, body) = h.post_form(form).await;
        assert_eq!(status, 400);
        assert_eq!(body, "Phone number and media file are required.");
        assert!(h.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn send_media_stores_and_sends_upload() {
        let h = Harness::ready(FakeClient::default()).await;
        let (status, body) = h.post_form(png_form("15551234567")).await;
        assert_eq!(status, 200);
        assert_eq!(body, "Media sent successfully!");

        let files = h.uploaded_files();
        assert_eq!(files.len(), 1);
        let stem = files[0].strip_suffix(".png").unwrap();
        assert!(stem.chars().all(|c| c.is_ascii_digit()));

        let sent = h.client.sent.lock().unwrap();
        assert_eq!(sent[0].0, "15551234567@c.us");
        match &sent[0].1 {
            OutboundMessage::Media(media) => {
                assert_eq!(media.mime_type, "image/png");
                assert_eq!(media.data, PNG_BYTES);
            },
            other => panic!("expected media, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn send_media_ignores_empty_file_part() {
        let h = Harness::ready(FakeClient::default()).await;
        let empty = reqwest::multipart::Part::bytes(Vec::new()).file_name("");
        let form = reqwest::multipart::Form::new()
            .text("phoneNumber", "15551234567")
            .part("file", empty);

        let (status, body) = h.post_form(form).await;
        assert_eq!(status, 400);
        assert_eq!(body, "Phone number and media file are required.");
        assert!(h.uploaded_files().is_empty());
        assert!(h.client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_media_reports_library_error() {
        let client = FakeClient {
            fail_with: Some("media upload rejected".into()),
            ..FakeClient::default()
        };
        let h = Harness::ready(client).await;
        let (status, body) = h.post_form(png_form("15551234567")).await;
        assert_eq!(status, 500);
        assert_eq!(body, "Failed to send the media: media upload rejected");
    }

    #[tokio::test]
    async fn send_media_by_stored_file_name() {
        let h = Harness::ready(FakeClient::default()).await;
        std::fs::write(h.uploads.path().join("1700000000000.png"), PNG_BYTES).unwrap();

        let form = reqwest::multipart::Form::new()
            .text("phoneNumber", "15551234567")
            .text("fileName", "1700000000000.png");
        assert_eq!(h.post_form(form).await.0, 200);

        let form = reqwest::multipart::Form::new()
            .text("phoneNumber", "15551234567")
            .text("fileName", "missing.png");
        let (status, body) = h.post_form(form).await;
        assert_eq!(status, 404);
        assert_eq!(body, "File not found.");

        let form = reqwest::multipart::Form::new()
            .text("phoneNumber", "15551234567")
            .text("fileName", "../secret.txt");
        assert_eq!(h.post_form(form).await.0, 400);
    }

    #[tokio::test]
    async fn delete_after_send_removes_upload() {
        let h = Harness::start(FakeClient::default(), None, true).await;
        h.state.session.apply(&SessionEvent::Ready).await;
        assert_eq!(h.post_form(png_form("15551234567")).await.0, 200);
        assert!(h.uploaded_files().is_empty());
    }

    // ── Auth & health ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn token_guards_api_but_not_health() {
        let h = Harness::start(FakeClient::default(), Some("s3cret"), false).await;

        let resp = h.http.get(h.url("/get-qr")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 401);

        let resp = h
            .http
            .get(h.url("/get-qr"))
            .bearer_auth("s3cret")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 503);

        let resp = h.http.get(h.url("/get-qr?token=s3cret")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 503);

        let health: serde_json::Value = h
            .http
            .get(h.url("/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["client"], "fake");
        assert_eq!(health["phase"], "disconnected");
        assert_eq!(health["ready"], false);
    }
}
