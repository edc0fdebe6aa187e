use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use {
    tokio::sync::RwLock,
    tracing::{error, info, warn},
    wabridge_channels::{MessagingClient, SessionEvent, SessionPhase},
    wabridge_media::UploadStore,
};

use crate::auth::ResolvedAuth;

// ── Session mirror ───────────────────────────────────────────────────────────

/// A login code waiting to be scanned.
#[derive(Debug, Clone)]
pub struct PendingQr {
    pub code: String,
    pub received_at: Instant,
}

/// What the HTTP layer knows about the messaging session, fed by lifecycle
/// events. `ready` always reflects the most recent event.
pub struct SessionState {
    ready: AtomicBool,
    phase: RwLock<SessionPhase>,
    pending_qr: RwLock<Option<PendingQr>>,
    qr_ttl: Duration,
}

impl SessionState {
    pub fn new(qr_ttl: Duration) -> Self {
        Self {
            ready: AtomicBool::new(false),
            phase: RwLock::new(SessionPhase::default()),
            pending_qr: RwLock::new(None),
            qr_ttl,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub async fn phase(&self) -> SessionPhase {
        *self.phase.read().await
    }

    /// The pending login code, unless it is older than the QR TTL.
    pub async fn pending_qr(&self) -> Option<String> {
        self.pending_qr
            .read()
            .await
            .as_ref()
            .filter(|qr| qr.received_at.elapsed() < self.qr_ttl)
            .map(|qr| qr.code.clone())
    }

    pub async fn apply(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Qr(code) => {
                info!("QR code generated. Ready for scanning.");
                *self.pending_qr.write().await = Some(PendingQr {
                    code: code.clone(),
                    received_at: Instant::now(),
                });
                self.ready.store(false, Ordering::Release);
            },
            SessionEvent::Authenticated => {
                info!("WhatsApp client authenticated successfully");
                *self.pending_qr.write().await = None;
            },
            SessionEvent::AuthFailure(reason) => {
                error!(reason = %reason, "WhatsApp authentication failure");
                self.ready.store(false, Ordering::Release);
            },
            SessionEvent::Ready => {
                info!("WhatsApp client is ready");
                *self.pending_qr.write().await = None;
                self.ready.store(true, Ordering::Release);
            },
            SessionEvent::Disconnected(reason) => {
                warn!(reason = %reason, "WhatsApp client was disconnected");
                self.ready.store(false, Ordering::Release);
            },
        }
        let mut phase = self.phase.write().await;
        *phase = phase.after(event);
    }

    /// Adopt a phase read straight from the client, used when events may
    /// have been missed.
    pub async fn sync_phase(&self, phase: SessionPhase) {
        self.ready.store(phase.is_ready(), Ordering::Release);
        if phase != SessionPhase::QrPending {
            *self.pending_qr.write().await = None;
        }
        *self.phase.write().await = phase;
    }
}

// ── Gateway state ────────────────────────────────────────────────────────────

/// Shared gateway runtime state, wrapped in Arc for use across handlers.
pub struct GatewayState {
    pub session: SessionState,
    /// The messaging client every send goes through.
    pub client: Arc<dyn MessagingClient>,
    pub uploads: UploadStore,
    pub auth: ResolvedAuth,
    /// Remove an uploaded file once it was sent.
    pub delete_after_send: bool,
    /// Maximum request body size for uploads.
    pub max_upload_bytes: usize,
    /// Server version string.
    pub version: String,
    pub hostname: String,
    pub started_at: Instant,
}

/// Knobs for [`GatewayState::new`] that come from configuration.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub qr_ttl: Duration,
    pub delete_after_send: bool,
    pub max_upload_bytes: usize,
}

impl From<&wabridge_config::BridgeConfig> for GatewayOptions {
    fn from(config: &wabridge_config::BridgeConfig) -> Self {
        Self {
            qr_ttl: Duration::from_secs(config.whatsapp.qr_ttl_secs),
            delete_after_send: config.uploads.delete_after_send,
            max_upload_bytes: config.uploads.max_bytes,
        }
    }
}

impl GatewayState {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        uploads: UploadStore,
        auth: ResolvedAuth,
        options: GatewayOptions,
    ) -> Arc<Self> {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".into());

        Arc::new(Self {
            session: SessionState::new(options.qr_ttl),
            client,
            uploads,
            auth,
            delete_after_send: options.delete_after_send,
            max_upload_bytes: options.max_upload_bytes,
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname,
            started_at: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn qr_then_ready_then_disconnect() {
        let state = SessionState::new(Duration::from_secs(60));
        assert!(!state.is_ready());
        assert_eq!(state.pending_qr().await, None);

        state.apply(&SessionEvent::Qr("2@first".into())).await;
        state.apply(&SessionEvent::Qr("2@second".into())).await;
        assert_eq!(state.pending_qr().await.as_deref(), Some("2@second"));
        assert_eq!(state.phase().await, SessionPhase::QrPending);

        state.apply(&SessionEvent::Authenticated).await;
        assert_eq!(state.pending_qr().await, None);
        assert!(!state.is_ready());

        state.apply(&SessionEvent::Ready).await;
        assert!(state.is_ready());

        state.apply(&SessionEvent::Disconnected("NAVIGATION".into())).await;
        assert!(!state.is_ready());
        assert_eq!(state.phase().await, SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn auth_failure_clears_ready() {
        let state = SessionState::new(Duration::from_secs(60));
        state.apply(&SessionEvent::Ready).await;
        state.apply(&SessionEvent::AuthFailure("restore failed".into())).await;
        assert!(!state.is_ready());
        assert_eq!(state.phase().await, SessionPhase::AuthFailed);
    }

    #[tokio::test]
    async fn stale_qr_is_not_served() {
        let state = SessionState::new(Duration::ZERO);
        state.apply(&SessionEvent::Qr("2@old".into())).await;
        assert_eq!(state.pending_qr().await, None);
    }

    #[tokio::test]
    async fn sync_phase_resets_mirror() {
        let state = SessionState::new(Duration::from_secs(60));
        state.apply(&SessionEvent::Qr("2@code".into())).await;

        state.sync_phase(SessionPhase::Ready).await;
        assert!(state.is_ready());
        assert_eq!(state.pending_qr().await, None);

        state.sync_phase(SessionPhase::Disconnected).await;
        assert!(!state.is_ready());
    }
}
