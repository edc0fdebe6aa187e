//! Keeps [`SessionState`](crate::state::SessionState) in step with the
//! messaging client's lifecycle notifications.

use std::sync::Arc;

use {
    tokio::{sync::broadcast::error::RecvError, task::JoinHandle},
    tracing::{debug, warn},
    wabridge_channels::SessionEvent,
    wabridge_whatsapp::qr,
};

use crate::state::GatewayState;

/// Subscribe to the client's notifier and mirror every event into the
/// gateway state. With `print_qr`, each new login code is also drawn on
/// stderr.
pub fn spawn_session_pump(state: Arc<GatewayState>, print_qr: bool) -> JoinHandle<()> {
    // Subscribe before reading the phase so no transition falls in between.
    let mut events = state.client.notifier().subscribe();

    tokio::spawn(async move {
        state.session.sync_phase(state.client.phase()).await;
        loop {
            match events.recv().await {
                Ok(event) => {
                    if print_qr && let SessionEvent::Qr(code) = &event {
                        print_terminal_qr(code);
                    }
                    state.session.apply(&event).await;
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session events lagged, resyncing phase");
                    state.session.sync_phase(state.client.phase()).await;
                },
                Err(RecvError::Closed) => {
                    debug!("session notifier closed");
                    break;
                },
            }
        }
    })
}

fn print_terminal_qr(code: &str) {
    match qr::render_terminal(code) {
        Ok(rendered) => {
            eprintln!();
            eprintln!("Scan the QR code to log in (WhatsApp > Linked devices):");
            eprintln!("{rendered}");
        },
        Err(e) => warn!(error = %e, "failed to render login QR in terminal"),
    }
}
