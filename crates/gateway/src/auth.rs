use std::sync::Arc;

use {
    axum::{
        extract::{Request, State},
        http::{HeaderMap, Uri, header::AUTHORIZATION},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    tracing::warn,
};

use crate::{error::ApiError, state::GatewayState};

// ── Types ────────────────────────────────────────────────────────────────────

/// Resolved API auth configuration.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAuth {
    /// `None` leaves the API open.
    pub token: Option<String>,
}

/// Result of an authentication attempt.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub ok: bool,
    pub reason: Option<&'static str>,
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Constant-time string comparison (prevents timing attacks).
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim().to_string())
}

fn query_token(uri: &Uri) -> Option<String> {
    uri.query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}

// ── Auth logic ───────────────────────────────────────────────────────────────

pub fn resolve_auth(token: Option<String>) -> ResolvedAuth {
    ResolvedAuth {
        token: token.filter(|t| !t.is_empty()),
    }
}

pub fn authorize(auth: &ResolvedAuth, provided: Option<&str>) -> AuthResult {
    let Some(expected) = auth.token.as_deref() else {
        return AuthResult {
            ok: true,
            reason: None,
        };
    };
    let Some(given) = provided else {
        return AuthResult {
            ok: false,
            reason: Some("token_missing"),
        };
    };
    if !safe_equal(given, expected) {
        return AuthResult {
            ok: false,
            reason: Some("token_mismatch"),
        };
    }
    AuthResult {
        ok: true,
        reason: None,
    }
}

/// Route layer rejecting requests without the configured token.
pub async fn require_auth(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = bearer_token(request.headers()).or_else(|| query_token(request.uri()));
    let result = authorize(&state.auth, provided.as_deref());
    if !result.ok {
        warn!(
            path = %request.uri().path(),
            reason = result.reason.unwrap_or("unknown"),
            "rejected unauthenticated request"
        );
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}
