use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Every way an API request can fail. The `Display` text is the response
/// body, so it is written for the caller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("Unauthorized.")]
    Unauthorized,

    #[error("WhatsApp client not ready. Please try again later.")]
    NotReady,

    #[error("File not found.")]
    FileNotFound,

    #[error("Upload exceeds the maximum allowed size.")]
    PayloadTooLarge,

    #[error("QR code not available yet, please try again.")]
    QrUnavailable,

    #[error("Error generating QR code image.")]
    QrRender,

    /// The messaging client rejected a send. The library's own message is
    /// passed through to the caller.
    #[error("Failed to send the {what}: {reason}")]
    SendFailed { what: &'static str, reason: String },

    #[error("Internal server error.")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotReady | Self::QrUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::FileNotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::QrRender | Self::SendFailed { .. } | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
