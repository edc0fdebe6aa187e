//! Outbound message endpoints: `/send-message` and `/send-media`.

use std::{path::PathBuf, sync::Arc};

use {
    axum::{
        Json,
        extract::{
            Multipart, State,
            multipart::{MultipartError, MultipartRejection},
            rejection::JsonRejection,
        },
        http::StatusCode,
    },
    serde::Deserialize,
    serde_json::Value,
    tracing::{debug, error, info, warn},
    wabridge_channels::{ChannelError, ChatId, MediaAttachment, OutboundMessage},
    wabridge_media::StoreError,
};

use crate::{error::ApiError, state::GatewayState};

const MESSAGE_FIELDS_REQUIRED: &str = "Phone number and message are required.";
const MEDIA_FIELDS_REQUIRED: &str = "Phone number and media file are required.";
const INVALID_PHONE: &str = "Invalid phone number.";
const INVALID_FILE_NAME: &str = "Invalid file name.";

/// JSON body of `/send-message`. Fields stay loosely typed so a missing or
/// mistyped field becomes a 400 instead of a deserializer rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub phone_number: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

/// Phone numbers may arrive as JSON strings or integers.
fn phone_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Strings are sent as-is; non-zero numbers and `true` are sent as text.
fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".into()),
        _ => None,
    }
}

fn send_error(what: &'static str, err: ChannelError) -> ApiError {
    match err {
        ChannelError::NotReady => ApiError::NotReady,
        ChannelError::NotFound(_) => ApiError::FileNotFound,
        ChannelError::InvalidRecipient(_) => ApiError::BadRequest(INVALID_PHONE),
        other => {
            error!(what, error = %other, "send failed");
            ApiError::SendFailed {
                what,
                reason: other.to_string(),
            }
        },
    }
}

pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, &'static str), ApiError> {
    if !state.session.is_ready() {
        return Err(ApiError::NotReady);
    }

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "unreadable send-message body");
            SendMessageRequest::default()
        },
    };
    let (Some(phone), Some(text)) = (
        phone_field(request.phone_number.as_ref()),
        text_field(request.message.as_ref()),
    ) else {
        return Err(ApiError::BadRequest(MESSAGE_FIELDS_REQUIRED));
    };

    let chat = ChatId::parse(&phone).map_err(|_| ApiError::BadRequest(INVALID_PHONE))?;

    let sent = state
        .client
        .send(&chat, OutboundMessage::Text(text))
        .await
        .map_err(|e| send_error("message", e))?;
    info!(to = %chat, group = chat.is_group(), id = ?sent.id, "message sent");
    Ok((StatusCode::OK, "Message sent successfully!"))
}

// ── Media ────────────────────────────────────────────────────────────────────

/// Where the attachment for `/send-media` comes from.
enum MediaSource {
    /// Bytes uploaded in this request's `file` part.
    Upload { original_name: String, bytes: Vec<u8> },
    /// A file already in the upload store, named by the `fileName` field.
    Stored(String),
}

#[derive(Default)]
struct MediaForm {
    phone_number: Option<String>,
    source: Option<MediaSource>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge;
    }
    debug!(error = %err, "unreadable multipart body");
    ApiError::BadRequest(MEDIA_FIELDS_REQUIRED)
}

async fn read_media_form(mut multipart: Multipart) -> Result<MediaForm, ApiError> {
    let mut form = MediaForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "phoneNumber" => {
                let value = field.text().await.map_err(multipart_error)?;
                form.phone_number = Some(value).filter(|v| !v.trim().is_empty());
            },
            "file" => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers submit an empty, unnamed part when no file was chosen.
                if original_name.is_empty() || bytes.is_empty() {
                    debug!("ignoring empty file part");
                    continue;
                }
                form.source = Some(MediaSource::Upload {
                    original_name,
                    bytes: bytes.to_vec(),
                });
            },
            "fileName" => {
                let name = field.text().await.map_err(multipart_error)?;
                let uploaded = matches!(form.source, Some(MediaSource::Upload { .. }));
                if !name.trim().is_empty() && !uploaded {
                    form.source = Some(MediaSource::Stored(name.trim().to_string()));
                }
            },
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

pub async fn send_media(
    State(state): State<Arc<GatewayState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, &'static str), ApiError> {
    // Checked before the body is read so nothing lands on disk.
    if !state.session.is_ready() {
        return Err(ApiError::NotReady);
    }

    let form = match multipart {
        Ok(multipart) => read_media_form(multipart).await?,
        Err(rejection) => {
            debug!(error = %rejection, "send-media body is not multipart");
            MediaForm::default()
        },
    };
    let (Some(phone), Some(source)) = (form.phone_number, form.source) else {
        return Err(ApiError::BadRequest(MEDIA_FIELDS_REQUIRED));
    };
    let chat = ChatId::parse(&phone).map_err(|_| ApiError::BadRequest(INVALID_PHONE))?;

    let (file_name, path): (String, PathBuf) = match source {
        MediaSource::Upload {
            original_name,
            bytes,
        } => {
            let stored = state
                .uploads
                .save(&original_name, &bytes)
                .await
                .map_err(|e| {
                    error!(error = %e, "failed to store upload");
                    ApiError::Internal
                })?;
            debug!(
                file = %stored.file_name,
                original = %stored.original_name,
                size = stored.size,
                "upload accepted for sending"
            );
            (stored.file_name, stored.path)
        },
        MediaSource::Stored(name) => {
            let path = state
                .uploads
                .resolve(&name)
                .map_err(|_| ApiError::BadRequest(INVALID_FILE_NAME))?;
            (name, path)
        },
    };

    let present = state.uploads.contains(&file_name).await.map_err(|e| {
        error!(file = %file_name, error = %e, "failed to check media file");
        ApiError::Internal
    })?;
    if !present {
        warn!(file = %file_name, "media file not found");
        return Err(ApiError::FileNotFound);
    }

    let media = MediaAttachment::from_file_path(&path)
        .await
        .map_err(|e| send_error("media", e))?;
    let (mime_type, size) = (media.mime_type.clone(), media.size());

    let sent = state
        .client
        .send(&chat, OutboundMessage::Media(media))
        .await
        .map_err(|e| send_error("media", e))?;
    info!(to = %chat, file = %file_name, mime = %mime_type, size, id = ?sent.id, "media sent");

    if state.delete_after_send {
        match state.uploads.remove(&file_name).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {},
            Err(e) => warn!(file = %file_name, error = %e, "failed to remove sent upload"),
        }
    }

    Ok((StatusCode::OK, "Media sent successfully!"))
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn phone_field_accepts_strings_and_integers() {
        assert_eq!(phone_field(Some(&json!("15551234567"))).as_deref(), Some("15551234567"));
        assert_eq!(phone_field(Some(&json!(15551234567u64))).as_deref(), Some("15551234567"));
        assert_eq!(phone_field(Some(&json!(""))), None);
        assert_eq!(phone_field(Some(&json!("   "))), None);
        assert_eq!(phone_field(Some(&json!(1.5))), None);
        assert_eq!(phone_field(Some(&json!(null))), None);
        assert_eq!(phone_field(None), None);
    }

    #[test]
    fn text_field_accepts_truthy_scalars() {
        assert_eq!(text_field(Some(&json!("hi"))).as_deref(), Some("hi"));
        assert_eq!(text_field(Some(&json!(42))).as_deref(), Some("42"));
        assert_eq!(text_field(Some(&json!(1.5))).as_deref(), Some("1.5"));
        assert_eq!(text_field(Some(&json!(true))).as_deref(), Some("true"));
        assert_eq!(text_field(Some(&json!(""))), None);
        assert_eq!(text_field(Some(&json!(0))), None);
        assert_eq!(text_field(Some(&json!(false))), None);
        assert_eq!(text_field(Some(&json!(null))), None);
        assert_eq!(text_field(Some(&json!(["hi"]))), None);
    }

    #[test]
    fn send_errors_map_to_statuses() {
        assert!(matches!(send_error("message", ChannelError::NotReady), ApiError::NotReady));
        assert!(matches!(
            send_error("media", ChannelError::NotFound(PathBuf::from("x"))),
            ApiError::FileNotFound
        ));
        let err = send_error("message", ChannelError::Send("boom".into()));
        assert_eq!(err.to_string(), "Failed to send the message: boom");
    }
}
