use std::path::Path;

use {serde::Serialize, wabridge_media::mime};

use crate::error::ChannelError;

/// How WhatsApp presents an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        match mime_type.split('/').next().unwrap_or_default() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Document,
        }
    }
}

/// A local file's bytes bound to its MIME type, ready to attach to an
/// outbound message.
#[derive(Clone)]
pub struct MediaAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for MediaAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaAttachment")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl MediaAttachment {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read a file from disk and detect its MIME type.
    pub async fn from_file_path(path: &Path) -> Result<Self, ChannelError> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChannelError::NotFound(path.to_path_buf()));
            },
            Err(e) => return Err(e.into()),
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let mime_type = mime::detect(path, &data);
        Ok(Self::new(file_name, mime_type, data))
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }

    /// Attachment size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("audio/ogg"), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Document);
        assert_eq!(MediaKind::from_mime(""), MediaKind::Document);
    }

    #[tokio::test]
    async fn from_file_path_reads_bytes_and_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1700000000000.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nrest").unwrap();

        let media = MediaAttachment::from_file_path(&path).await.unwrap();
        assert_eq!(media.file_name, "1700000000000.png");
        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.kind(), MediaKind::Image);
        assert_eq!(media.size(), 12);
    }

    #[tokio::test]
    async fn from_file_path_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = MediaAttachment::from_file_path(&dir.path().join("nope.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotFound(_)));
    }
}
