use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("messaging client is not ready")]
    NotReady,

    #[error("invalid recipient `{0}`")]
    InvalidRecipient(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The underlying client rejected the operation; carries its message.
    #[error("{0}")]
    Send(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    pub fn send(err: impl std::fmt::Display) -> Self {
        Self::Send(err.to_string())
    }
}
