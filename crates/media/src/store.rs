use std::{
    io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use {
    tokio::io::{AsyncWrite, AsyncWriteExt},
    tracing::{debug, info, warn},
};

/// Same-millisecond uploads get a `-N` suffix; give up after this many.
const MAX_NAME_ATTEMPTS: u32 = 64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid file name `{0}`")]
    InvalidName(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A file written by [`UploadStore::save`].
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Name inside the store, `<epoch-millis><ext>`.
    pub file_name: String,
    pub path: PathBuf,
    /// Name the client uploaded the file under.
    pub original_name: String,
    pub size: u64,
}

/// Flat directory of uploaded media files.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// `.ext` of the uploaded name, kept only when it is short and alphanumeric.
fn safe_extension(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 16 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Write and flush `bytes`; on failure remove the partial file at `path`.
async fn write_or_discard<W>(writer: &mut W, path: &Path, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match writer.write_all(bytes).await {
        Ok(()) => writer.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(rm) = tokio::fs::remove_file(path).await
            && rm.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %rm, "failed to remove partial upload");
        }
        return Err(e);
    }
    Ok(())
}

impl UploadStore {
    /// Open the store, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a timestamp-derived name that keeps the original
    /// extension. Never overwrites an existing file.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredUpload, StoreError> {
        let ext = safe_extension(original_name);
        let stamp = now_ms();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = if attempt == 0 {
                format!("{stamp}{ext}")
            } else {
                format!("{stamp}-{attempt}{ext}")
            };
            let path = self.dir.join(&file_name);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            write_or_discard(&mut file, &path, bytes).await?;

            info!(
                file = %file_name,
                original = %original_name,
                size = bytes.len(),
                "stored upload"
            );
            return Ok(StoredUpload {
                file_name,
                path,
                original_name: original_name.to_string(),
                size: bytes.len() as u64,
            });
        }

        Err(StoreError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free upload name for timestamp {stamp}"),
        )))
    }

    /// Map a stored file name to its path. Only bare names are accepted, so a
    /// caller cannot reach outside the store directory.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf, StoreError> {
        let candidate = Path::new(file_name);
        let is_bare = !file_name.is_empty()
            && !file_name.contains(['/', '\\'])
            && candidate.file_name().and_then(|n| n.to_str()) == Some(file_name);
        if !is_bare {
            return Err(StoreError::InvalidName(file_name.to_string()));
        }
        Ok(self.dir.join(file_name))
    }

    /// Whether a stored file with this name is present on disk.
    pub async fn contains(&self, file_name: &str) -> Result<bool, StoreError> {
        let path = self.resolve(file_name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    pub async fn remove(&self, file_name: &str) -> Result<(), StoreError> {
        let path = self.resolve(file_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(file = %file_name, "removed upload");
                Ok(())
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(file_name.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }
}
