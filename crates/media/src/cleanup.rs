use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use {
    anyhow::Result,
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

/// Delete regular files in `dir` whose modification time is at least
/// `max_age` old. Returns how many files were removed.
pub async fn sweep(dir: &Path, max_age: Duration) -> Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "skipping unreadable upload");
                continue;
            },
        };
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!(path = %entry.path().display(), age_secs = age.as_secs(), "expired upload removed");
                removed += 1;
            },
            Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove expired upload"),
        }
    }

    Ok(removed)
}

/// Run [`sweep`] every `every` until the task is aborted.
pub fn spawn_retention_task(dir: PathBuf, max_age: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match sweep(&dir, max_age).await {
                Ok(0) => {},
                Ok(n) => info!(removed = n, dir = %dir.display(), "upload retention sweep"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "upload retention sweep failed"),
            }
        }
    })
}
