use std::{path::Path, time::Duration};

use {anyhow::Result, clap::Subcommand, wabridge_media::cleanup};

#[derive(Subcommand)]
pub enum UploadsAction {
    /// List files waiting in the uploads directory.
    List,
    /// Delete uploads older than the retention window.
    Sweep {
        /// Override `uploads.retention_secs` (0 deletes everything).
        /// Without it, a configured retention of 0 leaves uploads alone.
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

pub async fn handle_uploads(action: UploadsAction) -> Result<()> {
    let config = crate::load_config(None)?;
    let dir = config.uploads.dir.as_path();
    match action {
        UploadsAction::List => list(dir).await,
        UploadsAction::Sweep { max_age_secs } => {
            sweep(dir, max_age_secs, config.uploads.retention_secs).await?;
            Ok(())
        },
    }
}

async fn list(dir: &Path) -> Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No uploads directory at {}.", dir.display());
            return Ok(());
        },
        Err(e) => return Err(e.into()),
    };

    let mut rows = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if meta.is_file() {
            rows.push((entry.file_name().to_string_lossy().into_owned(), meta.len()));
        }
    }
    if rows.is_empty() {
        println!("No uploads in {}.", dir.display());
        return Ok(());
    }
    rows.sort();
    println!("{:<40} {:>12}", "FILE", "BYTES");
    for (name, size) in &rows {
        println!("{name:<40} {size:>12}");
    }
    Ok(())
}

/// Returns how many files were removed.
async fn sweep(dir: &Path, max_age_secs: Option<u64>, retention_secs: u64) -> Result<usize> {
    let max_age = match max_age_secs {
        Some(secs) => secs,
        None if retention_secs == 0 => {
            println!("Upload retention is disabled (uploads.retention_secs = 0); nothing removed.");
            return Ok(0);
        },
        None => retention_secs,
    };
    let removed = cleanup::sweep(dir, Duration::from_secs(max_age)).await?;
    println!("Removed {removed} upload(s) from {}.", dir.display());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_with_upload() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1700000000000.png"), b"png").unwrap();
        dir
    }

    #[tokio::test]
    async fn disabled_retention_keeps_uploads() {
        let dir = dir_with_upload();
        assert_eq!(sweep(dir.path(), None, 0).await.unwrap(), 0);
        assert!(dir.path().join("1700000000000.png").exists());
    }

    #[tokio::test]
    async fn explicit_zero_age_removes_everything() {
        let dir = dir_with_upload();
        assert_eq!(sweep(dir.path(), Some(0), 0).await.unwrap(), 1);
        assert!(!dir.path().join("1700000000000.png").exists());
    }

    #[tokio::test]
    async fn configured_retention_keeps_fresh_uploads() {
        let dir = dir_with_upload();
        assert_eq!(sweep(dir.path(), None, 3600).await.unwrap(), 0);
        assert!(dir.path().join("1700000000000.png").exists());
    }
}
