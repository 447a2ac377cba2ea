//! Job workspaces and the stale temp-file sweeper.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-job scratch directory under the temp root. Removed by `cleanup`, or on
/// drop when the job future is abandoned.
#[derive(Debug)]
pub struct JobWorkspace {
    root: PathBuf,
    removed: bool,
}

impl JobWorkspace {
    pub async fn create(base: &Path, key: &str) -> io::Result<Self> {
        let root = base.join(format!("job_{key}"));
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Where the downloaded source is written.
    pub fn input_path(&self, file_name: Option<&str>, message_id: i32) -> PathBuf {
        let name = file_name
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("video_{message_id}.mp4"));
        self.root.join(name)
    }

    /// Encoded output always lands in an MP4 container next to the input.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        self.root.join(format!("encoded_{stem}.mp4"))
    }

    pub async fn cleanup(mut self) -> io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.removed = true;
        debug!(path = %self.root.display(), "workspace removed");
        Ok(())
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = std::fs::remove_dir_all(&self.root) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.root.display(), error = %e, "failed to remove workspace");
                }
            }
        }
    }
}

/// Keep platform file names usable as a single path component.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Remove entries directly under `dir` whose modification time is at least
/// `max_age` old. Returns how many were removed.
pub async fn sweep_stale_entries(dir: &Path, max_age: Duration) -> io::Result<usize> {
    let mut removed = 0;
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or(Duration::ZERO);
        if age < max_age {
            continue;
        }

        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale entry"),
        }
    }
    Ok(removed)
}

/// Periodically sweep `dir` until the returned handle is aborted.
pub fn spawn_sweeper(dir: PathBuf, max_age: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match sweep_stale_entries(&dir, max_age).await {
                Ok(0) => {}
                Ok(n) => info!(removed = n, dir = %dir.display(), "swept stale temp files"),
                Err(e) => warn!(error = %e, dir = %dir.display(), "temp sweep failed"),
            }
        }
    })
}
