//! 清理遗留暂存文件的后台任务。

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{info, warn};

use crate::atomic::is_staging_name;
use crate::config::STAGING_CLEAN_INTERVAL_SECS;
use crate::storage::Storage;
use crate::upload::UploadConfig;

/// 启动后台任务（周期性清理暂存文件）。
pub fn spawn_background_tasks(storage: Arc<Storage>, upload: Arc<UploadConfig>) {
    if upload.staging_ttl.is_zero() {
        return;
    }

    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(STAGING_CLEAN_INTERVAL_SECS));
        loop {
            interval.tick().await;
            for dir in [storage.image_dir(), storage.pdf_dir()] {
                if let Err(err) = sweep_staging_files(dir, upload.staging_ttl).await {
                    warn!(dir = ?dir, error = %err, "staging cleanup failed");
                }
            }
        }
    });
}

/// 删除 `dir` 中超过 `ttl` 的暂存文件，返回删除数量。
pub async fn sweep_staging_files(dir: &Path, ttl: Duration) -> Result<usize, std::io::Error> {
    if ttl.is_zero() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !is_staging_name(&name.to_string_lossy()) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let Ok(age) = now.duration_since(modified) else {
            continue;
        };
        if age < ttl {
            continue;
        }

        let path = entry.path();
        if let Err(err) = fs::remove_file(&path).await {
            warn!(path = ?path, error = %err, "failed to remove stale staging file");
        } else {
            info!(path = ?path, "removed stale staging file");
            removed += 1;
        }
    }

    Ok(removed)
}
