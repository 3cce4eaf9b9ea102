//! 上传暂存文件：写入目标目录内的临时文件，提交时原子重命名。

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const STAGING_MARKER: &str = ".tmp.";

/// 判断文件名是否为暂存文件。
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with('.') && name.contains(STAGING_MARKER)
}

/// 目标目录内的暂存文件；未提交即被丢弃时自动删除。
#[derive(Debug)]
pub struct StagedFile {
    temp_path: PathBuf,
    file: Option<File>,
    written: u64,
    committed: bool,
}

impl StagedFile {
    /// 在 `dir` 中创建暂存文件，`hint` 仅用于辅助排查。
    pub async fn create(dir: &Path, hint: &str) -> io::Result<Self> {
        let base: String = hint
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
            .take(64)
            .collect();
        let base = if base.is_empty() { "upload".to_string() } else { base };
        let temp_path = dir.join(format!(".{base}{STAGING_MARKER}{}", Uuid::new_v4()));
        let file = File::create(&temp_path).await?;
        Ok(Self {
            temp_path,
            file: Some(file),
            written: 0,
            committed: false,
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write_all(&mut self, chunk: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("staged file already closed"))?;
        file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// 同步数据并重命名到 `target`，同名文件会被覆盖。
    pub async fn commit(mut self, target: &Path) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        if let Err(err) = fs::rename(&self.temp_path, target).await {
            #[cfg(windows)]
            {
                if fs::remove_file(target).await.is_ok() {
                    fs::rename(&self.temp_path, target).await?;
                    self.committed = true;
                    return Ok(());
                }
            }
            return Err(err);
        }

        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            drop(self.file.take());
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}
