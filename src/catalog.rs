//! 已上传文件的记录：图片日志（内存）与 PDF 目录（目录扫描）。

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

use crate::atomic::is_staging_name;
use crate::storage::StorageError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRecord {
    pub name: String,
}

/// Ordered log of committed image names.
#[async_trait]
pub trait ImageLog: Send + Sync {
    async fn append(&self, record: ImageRecord) -> Result<(), StorageError>;
    async fn list(&self) -> Result<Vec<ImageRecord>, StorageError>;
}

/// 进程内图片日志，重启后清空。
#[derive(Debug, Default)]
pub struct MemoryImageLog {
    records: Mutex<Vec<ImageRecord>>,
}

impl MemoryImageLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageLog for MemoryImageLog {
    async fn append(&self, record: ImageRecord) -> Result<(), StorageError> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ImageRecord>, StorageError> {
        Ok(self.records.lock().await.clone())
    }
}

/// Source of truth for which PDFs exist.
#[async_trait]
pub trait PdfCatalog: Send + Sync {
    /// Called after a PDF has been committed to disk.
    async fn register(&self, name: &str) -> Result<(), StorageError>;
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}

/// 每次调用都重新读取 PDF 目录，不做缓存。
#[derive(Debug)]
pub struct DirectoryPdfCatalog {
    dir: PathBuf,
}

impl DirectoryPdfCatalog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl PdfCatalog for DirectoryPdfCatalog {
    /// 目录本身即索引，提交后的文件已可被列出。
    async fn register(&self, _name: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut dir = fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_staging_name(&name) {
                continue;
            }
            names.push(name);
        }
        Ok(names)
    }
}
