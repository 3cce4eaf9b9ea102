use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::atomic::is_staging_name;
use crate::config::{PDF_SUBDIR, UPLOADS_DIR};

/// On-disk layout: images at `<root>/uploads`, PDFs at `<root>/uploads/pdf`.
#[derive(Clone, Debug)]
pub struct Storage {
    image_dir: PathBuf,
    pdf_dir: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        let image_dir = root.join(UPLOADS_DIR);
        let pdf_dir = image_dir.join(PDF_SUBDIR);
        Self { image_dir, pdf_dir }
    }

    /// Creates both upload directories. Existing directories and files are left alone.
    pub async fn ensure_layout(&self) -> io::Result<()> {
        fs::create_dir_all(&self.image_dir).await?;
        fs::create_dir_all(&self.pdf_dir).await
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn pdf_dir(&self) -> &Path {
        &self.pdf_dir
    }

    pub fn resolve_image(&self, name: &str) -> Result<PathBuf, StorageError> {
        resolve_entry(&self.image_dir, name)
    }

    pub fn resolve_pdf(&self, name: &str) -> Result<PathBuf, StorageError> {
        resolve_entry(&self.pdf_dir, name)
    }
}

/// Joins `name` onto `dir`, accepting only a single plain path segment.
/// Names shaped like staging files are refused so the sweep never touches them.
fn resolve_entry(dir: &Path, name: &str) -> Result<PathBuf, StorageError> {
    if name.is_empty() || name.contains(['/', '\\', '\0']) || is_staging_name(name) {
        return Err(StorageError::InvalidPath);
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) => Ok(dir.join(segment)),
        _ => Err(StorageError::InvalidPath),
    }
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}
