//! 图片与 PDF 的 multipart 上传处理器。

use axum::extract::multipart::Field;
use axum::extract::{Extension, Multipart};
use axum::response::Html;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::atomic::StagedFile;
use crate::catalog::{ImageLog, ImageRecord, PdfCatalog};
use crate::config::{FULLNAME_FIELD, IMAGE_FIELD, PDF_FIELD, PDF_MIME};
use crate::error::ApiError;
use crate::render;
use crate::storage::Storage;

const STORE_FAILED: &str = "failed to store upload";

#[derive(Debug)]
pub struct UploadConfig {
    pub max_size: u64,
    pub staging_ttl: Duration,
}

/// 接收图片并以 `fullname` 命名保存，成功后写入图片日志。
pub async fn upload_image(
    Extension(storage): Extension<Arc<Storage>>,
    Extension(images): Extension<Arc<dyn ImageLog>>,
    mut multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let mut staged: Option<StagedFile> = None;
    let mut fullname: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field.file_name().is_some();
        match name.as_str() {
            IMAGE_FIELD if is_file => {
                if staged.is_some() {
                    return Err(ApiError::BadRequest("Unexpected field".into()));
                }
                let hint = field.file_name().unwrap_or_default().to_string();
                staged = Some(stage_field(storage.image_dir(), &hint, field).await?);
            }
            FULLNAME_FIELD if !is_file => {
                fullname = Some(field.text().await?);
            }
            _ if is_file => {
                warn!(field = name, "unexpected file field in image upload");
                return Err(ApiError::BadRequest("Unexpected field".into()));
            }
            _ => continue,
        }
    }

    let Some(staged) = staged else {
        warn!("image upload without file");
        return Err(ApiError::BadRequest("No image uploaded.".into()));
    };
    let fullname = fullname
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest("fullname is required".into()))?;
    let target = storage.resolve_image(&fullname)?;

    let size = staged.written();
    if let Err(err) = staged.commit(&target).await {
        error!(name = fullname, error = %err, "failed to commit image upload");
        return Err(ApiError::Internal(STORE_FAILED.into()));
    }
    images
        .append(ImageRecord {
            name: fullname.clone(),
        })
        .await?;

    info!(name = fullname, size, "image uploaded");
    Ok(Html(render::image_tag(&fullname)?))
}

/// 接收 PDF，按原始文件名保存；非 PDF 在写盘前拒绝。
pub async fn upload_pdf(
    Extension(storage): Extension<Arc<Storage>>,
    Extension(pdfs): Extension<Arc<dyn PdfCatalog>>,
    mut multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let mut upload: Option<(String, StagedFile)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let Some(original) = field.file_name().map(original_basename) else {
            continue;
        };
        if name != PDF_FIELD || upload.is_some() {
            warn!(field = name, "unexpected file field in pdf upload");
            return Err(ApiError::BadRequest("Unexpected field".into()));
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_pdf_content_type(&content_type) {
            warn!(file = original, content_type, "rejected non-pdf upload");
            return Err(ApiError::BadRequest("Only PDF files allowed".into()));
        }
        storage.resolve_pdf(&original)?;
        let staged = stage_field(storage.pdf_dir(), &original, field).await?;
        upload = Some((original, staged));
    }

    let Some((original, staged)) = upload else {
        warn!("pdf upload without file");
        return Err(ApiError::BadRequest("No PDF uploaded.".into()));
    };
    let target = storage.resolve_pdf(&original)?;

    let size = staged.written();
    if let Err(err) = staged.commit(&target).await {
        error!(name = original, error = %err, "failed to commit pdf upload");
        return Err(ApiError::Internal(STORE_FAILED.into()));
    }
    pdfs.register(&original).await?;

    info!(name = original, size, "pdf uploaded");
    Ok(Html(render::pdf_link(&original)?))
}

/// 将 multipart 字段流式写入暂存文件。
async fn stage_field(dir: &Path, hint: &str, mut field: Field<'_>) -> Result<StagedFile, ApiError> {
    let mut staged = StagedFile::create(dir, hint).await.map_err(|err| {
        error!(dir = ?dir, error = %err, "failed to create staging file");
        ApiError::Internal(STORE_FAILED.into())
    })?;
    while let Some(chunk) = field.chunk().await? {
        if chunk.is_empty() {
            continue;
        }
        staged.write_all(&chunk).await.map_err(|err| {
            error!(path = ?staged.temp_path(), error = %err, "failed to write staging file");
            ApiError::Internal(STORE_FAILED.into())
        })?;
    }
    Ok(staged)
}

/// 取客户端文件名的最后一段（兼容带目录的文件名）。
fn original_basename(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}

/// 比较 MIME 主体部分（忽略参数与大小写）。
fn is_pdf_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case(PDF_MIME))
}
