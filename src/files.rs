//! 已上传图片与 PDF 的列表处理器。

use axum::extract::Extension;
use axum::response::Html;
use std::sync::Arc;
use tracing::{debug, error};

use crate::catalog::{ImageLog, PdfCatalog};
use crate::error::ApiError;
use crate::render;

/// 按上传顺序列出本进程内记录的图片。
pub async fn list_images(
    Extension(images): Extension<Arc<dyn ImageLog>>,
) -> Result<Html<String>, ApiError> {
    let records = images.list().await?;
    debug!(count = records.len(), "list images");
    Ok(Html(render::image_list(&records)?))
}

/// 扫描 PDF 目录并列出全部文件。
pub async fn list_pdfs(
    Extension(pdfs): Extension<Arc<dyn PdfCatalog>>,
) -> Result<Html<String>, ApiError> {
    let names = match pdfs.list().await {
        Ok(names) => names,
        Err(err) => {
            error!(error = ?err, "failed to read pdf folder");
            return Err(ApiError::Internal("Unable to read PDF folder".into()));
        }
    };
    debug!(count = names.len(), "list pdfs");
    Ok(Html(render::pdf_list(&names)?))
}
