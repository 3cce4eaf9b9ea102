//! 路由装配：上传、列表、存活检查与静态文件。

use axum::body::Body as AxumBody;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::catalog::{ImageLog, PdfCatalog};
use crate::http::{add_security_headers, build_cors_layer, request_client_ip};
use crate::storage::Storage;
use crate::upload::UploadConfig;
use crate::{files, health, upload};

/// Shared handles injected into every handler.
pub struct AppContext {
    pub storage: Arc<Storage>,
    pub images: Arc<dyn ImageLog>,
    pub pdfs: Arc<dyn PdfCatalog>,
    pub upload: Arc<UploadConfig>,
    pub public_dir: PathBuf,
}

pub fn build_router(ctx: AppContext, cors_origins: Option<&str>) -> Router {
    let static_files = ServeDir::new(&ctx.public_dir)
        .fallback(ServeDir::new(ctx.storage.image_dir()));
    let pdf_files = ServeDir::new(ctx.storage.pdf_dir());

    let mut app = Router::new()
        .route(
            "/image",
            post(upload::upload_image).layer(upload_body_limit(ctx.upload.max_size)),
        )
        .route(
            "/upload-pdf",
            post(upload::upload_pdf).layer(upload_body_limit(ctx.upload.max_size)),
        )
        .route("/images", get(files::list_images))
        .route("/all-pdfs", get(files::list_pdfs))
        .route("/multer-api", get(health::get_health))
        .nest_service("/pdf", pdf_files)
        .fallback_service(static_files)
        .layer(middleware::from_fn(add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<AxumBody>| {
                    let client_ip = request_client_ip(request)
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(ctx.storage))
        .layer(Extension(ctx.images))
        .layer(Extension(ctx.pdfs))
        .layer(Extension(ctx.upload));

    if let Some(cors_layer) = build_cors_layer(cors_origins) {
        app = app.layer(cors_layer);
    }

    app
}

/// `0` 表示不限制请求体大小。
fn upload_body_limit(max_size: u64) -> DefaultBodyLimit {
    match usize::try_from(max_size) {
        Ok(0) | Err(_) => DefaultBodyLimit::disable(),
        Ok(limit) => DefaultBodyLimit::max(limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{StatusCode, header};
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    use crate::background::sweep_staging_files;
    use crate::catalog::{DirectoryPdfCatalog, MemoryImageLog};

    const BOUNDARY: &str = "filedrop-test-boundary";

    struct TestApp {
        _temp: TempDir,
        storage: Arc<Storage>,
        router: Router,
    }

    struct Part<'a> {
        name: &'a str,
        filename: Option<&'a str>,
        content_type: Option<&'a str>,
        data: &'a [u8],
    }

    fn file_part<'a>(name: &'a str, filename: &'a str, content_type: &'a str, data: &'a [u8]) -> Part<'a> {
        Part {
            name,
            filename: Some(filename),
            content_type: Some(content_type),
            data,
        }
    }

    fn text_part<'a>(name: &'a str, value: &'a str) -> Part<'a> {
        Part {
            name,
            filename: None,
            content_type: None,
            data: value.as_bytes(),
        }
    }

    async fn make_app_with_limit(max_size: u64) -> TestApp {
        let temp = tempdir().expect("tempdir");
        let storage = Arc::new(Storage::new(temp.path().to_path_buf()));
        storage.ensure_layout().await.expect("init storage");
        let ctx = AppContext {
            storage: storage.clone(),
            images: Arc::new(MemoryImageLog::new()),
            pdfs: Arc::new(DirectoryPdfCatalog::new(storage.pdf_dir().to_path_buf())),
            upload: Arc::new(UploadConfig {
                max_size,
                staging_ttl: Duration::from_secs(60),
            }),
            public_dir: temp.path().join("public"),
        };
        TestApp {
            _temp: temp,
            storage,
            router: build_router(ctx, None),
        }
    }

    async fn make_app() -> TestApp {
        make_app_with_limit(0).await
    }

    fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<AxumBody> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
            if let Some(filename) = part.filename {
                disposition.push_str(&format!("; filename=\"{filename}\""));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(content_type) = part.content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(AxumBody::from(body))
            .expect("build request")
    }

    fn get_request(uri: &str) -> Request<AxumBody> {
        Request::get(uri).body(AxumBody::empty()).expect("build request")
    }

    async fn send(router: &Router, request: Request<AxumBody>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.expect("router call");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, bytes.to_vec())
    }

    async fn send_text(router: &Router, request: Request<AxumBody>) -> (StatusCode, String) {
        let (status, bytes) = send(router, request).await;
        (status, String::from_utf8(bytes).expect("utf8 body"))
    }

    async fn upload_image(app: &TestApp, fullname: &str, data: &[u8]) -> (StatusCode, String) {
        let request = multipart_request(
            "/image",
            &[
                file_part("image", "original.png", "image/png", data),
                text_part("fullname", fullname),
            ],
        );
        send_text(&app.router, request).await
    }

    fn dir_names(path: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(path)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn image_upload_is_listed_and_served() {
        let app = make_app().await;

        let (status, body) = upload_image(&app, "cat.png", b"png-bytes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<img src='/cat.png' />");

        let (status, listing) = send_text(&app.router, get_request("/images")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(listing.contains("<img width='200' src='/cat.png' /><br/>"));

        let (status, bytes) = send(&app.router, get_request("/cat.png")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"png-bytes");
        assert!(!dir_names(app.storage.image_dir()).iter().any(|n| n.contains(".tmp.")));
    }

    #[tokio::test]
    async fn fullname_may_precede_file_field() {
        let app = make_app().await;
        let request = multipart_request(
            "/image",
            &[
                text_part("fullname", "first.jpg"),
                file_part("image", "x.jpg", "image/jpeg", b"jpeg"),
            ],
        );
        let (status, _) = send_text(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            std::fs::read(app.storage.image_dir().join("first.jpg")).expect("read"),
            b"jpeg"
        );
    }

    #[tokio::test]
    async fn empty_image_listing_is_empty_html() {
        let app = make_app().await;
        let (status, body) = send_text(&app.router, get_request("/images")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "");
    }

    #[tokio::test]
    async fn duplicate_fullname_overwrites_file_and_lists_twice() {
        let app = make_app().await;

        let (status, _) = upload_image(&app, "dup.png", b"first").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = upload_image(&app, "dup.png", b"second").await;
        assert_eq!(status, StatusCode::OK);

        let (_, bytes) = send(&app.router, get_request("/dup.png")).await;
        assert_eq!(bytes, b"second");

        let (_, listing) = send_text(&app.router, get_request("/images")).await;
        assert_eq!(listing.matches("src='/dup.png'").count(), 2);
    }

    #[tokio::test]
    async fn failed_image_commit_is_server_error_and_not_logged() {
        let app = make_app().await;
        std::fs::create_dir(app.storage.image_dir().join("taken")).expect("create dir");

        let (status, body) = upload_image(&app, "taken", b"bytes").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "failed to store upload");

        let (_, listing) = send_text(&app.router, get_request("/images")).await;
        assert_eq!(listing, "");
        assert_eq!(dir_names(app.storage.image_dir()), ["pdf", "taken"]);
    }

    #[tokio::test]
    async fn image_upload_requires_file_and_name() {
        let app = make_app().await;

        let request = multipart_request("/image", &[text_part("fullname", "a.png")]);
        let (status, body) = send_text(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "No image uploaded.");

        let request = multipart_request(
            "/image",
            &[file_part("image", "a.png", "image/png", b"data")],
        );
        let (status, body) = send_text(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "fullname is required");
        assert_eq!(dir_names(app.storage.image_dir()), ["pdf"]);
    }

    #[tokio::test]
    async fn image_upload_rejects_traversal_name() {
        let app = make_app().await;
        let (status, body) = upload_image(&app, "../escape.png", b"data").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "invalid file name");
        assert_eq!(dir_names(app.storage.image_dir()), ["pdf"]);
        assert!(!app.storage.image_dir().join("../escape.png").exists());
    }

    #[tokio::test]
    async fn pdf_round_trip() {
        let app = make_app().await;
        let pdf = b"%PDF-1.7\n%binary\xff\xfe\n%%EOF";

        let request = multipart_request(
            "/upload-pdf",
            &[file_part("pdfFile", "report.pdf", "application/pdf", pdf)],
        );
        let (status, body) = send_text(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            r#"<p>PDF Uploaded: <a href="/pdf/report.pdf" target="_blank">report.pdf</a></p>"#
        );

        let (status, listing) = send_text(&app.router, get_request("/all-pdfs")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(listing.starts_with("<h2>Uploaded PDFs:</h2>"));
        assert!(listing.contains(r#"<a href="/pdf/report.pdf" target="_blank">report.pdf</a>"#));

        let (status, bytes) = send(&app.router, get_request("/pdf/report.pdf")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, pdf);
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected_before_writing() {
        let app = make_app().await;
        let request = multipart_request(
            "/upload-pdf",
            &[file_part("pdfFile", "photo.png", "image/png", b"png")],
        );
        let (status, body) = send_text(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Only PDF files allowed");
        assert!(dir_names(app.storage.pdf_dir()).is_empty());
    }

    #[tokio::test]
    async fn staging_shaped_names_are_refused_and_sweep_spares_uploads() {
        let app = make_app().await;

        let request = multipart_request(
            "/upload-pdf",
            &[file_part("pdfFile", ".report.tmp.pdf", "application/pdf", b"%PDF")],
        );
        let (status, body) = send_text(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "invalid file name");
        assert!(dir_names(app.storage.pdf_dir()).is_empty());

        let (status, _) = upload_image(&app, ".cat.tmp.png", b"png").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(dir_names(app.storage.image_dir()), ["pdf"]);

        let request = multipart_request(
            "/upload-pdf",
            &[file_part("pdfFile", "kept.pdf", "application/pdf", b"%PDF")],
        );
        let (status, _) = send_text(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = sweep_staging_files(app.storage.pdf_dir(), Duration::from_nanos(1))
            .await
            .expect("sweep");
        assert_eq!(removed, 0);

        let (_, listing) = send_text(&app.router, get_request("/all-pdfs")).await;
        assert!(listing.contains(r#"<a href="/pdf/kept.pdf" target="_blank">kept.pdf</a>"#));
        assert_eq!(dir_names(app.storage.pdf_dir()), ["kept.pdf"]);
    }

    #[tokio::test]
    async fn fullname_is_stored_verbatim() {
        let app = make_app().await;
        let (status, body) = upload_image(&app, " spaced.png", b"png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<img src='/ spaced.png' />");
        assert!(app.storage.image_dir().join(" spaced.png").exists());
        assert!(!app.storage.image_dir().join("spaced.png").exists());
    }

    #[tokio::test]
    async fn pdf_name_with_directories_keeps_basename() {
        let app = make_app().await;
        let request = multipart_request(
            "/upload-pdf",
            &[file_part("pdfFile", "docs/2024/report.pdf", "application/pdf", b"%PDF")],
        );
        let (status, body) = send_text(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"href="/pdf/report.pdf""#));
        assert_eq!(dir_names(app.storage.pdf_dir()), ["report.pdf"]);
    }

    #[tokio::test]
    async fn pdf_upload_without_file_is_client_error() {
        let app = make_app().await;
        let request = multipart_request("/upload-pdf", &[text_part("note", "hello")]);
        let (status, body) = send_text(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "No PDF uploaded.");
    }

    #[tokio::test]
    async fn pdf_listing_fails_cleanly_when_folder_missing() {
        let app = make_app().await;
        std::fs::remove_dir_all(app.storage.pdf_dir()).expect("remove pdf dir");

        let (status, body) = send_text(&app.router, get_request("/all-pdfs")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Unable to read PDF folder");
    }

    #[tokio::test]
    async fn health_is_constant() {
        let app = make_app().await;
        let expected = serde_json::json!({ "msg": "API is running..." });

        let (status, body) = send(&app.router, get_request("/multer-api")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json, expected);

        upload_image(&app, "x.png", b"x").await;
        let (_, body) = send(&app.router, get_request("/multer-api")).await;
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json, expected);
    }

    #[tokio::test]
    async fn missing_static_file_is_not_found() {
        let app = make_app().await;
        let response = app
            .router
            .clone()
            .oneshot(get_request("/nope.png"))
            .await
            .expect("router call");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS),
            Some(&header::HeaderValue::from_static("nosniff"))
        );
    }

    #[tokio::test]
    async fn upload_over_limit_is_rejected() {
        let app = make_app_with_limit(64).await;
        let data = vec![b'a'; 4096];
        let (status, _) = upload_image(&app, "big.png", &data).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!app.storage.image_dir().join("big.png").exists());
    }
}
