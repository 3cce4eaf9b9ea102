//! filedrop server binary.
//!
//! Accepts image and PDF uploads over multipart forms, stores them under
//! `<root>/uploads`, and serves HTML fragments that reference the stored
//! files. The main entry point prepares the storage layout, builds the Axum
//! router, and runs the HTTP listener until shutdown.

mod atomic;
mod background;
mod catalog;
mod config;
mod error;
mod files;
mod health;
mod http;
mod logging;
mod render;
mod routes;
mod storage;
mod upload;

use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use crate::background::spawn_background_tasks;
use crate::catalog::{DirectoryPdfCatalog, ImageLog, MemoryImageLog, PdfCatalog};
use crate::config::Args;
use crate::routes::{AppContext, build_router};
use crate::storage::Storage;
use crate::upload::UploadConfig;

shadow!(build);

/// Starts the filedrop server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let storage = Arc::new(Storage::new(PathBuf::from(&args.root)));
    storage.ensure_layout().await?;
    info!(
        images = ?storage.image_dir(),
        pdfs = ?storage.pdf_dir(),
        "upload folders ready"
    );

    let upload_config = Arc::new(UploadConfig {
        max_size: args.upload_max_size,
        staging_ttl: Duration::from_secs(args.staging_ttl_secs),
    });
    let images: Arc<dyn ImageLog> = Arc::new(MemoryImageLog::new());
    let pdfs: Arc<dyn PdfCatalog> =
        Arc::new(DirectoryPdfCatalog::new(storage.pdf_dir().to_path_buf()));

    let app = build_router(
        AppContext {
            storage: storage.clone(),
            images,
            pdfs,
            upload: upload_config.clone(),
            public_dir: PathBuf::from(&args.public_dir),
        },
        args.cors_origins.as_deref(),
    );

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();

    info!("Server running on http://{}", addr);

    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    spawn_background_tasks(storage, upload_config);
    tokio::select! {
        result = server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
