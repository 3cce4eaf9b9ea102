//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const UPLOADS_DIR: &str = "uploads";
pub const PDF_SUBDIR: &str = "pdf";
pub const IMAGE_FIELD: &str = "image";
pub const FULLNAME_FIELD: &str = "fullname";
pub const PDF_FIELD: &str = "pdfFile";
pub const PDF_MIME: &str = "application/pdf";
pub const IMAGE_LIST_WIDTH: u32 = 200;
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPLOAD_MAX_SIZE: u64 = 0;
pub const DEFAULT_STAGING_TTL_SECS: u64 = 24 * 60 * 60;
pub const STAGING_CLEAN_INTERVAL_SECS: u64 = 900;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "filedrop", version = VERSION_INFO, about = "Image and PDF upload server")]
pub struct Args {
    #[arg(
        short = 'b',
        long,
        env = "FILEDROP_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "PORT",
        default_value_t = DEFAULT_PORT,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(
        short = 'r',
        long,
        env = "FILEDROP_ROOT",
        default_value = ".",
        help = "Directory that holds the uploads folder"
    )]
    pub root: String,
    #[arg(
        long,
        env = "FILEDROP_PUBLIC_DIR",
        default_value = "public",
        help = "Static assets served at the site root"
    )]
    pub public_dir: String,
    #[arg(
        long,
        env = "FILEDROP_CORS_ORIGINS",
        help = "Comma separated CORS origins"
    )]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "FILEDROP_UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max upload request size in bytes (0 to disable)"
    )]
    pub upload_max_size: u64,
    #[arg(
        long,
        env = "FILEDROP_STAGING_TTL_SECS",
        default_value_t = DEFAULT_STAGING_TTL_SECS,
        help = "Staging file cleanup threshold in seconds (0 to disable)"
    )]
    pub staging_ttl_secs: u64,
}
