// Main entry point for image-stream-server.
// Prepares the upload directory, builds the shared state and the Axum
// router, and serves HTTP until a shutdown signal arrives.

mod selection;
mod shutdown_signal;
mod sniff;
mod storage;
mod upload;
mod web;

use clap::{Parser, ValueEnum};
use shutdown_signal::shutdown_signal;
use std::{path::PathBuf, sync::Arc};
use tracing::Level;
use upload::AllowList;
use web::AppState;

/// Which sniffed content types uploads may have.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum AllowListMode {
    /// JPEG, PNG, GIF and WEBP, plus unrecognized binary content.
    Permissive,
    /// JPEG, PNG, GIF and WEBP only.
    ImagesOnly,
}

impl From<AllowListMode> for AllowList {
    fn from(mode: AllowListMode) -> Self {
        match mode {
            AllowListMode::Permissive => AllowList::permissive(),
            AllowListMode::ImagesOnly => AllowList::images_only(),
        }
    }
}

/// Command line arguments for image-stream-server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppConfig {
    /// Hostname/IP to bind the server to.
    /// "*" listens on all interfaces.
    #[arg(long, env = "IMAGE_STREAM_SERVER_HOST", default_value = "*")]
    host: String,

    /// Port number to listen on.
    #[arg(short, long, env = "IMAGE_STREAM_SERVER_PORT", default_value_t = 8080)]
    port: u16,

    /// Directory uploaded files are stored in. Created if missing.
    #[arg(long, env = "IMAGE_STREAM_SERVER_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory of static assets served at "/".
    #[arg(long, env = "IMAGE_STREAM_SERVER_STATIC_DIR", default_value = "static")]
    static_dir: PathBuf,

    /// Maximum accepted request body size in bytes.
    #[arg(long, env = "IMAGE_STREAM_SERVER_MAX_UPLOAD_BYTES", default_value_t = web::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Content types accepted for upload.
    #[arg(long, env = "IMAGE_STREAM_SERVER_ALLOW_LIST", value_enum, default_value_t = AllowListMode::Permissive)]
    allow_list: AllowListMode,
}

#[tokio::main]
async fn main() {
    let config = AppConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting image-stream-server...");

    if let Err(e) = storage::prepare_upload_dir(&config.upload_dir) {
        tracing::error!("FATAL: {}", e);
        eprintln!("FATAL: {}. Exiting.", e);
        std::process::exit(1);
    }
    tracing::info!("Upload directory set to: {}", config.upload_dir.display());
    tracing::info!("Static directory set to: {}", config.static_dir.display());

    let state = Arc::new(AppState::new(&config.upload_dir, config.allow_list.into()));
    tracing::info!(
        "Accepted upload types: {}",
        state.validator.allow_list().types().join(", ")
    );

    let app = web::create_app(state, &config.static_dir, config.max_upload_bytes);

    let listener = match web::create_listener(&config.host, config.port).await {
        Ok((addr, l)) => {
            tracing::info!("Server successfully bound. Listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("FATAL: Failed to bind server: {}", e);
            eprintln!("FATAL: Could not bind server. Error: {}. Exiting.", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server run error: {}", e);
        eprintln!("ERROR: Server shut down unexpectedly. Error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("image-stream-server has shut down.");
}
