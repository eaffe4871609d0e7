use super::{SharedAppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{IntoMakeService, any, post},
};
use std::path::Path;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

pub fn create_router(state: SharedAppState, static_dir: &Path, max_upload_bytes: usize) -> Router {
    let uploads = ServeDir::new(state.persister.upload_dir());

    Router::new()
        .route(
            "/upload",
            post(handlers::upload_image).fallback(handlers::method_not_allowed),
        )
        .route(
            "/select-image",
            post(handlers::select_image).fallback(handlers::method_not_allowed),
        )
        .route("/stream", any(handlers::stream_current_image))
        .route("/images", any(handlers::list_images))
        .route("/current-image", any(handlers::current_image))
        // Stored files are served directly by name
        .nest_service("/uploads", uploads)
        // Everything else comes from the static asset directory
        .fallback_service(ServeDir::new(static_dir))
        // Apply a layer to limit the maximum size of request bodies
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        // Add tracing for HTTP requests and responses
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
        .with_state(state)
}

pub fn create_app(
    state: SharedAppState,
    static_dir: &Path,
    max_upload_bytes: usize,
) -> IntoMakeService<Router> {
    create_router(state, static_dir, max_upload_bytes).into_make_service()
}
