// Web server module
// HTTP surface for uploading, listing, selecting and streaming images

mod app;
mod error;
mod extract_request_data;
mod handlers;
mod listeners;
mod models;

pub use app::create_app;
pub use listeners::create_listener;

use crate::{
    selection::SelectionState,
    upload::{AllowList, UploadPersister, UploadValidator},
};
use std::{path::PathBuf, sync::Arc};

// Default maximum size of a request body (uploads included)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024; // 100MB

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub validator: UploadValidator,
    pub persister: UploadPersister,
    pub selection: SelectionState,
}

impl AppState {
    pub fn new(upload_dir: impl Into<PathBuf>, allow_list: AllowList) -> Self {
        let upload_dir = upload_dir.into();
        Self {
            validator: UploadValidator::new(allow_list),
            persister: UploadPersister::new(upload_dir.clone()),
            selection: SelectionState::new(upload_dir),
        }
    }
}

pub type SharedAppState = Arc<AppState>;
