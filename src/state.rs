//! Application state management

use std::sync::Arc;

use crate::upload::UploadService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    upload: UploadService,
}

impl AppState {
    /// Create a new application state
    pub fn new(upload: UploadService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { upload }),
        }
    }

    /// Get the relay service
    pub fn upload(&self) -> &UploadService {
        &self.inner.upload
    }
}
