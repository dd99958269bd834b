//! Shared HTTP adapter state.
//!
//! Handlers receive this via `actix_web::web::Data`; it only holds the
//! transport-neutral pipeline so handlers stay testable without I/O.

use std::sync::Arc;

use crate::domain::Application;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// The dispatch pipeline.
    pub application: Arc<Application>,
}

impl HttpState {
    /// Wrap the pipeline.
    pub fn new(application: Arc<Application>) -> Self {
        Self { application }
    }
}
