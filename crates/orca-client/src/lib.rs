//! HTTP gateway to the workflow engine.

pub mod http;
mod schema;

use std::sync::Arc;

use orca_core::config::BackendConfig;
use orca_core::error::Result;
use orca_core::traits::Backend;

pub use http::HttpBackend;

/// Build the backend described by the configuration.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    Ok(Arc::new(HttpBackend::new(config)?))
}
