//! Trellis Client - HTTP plumbing for Trellis lazy lists.
//!
//! Provides an AppSync-style [`DocumentBuilder`](trellis_engine::DocumentBuilder),
//! a reqwest-backed [`Transport`](trellis_engine::Transport), and environment
//! configuration for the `trellis-client` binary.

pub mod config;
pub mod document;
pub mod error;
pub mod transport;

pub use config::{Config, ConfigError, ModelConfig};
pub use document::AppSyncDocumentBuilder;
pub use error::{ClientError, Result};
pub use transport::{HttpTransport, REQUEST_ID_HEADER};

use std::sync::Arc;
use trellis_engine::ListSource;

/// Build a [`ListSource`] talking to the configured endpoint.
pub fn list_source(config: &Config) -> Result<ListSource> {
    let transport = HttpTransport::from_config(config)?;
    Ok(ListSource::new(Arc::new(transport), Arc::new(AppSyncDocumentBuilder))
        .with_page_size(config.page_size))
}
