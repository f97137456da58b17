//! Outbound publishing seam.
//!
//! The remote platform is an opaque collaborator: one bounded call per
//! post, no retries here. A timeout is a failure like any other.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::PostTemplate;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("publish timed out")]
    Timeout,
    #[error("remote rejected publish: {0}")]
    Rejected(String),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PublishTransport: Send + Sync {
    async fn publish(&self, template: &PostTemplate) -> Result<(), TransportError>;
}
