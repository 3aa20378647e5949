//! Record acquisition: a retried browser session feeding the extraction
//! pipeline.

pub mod retry;
pub mod session;

use crate::types::CanonicalRecord;
use anyhow::Result;
use async_trait::async_trait;

pub use retry::with_retry;
pub use session::BrowserSource;

/// Anything that can produce one batch of canonical records.
///
/// An empty batch is a valid result; an error means every attempt failed.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn acquire(&self) -> Result<Vec<CanonicalRecord>>;
}
