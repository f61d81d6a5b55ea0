//! Port for source persistence driven by webhook events.

use async_trait::async_trait;

use crate::domain::{Source, SourceId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by source repository adapters.
    pub enum SourceRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "source repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "source repository query failed: {message}",
    }
}

/// Storage for indexed content sources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Persist a new source.
    async fn insert(&self, source: &Source) -> Result<(), SourceRepositoryError>;

    /// Fetch a source by id.
    async fn find_by_id(&self, id: &SourceId) -> Result<Option<Source>, SourceRepositoryError>;

    /// Overwrite an existing source.
    async fn update(&self, source: &Source) -> Result<(), SourceRepositoryError>;

    /// Delete a source; `false` when it did not exist.
    async fn delete(&self, id: &SourceId) -> Result<bool, SourceRepositoryError>;
}
