//! Port for question/answer history persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{PageRequest, QueryId, QueryRecord, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by query repository adapters.
    pub enum QueryRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "query repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "query repository query failed: {message}",
        /// Stored JSON columns could not be decoded.
        Serialization { message: String } =>
            "query repository serialisation failed: {message}",
    }
}

/// Optional submission-time window applied to history listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    /// Whether `timestamp` falls inside the window.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| timestamp >= from) && self.to.is_none_or(|to| timestamp <= to)
    }
}

/// Storage for [`QueryRecord`]s.
///
/// Listings are ordered newest first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryRepository: Send + Sync {
    /// Persist a freshly submitted query.
    async fn insert(&self, record: &QueryRecord) -> Result<(), QueryRepositoryError>;

    /// Overwrite a stored query (status, answer, feedback).
    async fn update(&self, record: &QueryRecord) -> Result<(), QueryRepositoryError>;

    /// Fetch a query by id regardless of owner.
    async fn find_by_id(&self, id: &QueryId) -> Result<Option<QueryRecord>, QueryRepositoryError>;

    /// One page of a user's queries plus the total number of matches.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        filter: &HistoryFilter,
        page: PageRequest,
    ) -> Result<(Vec<QueryRecord>, u64), QueryRepositoryError>;

    /// Delete a query; `false` when it did not exist.
    async fn delete(&self, id: &QueryId) -> Result<bool, QueryRepositoryError>;

    /// Delete every query owned by `user_id`, returning the number removed.
    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, QueryRepositoryError>;
}
