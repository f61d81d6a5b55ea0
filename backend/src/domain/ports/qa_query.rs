//! Driving port for reading question/answer history.

use async_trait::async_trait;

use crate::domain::{Error, Page, PageRequest, QueryId, QueryRecord, UserId};

use super::HistoryFilter;

/// Q&A lookups invoked by the HTTP adapter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QaQuery: Send + Sync {
    /// One page of the caller's queries, optionally limited to a date range.
    async fn history(
        &self,
        user_id: &UserId,
        filter: HistoryFilter,
        page: PageRequest,
    ) -> Result<Page<QueryRecord>, Error>;

    /// A single query; `404` when missing, `403` when owned by someone else.
    async fn query(&self, user_id: &UserId, id: &QueryId) -> Result<QueryRecord, Error>;
}
