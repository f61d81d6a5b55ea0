//! In-process repositories used when no database is configured.
//!
//! Each store is a `tokio::sync::RwLock` around a `HashMap`. Data lives only
//! as long as the process; these adapters back local development and the
//! integration tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ports::{
    HistoryFilter, PreferencesRepository, PreferencesRepositoryError, QueryRepository,
    QueryRepositoryError, SourceRepository, SourceRepositoryError, UserRepository,
    UserRepositoryError,
};
use crate::domain::{
    EmailAddress, PageRequest, QueryId, QueryRecord, Source, SourceId, User, UserId,
    UserPreferences,
};

/// Users keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserRepositoryError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email == *email)
            .cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(UserRepositoryError::duplicate_email(user.email.as_str()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| existing.id != user.id && existing.email == user.email)
        {
            return Err(UserRepositoryError::duplicate_email(user.email.as_str()));
        }
        match users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(UserRepositoryError::query("user not found for update")),
        }
    }
}

/// Preferences keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryPreferencesRepository {
    rows: RwLock<HashMap<UserId, UserPreferences>>,
}

#[async_trait]
impl PreferencesRepository for InMemoryPreferencesRepository {
    async fn find(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserPreferences>, PreferencesRepositoryError> {
        Ok(self.rows.read().await.get(user_id).cloned())
    }

    async fn upsert(
        &self,
        preferences: &UserPreferences,
    ) -> Result<(), PreferencesRepositoryError> {
        self.rows
            .write()
            .await
            .insert(preferences.user_id, preferences.clone());
        Ok(())
    }
}

/// Query history keyed by query id.
#[derive(Debug, Default)]
pub struct InMemoryQueryRepository {
    records: RwLock<HashMap<QueryId, QueryRecord>>,
}

#[async_trait]
impl QueryRepository for InMemoryQueryRepository {
    async fn insert(&self, record: &QueryRecord) -> Result<(), QueryRepositoryError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &QueryRecord) -> Result<(), QueryRepositoryError> {
        match self.records.write().await.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(QueryRepositoryError::query("query not found for update")),
        }
    }

    async fn find_by_id(&self, id: &QueryId) -> Result<Option<QueryRecord>, QueryRepositoryError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        filter: &HistoryFilter,
        page: PageRequest,
    ) -> Result<(Vec<QueryRecord>, u64), QueryRepositoryError> {
        let records = self.records.read().await;
        let mut matching: Vec<&QueryRecord> = records
            .values()
            .filter(|record| record.is_owned_by(user_id) && filter.contains(record.timestamp))
            .collect();
        matching.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        let page_items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((page_items, total))
    }

    async fn delete(&self, id: &QueryId) -> Result<bool, QueryRepositoryError> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, QueryRepositoryError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_owned_by(user_id));
        Ok((before - records.len()) as u64)
    }
}

/// Sources keyed by id.
#[derive(Debug, Default)]
pub struct InMemorySourceRepository {
    sources: RwLock<HashMap<SourceId, Source>>,
}

#[async_trait]
impl SourceRepository for InMemorySourceRepository {
    async fn insert(&self, source: &Source) -> Result<(), SourceRepositoryError> {
        self.sources.write().await.insert(source.id, source.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &SourceId) -> Result<Option<Source>, SourceRepositoryError> {
        Ok(self.sources.read().await.get(id).cloned())
    }

    async fn update(&self, source: &Source) -> Result<(), SourceRepositoryError> {
        match self.sources.write().await.get_mut(&source.id) {
            Some(slot) => {
                *slot = source.clone();
                Ok(())
            }
            None => Err(SourceRepositoryError::query("source not found for update")),
        }
    }

    async fn delete(&self, id: &SourceId) -> Result<bool, SourceRepositoryError> {
        Ok(self.sources.write().await.remove(id).is_some())
    }
}
