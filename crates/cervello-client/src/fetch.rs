//! Cached, deduplicated JSON fetches.
//!
//! Requests are keyed by URL plus the JSON form of their [`FetchOptions`].
//! Identical requests issued within the dedupe window share one in-flight
//! future; a request for a key whose in-flight request is older than the
//! window aborts it and starts afresh. Successful bodies are cached with the
//! time they arrived, and stale entries are served while a background
//! refresh runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{AbortHandle, Aborted, BoxFuture, Shared, abortable};
use futures::FutureExt;
use mockable::Clock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::transport::{HttpRequest, HttpTransport, Method};

/// Per-request options; part of the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchOptions {
    /// Verb.
    pub method: Method,
    /// Extra headers.
    pub headers: BTreeMap<String, String>,
    /// JSON body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl FetchOptions {
    /// Plain `GET`.
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// What a caller sees after a fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    /// Latest data for the key.
    pub data: Option<Value>,
    /// Message of the last failure; aborts are never reported.
    pub error: Option<String>,
    /// A request for the key is in flight.
    pub loading: bool,
}

/// Timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Window in which identical requests share one network call.
    pub dedupe_interval: Duration,
    /// Age after which cached data is refreshed in the background.
    pub revalidate_interval: Option<Duration>,
    /// Deadline for one request.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            dedupe_interval: Duration::from_millis(2_000),
            revalidate_interval: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ClientConfig> for FetchConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            dedupe_interval: config.dedupe_interval(),
            revalidate_interval: config.revalidate_interval(),
            timeout: config.request_timeout(),
        }
    }
}

/// Cache edit applied by [`Fetcher::mutate`].
pub enum Mutation {
    /// Replace the cached value.
    Set(Value),
    /// Derive the new value from the cached one.
    Update(Box<dyn FnOnce(Option<&Value>) -> Value + Send>),
}

impl Mutation {
    /// Mutation computed from the current value.
    #[must_use]
    pub fn update(edit: impl FnOnce(Option<&Value>) -> Value + Send + 'static) -> Self {
        Self::Update(Box::new(edit))
    }
}

impl From<Value> for Mutation {
    fn from(value: Value) -> Self {
        Self::Set(value)
    }
}

type SharedRequest = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

struct InFlight {
    started_at: DateTime<Utc>,
    generation: u64,
    request: SharedRequest,
    abort: AbortHandle,
}

struct CacheEntry {
    data: Value,
    stored_at: DateTime<Utc>,
}

#[derive(Default)]
struct FetchStore {
    cache: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    generation: u64,
}

enum Plan {
    Join { generation: u64, request: SharedRequest },
    Cached { data: Value, stale: bool },
    Start,
}

fn older_than(then: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    TimeDelta::from_std(window).is_ok_and(|limit| now - then > limit)
}

fn status_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
        .to_owned()
}

async fn perform(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    timeout: Duration,
) -> Result<Value, FetchError> {
    let response = tokio::time::timeout(timeout, transport.execute(request))
        .await
        .map_err(|_| FetchError::Timeout {
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })??;
    if !response.is_success() {
        let body = if response.body.trim().is_empty() {
            status_reason(response.status)
        } else {
            response.body
        };
        return Err(FetchError::Status {
            status: response.status,
            body,
        });
    }
    Ok(response.decoded_body())
}

/// Fetch wrapper shared by providers and views. Clones share one cache.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    config: FetchConfig,
    store: Arc<Mutex<FetchStore>>,
}

impl Fetcher {
    /// Fetcher over `transport`, timestamping cache entries with `clock`.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>, config: FetchConfig) -> Self {
        Self {
            transport,
            clock,
            config,
            store: Arc::new(Mutex::new(FetchStore::default())),
        }
    }

    /// Cache key for a request.
    #[must_use]
    pub fn cache_key(url: &Url, options: &FetchOptions) -> String {
        let encoded = serde_json::to_string(options).unwrap_or_default();
        format!("{url}{encoded}")
    }

    fn store(&self) -> MutexGuard<'_, FetchStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch `url`, serving the cache when possible.
    pub async fn fetch(&self, url: &Url, options: &FetchOptions) -> FetchState {
        self.load(url, options, false).await
    }

    /// Fetch `url` from the network even when cached.
    pub async fn refetch(&self, url: &Url, options: &FetchOptions) -> FetchState {
        self.load(url, options, true).await
    }

    async fn load(&self, url: &Url, options: &FetchOptions, skip_cache: bool) -> FetchState {
        let key = Self::cache_key(url, options);
        let plan = self.plan(&key, skip_cache);
        match plan {
            Plan::Join {
                generation,
                request,
            } => {
                debug!(%url, "joining in-flight request");
                self.settle(&key, generation, request.await)
            }
            Plan::Cached { data, stale } => {
                if stale {
                    debug!(%url, "serving stale data while revalidating");
                    self.revalidate_in_background(key, url, options);
                }
                FetchState {
                    data: Some(data),
                    error: None,
                    loading: stale,
                }
            }
            Plan::Start => {
                let (generation, request) = self.start(&key, url, options);
                self.settle(&key, generation, request.await)
            }
        }
    }

    fn plan(&self, key: &str, skip_cache: bool) -> Plan {
        let now = self.clock.utc();
        let store = self.store();
        if let Some(in_flight) = store.in_flight.get(key) {
            if !older_than(in_flight.started_at, now, self.config.dedupe_interval) {
                return Plan::Join {
                    generation: in_flight.generation,
                    request: in_flight.request.clone(),
                };
            }
        }
        if skip_cache {
            return Plan::Start;
        }
        match store.cache.get(key) {
            Some(entry) => Plan::Cached {
                data: entry.data.clone(),
                stale: self
                    .config
                    .revalidate_interval
                    .is_some_and(|interval| older_than(entry.stored_at, now, interval)),
            },
            None => Plan::Start,
        }
    }

    /// Register a new in-flight request for `key`, aborting any older one.
    fn start(&self, key: &str, url: &Url, options: &FetchOptions) -> (u64, SharedRequest) {
        let request = HttpRequest::json(
            options.method,
            url.clone(),
            &options.headers,
            options.body.clone(),
        );
        let transport = Arc::clone(&self.transport);
        let timeout = self.config.timeout;
        let (future, abort) =
            abortable(async move { perform(transport.as_ref(), request, timeout).await });
        let shared = future
            .map(|outcome| match outcome {
                Ok(result) => result,
                Err(Aborted) => Err(FetchError::Aborted),
            })
            .boxed()
            .shared();

        let started_at = self.clock.utc();
        let mut store = self.store();
        store.generation += 1;
        let generation = store.generation;
        let previous = store.in_flight.insert(
            key.to_owned(),
            InFlight {
                started_at,
                generation,
                request: shared.clone(),
                abort,
            },
        );
        if let Some(superseded) = previous {
            debug!(%url, "aborting superseded request");
            superseded.abort.abort();
        }
        (generation, shared)
    }

    fn settle(&self, key: &str, generation: u64, outcome: Result<Value, FetchError>) -> FetchState {
        let stored_at = self.clock.utc();
        let mut store = self.store();
        if store
            .in_flight
            .get(key)
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            store.in_flight.remove(key);
        }
        let loading = store.in_flight.contains_key(key);
        match outcome {
            Ok(data) => {
                store.cache.insert(
                    key.to_owned(),
                    CacheEntry {
                        data: data.clone(),
                        stored_at,
                    },
                );
                FetchState {
                    data: Some(data),
                    error: None,
                    loading,
                }
            }
            Err(err) => {
                let error = if err.is_abort() {
                    None
                } else {
                    warn!(key, error = %err, "fetch failed");
                    Some(err.to_string())
                };
                FetchState {
                    data: store.cache.get(key).map(|entry| entry.data.clone()),
                    error,
                    loading,
                }
            }
        }
    }

    fn revalidate_in_background(&self, key: String, url: &Url, options: &FetchOptions) {
        let (generation, request) = self.start(&key, url, options);
        let fetcher = self.clone();
        tokio::spawn(async move {
            let outcome = request.await;
            fetcher.settle(&key, generation, outcome);
        });
    }

    /// Edit the cached value for a request, optionally refetching afterwards.
    ///
    /// Revalidation spawns a task, so it needs a tokio runtime.
    pub fn mutate(
        &self,
        url: &Url,
        options: &FetchOptions,
        mutation: impl Into<Mutation>,
        revalidate: bool,
    ) -> Value {
        let key = Self::cache_key(url, options);
        let stored_at = self.clock.utc();
        let next = {
            let mut store = self.store();
            let next = match mutation.into() {
                Mutation::Set(value) => value,
                Mutation::Update(edit) => edit(store.cache.get(&key).map(|entry| &entry.data)),
            };
            store.cache.insert(
                key.clone(),
                CacheEntry {
                    data: next.clone(),
                    stored_at,
                },
            );
            next
        };
        if revalidate {
            self.revalidate_in_background(key, url, options);
        }
        next
    }

    /// Drop the cached value for a request.
    pub fn invalidate(&self, url: &Url, options: &FetchOptions) -> bool {
        let key = Self::cache_key(url, options);
        self.store().cache.remove(&key).is_some()
    }

    /// Abort the in-flight request for a key; waiting callers see no error.
    pub fn abort(&self, url: &Url, options: &FetchOptions) -> bool {
        let key = Self::cache_key(url, options);
        let removed = self.store().in_flight.remove(&key);
        removed.is_some_and(|in_flight| {
            in_flight.abort.abort();
            true
        })
    }

    /// Cached state without touching the network.
    #[must_use]
    pub fn snapshot(&self, url: &Url, options: &FetchOptions) -> FetchState {
        let key = Self::cache_key(url, options);
        let store = self.store();
        FetchState {
            data: store.cache.get(&key).map(|entry| entry.data.clone()),
            error: None,
            loading: store.in_flight.contains_key(&key),
        }
    }
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
