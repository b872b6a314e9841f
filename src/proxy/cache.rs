//! Time-bounded response cache keyed by upstream URL.
//!
//! Freshness is judged against an injected [`Clock`] on every read, so an
//! entry older than the retention window is never served: the read that finds
//! it stale evicts it and reports a miss. The moka store underneath adds a
//! capacity bound, a wall-clock TTL for entries nobody reads again, and
//! single-flight coalescing of concurrent misses for the same URL.

use super::error::ProxyError;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub window: Duration,
    pub max_entries: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(2 * 60 * 60),
            max_entries: 10_000,
        }
    }
}

/// Stored body. JSON is kept serialized so replays re-parse the exact text.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(String),
    Text(String),
}

/// What an upstream fetch hands to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    /// Already stripped of `content-length` / `transfer-encoding`.
    pub headers: Vec<(String, String)>,
    pub payload: Payload,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub url: String,
    pub payload: Payload,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    fn stamp(url: &str, response: UpstreamResponse, stored_at: DateTime<Utc>) -> Self {
        Self {
            url: url.to_string(),
            payload: response.payload,
            status: response.status,
            headers: response.headers,
            stored_at,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryStats {
    pub url: String,
    /// Seconds since the entry was stored.
    pub age: i64,
    /// Seconds of remaining life; negative once stale but not yet evicted.
    pub expires: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cache_size: usize,
    pub cache_duration: u64,
    pub entries: Vec<CacheEntryStats>,
}

/// Outcome of [`ResponseCache::get_or_fetch`].
#[derive(Debug, Clone)]
pub enum Lookup {
    Hit(CacheEntry),
    Fetched(CacheEntry),
}

impl Lookup {
    pub fn entry(&self) -> &CacheEntry {
        match self {
            Lookup::Hit(entry) | Lookup::Fetched(entry) => entry,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

pub struct ResponseCache {
    store: Cache<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    policy: RetentionPolicy,
}

impl ResponseCache {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RetentionPolicy, clock: Arc<dyn Clock>) -> Self {
        let store = Cache::builder()
            .max_capacity(policy.max_entries)
            .time_to_live(policy.window)
            .build();

        Self {
            store,
            clock,
            policy,
        }
    }

    fn age_of(&self, entry: &CacheEntry) -> chrono::Duration {
        self.clock.now() - entry.stored_at
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match chrono::Duration::from_std(self.policy.window) {
            Ok(window) => self.age_of(entry) < window,
            Err(_) => true,
        }
    }

    /// Fresh entry for `url`, evicting it first if it has gone stale.
    pub async fn get(&self, url: &str) -> Option<CacheEntry> {
        let entry = self.store.get(url).await?;
        if self.is_fresh(&entry) {
            tracing::debug!("Cache HIT for: {}", url);
            return Some(entry);
        }

        tracing::debug!("Cache EXPIRED for: {}", url);
        self.store.invalidate(url).await;
        None
    }

    /// Stores a response; a concurrent writer for the same URL simply wins or loses.
    pub async fn set(&self, url: &str, response: UpstreamResponse) -> CacheEntry {
        let entry = CacheEntry::stamp(url, response, self.clock.now());
        self.store.insert(url.to_string(), entry.clone()).await;
        tracing::debug!("Cache SET for: {}", url);
        entry
    }

    pub async fn evict(&self, url: &str) {
        self.store.invalidate(url).await;
    }

    /// Drops every entry and returns how many there were.
    pub async fn clear(&self) -> usize {
        let cleared = self.store.iter().count();
        self.store.invalidate_all();
        self.store.run_pending_tasks().await;
        tracing::info!("Cache CLEARED: {} entries removed", cleared);
        cleared
    }

    pub fn stats(&self) -> CacheStats {
        let window = self.policy.window.as_millis() as i64;
        let mut entries: Vec<(DateTime<Utc>, CacheEntryStats)> = self
            .store
            .iter()
            .map(|(url, entry)| {
                let age = self.age_of(&entry).num_milliseconds();
                (
                    entry.stored_at,
                    CacheEntryStats {
                        url: url.to_string(),
                        age: round_secs(age),
                        expires: round_secs(window - age),
                    },
                )
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.url.cmp(&b.1.url)));

        CacheStats {
            cache_size: entries.len(),
            cache_duration: self.policy.window.as_secs(),
            entries: entries.into_iter().map(|(_, stats)| stats).collect(),
        }
    }

    /// Serves `url` from the cache or calls `fetch` to fill it.
    ///
    /// Concurrent callers missing on the same URL share a single fetch; its
    /// error, if any, is handed to all of them and nothing is stored. A
    /// shared result that is already stale by the clock is dropped and
    /// fetched again.
    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetch: F) -> Result<Lookup, Arc<ProxyError>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<UpstreamResponse, ProxyError>>,
    {
        loop {
            if let Some(entry) = self.get(url).await {
                return Ok(Lookup::Hit(entry));
            }

            tracing::debug!("Cache MISS for: {}", url);
            let clock = Arc::clone(&self.clock);
            let pending = fetch();
            let result = self
                .store
                .entry(url.to_string())
                .or_try_insert_with(async move {
                    let response = pending.await?;
                    Ok(CacheEntry::stamp(url, response, clock.now()))
                })
                .await?;

            if result.is_fresh() {
                tracing::debug!("Cache SET for: {}", url);
                return Ok(Lookup::Fetched(result.into_value()));
            }

            // Another request filled the slot while we were waiting on it.
            let entry = result.into_value();
            if self.is_fresh(&entry) {
                return Ok(Lookup::Hit(entry));
            }
            self.store.invalidate(url).await;
        }
    }
}

/// Whole seconds, halves rounded up.
fn round_secs(millis: i64) -> i64 {
    (millis + 500).div_euclid(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn json_response(body: &str) -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            headers: vec![
                ("content-type".to_string(), "application/ld+json".to_string()),
                ("etag".to_string(), "\"v1\"".to_string()),
            ],
            payload: Payload::Json(body.to_string()),
        }
    }

    fn cache_with_clock() -> (ResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = ResponseCache::with_clock(RetentionPolicy::default(), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_write_then_read_returns_same_response() {
        let (cache, clock) = cache_with_clock();
        let url = "https://upstream/meetings?format=application%2Fld%2Bjson";

        cache.set(url, json_response(r#"{"total":42}"#)).await;
        clock.advance(chrono::Duration::minutes(119));

        let entry = cache.get(url).await.expect("entry should still be fresh");
        assert_eq!(entry.status, 200);
        assert_eq!(entry.payload, Payload::Json(r#"{"total":42}"#.to_string()));
        assert_eq!(entry.header("Content-Type"), Some("application/ld+json"));
        assert_eq!(entry.headers.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_entry_is_evicted_on_read() {
        let (cache, clock) = cache_with_clock();
        let url = "https://upstream/meetings";

        cache.set(url, json_response("{}")).await;
        clock.advance(chrono::Duration::hours(2));

        assert!(cache.get(url).await.is_none());
        cache.store.run_pending_tasks().await;
        assert_eq!(cache.stats().cache_size, 0);
    }

    #[tokio::test]
    async fn test_stale_entry_triggers_refetch() {
        let (cache, clock) = cache_with_clock();
        let url = "https://upstream/meetings/MTG-1";
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json_response(r#"{"id":"MTG-1"}"#))
        };

        assert!(!cache.get_or_fetch(url, fetch).await.unwrap().is_hit());
        assert!(cache.get_or_fetch(url, fetch).await.unwrap().is_hit());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(chrono::Duration::hours(3));
        assert!(!cache.get_or_fetch(url, fetch).await.unwrap().is_hit());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let (cache, _clock) = cache_with_clock();
        let url = "https://upstream/meetings/missing";

        let result = cache
            .get_or_fetch(url, || async {
                Err(ProxyError::Upstream {
                    status: 404,
                    reason: "Not Found".to_string(),
                    passthrough: None,
                })
            })
            .await;
        assert!(result.is_err());
        assert!(cache.get(url).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let (cache, _clock) = cache_with_clock();
        let url = "https://upstream/meetings?year=2025";
        let calls = AtomicUsize::new(0);
        let (shared, counter) = (&cache, &calls);

        let lookups = futures::future::join_all((0..8).map(move |_| {
            shared.get_or_fetch(url, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok(json_response("[]"))
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lookups.iter().all(|lookup| lookup.is_ok()));
        assert_eq!(lookups.iter().filter(|l| matches!(l, Ok(Lookup::Fetched(_)))).count(), 1);
    }

    /// Moves three hours forward every time it is read.
    struct SteppingClock(Mutex<DateTime<Utc>>);

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut now = self.0.lock().unwrap();
            let current = *now;
            *now = current + chrono::Duration::hours(3);
            current
        }
    }

    #[tokio::test]
    async fn test_shared_result_stale_on_arrival_is_refetched() {
        let cache = ResponseCache::with_clock(
            RetentionPolicy::default(),
            Arc::new(SteppingClock(Mutex::new(Utc::now()))),
        );
        let url = "https://upstream/meetings/MTG-4";
        let calls = AtomicUsize::new(0);
        let (shared, counter) = (&cache, &calls);

        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(json_response(r#"{"id":"MTG-4"}"#))
        };

        let lookups =
            futures::future::join_all((0..2).map(|_| shared.get_or_fetch(url, fetch))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        for lookup in lookups {
            let lookup = lookup.unwrap();
            assert!(!lookup.is_hit());
            assert_eq!(lookup.entry().payload, Payload::Json(r#"{"id":"MTG-4"}"#.to_string()));
        }
    }

    #[tokio::test]
    async fn test_stats_round_to_nearest_second() {
        let (cache, clock) = cache_with_clock();
        cache.set("https://upstream/a", json_response("{}")).await;
        clock.advance(chrono::Duration::milliseconds(89_600));

        let stats = cache.stats();
        assert_eq!(stats.entries[0].age, 90);
        assert_eq!(stats.entries[0].expires, 7110);

        clock.advance(chrono::Duration::milliseconds(900));
        let stats = cache.stats();
        assert_eq!(stats.entries[0].age, 91);
        assert_eq!(stats.entries[0].expires, 7110);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let (cache, clock) = cache_with_clock();
        cache.set("https://upstream/a", json_response("{}")).await;
        clock.advance(chrono::Duration::seconds(90));
        cache.set("https://upstream/b", json_response("{}")).await;

        let stats = cache.stats();
        assert_eq!(stats.cache_size, 2);
        assert_eq!(stats.cache_duration, 7200);
        assert_eq!(stats.entries[0].url, "https://upstream/a");
        assert_eq!(stats.entries[0].age, 90);
        assert_eq!(stats.entries[0].expires, 7110);
        assert_eq!(stats.entries[1].age, 0);

        assert_eq!(cache.clear().await, 2);
        assert_eq!(cache.stats().cache_size, 0);
        assert!(cache.get("https://upstream/a").await.is_none());
    }

    #[tokio::test]
    async fn test_evict_removes_single_entry() {
        let (cache, _clock) = cache_with_clock();
        cache.set("https://upstream/a", json_response("{}")).await;
        cache.set("https://upstream/b", json_response("{}")).await;

        cache.evict("https://upstream/a").await;
        assert!(cache.get("https://upstream/a").await.is_none());
        assert!(cache.get("https://upstream/b").await.is_some());
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = CacheStats {
            cache_size: 0,
            cache_duration: 7200,
            entries: vec![],
        };
        let value = serde_json::to_value(stats).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "cacheSize": 0, "cacheDuration": 7200, "entries": [] })
        );
    }
}
