//! Time-bounded cache access with graceful degradation.
//!
//! [`TimedCache`] wraps a [`CacheBackend`] and races every operation against
//! a timeout. A timeout, a backend that is not ready yet, or any backend
//! error all collapse into the degraded outcome: [`CacheLookup::Miss`] for
//! reads and [`CacheWrite::Degraded`] for writes. Callers therefore treat
//! "cache unavailable" exactly like "cache empty".

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CacheError;

/// Default timeout for get/set/delete.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(3);
/// Default timeout for liveness checks.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(2);
/// Longest lifetime any entry is written with; larger TTLs are clamped.
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Key/value store contract consumed by [`TimedCache`].
///
/// Implementations must report [`CacheError::NotReady`] while they cannot
/// serve requests, separately from a plain absent key (`Ok(None)`).
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn get<'a>(&'a self, key: &'a str) -> BackendFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BackendFuture<'a, ()>;

    fn delete<'a>(&'a self, key: &'a str) -> BackendFuture<'a, ()>;

    fn ping<'a>(&'a self) -> BackendFuture<'a, ()>;
}

/// Value read from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// The stored string looked like JSON and decoded cleanly.
    Structured(Value),
    /// Plain text, or JSON-looking text that failed to decode.
    Raw(String),
}

impl CachedValue {
    fn decode(raw: String) -> Self {
        if !looks_structured(&raw) {
            return Self::Raw(raw);
        }

        match serde_json::from_str(&raw) {
            Ok(value) => Self::Structured(value),
            Err(error) => {
                debug!(%error, "cached value looked structured but failed to decode");
                Self::Raw(raw)
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Structured(Value::Bool(flag)) => *flag,
            Self::Structured(Value::Null) => false,
            Self::Structured(_) => true,
            Self::Raw(text) => {
                let text = text.trim();
                !text.is_empty() && text != "0"
            }
        }
    }
}

fn looks_structured(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.starts_with('{')
        || trimmed.starts_with('[')
        || matches!(trimmed, "true" | "false" | "null")
}

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CachedValue),
    Miss,
}

impl CacheLookup {
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// Outcome of a cache write or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Ack,
    Degraded,
}

/// Timeout-guarded, never-failing facade over a [`CacheBackend`].
#[derive(Clone)]
pub struct TimedCache {
    backend: Arc<dyn CacheBackend>,
    operation_timeout: Duration,
    liveness_timeout: Duration,
}

impl TimedCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
        }
    }

    /// In-process cache, used when no external backend is configured.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn with_timeouts(mut self, operation: Duration, liveness: Duration) -> Self {
        self.operation_timeout = operation;
        self.liveness_timeout = liveness;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn get(&self, key: &str) -> CacheLookup {
        match tokio::time::timeout(self.operation_timeout, self.backend.get(key)).await {
            Ok(Ok(Some(raw))) => {
                debug!(key, "cache hit");
                CacheLookup::Hit(CachedValue::decode(raw))
            }
            Ok(Ok(None)) => {
                debug!(key, "cache miss");
                CacheLookup::Miss
            }
            Ok(Err(error)) => {
                warn!(key, backend = self.backend.name(), %error, "cache get degraded to miss");
                CacheLookup::Miss
            }
            Err(_) => {
                warn!(
                    key,
                    backend = self.backend.name(),
                    timeout_ms = duration_ms(self.operation_timeout),
                    "cache get timed out; treating as miss"
                );
                CacheLookup::Miss
            }
        }
    }

    /// Typed read. Anything that does not decode into `T` is a miss.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key).await {
            CacheLookup::Hit(CachedValue::Structured(value)) => {
                match serde_json::from_value(value) {
                    Ok(decoded) => Some(decoded),
                    Err(error) => {
                        debug!(key, %error, "cached value has unexpected shape");
                        None
                    }
                }
            }
            CacheLookup::Hit(CachedValue::Raw(_)) | CacheLookup::Miss => None,
        }
    }

    /// Writes `value` with `ttl` clamped to [`MAX_ENTRY_TTL`].
    pub async fn set(&self, key: &str, value: impl Into<String>, ttl: Duration) -> CacheWrite {
        let value = value.into();
        let ttl = ttl.min(MAX_ENTRY_TTL);
        let outcome =
            tokio::time::timeout(self.operation_timeout, self.backend.set(key, value, ttl)).await;
        self.write_outcome("set", key, outcome)
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheWrite {
        match serde_json::to_string(value) {
            Ok(encoded) => self.set(key, encoded, ttl).await,
            Err(error) => {
                let error = CacheError::Serialization(error.to_string());
                self.write_outcome("set", key, Ok(Err(error)))
            }
        }
    }

    pub async fn delete(&self, key: &str) -> CacheWrite {
        let outcome = tokio::time::timeout(self.operation_timeout, self.backend.delete(key)).await;
        self.write_outcome("delete", key, outcome)
    }

    /// Liveness check bounded by the (shorter) liveness timeout.
    pub async fn ping(&self) -> bool {
        match tokio::time::timeout(self.liveness_timeout, self.backend.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                debug!(backend = self.backend.name(), %error, "cache liveness check failed");
                false
            }
            Err(_) => {
                debug!(backend = self.backend.name(), "cache liveness check timed out");
                false
            }
        }
    }

    fn write_outcome(
        &self,
        operation: &'static str,
        key: &str,
        outcome: Result<Result<(), CacheError>, tokio::time::error::Elapsed>,
    ) -> CacheWrite {
        match outcome {
            Ok(Ok(())) => CacheWrite::Ack,
            Ok(Err(error)) => {
                warn!(key, operation, backend = self.backend.name(), %error, "cache write degraded");
                CacheWrite::Degraded
            }
            Err(_) => {
                warn!(
                    key,
                    operation,
                    backend = self.backend.name(),
                    timeout_ms = duration_ms(self.operation_timeout),
                    "cache write timed out"
                );
                CacheWrite::Degraded
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    body: String,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

/// In-process backend with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: tokio::sync::RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries.
    pub async fn clear_expired(&self) {
        let now = Instant::now();
        self.map.write().await.retain(|_, entry| entry.is_live(now));
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get<'a>(&'a self, key: &'a str) -> BackendFuture<'a, Option<String>> {
        Box::pin(async move {
            let map = self.map.read().await;
            let now = Instant::now();
            Ok(map
                .get(key)
                .filter(|entry| entry.is_live(now))
                .map(|entry| entry.body.clone()))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let expires_at = Instant::now().checked_add(ttl);
            self.map.write().await.insert(
                key.to_owned(),
                MemoryEntry {
                    body: value,
                    expires_at,
                },
            );
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.map.write().await.remove(key);
            Ok(())
        })
    }

    fn ping<'a>(&'a self) -> BackendFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnreadyBackend;

    impl CacheBackend for UnreadyBackend {
        fn name(&self) -> &'static str {
            "unready"
        }

        fn get<'a>(&'a self, _key: &'a str) -> BackendFuture<'a, Option<String>> {
            Box::pin(async { Err(CacheError::NotReady) })
        }

        fn set<'a>(&'a self, _key: &'a str, _value: String, _ttl: Duration) -> BackendFuture<'a, ()> {
            Box::pin(async { Err(CacheError::NotReady) })
        }

        fn delete<'a>(&'a self, _key: &'a str) -> BackendFuture<'a, ()> {
            Box::pin(async { Err(CacheError::NotReady) })
        }

        fn ping<'a>(&'a self) -> BackendFuture<'a, ()> {
            Box::pin(async { Err(CacheError::NotReady) })
        }
    }

    #[tokio::test]
    async fn memory_cache_basic_operations() {
        let cache = TimedCache::in_memory();

        assert_eq!(cache.get("key1").await, CacheLookup::Miss);

        assert_eq!(cache.set("key1", "value1", Duration::from_secs(60)).await, CacheWrite::Ack);
        assert_eq!(
            cache.get("key1").await,
            CacheLookup::Hit(CachedValue::Raw(String::from("value1")))
        );

        assert_eq!(cache.delete("key1").await, CacheWrite::Ack);
        assert_eq!(cache.get("key1").await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = TimedCache::in_memory();

        cache.set("key1", "value1", Duration::from_millis(50)).await;
        assert!(cache.get("key1").await.is_hit());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("key1").await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn structured_values_are_decoded_transparently() {
        let cache = TimedCache::in_memory();

        cache.set("flag", "true", Duration::from_secs(60)).await;
        cache.set("obj", r#"{"a":1}"#, Duration::from_secs(60)).await;

        assert_eq!(
            cache.get("flag").await,
            CacheLookup::Hit(CachedValue::Structured(Value::Bool(true)))
        );
        assert_eq!(
            cache.get("obj").await,
            CacheLookup::Hit(CachedValue::Structured(serde_json::json!({"a": 1})))
        );
    }

    #[tokio::test]
    async fn broken_json_is_returned_raw() {
        let cache = TimedCache::in_memory();
        cache.set("broken", "{not json", Duration::from_secs(60)).await;

        assert_eq!(
            cache.get("broken").await,
            CacheLookup::Hit(CachedValue::Raw(String::from("{not json")))
        );
    }

    #[tokio::test]
    async fn typed_round_trip_through_json() {
        let cache = TimedCache::in_memory();
        let value = vec![String::from("egg"), String::from("flour")];

        assert_eq!(cache.set_json("list", &value, Duration::from_secs(60)).await, CacheWrite::Ack);
        assert_eq!(cache.get_as::<Vec<String>>("list").await, Some(value));
        assert_eq!(cache.get_as::<u32>("list").await, None);
    }

    #[tokio::test]
    async fn unready_backend_degrades_every_operation() {
        let cache = TimedCache::new(Arc::new(UnreadyBackend));

        assert_eq!(cache.get("key").await, CacheLookup::Miss);
        assert_eq!(cache.set("key", "v", Duration::from_secs(1)).await, CacheWrite::Degraded);
        assert_eq!(cache.delete("key").await, CacheWrite::Degraded);
        assert!(!cache.ping().await);
    }

    #[tokio::test]
    async fn memory_backend_sweeps_expired_entries() {
        let backend = MemoryBackend::new();
        backend.set("a", String::from("1"), Duration::from_millis(10)).await.expect("set");
        backend.set("b", String::from("2"), Duration::from_secs(60)).await.expect("set");
        assert_eq!(backend.len().await, 2);

        tokio::time::sleep(Duration::from_millis(30)).await;
        backend.clear_expired().await;
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn unencodable_values_degrade_the_write() {
        let cache = TimedCache::in_memory();
        let mut value = HashMap::new();
        value.insert(vec![1_u8], 1_u8);

        assert_eq!(
            cache.set_json("bad", &value, Duration::from_secs(60)).await,
            CacheWrite::Degraded
        );
        assert_eq!(cache.get("bad").await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn oversized_ttl_is_stored_without_overflow() {
        let backend = MemoryBackend::new();
        backend
            .set("forever", String::from("1"), Duration::MAX)
            .await
            .expect("set");

        assert_eq!(backend.get("forever").await.expect("get"), Some(String::from("1")));
        backend.clear_expired().await;
        assert_eq!(backend.len().await, 1);

        let cache = TimedCache::in_memory();
        let max = Duration::from_secs(u64::MAX);
        assert_eq!(cache.set("flag", "true", max).await, CacheWrite::Ack);
        assert!(cache.get("flag").await.is_hit());
    }

    #[test]
    fn truthiness_of_cached_values() {
        assert!(CachedValue::Structured(Value::Bool(true)).is_truthy());
        assert!(!CachedValue::Structured(Value::Bool(false)).is_truthy());
        assert!(CachedValue::Raw(String::from("1")).is_truthy());
        assert!(!CachedValue::Raw(String::from("0")).is_truthy());
    }
}
