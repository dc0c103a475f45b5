// Two-tier cache (memory + file) with TTL, LRU, and namespaces

//! # Cache Engine
//!
//! [`CacheManager`] keeps a fast in-memory tier and a persistent file tier.
//! Entries are addressed by `(namespace, key)`; callers pick per-call which
//! tiers participate via [`CacheStrategy`].
//!
//! ## Tier behavior
//!
//! - **Memory**: bounded by `memory_max_entries`; when full, the least
//!   recently accessed entry is evicted. Access order is tracked with a
//!   monotonic counter, not wall-clock time.
//! - **File**: one JSON file per entry under
//!   `<cache_dir>/<hash(namespace)>/<hash(namespace:key)>.cache`, written to
//!   a temp file and renamed so readers never see a partial write. A file
//!   that fails to parse counts as a miss and is removed.
//!
//! Expiry is lazy on read plus a periodic background sweep started by
//! [`CacheManager::initialize`]. A TTL of zero means the entry never expires.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::Result;

/// Which tiers a cache operation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    MemoryOnly,
    FileOnly,
    /// Write both tiers; read memory first, then file (promoting hits)
    Both,
}

#[derive(Debug)]
struct MemoryEntry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
    /// Monotonic access stamp used for LRU eviction
    stamp: AtomicU64,
}

impl MemoryEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

/// On-disk entry layout
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    value: Value,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    namespace: String,
    key: String,
    ttl_seconds: u64,
}

impl FileEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

/// Counters reported by [`CacheManager::stats`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_entries: u64,
    pub memory_max_entries: u64,
    /// Memory entries per namespace
    pub entries_by_namespace: HashMap<String, u64>,
    pub file_entries: u64,
    pub file_bytes: u64,
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub file_hits: u64,
    pub file_misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub expired_removed: u64,
}

/// Two-tier cache with namespace partitioning
pub struct CacheManager {
    config: CacheConfig,
    memory: DashMap<String, MemoryEntry>,
    access_counter: AtomicU64,
    shutdown_token: CancellationToken,

    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    file_hits: AtomicU64,
    file_misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
    expired_removed: AtomicU64,
}

impl CacheManager {
    /// Create a manager and ensure the file-tier directory exists
    pub fn new(config: CacheConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.cache_dir)?;
        Ok(Self {
            config,
            memory: DashMap::new(),
            access_counter: AtomicU64::new(0),
            shutdown_token: CancellationToken::new(),
            memory_hits: AtomicU64::new(0),
            memory_misses: AtomicU64::new(0),
            file_hits: AtomicU64::new(0),
            file_misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired_removed: AtomicU64::new(0),
        })
    }

    /// Start the background expiry sweep
    pub fn initialize(self: Arc<Self>) {
        let cache = Arc::clone(&self);
        let token = self.shutdown_token.clone();
        let interval = self.config.cleanup_interval();
        info!("🗄️  Cache sweep started (every {:?})", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = cache.cleanup_expired().await {
                            warn!("Cache sweep failed: {}", e);
                        }
                    }
                }
            }
            debug!("Cache sweep stopped");
        });
    }

    /// Stop the background sweep
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    /// Store a value
    ///
    /// `ttl_seconds` falls back to the configured default when `None`; zero
    /// means no expiry.
    pub async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        ttl_seconds: Option<u64>,
        strategy: CacheStrategy,
    ) -> Result<()> {
        let ttl = ttl_seconds.unwrap_or(self.config.default_ttl_seconds);
        let now = Utc::now();
        let expires_at = if ttl == 0 {
            None
        } else {
            Some(now + chrono::Duration::seconds(ttl as i64))
        };
        let full_key = Self::full_key(namespace, key);

        if strategy != CacheStrategy::FileOnly {
            if !self.memory.contains_key(&full_key)
                && self.memory.len() >= self.config.memory_max_entries
            {
                self.evict_one();
            }
            self.memory.insert(
                full_key.clone(),
                MemoryEntry {
                    value: value.clone(),
                    expires_at,
                    stamp: AtomicU64::new(self.next_stamp()),
                },
            );
        }

        if strategy != CacheStrategy::MemoryOnly {
            let entry = FileEntry {
                value,
                created_at: now,
                expires_at,
                namespace: namespace.to_string(),
                key: key.to_string(),
                ttl_seconds: ttl,
            };
            self.write_file_entry(namespace, &full_key, &entry).await?;
        }

        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Look up a value, expiring it lazily when its TTL has passed
    pub async fn get(
        &self,
        namespace: &str,
        key: &str,
        strategy: CacheStrategy,
    ) -> Result<Option<Value>> {
        let full_key = Self::full_key(namespace, key);
        let now = Utc::now();

        if strategy != CacheStrategy::FileOnly {
            if let Some(entry) = self.memory.get(&full_key) {
                if entry.is_expired(now) {
                    drop(entry);
                    self.memory.remove(&full_key);
                    self.expired_removed.fetch_add(1, Ordering::Relaxed);
                } else {
                    entry.stamp.store(self.next_stamp(), Ordering::Relaxed);
                    self.memory_hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.value.clone()));
                }
            } else {
                self.memory_misses.fetch_add(1, Ordering::Relaxed);
            }
            if strategy == CacheStrategy::MemoryOnly {
                return Ok(None);
            }
        }

        // File tier
        let path = self.entry_path(namespace, &full_key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => {
                self.file_misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        let entry: FileEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Removing corrupted cache file {:?}: {}", path, e);
                let _ = tokio::fs::remove_file(&path).await;
                self.file_misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        if entry.is_expired(now) {
            let _ = tokio::fs::remove_file(&path).await;
            self.expired_removed.fetch_add(1, Ordering::Relaxed);
            self.file_misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        self.file_hits.fetch_add(1, Ordering::Relaxed);

        // Promote to memory so the next read is cheap
        if strategy == CacheStrategy::Both {
            if !self.memory.contains_key(&full_key)
                && self.memory.len() >= self.config.memory_max_entries
            {
                self.evict_one();
            }
            self.memory.insert(
                full_key,
                MemoryEntry {
                    value: entry.value.clone(),
                    expires_at: entry.expires_at,
                    stamp: AtomicU64::new(self.next_stamp()),
                },
            );
        }

        Ok(Some(entry.value))
    }

    /// Remove one entry from both tiers
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let full_key = Self::full_key(namespace, key);
        self.memory.remove(&full_key);
        let path = self.entry_path(namespace, &full_key);
        let _ = tokio::fs::remove_file(path).await;
        Ok(())
    }

    /// Drop every entry in a namespace, returning how many were removed
    pub async fn clear_namespace(&self, namespace: &str) -> Result<u64> {
        let prefix = format!("{namespace}:");
        let doomed: Vec<String> = self
            .memory
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| e.key().clone())
            .collect();
        let mut removed = 0u64;
        for key in doomed {
            if self.memory.remove(&key).is_some() {
                removed += 1;
            }
        }

        let dir = self.namespace_dir(namespace);
        if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if tokio::fs::remove_file(entry.path()).await.is_ok() {
                    removed += 1;
                }
            }
            let _ = tokio::fs::remove_dir(&dir).await;
        }

        debug!("🧹 Cleared {} entries from namespace '{}'", removed, namespace);
        Ok(removed)
    }

    /// Remove entries whose `namespace:key` matches a glob pattern,
    /// returning the count
    ///
    /// The pattern spans namespaces, so `indexes:*` clears one namespace
    /// while `*:urn-1*` cuts across all of them.
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<u64> {
        let matcher = glob::Pattern::new(pattern)
            .map_err(|e| crate::AgentCoreError::Validation(format!("bad glob pattern: {e}")))?;
        let mut removed = 0u64;

        let doomed: Vec<String> = self
            .memory
            .iter()
            .filter(|e| matcher.matches(e.key()))
            .map(|e| e.key().clone())
            .collect();
        for key in doomed {
            if self.memory.remove(&key).is_some() {
                removed += 1;
            }
        }

        let mut namespaces = match tokio::fs::read_dir(&self.config.cache_dir).await {
            Ok(namespaces) => namespaces,
            Err(_) => return Ok(removed),
        };
        while let Ok(Some(ns_dir)) = namespaces.next_entry().await {
            let Ok(mut files) = tokio::fs::read_dir(ns_dir.path()).await else {
                continue;
            };
            while let Ok(Some(file)) = files.next_entry().await {
                let path = file.path();
                let Ok(bytes) = tokio::fs::read(&path).await else {
                    continue;
                };
                match serde_json::from_slice::<FileEntry>(&bytes) {
                    Ok(entry)
                        if matcher.matches(&Self::full_key(&entry.namespace, &entry.key)) =>
                    {
                        if tokio::fs::remove_file(&path).await.is_ok() {
                            removed += 1;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => {
                        // corrupted files match nothing but still get swept
                        let _ = tokio::fs::remove_file(&path).await;
                    }
                }
            }
        }

        Ok(removed)
    }

    /// Sweep both tiers for expired (and corrupted) entries
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut removed = 0u64;

        let expired: Vec<String> = self
            .memory
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();
        for key in expired {
            if self.memory.remove(&key).is_some() {
                removed += 1;
            }
        }

        let mut namespaces = match tokio::fs::read_dir(&self.config.cache_dir).await {
            Ok(namespaces) => namespaces,
            Err(_) => return Ok(removed),
        };
        while let Ok(Some(ns_dir)) = namespaces.next_entry().await {
            let Ok(mut files) = tokio::fs::read_dir(ns_dir.path()).await else {
                continue;
            };
            while let Ok(Some(file)) = files.next_entry().await {
                let path = file.path();
                let Ok(bytes) = tokio::fs::read(&path).await else {
                    continue;
                };
                let expired = match serde_json::from_slice::<FileEntry>(&bytes) {
                    Ok(entry) => entry.is_expired(now),
                    Err(_) => true, // unreadable entries are dropped
                };
                if expired && tokio::fs::remove_file(&path).await.is_ok() {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!("🧹 Expiry sweep removed {} entries", removed);
            self.expired_removed.fetch_add(removed, Ordering::Relaxed);
        }
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        let mut entries_by_namespace: HashMap<String, u64> = HashMap::new();
        for entry in self.memory.iter() {
            if let Some((namespace, _)) = entry.key().split_once(':') {
                *entries_by_namespace.entry(namespace.to_string()).or_insert(0) += 1;
            }
        }

        let mut file_entries = 0u64;
        let mut file_bytes = 0u64;
        if let Ok(namespaces) = std::fs::read_dir(&self.config.cache_dir) {
            for ns_dir in namespaces.flatten() {
                let Ok(files) = std::fs::read_dir(ns_dir.path()) else {
                    continue;
                };
                for file in files.flatten() {
                    if let Ok(meta) = file.metadata() {
                        if meta.is_file() {
                            file_entries += 1;
                            file_bytes += meta.len();
                        }
                    }
                }
            }
        }

        CacheStats {
            memory_entries: self.memory.len() as u64,
            memory_max_entries: self.config.memory_max_entries as u64,
            entries_by_namespace,
            file_entries,
            file_bytes,
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            memory_misses: self.memory_misses.load(Ordering::Relaxed),
            file_hits: self.file_hits.load(Ordering::Relaxed),
            file_misses: self.file_misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_removed: self.expired_removed.load(Ordering::Relaxed),
        }
    }

    // ---- Domain convenience wrappers -------------------------------------

    /// Keep serializable agent state across requests (memory tier only)
    pub async fn cache_agent_state(&self, agent_type: &str, state: Value) -> Result<()> {
        self.set("agent_state", agent_type, state, Some(0), CacheStrategy::MemoryOnly)
            .await
    }

    pub async fn get_agent_state(&self, agent_type: &str) -> Result<Option<Value>> {
        self.get("agent_state", agent_type, CacheStrategy::MemoryOnly).await
    }

    /// Cache a built model index for one project version
    pub async fn cache_index(
        &self,
        project_id: &str,
        version_id: &str,
        index: Value,
        ttl: Option<u64>,
    ) -> Result<()> {
        let key = format!("{project_id}:{version_id}");
        self.set("indexes", &key, index, ttl, CacheStrategy::Both).await
    }

    pub async fn get_index(&self, project_id: &str, version_id: &str) -> Result<Option<Value>> {
        let key = format!("{project_id}:{version_id}");
        self.get("indexes", &key, CacheStrategy::Both).await
    }

    /// Cache extracted properties for one model and query
    pub async fn cache_properties(
        &self,
        urn: &str,
        query: &Value,
        properties: Value,
        ttl: Option<u64>,
    ) -> Result<()> {
        let key = format!("{urn}:{}", Self::hash_query(query));
        self.set("properties", &key, properties, ttl, CacheStrategy::Both)
            .await
    }

    pub async fn get_properties(&self, urn: &str, query: &Value) -> Result<Option<Value>> {
        let key = format!("{urn}:{}", Self::hash_query(query));
        self.get("properties", &key, CacheStrategy::Both).await
    }

    /// Remember where a materialized database lives on disk
    pub async fn cache_database_path(&self, urn: &str, path: &str) -> Result<()> {
        self.set(
            "database_paths",
            urn,
            Value::String(path.to_string()),
            Some(0),
            CacheStrategy::Both,
        )
        .await
    }

    pub async fn get_database_path(&self, urn: &str) -> Result<Option<String>> {
        let value = self.get("database_paths", urn, CacheStrategy::Both).await?;
        Ok(value.and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Cache vector-search results for one element group and query
    pub async fn cache_vector_results(
        &self,
        element_group_id: &str,
        query: &Value,
        results: Value,
        ttl: Option<u64>,
    ) -> Result<()> {
        let key = format!("{element_group_id}:{}", Self::hash_query(query));
        self.set("vector_results", &key, results, ttl, CacheStrategy::MemoryOnly)
            .await
    }

    pub async fn get_vector_results(
        &self,
        element_group_id: &str,
        query: &Value,
    ) -> Result<Option<Value>> {
        let key = format!("{element_group_id}:{}", Self::hash_query(query));
        self.get("vector_results", &key, CacheStrategy::MemoryOnly).await
    }

    /// Canonical hash of a JSON query
    ///
    /// Object keys serialize in sorted order, so two queries that differ
    /// only in key order hash identically.
    pub fn hash_query(query: &Value) -> String {
        let canonical = query.to_string();
        format!("{:x}", Sha256::digest(canonical.as_bytes()))
    }

    // ---- Internals -------------------------------------------------------

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{namespace}:{key}")
    }

    fn next_stamp(&self) -> u64 {
        self.access_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove the least recently accessed memory entry
    fn evict_one(&self) {
        let mut victim: Option<(String, u64)> = None;
        for entry in self.memory.iter() {
            let stamp = entry.value().stamp.load(Ordering::Relaxed);
            match &victim {
                Some((_, lowest)) if stamp >= *lowest => {}
                _ => victim = Some((entry.key().clone(), stamp)),
            }
        }
        if let Some((key, _)) = victim {
            self.memory.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        let hash = format!("{:x}", Sha256::digest(namespace.as_bytes()));
        self.config.cache_dir.join(&hash[..16])
    }

    fn entry_path(&self, namespace: &str, full_key: &str) -> PathBuf {
        let hash = format!("{:x}", Sha256::digest(full_key.as_bytes()));
        self.namespace_dir(namespace).join(format!("{}.cache", &hash[..32]))
    }

    async fn write_file_entry(
        &self,
        namespace: &str,
        full_key: &str,
        entry: &FileEntry,
    ) -> Result<()> {
        let path = self.entry_path(namespace, full_key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(entry)?;
        // temp-then-rename keeps readers away from partial writes
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("memory_entries", &self.memory.len())
            .field("cache_dir", &self.config.cache_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager_in(dir: &std::path::Path, max_entries: usize) -> CacheManager {
        CacheManager::new(CacheConfig {
            cache_dir: dir.to_path_buf(),
            memory_max_entries: max_entries,
            default_ttl_seconds: 3600,
            cleanup_interval_seconds: 300,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_per_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        for strategy in [CacheStrategy::MemoryOnly, CacheStrategy::FileOnly, CacheStrategy::Both] {
            let key = format!("k-{strategy:?}");
            cache
                .set("ns", &key, json!({"n": 1}), None, strategy)
                .await
                .unwrap();
            let value = cache.get("ns", &key, strategy).await.unwrap();
            assert_eq!(value, Some(json!({"n": 1})));
        }
    }

    #[tokio::test]
    async fn test_tier_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache
            .set("ns", "mem", json!(1), None, CacheStrategy::MemoryOnly)
            .await
            .unwrap();
        assert_eq!(cache.get("ns", "mem", CacheStrategy::FileOnly).await.unwrap(), None);

        cache
            .set("ns", "file", json!(2), None, CacheStrategy::FileOnly)
            .await
            .unwrap();
        assert_eq!(
            cache.get("ns", "file", CacheStrategy::MemoryOnly).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_namespaces_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache
            .set("a", "shared", json!("from-a"), None, CacheStrategy::Both)
            .await
            .unwrap();
        cache
            .set("b", "shared", json!("from-b"), None, CacheStrategy::Both)
            .await
            .unwrap();

        assert_eq!(
            cache.get("a", "shared", CacheStrategy::Both).await.unwrap(),
            Some(json!("from-a"))
        );
        assert_eq!(
            cache.get("b", "shared", CacheStrategy::Both).await.unwrap(),
            Some(json!("from-b"))
        );
    }

    #[tokio::test]
    async fn test_ttl_expiry_is_lazy() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache
            .set("ns", "brief", json!(1), Some(1), CacheStrategy::Both)
            .await
            .unwrap();
        assert!(cache.get("ns", "brief", CacheStrategy::Both).await.unwrap().is_some());

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert_eq!(cache.get("ns", "brief", CacheStrategy::Both).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache
            .set("ns", "forever", json!(1), Some(0), CacheStrategy::Both)
            .await
            .unwrap();
        let removed = cache.cleanup_expired().await.unwrap();
        assert_eq!(removed, 0);
        assert!(cache.get("ns", "forever", CacheStrategy::Both).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lru_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 3);

        for key in ["a", "b", "c"] {
            cache
                .set("ns", key, json!(key), None, CacheStrategy::MemoryOnly)
                .await
                .unwrap();
        }
        // touch "a" so "b" becomes least recently used
        cache.get("ns", "a", CacheStrategy::MemoryOnly).await.unwrap();

        cache
            .set("ns", "d", json!("d"), None, CacheStrategy::MemoryOnly)
            .await
            .unwrap();

        assert!(cache.get("ns", "a", CacheStrategy::MemoryOnly).await.unwrap().is_some());
        assert_eq!(cache.get("ns", "b", CacheStrategy::MemoryOnly).await.unwrap(), None);
        assert!(cache.get("ns", "c", CacheStrategy::MemoryOnly).await.unwrap().is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_clear_namespace_counts() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        for key in ["x", "y", "z"] {
            cache
                .set("doomed", key, json!(1), None, CacheStrategy::MemoryOnly)
                .await
                .unwrap();
        }
        cache
            .set("kept", "x", json!(1), None, CacheStrategy::MemoryOnly)
            .await
            .unwrap();

        let removed = cache.clear_namespace("doomed").await.unwrap();
        assert_eq!(removed, 3);
        assert!(cache.get("kept", "x", CacheStrategy::MemoryOnly).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pattern_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        for key in ["user:1", "user:2", "session:1"] {
            cache
                .set("ns", key, json!(1), None, CacheStrategy::Both)
                .await
                .unwrap();
        }

        let removed = cache.invalidate_pattern("ns:user:*").await.unwrap();
        // each matching key lives in both tiers
        assert_eq!(removed, 4);
        assert_eq!(cache.get("ns", "user:1", CacheStrategy::Both).await.unwrap(), None);
        assert!(cache.get("ns", "session:1", CacheStrategy::Both).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pattern_invalidation_spans_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache.set("indexes", "urn-1:v1", json!(1), None, CacheStrategy::Both).await.unwrap();
        cache.set("properties", "urn-1:abc", json!(2), None, CacheStrategy::Both).await.unwrap();
        cache.set("properties", "urn-2:def", json!(3), None, CacheStrategy::Both).await.unwrap();

        // one model's entries, wherever they live
        let removed = cache.invalidate_pattern("*:urn-1*").await.unwrap();
        assert_eq!(removed, 4);
        assert_eq!(cache.get("indexes", "urn-1:v1", CacheStrategy::Both).await.unwrap(), None);
        assert_eq!(
            cache.get("properties", "urn-1:abc", CacheStrategy::Both).await.unwrap(),
            None
        );
        assert!(cache
            .get("properties", "urn-2:def", CacheStrategy::Both)
            .await
            .unwrap()
            .is_some());

        // a whole namespace by prefix
        let removed = cache.invalidate_pattern("properties:*").await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache
            .set("ns", "victim", json!(1), None, CacheStrategy::FileOnly)
            .await
            .unwrap();
        let path = cache.entry_path("ns", &CacheManager::full_key("ns", "victim"));
        std::fs::write(&path, b"not json").unwrap();

        assert_eq!(cache.get("ns", "victim", CacheStrategy::FileOnly).await.unwrap(), None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_hit_promotes_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache
            .set("ns", "warm", json!(9), None, CacheStrategy::FileOnly)
            .await
            .unwrap();
        assert!(cache.get("ns", "warm", CacheStrategy::Both).await.unwrap().is_some());
        // now present in memory too
        assert!(cache
            .get("ns", "warm", CacheStrategy::MemoryOnly)
            .await
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_query_hash_ignores_key_order() {
        let a = json!({"filter": "walls", "limit": 10});
        let b = json!({"limit": 10, "filter": "walls"});
        assert_eq!(CacheManager::hash_query(&a), CacheManager::hash_query(&b));

        let c = json!({"filter": "doors", "limit": 10});
        assert_ne!(CacheManager::hash_query(&a), CacheManager::hash_query(&c));
    }

    #[tokio::test]
    async fn test_agent_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache
            .cache_agent_state("props", json!({"cursor": 42}))
            .await
            .unwrap();
        let state = cache.get_agent_state("props").await.unwrap();
        assert_eq!(state, Some(json!({"cursor": 42})));
        assert_eq!(cache.get_agent_state("other").await.unwrap(), None);
        // agent state never touches the file tier
        assert_eq!(cache.stats().file_entries, 0);
    }

    #[tokio::test]
    async fn test_domain_wrappers_derive_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache
            .cache_index("p-1", "v-1", json!({"elements": 3}), None)
            .await
            .unwrap();
        assert!(cache.get_index("p-1", "v-1").await.unwrap().is_some());
        assert_eq!(cache.get_index("p-1", "v-2").await.unwrap(), None);

        let query = json!({"category": "Walls"});
        cache
            .cache_properties("urn:1", &query, json!([{"id": 7}]), None)
            .await
            .unwrap();
        assert!(cache.get_properties("urn:1", &query).await.unwrap().is_some());
        assert_eq!(
            cache
                .get_properties("urn:1", &json!({"category": "Doors"}))
                .await
                .unwrap(),
            None
        );

        cache.cache_database_path("urn:1", "/tmp/model.db").await.unwrap();
        assert_eq!(
            cache.get_database_path("urn:1").await.unwrap().as_deref(),
            Some("/tmp/model.db")
        );
    }

    #[tokio::test]
    async fn test_stats_cover_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager_in(dir.path(), 100);

        cache.set("a", "k1", json!(1), None, CacheStrategy::Both).await.unwrap();
        cache.set("a", "k2", json!(2), None, CacheStrategy::MemoryOnly).await.unwrap();
        cache.set("b", "k1", json!(3), None, CacheStrategy::FileOnly).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.memory_entries, 2);
        assert_eq!(stats.memory_max_entries, 100);
        assert_eq!(stats.entries_by_namespace["a"], 2);
        assert_eq!(stats.file_entries, 2);
        assert!(stats.file_bytes > 0);
        assert_eq!(stats.sets, 3);
    }
}
