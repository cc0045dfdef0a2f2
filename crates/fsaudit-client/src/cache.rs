//! Topology cache
//!
//! Three independent read-through maps populated lazily for the lifetime of
//! a session:
//!
//! - fs id -> partition list
//! - copyset key -> copyset descriptor
//! - partition id -> leader address
//!
//! Entries are never refreshed or evicted. Each map is a sharded concurrent
//! map, so inserts are free of data races; two callers missing the same key
//! at once both fetch, and the last insert wins.

use dashmap::DashMap;
use fsaudit_common::{CopysetInfo, CopysetKey, FsId, LeaderAddr, PartitionId, PartitionInfo, Result};
use serde::Serialize;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Hit/miss counters of one map
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl CacheStats {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    #[must_use]
    pub fn snapshot(&self) -> CacheCounters {
        CacheCounters {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`CacheStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
}

/// Counters of all three maps
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TopologyCacheStats {
    pub partitions: CacheCounters,
    pub copysets: CacheCounters,
    pub leaders: CacheCounters,
}

/// Session-scoped cache of partition, copyset and leader lookups
#[derive(Debug, Default)]
pub struct TopologyCache {
    partitions: DashMap<FsId, Arc<[PartitionInfo]>>,
    copysets: DashMap<CopysetKey, CopysetInfo>,
    leaders: DashMap<PartitionId, LeaderAddr>,
    partition_stats: CacheStats,
    copyset_stats: CacheStats,
    leader_stats: CacheStats,
}

impl TopologyCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition list of `fs_id`, running `fetch` on a miss
    pub async fn partitions<F, Fut>(&self, fs_id: FsId, fetch: F) -> Result<Arc<[PartitionInfo]>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<PartitionInfo>>>,
    {
        read_through(&self.partitions, fs_id, &self.partition_stats, move || async move {
            fetch().await.map(Arc::from)
        })
        .await
    }

    /// Copyset `(pool_id, copyset_id)`, running `fetch` on a miss
    pub async fn copyset<F, Fut>(&self, pool_id: u32, copyset_id: u32, fetch: F) -> Result<CopysetInfo>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CopysetInfo>>,
    {
        let key = CopysetKey::new(pool_id, copyset_id);
        read_through(&self.copysets, key, &self.copyset_stats, fetch).await
    }

    /// Leader address serving `partition_id`, running `fetch` on a miss
    pub async fn leader<F, Fut>(&self, partition_id: PartitionId, fetch: F) -> Result<LeaderAddr>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LeaderAddr>>,
    {
        read_through(&self.leaders, partition_id, &self.leader_stats, fetch).await
    }

    /// Hit/miss counters of every map
    #[must_use]
    pub fn stats(&self) -> TopologyCacheStats {
        TopologyCacheStats {
            partitions: self.partition_stats.snapshot(),
            copysets: self.copyset_stats.snapshot(),
            leaders: self.leader_stats.snapshot(),
        }
    }

    /// Number of cached entries per map: (partition lists, copysets, leaders)
    #[must_use]
    pub fn len(&self) -> (usize, usize, usize) {
        (self.partitions.len(), self.copysets.len(), self.leaders.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty() && self.copysets.is_empty() && self.leaders.is_empty()
    }
}

async fn read_through<K, V, F, Fut>(
    map: &DashMap<K, V>,
    key: K,
    stats: &CacheStats,
    fetch: F,
) -> Result<V>
where
    K: Eq + Hash + Copy + std::fmt::Debug,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>>,
{
    if let Some(value) = map.get(&key).map(|entry| entry.value().clone()) {
        stats.hit();
        debug!(?key, "topology cache hit");
        return Ok(value);
    }

    stats.miss();
    debug!(?key, "topology cache miss");
    let value = fetch().await?;
    map.insert(key, value.clone());
    Ok(value)
}
