//! Partition routing
//!
//! Maps `(fs id, inode id)` to the partition owning the inode and to the
//! address of the copyset leader that must answer for it.

use crate::cache::TopologyCache;
use crate::transport::MetaTransport;
use fsaudit_common::{CopysetInfo, Error, FsId, InodeId, LeaderAddr, PartitionInfo, Result};
use std::sync::Arc;

/// Partition and leader an inode's requests go to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub partition: PartitionInfo,
    pub leader: LeaderAddr,
}

/// Resolves inodes to partitions and leaders through the topology cache
#[derive(Clone)]
pub struct PartitionRouter {
    transport: Arc<dyn MetaTransport>,
    cache: Arc<TopologyCache>,
}

impl PartitionRouter {
    #[must_use]
    pub fn new(transport: Arc<dyn MetaTransport>, cache: Arc<TopologyCache>) -> Self {
        Self { transport, cache }
    }

    /// The cache backing this router
    #[must_use]
    pub fn cache(&self) -> &Arc<TopologyCache> {
        &self.cache
    }

    /// All partitions of `fs_id`
    ///
    /// An fs without partitions is reported as not found and never cached.
    pub async fn partitions(&self, fs_id: FsId) -> Result<Arc<[PartitionInfo]>> {
        let transport = &self.transport;
        self.cache
            .partitions(fs_id, move || async move {
                let not_found = || Error::FsNotFound(format!("fsid {fs_id}"));
                let list = transport
                    .list_partitions(fs_id)
                    .await?
                    .into_result("ListPartition", not_found)?;
                if list.is_empty() {
                    return Err(not_found());
                }
                Ok(list)
            })
            .await
    }

    /// The partition of `fs_id` whose range covers `inode_id`
    ///
    /// Partitions never overlap, so the first match is the only one. A miss
    /// is terminal: the cached list is not refreshed.
    pub async fn resolve_partition(&self, fs_id: FsId, inode_id: InodeId) -> Result<PartitionInfo> {
        self.partitions(fs_id)
            .await?
            .iter()
            .find(|p| p.owns(fs_id, inode_id))
            .cloned()
            .ok_or(Error::PartitionNotFound { fs_id, inode_id })
    }

    /// Descriptor of copyset `(pool_id, copyset_id)`
    pub async fn copyset(&self, pool_id: u32, copyset_id: u32) -> Result<CopysetInfo> {
        let transport = &self.transport;
        self.cache
            .copyset(pool_id, copyset_id, move || async move {
                transport
                    .get_copyset(pool_id, copyset_id)
                    .await?
                    .into_result("GetCopysetsInfo", || Error::CopysetNotFound {
                        pool_id,
                        copyset_id,
                    })
            })
            .await
    }

    /// Leader address of the copyset replicating `partition`
    pub async fn leader_of(&self, partition: &PartitionInfo) -> Result<LeaderAddr> {
        self.cache
            .leader(partition.partition_id, move || async move {
                let copyset = self.copyset(partition.pool_id, partition.copyset_id).await?;
                let peer = copyset.leader_peer.as_deref().ok_or_else(|| {
                    Error::InvalidPeer(format!(
                        "copyset {}:{} has no leader",
                        copyset.pool_id, copyset.copyset_id
                    ))
                })?;
                LeaderAddr::from_peer(peer)
            })
            .await
    }

    /// Leader address answering for `inode_id`
    pub async fn resolve_leader(&self, fs_id: FsId, inode_id: InodeId) -> Result<LeaderAddr> {
        Ok(self.route(fs_id, inode_id).await?.leader)
    }

    /// Partition and leader answering for `inode_id`
    pub async fn route(&self, fs_id: FsId, inode_id: InodeId) -> Result<Route> {
        let partition = self.resolve_partition(fs_id, inode_id).await?;
        let leader = self.leader_of(&partition).await?;
        Ok(Route { partition, leader })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheCounters;
    use crate::mock::{Fault, MockTransport, Op};

    fn router(mock: &Arc<MockTransport>) -> PartitionRouter {
        PartitionRouter::new(mock.clone(), Arc::new(TopologyCache::new()))
    }

    #[tokio::test]
    async fn test_resolve_partition_covers_range() {
        let mock = Arc::new(
            MockTransport::new()
                .with_partition(1, 1, 1, 1, 0, 99)
                .with_partition(1, 1, 2, 2, 100, 199),
        );
        let router = router(&mock);
        let fs = FsId::new(1);

        for (inode, expected) in [(0, 1), (99, 1), (100, 2), (199, 2)] {
            let p = router.resolve_partition(fs, InodeId::new(inode)).await.unwrap();
            assert_eq!(p.partition_id.get(), expected);
        }

        let err = router.resolve_partition(fs, InodeId::new(200)).await.unwrap_err();
        assert!(matches!(err, Error::PartitionNotFound { .. }));
        assert_eq!(mock.calls(Op::ListPartitions), 1);
    }

    #[tokio::test]
    async fn test_resolve_leader_is_cached() {
        let mock = Arc::new(
            MockTransport::new()
                .with_partition(1, 1, 1, 1, 0, 99)
                .with_copyset(1, 1, Some("10.0.0.1:6701:0")),
        );
        let router = router(&mock);

        let first = router.resolve_leader(FsId::new(1), InodeId::new(5)).await.unwrap();
        let second = router.resolve_leader(FsId::new(1), InodeId::new(5)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "10.0.0.1:6701");
        assert_eq!(mock.calls(Op::ListPartitions), 1);
        assert_eq!(mock.calls(Op::GetCopyset), 1);
        assert_eq!(router.cache().stats().leaders, CacheCounters { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn test_partitions_share_copyset() {
        let mock = Arc::new(
            MockTransport::new()
                .with_partition(1, 1, 1, 1, 0, 99)
                .with_partition(1, 1, 1, 2, 100, 199)
                .with_copyset(1, 1, Some("10.0.0.1:6701:0")),
        );
        let router = router(&mock);

        router.resolve_leader(FsId::new(1), InodeId::new(5)).await.unwrap();
        router.resolve_leader(FsId::new(1), InodeId::new(150)).await.unwrap();
        assert_eq!(mock.calls(Op::GetCopyset), 1);
        assert_eq!(router.cache().len(), (1, 1, 2));
    }

    #[tokio::test]
    async fn test_leader_errors() {
        let mock = Arc::new(
            MockTransport::new()
                .with_partition(1, 1, 1, 1, 0, 99)
                .with_partition(1, 1, 2, 2, 100, 199)
                .with_partition(1, 1, 3, 3, 200, 299)
                .with_copyset(1, 1, None)
                .with_copyset(1, 2, Some("10.0.0.1")),
        );
        let router = router(&mock);
        let fs = FsId::new(1);

        let no_leader = router.resolve_leader(fs, InodeId::new(1)).await.unwrap_err();
        assert!(matches!(no_leader, Error::InvalidPeer(_)));

        let bad_peer = router.resolve_leader(fs, InodeId::new(100)).await.unwrap_err();
        assert!(matches!(bad_peer, Error::InvalidPeer(_)));

        let missing = router.resolve_leader(fs, InodeId::new(200)).await.unwrap_err();
        assert!(matches!(missing, Error::CopysetNotFound { pool_id: 1, copyset_id: 3 }));
    }

    #[tokio::test]
    async fn test_unknown_fs() {
        let mock = Arc::new(MockTransport::new());
        let err = router(&mock)
            .resolve_partition(FsId::new(7), InodeId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FsNotFound(_)));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_empty_partition_list_not_cached() {
        let mock = Arc::new(
            MockTransport::new()
                .with_partition(1, 1, 1, 1, 0, 99)
                .with_fault(Op::ListPartitions, Fault::Empty),
        );
        let router = router(&mock);

        for _ in 0..2 {
            let err = router.partitions(FsId::new(1)).await.unwrap_err();
            assert!(matches!(err, Error::FsNotFound(_)));
        }
        assert_eq!(mock.calls(Op::ListPartitions), 2);
        assert!(router.cache().is_empty());
    }
}
