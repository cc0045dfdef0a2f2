//! Session facade over the resolution engine

use crate::accessor::MetadataAccessor;
use crate::cache::{TopologyCache, TopologyCacheStats};
use crate::fs;
use crate::quota::QuotaCheck;
use crate::resolver::PathResolver;
use crate::router::PartitionRouter;
use crate::summary::DirectoryAggregator;
use crate::transport::{FsSelector, MetaTransport};
use fsaudit_common::{Config, FsId, FsInfo, InodeId, Quota, ROOT_INODE_ID, Result, Summary};
use std::sync::Arc;
use tracing::info;

/// One administrative session: a transport plus the topology cache it fills
#[derive(Clone)]
pub struct MetaClient {
    transport: Arc<dyn MetaTransport>,
    cache: Arc<TopologyCache>,
    accessor: MetadataAccessor,
    resolver: PathResolver,
    aggregator: DirectoryAggregator,
}

impl MetaClient {
    /// Create a session with an empty topology cache
    #[must_use]
    pub fn new(transport: Arc<dyn MetaTransport>, config: &Config) -> Self {
        let cache = Arc::new(TopologyCache::new());
        let router = PartitionRouter::new(transport.clone(), cache.clone());
        let accessor = MetadataAccessor::new(transport.clone(), router);
        let max_depth = config.summary.max_depth;

        Self {
            resolver: PathResolver::new(accessor.clone(), max_depth),
            aggregator: DirectoryAggregator::new(accessor.clone(), max_depth),
            transport,
            cache,
            accessor,
        }
    }

    #[must_use]
    pub fn accessor(&self) -> &MetadataAccessor {
        &self.accessor
    }

    pub async fn fs_info(&self, selector: &FsSelector) -> Result<FsInfo> {
        fs::fs_info(self.transport.as_ref(), selector).await
    }

    pub async fn resolve_fs_id(&self, selector: &FsSelector) -> Result<FsId> {
        fs::resolve_fs_id(self.transport.as_ref(), selector).await
    }

    pub async fn resolve_fs_name(&self, selector: &FsSelector) -> Result<String> {
        fs::resolve_fs_name(self.transport.as_ref(), selector).await
    }

    pub async fn path_to_inode(&self, fs_id: FsId, path: &str) -> Result<InodeId> {
        self.resolver.path_to_inode(fs_id, path).await
    }

    pub async fn inode_to_path(&self, fs_id: FsId, inode_id: InodeId) -> Result<Option<String>> {
        self.resolver.inode_to_path(fs_id, inode_id).await
    }

    pub async fn summarize_directory(&self, fs_id: FsId, dir: InodeId) -> Result<Summary> {
        self.aggregator.summarize(fs_id, dir).await
    }

    pub async fn get_dir_quota(&self, fs_id: FsId, dir: InodeId) -> Result<Quota> {
        self.accessor.get_dir_quota(fs_id, dir).await
    }

    pub async fn get_fs_quota(&self, fs_id: FsId) -> Result<Quota> {
        self.accessor.get_fs_quota(fs_id).await
    }

    /// Recompute usage below `path` and compare it with the directory quota
    pub async fn check_dir_quota(&self, fs_id: FsId, path: &str) -> Result<QuotaCheck> {
        let dir = self.path_to_inode(fs_id, path).await?;
        let quota = self.get_dir_quota(fs_id, dir).await?;
        let real = self.summarize_directory(fs_id, dir).await?;

        let check = QuotaCheck::new(quota, real);
        info!(%fs_id, path, consistent = check.consistent, "checked directory quota");
        Ok(check)
    }

    /// Recompute usage of the whole filesystem and compare it with the fs quota
    pub async fn check_fs_quota(&self, fs_id: FsId) -> Result<QuotaCheck> {
        let quota = self.get_fs_quota(fs_id).await?;
        let real = self.summarize_directory(fs_id, ROOT_INODE_ID).await?;

        let check = QuotaCheck::new(quota, real);
        info!(%fs_id, consistent = check.consistent, "checked fs quota");
        Ok(check)
    }

    #[must_use]
    pub fn cache_stats(&self) -> TopologyCacheStats {
        self.cache.stats()
    }
}
