//! Directory subtree aggregation

use crate::accessor::MetadataAccessor;
use fsaudit_common::{Error, FsId, InodeId, Result, Summary};
use futures::future::BoxFuture;
use std::time::Instant;
use tracing::info;

/// Sums byte lengths and counts inodes below a directory
#[derive(Clone)]
pub struct DirectoryAggregator {
    accessor: MetadataAccessor,
    max_depth: usize,
}

impl DirectoryAggregator {
    #[must_use]
    pub fn new(accessor: MetadataAccessor, max_depth: usize) -> Self {
        Self { accessor, max_depth }
    }

    /// Total length of regular and object-backed files below `dir` and the
    /// number of entries below it; `dir` itself is not counted
    pub async fn summarize(&self, fs_id: FsId, dir: InodeId) -> Result<Summary> {
        info!(%fs_id, %dir, "summarizing directory");
        let start = Instant::now();

        let summary = self.walk(fs_id, dir, 0).await?;

        info!(
            %fs_id,
            %dir,
            length = summary.length,
            inodes = summary.inodes,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "directory summarized"
        );
        Ok(summary)
    }

    // Depth first, in listing order, one remote call at a time
    fn walk(&self, fs_id: FsId, dir: InodeId, depth: usize) -> BoxFuture<'_, Result<Summary>> {
        Box::pin(async move {
            if depth >= self.max_depth {
                return Err(Error::DepthExceeded {
                    inode_id: dir,
                    max_depth: self.max_depth,
                });
            }

            let mut summary = Summary::default();
            for entry in self.accessor.list_entries(fs_id, dir).await? {
                summary.inodes += 1;
                if entry.file_type.has_data() {
                    let attr = self.accessor.get_attr(fs_id, entry.inode_id).await?;
                    summary.length += attr.length;
                } else if entry.file_type.is_dir() {
                    summary += self.walk(fs_id, entry.inode_id, depth + 1).await?;
                }
            }
            Ok(summary)
        })
    }
}
