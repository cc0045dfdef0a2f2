//! Single-object metadata lookups
//!
//! Each call routes to the leader of the partition owning the addressed
//! inode and turns the service verdict into a typed result.

use crate::router::PartitionRouter;
use crate::transport::MetaTransport;
use fsaudit_common::{Dentry, Error, FsId, InodeAttr, InodeId, Quota, ROOT_INODE_ID, Result};
use std::sync::Arc;
use tracing::debug;

/// Inode, dentry and quota lookups against partition leaders
#[derive(Clone)]
pub struct MetadataAccessor {
    transport: Arc<dyn MetaTransport>,
    router: PartitionRouter,
}

impl MetadataAccessor {
    #[must_use]
    pub fn new(transport: Arc<dyn MetaTransport>, router: PartitionRouter) -> Self {
        Self { transport, router }
    }

    #[must_use]
    pub fn router(&self) -> &PartitionRouter {
        &self.router
    }

    /// Attributes of one inode
    pub async fn get_attr(&self, fs_id: FsId, inode_id: InodeId) -> Result<InodeAttr> {
        let route = self.router.route(fs_id, inode_id).await?;
        let mut attrs = self
            .transport
            .batch_get_inode_attr(&route.leader, &route.partition, &[inode_id])
            .await?
            .into_result("BatchGetInodeAttr", || Error::InodeNotFound { fs_id, inode_id })?;

        if attrs.len() != 1 {
            return Err(Error::invariant(format!(
                "expected 1 attribute for inode {inode_id} of fs {fs_id}, got {}",
                attrs.len()
            )));
        }
        let attr = attrs.remove(0);
        debug!(%fs_id, %inode_id, file_type = %attr.file_type, length = attr.length, "got inode attr");
        Ok(attr)
    }

    /// Entries of directory `dir`, in listing order
    pub async fn list_entries(&self, fs_id: FsId, dir: InodeId) -> Result<Vec<Dentry>> {
        let route = self.router.route(fs_id, dir).await?;
        let entries = self
            .transport
            .list_dentry(&route.leader, &route.partition, dir)
            .await?
            .into_result("ListDentry", || Error::InodeNotFound {
                fs_id,
                inode_id: dir,
            })?;
        debug!(%fs_id, %dir, count = entries.len(), "listed dentries");
        Ok(entries)
    }

    /// Entry `name` under directory `parent`
    pub async fn get_dentry(&self, fs_id: FsId, parent: InodeId, name: &str) -> Result<Dentry> {
        let route = self.router.route(fs_id, parent).await?;
        self.transport
            .get_dentry(&route.leader, &route.partition, parent, name)
            .await?
            .into_result("GetDentry", || Error::DentryNotFound {
                parent_id: parent,
                name: name.to_string(),
            })?
            .ok_or_else(|| {
                Error::invariant(format!(
                    "GetDentry answered OK without a dentry for {name:?} under inode {parent}"
                ))
            })
    }

    /// Quota attached to directory `dir`
    ///
    /// Quotas are stored with the root inode, so the request goes to the
    /// root's partition whatever `dir` is.
    pub async fn get_dir_quota(&self, fs_id: FsId, dir: InodeId) -> Result<Quota> {
        let route = self.router.route(fs_id, ROOT_INODE_ID).await?;
        self.transport
            .get_dir_quota(&route.leader, &route.partition, dir)
            .await?
            .into_result("GetDirQuota", || {
                Error::QuotaNotSet(format!("inode {dir} of fs {fs_id}"))
            })
    }

    /// Quota of the whole filesystem
    pub async fn get_fs_quota(&self, fs_id: FsId) -> Result<Quota> {
        let route = self.router.route(fs_id, ROOT_INODE_ID).await?;
        self.transport
            .get_fs_quota(&route.leader, &route.partition)
            .await?
            .into_result("GetFsQuota", || Error::QuotaNotSet(format!("fs {fs_id}")))
    }
}
