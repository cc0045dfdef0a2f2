//! Remote call seam
//!
//! The engine never talks to the network directly. Every remote call it
//! consumes goes through [`MetaTransport`]; the transport owns timeouts,
//! retries and wire decoding, and hands back validated records plus the
//! service's verdict as a [`Reply`].

use async_trait::async_trait;
use fsaudit_common::{
    CopysetInfo, Dentry, Error, FsId, FsInfo, InodeAttr, InodeId, LeaderAddr, PartitionInfo, Quota,
    Result,
};
use std::fmt;

/// Verdict of a remote service for one request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply<T> {
    /// The service answered with a success status
    Ok(T),
    /// The service reported that the addressed object does not exist
    NotFound,
    /// Any other non-success status
    Failed { code: i32, status: String },
}

impl<T> Reply<T> {
    /// Build a failure reply
    pub fn failed(code: i32, status: impl Into<String>) -> Self {
        Self::Failed {
            code,
            status: status.into(),
        }
    }

    /// Turn the verdict into a result, choosing the error for `NotFound`
    pub fn into_result(self, op: &'static str, not_found: impl FnOnce() -> Error) -> Result<T> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::NotFound => Err(not_found()),
            Self::Failed { code, status } => Err(Error::remote(op, code, status)),
        }
    }

    /// Map the success payload
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        match self {
            Self::Ok(value) => Reply::Ok(f(value)),
            Self::NotFound => Reply::NotFound,
            Self::Failed { code, status } => Reply::Failed { code, status },
        }
    }
}

/// How a filesystem is looked up in the MDS
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FsSelector {
    Id(FsId),
    Name(String),
}

impl fmt::Display for FsSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "fsid {id}"),
            Self::Name(name) => write!(f, "fsname {name:?}"),
        }
    }
}

/// Remote calls consumed by the resolution engine
///
/// `Err` means the call itself failed (connection, timeout, exhausted
/// retries, undecodable response); `Ok(Reply)` carries the service verdict.
/// Metaserver calls are addressed to a copyset leader and carry the
/// coordinates of the partition that owns the inode.
#[async_trait]
pub trait MetaTransport: Send + Sync {
    /// Look up a filesystem by id or by name
    async fn get_fs_info(&self, selector: &FsSelector) -> Result<Reply<FsInfo>>;

    /// List every partition of a filesystem
    async fn list_partitions(&self, fs_id: FsId) -> Result<Reply<Vec<PartitionInfo>>>;

    /// Describe one copyset, including its current leader
    async fn get_copyset(&self, pool_id: u32, copyset_id: u32) -> Result<Reply<CopysetInfo>>;

    /// Fetch attributes of inodes that all live in `partition`
    async fn batch_get_inode_attr(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        inode_ids: &[InodeId],
    ) -> Result<Reply<Vec<InodeAttr>>>;

    /// List the entries of directory `dir`
    async fn list_dentry(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        dir: InodeId,
    ) -> Result<Reply<Vec<Dentry>>>;

    /// Look up one entry by name; the reply payload is `None` when the
    /// service answered success without a dentry
    async fn get_dentry(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        parent: InodeId,
        name: &str,
    ) -> Result<Reply<Option<Dentry>>>;

    /// Read the quota attached to directory `dir`
    async fn get_dir_quota(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        dir: InodeId,
    ) -> Result<Reply<Quota>>;

    /// Read the quota of the whole filesystem
    async fn get_fs_quota(&self, leader: &LeaderAddr, partition: &PartitionInfo)
    -> Result<Reply<Quota>>;
}
