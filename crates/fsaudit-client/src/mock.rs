//! In-memory transport for tests
//!
//! [`MockTransport`] serves a namespace assembled with builder calls and
//! counts every remote call per operation, so tests can assert both results
//! and how many round trips a code path costs. Metaserver calls are checked
//! the way a real leader would: the partition must own the addressed inode
//! and the caller must have dialed the copyset's current leader.

use crate::transport::{FsSelector, MetaTransport, Reply};
use async_trait::async_trait;
use fsaudit_common::{
    CopysetInfo, CopysetKey, Dentry, Error, FileType, FsId, FsInfo, InodeAttr, InodeId, LeaderAddr,
    PartitionId, PartitionInfo, Quota, Result,
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Remote operations of [`MetaTransport`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    GetFsInfo,
    ListPartitions,
    GetCopyset,
    BatchGetInodeAttr,
    ListDentry,
    GetDentry,
    GetDirQuota,
    GetFsQuota,
}

/// Scripted misbehavior of one operation
#[derive(Clone, Debug)]
pub enum Fault {
    /// Answer with a non-success status
    Status { code: i32, status: String },
    /// Answer success with no payload
    Empty,
    /// Fail the call itself
    Rpc,
}

/// Scripted [`MetaTransport`] over an in-memory namespace
#[derive(Debug, Default)]
pub struct MockTransport {
    filesystems: Vec<FsInfo>,
    partitions: Vec<PartitionInfo>,
    copysets: HashMap<CopysetKey, CopysetInfo>,
    inodes: Vec<InodeAttr>,
    dentries: Vec<Dentry>,
    dir_quotas: HashMap<(FsId, InodeId), Quota>,
    fs_quotas: HashMap<FsId, Quota>,
    faults: HashMap<Op, Fault>,
    calls: Mutex<HashMap<Op, usize>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filesystem for fs-info lookups
    #[must_use]
    pub fn with_fs(mut self, fs_id: u32, fs_name: &str) -> Self {
        self.filesystems.push(FsInfo {
            fs_id: FsId::new(fs_id),
            fs_name: fs_name.to_string(),
        });
        self
    }

    /// Register partition `partition_id` of `fs_id` covering `[start, end]`
    #[must_use]
    pub fn with_partition(
        mut self,
        fs_id: u32,
        pool_id: u32,
        copyset_id: u32,
        partition_id: u32,
        start: u64,
        end: u64,
    ) -> Self {
        self.partitions.push(PartitionInfo {
            fs_id: FsId::new(fs_id),
            pool_id,
            copyset_id,
            partition_id: PartitionId::new(partition_id),
            start,
            end,
            tx_id: 0,
        });
        self
    }

    /// Register a copyset led by `leader_peer` (`ip:port:index`)
    #[must_use]
    pub fn with_copyset(mut self, pool_id: u32, copyset_id: u32, leader_peer: Option<&str>) -> Self {
        let info = CopysetInfo {
            pool_id,
            copyset_id,
            leader_peer: leader_peer.map(str::to_string),
            peers: leader_peer.map(str::to_string).into_iter().collect(),
        };
        self.copysets.insert(info.key(), info);
        self
    }

    /// Register inode attributes; registering the same inode twice makes
    /// attribute lookups return both records
    #[must_use]
    pub fn with_inode(
        mut self,
        fs_id: u32,
        inode_id: u64,
        file_type: FileType,
        length: u64,
        parents: &[u64],
    ) -> Self {
        self.inodes.push(InodeAttr {
            fs_id: FsId::new(fs_id),
            inode_id: InodeId::new(inode_id),
            length,
            file_type,
            parents: parents.iter().copied().map(InodeId::new).collect(),
        });
        self
    }

    /// Register a dentry without touching inode attributes
    #[must_use]
    pub fn with_dentry(
        mut self,
        fs_id: u32,
        parent_id: u64,
        name: &str,
        inode_id: u64,
        file_type: FileType,
    ) -> Self {
        self.dentries.push(Dentry {
            fs_id: FsId::new(fs_id),
            parent_id: InodeId::new(parent_id),
            name: name.to_string(),
            inode_id: InodeId::new(inode_id),
            file_type,
            tx_id: 0,
        });
        self
    }

    /// Register the root directory of `fs_id`
    #[must_use]
    pub fn with_root(self, fs_id: u32) -> Self {
        self.with_inode(fs_id, 1, FileType::Directory, 0, &[])
    }

    /// Register directory `name` under `parent_id`
    #[must_use]
    pub fn with_dir(self, fs_id: u32, parent_id: u64, name: &str, inode_id: u64) -> Self {
        self.with_dentry(fs_id, parent_id, name, inode_id, FileType::Directory)
            .with_inode(fs_id, inode_id, FileType::Directory, 0, &[parent_id])
    }

    /// Register regular file `name` of `length` bytes under `parent_id`
    #[must_use]
    pub fn with_file(self, fs_id: u32, parent_id: u64, name: &str, inode_id: u64, length: u64) -> Self {
        self.with_dentry(fs_id, parent_id, name, inode_id, FileType::File)
            .with_inode(fs_id, inode_id, FileType::File, length, &[parent_id])
    }

    #[must_use]
    pub fn with_dir_quota(mut self, fs_id: u32, dir: u64, quota: Quota) -> Self {
        self.dir_quotas.insert((FsId::new(fs_id), InodeId::new(dir)), quota);
        self
    }

    #[must_use]
    pub fn with_fs_quota(mut self, fs_id: u32, quota: Quota) -> Self {
        self.fs_quotas.insert(FsId::new(fs_id), quota);
        self
    }

    /// Make every call of `op` misbehave
    #[must_use]
    pub fn with_fault(mut self, op: Op, fault: Fault) -> Self {
        self.faults.insert(op, fault);
        self
    }

    /// Number of calls issued for `op`
    #[must_use]
    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Number of calls issued across all operations
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Count the call and apply any scripted fault
    fn enter<T>(&self, op: Op) -> Result<Option<Reply<T>>> {
        *self.calls.lock().entry(op).or_default() += 1;
        match self.faults.get(&op) {
            None | Some(Fault::Empty) => Ok(None),
            Some(Fault::Status { code, status }) => Ok(Some(Reply::failed(*code, status.clone()))),
            Some(Fault::Rpc) => Err(Error::Rpc(format!("{op:?}: injected transport failure"))),
        }
    }

    fn empty(&self, op: Op) -> bool {
        matches!(self.faults.get(&op), Some(Fault::Empty))
    }

    /// Reject requests a real leader would refuse
    fn misrouted<T>(&self, leader: &LeaderAddr, partition: &PartitionInfo, inode: InodeId) -> Option<Reply<T>> {
        if !partition.owns(partition.fs_id, inode) {
            return Some(Reply::failed(2, "PARAM_ERROR"));
        }
        let led_by = self
            .copysets
            .get(&partition.copyset_key())
            .and_then(|c| c.leader_peer.as_deref())
            .and_then(|peer| LeaderAddr::from_peer(peer).ok());
        if led_by.as_ref() != Some(leader) {
            return Some(Reply::failed(9, "REDIRECTED"));
        }
        None
    }
}

#[async_trait]
impl MetaTransport for MockTransport {
    async fn get_fs_info(&self, selector: &FsSelector) -> Result<Reply<FsInfo>> {
        if let Some(reply) = self.enter(Op::GetFsInfo)? {
            return Ok(reply);
        }
        let found = self.filesystems.iter().find(|fs| match selector {
            FsSelector::Id(id) => fs.fs_id == *id,
            FsSelector::Name(name) => fs.fs_name == *name,
        });
        Ok(found.cloned().map_or(Reply::NotFound, Reply::Ok))
    }

    async fn list_partitions(&self, fs_id: FsId) -> Result<Reply<Vec<PartitionInfo>>> {
        if let Some(reply) = self.enter(Op::ListPartitions)? {
            return Ok(reply);
        }
        if self.empty(Op::ListPartitions) {
            return Ok(Reply::Ok(Vec::new()));
        }
        let list: Vec<_> = self
            .partitions
            .iter()
            .filter(|p| p.fs_id == fs_id)
            .cloned()
            .collect();
        if list.is_empty() {
            return Ok(Reply::NotFound);
        }
        Ok(Reply::Ok(list))
    }

    async fn get_copyset(&self, pool_id: u32, copyset_id: u32) -> Result<Reply<CopysetInfo>> {
        if let Some(reply) = self.enter(Op::GetCopyset)? {
            return Ok(reply);
        }
        let key = CopysetKey::new(pool_id, copyset_id);
        Ok(self.copysets.get(&key).cloned().map_or(Reply::NotFound, Reply::Ok))
    }

    async fn batch_get_inode_attr(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        inode_ids: &[InodeId],
    ) -> Result<Reply<Vec<InodeAttr>>> {
        if let Some(reply) = self.enter(Op::BatchGetInodeAttr)? {
            return Ok(reply);
        }
        for inode in inode_ids {
            if let Some(reply) = self.misrouted(leader, partition, *inode) {
                return Ok(reply);
            }
        }
        if self.empty(Op::BatchGetInodeAttr) {
            return Ok(Reply::Ok(Vec::new()));
        }
        let attrs: Vec<_> = self
            .inodes
            .iter()
            .filter(|a| a.fs_id == partition.fs_id && inode_ids.contains(&a.inode_id))
            .cloned()
            .collect();
        if attrs.is_empty() {
            return Ok(Reply::NotFound);
        }
        Ok(Reply::Ok(attrs))
    }

    async fn list_dentry(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        dir: InodeId,
    ) -> Result<Reply<Vec<Dentry>>> {
        if let Some(reply) = self.enter(Op::ListDentry)? {
            return Ok(reply);
        }
        if let Some(reply) = self.misrouted(leader, partition, dir) {
            return Ok(reply);
        }
        Ok(Reply::Ok(
            self.dentries
                .iter()
                .filter(|d| d.fs_id == partition.fs_id && d.parent_id == dir)
                .cloned()
                .collect(),
        ))
    }

    async fn get_dentry(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        parent: InodeId,
        name: &str,
    ) -> Result<Reply<Option<Dentry>>> {
        if let Some(reply) = self.enter(Op::GetDentry)? {
            return Ok(reply);
        }
        if let Some(reply) = self.misrouted(leader, partition, parent) {
            return Ok(reply);
        }
        if self.empty(Op::GetDentry) {
            return Ok(Reply::Ok(None));
        }
        let found = self
            .dentries
            .iter()
            .find(|d| d.fs_id == partition.fs_id && d.parent_id == parent && d.name == name);
        Ok(found.cloned().map_or(Reply::NotFound, |d| Reply::Ok(Some(d))))
    }

    async fn get_dir_quota(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        dir: InodeId,
    ) -> Result<Reply<Quota>> {
        if let Some(reply) = self.enter(Op::GetDirQuota)? {
            return Ok(reply);
        }
        if let Some(reply) = self.misrouted(leader, partition, fsaudit_common::ROOT_INODE_ID) {
            return Ok(reply);
        }
        let quota = self.dir_quotas.get(&(partition.fs_id, dir)).copied();
        Ok(quota.map_or(Reply::NotFound, Reply::Ok))
    }

    async fn get_fs_quota(&self, leader: &LeaderAddr, partition: &PartitionInfo) -> Result<Reply<Quota>> {
        if let Some(reply) = self.enter(Op::GetFsQuota)? {
            return Ok(reply);
        }
        if let Some(reply) = self.misrouted(leader, partition, fsaudit_common::ROOT_INODE_ID) {
            return Ok(reply);
        }
        let quota = self.fs_quotas.get(&partition.fs_id).copied();
        Ok(quota.map_or(Reply::NotFound, Reply::Ok))
    }
}
