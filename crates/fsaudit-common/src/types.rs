//! Core type definitions for fsaudit
//!
//! This module defines the identifiers and metadata records shared by the
//! resolution engine, the transport and the CLI. Every record here is already
//! validated: decoding from the wire happens before a value of these types
//! exists.

use crate::error::{Error, Result};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

/// Identifier of a filesystem instance
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From, Into)]
#[display("{_0}")]
pub struct FsId(u32);

impl FsId {
    /// Create a new filesystem ID
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FsId({})", self.0)
    }
}

/// Identifier of an inode within a filesystem
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From, Into)]
#[display("{_0}")]
pub struct InodeId(u64);

/// The well-known root inode of every filesystem
pub const ROOT_INODE_ID: InodeId = InodeId(1);

impl InodeId {
    /// Create a new inode ID
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Check if this is the root inode
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == ROOT_INODE_ID.0
    }
}

impl fmt::Debug for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InodeId({})", self.0)
    }
}

/// Identifier of a partition (one inode range of one filesystem)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[display("{_0}")]
pub struct PartitionId(u32);

impl PartitionId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Composite key of a copyset: `(pool_id << 32) | copyset_id`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct CopysetKey(u64);

impl CopysetKey {
    /// Build the key for a (pool, copyset) pair
    #[must_use]
    pub const fn new(pool_id: u32, copyset_id: u32) -> Self {
        Self(((pool_id as u64) << 32) | copyset_id as u64)
    }

    #[must_use]
    pub const fn pool_id(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[must_use]
    pub const fn copyset_id(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Debug for CopysetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CopysetKey({}:{})", self.pool_id(), self.copyset_id())
    }
}

/// Identity of a filesystem: its numeric id and its name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsInfo {
    pub fs_id: FsId,
    pub fs_name: String,
}

/// A contiguous inode range of one filesystem, replicated by one copyset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub fs_id: FsId,
    pub pool_id: u32,
    pub copyset_id: u32,
    pub partition_id: PartitionId,
    /// First inode of the range (inclusive)
    pub start: u64,
    /// Last inode of the range (inclusive)
    pub end: u64,
    /// Latest transaction observed for this partition
    pub tx_id: u64,
}

impl PartitionInfo {
    /// Check whether this partition owns `inode_id` of filesystem `fs_id`
    #[must_use]
    pub fn owns(&self, fs_id: FsId, inode_id: InodeId) -> bool {
        self.fs_id == fs_id && self.start <= inode_id.get() && inode_id.get() <= self.end
    }

    /// Key of the copyset replicating this partition
    #[must_use]
    pub const fn copyset_key(&self) -> CopysetKey {
        CopysetKey::new(self.pool_id, self.copyset_id)
    }
}

/// A copyset and the peer currently leading it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopysetInfo {
    pub pool_id: u32,
    pub copyset_id: u32,
    /// Leader peer identity, `ip:port:index`; absent while an election is running
    pub leader_peer: Option<String>,
    pub peers: Vec<String>,
}

impl CopysetInfo {
    #[must_use]
    pub const fn key(&self) -> CopysetKey {
        CopysetKey::new(self.pool_id, self.copyset_id)
    }
}

/// Network address of a copyset leader, `ip:port`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct LeaderAddr(String);

impl LeaderAddr {
    /// Convert a raft peer identity (`ip:port:index`) into a dialable address
    pub fn from_peer(peer: &str) -> Result<Self> {
        let parts: Vec<&str> = peer.split(':').collect();
        let [ip, port, _index] = parts.as_slice() else {
            return Err(Error::InvalidPeer(peer.to_string()));
        };
        if ip.is_empty() || port.parse::<u16>().is_err() {
            return Err(Error::InvalidPeer(peer.to_string()));
        }
        Ok(Self(format!("{ip}:{port}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Type of an inode, as far as quota accounting cares
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Directory,
    File,
    Symlink,
    /// File whose data lives in an object store
    S3,
    /// A type this tool does not know about
    Other(i32),
}

impl FileType {
    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Whether the inode's length counts towards byte usage
    #[must_use]
    pub const fn has_data(self) -> bool {
        matches!(self, Self::File | Self::S3)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => write!(f, "directory"),
            Self::File => write!(f, "file"),
            Self::Symlink => write!(f, "symlink"),
            Self::S3 => write!(f, "s3"),
            Self::Other(t) => write!(f, "type({t})"),
        }
    }
}

/// Attributes of one inode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeAttr {
    pub fs_id: FsId,
    pub inode_id: InodeId,
    pub length: u64,
    pub file_type: FileType,
    /// Parent directories; several when hard-linked
    pub parents: Vec<InodeId>,
}

impl InodeAttr {
    /// Parent used for upward path reconstruction
    #[must_use]
    pub fn first_parent(&self) -> Option<InodeId> {
        self.parents.first().copied()
    }
}

/// A directory entry: `(parent, name) -> inode`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dentry {
    pub fs_id: FsId,
    pub parent_id: InodeId,
    pub name: String,
    pub inode_id: InodeId,
    pub file_type: FileType,
    pub tx_id: u64,
}

/// Quota limits and counters as reported by the metadata servers
///
/// A limit of zero means unlimited. Used counters are signed because the
/// servers apply deltas and may transiently report negative values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub max_bytes: u64,
    pub max_inodes: u64,
    pub used_bytes: i64,
    pub used_inodes: i64,
}

/// Total length and inode count of a directory subtree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub length: u64,
    pub inodes: u64,
}

impl AddAssign for Summary {
    fn add_assign(&mut self, rhs: Self) {
        self.length += rhs.length;
        self.inodes += rhs.inodes;
    }
}
