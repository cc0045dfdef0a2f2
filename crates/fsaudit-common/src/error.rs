//! Error types for fsaudit
//!
//! One error type is shared by the resolution engine and the transport so a
//! failure can travel from a remote call up to the CLI unchanged.

use crate::types::{FsId, InodeId};
use thiserror::Error;

/// Common result type for fsaudit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for fsaudit
#[derive(Debug, Error)]
pub enum Error {
    // Input errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Lookup errors
    #[error("filesystem not found: {0}")]
    FsNotFound(String),

    #[error("inode {inode_id} is not on any partition of fs {fs_id}")]
    PartitionNotFound { fs_id: FsId, inode_id: InodeId },

    #[error("copyset not found: pool {pool_id}, copyset {copyset_id}")]
    CopysetNotFound { pool_id: u32, copyset_id: u32 },

    #[error("inode not found: fs {fs_id}, inode {inode_id}")]
    InodeNotFound { fs_id: FsId, inode_id: InodeId },

    #[error("dentry not found: {name:?} under inode {parent_id}")]
    DentryNotFound { parent_id: InodeId, name: String },

    #[error("no quota set on {0}")]
    QuotaNotSet(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    // Topology errors
    #[error("invalid leader peer: {0}")]
    InvalidPeer(String),

    // Remote errors
    #[error("{op} failed: {status} ({code})")]
    Remote {
        op: &'static str,
        code: i32,
        status: String,
    },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("malformed {op} response: {reason}")]
    MalformedResponse { op: &'static str, reason: String },

    // Internal errors
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("directory tree deeper than {max_depth} levels at inode {inode_id}")]
    DepthExceeded { inode_id: InodeId, max_depth: usize },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a malformed response error
    pub fn malformed(op: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            op,
            reason: reason.into(),
        }
    }

    /// Create an error for a non-success remote status
    pub fn remote(op: &'static str, code: i32, status: impl Into<String>) -> Self {
        Self::Remote {
            op,
            code,
            status: status.into(),
        }
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::FsNotFound(_)
                | Self::PartitionNotFound { .. }
                | Self::CopysetNotFound { .. }
                | Self::InodeNotFound { .. }
                | Self::DentryNotFound { .. }
                | Self::QuotaNotSet(_)
        )
    }

    /// Check if the failure came from the transport rather than a server verdict
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// POSIX errno reported by the CLI at the process boundary
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::FsNotFound(_)
            | Self::PartitionNotFound { .. }
            | Self::CopysetNotFound { .. }
            | Self::InodeNotFound { .. }
            | Self::DentryNotFound { .. }
            | Self::QuotaNotSet(_) => libc::ENOENT,

            Self::NotADirectory(_) => libc::ENOTDIR,

            Self::InvalidInput(_) | Self::Configuration(_) => libc::EINVAL,

            Self::Rpc(_) => libc::ETIMEDOUT,

            Self::InvalidPeer(_)
            | Self::Remote { .. }
            | Self::MalformedResponse { .. }
            | Self::InvariantViolation(_)
            | Self::DepthExceeded { .. } => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_not_found() {
        assert!(Error::InodeNotFound {
            fs_id: FsId::new(1),
            inode_id: InodeId::new(2)
        }
        .is_not_found());
        assert!(Error::DentryNotFound {
            parent_id: InodeId::new(1),
            name: "a".into()
        }
        .is_not_found());
        assert!(!Error::NotADirectory("/a".into()).is_not_found());
        assert!(!Error::remote("ListDentry", 1, "UNKNOWN_ERROR").is_not_found());
    }

    #[test]
    fn test_error_errno() {
        assert_eq!(Error::FsNotFound("x".into()).errno(), libc::ENOENT);
        assert_eq!(Error::NotADirectory("/a".into()).errno(), libc::ENOTDIR);
        assert_eq!(Error::invalid_input("fsid is zero").errno(), libc::EINVAL);
        assert_eq!(Error::invariant("two attrs").errno(), libc::EIO);
    }

    #[test]
    fn test_error_retryable() {
        assert!(Error::Rpc("deadline exceeded".into()).is_retryable());
        assert!(!Error::remote("GetDentry", 1, "UNKNOWN_ERROR").is_retryable());
    }

    #[test]
    fn test_remote_error_display() {
        let err = Error::remote("ListPartition", 3, "TOPO_FS_NOT_FOUND");
        assert_eq!(err.to_string(), "ListPartition failed: TOPO_FS_NOT_FOUND (3)");
    }
}
