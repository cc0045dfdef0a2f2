//! Path resolution
//!
//! Downward: walk dentries from the root one segment at a time.
//! Upward: follow first parents to the root, recovering each name from the
//! parent's listing.

use crate::accessor::MetadataAccessor;
use fsaudit_common::{Error, FsId, InodeId, ROOT_INODE_ID, Result};
use tracing::debug;

/// Collapse repeated and trailing slashes: `/a//b/` becomes `/a/b`
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Translates between paths and inode ids
#[derive(Clone)]
pub struct PathResolver {
    accessor: MetadataAccessor,
    max_depth: usize,
}

impl PathResolver {
    #[must_use]
    pub fn new(accessor: MetadataAccessor, max_depth: usize) -> Self {
        Self { accessor, max_depth }
    }

    /// Inode of the directory at `path`
    ///
    /// Every segment, the last one included, must name a directory. A path
    /// with no segments (`""`, `"/"`) is the root.
    pub async fn path_to_inode(&self, fs_id: FsId, path: &str) -> Result<InodeId> {
        let mut current = ROOT_INODE_ID;
        let mut walked = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            walked.push('/');
            walked.push_str(segment);

            let dentry = self.accessor.get_dentry(fs_id, current, segment).await?;
            if !dentry.file_type.is_dir() {
                return Err(Error::NotADirectory(walked));
            }
            current = dentry.inode_id;
        }

        debug!(%fs_id, path, inode_id = %current, "resolved path");
        Ok(current)
    }

    /// Absolute path of `inode_id`, or `None` when an entry on the way up
    /// has disappeared
    pub async fn inode_to_path(&self, fs_id: FsId, inode_id: InodeId) -> Result<Option<String>> {
        let mut names = Vec::new();
        let mut current = inode_id;

        while !current.is_root() {
            if names.len() >= self.max_depth {
                return Err(Error::DepthExceeded {
                    inode_id,
                    max_depth: self.max_depth,
                });
            }

            let attr = self.accessor.get_attr(fs_id, current).await?;
            let parent = attr
                .first_parent()
                .ok_or_else(|| Error::invariant(format!("inode {current} has no parent")))?;
            let entries = self.accessor.list_entries(fs_id, parent).await?;
            let Some(entry) = entries.into_iter().find(|d| d.inode_id == current) else {
                debug!(%fs_id, inode_id = %current, %parent, "entry vanished from parent");
                return Ok(None);
            };

            names.push(entry.name);
            current = parent;
        }

        names.reverse();
        Ok(Some(format!("/{}", names.join("/"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TopologyCache;
    use crate::mock::{MockTransport, Op};
    use crate::router::PartitionRouter;
    use fsaudit_common::FileType;
    use std::sync::Arc;

    fn namespace() -> MockTransport {
        MockTransport::new()
            .with_partition(1, 1, 1, 1, 0, 999)
            .with_copyset(1, 1, Some("10.0.0.1:6701:0"))
            .with_root(1)
            .with_dir(1, 1, "a", 2)
            .with_dir(1, 2, "b", 3)
            .with_file(1, 3, "f.txt", 4, 10)
    }

    fn setup(mock: MockTransport, max_depth: usize) -> (Arc<MockTransport>, PathResolver) {
        let mock = Arc::new(mock);
        let router = PartitionRouter::new(mock.clone(), Arc::new(TopologyCache::new()));
        let accessor = MetadataAccessor::new(mock.clone(), router);
        (mock, PathResolver::new(accessor, max_depth))
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/a//b/"), "/a/b");
        assert_eq!(normalize_path("a/b"), "/a/b");
    }

    #[tokio::test]
    async fn test_root_needs_no_calls() {
        let (mock, resolver) = setup(namespace(), 16);
        assert_eq!(resolver.path_to_inode(FsId::new(1), "/").await.unwrap(), ROOT_INODE_ID);
        assert_eq!(
            resolver.inode_to_path(FsId::new(1), ROOT_INODE_ID).await.unwrap().as_deref(),
            Some("/")
        );
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_path_round_trip() {
        let (_, resolver) = setup(namespace(), 16);
        let fs = FsId::new(1);

        let inode = resolver.path_to_inode(fs, "/a//b/").await.unwrap();
        assert_eq!(inode, InodeId::new(3));
        let path = resolver.inode_to_path(fs, inode).await.unwrap();
        assert_eq!(path.as_deref(), Some("/a/b"));
    }

    #[tokio::test]
    async fn test_path_errors() {
        let (_, resolver) = setup(namespace(), 16);
        let fs = FsId::new(1);

        let err = resolver.path_to_inode(fs, "/a/b/f.txt").await.unwrap_err();
        assert!(matches!(err, Error::NotADirectory(ref p) if p == "/a/b/f.txt"));

        let err = resolver.path_to_inode(fs, "/a/missing").await.unwrap_err();
        assert!(matches!(err, Error::DentryNotFound { .. }));

    }

    #[tokio::test]
    async fn test_empty_path_is_root() {
        let (mock, resolver) = setup(namespace(), 16);
        for path in ["", "//"] {
            assert_eq!(resolver.path_to_inode(FsId::new(1), path).await.unwrap(), ROOT_INODE_ID);
        }
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_file_path_via_first_parent() {
        let mock = namespace()
            .with_dir(1, 1, "other", 5)
            .with_dentry(1, 5, "link", 6, FileType::File)
            .with_dentry(1, 2, "hard", 6, FileType::File)
            .with_inode(1, 6, FileType::File, 1, &[5, 2]);
        let (_, resolver) = setup(mock, 16);

        let path = resolver.inode_to_path(FsId::new(1), InodeId::new(6)).await.unwrap();
        assert_eq!(path.as_deref(), Some("/other/link"));
    }

    #[tokio::test]
    async fn test_vanished_entry_is_unresolvable() {
        let mock = namespace().with_inode(1, 7, FileType::File, 0, &[2]);
        let (mock, resolver) = setup(mock, 16);

        let path = resolver.inode_to_path(FsId::new(1), InodeId::new(7)).await.unwrap();
        assert_eq!(path, None);
        assert_eq!(mock.calls(Op::ListDentry), 1);
    }

    #[tokio::test]
    async fn test_upward_walk_depth_guard() {
        let (_, resolver) = setup(namespace(), 2);
        let err = resolver.inode_to_path(FsId::new(1), InodeId::new(4)).await.unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { max_depth: 2, .. }));
    }
}
