//! End-to-end resolution over an in-memory namespace
//!
//! ```text
//! /            (1)
//! └── a        (2)
//!     ├── b.txt (3, 1000 bytes)
//!     └── c    (4, empty)
//! /big         (150, on a second partition)
//! └── blob     (151, 4 KiB object)
//! ```

use fsaudit_client::mock::{MockTransport, Op};
use fsaudit_client::quota::{humanize_quota, reconcile};
use fsaudit_client::{FsSelector, MetaClient};
use fsaudit_common::{Config, Error, FileType, FsId, InodeId, Quota, ROOT_INODE_ID, Summary};
use std::sync::Arc;

fn namespace() -> MockTransport {
    MockTransport::new()
        .with_fs(1, "fs1")
        .with_partition(1, 1, 1, 1, 0, 99)
        .with_partition(1, 1, 2, 2, 100, 199)
        .with_copyset(1, 1, Some("10.0.0.1:6701:0"))
        .with_copyset(1, 2, Some("10.0.0.2:6701:1"))
        .with_root(1)
        .with_dir(1, 1, "a", 2)
        .with_file(1, 2, "b.txt", 3, 1000)
        .with_dir(1, 2, "c", 4)
        .with_dir(1, 1, "big", 150)
        .with_dentry(1, 150, "blob", 151, FileType::S3)
        .with_inode(1, 151, FileType::S3, 4096, &[150])
        .with_dir_quota(
            1,
            2,
            Quota {
                max_bytes: 2000,
                max_inodes: 0,
                used_bytes: 1000,
                used_inodes: 2,
            },
        )
        .with_fs_quota(
            1,
            Quota {
                max_bytes: 0,
                max_inodes: 100,
                used_bytes: 5096,
                used_inodes: 5,
            },
        )
}

fn session() -> (Arc<MockTransport>, MetaClient) {
    let mock = Arc::new(namespace());
    let client = MetaClient::new(mock.clone(), &Config::default());
    (mock, client)
}

#[tokio::test]
async fn summarize_scenario_directory() {
    let (_, client) = session();
    let fs = client.resolve_fs_id(&FsSelector::Name("fs1".into())).await.unwrap();

    let summary = client.summarize_directory(fs, InodeId::new(2)).await.unwrap();
    assert_eq!(summary, Summary { length: 1000, inodes: 2 });

    let whole = client.summarize_directory(fs, ROOT_INODE_ID).await.unwrap();
    assert_eq!(whole, Summary { length: 5096, inodes: 5 });
}

#[tokio::test]
async fn paths_round_trip_across_partitions() {
    let (mock, client) = session();
    let fs = FsId::new(1);

    for path in ["/a", "/a/c", "/big", "//a///c/"] {
        let inode = client.path_to_inode(fs, path).await.unwrap();
        let back = client.inode_to_path(fs, inode).await.unwrap();
        let expected = fsaudit_client::resolver::normalize_path(path);
        assert_eq!(back.as_deref(), Some(expected.as_str()));
    }

    // Two partitions, two copysets, each fetched once
    assert_eq!(mock.calls(Op::ListPartitions), 1);
    assert_eq!(mock.calls(Op::GetCopyset), 2);
}

#[tokio::test]
async fn root_path_costs_nothing() {
    let (mock, client) = session();
    assert_eq!(client.path_to_inode(FsId::new(1), "/").await.unwrap(), ROOT_INODE_ID);
    assert_eq!(mock.total_calls(), 0);
}

#[tokio::test]
async fn path_errors_map_to_errno() {
    let (_, client) = session();
    let fs = FsId::new(1);

    let err = client.path_to_inode(fs, "/a/b.txt").await.unwrap_err();
    assert!(matches!(err, Error::NotADirectory(_)));
    assert_eq!(err.errno(), libc::ENOTDIR);

    let err = client.path_to_inode(fs, "/nope").await.unwrap_err();
    assert!(err.is_not_found());

    let err = client.inode_to_path(fs, InodeId::new(500)).await.unwrap_err();
    assert!(matches!(err, Error::PartitionNotFound { .. }));
}

#[tokio::test]
async fn quota_checks() {
    let (_, client) = session();
    let fs = FsId::new(1);

    let dir = client.check_dir_quota(fs, "/a").await.unwrap();
    assert!(dir.consistent);
    assert_eq!(dir.row.capacity, "2,000");
    assert_eq!(dir.row.max_inodes, "unlimited");

    let whole = client.check_fs_quota(fs).await.unwrap();
    assert!(whole.consistent, "{:?}", whole.row);

    let err = client.check_dir_quota(fs, "/big").await.unwrap_err();
    assert!(matches!(err, Error::QuotaNotSet(_)));
}

#[test]
fn reconcile_rows() {
    assert!(reconcile(100, 50, 10, 5, 50, 5).1);
    assert!(!reconcile(100, 50, 10, 5, 51, 5).1);

    let row = humanize_quota(0, 500, 200, 67);
    assert_eq!(row.capacity, "unlimited");
    assert_eq!(row.bytes_percent, "");
    assert_eq!(row.inodes_percent, "34");
}
