//! fsaudit Client - Metadata resolution engine
//!
//! This crate resolves filesystem metadata through the MDS and the
//! metaservers: inode to partition to copyset leader routing, path
//! resolution in both directions, recursive directory summaries and quota
//! reconciliation. All remote calls go through [`MetaTransport`];
//! [`GrpcTransport`] is the production implementation.

pub mod accessor;
pub mod cache;
pub mod client;
pub mod fs;
pub mod grpc;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod quota;
pub mod resolver;
pub mod router;
pub mod summary;
pub mod transport;

// Re-exports
pub use client::MetaClient;
pub use grpc::GrpcTransport;
pub use transport::{FsSelector, MetaTransport, Reply};
