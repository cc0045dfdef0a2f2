//! fsaudit Protocol - gRPC service definitions
//!
//! This crate contains the protobuf-generated messages and clients for the
//! services fsaudit talks to: the MDS (filesystem info), its topology
//! service (partitions and copysets) and the metaservers (inodes, dentries
//! and quotas).

/// Generated code, nested by protobuf package
pub mod curvefs {
    /// Shared records (partitions, peers)
    pub mod common {
        tonic::include_proto!("curvefs.common");
    }

    /// MDS service (filesystem info)
    pub mod mds {
        tonic::include_proto!("curvefs.mds");

        pub use mds_service_client::MdsServiceClient;

        /// Copyset descriptors reported by heartbeats
        pub mod heartbeat {
            tonic::include_proto!("curvefs.mds.heartbeat");
        }

        /// Topology service (partitions, copysets)
        pub mod topology {
            tonic::include_proto!("curvefs.mds.topology");

            pub use topology_service_client::TopologyServiceClient;
        }
    }

    /// Metaserver service (inodes, dentries, quotas)
    pub mod metaserver {
        tonic::include_proto!("curvefs.metaserver");

        pub use meta_server_service_client::MetaServerServiceClient;
    }
}

pub use curvefs::mds::{self, heartbeat, topology};
pub use curvefs::{common, metaserver};

/// Largest response accepted from any service (directory listings can be big)
pub const MAX_DECODING_MESSAGE_SIZE: usize = 64 * 1024 * 1024;
