//! gRPC implementation of [`MetaTransport`]
//!
//! MDS calls try every configured MDS address in order; metaserver calls
//! go to the one leader address they are given. Each attempt is bounded by
//! the configured timeout, and the whole address list is retried
//! `retry_times` more times before the call fails with [`Error::Rpc`].
//! Responses are validated here, so the engine only sees typed records.

use crate::transport::{FsSelector, MetaTransport, Reply};
use async_trait::async_trait;
use dashmap::DashMap;
use fsaudit_common::config::RpcConfig;
use fsaudit_common::{
    Config, CopysetInfo, Dentry, Error, FileType, FsId, FsInfo, InodeAttr, InodeId, LeaderAddr,
    PartitionId, PartitionInfo, Quota, Result,
};
use fsaudit_proto::mds::{self, FsStatusCode, MdsServiceClient};
use fsaudit_proto::metaserver::{self, FsFileType, MetaServerServiceClient, MetaStatusCode};
use fsaudit_proto::topology::{self, TopoStatusCode, TopologyServiceClient};
use fsaudit_proto::{MAX_DECODING_MESSAGE_SIZE, common, heartbeat};
use std::fmt::Debug;
use std::future::Future;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, warn};

/// Transport speaking the MDS, topology and metaserver gRPC services
pub struct GrpcTransport {
    mds_addrs: Vec<String>,
    rpc: RpcConfig,
    /// Lazily connected channels by `host:port`
    channels: DashMap<String, Channel>,
}

impl GrpcTransport {
    pub fn new(mds_addrs: Vec<String>, rpc: RpcConfig) -> Result<Self> {
        if mds_addrs.is_empty() {
            return Err(Error::Configuration("no mds address configured".into()));
        }
        Ok(Self {
            mds_addrs,
            rpc,
            channels: DashMap::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.mds.addrs.clone(), config.rpc.clone())
    }

    fn channel(&self, addr: &str) -> Result<Channel> {
        if let Some(channel) = self.channels.get(addr) {
            return Ok(channel.clone());
        }

        let timeout = self.rpc.timeout();
        let channel = Endpoint::from_shared(format!("http://{addr}"))
            .map_err(|e| Error::Configuration(format!("invalid address {addr}: {e}")))?
            .connect_timeout(timeout)
            .timeout(timeout)
            .connect_lazy();
        self.channels.insert(addr.to_string(), channel.clone());
        debug!(addr, "opened channel");
        Ok(channel)
    }

    /// Issue `request` through `send` until one attempt succeeds
    async fn call<A, Req, Resp, F, Fut>(
        &self,
        op: &'static str,
        addrs: &[A],
        request: Req,
        send: F,
    ) -> Result<Resp>
    where
        A: AsRef<str>,
        Req: Clone + Debug,
        Resp: Debug,
        F: Fn(Channel, Req) -> Fut,
        Fut: Future<Output = std::result::Result<tonic::Response<Resp>, tonic::Status>>,
    {
        if self.rpc.verbose {
            debug!(op, ?request, "rpc request");
        }

        let timeout = self.rpc.timeout();
        let attempts = self.rpc.retry_times + 1;
        let mut last_error = String::from("no address to call");

        for attempt in 1..=attempts {
            for addr in addrs {
                let addr = addr.as_ref();
                let channel = self.channel(addr)?;
                match tokio::time::timeout(timeout, send(channel, request.clone())).await {
                    Ok(Ok(response)) => {
                        let response = response.into_inner();
                        if self.rpc.verbose {
                            debug!(op, addr = %addr, ?response, "rpc response");
                        }
                        return Ok(response);
                    }
                    Ok(Err(status)) => {
                        warn!(op, addr = %addr, attempt, code = ?status.code(), "rpc failed: {}", status.message());
                        last_error = format!("{addr}: {}", status.message());
                    }
                    Err(_) => {
                        warn!(op, addr = %addr, attempt, "rpc timed out after {:?}", timeout);
                        last_error = format!("{addr}: timed out after {timeout:?}");
                    }
                }
            }
        }

        Err(Error::Rpc(format!("{op} failed after {attempts} attempts: {last_error}")))
    }
}

#[async_trait]
impl MetaTransport for GrpcTransport {
    async fn get_fs_info(&self, selector: &FsSelector) -> Result<Reply<FsInfo>> {
        const OP: &str = "GetFsInfo";
        let request = match selector {
            FsSelector::Id(id) => mds::GetFsInfoRequest {
                fs_id: Some(id.get()),
                fs_name: None,
            },
            FsSelector::Name(name) => mds::GetFsInfoRequest {
                fs_id: None,
                fs_name: Some(name.clone()),
            },
        };
        let response = self
            .call(OP, &self.mds_addrs, request, |channel, request| async move {
                MdsServiceClient::new(channel)
                    .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE)
                    .get_fs_info(request)
                    .await
            })
            .await?;

        reply(OP, mds_status(required(OP, "status_code", response.status_code)?), || {
            let info = required(OP, "fs_info", response.fs_info)?;
            Ok(FsInfo {
                fs_id: FsId::new(required(OP, "fs_id", info.fs_id)?),
                fs_name: required(OP, "fs_name", info.fs_name)?,
            })
        })
    }

    async fn list_partitions(&self, fs_id: FsId) -> Result<Reply<Vec<PartitionInfo>>> {
        const OP: &str = "ListPartition";
        let request = topology::ListPartitionRequest {
            fs_id: Some(fs_id.get()),
        };
        let response = self
            .call(OP, &self.mds_addrs, request, |channel, request| async move {
                TopologyServiceClient::new(channel)
                    .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE)
                    .list_partition(request)
                    .await
            })
            .await?;

        partitions_reply(OP, response)
    }

    async fn get_copyset(&self, pool_id: u32, copyset_id: u32) -> Result<Reply<CopysetInfo>> {
        const OP: &str = "GetCopysetsInfo";
        let request = topology::GetCopysetsInfoRequest {
            copyset_keys: vec![topology::CopysetKey {
                pool_id: Some(pool_id),
                copyset_id: Some(copyset_id),
            }],
        };
        let response = self
            .call(OP, &self.mds_addrs, request, |channel, request| async move {
                TopologyServiceClient::new(channel)
                    .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE)
                    .get_copysets_info(request)
                    .await
            })
            .await?;

        let value = response
            .copyset_values
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed(OP, "no copyset info"))?;
        reply(OP, topo_status(required(OP, "status_code", value.status_code)?), || {
            decode_copyset(OP, required(OP, "copyset_info", value.copyset_info)?)
        })
    }

    async fn batch_get_inode_attr(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        inode_ids: &[InodeId],
    ) -> Result<Reply<Vec<InodeAttr>>> {
        const OP: &str = "BatchGetInodeAttr";
        let request = metaserver::BatchGetInodeAttrRequest {
            pool_id: Some(partition.pool_id),
            copyset_id: Some(partition.copyset_id),
            partition_id: Some(partition.partition_id.get()),
            fs_id: Some(partition.fs_id.get()),
            inode_id: inode_ids.iter().map(|id| id.get()).collect(),
        };
        let response = self
            .call(OP, &[leader.as_str()], request, |channel, request| async move {
                MetaServerServiceClient::new(channel)
                    .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE)
                    .batch_get_inode_attr(request)
                    .await
            })
            .await?;

        reply(OP, meta_status(required(OP, "status_code", response.status_code)?), || {
            response.attr.into_iter().map(|a| decode_attr(OP, a)).collect()
        })
    }

    async fn list_dentry(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        dir: InodeId,
    ) -> Result<Reply<Vec<Dentry>>> {
        const OP: &str = "ListDentry";
        let request = metaserver::ListDentryRequest {
            pool_id: Some(partition.pool_id),
            copyset_id: Some(partition.copyset_id),
            partition_id: Some(partition.partition_id.get()),
            fs_id: Some(partition.fs_id.get()),
            dir_inode_id: Some(dir.get()),
            tx_id: Some(partition.tx_id),
            ..Default::default()
        };
        let response = self
            .call(OP, &[leader.as_str()], request, |channel, request| async move {
                MetaServerServiceClient::new(channel)
                    .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE)
                    .list_dentry(request)
                    .await
            })
            .await?;

        reply(OP, meta_status(required(OP, "status_code", response.status_code)?), || {
            response.dentrys.into_iter().map(|d| decode_dentry(OP, d)).collect()
        })
    }

    async fn get_dentry(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        parent: InodeId,
        name: &str,
    ) -> Result<Reply<Option<Dentry>>> {
        const OP: &str = "GetDentry";
        let request = metaserver::GetDentryRequest {
            pool_id: Some(partition.pool_id),
            copyset_id: Some(partition.copyset_id),
            partition_id: Some(partition.partition_id.get()),
            fs_id: Some(partition.fs_id.get()),
            parent_inode_id: Some(parent.get()),
            name: Some(name.to_string()),
            tx_id: Some(partition.tx_id),
        };
        let response = self
            .call(OP, &[leader.as_str()], request, |channel, request| async move {
                MetaServerServiceClient::new(channel)
                    .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE)
                    .get_dentry(request)
                    .await
            })
            .await?;

        reply(OP, meta_status(required(OP, "status_code", response.status_code)?), || {
            response.dentry.map(|d| decode_dentry(OP, d)).transpose()
        })
    }

    async fn get_dir_quota(
        &self,
        leader: &LeaderAddr,
        partition: &PartitionInfo,
        dir: InodeId,
    ) -> Result<Reply<Quota>> {
        const OP: &str = "GetDirQuota";
        let request = metaserver::GetDirQuotaRequest {
            pool_id: Some(partition.pool_id),
            copyset_id: Some(partition.copyset_id),
            partition_id: Some(partition.partition_id.get()),
            fs_id: Some(partition.fs_id.get()),
            dir_inode_id: Some(dir.get()),
        };
        let response = self
            .call(OP, &[leader.as_str()], request, |channel, request| async move {
                MetaServerServiceClient::new(channel)
                    .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE)
                    .get_dir_quota(request)
                    .await
            })
            .await?;

        reply(OP, meta_status(required(OP, "status_code", response.status_code)?), || {
            Ok(decode_quota(required(OP, "quota", response.quota)?))
        })
    }

    async fn get_fs_quota(&self, leader: &LeaderAddr, partition: &PartitionInfo) -> Result<Reply<Quota>> {
        const OP: &str = "GetFsQuota";
        let request = metaserver::GetFsQuotaRequest {
            pool_id: Some(partition.pool_id),
            copyset_id: Some(partition.copyset_id),
            partition_id: Some(partition.partition_id.get()),
            fs_id: Some(partition.fs_id.get()),
        };
        let response = self
            .call(OP, &[leader.as_str()], request, |channel, request| async move {
                MetaServerServiceClient::new(channel)
                    .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE)
                    .get_fs_quota(request)
                    .await
            })
            .await?;

        reply(OP, meta_status(required(OP, "status_code", response.status_code)?), || {
            Ok(decode_quota(required(OP, "quota", response.quota)?))
        })
    }
}

/// Service verdict, independent of which service gave it
#[derive(Debug, PartialEq, Eq)]
enum Status {
    Ok,
    NotFound,
    Failed { code: i32, name: String },
}

fn unknown(code: i32) -> Status {
    Status::Failed {
        code,
        name: format!("UNKNOWN({code})"),
    }
}

fn topo_status(code: i32) -> Status {
    match TopoStatusCode::try_from(code) {
        Ok(TopoStatusCode::TopoOk) => Status::Ok,
        Ok(
            TopoStatusCode::TopoFsNotFound
            | TopoStatusCode::TopoPartitionNotFound
            | TopoStatusCode::TopoCopysetNotFound
            | TopoStatusCode::TopoPoolNotFound,
        ) => Status::NotFound,
        Ok(other) => Status::Failed {
            code,
            name: other.as_str_name().to_string(),
        },
        Err(_) => unknown(code),
    }
}

fn meta_status(code: i32) -> Status {
    match MetaStatusCode::try_from(code) {
        Ok(MetaStatusCode::Ok) => Status::Ok,
        Ok(MetaStatusCode::NotFound) => Status::NotFound,
        Ok(other) => Status::Failed {
            code,
            name: other.as_str_name().to_string(),
        },
        Err(_) => unknown(code),
    }
}

fn mds_status(code: i32) -> Status {
    match FsStatusCode::try_from(code) {
        Ok(FsStatusCode::Ok) => Status::Ok,
        Ok(FsStatusCode::NotFound) => Status::NotFound,
        Ok(other) => Status::Failed {
            code,
            name: other.as_str_name().to_string(),
        },
        Err(_) => unknown(code),
    }
}

/// Decode the payload only when the service reported success
fn reply<T>(op: &'static str, status: Status, decode: impl FnOnce() -> Result<T>) -> Result<Reply<T>> {
    match status {
        Status::Ok => decode().map(Reply::Ok),
        Status::NotFound => {
            debug!(op, "service reported not found");
            Ok(Reply::NotFound)
        }
        Status::Failed { code, name } => Ok(Reply::failed(code, name)),
    }
}

/// An fs with no partitions is reported as not found
fn partitions_reply(op: &'static str, response: topology::ListPartitionResponse) -> Result<Reply<Vec<PartitionInfo>>> {
    let status = match topo_status(required(op, "status_code", response.status_code)?) {
        Status::Ok if response.partition_info_list.is_empty() => Status::NotFound,
        status => status,
    };
    reply(op, status, || {
        response
            .partition_info_list
            .into_iter()
            .map(|p| decode_partition(op, p))
            .collect()
    })
}

fn required<T>(op: &'static str, field: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| Error::malformed(op, format!("missing {field}")))
}

fn decode_partition(op: &'static str, p: common::PartitionInfo) -> Result<PartitionInfo> {
    let partition = PartitionInfo {
        fs_id: FsId::new(required(op, "partition fs_id", p.fs_id)?),
        pool_id: required(op, "partition pool_id", p.pool_id)?,
        copyset_id: required(op, "partition copyset_id", p.copyset_id)?,
        partition_id: PartitionId::new(required(op, "partition_id", p.partition_id)?),
        start: required(op, "partition start", p.start)?,
        end: required(op, "partition end", p.end)?,
        tx_id: p.tx_id.unwrap_or(0),
    };
    if partition.start > partition.end {
        return Err(Error::malformed(
            op,
            format!(
                "partition {} has range [{}, {}]",
                partition.partition_id, partition.start, partition.end
            ),
        ));
    }
    Ok(partition)
}

fn decode_copyset(op: &'static str, c: heartbeat::CopySetInfo) -> Result<CopysetInfo> {
    Ok(CopysetInfo {
        pool_id: required(op, "copyset pool_id", c.pool_id)?,
        copyset_id: required(op, "copyset_id", c.copyset_id)?,
        leader_peer: c.leader_peer.and_then(|peer| peer.address),
        peers: c.peers.into_iter().filter_map(|peer| peer.address).collect(),
    })
}

fn decode_file_type(t: i32) -> FileType {
    match FsFileType::try_from(t) {
        Ok(FsFileType::TypeDirectory) => FileType::Directory,
        Ok(FsFileType::TypeFile) => FileType::File,
        Ok(FsFileType::TypeSymLink) => FileType::Symlink,
        Ok(FsFileType::TypeS3) => FileType::S3,
        Err(_) => FileType::Other(t),
    }
}

fn decode_attr(op: &'static str, a: metaserver::InodeAttr) -> Result<InodeAttr> {
    Ok(InodeAttr {
        fs_id: FsId::new(required(op, "attr fs_id", a.fs_id)?),
        inode_id: InodeId::new(required(op, "attr inode_id", a.inode_id)?),
        length: a.length.unwrap_or(0),
        file_type: decode_file_type(required(op, "attr type", a.r#type)?),
        parents: a.parent.into_iter().map(InodeId::new).collect(),
    })
}

fn decode_dentry(op: &'static str, d: metaserver::Dentry) -> Result<Dentry> {
    Ok(Dentry {
        fs_id: FsId::new(required(op, "dentry fs_id", d.fs_id)?),
        parent_id: InodeId::new(required(op, "dentry parent_inode_id", d.parent_inode_id)?),
        name: required(op, "dentry name", d.name)?,
        inode_id: InodeId::new(required(op, "dentry inode_id", d.inode_id)?),
        file_type: decode_file_type(required(op, "dentry type", d.r#type)?),
        tx_id: d.tx_id.unwrap_or(0),
    })
}

fn decode_quota(q: metaserver::Quota) -> Quota {
    Quota {
        max_bytes: q.max_bytes.unwrap_or(0),
        max_inodes: q.max_inodes.unwrap_or(0),
        used_bytes: q.used_bytes.unwrap_or(0),
        used_inodes: q.used_inodes.unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsaudit_proto::common::Peer;

    #[test]
    fn test_status_mapping() {
        assert_eq!(topo_status(0), Status::Ok);
        assert_eq!(topo_status(-16), Status::NotFound);
        assert_eq!(
            topo_status(-1),
            Status::Failed {
                code: -1,
                name: "TOPO_INTERNAL_ERROR".into()
            }
        );
        assert_eq!(meta_status(3), Status::NotFound);
        assert_eq!(mds_status(3), Status::NotFound);
        assert_eq!(
            meta_status(42),
            Status::Failed {
                code: 42,
                name: "UNKNOWN(42)".into()
            }
        );
    }

    #[test]
    fn test_reply_skips_decode_on_failure() {
        let r: Reply<u32> = reply("Op", Status::NotFound, || Err(Error::malformed("Op", "x"))).unwrap();
        assert_eq!(r, Reply::NotFound);
        assert!(reply::<u32>("Op", Status::Ok, || Err(Error::malformed("Op", "x"))).is_err());
    }

    #[test]
    fn test_decode_partition_rejects_missing_fields() {
        let mut p = common::PartitionInfo {
            fs_id: Some(1),
            pool_id: Some(1),
            copyset_id: Some(2),
            partition_id: Some(3),
            start: Some(0),
            end: Some(99),
            ..Default::default()
        };
        let partition = decode_partition("ListPartition", p.clone()).unwrap();
        assert_eq!(partition.copyset_key(), fsaudit_common::CopysetKey::new(1, 2));
        assert_eq!(partition.tx_id, 0);

        p.end = None;
        let err = decode_partition("ListPartition", p.clone()).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { op: "ListPartition", .. }));

        p.start = Some(100);
        p.end = Some(99);
        assert!(decode_partition("ListPartition", p).is_err());
    }

    #[test]
    fn test_empty_partition_list_is_not_found() {
        let empty = topology::ListPartitionResponse {
            status_code: Some(TopoStatusCode::TopoOk as i32),
            partition_info_list: Vec::new(),
        };
        assert_eq!(partitions_reply("ListPartition", empty).unwrap(), Reply::NotFound);

        let one = topology::ListPartitionResponse {
            status_code: Some(TopoStatusCode::TopoOk as i32),
            partition_info_list: vec![common::PartitionInfo {
                fs_id: Some(1),
                pool_id: Some(1),
                copyset_id: Some(1),
                partition_id: Some(1),
                start: Some(0),
                end: Some(99),
                tx_id: Some(0),
            }],
        };
        let Reply::Ok(list) = partitions_reply("ListPartition", one).unwrap() else {
            panic!("expected partitions");
        };
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_attr_wire_tags() {
        use prost::Message;

        // type and parent sit past the ownership and time fields
        let attr = metaserver::InodeAttr {
            inode_id: Some(3),
            fs_id: Some(1),
            length: Some(1000),
            uid: Some(1000),
            gid: Some(7),
            r#type: Some(FsFileType::TypeFile as i32),
            parent: vec![2],
            ..Default::default()
        };
        let bytes = attr.encode_to_vec();
        assert!(bytes.windows(2).any(|w| w == [14u8 << 3, 2]));
        assert!(bytes.windows(3).any(|w| w == [0xa0u8, 0x01, 2]));

        let wire = metaserver::InodeAttr::decode(bytes.as_slice()).unwrap();
        let decoded = decode_attr("BatchGetInodeAttr", wire).unwrap();
        assert_eq!(decoded.file_type, FileType::File);
        assert_eq!(decoded.length, 1000);
    }

    #[test]
    fn test_decode_copyset_leader() {
        let peer = |addr: &str| Peer {
            id: Some(1),
            address: Some(addr.to_string()),
        };
        let c = heartbeat::CopySetInfo {
            pool_id: Some(1),
            copyset_id: Some(2),
            peers: vec![peer("10.0.0.1:6701:0"), peer("10.0.0.2:6701:0")],
            epoch: Some(4),
            leader_peer: Some(peer("10.0.0.2:6701:0")),
        };
        let info = decode_copyset("GetCopysetsInfo", c).unwrap();
        assert_eq!(info.leader_peer.as_deref(), Some("10.0.0.2:6701:0"));
        assert_eq!(info.peers.len(), 2);
    }

    #[test]
    fn test_decode_attr_and_dentry() {
        let attr = decode_attr(
            "BatchGetInodeAttr",
            metaserver::InodeAttr {
                inode_id: Some(3),
                fs_id: Some(1),
                length: Some(1000),
                r#type: Some(FsFileType::TypeS3 as i32),
                parent: vec![2, 5],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(attr.file_type, FileType::S3);
        assert_eq!(attr.first_parent(), Some(InodeId::new(2)));

        let err = decode_dentry(
            "ListDentry",
            metaserver::Dentry {
                fs_id: Some(1),
                inode_id: Some(3),
                parent_inode_id: Some(2),
                name: None,
                r#type: Some(2),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        assert_eq!(decode_file_type(9), FileType::Other(9));
    }

    #[test]
    fn test_new_requires_mds_addr() {
        assert!(matches!(
            GrpcTransport::new(Vec::new(), RpcConfig::default()),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_mds_is_rpc_error() {
        let rpc = RpcConfig {
            timeout_ms: 200,
            retry_times: 1,
            verbose: true,
        };
        let transport = GrpcTransport::new(vec!["127.0.0.1:1".into()], rpc).unwrap();
        let err = transport.list_partitions(FsId::new(1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("after 2 attempts"));
    }
}
