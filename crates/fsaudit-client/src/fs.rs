//! Filesystem identity
//!
//! A filesystem is named on the command line either by id or by name. The
//! MDS fs-info lookup fills in the other half only when a caller needs it.

use crate::transport::{FsSelector, MetaTransport};
use fsaudit_common::{Error, FsId, FsInfo, Result};
use tracing::debug;

/// Validate a user-supplied filesystem id or name; exactly one must be set
pub fn check_fs_selector(fs_id: Option<u32>, fs_name: Option<&str>) -> Result<FsSelector> {
    match (fs_id, fs_name) {
        (None, None) => Err(Error::invalid_input("fsname or fsid is required")),
        (Some(_), Some(_)) => Err(Error::invalid_input("only one of fsname and fsid may be given")),
        (Some(0), None) | (None, Some("")) => Err(Error::invalid_input("fsname or fsid is invalid")),
        (Some(id), None) => Ok(FsSelector::Id(FsId::new(id))),
        (None, Some(name)) => Ok(FsSelector::Name(name.to_string())),
    }
}

/// Both halves of a filesystem's identity
pub async fn fs_info(transport: &dyn MetaTransport, selector: &FsSelector) -> Result<FsInfo> {
    let info = transport
        .get_fs_info(selector)
        .await?
        .into_result("GetFsInfo", || Error::FsNotFound(selector.to_string()))?;
    debug!(fs_id = %info.fs_id, fs_name = %info.fs_name, "got fs info");
    Ok(info)
}

/// Numeric id of the selected filesystem; no remote call when given by id
pub async fn resolve_fs_id(transport: &dyn MetaTransport, selector: &FsSelector) -> Result<FsId> {
    match selector {
        FsSelector::Id(id) => Ok(*id),
        FsSelector::Name(_) => {
            let info = fs_info(transport, selector).await?;
            if info.fs_id.get() == 0 {
                return Err(Error::invalid_input("fsid is invalid"));
            }
            Ok(info.fs_id)
        }
    }
}

/// Name of the selected filesystem; no remote call when given by name
pub async fn resolve_fs_name(transport: &dyn MetaTransport, selector: &FsSelector) -> Result<String> {
    match selector {
        FsSelector::Name(name) => Ok(name.clone()),
        FsSelector::Id(_) => {
            let info = fs_info(transport, selector).await?;
            if info.fs_name.is_empty() {
                return Err(Error::invalid_input("fsname is invalid"));
            }
            Ok(info.fs_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, Op};

    #[test]
    fn test_check_fs_selector() {
        assert_eq!(
            check_fs_selector(Some(3), None).unwrap(),
            FsSelector::Id(FsId::new(3))
        );
        assert_eq!(
            check_fs_selector(None, Some("fs1")).unwrap(),
            FsSelector::Name("fs1".into())
        );

        for (id, name) in [(None, None), (Some(1), Some("fs1")), (Some(0), None), (None, Some(""))] {
            let err = check_fs_selector(id, name).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{id:?} {name:?}");
        }
    }

    #[tokio::test]
    async fn test_resolve_only_when_needed() {
        let mock = MockTransport::new().with_fs(3, "fs1");

        let id = resolve_fs_id(&mock, &FsSelector::Id(FsId::new(9))).await.unwrap();
        assert_eq!(id, FsId::new(9));
        let name = resolve_fs_name(&mock, &FsSelector::Name("x".into())).await.unwrap();
        assert_eq!(name, "x");
        assert_eq!(mock.calls(Op::GetFsInfo), 0);

        let id = resolve_fs_id(&mock, &FsSelector::Name("fs1".into())).await.unwrap();
        assert_eq!(id, FsId::new(3));
        let name = resolve_fs_name(&mock, &FsSelector::Id(FsId::new(3))).await.unwrap();
        assert_eq!(name, "fs1");
        assert_eq!(mock.calls(Op::GetFsInfo), 2);
    }

    #[tokio::test]
    async fn test_resolve_rejects_blank_identity() {
        let mock = MockTransport::new().with_fs(0, "zero").with_fs(4, "");

        let err = resolve_fs_id(&mock, &FsSelector::Name("zero".into())).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = resolve_fs_name(&mock, &FsSelector::Id(FsId::new(4))).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = resolve_fs_id(&mock, &FsSelector::Name("nope".into())).await.unwrap_err();
        assert!(matches!(err, Error::FsNotFound(_)));
    }
}
