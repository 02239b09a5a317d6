//! Read-side collaborator contract for BOM content.

use std::sync::Arc;

use loomerp_core::DomainResult;

use crate::model::{Bom, BomId, BomLine, BomVersionId};
use crate::version::BomVersion;

/// Read access to BOM headers, versions and their lines.
///
/// Implementations return `NotFound` for unknown BOMs/versions, and `Ok(None)` from
/// [`BomReader::active_version`] when a BOM has nothing active yet.
///
/// Each call is an independent read. A multi-call walk such as tree loading can observe
/// writes committed between its calls; run it through [`ConsistentRead`] to pin one view.
pub trait BomReader: Send + Sync {
    fn bom(&self, id: BomId) -> DomainResult<Bom>;

    fn version(&self, id: BomVersionId) -> DomainResult<BomVersion>;

    fn active_version(&self, bom_id: BomId) -> DomainResult<Option<BomVersion>>;

    /// All versions of a BOM, oldest first.
    fn versions_of(&self, bom_id: BomId) -> DomainResult<Vec<BomVersion>>;

    /// Lines of a version ordered by line number.
    fn lines(&self, version_id: BomVersionId) -> DomainResult<Vec<BomLine>>;
}

/// A [`BomReader`] that can serve several reads from one consistent view.
pub trait ConsistentRead: BomReader {
    /// Run `read` against a view that no concurrent write changes until it returns.
    fn read_consistent<T, F>(&self, read: F) -> DomainResult<T>
    where
        F: FnOnce(&dyn BomReader) -> DomainResult<T>;
}

impl<R> ConsistentRead for Arc<R>
where
    R: ConsistentRead + ?Sized,
{
    fn read_consistent<T, F>(&self, read: F) -> DomainResult<T>
    where
        F: FnOnce(&dyn BomReader) -> DomainResult<T>,
    {
        (**self).read_consistent(read)
    }
}

impl<R> BomReader for Arc<R>
where
    R: BomReader + ?Sized,
{
    fn bom(&self, id: BomId) -> DomainResult<Bom> {
        (**self).bom(id)
    }

    fn version(&self, id: BomVersionId) -> DomainResult<BomVersion> {
        (**self).version(id)
    }

    fn active_version(&self, bom_id: BomId) -> DomainResult<Option<BomVersion>> {
        (**self).active_version(bom_id)
    }

    fn versions_of(&self, bom_id: BomId) -> DomainResult<Vec<BomVersion>> {
        (**self).versions_of(bom_id)
    }

    fn lines(&self, version_id: BomVersionId) -> DomainResult<Vec<BomLine>> {
        (**self).lines(version_id)
    }
}
