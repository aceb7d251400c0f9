//! Generation history: record model and repositories

pub mod memory;
pub mod model;
pub mod postgres;

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::identity::Identity;

pub use memory::InMemoryHistoryRepository;
pub use model::{HistoryRecord, HistoryRecordView};
pub use postgres::PgHistoryRepository;

/// Most records an anonymous caller is shown
pub const ANONYMOUS_WINDOW: usize = 10;

/// Append-only store of generation records
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Insert a record whose id is already assigned, returning the stored row
    async fn create(&self, record: HistoryRecord) -> Result<HistoryRecord, RepositoryError>;

    /// Records visible to `identity`, newest first.
    ///
    /// Authenticated callers see only their own records, up to `limit`.
    /// Anonymous callers see ownerless records, never more than
    /// [`ANONYMOUS_WINDOW`].
    async fn list_for(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, RepositoryError>;

    /// Total number of stored records
    async fn count(&self) -> Result<u64, RepositoryError>;
}

/// Row limit applied for `identity` given the requested `limit`
pub fn effective_limit(identity: &Identity, limit: usize) -> usize {
    match identity {
        Identity::Anonymous => limit.min(ANONYMOUS_WINDOW),
        Identity::User(_) => limit,
    }
}
