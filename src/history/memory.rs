//! In-process history repository, used when no database is configured

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::RepositoryError;
use crate::history::{effective_limit, HistoryRecord, HistoryRepository};
use crate::identity::Identity;

#[derive(Default)]
pub struct InMemoryHistoryRepository {
    records: RwLock<Vec<HistoryRecord>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn create(&self, record: HistoryRecord) -> Result<HistoryRecord, RepositoryError> {
        let mut records = self.records.write();
        if records.iter().any(|r| r.id == record.id) {
            return Err(RepositoryError::Corrupt(format!(
                "duplicate record id {}",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn list_for(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, RepositoryError> {
        let owner = identity.user_id();
        let mut visible: Vec<HistoryRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.owner.as_deref() == owner)
            .cloned()
            .collect();

        // Newest insert first among equal timestamps
        visible.reverse();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        visible.truncate(effective_limit(identity, limit));
        Ok(visible)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.records.read().len() as u64)
    }
}
