//! In-process implementation of TransactionLedger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{SagaState, TransferRecord};
use crate::ports::{RepositoryError, RepositoryResult, TransactionLedger};

#[derive(Clone, Default)]
pub struct InMemoryTransactionLedger {
    records: Arc<RwLock<HashMap<String, TransferRecord>>>,
}

impl InMemoryTransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionLedger for InMemoryTransactionLedger {
    async fn insert(&self, record: &TransferRecord) -> RepositoryResult<TransferRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.transaction_id) {
            return Err(RepositoryError::Duplicate(record.transaction_id.clone()));
        }
        records.insert(record.transaction_id.clone(), record.clone());
        Ok(record.clone())
    }

    async fn update(&self, record: &TransferRecord) -> RepositoryResult<TransferRecord> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.transaction_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record.clone())
            }
            None => Err(RepositoryError::NotFound(record.transaction_id.clone())),
        }
    }

    async fn get_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> RepositoryResult<Option<TransferRecord>> {
        Ok(self.records.read().await.get(transaction_id).cloned())
    }

    async fn list_by_saga_state(
        &self,
        state: SagaState,
        updated_before: DateTime<Utc>,
    ) -> RepositoryResult<Vec<TransferRecord>> {
        let mut matching: Vec<TransferRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.saga_state == state && r.updated_at <= updated_before)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.updated_at);
        Ok(matching)
    }
}
