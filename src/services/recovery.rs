//! Scan for transfer sagas stuck between the debit and a terminal state.
//!
//! Read only. Records found here need an operator or a recovery job; the
//! saga core never retries a compensation on its own.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::domain::{SagaState, TransferRecord};
use crate::ports::{RepositoryResult, TransactionLedger};

const RECOVERY_STATES: [SagaState; 2] = [SagaState::Debited, SagaState::CompensationStarted];

pub struct RecoveryScanner {
    ledger: Arc<dyn TransactionLedger>,
}

impl RecoveryScanner {
    pub fn new(ledger: Arc<dyn TransactionLedger>) -> Self {
        Self { ledger }
    }

    /// Records in `DEBITED` or `COMPENSATION_STARTED` not touched for `older_than`.
    pub async fn find_stuck(&self, older_than: Duration) -> RepositoryResult<Vec<TransferRecord>> {
        let cutoff = Utc::now() - older_than;
        let mut stuck = Vec::new();
        for state in RECOVERY_STATES {
            stuck.extend(self.ledger.list_by_saga_state(state, cutoff).await?);
        }
        stuck.sort_by_key(|r| r.updated_at);

        if !stuck.is_empty() {
            tracing::warn!(count = stuck.len(), "Found transfer sagas awaiting recovery");
        }
        Ok(stuck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryTransactionLedger;
    use bigdecimal::BigDecimal;

    fn record(id: &str) -> TransferRecord {
        TransferRecord::new(
            id.to_string(),
            "ACC-001".to_string(),
            "ACC-002".to_string(),
            BigDecimal::from(1),
            None,
        )
    }

    #[tokio::test]
    async fn finds_debited_and_half_compensated_records() {
        let ledger = InMemoryTransactionLedger::new();

        let mut debited = record("TXN-DEBITED");
        debited.mark_debited().unwrap();
        debited.updated_at = Utc::now() - Duration::minutes(10);
        ledger.insert(&debited).await.unwrap();

        let mut compensating = record("TXN-COMP");
        compensating.mark_debited().unwrap();
        compensating.begin_compensation("dest down").unwrap();
        compensating.updated_at = Utc::now() - Duration::minutes(20);
        ledger.insert(&compensating).await.unwrap();

        let mut done = record("TXN-DONE");
        done.mark_debited().unwrap();
        done.mark_credited().unwrap();
        done.updated_at = Utc::now() - Duration::minutes(30);
        ledger.insert(&done).await.unwrap();

        let scanner = RecoveryScanner::new(Arc::new(ledger));
        let stuck = scanner.find_stuck(Duration::minutes(5)).await.unwrap();

        let ids: Vec<&str> = stuck.iter().map(|r| r.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["TXN-COMP", "TXN-DEBITED"]);
    }

    #[tokio::test]
    async fn recent_records_are_not_reported() {
        let ledger = InMemoryTransactionLedger::new();
        let mut debited = record("TXN-FRESH");
        debited.mark_debited().unwrap();
        ledger.insert(&debited).await.unwrap();

        let scanner = RecoveryScanner::new(Arc::new(ledger));
        assert!(scanner.find_stuck(Duration::minutes(5)).await.unwrap().is_empty());
    }
}
