//! Account service: balance reads and the debit/credit transfer saga.
//!
//! Each saga step holds exactly one row lock and commits before the next
//! lock is taken. The source and destination rows are never locked at the
//! same time, so two transfers in opposite directions cannot deadlock. The
//! price is a window where the debit is visible without the credit; the
//! ledger marks that window with `DEBITED`.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::{Account, TransactionStatus, TransferRecord, TransitionError};
use crate::ports::{AccountStore, RepositoryError, TransactionLedger};
use crate::validation::{self, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account is not active: {0}")]
    AccountInactive(String),

    #[error("Insufficient funds in {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        transaction_id: String,
        account: String,
        available: BigDecimal,
        requested: BigDecimal,
    },

    #[error("Transfer {transaction_id} rejected: {reason}")]
    Rejected {
        transaction_id: String,
        reason: String,
    },

    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("Transfer {transaction_id} failed and was compensated: {cause}")]
    TransferFailed {
        transaction_id: String,
        cause: String,
    },

    #[error("Compensation for {transaction_id} failed, manual intervention required: {cause}")]
    CompensationFailed {
        transaction_id: String,
        cause: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

impl TransferError {
    /// Ledger key of the attempt this error belongs to, if one was recorded.
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            TransferError::InsufficientFunds { transaction_id, .. }
            | TransferError::Rejected { transaction_id, .. }
            | TransferError::TransferFailed { transaction_id, .. }
            | TransferError::CompensationFailed { transaction_id, .. } => Some(transaction_id),
            TransferError::DuplicateTransaction(transaction_id) => Some(transaction_id),
            _ => None,
        }
    }

    /// True for expected business outcomes the calling process routes on,
    /// false for infrastructure faults and failed compensations.
    pub fn is_business_failure(&self) -> bool {
        !matches!(
            self,
            TransferError::Repository(_)
                | TransferError::InvalidTransition(_)
                | TransferError::CompensationFailed { .. }
        )
    }
}

/// The saga coordinator. Owns the write path to accounts and the ledger.
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn TransactionLedger>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountStore>, ledger: Arc<dyn TransactionLedger>) -> Self {
        Self { accounts, ledger }
    }

    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    pub fn ledger(&self) -> &Arc<dyn TransactionLedger> {
        &self.ledger
    }

    /// True iff the account exists and is active. Lookup failures count as invalid.
    pub async fn validate_account(&self, account_number: &str) -> bool {
        match self.accounts.find(account_number).await {
            Ok(Some(account)) => account.is_active(),
            Ok(None) => false,
            Err(e) => {
                warn!(account = %account_number, error = %e, "Account lookup failed during validation");
                false
            }
        }
    }

    pub async fn get_account(&self, account_number: &str) -> Result<Option<Account>, TransferError> {
        Ok(self.accounts.find(account_number).await?)
    }

    pub async fn get_balance(&self, account_number: &str) -> Result<BigDecimal, TransferError> {
        self.accounts
            .find(account_number)
            .await?
            .map(|account| account.balance)
            .ok_or_else(|| TransferError::AccountNotFound(account_number.to_string()))
    }

    /// Advisory, unlocked check. The authoritative check runs under the
    /// source row lock inside the saga.
    pub async fn has_sufficient_balance(
        &self,
        account_number: &str,
        amount: &BigDecimal,
    ) -> Result<bool, TransferError> {
        Ok(self
            .accounts
            .find(account_number)
            .await?
            .map(|account| account.has_at_least(amount))
            .unwrap_or(false))
    }

    pub async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<TransferRecord>, TransferError> {
        Ok(self.ledger.get_by_transaction_id(transaction_id).await?)
    }

    /// Runs the transfer saga under a freshly generated transaction id.
    pub async fn execute_transfer(
        &self,
        source_account: &str,
        dest_account: &str,
        amount: &BigDecimal,
        description: Option<String>,
    ) -> Result<String, TransferError> {
        self.execute_transfer_with_id(
            TransferRecord::generate_transaction_id(),
            source_account,
            dest_account,
            amount,
            description,
        )
        .await
    }

    /// Runs the transfer saga under a caller-supplied idempotency key.
    ///
    /// A key that already exists in the ledger never starts a second attempt:
    /// a completed prior attempt with the same parameters is replayed, anything
    /// else is rejected as a duplicate.
    pub async fn execute_transfer_with_id(
        &self,
        transaction_id: String,
        source_account: &str,
        dest_account: &str,
        amount: &BigDecimal,
        description: Option<String>,
    ) -> Result<String, TransferError> {
        validation::validate_transaction_id(&transaction_id)?;
        validation::validate_account_number("sourceAccount", source_account)?;
        validation::validate_account_number("destAccount", dest_account)?;
        validation::validate_distinct_accounts(source_account, dest_account)?;
        validation::validate_positive_amount(amount)?;

        if let Some(prior) = self.ledger.get_by_transaction_id(&transaction_id).await? {
            return replay(prior, source_account, dest_account, amount);
        }

        self.require_active(source_account).await?;
        // Destination status is checked under its lock in the credit step.
        self.require_exists(dest_account).await?;

        let record = TransferRecord::new(
            transaction_id,
            source_account.to_string(),
            dest_account.to_string(),
            amount.clone(),
            description,
        );
        let mut record = match self.ledger.insert(&record).await {
            Ok(inserted) => inserted,
            Err(RepositoryError::Duplicate(id)) => {
                // Lost a race against a concurrent submission of the same key.
                return match self.ledger.get_by_transaction_id(&id).await? {
                    Some(prior) => replay(prior, source_account, dest_account, amount),
                    None => Err(TransferError::DuplicateTransaction(id)),
                };
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            transaction_id = %record.transaction_id,
            source = %record.source_account,
            dest = %record.dest_account,
            amount = %record.amount,
            saga_state = %record.saga_state,
            "Transfer saga started"
        );

        self.debit_source(&mut record).await?;

        if let Err(e) = self.ledger.update(&record).await {
            error!(transaction_id = %record.transaction_id, error = %e, "Failed to record debit");
            return self.compensate(record, e.into()).await;
        }
        debug!(transaction_id = %record.transaction_id, saga_state = %record.saga_state, "Source debited");

        if let Err(cause) = self.credit_destination(&record).await {
            return self.compensate(record, cause).await;
        }

        record.mark_credited()?;
        if let Err(e) = self.ledger.update(&record).await {
            // Both legs are committed; the record stays DEBITED for the recovery scan.
            error!(
                transaction_id = %record.transaction_id,
                error = %e,
                "Transfer credited but ledger completion could not be recorded"
            );
            return Err(e.into());
        }

        info!(
            transaction_id = %record.transaction_id,
            saga_state = %record.saga_state,
            status = %record.status,
            "Transfer completed"
        );
        Ok(record.transaction_id)
    }

    async fn require_active(&self, account_number: &str) -> Result<(), TransferError> {
        match self.accounts.find(account_number).await? {
            Some(account) if account.is_active() => Ok(()),
            Some(_) => Err(TransferError::AccountInactive(account_number.to_string())),
            None => Err(TransferError::AccountNotFound(account_number.to_string())),
        }
    }

    async fn require_exists(&self, account_number: &str) -> Result<(), TransferError> {
        match self.accounts.find(account_number).await? {
            Some(_) => Ok(()),
            None => Err(TransferError::AccountNotFound(account_number.to_string())),
        }
    }

    /// Steps 2 and 3: authoritative balance check and debit under the source
    /// lock. On success the lock is released and the record is `DEBITED` in
    /// memory; the caller persists it.
    async fn debit_source(&self, record: &mut TransferRecord) -> Result<(), TransferError> {
        let mut lock = match self.accounts.lock(&record.source_account).await {
            Ok(lock) => lock,
            Err(e) => {
                self.fail_record(record, &e.to_string()).await;
                return Err(e.into());
            }
        };

        if !lock.account().is_active() {
            drop(lock);
            let reason = format!("source account {} is not active", record.source_account);
            self.fail_record(record, &reason).await;
            return Err(TransferError::Rejected {
                transaction_id: record.transaction_id.clone(),
                reason,
            });
        }

        let debited = lock.account().debit(&record.amount);
        let new_balance = match debited {
            Some(balance) => balance,
            None => {
                let available = lock.account().balance.clone();
                drop(lock);
                let err = TransferError::InsufficientFunds {
                    transaction_id: record.transaction_id.clone(),
                    account: record.source_account.clone(),
                    available,
                    requested: record.amount.clone(),
                };
                warn!(transaction_id = %record.transaction_id, error = %err, "Transfer rejected");
                self.fail_record(record, &err.to_string()).await;
                return Err(err);
            }
        };

        let committed = match lock.set_balance(new_balance).await {
            Ok(()) => lock.commit().await,
            Err(e) => Err(e),
        };
        if let Err(e) = committed {
            self.fail_record(record, &e.to_string()).await;
            return Err(e.into());
        }

        record.mark_debited()?;
        Ok(())
    }

    /// Steps 4 and 5: credit under the destination lock.
    async fn credit_destination(&self, record: &TransferRecord) -> Result<(), TransferError> {
        let mut lock = self.accounts.lock(&record.dest_account).await?;

        if !lock.account().is_active() {
            return Err(TransferError::AccountInactive(record.dest_account.clone()));
        }

        let new_balance = lock.account().credit(&record.amount);
        lock.set_balance(new_balance).await?;
        lock.commit().await?;
        Ok(())
    }

    /// Step 6: return the debited amount to the source account.
    async fn compensate(
        &self,
        mut record: TransferRecord,
        cause: TransferError,
    ) -> Result<String, TransferError> {
        let cause = cause.to_string();
        warn!(
            transaction_id = %record.transaction_id,
            cause = %cause,
            "Credit step failed, compensating debit"
        );

        record.begin_compensation(cause.clone())?;
        let started = self.ledger.update(&record).await;
        if let Err(e) = &started {
            error!(transaction_id = %record.transaction_id, error = %e, "Failed to record compensation start");
        }

        if let Err(e) = self.reverse_debit(&record).await {
            error!(
                transaction_id = %record.transaction_id,
                error = %e,
                "Compensation failed, source account left debited"
            );
            return Err(TransferError::CompensationFailed {
                transaction_id: record.transaction_id,
                cause: e.to_string(),
            });
        }

        if let Err(e) = started {
            return Err(TransferError::CompensationFailed {
                transaction_id: record.transaction_id,
                cause: format!("source restored but ledger not updated: {}", e),
            });
        }

        record.mark_compensated()?;
        if let Err(e) = self.ledger.update(&record).await {
            error!(transaction_id = %record.transaction_id, error = %e, "Failed to record compensation");
            return Err(TransferError::CompensationFailed {
                transaction_id: record.transaction_id,
                cause: format!("source restored but ledger not updated: {}", e),
            });
        }

        info!(
            transaction_id = %record.transaction_id,
            saga_state = %record.saga_state,
            status = %record.status,
            "Transfer compensated"
        );
        Err(TransferError::TransferFailed {
            transaction_id: record.transaction_id,
            cause,
        })
    }

    async fn reverse_debit(&self, record: &TransferRecord) -> Result<(), RepositoryError> {
        let mut lock = self.accounts.lock(&record.source_account).await?;
        let restored = lock.account().credit(&record.amount);
        lock.set_balance(restored).await?;
        lock.commit().await?;
        Ok(())
    }

    /// Marks a not-yet-debited record FAILED. Persisting is best effort: the
    /// caller is already returning the original error.
    async fn fail_record(&self, record: &mut TransferRecord, reason: &str) {
        if let Err(e) = record.mark_failed(reason) {
            error!(transaction_id = %record.transaction_id, error = %e, "Cannot mark transfer failed");
            return;
        }
        if let Err(e) = self.ledger.update(record).await {
            error!(transaction_id = %record.transaction_id, error = %e, "Failed to record transfer failure");
        }
    }
}

fn replay(
    prior: TransferRecord,
    source_account: &str,
    dest_account: &str,
    amount: &BigDecimal,
) -> Result<String, TransferError> {
    let same_request = prior.source_account == source_account
        && prior.dest_account == dest_account
        && &prior.amount == amount;

    if same_request && prior.status == TransactionStatus::Completed {
        info!(transaction_id = %prior.transaction_id, "Replaying completed transfer");
        return Ok(prior.transaction_id);
    }

    warn!(
        transaction_id = %prior.transaction_id,
        status = %prior.status,
        saga_state = %prior.saga_state,
        "Rejecting resubmitted transaction id"
    );
    Err(TransferError::DuplicateTransaction(prior.transaction_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryAccountStore, InMemoryTransactionLedger};
    use crate::domain::{AccountStatus, SagaState};

    async fn service_with(accounts: &[(&str, i64)]) -> (AccountService, InMemoryAccountStore, InMemoryTransactionLedger) {
        let store = InMemoryAccountStore::new();
        for (number, balance) in accounts {
            store
                .insert(&Account::new(
                    number.to_string(),
                    format!("Holder {}", number),
                    BigDecimal::from(*balance),
                ))
                .await
                .unwrap();
        }
        let ledger = InMemoryTransactionLedger::new();
        let service = AccountService::new(Arc::new(store.clone()), Arc::new(ledger.clone()));
        (service, store, ledger)
    }

    #[tokio::test]
    async fn validate_account_reflects_status() {
        let (service, store, _) = service_with(&[("ACC-001", 10)]).await;
        assert!(service.validate_account("ACC-001").await);
        assert!(!service.validate_account("ACC-404").await);

        store.set_status("ACC-001", AccountStatus::Inactive).await.unwrap();
        assert!(!service.validate_account("ACC-001").await);
    }

    #[tokio::test]
    async fn get_balance_fails_for_unknown_account() {
        let (service, _, _) = service_with(&[("ACC-001", 10)]).await;
        assert_eq!(service.get_balance("ACC-001").await.unwrap(), BigDecimal::from(10));
        assert!(matches!(
            service.get_balance("ACC-404").await,
            Err(TransferError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn sufficient_balance_is_inclusive() {
        let (service, _, _) = service_with(&[("ACC-001", 10)]).await;
        assert!(service.has_sufficient_balance("ACC-001", &BigDecimal::from(10)).await.unwrap());
        assert!(!service.has_sufficient_balance("ACC-001", &BigDecimal::from(11)).await.unwrap());
        assert!(!service.has_sufficient_balance("ACC-404", &BigDecimal::from(1)).await.unwrap());
    }

    #[tokio::test]
    async fn precondition_failures_leave_no_ledger_record() {
        let (service, store, ledger) = service_with(&[("ACC-001", 100), ("ACC-002", 0)]).await;

        let zero = service
            .execute_transfer("ACC-001", "ACC-002", &BigDecimal::from(0), None)
            .await;
        assert!(matches!(zero, Err(TransferError::Validation(_))));

        let same = service
            .execute_transfer("ACC-001", "ACC-001", &BigDecimal::from(5), None)
            .await;
        assert!(matches!(same, Err(TransferError::Validation(_))));

        let missing = service
            .execute_transfer("ACC-001", "ACC-404", &BigDecimal::from(5), None)
            .await;
        assert!(matches!(missing, Err(TransferError::AccountNotFound(_))));

        store.set_status("ACC-001", AccountStatus::Inactive).await.unwrap();
        let inactive = service
            .execute_transfer("ACC-001", "ACC-002", &BigDecimal::from(5), None)
            .await;
        assert!(matches!(inactive, Err(TransferError::AccountInactive(_))));

        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn inactive_destination_is_debited_then_compensated() {
        let (service, store, ledger) =
            service_with(&[("SRC-001", 100000), ("DST-001", 0)]).await;
        store.set_status("DST-001", AccountStatus::Inactive).await.unwrap();

        let err = service
            .execute_transfer("SRC-001", "DST-001", &BigDecimal::from(50000), None)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::TransferFailed { .. }));
        assert!(err.is_business_failure());
        assert_eq!(service.get_balance("SRC-001").await.unwrap(), BigDecimal::from(100000));
        assert_eq!(service.get_balance("DST-001").await.unwrap(), BigDecimal::from(0));

        assert_eq!(ledger.len().await, 1);
        let record = service
            .get_transaction(err.transaction_id().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, TransactionStatus::Compensated);
        assert_eq!(record.saga_state, SagaState::CompensationCompleted);
        assert!(record.compensated_at.is_some());
        assert!(record.error_message.is_some());
    }

    #[tokio::test]
    async fn completed_transaction_id_is_replayed_not_reexecuted() {
        let (service, _, _) = service_with(&[("ACC-001", 100), ("ACC-002", 0)]).await;
        let amount = BigDecimal::from(30);

        let first = service
            .execute_transfer_with_id("TXN-FIXED".to_string(), "ACC-001", "ACC-002", &amount, None)
            .await
            .unwrap();
        let second = service
            .execute_transfer_with_id("TXN-FIXED".to_string(), "ACC-001", "ACC-002", &amount, None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(service.get_balance("ACC-001").await.unwrap(), BigDecimal::from(70));
        assert_eq!(service.get_balance("ACC-002").await.unwrap(), BigDecimal::from(30));
    }

    #[tokio::test]
    async fn reused_transaction_id_with_other_parameters_is_rejected() {
        let (service, _, _) = service_with(&[("ACC-001", 100), ("ACC-002", 0)]).await;
        service
            .execute_transfer_with_id("TXN-FIXED".to_string(), "ACC-001", "ACC-002", &BigDecimal::from(30), None)
            .await
            .unwrap();

        let err = service
            .execute_transfer_with_id("TXN-FIXED".to_string(), "ACC-001", "ACC-002", &BigDecimal::from(31), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::DuplicateTransaction(id) if id == "TXN-FIXED"));
    }

    #[tokio::test]
    async fn failed_transaction_id_is_not_retried() {
        let (service, _, ledger) = service_with(&[("ACC-001", 10), ("ACC-002", 0)]).await;
        let amount = BigDecimal::from(50);

        let first = service
            .execute_transfer_with_id("TXN-POOR".to_string(), "ACC-001", "ACC-002", &amount, None)
            .await
            .unwrap_err();
        assert!(matches!(first, TransferError::InsufficientFunds { .. }));

        let second = service
            .execute_transfer_with_id("TXN-POOR".to_string(), "ACC-001", "ACC-002", &amount, None)
            .await
            .unwrap_err();
        assert!(matches!(second, TransferError::DuplicateTransaction(_)));
        assert_eq!(ledger.len().await, 1);

        let record = service.get_transaction("TXN-POOR").await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Failed);
        assert_eq!(record.saga_state, SagaState::Started);
    }

    #[test]
    fn error_classification() {
        let failed = TransferError::TransferFailed {
            transaction_id: "TXN-1".to_string(),
            cause: "boom".to_string(),
        };
        assert!(failed.is_business_failure());
        assert_eq!(failed.transaction_id(), Some("TXN-1"));

        let fatal = TransferError::CompensationFailed {
            transaction_id: "TXN-2".to_string(),
            cause: "boom".to_string(),
        };
        assert!(!fatal.is_business_failure());

        let infra = TransferError::Repository(RepositoryError::Unavailable("down".to_string()));
        assert!(!infra.is_business_failure());
        assert_eq!(infra.transaction_id(), None);
    }
}
