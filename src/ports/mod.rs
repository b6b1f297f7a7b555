//! Storage ports used by the transfer saga.
//! Adapters live in `crate::adapters`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::domain::{Account, SagaState, TransferRecord};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Account rows with per-row exclusive locking.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Unlocked read of the last committed state.
    async fn find(&self, account_number: &str) -> RepositoryResult<Option<Account>>;

    /// Blocks until the row lock is free. The lock is held until the returned
    /// handle is committed or dropped.
    async fn lock(&self, account_number: &str) -> RepositoryResult<Box<dyn AccountLock>>;

    /// Out-of-band account creation (seed/admin data).
    async fn insert(&self, account: &Account) -> RepositoryResult<Account>;

    async fn ping(&self) -> RepositoryResult<()>;
}

/// An exclusively locked account row.
///
/// Writes are staged until [`AccountLock::commit`]; dropping the handle
/// without committing discards them and releases the lock.
#[async_trait]
pub trait AccountLock: Send {
    fn account(&self) -> &Account;

    async fn set_balance(&mut self, balance: BigDecimal) -> RepositoryResult<()>;

    async fn commit(self: Box<Self>) -> RepositoryResult<Account>;
}

/// Durable audit trail of transfer attempts, keyed by transaction id.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Fails with [`RepositoryError::Duplicate`] when the transaction id exists.
    async fn insert(&self, record: &TransferRecord) -> RepositoryResult<TransferRecord>;

    async fn update(&self, record: &TransferRecord) -> RepositoryResult<TransferRecord>;

    async fn get_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> RepositoryResult<Option<TransferRecord>>;

    async fn list_by_saga_state(
        &self,
        state: SagaState,
        updated_before: DateTime<Utc>,
    ) -> RepositoryResult<Vec<TransferRecord>>;
}
