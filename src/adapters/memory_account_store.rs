//! In-process implementation of AccountStore.
//!
//! Each row carries a writer mutex and a committed snapshot. Readers only
//! touch the snapshot, so an unlocked balance read never waits on a saga
//! step holding the row.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::{Account, AccountStatus};
use crate::ports::{AccountLock, AccountStore, RepositoryError, RepositoryResult};

struct Row {
    writer: Arc<Mutex<()>>,
    committed: RwLock<Account>,
}

#[derive(Clone, Default)]
pub struct InMemoryAccountStore {
    rows: Arc<RwLock<HashMap<String, Arc<Row>>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admin override of an account's status, taken under the row lock.
    pub async fn set_status(
        &self,
        account_number: &str,
        status: AccountStatus,
    ) -> RepositoryResult<()> {
        let row = self.row(account_number).await?;
        let _guard = row.writer.lock().await;
        let mut committed = row.committed.write().await;
        committed.status = status;
        committed.updated_at = Utc::now();
        Ok(())
    }

    async fn row(&self, account_number: &str) -> RepositoryResult<Arc<Row>> {
        self.rows
            .read()
            .await
            .get(account_number)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(account_number.to_string()))
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find(&self, account_number: &str) -> RepositoryResult<Option<Account>> {
        let row = self.rows.read().await.get(account_number).cloned();
        match row {
            Some(row) => Ok(Some(row.committed.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn lock(&self, account_number: &str) -> RepositoryResult<Box<dyn AccountLock>> {
        let row = self.row(account_number).await?;
        let guard = Arc::clone(&row.writer).lock_owned().await;
        let account = row.committed.read().await.clone();

        Ok(Box::new(InMemoryAccountLock {
            row,
            account,
            _guard: guard,
        }))
    }

    async fn insert(&self, account: &Account) -> RepositoryResult<Account> {
        if account.balance < BigDecimal::from(0) {
            return Err(RepositoryError::Constraint(format!(
                "balance of {} must not be negative",
                account.account_number
            )));
        }

        let mut rows = self.rows.write().await;
        if rows.contains_key(&account.account_number) {
            return Err(RepositoryError::Duplicate(account.account_number.clone()));
        }
        rows.insert(
            account.account_number.clone(),
            Arc::new(Row {
                writer: Arc::new(Mutex::new(())),
                committed: RwLock::new(account.clone()),
            }),
        );
        Ok(account.clone())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

struct InMemoryAccountLock {
    row: Arc<Row>,
    account: Account,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl AccountLock for InMemoryAccountLock {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn set_balance(&mut self, balance: BigDecimal) -> RepositoryResult<()> {
        if balance < BigDecimal::from(0) {
            return Err(RepositoryError::Constraint(format!(
                "balance of {} must not be negative",
                self.account.account_number
            )));
        }
        self.account.balance = balance;
        self.account.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<Account> {
        let this = *self;
        *this.row.committed.write().await = this.account.clone();
        Ok(this.account)
    }
}
