//! Postgres implementation of AccountStore.
//!
//! A row lock is a short `SELECT ... FOR UPDATE` transaction: committing the
//! lock handle commits the write and releases the row, dropping it rolls back.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::Account;
use crate::ports::{AccountLock, AccountStore, RepositoryError, RepositoryResult};

const ACCOUNT_COLUMNS: &str =
    "account_number, account_name, balance, status, created_at, updated_at";

/// Postgres-backed account store.
#[derive(Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn find(&self, account_number: &str) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE account_number = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AccountRow::into_domain).transpose()
    }

    async fn lock(&self, account_number: &str) -> RepositoryResult<Box<dyn AccountLock>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE account_number = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(account_number)
        .fetch_optional(&mut *tx)
        .await?;

        let account = row
            .ok_or_else(|| RepositoryError::NotFound(account_number.to_string()))?
            .into_domain()?;

        Ok(Box::new(PostgresAccountLock { tx, account }))
    }

    async fn insert(&self, account: &Account) -> RepositoryResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts ({})
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS, ACCOUNT_COLUMNS
        ))
        .bind(&account.account_number)
        .bind(&account.account_name)
        .bind(&account.balance)
        .bind(account.status.as_str())
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &account.account_number))?;

        row.into_domain()
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PostgresAccountLock {
    tx: Transaction<'static, Postgres>,
    account: Account,
}

#[async_trait]
impl AccountLock for PostgresAccountLock {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn set_balance(&mut self, balance: BigDecimal) -> RepositoryResult<()> {
        let updated_at: chrono::DateTime<chrono::Utc> = sqlx::query_scalar(
            "UPDATE accounts SET balance = $1, updated_at = NOW() WHERE account_number = $2 RETURNING updated_at",
        )
        .bind(&balance)
        .bind(&self.account.account_number)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, &self.account.account_number))?;

        self.account.balance = balance;
        self.account.updated_at = updated_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<Account> {
        let this = *self;
        this.tx.commit().await?;
        Ok(this.account)
    }
}

/// Maps unique and check violations onto the repository error taxonomy.
pub(crate) fn map_write_error(err: sqlx::Error, key: &str) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => return RepositoryError::Duplicate(key.to_string()),
            Some("23514") => return RepositoryError::Constraint(db.message().to_string()),
            _ => {}
        }
    }
    RepositoryError::Database(err)
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    account_number: String,
    account_name: String,
    balance: BigDecimal,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl AccountRow {
    fn into_domain(self) -> RepositoryResult<Account> {
        let status = self.status.parse().map_err(RepositoryError::Corrupt)?;
        Ok(Account {
            account_number: self.account_number,
            account_name: self.account_name,
            balance: self.balance,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
