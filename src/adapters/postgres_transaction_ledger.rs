//! Postgres implementation of TransactionLedger.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::postgres_account_store::map_write_error;
use crate::domain::{SagaState, TransferRecord};
use crate::ports::{RepositoryError, RepositoryResult, TransactionLedger};

const LEDGER_COLUMNS: &str = "id, transaction_id, source_account, dest_account, amount, description, \
     status, saga_state, error_message, created_at, updated_at, completed_at, compensated_at";

/// Postgres-backed transfer ledger.
#[derive(Clone)]
pub struct PostgresTransactionLedger {
    pool: PgPool,
}

impl PostgresTransactionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionLedger for PostgresTransactionLedger {
    async fn insert(&self, record: &TransferRecord) -> RepositoryResult<TransferRecord> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            INSERT INTO transactions ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            LEDGER_COLUMNS, LEDGER_COLUMNS
        ))
        .bind(record.id)
        .bind(&record.transaction_id)
        .bind(&record.source_account)
        .bind(&record.dest_account)
        .bind(&record.amount)
        .bind(&record.description)
        .bind(record.status.as_str())
        .bind(record.saga_state.as_str())
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.completed_at)
        .bind(record.compensated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &record.transaction_id))?;

        row.into_domain()
    }

    async fn update(&self, record: &TransferRecord) -> RepositoryResult<TransferRecord> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $2, saga_state = $3, error_message = $4,
                updated_at = $5, completed_at = $6, compensated_at = $7
            WHERE transaction_id = $1
            RETURNING {}
            "#,
            LEDGER_COLUMNS
        ))
        .bind(&record.transaction_id)
        .bind(record.status.as_str())
        .bind(record.saga_state.as_str())
        .bind(&record.error_message)
        .bind(record.updated_at)
        .bind(record.completed_at)
        .bind(record.compensated_at)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(record.transaction_id.clone()))?
            .into_domain()
    }

    async fn get_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> RepositoryResult<Option<TransferRecord>> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM transactions WHERE transaction_id = $1",
            LEDGER_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransferRow::into_domain).transpose()
    }

    async fn list_by_saga_state(
        &self,
        state: SagaState,
        updated_before: DateTime<Utc>,
    ) -> RepositoryResult<Vec<TransferRecord>> {
        let rows = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM transactions WHERE saga_state = $1 AND updated_at <= $2 ORDER BY updated_at ASC",
            LEDGER_COLUMNS
        ))
        .bind(state.as_str())
        .bind(updated_before)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransferRow::into_domain).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransferRow {
    id: Uuid,
    transaction_id: String,
    source_account: String,
    dest_account: String,
    amount: BigDecimal,
    description: Option<String>,
    status: String,
    saga_state: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    compensated_at: Option<DateTime<Utc>>,
}

impl TransferRow {
    fn into_domain(self) -> RepositoryResult<TransferRecord> {
        Ok(TransferRecord {
            id: self.id,
            transaction_id: self.transaction_id,
            source_account: self.source_account,
            dest_account: self.dest_account,
            amount: self.amount,
            description: self.description,
            status: self.status.parse().map_err(RepositoryError::Corrupt)?,
            saga_state: self.saga_state.parse().map_err(RepositoryError::Corrupt)?,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            compensated_at: self.compensated_at,
        })
    }
}
