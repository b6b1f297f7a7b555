//! Transfer ledger entity.
//! One record per transfer attempt, advanced step by step through the saga.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Compensated,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Compensated => "COMPENSATED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "COMPENSATED" => Ok(TransactionStatus::Compensated),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaState {
    Started,
    Debited,
    Credited,
    CompensationStarted,
    CompensationCompleted,
}

impl SagaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Started => "STARTED",
            SagaState::Debited => "DEBITED",
            SagaState::Credited => "CREDITED",
            SagaState::CompensationStarted => "COMPENSATION_STARTED",
            SagaState::CompensationCompleted => "COMPENSATION_COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Credited | SagaState::CompensationCompleted)
    }

    /// States a recovery job has to look at: money has left the source but
    /// the saga never reached a terminal state.
    pub fn needs_recovery(&self) -> bool {
        matches!(self, SagaState::Debited | SagaState::CompensationStarted)
    }

    fn can_advance_to(&self, next: SagaState) -> bool {
        matches!(
            (self, next),
            (SagaState::Started, SagaState::Debited)
                | (SagaState::Debited, SagaState::Credited)
                | (SagaState::Debited, SagaState::CompensationStarted)
                | (SagaState::CompensationStarted, SagaState::CompensationCompleted)
        )
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SagaState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(SagaState::Started),
            "DEBITED" => Ok(SagaState::Debited),
            "CREDITED" => Ok(SagaState::Credited),
            "COMPENSATION_STARTED" => Ok(SagaState::CompensationStarted),
            "COMPENSATION_COMPLETED" => Ok(SagaState::CompensationCompleted),
            other => Err(format!("unknown saga state '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal ledger transition {from}/{status} -> {to}")]
pub struct TransitionError {
    pub from: SagaState,
    pub status: TransactionStatus,
    pub to: &'static str,
}

/// Ledger record for one transfer attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: Uuid,
    pub transaction_id: String,
    pub source_account: String,
    pub dest_account: String,
    pub amount: BigDecimal,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub saga_state: SagaState,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub compensated_at: Option<DateTime<Utc>>,
}

impl TransferRecord {
    pub fn new(
        transaction_id: String,
        source_account: String,
        dest_account: String,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            source_account,
            dest_account,
            amount,
            description,
            status: TransactionStatus::Pending,
            saga_state: SagaState::Started,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            compensated_at: None,
        }
    }

    /// Generates a fresh idempotency key of the form `TXN-<32 hex>`.
    pub fn generate_transaction_id() -> String {
        format!("TXN-{}", Uuid::new_v4().simple()).to_uppercase()
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        if self.saga_state != SagaState::Started || self.status != TransactionStatus::Pending {
            return Err(self.illegal("FAILED"));
        }
        self.status = TransactionStatus::Failed;
        self.error_message = Some(reason.into());
        self.touch();
        Ok(())
    }

    pub fn mark_debited(&mut self) -> Result<(), TransitionError> {
        self.advance(SagaState::Debited)?;
        self.touch();
        Ok(())
    }

    pub fn mark_credited(&mut self) -> Result<(), TransitionError> {
        self.advance(SagaState::Credited)?;
        let now = Utc::now();
        self.status = TransactionStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn begin_compensation(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(SagaState::CompensationStarted)?;
        self.error_message = Some(reason.into());
        self.touch();
        Ok(())
    }

    pub fn mark_compensated(&mut self) -> Result<(), TransitionError> {
        self.advance(SagaState::CompensationCompleted)?;
        let now = Utc::now();
        self.status = TransactionStatus::Compensated;
        self.compensated_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn advance(&mut self, next: SagaState) -> Result<(), TransitionError> {
        if self.status != TransactionStatus::Pending || !self.saga_state.can_advance_to(next) {
            return Err(self.illegal(next.as_str()));
        }
        self.saga_state = next;
        Ok(())
    }

    fn illegal(&self, to: &'static str) -> TransitionError {
        TransitionError {
            from: self.saga_state,
            status: self.status,
            to,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TransferRecord {
        TransferRecord::new(
            "TXN-1".to_string(),
            "ACC-001".to_string(),
            "ACC-002".to_string(),
            BigDecimal::from(50),
            None,
        )
    }

    #[test]
    fn happy_path_ends_completed_and_credited() {
        let mut tx = record();
        tx.mark_debited().unwrap();
        tx.mark_credited().unwrap();

        assert_eq!(tx.saga_state, SagaState::Credited);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.completed_at.is_some());
        assert!(tx.compensated_at.is_none());
    }

    #[test]
    fn compensation_path_ends_compensated() {
        let mut tx = record();
        tx.mark_debited().unwrap();
        tx.begin_compensation("destination inactive").unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        tx.mark_compensated().unwrap();

        assert_eq!(tx.saga_state, SagaState::CompensationCompleted);
        assert_eq!(tx.status, TransactionStatus::Compensated);
        assert_eq!(tx.error_message.as_deref(), Some("destination inactive"));
        assert!(tx.compensated_at.is_some());
    }

    #[test]
    fn failure_is_only_possible_before_debit() {
        let mut tx = record();
        tx.mark_failed("insufficient funds").unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.saga_state, SagaState::Started);

        let mut debited = record();
        debited.mark_debited().unwrap();
        assert!(debited.mark_failed("too late").is_err());
    }

    #[test]
    fn states_are_never_revisited() {
        let mut tx = record();
        tx.mark_debited().unwrap();
        assert!(tx.mark_debited().is_err());
        tx.mark_credited().unwrap();
        assert!(tx.begin_compensation("late").is_err());
        assert!(tx.mark_credited().is_err());
    }

    #[test]
    fn credit_requires_debit() {
        let mut tx = record();
        let err = tx.mark_credited().unwrap_err();
        assert_eq!(err.from, SagaState::Started);
        assert_eq!(err.to, "CREDITED");
    }

    #[test]
    fn failed_record_cannot_advance() {
        let mut tx = record();
        tx.mark_failed("nope").unwrap();
        assert!(tx.mark_debited().is_err());
    }

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let a = TransferRecord::generate_transaction_id();
        let b = TransferRecord::generate_transaction_id();
        assert!(a.starts_with("TXN-"));
        assert_eq!(a.len(), 36);
        assert_ne!(a, b);
    }

    #[test]
    fn recovery_states() {
        assert!(SagaState::Debited.needs_recovery());
        assert!(SagaState::CompensationStarted.needs_recovery());
        assert!(!SagaState::Credited.needs_recovery());
        assert!(!SagaState::Started.needs_recovery());
    }

    #[test]
    fn saga_state_text_round_trip() {
        for state in [
            SagaState::Started,
            SagaState::Debited,
            SagaState::Credited,
            SagaState::CompensationStarted,
            SagaState::CompensationCompleted,
        ] {
            assert_eq!(state.as_str().parse::<SagaState>(), Ok(state));
        }
    }
}
