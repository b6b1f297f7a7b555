//! Framework-agnostic domain entities.

pub mod account;
pub mod transaction;

pub use account::{Account, AccountStatus};
pub use transaction::{SagaState, TransactionStatus, TransferRecord, TransitionError};
