//! Storage adapters for the account store and transfer ledger ports.

pub mod memory_account_store;
pub mod memory_transaction_ledger;
pub mod postgres_account_store;
pub mod postgres_transaction_ledger;

pub use memory_account_store::InMemoryAccountStore;
pub use memory_transaction_ledger::InMemoryTransactionLedger;
pub use postgres_account_store::PostgresAccountStore;
pub use postgres_transaction_ledger::PostgresTransactionLedger;
