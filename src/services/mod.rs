pub mod account_service;
pub mod recovery;

pub use account_service::{AccountService, TransferError};
pub use recovery::RecoveryScanner;
