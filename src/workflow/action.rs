//! Closed set of actions the engine may invoke, each with a typed request
//! decoded from the variable map at the boundary.

use bigdecimal::BigDecimal;
use std::fmt;
use std::str::FromStr;

use super::fault::BusinessFault;
use super::variables::{self, Variables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelegateAction {
    ValidateSourceAccount,
    ValidateDestAccount,
    CheckBalance,
    ExecuteTransfer,
    SendNotification,
}

impl DelegateAction {
    pub const ALL: [DelegateAction; 5] = [
        DelegateAction::ValidateSourceAccount,
        DelegateAction::ValidateDestAccount,
        DelegateAction::CheckBalance,
        DelegateAction::ExecuteTransfer,
        DelegateAction::SendNotification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DelegateAction::ValidateSourceAccount => "validateSourceAccount",
            DelegateAction::ValidateDestAccount => "validateDestAccount",
            DelegateAction::CheckBalance => "checkBalance",
            DelegateAction::ExecuteTransfer => "executeTransfer",
            DelegateAction::SendNotification => "sendNotification",
        }
    }
}

impl fmt::Display for DelegateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DelegateAction {
    type Err = BusinessFault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DelegateAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| BusinessFault::validation(format!("unknown action '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    Source,
    Dest,
}

impl AccountRole {
    /// Variable holding the account number for this role.
    pub fn variable(&self) -> &'static str {
        match self {
            AccountRole::Source => "sourceAccount",
            AccountRole::Dest => "destAccount",
        }
    }

    /// Prefix for the role-scoped copies of the validation outputs.
    pub fn prefix(&self) -> &'static str {
        self.variable()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DelegateRequest {
    ValidateAccount {
        role: AccountRole,
        account_number: Option<String>,
    },
    CheckBalance {
        source_account: String,
        amount: BigDecimal,
    },
    ExecuteTransfer {
        transaction_id: Option<String>,
        source_account: String,
        dest_account: String,
        amount: BigDecimal,
        description: Option<String>,
    },
    SendNotification {
        source_account: Option<String>,
        dest_account: Option<String>,
        amount: Option<BigDecimal>,
        transaction_id: Option<String>,
        transfer_success: bool,
        transfer_error: Option<String>,
    },
}

impl DelegateRequest {
    pub fn decode(action: DelegateAction, vars: &Variables) -> Result<Self, BusinessFault> {
        match action {
            DelegateAction::ValidateSourceAccount => Ok(Self::validate(AccountRole::Source, vars)),
            DelegateAction::ValidateDestAccount => Ok(Self::validate(AccountRole::Dest, vars)),
            DelegateAction::CheckBalance => Ok(DelegateRequest::CheckBalance {
                source_account: require_string(vars, "sourceAccount")?,
                amount: require_amount(vars)?,
            }),
            DelegateAction::ExecuteTransfer => Ok(DelegateRequest::ExecuteTransfer {
                transaction_id: variables::get_string(vars, "transactionId"),
                source_account: require_string(vars, "sourceAccount")?,
                dest_account: require_string(vars, "destAccount")?,
                amount: require_amount(vars)?,
                description: variables::get_string(vars, "description")
                    .map(|d| crate::validation::sanitize_string(&d)),
            }),
            DelegateAction::SendNotification => Ok(DelegateRequest::SendNotification {
                source_account: variables::get_string(vars, "sourceAccount"),
                dest_account: variables::get_string(vars, "destAccount"),
                // Notifications are best-effort; a malformed amount is left out of the message.
                amount: variables::get_amount(vars, "amount").ok().flatten(),
                transaction_id: variables::get_string(vars, "transactionId"),
                transfer_success: variables::get_bool(vars, "transferSuccess").unwrap_or(false),
                transfer_error: variables::get_string(vars, "transferError"),
            }),
        }
    }

    fn validate(role: AccountRole, vars: &Variables) -> Self {
        DelegateRequest::ValidateAccount {
            role,
            account_number: variables::get_string(vars, role.variable())
                .or_else(|| variables::get_string(vars, "accountNumber")),
        }
    }
}

fn require_string(vars: &Variables, key: &'static str) -> Result<String, BusinessFault> {
    variables::get_string(vars, key)
        .ok_or_else(|| BusinessFault::validation(format!("{} is required", key)))
}

fn require_amount(vars: &Variables) -> Result<BigDecimal, BusinessFault> {
    variables::get_amount(vars, "amount")
        .map_err(BusinessFault::validation)?
        .ok_or_else(|| BusinessFault::validation("amount is required"))
}
