//! Account domain entity.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(AccountStatus::Active),
            "INACTIVE" => Ok(AccountStatus::Inactive),
            other => Err(format!("unknown account status '{}'", other)),
        }
    }
}

/// A balance-holding account addressed by its account number.
///
/// Balances only change through [`Account::debit`] and [`Account::credit`],
/// which the account store applies while the row lock is held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_number: String,
    pub account_name: String,
    pub balance: BigDecimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(account_number: String, account_name: String, balance: BigDecimal) -> Self {
        let now = Utc::now();
        Self {
            account_number,
            account_name,
            balance,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.status = AccountStatus::Inactive;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn has_at_least(&self, amount: &BigDecimal) -> bool {
        &self.balance >= amount
    }

    /// Balance after withdrawing `amount`, or `None` if that would overdraw.
    pub fn debit(&self, amount: &BigDecimal) -> Option<BigDecimal> {
        if !self.has_at_least(amount) {
            return None;
        }
        Some(&self.balance - amount)
    }

    pub fn credit(&self, amount: &BigDecimal) -> BigDecimal {
        &self.balance + amount
    }
}
