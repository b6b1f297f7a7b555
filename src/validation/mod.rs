use bigdecimal::BigDecimal;
use std::fmt;

pub const ACCOUNT_NUMBER_MAX_LEN: usize = 64;
pub const TRANSACTION_ID_MAX_LEN: usize = 64;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const AMOUNT_INPUT_MAX_LEN: usize = 64;
/// Fractional digits stored by the `NUMERIC(19, 4)` money columns.
pub const AMOUNT_MAX_SCALE: i64 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Collapses whitespace runs to one space, then strips control characters
/// left inside each word.
pub fn sanitize_string(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| word.chars().filter(|ch| !ch.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Account numbers are opaque identifiers: letters, digits, `-` and `_`.
pub fn validate_account_number(field: &'static str, account_number: &str) -> ValidationResult {
    validate_required(field, account_number)?;
    validate_max_len(field, account_number, ACCOUNT_NUMBER_MAX_LEN)?;

    if !account_number
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(ValidationError::new(
            field,
            "must contain only letters, digits, '-' or '_'",
        ));
    }

    Ok(())
}

pub fn validate_transaction_id(transaction_id: &str) -> ValidationResult {
    validate_required("transactionId", transaction_id)?;
    validate_max_len("transactionId", transaction_id, TRANSACTION_ID_MAX_LEN)
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    validate_scale("amount", amount)
}

/// Rejects values that would be rounded when stored.
pub fn validate_scale(field: &'static str, value: &BigDecimal) -> ValidationResult {
    if &value.with_scale(AMOUNT_MAX_SCALE) != value {
        return Err(ValidationError::new(
            field,
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }

    Ok(())
}

pub fn validate_distinct_accounts(source: &str, dest: &str) -> ValidationResult {
    if source == dest {
        return Err(ValidationError::new(
            "destAccount",
            "must differ from sourceAccount",
        ));
    }

    Ok(())
}
