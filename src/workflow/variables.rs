//! Helpers over the engine's variable map.

use bigdecimal::BigDecimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::validation::AMOUNT_INPUT_MAX_LEN;

pub type Variables = Map<String, Value>;

/// Reads a string-like variable. Numbers are accepted and rendered as text;
/// blank strings count as absent.
pub fn get_string(vars: &Variables, key: &str) -> Option<String> {
    match vars.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn get_bool(vars: &Variables, key: &str) -> Option<bool> {
    match vars.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses a monetary amount from a JSON number or its string form.
///
/// The decimal text is parsed directly, so `0.1` stays exactly one tenth.
pub fn parse_amount(value: &Value) -> Result<BigDecimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Null => return Err("amount is required".to_string()),
        other => return Err(format!("amount must be a number or numeric string, got {}", other)),
    };

    if text.is_empty() {
        return Err("amount is required".to_string());
    }
    if text.len() > AMOUNT_INPUT_MAX_LEN {
        return Err(format!("amount must be at most {} characters", AMOUNT_INPUT_MAX_LEN));
    }

    BigDecimal::from_str(&text).map_err(|_| format!("amount '{}' is not a valid decimal", text))
}

/// `Ok(None)` when the variable is absent, an error when present but malformed.
pub fn get_amount(vars: &Variables, key: &str) -> Result<Option<BigDecimal>, String> {
    match vars.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => parse_amount(value).map(Some),
    }
}

pub fn decimal_value(amount: &BigDecimal) -> Value {
    Value::String(amount.to_string())
}
