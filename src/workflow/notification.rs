//! Transfer outcome messages with masked account numbers.

use bigdecimal::BigDecimal;

const MASK: &str = "****";
const VISIBLE: usize = 3;

/// Keeps the first and last three characters of identifiers of six or more
/// characters. Shorter identifiers are returned unchanged.
pub fn mask_account(account: &str) -> String {
    let chars: Vec<char> = account.chars().collect();
    if chars.len() < VISIBLE * 2 {
        return account.to_string();
    }

    let head: String = chars[..VISIBLE].iter().collect();
    let tail: String = chars[chars.len() - VISIBLE..].iter().collect();
    format!("{}{}{}", head, MASK, tail)
}

pub struct TransferSummary<'a> {
    pub source_account: Option<&'a str>,
    pub dest_account: Option<&'a str>,
    pub amount: Option<&'a BigDecimal>,
    pub transaction_id: Option<&'a str>,
    pub success: bool,
    pub error: Option<&'a str>,
}

impl TransferSummary<'_> {
    pub fn message(&self) -> String {
        let source = self.source_account.map(mask_account).unwrap_or_else(|| "unknown".to_string());
        let dest = self.dest_account.map(mask_account).unwrap_or_else(|| "unknown".to_string());
        let amount = self
            .amount
            .map(|a| a.to_string())
            .unwrap_or_else(|| "an unknown amount".to_string());

        if self.success {
            format!(
                "Transfer of {} from {} to {} completed. Transaction ID: {}",
                amount,
                source,
                dest,
                self.transaction_id.unwrap_or("n/a")
            )
        } else {
            format!(
                "Transfer of {} from {} to {} failed: {}",
                amount,
                source,
                dest,
                self.error.unwrap_or("unknown error")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_identifiers() {
        assert_eq!(mask_account("1234567890"), "123****890");
        assert_eq!(mask_account("ACC001"), "ACC****001");
    }

    #[test]
    fn short_identifiers_are_unmasked() {
        assert_eq!(mask_account("ACC01"), "ACC01");
        assert_eq!(mask_account(""), "");
    }

    #[test]
    fn success_message_masks_both_accounts() {
        let amount = BigDecimal::from(50000);
        let summary = TransferSummary {
            source_account: Some("1234567890"),
            dest_account: Some("0987654321"),
            amount: Some(&amount),
            transaction_id: Some("TXN-1"),
            success: true,
            error: None,
        };
        assert_eq!(
            summary.message(),
            "Transfer of 50000 from 123****890 to 098****321 completed. Transaction ID: TXN-1"
        );
    }

    #[test]
    fn failure_message_carries_error() {
        let summary = TransferSummary {
            source_account: Some("1234567890"),
            dest_account: None,
            amount: None,
            transaction_id: None,
            success: false,
            error: Some("insufficient funds"),
        };
        let message = summary.message();
        assert!(message.contains("failed: insufficient funds"));
        assert!(message.contains("to unknown"));
        assert!(!message.contains("1234567890"));
    }
}
