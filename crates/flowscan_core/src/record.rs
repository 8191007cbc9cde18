//! The normalized transaction record persisted by the indexer and served
//! by the query surface.

use alloy_primitives::utils::format_ether;
use serde::{Deserialize, Serialize};

use crate::types::{QuantityError, Transaction, parse_wei};

/// One persisted native-currency transfer, keyed by transaction hash.
///
/// Addresses are stored lower-cased so queries are case-insensitive; `to`
/// is `None` for contract creations. `value` keeps full precision as an
/// ether-denominated decimal string. `is_native` distinguishes plain value
/// transfers from the token-transfer records a later enrichment may add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub hash: String,
    pub block: i64,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub timestamp: i64,
    pub method: String,
    pub is_native: bool,
}

impl TxRecord {
    /// Normalizes a full transaction body pulled out of a block.
    pub fn from_chain(
        tx: &Transaction,
        block_height: u64,
        block_time: u64,
    ) -> Result<Self, QuantityError> {
        let wei = parse_wei(&tx.value)?;
        Ok(TxRecord {
            hash: tx.hash.clone(),
            block: block_height as i64,
            from: tx.from.to_lowercase(),
            to: tx.to.as_ref().map(|t| t.to_lowercase()),
            value: format_ether(wei),
            timestamp: block_time as i64,
            method: method_label(tx.input.as_deref().unwrap_or("0x")),
            is_native: true,
        })
    }
}

/// Best-effort label for a transaction's function selector.
///
/// Empty calldata is a plain value transfer; a handful of ubiquitous
/// selectors get a readable name, everything else is "Unknown".
pub fn method_label(input: &str) -> String {
    if input.len() < 10 {
        return "Transfer".to_string();
    }
    // Calldata from a well-behaved node is ASCII hex, but don't trust that
    // when slicing.
    let Some(selector) = input.get(..10) else {
        return "Unknown".to_string();
    };
    let label = match selector {
        "0xa9059cbb" => "Transfer",
        "0x23b872dd" => "Transfer From",
        "0x095ea7b3" => "Approve",
        "0xd0e30db0" => "Deposit",
        "0x2e1a7d4d" => "Withdraw",
        "0x38ed1739" | "0x7ff36ab5" | "0x18cbafe5" => "Swap",
        "0x40c10f19" => "Mint",
        "0x42966c68" => "Burn",
        _ => "Unknown",
    };
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_tx() -> Transaction {
        Transaction {
            hash: "0xAbCd01".to_string(),
            from: "0xF00DfeedF00DfeedF00DfeedF00DfeedF00Dfeed".to_string(),
            to: Some("0xBEEFbeefBEEFbeefBEEFbeefBEEFbeefBEEFbeef".to_string()),
            value: "0x14d1120d7b160000".to_string(), // 1.5 ether
            input: Some("0x".to_string()),
            block_number: Some("0x64".to_string()),
        }
    }

    #[test]
    fn normalizes_addresses_and_value() {
        let rec = TxRecord::from_chain(&wire_tx(), 100, 1_700_000_000).unwrap();
        assert_eq!(rec.from, "0xf00dfeedf00dfeedf00dfeedf00dfeedf00dfeed");
        assert_eq!(
            rec.to.as_deref(),
            Some("0xbeefbeefbeefbeefbeefbeefbeefbeefbeefbeef")
        );
        assert_eq!(rec.value, "1.500000000000000000");
        assert_eq!(rec.block, 100);
        assert_eq!(rec.timestamp, 1_700_000_000);
        assert!(rec.is_native);
    }

    #[test]
    fn contract_creation_has_no_recipient() {
        let mut tx = wire_tx();
        tx.to = None;
        let rec = TxRecord::from_chain(&tx, 100, 0).unwrap();
        assert_eq!(rec.to, None);
    }

    #[test]
    fn method_labels() {
        assert_eq!(method_label("0x"), "Transfer");
        assert_eq!(method_label("0xa9059cbb00aa"), "Transfer");
        assert_eq!(method_label("0x095ea7b3ffff"), "Approve");
        assert_eq!(method_label("0xdeadbeef0000"), "Unknown");
    }

    #[test]
    fn method_label_tolerates_non_ascii_calldata() {
        // A multibyte char straddling the selector boundary must not panic.
        assert_eq!(method_label("0x1234567é00"), "Unknown");
        assert_eq!(method_label("0xé"), "Transfer");
    }

    #[test]
    fn record_serializes_camel_case() {
        let rec = TxRecord::from_chain(&wire_tx(), 100, 0).unwrap();
        let v = serde_json::to_value(&rec).unwrap();
        assert!(v.get("isNative").is_some());
        assert!(v.get("is_native").is_none());
    }
}
