//! Payment form helpers and the order summary.

use crate::constants::{CREDENTIAL_PRICE_AED, PROCESSING_FEE_AED, TOTAL_PRICE_AED};
use serde::Serialize;

/// Normalise a card number for display: digits only, grouped by four.
///
/// Only the first run of 4..=16 digits is kept. Inputs with fewer than four digits are
/// returned as the bare digits.
pub fn format_card_number(value: &str) -> String {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return digits;
    }

    let kept = &digits[..digits.len().min(16)];
    kept.as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub label: &'static str,
    pub amount_aed: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub lines: Vec<OrderLine>,
    pub total_aed: u32,
}

pub fn order_summary() -> OrderSummary {
    OrderSummary {
        lines: vec![
            OrderLine { label: "ZKP Credential Creation", amount_aed: CREDENTIAL_PRICE_AED },
            OrderLine { label: "Processing Fee", amount_aed: PROCESSING_FEE_AED },
        ],
        total_aed: TOTAL_PRICE_AED,
    }
}
