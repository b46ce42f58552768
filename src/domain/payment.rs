use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Keywords whose presence marks a transfer receipt as successful.
pub const SUCCESS_KEYWORDS: [&str; 2] = ["BERHASIL", "SUCCESS"];
/// Recognized banks and wallets, in ascending priority: a later match wins.
pub const BANK_KEYWORDS: [&str; 3] = ["BCA", "DANA", "GOPAY"];
pub const UNKNOWN_BANK: &str = "Unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvidenceVerdict {
    Accepted,
    Rejected,
    ManualReview,
}

/// An uploaded payment proof, before it is stored.
#[derive(Debug, Clone)]
pub struct EvidenceUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl EvidenceUpload {
    /// File extension for an accepted image content type.
    pub fn image_extension(&self) -> Option<&'static str> {
        match self.content_type.as_str() {
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/webp" => Some("webp"),
            _ => None,
        }
    }
}

/// Evidence log entry. Never mutated once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentLog {
    pub id: Uuid,
    pub account_id: Uuid,
    pub username: String,
    pub evidence_path: String,
    pub evidence_sha256: String,
    pub detected_bank: Option<String>,
    pub detected_amount: i64,
    pub raw_output: String,
    pub verdict: EvidenceVerdict,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaymentInfo {
    pub is_valid: bool,
    pub bank: Option<String>,
    pub amount: i64,
    pub reason: String,
}

/// Judge recognized receipt text.
pub fn extract_payment_info(text: &str) -> PaymentInfo {
    let text = text.to_uppercase();

    if !SUCCESS_KEYWORDS.iter().any(|k| text.contains(k)) {
        return PaymentInfo {
            is_valid: false,
            bank: None,
            amount: 0,
            reason: "No successful transfer status found".to_string(),
        };
    }

    let bank = BANK_KEYWORDS
        .iter()
        .rev()
        .find(|k| text.contains(*k))
        .copied()
        .unwrap_or(UNKNOWN_BANK);

    PaymentInfo {
        is_valid: true,
        bank: Some(bank.to_string()),
        amount: detect_amount(&text),
        reason: "Receipt recognized".to_string(),
    }
}

/// First `Rp`-prefixed token, thousands separators ignored. A bare `Rp`
/// takes its digits from the token after it.
fn detect_amount(upper: &str) -> i64 {
    let tokens: Vec<String> = upper
        .split_whitespace()
        .map(|part| part.replace(['.', ','], ""))
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        let Some(rest) = token.strip_prefix("RP") else {
            continue;
        };
        if rest.chars().any(|c| c.is_ascii_digit()) {
            return parse_digits(rest);
        }
        return tokens.get(i + 1).map(|next| parse_digits(next)).unwrap_or(0);
    }
    0
}

fn parse_digits(s: &str) -> i64 {
    s.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d)))
}

/// What the submitter is told about their evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Activated { bank: Option<String>, amount: i64 },
    PendingReview { reason: String },
    Rejected { reason: String },
}
