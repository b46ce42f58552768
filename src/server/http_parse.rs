use crate::domain::{AccountStatus, TransactionKind};

pub(super) fn parse_transaction_kind(kind: &str) -> Option<TransactionKind> {
    match kind {
        "income" => Some(TransactionKind::Income),
        "expense" => Some(TransactionKind::Expense),
        _ => None,
    }
}

pub(super) fn parse_account_status(status: &str) -> Option<AccountStatus> {
    match status {
        "trial" => Some(AccountStatus::Trial),
        "active" => Some(AccountStatus::Active),
        "suspended" => Some(AccountStatus::Suspended),
        "pending" => Some(AccountStatus::Pending),
        _ => None,
    }
}

/// Empty or whitespace-only query values count as absent.
pub(super) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
