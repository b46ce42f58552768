use crate::application::{
    AccessError, AdminError, AuthError, BudgetError, LedgerError, PaymentError,
};
use crate::infrastructure::RepositoryError;
use axum::http::StatusCode;
use tracing::error;
use validator::ValidationErrors;

pub(super) const TRIAL_EXPIRED_CODE: &str = "TRIAL_EXPIRED";
pub(super) const ACCOUNT_SUSPENDED_CODE: &str = "ACCOUNT_SUSPENDED";
pub(super) const PAYMENT_REJECTED_CODE: &str = "PAYMENT_REJECTED";

fn internal(context: &str, err: &dyn std::error::Error) -> (StatusCode, serde_json::Value) {
    error!(error = %err, "{}", context);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!({ "error": "Internal server error" }),
    )
}

fn bad_request(msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg.into() }))
}

/// First field message from a validator failure.
pub(super) fn map_validation_errors(errors: &ValidationErrors) -> (StatusCode, serde_json::Value) {
    let message = errors
        .field_errors()
        .into_iter()
        .next()
        .map(|(field, errs)| {
            let detail = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "is invalid".to_string());
            format!("{} {}", field, detail)
        })
        .unwrap_or_else(|| "Invalid request".to_string());
    bad_request(message)
}

pub(super) fn map_auth_error(err: &AuthError) -> (StatusCode, serde_json::Value) {
    match err {
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "Invalid username or password" }),
        ),
        AuthError::InvalidToken => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "Missing or invalid token" }),
        ),
        AuthError::UsernameTaken => bad_request("Username already taken"),
        AuthError::Validation(msg) => bad_request(msg.clone()),
        AuthError::SetupDisabled => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Owner setup is disabled" }),
        ),
        AuthError::InvalidSetupSecret => (
            StatusCode::FORBIDDEN,
            serde_json::json!({ "error": "Invalid setup secret" }),
        ),
        AuthError::Crypto(e) => internal("Credential hashing failed", e),
        AuthError::Token(e) => internal("Token signing failed", e),
        AuthError::Repository(e) => internal("Account store failure", e),
    }
}

pub(super) fn map_access_error(err: &AccessError) -> (StatusCode, serde_json::Value) {
    match err {
        AccessError::TrialExpired => (
            StatusCode::PAYMENT_REQUIRED,
            serde_json::json!({
                "error": "Your trial has expired. Submit a payment proof to continue.",
                "code": TRIAL_EXPIRED_CODE,
            }),
        ),
        AccessError::Suspended => (
            StatusCode::FORBIDDEN,
            serde_json::json!({
                "error": "Your account is suspended. Submit a payment proof to reactivate it.",
                "code": ACCOUNT_SUSPENDED_CODE,
            }),
        ),
        AccessError::UnknownAccount => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "Missing or invalid token" }),
        ),
        AccessError::Repository(e) => internal("Access check failed", e),
    }
}

pub(super) fn map_ledger_error(err: &LedgerError) -> (StatusCode, serde_json::Value) {
    match err {
        LedgerError::Validation(msg) => bad_request(msg.clone()),
        LedgerError::NotFound => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Transaction not found" }),
        ),
        LedgerError::Repository(e) => internal("Ledger operation failed", e),
    }
}

pub(super) fn map_budget_error(err: &BudgetError) -> (StatusCode, serde_json::Value) {
    match err {
        BudgetError::Validation(msg) => bad_request(msg.clone()),
        BudgetError::Repository(e) => map_account_read_error(e),
    }
}

pub(super) fn map_account_read_error(err: &RepositoryError) -> (StatusCode, serde_json::Value) {
    match err {
        RepositoryError::NotFound(_) => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": "Account not found" }))
        }
        _ => internal("Failed to get account", err),
    }
}

pub(super) fn map_payment_error(err: &PaymentError) -> (StatusCode, serde_json::Value) {
    match err {
        PaymentError::EmptyUpload => bad_request("A payment proof file is required"),
        PaymentError::UnsupportedType(t) => bad_request(format!(
            "Unsupported file type {}; upload a JPEG, PNG or WebP image",
            t
        )),
        PaymentError::TooLarge { limit } => (
            StatusCode::PAYLOAD_TOO_LARGE,
            serde_json::json!({ "error": format!("File exceeds the {} byte limit", limit) }),
        ),
        PaymentError::UnknownAccount => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "Missing or invalid token" }),
        ),
        PaymentError::LogNotFound => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Payment log not found" }),
        ),
        PaymentError::Storage(e) => internal("Evidence storage failed", e),
        PaymentError::Repository(e) => internal("Payment bookkeeping failed", e),
    }
}

pub(super) fn map_admin_error(err: &AdminError) -> (StatusCode, serde_json::Value) {
    match err {
        AdminError::NotFound => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "User not found" }),
        ),
        AdminError::Validation(msg) => bad_request(msg.clone()),
        AdminError::SelfDeletion => bad_request("Administrators cannot delete their own account"),
        AdminError::Crypto(e) => internal("Credential hashing failed", e),
        AdminError::Repository(e) => internal("Administration failed", e),
    }
}
