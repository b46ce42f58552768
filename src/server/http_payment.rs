use super::http::{reply, JsonReply};
use super::http_auth::Authenticated;
use super::http_errors::{map_payment_error, PAYMENT_REJECTED_CODE};
use super::http_types::*;
use super::state::AppState;
use crate::application::PaymentError;
use crate::domain::{EvidenceUpload, PaymentOutcome};
use crate::infrastructure::constant_time_eq;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use tracing::{debug, warn};

const EVIDENCE_FIELD: &str = "file";
const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Submit a payment proof image
///
/// Open to expired and suspended accounts, since paying is how they get back in.
#[utoipa::path(
    post,
    path = "/api/verify-payment",
    tag = "Payments",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "Image in the `file` field"),
    responses(
        (status = 200, description = "Payment accepted, account active", body = PaymentOutcomeResponse),
        (status = 202, description = "Proof stored, awaiting manual review", body = PaymentOutcomeResponse),
        (status = 400, description = "Proof rejected or invalid upload", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub(super) async fn verify_payment(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    multipart: Multipart,
) -> JsonReply {
    let upload = match read_evidence(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return reply(map_payment_error(&PaymentError::EmptyUpload)),
        Err(rejection) => return rejection,
    };

    match state
        .payments
        .submit(principal.account_id, upload, Utc::now())
        .await
    {
        Ok(PaymentOutcome::Activated { bank, amount }) => (
            StatusCode::OK,
            Json(serde_json::json!(PaymentOutcomeResponse {
                message: "Payment verified. Your account is now active.".to_string(),
                status: "active".to_string(),
                bank,
                amount: Some(amount),
                reason: None,
            })),
        ),
        Ok(PaymentOutcome::PendingReview { reason }) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!(PaymentOutcomeResponse {
                message: "Payment proof received and awaiting review.".to_string(),
                status: "pending".to_string(),
                bank: None,
                amount: None,
                reason: Some(reason),
            })),
        ),
        Ok(PaymentOutcome::Rejected { reason }) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Payment proof rejected: {}", reason),
                "code": PAYMENT_REJECTED_CODE,
            })),
        ),
        Err(e) => reply(map_payment_error(&e)),
    }
}

/// First multipart field named `file`, fully buffered.
async fn read_evidence(mut multipart: Multipart) -> Result<Option<EvidenceUpload>, JsonReply> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err(multipart_rejection(e)),
        };
        if field.name() != Some(EVIDENCE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("evidence").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_rejection)?;

        return Ok(Some(EvidenceUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
}

fn multipart_rejection(e: axum::extract::multipart::MultipartError) -> JsonReply {
    let status = e.status();
    warn!(error = %e, %status, "Rejected payment upload");
    let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "File too large".to_string()
    } else {
        "Malformed multipart upload".to_string()
    };
    (status, Json(serde_json::json!({ "error": message })))
}

/// Telegram bot webhook
///
/// Always acknowledges with 200 so Telegram does not redeliver, unless a
/// webhook secret is configured and the request does not carry it.
#[utoipa::path(
    post,
    path = "/telegram/webhook",
    tag = "Payments",
    request_body(content = String, content_type = "application/json", description = "Telegram Update object"),
    responses(
        (status = 200, description = "Update acknowledged", body = MessageResponse),
        (status = 401, description = "Webhook secret mismatch", body = ErrorResponse)
    )
)]
pub(super) async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> JsonReply {
    if !webhook_secret_matches(&headers, &state.telegram_webhook_secret) {
        warn!("Telegram webhook called without the configured secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Invalid webhook secret" })),
        );
    }

    let ack = (StatusCode::OK, Json(serde_json::json!({ "message": "ok" })));

    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            debug!(error = %e, "Ignoring unparseable Telegram update");
            return ack;
        }
    };

    let Some(message) = update.message else {
        debug!(update_id = ?update.update_id, "Ignoring Telegram update without a message");
        return ack;
    };
    let Some(text) = message.text.filter(|t| !t.trim().is_empty()) else {
        return ack;
    };

    state
        .chat
        .handle_message(message.chat.id, &text, Utc::now())
        .await;
    ack
}

/// An empty configured secret accepts every caller.
fn webhook_secret_matches(headers: &HeaderMap, configured: &str) -> bool {
    if configured.is_empty() {
        return true;
    }
    let presented = headers
        .get(TELEGRAM_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    constant_time_eq(presented.as_bytes(), configured.as_bytes())
}
