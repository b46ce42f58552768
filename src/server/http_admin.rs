use super::http::{reply, JsonReply};
use super::http_auth::AdminUser;
use super::http_errors::{map_admin_error, map_payment_error, map_validation_errors};
use super::http_parse::parse_account_status;
use super::http_types::*;
use super::state::AppState;
use crate::application::ProfileEdit;
use crate::domain::SubscriptionChange;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const MAX_LOG_PAGE: i64 = 500;

/// All accounts with their effective status
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    responses(
        (status = 200, description = "Accounts, newest first", body = AdminAccountListResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub(super) async fn list_users(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> JsonReply {
    match state.admin.list_accounts(Utc::now()).await {
        Ok(accounts) => (
            StatusCode::OK,
            Json(serde_json::json!(AdminAccountListResponse {
                data: accounts.into_iter().map(Into::into).collect(),
            })),
        ),
        Err(e) => reply(map_admin_error(&e)),
    }
}

/// Create an active account on the provisioned window
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "Admin",
    request_body = AdminCreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid input or username taken", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub(super) async fn create_user(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Json(req): Json<AdminCreateUserRequest>,
) -> JsonReply {
    if let Err(e) = req.validate() {
        return reply(map_validation_errors(&e));
    }

    match state
        .admin
        .create_account(&req.username, &req.password, req.telegram_id, Utc::now())
        .await
    {
        Ok(account) => {
            info!(admin_id = %actor.account_id, account_id = %account.id, "Account created by administrator");
            (
                StatusCode::CREATED,
                Json(serde_json::json!(AccountResponse::from(account))),
            )
        }
        Err(e) => reply(map_admin_error(&e)),
    }
}

/// Delete an account with its transactions and payment evidence
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 400, description = "Attempt to delete own account", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub(super) async fn delete_user(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(id): Path<Uuid>,
) -> JsonReply {
    match state.admin.delete_account(&actor, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "User deleted" })),
        ),
        Err(e) => reply(map_admin_error(&e)),
    }
}

/// Edit username, password or linked chat
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, description = "Updated account", body = AccountResponse),
        (status = 400, description = "Invalid input or username taken", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub(super) async fn update_user(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateUserRequest>,
) -> JsonReply {
    let edit = ProfileEdit {
        username: req.username,
        password: req.password,
        telegram_id: req.telegram_id,
        unlink_telegram: req.unlink_telegram,
    };

    match state.admin.update_profile(id, edit).await {
        Ok(account) => (
            StatusCode::OK,
            Json(serde_json::json!(AccountResponse::from(account))),
        ),
        Err(e) => reply(map_admin_error(&e)),
    }
}

/// Current-month income and expense for one account
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/stats",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Monthly totals", body = UserStatsResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub(super) async fn user_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> JsonReply {
    match state.admin.monthly_stats(id, Utc::now()).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(serde_json::json!(UserStatsResponse::from(stats))),
        ),
        Err(e) => reply(map_admin_error(&e)),
    }
}

/// Set subscription status and/or adjust the trial deadline
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/status",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Subscription updated", body = SubscriptionResultResponse),
        (status = 400, description = "Invalid status or empty change", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub(super) async fn update_user_status(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> JsonReply {
    let status = match req.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match parse_account_status(raw) {
            Some(status) => Some(status),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": "Invalid status",
                        "allowed": ["trial", "active", "suspended", "pending"]
                    })),
                );
            }
        },
        None => None,
    };

    let change = SubscriptionChange {
        status,
        add_trial_days: req.add_trial_days,
    };

    match state.admin.update_subscription(id, change, Utc::now()).await {
        Ok(account) => (
            StatusCode::OK,
            Json(serde_json::json!(SubscriptionResultResponse {
                message: "Subscription updated".to_string(),
                new_status: account.status.to_string(),
                trial_ends_at: account.trial_ends_at,
                username: account.username,
            })),
        ),
        Err(e) => reply(map_admin_error(&e)),
    }
}

/// Payment evidence log, newest first
#[utoipa::path(
    get,
    path = "/api/admin/payments",
    tag = "Admin",
    params(PaginationParams),
    responses((status = 200, description = "Log entries", body = PaymentLogListResponse)),
    security(("bearer_auth" = []))
)]
pub(super) async fn list_payment_logs(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<PaginationParams>,
) -> JsonReply {
    let limit = params.limit.clamp(1, MAX_LOG_PAGE);
    let offset = params.offset.max(0);

    match state.payments.list_logs(limit, offset).await {
        Ok(logs) => (
            StatusCode::OK,
            Json(serde_json::json!(PaymentLogListResponse {
                data: logs.into_iter().map(Into::into).collect(),
            })),
        ),
        Err(e) => reply(map_payment_error(&e)),
    }
}

/// Delete one payment log entry and its evidence file
#[utoipa::path(
    delete,
    path = "/api/admin/payments/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Payment log ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Payment log not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub(super) async fn delete_payment_log(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> JsonReply {
    match state.payments.delete_log(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "Payment log deleted" })),
        ),
        Err(e) => reply(map_payment_error(&e)),
    }
}

/// Delete the whole payment log and every evidence file
#[utoipa::path(
    delete,
    path = "/api/admin/payments",
    tag = "Admin",
    responses((status = 200, description = "Number of entries removed", body = DeletedCountResponse)),
    security(("bearer_auth" = []))
)]
pub(super) async fn delete_all_payment_logs(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
) -> JsonReply {
    match state.payments.delete_all_logs().await {
        Ok(deleted) => {
            info!(admin_id = %actor.account_id, deleted, "Payment log cleared");
            (
                StatusCode::OK,
                Json(serde_json::json!(DeletedCountResponse {
                    message: "All payment logs deleted".to_string(),
                    deleted,
                })),
            )
        }
        Err(e) => reply(map_payment_error(&e)),
    }
}
