use super::http_admin;
use super::http_auth::{ActiveUser, Authenticated};
use super::http_errors::{
    map_access_error, map_account_read_error, map_auth_error, map_budget_error, map_ledger_error,
    map_validation_errors,
};
use super::http_parse::{non_blank, parse_transaction_kind};
use super::http_payment;
use super::http_types::*;
use super::state::AppState;
use crate::application::DEFAULT_PAGE_SIZE;
use crate::domain::{BudgetSettings, NewTransaction, TransactionFilter};
use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::Utc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;
use validator::Validate;

/// Headroom for multipart boundaries and headers around the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let evidence_limit = state.max_evidence_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/setup-owner", post(setup_owner))
        .route("/telegram/webhook", post(http_payment::telegram_webhook))
        .route("/api/me", get(me))
        .route(
            "/api/verify-payment",
            post(http_payment::verify_payment).layer(DefaultBodyLimit::max(evidence_limit)),
        )
        .route("/api/transactions", get(list_transactions).post(create_transaction))
        .route("/api/transactions/today", get(today_transactions))
        .route("/api/transactions/:id", delete(delete_transaction))
        .route("/api/summary", get(summary))
        .route("/api/chart/daily", get(daily_chart))
        .route("/api/categories", get(categories))
        .route("/api/user/settings", get(get_settings).put(update_settings))
        .route(
            "/api/admin/users",
            get(http_admin::list_users).post(http_admin::create_user),
        )
        .route(
            "/api/admin/users/:id",
            delete(http_admin::delete_user).put(http_admin::update_user),
        )
        .route("/api/admin/users/:id/stats", get(http_admin::user_stats))
        .route("/api/admin/users/:id/status", patch(http_admin::update_user_status))
        .route(
            "/api/admin/payments",
            get(http_admin::list_payment_logs).delete(http_admin::delete_all_payment_logs),
        )
        .route("/api/admin/payments/:id", delete(http_admin::delete_payment_log))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        register,
        login,
        setup_owner,
        me,
        create_transaction,
        list_transactions,
        today_transactions,
        delete_transaction,
        summary,
        daily_chart,
        categories,
        get_settings,
        update_settings,
        http_payment::verify_payment,
        http_payment::telegram_webhook,
        http_admin::list_users,
        http_admin::create_user,
        http_admin::delete_user,
        http_admin::update_user,
        http_admin::user_stats,
        http_admin::update_user_status,
        http_admin::list_payment_logs,
        http_admin::delete_payment_log,
        http_admin::delete_all_payment_logs,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            MessageResponse,
            RegisterRequest,
            LoginRequest,
            SetupOwnerRequest,
            AccountResponse,
            LoginResponse,
            MeResponse,
            CreateTransactionRequest,
            TransactionResponse,
            TransactionCreatedResponse,
            TransactionListResponse,
            TransactionDataResponse,
            PageMeta,
            SummaryResponse,
            DailyPointResponse,
            DailyChartResponse,
            CategoryTotalResponse,
            CategoryTotalsResponse,
            BudgetSettingsRequest,
            BudgetSettingsResponse,
            PaymentOutcomeResponse,
            PaymentLogResponse,
            PaymentLogListResponse,
            DeletedCountResponse,
            AdminCreateUserRequest,
            AdminUpdateUserRequest,
            UpdateStatusRequest,
            SubscriptionResultResponse,
            AdminAccountResponse,
            AdminAccountListResponse,
            MonthlyTotals,
            UserStatsResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration, login and owner setup"),
        (name = "Ledger", description = "Transactions, reports and budget settings"),
        (name = "Payments", description = "Payment evidence and chat bot webhook"),
        (name = "Admin", description = "User and payment administration"),
    ),
    info(
        title = "Moneybook API",
        version = "0.1.0",
        description = "Personal finance tracking with trial, subscription and access gating",
        license(name = "MIT")
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub(super) type JsonReply = (StatusCode, Json<serde_json::Value>);

pub(super) fn reply(parts: (StatusCode, serde_json::Value)) -> JsonReply {
    (parts.0, Json(parts.1))
}

/// Health check endpoint
///
/// Verifies database connectivity and returns service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Health check failed: DB connectivity issue");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    error: Some("Database connectivity failed".to_string()),
                }),
            )
        }
    }
}

/// Register a trial account
#[utoipa::path(
    post,
    path = "/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created on a 24 hour trial", body = AccountResponse),
        (status = 400, description = "Invalid input or username taken", body = ErrorResponse)
    )
)]
async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> JsonReply {
    if let Err(e) = req.validate() {
        return reply(map_validation_errors(&e));
    }

    match state
        .credentials
        .register(&req.username, &req.password, Utc::now())
        .await
    {
        Ok(account) => (
            StatusCode::CREATED,
            Json(serde_json::json!(AccountResponse::from(account))),
        ),
        Err(e) => reply(map_auth_error(&e)),
    }
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token and account summary", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> JsonReply {
    match state.credentials.login(&req.username, &req.password).await {
        Ok(session) => (
            StatusCode::OK,
            Json(serde_json::json!(LoginResponse {
                token: session.token,
                account: session.account.into(),
            })),
        ),
        Err(e) => reply(map_auth_error(&e)),
    }
}

/// Create the owner (administrator) account
#[utoipa::path(
    post,
    path = "/setup-owner",
    tag = "Auth",
    request_body = SetupOwnerRequest,
    responses(
        (status = 201, description = "Owner created", body = AccountResponse),
        (status = 400, description = "Invalid input or username taken", body = ErrorResponse),
        (status = 403, description = "Wrong setup secret", body = ErrorResponse),
        (status = 404, description = "Owner setup disabled", body = ErrorResponse)
    )
)]
async fn setup_owner(State(state): State<AppState>, Json(req): Json<SetupOwnerRequest>) -> JsonReply {
    if let Err(e) = req.validate() {
        return reply(map_validation_errors(&e));
    }

    match state
        .credentials
        .setup_owner(&req.username, &req.password, &req.secret, Utc::now())
        .await
    {
        Ok(owner) => (
            StatusCode::CREATED,
            Json(serde_json::json!(AccountResponse::from(owner))),
        ),
        Err(e) => reply(map_auth_error(&e)),
    }
}

/// Current account and effective subscription status
///
/// Open to any authenticated caller, including expired or suspended ones.
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Account summary", body = MeResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn me(State(state): State<AppState>, Authenticated(principal): Authenticated) -> JsonReply {
    let now = Utc::now();
    match state.gate.inspect(&principal, now).await {
        Ok((account, effective)) => (
            StatusCode::OK,
            Json(serde_json::json!(MeResponse {
                effective_status: effective_status_label(effective).to_string(),
                trial_hours_remaining: account.trial_hours_remaining(now),
                account: account.into(),
            })),
        ),
        Err(e) => reply(map_access_error(&e)),
    }
}

/// Record an income or expense
#[utoipa::path(
    post,
    path = "/api/transactions",
    tag = "Ledger",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction stored, with a budget warning when the daily limit is reached", body = TransactionCreatedResponse),
        (status = 400, description = "Invalid transaction", body = ErrorResponse),
        (status = 402, description = "Trial expired", body = ErrorResponse),
        (status = 403, description = "Account suspended", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn create_transaction(
    State(state): State<AppState>,
    ActiveUser(principal): ActiveUser,
    Json(req): Json<CreateTransactionRequest>,
) -> JsonReply {
    if let Err(e) = req.validate() {
        return reply(map_validation_errors(&e));
    }
    let kind = match parse_transaction_kind(&req.kind) {
        Some(k) => k,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "Invalid transaction type",
                    "allowed": ["income", "expense"]
                })),
            );
        }
    };

    let new = NewTransaction {
        kind,
        amount: req.amount,
        category: req.category,
        note: req.note,
    };

    match state.ledger.record(principal.account_id, new, Utc::now()).await {
        Ok(recorded) => (
            StatusCode::CREATED,
            Json(serde_json::json!(TransactionCreatedResponse {
                data: recorded.transaction.into(),
                warning: recorded.warning,
            })),
        ),
        Err(e) => reply(map_ledger_error(&e)),
    }
}

/// List transactions, newest first
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "Ledger",
    params(TransactionListParams),
    responses(
        (status = 200, description = "One page of transactions", body = TransactionListResponse),
        (status = 400, description = "Invalid type filter", body = ErrorResponse),
        (status = 402, description = "Trial expired", body = ErrorResponse),
        (status = 403, description = "Account suspended", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn list_transactions(
    State(state): State<AppState>,
    ActiveUser(principal): ActiveUser,
    Query(params): Query<TransactionListParams>,
) -> JsonReply {
    let kind = match non_blank(params.kind) {
        Some(k) => match parse_transaction_kind(&k) {
            Some(kind) => Some(kind),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": "Invalid transaction type",
                        "allowed": ["income", "expense"]
                    })),
                );
            }
        },
        None => None,
    };
    let filter = TransactionFilter {
        kind,
        search: non_blank(params.search),
    };

    match state
        .ledger
        .list(
            principal.account_id,
            &filter,
            params.page.unwrap_or(1),
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await
    {
        Ok(listing) => (
            StatusCode::OK,
            Json(serde_json::json!(TransactionListResponse::from(listing))),
        ),
        Err(e) => reply(map_ledger_error(&e)),
    }
}

/// Transactions recorded since local midnight
#[utoipa::path(
    get,
    path = "/api/transactions/today",
    tag = "Ledger",
    responses(
        (status = 200, description = "Today's transactions", body = TransactionDataResponse),
        (status = 402, description = "Trial expired", body = ErrorResponse),
        (status = 403, description = "Account suspended", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn today_transactions(
    State(state): State<AppState>,
    ActiveUser(principal): ActiveUser,
) -> JsonReply {
    match state.ledger.today(principal.account_id, Utc::now()).await {
        Ok(items) => (
            StatusCode::OK,
            Json(serde_json::json!(TransactionDataResponse {
                data: items.into_iter().map(Into::into).collect(),
            })),
        ),
        Err(e) => reply(map_ledger_error(&e)),
    }
}

/// Delete one of the caller's transactions
#[utoipa::path(
    delete,
    path = "/api/transactions/{id}",
    tag = "Ledger",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "No such transaction for this account", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn delete_transaction(
    State(state): State<AppState>,
    ActiveUser(principal): ActiveUser,
    Path(id): Path<Uuid>,
) -> JsonReply {
    match state.ledger.delete(principal.account_id, id).await {
        Ok(()) => {
            info!(account_id = %principal.account_id, transaction_id = %id, "Transaction deleted");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "message": "Transaction deleted" })),
            )
        }
        Err(e) => reply(map_ledger_error(&e)),
    }
}

/// All-time income, expense and balance
#[utoipa::path(
    get,
    path = "/api/summary",
    tag = "Ledger",
    responses((status = 200, description = "Totals", body = SummaryResponse)),
    security(("bearer_auth" = []))
)]
async fn summary(State(state): State<AppState>, ActiveUser(principal): ActiveUser) -> JsonReply {
    match state.ledger.summary(principal.account_id).await {
        Ok(s) => (StatusCode::OK, Json(serde_json::json!(SummaryResponse::from(s)))),
        Err(e) => reply(map_ledger_error(&e)),
    }
}

/// Daily totals for the last 30 days
#[utoipa::path(
    get,
    path = "/api/chart/daily",
    tag = "Ledger",
    responses((status = 200, description = "Per local date, oldest first", body = DailyChartResponse)),
    security(("bearer_auth" = []))
)]
async fn daily_chart(State(state): State<AppState>, ActiveUser(principal): ActiveUser) -> JsonReply {
    match state.ledger.daily_chart(principal.account_id, Utc::now()).await {
        Ok(points) => (
            StatusCode::OK,
            Json(serde_json::json!(DailyChartResponse {
                data: points.into_iter().map(Into::into).collect(),
            })),
        ),
        Err(e) => reply(map_ledger_error(&e)),
    }
}

/// Totals per type and category
#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "Ledger",
    responses((status = 200, description = "Category totals", body = CategoryTotalsResponse)),
    security(("bearer_auth" = []))
)]
async fn categories(State(state): State<AppState>, ActiveUser(principal): ActiveUser) -> JsonReply {
    match state.ledger.categories(principal.account_id).await {
        Ok(totals) => (
            StatusCode::OK,
            Json(serde_json::json!(CategoryTotalsResponse {
                data: totals.into_iter().map(Into::into).collect(),
            })),
        ),
        Err(e) => reply(map_ledger_error(&e)),
    }
}

/// Current budget settings
#[utoipa::path(
    get,
    path = "/api/user/settings",
    tag = "Ledger",
    responses((status = 200, description = "Daily limit and alert message", body = BudgetSettingsResponse)),
    security(("bearer_auth" = []))
)]
async fn get_settings(State(state): State<AppState>, ActiveUser(principal): ActiveUser) -> JsonReply {
    match state.budget.settings(principal.account_id).await {
        Ok(settings) => (
            StatusCode::OK,
            Json(serde_json::json!(BudgetSettingsResponse::from(settings))),
        ),
        Err(e) => reply(map_account_read_error(&e)),
    }
}

/// Update budget settings
///
/// A daily limit of 0 disables alerts.
#[utoipa::path(
    put,
    path = "/api/user/settings",
    tag = "Ledger",
    request_body = BudgetSettingsRequest,
    responses(
        (status = 200, description = "Saved settings", body = BudgetSettingsResponse),
        (status = 400, description = "Invalid settings", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn update_settings(
    State(state): State<AppState>,
    ActiveUser(principal): ActiveUser,
    Json(req): Json<BudgetSettingsRequest>,
) -> JsonReply {
    if let Err(e) = req.validate() {
        return reply(map_validation_errors(&e));
    }

    let settings = BudgetSettings {
        daily_limit: req.daily_limit,
        alert_message: req.alert_message,
    };
    match state.budget.update_settings(principal.account_id, settings).await {
        Ok(saved) => (
            StatusCode::OK,
            Json(serde_json::json!(BudgetSettingsResponse::from(saved))),
        ),
        Err(e) => reply(map_budget_error(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::openapi::PathItemType;

    #[test]
    fn api_doc_describes_upload_and_admin_routes() {
        let doc = ApiDoc::openapi();

        let upload = doc
            .paths
            .paths
            .get("/api/verify-payment")
            .and_then(|item| item.operations.get(&PathItemType::Post))
            .and_then(|op| op.request_body.as_ref())
            .unwrap();
        assert!(upload.content.contains_key("multipart/form-data"));

        let webhook = doc
            .paths
            .paths
            .get("/telegram/webhook")
            .and_then(|item| item.operations.get(&PathItemType::Post))
            .and_then(|op| op.request_body.as_ref())
            .unwrap();
        assert!(webhook.content.contains_key("application/json"));

        let stats = doc.paths.paths.get("/api/admin/users/{id}/stats").unwrap();
        assert!(stats.operations.contains_key(&PathItemType::Get));

        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
