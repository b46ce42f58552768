use crate::application::{AccountOverview, MonthlyStats, TransactionListing};
use crate::domain::{
    Account, BudgetSettings, CategoryTotal, DailyPoint, EffectiveStatus, LedgerSummary,
    PaymentLog, Transaction,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub(super) fn effective_status_label(status: EffectiveStatus) -> &'static str {
    match status {
        EffectiveStatus::Admin => "admin",
        EffectiveStatus::Active => "active",
        EffectiveStatus::TrialValid => "trial",
        EffectiveStatus::TrialExpired => "trial_expired",
        EffectiveStatus::Suspended => "suspended",
        EffectiveStatus::Pending => "pending",
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct HealthResponse {
    pub(super) status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct ErrorResponse {
    pub(super) error: String,
    /// Machine-readable code for subscription rejections.
    #[schema(example = "TRIAL_EXPIRED")]
    pub(super) code: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct MessageResponse {
    pub(super) message: String,
}

// ---- credentials ----

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    #[schema(example = "budi")]
    pub(super) username: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub(super) password: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct LoginRequest {
    pub(super) username: String,
    pub(super) password: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct SetupOwnerRequest {
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub(super) username: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub(super) password: String,
    pub(super) secret: String,
}

#[derive(Serialize, ToSchema)]
pub(super) struct AccountResponse {
    pub(super) id: Uuid,
    pub(super) username: String,
    pub(super) telegram_id: Option<i64>,
    #[schema(example = "user")]
    pub(super) role: String,
    #[schema(example = "trial")]
    pub(super) status: String,
    pub(super) trial_ends_at: DateTime<Utc>,
    pub(super) daily_limit: i64,
    pub(super) alert_message: Option<String>,
    pub(super) created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            telegram_id: account.telegram_id,
            role: account.role.to_string(),
            status: account.status.to_string(),
            trial_ends_at: account.trial_ends_at,
            daily_limit: account.daily_limit,
            alert_message: account.alert_message,
            created_at: account.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct LoginResponse {
    pub(super) token: String,
    pub(super) account: AccountResponse,
}

#[derive(Serialize, ToSchema)]
pub(super) struct MeResponse {
    pub(super) account: AccountResponse,
    #[schema(example = "trial")]
    pub(super) effective_status: String,
    pub(super) trial_hours_remaining: i64,
}

// ---- ledger ----

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct CreateTransactionRequest {
    #[serde(rename = "type")]
    #[schema(example = "expense")]
    pub(super) kind: String,
    #[validate(range(min = 1, message = "must be greater than zero"))]
    #[schema(example = 25000)]
    pub(super) amount: i64,
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    #[schema(example = "Food")]
    pub(super) category: String,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub(super) note: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct TransactionResponse {
    pub(super) id: Uuid,
    #[serde(rename = "type")]
    pub(super) kind: String,
    pub(super) amount: i64,
    pub(super) category: String,
    pub(super) note: Option<String>,
    pub(super) created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            kind: t.kind.to_string(),
            amount: t.amount,
            category: t.category,
            note: t.note,
            created_at: t.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct TransactionCreatedResponse {
    pub(super) data: TransactionResponse,
    /// Present when today's expenses reached the daily limit.
    pub(super) warning: Option<String>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub(super) struct TransactionListParams {
    #[param(default = 1, minimum = 1)]
    pub(super) page: Option<i64>,
    #[param(default = 10, maximum = 100)]
    pub(super) limit: Option<i64>,
    /// `income` or `expense`.
    #[serde(rename = "type")]
    pub(super) kind: Option<String>,
    /// Matches category or note, case-insensitive.
    pub(super) search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct PageMeta {
    pub(super) current_page: i64,
    pub(super) limit: i64,
    pub(super) total_data: i64,
    pub(super) total_pages: i64,
}

#[derive(Serialize, ToSchema)]
pub(super) struct TransactionListResponse {
    pub(super) data: Vec<TransactionResponse>,
    pub(super) meta: PageMeta,
}

impl From<TransactionListing> for TransactionListResponse {
    fn from(listing: TransactionListing) -> Self {
        Self {
            data: listing.items.into_iter().map(Into::into).collect(),
            meta: PageMeta {
                current_page: listing.page,
                limit: listing.limit,
                total_data: listing.total,
                total_pages: listing.total_pages,
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct TransactionDataResponse {
    pub(super) data: Vec<TransactionResponse>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct SummaryResponse {
    pub(super) total_income: i64,
    pub(super) total_expense: i64,
    pub(super) balance: i64,
}

impl From<LedgerSummary> for SummaryResponse {
    fn from(s: LedgerSummary) -> Self {
        Self {
            total_income: s.total_income,
            total_expense: s.total_expense,
            balance: s.balance,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct DailyPointResponse {
    #[schema(example = "2025-01-31")]
    pub(super) date: String,
    pub(super) income: i64,
    pub(super) expense: i64,
}

impl From<DailyPoint> for DailyPointResponse {
    fn from(p: DailyPoint) -> Self {
        Self {
            date: p.date,
            income: p.income,
            expense: p.expense,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct DailyChartResponse {
    pub(super) data: Vec<DailyPointResponse>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct CategoryTotalResponse {
    #[serde(rename = "type")]
    pub(super) kind: String,
    pub(super) category: String,
    pub(super) total: i64,
}

impl From<CategoryTotal> for CategoryTotalResponse {
    fn from(c: CategoryTotal) -> Self {
        Self {
            kind: c.kind.to_string(),
            category: c.category,
            total: c.total,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct CategoryTotalsResponse {
    pub(super) data: Vec<CategoryTotalResponse>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct BudgetSettingsRequest {
    #[validate(range(min = 0, message = "must not be negative"))]
    #[schema(example = 100000)]
    pub(super) daily_limit: i64,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub(super) alert_message: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct BudgetSettingsResponse {
    pub(super) daily_limit: i64,
    pub(super) alert_message: Option<String>,
}

impl From<BudgetSettings> for BudgetSettingsResponse {
    fn from(s: BudgetSettings) -> Self {
        Self {
            daily_limit: s.daily_limit,
            alert_message: s.alert_message,
        }
    }
}

// ---- payments ----

#[derive(Serialize, ToSchema)]
pub(super) struct PaymentOutcomeResponse {
    pub(super) message: String,
    /// `active` or `pending`.
    pub(super) status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct PaymentLogResponse {
    pub(super) id: Uuid,
    pub(super) account_id: Uuid,
    pub(super) username: String,
    pub(super) evidence_path: String,
    pub(super) evidence_sha256: String,
    pub(super) detected_bank: Option<String>,
    pub(super) detected_amount: i64,
    pub(super) raw_output: String,
    #[schema(example = "manual_review")]
    pub(super) verdict: String,
    pub(super) reason: String,
    pub(super) created_at: DateTime<Utc>,
}

impl From<PaymentLog> for PaymentLogResponse {
    fn from(log: PaymentLog) -> Self {
        Self {
            id: log.id,
            account_id: log.account_id,
            username: log.username,
            evidence_path: log.evidence_path,
            evidence_sha256: log.evidence_sha256,
            detected_bank: log.detected_bank,
            detected_amount: log.detected_amount,
            raw_output: log.raw_output,
            verdict: log.verdict.to_string(),
            reason: log.reason,
            created_at: log.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct PaymentLogListResponse {
    pub(super) data: Vec<PaymentLogResponse>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct DeletedCountResponse {
    pub(super) message: String,
    pub(super) deleted: usize,
}

#[derive(Deserialize, Debug, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub(super) struct PaginationParams {
    #[serde(default = "default_limit")]
    #[param(default = 50, maximum = 500)]
    pub(super) limit: i64,
    #[serde(default)]
    #[param(default = 0)]
    pub(super) offset: i64,
}

pub(super) fn default_limit() -> i64 {
    50
}

/// Subset of a Telegram `Update` the bot reacts to.
#[derive(Deserialize, Debug)]
pub(super) struct TelegramUpdate {
    pub(super) update_id: Option<i64>,
    pub(super) message: Option<TelegramMessage>,
}

#[derive(Deserialize, Debug)]
pub(super) struct TelegramMessage {
    pub(super) text: Option<String>,
    pub(super) chat: TelegramChat,
}

#[derive(Deserialize, Debug)]
pub(super) struct TelegramChat {
    pub(super) id: i64,
}

// ---- administration ----

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct AdminCreateUserRequest {
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub(super) username: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub(super) password: String,
    pub(super) telegram_id: Option<i64>,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct AdminUpdateUserRequest {
    pub(super) username: Option<String>,
    pub(super) password: Option<String>,
    pub(super) telegram_id: Option<i64>,
    /// Clears the linked chat when true.
    #[serde(default)]
    pub(super) unlink_telegram: bool,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct UpdateStatusRequest {
    #[schema(example = "active")]
    pub(super) status: Option<String>,
    /// Days to add (negative to shorten); without a status this also sets `trial`.
    #[serde(default)]
    #[schema(example = 3)]
    pub(super) add_trial_days: i64,
}

#[derive(Serialize, ToSchema)]
pub(super) struct SubscriptionResultResponse {
    pub(super) message: String,
    pub(super) username: String,
    pub(super) new_status: String,
    pub(super) trial_ends_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct AdminAccountResponse {
    #[serde(flatten)]
    pub(super) account: AccountResponse,
    pub(super) effective_status: String,
    pub(super) trial_hours_remaining: i64,
}

impl From<AccountOverview> for AdminAccountResponse {
    fn from(o: AccountOverview) -> Self {
        Self {
            effective_status: effective_status_label(o.effective_status).to_string(),
            trial_hours_remaining: o.trial_hours_remaining,
            account: o.account.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct AdminAccountListResponse {
    pub(super) data: Vec<AdminAccountResponse>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct MonthlyTotals {
    #[schema(example = "2025-01")]
    pub(super) month: String,
    pub(super) income_this_month: i64,
    pub(super) expense_this_month: i64,
    pub(super) balance: i64,
}

#[derive(Serialize, ToSchema)]
pub(super) struct UserStatsResponse {
    pub(super) user: AccountResponse,
    pub(super) stats: MonthlyTotals,
}

impl From<MonthlyStats> for UserStatsResponse {
    fn from(s: MonthlyStats) -> Self {
        Self {
            user: s.account.into(),
            stats: MonthlyTotals {
                month: s.month,
                income_this_month: s.totals.total_income,
                expense_this_month: s.totals.total_expense,
                balance: s.totals.balance,
            },
        }
    }
}
