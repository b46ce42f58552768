use crate::application::{
    AccessGate, AdminService, BudgetAlertEvaluator, ChatService, CredentialService,
    LedgerService, PaymentService, PaymentSettings,
};
use crate::infrastructure::{
    AppConfig, LocalEvidenceStore, OcrSpaceClient, PasswordHasher, PaymentMode,
    PostgresAccountRepository, PostgresPaymentLogRepository, PostgresTransactionRepository,
    TelegramClient, TokenIssuer,
};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub type CredentialServiceType = CredentialService<PostgresAccountRepository>;

pub type AccessGateType = AccessGate<PostgresAccountRepository>;

pub type BudgetEvaluatorType =
    BudgetAlertEvaluator<PostgresAccountRepository, PostgresTransactionRepository>;

pub type LedgerServiceType = LedgerService<PostgresAccountRepository, PostgresTransactionRepository>;

pub type PaymentServiceType = PaymentService<
    PostgresAccountRepository,
    PostgresPaymentLogRepository,
    LocalEvidenceStore,
    OcrSpaceClient,
>;

pub type AdminServiceType = AdminService<
    PostgresAccountRepository,
    PostgresTransactionRepository,
    PostgresPaymentLogRepository,
    LocalEvidenceStore,
>;

pub type ChatServiceType =
    ChatService<PostgresAccountRepository, PostgresTransactionRepository, TelegramClient>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub credentials: Arc<CredentialServiceType>,
    pub gate: Arc<AccessGateType>,
    pub budget: Arc<BudgetEvaluatorType>,
    pub ledger: Arc<LedgerServiceType>,
    pub payments: Arc<PaymentServiceType>,
    pub admin: Arc<AdminServiceType>,
    pub chat: Arc<ChatServiceType>,
    pub telegram_webhook_secret: Arc<str>,
    pub max_evidence_bytes: usize,
}

/// Build full state from config + an existing pool.
///
/// Intended for embedding into a larger service that already manages a `PgPool`.
pub async fn build_state_with_pool(
    config: AppConfig,
    pool: PgPool,
    run_migrations: bool,
) -> anyhow::Result<AppState> {
    if run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;
    }

    let hasher = Arc::new(PasswordHasher::new(config.bcrypt_cost).context("init password hasher")?);
    let tokens = Arc::new(
        TokenIssuer::new(&config.jwt_secret, chrono::Duration::hours(config.token_ttl_hours))
            .context("init token issuer")?,
    );

    if config.payment_mode == PaymentMode::Automatic && config.ocr_api_key.is_empty() {
        warn!("Automatic payment mode without an OCR API key; every proof goes to manual review");
    }
    let total_timeout = Duration::from_secs(config.recognizer_timeout_secs);
    let recognizer = Arc::new(
        OcrSpaceClient::new(
            config.ocr_api_key.clone(),
            config.ocr_endpoint.clone(),
            Duration::from_secs((config.recognizer_timeout_secs / 3).max(5)),
        )
        .context("init OCR client")?,
    );

    if config.telegram_bot_token.is_empty() {
        info!("Telegram bot token not set; chat replies are disabled");
    }
    let notifier = Arc::new(
        TelegramClient::new(config.telegram_bot_token.clone()).context("init Telegram client")?,
    );

    let evidence_store = Arc::new(LocalEvidenceStore::new(config.evidence_dir.clone()));

    let account_repo = Arc::new(PostgresAccountRepository::new(pool.clone()));
    let transaction_repo = Arc::new(PostgresTransactionRepository::new(pool.clone()));
    let payment_log_repo = Arc::new(PostgresPaymentLogRepository::new(pool.clone()));

    let credentials = Arc::new(CredentialService::new(
        account_repo.clone(),
        hasher.clone(),
        tokens,
        chrono::Duration::hours(config.trial_hours),
        config.owner_setup_secret.clone(),
    ));

    let gate = Arc::new(AccessGate::new(account_repo.clone()));
    let budget = Arc::new(BudgetAlertEvaluator::new(
        account_repo.clone(),
        transaction_repo.clone(),
    ));
    let ledger = Arc::new(LedgerService::new(transaction_repo.clone(), budget.clone()));

    let payments = Arc::new(PaymentService::new(
        account_repo.clone(),
        payment_log_repo.clone(),
        evidence_store.clone(),
        recognizer,
        PaymentSettings {
            mode: config.payment_mode,
            recognizer_timeout: total_timeout,
            max_evidence_bytes: config.max_evidence_bytes,
        },
    ));

    let admin = Arc::new(AdminService::new(
        account_repo.clone(),
        transaction_repo,
        payment_log_repo,
        evidence_store,
        hasher,
        chrono::Duration::days(config.provisioned_days),
    ));

    let chat = Arc::new(ChatService::new(
        account_repo,
        gate.clone(),
        ledger.clone(),
        notifier,
    ));

    Ok(AppState {
        pool,
        credentials,
        gate,
        budget,
        ledger,
        payments,
        admin,
        chat,
        telegram_webhook_secret: Arc::from(config.telegram_webhook_secret.as_str()),
        max_evidence_bytes: config.max_evidence_bytes,
    })
}

/// Build state for the standalone server.
///
/// Creates the `PgPool`, runs migrations, and wires repositories/services.
pub async fn build_state_from_env(config: AppConfig) -> anyhow::Result<AppState> {
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("connect database")?;
    build_state_with_pool(config, pool, true).await
}
