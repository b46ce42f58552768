use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Evidence is judged by the external recognizer.
    Automatic,
    /// Evidence waits for an administrator.
    Manual,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,

    // Credentials and sessions
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub owner_setup_secret: String,

    // Subscription lifecycle
    pub trial_hours: i64,
    pub provisioned_days: i64,

    // Payment evidence
    pub payment_mode: PaymentMode,
    pub ocr_api_key: String,
    pub ocr_endpoint: String,
    pub recognizer_timeout_secs: u64,
    pub evidence_dir: String,
    pub max_evidence_bytes: usize,

    // Chat bot
    pub telegram_bot_token: String,
    pub telegram_webhook_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("MONEYBOOK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 8080)?
            .set_default("token_ttl_hours", 24 * 30)?
            .set_default("bcrypt_cost", 12)?
            .set_default("owner_setup_secret", "")?
            .set_default("trial_hours", 24)?
            .set_default("provisioned_days", 365)?
            .set_default("payment_mode", "automatic")?
            .set_default("ocr_api_key", "")?
            .set_default("ocr_endpoint", "https://api.ocr.space/parse/image")?
            .set_default("recognizer_timeout_secs", 30)?
            .set_default("evidence_dir", "uploads")?
            .set_default("max_evidence_bytes", 5 * 1024 * 1024)?
            .set_default("telegram_bot_token", "")?
            .set_default("telegram_webhook_secret", "")?
            .build()?;

        config.try_deserialize()
    }
}
