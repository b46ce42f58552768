use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Bot API error: {0}")]
    ApiError(String),
}

/// Outbound chat replies.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifierError>;
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Telegram Bot API client. With an empty token every send is a no-op.
pub struct TelegramClient {
    client: Client,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Result<Self, NotifierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, token })
    }
}

#[async_trait]
impl ChatNotifier for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifierError> {
        if self.token.is_empty() {
            debug!(chat_id, "Bot token not configured, reply dropped");
            return Ok(());
        }

        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, self.token);
        let resp = self
            .client
            .post(&url)
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NotifierError::ApiError(format!("{}: {}", status, error_text)));
        }

        Ok(())
    }
}
