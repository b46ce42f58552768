use crate::domain::EvidenceUpload;
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("Recognizer unavailable: {0}")]
    Unavailable(String),
    #[error("Recognizer timed out after {0:?}")]
    Timeout(Duration),
    #[error("Unreadable recognizer output: {0}")]
    Unreadable(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Turns a receipt image into text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, upload: &EvidenceUpload) -> Result<String, RecognizerError>;
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504)
}

#[derive(Debug, Deserialize)]
struct OcrSpaceResponse {
    #[serde(rename = "ParsedResults", default)]
    parsed_results: Vec<OcrSpaceParsedResult>,
    #[serde(rename = "OCRExitCode", default)]
    exit_code: i32,
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OcrSpaceParsedResult {
    #[serde(rename = "ParsedText", default)]
    parsed_text: String,
}

/// Extract recognized text from an OCR.space response body.
///
/// Exit code 1 means every page parsed; anything else, or no text at all, is
/// unreadable.
fn parse_ocr_response(body: &str) -> Result<String, RecognizerError> {
    let response: OcrSpaceResponse = serde_json::from_str(body)
        .map_err(|e| RecognizerError::Unreadable(format!("invalid JSON: {}", e)))?;

    if response.exit_code != 1 {
        let detail = response
            .error_message
            .map(|m| m.to_string())
            .unwrap_or_else(|| format!("exit code {}", response.exit_code));
        return Err(RecognizerError::Unreadable(detail));
    }

    let text = response
        .parsed_results
        .into_iter()
        .map(|r| r.parsed_text)
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(RecognizerError::Unreadable("no text recognized".to_string()));
    }
    Ok(text)
}

/// OCR.space client.
pub struct OcrSpaceClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OcrSpaceClient {
    pub fn new(
        api_key: String,
        endpoint: String,
        request_timeout: Duration,
    ) -> Result<Self, RecognizerError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                RecognizerError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    fn build_form(upload: &EvidenceUpload) -> Result<multipart::Form, RecognizerError> {
        let part = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| RecognizerError::InvalidConfig(format!("Invalid content type: {}", e)))?;

        Ok(multipart::Form::new()
            .part("file", part)
            .text("language", "eng")
            .text("OCREngine", "2"))
    }

    async fn send_with_retry(
        &self,
        upload: &EvidenceUpload,
    ) -> Result<reqwest::Response, RecognizerError> {
        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            let form = Self::build_form(upload)?;
            let response = self
                .client
                .post(&self.endpoint)
                .header("apikey", &self.api_key)
                .multipart(form)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 429 {
                        return Err(RecognizerError::RateLimited);
                    }

                    if is_retryable_status(status) && attempt < MAX_RETRIES - 1 {
                        let backoff = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                        sleep(Duration::from_millis(backoff)).await;
                        continue;
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    if attempt < MAX_RETRIES - 1 {
                        let backoff = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                        sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }

        Err(RecognizerError::Unavailable(
            last_error.unwrap_or_else(|| "Max retries exceeded".to_string()),
        ))
    }
}

#[async_trait]
impl Recognizer for OcrSpaceClient {
    async fn recognize(&self, upload: &EvidenceUpload) -> Result<String, RecognizerError> {
        if self.api_key.is_empty() {
            return Err(RecognizerError::InvalidConfig(
                "OCR API key is not configured".to_string(),
            ));
        }

        let resp = self.send_with_retry(upload).await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RecognizerError::Unavailable(format!("{}: {}", status, error_text)));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| RecognizerError::Unreadable(e.to_string()))?;

        parse_ocr_response(&body)
    }
}
