use crate::domain::{
    extract_payment_info, AccountStatus, EvidenceUpload, EvidenceVerdict, PaymentLog,
    PaymentOutcome,
};
use crate::infrastructure::{
    AccountRepository, EvidenceStore, EvidenceStoreError, PaymentLogRepository, PaymentMode,
    Recognizer, RecognizerError, RepositoryError, StoredEvidence,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

const MANUAL_MODE_REASON: &str = "Awaiting manual review";

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("A payment proof file is required")]
    EmptyUpload,
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("Account no longer exists")]
    UnknownAccount,
    #[error("Payment log not found")]
    LogNotFound,
    #[error("Evidence storage error: {0}")]
    Storage(#[from] EvidenceStoreError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct PaymentSettings {
    pub mode: PaymentMode,
    pub recognizer_timeout: Duration,
    pub max_evidence_bytes: usize,
}

/// Judges payment evidence and moves accounts to active or pending.
pub struct PaymentService<A, P, S, R>
where
    A: AccountRepository,
    P: PaymentLogRepository,
    S: EvidenceStore,
    R: Recognizer,
{
    accounts: Arc<A>,
    logs: Arc<P>,
    store: Arc<S>,
    recognizer: Arc<R>,
    settings: PaymentSettings,
}

struct Judgement {
    verdict: EvidenceVerdict,
    bank: Option<String>,
    amount: i64,
    raw_output: String,
    reason: String,
}

impl<A, P, S, R> PaymentService<A, P, S, R>
where
    A: AccountRepository,
    P: PaymentLogRepository,
    S: EvidenceStore,
    R: Recognizer,
{
    pub fn new(
        accounts: Arc<A>,
        logs: Arc<P>,
        store: Arc<S>,
        recognizer: Arc<R>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            accounts,
            logs,
            store,
            recognizer,
            settings,
        }
    }

    fn check_upload(&self, upload: &EvidenceUpload) -> Result<(), PaymentError> {
        if upload.bytes.is_empty() {
            return Err(PaymentError::EmptyUpload);
        }
        if upload.bytes.len() > self.settings.max_evidence_bytes {
            return Err(PaymentError::TooLarge {
                limit: self.settings.max_evidence_bytes,
            });
        }
        if upload.image_extension().is_none() {
            return Err(PaymentError::UnsupportedType(upload.content_type.clone()));
        }
        Ok(())
    }

    /// Accept a payment proof from `account_id`.
    ///
    /// Recognizer failures never surface: the evidence is kept and the
    /// submitter is told it awaits manual review.
    pub async fn submit(
        &self,
        account_id: Uuid,
        upload: EvidenceUpload,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome, PaymentError> {
        self.check_upload(&upload)?;

        let account = match self.accounts.get_by_id(account_id).await {
            Ok(account) => account,
            Err(RepositoryError::NotFound(_)) => return Err(PaymentError::UnknownAccount),
            Err(e) => return Err(e.into()),
        };

        let stored = self.store.save(&upload).await?;

        let judgement = match self.settings.mode {
            PaymentMode::Manual => Judgement::manual(MANUAL_MODE_REASON.to_string(), String::new()),
            PaymentMode::Automatic => self.judge(&upload).await,
        };

        self.append_log(&account.id, &account.username, &stored, &judgement, now)
            .await?;

        match judgement.verdict {
            EvidenceVerdict::Accepted => {
                self.accounts
                    .update_status(account.id, AccountStatus::Active)
                    .await?;
                info!(account_id = %account.id, bank = ?judgement.bank, amount = judgement.amount, "Payment accepted, account activated");
                Ok(PaymentOutcome::Activated {
                    bank: judgement.bank,
                    amount: judgement.amount,
                })
            }
            EvidenceVerdict::Rejected => {
                info!(account_id = %account.id, reason = %judgement.reason, "Payment evidence rejected");
                Ok(PaymentOutcome::Rejected {
                    reason: judgement.reason,
                })
            }
            EvidenceVerdict::ManualReview => {
                if account.status != AccountStatus::Active {
                    self.accounts
                        .update_status(account.id, AccountStatus::Pending)
                        .await?;
                    info!(account_id = %account.id, "Account pending manual payment review");
                }
                Ok(PaymentOutcome::PendingReview {
                    reason: judgement.reason,
                })
            }
        }
    }

    async fn judge(&self, upload: &EvidenceUpload) -> Judgement {
        let timeout = self.settings.recognizer_timeout;
        let recognized = match tokio::time::timeout(timeout, self.recognizer.recognize(upload)).await
        {
            Ok(result) => result,
            Err(_) => Err(RecognizerError::Timeout(timeout)),
        };

        match recognized {
            Ok(text) => {
                let info = extract_payment_info(&text);
                Judgement {
                    verdict: if info.is_valid {
                        EvidenceVerdict::Accepted
                    } else {
                        EvidenceVerdict::Rejected
                    },
                    bank: info.bank,
                    amount: info.amount,
                    raw_output: text,
                    reason: info.reason,
                }
            }
            Err(e) => {
                warn!(error = %e, "Recognizer failed, falling back to manual review");
                Judgement::manual(format!("Automatic check unavailable: {}", e), String::new())
            }
        }
    }

    async fn append_log(
        &self,
        account_id: &Uuid,
        username: &str,
        stored: &StoredEvidence,
        judgement: &Judgement,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        let entry = PaymentLog {
            id: Uuid::new_v4(),
            account_id: *account_id,
            username: username.to_string(),
            evidence_path: stored.relative_path.clone(),
            evidence_sha256: stored.sha256.clone(),
            detected_bank: judgement.bank.clone(),
            detected_amount: judgement.amount,
            raw_output: judgement.raw_output.clone(),
            verdict: judgement.verdict,
            reason: judgement.reason.clone(),
            created_at: now,
        };
        self.logs.append(&entry).await?;
        Ok(())
    }

    pub async fn list_logs(&self, limit: i64, offset: i64) -> Result<Vec<PaymentLog>, PaymentError> {
        Ok(self.logs.list(limit, offset).await?)
    }

    /// Delete one log entry, then its artifact. Artifact removal is best effort.
    pub async fn delete_log(&self, id: Uuid) -> Result<(), PaymentError> {
        let entry = match self.logs.get_by_id(id).await {
            Ok(entry) => entry,
            Err(RepositoryError::NotFound(_)) => return Err(PaymentError::LogNotFound),
            Err(e) => return Err(e.into()),
        };

        match self.logs.delete(id).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound(_)) => return Err(PaymentError::LogNotFound),
            Err(e) => return Err(e.into()),
        }

        self.remove_artifact(&entry.evidence_path).await;
        info!(log_id = %id, "Payment log deleted");
        Ok(())
    }

    /// Delete every log entry, returning how many were removed.
    pub async fn delete_all_logs(&self) -> Result<usize, PaymentError> {
        let removed = self.logs.delete_all().await?;
        for entry in &removed {
            self.remove_artifact(&entry.evidence_path).await;
        }
        info!(count = removed.len(), "All payment logs deleted");
        Ok(removed.len())
    }

    async fn remove_artifact(&self, relative_path: &str) {
        if let Err(e) = self.store.remove(relative_path).await {
            error!(path = %relative_path, error = %e, "Failed to remove evidence artifact");
        }
    }
}

impl Judgement {
    fn manual(reason: String, raw_output: String) -> Self {
        Self {
            verdict: EvidenceVerdict::ManualReview,
            bank: None,
            amount: 0,
            raw_output,
            reason,
        }
    }
}
