use crate::application::auth::{validate_password, validate_username};
use crate::domain::{
    apply_subscription_change, start_of_month, summarize, Account, EffectiveStatus,
    LedgerSummary, Principal, ProfileUpdate, SubscriptionChange,
};
use crate::infrastructure::{
    AccountRepository, CryptoError, EvidenceStore, PasswordHasher, PaymentLogRepository,
    RepositoryError, TransactionRepository,
};
use chrono::{DateTime, Duration, Local, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Account not found")]
    NotFound,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Administrators cannot delete their own account")]
    SelfDeletion,
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

fn admin_repo_error(e: RepositoryError) -> AdminError {
    match e {
        RepositoryError::NotFound(_) => AdminError::NotFound,
        RepositoryError::Conflict(msg) => AdminError::Validation(msg),
        other => AdminError::Repository(other),
    }
}

#[derive(Debug, Clone)]
pub struct AccountOverview {
    pub account: Account,
    pub effective_status: EffectiveStatus,
    pub trial_hours_remaining: i64,
}

#[derive(Debug, Clone)]
pub struct MonthlyStats {
    pub account: Account,
    pub month: String,
    pub totals: LedgerSummary,
}

/// Profile fields an administrator may change. Empty strings are ignored.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub username: Option<String>,
    pub password: Option<String>,
    pub telegram_id: Option<i64>,
    pub unlink_telegram: bool,
}

pub struct AdminService<A, T, P, S>
where
    A: AccountRepository,
    T: TransactionRepository,
    P: PaymentLogRepository,
    S: EvidenceStore,
{
    accounts: Arc<A>,
    transactions: Arc<T>,
    logs: Arc<P>,
    store: Arc<S>,
    hasher: Arc<PasswordHasher>,
    provisioned_window: Duration,
}

impl<A, T, P, S> AdminService<A, T, P, S>
where
    A: AccountRepository,
    T: TransactionRepository,
    P: PaymentLogRepository,
    S: EvidenceStore,
{
    pub fn new(
        accounts: Arc<A>,
        transactions: Arc<T>,
        logs: Arc<P>,
        store: Arc<S>,
        hasher: Arc<PasswordHasher>,
        provisioned_window: Duration,
    ) -> Self {
        Self {
            accounts,
            transactions,
            logs,
            store,
            hasher,
            provisioned_window,
        }
    }

    pub async fn list_accounts(&self, now: DateTime<Utc>) -> Result<Vec<AccountOverview>, AdminError> {
        let accounts = self.accounts.list().await?;
        Ok(accounts
            .into_iter()
            .map(|account| AccountOverview {
                effective_status: account.effective_status(now),
                trial_hours_remaining: account.trial_hours_remaining(now),
                account,
            })
            .collect())
    }

    /// Create a paid-up account, active for the provisioned window.
    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
        telegram_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Account, AdminError> {
        let username = username.trim();
        validate_username(username).map_err(AdminError::Validation)?;
        validate_password(password).map_err(AdminError::Validation)?;

        let hash = self.hasher.hash(password).await?;
        let account = Account::new_provisioned(
            username.to_string(),
            hash,
            telegram_id,
            self.provisioned_window,
            now,
        );
        self.accounts.create(&account).await.map_err(admin_repo_error)?;

        info!(account_id = %account.id, "Administrator created account");
        Ok(account)
    }

    /// Delete an account with its transactions and payment logs, then its
    /// evidence artifacts.
    pub async fn delete_account(&self, actor: &Principal, id: Uuid) -> Result<(), AdminError> {
        if actor.account_id == id {
            return Err(AdminError::SelfDeletion);
        }

        let evidence = self.logs.list_by_account(id).await?;
        self.accounts.delete(id).await.map_err(admin_repo_error)?;

        for entry in &evidence {
            if let Err(e) = self.store.remove(&entry.evidence_path).await {
                error!(path = %entry.evidence_path, error = %e, "Failed to remove evidence artifact");
            }
        }

        info!(account_id = %id, removed_evidence = evidence.len(), "Account deleted");
        Ok(())
    }

    /// Income and expense since the start of the current local month.
    pub async fn monthly_stats(&self, id: Uuid, now: DateTime<Utc>) -> Result<MonthlyStats, AdminError> {
        let account = self.accounts.get_by_id(id).await.map_err(admin_repo_error)?;

        let local = now.with_timezone(&Local);
        let since = start_of_month(&local);
        let transactions = self.transactions.list_since(id, Some(since)).await?;

        Ok(MonthlyStats {
            account,
            month: local.format("%Y-%m").to_string(),
            totals: summarize(&transactions),
        })
    }

    pub async fn update_profile(&self, id: Uuid, edit: ProfileEdit) -> Result<Account, AdminError> {
        let username = edit
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let password = edit.password.filter(|p| !p.is_empty());

        if let Some(name) = &username {
            validate_username(name).map_err(AdminError::Validation)?;
        }
        let password_hash = match password {
            Some(p) => {
                validate_password(&p).map_err(AdminError::Validation)?;
                Some(self.hasher.hash(&p).await?)
            }
            None => None,
        };

        let update = ProfileUpdate {
            username,
            password_hash,
            telegram_id: edit.telegram_id,
            unlink_telegram: edit.unlink_telegram,
        };
        if update.is_empty() {
            return Err(AdminError::Validation("Nothing to update".to_string()));
        }

        self.accounts
            .update_profile(id, &update)
            .await
            .map_err(admin_repo_error)?;
        info!(account_id = %id, "Administrator updated account profile");

        self.accounts.get_by_id(id).await.map_err(admin_repo_error)
    }

    /// Set status and/or shift the trial deadline.
    pub async fn update_subscription(
        &self,
        id: Uuid,
        change: SubscriptionChange,
        now: DateTime<Utc>,
    ) -> Result<Account, AdminError> {
        if change.status.is_none() && change.add_trial_days == 0 {
            return Err(AdminError::Validation(
                "Provide a status or a trial day adjustment".to_string(),
            ));
        }

        let mut account = self.accounts.get_by_id(id).await.map_err(admin_repo_error)?;
        let (status, trial_ends_at) =
            apply_subscription_change(account.status, account.trial_ends_at, change, now);

        self.accounts
            .update_subscription(id, status, trial_ends_at)
            .await
            .map_err(admin_repo_error)?;

        info!(
            account_id = %id,
            from = %account.status,
            to = %status,
            trial_ends_at = %trial_ends_at,
            "Administrator changed subscription"
        );

        account.status = status;
        account.trial_ends_at = trial_ends_at;
        account.updated_at = now;
        Ok(account)
    }
}
