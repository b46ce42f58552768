use crate::domain::{Account, AccountStatus, EffectiveStatus, Principal};
use crate::infrastructure::{AccountRepository, RepositoryError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Trial period has expired")]
    TrialExpired,
    #[error("Account is suspended")]
    Suspended,
    #[error("Account no longer exists")]
    UnknownAccount,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Per-request subscription check for status-sensitive operations.
pub struct AccessGate<A>
where
    A: AccountRepository,
{
    accounts: Arc<A>,
}

impl<A> AccessGate<A>
where
    A: AccountRepository,
{
    pub fn new(accounts: Arc<A>) -> Self {
        Self { accounts }
    }

    /// Decide whether `principal` may proceed at `now`.
    ///
    /// Admins pass without a store read. Everyone else is judged on the
    /// freshly loaded account; an expired trial is persisted as suspended
    /// before the rejection is returned.
    pub async fn check(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<EffectiveStatus, AccessError> {
        if principal.is_admin() {
            return Ok(EffectiveStatus::Admin);
        }

        let (_, effective) = self.resolve(principal, now).await?;
        match effective {
            EffectiveStatus::TrialExpired => Err(AccessError::TrialExpired),
            EffectiveStatus::Suspended => Err(AccessError::Suspended),
            status => Ok(status),
        }
    }

    /// Current account and effective status, without rejecting.
    ///
    /// Used by open endpoints so clients can route to payment. A detected
    /// expiry is still persisted.
    pub async fn inspect(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<(Account, EffectiveStatus), AccessError> {
        self.resolve(principal, now).await
    }

    async fn resolve(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<(Account, EffectiveStatus), AccessError> {
        let mut account = match self.accounts.get_by_id(principal.account_id).await {
            Ok(account) => account,
            Err(RepositoryError::NotFound(_)) => return Err(AccessError::UnknownAccount),
            Err(e) => return Err(e.into()),
        };

        let effective = account.effective_status(now);
        if let Some(AccountStatus::Suspended) = effective.transition_from(account.status) {
            // Conditional on the row still being `trial`; concurrent detections write once.
            if self.accounts.suspend_expired_trial(account.id).await? {
                info!(account_id = %account.id, trial_ends_at = %account.trial_ends_at, "Trial expired, account suspended");
            }
            account.status = AccountStatus::Suspended;
        }

        Ok((account, effective))
    }
}
