use crate::domain::{budget_warning, start_of_day, BudgetSettings, TransactionKind};
use crate::infrastructure::{AccountRepository, RepositoryError, TransactionRepository};
use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub const MAX_ALERT_MESSAGE_LEN: usize = 255;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Daily spending threshold checks and the settings behind them.
pub struct BudgetAlertEvaluator<A, T>
where
    A: AccountRepository,
    T: TransactionRepository,
{
    accounts: Arc<A>,
    transactions: Arc<T>,
}

impl<A, T> BudgetAlertEvaluator<A, T>
where
    A: AccountRepository,
    T: TransactionRepository,
{
    pub fn new(accounts: Arc<A>, transactions: Arc<T>) -> Self {
        Self {
            accounts,
            transactions,
        }
    }

    /// Warning for the account's local day containing `now`, if today's
    /// expenses have reached the limit. Run after the expense is stored.
    pub async fn evaluate(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, RepositoryError> {
        let settings = self.accounts.get_by_id(account_id).await?.budget();
        if settings.daily_limit <= 0 {
            return Ok(None);
        }

        let since = start_of_day(&now.with_timezone(&Local));
        let spent = self
            .transactions
            .sum_since(account_id, TransactionKind::Expense, since)
            .await?;

        Ok(budget_warning(
            settings.daily_limit,
            spent,
            settings.alert_message.as_deref(),
        ))
    }

    pub async fn settings(&self, account_id: Uuid) -> Result<BudgetSettings, RepositoryError> {
        Ok(self.accounts.get_by_id(account_id).await?.budget())
    }

    pub async fn update_settings(
        &self,
        account_id: Uuid,
        settings: BudgetSettings,
    ) -> Result<BudgetSettings, BudgetError> {
        if settings.daily_limit < 0 {
            return Err(BudgetError::Validation(
                "Daily limit must not be negative".to_string(),
            ));
        }
        let alert_message = settings
            .alert_message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if alert_message
            .as_deref()
            .is_some_and(|m| m.chars().count() > MAX_ALERT_MESSAGE_LEN)
        {
            return Err(BudgetError::Validation(format!(
                "Alert message must be at most {} characters",
                MAX_ALERT_MESSAGE_LEN
            )));
        }

        let settings = BudgetSettings {
            daily_limit: settings.daily_limit,
            alert_message,
        };
        self.accounts.update_budget(account_id, &settings).await?;
        Ok(settings)
    }
}
