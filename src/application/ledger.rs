use crate::application::BudgetAlertEvaluator;
use crate::domain::{
    category_totals, daily_series, start_of_day, summarize, CategoryTotal, DailyPoint,
    LedgerSummary, NewTransaction, Transaction, TransactionFilter, TransactionKind,
};
use crate::infrastructure::{AccountRepository, RepositoryError, TransactionRepository};
use chrono::{DateTime, Duration, Local, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const CHART_WINDOW_DAYS: i64 = 30;
pub const MAX_CATEGORY_LEN: usize = 50;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Transaction not found")]
    NotFound,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A stored transaction plus any budget warning it triggered.
#[derive(Debug, Clone)]
pub struct RecordedTransaction {
    pub transaction: Transaction,
    pub warning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransactionListing {
    pub items: Vec<Transaction>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Clamp requested paging: page below 1 becomes 1, a limit outside
/// `1..=MAX_PAGE_SIZE` is reset or capped.
pub fn normalize_paging(page: i64, limit: i64) -> (i64, i64) {
    let page = page.max(1);
    let limit = if limit < 1 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    };
    (page, limit)
}

pub struct LedgerService<A, T>
where
    A: AccountRepository,
    T: TransactionRepository,
{
    transactions: Arc<T>,
    budget: Arc<BudgetAlertEvaluator<A, T>>,
}

impl<A, T> LedgerService<A, T>
where
    A: AccountRepository,
    T: TransactionRepository,
{
    pub fn new(transactions: Arc<T>, budget: Arc<BudgetAlertEvaluator<A, T>>) -> Self {
        Self {
            transactions,
            budget,
        }
    }

    /// Store a transaction. Expenses are followed by a budget check that
    /// already sees the new amount.
    pub async fn record(
        &self,
        account_id: Uuid,
        new: NewTransaction,
        now: DateTime<Utc>,
    ) -> Result<RecordedTransaction, LedgerError> {
        if new.amount <= 0 {
            return Err(LedgerError::Validation(
                "Amount must be greater than zero".to_string(),
            ));
        }
        let category = new.category.trim().to_string();
        if category.is_empty() || category.chars().count() > MAX_CATEGORY_LEN {
            return Err(LedgerError::Validation(format!(
                "Category must be between 1 and {} characters",
                MAX_CATEGORY_LEN
            )));
        }

        let transaction = Transaction::new(account_id, NewTransaction { category, ..new }, now);
        self.transactions.create(&transaction).await?;

        let warning = if transaction.kind == TransactionKind::Expense {
            match self.budget.evaluate(account_id, now).await {
                Ok(warning) => warning,
                Err(e) => {
                    warn!(account_id = %account_id, error = %e, "Budget check failed");
                    None
                }
            }
        } else {
            None
        };

        if warning.is_some() {
            info!(account_id = %account_id, "Daily spending limit reached");
        }

        Ok(RecordedTransaction {
            transaction,
            warning,
        })
    }

    pub async fn list(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
        page: i64,
        limit: i64,
    ) -> Result<TransactionListing, LedgerError> {
        let (page, limit) = normalize_paging(page, limit);
        let offset = (page - 1) * limit;

        let found = self
            .transactions
            .list_page(account_id, filter, limit, offset)
            .await?;

        Ok(TransactionListing {
            items: found.items,
            page,
            limit,
            total: found.total,
            total_pages: (found.total + limit - 1) / limit,
        })
    }

    pub async fn today(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let since = start_of_day(&now.with_timezone(&Local));
        Ok(self.transactions.list_since(account_id, Some(since)).await?)
    }

    pub async fn delete(&self, account_id: Uuid, id: Uuid) -> Result<(), LedgerError> {
        match self.transactions.delete_owned(account_id, id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound(_)) => Err(LedgerError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn summary(&self, account_id: Uuid) -> Result<LedgerSummary, LedgerError> {
        let all = self.transactions.list_since(account_id, None).await?;
        Ok(summarize(&all))
    }

    /// Per-day totals over the trailing chart window, oldest day first.
    pub async fn daily_chart(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyPoint>, LedgerError> {
        let local = now.with_timezone(&Local);
        let since = start_of_day(&(local - Duration::days(CHART_WINDOW_DAYS - 1)));
        let recent = self.transactions.list_since(account_id, Some(since)).await?;
        Ok(daily_series(&recent, &Local))
    }

    pub async fn categories(&self, account_id: Uuid) -> Result<Vec<CategoryTotal>, LedgerError> {
        let all = self.transactions.list_since(account_id, None).await?;
        Ok(category_totals(&all))
    }
}
