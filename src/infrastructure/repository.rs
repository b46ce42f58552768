use crate::domain::{
    Account, AccountStatus, BudgetSettings, PaymentLog, ProfileUpdate, Role, Transaction,
    TransactionFilter, TransactionKind, TransactionPage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Map a write failure, turning unique-constraint violations into `Conflict`.
pub(crate) fn map_write_error(e: sqlx::Error, what: &str) -> RepositoryError {
    let unique = e
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);
    if unique {
        RepositoryError::Conflict(format!("{} already exists", what))
    } else {
        RepositoryError::DatabaseError(e)
    }
}

fn not_found_on_missing_row(e: sqlx::Error, what: String) -> RepositoryError {
    match e {
        sqlx::Error::RowNotFound => RepositoryError::NotFound(what),
        _ => RepositoryError::DatabaseError(e),
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, account: &Account) -> Result<(), RepositoryError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Account, RepositoryError>;
    async fn get_by_username(&self, username: &str) -> Result<Account, RepositoryError>;
    async fn get_by_telegram_id(&self, telegram_id: i64) -> Result<Account, RepositoryError>;
    async fn list(&self) -> Result<Vec<Account>, RepositoryError>;
    async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<(), RepositoryError>;
    /// Move a trial account to suspended. Only applies while the stored status
    /// is still `trial`; returns whether a row changed.
    async fn suspend_expired_trial(&self, id: Uuid) -> Result<bool, RepositoryError>;
    async fn update_subscription(
        &self,
        id: Uuid,
        status: AccountStatus,
        trial_ends_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), RepositoryError>;
    async fn update_budget(&self, id: Uuid, settings: &BudgetSettings) -> Result<(), RepositoryError>;
    /// Delete the account together with its transactions and payment logs.
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn create(&self, transaction: &Transaction) -> Result<(), RepositoryError>;
    async fn list_page(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<TransactionPage, RepositoryError>;
    /// Transactions created at or after `since` (all of them when `None`),
    /// newest first.
    async fn list_since(
        &self,
        account_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, RepositoryError>;
    async fn sum_since(
        &self,
        account_id: Uuid,
        kind: TransactionKind,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError>;
    /// Delete a transaction owned by `account_id`. A transaction owned by
    /// someone else is reported as `NotFound`.
    async fn delete_owned(&self, account_id: Uuid, id: Uuid) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentLogRepository: Send + Sync {
    async fn append(&self, entry: &PaymentLog) -> Result<(), RepositoryError>;
    async fn get_by_id(&self, id: Uuid) -> Result<PaymentLog, RepositoryError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<PaymentLog>, RepositoryError>;
    async fn list_by_account(&self, account_id: Uuid) -> Result<Vec<PaymentLog>, RepositoryError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// Delete every entry, returning what was removed.
    async fn delete_all(&self) -> Result<Vec<PaymentLog>, RepositoryError>;
}

pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, password_hash, telegram_id, role, status, \
     trial_ends_at, daily_limit, alert_message, created_at, updated_at";

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn create(&self, account: &Account) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, password_hash, telegram_id, role, status,
                                  trial_ends_at, daily_limit, alert_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.telegram_id)
        .bind(account.role.to_string())
        .bind(account.status.to_string())
        .bind(account.trial_ends_at)
        .bind(account.daily_limit)
        .bind(&account.alert_message)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Username or Telegram ID"))?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Account, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_on_missing_row(e, format!("Account {}", id)))?;

        row_to_account(&row)
    }

    async fn get_by_username(&self, username: &str) -> Result<Account, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE username = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_on_missing_row(e, format!("Account {}", username)))?;

        row_to_account(&row)
    }

    async fn get_by_telegram_id(&self, telegram_id: i64) -> Result<Account, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE telegram_id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(telegram_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_on_missing_row(e, format!("Account with chat {}", telegram_id)))?;

        row_to_account(&row)
    }

    async fn list(&self) -> Result<Vec<Account>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts ORDER BY created_at DESC",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_account).collect()
    }

    async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET status = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    async fn suspend_expired_trial(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET status = 'suspended', updated_at = $1
            WHERE id = $2 AND status = 'trial'
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_subscription(
        &self,
        id: Uuid,
        status: AccountStatus,
        trial_ends_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET status = $1, trial_ends_at = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(status.to_string())
        .bind(trial_ends_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET username = COALESCE($1, username),
                password_hash = COALESCE($2, password_hash),
                telegram_id = CASE WHEN $4 THEN NULL ELSE COALESCE($3, telegram_id) END,
                updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(&update.username)
        .bind(&update.password_hash)
        .bind(update.telegram_id)
        .bind(update.unlink_telegram)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Username or Telegram ID"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    async fn update_budget(&self, id: Uuid, settings: &BudgetSettings) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET daily_limit = $1, alert_message = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(settings.daily_limit)
        .bind(&settings.alert_message)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM transactions WHERE account_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM payment_logs WHERE account_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!("Account {}", id)));
        }

        tx.commit().await?;
        Ok(())
    }
}

fn row_to_account(row: &sqlx::postgres::PgRow) -> Result<Account, RepositoryError> {
    let role_str: String = row.try_get("role")?;
    let status_str: String = row.try_get("status")?;

    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        telegram_id: row.try_get("telegram_id")?,
        role: Role::from_str(&role_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown role: {}", role_str)))?,
        status: AccountStatus::from_str(&status_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown status: {}", status_str)))?,
        trial_ends_at: row.try_get("trial_ends_at")?,
        daily_limit: row.try_get("daily_limit")?,
        alert_message: row.try_get("alert_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
