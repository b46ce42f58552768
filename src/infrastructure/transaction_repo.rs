use async_trait::async_trait;
use crate::domain::{Transaction, TransactionFilter, TransactionKind, TransactionPage};
use crate::infrastructure::{RepositoryError, TransactionRepository};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn search_pattern(filter: &TransactionFilter) -> Option<String> {
    filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")))
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn create(&self, transaction: &Transaction) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, account_id, kind, amount, category, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.account_id)
        .bind(transaction.kind.to_string())
        .bind(transaction.amount)
        .bind(&transaction.category)
        .bind(&transaction.note)
        .bind(transaction.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_page(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<TransactionPage, RepositoryError> {
        let kind = filter.kind.map(|k| k.to_string());
        let pattern = search_pattern(filter);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE account_id = $1
              AND ($2::TEXT IS NULL OR kind = $2)
              AND ($3::TEXT IS NULL OR category ILIKE $3 OR note ILIKE $3)
            "#,
        )
        .bind(account_id)
        .bind(&kind)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, account_id, kind, amount, category, note, created_at
            FROM transactions
            WHERE account_id = $1
              AND ($2::TEXT IS NULL OR kind = $2)
              AND ($3::TEXT IS NULL OR category ILIKE $3 OR note ILIKE $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(account_id)
        .bind(&kind)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(row_to_transaction)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TransactionPage { items, total })
    }

    async fn list_since(
        &self,
        account_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, kind, amount, category, note, created_at
            FROM transactions
            WHERE account_id = $1
              AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(account_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn sum_since(
        &self,
        account_id: Uuid,
        kind: TransactionKind,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM transactions
            WHERE account_id = $1 AND kind = $2 AND created_at >= $3
            "#,
        )
        .bind(account_id)
        .bind(kind.to_string())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn delete_owned(&self, account_id: Uuid, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM transactions
            WHERE id = $1 AND account_id = $2
            "#,
        )
        .bind(id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }
}

fn row_to_transaction(row: &sqlx::postgres::PgRow) -> Result<Transaction, RepositoryError> {
    let kind_str: String = row.try_get("kind")?;

    Ok(Transaction {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        kind: TransactionKind::from_str(&kind_str).map_err(|_| {
            RepositoryError::InvalidData(format!("Unknown transaction kind: {}", kind_str))
        })?,
        amount: row.try_get("amount")?,
        category: row.try_get("category")?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_pattern_wraps_and_escapes() {
        let filter = TransactionFilter {
            kind: None,
            search: Some(" 50%_off ".to_string()),
        };
        assert_eq!(search_pattern(&filter).as_deref(), Some("%50\\%\\_off%"));
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = TransactionFilter {
            kind: None,
            search: Some("   ".to_string()),
        };
        assert!(search_pattern(&filter).is_none());
    }
}
